//! Duplicate-name enforcement.
//!
//! The wire format permits at most one element per logical name per entry,
//! so properties and navigation/association links share one tracker. A
//! tracker lives for exactly one entry scope; for collection items the same
//! instance is cleared and reused between siblings.

use std::collections::HashSet;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub(crate) struct DuplicateTracker {
    seen: HashSet<String>,
}

impl DuplicateTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark `name` seen; fails if it already was. Exact, case-sensitive.
    pub(crate) fn check(&mut self, name: &str) -> Result<()> {
        if self.seen.insert(name.to_string()) {
            Ok(())
        } else {
            Err(Error::DuplicateName(name.to_string()))
        }
    }

    /// Forget all seen names, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        self.seen.clear();
    }
}
