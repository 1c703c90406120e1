//! Reader states and the scope stack.
//!
//! One scope frame is pushed when a feed, entry or navigation link is
//! entered and popped when its end state has been surfaced. Seen flags are
//! plain named booleans; the media-link-entry flag is tri-state, with the
//! first piece of evidence final.

use crate::atom::{EntryMetadata, FeedMetadata};
use crate::dedup::DuplicateTracker;
use crate::error::{Error, Result};
use crate::payload::{Entry, Feed, NavigationLink};
use crate::schema::NavigationProperty;

/// States surfaced by the payload reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Start,
    FeedStart,
    FeedEnd,
    EntryStart,
    EntryEnd,
    NavigationLinkStart,
    NavigationLinkEnd,
    EntityReferenceLink,
    Completed,
}

/// A discovered navigation link paired with its resolved schema property.
///
/// When a property is present its name equals the link's name.
#[derive(Debug, Clone)]
pub(crate) struct NavigationLinkDescriptor {
    pub(crate) link: NavigationLink,
    pub(crate) property: Option<NavigationProperty>,
    /// Cardinality hint from the link's media type attribute.
    pub(crate) cardinality_hint: Option<bool>,
    /// Name of the owning closed type when it does not declare this link.
    pub(crate) undeclared_on: Option<String>,
}

impl NavigationLinkDescriptor {
    pub(crate) fn new(link: NavigationLink, property: Option<NavigationProperty>) -> Self {
        debug_assert!(
            property.as_ref().map(|p| p.name == link.name).unwrap_or(true),
            "descriptor property name must match the link name"
        );
        NavigationLinkDescriptor {
            link,
            property,
            cardinality_hint: None,
            undeclared_on: None,
        }
    }

    /// Declared cardinality, falling back to the wire hint.
    pub(crate) fn declared_or_hinted_collection(&self) -> Option<bool> {
        self.property
            .as_ref()
            .map(|p| p.collection)
            .or(self.cardinality_hint)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FeedSeen {
    pub(crate) count: bool,
    pub(crate) next_link: bool,
    pub(crate) self_link: bool,
    pub(crate) delta_link: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EntrySeen {
    pub(crate) read_link: bool,
    pub(crate) edit_link: bool,
    pub(crate) edit_media_link: bool,
    pub(crate) id: bool,
    pub(crate) content: bool,
    pub(crate) type_category: bool,
    pub(crate) properties: bool,
}

#[derive(Debug)]
pub(crate) struct FeedScope {
    pub(crate) feed: Feed,
    pub(crate) element_empty: bool,
    pub(crate) seen: FeedSeen,
    pub(crate) metadata: Option<Box<FeedMetadata>>,
    /// Entry type the containing context expects, used to validate entries.
    pub(crate) expected_entry_type: Option<String>,
    /// True for the feed synthesized from an empty inline expansion; no
    /// tokens back it.
    pub(crate) synthetic_empty: bool,
}

impl FeedScope {
    pub(crate) fn new(element_empty: bool, expected_entry_type: Option<String>) -> Self {
        FeedScope {
            feed: Feed::new(),
            element_empty,
            seen: FeedSeen::default(),
            metadata: None,
            expected_entry_type,
            synthetic_empty: false,
        }
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut FeedMetadata {
        self.metadata.get_or_insert_with(Default::default)
    }
}

#[derive(Debug)]
pub(crate) struct EntryScope {
    pub(crate) entry: Entry,
    pub(crate) element_empty: bool,
    pub(crate) seen: EntrySeen,
    /// None until the first media-link-entry evidence; the first value is
    /// final and any later contradiction is an error.
    pub(crate) media_link_entry: Option<bool>,
    pub(crate) pending_link: Option<NavigationLinkDescriptor>,
    pub(crate) duplicates: DuplicateTracker,
    pub(crate) metadata: Option<Box<EntryMetadata>>,
    /// Entity type the containing context expects this entry to have.
    pub(crate) expected_type: Option<String>,
    /// Resolved entity type name used for schema lookups.
    pub(crate) entity_type: Option<String>,
}

impl EntryScope {
    pub(crate) fn new(element_empty: bool, expected_type: Option<String>) -> Self {
        EntryScope {
            entry: Entry::new(),
            element_empty,
            seen: EntrySeen::default(),
            media_link_entry: None,
            pending_link: None,
            duplicates: DuplicateTracker::new(),
            metadata: None,
            entity_type: expected_type.clone(),
            expected_type,
        }
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut EntryMetadata {
        self.metadata.get_or_insert_with(Default::default)
    }

    /// Record media-link-entry evidence from the named element.
    pub(crate) fn note_media_evidence(
        &mut self,
        is_media: bool,
        element: &'static str,
    ) -> Result<()> {
        match self.media_link_entry {
            None => {
                self.media_link_entry = Some(is_media);
                Ok(())
            }
            Some(previous) if previous == is_media => Ok(()),
            Some(_) => Err(Error::MediaEntryMismatch(element)),
        }
    }
}

#[derive(Debug)]
pub(crate) struct LinkScope {
    pub(crate) descriptor: NavigationLinkDescriptor,
    /// True once inline content has been entered.
    pub(crate) expanded: bool,
}

impl LinkScope {
    pub(crate) fn new(descriptor: NavigationLinkDescriptor) -> Self {
        LinkScope {
            descriptor,
            expanded: false,
        }
    }
}

/// One frame of the reader's state stack.
#[derive(Debug)]
pub(crate) enum Scope {
    Feed(FeedScope),
    Entry(EntryScope),
    Link(LinkScope),
}

impl Scope {
    #[inline(always)]
    pub(crate) fn as_feed(&self) -> Option<&FeedScope> {
        match self {
            Scope::Feed(scope) => Some(scope),
            _ => None,
        }
    }

    #[inline(always)]
    pub(crate) fn as_entry(&self) -> Option<&EntryScope> {
        match self {
            Scope::Entry(scope) => Some(scope),
            _ => None,
        }
    }

    #[inline(always)]
    pub(crate) fn as_link(&self) -> Option<&LinkScope> {
        match self {
            Scope::Link(scope) => Some(scope),
            _ => None,
        }
    }
}
