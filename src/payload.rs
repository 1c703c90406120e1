//! Payload node graph: feeds, entries and links.

use crate::atom::{EntryMetadata, FeedMetadata};
use crate::value::{Property, StreamValue};

/// A list-shaped payload node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feed {
    pub id: Option<String>,
    /// Inline count, when the payload carries one.
    pub count: Option<i64>,
    pub next_link: Option<String>,
    pub delta_link: Option<String>,
    /// Syndication metadata, attached when the feed scope is popped.
    pub metadata: Option<Box<FeedMetadata>>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A single structured-object payload node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    pub id: Option<String>,
    pub etag: Option<String>,
    pub type_name: Option<String>,
    pub read_link: Option<String>,
    pub edit_link: Option<String>,
    /// The media resource of a media link entry.
    pub media_resource: Option<StreamValue>,
    pub properties: Vec<Property>,
    /// Syndication metadata, attached when the entry scope is popped.
    pub metadata: Option<Box<EntryMetadata>>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed(type_name: impl Into<String>) -> Self {
        Entry {
            type_name: Some(type_name.into()),
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Whether this entry is a media link entry.
    #[inline(always)]
    pub fn is_media_link_entry(&self) -> bool {
        self.media_resource.is_some()
    }
}

/// A named relationship from an entry to another entry or feed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavigationLink {
    pub name: String,
    pub url: Option<String>,
    pub association_url: Option<String>,
    /// Cardinality, when known from schema, wire hint or discovered content.
    pub is_collection: Option<bool>,
}

impl NavigationLink {
    pub fn new(name: impl Into<String>) -> Self {
        NavigationLink {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn deferred(name: impl Into<String>, url: impl Into<String>) -> Self {
        NavigationLink {
            name: name.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// Minimal link form carrying only a URL, used for unexpanded links in
/// request payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReferenceLink {
    pub url: String,
}

impl EntityReferenceLink {
    pub fn new(url: impl Into<String>) -> Self {
        EntityReferenceLink { url: url.into() }
    }
}

/// The payload node surfaced by the reader at its current state.
#[derive(Debug, Clone, Copy)]
pub enum PayloadNode<'a> {
    Feed(&'a Feed),
    Entry(&'a Entry),
    NavigationLink(&'a NavigationLink),
    EntityReferenceLink(&'a EntityReferenceLink),
}

impl<'a> PayloadNode<'a> {
    #[inline(always)]
    pub fn as_feed(&self) -> Option<&'a Feed> {
        match self {
            PayloadNode::Feed(feed) => Some(feed),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_entry(&self) -> Option<&'a Entry> {
        match self {
            PayloadNode::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_navigation_link(&self) -> Option<&'a NavigationLink> {
        match self {
            PayloadNode::NavigationLink(link) => Some(link),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_entity_reference_link(&self) -> Option<&'a EntityReferenceLink> {
        match self {
            PayloadNode::EntityReferenceLink(link) => Some(link),
            _ => None,
        }
    }
}
