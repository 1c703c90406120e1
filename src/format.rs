//! Format binding: the strategy supplying concrete token shapes.
//!
//! The reader state machine and the serializer are generic over a
//! [`WireFormat`]; the binding classifies incoming tokens and supplies the
//! names to emit. [`AtomFormat`] is the shipped binding. A sibling binding
//! (for example JSON) implements the same contract with different token
//! shapes.

use crate::constants;
use crate::token::{Attribute, QName};

/// Classification of a feed child element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedChild {
    Entry,
    Id,
    Count,
    Link,
    Title,
    Subtitle,
    Updated,
    Author,
    Generator,
    Unknown,
}

/// Classification of an entry child element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChild {
    Id,
    Category,
    Link,
    Content,
    Properties,
    Title,
    Summary,
    Updated,
    Author,
    Unknown,
}

/// Classification of a link element by its relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRelation {
    SelfLink,
    Edit,
    EditMedia,
    Next,
    Delta,
    Navigation(String),
    Association(String),
    Other,
}

/// Token-shape hooks for one concrete wire format.
pub trait WireFormat {
    fn is_feed(&self, name: &QName) -> bool;
    fn is_entry(&self, name: &QName) -> bool;
    fn is_inline(&self, name: &QName) -> bool;
    fn classify_feed_child(&self, name: &QName) -> FeedChild;
    fn classify_entry_child(&self, name: &QName) -> EntryChild;
    fn classify_link(&self, rel: &str) -> LinkRelation;

    /// Cardinality hint carried by a link's media type attribute:
    /// `Some(true)` for feed-shaped content, `Some(false)` for entry-shaped.
    fn cardinality_hint(&self, media_type: &str) -> Option<bool>;

    fn feed_name(&self) -> QName;
    fn entry_name(&self) -> QName;
    fn link_name(&self) -> QName;
    fn content_name(&self) -> QName;
    fn properties_name(&self) -> QName;
    fn inline_name(&self) -> QName;
    fn element_name(&self) -> QName;
    fn count_name(&self) -> QName;
    fn annotation_name(&self) -> QName;
    fn property_name(&self, local: &str) -> QName;

    fn type_attr(&self) -> QName;
    fn null_attr(&self) -> QName;
    fn etag_attr(&self) -> QName;
}

/// The ATOM binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomFormat;

impl WireFormat for AtomFormat {
    fn is_feed(&self, name: &QName) -> bool {
        name.is(constants::ATOM_NS, constants::FEED)
    }

    fn is_entry(&self, name: &QName) -> bool {
        name.is(constants::ATOM_NS, constants::ENTRY)
    }

    fn is_inline(&self, name: &QName) -> bool {
        name.is(constants::METADATA_NS, constants::INLINE)
    }

    fn classify_feed_child(&self, name: &QName) -> FeedChild {
        if name.namespace == constants::ATOM_NS {
            match name.local.as_ref() {
                constants::ENTRY => FeedChild::Entry,
                constants::ID => FeedChild::Id,
                constants::LINK => FeedChild::Link,
                constants::TITLE => FeedChild::Title,
                constants::SUBTITLE => FeedChild::Subtitle,
                constants::UPDATED => FeedChild::Updated,
                constants::AUTHOR => FeedChild::Author,
                constants::GENERATOR => FeedChild::Generator,
                _ => FeedChild::Unknown,
            }
        } else if name.is(constants::METADATA_NS, constants::COUNT) {
            FeedChild::Count
        } else {
            FeedChild::Unknown
        }
    }

    fn classify_entry_child(&self, name: &QName) -> EntryChild {
        if name.namespace == constants::ATOM_NS {
            match name.local.as_ref() {
                constants::ID => EntryChild::Id,
                constants::CATEGORY => EntryChild::Category,
                constants::LINK => EntryChild::Link,
                constants::CONTENT => EntryChild::Content,
                constants::TITLE => EntryChild::Title,
                constants::SUMMARY => EntryChild::Summary,
                constants::UPDATED => EntryChild::Updated,
                constants::AUTHOR => EntryChild::Author,
                _ => EntryChild::Unknown,
            }
        } else if name.is(constants::METADATA_NS, constants::PROPERTIES) {
            EntryChild::Properties
        } else {
            EntryChild::Unknown
        }
    }

    fn classify_link(&self, rel: &str) -> LinkRelation {
        if let Some(name) = rel.strip_prefix(constants::RELATED_REL_PREFIX) {
            return LinkRelation::Navigation(name.to_string());
        }
        if let Some(name) = rel.strip_prefix(constants::RELATED_LINKS_REL_PREFIX) {
            return LinkRelation::Association(name.to_string());
        }
        match rel {
            constants::SELF_REL => LinkRelation::SelfLink,
            constants::EDIT_REL => LinkRelation::Edit,
            constants::EDIT_MEDIA_REL => LinkRelation::EditMedia,
            constants::NEXT_REL => LinkRelation::Next,
            constants::DELTA_REL => LinkRelation::Delta,
            _ => LinkRelation::Other,
        }
    }

    fn cardinality_hint(&self, media_type: &str) -> Option<bool> {
        match media_type {
            constants::FEED_CONTENT_TYPE => Some(true),
            constants::ENTRY_CONTENT_TYPE => Some(false),
            _ => None,
        }
    }

    fn feed_name(&self) -> QName {
        QName::borrowed(constants::ATOM_NS, constants::FEED)
    }

    fn entry_name(&self) -> QName {
        QName::borrowed(constants::ATOM_NS, constants::ENTRY)
    }

    fn link_name(&self) -> QName {
        QName::borrowed(constants::ATOM_NS, constants::LINK)
    }

    fn content_name(&self) -> QName {
        QName::borrowed(constants::ATOM_NS, constants::CONTENT)
    }

    fn properties_name(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::PROPERTIES)
    }

    fn inline_name(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::INLINE)
    }

    fn element_name(&self) -> QName {
        QName::borrowed(constants::DATA_NS, constants::ELEMENT)
    }

    fn count_name(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::COUNT)
    }

    fn annotation_name(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::ANNOTATION)
    }

    fn property_name(&self, local: &str) -> QName {
        QName::new(constants::DATA_NS, local.to_string())
    }

    fn type_attr(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::TYPE)
    }

    fn null_attr(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::NULL)
    }

    fn etag_attr(&self) -> QName {
        QName::borrowed(constants::METADATA_NS, constants::ETAG)
    }
}

/// Value of the attribute with the given qualified name.
pub(crate) fn attr<'a>(attributes: &'a [Attribute], name: &QName) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| &a.name == name)
        .map(|a| a.value.as_str())
}

/// Value of the unqualified attribute with the given local name.
pub(crate) fn plain_attr<'a>(attributes: &'a [Attribute], local: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.is("", local))
        .map(|a| a.value.as_str())
}
