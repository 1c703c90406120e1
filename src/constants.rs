//! Well-known wire names for the ATOM payload binding.
//!
//! These constants define the namespaces, element names, attribute names and
//! link relations used by the ATOM binding. They are the single source of
//! truth for token shapes; nothing in here is mutable state.

/// The ATOM syndication namespace.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Namespace for data-service property elements.
pub const DATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";

/// Namespace for metadata elements and attributes (`m:`).
pub const METADATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";

/// Category scheme identifying the entity type of an entry.
pub const TYPE_SCHEME: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/scheme";

/// Prefix for navigation link relations.
pub const RELATED_REL_PREFIX: &str =
    "http://schemas.microsoft.com/ado/2007/08/dataservices/related/";

/// Prefix for association link relations.
pub const RELATED_LINKS_REL_PREFIX: &str =
    "http://schemas.microsoft.com/ado/2007/08/dataservices/relatedlinks/";

// ATOM element names
pub const FEED: &str = "feed";
pub const ENTRY: &str = "entry";
pub const ID: &str = "id";
pub const TITLE: &str = "title";
pub const SUBTITLE: &str = "subtitle";
pub const SUMMARY: &str = "summary";
pub const UPDATED: &str = "updated";
pub const AUTHOR: &str = "author";
pub const NAME: &str = "name";
pub const URI: &str = "uri";
pub const EMAIL: &str = "email";
pub const GENERATOR: &str = "generator";
pub const CATEGORY: &str = "category";
pub const LINK: &str = "link";
pub const CONTENT: &str = "content";

// Service document element names (app namespace folded into ATOM here; the
// binding emits service documents in the ATOM namespace).
pub const SERVICE: &str = "service";
pub const WORKSPACE: &str = "workspace";
pub const COLLECTION: &str = "collection";

// Metadata-namespace element names
pub const PROPERTIES: &str = "properties";
pub const INLINE: &str = "inline";
pub const COUNT: &str = "count";
pub const ANNOTATION: &str = "annotation";

// Collection item element name (data namespace)
pub const ELEMENT: &str = "element";

// Attribute names
pub const REL: &str = "rel";
pub const HREF: &str = "href";
pub const SRC: &str = "src";
pub const TERM: &str = "term";
pub const SCHEME: &str = "scheme";
pub const LABEL: &str = "label";
pub const TYPE: &str = "type";
pub const ETAG: &str = "etag";
pub const NULL: &str = "null";
pub const VERSION: &str = "version";
pub const XMLNS: &str = "xmlns";

// Annotation attributes and value-notation attribute names
pub const ANNOTATION_TERM: &str = "term";
pub const ANNOTATION_STRING: &str = "string";
pub const ANNOTATION_BOOL: &str = "bool";
pub const ANNOTATION_INT: &str = "int";
pub const ANNOTATION_FLOAT: &str = "float";
pub const ANNOTATION_DECIMAL: &str = "decimal";

// Simple link relations
pub const SELF_REL: &str = "self";
pub const EDIT_REL: &str = "edit";
pub const EDIT_MEDIA_REL: &str = "edit-media";
pub const NEXT_REL: &str = "next";
pub const DELTA_REL: &str = "delta";

// Media type hints carried on navigation links
pub const FEED_CONTENT_TYPE: &str = "application/atom+xml;type=feed";
pub const ENTRY_CONTENT_TYPE: &str = "application/atom+xml;type=entry";

/// Default media type written on non-media entry content elements.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Relation for a navigation link with the given property name.
pub fn navigation_rel(name: &str) -> String {
    format!("{}{}", RELATED_REL_PREFIX, name)
}

/// Relation for an association link with the given property name.
pub fn association_rel(name: &str) -> String {
    format!("{}{}", RELATED_LINKS_REL_PREFIX, name)
}
