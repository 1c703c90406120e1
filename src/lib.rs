//! Herein lies the read/write engine for OData resource payloads.
//!
//! The crate converts a wire-format token stream into a hierarchical
//! resource graph (feeds, entries, navigation links, properties, values)
//! and back, enforcing schema conformance, structural well-formedness and
//! resource-consumption limits.
//!
//! Use [PayloadReader][PayloadReader] to pull payload nodes from a token
//! stream, and [PayloadWriter][PayloadWriter] to serialize a resource graph.
//! The lexical layer is abstract: both sides run over the [`TokenRead`] /
//! [`TokenWrite`] cursor contract, with [`TokenBuffer`] as the in-memory
//! implementation. Token shapes come from a [`WireFormat`] binding;
//! [`AtomFormat`] is the shipped one.

pub mod atom;
pub mod constants;
#[cfg(feature = "reader")]
mod dedup;
mod error;
mod format;
mod options;
mod payload;
#[cfg(feature = "reader")]
mod reader;
mod schema;
#[cfg(feature = "reader")]
mod scope;
mod token;
mod value;
#[cfg(feature = "writer")]
mod writer;

pub use error::{Error, Result};
pub use format::{AtomFormat, EntryChild, FeedChild, LinkRelation, WireFormat};
pub use options::{CodecOptions, FormatBehavior, MessageKind};
pub use payload::{EntityReferenceLink, Entry, Feed, NavigationLink, PayloadNode};
#[cfg(feature = "reader")]
pub use reader::PayloadReader;
pub use schema::{
    collection_item_type_name, collection_type_name, ComplexType, EntityType, EnumType, Model,
    NavigationProperty, PrimitiveKind, PropertyType, SchemaProvider, StructuralProperty,
};
#[cfg(feature = "reader")]
pub use scope::ReaderState;
pub use token::{Attribute, QName, Token, TokenBuffer, TokenRead, TokenWrite};
pub use value::{
    CollectionValue, ComplexValue, EnumValue, InstanceAnnotation, PrimitiveValue, Property,
    StreamValue, Value,
};
#[cfg(feature = "writer")]
pub use writer::PayloadWriter;
