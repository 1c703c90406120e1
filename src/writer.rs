//! Payload writer and the recursive value/property serializer.
//!
//! The writer mirrors the reader's scope discipline: feed, entry and
//! navigation-link starts and ends must nest the same way the reader
//! surfaces them. Value serialization is a depth-guarded recursive descent.
//! Every element start is two-phase: all facts needed for the opening tag
//! are computed before the first token is emitted, keeping emission
//! single-pass with no buffering. A writer that has reported an error must
//! not be driven further.

use std::collections::HashSet;

use crate::atom::{AtomPerson, EntryMetadata, FeedMetadata, TextConstruct};
use crate::constants;
use crate::dedup::DuplicateTracker;
use crate::error::{Error, Result};
use crate::format::{AtomFormat, WireFormat};
use crate::options::{CodecOptions, FormatBehavior, MessageKind};
use crate::payload::{EntityReferenceLink, Entry, Feed, NavigationLink};
use crate::schema::{
    collection_item_type_name, NavigationProperty, PrimitiveKind, PropertyType, SchemaProvider,
};
use crate::token::{QName, TokenWrite};
use crate::value::{
    CollectionValue, ComplexValue, EnumValue, InstanceAnnotation, Property, Value,
};

/// Owning type context for property validation.
#[derive(Clone, Copy)]
enum Owner<'a> {
    None,
    Entity(&'a str),
    Complex(&'a str),
}

/// Content discovered so far under an open navigation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkContent {
    None,
    Expanded,
    References,
}

enum WriterScope {
    Feed {
        next_link: Option<String>,
        delta_link: Option<String>,
    },
    Entry {
        tracker: DuplicateTracker,
        type_name: Option<String>,
    },
    Link {
        link: NavigationLink,
        property: Option<NavigationProperty>,
        content: LinkContent,
    },
}

/// Writer for payload token streams.
pub struct PayloadWriter<'m, C, F = AtomFormat> {
    cursor: C,
    format: F,
    schema: Option<&'m dyn SchemaProvider>,
    options: CodecOptions,
    message: MessageKind,
    scopes: Vec<WriterScope>,
    /// Shared recursion counter for complex and collection values.
    depth: usize,
    root_written: bool,
}

impl<'m, C: TokenWrite> PayloadWriter<'m, C> {
    pub fn new(cursor: C) -> Self {
        PayloadWriter {
            cursor,
            format: AtomFormat,
            schema: None,
            options: CodecOptions::default(),
            message: MessageKind::default(),
            scopes: Vec::new(),
            depth: 0,
            root_written: false,
        }
    }
}

impl<'m, C: TokenWrite, F: WireFormat> PayloadWriter<'m, C, F> {
    pub fn with_schema(mut self, schema: &'m dyn SchemaProvider) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_message(mut self, message: MessageKind) -> Self {
        self.message = message;
        self
    }

    pub fn with_format<G: WireFormat>(self, format: G) -> PayloadWriter<'m, C, G> {
        PayloadWriter {
            cursor: self.cursor,
            format,
            schema: self.schema,
            options: self.options,
            message: self.message,
            scopes: self.scopes,
            depth: self.depth,
            root_written: self.root_written,
        }
    }

    /// Finish writing and hand the cursor back. All scopes must be closed.
    pub fn finish(self) -> Result<C> {
        if !self.scopes.is_empty() {
            return Err(Error::UnexpectedWrite("finish"));
        }
        Ok(self.cursor)
    }

    // ========================================================================
    // Feed and entry envelopes
    // ========================================================================

    pub fn start_feed(&mut self, feed: &Feed) -> Result<()> {
        let in_link = match self.scopes.last() {
            None => {
                if self.root_written {
                    return Err(Error::UnexpectedWrite("feed"));
                }
                false
            }
            Some(WriterScope::Link { .. }) => true,
            Some(_) => return Err(Error::UnexpectedWrite("feed")),
        };
        let at_root = !in_link;
        if in_link {
            self.open_link_for_expansion(true)?;
        }

        self.cursor.start_element(&self.format.feed_name())?;
        if at_root {
            self.root_written = true;
            self.write_root_namespace(constants::ATOM_NS)?;
        }
        if let Some(id) = &feed.id {
            self.write_text_element(&atom_name(constants::ID), id)?;
        }
        if let Some(count) = feed.count {
            self.write_text_element(&self.format.count_name(), &count.to_string())?;
        }
        if let Some(metadata) = &feed.metadata {
            self.write_feed_metadata(metadata)?;
        }
        tracing::debug!(id = feed.id.as_deref().unwrap_or(""), "feed started");
        self.scopes.push(WriterScope::Feed {
            next_link: feed.next_link.clone(),
            delta_link: feed.delta_link.clone(),
        });
        Ok(())
    }

    pub fn start_entry(&mut self, entry: &Entry) -> Result<()> {
        let (at_root, in_link) = match self.scopes.last() {
            None => {
                if self.root_written {
                    return Err(Error::UnexpectedWrite("entry"));
                }
                (true, false)
            }
            Some(WriterScope::Feed { .. }) => (false, false),
            Some(WriterScope::Link { .. }) => (false, true),
            Some(WriterScope::Entry { .. }) => return Err(Error::UnexpectedWrite("entry")),
        };
        if in_link {
            self.open_link_for_expansion(false)?;
        }

        self.validate_entry(entry)?;

        self.cursor.start_element(&self.format.entry_name())?;
        if at_root {
            self.root_written = true;
            self.write_root_namespace(constants::ATOM_NS)?;
        }
        if let Some(etag) = &entry.etag {
            self.cursor.attribute(&self.format.etag_attr(), etag)?;
        }
        if let Some(id) = &entry.id {
            self.write_text_element(&atom_name(constants::ID), id)?;
        }
        if let Some(type_name) = &entry.type_name {
            self.cursor.start_element(&atom_name(constants::CATEGORY))?;
            self.cursor
                .attribute(&plain_name(constants::SCHEME), constants::TYPE_SCHEME)?;
            self.cursor.attribute(&plain_name(constants::TERM), type_name)?;
            self.cursor.end_element()?;
        }
        if let Some(read_link) = &entry.read_link {
            self.write_simple_link(constants::SELF_REL, read_link, None)?;
        }
        if let Some(edit_link) = &entry.edit_link {
            self.write_simple_link(constants::EDIT_REL, edit_link, None)?;
        }
        if let Some(metadata) = &entry.metadata {
            self.write_entry_metadata(metadata)?;
        }

        let mut tracker = DuplicateTracker::new();
        self.write_entry_content(entry, &mut tracker)?;

        tracing::debug!(id = entry.id.as_deref().unwrap_or(""), "entry started");
        self.scopes.push(WriterScope::Entry {
            tracker,
            type_name: entry.type_name.clone(),
        });
        Ok(())
    }

    /// Close the innermost open feed, entry or navigation link.
    pub fn end(&mut self) -> Result<()> {
        match self.scopes.pop() {
            None => Err(Error::UnexpectedWrite("end")),
            Some(WriterScope::Feed {
                next_link,
                delta_link,
            }) => {
                // Paging links trail the entries.
                if let Some(next) = next_link {
                    self.write_simple_link(constants::NEXT_REL, &next, None)?;
                }
                if let Some(delta) = delta_link {
                    self.write_simple_link(constants::DELTA_REL, &delta, None)?;
                }
                self.cursor.end_element()
            }
            Some(WriterScope::Entry { .. }) => self.cursor.end_element(),
            Some(WriterScope::Link { link, content, .. }) => match content {
                LinkContent::None => self.write_deferred_link(&link),
                LinkContent::Expanded => {
                    self.cursor.end_element()?;
                    self.cursor.end_element()
                }
                LinkContent::References => Ok(()),
            },
        }
    }

    // ========================================================================
    // Navigation links
    // ========================================================================

    /// Open a navigation link. Nothing is emitted until the link's content
    /// is known: a following entry/feed start makes it expanded, reference
    /// links make it a binding, and a bare end makes it deferred.
    pub fn start_navigation_link(&mut self, link: &NavigationLink) -> Result<()> {
        if link.url.is_some() && link.association_url.is_some() {
            return Err(Error::DuplicateName(link.name.clone()));
        }
        let schema = self.schema;
        let report_undeclared = self.options.report_undeclared_link_properties;
        let (tracker, entry_type) = match self.scopes.last_mut() {
            Some(WriterScope::Entry { tracker, type_name }) => (tracker, type_name.clone()),
            _ => return Err(Error::UnexpectedWrite("navigation link")),
        };
        tracker.check(&link.name)?;

        let mut property = None;
        if let (Some(schema), Some(type_name)) = (schema, entry_type.as_deref()) {
            if let Some(ty) = schema.entity_type(type_name) {
                match schema.entity_navigation(type_name, &link.name) {
                    Some(p) => property = Some(p.clone()),
                    None if ty.open || report_undeclared => {}
                    None => {
                        return Err(Error::UndeclaredLink {
                            link: link.name.clone(),
                            type_name: type_name.to_string(),
                        });
                    }
                }
            }
        }

        self.scopes.push(WriterScope::Link {
            link: link.clone(),
            property,
            content: LinkContent::None,
        });
        Ok(())
    }

    /// Write an entity reference link under the open navigation link.
    /// Request payloads only; several may be written under one link.
    pub fn entity_reference_link(&mut self, reference: &EntityReferenceLink) -> Result<()> {
        if self.message != MessageKind::Request {
            return Err(Error::ReferenceLinkInResponse);
        }
        let (rel, name) = match self.scopes.last_mut() {
            Some(WriterScope::Link { link, content, .. }) => {
                if *content == LinkContent::Expanded {
                    return Err(Error::MixedLinkContent(link.name.clone()));
                }
                *content = LinkContent::References;
                (constants::navigation_rel(&link.name), link.name.clone())
            }
            _ => return Err(Error::UnexpectedWrite("entity reference link")),
        };
        tracing::debug!(link = name.as_str(), "entity reference link");
        self.cursor.start_element(&atom_name(constants::LINK))?;
        self.cursor.attribute(&plain_name(constants::REL), &rel)?;
        self.cursor
            .attribute(&plain_name(constants::HREF), &reference.url)?;
        self.cursor.end_element()
    }

    /// Emit the link element and inline wrapper for an expansion, validating
    /// cardinality against the declared navigation property.
    fn open_link_for_expansion(&mut self, collection: bool) -> Result<()> {
        let (link, declared) = match self.scopes.last_mut() {
            Some(WriterScope::Link {
                link,
                property,
                content,
            }) => {
                match *content {
                    LinkContent::None => {}
                    LinkContent::Expanded => {
                        return Err(Error::DuplicateElement(constants::INLINE));
                    }
                    LinkContent::References => {
                        return Err(Error::MixedLinkContent(link.name.clone()));
                    }
                }
                *content = LinkContent::Expanded;
                (
                    link.clone(),
                    property.as_ref().map(|p| p.collection).or(link.is_collection),
                )
            }
            _ => return Err(invariant_violation()),
        };

        if let Some(declared) = declared {
            if declared && !collection {
                return Err(Error::ExpandedEntryInCollectionLink(link.name));
            }
            if !declared && collection {
                return Err(Error::ExpandedFeedInSingleLink(link.name));
            }
        }

        self.write_link_open(&link, Some(collection))?;
        self.cursor.start_element(&self.format.inline_name())
    }

    fn write_deferred_link(&mut self, link: &NavigationLink) -> Result<()> {
        self.write_link_open(link, link.is_collection)?;
        self.cursor.end_element()
    }

    fn write_link_open(&mut self, link: &NavigationLink, collection: Option<bool>) -> Result<()> {
        self.cursor.start_element(&self.format.link_name())?;
        let rel = if link.association_url.is_some() {
            constants::association_rel(&link.name)
        } else {
            constants::navigation_rel(&link.name)
        };
        self.cursor.attribute(&plain_name(constants::REL), &rel)?;
        if let Some(collection) = collection {
            let hint = if collection {
                constants::FEED_CONTENT_TYPE
            } else {
                constants::ENTRY_CONTENT_TYPE
            };
            self.cursor.attribute(&plain_name(constants::TYPE), hint)?;
        }
        if let Some(url) = link.url.as_ref().or(link.association_url.as_ref()) {
            self.cursor.attribute(&plain_name(constants::HREF), url)?;
        }
        Ok(())
    }

    // ========================================================================
    // Entry body
    // ========================================================================

    fn validate_entry(&self, entry: &Entry) -> Result<()> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => return Ok(()),
        };
        let ty = match entry.type_name.as_deref() {
            Some(type_name) => schema
                .entity_type(type_name)
                .ok_or_else(|| Error::InvalidTypeName(type_name.to_string()))?,
            None => return Ok(()),
        };
        if self.options.format_behavior != FormatBehavior::Server {
            if entry.media_resource.is_some() && !ty.has_default_stream {
                return Err(Error::MediaResourceNotAllowed(ty.name.clone()));
            }
            if entry.media_resource.is_none() && ty.has_default_stream {
                return Err(Error::MediaResourceRequired(ty.name.clone()));
            }
        }
        Ok(())
    }

    fn write_entry_content(&mut self, entry: &Entry, tracker: &mut DuplicateTracker) -> Result<()> {
        let owner_name = entry.type_name.clone();
        let owner = match owner_name.as_deref() {
            Some(type_name) => Owner::Entity(type_name),
            None => Owner::None,
        };
        match &entry.media_resource {
            Some(media) => {
                // Media link entry: the content element is the stream, and
                // the structured properties hang directly off the entry.
                if let Some(edit_link) = &media.edit_link {
                    self.write_simple_link(
                        constants::EDIT_MEDIA_REL,
                        edit_link,
                        media.etag.as_deref(),
                    )?;
                }
                self.cursor.start_element(&self.format.content_name())?;
                if let Some(content_type) = &media.content_type {
                    self.cursor
                        .attribute(&plain_name(constants::TYPE), content_type)?;
                }
                self.cursor.attribute(
                    &plain_name(constants::SRC),
                    media.read_link.as_deref().unwrap_or(""),
                )?;
                self.cursor.end_element()?;

                self.cursor.start_element(&self.format.properties_name())?;
                self.write_properties(&entry.properties, owner, tracker)?;
                self.cursor.end_element()
            }
            None => {
                self.cursor.start_element(&self.format.content_name())?;
                self.cursor
                    .attribute(&plain_name(constants::TYPE), constants::XML_CONTENT_TYPE)?;
                self.cursor.start_element(&self.format.properties_name())?;
                self.write_properties(&entry.properties, owner, tracker)?;
                self.cursor.end_element()?;
                self.cursor.end_element()
            }
        }
    }

    // ========================================================================
    // Properties and values
    // ========================================================================

    /// Write a property payload rooted at a single property element.
    pub fn write_top_level_property(&mut self, property: &Property) -> Result<()> {
        if !self.scopes.is_empty() || self.root_written {
            return Err(Error::UnexpectedWrite("top-level property"));
        }
        self.root_written = true;
        let mut tracker = DuplicateTracker::new();
        self.write_property_with_namespace(property, Owner::None, &mut tracker, true)
    }

    fn write_properties(
        &mut self,
        properties: &[Property],
        owner: Owner<'_>,
        tracker: &mut DuplicateTracker,
    ) -> Result<()> {
        for property in properties {
            self.write_property_with_namespace(property, owner, tracker, false)?;
        }
        Ok(())
    }

    fn write_property_with_namespace(
        &mut self,
        property: &Property,
        owner: Owner<'_>,
        tracker: &mut DuplicateTracker,
        root: bool,
    ) -> Result<()> {
        tracker.check(&property.name)?;
        if matches!(property.value, Value::Stream(_)) {
            return Err(Error::UnexpectedStreamValue(property.name.clone()));
        }
        let declared = self.declared_property(owner, &property.name)?;
        let element = self.format.property_name(&property.name);
        self.write_value_element(
            &element,
            &property.name,
            &property.value,
            declared.as_ref(),
            &property.annotations,
            None,
            None,
            root,
        )
    }

    fn declared_property(&self, owner: Owner<'_>, name: &str) -> Result<Option<PropertyType>> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => return Ok(None),
        };
        let (found, open, type_name) = match owner {
            Owner::None => return Ok(None),
            Owner::Entity(type_name) => match schema.entity_type(type_name) {
                None => return Ok(None),
                Some(ty) => (
                    schema.entity_property(type_name, name).map(|p| p.ty.clone()),
                    ty.open,
                    type_name,
                ),
            },
            Owner::Complex(type_name) => match schema.complex_type(type_name) {
                None => return Ok(None),
                Some(ty) => (ty.property(name).map(|p| p.ty.clone()), ty.open, type_name),
            },
        };
        match found {
            Some(ty) => Ok(Some(ty)),
            None if open => Ok(None),
            None => Err(Error::UndeclaredProperty {
                property: name.to_string(),
                type_name: type_name.to_string(),
            }),
        }
    }

    /// Write one value element. The opening-tag facts (type annotation, null
    /// marker) are fully computed before anything is emitted.
    #[allow(clippy::too_many_arguments)]
    fn write_value_element(
        &mut self,
        element: &QName,
        name: &str,
        value: &Value,
        declared: Option<&PropertyType>,
        annotations: &[InstanceAnnotation],
        item_hint: Option<&str>,
        complex_tracker: Option<&mut DuplicateTracker>,
        root: bool,
    ) -> Result<()> {
        match value {
            Value::Stream(_) => Err(Error::UnexpectedStreamValue(name.to_string())),
            Value::Null => {
                if let Some(declared) = declared {
                    if !declared.is_nullable() {
                        return Err(Error::NotNullable(name.to_string()));
                    }
                }
                // Null markers carry a type attribute for declared primitive
                // kinds only, and never in server behavior.
                let type_attr = match declared {
                    Some(PropertyType::Primitive { kind, .. })
                        if *kind != PrimitiveKind::String
                            && self.options.format_behavior != FormatBehavior::Server =>
                    {
                        Some(kind.name().to_string())
                    }
                    _ => None,
                };
                self.cursor.start_element(element)?;
                if root {
                    self.write_root_namespace(constants::DATA_NS)?;
                }
                if let Some(type_attr) = &type_attr {
                    self.cursor.attribute(&self.format.type_attr(), type_attr)?;
                }
                self.cursor.attribute(&self.format.null_attr(), "true")?;
                self.cursor.end_element()
            }
            Value::Primitive(primitive) => {
                let kind = primitive.kind();
                match declared {
                    Some(PropertyType::Primitive {
                        kind: declared_kind,
                        ..
                    }) if *declared_kind != kind => {
                        return Err(Error::TypeMismatch {
                            expected: declared_kind.name().to_string(),
                            actual: kind.name().to_string(),
                        });
                    }
                    Some(other) if !matches!(other, PropertyType::Primitive { .. }) => {
                        return Err(Error::TypeMismatch {
                            expected: other.type_name(),
                            actual: kind.name().to_string(),
                        });
                    }
                    _ => {}
                }
                let declared_name = declared.map(|d| d.type_name());
                let type_attr = resolve_type_attr(
                    Some(kind.name()),
                    declared_name.as_deref(),
                    item_hint,
                    kind == PrimitiveKind::String,
                );
                self.cursor.start_element(element)?;
                if root {
                    self.write_root_namespace(constants::DATA_NS)?;
                }
                if let Some(type_attr) = &type_attr {
                    self.cursor.attribute(&self.format.type_attr(), type_attr)?;
                }
                self.write_annotations(annotations)?;
                self.cursor.text(&primitive.to_wire())
            }
            Value::Enum(value) => self.write_enum_element(
                element,
                name,
                value,
                declared,
                annotations,
                item_hint,
                root,
            ),
            Value::Complex(value) => self.write_complex_element(
                element,
                value,
                declared,
                annotations,
                item_hint,
                complex_tracker,
                root,
            ),
            Value::Collection(value) => self.write_collection_element(
                element,
                name,
                value,
                declared,
                annotations,
                root,
            ),
        }
    }

    fn write_enum_element(
        &mut self,
        element: &QName,
        name: &str,
        value: &EnumValue,
        declared: Option<&PropertyType>,
        annotations: &[InstanceAnnotation],
        item_hint: Option<&str>,
        root: bool,
    ) -> Result<()> {
        let declared_name = match declared {
            Some(PropertyType::Enum {
                name: declared_name,
                ..
            }) => Some(declared_name.as_str()),
            Some(other) => {
                return Err(Error::TypeMismatch {
                    expected: other.type_name(),
                    actual: value
                        .type_name
                        .clone()
                        .unwrap_or_else(|| "enum value".to_string()),
                });
            }
            None => None,
        };
        if let (Some(explicit), Some(declared_name)) = (value.type_name.as_deref(), declared_name) {
            if explicit != declared_name {
                return Err(Error::TypeMismatch {
                    expected: declared_name.to_string(),
                    actual: explicit.to_string(),
                });
            }
        }
        let resolved = value
            .type_name
            .as_deref()
            .or(declared_name)
            .or(item_hint)
            .ok_or_else(|| Error::MissingTypeName(name.to_string()))?;
        if let Some(schema) = self.schema {
            if let Some(ty) = schema.enum_type(resolved) {
                if !ty.has_member(&value.value) {
                    return Err(Error::InvalidEnumMember {
                        type_name: resolved.to_string(),
                        member: value.value.clone(),
                    });
                }
            }
        }
        let type_attr = resolve_type_attr(
            value.type_name.as_deref(),
            declared_name,
            item_hint,
            false,
        );
        self.cursor.start_element(element)?;
        if root {
            self.write_root_namespace(constants::DATA_NS)?;
        }
        if let Some(type_attr) = &type_attr {
            self.cursor.attribute(&self.format.type_attr(), type_attr)?;
        }
        self.write_annotations(annotations)?;
        self.cursor.text(&value.value)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_complex_element(
        &mut self,
        element: &QName,
        value: &ComplexValue,
        declared: Option<&PropertyType>,
        annotations: &[InstanceAnnotation],
        item_hint: Option<&str>,
        tracker: Option<&mut DuplicateTracker>,
        root: bool,
    ) -> Result<()> {
        if self.depth >= self.options.max_nesting_depth {
            return Err(Error::DepthLimitExceeded(self.options.max_nesting_depth));
        }
        self.depth += 1;

        let declared_name = match declared {
            Some(PropertyType::Complex {
                name: declared_name,
                ..
            }) => Some(declared_name.as_str()),
            Some(other) => {
                return Err(Error::TypeMismatch {
                    expected: other.type_name(),
                    actual: value
                        .type_name
                        .clone()
                        .unwrap_or_else(|| "complex value".to_string()),
                });
            }
            None => None,
        };
        if let (Some(explicit), Some(declared_name)) = (value.type_name.as_deref(), declared_name) {
            if explicit != declared_name {
                return Err(Error::TypeMismatch {
                    expected: declared_name.to_string(),
                    actual: explicit.to_string(),
                });
            }
        }
        let resolved = value
            .type_name
            .clone()
            .or_else(|| declared_name.map(str::to_string));
        let type_attr = resolve_type_attr(
            value.type_name.as_deref(),
            declared_name,
            item_hint,
            false,
        );

        let owner = match resolved.as_deref() {
            Some(type_name)
                if self
                    .schema
                    .map(|s| s.complex_type(type_name).is_some())
                    .unwrap_or(false) =>
            {
                Owner::Complex(type_name)
            }
            _ => Owner::None,
        };

        self.cursor.start_element(element)?;
        if root {
            self.write_root_namespace(constants::DATA_NS)?;
        }
        if let Some(type_attr) = &type_attr {
            self.cursor.attribute(&self.format.type_attr(), type_attr)?;
        }
        self.write_annotations(annotations)?;
        match tracker {
            Some(tracker) => self.write_properties(&value.properties, owner, tracker)?,
            None => {
                let mut local = DuplicateTracker::new();
                self.write_properties(&value.properties, owner, &mut local)?;
            }
        }
        self.cursor.end_element()?;

        self.depth -= 1;
        Ok(())
    }

    fn write_collection_element(
        &mut self,
        element: &QName,
        name: &str,
        value: &CollectionValue,
        declared: Option<&PropertyType>,
        annotations: &[InstanceAnnotation],
        root: bool,
    ) -> Result<()> {
        if self.depth >= self.options.max_nesting_depth {
            return Err(Error::DepthLimitExceeded(self.options.max_nesting_depth));
        }
        self.depth += 1;

        let item_declared: Option<&PropertyType> = match declared {
            Some(PropertyType::Collection { item }) => Some(item),
            Some(other) => {
                return Err(Error::TypeMismatch {
                    expected: other.type_name(),
                    actual: value
                        .type_name
                        .clone()
                        .unwrap_or_else(|| "collection value".to_string()),
                });
            }
            None => None,
        };
        let declared_name = declared.map(|d| d.type_name());
        let resolved = value.type_name.clone().or_else(|| declared_name.clone());
        let type_attr = resolve_type_attr(
            value.type_name.as_deref(),
            declared_name.as_deref(),
            None,
            false,
        );
        let item_hint = resolved
            .as_deref()
            .and_then(collection_item_type_name)
            .map(str::to_string);

        self.cursor.start_element(element)?;
        if root {
            self.write_root_namespace(constants::DATA_NS)?;
        }
        if let Some(type_attr) = &type_attr {
            self.cursor.attribute(&self.format.type_attr(), type_attr)?;
        }
        self.write_annotations(annotations)?;

        // Item kinds are restricted; the tracker for complex items is
        // created lazily and cleared, not recreated, between siblings.
        let element_name = self.format.element_name();
        let mut item_tracker: Option<DuplicateTracker> = None;
        for item in &value.items {
            match item {
                Value::Collection(_) => return Err(Error::InvalidCollectionItem),
                Value::Stream(_) => {
                    return Err(Error::UnexpectedStreamValue(name.to_string()));
                }
                Value::Complex(_) => {
                    let tracker = item_tracker.get_or_insert_with(DuplicateTracker::new);
                    tracker.clear();
                }
                _ => {}
            }
            self.write_value_element(
                &element_name,
                name,
                item,
                item_declared,
                &[],
                item_hint.as_deref(),
                item_tracker.as_mut().filter(|_| matches!(item, Value::Complex(_))),
                false,
            )?;
        }
        self.cursor.end_element()?;

        self.depth -= 1;
        Ok(())
    }

    // ========================================================================
    // Instance annotations
    // ========================================================================

    fn write_annotations(&mut self, annotations: &[InstanceAnnotation]) -> Result<()> {
        if annotations.is_empty() || !self.options.include_annotations {
            return Ok(());
        }
        let mut terms = HashSet::new();
        for annotation in annotations {
            if !terms.insert(annotation.term.as_str()) {
                return Err(Error::DuplicateAnnotation(annotation.term.clone()));
            }
            self.write_annotation(annotation)?;
        }
        Ok(())
    }

    fn write_annotation(&mut self, annotation: &InstanceAnnotation) -> Result<()> {
        let name = self.format.annotation_name();
        self.cursor.start_element(&name)?;
        self.cursor
            .attribute(&plain_name(constants::ANNOTATION_TERM), &annotation.term)?;
        match &annotation.value {
            Value::Null => {
                self.cursor.attribute(&self.format.null_attr(), "true")?;
            }
            // Attribute value notation is preferred for the kinds that
            // support it.
            Value::Primitive(primitive) => match notation_attr(primitive.kind()) {
                Some(attr_name) => {
                    self.cursor
                        .attribute(&plain_name(attr_name), &primitive.to_wire())?;
                }
                None => {
                    self.cursor
                        .attribute(&self.format.type_attr(), primitive.kind().name())?;
                    self.cursor.text(&primitive.to_wire())?;
                }
            },
            Value::Enum(value) => {
                if let Some(type_name) = &value.type_name {
                    self.cursor.attribute(&self.format.type_attr(), type_name)?;
                }
                self.cursor.text(&value.value)?;
            }
            Value::Complex(value) => {
                if self.depth >= self.options.max_nesting_depth {
                    return Err(Error::DepthLimitExceeded(self.options.max_nesting_depth));
                }
                self.depth += 1;
                if let Some(type_name) = &value.type_name {
                    self.cursor.attribute(&self.format.type_attr(), type_name)?;
                }
                let mut tracker = DuplicateTracker::new();
                self.write_properties(&value.properties, Owner::None, &mut tracker)?;
                self.depth -= 1;
            }
            // Collections keep the general element-content path.
            Value::Collection(value) => {
                self.write_collection_annotation_body(value)?;
            }
            Value::Stream(_) => {
                return Err(Error::UnexpectedStreamValue(annotation.term.clone()));
            }
        }
        self.cursor.end_element()
    }

    fn write_collection_annotation_body(&mut self, value: &CollectionValue) -> Result<()> {
        if self.depth >= self.options.max_nesting_depth {
            return Err(Error::DepthLimitExceeded(self.options.max_nesting_depth));
        }
        self.depth += 1;
        if let Some(type_name) = &value.type_name {
            self.cursor.attribute(&self.format.type_attr(), type_name)?;
        }
        let element_name = self.format.element_name();
        let item_hint = value
            .type_name
            .as_deref()
            .and_then(collection_item_type_name)
            .map(str::to_string);
        for item in &value.items {
            match item {
                Value::Collection(_) => return Err(Error::InvalidCollectionItem),
                Value::Stream(_) => {
                    return Err(Error::UnexpectedStreamValue("annotation".to_string()))
                }
                _ => {}
            }
            self.write_value_element(
                &element_name,
                "annotation",
                item,
                None,
                &[],
                item_hint.as_deref(),
                None,
                false,
            )?;
        }
        self.depth -= 1;
        Ok(())
    }

    // ========================================================================
    // Envelope helpers
    // ========================================================================

    fn write_root_namespace(&mut self, namespace: &str) -> Result<()> {
        if self.options.always_use_default_namespace_for_root {
            self.cursor
                .attribute(&plain_name(constants::XMLNS), namespace)?;
        }
        Ok(())
    }

    fn write_text_element(&mut self, name: &QName, text: &str) -> Result<()> {
        self.cursor.start_element(name)?;
        self.cursor.text(text)?;
        self.cursor.end_element()
    }

    fn write_simple_link(&mut self, rel: &str, href: &str, etag: Option<&str>) -> Result<()> {
        self.cursor.start_element(&atom_name(constants::LINK))?;
        self.cursor.attribute(&plain_name(constants::REL), rel)?;
        self.cursor.attribute(&plain_name(constants::HREF), href)?;
        if let Some(etag) = etag {
            self.cursor.attribute(&self.format.etag_attr(), etag)?;
        }
        self.cursor.end_element()
    }

    fn write_text_construct(&mut self, name: &QName, construct: &TextConstruct) -> Result<()> {
        self.cursor.start_element(name)?;
        self.cursor
            .attribute(&plain_name(constants::TYPE), construct.kind.as_str())?;
        self.cursor.text(&construct.text)?;
        self.cursor.end_element()
    }

    fn write_person(&mut self, person: &AtomPerson) -> Result<()> {
        self.cursor.start_element(&atom_name(constants::AUTHOR))?;
        self.write_text_element(&atom_name(constants::NAME), &person.name)?;
        if let Some(uri) = &person.uri {
            self.write_text_element(&atom_name(constants::URI), uri)?;
        }
        if let Some(email) = &person.email {
            self.write_text_element(&atom_name(constants::EMAIL), email)?;
        }
        self.cursor.end_element()
    }

    fn write_feed_metadata(&mut self, metadata: &FeedMetadata) -> Result<()> {
        if let Some(title) = &metadata.title {
            self.write_text_construct(&atom_name(constants::TITLE), title)?;
        }
        if let Some(subtitle) = &metadata.subtitle {
            self.write_text_construct(&atom_name(constants::SUBTITLE), subtitle)?;
        }
        if let Some(updated) = &metadata.updated {
            self.write_text_element(&atom_name(constants::UPDATED), updated)?;
        }
        for author in &metadata.authors {
            self.write_person(author)?;
        }
        if let Some(generator) = &metadata.generator {
            self.cursor.start_element(&atom_name(constants::GENERATOR))?;
            if let Some(uri) = &generator.uri {
                self.cursor.attribute(&plain_name(constants::URI), uri)?;
            }
            if let Some(version) = &generator.version {
                self.cursor
                    .attribute(&plain_name(constants::VERSION), version)?;
            }
            if let Some(name) = &generator.name {
                self.cursor.text(name)?;
            }
            self.cursor.end_element()?;
        }
        if let Some(self_link) = &metadata.self_link {
            self.write_simple_link(constants::SELF_REL, self_link, None)?;
        }
        Ok(())
    }

    fn write_entry_metadata(&mut self, metadata: &EntryMetadata) -> Result<()> {
        if let Some(title) = &metadata.title {
            self.write_text_construct(&atom_name(constants::TITLE), title)?;
        }
        if let Some(summary) = &metadata.summary {
            self.write_text_construct(&atom_name(constants::SUMMARY), summary)?;
        }
        if let Some(updated) = &metadata.updated {
            self.write_text_element(&atom_name(constants::UPDATED), updated)?;
        }
        for author in &metadata.authors {
            self.write_person(author)?;
        }
        for category in &metadata.categories {
            self.cursor.start_element(&atom_name(constants::CATEGORY))?;
            self.cursor
                .attribute(&plain_name(constants::TERM), &category.term)?;
            if let Some(scheme) = &category.scheme {
                self.cursor.attribute(&plain_name(constants::SCHEME), scheme)?;
            }
            if let Some(label) = &category.label {
                self.cursor.attribute(&plain_name(constants::LABEL), label)?;
            }
            self.cursor.end_element()?;
        }
        Ok(())
    }
}

fn atom_name(local: &'static str) -> QName {
    QName::borrowed(constants::ATOM_NS, local)
}

fn plain_name(local: &'static str) -> QName {
    QName::new("", local)
}

/// Pick the type name to annotate, or none: an explicit override wins, then
/// the declared type, then the collection item hint; nothing is written for
/// the wire default type or a name already pinned by the expectation.
fn resolve_type_attr(
    explicit: Option<&str>,
    declared: Option<&str>,
    item_hint: Option<&str>,
    is_default_type: bool,
) -> Option<String> {
    let candidate = explicit.or(declared).or(item_hint)?;
    if is_default_type || declared == Some(candidate) || item_hint == Some(candidate) {
        None
    } else {
        Some(candidate.to_string())
    }
}

/// Attribute name for the compact value notation, for kinds that allow it.
fn notation_attr(kind: PrimitiveKind) -> Option<&'static str> {
    match kind {
        PrimitiveKind::String => Some(constants::ANNOTATION_STRING),
        PrimitiveKind::Boolean => Some(constants::ANNOTATION_BOOL),
        PrimitiveKind::Int16 | PrimitiveKind::Int32 | PrimitiveKind::Int64 => {
            Some(constants::ANNOTATION_INT)
        }
        PrimitiveKind::Single | PrimitiveKind::Double => Some(constants::ANNOTATION_FLOAT),
        PrimitiveKind::Decimal => Some(constants::ANNOTATION_DECIMAL),
        _ => None,
    }
}

fn invariant_violation() -> Error {
    debug_assert!(false, "writer scope stack does not match the requested write");
    Error::Unusable
}
