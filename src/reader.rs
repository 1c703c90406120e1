//! Pull-based payload reader state machine.
//!
//! The reader walks the token stream one state transition per
//! [`PayloadReader::read_next`] call, driving an explicit scope stack with
//! one frame per open feed, entry or navigation link. It is single-pass and
//! forward-only; the only lookahead is stopping on (without consuming) the
//! token that opens the next nested construct. A reader that has reported
//! an error is not reusable.

use std::collections::HashSet;

use crate::atom::{AtomCategory, AtomGenerator, AtomPerson, TextConstruct, TextKind};
use crate::constants;
use crate::dedup::DuplicateTracker;
use crate::error::{Error, Result};
use crate::format::{attr, plain_attr, AtomFormat, EntryChild, FeedChild, LinkRelation, WireFormat};
use crate::options::{CodecOptions, FormatBehavior, MessageKind};
use crate::payload::{EntityReferenceLink, Entry, Feed, NavigationLink, PayloadNode};
use crate::schema::{
    collection_item_type_name, PrimitiveKind, PropertyType, SchemaProvider,
};
use crate::scope::{
    EntryScope, FeedScope, LinkScope, NavigationLinkDescriptor, ReaderState, Scope,
};
use crate::token::{Attribute, Token, TokenRead};
use crate::value::{
    CollectionValue, ComplexValue, EnumValue, InstanceAnnotation, PrimitiveValue, Property,
    StreamValue, Value,
};

/// Owning type context for property lookups.
#[derive(Clone, Copy)]
enum Owner<'a> {
    None,
    Entity(&'a str),
    Complex(&'a str),
}

/// Result of a declared-property lookup.
enum Declared {
    Type(PropertyType),
    Dynamic,
    UndeclaredClosed(String),
}

/// Interpretation of a property element, decided from the wire type
/// annotation and the declared type before any content is consumed.
enum Shape {
    Primitive(PrimitiveKind),
    Enum(String),
    Complex(Option<String>),
    Collection {
        type_name: Option<String>,
        item_wire: Option<String>,
    },
    /// No type information; decided by the first content token.
    Undecided(Option<String>),
}

enum FeedScan {
    Entry,
    End,
}

enum LinkOutcome {
    ExpandedFeed { expected: Option<String> },
    ExpandedEntry { expected: Option<String> },
    SyntheticEmptyFeed { expected: Option<String> },
    Deferred,
}

/// Pull reader over a payload token stream.
///
/// Produces a lazy, finite, forward-only sequence of payload nodes; it is
/// not restartable.
pub struct PayloadReader<'m, C, F = AtomFormat> {
    cursor: C,
    format: F,
    schema: Option<&'m dyn SchemaProvider>,
    options: CodecOptions,
    message: MessageKind,
    reading_feed: bool,
    expected_type: Option<String>,
    state: ReaderState,
    scopes: Vec<Scope>,
    reference_link: Option<EntityReferenceLink>,
    failed: bool,
}

impl<'m, C: TokenRead> PayloadReader<'m, C> {
    /// Reader for a feed-rooted payload.
    pub fn for_feed(cursor: C) -> Self {
        Self::with_mode(cursor, true)
    }

    /// Reader for an entry-rooted payload.
    pub fn for_entry(cursor: C) -> Self {
        Self::with_mode(cursor, false)
    }

    fn with_mode(cursor: C, reading_feed: bool) -> Self {
        PayloadReader {
            cursor,
            format: AtomFormat,
            schema: None,
            options: CodecOptions::default(),
            message: MessageKind::default(),
            reading_feed,
            expected_type: None,
            state: ReaderState::Start,
            scopes: Vec::new(),
            reference_link: None,
            failed: false,
        }
    }
}

impl<'m, C: TokenRead, F: WireFormat> PayloadReader<'m, C, F> {
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

    /// Entity type the root feed's entries or the root entry must have.
    pub fn with_expected_type(mut self, type_name: impl Into<String>) -> Self {
        self.expected_type = Some(type_name.into());
        self
    }

    pub fn with_format<G: WireFormat>(self, format: G) -> PayloadReader<'m, C, G> {
        PayloadReader {
            cursor: self.cursor,
            format,
            schema: self.schema,
            options: self.options,
            message: self.message,
            reading_feed: self.reading_feed,
            expected_type: self.expected_type,
            state: self.state,
            scopes: self.scopes,
            reference_link: self.reference_link,
            failed: self.failed,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// The payload node at the current state, if the state carries one.
    pub fn node(&self) -> Option<PayloadNode<'_>> {
        match self.state {
            ReaderState::FeedStart | ReaderState::FeedEnd => self
                .scopes
                .last()?
                .as_feed()
                .map(|scope| PayloadNode::Feed(&scope.feed)),
            ReaderState::EntryStart | ReaderState::EntryEnd => self
                .scopes
                .last()?
                .as_entry()
                .map(|scope| PayloadNode::Entry(&scope.entry)),
            ReaderState::NavigationLinkStart | ReaderState::NavigationLinkEnd => self
                .scopes
                .last()?
                .as_link()
                .map(|scope| PayloadNode::NavigationLink(&scope.descriptor.link)),
            ReaderState::EntityReferenceLink => self
                .reference_link
                .as_ref()
                .map(PayloadNode::EntityReferenceLink),
            _ => None,
        }
    }

    pub fn feed(&self) -> Option<&Feed> {
        self.node()?.as_feed()
    }

    pub fn entry(&self) -> Option<&Entry> {
        self.node()?.as_entry()
    }

    pub fn navigation_link(&self) -> Option<&NavigationLink> {
        self.node()?.as_navigation_link()
    }

    pub fn entity_reference_link(&self) -> Option<&EntityReferenceLink> {
        self.node()?.as_entity_reference_link()
    }

    /// Advance to the next state. Returns `false` once the payload has been
    /// fully consumed.
    pub fn read_next(&mut self) -> Result<bool> {
        if self.failed {
            return Err(Error::Unusable);
        }
        if self.state == ReaderState::Completed {
            return Ok(false);
        }
        match self.advance_state() {
            Ok(()) => {
                tracing::debug!(state = ?self.state, "reader advanced");
                Ok(self.state != ReaderState::Completed)
            }
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    fn advance_state(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Start => self.read_payload_start(),
            ReaderState::FeedStart => self.read_at_feed_start(),
            ReaderState::FeedEnd => self.read_at_feed_end(),
            ReaderState::EntryStart => self.after_entry_scan(),
            ReaderState::EntryEnd => self.read_at_entry_end(),
            ReaderState::NavigationLinkStart => self.read_at_link_start(),
            ReaderState::NavigationLinkEnd => self.read_at_link_end(),
            ReaderState::EntityReferenceLink => {
                self.reference_link = None;
                self.state = ReaderState::NavigationLinkEnd;
                Ok(())
            }
            ReaderState::Completed => Ok(()),
        }
    }

    // ========================================================================
    // State handlers
    // ========================================================================

    fn read_payload_start(&mut self) -> Result<()> {
        if self.reading_feed {
            let empty = match self.cursor.token() {
                Token::Start { name, empty, .. } if self.format.is_feed(name) => *empty,
                token => return Err(unexpected("feed element", token)),
            };
            let expected = self.expected_type.clone();
            self.scopes.push(Scope::Feed(FeedScope::new(empty, expected)));
            self.state = ReaderState::FeedStart;
            Ok(())
        } else {
            let expected = self.expected_type.clone();
            self.begin_entry(expected)
        }
    }

    fn read_at_feed_start(&mut self) -> Result<()> {
        let (synthetic, empty) = match self.scopes.last() {
            Some(Scope::Feed(scope)) => (scope.synthetic_empty, scope.element_empty),
            _ => return Err(invariant_violation()),
        };
        if synthetic {
            return self.enter_feed_end();
        }
        self.cursor.advance()?;
        if empty {
            // The matching end token is already current.
            return self.enter_feed_end();
        }
        self.resume_feed_scan()
    }

    fn read_at_feed_end(&mut self) -> Result<()> {
        let scope = match self.scopes.pop() {
            Some(Scope::Feed(scope)) => scope,
            _ => return Err(invariant_violation()),
        };
        match self.scopes.last() {
            None => {
                self.cursor.advance()?;
                self.expect_eof()?;
                self.state = ReaderState::Completed;
                Ok(())
            }
            Some(Scope::Link(_)) => self.enter_link_end(!scope.synthetic_empty),
            _ => Err(invariant_violation()),
        }
    }

    fn read_at_entry_end(&mut self) -> Result<()> {
        match self.scopes.pop() {
            Some(Scope::Entry(_)) => {}
            _ => return Err(invariant_violation()),
        }
        match self.scopes.last() {
            None => {
                self.cursor.advance()?;
                self.expect_eof()?;
                self.state = ReaderState::Completed;
                Ok(())
            }
            Some(Scope::Feed(_)) => {
                self.cursor.advance()?;
                self.resume_feed_scan()
            }
            Some(Scope::Link(_)) => self.enter_link_end(true),
            Some(Scope::Entry(_)) => Err(invariant_violation()),
        }
    }

    fn read_at_link_start(&mut self) -> Result<()> {
        let mut scope = match self.scopes.pop() {
            Some(Scope::Link(scope)) => scope,
            _ => return Err(invariant_violation()),
        };
        let outcome = self.drive_link_start(&mut scope);
        self.scopes.push(Scope::Link(scope));
        match outcome? {
            LinkOutcome::ExpandedFeed { expected } => {
                self.scopes.push(Scope::Feed(FeedScope::new(false, expected)));
                self.state = ReaderState::FeedStart;
                Ok(())
            }
            LinkOutcome::ExpandedEntry { expected } => self.begin_entry(expected),
            LinkOutcome::SyntheticEmptyFeed { expected } => {
                let mut feed = FeedScope::new(true, expected);
                feed.synthetic_empty = true;
                self.scopes.push(Scope::Feed(feed));
                self.state = ReaderState::FeedStart;
                Ok(())
            }
            LinkOutcome::Deferred => self.finish_deferred_link(),
        }
    }

    fn read_at_link_end(&mut self) -> Result<()> {
        match self.scopes.pop() {
            Some(Scope::Link(_)) => {}
            _ => return Err(invariant_violation()),
        }
        // Past the link end token, back into entry content.
        self.cursor.advance()?;
        self.resume_entry_scan()?;
        self.after_entry_scan()
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Begin reading an entry. The cursor must be on the entry start token.
    /// The full entry content scan runs before the state is surfaced, so the
    /// type name is known and validated before the first emission.
    fn begin_entry(&mut self, expected_type: Option<String>) -> Result<()> {
        let (attributes, empty) = match self.cursor.token() {
            Token::Start {
                name,
                attributes,
                empty,
            } if self.format.is_entry(name) => (attributes.clone(), *empty),
            token => return Err(unexpected("entry element", token)),
        };
        let mut scope = EntryScope::new(empty, expected_type);
        scope.entry.etag = attr(&attributes, &self.format.etag_attr()).map(str::to_string);

        self.cursor.advance()?;
        if !scope.element_empty {
            self.scan_entry_scope(&mut scope)?;
        }

        tracing::debug!(
            id = scope.entry.id.as_deref().unwrap_or(""),
            type_name = scope.entry.type_name.as_deref().unwrap_or(""),
            "entry started"
        );
        self.scopes.push(Scope::Entry(scope));
        self.state = ReaderState::EntryStart;
        Ok(())
    }

    fn resume_entry_scan(&mut self) -> Result<()> {
        let mut scope = match self.scopes.pop() {
            Some(Scope::Entry(scope)) => scope,
            _ => return Err(invariant_violation()),
        };
        let result = self.scan_entry_scope(&mut scope);
        self.scopes.push(Scope::Entry(scope));
        result
    }

    /// Continue after an entry scan: surface the remembered navigation link
    /// if the scan stopped on one, otherwise surface the entry end.
    fn after_entry_scan(&mut self) -> Result<()> {
        let pending = match self.scopes.last_mut() {
            Some(Scope::Entry(scope)) => scope.pending_link.take(),
            _ => return Err(invariant_violation()),
        };
        match pending {
            Some(descriptor) => {
                self.scopes.push(Scope::Link(LinkScope::new(descriptor)));
                self.state = ReaderState::NavigationLinkStart;
                Ok(())
            }
            None => self.enter_entry_end(),
        }
    }

    /// Media-resource synthesis and validation, then surface the entry end.
    fn enter_entry_end(&mut self) -> Result<()> {
        let schema = self.schema;
        let behavior = self.options.format_behavior;
        let scope = match self.scopes.last_mut() {
            Some(Scope::Entry(scope)) => scope,
            _ => return Err(invariant_violation()),
        };

        if scope.media_link_entry.is_none() {
            if let (Some(schema), Some(type_name)) = (schema, scope.entity_type.as_deref()) {
                if let Some(ty) = schema.entity_type(type_name) {
                    if ty.has_default_stream {
                        scope.entry.media_resource = Some(StreamValue::empty());
                        scope.media_link_entry = Some(true);
                    }
                }
            }
        }

        if behavior != FormatBehavior::Server {
            if let (Some(schema), Some(type_name)) = (schema, scope.entity_type.as_deref()) {
                if let Some(ty) = schema.entity_type(type_name) {
                    let is_media = scope.media_link_entry == Some(true);
                    if is_media && !ty.has_default_stream {
                        return Err(Error::MediaResourceNotAllowed(type_name.to_string()));
                    }
                    if !is_media && ty.has_default_stream {
                        return Err(Error::MediaResourceRequired(type_name.to_string()));
                    }
                }
            }
        }

        scope.entry.metadata = scope.metadata.take();
        tracing::debug!(id = scope.entry.id.as_deref().unwrap_or(""), "entry read");
        self.state = ReaderState::EntryEnd;
        Ok(())
    }

    /// Scan entry content, populating the scope, until the first unconsumed
    /// navigation link or the entry end token.
    fn scan_entry_scope(&mut self, scope: &mut EntryScope) -> Result<()> {
        loop {
            let (name, attributes) = match self.cursor.token() {
                Token::Start {
                    name, attributes, ..
                } => (name.clone(), attributes.clone()),
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => return Ok(()),
                token => return Err(unexpected("entry content", token)),
            };
            match self.format.classify_entry_child(&name) {
                EntryChild::Id => {
                    if scope.seen.id {
                        return Err(Error::DuplicateElement(constants::ID));
                    }
                    scope.seen.id = true;
                    scope.entry.id = Some(self.read_text_content()?);
                }
                EntryChild::Category => self.read_entry_category(scope, &attributes)?,
                EntryChild::Link => {
                    if self.read_entry_link(scope, &attributes)? {
                        // Remembered, not consumed: the cursor stays on the
                        // link start token.
                        return Ok(());
                    }
                }
                EntryChild::Content => self.read_entry_content(scope, &attributes)?,
                EntryChild::Properties => {
                    scope.note_media_evidence(true, constants::PROPERTIES)?;
                    self.read_entry_properties(scope)?;
                }
                EntryChild::Title => {
                    scope.metadata_mut().title = Some(self.read_text_construct(&attributes)?);
                }
                EntryChild::Summary => {
                    scope.metadata_mut().summary = Some(self.read_text_construct(&attributes)?);
                }
                EntryChild::Updated => {
                    scope.metadata_mut().updated = Some(self.read_text_content()?);
                }
                EntryChild::Author => {
                    let person = self.read_person()?;
                    scope.metadata_mut().authors.push(person);
                }
                EntryChild::Unknown => {
                    log::debug!("skipping unrecognized entry element '{}'", name);
                    self.skip_element()?;
                }
            }
            self.cursor.advance()?;
        }
    }

    fn read_entry_category(
        &mut self,
        scope: &mut EntryScope,
        attributes: &[Attribute],
    ) -> Result<()> {
        let term = plain_attr(attributes, constants::TERM);
        if plain_attr(attributes, constants::SCHEME) == Some(constants::TYPE_SCHEME) {
            if scope.seen.type_category {
                return Err(Error::DuplicateElement(constants::CATEGORY));
            }
            scope.seen.type_category = true;
            let term = term
                .ok_or(Error::MissingAttribute(constants::TERM))?
                .to_string();
            if let Some(schema) = self.schema {
                if let Some(expected) = scope.expected_type.as_deref() {
                    if term != expected && !schema.is_assignable(expected, &term) {
                        return Err(Error::TypeMismatch {
                            expected: expected.to_string(),
                            actual: term,
                        });
                    }
                }
                if schema.entity_type(&term).is_none() {
                    return Err(Error::InvalidTypeName(term));
                }
            }
            scope.entry.type_name = Some(term.clone());
            scope.entity_type = Some(term);
        } else {
            scope.metadata_mut().categories.push(AtomCategory {
                term: term
                    .ok_or(Error::MissingAttribute(constants::TERM))?
                    .to_string(),
                scheme: plain_attr(attributes, constants::SCHEME).map(str::to_string),
                label: plain_attr(attributes, constants::LABEL).map(str::to_string),
            });
        }
        self.skip_element()
    }

    /// Handle a link element. Returns true when a navigation or association
    /// link was discovered and remembered as the pending descriptor.
    fn read_entry_link(
        &mut self,
        scope: &mut EntryScope,
        attributes: &[Attribute],
    ) -> Result<bool> {
        let rel = match plain_attr(attributes, constants::REL) {
            Some(rel) => rel.to_string(),
            None => {
                self.skip_element()?;
                return Ok(false);
            }
        };
        let href = plain_attr(attributes, constants::HREF).map(str::to_string);
        match self.format.classify_link(&rel) {
            LinkRelation::SelfLink => {
                if scope.seen.read_link {
                    return Err(Error::DuplicateElement(constants::SELF_REL));
                }
                scope.seen.read_link = true;
                scope.entry.read_link = Some(href.ok_or(Error::MissingAttribute(constants::HREF))?);
                self.skip_element()?;
                Ok(false)
            }
            LinkRelation::Edit => {
                if scope.seen.edit_link {
                    return Err(Error::DuplicateElement(constants::EDIT_REL));
                }
                scope.seen.edit_link = true;
                scope.entry.edit_link = Some(href.ok_or(Error::MissingAttribute(constants::HREF))?);
                self.skip_element()?;
                Ok(false)
            }
            LinkRelation::EditMedia => {
                if scope.seen.edit_media_link {
                    return Err(Error::DuplicateElement(constants::EDIT_MEDIA_REL));
                }
                scope.seen.edit_media_link = true;
                scope.note_media_evidence(true, constants::LINK)?;
                let media = scope
                    .entry
                    .media_resource
                    .get_or_insert_with(StreamValue::empty);
                media.edit_link = Some(href.ok_or(Error::MissingAttribute(constants::HREF))?);
                media.etag = attr(attributes, &self.format.etag_attr()).map(str::to_string);
                self.skip_element()?;
                Ok(false)
            }
            LinkRelation::Navigation(name) => {
                self.note_navigation_link(scope, name, href, attributes, false)?;
                Ok(true)
            }
            LinkRelation::Association(name) => {
                self.note_navigation_link(scope, name, href, attributes, true)?;
                Ok(true)
            }
            LinkRelation::Next | LinkRelation::Delta | LinkRelation::Other => {
                self.skip_element()?;
                Ok(false)
            }
        }
    }

    fn note_navigation_link(
        &self,
        scope: &mut EntryScope,
        name: String,
        href: Option<String>,
        attributes: &[Attribute],
        association: bool,
    ) -> Result<()> {
        scope.duplicates.check(&name)?;

        let mut property = None;
        let mut undeclared_on = None;
        if let Some(schema) = self.schema {
            if let Some(type_name) = scope.entity_type.as_deref() {
                if let Some(ty) = schema.entity_type(type_name) {
                    match schema.entity_navigation(type_name, &name) {
                        Some(p) => property = Some(p.clone()),
                        None if ty.open => {}
                        None => {
                            if !self.options.report_undeclared_link_properties {
                                return Err(Error::UndeclaredLink {
                                    link: name,
                                    type_name: type_name.to_string(),
                                });
                            }
                            undeclared_on = Some(type_name.to_string());
                        }
                    }
                }
            }
        }

        let mut link = NavigationLink::new(name);
        if association {
            link.association_url = href;
        } else {
            link.url = href;
        }
        link.is_collection = property.as_ref().map(|p| p.collection);

        let mut descriptor = NavigationLinkDescriptor::new(link, property);
        descriptor.cardinality_hint = plain_attr(attributes, constants::TYPE)
            .and_then(|t| self.format.cardinality_hint(t));
        descriptor.undeclared_on = undeclared_on;
        scope.pending_link = Some(descriptor);
        Ok(())
    }

    fn read_entry_content(
        &mut self,
        scope: &mut EntryScope,
        attributes: &[Attribute],
    ) -> Result<()> {
        if scope.seen.content {
            return Err(Error::DuplicateElement(constants::CONTENT));
        }
        scope.seen.content = true;

        let content_type = plain_attr(attributes, constants::TYPE).map(str::to_string);
        if let Some(src) = plain_attr(attributes, constants::SRC) {
            scope.note_media_evidence(true, constants::CONTENT)?;
            let media = scope
                .entry
                .media_resource
                .get_or_insert_with(StreamValue::empty);
            media.read_link = Some(src.to_string());
            media.content_type = content_type;
            // Media content elements must be empty.
            match self.cursor.advance()? {
                Token::End(_) => Ok(()),
                token => Err(unexpected("empty media content element", token)),
            }
        } else {
            scope.note_media_evidence(false, constants::CONTENT)?;
            let properties_name = self.format.properties_name();
            self.cursor.advance()?;
            loop {
                let is_properties = match self.cursor.token() {
                    Token::Start { name, .. } => *name == properties_name,
                    Token::Text(_) => {
                        self.cursor.advance()?;
                        continue;
                    }
                    Token::End(_) => return Ok(()),
                    token => return Err(unexpected("entry content element", token)),
                };
                if is_properties {
                    scope.note_media_evidence(false, constants::PROPERTIES)?;
                    self.read_entry_properties(scope)?;
                } else {
                    self.skip_element()?;
                }
                self.cursor.advance()?;
            }
        }
    }

    fn read_entry_properties(&mut self, scope: &mut EntryScope) -> Result<()> {
        if scope.seen.properties {
            return Err(Error::DuplicateElement(constants::PROPERTIES));
        }
        scope.seen.properties = true;

        // Entry-level properties share the entry's tracker with link names.
        let mut tracker = std::mem::take(&mut scope.duplicates);
        let owner_name = scope.entity_type.clone();
        let owner = match owner_name.as_deref() {
            Some(name) => Owner::Entity(name),
            None => Owner::None,
        };
        let result = self.read_property_children(&mut tracker, owner, 0);
        scope.duplicates = tracker;
        let (properties, _) = result?;
        scope.entry.properties.extend(properties);
        Ok(())
    }

    // ========================================================================
    // Feeds
    // ========================================================================

    fn resume_feed_scan(&mut self) -> Result<()> {
        let mut scope = match self.scopes.pop() {
            Some(Scope::Feed(scope)) => scope,
            _ => return Err(invariant_violation()),
        };
        let result = self.scan_feed_scope(&mut scope);
        let expected = scope.expected_entry_type.clone();
        self.scopes.push(Scope::Feed(scope));
        match result? {
            FeedScan::Entry => self.begin_entry(expected),
            FeedScan::End => self.enter_feed_end(),
        }
    }

    fn enter_feed_end(&mut self) -> Result<()> {
        let scope = match self.scopes.last_mut() {
            Some(Scope::Feed(scope)) => scope,
            _ => return Err(invariant_violation()),
        };
        scope.feed.metadata = scope.metadata.take();
        tracing::debug!(id = scope.feed.id.as_deref().unwrap_or(""), "feed read");
        self.state = ReaderState::FeedEnd;
        Ok(())
    }

    fn scan_feed_scope(&mut self, scope: &mut FeedScope) -> Result<FeedScan> {
        loop {
            let (name, attributes) = match self.cursor.token() {
                Token::Start {
                    name, attributes, ..
                } => (name.clone(), attributes.clone()),
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => return Ok(FeedScan::End),
                token => return Err(unexpected("feed content", token)),
            };
            match self.format.classify_feed_child(&name) {
                FeedChild::Entry => return Ok(FeedScan::Entry),
                FeedChild::Id => {
                    scope.feed.id = Some(self.read_text_content()?);
                }
                FeedChild::Count => {
                    if scope.seen.count {
                        return Err(Error::DuplicateElement(constants::COUNT));
                    }
                    scope.seen.count = true;
                    let text = self.read_text_content()?;
                    scope.feed.count =
                        Some(text.trim().parse().map_err(|_| Error::InvalidPrimitive {
                            kind: PrimitiveKind::Int64.name(),
                            text,
                        })?);
                }
                FeedChild::Link => {
                    self.read_feed_link(scope, &attributes)?;
                }
                FeedChild::Title => {
                    scope.metadata_mut().title = Some(self.read_text_construct(&attributes)?);
                }
                FeedChild::Subtitle => {
                    scope.metadata_mut().subtitle = Some(self.read_text_construct(&attributes)?);
                }
                FeedChild::Updated => {
                    scope.metadata_mut().updated = Some(self.read_text_content()?);
                }
                FeedChild::Author => {
                    let person = self.read_person()?;
                    scope.metadata_mut().authors.push(person);
                }
                FeedChild::Generator => {
                    let uri = plain_attr(&attributes, constants::URI).map(str::to_string);
                    let version = plain_attr(&attributes, constants::VERSION).map(str::to_string);
                    let text = self.read_text_content()?;
                    scope.metadata_mut().generator = Some(AtomGenerator {
                        name: if text.is_empty() { None } else { Some(text) },
                        uri,
                        version,
                    });
                }
                FeedChild::Unknown => {
                    log::debug!("skipping unrecognized feed element '{}'", name);
                    self.skip_element()?;
                }
            }
            self.cursor.advance()?;
        }
    }

    fn read_feed_link(&mut self, scope: &mut FeedScope, attributes: &[Attribute]) -> Result<()> {
        let rel = plain_attr(attributes, constants::REL);
        let href = plain_attr(attributes, constants::HREF).map(str::to_string);
        match rel {
            Some(constants::SELF_REL) => {
                if scope.seen.self_link {
                    return Err(Error::DuplicateElement(constants::SELF_REL));
                }
                scope.seen.self_link = true;
                scope.metadata_mut().self_link = href;
            }
            Some(constants::NEXT_REL) => {
                if scope.seen.next_link {
                    return Err(Error::DuplicateElement(constants::NEXT_REL));
                }
                scope.seen.next_link = true;
                scope.feed.next_link = href;
            }
            Some(constants::DELTA_REL) => {
                if scope.seen.delta_link {
                    return Err(Error::DuplicateElement(constants::DELTA_REL));
                }
                scope.seen.delta_link = true;
                scope.feed.delta_link = href;
            }
            _ => {}
        }
        self.skip_element()
    }

    // ========================================================================
    // Navigation links
    // ========================================================================

    /// Disambiguate link expansion from the discovered content shape. The
    /// declared cardinality and wire hint only fill gaps; discovered content
    /// that contradicts the declaration is a hard error.
    fn drive_link_start(&mut self, scope: &mut LinkScope) -> Result<LinkOutcome> {
        self.cursor.advance()?;
        loop {
            let is_inline = match self.cursor.token() {
                Token::Start { name, .. } => self.format.is_inline(name),
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => return Ok(LinkOutcome::Deferred),
                token => return Err(unexpected("navigation link content", token)),
            };

            if !is_inline {
                self.skip_element()?;
                self.cursor.advance()?;
                continue;
            }

            if scope.expanded {
                return Err(Error::DuplicateElement(constants::INLINE));
            }
            scope.expanded = true;

            if let Some(owner) = &scope.descriptor.undeclared_on {
                // Undeclared link with unexpected inline content: demote to a
                // deferred link and skip the content, or fail.
                if self.options.ignore_undeclared_value_properties {
                    self.skip_element()?;
                    self.cursor.advance()?;
                    continue;
                }
                return Err(Error::UndeclaredLink {
                    link: scope.descriptor.link.name.clone(),
                    type_name: owner.clone(),
                });
            }

            self.cursor.advance()?;
            loop {
                let shape = match self.cursor.token() {
                    Token::Start { name, .. } if self.format.is_feed(name) => Some(true),
                    Token::Start { name, .. } if self.format.is_entry(name) => Some(false),
                    Token::Text(_) => {
                        self.cursor.advance()?;
                        continue;
                    }
                    Token::End(_) => None,
                    token => return Err(unexpected("expanded link content", token)),
                };
                let expected = scope
                    .descriptor
                    .property
                    .as_ref()
                    .map(|p| p.target_type.clone());
                match shape {
                    Some(collection) => {
                        self.check_expanded_cardinality(&scope.descriptor, collection)?;
                        scope.descriptor.link.is_collection = Some(collection);
                        return Ok(if collection {
                            LinkOutcome::ExpandedFeed { expected }
                        } else {
                            LinkOutcome::ExpandedEntry { expected }
                        });
                    }
                    None => {
                        // Empty inline content.
                        let declared = scope.descriptor.declared_or_hinted_collection();
                        scope.descriptor.link.is_collection = declared;
                        if declared == Some(true) {
                            return Ok(LinkOutcome::SyntheticEmptyFeed { expected });
                        }
                        // Single-valued: surface as deferred. Consume the
                        // rest of the link element.
                        self.cursor.advance()?;
                        break;
                    }
                }
            }
        }
    }

    fn check_expanded_cardinality(
        &self,
        descriptor: &NavigationLinkDescriptor,
        discovered_collection: bool,
    ) -> Result<()> {
        if let Some(property) = &descriptor.property {
            if property.collection && !discovered_collection {
                return Err(Error::ExpandedEntryInCollectionLink(
                    descriptor.link.name.clone(),
                ));
            }
            if !property.collection && discovered_collection {
                return Err(Error::ExpandedFeedInSingleLink(descriptor.link.name.clone()));
            }
        }
        Ok(())
    }

    /// A non-expanded link: reported as a plain link end in response mode,
    /// as an entity reference link in request mode.
    fn finish_deferred_link(&mut self) -> Result<()> {
        let message = self.message;
        let scope = match self.scopes.last_mut() {
            Some(Scope::Link(scope)) => scope,
            _ => return Err(invariant_violation()),
        };
        if scope.descriptor.link.is_collection.is_none() {
            scope.descriptor.link.is_collection = scope.descriptor.declared_or_hinted_collection();
        }
        let link = &scope.descriptor.link;
        if message == MessageKind::Request && link.association_url.is_none() {
            let url = link
                .url
                .clone()
                .ok_or(Error::MissingAttribute(constants::HREF))?;
            self.reference_link = Some(EntityReferenceLink::new(url));
            self.state = ReaderState::EntityReferenceLink;
        } else {
            self.state = ReaderState::NavigationLinkEnd;
        }
        Ok(())
    }

    /// Consume the tokens closing an expanded link: the inline end and the
    /// link end, skipping extension elements. With `consume_child_end` the
    /// cursor is on the expanded child's end token; otherwise it is already
    /// on the inline end.
    fn enter_link_end(&mut self, consume_child_end: bool) -> Result<()> {
        if consume_child_end {
            self.cursor.advance()?;
        }
        loop {
            match self.cursor.token() {
                Token::Text(_) => {
                    self.cursor.advance()?;
                }
                Token::Start { .. } => {
                    self.skip_element()?;
                    self.cursor.advance()?;
                }
                Token::End(_) => break,
                token => return Err(unexpected("inline end", token)),
            }
        }
        self.cursor.advance()?;
        loop {
            let is_inline = match self.cursor.token() {
                Token::Start { name, .. } => self.format.is_inline(name),
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => break,
                token => return Err(unexpected("navigation link end", token)),
            };
            if is_inline {
                return Err(Error::DuplicateElement(constants::INLINE));
            }
            self.skip_element()?;
            self.cursor.advance()?;
        }
        self.state = ReaderState::NavigationLinkEnd;
        Ok(())
    }

    // ========================================================================
    // Properties and values
    // ========================================================================

    /// Read the property children of the current element; leaves the cursor
    /// on the element's end token.
    fn read_property_children(
        &mut self,
        tracker: &mut DuplicateTracker,
        owner: Owner<'_>,
        depth: usize,
    ) -> Result<(Vec<Property>, Vec<InstanceAnnotation>)> {
        let mut properties = Vec::new();
        let mut annotations = Vec::new();
        let mut terms = HashSet::new();
        let annotation_name = self.format.annotation_name();
        self.cursor.advance()?;
        loop {
            let (name, attributes) = match self.cursor.token() {
                Token::Start {
                    name, attributes, ..
                } => (name.clone(), attributes.clone()),
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => return Ok((properties, annotations)),
                token => return Err(unexpected("property element", token)),
            };
            if name == annotation_name {
                annotations.push(self.read_annotation(&attributes, depth, &mut terms)?);
            } else {
                let local = name.local.to_string();
                if let Some(property) =
                    self.read_property_element(local, &attributes, tracker, owner, depth)?
                {
                    properties.push(property);
                }
            }
            self.cursor.advance()?;
        }
    }

    fn read_property_element(
        &mut self,
        name: String,
        attributes: &[Attribute],
        tracker: &mut DuplicateTracker,
        owner: Owner<'_>,
        depth: usize,
    ) -> Result<Option<Property>> {
        tracker.check(&name)?;
        let declared = match self.declared_property(owner, &name) {
            Declared::Type(ty) => Some(ty),
            Declared::Dynamic => None,
            Declared::UndeclaredClosed(type_name) => {
                if self.options.ignore_undeclared_value_properties {
                    self.skip_element()?;
                    return Ok(None);
                }
                return Err(Error::UndeclaredProperty {
                    property: name,
                    type_name,
                });
            }
        };
        let (value, annotations) = self.read_value(&name, attributes, declared.as_ref(), depth)?;
        Ok(Some(Property {
            name,
            value,
            annotations,
        }))
    }

    fn declared_property(&self, owner: Owner<'_>, name: &str) -> Declared {
        let schema = match self.schema {
            Some(schema) => schema,
            None => return Declared::Dynamic,
        };
        match owner {
            Owner::None => Declared::Dynamic,
            Owner::Entity(type_name) => match schema.entity_type(type_name) {
                None => Declared::Dynamic,
                Some(ty) => match schema.entity_property(type_name, name) {
                    Some(p) => Declared::Type(p.ty.clone()),
                    None if ty.open => Declared::Dynamic,
                    None => Declared::UndeclaredClosed(type_name.to_string()),
                },
            },
            Owner::Complex(type_name) => match schema.complex_type(type_name) {
                None => Declared::Dynamic,
                Some(ty) => match ty.property(name) {
                    Some(p) => Declared::Type(p.ty.clone()),
                    None if ty.open => Declared::Dynamic,
                    None => Declared::UndeclaredClosed(type_name.to_string()),
                },
            },
        }
    }

    /// Read one value element; the cursor must be on its start token and is
    /// left on its end token.
    fn read_value(
        &mut self,
        name: &str,
        attributes: &[Attribute],
        declared: Option<&PropertyType>,
        depth: usize,
    ) -> Result<(Value, Vec<InstanceAnnotation>)> {
        if attr(attributes, &self.format.null_attr()) == Some("true") {
            if let Some(declared) = declared {
                if !declared.is_nullable() {
                    return Err(Error::NotNullable(name.to_string()));
                }
            }
            self.skip_element()?;
            return Ok((Value::Null, Vec::new()));
        }

        let wire_type = attr(attributes, &self.format.type_attr()).map(str::to_string);
        let shape = self.resolve_shape(name, wire_type.as_deref(), declared)?;
        match shape {
            Shape::Collection {
                type_name,
                item_wire,
            } => {
                let item_declared = match declared {
                    Some(PropertyType::Collection { item }) => Some((**item).clone()),
                    _ => None,
                };
                self.read_collection_value(name, type_name, item_wire, item_declared, depth)
            }
            shape => self.read_scalar_or_complex(name, shape, declared, depth),
        }
    }

    fn resolve_shape(
        &self,
        name: &str,
        wire_type: Option<&str>,
        declared: Option<&PropertyType>,
    ) -> Result<Shape> {
        if let Some(wire) = wire_type {
            if let Some(item) = collection_item_type_name(wire) {
                if let Some(decl) = declared {
                    if !matches!(decl, PropertyType::Collection { .. }) {
                        return Err(Error::TypeMismatch {
                            expected: decl.type_name(),
                            actual: wire.to_string(),
                        });
                    }
                }
                return Ok(Shape::Collection {
                    type_name: Some(wire.to_string()),
                    item_wire: Some(item.to_string()),
                });
            }
            if let Some(kind) = PrimitiveKind::from_name(wire) {
                if kind == PrimitiveKind::Stream {
                    return Err(Error::UnexpectedStreamValue(name.to_string()));
                }
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
                return Ok(Shape::Primitive(kind));
            }
            if let Some(schema) = self.schema {
                if schema.enum_type(wire).is_some() {
                    if let Some(PropertyType::Enum {
                        name: declared_name,
                        ..
                    }) = declared
                    {
                        if declared_name != wire {
                            return Err(Error::TypeMismatch {
                                expected: declared_name.clone(),
                                actual: wire.to_string(),
                            });
                        }
                    }
                    return Ok(Shape::Enum(wire.to_string()));
                }
                if schema.complex_type(wire).is_some() {
                    if let Some(PropertyType::Complex {
                        name: declared_name,
                        ..
                    }) = declared
                    {
                        if declared_name != wire {
                            return Err(Error::TypeMismatch {
                                expected: declared_name.clone(),
                                actual: wire.to_string(),
                            });
                        }
                    }
                    return Ok(Shape::Complex(Some(wire.to_string())));
                }
                return Err(Error::InvalidTypeName(wire.to_string()));
            }
            // No schema: the content shape decides between complex and enum.
            return Ok(Shape::Undecided(Some(wire.to_string())));
        }

        match declared {
            Some(PropertyType::Primitive { kind, .. }) => {
                if *kind == PrimitiveKind::Stream {
                    Err(Error::UnexpectedStreamValue(name.to_string()))
                } else {
                    Ok(Shape::Primitive(*kind))
                }
            }
            Some(PropertyType::Enum { name, .. }) => Ok(Shape::Enum(name.clone())),
            Some(PropertyType::Complex { name, .. }) => Ok(Shape::Complex(Some(name.clone()))),
            Some(declared @ PropertyType::Collection { item }) => Ok(Shape::Collection {
                type_name: Some(declared.type_name()),
                item_wire: Some(item.type_name()),
            }),
            None => Ok(Shape::Undecided(None)),
        }
    }

    fn read_scalar_or_complex(
        &mut self,
        name: &str,
        shape: Shape,
        declared: Option<&PropertyType>,
        depth: usize,
    ) -> Result<(Value, Vec<InstanceAnnotation>)> {
        let mut text = String::new();
        let mut properties: Vec<Property> = Vec::new();
        let mut annotations = Vec::new();
        let mut terms = HashSet::new();
        let mut child_tracker: Option<DuplicateTracker> = None;
        let annotation_name = self.format.annotation_name();

        // The owning complex type for declared child lookups.
        let complex_name: Option<String> = match &shape {
            Shape::Complex(type_name) => type_name.clone(),
            Shape::Undecided(wire) => wire.clone(),
            _ => None,
        };

        loop {
            let (child_name, child_attributes) = match self.cursor.advance()? {
                Token::Text(t) => {
                    text.push_str(t);
                    continue;
                }
                Token::End(_) => break,
                Token::Start {
                    name: child_name,
                    attributes,
                    ..
                } => (child_name.clone(), attributes.clone()),
                token => return Err(unexpected("value content", token)),
            };

            if child_name == annotation_name {
                annotations.push(self.read_annotation(&child_attributes, depth, &mut terms)?);
                continue;
            }

            // A property child makes this a complex value.
            match &shape {
                Shape::Primitive(kind) => {
                    return Err(Error::InvalidPrimitive {
                        kind: kind.name(),
                        text: child_name.to_string(),
                    });
                }
                Shape::Enum(type_name) => {
                    return Err(Error::InvalidEnumMember {
                        type_name: type_name.clone(),
                        member: child_name.to_string(),
                    });
                }
                _ => {}
            }
            if depth >= self.options.max_nesting_depth {
                return Err(Error::DepthLimitExceeded(self.options.max_nesting_depth));
            }

            let owner_name = complex_name.clone();
            let owner = match owner_name.as_deref() {
                Some(type_name) => Owner::Complex(type_name),
                None => Owner::None,
            };
            let tracker = child_tracker.get_or_insert_with(DuplicateTracker::new);
            let local = child_name.local.to_string();
            if let Some(property) =
                self.read_property_element(local, &child_attributes, tracker, owner, depth + 1)?
            {
                properties.push(property);
            }
        }

        let value = match shape {
            Shape::Primitive(kind) => {
                Value::Primitive(PrimitiveValue::from_wire(kind, &text)?)
            }
            Shape::Enum(type_name) => {
                self.validate_enum_member(&type_name, &text)?;
                Value::Enum(EnumValue {
                    type_name: Some(type_name),
                    value: text,
                })
            }
            Shape::Complex(type_name) => Value::Complex(ComplexValue {
                type_name,
                properties,
            }),
            Shape::Undecided(wire) => {
                if !properties.is_empty() {
                    Value::Complex(ComplexValue {
                        type_name: wire,
                        properties,
                    })
                } else if let Some(type_name) = wire {
                    Value::Enum(EnumValue {
                        type_name: Some(type_name),
                        value: text,
                    })
                } else if let Some(PropertyType::Complex { name, .. }) = declared {
                    Value::Complex(ComplexValue {
                        type_name: Some(name.clone()),
                        properties,
                    })
                } else {
                    Value::Primitive(PrimitiveValue::String(text))
                }
            }
            Shape::Collection { .. } => return Err(invariant_violation()),
        };
        Ok((value, annotations))
    }

    fn validate_enum_member(&self, type_name: &str, member: &str) -> Result<()> {
        if let Some(schema) = self.schema {
            if let Some(ty) = schema.enum_type(type_name) {
                if !ty.has_member(member) {
                    return Err(Error::InvalidEnumMember {
                        type_name: type_name.to_string(),
                        member: member.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn read_collection_value(
        &mut self,
        name: &str,
        type_name: Option<String>,
        item_wire: Option<String>,
        item_declared: Option<PropertyType>,
        depth: usize,
    ) -> Result<(Value, Vec<InstanceAnnotation>)> {
        if depth >= self.options.max_nesting_depth {
            return Err(Error::DepthLimitExceeded(self.options.max_nesting_depth));
        }
        if matches!(item_declared, Some(PropertyType::Collection { .. })) {
            return Err(Error::InvalidCollectionItem);
        }

        // Resolve the collection-level item type once for untyped items.
        let item_fallback: Option<PropertyType> = match (&item_declared, item_wire.as_deref()) {
            (Some(_), _) | (_, None) => None,
            (None, Some(item)) => self.item_type_from_name(item),
        };

        let mut items = Vec::new();
        let mut annotations = Vec::new();
        let mut terms = HashSet::new();
        let annotation_name = self.format.annotation_name();
        let element_name = self.format.element_name();
        self.cursor.advance()?;
        loop {
            let (child_name, child_attributes) = match self.cursor.token() {
                Token::Start {
                    name: child_name,
                    attributes,
                    ..
                } => (child_name.clone(), attributes.clone()),
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => break,
                token => return Err(unexpected("collection item", token)),
            };
            if child_name == annotation_name {
                annotations.push(self.read_annotation(&child_attributes, depth, &mut terms)?);
                self.cursor.advance()?;
                continue;
            }
            if child_name != element_name {
                return Err(unexpected("collection item", self.cursor.token()));
            }
            // Nested collections are not valid collection items.
            if let Some(item_type) = attr(&child_attributes, &self.format.type_attr()) {
                if collection_item_type_name(item_type).is_some() {
                    return Err(Error::InvalidCollectionItem);
                }
            }
            let declared = item_declared.as_ref().or(item_fallback.as_ref());
            let (value, _) = self.read_value(name, &child_attributes, declared, depth + 1)?;
            items.push(value);
            self.cursor.advance()?;
        }

        Ok((
            Value::Collection(CollectionValue { type_name, items }),
            annotations,
        ))
    }

    fn item_type_from_name(&self, item: &str) -> Option<PropertyType> {
        if let Some(kind) = PrimitiveKind::from_name(item) {
            return Some(PropertyType::Primitive {
                kind,
                nullable: true,
            });
        }
        let schema = self.schema?;
        if schema.enum_type(item).is_some() {
            return Some(PropertyType::Enum {
                name: item.to_string(),
                nullable: true,
            });
        }
        if schema.complex_type(item).is_some() {
            return Some(PropertyType::Complex {
                name: item.to_string(),
                nullable: true,
            });
        }
        None
    }

    fn read_annotation(
        &mut self,
        attributes: &[Attribute],
        depth: usize,
        terms: &mut HashSet<String>,
    ) -> Result<InstanceAnnotation> {
        let term = plain_attr(attributes, constants::ANNOTATION_TERM)
            .ok_or(Error::MissingAttribute(constants::ANNOTATION_TERM))?
            .to_string();
        if !terms.insert(term.clone()) {
            return Err(Error::DuplicateAnnotation(term));
        }

        // Attribute value notation takes precedence over element content.
        let notation = [
            (constants::ANNOTATION_STRING, PrimitiveKind::String),
            (constants::ANNOTATION_BOOL, PrimitiveKind::Boolean),
            (constants::ANNOTATION_INT, PrimitiveKind::Int64),
            (constants::ANNOTATION_FLOAT, PrimitiveKind::Double),
            (constants::ANNOTATION_DECIMAL, PrimitiveKind::Decimal),
        ]
        .iter()
        .find_map(|&(attr_name, kind)| {
            plain_attr(attributes, attr_name).map(|text| (kind, text.to_string()))
        });

        if let Some((kind, text)) = notation {
            self.skip_element()?;
            let value = PrimitiveValue::from_wire(kind, &text)?;
            return Ok(InstanceAnnotation {
                term,
                value: Value::Primitive(value),
            });
        }

        let (value, _) = self.read_value(&term, attributes, None, depth)?;
        Ok(InstanceAnnotation { term, value })
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    /// Skip the current element entirely; leaves the cursor on its end token.
    fn skip_element(&mut self) -> Result<()> {
        let mut nested = 0usize;
        loop {
            match self.cursor.advance()? {
                Token::Start { .. } => nested += 1,
                Token::End(_) => {
                    if nested == 0 {
                        return Ok(());
                    }
                    nested -= 1;
                }
                Token::Text(_) => {}
                token => return Err(unexpected("element content", token)),
            }
        }
    }

    /// Collect the text content of the current element; leaves the cursor on
    /// its end token.
    fn read_text_content(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.cursor.advance()? {
                Token::Text(t) => text.push_str(t),
                Token::End(_) => return Ok(text),
                token => return Err(unexpected("text content", token)),
            }
        }
    }

    fn read_text_construct(&mut self, attributes: &[Attribute]) -> Result<TextConstruct> {
        let kind = plain_attr(attributes, constants::TYPE)
            .map(TextKind::from_str)
            .unwrap_or_default();
        Ok(TextConstruct {
            kind,
            text: self.read_text_content()?,
        })
    }

    fn read_person(&mut self) -> Result<AtomPerson> {
        let mut person = AtomPerson::default();
        self.cursor.advance()?;
        loop {
            let local = match self.cursor.token() {
                Token::Start { name, .. } if name.namespace == constants::ATOM_NS => {
                    name.local.to_string()
                }
                Token::Start { .. } => {
                    self.skip_element()?;
                    self.cursor.advance()?;
                    continue;
                }
                Token::Text(_) => {
                    self.cursor.advance()?;
                    continue;
                }
                Token::End(_) => return Ok(person),
                token => return Err(unexpected("person content", token)),
            };
            let text = self.read_text_content()?;
            match local.as_str() {
                constants::NAME => person.name = text,
                constants::URI => person.uri = Some(text),
                constants::EMAIL => person.email = Some(text),
                _ => {}
            }
            self.cursor.advance()?;
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        loop {
            match self.cursor.token() {
                Token::Eof => return Ok(()),
                Token::Text(_) => {
                    self.cursor.advance()?;
                }
                token => return Err(unexpected("end of payload", token)),
            }
        }
    }
}

fn unexpected(expected: &'static str, token: &Token) -> Error {
    Error::UnexpectedToken {
        expected,
        found: token.describe(),
    }
}

// The state machine guarantees scope/state agreement; disagreement is a
// defect, not an input error.
fn invariant_violation() -> Error {
    debug_assert!(false, "reader scope stack does not match its state");
    Error::Unusable
}
