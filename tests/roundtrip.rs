use odata_format::atom::{FeedMetadata, TextConstruct};
use odata_format::{
    constants, CodecOptions, CollectionValue, ComplexType, ComplexValue, EntityReferenceLink,
    EntityType, Entry, EnumType, EnumValue, Error, Feed, InstanceAnnotation, MessageKind, Model,
    NavigationLink, NavigationProperty, PayloadReader, PayloadWriter, PrimitiveKind,
    PrimitiveValue, Property, PropertyType, QName, ReaderState, StreamValue, StructuralProperty,
    TokenBuffer, TokenWrite, Value,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Test model and payload builders
// ============================================================================

fn model() -> Model {
    let mut model = Model::new();

    let mut address = ComplexType::new("Test.Address");
    address.properties.push(StructuralProperty::new(
        "City",
        PropertyType::nullable(PrimitiveKind::String),
    ));
    address.properties.push(StructuralProperty::new(
        "Zip",
        PropertyType::primitive(PrimitiveKind::Int32),
    ));
    model.add_complex_type(address);

    model.add_enum_type(EnumType::new("Test.Rating", &["Bronze", "Silver", "Gold"]));

    let mut person = EntityType::new("Test.Person");
    person.properties.push(StructuralProperty::new(
        "Id",
        PropertyType::primitive(PrimitiveKind::Int32),
    ));
    person.properties.push(StructuralProperty::new(
        "Name",
        PropertyType::nullable(PrimitiveKind::String),
    ));
    person.properties.push(StructuralProperty::new(
        "Address",
        PropertyType::Complex {
            name: "Test.Address".to_string(),
            nullable: true,
        },
    ));
    person.properties.push(StructuralProperty::new(
        "Tags",
        PropertyType::Collection {
            item: Box::new(PropertyType::nullable(PrimitiveKind::String)),
        },
    ));
    person.properties.push(StructuralProperty::new(
        "Rating",
        PropertyType::Enum {
            name: "Test.Rating".to_string(),
            nullable: true,
        },
    ));
    person
        .navigation
        .push(NavigationProperty::new("Orders", "Test.Order", true));
    person
        .navigation
        .push(NavigationProperty::new("BestFriend", "Test.Person", false));
    model.add_entity_type(person);

    let mut order = EntityType::new("Test.Order");
    order.properties.push(StructuralProperty::new(
        "Id",
        PropertyType::primitive(PrimitiveKind::Int32),
    ));
    model.add_entity_type(order);

    let mut photo = EntityType::new("Test.Photo");
    photo.has_default_stream = true;
    photo.properties.push(StructuralProperty::new(
        "Id",
        PropertyType::primitive(PrimitiveKind::Int32),
    ));
    model.add_entity_type(photo);

    model
}

fn alice() -> Entry {
    let mut entry = Entry::typed("Test.Person");
    entry.id = Some("urn:people:1".to_string());
    entry.etag = Some("W/\"1\"".to_string());
    entry.read_link = Some("People(1)".to_string());
    entry.edit_link = Some("People(1)/edit".to_string());
    entry.properties = vec![
        Property::new("Id", 1),
        Property::new("Name", "Alice"),
        Property::new(
            "Address",
            ComplexValue::new("Test.Address")
                .with(Property::new("City", "Zurich"))
                .with(Property::new("Zip", 8001)),
        ),
        Property::new(
            "Tags",
            CollectionValue::new("Collection(Edm.String)")
                .with("a")
                .with("b"),
        ),
        Property::new("Rating", EnumValue::new("Test.Rating", "Gold")),
    ];
    entry
}

fn bob() -> Entry {
    let mut entry = Entry::typed("Test.Person");
    entry.id = Some("urn:people:2".to_string());
    entry.properties = vec![Property::new("Id", 2), Property::new("Name", Value::Null)];
    entry
}

fn carol() -> Entry {
    let mut entry = Entry::typed("Test.Person");
    entry.id = Some("urn:people:3".to_string());
    entry.properties = vec![Property::new("Id", 3), Property::new("Name", "Carol")];
    entry
}

// ============================================================================
// Pull-tree collector
// ============================================================================

#[derive(Debug)]
struct ReadFeed {
    feed: Feed,
    entries: Vec<ReadEntry>,
}

#[derive(Debug)]
struct ReadEntry {
    entry: Entry,
    links: Vec<ReadLink>,
}

#[derive(Debug)]
struct ReadLink {
    link: NavigationLink,
    expanded_feed: Option<ReadFeed>,
    expanded_entry: Option<Box<ReadEntry>>,
    references: Vec<EntityReferenceLink>,
}

fn read_feed_tree(reader: &mut PayloadReader<'_, TokenBuffer>) -> ReadFeed {
    assert_eq!(reader.state(), ReaderState::FeedStart);
    let mut entries = Vec::new();
    loop {
        reader.read_next().unwrap();
        match reader.state() {
            ReaderState::EntryStart => entries.push(read_entry_tree(reader)),
            ReaderState::FeedEnd => {
                return ReadFeed {
                    feed: reader.feed().unwrap().clone(),
                    entries,
                };
            }
            state => panic!("unexpected state in feed: {:?}", state),
        }
    }
}

fn read_entry_tree(reader: &mut PayloadReader<'_, TokenBuffer>) -> ReadEntry {
    assert_eq!(reader.state(), ReaderState::EntryStart);
    let mut links = Vec::new();
    loop {
        reader.read_next().unwrap();
        match reader.state() {
            ReaderState::NavigationLinkStart => links.push(read_link_tree(reader)),
            ReaderState::EntryEnd => {
                return ReadEntry {
                    entry: reader.entry().unwrap().clone(),
                    links,
                };
            }
            state => panic!("unexpected state in entry: {:?}", state),
        }
    }
}

fn read_link_tree(reader: &mut PayloadReader<'_, TokenBuffer>) -> ReadLink {
    assert_eq!(reader.state(), ReaderState::NavigationLinkStart);
    let mut expanded_feed = None;
    let mut expanded_entry = None;
    let mut references = Vec::new();
    loop {
        reader.read_next().unwrap();
        match reader.state() {
            ReaderState::FeedStart => expanded_feed = Some(read_feed_tree(reader)),
            ReaderState::EntryStart => {
                expanded_entry = Some(Box::new(read_entry_tree(reader)));
            }
            ReaderState::EntityReferenceLink => {
                references.push(reader.entity_reference_link().unwrap().clone());
            }
            ReaderState::NavigationLinkEnd => {
                return ReadLink {
                    link: reader.navigation_link().unwrap().clone(),
                    expanded_feed,
                    expanded_entry,
                    references,
                };
            }
            state => panic!("unexpected state in link: {:?}", state),
        }
    }
}

// ============================================================================
// Token helpers for hand-built payloads
// ============================================================================

fn atom(local: &'static str) -> QName {
    QName::borrowed(constants::ATOM_NS, local)
}

fn meta(local: &'static str) -> QName {
    QName::borrowed(constants::METADATA_NS, local)
}

fn data(local: &'static str) -> QName {
    QName::new(constants::DATA_NS, local.to_string())
}

fn plain(local: &'static str) -> QName {
    QName::new("", local)
}

fn type_category(buf: &mut TokenBuffer, term: &str) {
    buf.start_element(&atom(constants::CATEGORY)).unwrap();
    buf.attribute(&plain(constants::SCHEME), constants::TYPE_SCHEME)
        .unwrap();
    buf.attribute(&plain(constants::TERM), term).unwrap();
    buf.end_element().unwrap();
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn full_response_round_trip() {
    let model = model();

    let mut feed = Feed::new();
    feed.id = Some("urn:people".to_string());
    feed.count = Some(2);
    feed.next_link = Some("People?page=2".to_string());
    feed.delta_link = Some("People?delta=3".to_string());
    feed.metadata = Some(Box::new(FeedMetadata {
        title: Some(TextConstruct::plain("People")),
        ..Default::default()
    }));

    let mut writer = PayloadWriter::new(TokenBuffer::new()).with_schema(&model);
    writer.start_feed(&feed).unwrap();
    writer.start_entry(&alice()).unwrap();

    let mut orders = NavigationLink::deferred("Orders", "People(1)/Orders");
    orders.is_collection = Some(true);
    writer.start_navigation_link(&orders).unwrap();
    writer.end().unwrap();

    writer
        .start_navigation_link(&NavigationLink::new("BestFriend"))
        .unwrap();
    writer.start_entry(&bob()).unwrap();
    writer.end().unwrap();
    writer.end().unwrap();

    writer.end().unwrap(); // alice
    writer.start_entry(&carol()).unwrap();
    writer.end().unwrap();
    writer.end().unwrap(); // feed
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_feed(buf)
        .with_schema(&model)
        .with_expected_type("Test.Person");
    assert!(reader.read_next().unwrap());
    let tree = read_feed_tree(&mut reader);
    assert!(!reader.read_next().unwrap());
    assert_eq!(reader.state(), ReaderState::Completed);

    assert_eq!(tree.feed.id, feed.id);
    assert_eq!(tree.feed.count, feed.count);
    assert_eq!(tree.feed.next_link, feed.next_link);
    assert_eq!(tree.feed.delta_link, feed.delta_link);
    assert_eq!(
        tree.feed.metadata.as_ref().unwrap().title,
        Some(TextConstruct::plain("People"))
    );

    assert_eq!(tree.entries.len(), 2);
    let first = &tree.entries[0];
    let expected = alice();
    assert_eq!(first.entry.id, expected.id);
    assert_eq!(first.entry.etag, expected.etag);
    assert_eq!(first.entry.type_name, expected.type_name);
    assert_eq!(first.entry.read_link, expected.read_link);
    assert_eq!(first.entry.edit_link, expected.edit_link);
    assert_eq!(first.entry.media_resource, None);
    assert_eq!(first.entry.properties, expected.properties);

    assert_eq!(first.links.len(), 2);
    let orders_link = &first.links[0];
    assert_eq!(orders_link.link.name, "Orders");
    assert_eq!(orders_link.link.url.as_deref(), Some("People(1)/Orders"));
    assert_eq!(orders_link.link.is_collection, Some(true));
    assert!(orders_link.expanded_feed.is_none());
    assert!(orders_link.expanded_entry.is_none());
    assert!(orders_link.references.is_empty());

    let friend_link = &first.links[1];
    assert_eq!(friend_link.link.name, "BestFriend");
    assert_eq!(friend_link.link.is_collection, Some(false));
    let friend = friend_link.expanded_entry.as_ref().unwrap();
    assert_eq!(friend.entry.properties, bob().properties);
    assert!(friend.entry.property("Name").unwrap().value.is_null());

    let tags = first.entry.property("Tags").unwrap();
    assert_eq!(tags.value.as_collection().unwrap().items.len(), 2);

    assert_eq!(tree.entries[1].entry.properties, carol().properties);
}

#[test]
fn state_sequence_is_stack_balanced() {
    let model = model();
    let mut writer = PayloadWriter::new(TokenBuffer::new()).with_schema(&model);
    writer.start_feed(&Feed::new()).unwrap();
    writer.start_entry(&alice()).unwrap();
    writer
        .start_navigation_link(&NavigationLink::deferred("Orders", "People(1)/Orders"))
        .unwrap();
    writer.end().unwrap();
    writer
        .start_navigation_link(&NavigationLink::new("BestFriend"))
        .unwrap();
    writer.start_entry(&bob()).unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    writer.start_entry(&carol()).unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_feed(buf).with_schema(&model);
    let mut states = Vec::new();
    while reader.read_next().unwrap() {
        states.push(reader.state());
    }
    assert_eq!(
        states,
        vec![
            ReaderState::FeedStart,
            ReaderState::EntryStart,
            ReaderState::NavigationLinkStart,
            ReaderState::NavigationLinkEnd,
            ReaderState::NavigationLinkStart,
            ReaderState::EntryStart,
            ReaderState::EntryEnd,
            ReaderState::NavigationLinkEnd,
            ReaderState::EntryEnd,
            ReaderState::EntryStart,
            ReaderState::EntryEnd,
            ReaderState::FeedEnd,
        ]
    );
}

#[test]
fn empty_feed_round_trip() {
    let mut writer = PayloadWriter::new(TokenBuffer::new());
    writer.start_feed(&Feed::new()).unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_feed(buf);
    assert!(reader.read_next().unwrap());
    let tree = read_feed_tree(&mut reader);
    assert!(tree.entries.is_empty());
    assert!(!reader.read_next().unwrap());
}

#[test]
fn expanded_collection_link_round_trip() {
    let model = model();
    let mut order = Entry::typed("Test.Order");
    order.id = Some("urn:orders:7".to_string());
    order.properties = vec![Property::new("Id", 7)];

    let mut writer = PayloadWriter::new(TokenBuffer::new()).with_schema(&model);
    writer.start_entry(&alice()).unwrap();
    writer
        .start_navigation_link(&NavigationLink::new("Orders"))
        .unwrap();
    writer.start_feed(&Feed::new()).unwrap();
    writer.start_entry(&order).unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    assert!(reader.read_next().unwrap());
    let tree = read_entry_tree(&mut reader);
    assert!(!reader.read_next().unwrap());

    assert_eq!(tree.links.len(), 1);
    let link = &tree.links[0];
    assert_eq!(link.link.is_collection, Some(true));
    let inner = link.expanded_feed.as_ref().unwrap();
    assert_eq!(inner.entries.len(), 1);
    assert_eq!(inner.entries[0].entry.properties, order.properties);
    // The expanded entries were validated against the link's target type.
    assert_eq!(
        inner.entries[0].entry.type_name.as_deref(),
        Some("Test.Order")
    );
}

#[test]
fn empty_expanded_feed_round_trip() {
    let model = model();
    let mut writer = PayloadWriter::new(TokenBuffer::new()).with_schema(&model);
    writer.start_entry(&alice()).unwrap();
    writer
        .start_navigation_link(&NavigationLink::new("Orders"))
        .unwrap();
    writer.start_feed(&Feed::new()).unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    assert!(reader.read_next().unwrap());
    let tree = read_entry_tree(&mut reader);
    let link = &tree.links[0];
    let inner = link.expanded_feed.as_ref().unwrap();
    assert!(inner.entries.is_empty());
}

#[test]
fn media_link_entry_round_trip() {
    let model = model();
    let mut photo = Entry::typed("Test.Photo");
    photo.id = Some("urn:photos:1".to_string());
    photo.media_resource = Some(StreamValue {
        read_link: Some("Photos(1)/$value".to_string()),
        edit_link: Some("Photos(1)/$value/edit".to_string()),
        content_type: Some("image/png".to_string()),
        etag: Some("W/\"media\"".to_string()),
    });
    photo.properties = vec![Property::new("Id", 1)];

    let mut writer = PayloadWriter::new(TokenBuffer::new()).with_schema(&model);
    writer.start_entry(&photo).unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    assert!(reader.read_next().unwrap());
    let tree = read_entry_tree(&mut reader);
    assert!(tree.entry.is_media_link_entry());
    assert_eq!(tree.entry.media_resource, photo.media_resource);
    assert_eq!(tree.entry.properties, photo.properties);
}

#[test]
fn request_mode_reference_link_round_trip() {
    let model = model();
    let mut writer = PayloadWriter::new(TokenBuffer::new())
        .with_schema(&model)
        .with_message(MessageKind::Request);
    writer.start_entry(&alice()).unwrap();
    writer
        .start_navigation_link(&NavigationLink::new("Orders"))
        .unwrap();
    writer
        .entity_reference_link(&EntityReferenceLink::new("Orders(7)"))
        .unwrap();
    writer.end().unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_entry(buf)
        .with_schema(&model)
        .with_message(MessageKind::Request);
    assert!(reader.read_next().unwrap());
    let tree = read_entry_tree(&mut reader);
    assert_eq!(tree.links.len(), 1);
    assert_eq!(
        tree.links[0].references,
        vec![EntityReferenceLink::new("Orders(7)")]
    );
}

#[test]
fn annotations_round_trip() {
    let mut property = Property::new("Data", 1);
    property.annotations.push(InstanceAnnotation::new(
        "org.display",
        PrimitiveValue::String("hint".to_string()),
    ));
    property.annotations.push(InstanceAnnotation::new(
        "org.key",
        PrimitiveValue::Guid("38cf68c2-4010-4ccc-8922-868217f03ddc".to_string()),
    ));
    let mut entry = Entry::new();
    entry.properties = vec![property.clone()];

    let mut writer = PayloadWriter::new(TokenBuffer::new());
    writer.start_entry(&entry).unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    let mut reader = PayloadReader::for_entry(buf);
    assert!(reader.read_next().unwrap());
    let tree = read_entry_tree(&mut reader);
    // The Int32 value carries a wire type annotation because nothing pins
    // it; the annotations themselves must survive unchanged.
    assert_eq!(tree.entry.properties[0].annotations, property.annotations);
}

// ============================================================================
// Depth guard
// ============================================================================

fn nested_complex(levels: usize) -> Value {
    let mut value = Value::Primitive(PrimitiveValue::Int32(1));
    for _ in 0..levels {
        value = Value::Complex(ComplexValue {
            type_name: None,
            properties: vec![Property {
                name: "Inner".to_string(),
                value,
                annotations: Vec::new(),
            }],
        });
    }
    value
}

#[test]
fn reader_depth_guard_boundary() {
    let mut entry = Entry::new();
    entry.properties = vec![Property::new("Deep", nested_complex(4))];
    let mut writer = PayloadWriter::new(TokenBuffer::new());
    writer.start_entry(&entry).unwrap();
    writer.end().unwrap();
    let buf = writer.finish().unwrap();

    // Exactly at the limit succeeds.
    let mut reader = PayloadReader::for_entry(buf.clone())
        .with_options(CodecOptions::new().with_max_nesting_depth(4));
    assert!(reader.read_next().unwrap());

    // One level past the limit fails with the depth error.
    let mut reader = PayloadReader::for_entry(buf)
        .with_options(CodecOptions::new().with_max_nesting_depth(3));
    assert!(matches!(
        reader.read_next(),
        Err(Error::DepthLimitExceeded(3))
    ));
}

// ============================================================================
// Duplicate names
// ============================================================================

fn entry_with_properties(names: &[&str]) -> TokenBuffer {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    buf.start_element(&atom(constants::CONTENT)).unwrap();
    buf.start_element(&meta(constants::PROPERTIES)).unwrap();
    for name in names {
        buf.start_element(&QName::new(constants::DATA_NS, name.to_string()))
            .unwrap();
        buf.text("x").unwrap();
        buf.end_element().unwrap();
    }
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf
}

#[test]
fn duplicate_property_in_one_entry_fails() {
    let buf = entry_with_properties(&["Name", "Name"]);
    let mut reader = PayloadReader::for_entry(buf);
    assert!(matches!(
        reader.read_next(),
        Err(Error::DuplicateName(name)) if name == "Name"
    ));
}

#[test]
fn same_name_in_sibling_entries_succeeds() {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::FEED)).unwrap();
    for _ in 0..2 {
        buf.start_element(&atom(constants::ENTRY)).unwrap();
        buf.start_element(&atom(constants::CONTENT)).unwrap();
        buf.start_element(&meta(constants::PROPERTIES)).unwrap();
        buf.start_element(&data("Name")).unwrap();
        buf.text("x").unwrap();
        buf.end_element().unwrap();
        buf.end_element().unwrap();
        buf.end_element().unwrap();
        buf.end_element().unwrap();
    }
    buf.end_element().unwrap();

    let mut reader = PayloadReader::for_feed(buf);
    assert!(reader.read_next().unwrap());
    let tree = read_feed_tree(&mut reader);
    assert_eq!(tree.entries.len(), 2);
}

#[test]
fn property_and_link_share_one_namespace() {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    buf.start_element(&atom(constants::CONTENT)).unwrap();
    buf.start_element(&meta(constants::PROPERTIES)).unwrap();
    buf.start_element(&data("Orders")).unwrap();
    buf.text("x").unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.start_element(&atom(constants::LINK)).unwrap();
    buf.attribute(&plain(constants::REL), &constants::navigation_rel("Orders"))
        .unwrap();
    buf.attribute(&plain(constants::HREF), "People(1)/Orders")
        .unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();

    let mut reader = PayloadReader::for_entry(buf);
    assert!(matches!(
        reader.read_next(),
        Err(Error::DuplicateName(name)) if name == "Orders"
    ));
}

// ============================================================================
// Media link entries
// ============================================================================

#[test]
fn default_stream_type_synthesizes_empty_media_resource() {
    let model = model();
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    buf.start_element(&atom(constants::ID)).unwrap();
    buf.text("urn:photos:1").unwrap();
    buf.end_element().unwrap();
    type_category(&mut buf, "Test.Photo");
    buf.end_element().unwrap();

    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    assert!(reader.read_next().unwrap());
    assert_eq!(reader.state(), ReaderState::EntryStart);
    // Synthesis happens when the entry end is surfaced.
    assert!(reader.read_next().unwrap());
    assert_eq!(reader.state(), ReaderState::EntryEnd);
    assert_eq!(
        reader.entry().unwrap().media_resource,
        Some(StreamValue::empty())
    );
}

#[test]
fn media_resource_validation_is_skipped_in_server_behavior() {
    use odata_format::FormatBehavior;

    let model = model();
    // A photo entry whose content element marks it as a non-media entry.
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    type_category(&mut buf, "Test.Photo");
    buf.start_element(&atom(constants::CONTENT)).unwrap();
    buf.attribute(&plain(constants::TYPE), constants::XML_CONTENT_TYPE)
        .unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();

    let mut reader = PayloadReader::for_entry(buf.clone()).with_schema(&model);
    reader.read_next().unwrap();
    assert!(matches!(
        reader.read_next(),
        Err(Error::MediaResourceRequired(_))
    ));

    let mut reader = PayloadReader::for_entry(buf)
        .with_schema(&model)
        .with_options(CodecOptions::new().with_behavior(FormatBehavior::Server));
    reader.read_next().unwrap();
    reader.read_next().unwrap();
    assert_eq!(reader.state(), ReaderState::EntryEnd);
}

#[test]
fn contradictory_media_evidence_fails() {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    // Edit-media link: media link entry evidence.
    buf.start_element(&atom(constants::LINK)).unwrap();
    buf.attribute(&plain(constants::REL), constants::EDIT_MEDIA_REL)
        .unwrap();
    buf.attribute(&plain(constants::HREF), "Photos(1)/$value")
        .unwrap();
    buf.end_element().unwrap();
    // Content element without src: contradicting evidence.
    buf.start_element(&atom(constants::CONTENT)).unwrap();
    buf.attribute(&plain(constants::TYPE), constants::XML_CONTENT_TYPE)
        .unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();

    let mut reader = PayloadReader::for_entry(buf);
    assert!(matches!(
        reader.read_next(),
        Err(Error::MediaEntryMismatch(_))
    ));
}

// ============================================================================
// Navigation cardinality
// ============================================================================

fn entry_with_inline(link_name: &str, inline_child: Option<&'static str>) -> TokenBuffer {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    type_category(&mut buf, "Test.Person");
    buf.start_element(&atom(constants::LINK)).unwrap();
    buf.attribute(&plain(constants::REL), &constants::navigation_rel(link_name))
        .unwrap();
    buf.start_element(&meta(constants::INLINE)).unwrap();
    if let Some(child) = inline_child {
        buf.start_element(&atom(child)).unwrap();
        buf.end_element().unwrap();
    }
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf
}

#[test]
fn expanded_entry_in_collection_link_fails() {
    let model = model();
    let buf = entry_with_inline("Orders", Some(constants::ENTRY));
    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    reader.read_next().unwrap();
    reader.read_next().unwrap();
    assert_eq!(reader.state(), ReaderState::NavigationLinkStart);
    assert!(matches!(
        reader.read_next(),
        Err(Error::ExpandedEntryInCollectionLink(name)) if name == "Orders"
    ));
}

#[test]
fn expanded_feed_in_single_valued_link_fails() {
    let model = model();
    let buf = entry_with_inline("BestFriend", Some(constants::FEED));
    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    reader.read_next().unwrap();
    reader.read_next().unwrap();
    assert!(matches!(
        reader.read_next(),
        Err(Error::ExpandedFeedInSingleLink(name)) if name == "BestFriend"
    ));
}

#[test]
fn empty_inline_on_collection_link_is_an_empty_feed() {
    let model = model();
    let buf = entry_with_inline("Orders", None);
    let mut reader = PayloadReader::for_entry(buf).with_schema(&model);
    assert!(reader.read_next().unwrap());
    let tree = read_entry_tree(&mut reader);
    let link = &tree.links[0];
    assert_eq!(link.link.is_collection, Some(true));
    let inner = link.expanded_feed.as_ref().unwrap();
    assert!(inner.entries.is_empty());
}

// ============================================================================
// Open vs closed typing
// ============================================================================

fn nickname_payload() -> TokenBuffer {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    type_category(&mut buf, "Test.Plain");
    buf.start_element(&atom(constants::CONTENT)).unwrap();
    buf.start_element(&meta(constants::PROPERTIES)).unwrap();
    buf.start_element(&data("Id")).unwrap();
    buf.attribute(&meta(constants::TYPE), "Edm.Int32").unwrap();
    buf.text("1").unwrap();
    buf.end_element().unwrap();
    buf.start_element(&data("Nickname")).unwrap();
    buf.text("Al").unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf
}

fn plain_person(open: bool) -> Model {
    let mut model = Model::new();
    let mut person = EntityType::new("Test.Plain");
    person.open = open;
    person.properties.push(StructuralProperty::new(
        "Id",
        PropertyType::primitive(PrimitiveKind::Int32),
    ));
    person.properties.push(StructuralProperty::new(
        "Name",
        PropertyType::nullable(PrimitiveKind::String),
    ));
    model.add_entity_type(person);
    model
}

#[test]
fn undeclared_property_on_closed_type_fails() {
    let model = plain_person(false);
    let mut reader = PayloadReader::for_entry(nickname_payload()).with_schema(&model);
    assert!(matches!(
        reader.read_next(),
        Err(Error::UndeclaredProperty { property, .. }) if property == "Nickname"
    ));
}

#[test]
fn undeclared_property_on_open_type_is_dynamic() {
    let model = plain_person(true);
    let mut reader = PayloadReader::for_entry(nickname_payload()).with_schema(&model);
    assert!(reader.read_next().unwrap());
    let entry = reader.entry().unwrap();
    assert_eq!(
        entry.property("Nickname").unwrap().value,
        Value::Primitive(PrimitiveValue::String("Al".to_string()))
    );
}

#[test]
fn undeclared_property_can_be_ignored() {
    let model = plain_person(false);
    let mut reader = PayloadReader::for_entry(nickname_payload())
        .with_schema(&model)
        .with_options(CodecOptions::new().with_undeclared_values_ignored(true));
    assert!(reader.read_next().unwrap());
    let entry = reader.entry().unwrap();
    assert!(entry.property("Nickname").is_none());
    assert!(entry.property("Id").is_some());
}

// ============================================================================
// Undeclared navigation links
// ============================================================================

fn shadow_link_payload() -> TokenBuffer {
    let mut buf = TokenBuffer::new();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    type_category(&mut buf, "Test.Plain");
    buf.start_element(&atom(constants::LINK)).unwrap();
    buf.attribute(&plain(constants::REL), &constants::navigation_rel("Shadow"))
        .unwrap();
    buf.start_element(&meta(constants::INLINE)).unwrap();
    buf.start_element(&atom(constants::ENTRY)).unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf.end_element().unwrap();
    buf
}

#[test]
fn undeclared_link_is_rejected_by_default() {
    let model = plain_person(false);
    let mut reader = PayloadReader::for_entry(shadow_link_payload()).with_schema(&model);
    assert!(matches!(
        reader.read_next(),
        Err(Error::UndeclaredLink { link, .. }) if link == "Shadow"
    ));
}

#[test]
fn undeclared_link_with_content_can_be_demoted() {
    let model = plain_person(false);
    let options = CodecOptions::new()
        .with_undeclared_links_reported(true)
        .with_undeclared_values_ignored(true);
    let mut reader = PayloadReader::for_entry(shadow_link_payload())
        .with_schema(&model)
        .with_options(options);
    let mut states = Vec::new();
    while reader.read_next().unwrap() {
        states.push(reader.state());
    }
    // Demoted to a deferred link; the inline content is skipped.
    assert_eq!(
        states,
        vec![
            ReaderState::EntryStart,
            ReaderState::NavigationLinkStart,
            ReaderState::NavigationLinkEnd,
            ReaderState::EntryEnd,
        ]
    );
}

#[test]
fn undeclared_link_with_content_fails_when_not_ignored() {
    let model = plain_person(false);
    let options = CodecOptions::new().with_undeclared_links_reported(true);
    let mut reader = PayloadReader::for_entry(shadow_link_payload())
        .with_schema(&model)
        .with_options(options);
    reader.read_next().unwrap();
    reader.read_next().unwrap();
    assert!(matches!(
        reader.read_next(),
        Err(Error::UndeclaredLink { link, .. }) if link == "Shadow"
    ));
}
