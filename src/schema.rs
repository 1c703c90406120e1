//! Schema provider contract and the in-memory model.
//!
//! The schema is an optional external collaborator: the codec asks it
//! whether a property is declared, whether a type is open, what primitive
//! kind a property has, and whether an entity type carries a default
//! stream. Every caller tolerates an absent provider by treating all
//! properties and types as open and undeclared.

use std::collections::HashMap;

/// Primitive value kinds understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Boolean,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    DateTimeOffset,
    Stream,
}

impl PrimitiveKind {
    /// The wire name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::Int16 => "Edm.Int16",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Int64 => "Edm.Int64",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Decimal => "Edm.Decimal",
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::Guid => "Edm.Guid",
            PrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveKind::Stream => "Edm.Stream",
        }
    }

    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        Some(match name {
            "Edm.Boolean" => PrimitiveKind::Boolean,
            "Edm.Int16" => PrimitiveKind::Int16,
            "Edm.Int32" => PrimitiveKind::Int32,
            "Edm.Int64" => PrimitiveKind::Int64,
            "Edm.Single" => PrimitiveKind::Single,
            "Edm.Double" => PrimitiveKind::Double,
            "Edm.Decimal" => PrimitiveKind::Decimal,
            "Edm.String" => PrimitiveKind::String,
            "Edm.Guid" => PrimitiveKind::Guid,
            "Edm.DateTimeOffset" => PrimitiveKind::DateTimeOffset,
            "Edm.Stream" => PrimitiveKind::Stream,
            _ => return None,
        })
    }
}

/// The item type name of a `Collection(...)` wire type name, if it is one.
pub fn collection_item_type_name(name: &str) -> Option<&str> {
    name.strip_prefix("Collection(")?.strip_suffix(')')
}

/// The `Collection(...)` wire type name for an item type name.
pub fn collection_type_name(item: &str) -> String {
    format!("Collection({})", item)
}

/// Declared type of a structural property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyType {
    Primitive { kind: PrimitiveKind, nullable: bool },
    Enum { name: String, nullable: bool },
    Complex { name: String, nullable: bool },
    Collection { item: Box<PropertyType> },
}

impl PropertyType {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        PropertyType::Primitive {
            kind,
            nullable: false,
        }
    }

    pub fn nullable(kind: PrimitiveKind) -> Self {
        PropertyType::Primitive {
            kind,
            nullable: true,
        }
    }

    /// Whether a null value is acceptable for this type.
    pub fn is_nullable(&self) -> bool {
        match self {
            PropertyType::Primitive { nullable, .. }
            | PropertyType::Enum { nullable, .. }
            | PropertyType::Complex { nullable, .. } => *nullable,
            PropertyType::Collection { .. } => false,
        }
    }

    /// The wire type name for this declared type.
    pub fn type_name(&self) -> String {
        match self {
            PropertyType::Primitive { kind, .. } => kind.name().to_string(),
            PropertyType::Enum { name, .. } | PropertyType::Complex { name, .. } => name.clone(),
            PropertyType::Collection { item } => collection_type_name(&item.type_name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuralProperty {
    pub name: String,
    pub ty: PropertyType,
}

impl StructuralProperty {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        StructuralProperty {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    pub name: String,
    /// Entity type name of the link target.
    pub target_type: String,
    /// True for collection-valued navigation.
    pub collection: bool,
}

impl NavigationProperty {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>, collection: bool) -> Self {
        NavigationProperty {
            name: name.into(),
            target_type: target_type.into(),
            collection,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityType {
    pub name: String,
    pub base_type: Option<String>,
    pub open: bool,
    /// True when the type declares a default media stream.
    pub has_default_stream: bool,
    pub properties: Vec<StructuralProperty>,
    pub navigation: Vec<NavigationProperty>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        EntityType {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn property(&self, name: &str) -> Option<&StructuralProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    #[inline(always)]
    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComplexType {
    pub name: String,
    pub open: bool,
    pub properties: Vec<StructuralProperty>,
}

impl ComplexType {
    pub fn new(name: impl Into<String>) -> Self {
        ComplexType {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn property(&self, name: &str) -> Option<&StructuralProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, members: &[&str]) -> Self {
        EnumType {
            name: name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[inline(always)]
    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// Answers the schema questions the codec needs for control flow.
pub trait SchemaProvider {
    fn entity_type(&self, name: &str) -> Option<&EntityType>;
    fn complex_type(&self, name: &str) -> Option<&ComplexType>;
    fn enum_type(&self, name: &str) -> Option<&EnumType>;

    /// Whether `candidate` names `expected` or a type derived from it.
    fn is_assignable(&self, expected: &str, candidate: &str) -> bool {
        let mut current = candidate.to_string();
        loop {
            if current == expected {
                return true;
            }
            match self.entity_type(&current).and_then(|t| t.base_type.clone()) {
                Some(base) => current = base,
                None => return false,
            }
        }
    }

    /// Look up a structural property on an entity type, walking the base
    /// type chain.
    fn entity_property(&self, type_name: &str, property: &str) -> Option<&StructuralProperty> {
        let mut ty = self.entity_type(type_name)?;
        loop {
            if let Some(p) = ty.property(property) {
                return Some(p);
            }
            ty = self.entity_type(ty.base_type.as_deref()?)?;
        }
    }

    /// Look up a navigation property on an entity type, walking the base
    /// type chain.
    fn entity_navigation(&self, type_name: &str, name: &str) -> Option<&NavigationProperty> {
        let mut ty = self.entity_type(type_name)?;
        loop {
            if let Some(p) = ty.navigation_property(name) {
                return Some(p);
            }
            ty = self.entity_type(ty.base_type.as_deref()?)?;
        }
    }
}

/// In-memory schema model.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entity_types: HashMap<String, EntityType>,
    complex_types: HashMap<String, ComplexType>,
    enum_types: HashMap<String, EnumType>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity_type(&mut self, ty: EntityType) -> &mut Self {
        self.entity_types.insert(ty.name.clone(), ty);
        self
    }

    pub fn add_complex_type(&mut self, ty: ComplexType) -> &mut Self {
        self.complex_types.insert(ty.name.clone(), ty);
        self
    }

    pub fn add_enum_type(&mut self, ty: EnumType) -> &mut Self {
        self.enum_types.insert(ty.name.clone(), ty);
        self
    }
}

impl SchemaProvider for Model {
    fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        self.complex_types.get(name)
    }

    fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enum_types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        let mut model = Model::new();
        let mut base = EntityType::new("Test.Base");
        base.properties
            .push(StructuralProperty::new("Id", PropertyType::primitive(PrimitiveKind::Int32)));
        let mut derived = EntityType::new("Test.Derived");
        derived.base_type = Some("Test.Base".to_string());
        derived.properties.push(StructuralProperty::new(
            "Name",
            PropertyType::primitive(PrimitiveKind::String),
        ));
        model.add_entity_type(base);
        model.add_entity_type(derived);
        model
    }

    #[test]
    fn property_lookup_walks_base_chain() {
        let model = model();
        assert!(model.entity_property("Test.Derived", "Id").is_some());
        assert!(model.entity_property("Test.Derived", "Name").is_some());
        assert!(model.entity_property("Test.Base", "Name").is_none());
    }

    #[test]
    fn assignability_follows_derivation() {
        let model = model();
        assert!(model.is_assignable("Test.Base", "Test.Derived"));
        assert!(model.is_assignable("Test.Base", "Test.Base"));
        assert!(!model.is_assignable("Test.Derived", "Test.Base"));
    }

    #[test]
    fn collection_type_names() {
        assert_eq!(collection_item_type_name("Collection(Edm.Int32)"), Some("Edm.Int32"));
        assert_eq!(collection_item_type_name("Edm.Int32"), None);
        assert_eq!(collection_type_name("Edm.String"), "Collection(Edm.String)");
    }

    #[test]
    fn primitive_kind_round_trips_names() {
        for kind in [
            PrimitiveKind::Boolean,
            PrimitiveKind::Int64,
            PrimitiveKind::Double,
            PrimitiveKind::Stream,
        ] {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_name("Edm.Unknown"), None);
    }
}
