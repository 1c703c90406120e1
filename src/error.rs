//! Protocol error type shared by the reader and the writer.
//!
//! Every failure is terminal for the current read or write: there is no
//! retry layer and no local recovery, and an instance that has reported an
//! error must not be driven further.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected {found} where {expected} was expected")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("'{0}' is not valid in the current writer scope")]
    UnexpectedWrite(&'static str),

    #[error("element '{0}' may appear at most once in its scope")]
    DuplicateElement(&'static str),

    #[error("duplicate property or link name '{0}'")]
    DuplicateName(String),

    #[error("duplicate instance annotation '{0}'")]
    DuplicateAnnotation(String),

    #[error("type '{actual}' is not assignable to expected type '{expected}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("unrecognized type name '{0}'")]
    InvalidTypeName(String),

    #[error("cannot interpret '{text}' as a value of kind {kind}")]
    InvalidPrimitive { kind: &'static str, text: String },

    #[error("'{member}' is not a member of enum type '{type_name}'")]
    InvalidEnumMember { type_name: String, member: String },

    #[error("property '{property}' is not declared on type '{type_name}', which is not open")]
    UndeclaredProperty {
        property: String,
        type_name: String,
    },

    #[error("navigation link '{link}' is not declared on type '{type_name}', which is not open")]
    UndeclaredLink { link: String, type_name: String },

    #[error("property '{0}' is not nullable")]
    NotNullable(String),

    #[error("property '{0}' carries a stream value, which is only valid for media resources")]
    UnexpectedStreamValue(String),

    #[error("collection items must be primitive, enum, complex or null values")]
    InvalidCollectionItem,

    #[error("maximum nesting depth of {0} exceeded")]
    DepthLimitExceeded(usize),

    #[error("navigation link '{0}' is collection-valued but contains an expanded entry")]
    ExpandedEntryInCollectionLink(String),

    #[error("navigation link '{0}' is single-valued but contains an expanded feed")]
    ExpandedFeedInSingleLink(String),

    #[error("element '{0}' contradicts earlier media link entry evidence")]
    MediaEntryMismatch(&'static str),

    #[error("type '{0}' does not declare a media resource but the entry carries one")]
    MediaResourceNotAllowed(String),

    #[error("type '{0}' declares a media resource but the entry does not carry one")]
    MediaResourceRequired(String),

    #[error("entity reference links are only valid in request payloads")]
    ReferenceLinkInResponse,

    #[error("navigation link '{0}' mixes reference links with expanded content")]
    MixedLinkContent(String),

    #[error("a type name is required to write the value of '{0}'")]
    MissingTypeName(String),

    #[error("required attribute '{0}' is missing")]
    MissingAttribute(&'static str),

    #[error("the instance is not reusable after a failure")]
    Unusable,

    #[error("token cursor failure")]
    Cursor(#[source] std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Cursor(err)
    }
}
