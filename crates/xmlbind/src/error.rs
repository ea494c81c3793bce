use thiserror::Error;

/// Errors raised by the binding runtime.
///
/// Declaration errors (duplicate property, unresolvable type) leave the
/// graph unusable; usage errors are call-site mistakes and never mutate
/// anything. `Vetoed` is the one "expected" failure: a listener rejected a
/// mutation that is guaranteed not to have happened.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("duplicate property `{0}`")]
    DuplicateProperty(String),
    #[error("unknown property `{0}`")]
    UnknownProperty(String),
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    #[error("unknown node type `{0}`")]
    UnknownType(String),
    #[error("malformed attribute declaration: {0}")]
    MalformedAttrDecl(String),
    #[error("index {index} out of bounds for `{name}` (size {size})")]
    IndexOutOfBounds {
        name: String,
        index: usize,
        size: usize,
    },
    #[error("property `{0}` is not indexed")]
    NotIndexed(String),
    #[error("property `{0}` is indexed")]
    Indexed(String),
    #[error("no element with id {id:#x} in `{name}`")]
    UnknownId { name: String, id: u64 },
    #[error("value is already attached to this document; clone it first")]
    AlreadyAttached,
    #[error("attribute `{0}` is #FIXED and cannot be changed")]
    FixedAttribute(String),
    #[error("`{value}` is not a legal value for enumerated attribute `{name}`")]
    EnumViolation { name: String, value: String },
    #[error("type mismatch for `{name}`: expected {expected}")]
    TypeMismatch { name: String, expected: String },
    #[error("cannot merge `{left}` with `{right}`: incompatible bean types")]
    MergeMismatch { left: String, right: String },
    #[error("bean is not attached to a document")]
    NotAttached,
    #[error("change to `{path}` vetoed: {reason}")]
    Vetoed { path: String, reason: String },
    #[error(transparent)]
    Xml(#[from] xmlbind_dom::XmlError),
}
