//! Typed property values and their string wire format.

use std::fmt;

use crate::error::BindError;
use crate::flags::ValueKind;

/// Index of a bean container in its graph's arena.
///
/// A `BeanId` is only meaningful together with the [`Graph`](crate::Graph)
/// that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeanId(pub(crate) u32);

impl BeanId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bean#{}", self.0)
    }
}

/// One property value.
///
/// Scalars round-trip as strings at the DOM boundary; `Bean` values are
/// structural and point back into the owning graph's arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Comment(String),
    Bean(BeanId),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Comment(_) => ValueKind::Comment,
            Value::Bean(_) => ValueKind::Bean,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Comment(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bean(&self) -> Option<BeanId> {
        match self {
            Value::Bean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String form written into the DOM. `None` for beans, which have a
    /// structural rather than textual representation.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Value::Text(s) | Value::Comment(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(x) => Some(x.to_string()),
            Value::Bean(_) => None,
        }
    }

    /// Parse a DOM string into a value of the declared kind.
    ///
    /// Boolean text follows element semantics: anything other than
    /// `"false"`/`"0"` (including empty) reads as true.
    pub fn from_wire(kind: ValueKind, text: &str, name: &str) -> Result<Value, BindError> {
        match kind {
            ValueKind::Text => Ok(Value::Text(text.to_string())),
            ValueKind::Comment => Ok(Value::Comment(text.to_string())),
            ValueKind::Boolean => Ok(Value::Bool(parse_bool_text(text))),
            ValueKind::Int => {
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| BindError::TypeMismatch {
                        name: name.to_string(),
                        expected: "integer".to_string(),
                    })
            }
            ValueKind::Float => {
                text.trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| BindError::TypeMismatch {
                        name: name.to_string(),
                        expected: "float".to_string(),
                    })
            }
            ValueKind::Bean => Err(BindError::TypeMismatch {
                name: name.to_string(),
                expected: "bean".to_string(),
            }),
        }
    }

    /// Check that this value is acceptable for a property of `kind`.
    pub fn check_kind(&self, kind: ValueKind, name: &str) -> Result<(), BindError> {
        if self.kind() == kind {
            Ok(())
        } else {
            Err(BindError::TypeMismatch {
                name: name.to_string(),
                expected: format!("{kind:?}"),
            })
        }
    }
}

/// Element-presence boolean text: absent handled by the caller, present
/// text is false only for the literals `false` and `0`.
pub(crate) fn parse_bool_text(text: &str) -> bool {
    !matches!(text.trim(), "false" | "0")
}
