//! Loosely typed payload values carried by calls, replies and signals.

use std::fmt;

/// A single value in a message body.
///
/// The transport hands bodies over as an ordered list of these. Consumers
/// pick out the shape they expect with the `as_*` accessors, which return
/// `None` instead of panicking when the value has a different type.
#[derive(Debug, Clone, PartialEq)]
pub enum BusValue {
    Bool(bool),
    Byte(u8),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    ObjectPath(String),
    Array(Vec<BusValue>),
    Struct(Vec<BusValue>),
    /// String keyed dictionary of variants (`a{sv}`), the usual shape of an
    /// options argument
    Dict(Vec<(String, BusValue)>),
    /// A value the adapter does not model, tagged with its wire signature
    Unsupported(String),
}

impl BusValue {
    /// Create a string value.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Create an object path value.
    pub fn object_path(path: impl Into<String>) -> Self {
        Self::ObjectPath(path.into())
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the value as a string. Object paths are not strings here.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_path(&self) -> Option<&str> {
        match self {
            Self::ObjectPath(p) => Some(p),
            _ => None,
        }
    }

    /// Interpret the value as an array of object paths (`ao`).
    pub fn as_object_paths(&self) -> Option<Vec<&str>> {
        match self {
            Self::Array(items) => items.iter().map(BusValue::as_object_path).collect(),
            _ => None,
        }
    }

    /// Interpret the value as a byte array (`ay`).
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Array(items) => items
                .iter()
                .map(|item| match item {
                    Self::Byte(b) => Some(*b),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::I32(_) => "int32",
            Self::U32(_) => "uint32",
            Self::I64(_) => "int64",
            Self::U64(_) => "uint64",
            Self::F64(_) => "double",
            Self::Str(_) => "string",
            Self::ObjectPath(_) => "object path",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Dict(_) => "dict",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl fmt::Display for BusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::ObjectPath(p) => write!(f, "{}", p),
            Self::Array(items) | Self::Struct(items) => {
                let open = if matches!(self, Self::Array(_)) { '[' } else { '(' };
                let close = if open == '[' { ']' } else { ')' };
                write!(f, "{}", open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "{}", close)
            }
            Self::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Self::Unsupported(sig) => write!(f, "<{}>", sig),
        }
    }
}

impl From<u32> for BusValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<bool> for BusValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for BusValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for BusValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
