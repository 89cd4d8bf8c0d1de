use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Represents a host value.
///
/// Object and class references are carried as their handle path
/// (a `String` like `::shapes::circle1`), the way the host itself
/// addresses commands, so this enum stays free of runtime types.
#[derive(Clone)]
pub enum Value {
    /// The empty value.
    Nil,
    /// A boolean value (**true** or **false**).
    Boolean(bool),
    /// An integer value.
    Integer(i64),
    /// A big integer value (arbitrarily big).
    BigInteger(BigInt),
    /// A floating-point value.
    Double(f64),
    /// A string value.
    String(Rc<String>),
    /// A list of values.
    List(Rc<Vec<Self>>),
}

impl Value {
    /// Make a string value from anything string-like.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(Rc::new(value.into()))
    }

    /// Whether this value is the empty value.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// View this value as an `i64`, if it is an integer that fits.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::BigInteger(value) => value.to_i64(),
            _ => None,
        }
    }

    /// View this value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Nil
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, ""),
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Integer(value) => write!(f, "{}", value),
            Self::BigInteger(value) => write!(f, "{}", value),
            Self::Double(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
            Self::List(values) => {
                let strings: Vec<String> = values.iter().map(Value::to_string).collect();
                write!(f, "{}", strings.join(" "))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a.eq(b),
            (Self::Integer(a), Self::Integer(b)) => a.eq(b),
            (Self::Integer(a), Self::Double(b)) | (Self::Double(b), Self::Integer(a)) => {
                (*a as f64).eq(b)
            }
            (Self::Double(a), Self::Double(b)) => a.eq(b),
            (Self::BigInteger(a), Self::BigInteger(b)) => a.eq(b),
            (Self::BigInteger(a), Self::Integer(b)) | (Self::Integer(b), Self::BigInteger(a)) => {
                a.eq(&BigInt::from(*b))
            }
            (Self::String(a), Self::String(b)) => a.eq(b),
            (Self::List(a), Self::List(b)) => a.eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.debug_tuple("Nil").finish(),
            Self::Boolean(val) => f.debug_tuple("Boolean").field(val).finish(),
            Self::Integer(val) => f.debug_tuple("Integer").field(val).finish(),
            Self::BigInteger(val) => f.debug_tuple("BigInteger").field(val).finish(),
            Self::Double(val) => f.debug_tuple("Double").field(val).finish(),
            Self::String(val) => f.debug_tuple("String").field(val).finish(),
            Self::List(val) => f.debug_tuple("List").field(val).finish(),
        }
    }
}
