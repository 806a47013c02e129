//! The value carried by a [`Var`](crate::var::Var).

use std::fmt;

/// A decoded (or to-be-encoded) value for one data descriptor.
///
/// BUFR fields are either numeric (transmitted as a scaled, reference-offset
/// integer) or character strings; [`Value`] keeps both the integer and
/// floating-point readings of a numeric field available, since callers may
/// want either the raw encoded integer or the scaled physical quantity.
/// A field with every bit of its width set to one is missing, which this
/// type represents as its own variant rather than as an absent `Option`, so
/// that missing-ness survives independently of which numeric representation
/// a caller asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value was transmitted (all-ones sentinel).
    Missing,
    /// A character string value.
    Str(String),
    /// An integer value, e.g. a code table entry or flag field.
    Int(i64),
    /// A floating point physical value, already scaled to its unit.
    Double(f64),
}

impl Value {
    /// Whether this value is the missing sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Borrow the value as a string, if it holds one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as `f64`, converting from whichever numeric
    /// representation it is stored as. Returns `None` for strings and for
    /// missing values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Read the value as `i64`, rounding a floating point reading to the
    /// nearest integer. Returns `None` for strings and for missing values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) => Some(d.round() as i64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "(missing)"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}
