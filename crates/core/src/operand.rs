//! Operand values captured from traced calls.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A captured call argument or return value
///
/// Operands serialize to plain JSON. Values JSON cannot carry (opaque
/// handles, non-finite floats) are written as their string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", from = "Value")]
pub enum Operand {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Ordered sequence
    List(Vec<Operand>),
    /// Keyed mapping, iterated in key order
    Map(BTreeMap<String, Operand>),
    /// Value that only has a human-readable form
    Display(String),
    /// Value with no readable form, identified by type and address
    Opaque {
        /// Short type name
        type_name: String,
        /// Identity of the value (its address at capture time)
        identity: usize,
    },
}

impl Operand {
    /// Capture a value through its `Display` implementation
    pub fn display<T: std::fmt::Display + ?Sized>(value: &T) -> Self {
        Operand::Display(value.to_string())
    }

    /// Capture a value that has no readable form
    pub fn opaque<T: ?Sized>(value: &T) -> Self {
        Operand::Opaque {
            type_name: short_type_name(std::any::type_name::<T>()).to_string(),
            identity: value as *const T as *const () as usize,
        }
    }

    /// True for [`Operand::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Null)
    }
}

/// Strip module paths and generic parameters from a type name
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl From<Operand> for Value {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Null => Value::Null,
            Operand::Bool(b) => Value::Bool(b),
            Operand::Int(i) => Value::from(i),
            Operand::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            Operand::Str(s) | Operand::Display(s) => Value::String(s),
            Operand::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Operand::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            opaque @ Operand::Opaque { .. } => Value::String(crate::render::print_operand(&opaque)),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            Value::Bool(b) => Operand::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Operand::Int(i),
                None => Operand::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Operand::Str(s),
            Value::Array(items) => Operand::List(items.into_iter().map(Operand::from).collect()),
            Value::Object(entries) => Operand::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Operand::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<()> for Operand {
    fn from(_: ()) -> Self {
        Operand::Null
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Bool(b)
    }
}

macro_rules! int_operand {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(i: $t) -> Self {
                Operand::Int(i64::from(i))
            }
        })*
    };
}

int_operand!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Operand {
    fn from(i: u64) -> Self {
        i64::try_from(i)
            .map(Operand::Int)
            .unwrap_or_else(|_| Operand::Display(i.to_string()))
    }
}

impl From<usize> for Operand {
    fn from(i: usize) -> Self {
        Operand::from(i as u64)
    }
}

impl From<f32> for Operand {
    fn from(f: f32) -> Self {
        Operand::Float(f64::from(f))
    }
}

impl From<f64> for Operand {
    fn from(f: f64) -> Self {
        Operand::Float(f)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Str(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Str(s)
    }
}

impl<T: Into<Operand>> From<Option<T>> for Operand {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Operand::Null)
    }
}

impl<T: Into<Operand>> From<Vec<T>> for Operand {
    fn from(items: Vec<T>) -> Self {
        Operand::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Operand>> From<&[T]> for Operand {
    fn from(items: &[T]) -> Self {
        Operand::List(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Operand>> From<BTreeMap<String, T>> for Operand {
    fn from(entries: BTreeMap<String, T>) -> Self {
        Operand::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Operand>> From<HashMap<String, T>> for Operand {
    fn from(entries: HashMap<String, T>) -> Self {
        Operand::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Handle;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec");
        assert_eq!(short_type_name("my_crate::db::Pool"), "Pool");
        assert_eq!(short_type_name("u32"), "u32");
    }

    #[test]
    fn test_opaque_captures_type_name() {
        let handle = Handle;
        match Operand::opaque(&handle) {
            Operand::Opaque { type_name, .. } => assert_eq!(type_name, "Handle"),
            other => panic!("unexpected operand: {:?}", other),
        }
    }

    #[test]
    fn test_opaque_serializes_as_string() {
        let handle = Handle;
        let operand = Operand::opaque(&handle);
        let json = serde_json::to_value(&operand).unwrap();
        let text = json.as_str().unwrap();
        assert!(text.starts_with("Handle@"));
    }

    #[test]
    fn test_non_finite_float_serializes_as_string() {
        let json = serde_json::to_value(Operand::Float(f64::INFINITY)).unwrap();
        assert_eq!(json, Value::String("inf".to_string()));
    }

    #[test]
    fn test_json_numbers_keep_integer_kind() {
        let operand: Operand = serde_json::from_str("[1, 2.5, null]").unwrap();
        assert_eq!(
            operand,
            Operand::List(vec![Operand::Int(1), Operand::Float(2.5), Operand::Null])
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Operand::from(None::<i32>), Operand::Null);
        assert_eq!(Operand::from(Some("x")), Operand::Str("x".to_string()));
    }
}
