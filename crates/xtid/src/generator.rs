//! The transaction generator capability.
//!
//! The algorithm that turns landing-page material into an
//! `x-client-transaction-id` lives outside this crate. The pipeline only needs
//! something that can be built from a [`Document`] plus the on-demand script
//! text, compute IDs, and report its internal state as typed attributes.

use async_trait::async_trait;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::types::{Document, TidResult};

/// Value of one generator attribute.
///
/// `Opaque` stands for a live resource (parsed DOM, session, process handle)
/// that has no data-interchange representation. `Bytes` is a raw byte string
/// and is never exported either; byte-valued state meant for export is a
/// `List` of `Int`s.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<AttributeValue>),
    Map(Vec<(String, AttributeValue)>),
    Opaque { type_name: String },
}

impl AttributeValue {
    /// Marker for a value bound to a live resource.
    pub fn opaque(type_name: impl Into<String>) -> Self {
        Self::Opaque {
            type_name: type_name.into(),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Self::Float(f) => Err(S::Error::custom(format!("non-finite float {f}"))),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bytes(bytes) => Err(S::Error::custom(format!(
                "byte string ({} bytes) has no JSON form",
                bytes.len()
            ))),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Opaque { type_name } => Err(S::Error::custom(format!(
                "{type_name} is not serialisable"
            ))),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// A built transaction generator.
#[async_trait(?Send)]
pub trait TransactionGenerator {
    /// Compute the transaction ID for `method` and URL `path`.
    async fn compute_transaction_id(&self, method: &str, path: &str) -> TidResult<String>;

    /// Internal derivation state, in insertion order.
    fn attributes(&self) -> Vec<(String, AttributeValue)>;
}

/// Builds a [`TransactionGenerator`] from the landing page and the on-demand script.
#[async_trait(?Send)]
pub trait GeneratorFactory {
    type Generator: TransactionGenerator;

    /// Fails with [`TidError::GeneratorConstruction`](crate::TidError::GeneratorConstruction)
    /// when the inputs lack the structures the generator needs.
    async fn build(&self, document: Document, ondemand_js: String) -> TidResult<Self::Generator>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_values_serialize() {
        let v = AttributeValue::Map(vec![
            ("key".into(), "abc".into()),
            ("n".into(), AttributeValue::Int(-3)),
            ("none".into(), AttributeValue::Null),
        ]);
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"key": "abc", "n": -3, "none": null})
        );
    }

    #[test]
    fn test_byte_string_fails_to_serialize() {
        assert!(serde_json::to_string(&AttributeValue::Bytes(vec![1, 2, 3])).is_err());
        assert!(serde_json::to_string(&AttributeValue::from(Vec::<u8>::new())).is_err());
    }

    #[test]
    fn test_opaque_fails_to_serialize() {
        assert!(serde_json::to_string(&AttributeValue::opaque("scraper::Html")).is_err());
    }

    #[test]
    fn test_nested_opaque_poisons_container() {
        let v = AttributeValue::List(vec![AttributeValue::Int(1), AttributeValue::opaque("Session")]);
        assert!(serde_json::to_string(&v).is_err());
    }

    #[test]
    fn test_non_finite_float_fails() {
        assert!(serde_json::to_string(&AttributeValue::Float(f64::NAN)).is_err());
        assert!(serde_json::to_string(&AttributeValue::Float(f64::INFINITY)).is_err());
        assert_eq!(serde_json::to_string(&AttributeValue::Float(0.5)).unwrap(), "0.5");
    }

    #[test]
    fn test_from_json_keeps_order_and_types() {
        let v = AttributeValue::from(json!({"z": 1, "a": [true, 1.5, "s"], "big": u64::MAX}));
        let AttributeValue::Map(entries) = v else {
            panic!("expected map");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "big"]);
        assert_eq!(entries[2].1, AttributeValue::UInt(u64::MAX));
        assert_eq!(
            entries[1].1,
            AttributeValue::List(vec![
                AttributeValue::Bool(true),
                AttributeValue::Float(1.5),
                AttributeValue::Str("s".into()),
            ])
        );
    }
}
