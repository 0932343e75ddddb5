//! Attribute values: the tagged union stored by the backend.
//!
//! `AttrValue` mirrors the backend's wire-level data model. The diff and
//! expression paths operate on the first six variants only; binary and set
//! variants pass through reads untouched but cannot be diffed or rendered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// An item or nested map of attributes.
///
/// Sorted keys keep diff output and rendered statements deterministic for
/// identical inputs.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A single stored attribute value.
///
/// Numbers are carried as their literal decimal rendering (the backend's
/// number type is a string on the wire), which keeps round-trips exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// String.
    S(String),
    /// Number, as its literal rendering.
    N(String),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null.
    #[serde(rename = "NULL")]
    Null,
    /// List of values.
    L(Vec<AttrValue>),
    /// Map of values.
    M(AttrMap),
    /// Binary blob. Not supported by the diff/expression path.
    B(Vec<u8>),
    /// String set. Not supported by the diff/expression path.
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    /// Number set. Not supported by the diff/expression path.
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Binary set. Not supported by the diff/expression path.
    #[serde(rename = "BS")]
    Bs(Vec<Vec<u8>>),
}

impl AttrValue {
    /// Convert a JSON value into an attribute value.
    ///
    /// Every JSON value is representable: numbers keep their literal
    /// rendering, objects become sorted maps.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Number(n) => AttrValue::N(n.to_string()),
            Value::String(s) => AttrValue::S(s),
            Value::Array(items) => AttrValue::L(items.into_iter().map(Self::from_json).collect()),
            Value::Object(fields) => AttrValue::M(
                fields
                    .into_iter()
                    .map(|(name, v)| (name, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into a JSON value.
    ///
    /// Fails on binary/set variants (they have no JSON payload shape) and on
    /// number literals that do not parse.
    pub fn into_json(self) -> Result<Value> {
        match self {
            AttrValue::S(s) => Ok(Value::String(s)),
            AttrValue::N(n) => n
                .parse::<serde_json::Number>()
                .map(Value::Number)
                .map_err(|_| Error::unexpected_response(format!("invalid number literal '{n}'"))),
            AttrValue::Bool(b) => Ok(Value::Bool(b)),
            AttrValue::Null => Ok(Value::Null),
            AttrValue::L(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(Self::into_json)
                    .collect::<Result<_>>()?,
            )),
            AttrValue::M(map) => Ok(Value::Object(
                map.into_iter()
                    .map(|(name, v)| v.into_json().map(|v| (name, v)))
                    .collect::<Result<_>>()?,
            )),
            other => Err(Error::unexpected_response(format!(
                "cannot decode {} attribute into a payload",
                other.type_name()
            ))),
        }
    }

    /// The stored string, if this is an `S` value.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// The number literal, if this is an `N` value.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttrValue::N(n) => Some(n),
            _ => None,
        }
    }

    /// Human-readable name of this variant's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::S(_) => "String",
            AttrValue::N(_) => "Number",
            AttrValue::Bool(_) => "Boolean",
            AttrValue::Null => "Null",
            AttrValue::L(_) => "List",
            AttrValue::M(_) => "Map",
            AttrValue::B(_) => "Binary",
            AttrValue::Ss(_) => "String Set",
            AttrValue::Ns(_) => "Number Set",
            AttrValue::Bs(_) => "Binary Set",
        }
    }

    /// Whether the diff/expression path can operate on this variant.
    pub(crate) fn is_diffable(&self) -> bool {
        matches!(
            self,
            AttrValue::S(_)
                | AttrValue::N(_)
                | AttrValue::Bool(_)
                | AttrValue::Null
                | AttrValue::L(_)
                | AttrValue::M(_)
        )
    }
}

/// The failure produced when the diff/expression path meets a variant it
/// does not support.
pub(crate) fn unsupported_attribute(value: &AttrValue) -> Error {
    Error::UnableToUpdate {
        reason: format!("Unable to handle {} types.", value.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_covers_all_shapes() {
        let value = AttrValue::from_json(json!({
            "name": "Alice",
            "age": 30,
            "active": true,
            "nickname": null,
            "tags": ["a", "b"],
            "address": {"city": "NYC"},
        }));

        let AttrValue::M(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(map["name"], AttrValue::S("Alice".into()));
        assert_eq!(map["age"], AttrValue::N("30".into()));
        assert_eq!(map["active"], AttrValue::Bool(true));
        assert_eq!(map["nickname"], AttrValue::Null);
        assert_eq!(
            map["tags"],
            AttrValue::L(vec![AttrValue::S("a".into()), AttrValue::S("b".into())])
        );
        match &map["address"] {
            AttrValue::M(inner) => assert_eq!(inner["city"], AttrValue::S("NYC".into())),
            other => panic!("expected nested map, got {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let original = json!({"a": 1, "b": [true, null, "x"], "c": {"d": 2.5}});
        let round_tripped = AttrValue::from_json(original.clone()).into_json().unwrap();
        assert_eq!(round_tripped, original);
    }

    #[test]
    fn test_wire_tag_names() {
        assert_eq!(
            serde_json::to_value(AttrValue::S("x".into())).unwrap(),
            json!({"S": "x"})
        );
        assert_eq!(
            serde_json::to_value(AttrValue::N("3".into())).unwrap(),
            json!({"N": "3"})
        );
        assert_eq!(
            serde_json::to_value(AttrValue::Bool(false)).unwrap(),
            json!({"BOOL": false})
        );
        assert_eq!(
            serde_json::to_value(AttrValue::Ss(vec!["a".into()])).unwrap(),
            json!({"SS": ["a"]})
        );
    }

    #[test]
    fn test_into_json_rejects_sets() {
        let err = AttrValue::Ns(vec!["1".into()]).into_json().unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }), "{err}");
    }

    #[test]
    fn test_invalid_number_literal() {
        let err = AttrValue::N("not-a-number".into()).into_json().unwrap_err();
        assert!(
            format!("{err}").contains("invalid number literal"),
            "{err}"
        );
    }
}
