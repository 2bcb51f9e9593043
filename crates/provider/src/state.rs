//! Terraform State Management
//!
//! Handles encoding and decoding of Terraform values. Terraform sends
//! msgpack (with extension type 0 standing for "unknown until apply") and
//! stores raw state as JSON.

use anyhow::{Context, Result};
use rmpv::Value as MsgValue;
use std::collections::HashMap;

/// Dynamic value that can be encoded/decoded from Terraform state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Null,
    /// Known only after apply
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    /// Sets `key` when the value is an object; no-op otherwise.
    pub fn set(&mut self, key: &str, value: DynamicValue) {
        if let DynamicValue::Map(m) = self {
            m.insert(key.to_string(), value);
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown)
    }

    /// True when the value, and everything inside it, is known.
    pub fn is_wholly_known(&self) -> bool {
        match self {
            DynamicValue::Unknown => false,
            DynamicValue::List(l) => l.iter().all(DynamicValue::is_wholly_known),
            DynamicValue::Map(m) => m.values().all(DynamicValue::is_wholly_known),
            _ => true,
        }
    }

    fn from_msgpack(value: MsgValue) -> DynamicValue {
        match value {
            MsgValue::Nil => DynamicValue::Null,
            MsgValue::Boolean(b) => DynamicValue::Bool(b),
            MsgValue::Integer(i) => i
                .as_i64()
                .map(serde_json::Number::from)
                .or_else(|| i.as_u64().map(serde_json::Number::from))
                .map(DynamicValue::Number)
                .unwrap_or(DynamicValue::Null),
            MsgValue::F32(f) => float_value(f as f64),
            MsgValue::F64(f) => float_value(f),
            MsgValue::String(s) => match s.into_str() {
                Some(s) => DynamicValue::String(s),
                None => DynamicValue::Null,
            },
            MsgValue::Binary(b) => DynamicValue::String(String::from_utf8_lossy(&b).into_owned()),
            MsgValue::Array(items) => {
                DynamicValue::List(items.into_iter().map(DynamicValue::from_msgpack).collect())
            }
            MsgValue::Map(pairs) => DynamicValue::Map(
                pairs
                    .into_iter()
                    .filter_map(|(k, v)| {
                        let key = match k {
                            MsgValue::String(s) => s.into_str(),
                            _ => None,
                        }?;
                        Some((key, DynamicValue::from_msgpack(v)))
                    })
                    .collect(),
            ),
            MsgValue::Ext(_, _) => DynamicValue::Unknown,
        }
    }

    fn to_msgpack(&self) -> MsgValue {
        match self {
            DynamicValue::Null => MsgValue::Nil,
            DynamicValue::Unknown => MsgValue::Ext(0, vec![0]),
            DynamicValue::Bool(b) => MsgValue::Boolean(*b),
            DynamicValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MsgValue::from(i)
                } else if let Some(u) = n.as_u64() {
                    MsgValue::from(u)
                } else {
                    MsgValue::F64(n.as_f64().unwrap_or_default())
                }
            }
            DynamicValue::String(s) => MsgValue::from(s.as_str()),
            DynamicValue::List(items) => {
                MsgValue::Array(items.iter().map(DynamicValue::to_msgpack).collect())
            }
            DynamicValue::Map(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                MsgValue::Map(
                    keys.into_iter()
                        .map(|k| (MsgValue::from(k.as_str()), map[k].to_msgpack()))
                        .collect(),
                )
            }
        }
    }

    /// Converts a JSON document (stored raw state) into a value.
    pub fn from_json(value: serde_json::Value) -> DynamicValue {
        match value {
            serde_json::Value::Null => DynamicValue::Null,
            serde_json::Value::Bool(b) => DynamicValue::Bool(b),
            serde_json::Value::Number(n) => DynamicValue::Number(n),
            serde_json::Value::String(s) => DynamicValue::String(s),
            serde_json::Value::Array(items) => {
                DynamicValue::List(items.into_iter().map(DynamicValue::from_json).collect())
            }
            serde_json::Value::Object(map) => DynamicValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, DynamicValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering, unknowns become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DynamicValue::Null | DynamicValue::Unknown => serde_json::Value::Null,
            DynamicValue::Bool(b) => serde_json::Value::Bool(*b),
            DynamicValue::Number(n) => serde_json::Value::Number(n.clone()),
            DynamicValue::String(s) => serde_json::Value::String(s.clone()),
            DynamicValue::List(items) => {
                serde_json::Value::Array(items.iter().map(DynamicValue::to_json).collect())
            }
            DynamicValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Decode a Terraform DynamicValue from msgpack bytes
pub fn decode_dynamic_value(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }

    let mut reader = data;
    let value = rmpv::decode::read_value(&mut reader).context("invalid msgpack value")?;
    Ok(DynamicValue::from_msgpack(value))
}

/// Encode a value to Terraform DynamicValue bytes
pub fn encode_dynamic_value(value: &DynamicValue) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    rmpv::encode::write_value(&mut bytes, &value.to_msgpack())?;
    Ok(bytes)
}

/// Decode stored JSON state
pub fn decode_json_state(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    let json: serde_json::Value = serde_json::from_slice(data).context("invalid JSON state")?;
    Ok(DynamicValue::from_json(json))
}

/// Helper to extract a string attribute from a DynamicValue
pub fn get_string_attr(value: &DynamicValue, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_string())
        .unwrap_or("")
        .to_string()
}

/// Helper to extract an optional string attribute from a DynamicValue
pub fn get_optional_string_attr(value: &DynamicValue, key: &str) -> Option<String> {
    value.get(key).and_then(|v| match v {
        DynamicValue::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// Helper to extract an integer attribute from a DynamicValue
pub fn get_int_attr(value: &DynamicValue, key: &str, default: i64) -> i64 {
    value.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

/// Helper to extract a bool attribute from a DynamicValue
pub fn get_bool_attr(value: &DynamicValue, key: &str, default: bool) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Elements of a list, set or nested attribute; empty when null or unknown.
pub fn get_list_attr<'a>(value: &'a DynamicValue, key: &str) -> &'a [DynamicValue] {
    value.get(key).and_then(|v| v.as_list()).unwrap_or(&[])
}

/// String elements of a list or set attribute.
pub fn get_string_list_attr(value: &DynamicValue, key: &str) -> Vec<String> {
    get_list_attr(value, key)
        .iter()
        .filter_map(|v| v.as_string().map(str::to_string))
        .collect()
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Create a string DynamicValue
pub fn string_value(s: impl Into<String>) -> DynamicValue {
    DynamicValue::String(s.into())
}

/// Null for empty strings, so unset optional attributes do not drift.
pub fn optional_string_value(s: impl Into<String>) -> DynamicValue {
    let s = s.into();
    if s.is_empty() {
        DynamicValue::Null
    } else {
        DynamicValue::String(s)
    }
}

/// Create a number DynamicValue from i64
pub fn int_value(n: i64) -> DynamicValue {
    DynamicValue::Number(serde_json::Number::from(n))
}

/// Create a number DynamicValue from f64
pub fn float_value(n: f64) -> DynamicValue {
    serde_json::Number::from_f64(n)
        .map(DynamicValue::Number)
        .unwrap_or(DynamicValue::Null)
}

/// Create a bool DynamicValue
pub fn bool_value(b: bool) -> DynamicValue {
    DynamicValue::Bool(b)
}

/// Create a list (or set) of strings
pub fn string_list_value<I, S>(items: I) -> DynamicValue
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    DynamicValue::List(items.into_iter().map(|s| string_value(s)).collect())
}

/// Create a list of objects
pub fn list_value(items: Vec<DynamicValue>) -> DynamicValue {
    DynamicValue::List(items)
}

/// Create a null DynamicValue
pub fn null_value() -> DynamicValue {
    DynamicValue::Null
}

/// State for a collection the API returned empty: `[]` when `known` (plan or
/// prior state) held an empty list under `key`, null otherwise.
pub fn empty_list_as(known: &DynamicValue, key: &str) -> DynamicValue {
    match known.get(key) {
        Some(DynamicValue::List(items)) if items.is_empty() => DynamicValue::List(Vec::new()),
        _ => DynamicValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msgpack_keeps_unknown_and_nesting() {
        let value = make_state(vec![
            ("id", DynamicValue::Unknown),
            ("name", string_value("web")),
            ("count", int_value(3)),
            ("ratio", float_value(0.5)),
            ("enabled", bool_value(true)),
            ("description", null_value()),
            (
                "rules",
                list_value(vec![make_state(vec![("port", string_value("443"))])]),
            ),
        ]);

        let bytes = encode_dynamic_value(&value).unwrap();
        let decoded = decode_dynamic_value(&bytes).unwrap();
        assert_eq!(decoded, value);
        assert!(decoded.get("id").unwrap().is_unknown());
        assert!(!decoded.is_wholly_known());
    }

    #[test]
    fn test_terraform_unknown_extension() {
        // fixext1, type 0, as written by Terraform for unknown values
        let decoded = decode_dynamic_value(&[0xd4, 0x00, 0x00]).unwrap();
        assert!(decoded.is_unknown());
        assert_eq!(
            encode_dynamic_value(&DynamicValue::Unknown).unwrap(),
            vec![0xd4, 0x00, 0x00]
        );
    }

    #[test]
    fn test_empty_payload_is_null() {
        assert!(decode_dynamic_value(&[]).unwrap().is_null());
        assert!(decode_json_state(&[]).unwrap().is_null());
    }

    #[test]
    fn test_json_state() {
        let state = decode_json_state(
            br#"{"id":"urn:vcloud:vdcGroup:1","vdc_ids":["a","b"],"dfw":true}"#,
        )
        .unwrap();
        assert_eq!(get_string_attr(&state, "id"), "urn:vcloud:vdcGroup:1");
        assert_eq!(get_string_list_attr(&state, "vdc_ids"), vec!["a", "b"]);
        assert!(get_bool_attr(&state, "dfw", false));
        assert_eq!(state.to_json()["vdc_ids"][1], "b");
    }

    #[test]
    fn test_attribute_helpers() {
        let state = make_state(vec![
            ("name", string_value("")),
            ("cpu", int_value(22000)),
            ("unknown", DynamicValue::Unknown),
        ]);
        assert_eq!(get_optional_string_attr(&state, "name"), None);
        assert_eq!(get_int_attr(&state, "cpu", 0), 22000);
        assert_eq!(get_int_attr(&state, "missing", 7), 7);
        assert!(get_list_attr(&state, "unknown").is_empty());
        assert!(optional_string_value("").is_null());
    }
}
