//! Decoding helpers for configuration nodes whose shape is not fixed.
//!
//! Three shapes show up across both schema eras:
//! - a node that is either one object or a non-empty list of objects,
//! - a node that is either one object or a map of id to object,
//! - a `{type, <payload>}` pair whose payload shape depends on `type`.
//!
//! All helpers buffer the node as a [`serde_yaml::Value`] and re-decode it,
//! so they can be used from `Deserialize` impls over any YAML deserializer.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use crate::error::DecodeError;

/// Decodes `bytes` into `T` with unknown keys rejected by `T`'s own serde attributes.
pub fn decode_strict<T: DeserializeOwned>(context: &str, bytes: &[u8]) -> Result<T, DecodeError> {
    serde_yaml::from_slice(bytes).map_err(|err| DecodeError::from_yaml(context, &err))
}

/// Decodes `value` as a list of `T`, falling back to a single `T`.
///
/// An explicit empty list is rejected. When neither form decodes, the error
/// from the single-object attempt is returned.
pub fn list_or_single<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, String> {
    if value.is_sequence() {
        match serde_yaml::from_value::<Vec<T>>(value.clone()) {
            Ok(list) if list.is_empty() => {
                return Err("if the key is specified, there must be at least one entry".to_string())
            }
            Ok(list) => return Ok(list),
            Err(_) => {}
        }
    }
    serde_yaml::from_value::<T>(value)
        .map(|single| vec![single])
        .map_err(|err| err.to_string())
}

/// Decodes `value` as a map of `K` to `V`, falling back to a single `V` keyed by `key_for`.
///
/// A mapping whose keys are all in `single_fields` is always a single `V`, so
/// `{config: {..}}` is one object with a defaulted type and never a map entry
/// named `config`. When both forms fail, the single-object error is reported
/// if the node has a `type` key, otherwise the map error.
pub fn map_or_single<K, V, F>(
    value: Value,
    single_fields: &[&str],
    key_for: F,
) -> Result<BTreeMap<K, V>, String>
where
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
    F: FnOnce(&V) -> K,
{
    let single_shape = value.as_mapping().is_some_and(|mapping| {
        !mapping.is_empty()
            && mapping.keys().all(|key| {
                key.as_str()
                    .is_some_and(|name| single_fields.contains(&name))
            })
    });
    if single_shape {
        return serde_yaml::from_value::<V>(value)
            .map(|single| {
                let mut map = BTreeMap::new();
                map.insert(key_for(&single), single);
                map
            })
            .map_err(|err| err.to_string());
    }
    let map_error = match serde_yaml::from_value::<BTreeMap<K, V>>(value.clone()) {
        Ok(map) => return Ok(map),
        Err(err) => err.to_string(),
    };
    let looks_single = value
        .as_mapping()
        .map(|mapping| mapping.contains_key("type"))
        .unwrap_or(false);
    match serde_yaml::from_value::<V>(value) {
        Ok(single) => {
            let mut map = BTreeMap::new();
            map.insert(key_for(&single), single);
            Ok(map)
        }
        Err(single_error) if looks_single => Err(single_error.to_string()),
        Err(_) => Err(map_error),
    }
}

/// Preliminary view of a type-tagged node: the discriminator and the raw payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tagged {
    pub type_name: String,
    pub payload: Option<Value>,
}

impl Tagged {
    /// Reads the `type` discriminator and the payload stored under `payload_field`.
    ///
    /// Any other key is rejected, matching strict decoding elsewhere.
    pub fn split(value: Value, payload_field: &str) -> Result<Self, String> {
        let mapping = match value {
            Value::Null => return Ok(Tagged::default()),
            Value::Mapping(mapping) => mapping,
            other => return Err(format!("expected a mapping, found {}", kind_of(&other))),
        };
        let mut tagged = Tagged::default();
        for (key, entry) in mapping {
            match key.as_str() {
                Some("type") => {
                    tagged.type_name = match entry {
                        Value::Null => String::new(),
                        Value::String(name) => name,
                        other => {
                            return Err(format!(
                                "field `type` must be a string, found {}",
                                kind_of(&other)
                            ))
                        }
                    }
                }
                Some(name) if name == payload_field => {
                    if !entry.is_null() {
                        tagged.payload = Some(entry);
                    }
                }
                Some(name) => {
                    return Err(format!(
                        "unknown field `{}`, expected `type` or `{}`",
                        name, payload_field
                    ))
                }
                None => return Err("mapping keys must be strings".to_string()),
            }
        }
        Ok(tagged)
    }

    /// Re-decodes the payload into the variant shape selected by the discriminator.
    /// A missing payload decodes as an empty mapping.
    pub fn payload_as<T: DeserializeOwned>(&self, payload_field: &str) -> Result<T, String> {
        let payload = self
            .payload
            .clone()
            .unwrap_or_else(|| Value::Mapping(Mapping::new()));
        serde_yaml::from_value(payload)
            .map_err(|err| format!("{} for type {:?}: {}", payload_field, self.type_name, err))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// A config node that may be written as one `T` or as a non-empty list of `T`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OneOrMany<T>(Vec<T>);

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

impl<T> Deref for OneOrMany<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        list_or_single(value).map(OneOrMany).map_err(D::Error::custom)
    }
}

impl<T: Serialize> Serialize for OneOrMany<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<T: fmt::Display> fmt::Display for OneOrMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.0.iter().map(|item| item.to_string()).collect();
        write!(f, "[{}]", items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Entry {
        name: String,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    }

    const ENTRY_FIELDS: &[&str] = &["name", "type"];

    fn yaml(input: &str) -> Value {
        serde_yaml::from_str(input).expect("yaml")
    }

    #[test]
    fn single_object_becomes_one_element_list() {
        let entries: Vec<Entry> = list_or_single(yaml("name: a")).expect("decode");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");
    }

    #[test]
    fn list_is_kept_in_order() {
        let entries: Vec<Entry> = list_or_single(yaml("[{name: a}, {name: b}]")).expect("decode");
        let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn explicit_empty_list_is_rejected() {
        let error = list_or_single::<Entry>(yaml("[]")).expect_err("empty list");
        assert!(error.contains("at least one entry"));
    }

    #[test]
    fn single_object_error_is_reported_when_both_forms_fail() {
        let error = list_or_single::<Entry>(yaml("bogus: 1")).expect_err("invalid");
        assert!(error.contains("unknown field `bogus`"), "{}", error);
    }

    #[test]
    fn map_form_is_preferred_over_single_object() {
        let map: BTreeMap<String, Entry> =
            map_or_single(yaml("first: {name: a}\nsecond: {name: b}"), ENTRY_FIELDS, |entry: &Entry| {
                entry.name.clone()
            })
            .expect("decode");
        assert_eq!(map.len(), 2);
        assert_eq!(map["second"].name, "b");
    }

    #[test]
    fn single_object_is_keyed_by_callback() {
        let map: BTreeMap<String, Entry> =
            map_or_single(yaml("name: a\ntype: manual"), ENTRY_FIELDS, |entry: &Entry| {
                entry.kind.clone().unwrap_or_default()
            })
            .expect("decode");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["manual"]);
    }

    #[test]
    fn map_or_single_reports_single_error_for_typed_nodes() {
        let error = map_or_single::<String, Entry, _>(yaml("type: manual\nbogus: 1"), ENTRY_FIELDS, |entry| {
            entry.name.clone()
        })
        .expect_err("invalid");
        assert!(error.contains("bogus"), "{}", error);
    }

    #[test]
    fn node_with_only_object_fields_is_a_single_object() {
        // A map with one entry keyed `name` would decode; the object reading wins.
        let error = map_or_single::<String, Entry, _>(yaml("name: {name: b}"), ENTRY_FIELDS, |entry| {
            entry.name.clone()
        })
        .expect_err("name must be a string");
        assert!(error.contains("invalid type"), "{}", error);
    }

    #[test]
    fn tagged_split_reads_discriminator_and_payload() {
        let tagged =
            Tagged::split(yaml("type: manual\ninfo:\n  extension: zip"), "info").expect("split");
        assert_eq!(tagged.type_name, "manual");
        let payload = tagged.payload.expect("payload");
        assert_eq!(payload["extension"], Value::from("zip"));
    }

    #[test]
    fn tagged_split_rejects_unknown_keys() {
        let error = Tagged::split(yaml("type: manual\ndata: {}"), "info").expect_err("unknown");
        assert!(error.contains("unknown field `data`"));
    }

    #[test]
    fn missing_payload_decodes_as_empty_mapping() {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        struct Payload {
            extension: String,
        }
        let tagged = Tagged::split(yaml("type: manual"), "info").expect("split");
        let payload: Payload = tagged.payload_as("info").expect("payload");
        assert!(payload.extension.is_empty());
    }

    #[test]
    fn one_or_many_deserializes_both_forms() {
        let single: OneOrMany<Entry> = serde_yaml::from_str("name: a").expect("single");
        let many: OneOrMany<Entry> = serde_yaml::from_str("- name: a\n- name: b").expect("many");
        assert_eq!(single.len(), 1);
        assert_eq!(many.len(), 2);
    }
}
