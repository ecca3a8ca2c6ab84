//! Multi-valued name/value collections (headers, query parameters).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name to values mapping as used for headers and query parameters.
///
/// Serializes as `{"name": ["value", ...]}`. Both that object form and the
/// `[{"name": ..., "values": [...]}]` list form are accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MultimapRaw")]
pub struct Multimap(BTreeMap<String, Vec<String>>);

#[derive(Deserialize)]
#[serde(untagged)]
enum MultimapRaw {
    Object(BTreeMap<String, OneOrMany>),
    List(Vec<MultimapEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct MultimapEntry {
    name: String,
    #[serde(default)]
    values: Vec<String>,
}

impl From<MultimapRaw> for Multimap {
    fn from(raw: MultimapRaw) -> Self {
        let mut map = Multimap::default();
        match raw {
            MultimapRaw::Object(entries) => {
                for (name, values) in entries {
                    match values {
                        OneOrMany::One(v) => map.insert(name, v),
                        OneOrMany::Many(vs) => map.extend(name, vs),
                    }
                }
            }
            MultimapRaw::List(entries) => {
                for entry in entries {
                    map.extend(entry.name, entry.values);
                }
            }
        }
        map
    }
}

impl Multimap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    pub fn extend(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.entry(name.into()).or_default().extend(values);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Multimap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Multimap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_object_form() {
        let map: Multimap =
            serde_json::from_str(r#"{"Accept": ["a", "b"], "Host": "localhost"}"#).unwrap();
        assert_eq!(map.get("Accept").unwrap(), ["a", "b"]);
        assert_eq!(map.get("Host").unwrap(), ["localhost"]);
    }

    #[test]
    fn test_reads_list_form() {
        let map: Multimap = serde_json::from_str(
            r#"[{"name": "Accept", "values": ["a"]}, {"name": "Accept", "values": ["b"]}]"#,
        )
        .unwrap();
        assert_eq!(map.get("Accept").unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_writes_object_form() {
        let map: Multimap = [("x-id", "1"), ("x-id", "2")].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            serde_json::json!({"x-id": ["1", "2"]})
        );
    }
}
