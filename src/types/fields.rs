//! Provider-defined custom attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A custom field as the provider sends it.
///
/// Values are untyped on the wire (strings, numbers, booleans, or null);
/// [`CustomFields::from_raw`] normalises them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCustomField {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Label → value mapping of provider-defined custom attributes.
///
/// Built once at the enrichment boundary: labels are trimmed, empty labels and
/// empty/null values are dropped, and scalar values are rendered as strings.
/// Later stages can rely on every stored value being non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomFields(BTreeMap<String, String>);

impl CustomFields {
    /// Normalise raw provider fields. The first occurrence of a label wins.
    pub fn from_raw(raw: Vec<RawCustomField>) -> Self {
        let mut map = BTreeMap::new();
        for field in raw {
            let label = field.label.trim();
            if label.is_empty() {
                continue;
            }
            let value = match field.value {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            if value.is_empty() {
                continue;
            }
            map.entry(label.to_string()).or_insert(value);
        }
        Self(map)
    }

    /// Value for an exact label.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.0.insert(label.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for CustomFields {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(l, v)| (l.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(label: &str, value: serde_json::Value) -> RawCustomField {
        RawCustomField {
            label: label.to_string(),
            value,
        }
    }

    #[test]
    fn normalises_scalar_values() {
        let fields = CustomFields::from_raw(vec![
            raw("Type", json!(" Wine ")),
            raw("ABV", json!(12.5)),
            raw("Organic", json!(true)),
        ]);
        assert_eq!(fields.get("Type"), Some("Wine"));
        assert_eq!(fields.get("ABV"), Some("12.5"));
        assert_eq!(fields.get("Organic"), Some("true"));
    }

    #[test]
    fn drops_empty_and_null() {
        let fields = CustomFields::from_raw(vec![
            raw("", json!("orphan")),
            raw("Type", json!("")),
            raw("Body", serde_json::Value::Null),
            raw("Notes", json!(["a", "b"])),
        ]);
        assert!(fields.is_empty());
    }

    #[test]
    fn first_label_wins() {
        let fields =
            CustomFields::from_raw(vec![raw("Type", json!("Beer")), raw("Type", json!("Cider"))]);
        assert_eq!(fields.get("Type"), Some("Beer"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn serializes_as_plain_map() {
        let fields: CustomFields = [("Type", "Wine")].into_iter().collect();
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json, json!({ "Type": "Wine" }));
    }
}
