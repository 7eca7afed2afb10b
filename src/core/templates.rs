// src/core/templates.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A flat map of template name to JSON fragment, as stored in `s-templates.json`.
///
/// Templates are inherited down the tree. A population scope is built by merging the stores of every
/// ancestor in order (project first, function last) so that deeper names win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Templates(IndexMap<String, Value>);

impl Templates {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a template by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Defines or replaces a template.
    pub fn insert(&mut self, name: impl Into<String>, fragment: Value) {
        self.0.insert(name.into(), fragment);
    }

    /// Returns `true` when no template is defined.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of templates defined.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(name, fragment)` pairs in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overlays `other` on top of `self`; keys present in both take `other`'s fragment.
    pub fn extend_from(&mut self, other: &Self) {
        for (name, fragment) in &other.0 {
            self.0.insert(name.clone(), fragment.clone());
        }
    }

    /// Merges a chain of stores, root first. Later stores override earlier ones key by key.
    pub fn merged<'a>(chain: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut scope = Self::new();
        for layer in chain {
            scope.extend_from(layer);
        }
        scope
    }

    /// The store as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl FromIterator<(String, Value)> for Templates {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merged_deeper_layers_win() {
        let mut project = Templates::new();
        project.insert("bar", json!("project"));
        project.insert("only_project", json!(1));
        let mut component = Templates::new();
        component.insert("bar", json!("component"));
        let mut function = Templates::new();
        function.insert("bar", json!({"from": "function"}));

        let scope = Templates::merged([&project, &component, &function]);

        assert_eq!(scope.get("bar"), Some(&json!({"from": "function"})));
        assert_eq!(scope.get("only_project"), Some(&json!(1)));
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn test_deserializes_from_flat_object() {
        let templates: Templates =
            serde_json::from_value(json!({"apiRequest": {"application/json": "{}"}})).unwrap();
        assert!(templates.get("apiRequest").is_some());
        assert_eq!(templates.to_value(), json!({"apiRequest": {"application/json": "{}"}}));
    }
}
