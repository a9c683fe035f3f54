//! Attribute bags: named attribute values with a weight, applied to nodes
//! as one unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::node::{NodeId, NodeTree};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BagContainer {
    attributes: BTreeMap<String, Value>,
    weight: f64,
    #[serde(default)]
    order: i64,
}

impl BagContainer {
    pub fn new(attributes: BTreeMap<String, Value>, weight: f64) -> Self {
        Self {
            attributes,
            weight,
            order: 0,
        }
    }

    pub fn all(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Complex values (objects) are merged with what is already stored.
    pub fn add(&mut self, name: &str, value: Value) {
        match (self.attributes.get_mut(name), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                existing.extend(incoming);
            }
            (_, value) => {
                self.attributes.insert(name.to_string(), value);
            }
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn add_weight(&mut self, weight: f64) {
        self.weight += weight;
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Set every simple attribute on the node and merge complex ones.
    pub fn apply(&self, tree: &mut NodeTree, node: NodeId) -> Result<()> {
        for (name, value) in &self.attributes {
            match value {
                Value::Object(fields) => tree.merge_complex_attribute(node, name, fields)?,
                _ => tree.set_attribute(node, name, value)?,
            }
        }
        Ok(())
    }

    /// Merge bags in order; later bags override earlier ones and the result
    /// keeps the heaviest weight.
    pub fn merge<'a>(containers: impl IntoIterator<Item = &'a BagContainer>) -> BagContainer {
        let mut merged = BagContainer::default();
        for container in containers {
            merged.weight = merged.weight.max(container.weight);
            for (name, value) in &container.attributes {
                merged.add(name, value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use serde_json::json;

    fn bag(pairs: &[(&str, Value)], weight: f64) -> BagContainer {
        let attributes = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        BagContainer::new(attributes, weight)
    }

    #[test]
    fn merge_overrides_and_keeps_max_weight() {
        let a = bag(&[("font-size", json!(10)), ("border", json!({"size": 2}))], 3.0);
        let b = bag(&[("font-size", json!(14)), ("border", json!({"color": "red"}))], 1.0);
        let merged = BagContainer::merge([&a, &b]);
        assert_eq!(merged.weight(), 3.0);
        assert_eq!(merged.all()["font-size"], json!(14));
        assert_eq!(merged.all()["border"], json!({"size": 2, "color": "red"}));
    }

    #[test]
    fn serialized_bag_applies_identically() {
        let original = bag(
            &[
                ("font-size", json!(9)),
                ("text-align", json!("center")),
                ("background", json!({"color": "#ff0000", "radius": 2})),
            ],
            2.0,
        );
        let restored: BagContainer =
            serde_json::from_str(&serde_json::to_string(&original).unwrap()).unwrap();
        assert_eq!(restored, original);

        let mut tree = NodeTree::new();
        let first = tree.add_node(NodeKind::Container);
        let second = tree.add_node(NodeKind::Container);
        original.apply(&mut tree, first).unwrap();
        restored.apply(&mut tree, second).unwrap();
        assert_eq!(tree.node(first).attributes, tree.node(second).attributes);
        assert_eq!(tree.node(first).attributes.font_size, Some(9.0));
    }

    #[test]
    fn invalid_value_fails_on_apply() {
        let broken = bag(&[("text-align", json!("sideways"))], 0.0);
        let mut tree = NodeTree::new();
        let node = tree.add_node(NodeKind::Container);
        assert!(broken.apply(&mut tree, node).is_err());
    }
}
