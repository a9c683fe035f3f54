//! # Stylesheet constraints
//!
//! A deliberately small selector matcher: compound selectors of a tag
//! and/or classes (`td.total`, `.note`), optionally chained as descendant
//! selectors (`table td.total`). Full cascading lives in the parser layer;
//! this is what the tree builder needs to resolve rule bags per node.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::{QuireError, Result};
use crate::style::bag::BagContainer;

/// One element of a query path, from the root down to the queried node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryElement {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
}

impl QueryElement {
    pub fn new(tag: &str, classes: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split('.');
        let tag = match parts.next() {
            Some("") | Some("*") => None,
            Some(tag) => Some(tag.to_string()),
            None => None,
        };
        let classes: Vec<String> = parts.map(str::to_string).collect();
        if classes.iter().any(String::is_empty) || (tag.is_none() && classes.is_empty() && text != "*")
        {
            return Err(QuireError::invalid_argument(format!(
                "Invalid selector \"{}\".",
                text
            )));
        }
        Ok(Self { tag, classes })
    }

    fn matches(&self, element: &QueryElement) -> bool {
        self.tag.as_ref().map_or(true, |t| *t == element.tag)
            && self.classes.iter().all(|c| element.classes.contains(c))
    }

    fn specificity(&self) -> f64 {
        self.tag.iter().count() as f64 + 10.0 * self.classes.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Rule {
    selector: Vec<Compound>,
    bag: BagContainer,
}

impl Rule {
    fn matches(&self, query: &[QueryElement]) -> bool {
        let Some((last, ancestors)) = self.selector.split_last() else {
            return false;
        };
        let Some((node, path)) = query.split_last() else {
            return false;
        };
        if !last.matches(node) {
            return false;
        }
        // Remaining compounds must match ancestors in order, nearest last.
        let mut remaining = ancestors.iter().rev().peekable();
        for element in path.iter().rev() {
            match remaining.peek() {
                Some(compound) if compound.matches(element) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StylesheetConstraint {
    rules: Vec<Rule>,
}

impl StylesheetConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(
        &mut self,
        selector: &str,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        let selector = selector
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Result<Vec<_>>>()?;
        if selector.is_empty() {
            return Err(QuireError::invalid_argument("Empty selector."));
        }
        let specificity = selector.iter().map(Compound::specificity).sum();
        let mut bag = BagContainer::new(attributes, specificity);
        bag.set_order(self.rules.len() as i64);
        self.rules.push(Rule { selector, bag });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merge the bags of every matching rule: lighter first, declaration
    /// order among equals, so heavier and later rules win.
    pub fn find(&self, query: &[QueryElement]) -> BagContainer {
        let mut matching: Vec<&BagContainer> = self
            .rules
            .iter()
            .filter(|r| r.matches(query))
            .map(|r| &r.bag)
            .collect();
        matching.sort_by(|a, b| {
            a.weight()
                .total_cmp(&b.weight())
                .then(a.order().cmp(&b.order()))
        });
        BagContainer::merge(matching)
    }
}

/// Stylesheet constraint that memoises query results and can be stored in
/// a [`Cache`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachingStylesheetConstraint {
    constraint: StylesheetConstraint,
    result_map: BTreeMap<String, BagContainer>,
    #[serde(skip)]
    result_map_modified: bool,
    cache_id: String,
}

impl CachingStylesheetConstraint {
    pub fn new(constraint: StylesheetConstraint) -> Self {
        Self {
            constraint,
            ..Default::default()
        }
    }

    pub fn find(&mut self, query: &[QueryElement]) -> BagContainer {
        let key = Self::query_key(query);
        if let Some(bag) = self.result_map.get(&key) {
            return bag.clone();
        }
        let bag = self.constraint.find(query);
        self.result_map.insert(key, bag.clone());
        self.result_map_modified = true;
        bag
    }

    fn query_key(query: &[QueryElement]) -> String {
        query
            .iter()
            .map(|e| format!("{}.{}", e.tag, e.classes.join(".")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_result_map_modified(&self) -> bool {
        self.result_map_modified
    }

    pub fn cached_queries(&self) -> usize {
        self.result_map.len()
    }

    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    pub fn set_cache_id(&mut self, id: impl Into<String>) {
        self.cache_id = id.into();
    }

    /// Persist the constraint when new results were memoised since the last
    /// save or load.
    pub fn save(&mut self, cache: &mut dyn Cache) -> Result<()> {
        if !self.result_map_modified {
            return Ok(());
        }
        let serialized = serde_json::to_string(self)?;
        cache.save(&self.cache_id, serialized)?;
        self.result_map_modified = false;
        debug!(
            "Stored stylesheet cache \"{}\" with {} results",
            self.cache_id,
            self.result_map.len()
        );
        Ok(())
    }

    pub fn load(cache: &dyn Cache, id: &str) -> Result<Option<Self>> {
        match cache.load(id)? {
            Some(serialized) => {
                let mut constraint: Self = serde_json::from_str(&serialized)?;
                constraint.set_cache_id(id);
                Ok(Some(constraint))
            }
            None => Ok(None),
        }
    }

    /// Combine several constraints: rules are concatenated and results of
    /// equal queries merged.
    pub fn merge(containers: &[CachingStylesheetConstraint]) -> Self {
        let mut merged = Self::default();
        let mut grouped: BTreeMap<String, Vec<&BagContainer>> = BTreeMap::new();
        for container in containers {
            merged
                .constraint
                .rules
                .extend(container.constraint.rules.iter().cloned());
            for (key, bag) in &container.result_map {
                grouped.entry(key.clone()).or_default().push(bag);
            }
        }
        merged.result_map = grouped
            .into_iter()
            .map(|(key, bags)| (key, BagContainer::merge(bags)))
            .collect();
        merged
    }
}
