//! # Document Model
//!
//! The input representation for the engine: a JSON tree of tagged nodes
//! with attributes, classes and text, plus a stylesheet and metadata. This
//! is what a markup parser would produce; [`build_tree`] turns it into the
//! node arena the formatter works on.
//!
//! Content at the top level that isn't a page is wrapped in an implicit
//! dynamic page, and runs of inline children (`span`) inside a block are
//! wrapped in an implicit paragraph, so authors can write
//! `{"tag": "div", "text": "..."}` without spelling out the paragraph.
//!
//! `header`, `footer` and `watermark` are containers placed directly in a
//! page. They are installed as that page's placeholders instead of joining
//! its content.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{QuireError, Result};
use crate::node::{
    Behaviour, CellState, ImageState, InheritedDefaults, NodeId, NodeKind, NodeTree,
    PageState, ParagraphState, Placeholder, TextState,
};
use crate::style::stylesheet::{CachingStylesheetConstraint, QueryElement, StylesheetConstraint};

/// A complete document ready for rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Pages, dynamic pages, or content that gets wrapped in a dynamic page.
    pub children: Vec<NodeSpec>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Overrides the configuration the document is rendered with.
    #[serde(default)]
    pub config: Option<EngineConfig>,

    #[serde(default)]
    pub stylesheet: Vec<StyleRule>,
}

/// Document metadata embedded in the PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

/// Attributes applied to every node matching `selector` (`tag`, `.class`,
/// `tag.class`, descendant chains like `table td.total`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub selector: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    fn is_inline(&self) -> bool {
        self.tag == "span"
    }

    fn query_element(&self) -> QueryElement {
        QueryElement {
            tag: self.tag.clone(),
            classes: self.class.clone(),
        }
    }
}

/// Attributes that become behaviours or node state instead of style.
const SPECIAL_ATTRIBUTES: [&str; 4] = ["src", "href", "ref", "note"];

struct TreeBuilder<'a> {
    tree: NodeTree,
    styles: CachingStylesheetConstraint,
    config: &'a EngineConfig,
}

impl TreeBuilder<'_> {
    fn new_dynamic_page(&mut self) -> NodeId {
        let dynamic = self.tree.add_dynamic_page();
        if let NodeKind::DynamicPage(state) = &self.tree.node(dynamic).kind {
            let prototype = state.prototype;
            self.tree.node_mut(prototype).attributes.padding = self.config.page_margin;
        }
        dynamic
    }

    fn build_page(&mut self, spec: &NodeSpec) -> Result<NodeId> {
        let page = match spec.tag.as_str() {
            "dynamic-page" => self.new_dynamic_page(),
            _ => {
                let page = self.tree.add_node(NodeKind::Page(PageState::default()));
                self.tree.node_mut(page).attributes.padding = self.config.page_margin;
                page
            }
        };
        let path = vec![spec.query_element()];
        self.decorate(page, spec, &path)?;
        self.build_block_children(page, spec, &path)?;
        Ok(page)
    }

    /// Apply stylesheet matches, then the node's own attributes, then
    /// behaviours and the document id.
    fn decorate(&mut self, id: NodeId, spec: &NodeSpec, path: &[QueryElement]) -> Result<()> {
        let bag = self.styles.find(path);
        bag.apply(&mut self.tree, id)?;

        for (name, value) in &spec.attributes {
            if SPECIAL_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            match value {
                Value::Object(fields) => self.tree.merge_complex_attribute(id, name, fields)?,
                _ => self.tree.set_attribute(id, name, value)?,
            }
        }

        for (name, behaviour) in [
            ("href", Behaviour::GoToUrl as fn(String) -> Behaviour),
            ("ref", Behaviour::GoToInternal),
            ("note", Behaviour::StickyNote),
        ] {
            if let Some(value) = spec.attributes.get(name) {
                let target = string_attribute(name, value)?;
                self.tree.node_mut(id).behaviours.push(behaviour(target));
            }
        }
        if let Some(document_id) = &spec.id {
            self.tree.register_document_id(id, document_id)?;
        }
        Ok(())
    }

    /// Children of a block: inline runs and the block's own text go into
    /// implicit paragraphs.
    fn build_block_children(&mut self, parent: NodeId, spec: &NodeSpec, path: &[QueryElement]) -> Result<()> {
        let mut paragraph: Option<NodeId> = None;
        if let Some(text) = &spec.text {
            let p = self.implicit_paragraph(parent);
            self.add_text(p, text);
            paragraph = Some(p);
        }
        for child in &spec.children {
            if child.is_inline() {
                let p = match paragraph {
                    Some(p) => p,
                    None => {
                        let p = self.implicit_paragraph(parent);
                        paragraph = Some(p);
                        p
                    }
                };
                self.build_node(p, child, path)?;
            } else {
                paragraph = None;
                self.build_node(parent, child, path)?;
            }
        }
        Ok(())
    }

    fn implicit_paragraph(&mut self, parent: NodeId) -> NodeId {
        let p = self
            .tree
            .add_node(NodeKind::Paragraph(ParagraphState::default()));
        self.tree.append_child(parent, p);
        p
    }

    fn add_text(&mut self, paragraph: NodeId, text: &str) -> NodeId {
        let node = self.tree.add_node(NodeKind::Text(TextState::new(text)));
        self.tree.append_child(paragraph, node);
        node
    }

    /// A header, footer or watermark container of the enclosing page.
    fn build_placeholder(
        &mut self,
        parent: NodeId,
        slot: Placeholder,
        spec: &NodeSpec,
        path: &[QueryElement],
    ) -> Result<NodeId> {
        if !matches!(
            self.tree.node(parent).kind,
            NodeKind::Page(_) | NodeKind::DynamicPage(_)
        ) {
            return Err(QuireError::invalid_argument(format!(
                "A {} can only be placed directly inside a page, found one inside {}.",
                slot.name(),
                self.tree.node(parent).kind.name()
            )));
        }
        let id = self.tree.add_node(NodeKind::Container);
        self.tree.set_placeholder(parent, slot, id)?;
        let mut path = path.to_vec();
        path.push(spec.query_element());
        self.decorate(id, spec, &path)?;
        self.build_block_children(id, spec, &path)?;
        Ok(id)
    }

    fn build_node(&mut self, parent: NodeId, spec: &NodeSpec, path: &[QueryElement]) -> Result<NodeId> {
        if let Some(slot) = Placeholder::from_tag(&spec.tag) {
            return self.build_placeholder(parent, slot, spec, path);
        }
        let parent_kind = self.tree.node(parent).kind.name();
        let kind = match spec.tag.as_str() {
            "div" => NodeKind::Container,
            "p" => NodeKind::Paragraph(ParagraphState::default()),
            "span" => NodeKind::Text(TextState::new(spec.text.as_deref().unwrap_or(""))),
            "img" => {
                let src = spec
                    .attributes
                    .get("src")
                    .ok_or_else(|| QuireError::invalid_argument("Image without \"src\" attribute."))?;
                NodeKind::Image(ImageState {
                    src: string_attribute("src", src)?,
                })
            }
            "table" => NodeKind::Table,
            "tr" => NodeKind::TableRow,
            "td" => NodeKind::TableCell(CellState::default()),
            "page-break" => NodeKind::PageBreak,
            "page" | "dynamic-page" => {
                return Err(QuireError::invalid_argument(format!(
                    "Pages can only appear at the top level, found one inside {}.",
                    parent_kind
                )))
            }
            other => {
                return Err(QuireError::invalid_argument(format!(
                    "Unknown tag \"{}\".",
                    other
                )))
            }
        };
        check_nesting(&self.tree.node(parent).kind, &kind)?;

        let id = self.tree.add_node(kind);
        self.tree.append_child(parent, id);
        let mut path = path.to_vec();
        path.push(spec.query_element());
        self.decorate(id, spec, &path)?;

        match &self.tree.node(id).kind {
            NodeKind::Paragraph(_) => {
                if let Some(text) = &spec.text {
                    self.add_text(id, text);
                }
                for child in &spec.children {
                    self.build_node(id, child, &path)?;
                }
            }
            NodeKind::Text(_) | NodeKind::Image(_) | NodeKind::PageBreak => {
                if !spec.children.is_empty() {
                    return Err(QuireError::invalid_argument(format!(
                        "\"{}\" can't have children.",
                        spec.tag
                    )));
                }
            }
            NodeKind::Table | NodeKind::TableRow => {
                for child in &spec.children {
                    self.build_node(id, child, &path)?;
                }
            }
            _ => self.build_block_children(id, spec, &path)?,
        }
        Ok(id)
    }
}

fn check_nesting(parent: &NodeKind, child: &NodeKind) -> Result<()> {
    let allowed = match parent {
        NodeKind::Paragraph(_) => matches!(child, NodeKind::Text(_)),
        NodeKind::Table => matches!(child, NodeKind::TableRow),
        NodeKind::TableRow => matches!(child, NodeKind::TableCell(_)),
        _ => !matches!(child, NodeKind::TableRow | NodeKind::TableCell(_)),
    };
    if allowed {
        Ok(())
    } else {
        Err(QuireError::invalid_argument(format!(
            "{} can't be placed inside {}.",
            child.name(),
            parent.name()
        )))
    }
}

fn string_attribute(name: &str, value: &Value) -> Result<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        QuireError::invalid_argument(format!("Attribute \"{}\" must be a string.", name))
    })
}

/// Build the node tree of `document`. The root is a page collection.
pub fn build_tree(document: &Document, config: &EngineConfig) -> Result<(NodeTree, NodeId)> {
    let mut constraint = StylesheetConstraint::new();
    for rule in &document.stylesheet {
        constraint.add_rule(&rule.selector, rule.attributes.clone())?;
    }
    let mut builder = TreeBuilder {
        tree: NodeTree::with_defaults(InheritedDefaults::from(config)),
        styles: CachingStylesheetConstraint::new(constraint),
        config,
    };
    let root = builder.tree.add_node(NodeKind::PageCollection);

    let mut implicit: Option<NodeId> = None;
    for spec in &document.children {
        match spec.tag.as_str() {
            "page" | "dynamic-page" => {
                implicit = None;
                let page = builder.build_page(spec)?;
                builder.tree.append_child(root, page);
            }
            _ => {
                let dynamic = match implicit {
                    Some(dynamic) => dynamic,
                    None => {
                        let dynamic = builder.new_dynamic_page();
                        builder.tree.append_child(root, dynamic);
                        implicit = Some(dynamic);
                        dynamic
                    }
                };
                let wrapper = NodeSpec {
                    tag: "dynamic-page".to_string(),
                    children: vec![spec.clone()],
                    ..Default::default()
                };
                builder.build_block_children(dynamic, &wrapper, &[])?;
            }
        }
    }

    debug!(
        "Built tree of {} nodes, {} stylesheet queries",
        builder.tree.len(),
        builder.styles.cached_queries()
    );
    Ok((builder.tree, root))
}
