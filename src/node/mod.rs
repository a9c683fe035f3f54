//! # Node Tree
//!
//! All content nodes live in one arena, [`NodeTree`], and refer to each
//! other through [`NodeId`] indices. A node owns its children (by id) and
//! knows its parent; nothing is reference counted, and cloning a subtree
//! produces fresh ids with independent geometry.
//!
//! Node behaviour is a closed set of variants ([`NodeKind`]). Formatters and
//! drawing collection dispatch on the variant; capability checks like
//! [`NodeKind::is_inline`] replace a class hierarchy.
//!
//! Geometry is resolved lazily: `width`/`height` are `None` until a formatter
//! sets them, and the boundary stays empty until the node is positioned.
//! Reading unresolved geometry is a structural error, never a silent zero.

pub mod breaking;
pub mod page;
pub mod paragraph;
pub mod text;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::{QuireError, Result};
use crate::geometry::{Boundary, Point};
use crate::style::{Attributes, Color, Edges, Float, TextAlign, TextDecoration};

pub use page::{DynamicPageState, PageContext, PageState, Placeholder, Placeholders};
pub use paragraph::{Line, LinePart, ParagraphState};
pub use text::TextState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Interactive behaviour attached to a node; drawn as annotations after
/// every page exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Behaviour {
    /// External link.
    GoToUrl(String),
    /// Link to the node carrying this document id.
    GoToInternal(String),
    StickyNote(String),
}

#[derive(Debug, Clone)]
pub struct ImageState {
    pub src: String,
}

#[derive(Debug, Clone, Default)]
pub struct CellState {
    /// Index of the first column this cell occupies.
    pub column: usize,
}

/// The different kinds of nodes in the layout tree.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Root of a document: pages and dynamic pages.
    PageCollection,
    /// Paginates its content into clones of a prototype page.
    DynamicPage(DynamicPageState),
    /// One physical page with fixed dimensions.
    Page(PageState),
    /// A generic block container.
    Container,
    /// Block of inline text split into lines.
    Paragraph(ParagraphState),
    Text(TextState),
    Image(ImageState),
    Table,
    TableRow,
    TableCell(CellState),
    /// Forces the following content onto a new page.
    PageBreak,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::PageCollection => "PageCollection",
            NodeKind::DynamicPage(_) => "DynamicPage",
            NodeKind::Page(_) => "Page",
            NodeKind::Container => "Container",
            NodeKind::Paragraph(_) => "Paragraph",
            NodeKind::Text(_) => "Text",
            NodeKind::Image(_) => "Image",
            NodeKind::Table => "Table",
            NodeKind::TableRow => "TableRow",
            NodeKind::TableCell(_) => "TableCell",
            NodeKind::PageBreak => "PageBreak",
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, NodeKind::Text(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Text(_) | NodeKind::Image(_) | NodeKind::PageBreak
        )
    }

    /// Whether the variant itself draws content (beyond background and
    /// border decorations).
    pub fn has_own_drawing(&self) -> bool {
        matches!(self, NodeKind::Paragraph(_) | NodeKind::Image(_))
    }

    /// Page roles: breaking these is a usage error.
    pub fn is_page_role(&self) -> bool {
        matches!(
            self,
            NodeKind::PageCollection | NodeKind::DynamicPage(_) | NodeKind::Page(_)
        )
    }
}

/// Fallbacks closing the chain of inherited attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedDefaults {
    pub font_type: String,
    pub font_size: f64,
    pub line_height_factor: f64,
    pub text_align: TextAlign,
}

impl Default for InheritedDefaults {
    fn default() -> Self {
        Self {
            font_type: "helvetica".to_string(),
            font_size: 12.0,
            line_height_factor: 1.2,
            text_align: TextAlign::Left,
        }
    }
}

impl From<&EngineConfig> for InheritedDefaults {
    fn from(config: &EngineConfig) -> Self {
        Self {
            font_type: config.font_type.clone(),
            font_size: config.font_size,
            line_height_factor: config.line_height_factor,
            text_align: config.text_align,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub attributes: Attributes,
    /// Document-level identifier, target of internal links.
    pub id: Option<String>,
    pub behaviours: Vec<Behaviour>,
    width: Option<f64>,
    height: Option<f64>,
    boundary: Boundary,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    formatted: bool,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        let mut attributes = Attributes::default();
        if matches!(kind, NodeKind::TableCell(_)) {
            attributes.float = Float::Left;
        }
        Self {
            kind,
            attributes,
            id: None,
            behaviours: Vec::new(),
            width: None,
            height: None,
            boundary: Boundary::new(),
            parent: None,
            children: Vec::new(),
            formatted: false,
        }
    }

    /// Resolved width, `None` while unset.
    pub fn width(&self) -> Option<f64> {
        self.width
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = Some(width);
    }

    pub fn set_height(&mut self, height: f64) {
        self.height = Some(height);
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn boundary_mut(&mut self) -> &mut Boundary {
        &mut self.boundary
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn padding(&self) -> Edges {
        self.attributes.padding
    }

    pub fn margin(&self) -> Edges {
        self.attributes.margin
    }

    pub fn is_breakable(&self) -> bool {
        let by_kind = match self.kind {
            NodeKind::Container
            | NodeKind::Paragraph(_)
            | NodeKind::Text(_)
            | NodeKind::Table
            | NodeKind::TableCell(_) => true,
            NodeKind::TableRow
            | NodeKind::Image(_)
            | NodeKind::PageBreak
            | NodeKind::PageCollection
            | NodeKind::DynamicPage(_)
            | NodeKind::Page(_) => false,
        };
        by_kind && self.attributes.breakable.unwrap_or(true)
    }

    pub fn is_formatted(&self) -> bool {
        self.formatted
    }
}

/// Arena holding every node of a document.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
    defaults: InheritedDefaults,
    document_ids: HashMap<String, NodeId>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: InheritedDefaults) -> Self {
        Self {
            defaults,
            ..Default::default()
        }
    }

    pub fn defaults(&self) -> &InheritedDefaults {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Append `child` to `parent`, detaching it from a previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.insert(index, child);
    }

    pub fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.node_mut(child).parent.take() {
            self.node_mut(old).children.retain(|c| *c != child);
        }
    }

    pub fn register_document_id(&mut self, id: NodeId, document_id: &str) -> Result<()> {
        if self.document_ids.contains_key(document_id) {
            return Err(QuireError::invalid_argument(format!(
                "Duplicate node id \"{}\".",
                document_id
            )));
        }
        self.document_ids.insert(document_id.to_string(), id);
        self.node_mut(id).id = Some(document_id.to_string());
        Ok(())
    }

    pub fn find_by_document_id(&self, document_id: &str) -> Option<NodeId> {
        self.document_ids.get(document_id).copied()
    }

    // ── Attributes ─────────────────────────────────────────────

    /// The attributes that answer lookups for `id`. A dynamic page answers
    /// with its prototype's.
    pub fn attributes(&self, id: NodeId) -> &Attributes {
        match &self.node(id).kind {
            NodeKind::DynamicPage(state) => &self.node(state.prototype).attributes,
            _ => &self.node(id).attributes,
        }
    }

    /// Targets of an attribute write: a dynamic page writes through to its
    /// prototype and every page already created.
    fn attribute_targets(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).kind {
            NodeKind::DynamicPage(state) => std::iter::once(state.prototype)
                .chain(state.pages.iter().copied())
                .collect(),
            _ => vec![id],
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &Value) -> Result<()> {
        for target in self.attribute_targets(id) {
            self.node_mut(target).attributes.set(name, value)?;
        }
        Ok(())
    }

    pub fn merge_complex_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        for target in self.attribute_targets(id) {
            self.node_mut(target).attributes.merge_complex(name, fields)?;
        }
        Ok(())
    }

    /// Resolve an inherited attribute by walking up the ancestors.
    pub fn recurse_attribute<T>(&self, id: NodeId, get: impl Fn(&Attributes) -> Option<T>) -> Option<T> {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(value) = get(self.attributes(node)) {
                return Some(value);
            }
            current = self.parent(node);
        }
        None
    }

    pub fn font_size(&self, id: NodeId) -> f64 {
        self.recurse_attribute(id, |a| a.font_size)
            .unwrap_or(self.defaults.font_size)
    }

    pub fn font_type(&self, id: NodeId) -> String {
        self.recurse_attribute(id, |a| a.font_type.clone())
            .unwrap_or_else(|| self.defaults.font_type.clone())
    }

    pub fn line_height(&self, id: NodeId) -> f64 {
        self.recurse_attribute(id, |a| a.line_height)
            .unwrap_or_else(|| self.font_size(id) * self.defaults.line_height_factor)
    }

    pub fn text_align(&self, id: NodeId) -> TextAlign {
        self.recurse_attribute(id, |a| a.text_align)
            .unwrap_or(self.defaults.text_align)
    }

    pub fn color(&self, id: NodeId) -> Option<Color> {
        self.recurse_attribute(id, |a| a.color)
    }

    pub fn text_decoration(&self, id: NodeId) -> TextDecoration {
        self.recurse_attribute(id, |a| a.text_decoration)
            .unwrap_or_default()
    }

    pub fn alpha(&self, id: NodeId) -> Option<f64> {
        self.recurse_attribute(id, |a| a.alpha)
    }

    /// Inherited maximum width; absent or non-positive means unbounded.
    pub fn max_width(&self, id: NodeId) -> f64 {
        unbounded_if_unset(self.recurse_attribute(id, |a| a.max_width))
    }

    pub fn max_height(&self, id: NodeId) -> f64 {
        unbounded_if_unset(self.recurse_attribute(id, |a| a.max_height))
    }

    pub fn ancestor_with_rotation(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.attributes(node).rotate.is_some() {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    // ── Geometry ───────────────────────────────────────────────

    fn geometry_owner(&self, id: NodeId) -> NodeId {
        match &self.node(id).kind {
            NodeKind::DynamicPage(state) => state.prototype,
            _ => id,
        }
    }

    pub fn width(&self, id: NodeId) -> Result<f64> {
        let owner = self.geometry_owner(id);
        self.node(owner).width.ok_or_else(|| {
            QuireError::structural(format!(
                "{} node {} has no resolved width",
                self.node(owner).kind.name(),
                owner.0
            ))
        })
    }

    pub fn height(&self, id: NodeId) -> Result<f64> {
        let owner = self.geometry_owner(id);
        self.node(owner).height.ok_or_else(|| {
            QuireError::structural(format!(
                "{} node {} has no resolved height",
                self.node(owner).kind.name(),
                owner.0
            ))
        })
    }

    pub fn padding(&self, id: NodeId) -> Edges {
        self.attributes(id).padding
    }

    pub fn margin(&self, id: NodeId) -> Edges {
        self.attributes(id).margin
    }

    /// Width available to children: width minus horizontal padding.
    pub fn width_without_paddings(&self, id: NodeId) -> Result<f64> {
        Ok(self.width(id)? - self.padding(id).horizontal())
    }

    pub fn first_point(&self, id: NodeId) -> Result<Point> {
        let owner = self.geometry_owner(id);
        self.node(owner).boundary.first_point().ok_or_else(|| {
            QuireError::structural(format!(
                "{} node {} has not been positioned",
                self.node(owner).kind.name(),
                owner.0
            ))
        })
    }

    pub fn diagonal_point(&self, id: NodeId) -> Result<Point> {
        let owner = self.geometry_owner(id);
        self.node(owner).boundary.diagonal_point().ok_or_else(|| {
            QuireError::structural(format!(
                "{} node {} has not been positioned",
                self.node(owner).kind.name(),
                owner.0
            ))
        })
    }

    /// Rebuild the node's boundary around its resolved size.
    pub fn set_position(&mut self, id: NodeId, top_left: Point) -> Result<()> {
        let width = self.width(id)?;
        let height = self.height(id)?;
        self.node_mut(id).boundary.rebuild(top_left, width, height);
        Ok(())
    }

    /// Shift a node and its whole subtree.
    pub fn translate(&mut self, id: NodeId, dx: f64, dy: f64) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current);
            node.boundary.translate(dx, dy);
            stack.extend(node.children.iter().copied());
        }
    }

    // ── Formatting memo ────────────────────────────────────────

    pub fn mark_as_formatted(&mut self, id: NodeId) {
        self.node_mut(id).formatted = true;
    }

    pub fn is_marked_as_formatted(&self, id: NodeId) -> bool {
        self.node(id).formatted
    }

    fn clear_formatted(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current);
            node.formatted = false;
            stack.extend(node.children.iter().copied());
            if let NodeKind::Page(state) = &node.kind {
                stack.extend(state.placeholders.iter());
            }
        }
    }

    // ── Copying ────────────────────────────────────────────────

    /// Clone a single node without its children or lines. The clone has no
    /// parent and does not carry the original's document id.
    pub fn copy_shallow(&mut self, id: NodeId) -> NodeId {
        let mut clone = self.node(id).clone();
        clone.parent = None;
        clone.id = None;
        clone.children.clear();
        if let NodeKind::Paragraph(state) = &mut clone.kind {
            state.lines.clear();
        }
        let new_id = NodeId(self.nodes.len());
        self.nodes.push(clone);
        new_id
    }

    /// Deep structural clone of a subtree. Line parts inside the copy point
    /// at the copied texts; a copied dynamic page gets its own prototype and
    /// starts with no pages and an empty formatting memo.
    pub fn copy(&mut self, id: NodeId) -> NodeId {
        let mut mapping = HashMap::new();
        let copy = self.copy_recursive(id, &mut mapping);

        for new_id in mapping.values().copied().collect::<Vec<_>>() {
            if let NodeKind::Paragraph(state) = &mut self.node_mut(new_id).kind {
                for part in state.lines.iter_mut().flat_map(|l| l.parts.iter_mut()) {
                    if let Some(mapped) = mapping.get(&part.text) {
                        part.text = *mapped;
                    }
                }
            }
        }
        copy
    }

    fn copy_recursive(&mut self, id: NodeId, mapping: &mut HashMap<NodeId, NodeId>) -> NodeId {
        let mut clone = self.node(id).clone();
        clone.parent = None;
        let children = std::mem::take(&mut clone.children);
        let new_id = NodeId(self.nodes.len());
        self.nodes.push(clone);
        mapping.insert(id, new_id);

        if let NodeKind::DynamicPage(state) = &self.node(id).kind {
            let prototype = state.prototype;
            let new_prototype = self.copy(prototype);
            self.clear_formatted(new_prototype);
            self.node_mut(new_prototype).parent = Some(new_id);
            self.node_mut(new_id).kind = NodeKind::DynamicPage(DynamicPageState::new(new_prototype));
            self.node_mut(new_id).formatted = false;
        }

        if let NodeKind::Page(state) = &self.node(id).kind {
            let mut placeholders = state.placeholders;
            for slot in Placeholder::ALL {
                if let Some(original) = placeholders.get(slot) {
                    let placeholder = self.copy_recursive(original, mapping);
                    self.node_mut(placeholder).parent = Some(new_id);
                    *placeholders.slot_mut(slot) = Some(placeholder);
                }
            }
            if let NodeKind::Page(state) = &mut self.node_mut(new_id).kind {
                state.placeholders = placeholders;
            }
        }

        for child in children {
            let child_copy = self.copy_recursive(child, mapping);
            self.node_mut(child_copy).parent = Some(new_id);
            self.node_mut(new_id).children.push(child_copy);
        }
        new_id
    }
}

fn unbounded_if_unset(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v > 0.0 => v,
        _ => f64::INFINITY,
    }
}
