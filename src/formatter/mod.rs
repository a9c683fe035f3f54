//! # Formatting
//!
//! Formatting resolves every node's size, then its position, then splits
//! dynamic page content into pages.
//!
//! Sizes come from [`Formatter`]s chosen by node kind. Pre-formatters run
//! top-down before a node's children are formatted (they fix the width the
//! children can use); post-formatters run bottom-up afterwards (they derive
//! heights from content). A node is formatted once: later passes see the
//! memo flag and skip it.
//!
//! ```text
//! format_node(n)
//!   ├── pre-formatters(n)       Standard, TextDimension, ImageDimension, ...
//!   ├── format_node(child) ...
//!   └── post-formatters(n)      Paragraph, ContainerDimension, RowDimension
//! position_tree(root)           flow placement, top-left origin
//! paginate(dynamic page) ...    break content across cloned pages
//! ```

pub mod pagination;

use log::debug;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::font::FontRegistry;
use crate::geometry::Point;
use crate::node::paragraph::{fill_lines, TextRun};
use crate::node::text::split_words;
use crate::node::{NodeId, NodeKind, NodeTree, Placeholder};
use crate::resource::ResourceCache;
use crate::style::{Float, PageSize};

const EPSILON: f64 = 1e-6;

pub struct FormatContext<'a> {
    pub fonts: &'a FontRegistry,
    pub resources: &'a mut ResourceCache,
    pub config: &'a EngineConfig,
}

pub trait Formatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, ctx: &mut FormatContext<'_>) -> Result<()>;
}

/// Page size, with the page's top-left corner at the origin.
pub struct PageDimensionFormatter;

impl Formatter for PageDimensionFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, ctx: &mut FormatContext<'_>) -> Result<()> {
        let size: PageSize = tree.attributes(id).page_size.unwrap_or(ctx.config.page_size);
        let (width, height) = size.dimensions();
        let node = tree.node_mut(id);
        node.set_width(width);
        node.set_height(height);
        tree.set_position(id, Point::ORIGIN)
    }
}

/// Width from the parent's content box and height from padding, both
/// clamped to the node's maximum size.
pub struct StandardDimensionFormatter;

impl Formatter for StandardDimensionFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, _ctx: &mut FormatContext<'_>) -> Result<()> {
        let parent_width = match tree.parent(id) {
            Some(parent) => Some(tree.width_without_paddings(parent)?),
            None => None,
        };
        let max_width = tree.max_width(id);
        let max_height = tree.max_height(id);
        let node = tree.node(id);
        let attributes = &node.attributes;

        let mut width = node.width().or(attributes.width);
        if node.kind.is_inline() {
            width = Some(0.0);
        } else if width.is_none() {
            // Floats start from the full width and shrink to their content
            // once it is formatted.
            if let Some(parent_width) = parent_width {
                width = Some((parent_width - attributes.margin.horizontal()).min(max_width));
            }
        }
        let width = width.unwrap_or(0.0);
        let height = node.height().or(attributes.height).unwrap_or(0.0);
        let padding = attributes.padding;

        let mut preferred = width + padding.horizontal();
        if let Some(parent_width) = parent_width {
            if parent_width < preferred {
                preferred = parent_width;
            }
        }
        let preferred = preferred.max(0.0).min(max_width);
        let height = (height + padding.vertical()).min(max_height);

        let node = tree.node_mut(id);
        node.set_width(preferred);
        node.set_height(height);
        Ok(())
    }
}

/// Split text into words and measure them with the node's font.
pub struct TextDimensionFormatter;

impl Formatter for TextDimensionFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, ctx: &mut FormatContext<'_>) -> Result<()> {
        let NodeKind::Text(state) = &tree.node(id).kind else {
            return Ok(());
        };
        let words = split_words(&state.text);
        let metrics = ctx.fonts.get(&tree.font_type(id))?;
        let font_size = tree.font_size(id);
        let sizes = words
            .iter()
            .map(|w| metrics.text_width(w, font_size))
            .collect();
        tree.set_words_sizes(id, words, sizes)
    }
}

/// Size an image from its pixel size and any explicit width or height,
/// keeping the aspect ratio and fitting the parent's content width.
pub struct ImageDimensionFormatter;

impl Formatter for ImageDimensionFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, ctx: &mut FormatContext<'_>) -> Result<()> {
        let NodeKind::Image(image) = &tree.node(id).kind else {
            return Ok(());
        };
        let loaded = ctx.resources.image(&image.src)?;
        let intrinsic_width = loaded.width_px.max(1) as f64;
        let intrinsic_height = loaded.height_px.max(1) as f64;
        let ratio = intrinsic_height / intrinsic_width;

        let attributes = &tree.node(id).attributes;
        let (mut width, mut height) = match (attributes.width, attributes.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * ratio),
            (None, Some(h)) => (h / ratio, h),
            (None, None) => (intrinsic_width, intrinsic_height),
        };
        if let Some(parent) = tree.parent(id) {
            let available = tree.width_without_paddings(parent)? - tree.padding(id).horizontal();
            if width > available && available > 0.0 {
                height *= available / width;
                width = available;
            }
        }

        let node = tree.node_mut(id);
        node.set_width(width);
        node.set_height(height);
        Ok(())
    }
}

/// Distribute the table's content width over its columns and size every
/// cell to the columns it spans. Explicit cell widths fix their column;
/// the remaining width is shared equally.
pub struct TableColumnFormatter;

impl Formatter for TableColumnFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, _ctx: &mut FormatContext<'_>) -> Result<()> {
        let content_width = tree.width_without_paddings(id)?;
        let rows: Vec<Vec<NodeId>> = tree
            .children(id)
            .iter()
            .filter(|r| matches!(tree.node(**r).kind, NodeKind::TableRow))
            .map(|r| tree.children(*r).to_vec())
            .collect();

        let mut columns: Vec<Option<f64>> = Vec::new();
        let mut spans: Vec<(NodeId, usize, usize)> = Vec::new();
        for row in &rows {
            let mut column = 0;
            for cell in row {
                let attributes = &tree.node(*cell).attributes;
                let span = attributes.colspan.unwrap_or(1).max(1) as usize;
                if columns.len() < column + span {
                    columns.resize(column + span, None);
                }
                if span == 1 {
                    if let Some(width) = attributes.width {
                        let outer = width + attributes.padding.horizontal();
                        columns[column] = Some(columns[column].map_or(outer, |w: f64| w.max(outer)));
                    }
                }
                spans.push((*cell, column, span));
                column += span;
            }
        }
        if columns.is_empty() {
            return Ok(());
        }

        let fixed: f64 = columns.iter().flatten().sum();
        let flexible = columns.iter().filter(|c| c.is_none()).count();
        let share = if flexible > 0 {
            ((content_width - fixed) / flexible as f64).max(0.0)
        } else {
            0.0
        };
        let widths: Vec<f64> = columns.iter().map(|c| c.unwrap_or(share)).collect();
        debug!("Table {} columns: {:?}", id.index(), widths);

        for (cell, column, span) in spans {
            let outer: f64 = widths[column..column + span].iter().sum();
            let padding = tree.padding(cell).horizontal();
            let node = tree.node_mut(cell);
            if let NodeKind::TableCell(state) = &mut node.kind {
                state.column = column;
            }
            node.set_width((outer - padding).max(0.0));
        }
        Ok(())
    }
}

/// Break the paragraph's texts into lines and size the paragraph and its
/// texts from them.
pub struct ParagraphFormatter;

impl Formatter for ParagraphFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, _ctx: &mut FormatContext<'_>) -> Result<()> {
        let available = tree.width_without_paddings(id)?;
        let align = tree.text_align(id);

        let lines = {
            let runs: Vec<TextRun<'_>> = tree
                .children(id)
                .iter()
                .filter_map(|child| match &tree.node(*child).kind {
                    NodeKind::Text(state) => Some(TextRun {
                        text: *child,
                        words: state.words(),
                        sizes: state.word_sizes(),
                        line_height: tree.line_height(*child),
                    }),
                    _ => None,
                })
                .collect();
            fill_lines(&runs, available, align)
        };

        let texts = tree.children(id).to_vec();
        let NodeKind::Paragraph(state) = &mut tree.node_mut(id).kind else {
            return Ok(());
        };
        state.lines = lines;
        let state = state.clone();

        for text in texts {
            let height = state
                .line_range_of(text)
                .map_or(0.0, |(first, last)| {
                    let last = &state.lines[last];
                    last.y_translation + last.height - state.lines[first].y_translation
                });
            let node = tree.node_mut(text);
            node.set_width(available);
            node.set_height(height);
        }

        if tree.node(id).attributes.height.is_none() {
            let height = state.lines_height() + tree.padding(id).vertical();
            let height = height.min(tree.max_height(id));
            tree.node_mut(id).set_height(height);
        }
        Ok(())
    }
}

/// Height from the flow of the children; floats without a width shrink to
/// their content.
pub struct ContainerDimensionFormatter;

impl Formatter for ContainerDimensionFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, _ctx: &mut FormatContext<'_>) -> Result<()> {
        let flow = flow_layout(tree, id)?;
        let attributes = tree.node(id).attributes.clone();
        let padding = attributes.padding;

        if attributes.height.is_none() {
            let height = (flow.height + padding.vertical()).min(tree.max_height(id));
            tree.node_mut(id).set_height(height);
        }
        let shrinks = attributes.float != Float::None
            && attributes.width.is_none()
            && !matches!(tree.node(id).kind, NodeKind::TableCell(_));
        if shrinks {
            let width = tree.width(id)?.min(flow.used_width + padding.horizontal());
            tree.node_mut(id).set_width(width);
        }
        Ok(())
    }
}

/// Row height is the tallest cell; every cell is stretched to it.
pub struct RowDimensionFormatter;

impl Formatter for RowDimensionFormatter {
    fn format(&self, tree: &mut NodeTree, id: NodeId, _ctx: &mut FormatContext<'_>) -> Result<()> {
        let cells = tree.children(id).to_vec();
        let mut tallest: f64 = 0.0;
        for cell in &cells {
            tallest = tallest.max(tree.height(*cell)?);
        }
        for cell in &cells {
            tree.node_mut(*cell).set_height(tallest);
        }
        if tree.node(id).attributes.height.is_none() {
            let height = tallest + tree.padding(id).vertical();
            tree.node_mut(id).set_height(height);
        }
        Ok(())
    }
}

type FormatterList = &'static [&'static dyn Formatter];

const NONE: FormatterList = &[];
const PAGE: FormatterList = &[&PageDimensionFormatter];
const STANDARD: FormatterList = &[&StandardDimensionFormatter];
const TEXT: FormatterList = &[&StandardDimensionFormatter, &TextDimensionFormatter];
const IMAGE: FormatterList = &[&ImageDimensionFormatter, &StandardDimensionFormatter];
const TABLE: FormatterList = &[&StandardDimensionFormatter, &TableColumnFormatter];
const PARAGRAPH: FormatterList = &[&ParagraphFormatter];
const CONTAINER: FormatterList = &[&ContainerDimensionFormatter];
const ROW: FormatterList = &[&RowDimensionFormatter];

/// Pre- and post-formatters of a node kind.
fn formatters_for(kind: &NodeKind) -> (FormatterList, FormatterList) {
    match kind {
        NodeKind::PageCollection | NodeKind::DynamicPage(_) => (NONE, NONE),
        NodeKind::Page(_) => (PAGE, NONE),
        NodeKind::Container | NodeKind::TableCell(_) => (STANDARD, CONTAINER),
        NodeKind::Paragraph(_) => (STANDARD, PARAGRAPH),
        NodeKind::Text(_) => (TEXT, NONE),
        NodeKind::Image(_) => (IMAGE, NONE),
        NodeKind::Table => (TABLE, CONTAINER),
        NodeKind::TableRow => (STANDARD, ROW),
        NodeKind::PageBreak => (STANDARD, NONE),
    }
}

/// Resolve the size of `id` and everything below it.
pub fn format_node(tree: &mut NodeTree, id: NodeId, ctx: &mut FormatContext<'_>) -> Result<()> {
    if tree.is_marked_as_formatted(id) {
        return Ok(());
    }
    let (pre, post) = formatters_for(&tree.node(id).kind);
    for formatter in pre {
        formatter.format(tree, id, ctx)?;
    }

    let mut children = Vec::new();
    if let NodeKind::DynamicPage(state) = &tree.node(id).kind {
        children.push(state.prototype);
    }
    children.extend_from_slice(tree.children(id));
    if let NodeKind::Page(state) = &tree.node(id).kind {
        children.extend(state.placeholders.iter());
    }
    for child in children {
        format_node(tree, child, ctx)?;
    }

    for formatter in post {
        formatter.format(tree, id, ctx)?;
    }
    tree.mark_as_formatted(id);
    Ok(())
}

/// Offsets of children inside a content box.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Flow {
    /// Top-left corner of each child's box relative to the content box.
    pub placements: Vec<(NodeId, Point)>,
    pub height: f64,
    pub used_width: f64,
}

/// Lay children out in flow order: blocks stack vertically, consecutive
/// floats share rows (left floats from the left edge, right floats from the
/// right edge) and wrap when the row is full.
pub(crate) fn flow_layout(tree: &NodeTree, id: NodeId) -> Result<Flow> {
    let content_width = tree.width_without_paddings(id)?;
    let mut flow = Flow::default();
    let mut cursor = 0.0;
    let mut row_left = 0.0;
    let mut row_right = 0.0;
    let mut row_height: f64 = 0.0;

    for child in tree.children(id) {
        let child = *child;
        let margin = tree.margin(child);
        let width = tree.width(child)?;
        let height = tree.height(child)?;
        let outer_width = margin.horizontal() + width;
        let outer_height = margin.vertical() + height;
        let float = match tree.node(child).kind {
            NodeKind::TableCell(_) => Float::Left,
            _ => tree.attributes(child).float,
        };

        match float {
            Float::None => {
                cursor += row_height;
                row_left = 0.0;
                row_right = 0.0;
                row_height = 0.0;
                flow.placements
                    .push((child, Point::new(margin.left, cursor + margin.top)));
                cursor += outer_height;
                flow.used_width = flow.used_width.max(outer_width + natural_slack(tree, child));
            }
            Float::Left | Float::Right => {
                let row_used = row_left + row_right;
                if row_used > 0.0 && row_used + outer_width > content_width + EPSILON {
                    cursor += row_height;
                    row_left = 0.0;
                    row_right = 0.0;
                    row_height = 0.0;
                }
                let x = if float == Float::Left {
                    let x = row_left + margin.left;
                    row_left += outer_width;
                    x
                } else {
                    row_right += outer_width;
                    content_width - row_right + margin.left
                };
                flow.placements.push((child, Point::new(x, cursor + margin.top)));
                row_height = row_height.max(outer_height);
                flow.used_width = flow.used_width.max(row_left + row_right);
            }
        }
    }
    flow.height = cursor + row_height;
    Ok(flow)
}

/// How much narrower a block's content is than its box: a paragraph only
/// needs its widest line.
fn natural_slack(tree: &NodeTree, id: NodeId) -> f64 {
    match &tree.node(id).kind {
        NodeKind::Paragraph(state) => {
            let widest = state
                .lines
                .iter()
                .map(|l| l.width())
                .fold(0.0, f64::max);
            let content = tree.width_without_paddings(id).unwrap_or(widest);
            -(content - widest).max(0.0)
        }
        _ => 0.0,
    }
}

/// Place every node below `id`. Pages (and dynamic page prototypes) were
/// put at the origin by their formatter.
pub fn position_tree(tree: &mut NodeTree, id: NodeId) -> Result<()> {
    match &tree.node(id).kind {
        NodeKind::PageCollection => {
            for child in tree.children(id).to_vec() {
                position_tree(tree, child)?;
            }
            Ok(())
        }
        NodeKind::Paragraph(_) => position_texts(tree, id),
        NodeKind::Text(_) | NodeKind::Image(_) | NodeKind::PageBreak => Ok(()),
        NodeKind::Page(_) | NodeKind::DynamicPage(_) => position_page(tree, id),
        _ => position_children(tree, id),
    }
}

/// Headers sit at the top of the padded area, footers at its bottom and
/// the watermark in the middle of the page. Content flows between header
/// and footer.
fn position_page(tree: &mut NodeTree, id: NodeId) -> Result<()> {
    let top_left = tree.first_point(id)?;
    let padding = tree.padding(id);
    let page_width = tree.width(id)?;
    let page_height = tree.height(id)?;
    let placeholders = tree.placeholders(id);

    if let Some(header) = placeholders.header {
        let margin = tree.margin(header);
        let at = top_left.translate(padding.left + margin.left, padding.top + margin.top);
        tree.set_position(header, at)?;
        position_tree(tree, header)?;
    }
    if let Some(footer) = placeholders.footer {
        let margin = tree.margin(footer);
        let y = page_height - padding.bottom - margin.bottom - tree.height(footer)?;
        tree.set_position(footer, top_left.translate(padding.left + margin.left, y))?;
        position_tree(tree, footer)?;
    }
    if let Some(watermark) = placeholders.watermark {
        let x = (page_width - tree.width(watermark)?) / 2.0;
        let y = (page_height - tree.height(watermark)?) / 2.0;
        tree.set_position(watermark, top_left.translate(x, y))?;
        position_tree(tree, watermark)?;
    }

    let header_space = tree.placeholder_space(id, Placeholder::Header)?;
    let origin = top_left.translate(padding.left, padding.top + header_space);
    place_flow(tree, id, origin)
}

fn position_children(tree: &mut NodeTree, id: NodeId) -> Result<()> {
    let padding = tree.padding(id);
    let origin = tree.first_point(id)?.translate(padding.left, padding.top);
    place_flow(tree, id, origin)
}

fn place_flow(tree: &mut NodeTree, id: NodeId, origin: Point) -> Result<()> {
    let flow = flow_layout(tree, id)?;
    for (child, offset) in flow.placements {
        tree.set_position(child, origin.translate(offset.x, offset.y))?;
        position_tree(tree, child)?;
    }
    Ok(())
}

/// A text's box spans its lines across the whole content width.
fn position_texts(tree: &mut NodeTree, id: NodeId) -> Result<()> {
    let padding = tree.padding(id);
    let origin = tree.first_point(id)?.translate(padding.left, padding.top);
    let NodeKind::Paragraph(state) = &tree.node(id).kind else {
        return Ok(());
    };
    let placements: Vec<(NodeId, f64)> = tree
        .children(id)
        .iter()
        .map(|text| {
            let top = state
                .line_range_of(*text)
                .map_or(0.0, |(first, _)| state.lines[first].y_translation);
            (*text, top)
        })
        .collect();
    for (text, top) in placements {
        tree.set_position(text, origin.translate(0.0, top))?;
    }
    Ok(())
}

/// Format, position and paginate the document rooted at `root`.
pub fn format_document(tree: &mut NodeTree, root: NodeId, ctx: &mut FormatContext<'_>) -> Result<()> {
    format_node(tree, root, ctx)?;
    position_tree(tree, root)?;

    let dynamic_pages: Vec<NodeId> = match tree.node(root).kind {
        NodeKind::PageCollection => tree
            .children(root)
            .iter()
            .copied()
            .filter(|c| matches!(tree.node(*c).kind, NodeKind::DynamicPage(_)))
            .collect(),
        NodeKind::DynamicPage(_) => vec![root],
        _ => Vec::new(),
    };
    for dynamic in dynamic_pages {
        pagination::paginate(tree, dynamic)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CellState, ParagraphState, TextState};
    use serde_json::json;

    struct Fixture {
        fonts: FontRegistry,
        resources: ResourceCache,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                fonts: FontRegistry::with_standard_fonts(),
                resources: ResourceCache::new(),
                config: EngineConfig::default(),
            }
        }

        fn ctx(&mut self) -> FormatContext<'_> {
            FormatContext {
                fonts: &self.fonts,
                resources: &mut self.resources,
                config: &self.config,
            }
        }
    }

    /// A fixed-size root container standing in for a page content box.
    fn root(tree: &mut NodeTree, width: f64) -> NodeId {
        let root = tree.add_node(NodeKind::Container);
        tree.set_attribute(root, "width", &json!(width)).unwrap();
        tree.set_attribute(root, "height", &json!(1000)).unwrap();
        root
    }

    fn paragraph(tree: &mut NodeTree, parent: NodeId, text: &str) -> (NodeId, NodeId) {
        let p = tree.add_node(NodeKind::Paragraph(ParagraphState::default()));
        let t = tree.add_node(NodeKind::Text(TextState::new(text)));
        tree.append_child(parent, p);
        tree.append_child(p, t);
        (p, t)
    }

    #[test]
    fn standard_width_respects_parent_and_bounds() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 300.0);
        let child = tree.add_node(NodeKind::Container);
        tree.append_child(root, child);
        tree.set_attribute(child, "margin", &json!("0 10")).unwrap();
        let bounded = tree.add_node(NodeKind::Container);
        tree.append_child(root, bounded);
        tree.set_attribute(bounded, "max-width", &json!(120)).unwrap();
        tree.set_attribute(bounded, "padding", &json!(5)).unwrap();
        tree.set_attribute(bounded, "max-height", &json!(8)).unwrap();

        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        assert_eq!(tree.width(child).unwrap(), 280.0);
        assert_eq!(tree.height(child).unwrap(), 0.0);
        assert!(tree.width(bounded).unwrap() <= 120.0);
        assert!(tree.height(bounded).unwrap() <= 8.0);
    }

    #[test]
    fn padding_never_overflows_parent() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 200.0);
        let child = tree.add_node(NodeKind::Container);
        tree.append_child(root, child);
        tree.set_attribute(child, "padding", &json!(20)).unwrap();
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        assert_eq!(tree.width(child).unwrap(), 200.0);
        assert_eq!(tree.height(child).unwrap(), 40.0);
    }

    #[test]
    fn paragraph_lines_fit_content_width() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 100.0);
        let (p, t) = paragraph(
            &mut tree,
            root,
            "The quick brown fox jumps over the lazy dog again and again",
        );
        tree.set_attribute(p, "padding", &json!(5)).unwrap();

        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        let NodeKind::Paragraph(state) = &tree.node(p).kind else {
            panic!("not a paragraph");
        };
        assert!(state.lines.len() > 1);
        for line in &state.lines {
            assert!(line.width() <= 90.0 + 1e-9);
            assert!((line.height - 14.4).abs() < 1e-9);
        }
        let expected = state.lines_height() + 10.0;
        assert!((tree.height(p).unwrap() - expected).abs() < 1e-9);
        assert_eq!(tree.width(t).unwrap(), 90.0);
        assert!((tree.height(t).unwrap() - state.lines_height()).abs() < 1e-9);
    }

    #[test]
    fn formatting_is_memoised() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 100.0);
        let (p, _) = paragraph(&mut tree, root, "one two three");
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        let before = tree.node(p).clone();
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        assert_eq!(tree.height(p).unwrap(), before.height().unwrap());
        assert!(tree.is_marked_as_formatted(p));
    }

    #[test]
    fn unknown_font_fails_formatting() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 100.0);
        let (p, _) = paragraph(&mut tree, root, "text");
        tree.set_attribute(p, "font-type", &json!("fraktur")).unwrap();
        let err = format_node(&mut tree, root, &mut fixture.ctx()).unwrap_err();
        assert!(err.to_string().contains("Font \"fraktur\" is not registered."));
    }

    #[test]
    fn floats_share_rows_and_wrap() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 100.0);
        let mut boxes = Vec::new();
        for float in ["left", "right", "left"] {
            let b = tree.add_node(NodeKind::Container);
            tree.set_attribute(b, "float", &json!(float)).unwrap();
            tree.set_attribute(b, "width", &json!(40)).unwrap();
            tree.set_attribute(b, "height", &json!(10)).unwrap();
            tree.append_child(root, b);
            boxes.push(b);
        }
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        tree.set_position(root, Point::ORIGIN).unwrap();
        position_tree(&mut tree, root).unwrap();

        assert_eq!(tree.first_point(boxes[0]).unwrap(), Point::new(0.0, 0.0));
        assert_eq!(tree.first_point(boxes[1]).unwrap(), Point::new(60.0, 0.0));
        assert_eq!(tree.first_point(boxes[2]).unwrap(), Point::new(0.0, 10.0));
    }

    #[test]
    fn blocks_stack_with_margins() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 100.0);
        let first = tree.add_node(NodeKind::Container);
        let second = tree.add_node(NodeKind::Container);
        for (node, height) in [(first, 20), (second, 30)] {
            tree.set_attribute(node, "height", &json!(height)).unwrap();
            tree.set_attribute(node, "margin", &json!("5 0")).unwrap();
            tree.append_child(root, node);
        }
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        tree.set_position(root, Point::new(10.0, 10.0)).unwrap();
        position_tree(&mut tree, root).unwrap();

        assert_eq!(tree.first_point(first).unwrap(), Point::new(10.0, 15.0));
        assert_eq!(tree.first_point(second).unwrap(), Point::new(10.0, 45.0));
    }

    #[test]
    fn table_columns_share_width() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 300.0);
        let table = tree.add_node(NodeKind::Table);
        tree.append_child(root, table);
        let mut cells = Vec::new();
        for row_spec in [vec![(Some(100), 1), (None, 1), (None, 1)], vec![(None, 2), (None, 1)]] {
            let row = tree.add_node(NodeKind::TableRow);
            tree.append_child(table, row);
            for (width, span) in row_spec {
                let cell = tree.add_node(NodeKind::TableCell(CellState::default()));
                if let Some(width) = width {
                    tree.set_attribute(cell, "width", &json!(width)).unwrap();
                }
                tree.set_attribute(cell, "colspan", &json!(span)).unwrap();
                tree.set_attribute(cell, "height", &json!(span * 10)).unwrap();
                tree.append_child(row, cell);
                cells.push(cell);
            }
        }
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();

        let widths: Vec<f64> = cells.iter().map(|c| tree.width(*c).unwrap()).collect();
        assert_eq!(widths, vec![100.0, 100.0, 100.0, 200.0, 100.0]);
        assert_eq!(tree.height(cells[3]).unwrap(), 20.0);
        assert_eq!(tree.height(cells[4]).unwrap(), 20.0);
        assert_eq!(tree.height(table).unwrap(), 30.0);
        let NodeKind::TableCell(state) = &tree.node(cells[4]).kind else {
            panic!("not a cell");
        };
        assert_eq!(state.column, 2);
    }

    #[test]
    fn image_keeps_aspect_ratio() {
        let mut fixture = Fixture::new();
        let mut tree = NodeTree::new();
        let root = root(&mut tree, 300.0);
        let src = crate::image_loader::tests::png_data_uri([0, 0, 0, 255]);
        let image = tree.add_node(NodeKind::Image(crate::node::ImageState { src }));
        tree.set_attribute(image, "width", &json!(50)).unwrap();
        tree.append_child(root, image);
        format_node(&mut tree, root, &mut fixture.ctx()).unwrap();
        assert_eq!(tree.width(image).unwrap(), 50.0);
        assert_eq!(tree.height(image).unwrap(), 50.0);
        assert_eq!(fixture.resources.image_count(), 1);
    }
}
