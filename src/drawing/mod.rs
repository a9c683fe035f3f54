//! # Drawing tasks
//!
//! After formatting and pagination the tree is final. Drawing walks it in
//! three passes and turns every visible piece into a [`DrawingTask`]:
//!
//! 1. **ordered**: text line parts and images, in reading order;
//! 2. **unordered**: backgrounds and borders, innermost nodes first;
//! 3. **post**: annotations from node behaviours, once every page exists,
//!    so internal links can resolve their target page.
//!
//! Dynamic pages contribute their whole page history, in creation order.
//! A page's placeholders are visited after its content, so their tasks run
//! first inside each tier: a watermark ends up under the text.
//!
//! A node inside an `overflow: hidden` ancestor is clipped to that
//! ancestor's box (to the shared area of all such boxes), and dropped when
//! it lies entirely outside.
//!
//! All tasks go into one [`DrawingTaskHeap`]. Tasks run by ascending
//! [`DrawingPriority`] tier; inside a tier the task inserted last runs
//! first. Because the unordered pass inserts a node after its descendants,
//! an outer background is painted before (under) the inner ones.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::debug;
use serde::Serialize;

use crate::error::{QuireError, Result};
use crate::font::FontRegistry;
use crate::geometry::{Point, Rectangle};
use crate::graphics::{FillMode, GraphicsContext};
use crate::node::{Behaviour, NodeId, NodeKind, NodeTree};
use crate::resource::ResourceCache;
use crate::style::{Border, Color, Overflow, TextDecoration};

/// Text encoding passed to backends with every text command.
pub const TEXT_ENCODING: &str = "utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DrawingPriority {
    Background1,
    Background2,
    Background3,
    Foreground1,
    Foreground2,
    Foreground3,
}

/// Rotation around a point, in degrees clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub center: Point,
    pub angle: f64,
}

/// A drawing operation with its arguments captured at collection time.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Background {
        origin: Point,
        width: f64,
        height: f64,
        color: Color,
        radius: f64,
        alpha: Option<f64>,
        clip: Option<Rectangle>,
    },
    Border {
        origin: Point,
        width: f64,
        height: f64,
        border: Border,
        clip: Option<Rectangle>,
    },
    Text {
        content: String,
        /// Left end of the baseline.
        position: Point,
        /// Registry name of the font.
        font: String,
        size: f64,
        width: f64,
        color: Option<Color>,
        word_spacing: f64,
        decoration: TextDecoration,
        alpha: Option<f64>,
        rotation: Option<Rotation>,
        clip: Option<Rectangle>,
    },
    Image {
        source: String,
        origin: Point,
        width: f64,
        height: f64,
        alpha: Option<f64>,
        rotation: Option<Rotation>,
        clip: Option<Rectangle>,
    },
    Uri {
        origin: Point,
        width: f64,
        height: f64,
        uri: String,
    },
    GoTo {
        origin: Point,
        width: f64,
        height: f64,
        page: usize,
        top: f64,
    },
    StickyNote {
        origin: Point,
        width: f64,
        height: f64,
        text: String,
    },
}

/// What tasks need besides their own arguments.
#[derive(Debug, Clone, Copy)]
pub struct DrawingContext<'a> {
    pub fonts: &'a FontRegistry,
    pub resources: &'a ResourceCache,
}

#[derive(Debug, Clone)]
pub struct DrawingTask {
    pub op: DrawOp,
    /// Index of the target page in document order.
    pub page: usize,
    pub priority: DrawingPriority,
    order: u64,
}

impl DrawingTask {
    pub fn order(&self) -> u64 {
        self.order
    }

    /// Emit the task's graphics calls. Any failure is reported as a drawing
    /// failure wrapping its cause.
    pub fn invoke(&self, gc: &mut GraphicsContext, ctx: &DrawingContext<'_>) -> Result<()> {
        self.op.emit(gc, ctx).map_err(QuireError::drawing)
    }
}

/// Execution order: lower tier first, then later insertion first.
impl Ord for DrawingTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for DrawingTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DrawingTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DrawingTask {}

#[derive(Debug, Default)]
pub struct DrawingTaskHeap {
    heap: BinaryHeap<Reverse<DrawingTask>>,
    next_order: u64,
}

impl DrawingTaskHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, op: DrawOp, page: usize, priority: DrawingPriority) {
        let task = DrawingTask {
            op,
            page,
            priority,
            order: self.next_order,
        };
        self.next_order += 1;
        self.heap.push(Reverse(task));
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove all tasks in execution order.
    pub fn drain(&mut self) -> impl Iterator<Item = DrawingTask> + '_ {
        std::iter::from_fn(move || self.heap.pop().map(|Reverse(task)| task))
    }
}

impl DrawOp {
    fn emit(&self, gc: &mut GraphicsContext, ctx: &DrawingContext<'_>) -> Result<()> {
        match self {
            DrawOp::Background {
                origin,
                width,
                height,
                color,
                radius,
                alpha,
                clip,
            } => {
                gc.save_state();
                apply_clip(gc, *clip);
                if let Some(alpha) = alpha {
                    gc.set_alpha(*alpha);
                }
                gc.set_fill_color(*color);
                if *radius > 0.0 {
                    gc.draw_rounded_rectangle(*origin, *width, *height, *radius, FillMode::Fill);
                } else {
                    gc.draw_polygon(rectangle_points(*origin, *width, *height), FillMode::Fill);
                }
                gc.restore_state();
            }
            DrawOp::Border {
                origin,
                width,
                height,
                border,
                clip,
            } => {
                gc.save_state();
                apply_clip(gc, *clip);
                gc.set_line_color(border.color);
                gc.set_line_width(border.size);
                if !border.dash.is_empty() {
                    gc.set_line_dash_pattern(border.dash.clone(), 0.0);
                }
                if border.radius > 0.0 {
                    gc.draw_rounded_rectangle(*origin, *width, *height, border.radius, FillMode::Stroke);
                } else {
                    gc.draw_polygon(rectangle_points(*origin, *width, *height), FillMode::Stroke);
                }
                gc.restore_state();
            }
            DrawOp::Text {
                content,
                position,
                font,
                size,
                width,
                color,
                word_spacing,
                decoration,
                alpha,
                rotation,
                clip,
            } => {
                let metrics = ctx.fonts.get(font)?;
                gc.save_state();
                apply_clip(gc, *clip);
                apply_effects(gc, *alpha, *rotation);
                gc.set_font(metrics.base_font(), *size);
                if let Some(color) = color {
                    gc.set_fill_color(*color);
                }
                gc.draw_text(content, *position, TEXT_ENCODING, *word_spacing, FillMode::Fill);
                let offset = match decoration {
                    TextDecoration::None => None,
                    TextDecoration::Underline => Some(size * 0.15),
                    TextDecoration::LineThrough => Some(-size * 0.25),
                    TextDecoration::Overline => Some(-size * 0.8),
                };
                if let Some(offset) = offset {
                    gc.set_line_color(color.unwrap_or(Color::BLACK));
                    gc.set_line_width((size * 0.05).max(0.5));
                    let y = position.y + offset;
                    gc.draw_line(Point::new(position.x, y), Point::new(position.x + width, y));
                }
                gc.restore_state();
            }
            DrawOp::Image {
                source,
                origin,
                width,
                height,
                alpha,
                rotation,
                clip,
            } => {
                if ctx.resources.loaded_image(source).is_none() {
                    return Err(QuireError::invalid_resource(
                        source.as_str(),
                        "image was not loaded during formatting",
                    ));
                }
                gc.save_state();
                apply_clip(gc, *clip);
                apply_effects(gc, *alpha, *rotation);
                gc.draw_image(source, *origin, *width, *height);
                gc.restore_state();
            }
            DrawOp::Uri {
                origin,
                width,
                height,
                uri,
            } => gc.uri_action(*origin, *width, *height, uri),
            DrawOp::GoTo {
                origin,
                width,
                height,
                page,
                top,
            } => gc.go_to_action(*origin, *width, *height, *page, *top),
            DrawOp::StickyNote {
                origin,
                width,
                height,
                text,
            } => gc.attach_sticky_note(*origin, *width, *height, text),
        }
        Ok(())
    }
}

fn apply_clip(gc: &mut GraphicsContext, clip: Option<Rectangle>) {
    if let Some(clip) = clip {
        gc.clip_rectangle(clip.origin(), clip.width(), clip.height());
    }
}

fn apply_effects(gc: &mut GraphicsContext, alpha: Option<f64>, rotation: Option<Rotation>) {
    if let Some(alpha) = alpha {
        gc.set_alpha(alpha);
    }
    if let Some(rotation) = rotation {
        gc.rotate(rotation.center, rotation.angle);
    }
}

fn rectangle_points(origin: Point, width: f64, height: f64) -> Vec<Point> {
    vec![
        origin,
        origin.translate(width, 0.0),
        origin.translate(width, height),
        origin.translate(0.0, height),
    ]
}

// ── Collection ─────────────────────────────────────────────────

/// Output pages in document order: static pages as they appear, dynamic
/// pages expanded to their page history. Pages dropped from a dynamic
/// page's working set are still output.
pub fn document_pages(tree: &NodeTree, root: NodeId) -> Vec<NodeId> {
    let mut pages = Vec::new();
    let mut push = |id: NodeId| match &tree.node(id).kind {
        NodeKind::Page(_) => pages.push(id),
        NodeKind::DynamicPage(state) => pages.extend(state.history.iter().copied()),
        _ => {}
    };
    match tree.node(root).kind {
        NodeKind::PageCollection => tree.children(root).iter().copied().for_each(&mut push),
        _ => push(root),
    }
    pages
}

/// Collect every drawing task of the document rooted at `root`.
pub fn collect_tasks(tree: &NodeTree, root: NodeId) -> Result<(Vec<NodeId>, DrawingTaskHeap)> {
    let pages = document_pages(tree, root);
    let mut heap = DrawingTaskHeap::new();

    for (index, page) in pages.iter().enumerate() {
        collect_ordered(tree, *page, index, &mut heap)?;
    }
    for (index, page) in pages.iter().enumerate() {
        collect_unordered(tree, *page, index, &mut heap)?;
    }
    for (index, page) in pages.iter().enumerate() {
        collect_post(tree, *page, index, &pages, &mut heap)?;
    }

    debug!("Collected {} drawing tasks on {} pages", heap.len(), pages.len());
    Ok((pages, heap))
}

fn rotation_of(tree: &NodeTree, id: NodeId) -> Result<Option<Rotation>> {
    let Some(ancestor) = tree.ancestor_with_rotation(id) else {
        return Ok(None);
    };
    let Some(degrees) = tree.attributes(ancestor).rotate else {
        return Ok(None);
    };
    let top_left = tree.first_point(ancestor)?;
    let center = top_left.translate(tree.width(ancestor)? / 2.0, tree.height(ancestor)? / 2.0);
    Ok(Some(Rotation { center, angle: degrees }))
}

fn bounds(tree: &NodeTree, id: NodeId) -> Result<Rectangle> {
    Ok(Rectangle::new(tree.first_point(id)?, tree.width(id)?, tree.height(id)?))
}

/// How an area drawn by a node shows through the boxes of the node's
/// `overflow: hidden` ancestors.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Visibility {
    /// Drawn, clipped to the shared area of those boxes if there are any.
    Visible(Option<Rectangle>),
    /// Entirely outside them.
    Hidden,
}

fn visibility(tree: &NodeTree, id: NodeId, area: Rectangle) -> Result<Visibility> {
    let mut clip: Option<Rectangle> = None;
    let mut current = tree.parent(id);
    while let Some(ancestor) = current {
        if tree.attributes(ancestor).overflow == Overflow::Hidden {
            let frame = bounds(tree, ancestor)?;
            clip = match clip {
                None => Some(frame),
                Some(inner) => match inner.intersection(&frame) {
                    Some(shared) => Some(shared),
                    None => return Ok(Visibility::Hidden),
                },
            };
        }
        current = tree.parent(ancestor);
    }
    if let Some(shared) = clip {
        if shared.intersection(&area).is_none() {
            return Ok(Visibility::Hidden);
        }
    }
    Ok(Visibility::Visible(clip))
}

/// Children, then page placeholders.
fn drawn_children(tree: &NodeTree, id: NodeId) -> Vec<NodeId> {
    let mut children = tree.children(id).to_vec();
    if let NodeKind::Page(state) = &tree.node(id).kind {
        children.extend(state.placeholders.iter());
    }
    children
}

fn collect_ordered(tree: &NodeTree, id: NodeId, page: usize, heap: &mut DrawingTaskHeap) -> Result<()> {
    match &tree.node(id).kind {
        NodeKind::Paragraph(state) => {
            let top_left = tree.first_point(id)?;
            let padding = tree.padding(id);
            for line in &state.lines {
                let line_origin = top_left.translate(
                    padding.left + line.x_translation,
                    padding.top + line.y_translation,
                );
                for part in &line.parts {
                    let text = part.text;
                    let size = tree.font_size(text);
                    let part_top = line_origin.translate(
                        part.x_translation,
                        line.height - tree.line_height(text),
                    );
                    let area = Rectangle::new(part_top, part.width, tree.line_height(text));
                    let Visibility::Visible(clip) = visibility(tree, text, area)? else {
                        continue;
                    };
                    let op = DrawOp::Text {
                        content: part.content(),
                        position: part_top.translate(0.0, size),
                        font: tree.font_type(text),
                        size,
                        width: part.width,
                        color: tree.color(text),
                        word_spacing: part.word_spacing.unwrap_or(0.0),
                        decoration: tree.text_decoration(text),
                        alpha: tree.alpha(text),
                        rotation: rotation_of(tree, text)?,
                        clip,
                    };
                    heap.insert(op, page, DrawingPriority::Foreground2);
                }
            }
        }
        NodeKind::Image(image) => {
            if let Visibility::Visible(clip) = visibility(tree, id, bounds(tree, id)?)? {
                let op = DrawOp::Image {
                    source: image.src.clone(),
                    origin: tree.first_point(id)?,
                    width: tree.width(id)?,
                    height: tree.height(id)?,
                    alpha: tree.alpha(id),
                    rotation: rotation_of(tree, id)?,
                    clip,
                };
                heap.insert(op, page, DrawingPriority::Foreground2);
            }
        }
        _ => {}
    }
    for child in drawn_children(tree, id) {
        collect_ordered(tree, child, page, heap)?;
    }
    Ok(())
}

fn collect_unordered(tree: &NodeTree, id: NodeId, page: usize, heap: &mut DrawingTaskHeap) -> Result<()> {
    for child in drawn_children(tree, id) {
        collect_unordered(tree, child, page, heap)?;
    }
    if tree.node(id).kind.is_inline() {
        return Ok(());
    }

    let attributes = tree.attributes(id);
    if attributes.background.is_none() && attributes.border.is_none() {
        return Ok(());
    }
    let Visibility::Visible(clip) = visibility(tree, id, bounds(tree, id)?)? else {
        return Ok(());
    };
    let origin = tree.first_point(id)?;
    let width = tree.width(id)?;
    let height = tree.height(id)?;

    if let Some(background) = &attributes.background {
        if let Some(color) = background.color {
            let op = DrawOp::Background {
                origin,
                width,
                height,
                color,
                radius: background.radius,
                alpha: tree.alpha(id),
                clip,
            };
            heap.insert(op, page, DrawingPriority::Background1);
        }
    }
    if let Some(border) = &attributes.border {
        let op = DrawOp::Border {
            origin,
            width,
            height,
            border: border.clone(),
            clip,
        };
        heap.insert(op, page, DrawingPriority::Background2);
    }
    Ok(())
}

fn collect_post(
    tree: &NodeTree,
    id: NodeId,
    page: usize,
    pages: &[NodeId],
    heap: &mut DrawingTaskHeap,
) -> Result<()> {
    let node = tree.node(id);
    if !node.behaviours.is_empty() {
        let origin = tree.first_point(id)?;
        let width = tree.width(id)?;
        let height = tree.height(id)?;
        for behaviour in &node.behaviours {
            let op = match behaviour {
                Behaviour::GoToUrl(uri) => DrawOp::Uri {
                    origin,
                    width,
                    height,
                    uri: uri.clone(),
                },
                Behaviour::GoToInternal(target) => {
                    let (target_page, top) = resolve_target(tree, target, pages)?;
                    DrawOp::GoTo {
                        origin,
                        width,
                        height,
                        page: target_page,
                        top,
                    }
                }
                Behaviour::StickyNote(text) => DrawOp::StickyNote {
                    origin,
                    width,
                    height,
                    text: text.clone(),
                },
            };
            heap.insert(op, page, DrawingPriority::Foreground3);
        }
    }
    for child in drawn_children(tree, id) {
        collect_post(tree, child, page, pages, heap)?;
    }
    Ok(())
}

/// Page index and top edge of the node carrying `document_id`.
fn resolve_target(tree: &NodeTree, document_id: &str, pages: &[NodeId]) -> Result<(usize, f64)> {
    let target = tree.find_by_document_id(document_id).ok_or_else(|| {
        QuireError::invalid_argument(format!("Node with id \"{}\" doesn't exist.", document_id))
    })?;

    let mut current = Some(target);
    while let Some(node) = current {
        if let Some(index) = pages.iter().position(|p| *p == node) {
            return Ok((index, tree.first_point(target)?.y));
        }
        current = tree.parent(node);
    }
    Err(QuireError::structural(format!(
        "Node with id \"{}\" is not on any page.",
        document_id
    )))
}
