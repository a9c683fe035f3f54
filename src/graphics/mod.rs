//! # Graphics
//!
//! The drawing surface abstraction. Drawing tasks talk to a
//! [`GraphicsContext`], which records every call as a [`GraphicsCommand`]
//! in a FIFO queue. Nothing reaches a backend until [`GraphicsContext::commit`]
//! drains the queue into a [`Surface`]. One context exists per page.
//!
//! Commands use layout coordinates (top-left origin, y down, points). A
//! backend with another orientation converts on its side.

pub mod recording;

use serde::Serialize;

use crate::error::Result;
use crate::geometry::Point;
use crate::resource::ResourceCache;
use crate::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FillMode {
    Fill,
    Stroke,
    FillAndStroke,
}

/// A pre-built one dimensional barcode: alternating bar and gap widths
/// (starting with a bar) in module units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Barcode {
    pub pattern: Vec<u8>,
    pub module_width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphicsCommand {
    SaveState,
    RestoreState,
    SetFillColor {
        color: Color,
    },
    SetLineColor {
        color: Color,
    },
    SetLineWidth {
        width: f64,
    },
    SetLineDashPattern {
        pattern: Vec<f64>,
        phase: f64,
    },
    SetFont {
        base_font: String,
        size: f64,
    },
    DrawLine {
        from: Point,
        to: Point,
    },
    DrawPolygon {
        points: Vec<Point>,
        mode: FillMode,
    },
    DrawRoundedRectangle {
        origin: Point,
        width: f64,
        height: f64,
        radius: f64,
        mode: FillMode,
    },
    DrawEllipse {
        center: Point,
        width: f64,
        height: f64,
        mode: FillMode,
    },
    /// `start` and `end` are in degrees, counter-clockwise from the x axis.
    DrawArc {
        center: Point,
        width: f64,
        height: f64,
        start: f64,
        end: f64,
        mode: FillMode,
    },
    /// `position` is the left end of the baseline.
    DrawText {
        text: String,
        position: Point,
        encoding: String,
        word_spacing: f64,
        mode: FillMode,
    },
    DrawImage {
        source: String,
        origin: Point,
        width: f64,
        height: f64,
    },
    SetAlpha {
        alpha: f64,
    },
    /// Rotate following commands by `angle` degrees around `center`.
    Rotate {
        center: Point,
        angle: f64,
    },
    ClipRectangle {
        origin: Point,
        width: f64,
        height: f64,
    },
    DrawBarcode {
        origin: Point,
        barcode: Barcode,
    },
    UriAction {
        origin: Point,
        width: f64,
        height: f64,
        uri: String,
    },
    /// Link to a point on another page of the same document.
    GoToAction {
        origin: Point,
        width: f64,
        height: f64,
        page: usize,
        top: f64,
    },
    AttachStickyNote {
        origin: Point,
        width: f64,
        height: f64,
        text: String,
    },
}

/// Receives committed commands of one page.
pub trait Surface {
    fn apply(&mut self, command: &GraphicsCommand) -> Result<()>;
}

/// A rendering backend: produces surfaces, collects finished pages and turns
/// them into bytes.
pub trait Engine {
    type Surface: Surface;

    fn create_surface(&mut self, width: f64, height: f64) -> Self::Surface;

    /// Append a committed page to the output.
    fn attach_page(&mut self, surface: Self::Surface);

    fn render(&mut self, resources: &ResourceCache) -> Result<Vec<u8>>;
}

/// Queue of drawing commands for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsContext {
    width: f64,
    height: f64,
    queue: Vec<GraphicsCommand>,
}

impl GraphicsContext {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            queue: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Commands not yet committed.
    pub fn pending(&self) -> &[GraphicsCommand] {
        &self.queue
    }

    fn push(&mut self, command: GraphicsCommand) {
        self.queue.push(command);
    }

    pub fn save_state(&mut self) {
        self.push(GraphicsCommand::SaveState);
    }

    pub fn restore_state(&mut self) {
        self.push(GraphicsCommand::RestoreState);
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.push(GraphicsCommand::SetFillColor { color });
    }

    pub fn set_line_color(&mut self, color: Color) {
        self.push(GraphicsCommand::SetLineColor { color });
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.push(GraphicsCommand::SetLineWidth { width });
    }

    pub fn set_line_dash_pattern(&mut self, pattern: Vec<f64>, phase: f64) {
        self.push(GraphicsCommand::SetLineDashPattern { pattern, phase });
    }

    pub fn set_font(&mut self, base_font: &str, size: f64) {
        self.push(GraphicsCommand::SetFont {
            base_font: base_font.to_string(),
            size,
        });
    }

    pub fn draw_line(&mut self, from: Point, to: Point) {
        self.push(GraphicsCommand::DrawLine { from, to });
    }

    pub fn draw_polygon(&mut self, points: Vec<Point>, mode: FillMode) {
        self.push(GraphicsCommand::DrawPolygon { points, mode });
    }

    pub fn draw_rounded_rectangle(&mut self, origin: Point, width: f64, height: f64, radius: f64, mode: FillMode) {
        self.push(GraphicsCommand::DrawRoundedRectangle {
            origin,
            width,
            height,
            radius,
            mode,
        });
    }

    pub fn draw_ellipse(&mut self, center: Point, width: f64, height: f64, mode: FillMode) {
        self.push(GraphicsCommand::DrawEllipse {
            center,
            width,
            height,
            mode,
        });
    }

    pub fn draw_arc(&mut self, center: Point, width: f64, height: f64, start: f64, end: f64, mode: FillMode) {
        self.push(GraphicsCommand::DrawArc {
            center,
            width,
            height,
            start,
            end,
            mode,
        });
    }

    pub fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        encoding: &str,
        word_spacing: f64,
        mode: FillMode,
    ) {
        self.push(GraphicsCommand::DrawText {
            text: text.to_string(),
            position,
            encoding: encoding.to_string(),
            word_spacing,
            mode,
        });
    }

    /// Queue an image; an empty source draws nothing.
    pub fn draw_image(&mut self, source: &str, origin: Point, width: f64, height: f64) {
        if source.is_empty() {
            return;
        }
        self.push(GraphicsCommand::DrawImage {
            source: source.to_string(),
            origin,
            width,
            height,
        });
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.push(GraphicsCommand::SetAlpha { alpha });
    }

    pub fn rotate(&mut self, center: Point, angle: f64) {
        self.push(GraphicsCommand::Rotate { center, angle });
    }

    pub fn clip_rectangle(&mut self, origin: Point, width: f64, height: f64) {
        self.push(GraphicsCommand::ClipRectangle {
            origin,
            width,
            height,
        });
    }

    pub fn draw_barcode(&mut self, origin: Point, barcode: Barcode) {
        self.push(GraphicsCommand::DrawBarcode { origin, barcode });
    }

    pub fn uri_action(&mut self, origin: Point, width: f64, height: f64, uri: &str) {
        self.push(GraphicsCommand::UriAction {
            origin,
            width,
            height,
            uri: uri.to_string(),
        });
    }

    pub fn go_to_action(&mut self, origin: Point, width: f64, height: f64, page: usize, top: f64) {
        self.push(GraphicsCommand::GoToAction {
            origin,
            width,
            height,
            page,
            top,
        });
    }

    pub fn attach_sticky_note(&mut self, origin: Point, width: f64, height: f64, text: &str) {
        self.push(GraphicsCommand::AttachStickyNote {
            origin,
            width,
            height,
            text: text.to_string(),
        });
    }

    /// Flush queued commands to `surface` in the order they were issued.
    pub fn commit(&mut self, surface: &mut dyn Surface) -> Result<()> {
        for command in self.queue.drain(..) {
            surface.apply(&command)?;
        }
        Ok(())
    }
}
