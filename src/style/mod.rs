//! # Attributes
//!
//! The attribute model shared by every node. Attributes arrive from the
//! parser layer already cascaded and unit-converted to points; this module
//! only validates and stores them. Values that cannot be interpreted fail
//! with `InvalidArgument` rather than being coerced.
//!
//! Attribute names are kebab-case (`margin-top`, `text-align`). Simple
//! attributes carry scalar JSON values; complex attributes (`background`,
//! `border`) carry objects and are merged field by field.

pub mod bag;
pub mod stylesheet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QuireError, Result};

/// Edge values (top, right, bottom, left) used for margin and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    /// CSS-style shorthand: one, two, three or four whitespace separated
    /// values.
    fn parse_shorthand(name: &str, value: &Value) -> Result<Self> {
        if let Some(v) = value.as_f64() {
            return Ok(Edges::uniform(v));
        }
        let text = value
            .as_str()
            .ok_or_else(|| invalid_value(name, value))?;
        let parts = text
            .split_whitespace()
            .map(|p| parse_number_str(name, p))
            .collect::<Result<Vec<f64>>>()?;
        match parts.as_slice() {
            [all] => Ok(Edges::uniform(*all)),
            [v, h] => Ok(Edges::symmetric(*v, *h)),
            [t, h, b] => Ok(Edges {
                top: *t,
                right: *h,
                bottom: *b,
                left: *h,
            }),
            [t, r, b, l] => Ok(Edges {
                top: *t,
                right: *r,
                bottom: *b,
                left: *l,
            }),
            _ => Err(invalid_value(name, value)),
        }
    }
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }

    /// Accepts a named size (`a4`, `letter`, ...) or `width:height`.
    pub fn parse(text: &str) -> Result<Self> {
        let size = match text.trim().to_ascii_lowercase().as_str() {
            "a4" => PageSize::A4,
            "a3" => PageSize::A3,
            "a5" => PageSize::A5,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            other => {
                let (w, h) = other.split_once(':').ok_or_else(|| {
                    QuireError::invalid_argument(format!("Unsupported page size \"{}\".", text))
                })?;
                PageSize::Custom {
                    width: parse_number_str("page-size", w)?,
                    height: parse_number_str("page-size", h)?,
                }
            }
        };
        Ok(size)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAlign {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

impl TextAlign {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "left" => Ok(TextAlign::Left),
            "right" => Ok(TextAlign::Right),
            "center" => Ok(TextAlign::Center),
            "justify" => Ok(TextAlign::Justify),
            other => Err(QuireError::invalid_argument(format!(
                "Unsupported align type \"{}\".",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Float {
    #[default]
    None,
    Left,
    Right,
}

impl Float {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "none" => Ok(Float::None),
            "left" => Ok(Float::Left),
            "right" => Ok(Float::Right),
            other => Err(QuireError::invalid_argument(format!(
                "Unsupported float type \"{}\".",
                other
            ))),
        }
    }
}

/// Whether content reaching outside a node's box is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
}

impl Overflow {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "visible" => Ok(Overflow::Visible),
            "hidden" => Ok(Overflow::Hidden),
            other => Err(QuireError::invalid_argument(format!(
                "Unsupported overflow value \"{}\".",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    LineThrough,
    Overline,
}

impl TextDecoration {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "none" => Ok(TextDecoration::None),
            "underline" => Ok(TextDecoration::Underline),
            "line-through" => Ok(TextDecoration::LineThrough),
            "overline" => Ok(TextDecoration::Overline),
            other => Err(QuireError::invalid_argument(format!(
                "Unsupported text decoration \"{}\".",
                other
            ))),
        }
    }
}

/// An RGB color with components in 0.0 - 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb` or one of a few color names.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || QuireError::invalid_argument(format!("Color \"{}\" is invalid.", text));
        let named = match text.to_ascii_lowercase().as_str() {
            "black" => Some(Color::BLACK),
            "white" => Some(Color::WHITE),
            "red" => Some(Color::rgb(1.0, 0.0, 0.0)),
            "green" => Some(Color::rgb(0.0, 0.5, 0.0)),
            "blue" => Some(Color::rgb(0.0, 0.0, 1.0)),
            "gray" | "grey" => Some(Color::rgb(0.5, 0.5, 0.5)),
            _ => None,
        };
        if let Some(color) = named {
            return Ok(color);
        }

        let hex = text.strip_prefix('#').ok_or_else(invalid)?;
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(invalid()),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map(|v| v as f64 / 255.0)
                .map_err(|_| invalid())
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// `background` complex attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub color: Option<Color>,
    pub radius: f64,
}

/// `border` complex attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub color: Color,
    pub size: f64,
    /// Dash pattern; empty means a solid line.
    pub dash: Vec<f64>,
    pub radius: f64,
}

impl Default for Border {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            size: 1.0,
            dash: Vec::new(),
            radius: 0.0,
        }
    }
}

/// All attributes a node may carry. Inherited attributes (`font-*`,
/// `line-height`, `text-align`, `color`, `text-decoration`, `alpha`,
/// `max-*`) are `None` when the node defers to its ancestors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub max_width: Option<f64>,
    pub max_height: Option<f64>,
    pub margin: Edges,
    pub padding: Edges,
    pub float: Float,
    pub overflow: Overflow,

    pub text_align: Option<TextAlign>,
    pub font_type: Option<String>,
    pub font_size: Option<f64>,
    pub line_height: Option<f64>,
    pub color: Option<Color>,
    pub text_decoration: Option<TextDecoration>,

    pub alpha: Option<f64>,
    pub rotate: Option<f64>,
    pub background: Option<Background>,
    pub border: Option<Border>,

    pub breakable: Option<bool>,
    pub page_size: Option<PageSize>,
    /// One-shot template marker, applied to a prototype page only.
    pub document_template: Option<String>,
    pub colspan: Option<u32>,
}

impl Attributes {
    /// Set a simple attribute from its parsed value. `null` clears
    /// optional attributes.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "width" => self.width = opt_number(name, value)?,
            "height" => self.height = opt_number(name, value)?,
            "max-width" => self.max_width = opt_number(name, value)?,
            "max-height" => self.max_height = opt_number(name, value)?,
            "margin" => self.margin = Edges::parse_shorthand(name, value)?,
            "margin-top" => self.margin.top = number(name, value)?,
            "margin-right" => self.margin.right = number(name, value)?,
            "margin-bottom" => self.margin.bottom = number(name, value)?,
            "margin-left" => self.margin.left = number(name, value)?,
            "padding" => self.padding = Edges::parse_shorthand(name, value)?,
            "padding-top" => self.padding.top = number(name, value)?,
            "padding-right" => self.padding.right = number(name, value)?,
            "padding-bottom" => self.padding.bottom = number(name, value)?,
            "padding-left" => self.padding.left = number(name, value)?,
            "float" => self.float = Float::parse(string(name, value)?)?,
            "overflow" => self.overflow = Overflow::parse(string(name, value)?)?,
            "text-align" => {
                self.text_align = opt_string(name, value)?.map(TextAlign::parse).transpose()?
            }
            "font-type" => self.font_type = opt_string(name, value)?.map(str::to_string),
            "font-size" => self.font_size = opt_number(name, value)?,
            "line-height" => self.line_height = opt_number(name, value)?,
            "color" => self.color = opt_string(name, value)?.map(Color::parse).transpose()?,
            "text-decoration" => {
                self.text_decoration = opt_string(name, value)?
                    .map(TextDecoration::parse)
                    .transpose()?
            }
            "alpha" => {
                self.alpha = opt_number(name, value)?;
                if let Some(alpha) = self.alpha {
                    if !(0.0..=1.0).contains(&alpha) {
                        return Err(invalid_value(name, value));
                    }
                }
            }
            "rotate" => self.rotate = opt_number(name, value)?,
            "breakable" => self.breakable = opt_bool(name, value)?,
            "page-size" => {
                self.page_size = opt_string(name, value)?.map(PageSize::parse).transpose()?
            }
            "document-template" => {
                self.document_template = opt_string(name, value)?.map(str::to_string)
            }
            "colspan" => {
                let span = number(name, value)?;
                if span < 1.0 || span.fract() != 0.0 {
                    return Err(invalid_value(name, value));
                }
                self.colspan = Some(span as u32);
            }
            "background" | "border" => match value {
                Value::Object(fields) => self.merge_complex(name, fields)?,
                Value::Null if name == "background" => self.background = None,
                Value::Null => self.border = None,
                _ => return Err(invalid_value(name, value)),
            },
            _ => {
                return Err(QuireError::invalid_argument(format!(
                    "Unknown attribute \"{}\".",
                    name
                )))
            }
        }
        Ok(())
    }

    /// Merge the fields of a complex attribute into the current value.
    pub fn merge_complex(&mut self, name: &str, fields: &Map<String, Value>) -> Result<()> {
        match name {
            "background" => {
                let background = self.background.get_or_insert_with(Background::default);
                for (key, value) in fields {
                    match key.as_str() {
                        "color" => {
                            background.color =
                                opt_string(key, value)?.map(Color::parse).transpose()?
                        }
                        "radius" => background.radius = number(key, value)?,
                        _ => return Err(unknown_field(name, key)),
                    }
                }
            }
            "border" => {
                let border = self.border.get_or_insert_with(Border::default);
                for (key, value) in fields {
                    match key.as_str() {
                        "color" => border.color = Color::parse(string(key, value)?)?,
                        "size" => border.size = number(key, value)?,
                        "radius" => border.radius = number(key, value)?,
                        "type" => border.dash = parse_dash(value)?,
                        _ => return Err(unknown_field(name, key)),
                    }
                }
            }
            _ => {
                return Err(QuireError::invalid_argument(format!(
                    "\"{}\" is not a complex attribute.",
                    name
                )))
            }
        }
        Ok(())
    }
}

fn parse_dash(value: &Value) -> Result<Vec<f64>> {
    match value {
        Value::String(s) => match s.as_str() {
            "solid" => Ok(Vec::new()),
            "dashed" => Ok(vec![3.0, 2.0]),
            "dotted" => Ok(vec![1.0, 1.0]),
            _ => Err(invalid_value("type", value)),
        },
        Value::Array(items) => items.iter().map(|v| number("type", v)).collect(),
        _ => Err(invalid_value("type", value)),
    }
}

fn invalid_value(name: &str, value: &Value) -> QuireError {
    QuireError::invalid_argument(format!("Invalid value {} for attribute \"{}\".", value, name))
}

fn unknown_field(name: &str, key: &str) -> QuireError {
    QuireError::invalid_argument(format!("Unknown field \"{}\" of attribute \"{}\".", key, name))
}

fn parse_number_str(name: &str, text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix("pt").unwrap_or(trimmed);
    trimmed.parse::<f64>().map_err(|_| {
        QuireError::invalid_argument(format!(
            "Invalid number \"{}\" for attribute \"{}\".",
            text, name
        ))
    })
}

fn number(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid_value(name, value)),
        Value::String(s) => parse_number_str(name, s),
        _ => Err(invalid_value(name, value)),
    }
}

fn opt_number(name: &str, value: &Value) -> Result<Option<f64>> {
    if value.is_null() {
        return Ok(None);
    }
    number(name, value).map(Some)
}

fn string<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| invalid_value(name, value))
}

fn opt_string<'a>(name: &str, value: &'a Value) -> Result<Option<&'a str>> {
    if value.is_null() {
        return Ok(None);
    }
    string(name, value).map(Some)
}

fn opt_bool(name: &str, value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::String(s) if s == "true" => Ok(Some(true)),
        Value::String(s) if s == "false" => Ok(Some(false)),
        _ => Err(invalid_value(name, value)),
    }
}
