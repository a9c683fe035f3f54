//! # Fonts
//!
//! Text measurement goes through the [`FontMetrics`] trait. The standard PDF
//! fonts Helvetica, Helvetica-Bold and Courier ship with their AFM advance
//! widths and need no embedding; other metric providers can be registered
//! under their own names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{QuireError, Result};

/// Advance widths of one font, in thousandths of the font size.
pub trait FontMetrics: fmt::Debug + Send + Sync {
    /// Name of the font as the backend knows it (PDF base font name).
    fn base_font(&self) -> &str;

    fn char_width(&self, ch: char) -> u16;

    /// Width of `text` in points at `font_size`.
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f64 * font_size / 1000.0
    }
}

/// Metrics of a standard font: one width per printable ASCII character
/// (32..=126), everything else falls back to `default_width`.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontMetrics {
    base_font: &'static str,
    widths: &'static [u16; 95],
    default_width: u16,
}

impl StandardFontMetrics {
    pub const HELVETICA: StandardFontMetrics = StandardFontMetrics {
        base_font: "Helvetica",
        widths: &HELVETICA_WIDTHS,
        default_width: 556,
    };

    pub const HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
        base_font: "Helvetica-Bold",
        widths: &HELVETICA_BOLD_WIDTHS,
        default_width: 611,
    };

    pub const COURIER: StandardFontMetrics = StandardFontMetrics {
        base_font: "Courier",
        widths: &[600; 95],
        default_width: 600,
    };
}

impl FontMetrics for StandardFontMetrics {
    fn base_font(&self) -> &str {
        self.base_font
    }

    fn char_width(&self, ch: char) -> u16 {
        match ch as u32 {
            code @ 32..=126 => self.widths[(code - 32) as usize],
            _ => self.default_width,
        }
    }
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Fonts available to a render, by name. Names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: HashMap<String, Arc<dyn FontMetrics>>,
}

impl FontRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `helvetica`, `helvetica-bold` and `courier`.
    pub fn with_standard_fonts() -> Self {
        let mut registry = Self::new();
        registry.register("helvetica", Arc::new(StandardFontMetrics::HELVETICA));
        registry.register("helvetica-bold", Arc::new(StandardFontMetrics::HELVETICA_BOLD));
        registry.register("courier", Arc::new(StandardFontMetrics::COURIER));
        registry
    }

    pub fn register(&mut self, name: &str, metrics: Arc<dyn FontMetrics>) {
        self.fonts.insert(name.to_ascii_lowercase(), metrics);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn FontMetrics>> {
        self.fonts
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| QuireError::invalid_argument(format!("Font \"{}\" is not registered.", name)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.fonts.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_width() {
        let w = StandardFontMetrics::HELVETICA.text_width(" ", 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn bold_is_wider() {
        let regular = StandardFontMetrics::HELVETICA.text_width("Bold", 12.0);
        let bold = StandardFontMetrics::HELVETICA_BOLD.text_width("Bold", 12.0);
        assert!(bold > regular);
    }

    #[test]
    fn courier_is_monospaced() {
        let courier = StandardFontMetrics::COURIER;
        assert_eq!(courier.text_width("iiii", 10.0), courier.text_width("MMMM", 10.0));
        assert_eq!(courier.text_width("ab", 10.0), 12.0);
    }

    #[test]
    fn non_ascii_uses_default_width() {
        assert_eq!(StandardFontMetrics::HELVETICA.char_width('é'), 556);
    }

    #[test]
    fn registry_lookup() {
        let registry = FontRegistry::with_standard_fonts();
        assert_eq!(registry.len(), 3);
        assert!(registry.has("Helvetica"));
        assert_eq!(registry.get("COURIER").unwrap().base_font(), "Courier");

        let err = registry.get("comic-sans").unwrap_err();
        assert!(matches!(err, QuireError::InvalidArgument(_)));
        assert!(err.to_string().contains("Font \"comic-sans\" is not registered."));
    }

    #[test]
    fn empty_registry() {
        let registry = FontRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("helvetica").is_err());
    }
}
