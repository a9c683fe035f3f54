//! Engine configuration: defaults that close the inheritance chain of node
//! attributes and the page setup used for implicit pages.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuireError, Result};
use crate::style::{Edges, PageSize, TextAlign};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub page_size: PageSize,
    /// Page margins, stored on pages as padding.
    pub page_margin: Edges,
    pub font_type: String,
    pub font_size: f64,
    /// Line height as a multiple of the font size, when not set explicitly.
    pub line_height_factor: f64,
    pub text_align: TextAlign,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            page_margin: Edges::uniform(54.0),
            font_type: "helvetica".to_string(),
            font_size: 12.0,
            line_height_factor: 1.2,
            text_align: TextAlign::Left,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.font_size <= 0.0 {
            return Err(QuireError::invalid_argument(format!(
                "Font size must be positive, got {}.",
                self.font_size
            )));
        }
        if self.line_height_factor <= 0.0 {
            return Err(QuireError::invalid_argument(format!(
                "Line height factor must be positive, got {}.",
                self.line_height_factor
            )));
        }
        let (width, height) = self.page_size.dimensions();
        if width <= self.page_margin.horizontal() || height <= self.page_margin.vertical() {
            return Err(QuireError::invalid_argument(
                "Page margins leave no room for content.",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"font-size": 10, "text-align": "justify"}"#).unwrap();
        assert_eq!(config.font_size, 10.0);
        assert_eq!(config.text_align, TextAlign::Justify);
        assert_eq!(config.font_type, "helvetica");
        assert_eq!(config.page_size, PageSize::A4);
    }

    #[test]
    fn custom_page_size() {
        let config = EngineConfig::from_json(
            r#"{"page-size": {"Custom": {"width": 300, "height": 400}}, "page-margin": {"top": 10, "right": 10, "bottom": 10, "left": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.page_size.dimensions(), (300.0, 400.0));
        assert_eq!(config.page_margin, Edges::uniform(10.0));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"font-size": 0}"#),
            Err(QuireError::InvalidArgument(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"font-size": "big"}"#),
            Err(QuireError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            EngineConfig::from_json_file("/nonexistent/quire.json"),
            Err(QuireError::Io(_))
        ));
    }
}
