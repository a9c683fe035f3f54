//! Text nodes: the words of a run of inline text and their measured widths.

use unicode_linebreak::linebreaks;

use super::{NodeId, NodeKind, NodeTree};
use crate::error::{QuireError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextState {
    pub text: String,
    words: Vec<String>,
    word_sizes: Vec<f64>,
}

impl TextState {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            words: Vec::new(),
            word_sizes: Vec::new(),
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_sizes(&self) -> &[f64] {
        &self.word_sizes
    }
}

/// Split text at line break opportunities. Each word keeps its trailing
/// whitespace; runs of whitespace inside the text collapse to one space.
pub fn split_words(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut words = Vec::new();
    let mut start = 0;
    for (index, _) in linebreaks(&normalized) {
        if index > start {
            words.push(normalized[start..index].to_string());
        }
        start = index;
    }
    words
}

impl NodeTree {
    /// Store the measured words of a text node. Words and sizes must pair up.
    pub fn set_words_sizes(&mut self, id: NodeId, words: Vec<String>, sizes: Vec<f64>) -> Result<()> {
        if words.len() != sizes.len() {
            return Err(QuireError::invalid_argument(format!(
                "Words and sizes of words arrays have to have the same length ({} words, {} sizes).",
                words.len(),
                sizes.len()
            )));
        }
        match &mut self.node_mut(id).kind {
            NodeKind::Text(state) => {
                state.words = words;
                state.word_sizes = sizes;
                Ok(())
            }
            other => Err(QuireError::structural(format!(
                "{} node has no words",
                other.name()
            ))),
        }
    }

    /// Split a positioned text box `h` points below its top. The original
    /// keeps the upper part; the returned clone continues exactly at the
    /// original's bottom edge. Bounds are checked by `break_at`.
    pub(crate) fn break_text(&mut self, id: NodeId, h: f64) -> Result<NodeId> {
        let start = self.first_point(id)?;
        let width = self.width(id)?;
        let height = self.height(id)?;

        let clone = self.copy_shallow(id);

        let original = self.node_mut(id);
        original.attributes.padding.bottom = 0.0;
        original.attributes.margin.bottom = 0.0;
        original.set_height(h);
        original.boundary_mut().rebuild(start, width, h);

        let corner = self.diagonal_point(id)?.translate(-width, 0.0);
        let remainder = self.node_mut(clone);
        remainder.attributes.padding.top = 0.0;
        remainder.attributes.margin.top = 0.0;
        remainder.set_height(height - h);
        remainder.boundary_mut().rebuild(corner, width, height - h);

        Ok(clone)
    }
}
