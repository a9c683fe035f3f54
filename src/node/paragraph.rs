//! # Paragraph lines
//!
//! A paragraph lays its text children out in lines. A [`Line`] holds the
//! [`LinePart`]s that fit on it, one part per text run on that line. Line
//! filling is greedy and word-atomic: a word never spans two parts, and a
//! word wider than the whole line sits alone on its own line.
//!
//! Offsets are relative: a line's `y_translation` is measured from the top of
//! the paragraph content box, a part's `x_translation` from the start of its
//! line (before the line's own alignment offset).

use super::NodeId;
use crate::style::TextAlign;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct LinePart {
    /// The text node this part draws words of.
    pub text: NodeId,
    pub words: Vec<String>,
    /// Width of the words, plus the justification spacing inside the part.
    pub width: f64,
    pub x_translation: f64,
    pub word_spacing: Option<f64>,
}

impl LinePart {
    pub fn new(text: NodeId, x_translation: f64) -> Self {
        Self {
            text,
            words: Vec::new(),
            width: 0.0,
            x_translation,
            word_spacing: None,
        }
    }

    pub fn number_of_words(&self) -> usize {
        self.words.len()
    }

    /// The words as one drawable string.
    pub fn content(&self) -> String {
        self.words.concat()
    }

    fn push(&mut self, word: &str, size: f64) {
        self.words.push(word.to_string());
        self.width += size;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub parts: Vec<LinePart>,
    pub x_translation: f64,
    pub y_translation: f64,
    pub height: f64,
}

impl Line {
    pub fn new(y_translation: f64) -> Self {
        Self {
            y_translation,
            ..Default::default()
        }
    }

    pub fn width(&self) -> f64 {
        self.parts.iter().map(|p| p.width).sum()
    }

    pub fn number_of_words(&self) -> usize {
        self.parts.iter().map(LinePart::number_of_words).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.words.is_empty())
    }

    /// Apply horizontal alignment. Justification spreads the slack over the
    /// gaps between words, so the parts fill the available width exactly;
    /// the last line of a paragraph is never justified.
    pub fn format(&mut self, align: TextAlign, available_width: f64, is_last: bool) {
        let width = self.width();
        self.x_translation = match align {
            TextAlign::Left | TextAlign::Justify => 0.0,
            TextAlign::Right => available_width - width,
            TextAlign::Center => (available_width - width) / 2.0,
        };

        if align != TextAlign::Justify || is_last {
            return;
        }
        let words = self.number_of_words();
        let slack = available_width - width;
        if words <= 1 || slack <= EPSILON {
            return;
        }

        let spacing = slack / (words - 1) as f64;
        let mut shift = 0.0;
        for part in &mut self.parts {
            let inner_gaps = part.number_of_words().saturating_sub(1) as f64;
            part.x_translation += shift;
            part.word_spacing = Some(spacing);
            part.width += inner_gaps * spacing;
            // One more gap separates this part's last word from the next part.
            shift += (inner_gaps + 1.0) * spacing;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphState {
    pub lines: Vec<Line>,
}

impl ParagraphState {
    /// Total height of all lines.
    pub fn lines_height(&self) -> f64 {
        self.lines.last().map_or(0.0, |l| l.y_translation + l.height)
    }

    /// Indices of the first and last line showing part of `text`.
    pub fn line_range_of(&self, text: NodeId) -> Option<(usize, usize)> {
        let mut range: Option<(usize, usize)> = None;
        for (index, line) in self.lines.iter().enumerate() {
            if line.parts.iter().any(|p| p.text == text) {
                range = Some(range.map_or((index, index), |(first, _)| (first, index)));
            }
        }
        range
    }
}

/// A measured text child, input of line filling.
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    pub text: NodeId,
    pub words: &'a [String],
    pub sizes: &'a [f64],
    pub line_height: f64,
}

/// Fill lines greedily with the words of consecutive text runs, then align
/// each line and stack the lines vertically.
pub fn fill_lines(runs: &[TextRun<'_>], available_width: f64, align: TextAlign) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut heights: Vec<f64> = Vec::new();
    let mut line = Line::new(0.0);
    let mut line_height: f64 = 0.0;

    for run in runs {
        let mut part: Option<LinePart> = None;
        for (word, size) in run.words.iter().zip(run.sizes) {
            let used = line.width() + part.as_ref().map_or(0.0, |p| p.width);
            let has_words = !line.is_empty() || part.as_ref().is_some_and(|p| !p.words.is_empty());
            if has_words && used + size > available_width + EPSILON {
                if let Some(full) = part.take() {
                    line.parts.push(full);
                }
                lines.push(std::mem::take(&mut line));
                heights.push(line_height);
                line_height = 0.0;
            }
            let offset = line.width();
            part.get_or_insert_with(|| LinePart::new(run.text, offset))
                .push(word, *size);
            line_height = line_height.max(run.line_height);
        }
        if let Some(done) = part {
            line.parts.push(done);
        }
    }
    if !line.is_empty() {
        lines.push(line);
        heights.push(line_height);
    }

    let count = lines.len();
    let mut y = 0.0;
    for (index, (line, height)) in lines.iter_mut().zip(heights).enumerate() {
        line.y_translation = y;
        line.height = height;
        line.format(align, available_width, index + 1 == count);
        y += height;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, NodeTree};
    use crate::node::text::TextState;

    fn ids(count: usize) -> Vec<NodeId> {
        let mut tree = NodeTree::new();
        (0..count)
            .map(|_| tree.add_node(NodeKind::Text(TextState::default())))
            .collect()
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn greedy_fill_keeps_words_whole() {
        let text = ids(1)[0];
        let w = words(&["aaa ", "bb ", "cccc ", "d"]);
        let sizes = [30.0, 20.0, 40.0, 10.0];
        let run = TextRun {
            text,
            words: &w,
            sizes: &sizes,
            line_height: 12.0,
        };
        let lines = fill_lines(&[run], 60.0, TextAlign::Left);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].parts[0].words, words(&["aaa ", "bb "]));
        assert_eq!(lines[1].parts[0].words, words(&["cccc ", "d"]));
        assert_eq!(lines[1].y_translation, 12.0);
        let all: Vec<String> = lines
            .iter()
            .flat_map(|l| l.parts.iter().flat_map(|p| p.words.clone()))
            .collect();
        assert_eq!(all, w);
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let text = ids(1)[0];
        let w = words(&["a ", "enormous ", "b"]);
        let sizes = [10.0, 200.0, 10.0];
        let run = TextRun {
            text,
            words: &w,
            sizes: &sizes,
            line_height: 10.0,
        };
        let lines = fill_lines(&[run], 100.0, TextAlign::Left);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].parts[0].words, words(&["enormous "]));
        assert_eq!(lines[1].width(), 200.0);
    }

    #[test]
    fn line_height_is_tallest_part() {
        let ids = ids(2);
        let (a, b) = (words(&["x "]), words(&["y"]));
        let runs = [
            TextRun {
                text: ids[0],
                words: &a,
                sizes: &[10.0],
                line_height: 12.0,
            },
            TextRun {
                text: ids[1],
                words: &b,
                sizes: &[10.0],
                line_height: 20.0,
            },
        ];
        let lines = fill_lines(&runs, 100.0, TextAlign::Left);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].parts.len(), 2);
        assert_eq!(lines[0].parts[1].x_translation, 10.0);
        assert_eq!(lines[0].height, 20.0);
    }

    #[test]
    fn alignment_offsets() {
        let text = ids(1)[0];
        let w = words(&["ab"]);
        let run = TextRun {
            text,
            words: &w,
            sizes: &[40.0],
            line_height: 10.0,
        };
        let right = fill_lines(&[run], 100.0, TextAlign::Right);
        assert_eq!(right[0].x_translation, 60.0);
        let center = fill_lines(&[run], 100.0, TextAlign::Center);
        assert_eq!(center[0].x_translation, 30.0);
    }

    #[test]
    fn justified_spacing_fills_the_line() {
        let ids = ids(2);
        let (a, b) = (words(&["aa ", "bb "]), words(&["cc ", "dd ", "ee"]));
        let runs = [
            TextRun {
                text: ids[0],
                words: &a,
                sizes: &[20.0, 20.0],
                line_height: 10.0,
            },
            TextRun {
                text: ids[1],
                words: &b,
                sizes: &[20.0, 20.0, 30.0],
                line_height: 10.0,
            },
        ];
        // "ee" does not fit on the first line, so the first line is justified.
        let lines = fill_lines(&runs, 90.0, TextAlign::Justify);
        assert_eq!(lines.len(), 2);
        let first = &lines[0];
        assert_eq!(first.number_of_words(), 4);
        // slack 10 over 3 gaps
        let spacing = 10.0 / 3.0;
        for part in &first.parts {
            assert_eq!(part.word_spacing, Some(spacing));
        }
        let last = first.parts.last().unwrap();
        let right_edge = last.x_translation + last.width;
        assert!((right_edge - 90.0).abs() < 1e-9);
        assert!((first.width() + spacing - 90.0).abs() < 1e-9);
        assert!((first.parts[1].x_translation - (40.0 + 2.0 * spacing)).abs() < 1e-9);

        // last line untouched
        assert_eq!(lines[1].parts[0].word_spacing, None);
        assert_eq!(lines[1].x_translation, 0.0);
    }

    #[test]
    fn single_word_line_is_not_justified() {
        let mut line = Line::new(0.0);
        let mut part = LinePart::new(ids(1)[0], 0.0);
        part.push("alone", 30.0);
        line.parts.push(part);
        line.format(TextAlign::Justify, 100.0, false);
        assert_eq!(line.parts[0].word_spacing, None);
        assert_eq!(line.width(), 30.0);
    }

    #[test]
    fn line_range_lookup() {
        let ids = ids(2);
        let w = words(&["a ", "b ", "c"]);
        let run = TextRun {
            text: ids[0],
            words: &w,
            sizes: &[50.0, 50.0, 50.0],
            line_height: 10.0,
        };
        let state = ParagraphState {
            lines: fill_lines(&[run], 60.0, TextAlign::Left),
        };
        assert_eq!(state.line_range_of(ids[0]), Some((0, 2)));
        assert_eq!(state.line_range_of(ids[1]), None);
        assert_eq!(state.lines_height(), 30.0);
    }
}
