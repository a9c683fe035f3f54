//! # Breaking nodes
//!
//! `break_at` splits a positioned node at a height measured from its top
//! edge. The original keeps everything above the cut and becomes exactly
//! that tall; the returned remainder starts where the original now ends and
//! carries the rest. Pagination relies on this: a remainder always begins
//! at the cut line, so translating it moves the continued content as a unit.
//!
//! A remainder can end below the original's old bottom edge: content that
//! can't be split is pushed past the cut whole. Whoever lays out what
//! follows the broken node shifts it down by that growth.

use log::debug;

use super::{NodeId, NodeKind, NodeTree};
use crate::error::{QuireError, Result};

const EPSILON: f64 = 1e-6;

impl NodeTree {
    /// Split `id` at `h` points below its top edge.
    ///
    /// Returns `Ok(None)` and leaves the node untouched when `h` is outside
    /// `(0, height)` or the node can't be broken at that height. Page roles
    /// can't be broken at all.
    pub fn break_at(&mut self, id: NodeId, h: f64) -> Result<Option<NodeId>> {
        let kind = &self.node(id).kind;
        if kind.is_page_role() {
            return Err(QuireError::structural(format!(
                "{} can't be broken.",
                kind.name()
            )));
        }

        let height = self.height(id)?;
        if h <= 0.0 || h >= height || !self.node(id).is_breakable() {
            return Ok(None);
        }

        let remainder = match self.node(id).kind {
            NodeKind::Text(_) => Some(self.break_text(id, h)?),
            NodeKind::Paragraph(_) => self.break_paragraph(id, h)?,
            NodeKind::Container | NodeKind::Table | NodeKind::TableCell(_) => {
                self.break_container(id, h)?
            }
            _ => None,
        };
        if let Some(remainder) = remainder {
            debug!(
                "Broke {} node {} at {:.2}, remainder {}",
                self.node(id).kind.name(),
                id.index(),
                h,
                remainder.index()
            );
        }
        Ok(remainder)
    }

    /// Shallow clone prepared as the lower piece: no top spacing.
    fn lower_piece(&mut self, id: NodeId) -> NodeId {
        let clone = self.copy_shallow(id);
        let attributes = &mut self.node_mut(clone).attributes;
        attributes.padding.top = 0.0;
        attributes.margin.top = 0.0;
        clone
    }

    /// Resize both pieces: the original becomes `h` tall, the lower piece
    /// `lower_height` tall starting at the cut.
    fn settle_pieces(&mut self, id: NodeId, lower: NodeId, h: f64, lower_height: f64) -> Result<()> {
        let start = self.first_point(id)?;
        let width = self.width(id)?;
        let upper = self.node_mut(id);
        upper.attributes.padding.bottom = 0.0;
        upper.attributes.margin.bottom = 0.0;
        upper.set_height(h);
        upper.boundary_mut().rebuild(start, width, h);

        let remainder = self.node_mut(lower);
        remainder.set_height(lower_height);
        remainder
            .boundary_mut()
            .rebuild(start.translate(0.0, h), width, lower_height);
        Ok(())
    }

    /// Split between lines. The first line crossing the cut and everything
    /// after it move to the remainder; a text shown on both sides is broken
    /// too and the moved line parts point at its lower piece.
    fn break_paragraph(&mut self, id: NodeId, h: f64) -> Result<Option<NodeId>> {
        let top = self.first_point(id)?.y;
        let height = self.height(id)?;
        let padding_top = self.padding(id).top;

        let NodeKind::Paragraph(state) = &self.node(id).kind else {
            return Ok(None);
        };
        let Some(split) = state
            .lines
            .iter()
            .position(|l| padding_top + l.y_translation + l.height > h + EPSILON)
        else {
            return Ok(None);
        };
        if split == 0 {
            return Ok(None);
        }
        let split_offset = state.lines[split].y_translation;
        let kept_height = padding_top + split_offset;
        let cut_y = top + kept_height;

        let mut lower_lines = match &mut self.node_mut(id).kind {
            NodeKind::Paragraph(state) => state.lines.split_off(split),
            _ => return Ok(None),
        };
        for line in &mut lower_lines {
            line.y_translation -= split_offset;
        }

        let lower = self.lower_piece(id);
        let texts: Vec<NodeId> = self.children(id).to_vec();
        for text in texts {
            let in_upper = match &self.node(id).kind {
                NodeKind::Paragraph(state) => state.line_range_of(text).is_some(),
                _ => false,
            };
            let in_lower = lower_lines
                .iter()
                .any(|l| l.parts.iter().any(|p| p.text == text));

            match (in_upper, in_lower) {
                (true, true) => {
                    let text_top = self.first_point(text)?.y;
                    let piece = self.break_text(text, cut_y - text_top)?;
                    for part in lower_lines.iter_mut().flat_map(|l| l.parts.iter_mut()) {
                        if part.text == text {
                            part.text = piece;
                        }
                    }
                    self.append_child(lower, piece);
                }
                (false, true) => self.append_child(lower, text),
                _ => {}
            }
        }

        if let NodeKind::Paragraph(state) = &mut self.node_mut(lower).kind {
            state.lines = lower_lines;
        }
        self.settle_pieces(id, lower, kept_height, height - kept_height)?;
        Ok(Some(lower))
    }

    /// Split children around the cut. Children wholly below move to the
    /// remainder, straddling ones are broken recursively. A straddling child
    /// that can't be broken moves whole and pushes the following content
    /// down by the part that was above the cut; a child remainder that grew
    /// pushes it down by its growth.
    fn break_container(&mut self, id: NodeId, h: f64) -> Result<Option<NodeId>> {
        let top = self.first_point(id)?.y;
        let height = self.height(id)?;
        let cut_y = top + h;

        let mut moved: Vec<(NodeId, f64)> = Vec::new();
        let mut kept_any = false;
        let mut push_down: f64 = 0.0;

        for child in self.children(id).to_vec() {
            let child_top = self.first_point(child)?.y;
            let child_bottom = self.diagonal_point(child)?.y;

            if child_bottom <= cut_y + EPSILON {
                kept_any = true;
            } else if child_top >= cut_y - EPSILON {
                self.translate(child, 0.0, push_down);
                moved.push((child, push_down));
            } else {
                match self.break_at(child, cut_y - child_top)? {
                    Some(piece) => {
                        kept_any = true;
                        let growth = self.diagonal_point(piece)?.y - child_bottom;
                        self.translate(piece, 0.0, push_down);
                        moved.push((piece, push_down));
                        push_down += growth.max(0.0);
                    }
                    None => {
                        push_down = push_down.max(cut_y - child_top);
                        self.translate(child, 0.0, push_down);
                        moved.push((child, push_down));
                    }
                }
            }
        }

        if !kept_any {
            // Nothing stays above the cut, so nothing was broken either:
            // every moved node is an untouched child.
            for (child, dy) in moved {
                self.translate(child, 0.0, -dy);
            }
            return Ok(None);
        }

        let lower = self.lower_piece(id);
        for (child, _) in moved {
            self.append_child(lower, child);
        }
        self.settle_pieces(id, lower, h, height - h + push_down)?;
        Ok(Some(lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::node::paragraph::{fill_lines, TextRun};
    use crate::node::{ParagraphState, TextState};
    use crate::style::TextAlign;

    fn sized(tree: &mut NodeTree, kind: NodeKind, width: f64, height: f64, top: f64) -> NodeId {
        let id = tree.add_node(kind);
        tree.node_mut(id).set_width(width);
        tree.node_mut(id).set_height(height);
        tree.set_position(id, Point::new(0.0, top)).unwrap();
        id
    }

    fn stacked_container(tree: &mut NodeTree) -> (NodeId, Vec<NodeId>) {
        let parent = sized(tree, NodeKind::Container, 100.0, 90.0, 0.0);
        let children: Vec<NodeId> = (0..3)
            .map(|i| {
                let child = sized(tree, NodeKind::Container, 100.0, 30.0, i as f64 * 30.0);
                tree.append_child(parent, child);
                child
            })
            .collect();
        (parent, children)
    }

    #[test]
    fn out_of_range_heights_do_not_break() {
        let mut tree = NodeTree::new();
        let (parent, _) = stacked_container(&mut tree);
        assert_eq!(tree.break_at(parent, 0.0).unwrap(), None);
        assert_eq!(tree.break_at(parent, 90.0).unwrap(), None);
        assert_eq!(tree.break_at(parent, -5.0).unwrap(), None);
        assert_eq!(tree.height(parent).unwrap(), 90.0);
    }

    #[test]
    fn pages_cannot_be_broken() {
        let mut tree = NodeTree::new();
        let dynamic = tree.add_dynamic_page();
        let err = tree.break_at(dynamic, 10.0).unwrap_err();
        assert!(matches!(err, QuireError::Structural(_)));
    }

    #[test]
    fn unbreakable_nodes_stay_whole() {
        let mut tree = NodeTree::new();
        let (parent, _) = stacked_container(&mut tree);
        tree.node_mut(parent).attributes.breakable = Some(false);
        assert_eq!(tree.break_at(parent, 45.0).unwrap(), None);
    }

    #[test]
    fn container_pieces_do_not_overlap() {
        let mut tree = NodeTree::new();
        let (parent, children) = stacked_container(&mut tree);

        let rest = tree.break_at(parent, 45.0).unwrap().unwrap();
        assert_eq!(tree.height(parent).unwrap(), 45.0);
        assert_eq!(tree.diagonal_point(parent).unwrap().y, 45.0);
        assert_eq!(tree.first_point(rest).unwrap().y, 45.0);
        // The middle child can't split, so it moves down by the 15pt it
        // had above the cut.
        assert_eq!(tree.height(rest).unwrap(), 60.0);
        assert_eq!(tree.children(parent), &[children[0]]);
        assert_eq!(tree.children(rest), &[children[1], children[2]]);
        assert_eq!(tree.first_point(children[1]).unwrap().y, 45.0);
        assert_eq!(tree.first_point(children[2]).unwrap().y, 75.0);
    }

    #[test]
    fn grown_child_remainder_pushes_later_siblings() {
        let mut tree = NodeTree::new();
        let parent = sized(&mut tree, NodeKind::Container, 100.0, 90.0, 0.0);
        let inner = sized(&mut tree, NodeKind::Container, 100.0, 60.0, 0.0);
        let first = sized(&mut tree, NodeKind::Container, 100.0, 30.0, 0.0);
        let second = sized(&mut tree, NodeKind::Container, 100.0, 30.0, 30.0);
        tree.node_mut(second).attributes.breakable = Some(false);
        tree.append_child(inner, first);
        tree.append_child(inner, second);
        let sibling = sized(&mut tree, NodeKind::Container, 100.0, 30.0, 60.0);
        tree.append_child(parent, inner);
        tree.append_child(parent, sibling);

        let rest = tree.break_at(parent, 45.0).unwrap().unwrap();
        // `second` moves below the cut whole, so the inner remainder ends
        // 15pt lower than `inner` used to and `sibling` follows it.
        let inner_rest = tree.children(rest)[0];
        assert_eq!(tree.children(rest), &[inner_rest, sibling]);
        assert_eq!(tree.diagonal_point(inner_rest).unwrap().y, 75.0);
        assert_eq!(tree.first_point(sibling).unwrap().y, 75.0);
        assert_eq!(tree.height(rest).unwrap(), 60.0);
        assert_eq!(tree.diagonal_point(rest).unwrap().y, 105.0);
    }

    #[test]
    fn text_is_untouched_by_a_cut_at_its_top() {
        let mut tree = NodeTree::new();
        let text = sized(&mut tree, NodeKind::Text(TextState::new("a b")), 100.0, 30.0, 5.0);
        assert_eq!(tree.break_at(text, 0.0).unwrap(), None);
        assert_eq!(tree.height(text).unwrap(), 30.0);
        assert_eq!(tree.first_point(text).unwrap(), Point::new(0.0, 5.0));
        assert_eq!(tree.diagonal_point(text).unwrap(), Point::new(100.0, 35.0));
    }

    #[test]
    fn container_with_nothing_above_cut_is_left_alone() {
        let mut tree = NodeTree::new();
        let parent = sized(&mut tree, NodeKind::Container, 100.0, 60.0, 0.0);
        let child = sized(&mut tree, NodeKind::Container, 100.0, 60.0, 0.0);
        tree.append_child(parent, child);

        assert_eq!(tree.break_at(parent, 20.0).unwrap(), None);
        assert_eq!(tree.first_point(child).unwrap().y, 0.0);
        assert_eq!(tree.children(parent), &[child]);
    }

    #[test]
    fn paragraph_splits_between_lines() {
        let mut tree = NodeTree::new();
        let words: Vec<String> = (0..6).map(|i| format!("w{} ", i)).collect();
        let sizes = vec![40.0; 6];
        let paragraph = tree.add_node(NodeKind::Paragraph(ParagraphState::default()));
        let text = tree.add_node(NodeKind::Text(TextState::new("")));
        tree.append_child(paragraph, text);
        tree.set_words_sizes(text, words.clone(), sizes.clone()).unwrap();

        // Two words per line, three lines of 10pt.
        let lines = fill_lines(
            &[TextRun {
                text,
                words: &words,
                sizes: &sizes,
                line_height: 10.0,
            }],
            100.0,
            TextAlign::Left,
        );
        assert_eq!(lines.len(), 3);
        if let NodeKind::Paragraph(state) = &mut tree.node_mut(paragraph).kind {
            state.lines = lines;
        }
        for (id, height) in [(paragraph, 30.0), (text, 30.0)] {
            tree.node_mut(id).set_width(100.0);
            tree.node_mut(id).set_height(height);
            tree.set_position(id, Point::ORIGIN).unwrap();
        }

        // A cut inside the second line keeps only the first one.
        let rest = tree.break_at(paragraph, 15.0).unwrap().unwrap();
        assert_eq!(tree.height(paragraph).unwrap(), 10.0);
        assert_eq!(tree.height(rest).unwrap(), 20.0);
        assert_eq!(tree.first_point(rest).unwrap().y, 10.0);

        let NodeKind::Paragraph(lower) = &tree.node(rest).kind else {
            panic!("remainder is not a paragraph");
        };
        assert_eq!(lower.lines.len(), 2);
        assert_eq!(lower.lines[0].y_translation, 0.0);
        let piece = lower.lines[0].parts[0].text;
        assert_ne!(piece, text);
        assert_eq!(tree.children(rest), &[piece]);
        assert_eq!(tree.first_point(piece).unwrap().y, 10.0);
        assert_eq!(tree.height(text).unwrap(), 10.0);

        // A cut inside the first line can't keep anything.
        assert_eq!(tree.break_at(paragraph, 5.0).unwrap(), None);
    }
}
