//! # Pagination
//!
//! Splits the content of a dynamic page over copies of its prototype.
//!
//! Content arrives positioned against the prototype's content box, which
//! every page shares. Nodes are taken in order: a node that fits stays where
//! it is, a node crossing the bottom edge is broken there when possible, and
//! whatever doesn't fit is shifted (together with everything after it) so it
//! starts at the top of a fresh page.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::error::Result;
use crate::node::{NodeId, NodeKind, NodeTree, Placeholder};

const EPSILON: f64 = 1e-6;

struct Pending {
    node: NodeId,
    /// Placed whole on the next page instead of being broken again.
    whole: bool,
}

/// Vertical span of a page available to content, between its header and
/// footer.
fn content_bounds(tree: &NodeTree, page: NodeId) -> Result<(f64, f64)> {
    let top = tree.first_point(page)?.y;
    let height = tree.height(page)?;
    let padding = tree.padding(page);
    let header = tree.placeholder_space(page, Placeholder::Header)?;
    let footer = tree.placeholder_space(page, Placeholder::Footer)?;
    Ok((top + padding.top + header, top + height - padding.bottom - footer))
}

fn shift(tree: &mut NodeTree, queue: &VecDeque<Pending>, dy: f64) {
    for pending in queue {
        tree.translate(pending.node, 0.0, dy);
    }
}

/// Distribute the content of `dynamic` over pages numbered from 1.
pub fn paginate(tree: &mut NodeTree, dynamic: NodeId) -> Result<()> {
    tree.reset_dynamic_page(dynamic)?;
    let content: Vec<NodeId> = tree.children(dynamic).to_vec();
    for node in &content {
        tree.detach(*node);
    }
    let mut queue: VecDeque<Pending> = content
        .into_iter()
        .map(|node| Pending { node, whole: false })
        .collect();

    let mut page = tree.create_next_page(dynamic)?;
    let (content_top, content_bottom) = content_bounds(tree, page)?;
    let mut page_is_empty = true;

    while let Some(Pending { node, whole }) = queue.pop_front() {
        let top = tree.first_point(node)?.y;

        if matches!(tree.node(node).kind, NodeKind::PageBreak) {
            if !page_is_empty {
                page = tree.create_next_page(dynamic)?;
                page_is_empty = true;
                shift(tree, &queue, content_top - top);
            }
            continue;
        }

        let bottom = tree.diagonal_point(node)?.y;
        if bottom <= content_bottom + EPSILON {
            tree.add_to_page(page, node)?;
            page_is_empty = false;
            continue;
        }

        let available = content_bottom - top;
        if !whole && available > EPSILON {
            let height = tree.height(node)?;
            if let Some(rest) = tree.break_at(node, available)? {
                tree.add_to_page(page, node)?;
                let rest_height = tree.height(rest)?;
                // Whole pieces pushed past the cut make the remainder end
                // below the node's old bottom edge.
                let growth = (tree.diagonal_point(rest)?.y - bottom).max(0.0);
                // A remainder no shorter than its source would be broken
                // the same way forever.
                let stalled = page_is_empty && rest_height >= height - EPSILON;

                page = tree.create_next_page(dynamic)?;
                page_is_empty = true;
                let dy = content_top - tree.first_point(rest)?.y;
                tree.translate(rest, 0.0, dy);
                shift(tree, &queue, dy + growth);
                queue.push_front(Pending {
                    node: rest,
                    whole: stalled,
                });
                continue;
            }
        }

        if page_is_empty {
            warn!(
                "{} node {} is taller than the page content area, placing it anyway",
                tree.node(node).kind.name(),
                node.index()
            );
            tree.add_to_page(page, node)?;
            page_is_empty = false;
            continue;
        }

        page = tree.create_next_page(dynamic)?;
        page_is_empty = true;
        let dy = content_top - top;
        tree.translate(node, 0.0, dy);
        shift(tree, &queue, dy);
        queue.push_front(Pending { node, whole });
    }

    debug!(
        "Dynamic page {} paginated into {} pages",
        dynamic.index(),
        tree.dynamic_page_state(dynamic)?.number_of_pages()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::font::FontRegistry;
    use crate::formatter::{format_document, FormatContext};
    use crate::node::{ParagraphState, TextState};
    use crate::resource::ResourceCache;
    use crate::style::{Edges, PageSize};
    use serde_json::json;

    /// A dynamic page of 200x200 with 20pt margins: content spans y 20..180.
    fn document() -> (NodeTree, NodeId) {
        let mut tree = NodeTree::new();
        let dynamic = tree.add_dynamic_page();
        let prototype = tree.dynamic_page_state(dynamic).unwrap().prototype;
        let attributes = &mut tree.node_mut(prototype).attributes;
        attributes.page_size = Some(PageSize::Custom {
            width: 200.0,
            height: 200.0,
        });
        attributes.padding = Edges::uniform(20.0);
        (tree, dynamic)
    }

    fn block(tree: &mut NodeTree, dynamic: NodeId, height: f64) -> NodeId {
        let node = tree.add_node(NodeKind::Container);
        tree.set_attribute(node, "height", &json!(height)).unwrap();
        tree.append_child(dynamic, node);
        node
    }

    fn run(tree: &mut NodeTree, dynamic: NodeId) {
        let fonts = FontRegistry::with_standard_fonts();
        let mut resources = ResourceCache::new();
        let config = EngineConfig::default();
        let mut ctx = FormatContext {
            fonts: &fonts,
            resources: &mut resources,
            config: &config,
        };
        format_document(tree, dynamic, &mut ctx).unwrap();
    }

    fn pages(tree: &NodeTree, dynamic: NodeId) -> Vec<NodeId> {
        tree.dynamic_page_state(dynamic).unwrap().pages.clone()
    }

    #[test]
    fn pages_are_numbered_consecutively() {
        let (mut tree, dynamic) = document();
        for _ in 0..5 {
            let node = block(&mut tree, dynamic, 70.0);
            tree.node_mut(node).attributes.breakable = Some(false);
        }
        run(&mut tree, dynamic);

        let pages = pages(&tree, dynamic);
        assert_eq!(pages.len(), 3);
        let numbers: Vec<usize> = pages
            .iter()
            .map(|p| tree.page_context(*p).unwrap().number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(tree.children(dynamic).is_empty());
        assert!(tree.is_sealed(pages[0]));
        assert!(!tree.is_sealed(pages[2]));
    }

    #[test]
    fn moved_content_starts_at_page_top() {
        let (mut tree, dynamic) = document();
        let first = block(&mut tree, dynamic, 100.0);
        let second = block(&mut tree, dynamic, 100.0);
        tree.node_mut(second).attributes.breakable = Some(false);
        run(&mut tree, dynamic);

        let pages = pages(&tree, dynamic);
        assert_eq!(tree.children(pages[0]), &[first]);
        assert_eq!(tree.children(pages[1]), &[second]);
        assert_eq!(tree.first_point(second).unwrap().y, 20.0);
    }

    #[test]
    fn overflowing_paragraph_is_broken_across_pages() {
        let (mut tree, dynamic) = document();
        let paragraph = tree.add_node(NodeKind::Paragraph(ParagraphState::default()));
        let words = "lorem ipsum dolor sit amet ".repeat(30);
        let text = tree.add_node(NodeKind::Text(TextState::new(words)));
        tree.append_child(dynamic, paragraph);
        tree.append_child(paragraph, text);
        run(&mut tree, dynamic);

        let pages = pages(&tree, dynamic);
        assert!(pages.len() > 1);
        for page in &pages {
            for child in tree.children(*page) {
                assert!(tree.first_point(*child).unwrap().y >= 20.0 - EPSILON);
                assert!(tree.diagonal_point(*child).unwrap().y <= 180.0 + EPSILON);
            }
        }
        let second = tree.children(pages[1])[0];
        assert_eq!(tree.first_point(second).unwrap().y, 20.0);
    }

    #[test]
    fn header_and_footer_repeat_on_every_page() {
        let (mut tree, dynamic) = document();
        let placeholder = |tree: &mut NodeTree, slot, height: f64| {
            let container = tree.add_node(NodeKind::Container);
            tree.set_attribute(container, "height", &json!(height)).unwrap();
            tree.set_placeholder(dynamic, slot, container).unwrap();
            container
        };
        let header = placeholder(&mut tree, Placeholder::Header, 30.0);
        placeholder(&mut tree, Placeholder::Footer, 20.0);
        for _ in 0..5 {
            let node = block(&mut tree, dynamic, 50.0);
            tree.node_mut(node).attributes.breakable = Some(false);
        }
        run(&mut tree, dynamic);

        // Content spans y 50..160: two blocks per page.
        let pages = pages(&tree, dynamic);
        assert_eq!(pages.len(), 3);
        for page in &pages {
            let placeholders = tree.placeholders(*page);
            let page_header = placeholders.header.unwrap();
            let page_footer = placeholders.footer.unwrap();
            assert_ne!(page_header, header);
            assert_eq!(tree.first_point(page_header).unwrap().y, 20.0);
            assert_eq!(tree.first_point(page_footer).unwrap().y, 160.0);
            assert_eq!(tree.diagonal_point(page_footer).unwrap().y, 180.0);

            let first = tree.children(*page)[0];
            assert_eq!(tree.first_point(first).unwrap().y, 50.0);
            for child in tree.children(*page) {
                assert!(tree.diagonal_point(*child).unwrap().y <= 160.0 + EPSILON);
            }
        }
    }

    #[test]
    fn grown_remainder_pushes_following_content_down() {
        let (mut tree, dynamic) = document();
        let outer = tree.add_node(NodeKind::Container);
        tree.append_child(dynamic, outer);
        for height in [140.0, 40.0] {
            let child = tree.add_node(NodeKind::Container);
            tree.set_attribute(child, "height", &json!(height)).unwrap();
            tree.node_mut(child).attributes.breakable = Some(false);
            tree.append_child(outer, child);
        }
        let after = block(&mut tree, dynamic, 10.0);
        run(&mut tree, dynamic);

        let pages = pages(&tree, dynamic);
        assert_eq!(pages.len(), 2);
        let rest = tree.children(pages[1])[0];
        assert_eq!(tree.children(pages[1]), &[rest, after]);
        // The 40pt child no longer fits under the cut and moves whole.
        assert_eq!(tree.first_point(rest).unwrap().y, 20.0);
        assert_eq!(tree.diagonal_point(rest).unwrap().y, 60.0);
        assert_eq!(tree.first_point(after).unwrap().y, 60.0);
    }

    #[test]
    fn page_break_starts_a_new_page() {
        let (mut tree, dynamic) = document();
        let before = block(&mut tree, dynamic, 10.0);
        let page_break = tree.add_node(NodeKind::PageBreak);
        tree.append_child(dynamic, page_break);
        let after = block(&mut tree, dynamic, 10.0);
        run(&mut tree, dynamic);

        let pages = pages(&tree, dynamic);
        assert_eq!(pages.len(), 2);
        assert_eq!(tree.children(pages[0]), &[before]);
        assert_eq!(tree.children(pages[1]), &[after]);
        assert_eq!(tree.first_point(after).unwrap().y, 20.0);
    }

    #[test]
    fn leading_page_break_is_ignored() {
        let (mut tree, dynamic) = document();
        let page_break = tree.add_node(NodeKind::PageBreak);
        tree.append_child(dynamic, page_break);
        block(&mut tree, dynamic, 10.0);
        run(&mut tree, dynamic);
        assert_eq!(pages(&tree, dynamic).len(), 1);
    }

    #[test]
    fn oversized_node_is_placed_anyway() {
        let (mut tree, dynamic) = document();
        let tall = block(&mut tree, dynamic, 500.0);
        tree.node_mut(tall).attributes.breakable = Some(false);
        let after = block(&mut tree, dynamic, 10.0);
        run(&mut tree, dynamic);

        let pages = pages(&tree, dynamic);
        assert_eq!(pages.len(), 2);
        assert_eq!(tree.children(pages[0]), &[tall]);
        assert_eq!(tree.children(pages[1]), &[after]);
    }
}
