//! # Pages
//!
//! A [`NodeKind::Page`] is one physical output page. A dynamic page owns a
//! prototype page and clones it on demand while its content is paginated;
//! clones are numbered from 1 in creation order. Only the newest page is
//! open for content, earlier ones are sealed.
//!
//! A page can carry placeholders: a header and a footer that take space
//! from the top and bottom of its content area, and a watermark centred on
//! the page. A dynamic page keeps them on its prototype, so every page it
//! cuts gets its own copy.

use log::debug;
use serde::Serialize;

use super::{NodeId, NodeKind, NodeTree};
use crate::error::{QuireError, Result};

/// Where a concrete page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageContext {
    /// 1-based page number within its dynamic page.
    pub number: usize,
    pub dynamic_page: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Header,
    Footer,
    Watermark,
}

impl Placeholder {
    pub const ALL: [Placeholder; 3] = [Placeholder::Header, Placeholder::Footer, Placeholder::Watermark];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "header" => Some(Placeholder::Header),
            "footer" => Some(Placeholder::Footer),
            "watermark" => Some(Placeholder::Watermark),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Placeholder::Header => "header",
            Placeholder::Footer => "footer",
            Placeholder::Watermark => "watermark",
        }
    }
}

/// Containers repeated on a page outside its content flow.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placeholders {
    pub header: Option<NodeId>,
    pub footer: Option<NodeId>,
    pub watermark: Option<NodeId>,
}

impl Placeholders {
    pub fn get(&self, slot: Placeholder) -> Option<NodeId> {
        match slot {
            Placeholder::Header => self.header,
            Placeholder::Footer => self.footer,
            Placeholder::Watermark => self.watermark,
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: Placeholder) -> &mut Option<NodeId> {
        match slot {
            Placeholder::Header => &mut self.header,
            Placeholder::Footer => &mut self.footer,
            Placeholder::Watermark => &mut self.watermark,
        }
    }

    /// Header, footer, then watermark.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        Placeholder::ALL.into_iter().filter_map(move |slot| self.get(slot))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    pub context: Option<PageContext>,
    pub sealed: bool,
    pub placeholders: Placeholders,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicPageState {
    pub prototype: NodeId,
    pub current: Option<NodeId>,
    pub pages: Vec<NodeId>,
    /// Every page created, in creation order.
    pub history: Vec<NodeId>,
    next_number: usize,
}

impl DynamicPageState {
    pub fn new(prototype: NodeId) -> Self {
        Self {
            prototype,
            current: None,
            pages: Vec::new(),
            history: Vec::new(),
            next_number: 1,
        }
    }

    pub fn number_of_pages(&self) -> usize {
        self.pages.len()
    }
}

impl NodeTree {
    /// Create a dynamic page around a fresh prototype page.
    pub fn add_dynamic_page(&mut self) -> NodeId {
        let prototype = self.add_node(NodeKind::Page(PageState::default()));
        let dynamic = self.add_node(NodeKind::DynamicPage(DynamicPageState::new(prototype)));
        self.node_mut(prototype).parent = Some(dynamic);
        dynamic
    }

    pub fn dynamic_page_state(&self, id: NodeId) -> Result<&DynamicPageState> {
        match &self.node(id).kind {
            NodeKind::DynamicPage(state) => Ok(state),
            other => Err(not_a_dynamic_page(other)),
        }
    }

    fn dynamic_page_state_mut(&mut self, id: NodeId) -> Result<&mut DynamicPageState> {
        match &mut self.node_mut(id).kind {
            NodeKind::DynamicPage(state) => Ok(state),
            other => Err(not_a_dynamic_page(other)),
        }
    }

    /// Clone the prototype into a new current page. The previous current
    /// page is sealed.
    pub fn create_next_page(&mut self, dynamic: NodeId) -> Result<NodeId> {
        let (prototype, previous, number) = {
            let state = self.dynamic_page_state(dynamic)?;
            (state.prototype, state.current, state.next_number)
        };

        let page = self.copy(prototype);
        {
            let node = self.node_mut(page);
            let placeholders = match &node.kind {
                NodeKind::Page(state) => state.placeholders,
                _ => Placeholders::default(),
            };
            node.attributes.document_template = None;
            node.kind = NodeKind::Page(PageState {
                context: Some(PageContext {
                    number,
                    dynamic_page: dynamic,
                }),
                sealed: false,
                placeholders,
            });
            // Owned by the dynamic page state, not listed among its content.
            node.parent = Some(dynamic);
        }
        if let Some(previous) = previous {
            if let NodeKind::Page(state) = &mut self.node_mut(previous).kind {
                state.sealed = true;
            }
        }

        let state = self.dynamic_page_state_mut(dynamic)?;
        state.pages.push(page);
        state.history.push(page);
        state.current = Some(page);
        state.next_number += 1;
        debug!("Created page {} of dynamic page {}", number, dynamic.index());
        Ok(page)
    }

    pub fn current_page(&mut self, dynamic: NodeId, create_if_missing: bool) -> Result<Option<NodeId>> {
        let current = self.dynamic_page_state(dynamic)?.current;
        match current {
            Some(page) => Ok(Some(page)),
            None if create_if_missing => self.create_next_page(dynamic).map(Some),
            None => Ok(None),
        }
    }

    /// Drop every page and restart numbering at 1. The history keeps the
    /// pages created so far.
    pub fn reset_dynamic_page(&mut self, dynamic: NodeId) -> Result<()> {
        let state = self.dynamic_page_state_mut(dynamic)?;
        state.pages.clear();
        state.current = None;
        state.next_number = 1;
        Ok(())
    }

    pub fn pages_except_current(&self, dynamic: NodeId) -> Result<Vec<NodeId>> {
        let state = self.dynamic_page_state(dynamic)?;
        Ok(state
            .pages
            .iter()
            .copied()
            .filter(|p| Some(*p) != state.current)
            .collect())
    }

    pub fn remove_all_pages_except_current(&mut self, dynamic: NodeId) -> Result<()> {
        let state = self.dynamic_page_state_mut(dynamic)?;
        let current = state.current;
        state.pages.retain(|p| Some(*p) == current);
        Ok(())
    }

    pub fn page_context(&self, page: NodeId) -> Option<PageContext> {
        match &self.node(page).kind {
            NodeKind::Page(state) => state.context,
            _ => None,
        }
    }

    pub fn is_sealed(&self, page: NodeId) -> bool {
        matches!(&self.node(page).kind, NodeKind::Page(state) if state.sealed)
    }

    /// Append content to a page that is still open.
    pub fn add_to_page(&mut self, page: NodeId, child: NodeId) -> Result<()> {
        match &self.node(page).kind {
            NodeKind::Page(state) if !state.sealed => {
                self.append_child(page, child);
                Ok(())
            }
            NodeKind::Page(_) => Err(QuireError::structural(format!(
                "Page {} is sealed and can't receive content",
                page.index()
            ))),
            other => Err(QuireError::structural(format!(
                "{} node is not a page",
                other.name()
            ))),
        }
    }
}

impl NodeTree {
    /// Install `container` as a placeholder of `page`, replacing any
    /// previous one. A dynamic page installs it on its prototype.
    pub fn set_placeholder(&mut self, page: NodeId, slot: Placeholder, container: NodeId) -> Result<()> {
        if !matches!(self.node(container).kind, NodeKind::Container) {
            return Err(QuireError::structural(format!(
                "{} node can't be used as a {}",
                self.node(container).kind.name(),
                slot.name()
            )));
        }
        let owner = self.geometry_owner(page);
        let previous = match &mut self.node_mut(owner).kind {
            NodeKind::Page(state) => state.placeholders.slot_mut(slot).replace(container),
            other => {
                return Err(QuireError::structural(format!(
                    "{} node can't carry a {}",
                    other.name(),
                    slot.name()
                )))
            }
        };
        if let Some(previous) = previous {
            self.node_mut(previous).parent = None;
        }
        self.detach(container);
        self.node_mut(container).parent = Some(owner);
        Ok(())
    }

    /// Placeholders of a page; a dynamic page answers with its prototype's.
    pub fn placeholders(&self, page: NodeId) -> Placeholders {
        match &self.node(self.geometry_owner(page)).kind {
            NodeKind::Page(state) => state.placeholders,
            _ => Placeholders::default(),
        }
    }

    /// Height a placeholder takes from the content area, margins included.
    pub fn placeholder_space(&self, page: NodeId, slot: Placeholder) -> Result<f64> {
        match self.placeholders(page).get(slot) {
            Some(id) => Ok(self.height(id)? + self.margin(id).vertical()),
            None => Ok(0.0),
        }
    }
}

fn not_a_dynamic_page(kind: &NodeKind) -> QuireError {
    QuireError::structural(format!("{} node is not a dynamic page", kind.name()))
}
