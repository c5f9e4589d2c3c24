//! Transient UI interaction state: selection, drag, context menu, highlights.
//!
//! Kept apart from the topology data.  Nothing here feeds the layout engine,
//! so selecting or dragging never triggers a relayout, and a refetch only
//! touches this state through [`UiInteractionState::reconcile`].

use std::collections::BTreeSet;

use netviz_core::domain::node::NodeId;
use netviz_core::{validate_reparent, Forest, Position};
use tracing::debug;

/// What a drag gesture will do when dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Drop onto a node to make it the new parent.
    Reparent,
    /// Drop onto a node to join its sibling group.
    Reorder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragState {
    pub source: NodeId,
    pub mode: DragMode,
    pub hover: Option<NodeId>,
}

impl DragState {
    /// Parent the source would get if dropped on the current hover target.
    pub fn new_parent(&self, forest: &Forest) -> Option<NodeId> {
        let target = self.hover.as_deref()?;
        match self.mode {
            DragMode::Reparent => Some(target.to_string()),
            DragMode::Reorder => {
                let slot = forest.slot_of(target)?;
                let parent = forest.parent(slot)?;
                Some(forest.id(parent).to_string())
            }
        }
    }

    /// True when the drop would hand the source back its current parent,
    /// such as a reorder onto one of its own siblings.
    pub fn keeps_parent(&self, forest: &Forest) -> bool {
        let current = forest
            .slot_of(&self.source)
            .and_then(|slot| forest.parent(slot))
            .map(|parent| forest.id(parent));
        match (self.new_parent(forest), current) {
            (Some(new), Some(current)) => new == current,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    pub node_id: NodeId,
    pub anchor: Position,
}

/// Selection, drag, context menu and highlight state of one viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiInteractionState {
    /// Selected ids in selection order.
    selection: Vec<NodeId>,
    drag: Option<DragState>,
    context_menu: Option<ContextMenu>,
    highlight: BTreeSet<NodeId>,
}

impl UiInteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    /// Replaces the selection with `id`.
    pub fn select(&mut self, id: &str) {
        self.selection.clear();
        self.selection.push(id.to_string());
    }

    /// Adds `id` to the selection, or removes it if already selected.
    pub fn toggle_select(&mut self, id: &str) {
        if let Some(pos) = self.selection.iter().position(|s| s == id) {
            self.selection.remove(pos);
        } else {
            self.selection.push(id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selection
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    // ── Drag ──────────────────────────────────────────────────────────────────

    /// Starts a drag, replacing any drag already in progress.
    pub fn begin_drag(&mut self, source: &str, mode: DragMode) {
        self.drag = Some(DragState {
            source: source.to_string(),
            mode,
            hover: None,
        });
    }

    /// Updates the hover target.  No-op without an active drag.
    pub fn hover(&mut self, target: Option<&str>) {
        if let Some(drag) = self.drag.as_mut() {
            drag.hover = target.map(str::to_string);
        }
    }

    /// Whether dropping now would be accepted by the store's local checks.
    pub fn drop_target_valid(&self, forest: &Forest) -> bool {
        let Some(drag) = &self.drag else {
            return false;
        };
        if drag.hover.as_deref() == Some(drag.source.as_str()) || drag.keeps_parent(forest) {
            return false;
        }
        drag.new_parent(forest)
            .is_some_and(|parent| validate_reparent(forest, &drag.source, &parent).is_ok())
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    /// Finishes the drag and returns it.
    pub fn end_drag(&mut self) -> Option<DragState> {
        self.drag.take()
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    // ── Context menu ──────────────────────────────────────────────────────────

    pub fn open_context_menu(&mut self, id: &str, anchor: Position) {
        self.context_menu = Some(ContextMenu {
            node_id: id.to_string(),
            anchor,
        });
    }

    pub fn close_context_menu(&mut self) {
        self.context_menu = None;
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.context_menu.as_ref()
    }

    // ── Highlights ────────────────────────────────────────────────────────────

    /// Highlights `id` and all its ancestors.  Returns `false` (and leaves
    /// the highlight unchanged) if `id` is unknown.
    pub fn highlight_path_to_root(&mut self, forest: &Forest, id: &str) -> bool {
        let Some(slot) = forest.slot_of(id) else {
            return false;
        };
        self.highlight = forest
            .path_to_root(slot)
            .into_iter()
            .map(|s| forest.id(s).to_string())
            .collect();
        true
    }

    /// Highlights `id` and all its descendants.
    pub fn highlight_subtree(&mut self, forest: &Forest, id: &str) -> bool {
        let Some(slot) = forest.slot_of(id) else {
            return false;
        };
        self.highlight = std::iter::once(slot)
            .chain(forest.descendants(slot))
            .map(|s| forest.id(s).to_string())
            .collect();
        true
    }

    pub fn clear_highlight(&mut self) {
        self.highlight.clear();
    }

    pub fn highlighted(&self) -> &BTreeSet<NodeId> {
        &self.highlight
    }

    pub fn is_highlighted(&self, id: &str) -> bool {
        self.highlight.contains(id)
    }

    // ── Reconciliation ────────────────────────────────────────────────────────

    /// Drops every reference to nodes that are not in `forest`.
    ///
    /// Called after each refetch.  State that still points at existing nodes
    /// is left exactly as it was.
    pub fn reconcile(&mut self, forest: &Forest) {
        let before = self.selection.len();
        self.selection.retain(|id| forest.contains(id));

        let source_gone = self
            .drag
            .as_ref()
            .is_some_and(|drag| !forest.contains(&drag.source));
        if source_gone {
            self.drag = None;
        } else if let Some(drag) = self.drag.as_mut() {
            if drag.hover.as_deref().is_some_and(|h| !forest.contains(h)) {
                drag.hover = None;
            }
        }

        if self
            .context_menu
            .as_ref()
            .is_some_and(|menu| !forest.contains(&menu.node_id))
        {
            self.context_menu = None;
        }

        self.highlight.retain(|id| forest.contains(id));
        debug!(
            dropped_selection = before - self.selection.len(),
            "interaction state reconciled"
        );
    }
}
