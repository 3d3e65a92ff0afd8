use crate::scene::NodeId;

/// What is currently selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    Selected(NodeId),
}

/// Result of a selection transition, for the caller to attach or detach the
/// gizmo and refresh the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Selected {
        previous: Option<NodeId>,
        node: NodeId,
    },
    Cleared {
        previous: NodeId,
    },
    Unchanged,
}

impl Selection {
    pub fn selected(&self) -> Option<NodeId> {
        match self {
            Selection::Idle => None,
            Selection::Selected(node) => Some(*node),
        }
    }

    /// Always transitions, even when `node` is already selected, so the
    /// fields are refreshed.
    pub fn select(&mut self, node: NodeId) -> SelectionChange {
        let previous = self.selected();
        *self = Selection::Selected(node);
        SelectionChange::Selected { previous, node }
    }

    pub fn clear(&mut self) -> SelectionChange {
        match std::mem::take(self) {
            Selection::Idle => SelectionChange::Unchanged,
            Selection::Selected(previous) => SelectionChange::Cleared { previous },
        }
    }
}
