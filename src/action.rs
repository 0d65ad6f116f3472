//! Drag actions.
//!
//! "Action" is the wire atom a source or destination puts in a client
//! message; [`DragOperation`] is the toolkit-level verb. The two map onto
//! each other exactly for the five recognized verbs plus the `None` refusal.

use tracing::warn;
use x11rb::protocol::xproto::Atom;

use crate::atoms::Atoms;

/// The semantic verb of a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOperation {
    /// Reject the drop.
    None,
    Copy,
    Move,
    Link,
    /// The destination asks the user, choosing from the source's action list.
    Ask,
    /// Source-defined semantics.
    Private,
}

impl DragOperation {
    /// Maps a wire action atom to an operation. Unrecognized atoms map to
    /// `None` with a warning.
    pub fn from_action(action: Atom, atoms: &Atoms) -> Self {
        if action == x11rb::NONE {
            DragOperation::None
        } else if action == atoms.action_copy {
            DragOperation::Copy
        } else if action == atoms.action_move {
            DragOperation::Move
        } else if action == atoms.action_link {
            DragOperation::Link
        } else if action == atoms.action_ask {
            DragOperation::Ask
        } else if action == atoms.action_private {
            DragOperation::Private
        } else {
            warn!("unrecognized XDND action atom {action}");
            DragOperation::None
        }
    }

    /// Maps an operation back to its wire action atom.
    pub fn to_action(self, atoms: &Atoms) -> Atom {
        match self {
            DragOperation::None => x11rb::NONE,
            DragOperation::Copy => atoms.action_copy,
            DragOperation::Move => atoms.action_move,
            DragOperation::Link => atoms.action_link,
            DragOperation::Ask => atoms.action_ask,
            DragOperation::Private => atoms.action_private,
        }
    }
}

/// One entry of a source's advertised action list: the operation and its
/// human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOperationItem {
    pub operation: DragOperation,
    pub description: String,
}
