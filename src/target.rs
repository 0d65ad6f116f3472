//! The destination contract.

use crate::action::{DragOperation, DragOperationItem};
use crate::view::Point;

/// Callbacks a registered destination view supplies to decide whether a drop
/// is accepted and to carry it out. Every method has a safe default, so an
/// implementor overrides only what it needs; a target that overrides nothing
/// rejects everything.
///
/// All methods run synchronously on the toolkit's event-dispatch thread.
/// Payload slices passed to [`inspect_drop_data`](Self::inspect_drop_data)
/// and [`perform_drag_operation`](Self::perform_drag_operation) are only
/// valid for the duration of the call; a target must not keep them past
/// [`conclude_drag_operation`](Self::conclude_drag_operation).
pub trait DropTarget {
    /// The subset (and ordering) of the source's MIME types this view wants
    /// delivered. `None` means no advertised type fits; if the source holds
    /// back a longer type list, the engine fetches it and asks once more.
    fn required_data_types(
        &self,
        _requested: DragOperation,
        _source_types: &[String],
    ) -> Option<Vec<String>> {
        None
    }

    /// The operation this view will perform, or `None` to reject the drop.
    fn allowed_operation(
        &self,
        _requested: DragOperation,
        _source_types: &[String],
    ) -> DragOperation {
        DragOperation::None
    }

    /// Called once when the pointer enters this view.
    fn prepare_for_drag_operation(&self) {}

    /// Whether the drop decision needs the payloads up front. When `true`
    /// the engine fetches every required type before the drop and passes
    /// them to [`inspect_drop_data`](Self::inspect_drop_data).
    fn wants_data_inspection(&self) -> bool {
        false
    }

    /// Authorizes the drop given the pre-fetched payloads, aligned with the
    /// required types; an absent entry could not be retrieved.
    fn inspect_drop_data(&self, _payloads: &[Option<Vec<u8>>]) -> bool {
        true
    }

    /// Executes the drop. `operations` is the source's advertised action
    /// list when the requested operation is `Ask`, absent otherwise.
    /// `location` is the drop point in this view's coordinates.
    fn perform_drag_operation(
        &self,
        _payloads: &[Option<Vec<u8>>],
        _operations: Option<&[DragOperationItem]>,
        _location: Point,
    ) {
    }

    /// Called after every drop attempt, successful or not.
    fn conclude_drag_operation(&self) {}
}
