//! The per-drag record.

use x11rb::protocol::xproto::{Atom, Window};

use crate::view::ViewId;

/// The engine's protocol state. `Idle` is both the resting state between
/// drags and the restart point when the destination view changes mid-drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// A position message arrived before the enter message; source types are
    /// still unknown.
    WaitEnter,
    /// Payloads are being fetched for the destination's pre-drop inspection.
    InspectDropData,
    DropAllowed,
    DropNotAllowed,
    /// The drop happened; payloads are being fetched for delivery.
    WaitForDropData,
}

/// Everything the engine tracks for one drag, created on the first relevant
/// message and dropped when the drag completes, is cancelled or times out.
#[derive(Debug)]
pub(crate) struct DragSession {
    pub state: State,
    /// The top-level view carrying the awareness property.
    pub aware_view: ViewId,
    /// The leaf view currently under the pointer.
    pub dest_view: ViewId,
    pub source_window: Window,
    pub protocol_version: u32,
    /// MIME types the source advertised, owned copies. `None` until the
    /// enter message arrives.
    pub source_types: Option<Vec<String>>,
    /// The source advertised more than three types and the full list has not
    /// been fetched yet.
    pub type_list_available: bool,
    /// Types the destination asked for, in delivery order.
    pub required_types: Option<Vec<String>>,
    /// Fetched payloads, positionally aligned with `required_types`. An
    /// absent entry could not be retrieved.
    pub drop_payloads: Option<Vec<Option<Vec<u8>>>>,
    pub source_action: Atom,
    pub dest_action: Atom,
    /// The latest position message changed the action within the same
    /// destination view.
    pub source_action_changed: bool,
}

impl DragSession {
    pub fn new(aware_view: ViewId, dest_view: ViewId) -> Self {
        DragSession {
            state: State::Idle,
            aware_view,
            dest_view,
            source_window: x11rb::NONE,
            protocol_version: 0,
            source_types: None,
            type_list_available: false,
            required_types: None,
            drop_payloads: None,
            source_action: x11rb::NONE,
            dest_action: x11rb::NONE,
            source_action_changed: false,
        }
    }

    /// Releases what the current destination view accumulated while keeping
    /// the record alive; used when a refused drop leaves the drag running.
    pub fn free_destination_view_infos(&mut self) {
        self.source_types = None;
        self.required_types = None;
        self.drop_payloads = None;
    }

    /// The first required type no payload slot exists for yet.
    pub fn next_requested_type(&self) -> Option<&str> {
        let required = self.required_types.as_ref()?;
        let fetched = self.drop_payloads.as_ref().map_or(0, Vec::len);
        required.get(fetched).map(String::as_str)
    }
}
