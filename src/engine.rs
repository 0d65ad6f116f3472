//! The drop-destination protocol engine.
//!
//! [`DropEngine`] consumes the client messages a drag source sends a
//! destination window (`XdndEnter`, `XdndPosition`, `XdndDrop`), answers
//! them (`XdndStatus`, `XdndFinished`), pulls the payloads the destination
//! asked for over the X selection mechanism, and drives the destination's
//! [`DropTarget`] callbacks. It owns the per-drag record and a single
//! watchdog timer that reclaims the session when the source goes silent.
//!
//! Everything runs on the toolkit's event-dispatch thread; the engine never
//! blocks. Waiting for the source or for selection data is expressed as a
//! state in [`State`] plus a pending message or timer, and each entry point
//! runs to completion before the loop hands the engine the next event.

use std::rc::Rc;
use std::time::Duration;

use bitflags::bitflags;
use tracing::{debug, warn};
use x11rb::protocol::xproto::{Atom, AtomEnum, ClientMessageEvent, Timestamp, Window};

use crate::action::DragOperation;
use crate::atoms::Atoms;
use crate::conn::{XCallError, XConn};
use crate::property;
use crate::session::{DragSession, State};
use crate::target::DropTarget;
use crate::view::{Point, ViewId, ViewTree};

/// The protocol version this destination speaks and publishes.
pub const XDND_VERSION: u32 = 5;

/// Sources older than this cannot be talked to; their enter messages are
/// answered with a refusal.
const MIN_XDND_VERSION: u32 = 3;

/// How long the source may stay silent before the drag is abandoned.
const SOURCE_RESPONSE_MAX_DELAY: Duration = Duration::from_millis(3000);

bitflags! {
    /// Word 1 of an `XdndEnter` message, low bits.
    struct EnterFlags: u32 {
        const HAS_TYPE_LIST = 1;
    }
}

bitflags! {
    /// Word 1 of an `XdndStatus` message.
    struct StatusFlags: u32 {
        const ACCEPT = 1;
        const WANT_POSITION_UPDATES = 2;
    }
}

/// Issues selection-transfer requests on the engine's behalf. The reply does
/// not come back through this trait: the embedder's event loop receives it
/// and hands the bytes to [`DropEngine::handle_selection_data`].
pub trait SelectionTransfer {
    /// Requests the selection's contents converted to `target`, to be
    /// delivered to `requestor`. Returns whether the request was issued.
    fn request(
        &mut self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        time: Timestamp,
    ) -> bool;
}

/// Schedules the engine's watchdog. When a scheduled deadline fires, the
/// embedder calls [`DropEngine::handle_timeout`].
pub trait Timekeeper {
    type Handle;

    fn schedule_once(&mut self, delay: Duration) -> Self::Handle;

    fn cancel(&mut self, handle: Self::Handle);
}

/// The destination half of XDND version 5.
pub struct DropEngine<X: XConn, S: SelectionTransfer, T: Timekeeper> {
    conn: Rc<X>,
    selection: S,
    timer: T,
    atoms: Atoms,
    views: ViewTree,
    session: Option<DragSession>,
    watchdog: Option<T::Handle>,
}

impl<X: XConn, S: SelectionTransfer, T: Timekeeper> DropEngine<X, S, T> {
    /// Creates an engine, interning the XDND atoms on `conn`.
    pub fn new(conn: Rc<X>, selection: S, timer: T) -> Result<Self, XCallError> {
        let atoms = Atoms::intern(conn.as_ref())?;
        Ok(DropEngine {
            conn,
            selection,
            timer,
            atoms,
            views: ViewTree::new(),
            session: None,
            watchdog: None,
        })
    }

    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    pub fn views(&self) -> &ViewTree {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut ViewTree {
        &mut self.views
    }

    /// `Idle` when no drag is in progress.
    pub fn current_state(&self) -> State {
        self.session.as_ref().map_or(State::Idle, |s| s.state)
    }

    // ----- Registration -----

    /// Declares `view` a drop destination accepting `accepted_types`,
    /// publishing XDND awareness on its top-level. The top-level's property
    /// is written once; if the top-level is not realized yet, the write
    /// happens on [`view_realized`](Self::view_realized).
    pub fn register_dragged_types(
        &mut self,
        view: ViewId,
        accepted_types: &[&str],
    ) -> Result<(), XCallError> {
        let mut type_atoms = Vec::with_capacity(accepted_types.len());
        for ty in accepted_types {
            type_atoms.push(self.conn.intern_atom(ty)?);
        }
        self.views.set_droppable_types(view, Some(type_atoms));
        self.set_xdnd_aware_property(view)
    }

    pub fn unregister_dragged_types(&mut self, view: ViewId) {
        self.views.set_droppable_types(view, None);
    }

    /// Installs the destination callbacks that make `view` a live drop
    /// target for the state machine.
    pub fn set_drop_target(&mut self, view: ViewId, target: Rc<dyn DropTarget>) {
        self.views.set_target(view, Some(target));
    }

    /// Tells the engine `view` now has an X window. Completes a deferred
    /// awareness-property write.
    pub fn view_realized(&mut self, view: ViewId, window: Window) -> Result<(), XCallError> {
        self.views.realize(view, window);
        if self.views.aware_pending(view) {
            self.views.set_aware_pending(view, false);
            self.write_aware_property(window)?;
        }
        Ok(())
    }

    fn set_xdnd_aware_property(&mut self, view: ViewId) -> Result<(), XCallError> {
        let toplevel = self.views.toplevel_of(view);
        if self.views.xdnd_hint_set(toplevel) {
            return Ok(());
        }
        self.views.set_xdnd_hint(toplevel);
        match self.views.window_of(toplevel) {
            Some(window) => self.write_aware_property(window),
            None => {
                self.views.set_aware_pending(toplevel, true);
                Ok(())
            },
        }
    }

    fn write_aware_property(&self, window: Window) -> Result<(), XCallError> {
        self.conn
            .change_property32(window, self.atoms.aware, AtomEnum::ATOM.into(), &[XDND_VERSION])
    }

    // ----- Entry points -----

    /// Feeds one client message delivered to `toplevel`'s window into the
    /// state machine.
    pub fn handle_client_message(&mut self, toplevel: ViewId, event: &ClientMessageEvent) {
        let data = event.data.as_data32();
        let message_type = event.type_;

        if message_type == self.atoms.enter {
            self.store_enter_msg_info(toplevel, &data);
            let version = self.session.as_ref().map_or(0, |s| s.protocol_version);
            if version < MIN_XDND_VERSION {
                warn!("drag source speaks unsupported XDND version {version}");
                self.cancel_drop_on_enter(toplevel);
                return;
            }
            if self.current_state() == State::WaitEnter {
                self.step(message_type);
            }
            return;
        }

        if message_type == self.atoms.leave {
            debug!("drag source left without dropping");
        }

        if message_type == self.atoms.position {
            self.store_position_msg_info(toplevel, &data);
        }

        if self.session.is_some() {
            self.step(message_type);
        } else if message_type == self.atoms.drop || message_type == self.atoms.selection {
            debug!("ignoring XDND message with no drag in progress");
        }
    }

    /// Delivers the result of a selection request issued by the engine: the
    /// converted bytes, or `None` if the transfer failed. Appends the
    /// payload and posts the selection-ready message that re-enters the
    /// state machine.
    pub fn handle_selection_data(
        &mut self,
        _selection: Atom,
        _target: Atom,
        _time: Timestamp,
        data: Option<Vec<u8>>,
    ) {
        let window = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let Some(payloads) = session.drop_payloads.as_mut() else {
                return;
            };
            payloads.push(data);
            self.views.window_of(session.dest_view)
        };
        let Some(window) = window else {
            return;
        };
        if let Err(err) =
            self.conn
                .send_client_message(window, self.atoms.selection, [window, 0, 0, 0, 0])
        {
            warn!("cannot post selection-ready message: {err}");
            self.clear();
        }
    }

    /// The watchdog fired: the source has been silent too long. Cancels the
    /// drag and drops the record.
    pub fn handle_timeout(&mut self) {
        self.watchdog = None;
        let Some(dest_view) = self.session.as_ref().map(|s| s.dest_view) else {
            return;
        };
        warn!("delay for drag source response expired");
        if self.views.is_registered(dest_view) {
            self.cancel_drop(dest_view);
        } else {
            self.send_status(dest_view, x11rb::NONE);
        }
        self.clear();
    }

    /// Refuses the drag announced by an enter message (the engine does this
    /// itself for sources below the minimum protocol version; embedders may
    /// call it for their own gating).
    pub fn cancel_drop_on_enter(&mut self, toplevel: ViewId) {
        let registered_dest = self
            .session
            .as_ref()
            .map(|s| s.dest_view)
            .filter(|&view| self.views.is_registered(view));
        match registered_dest {
            Some(view) => self.cancel_drop(view),
            None => self.send_status(toplevel, x11rb::NONE),
        }
        self.clear();
    }

    /// Drops the per-drag record and stops the watchdog. Idempotent.
    pub fn clear(&mut self) {
        self.stop_watchdog();
        self.session = None;
    }

    // ----- Message-info storage -----

    fn store_enter_msg_info(&mut self, toplevel: ViewId, data: &[u32; 5]) {
        let source_types = property::decode_three_types(self.conn.as_ref(), data);
        let session = self
            .session
            .get_or_insert_with(|| DragSession::new(toplevel, toplevel));
        session.protocol_version = data[1] >> 24;
        session.aware_view = toplevel;
        session.source_window = data[0];
        session.source_types = Some(source_types);
        // Whether the three embedded types were only a prefix; the full list
        // is fetched lazily if they turn out not to satisfy the destination.
        session.type_list_available =
            EnterFlags::from_bits_truncate(data[1]).contains(EnterFlags::HAS_TYPE_LIST);
    }

    fn store_position_msg_info(&mut self, toplevel: ViewId, data: &[u32; 5]) {
        let root_x = (data[2] >> 16) as i16;
        let root_y = (data[2] & 0xffff) as i16;
        let new_dest = match self
            .views
            .find_destination(self.conn.as_ref(), toplevel, root_x, root_y)
        {
            Ok(view) => view,
            Err(err) => {
                warn!("cannot hit-test drag position: {err}");
                toplevel
            },
        };

        match self.session.as_mut() {
            None => {
                let mut session = DragSession::new(toplevel, new_dest);
                session.source_window = data[0];
                self.session = Some(session);
            },
            Some(session) => {
                if new_dest != session.dest_view {
                    session.source_window = data[0];
                    session.dest_view = new_dest;
                    session.source_action_changed = false;
                    // Start over in the new view; the pending enter info, if
                    // any, is still awaited.
                    if session.state != State::WaitEnter {
                        session.state = State::Idle;
                    }
                } else {
                    session.source_action_changed = session.source_action != data[4];
                }
            },
        }

        if let Some(session) = self.session.as_mut() {
            session.source_action = data[4];
        }
    }

    // ----- State machine -----

    fn step(&mut self, message_type: Atom) {
        let (state, dest_view) = match self.session.as_ref() {
            Some(session) => (session.state, session.dest_view),
            None => {
                debug_assert!(false, "state machine stepped without a drag record");
                return;
            },
        };

        let new_state = match state {
            State::Idle => self.idle_state(dest_view, message_type),
            State::WaitEnter => self.wait_enter_state(dest_view, message_type),
            State::InspectDropData => self.inspect_drop_data_state(dest_view, message_type),
            State::DropAllowed => self.drop_allowed_state(dest_view, message_type),
            State::DropNotAllowed => self.drop_not_allowed_state(dest_view, message_type),
            State::WaitForDropData => self.wait_for_drop_data_state(dest_view, message_type),
        };

        // A failed send may have torn the record down mid-transition.
        if let Some(session) = self.session.as_mut() {
            session.state = new_state;
        }
        if self.session.is_some() && new_state != State::Idle {
            self.arm_watchdog();
        }
    }

    fn idle_state(&mut self, dest_view: ViewId, message_type: Atom) -> State {
        if message_type == self.atoms.position {
            if let Some(target) = self.views.target(dest_view) {
                target.prepare_for_drag_operation();
                if self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.source_types.is_some())
                {
                    return self.check_drop_allowed(dest_view);
                }
                // Position outran the enter message.
                return State::WaitEnter;
            }
        }

        self.suspend_drop_authorization(dest_view);
        State::Idle
    }

    fn wait_enter_state(&mut self, dest_view: ViewId, message_type: Atom) -> State {
        if message_type == self.atoms.enter {
            return self.check_drop_allowed(dest_view);
        }
        State::WaitEnter
    }

    fn inspect_drop_data_state(&mut self, dest_view: ViewId, message_type: Atom) -> State {
        if message_type == self.atoms.selection {
            // One payload arrived; fetch the next missing one.
            if self.request_drop_data() {
                return State::InspectDropData;
            }
            if self.inspect_fetched_payloads(dest_view) {
                return self.check_action_allowed(dest_view);
            }
            self.suspend_drop_authorization(dest_view);
            return State::DropNotAllowed;
        }
        State::InspectDropData
    }

    fn drop_allowed_state(&mut self, dest_view: ViewId, message_type: Atom) -> State {
        if message_type == self.atoms.drop {
            let inspected = self
                .session
                .as_ref()
                .is_some_and(|s| s.drop_payloads.is_some());
            if inspected {
                self.call_perform_drag_operation(dest_view);
            } else {
                if let Some(session) = self.session.as_mut() {
                    let slots = session.required_types.as_ref().map_or(0, Vec::len);
                    session.drop_payloads = Some(Vec::with_capacity(slots));
                }
                if self.request_drop_data() {
                    return State::WaitForDropData;
                }
                // Nothing to fetch.
                self.call_perform_drag_operation(dest_view);
            }
            self.finish_drop(dest_view);
            return State::Idle;
        }

        if message_type == self.atoms.position {
            if self.source_action_changed() {
                return self.check_drop_allowed(dest_view);
            }
            let action = self.session.as_ref().map_or(x11rb::NONE, |s| s.dest_action);
            self.send_status(dest_view, action);
            return State::DropAllowed;
        }

        State::DropAllowed
    }

    fn drop_not_allowed_state(&mut self, dest_view: ViewId, message_type: Atom) -> State {
        if message_type == self.atoms.drop {
            self.finish_drop(dest_view);
            return State::Idle;
        }

        if message_type == self.atoms.position {
            if self.source_action_changed() {
                return self.check_drop_allowed(dest_view);
            }
            self.send_status(dest_view, x11rb::NONE);
            return State::DropNotAllowed;
        }

        State::DropNotAllowed
    }

    fn wait_for_drop_data_state(&mut self, dest_view: ViewId, message_type: Atom) -> State {
        if message_type == self.atoms.selection {
            if self.request_drop_data() {
                return State::WaitForDropData;
            }
            // Every required (and retrievable) payload is in.
            self.call_perform_drag_operation(dest_view);
            self.finish_drop(dest_view);
            return State::Idle;
        }
        State::WaitForDropData
    }

    fn source_action_changed(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.source_action_changed)
    }

    // ----- Drop authorization -----

    fn check_drop_allowed(&mut self, dest_view: ViewId) -> State {
        self.store_required_type_list(dest_view);

        let Some(target) = self.views.target(dest_view) else {
            self.suspend_drop_authorization(dest_view);
            return State::DropNotAllowed;
        };

        if target.wants_data_inspection() {
            if let Some(session) = self.session.as_mut() {
                let slots = session.required_types.as_ref().map_or(0, Vec::len);
                session.drop_payloads = Some(Vec::with_capacity(slots));
            }
            if self.request_drop_data() {
                return State::InspectDropData;
            }
            // Nothing could be fetched, but the inspection may still allow
            // the drop.
            if self.inspect_fetched_payloads(dest_view) {
                return self.check_action_allowed(dest_view);
            }
            self.suspend_drop_authorization(dest_view);
            return State::DropNotAllowed;
        }

        self.check_action_allowed(dest_view)
    }

    fn check_action_allowed(&mut self, dest_view: ViewId) -> State {
        let dest_action = self.allowed_action(dest_view);
        if let Some(session) = self.session.as_mut() {
            session.dest_action = dest_action;
        }

        if dest_action == x11rb::NONE {
            self.suspend_drop_authorization(dest_view);
            return State::DropNotAllowed;
        }

        self.send_status(dest_view, dest_action);
        State::DropAllowed
    }

    fn allowed_action(&self, dest_view: ViewId) -> Atom {
        let Some(target) = self.views.target(dest_view) else {
            return x11rb::NONE;
        };
        let Some(session) = self.session.as_ref() else {
            return x11rb::NONE;
        };
        let requested = DragOperation::from_action(session.source_action, &self.atoms);
        let source_types = session.source_types.as_deref().unwrap_or(&[]);
        target
            .allowed_operation(requested, source_types)
            .to_action(&self.atoms)
    }

    fn store_required_type_list(&mut self, dest_view: ViewId) {
        let Some(target) = self.views.target(dest_view) else {
            return;
        };
        let atoms = self.atoms;

        let (requested, source_window, type_list_available) = {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            (
                DragOperation::from_action(session.source_action, &atoms),
                session.source_window,
                session.type_list_available,
            )
        };

        // First, see whether the types buffered from the enter message are
        // enough for the destination.
        let mut required = {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            target.required_data_types(requested, session.source_types.as_deref().unwrap_or(&[]))
        };

        if required.is_none() && type_list_available {
            // The buffered types were only a prefix; fetch the whole list
            // once and ask again.
            let full_list = property::read_type_list(self.conn.as_ref(), &atoms, source_window);
            if let Some(session) = self.session.as_mut() {
                session.source_types = Some(full_list);
                session.type_list_available = false;
            }
            if let Some(session) = self.session.as_ref() {
                required = target
                    .required_data_types(requested, session.source_types.as_deref().unwrap_or(&[]));
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.required_types = required;
        }
    }

    fn inspect_fetched_payloads(&self, dest_view: ViewId) -> bool {
        let Some(target) = self.views.target(dest_view) else {
            return false;
        };
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        target.inspect_drop_data(session.drop_payloads.as_deref().unwrap_or(&[]))
    }

    // ----- Payload requests -----

    /// Requests the first required type with no payload slot yet. A refused
    /// request records an absent payload and moves on to the next type.
    /// Returns whether a request is now in flight.
    fn request_drop_data(&mut self) -> bool {
        loop {
            let (next_type, requestor) = {
                let Some(session) = self.session.as_ref() else {
                    return false;
                };
                (
                    session.next_requested_type().map(str::to_owned),
                    self.views.window_of(session.dest_view),
                )
            };
            let Some(ty) = next_type else {
                return false;
            };

            let requested = match (requestor, self.conn.intern_atom(&ty)) {
                (Some(window), Ok(target_atom)) => self.selection.request(
                    window,
                    self.atoms.selection,
                    target_atom,
                    x11rb::CURRENT_TIME,
                ),
                (None, _) => false,
                (_, Err(err)) => {
                    warn!("cannot intern selection target {ty}: {err}");
                    false
                },
            };
            if requested {
                return true;
            }

            warn!("could not request data for dropped data");
            let Some(payloads) = self
                .session
                .as_mut()
                .and_then(|s| s.drop_payloads.as_mut())
            else {
                return false;
            };
            payloads.push(None);
        }
    }

    // ----- Drop completion -----

    fn call_perform_drag_operation(&mut self, dest_view: ViewId) {
        let (ask, source_window) = match self.session.as_ref() {
            Some(session) => (
                session.source_action == self.atoms.action_ask,
                session.source_window,
            ),
            None => return,
        };
        let operations = if ask {
            property::read_action_list(self.conn.as_ref(), &self.atoms, source_window)
        } else {
            None
        };
        let location = self.drop_location_in_view(dest_view);

        let Some(target) = self.views.target(dest_view) else {
            return;
        };
        let Some(session) = self.session.as_ref() else {
            return;
        };
        target.perform_drag_operation(
            session.drop_payloads.as_deref().unwrap_or(&[]),
            operations.as_deref(),
            location,
        );
    }

    fn drop_location_in_view(&self, dest_view: ViewId) -> Point {
        let toplevel = self.views.toplevel_of(dest_view);
        let pointer = self
            .views
            .window_of(toplevel)
            .and_then(|window| match self.conn.pointer_position(window) {
                Ok(pointer) => Some(pointer),
                Err(err) => {
                    warn!("cannot query drop location: {err}");
                    None
                },
            });
        let Some((x, y)) = pointer else {
            return Point::default();
        };
        let origin = self.views.origin_in_toplevel(dest_view);
        Point::new(x - origin.x, y - origin.y)
    }

    fn conclude_drop(&mut self, dest_view: ViewId) {
        if let Some(target) = self.views.target(dest_view) {
            target.conclude_drag_operation();
        }
    }

    fn finish_drop(&mut self, dest_view: ViewId) {
        self.send_dnd_client_message(self.atoms.finished, [0, 0, 0, 0]);
        self.conclude_drop(dest_view);
        self.clear();
    }

    /// Refuses the drop while letting the drag continue; the source may move
    /// on to another view.
    fn suspend_drop_authorization(&mut self, dest_view: ViewId) {
        self.send_status(dest_view, x11rb::NONE);
        if let Some(session) = self.session.as_mut() {
            session.drop_payloads = None;
            session.required_types = None;
        }
    }

    fn cancel_drop(&mut self, dest_view: ViewId) {
        self.send_status(dest_view, x11rb::NONE);
        self.conclude_drop(dest_view);
        if let Some(session) = self.session.as_mut() {
            session.free_destination_view_infos();
        }
    }

    // ----- Outgoing messages -----

    /// Answers a position message. A destination without children also
    /// advertises its rectangle in root coordinates so the source can skip
    /// redundant position updates inside it; one with children asks for
    /// every move instead.
    fn send_status(&mut self, dest_view: ViewId, action: Atom) {
        let mut flags = StatusFlags::empty();
        if action != x11rb::NONE {
            flags |= StatusFlags::ACCEPT;
        }

        if !self.views.has_children(dest_view) {
            if let Some((x, y)) = self.dest_origin_in_root(dest_view) {
                let size = self.views.size(dest_view);
                self.send_dnd_client_message(
                    self.atoms.status,
                    [
                        flags.bits(),
                        pack_coords(x, y),
                        pack_extent(size.width, size.height),
                        action,
                    ],
                );
                return;
            }
        }

        flags |= StatusFlags::WANT_POSITION_UPDATES;
        self.send_dnd_client_message(self.atoms.status, [flags.bits(), 0, 0, action]);
    }

    fn dest_origin_in_root(&self, dest_view: ViewId) -> Option<(i16, i16)> {
        let toplevel = self.views.toplevel_of(dest_view);
        let window = self.views.window_of(toplevel)?;
        let origin = self.views.origin_in_toplevel(dest_view);
        match self.conn.translate_to_root(window, origin.x, origin.y) {
            Ok(root_origin) => Some(root_origin),
            Err(err) => {
                warn!("cannot translate destination origin: {err}");
                None
            },
        }
    }

    /// Sends one XDND message to the source, word 0 carrying our aware
    /// window. A failed send abandons the session.
    fn send_dnd_client_message(&mut self, message_type: Atom, data: [u32; 4]) {
        let (aware_window, source_window) = {
            let Some(session) = self.session.as_ref() else {
                return;
            };
            (self.views.window_of(session.aware_view), session.source_window)
        };
        let Some(aware_window) = aware_window else {
            warn!("aware view has no window; abandoning drag");
            self.clear();
            return;
        };

        let payload = [aware_window, data[0], data[1], data[2], data[3]];
        if let Err(err) = self
            .conn
            .send_client_message(source_window, message_type, payload)
        {
            warn!("cannot send XDND client message: {err}");
            self.clear();
        }
    }

    // ----- Watchdog -----

    fn arm_watchdog(&mut self) {
        self.stop_watchdog();
        self.watchdog = Some(self.timer.schedule_once(SOURCE_RESPONSE_MAX_DELAY));
    }

    fn stop_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            self.timer.cancel(handle);
        }
    }
}

fn pack_coords(x: i16, y: i16) -> u32 {
    (u32::from(x as u16) << 16) | u32::from(y as u16)
}

fn pack_extent(width: u16, height: u16) -> u32 {
    (u32::from(width) << 16) | u32::from(height)
}
