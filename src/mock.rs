//! Scriptable test doubles for the engine's external facilities.
//!
//! These exist so destinations (and this crate's own tests) can exercise
//! whole drag sessions without a display: [`MockConn`] keeps an atom table
//! and window properties in maps and records every outgoing client message,
//! [`MockSelection`] records requests and answers them from a script, and
//! [`MockTimer`] records arm/cancel so watchdog behavior is observable.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use x11rb::protocol::xproto::{Atom, Timestamp, Window};

use crate::conn::{PropertyError, XCallError, XConn};
use crate::engine::{SelectionTransfer, Timekeeper};

/// One client message sent through [`MockConn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: Window,
    pub message_type: Atom,
    pub data: [u32; 5],
}

/// One property write through [`MockConn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyWrite {
    pub window: Window,
    pub property: Atom,
    pub data: Vec<u32>,
}

enum PropValue {
    Words(Vec<u32>),
    Bytes(Vec<u8>),
}

struct Property {
    property_type: Atom,
    value: PropValue,
}

#[derive(Default)]
struct ConnState {
    atoms: HashMap<String, Atom>,
    names: HashMap<Atom, String>,
    next_atom: Atom,
    properties: HashMap<(Window, Atom), Property>,
    sent: Vec<SentMessage>,
    property_writes: Vec<PropertyWrite>,
    window_origins: HashMap<Window, (i16, i16)>,
    pointer: (i16, i16),
    fail_sends: bool,
}

/// An in-memory [`XConn`].
///
/// Windows are placed with [`place_window`](Self::place_window) (their
/// origin in root coordinates), which is all the coordinate translations
/// need. Atoms are interned on demand starting from an arbitrary offset.
#[derive(Default)]
pub struct MockConn {
    state: RefCell<ConnState>,
}

impl MockConn {
    pub fn new() -> Self {
        let conn = MockConn::default();
        conn.state.borrow_mut().next_atom = 0x100;
        conn
    }

    /// Interns (or looks up) an atom, the test-side twin of
    /// [`XConn::intern_atom`].
    pub fn atom(&self, name: &str) -> Atom {
        let mut state = self.state.borrow_mut();
        if let Some(&atom) = state.atoms.get(name) {
            return atom;
        }
        let atom = state.next_atom;
        state.next_atom += 1;
        state.atoms.insert(name.to_owned(), atom);
        state.names.insert(atom, name.to_owned());
        atom
    }

    pub fn set_property32(&self, window: Window, property: Atom, property_type: Atom, data: Vec<u32>) {
        self.state.borrow_mut().properties.insert(
            (window, property),
            Property { property_type, value: PropValue::Words(data) },
        );
    }

    pub fn set_property8(&self, window: Window, property: Atom, property_type: Atom, data: Vec<u8>) {
        self.state.borrow_mut().properties.insert(
            (window, property),
            Property { property_type, value: PropValue::Bytes(data) },
        );
    }

    /// Places a window at an origin in root coordinates.
    pub fn place_window(&self, window: Window, root_origin: (i16, i16)) {
        self.state.borrow_mut().window_origins.insert(window, root_origin);
    }

    /// Moves the pointer, in root coordinates.
    pub fn set_pointer(&self, root_position: (i16, i16)) {
        self.state.borrow_mut().pointer = root_position;
    }

    /// Makes every subsequent `send_client_message` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.state.borrow_mut().fail_sends = fail;
    }

    /// Drains the recorded client messages.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// All property writes so far.
    pub fn property_writes(&self) -> Vec<PropertyWrite> {
        self.state.borrow().property_writes.clone()
    }

    fn origin(&self, window: Window) -> (i16, i16) {
        self.state
            .borrow()
            .window_origins
            .get(&window)
            .copied()
            .unwrap_or((0, 0))
    }
}

impl XConn for MockConn {
    fn intern_atom(&self, name: &str) -> Result<Atom, XCallError> {
        Ok(self.atom(name))
    }

    fn atom_name(&self, atom: Atom) -> Result<String, XCallError> {
        self.state
            .borrow()
            .names
            .get(&atom)
            .cloned()
            .ok_or_else(|| XCallError::new(format!("unknown atom {atom}")))
    }

    fn get_property32(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<u32>, PropertyError> {
        let state = self.state.borrow();
        let Some(prop) = state.properties.get(&(window, property)) else {
            return Err(PropertyError::TypeMismatch(x11rb::NONE));
        };
        if prop.property_type != property_type {
            return Err(PropertyError::TypeMismatch(prop.property_type));
        }
        match &prop.value {
            PropValue::Words(words) => Ok(words.clone()),
            PropValue::Bytes(_) => Err(PropertyError::FormatMismatch(8)),
        }
    }

    fn get_property8(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<u8>, PropertyError> {
        let state = self.state.borrow();
        let Some(prop) = state.properties.get(&(window, property)) else {
            return Err(PropertyError::TypeMismatch(x11rb::NONE));
        };
        if prop.property_type != property_type {
            return Err(PropertyError::TypeMismatch(prop.property_type));
        }
        match &prop.value {
            PropValue::Bytes(bytes) => Ok(bytes.clone()),
            PropValue::Words(_) => Err(PropertyError::FormatMismatch(32)),
        }
    }

    fn change_property32(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
        data: &[u32],
    ) -> Result<(), XCallError> {
        let mut state = self.state.borrow_mut();
        state.property_writes.push(PropertyWrite {
            window,
            property,
            data: data.to_vec(),
        });
        state.properties.insert(
            (window, property),
            Property { property_type, value: PropValue::Words(data.to_vec()) },
        );
        Ok(())
    }

    fn send_client_message(
        &self,
        target: Window,
        message_type: Atom,
        data: [u32; 5],
    ) -> Result<(), XCallError> {
        let mut state = self.state.borrow_mut();
        if state.fail_sends {
            return Err(XCallError::new("scripted send failure"));
        }
        state.sent.push(SentMessage { target, message_type, data });
        Ok(())
    }

    fn translate_from_root(
        &self,
        window: Window,
        root_x: i16,
        root_y: i16,
    ) -> Result<(i16, i16), XCallError> {
        let (ox, oy) = self.origin(window);
        Ok((root_x - ox, root_y - oy))
    }

    fn translate_to_root(
        &self,
        window: Window,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), XCallError> {
        let (ox, oy) = self.origin(window);
        Ok((x + ox, y + oy))
    }

    fn pointer_position(&self, window: Window) -> Result<(i16, i16), XCallError> {
        let (ox, oy) = self.origin(window);
        let (px, py) = self.state.borrow().pointer;
        Ok((px - ox, py - oy))
    }
}

/// One request that reached [`MockSelection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
}

#[derive(Default)]
struct SelectionState {
    requests: Vec<SelectionRequest>,
    outcomes: VecDeque<bool>,
}

/// A selection facility answering from a script. Unscripted requests
/// succeed. Clones share state, so a test keeps one handle and gives the
/// engine another.
#[derive(Clone, Default)]
pub struct MockSelection {
    state: Rc<RefCell<SelectionState>>,
}

impl MockSelection {
    pub fn new() -> Self {
        MockSelection::default()
    }

    /// Queues outcomes for the next requests, in order.
    pub fn script(&self, outcomes: &[bool]) {
        self.state.borrow_mut().outcomes.extend(outcomes);
    }

    pub fn requests(&self) -> Vec<SelectionRequest> {
        self.state.borrow().requests.clone()
    }
}

impl SelectionTransfer for MockSelection {
    fn request(
        &mut self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        _time: Timestamp,
    ) -> bool {
        let mut state = self.state.borrow_mut();
        state.requests.push(SelectionRequest { requestor, selection, target });
        state.outcomes.pop_front().unwrap_or(true)
    }
}

#[derive(Default)]
struct TimerState {
    next_id: u64,
    armed: Vec<(u64, Duration)>,
    scheduled_total: usize,
}

/// A timer that records scheduling instead of firing; tests call
/// [`crate::DropEngine::handle_timeout`] themselves. Clones share state.
#[derive(Clone, Default)]
pub struct MockTimer {
    state: Rc<RefCell<TimerState>>,
}

impl MockTimer {
    pub fn new() -> Self {
        MockTimer::default()
    }

    /// How many timers are currently armed.
    pub fn armed(&self) -> usize {
        self.state.borrow().armed.len()
    }

    /// How many timers were ever scheduled.
    pub fn scheduled_total(&self) -> usize {
        self.state.borrow().scheduled_total
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.state.borrow().armed.last().map(|&(_, delay)| delay)
    }
}

impl Timekeeper for MockTimer {
    type Handle = u64;

    fn schedule_once(&mut self, delay: Duration) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.armed.push((id, delay));
        state.scheduled_total += 1;
        id
    }

    fn cancel(&mut self, handle: u64) {
        self.state.borrow_mut().armed.retain(|&(id, _)| id != handle);
    }
}
