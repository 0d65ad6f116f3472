//! The receiving half of the X drag-and-drop protocol, XDND version 5.
//!
//! A drag source and a destination negotiate a drop with client messages:
//! the source announces itself over a window (`XdndEnter`), streams pointer
//! positions and a requested action (`XdndPosition`), and the destination
//! answers each position with `XdndStatus` — accept or refuse, and which
//! action it will perform. On `XdndDrop` the destination pulls the typed
//! payloads it wants through the X selection mechanism and acknowledges with
//! `XdndFinished`. This crate implements the destination side of that
//! negotiation for a retained-mode widget toolkit.
//!
//! The embedding toolkit supplies three things:
//!
//! * a transport ([`XConn`]) — implemented for real displays by
//!   [`XDisplay`], for tests by [`mock::MockConn`];
//! * a selection facility ([`SelectionTransfer`]) and a one-shot timer
//!   ([`Timekeeper`]);
//! * a mirror of its widget hierarchy in the engine's [`ViewTree`], with
//!   [`DropTarget`] callbacks on the views that accept drops.
//!
//! The toolkit's event loop then forwards XDND client messages to
//! [`DropEngine::handle_client_message`], selection replies to
//! [`DropEngine::handle_selection_data`] and timer deadlines to
//! [`DropEngine::handle_timeout`]. Everything runs on the dispatch thread;
//! the engine never blocks and never talks to the display behind the
//! transport's back.
//!
//! Misbehaving sources are survived, not surfaced: malformed properties
//! degrade to absent data, refused selection requests leave absent payload
//! slots, and a source that goes silent for three seconds has its drag
//! cancelled by the engine's watchdog.

mod action;
mod atoms;
mod conn;
mod engine;
pub mod mock;
mod property;
mod session;
mod target;
pub mod uri;
mod view;
mod xdisplay;

pub use crate::action::{DragOperation, DragOperationItem};
pub use crate::atoms::Atoms;
pub use crate::conn::{PropertyError, XCallError, XConn};
pub use crate::engine::{DropEngine, SelectionTransfer, Timekeeper, XDND_VERSION};
pub use crate::property::{read_action_list, read_type_list};
pub use crate::session::State;
pub use crate::target::DropTarget;
pub use crate::view::{Point, Size, ViewId, ViewTree};
pub use crate::xdisplay::XDisplay;
