//! Atom management.

use x11rb::protocol::xproto::Atom;

use crate::conn::{XCallError, XConn};

/// The atoms the XDND destination side needs, interned once per engine.
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub aware: Atom,
    pub enter: Atom,
    pub leave: Atom,
    pub position: Atom,
    pub status: Atom,
    pub drop: Atom,
    pub finished: Atom,
    pub selection: Atom,
    pub type_list: Atom,
    pub action_list: Atom,
    pub action_description: Atom,
    pub action_copy: Atom,
    pub action_move: Atom,
    pub action_link: Atom,
    pub action_ask: Atom,
    pub action_private: Atom,
}

impl Atoms {
    pub fn intern<X: XConn>(conn: &X) -> Result<Self, XCallError> {
        Ok(Atoms {
            aware: conn.intern_atom("XdndAware")?,
            enter: conn.intern_atom("XdndEnter")?,
            leave: conn.intern_atom("XdndLeave")?,
            position: conn.intern_atom("XdndPosition")?,
            status: conn.intern_atom("XdndStatus")?,
            drop: conn.intern_atom("XdndDrop")?,
            finished: conn.intern_atom("XdndFinished")?,
            selection: conn.intern_atom("XdndSelection")?,
            type_list: conn.intern_atom("XdndTypeList")?,
            action_list: conn.intern_atom("XdndActionList")?,
            action_description: conn.intern_atom("XdndActionDescription")?,
            action_copy: conn.intern_atom("XdndActionCopy")?,
            action_move: conn.intern_atom("XdndActionMove")?,
            action_link: conn.intern_atom("XdndActionLink")?,
            action_ask: conn.intern_atom("XdndActionAsk")?,
            action_private: conn.intern_atom("XdndActionPrivate")?,
        })
    }
}
