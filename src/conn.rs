//! Transport abstraction over the X server.
//!
//! The engine never talks to a display directly; everything it needs from
//! the server goes through [`XConn`]. [`crate::XDisplay`] implements the
//! trait for real x11rb connections, [`crate::mock::MockConn`] implements it
//! for tests.

use std::error::Error;
use std::fmt;

use x11rb::protocol::xproto::{Atom, Window};

/// Errors from typed window-property reads.
#[derive(Debug, Clone)]
pub enum PropertyError {
    /// The request itself failed.
    Connection(String),
    /// The property exists but has a different type; carries the actual type.
    TypeMismatch(Atom),
    /// The property exists but has a different format; carries the actual format.
    FormatMismatch(u8),
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyError::Connection(err) => write!(f, "connection error: {err}"),
            PropertyError::TypeMismatch(actual) => write!(f, "type mismatch: {actual}"),
            PropertyError::FormatMismatch(actual) => write!(f, "format mismatch: {actual}"),
        }
    }
}

impl Error for PropertyError {}

/// A failed request that is not a property read: atom interning, client
/// message sends, coordinate translation.
#[derive(Debug, Clone)]
pub struct XCallError(String);

impl XCallError {
    pub fn new(message: impl Into<String>) -> Self {
        XCallError(message.into())
    }
}

impl fmt::Display for XCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for XCallError {}

/// The server operations the drop engine depends on.
///
/// Property reads validate type and format and report mismatches as errors;
/// callers treat every error as absent data. Client messages are the 5-word,
/// format-32 kind used by XDND. Coordinate translation is always against the
/// root window of the screen the implementation was created for.
pub trait XConn {
    fn intern_atom(&self, name: &str) -> Result<Atom, XCallError>;

    fn atom_name(&self, atom: Atom) -> Result<String, XCallError>;

    fn get_property32(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<u32>, PropertyError>;

    fn get_property8(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<u8>, PropertyError>;

    fn change_property32(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
        data: &[u32],
    ) -> Result<(), XCallError>;

    fn send_client_message(
        &self,
        target: Window,
        message_type: Atom,
        data: [u32; 5],
    ) -> Result<(), XCallError>;

    fn translate_from_root(
        &self,
        window: Window,
        root_x: i16,
        root_y: i16,
    ) -> Result<(i16, i16), XCallError>;

    fn translate_to_root(&self, window: Window, x: i16, y: i16)
        -> Result<(i16, i16), XCallError>;

    /// Pointer position relative to `window`'s origin.
    fn pointer_position(&self, window: Window) -> Result<(i16, i16), XCallError>;
}
