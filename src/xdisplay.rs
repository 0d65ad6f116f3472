//! The real transport: [`XConn`] over an x11rb connection.

use std::mem;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use tracing::warn;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, ClientMessageEvent, ConnectionExt as _, EventMask, PropMode, Timestamp, Window,
};
use x11rb::wrapper::ConnectionExt as _;

use crate::conn::{PropertyError, XCallError, XConn};
use crate::engine::SelectionTransfer;

// Number of 32-bit words to retrieve per roundtrip of the property fetch.
const PROPERTY_CHUNK: u32 = 1024;

/// An x11rb connection plus the root window it translates coordinates
/// against.
pub struct XDisplay<C: Connection> {
    conn: C,
    root: Window,
}

impl<C: Connection> XDisplay<C> {
    /// Wraps `conn`, resolving the root window of `screen`.
    pub fn new(conn: C, screen: usize) -> Self {
        let root = conn.setup().roots[screen].root;
        XDisplay { conn, root }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn root_window(&self) -> Window {
        self.root
    }

    /// Fetches a whole property in `PROPERTY_CHUNK`-word windows, validating
    /// type and format against `T`.
    fn get_property<T: Pod + Zeroable>(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<T>, PropertyError> {
        let format = match mem::size_of::<T>() {
            1 => 8,
            2 => 16,
            4 => 32,
            _ => unreachable!(),
        };

        let mut data: Vec<T> = Vec::new();
        let mut offset = 0;
        loop {
            let reply = self
                .conn
                .get_property(false, window, property, property_type, offset, PROPERTY_CHUNK)
                .map_err(connection_error)?
                .reply()
                .map_err(connection_error)?;

            if reply.type_ != property_type {
                return Err(PropertyError::TypeMismatch(reply.type_));
            }
            if reply.format != format {
                return Err(PropertyError::FormatMismatch(reply.format));
            }

            // The reply buffer is byte-aligned; copy through a resized tail
            // so `T`-alignment holds.
            let old_len = data.len();
            let added = reply.value.len() / mem::size_of::<T>();
            data.resize(old_len + added, T::zeroed());
            bytemuck::cast_slice_mut::<T, u8>(&mut data[old_len..])
                .copy_from_slice(&reply.value);

            if reply.bytes_after == 0 {
                return Ok(data);
            }
            offset += PROPERTY_CHUNK;
        }
    }
}

fn connection_error(err: impl std::fmt::Display) -> PropertyError {
    PropertyError::Connection(err.to_string())
}

fn call_error(err: impl std::fmt::Display) -> XCallError {
    XCallError::new(err.to_string())
}

impl<C: Connection> XConn for XDisplay<C> {
    fn intern_atom(&self, name: &str) -> Result<Atom, XCallError> {
        Ok(self
            .conn
            .intern_atom(false, name.as_bytes())
            .map_err(call_error)?
            .reply()
            .map_err(call_error)?
            .atom)
    }

    fn atom_name(&self, atom: Atom) -> Result<String, XCallError> {
        let reply = self
            .conn
            .get_atom_name(atom)
            .map_err(call_error)?
            .reply()
            .map_err(call_error)?;
        String::from_utf8(reply.name)
            .map_err(|_| XCallError::new(format!("atom {atom} has a non-UTF-8 name")))
    }

    fn get_property32(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<u32>, PropertyError> {
        self.get_property::<u32>(window, property, property_type)
    }

    fn get_property8(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
    ) -> Result<Vec<u8>, PropertyError> {
        self.get_property::<u8>(window, property, property_type)
    }

    fn change_property32(
        &self,
        window: Window,
        property: Atom,
        property_type: Atom,
        data: &[u32],
    ) -> Result<(), XCallError> {
        self.conn
            .change_property32(PropMode::REPLACE, window, property, property_type, data)
            .map_err(call_error)?;
        self.conn.flush().map_err(call_error)
    }

    fn send_client_message(
        &self,
        target: Window,
        message_type: Atom,
        data: [u32; 5],
    ) -> Result<(), XCallError> {
        let event = ClientMessageEvent::new(32, target, message_type, data);
        self.conn
            .send_event(false, target, EventMask::NO_EVENT, event)
            .map_err(call_error)?;
        self.conn.flush().map_err(call_error)
    }

    fn translate_from_root(
        &self,
        window: Window,
        root_x: i16,
        root_y: i16,
    ) -> Result<(i16, i16), XCallError> {
        let reply = self
            .conn
            .translate_coordinates(self.root, window, root_x, root_y)
            .map_err(call_error)?
            .reply()
            .map_err(call_error)?;
        Ok((reply.dst_x, reply.dst_y))
    }

    fn translate_to_root(
        &self,
        window: Window,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), XCallError> {
        let reply = self
            .conn
            .translate_coordinates(window, self.root, x, y)
            .map_err(call_error)?
            .reply()
            .map_err(call_error)?;
        Ok((reply.dst_x, reply.dst_y))
    }

    fn pointer_position(&self, window: Window) -> Result<(i16, i16), XCallError> {
        let reply = self
            .conn
            .query_pointer(window)
            .map_err(call_error)?
            .reply()
            .map_err(call_error)?;
        Ok((reply.win_x, reply.win_y))
    }
}

/// Selection requests as `ConvertSelection`, with the converted data stored
/// into the selection atom itself on the requestor, the way XDND sources
/// expect. The embedder reads that property when `SelectionNotify` arrives
/// and hands the bytes to the engine.
impl<C: Connection> SelectionTransfer for Rc<XDisplay<C>> {
    fn request(
        &mut self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        time: Timestamp,
    ) -> bool {
        let issued = self
            .conn
            .convert_selection(requestor, selection, target, selection, time)
            .and_then(|_| self.conn.flush());
        match issued {
            Ok(()) => true,
            Err(err) => {
                warn!("cannot issue selection conversion: {err}");
                false
            },
        }
    }
}
