//! Readers for the window properties a drag source publishes.
//!
//! Everything here degrades to absent data: a malformed or missing property
//! is logged and reported as an empty list or `None`, never as an error the
//! caller has to handle. A misbehaving source must not be able to abort a
//! drag with a bad property.

use tracing::warn;
use x11rb::protocol::xproto::{AtomEnum, Window};

use crate::action::{DragOperation, DragOperationItem};
use crate::atoms::Atoms;
use crate::conn::XConn;

/// Reads the source's full advertised type list (the `XdndTypeList`
/// property) and resolves each atom to its MIME-type name.
///
/// Returns an empty list on any fault.
pub fn read_type_list<X: XConn>(conn: &X, atoms: &Atoms, source: Window) -> Vec<String> {
    let type_atoms =
        match conn.get_property32(source, atoms.type_list, AtomEnum::ATOM.into()) {
            Ok(type_atoms) => type_atoms,
            Err(err) => {
                warn!("cannot read type list: {err}");
                return Vec::new();
            },
        };

    resolve_type_names(conn, &type_atoms)
}

/// Reads the source's advertised actions: the `XdndActionList` atom array
/// zipped with the null-separated `XdndActionDescription` string.
///
/// Returns `None` on any fault, including the two properties disagreeing in
/// length.
pub fn read_action_list<X: XConn>(
    conn: &X,
    atoms: &Atoms,
    source: Window,
) -> Option<Vec<DragOperationItem>> {
    let actions = match conn.get_property32(source, atoms.action_list, AtomEnum::ATOM.into()) {
        Ok(actions) if !actions.is_empty() => actions,
        Ok(_) => {
            warn!("cannot read action list: empty property");
            return None;
        },
        Err(err) => {
            warn!("cannot read action list: {err}");
            return None;
        },
    };

    let bytes = match conn.get_property8(source, atoms.action_description, AtomEnum::STRING.into())
    {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            warn!("cannot read action description list: empty property");
            return None;
        },
        Err(err) => {
            warn!("cannot read action description list: {err}");
            return None;
        },
    };

    let mut descriptions: Vec<&[u8]> = bytes.split(|&b| b == 0).collect();
    if descriptions.last() == Some(&&[][..]) {
        descriptions.pop();
    }

    if descriptions.len() != actions.len() {
        warn!(
            "action list and description list disagree: {} actions, {} descriptions",
            actions.len(),
            descriptions.len()
        );
        return None;
    }

    Some(
        actions
            .iter()
            .zip(descriptions)
            .map(|(&action, description)| DragOperationItem {
                operation: DragOperation::from_action(action, atoms),
                description: String::from_utf8_lossy(description).into_owned(),
            })
            .collect(),
    )
}

/// Extracts the up-to-three type atoms embedded in words 2..4 of an
/// `XdndEnter` message, skipping `None` entries.
pub(crate) fn decode_three_types<X: XConn>(conn: &X, data: &[u32; 5]) -> Vec<String> {
    resolve_type_names(conn, &data[2..5])
}

fn resolve_type_names<X: XConn>(conn: &X, type_atoms: &[u32]) -> Vec<String> {
    let mut names = Vec::with_capacity(type_atoms.len());
    for &atom in type_atoms {
        if atom == x11rb::NONE {
            continue;
        }
        match conn.atom_name(atom) {
            Ok(name) => names.push(name),
            Err(err) => warn!("cannot resolve type atom {atom}: {err}"),
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use x11rb::protocol::xproto::AtomEnum;

    use super::*;
    use crate::mock::MockConn;

    const SOURCE: Window = 0x600;

    fn setup() -> (Rc<MockConn>, Atoms) {
        let conn = Rc::new(MockConn::new());
        let atoms = Atoms::intern(conn.as_ref()).unwrap();
        (conn, atoms)
    }

    #[test]
    fn type_list_resolves_names() {
        let (conn, atoms) = setup();
        let uri = conn.atom("text/uri-list");
        let plain = conn.atom("text/plain");
        conn.set_property32(SOURCE, atoms.type_list, AtomEnum::ATOM.into(), vec![uri, plain]);

        let types = read_type_list(conn.as_ref(), &atoms, SOURCE);
        assert_eq!(types, vec!["text/uri-list", "text/plain"]);
    }

    #[test]
    fn missing_type_list_is_empty() {
        let (conn, atoms) = setup();
        assert!(read_type_list(conn.as_ref(), &atoms, SOURCE).is_empty());
    }

    #[test]
    fn wrongly_typed_type_list_is_empty() {
        let (conn, atoms) = setup();
        conn.set_property32(SOURCE, atoms.type_list, AtomEnum::CARDINAL.into(), vec![1, 2]);
        assert!(read_type_list(conn.as_ref(), &atoms, SOURCE).is_empty());
    }

    #[test]
    fn action_list_pairs_up() {
        let (conn, atoms) = setup();
        conn.set_property32(
            SOURCE,
            atoms.action_list,
            AtomEnum::ATOM.into(),
            vec![atoms.action_copy, atoms.action_move],
        );
        conn.set_property8(
            SOURCE,
            atoms.action_description,
            AtomEnum::STRING.into(),
            b"copy it\0move it\0".to_vec(),
        );

        let items = read_action_list(conn.as_ref(), &atoms, SOURCE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].operation, DragOperation::Copy);
        assert_eq!(items[0].description, "copy it");
        assert_eq!(items[1].operation, DragOperation::Move);
        assert_eq!(items[1].description, "move it");
    }

    #[test]
    fn action_list_length_disagreement_is_absent() {
        let (conn, atoms) = setup();
        conn.set_property32(
            SOURCE,
            atoms.action_list,
            AtomEnum::ATOM.into(),
            vec![atoms.action_copy, atoms.action_move],
        );
        conn.set_property8(
            SOURCE,
            atoms.action_description,
            AtomEnum::STRING.into(),
            b"copy it\0".to_vec(),
        );

        assert!(read_action_list(conn.as_ref(), &atoms, SOURCE).is_none());
    }

    #[test]
    fn three_types_skip_none_words() {
        let (conn, _) = setup();
        let uri = conn.atom("text/uri-list");
        let data = [0x700, 5 << 24, uri, x11rb::NONE, x11rb::NONE];
        assert_eq!(decode_three_types(conn.as_ref(), &data), vec!["text/uri-list"]);
    }
}
