//! The view model the engine hit-tests and registers destinations against.
//!
//! A toolkit embedding the engine mirrors its widget hierarchy into a
//! [`ViewTree`]: per view an origin relative to its parent, a size, a mapped
//! flag and the declared child order. Only realized top-levels carry an X
//! window; geometry below the top-level is resolved from the stored origins,
//! so one root-to-top-level translation is all the hit test asks the server
//! for.

use std::rc::Rc;

use x11rb::protocol::xproto::{Atom, Window};

use crate::conn::{XCallError, XConn};
use crate::target::DropTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub fn new(x: i16, y: i16) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub fn new(width: u16, height: u16) -> Self {
        Size { width, height }
    }
}

struct View {
    parent: Option<ViewId>,
    children: Vec<ViewId>,
    origin: Point,
    size: Size,
    mapped: bool,
    window: Option<Window>,
    xdnd_hint_set: bool,
    aware_pending: bool,
    droppable_types: Option<Vec<Atom>>,
    target: Option<Rc<dyn DropTarget>>,
}

impl View {
    fn new(parent: Option<ViewId>, origin: Point, size: Size) -> Self {
        View {
            parent,
            children: Vec::new(),
            origin,
            size,
            mapped: true,
            window: None,
            xdnd_hint_set: false,
            aware_pending: false,
            droppable_types: None,
            target: None,
        }
    }
}

/// An arena of views. Views are never removed; a toolkit tearing down a
/// window drops the whole tree with the engine.
#[derive(Default)]
pub struct ViewTree {
    views: Vec<View>,
}

impl ViewTree {
    pub fn new() -> Self {
        ViewTree { views: Vec::new() }
    }

    pub fn add_toplevel(&mut self, size: Size) -> ViewId {
        let id = ViewId(self.views.len());
        self.views.push(View::new(None, Point::default(), size));
        id
    }

    pub fn add_child(&mut self, parent: ViewId, origin: Point, size: Size) -> ViewId {
        let id = ViewId(self.views.len());
        self.views.push(View::new(Some(parent), origin, size));
        self.views[parent.0].children.push(id);
        id
    }

    pub fn set_mapped(&mut self, view: ViewId, mapped: bool) {
        self.views[view.0].mapped = mapped;
    }

    /// Attaches the X window of a realized view. Only top-levels need one.
    pub fn realize(&mut self, view: ViewId, window: Window) {
        self.views[view.0].window = Some(window);
    }

    pub fn toplevel_of(&self, view: ViewId) -> ViewId {
        let mut current = view;
        while let Some(parent) = self.views[current.0].parent {
            current = parent;
        }
        current
    }

    /// The X window of `view`'s nearest realized ancestor-or-self.
    pub fn window_of(&self, view: ViewId) -> Option<Window> {
        let mut current = Some(view);
        while let Some(id) = current {
            if let Some(window) = self.views[id.0].window {
                return Some(window);
            }
            current = self.views[id.0].parent;
        }
        None
    }

    pub fn size(&self, view: ViewId) -> Size {
        self.views[view.0].size
    }

    pub fn has_children(&self, view: ViewId) -> bool {
        !self.views[view.0].children.is_empty()
    }

    /// `view`'s origin in its top-level's coordinate space.
    pub fn origin_in_toplevel(&self, view: ViewId) -> Point {
        let mut x = 0i32;
        let mut y = 0i32;
        let mut current = view;
        loop {
            let v = &self.views[current.0];
            x += i32::from(v.origin.x);
            y += i32::from(v.origin.y);
            match v.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Point::new(x as i16, y as i16)
    }

    /// Finds the drop destination under a root-space point: translates the
    /// point into `toplevel` through the server, then walks the stored
    /// geometry.
    pub fn find_destination<X: XConn>(
        &self,
        conn: &X,
        toplevel: ViewId,
        root_x: i16,
        root_y: i16,
    ) -> Result<ViewId, XCallError> {
        let window = self
            .window_of(toplevel)
            .ok_or_else(|| XCallError::new("top-level view is not realized"))?;
        let (x, y) = conn.translate_from_root(window, root_x, root_y)?;
        Ok(self.descend(toplevel, x, y))
    }

    /// Deepest mapped descendant containing `(x, y)` (coordinates relative
    /// to `view`). Children are scanned in declared order and rectangle
    /// edges are inclusive, so overlapping siblings resolve to the first
    /// declared, the same way every time.
    pub(crate) fn descend(&self, view: ViewId, x: i16, y: i16) -> ViewId {
        let v = &self.views[view.0];
        for &child_id in &v.children {
            let child = &self.views[child_id.0];
            if !child.mapped {
                continue;
            }
            let (cx, cy) = (i32::from(child.origin.x), i32::from(child.origin.y));
            let (cw, ch) = (i32::from(child.size.width), i32::from(child.size.height));
            let (px, py) = (i32::from(x), i32::from(y));
            if px < cx || px > cx + cw || py < cy || py > cy + ch {
                continue;
            }
            return self.descend(child_id, x - child.origin.x, y - child.origin.y);
        }
        view
    }

    pub(crate) fn is_registered(&self, view: ViewId) -> bool {
        self.views[view.0].target.is_some()
    }

    pub(crate) fn target(&self, view: ViewId) -> Option<Rc<dyn DropTarget>> {
        self.views[view.0].target.clone()
    }

    pub(crate) fn set_target(&mut self, view: ViewId, target: Option<Rc<dyn DropTarget>>) {
        self.views[view.0].target = target;
    }

    /// MIME types this view accepts, as atoms, if it was registered.
    pub fn droppable_types(&self, view: ViewId) -> Option<&[Atom]> {
        self.views[view.0].droppable_types.as_deref()
    }

    pub(crate) fn set_droppable_types(&mut self, view: ViewId, types: Option<Vec<Atom>>) {
        self.views[view.0].droppable_types = types;
    }

    pub(crate) fn xdnd_hint_set(&self, view: ViewId) -> bool {
        self.views[view.0].xdnd_hint_set
    }

    pub(crate) fn set_xdnd_hint(&mut self, view: ViewId) {
        self.views[view.0].xdnd_hint_set = true;
    }

    pub(crate) fn aware_pending(&self, view: ViewId) -> bool {
        self.views[view.0].aware_pending
    }

    pub(crate) fn set_aware_pending(&mut self, view: ViewId, pending: bool) {
        self.views[view.0].aware_pending = pending;
    }
}
