//! Whole-session protocol scenarios over the mock transport.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;

use x11rb::protocol::xproto::{ClientMessageEvent, Window};

use xdnd_dest::mock::{MockConn, MockSelection, MockTimer, SentMessage};
use xdnd_dest::{
    DragOperation, DragOperationItem, DropEngine, DropTarget, Point, Size, State, ViewId,
};

const TOP_WIN: Window = 0x0200_0001;
const SRC_WIN: Window = 0x0400_0002;

const ACCEPT: u32 = 1;
const WANT_POSITION_UPDATES: u32 = 2;

fn init_log() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

// ----- Destination double -----

#[derive(Default)]
struct Recorder {
    prepares: Cell<usize>,
    concludes: Cell<usize>,
    inspections: RefCell<Vec<Vec<Option<Vec<u8>>>>>,
    performs: RefCell<Vec<Perform>>,
}

struct Perform {
    payloads: Vec<Option<Vec<u8>>>,
    operations: Option<Vec<DragOperationItem>>,
    location: Point,
}

type RequiredFn = Box<dyn Fn(DragOperation, &[String]) -> Option<Vec<String>>>;
type AllowedFn = Box<dyn Fn(DragOperation, &[String]) -> DragOperation>;

struct TestTarget {
    rec: Rc<Recorder>,
    required: RequiredFn,
    allowed: AllowedFn,
    inspects: bool,
    inspect_verdict: bool,
}

impl TestTarget {
    /// A destination that wants `required` and answers every request with
    /// `op`.
    fn accepting(rec: Rc<Recorder>, required: &[&str], op: DragOperation) -> Rc<Self> {
        let required: Vec<String> = required.iter().map(|s| s.to_string()).collect();
        Rc::new(TestTarget {
            rec,
            required: Box::new(move |_, _| Some(required.clone())),
            allowed: Box::new(move |_, _| op),
            inspects: false,
            inspect_verdict: true,
        })
    }
}

impl DropTarget for TestTarget {
    fn required_data_types(
        &self,
        requested: DragOperation,
        source_types: &[String],
    ) -> Option<Vec<String>> {
        (self.required)(requested, source_types)
    }

    fn allowed_operation(
        &self,
        requested: DragOperation,
        source_types: &[String],
    ) -> DragOperation {
        (self.allowed)(requested, source_types)
    }

    fn prepare_for_drag_operation(&self) {
        self.rec.prepares.set(self.rec.prepares.get() + 1);
    }

    fn wants_data_inspection(&self) -> bool {
        self.inspects
    }

    fn inspect_drop_data(&self, payloads: &[Option<Vec<u8>>]) -> bool {
        self.rec.inspections.borrow_mut().push(payloads.to_vec());
        self.inspect_verdict
    }

    fn perform_drag_operation(
        &self,
        payloads: &[Option<Vec<u8>>],
        operations: Option<&[DragOperationItem]>,
        location: Point,
    ) {
        self.rec.performs.borrow_mut().push(Perform {
            payloads: payloads.to_vec(),
            operations: operations.map(<[DragOperationItem]>::to_vec),
            location,
        });
    }

    fn conclude_drag_operation(&self) {
        self.rec.concludes.set(self.rec.concludes.get() + 1);
    }
}

// ----- Session rig -----

struct Rig {
    conn: Rc<MockConn>,
    sel: MockSelection,
    timer: MockTimer,
    engine: DropEngine<MockConn, MockSelection, MockTimer>,
    top: ViewId,
}

fn rig() -> Rig {
    init_log();
    let conn = Rc::new(MockConn::new());
    let sel = MockSelection::new();
    let timer = MockTimer::new();
    let mut engine = DropEngine::new(conn.clone(), sel.clone(), timer.clone()).unwrap();
    let top = engine.views_mut().add_toplevel(Size::new(400, 300));
    engine.view_realized(top, TOP_WIN).unwrap();
    conn.place_window(TOP_WIN, (0, 0));
    conn.set_pointer((100, 100));
    Rig { conn, sel, timer, engine, top }
}

impl Rig {
    fn atom(&self, name: &str) -> u32 {
        self.conn.atom(name)
    }

    fn deliver(&mut self, message_type: &str, data: [u32; 5]) {
        let event = ClientMessageEvent::new(32, TOP_WIN, self.atom(message_type), data);
        self.engine.handle_client_message(self.top, &event);
    }

    fn send_enter(&mut self, types: &[&str], flags: u32) {
        self.send_enter_versioned(5, types, flags);
    }

    fn send_enter_versioned(&mut self, version: u32, types: &[&str], flags: u32) {
        let mut data = [SRC_WIN, (version << 24) | flags, 0, 0, 0];
        for (slot, ty) in data[2..5].iter_mut().zip(types) {
            *slot = self.conn.atom(ty);
        }
        self.deliver("XdndEnter", data);
    }

    fn send_position(&mut self, x: i16, y: i16, action: &str) {
        let packed = (u32::from(x as u16) << 16) | u32::from(y as u16);
        let data = [SRC_WIN, 0, packed, 0, self.atom(action)];
        self.deliver("XdndPosition", data);
    }

    fn send_drop(&mut self) {
        self.deliver("XdndDrop", [SRC_WIN, 0, 0, 0, 0]);
    }

    /// Delivers a selection payload and replays the selection-ready message
    /// the engine posts to itself.
    fn pump_selection(&mut self, data: Option<Vec<u8>>) {
        let selection = self.atom("XdndSelection");
        self.engine
            .handle_selection_data(selection, 0, 0, data);
        let ready = self
            .conn
            .take_sent()
            .into_iter()
            .find(|msg| msg.message_type == selection)
            .expect("selection-ready message posted");
        let event = ClientMessageEvent::new(32, ready.target, ready.message_type, ready.data);
        self.engine.handle_client_message(self.top, &event);
    }

    fn statuses(&self) -> Vec<SentMessage> {
        let status = self.atom("XdndStatus");
        self.conn
            .take_sent()
            .into_iter()
            .filter(|msg| msg.message_type == status)
            .collect()
    }
}

// ----- Scenarios -----

#[test]
fn happy_path_copy_without_inspection() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/uri-list"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(
        &["text/uri-list", "text/plain", "application/x-color"],
        0,
    );
    assert_eq!(rig.engine.current_state(), State::Idle);

    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rec.prepares.get(), 1);

    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    let status = &statuses[0];
    assert_eq!(status.target, SRC_WIN);
    assert_eq!(status.data[0], TOP_WIN);
    assert_eq!(status.data[1], ACCEPT);
    // The childless destination advertises its root-space rectangle.
    assert_eq!(status.data[2], 0);
    assert_eq!(status.data[3], (400 << 16) | 300);
    assert_eq!(status.data[4], rig.atom("XdndActionCopy"));

    rig.send_drop();
    assert_eq!(rig.engine.current_state(), State::WaitForDropData);
    let requests = rig.sel.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].requestor, TOP_WIN);
    assert_eq!(requests[0].selection, rig.atom("XdndSelection"));
    assert_eq!(requests[0].target, rig.atom("text/uri-list"));

    rig.pump_selection(Some(b"file:///a\n".to_vec()));
    assert_eq!(rig.engine.current_state(), State::Idle);

    let performs = rec.performs.borrow();
    assert_eq!(performs.len(), 1);
    assert_eq!(performs[0].payloads, vec![Some(b"file:///a\n".to_vec())]);
    assert!(performs[0].operations.is_none());
    assert_eq!(performs[0].location, Point::new(100, 100));
    assert_eq!(rec.concludes.get(), 1);

    let finished = rig.atom("XdndFinished");
    let sent = rig.conn.take_sent();
    assert!(sent
        .iter()
        .any(|msg| msg.message_type == finished
            && msg.target == SRC_WIN
            && msg.data == [TOP_WIN, 0, 0, 0, 0]));
    assert_eq!(rig.timer.armed(), 0);
}

#[test]
fn action_change_can_revoke_the_drop() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    // Supports copying, nothing else.
    let required = vec!["text/uri-list".to_string()];
    let target = Rc::new(TestTarget {
        rec: rec.clone(),
        required: Box::new(move |_, _| Some(required.clone())),
        allowed: Box::new(|requested, _| {
            if requested == DragOperation::Copy {
                DragOperation::Copy
            } else {
                DragOperation::None
            }
        }),
        inspects: false,
        inspect_verdict: true,
    });
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(&["text/uri-list"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rig.statuses()[0].data[1], ACCEPT);

    // The source switches to a move mid-drag.
    rig.send_position(100, 100, "XdndActionMove");
    assert_eq!(rig.engine.current_state(), State::DropNotAllowed);
    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].data[1] & ACCEPT, 0);
    assert_eq!(statuses[0].data[4], x11rb::NONE);
}

#[test]
fn silent_source_is_cancelled_by_the_watchdog() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rig.timer.armed(), 1);
    rig.statuses();

    rig.engine.handle_timeout();
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert_eq!(rig.timer.armed(), 0);
    assert_eq!(rec.concludes.get(), 1);
    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].data[1] & ACCEPT, 0);
    assert_eq!(statuses[0].data[4], x11rb::NONE);
}

#[test]
fn destination_view_change_restarts_negotiation() {
    let mut rig = rig();
    let rec_a = Rc::new(Recorder::default());
    let rec_b = Rc::new(Recorder::default());
    let a = rig
        .engine
        .views_mut()
        .add_child(rig.top, Point::new(0, 0), Size::new(100, 300));
    let b = rig
        .engine
        .views_mut()
        .add_child(rig.top, Point::new(200, 0), Size::new(200, 300));
    rig.engine.set_drop_target(
        a,
        TestTarget::accepting(rec_a.clone(), &["text/plain"], DragOperation::Copy),
    );
    rig.engine.set_drop_target(
        b,
        TestTarget::accepting(rec_b.clone(), &["text/plain"], DragOperation::Move),
    );

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(50, 50, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rec_a.prepares.get(), 1);
    let statuses = rig.statuses();
    assert_eq!(statuses[0].data[4], rig.atom("XdndActionCopy"));
    assert_eq!(statuses[0].data[2], 0);
    assert_eq!(statuses[0].data[3], (100 << 16) | 300);

    // The pointer moves on to the second child: the engine starts over
    // there and answers with that view's decision and rectangle.
    rig.send_position(250, 50, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rec_b.prepares.get(), 1);
    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].data[4], rig.atom("XdndActionMove"));
    assert_eq!(statuses[0].data[2], 200 << 16);
    assert_eq!(statuses[0].data[3], (200 << 16) | 300);
}

#[test]
fn destination_with_children_requests_every_position() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);
    // A child occupies the left edge; the query point lands in the gap, so
    // the top-level itself is the destination and cannot advertise a
    // meaningful rectangle.
    rig.engine
        .views_mut()
        .add_child(rig.top, Point::new(0, 0), Size::new(100, 300));

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(150, 50, "XdndActionCopy");

    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].data[1], ACCEPT | WANT_POSITION_UPDATES);
    assert_eq!(statuses[0].data[2], 0);
    assert_eq!(statuses[0].data[3], 0);
    assert_eq!(statuses[0].data[4], rig.atom("XdndActionCopy"));
}

#[test]
fn three_types_exhausted_falls_back_to_the_full_list() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = Rc::new(TestTarget {
        rec: rec.clone(),
        required: Box::new(|_, source_types| {
            source_types
                .iter()
                .any(|ty| ty == "text/csv")
                .then(|| vec!["text/csv".to_string()])
        }),
        allowed: Box::new(|_, _| DragOperation::Copy),
        inspects: false,
        inspect_verdict: true,
    });
    rig.engine.set_drop_target(rig.top, target);

    // The full list on the source window holds the type the three embedded
    // ones are missing.
    let type_list: Vec<u32> = ["image/png", "image/gif", "image/bmp", "text/csv"]
        .iter()
        .map(|ty| rig.conn.atom(ty))
        .collect();
    rig.conn.set_property32(
        SRC_WIN,
        rig.atom("XdndTypeList"),
        u32::from(x11rb::protocol::xproto::AtomEnum::ATOM),
        type_list,
    );

    rig.send_enter(&["image/png", "image/gif", "image/bmp"], 1);
    rig.send_position(100, 100, "XdndActionCopy");

    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    let statuses = rig.statuses();
    assert_eq!(statuses[0].data[1], ACCEPT);

    rig.send_drop();
    let requests = rig.sel.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, rig.atom("text/csv"));
}

#[test]
fn refused_selection_request_leaves_an_absent_payload() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(
        rec.clone(),
        &["text/uri-list", "text/plain"],
        DragOperation::Copy,
    );
    rig.engine.set_drop_target(rig.top, target);
    rig.sel.script(&[true, false]);

    rig.send_enter(&["text/uri-list", "text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    rig.statuses();

    rig.send_drop();
    assert_eq!(rig.engine.current_state(), State::WaitForDropData);

    // The first payload arrives; the second request is refused, so its slot
    // stays absent and the drop completes anyway.
    rig.pump_selection(Some(b"file:///a\n".to_vec()));
    assert_eq!(rig.engine.current_state(), State::Idle);

    let performs = rec.performs.borrow();
    assert_eq!(performs.len(), 1);
    assert_eq!(
        performs[0].payloads,
        vec![Some(b"file:///a\n".to_vec()), None]
    );

    let finished = rig.atom("XdndFinished");
    assert!(rig
        .conn
        .take_sent()
        .iter()
        .any(|msg| msg.message_type == finished));
}

// ----- Inspection -----

#[test]
fn inspection_fetches_payloads_before_the_drop() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let required = vec!["text/plain".to_string()];
    let target = Rc::new(TestTarget {
        rec: rec.clone(),
        required: Box::new(move |_, _| Some(required.clone())),
        allowed: Box::new(|_, _| DragOperation::Copy),
        inspects: true,
        inspect_verdict: true,
    });
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    // No status yet; the decision waits for the payload.
    assert_eq!(rig.engine.current_state(), State::InspectDropData);
    assert!(rig.statuses().is_empty());

    rig.pump_selection(Some(b"hello".to_vec()));
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rig.statuses()[0].data[1], ACCEPT);
    assert_eq!(
        *rec.inspections.borrow(),
        vec![vec![Some(b"hello".to_vec())]]
    );

    // The payloads were cached by the inspection; the drop reuses them.
    rig.send_drop();
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert_eq!(rig.sel.requests().len(), 1);
    let performs = rec.performs.borrow();
    assert_eq!(performs[0].payloads, vec![Some(b"hello".to_vec())]);
}

#[test]
fn failed_inspection_refuses_the_drop() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let required = vec!["text/plain".to_string()];
    let target = Rc::new(TestTarget {
        rec: rec.clone(),
        required: Box::new(move |_, _| Some(required.clone())),
        allowed: Box::new(|_, _| DragOperation::Copy),
        inspects: true,
        inspect_verdict: false,
    });
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    rig.pump_selection(Some(b"garbage".to_vec()));

    assert_eq!(rig.engine.current_state(), State::DropNotAllowed);
    let statuses = rig.statuses();
    assert_eq!(statuses.last().unwrap().data[1] & ACCEPT, 0);
}

// ----- Ordering edge cases -----

#[test]
fn position_before_enter_waits_for_the_types() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);

    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::WaitEnter);
    assert_eq!(rec.prepares.get(), 1);
    assert!(rig.statuses().is_empty());

    rig.send_enter(&["text/plain"], 0);
    assert_eq!(rig.engine.current_state(), State::DropAllowed);
    assert_eq!(rig.statuses()[0].data[1], ACCEPT);
}

#[test]
fn unregistered_view_is_refused_but_the_drag_continues() {
    let mut rig = rig();

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::Idle);
    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].data[1] & ACCEPT, 0);
    assert_eq!(statuses[0].data[4], x11rb::NONE);
}

#[test]
fn old_protocol_versions_are_refused_on_enter() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter_versioned(2, &["text/plain"], 0);
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert_eq!(rec.concludes.get(), 1);
    let statuses = rig.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].data[4], x11rb::NONE);
}

#[test]
fn failed_status_send_abandons_the_session() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);
    rig.conn.fail_sends(true);

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert_eq!(rig.timer.armed(), 0);
}

// ----- Invariants -----

#[test]
fn drop_with_no_drag_in_progress_is_ignored() {
    let mut rig = rig();
    rig.send_drop();
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert!(rig.conn.take_sent().is_empty());
}

#[test]
fn clear_is_idempotent() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Copy);
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionCopy");
    assert_eq!(rig.timer.armed(), 1);

    rig.engine.clear();
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert_eq!(rig.timer.armed(), 0);

    rig.engine.clear();
    assert_eq!(rig.engine.current_state(), State::Idle);
    assert_eq!(rig.timer.armed(), 0);
}

#[test]
fn at_most_one_watchdog_is_ever_armed() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(
        rec.clone(),
        &["text/uri-list", "text/plain"],
        DragOperation::Copy,
    );
    rig.engine.set_drop_target(rig.top, target);

    rig.send_enter(&["text/uri-list", "text/plain"], 0);
    assert!(rig.timer.armed() <= 1);
    rig.send_position(100, 100, "XdndActionCopy");
    assert!(rig.timer.armed() <= 1);
    rig.send_position(100, 100, "XdndActionCopy");
    assert!(rig.timer.armed() <= 1);
    rig.send_drop();
    assert!(rig.timer.armed() <= 1);
    rig.pump_selection(Some(b"file:///a\n".to_vec()));
    assert!(rig.timer.armed() <= 1);
    rig.pump_selection(Some(b"a".to_vec()));
    assert_eq!(rig.timer.armed(), 0);
    assert!(rig.timer.scheduled_total() >= 3);
}

#[test]
fn awareness_property_is_written_exactly_once() {
    let mut rig = rig();
    let a = rig
        .engine
        .views_mut()
        .add_child(rig.top, Point::new(0, 0), Size::new(100, 100));
    let b = rig
        .engine
        .views_mut()
        .add_child(rig.top, Point::new(100, 0), Size::new(100, 100));

    rig.engine
        .register_dragged_types(a, &["text/plain"])
        .unwrap();
    rig.engine
        .register_dragged_types(b, &["text/uri-list"])
        .unwrap();

    let aware = rig.atom("XdndAware");
    let writes: Vec<_> = rig
        .conn
        .property_writes()
        .into_iter()
        .filter(|write| write.property == aware)
        .collect();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].window, TOP_WIN);
    assert_eq!(writes[0].data, vec![xdnd_dest::XDND_VERSION]);
}

#[test]
fn awareness_write_waits_for_realization() {
    init_log();
    let conn = Rc::new(MockConn::new());
    let mut engine =
        DropEngine::new(conn.clone(), MockSelection::new(), MockTimer::new()).unwrap();
    let top = engine.views_mut().add_toplevel(Size::new(100, 100));

    engine.register_dragged_types(top, &["text/plain"]).unwrap();
    let aware = conn.atom("XdndAware");
    assert!(conn
        .property_writes()
        .iter()
        .all(|write| write.property != aware));

    engine.view_realized(top, TOP_WIN).unwrap();
    let writes: Vec<_> = conn
        .property_writes()
        .into_iter()
        .filter(|write| write.property == aware)
        .collect();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].window, TOP_WIN);
}

#[test]
fn accepted_types_can_be_unregistered() {
    let mut rig = rig();
    rig.engine
        .register_dragged_types(rig.top, &["text/plain"])
        .unwrap();
    assert!(rig.engine.views().droppable_types(rig.top).is_some());
    rig.engine.unregister_dragged_types(rig.top);
    assert!(rig.engine.views().droppable_types(rig.top).is_none());
}

#[test]
fn ask_drops_carry_the_source_operation_list() {
    let mut rig = rig();
    let rec = Rc::new(Recorder::default());
    let target = TestTarget::accepting(rec.clone(), &["text/plain"], DragOperation::Ask);
    rig.engine.set_drop_target(rig.top, target);

    let atom_type = u32::from(x11rb::protocol::xproto::AtomEnum::ATOM);
    let string_type = u32::from(x11rb::protocol::xproto::AtomEnum::STRING);
    let actions = vec![rig.atom("XdndActionCopy"), rig.atom("XdndActionMove")];
    rig.conn
        .set_property32(SRC_WIN, rig.atom("XdndActionList"), atom_type, actions);
    rig.conn.set_property8(
        SRC_WIN,
        rig.atom("XdndActionDescription"),
        string_type,
        b"Copy the file\0Move the file\0".to_vec(),
    );

    rig.send_enter(&["text/plain"], 0);
    rig.send_position(100, 100, "XdndActionAsk");
    rig.statuses();
    rig.send_drop();
    rig.pump_selection(Some(b"hello".to_vec()));

    let performs = rec.performs.borrow();
    assert_eq!(performs.len(), 1);
    let operations = performs[0].operations.as_ref().expect("operation list");
    assert_eq!(operations.len(), 2);
    assert_eq!(operations[0].operation, DragOperation::Copy);
    assert_eq!(operations[0].description, "Copy the file");
    assert_eq!(operations[1].operation, DragOperation::Move);
    assert_eq!(operations[1].description, "Move the file");
}
