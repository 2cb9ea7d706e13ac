#![allow(clippy::float_cmp)]

use std::collections::HashSet;
use std::time::Duration;

use canvas::camera::Point;
use canvas::doc::{ConnectionStyle, NoteColor, NoteId, NotePatch};
use canvas::input::{Button, Modifiers};
use tokio::time::timeout;
use uuid::Uuid;

use super::*;
use crate::error::{NoticeKind, PortError};
use crate::ports::SnapshotStream;
use crate::services::memory::{MemoryBackend, MemoryCollection, MemoryIdentity, MemoryUploader};

const WAIT: Duration = Duration::from_secs(2);
const MAX_EVENTS: usize = 500;

// =============================================================================
// harness
// =============================================================================

struct Harness {
    backend: MemoryBackend,
    identity: MemoryIdentity,
    bridge: SyncBridge,
    core: EngineCore,
}

fn owner(name: &str) -> OwnerId {
    OwnerId::new(name)
}

fn start(backend: MemoryBackend, signed_in: Option<&str>, config: SyncConfig) -> Harness {
    let identity = MemoryIdentity::new(signed_in.map(owner));
    let bridge = SyncBridge::start(backend.ports(), identity.receiver(), config);
    let mut core = EngineCore::new();
    core.set_viewport(1000.0, 800.0);
    Harness { backend, identity, bridge, core }
}

fn harness(signed_in: Option<&str>) -> Harness {
    start(MemoryBackend::new(), signed_in, SyncConfig::default())
}

/// Receive and apply one event.
async fn step(h: &mut Harness) -> Option<Notice> {
    let event = timeout(WAIT, h.bridge.recv()).await.expect("event within timeout").expect("bridge open");
    h.bridge.apply(&mut h.core, event)
}

/// Apply events until `done` holds, collecting notices on the way.
async fn pump_until(h: &mut Harness, done: impl Fn(&Harness) -> bool) -> Vec<Notice> {
    let mut notices = Vec::new();
    for _ in 0..MAX_EVENTS {
        if done(h) {
            return notices;
        }
        notices.extend(step(h).await);
    }
    panic!("condition not reached after {MAX_EVENTS} events");
}

/// Apply events until one produces a notice.
async fn next_notice(h: &mut Harness) -> Notice {
    for _ in 0..MAX_EVENTS {
        if let Some(notice) = step(h).await {
            return notice;
        }
    }
    panic!("no notice after {MAX_EVENTS} events");
}

/// Apply events until `who` is the owner and their first snapshot of every kind has landed.
async fn settle(h: &mut Harness, who: &OwnerId) {
    let mut seen = HashSet::new();
    while h.bridge.owner() != Some(who) || seen.len() < 4 {
        let event = timeout(WAIT, h.bridge.recv()).await.expect("event within timeout").expect("bridge open");
        if let Inbound::Snapshot { owner, snapshot } = &event {
            if owner == who {
                seen.insert(snapshot.kind());
            }
        }
        h.bridge.apply(&mut h.core, event);
    }
}

async fn signed_in(name: &str) -> Harness {
    let mut h = harness(Some(name));
    settle(&mut h, &owner(name)).await;
    h
}

fn add_note(h: &mut Harness) -> NoteId {
    let actions = h.core.add_note(NoteColor::Yellow);
    assert_eq!(h.bridge.submit(&actions), 1);
    h.core.doc.notes().last().expect("note added").id
}

fn header_of(h: &Harness, id: &NoteId) -> Point {
    let note = h.core.note(id).expect("note");
    h.core.camera.world_to_screen(Point::new(note.x + note.width / 2.0, note.y + 14.0))
}

fn body_of(h: &Harness, id: &NoteId) -> Point {
    let note = h.core.note(id).expect("note");
    h.core.camera.world_to_screen(Point::new(note.x + 20.0, note.y + note.height / 2.0))
}

fn click(h: &mut Harness, at: Point) {
    let mods = Modifiers::default();
    let mut actions = h.core.on_pointer_down(at, Button::Primary, mods);
    actions.extend(h.core.on_pointer_up(at, Button::Primary, mods));
    h.bridge.submit(&actions);
}

/// Drag a note sideways by its header and submit the resulting write.
fn drag_by(h: &mut Harness, id: &NoteId, dx: f64) {
    let start = header_of(h, id);
    let to = Point::new(start.x + dx, start.y);
    let mods = Modifiers::default();
    let mut actions = h.core.on_pointer_down(start, Button::Primary, mods);
    actions.extend(h.core.on_pointer_move(to, mods));
    actions.extend(h.core.on_pointer_up(to, Button::Primary, mods));
    assert_eq!(h.bridge.submit(&actions), 1);
}

/// Note port whose updates to one record never complete.
struct StuckUpdates {
    inner: Arc<MemoryCollection<Note>>,
    stuck: Uuid,
}

#[async_trait::async_trait]
impl CollectionPort<Note> for StuckUpdates {
    async fn subscribe(&self, owner: &OwnerId) -> Result<SnapshotStream<Note>, PortError> {
        self.inner.subscribe(owner).await
    }

    async fn create(&self, owner: &OwnerId, record: Note) -> Result<Uuid, PortError> {
        self.inner.create(owner, record).await
    }

    async fn update(&self, id: Uuid, patch: NotePatch) -> Result<(), PortError> {
        if id == self.stuck {
            std::future::pending::<()>().await;
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), PortError> {
        self.inner.delete(id).await
    }
}

// =============================================================================
// identity gating
// =============================================================================

#[tokio::test]
async fn first_event_announces_current_owner() {
    let mut h = harness(Some("coach"));
    let event = timeout(WAIT, h.bridge.recv()).await.expect("event").expect("open");
    assert_eq!(event, Inbound::OwnerChanged(Some(owner("coach"))));
}

#[tokio::test]
async fn writes_before_sign_in_are_dropped() {
    let mut h = harness(None);
    step(&mut h).await;
    assert_eq!(h.bridge.owner(), None);

    let actions = h.core.add_note(NoteColor::Pink);
    assert_eq!(h.bridge.submit(&actions), 0);
    assert_eq!(h.backend.notes.write_count(), 0);
}

#[tokio::test]
async fn view_only_actions_are_not_written() {
    let h = signed_in("coach").await;
    assert_eq!(h.bridge.submit(&[Action::RenderNeeded, Action::SetCursor("grab".into())]), 0);
}

#[tokio::test]
async fn sign_out_clears_board_and_gates_writes() {
    let mut h = signed_in("coach").await;
    add_note(&mut h);
    h.identity.sign_out();
    pump_until(&mut h, |h| h.bridge.owner().is_none()).await;

    assert!(h.core.doc.is_empty());
    let actions = h.core.add_note(NoteColor::Blue);
    assert_eq!(h.bridge.submit(&actions), 0);
}

// =============================================================================
// outbound writes
// =============================================================================

#[tokio::test]
async fn local_note_is_persisted_under_owner() {
    let mut h = signed_in("coach").await;
    let id = add_note(&mut h);
    let me = owner("coach");

    pump_until(&mut h, |h| h.backend.notes.records(&me).len() == 1).await;

    let stored = &h.backend.notes.records(&me)[0];
    assert_eq!(stored.id, id);
    assert_eq!(Some(stored), h.core.note(&id));
    assert!(h.backend.notes.records(&owner("someone-else")).is_empty());
}

#[tokio::test]
async fn drag_persists_final_position() {
    let mut h = signed_in("coach").await;
    let id = add_note(&mut h);
    let me = owner("coach");
    pump_until(&mut h, |h| h.backend.notes.records(&me).len() == 1).await;

    let start = header_of(&h, &id);
    let to = Point::new(start.x + 120.0, start.y + 60.0);
    let mods = Modifiers::default();
    let mut actions = h.core.on_pointer_down(start, Button::Primary, mods);
    actions.extend(h.core.on_pointer_move(to, mods));
    actions.extend(h.core.on_pointer_up(to, Button::Primary, mods));
    assert_eq!(h.bridge.submit(&actions), 1);

    let expected = h.core.note(&id).expect("note").position();
    pump_until(&mut h, |h| h.backend.notes.records(&me).first().map(|n| n.position()) == Some(expected)).await;
    assert_eq!(h.core.note(&id).expect("note").position(), expected);
}

#[tokio::test]
async fn connection_and_cascade_reach_the_store() {
    let mut h = signed_in("coach").await;
    let a = add_note(&mut h);
    let b = add_note(&mut h);
    let me = owner("coach");
    pump_until(&mut h, |h| h.backend.notes.records(&me).len() == 2 && h.core.doc.notes().len() == 2).await;

    h.core.toggle_connect_mode();
    let (at_a, at_b) = (body_of(&h, &a), body_of(&h, &b));
    click(&mut h, at_a);
    click(&mut h, at_b);
    pump_until(&mut h, |h| h.backend.connections.records(&me).len() == 1).await;
    let stored = &h.backend.connections.records(&me)[0];
    assert_eq!((stored.from_note_id, stored.to_note_id, stored.style), (a, b, ConnectionStyle::Solid));

    let actions = h.core.delete_note(&a);
    assert_eq!(h.bridge.submit(&actions), 2);
    pump_until(&mut h, |h| h.backend.connections.records(&me).is_empty() && h.backend.notes.records(&me).len() == 1)
        .await;
    assert!(h.core.doc.connections().is_empty());
}

#[tokio::test]
async fn failed_write_surfaces_notice_and_keeps_local_edit() {
    let mut h = signed_in("coach").await;
    h.backend.notes.set_fail_writes(true);
    let id = add_note(&mut h);

    let notice = next_notice(&mut h).await;

    assert_eq!(notice.kind, NoticeKind::PersistenceFailed);
    assert_eq!(notice.code, "E_UNAVAILABLE");
    assert!(h.core.note(&id).is_some());
    assert!(h.backend.notes.records(&owner("coach")).is_empty());
    assert_eq!(h.backend.notes.write_count(), 1);
}

#[tokio::test]
async fn update_of_missing_record_is_reported_not_retried() {
    let mut h = signed_in("coach").await;
    let id = Uuid::new_v4();
    let actions = vec![Action::NoteDeleted { id }];
    assert_eq!(h.bridge.submit(&actions), 1);

    let notice = next_notice(&mut h).await;

    assert_eq!(notice.code, "E_NOT_FOUND");
    assert_eq!(h.backend.notes.write_count(), 1);
}

#[tokio::test]
async fn store_assigned_id_rekeys_local_note() {
    let mut h = signed_in("coach").await;
    h.backend.notes.set_assign_ids(true);
    let local = add_note(&mut h);

    pump_until(&mut h, |h| h.core.doc.notes().len() == 1 && h.core.note(&local).is_none()).await;

    let stored = h.backend.notes.records(&owner("coach"));
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].id, local);
    assert!(h.core.note(&stored[0].id).is_some());
}

#[tokio::test]
async fn connection_made_before_create_acks_resolves_in_store() {
    let mut h = signed_in("coach").await;
    let me = owner("coach");
    h.backend.notes.set_assign_ids(true);
    h.backend.connections.set_assign_ids(true);
    let a = add_note(&mut h);
    let b = add_note(&mut h);
    h.core.toggle_connect_mode();
    let (at_a, at_b) = (body_of(&h, &a), body_of(&h, &b));
    let a_at = h.core.note(&a).expect("a").position();
    click(&mut h, at_a);
    click(&mut h, at_b);

    let notices = pump_until(&mut h, |h| {
        h.backend.connections.records(&me).len() == 1
            && h.core.doc.connections().len() == 1
            && h.core.doc.resolved_connections().count() == 1
            && h.core.note(&a).is_none()
            && h.core.note(&b).is_none()
    })
    .await;

    assert!(notices.is_empty(), "unexpected notices: {notices:?}");
    let notes = h.backend.notes.records(&me);
    assert_eq!(notes.len(), 2);
    let (stored_a, stored_b): (Vec<&Note>, Vec<&Note>) = notes.iter().partition(|n| n.position() == a_at);
    let stored = &h.backend.connections.records(&me)[0];
    assert_eq!(stored.from_note_id, stored_a[0].id);
    assert_eq!(stored.to_note_id, stored_b[0].id);
}

#[tokio::test]
async fn drag_before_create_ack_updates_store_copy() {
    let mut h = signed_in("coach").await;
    let me = owner("coach");
    h.backend.notes.set_assign_ids(true);
    let local = add_note(&mut h);
    drag_by(&mut h, &local, 90.0);
    let expected = h.core.note(&local).expect("note").position();

    let notices =
        pump_until(&mut h, |h| h.backend.notes.records(&me).first().map(|n| n.position()) == Some(expected)).await;

    assert!(notices.is_empty(), "unexpected notices: {notices:?}");
    assert_ne!(h.backend.notes.records(&me)[0].id, local);
}

#[tokio::test]
async fn hung_write_does_not_hold_back_others() {
    let backend = MemoryBackend::new();
    let me = owner("coach");
    let a = Note::new(Uuid::new_v4(), 0.0, 0.0, NoteColor::Yellow);
    let b = Note::new(Uuid::new_v4(), 400.0, 0.0, NoteColor::Yellow);
    backend.notes.put(&me, a.clone());
    backend.notes.put(&me, b.clone());
    let stuck: Arc<dyn CollectionPort<Note>> = Arc::new(StuckUpdates { inner: backend.notes.clone(), stuck: a.id });
    let ports = Ports { notes: stuck, ..backend.ports() };
    let identity = MemoryIdentity::new(Some(me.clone()));
    let bridge = SyncBridge::start(ports, identity.receiver(), SyncConfig::default());
    let mut core = EngineCore::new();
    core.set_viewport(1000.0, 800.0);
    let mut h = Harness { backend, identity, bridge, core };
    settle(&mut h, &me).await;
    assert_eq!(h.core.doc.notes().len(), 2);

    drag_by(&mut h, &a.id, 100.0);
    drag_by(&mut h, &b.id, 100.0);
    assert_eq!(h.core.note(&a.id).expect("a").x, 100.0);
    assert_eq!(h.core.note(&b.id).expect("b").x, 500.0);

    let notices = pump_until(&mut h, |h| {
        h.backend.notes.records(&me).iter().any(|n| n.id == b.id && n.x == 500.0)
    })
    .await;

    assert!(notices.is_empty());
    let stored_a = h.backend.notes.records(&me).into_iter().find(|n| n.id == a.id).expect("a stored");
    assert_eq!(stored_a.x, 0.0);
}

// =============================================================================
// write ledger
// =============================================================================

fn outgoing(write: Outbound) -> Outgoing {
    Outgoing { owner: owner("coach"), write }
}

#[test]
fn ledger_parks_writes_until_their_create_settles() {
    let note = Note::new(Uuid::new_v4(), 0.0, 0.0, NoteColor::Yellow);
    let local = note.id;
    let mut ledger = IdLedger::default();

    assert!(ledger.admit(outgoing(Outbound::Notes(Write::Create(note)))).is_some());
    let moved = Outbound::Notes(Write::Update { id: local, patch: NotePatch::position(5.0, 5.0) });
    assert!(ledger.admit(outgoing(moved)).is_none());
    let unrelated = Outbound::Notes(Write::Delete { id: Uuid::new_v4() });
    assert!(ledger.admit(outgoing(unrelated)).is_some());

    let remote = Uuid::new_v4();
    let released = ledger.settle(CreateAck { local, remote: Some(remote) });
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].write, Outbound::Notes(Write::Update { id: remote, patch: NotePatch::position(5.0, 5.0) }));

    let late = ledger.admit(outgoing(Outbound::Notes(Write::Delete { id: local }))).expect("sent at once");
    assert_eq!(late.write, Outbound::Notes(Write::Delete { id: remote }));
}

#[test]
fn ledger_releases_held_writes_after_failed_create() {
    let note = Note::new(Uuid::new_v4(), 0.0, 0.0, NoteColor::Yellow);
    let local = note.id;
    let mut ledger = IdLedger::default();
    assert!(ledger.admit(outgoing(Outbound::Notes(Write::Create(note)))).is_some());
    assert!(ledger.admit(outgoing(Outbound::Notes(Write::Delete { id: local }))).is_none());

    let released = ledger.settle(CreateAck { local, remote: None });

    assert_eq!(released.len(), 1);
    assert_eq!(released[0].write, Outbound::Notes(Write::Delete { id: local }));
}

// =============================================================================
// inbound snapshots
// =============================================================================

#[tokio::test]
async fn remote_changes_replace_local_collection() {
    let mut h = signed_in("coach").await;
    let me = owner("coach");
    let mut remote = Note::new(Uuid::new_v4(), 40.0, 40.0, NoteColor::Green);
    h.backend.notes.put(&me, remote.clone());
    pump_until(&mut h, |h| h.core.note(&remote.id).is_some()).await;

    remote.text = "edited elsewhere".into();
    h.backend.notes.put(&me, remote.clone());
    pump_until(&mut h, |h| h.core.note(&remote.id).is_some_and(|n| n.text == "edited elsewhere")).await;

    let drawing = canvas::doc::Drawing {
        id: Uuid::new_v4(),
        path: canvas::doc::StrokePath::from_points([Point::new(0.0, 0.0), Point::new(9.0, 9.0)]),
        color: "#000000".into(),
        width: 2.0,
    };
    h.backend.drawings.put(&me, drawing.clone());
    pump_until(&mut h, |h| h.core.doc.drawings() == std::slice::from_ref(&drawing)).await;
}

#[tokio::test]
async fn stale_owner_snapshot_is_dropped() {
    let mut h = signed_in("coach").await;
    let note = Note::new(Uuid::new_v4(), 0.0, 0.0, NoteColor::Yellow);
    let event = Inbound::Snapshot { owner: owner("previous"), snapshot: Snapshot::Notes(vec![note]) };

    assert_eq!(h.bridge.apply(&mut h.core, event), None);
    assert!(h.core.doc.notes().is_empty());
}

#[tokio::test]
async fn owner_change_clears_board_and_switches_subscriptions() {
    let backend = MemoryBackend::new();
    let (alice, bob) = (owner("alice"), owner("bob"));
    let alice_note = Note::new(Uuid::new_v4(), 0.0, 0.0, NoteColor::Yellow);
    backend.notes.put(&alice, alice_note.clone());
    let mut h = start(backend, Some("alice"), SyncConfig::default());
    settle(&mut h, &alice).await;
    assert!(h.core.note(&alice_note.id).is_some());

    h.identity.sign_in(bob.clone());
    pump_until(&mut h, |h| h.bridge.owner() == Some(&bob)).await;
    assert!(h.core.doc.is_empty());
    settle(&mut h, &bob).await;

    h.backend.notes.put(&alice, Note::new(Uuid::new_v4(), 5.0, 5.0, NoteColor::Pink));
    let bob_note = Note::new(Uuid::new_v4(), 9.0, 9.0, NoteColor::Blue);
    h.backend.notes.put(&bob, bob_note.clone());
    pump_until(&mut h, |h| h.core.note(&bob_note.id).is_some()).await;

    assert_eq!(h.core.doc.notes(), std::slice::from_ref(&bob_note));
}

#[tokio::test]
async fn snapshot_during_drag_resets_note_by_default() {
    let mut h = signed_in("coach").await;
    let id = Uuid::new_v4();
    h.core.doc.insert_note(Note::new(id, 0.0, 0.0, NoteColor::Yellow));
    let start = header_of(&h, &id);
    h.core.on_pointer_down(start, Button::Primary, Modifiers::default());
    h.core.on_pointer_move(Point::new(start.x + 80.0, start.y), Modifiers::default());

    let remote = Note::new(id, 0.0, 0.0, NoteColor::Yellow);
    let event = Inbound::Snapshot { owner: owner("coach"), snapshot: Snapshot::Notes(vec![remote]) };
    h.bridge.apply(&mut h.core, event);

    assert_eq!(h.core.note(&id).expect("note").x, 0.0);
    assert_eq!(h.core.active_note(), Some(id));
}

#[tokio::test]
async fn guarded_snapshot_keeps_note_under_drag() {
    let config = SyncConfig { guard_active_interaction: true, ..SyncConfig::default() };
    let mut h = start(MemoryBackend::new(), Some("coach"), config);
    let me = owner("coach");
    settle(&mut h, &me).await;

    let (dragged, other) = (Uuid::new_v4(), Uuid::new_v4());
    h.core.doc.insert_note(Note::new(dragged, 0.0, 0.0, NoteColor::Yellow));
    h.core.doc.insert_note(Note::new(other, 400.0, 0.0, NoteColor::Yellow));
    let start = header_of(&h, &dragged);
    h.core.on_pointer_down(start, Button::Primary, Modifiers::default());
    h.core.on_pointer_move(Point::new(start.x + 80.0, start.y), Modifiers::default());

    let mut moved = Note::new(other, 500.0, 0.0, NoteColor::Yellow);
    moved.text = "remote".into();
    let snapshot = Snapshot::Notes(vec![Note::new(dragged, 0.0, 0.0, NoteColor::Yellow), moved]);
    h.bridge.apply(&mut h.core, Inbound::Snapshot { owner: me, snapshot });

    assert_eq!(h.core.note(&dragged).expect("note").x, 80.0);
    assert_eq!(h.core.note(&other).expect("note").x, 500.0);
}

#[tokio::test]
async fn notice_for_previous_owner_is_dropped() {
    let mut h = signed_in("coach").await;
    let notice = Notice::upload(&UploadError::Failed("connection reset".into()));

    let stale = Inbound::Notice { owner: owner("previous"), notice: notice.clone() };
    assert_eq!(h.bridge.apply(&mut h.core, stale), None);

    let current = Inbound::Notice { owner: owner("coach"), notice: notice.clone() };
    assert_eq!(h.bridge.apply(&mut h.core, current), Some(notice));
}

#[tokio::test]
async fn apply_pending_drains_without_blocking() {
    let mut h = harness(Some("coach"));
    let me = owner("coach");
    for _ in 0..200 {
        h.bridge.apply_pending(&mut h.core);
        if h.bridge.owner() == Some(&me) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("owner never applied");
}

#[tokio::test]
async fn recv_reports_closed_after_identity_source_is_gone() {
    let Harness { backend: _backend, identity, mut bridge, core: _core } = harness(Some("coach"));
    drop(identity);
    let mut closed = false;
    for _ in 0..MAX_EVENTS {
        match timeout(WAIT, bridge.recv()).await.expect("no hang") {
            Ok(_) => {}
            Err(e) => {
                assert_eq!(e, SyncError::Closed);
                closed = true;
                break;
            }
        }
    }
    assert!(closed);
}

// =============================================================================
// image upload
// =============================================================================

#[tokio::test]
async fn uploaded_image_is_placed_and_persisted() {
    let mut h = signed_in("coach").await;
    h.bridge.upload_image(vec![1, 2, 3]).expect("upload started");

    pump_until(&mut h, |h| h.core.doc.images().len() == 1).await;
    let image = h.core.doc.images()[0].clone();
    assert!(image.url.starts_with("memory://coach/"));
    assert_eq!((image.width, image.height), (300.0, 200.0));

    let me = owner("coach");
    pump_until(&mut h, |h| h.backend.images.records(&me).len() == 1).await;
    assert_eq!(h.backend.images.records(&me)[0], image);
}

#[tokio::test]
async fn empty_or_anonymous_upload_is_rejected_up_front() {
    let mut h = harness(None);
    step(&mut h).await;
    assert_eq!(h.bridge.upload_image(Vec::new()), Err(UploadError::EmptyFile));
    assert!(matches!(h.bridge.upload_image(vec![1]), Err(UploadError::Denied(_))));
    assert_eq!(h.backend.uploads.upload_count(), 0);
}

#[tokio::test]
async fn denied_upload_surfaces_notice() {
    let backend = MemoryBackend::with_uploader(MemoryUploader::failing(UploadError::Denied("rules".into())));
    let mut h = start(backend, Some("coach"), SyncConfig::default());
    settle(&mut h, &owner("coach")).await;

    h.bridge.upload_image(vec![1]).expect("upload started");
    let notice = next_notice(&mut h).await;

    assert_eq!(notice.kind, NoticeKind::UploadDenied);
    assert!(h.core.doc.images().is_empty());
}
