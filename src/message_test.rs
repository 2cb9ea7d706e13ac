use canvas::doc::{ConnectionStyle, NoteColor, NotePatch, StrokePath};

use super::*;

fn note() -> Note {
    Note::new(Uuid::new_v4(), 0.0, 0.0, NoteColor::Yellow)
}

#[test]
fn persisted_actions_map_to_writes() {
    let n = note();
    let id = n.id;
    assert_eq!(Outbound::from_action(Action::NoteCreated(n.clone())), Some(Outbound::Notes(Write::Create(n))));

    let fields = NotePatch::position(5.0, 6.0);
    let update = Outbound::from_action(Action::NoteUpdated { id, fields: fields.clone() });
    assert_eq!(update, Some(Outbound::Notes(Write::Update { id, patch: fields })));

    let delete = Outbound::from_action(Action::DrawingDeleted { id });
    assert_eq!(delete, Some(Outbound::Drawings(Write::Delete { id })));
    assert_eq!(delete.map(|o| o.kind()), Some(EntityKind::Drawing));
}

#[test]
fn view_actions_map_to_nothing() {
    assert_eq!(Outbound::from_action(Action::RenderNeeded), None);
    assert_eq!(Outbound::from_action(Action::SetCursor("grab".into())), None);
}

#[test]
fn write_reports_op_and_target() {
    let drawing = Drawing { id: Uuid::new_v4(), path: StrokePath::default(), color: "#000".into(), width: 2.0 };
    let create = Write::Create(drawing.clone());
    assert_eq!(create.op(), "create");
    assert_eq!(create.id(), drawing.id);
    let delete: Write<Drawing> = Write::Delete { id: drawing.id };
    assert_eq!(delete.op(), "delete");
}

#[test]
fn snapshot_kind_and_len() {
    let snapshot = Snapshot::Notes(vec![note(), note()]);
    assert_eq!(snapshot.kind(), EntityKind::Note);
    assert_eq!(snapshot.len(), 2);
    assert!(Snapshot::Images(Vec::new()).is_empty());
}

#[test]
fn connection_create_depends_on_its_endpoints() {
    let (from, to) = (Uuid::new_v4(), Uuid::new_v4());
    let connection = Connection {
        id: Uuid::new_v4(),
        from_note_id: from,
        to_note_id: to,
        style: ConnectionStyle::Solid,
        color: "#000".into(),
        label: None,
    };
    let mut write = Outbound::Connections(Write::Create(connection.clone()));
    assert_eq!(write.created(), Some(connection.id));
    assert_eq!(write.depends_on(), vec![from, to]);

    let remote = Uuid::new_v4();
    write.remap(&|id| if id == from { remote } else { id });
    let Outbound::Connections(Write::Create(remapped)) = write else {
        panic!("still a connection create");
    };
    assert_eq!((remapped.id, remapped.from_note_id, remapped.to_note_id), (connection.id, remote, to));
}

#[test]
fn update_depends_on_its_target() {
    let (local, remote) = (Uuid::new_v4(), Uuid::new_v4());
    let mut write = Outbound::Notes(Write::Update { id: local, patch: NotePatch::position(1.0, 2.0) });
    assert_eq!(write.created(), None);
    assert_eq!(write.depends_on(), vec![local]);
    write.remap(&|_| remote);
    assert_eq!(write, Outbound::Notes(Write::Update { id: remote, patch: NotePatch::position(1.0, 2.0) }));
    assert!(Outbound::Notes(Write::Create(note())).depends_on().is_empty());
}
