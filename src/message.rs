//! Messages carried between the bridge's tasks and the event context.

use canvas::doc::{Connection, Drawing, EntityKind, ImageElement, Note};
use canvas::engine::Action;
use uuid::Uuid;

use crate::error::Notice;
use crate::ports::{OwnerId, Record};

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;

/// A full collection received from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Notes(Vec<Note>),
    Connections(Vec<Connection>),
    Images(Vec<ImageElement>),
    Drawings(Vec<Drawing>),
}

impl Snapshot {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Notes(_) => EntityKind::Note,
            Self::Connections(_) => EntityKind::Connection,
            Self::Images(_) => EntityKind::Image,
            Self::Drawings(_) => EntityKind::Drawing,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Notes(v) => v.len(),
            Self::Connections(v) => v.len(),
            Self::Images(v) => v.len(),
            Self::Drawings(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Events delivered to the event context, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The signed-in user changed. Everything local belongs to the old owner.
    OwnerChanged(Option<OwnerId>),
    Snapshot { owner: OwnerId, snapshot: Snapshot },
    /// The store kept a record under a different id than the one created locally.
    Rekeyed { owner: OwnerId, kind: EntityKind, local: Uuid, remote: Uuid },
    ImageUploaded { owner: OwnerId, url: String },
    /// Something to tell the user, raised while working for `owner`.
    Notice { owner: OwnerId, notice: Notice },
}

/// A single-record write intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Write<R: Record> {
    Create(R),
    Update { id: Uuid, patch: R::Patch },
    Delete { id: Uuid },
}

impl<R: Record> Write<R> {
    /// Operation name for logs and notices.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Create(record) => record.id(),
            Self::Update { id, .. } | Self::Delete { id } => *id,
        }
    }

    /// Id of the record a create introduces.
    #[must_use]
    pub fn created(&self) -> Option<Uuid> {
        match self {
            Self::Create(record) => Some(record.id()),
            Self::Update { .. } | Self::Delete { .. } => None,
        }
    }

    /// Ids that must already exist in the store for this write to succeed.
    #[must_use]
    pub fn depends_on(&self) -> Vec<Uuid> {
        match self {
            Self::Create(record) => record.references(),
            Self::Update { id, .. } | Self::Delete { id } => vec![*id],
        }
    }

    /// Rewrite every id this write refers to. A create keeps its own id.
    pub fn remap(&mut self, remap: &dyn Fn(Uuid) -> Uuid) {
        match self {
            Self::Create(record) => record.remap_references(remap),
            Self::Update { id, .. } | Self::Delete { id } => *id = remap(*id),
        }
    }
}

/// A write routed to the port for its entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Notes(Write<Note>),
    Connections(Write<Connection>),
    Images(Write<ImageElement>),
    Drawings(Write<Drawing>),
}

impl Outbound {
    /// The write a persisted engine action stands for. View-only actions map to `None`.
    #[must_use]
    pub fn from_action(action: Action) -> Option<Self> {
        let outbound = match action {
            Action::NoteCreated(note) => Self::Notes(Write::Create(note)),
            Action::NoteUpdated { id, fields } => Self::Notes(Write::Update { id, patch: fields }),
            Action::NoteDeleted { id } => Self::Notes(Write::Delete { id }),
            Action::ConnectionCreated(connection) => Self::Connections(Write::Create(connection)),
            Action::ConnectionUpdated { id, fields } => Self::Connections(Write::Update { id, patch: fields }),
            Action::ConnectionDeleted { id } => Self::Connections(Write::Delete { id }),
            Action::ImageCreated(image) => Self::Images(Write::Create(image)),
            Action::ImageUpdated { id, fields } => Self::Images(Write::Update { id, patch: fields }),
            Action::ImageDeleted { id } => Self::Images(Write::Delete { id }),
            Action::DrawingCreated(drawing) => Self::Drawings(Write::Create(drawing)),
            Action::DrawingDeleted { id } => Self::Drawings(Write::Delete { id }),
            Action::SetCursor(_) | Action::RenderNeeded => return None,
        };
        Some(outbound)
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Notes(_) => EntityKind::Note,
            Self::Connections(_) => EntityKind::Connection,
            Self::Images(_) => EntityKind::Image,
            Self::Drawings(_) => EntityKind::Drawing,
        }
    }

    #[must_use]
    pub fn created(&self) -> Option<Uuid> {
        match self {
            Self::Notes(w) => w.created(),
            Self::Connections(w) => w.created(),
            Self::Images(w) => w.created(),
            Self::Drawings(w) => w.created(),
        }
    }

    #[must_use]
    pub fn depends_on(&self) -> Vec<Uuid> {
        match self {
            Self::Notes(w) => w.depends_on(),
            Self::Connections(w) => w.depends_on(),
            Self::Images(w) => w.depends_on(),
            Self::Drawings(w) => w.depends_on(),
        }
    }

    pub fn remap(&mut self, remap: &dyn Fn(Uuid) -> Uuid) {
        match self {
            Self::Notes(w) => w.remap(remap),
            Self::Connections(w) => w.remap(remap),
            Self::Images(w) => w.remap(remap),
            Self::Drawings(w) => w.remap(remap),
        }
    }
}
