//! Ports: the external store, blob storage and identity the bridge talks to.
//!
//! DESIGN
//! ======
//! Each entity kind is persisted through its own [`CollectionPort`], scoped
//! to one owner. A subscription yields the owner's full collection every
//! time it changes; writes are single-record and independent. The traits
//! are object-safe (`async-trait`) so hosts plug in a real backend and tests
//! plug in [`crate::services::memory`].

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use canvas::doc::{
    Connection, ConnectionPatch, Drawing, EntityKind, ImageElement, ImagePatch, Note, NotePatch,
};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PortError, UploadError};
use crate::message::Snapshot;

/// The authenticated user whose board is shown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// A persisted entity kind.
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    /// Sparse update type. Immutable kinds use `Infallible`.
    type Patch: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    fn apply(&mut self, patch: &Self::Patch);

    /// Wrap a full collection for the inbound channel.
    fn snapshot(records: Vec<Self>) -> Snapshot;

    /// Ids of other records this one points at. They must exist in the store first.
    fn references(&self) -> Vec<Uuid> {
        Vec::new()
    }

    /// Rewrite the ids of the records this one points at.
    fn remap_references(&mut self, _remap: &dyn Fn(Uuid) -> Uuid) {}
}

impl Record for Note {
    type Patch = NotePatch;
    const KIND: EntityKind = EntityKind::Note;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn apply(&mut self, patch: &NotePatch) {
        patch.apply_to(self);
    }

    fn snapshot(records: Vec<Self>) -> Snapshot {
        Snapshot::Notes(records)
    }
}

impl Record for Connection {
    type Patch = ConnectionPatch;
    const KIND: EntityKind = EntityKind::Connection;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn apply(&mut self, patch: &ConnectionPatch) {
        patch.apply_to(self);
    }

    fn snapshot(records: Vec<Self>) -> Snapshot {
        Snapshot::Connections(records)
    }

    fn references(&self) -> Vec<Uuid> {
        vec![self.from_note_id, self.to_note_id]
    }

    fn remap_references(&mut self, remap: &dyn Fn(Uuid) -> Uuid) {
        self.from_note_id = remap(self.from_note_id);
        self.to_note_id = remap(self.to_note_id);
    }
}

impl Record for ImageElement {
    type Patch = ImagePatch;
    const KIND: EntityKind = EntityKind::Image;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn apply(&mut self, patch: &ImagePatch) {
        patch.apply_to(self);
    }

    fn snapshot(records: Vec<Self>) -> Snapshot {
        Snapshot::Images(records)
    }
}

impl Record for Drawing {
    type Patch = Infallible;
    const KIND: EntityKind = EntityKind::Drawing;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn apply(&mut self, patch: &Infallible) {
        match *patch {}
    }

    fn snapshot(records: Vec<Self>) -> Snapshot {
        Snapshot::Drawings(records)
    }
}

// =============================================================================
// PORTS
// =============================================================================

/// Stream of full, owner-filtered collections. Ends when the store closes it.
pub type SnapshotStream<R> = BoxStream<'static, Vec<R>>;

/// Owner-scoped persistence for one entity kind.
#[async_trait::async_trait]
pub trait CollectionPort<R: Record>: Send + Sync {
    /// Subscribe to the owner's collection. The current contents are yielded first.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the subscription cannot be opened.
    async fn subscribe(&self, owner: &OwnerId) -> Result<SnapshotStream<R>, PortError>;

    /// Store a new record and return the id the store assigned to it.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the store refuses or cannot be reached.
    async fn create(&self, owner: &OwnerId, record: R) -> Result<Uuid, PortError>;

    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] if no record has `id`.
    async fn update(&self, id: Uuid, patch: R::Patch) -> Result<(), PortError>;

    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] if no record has `id`.
    async fn delete(&self, id: Uuid) -> Result<(), PortError>;
}

/// Blob storage for uploaded images.
#[async_trait::async_trait]
pub trait BlobUploadPort: Send + Sync {
    /// Store `bytes` under the owner's namespace and return a public URL.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Denied`] or [`UploadError::Misconfigured`] for
    /// permission and configuration problems, [`UploadError::Failed`] otherwise.
    async fn upload(&self, owner: &OwnerId, bytes: Vec<u8>) -> Result<String, UploadError>;
}

/// Every port the bridge needs, shareable across tasks.
#[derive(Clone)]
pub struct Ports {
    pub notes: Arc<dyn CollectionPort<Note>>,
    pub connections: Arc<dyn CollectionPort<Connection>>,
    pub images: Arc<dyn CollectionPort<ImageElement>>,
    pub drawings: Arc<dyn CollectionPort<Drawing>>,
    pub uploads: Arc<dyn BlobUploadPort>,
}
