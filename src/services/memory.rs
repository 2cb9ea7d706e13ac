//! In-memory port adapters.
//!
//! DESIGN
//! ======
//! `MemoryCollection` keeps every owner's records in one `watch` channel.
//! Each write republishes the whole set; each subscriber filters it down to
//! its owner, so every subscriber sees every committed write as a fresh
//! snapshot, like a hosted document store's listener would.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use canvas::doc::{Connection, Drawing, ImageElement, Note};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PortError, UploadError};
use crate::ports::{BlobUploadPort, CollectionPort, OwnerId, Ports, Record, SnapshotStream};

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

// =============================================================================
// COLLECTION
// =============================================================================

pub struct MemoryCollection<R: Record> {
    records: watch::Sender<Vec<(OwnerId, R)>>,
    fail_writes: AtomicBool,
    assign_ids: AtomicBool,
    writes: AtomicUsize,
}

impl<R: Record> Default for MemoryCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryCollection<R> {
    #[must_use]
    pub fn new() -> Self {
        let (records, _) = watch::channel(Vec::new());
        Self { records, fail_writes: AtomicBool::new(false), assign_ids: AtomicBool::new(false), writes: AtomicUsize::new(0) }
    }

    /// Make every subsequent write fail with [`PortError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Ignore client ids on create and assign fresh ones, like a store with server-side keys.
    pub fn set_assign_ids(&self, assign: bool) {
        self.assign_ids.store(assign, Ordering::SeqCst);
    }

    /// Current records of `owner`.
    #[must_use]
    pub fn records(&self, owner: &OwnerId) -> Vec<R> {
        filter_owner(&self.records.borrow(), owner)
    }

    /// Insert or replace a record directly, as another device would.
    pub fn put(&self, owner: &OwnerId, record: R) {
        let owner = owner.clone();
        self.records.send_modify(|all| {
            all.retain(|(_, r)| r.id() != record.id());
            all.push((owner, record));
        });
    }

    /// Number of write calls received, failed ones included.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn begin_write(&self) -> Result<(), PortError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

fn filter_owner<R: Record>(all: &[(OwnerId, R)], owner: &OwnerId) -> Vec<R> {
    all.iter().filter(|(o, _)| o == owner).map(|(_, r)| r.clone()).collect()
}

#[async_trait::async_trait]
impl<R: Record> CollectionPort<R> for MemoryCollection<R> {
    async fn subscribe(&self, owner: &OwnerId) -> Result<SnapshotStream<R>, PortError> {
        let mut rx = self.records.subscribe();
        rx.mark_changed();
        let owner = owner.clone();
        let stream = futures::stream::unfold(rx, move |mut rx| {
            let owner = owner.clone();
            async move {
                if rx.changed().await.is_err() {
                    return None;
                }
                let records = filter_owner(&rx.borrow_and_update(), &owner);
                Some((records, rx))
            }
        });
        Ok(stream.boxed())
    }

    async fn create(&self, owner: &OwnerId, mut record: R) -> Result<Uuid, PortError> {
        self.begin_write()?;
        if self.assign_ids.load(Ordering::SeqCst) {
            record.set_id(Uuid::new_v4());
        }
        let id = record.id();
        debug!(kind = ?R::KIND, %id, %owner, "memory create");
        self.put(owner, record);
        Ok(id)
    }

    async fn update(&self, id: Uuid, patch: R::Patch) -> Result<(), PortError> {
        self.begin_write()?;
        let mut found = false;
        self.records.send_if_modified(|all| {
            if let Some((_, record)) = all.iter_mut().find(|(_, r)| r.id() == id) {
                record.apply(&patch);
                found = true;
            }
            found
        });
        if found { Ok(()) } else { Err(PortError::NotFound(id)) }
    }

    async fn delete(&self, id: Uuid) -> Result<(), PortError> {
        self.begin_write()?;
        let removed = self.records.send_if_modified(|all| {
            let before = all.len();
            all.retain(|(_, r)| r.id() != id);
            all.len() != before
        });
        if removed { Ok(()) } else { Err(PortError::NotFound(id)) }
    }
}

// =============================================================================
// UPLOADER
// =============================================================================

/// Blob storage that hands out `memory://` URLs, or always fails.
#[derive(Default)]
pub struct MemoryUploader {
    failure: Option<UploadError>,
    uploads: AtomicUsize,
}

impl MemoryUploader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(error: UploadError) -> Self {
        Self { failure: Some(error), uploads: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BlobUploadPort for MemoryUploader {
    async fn upload(&self, owner: &OwnerId, bytes: Vec<u8>) -> Result<String, UploadError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(format!("memory://{owner}/{}?bytes={}", Uuid::new_v4(), bytes.len()))
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// A sign-in source backed by a `watch` channel.
pub struct MemoryIdentity {
    tx: watch::Sender<Option<OwnerId>>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new(owner: Option<OwnerId>) -> Self {
        let (tx, _) = watch::channel(owner);
        Self { tx }
    }

    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<Option<OwnerId>> {
        self.tx.subscribe()
    }

    pub fn sign_in(&self, owner: OwnerId) {
        self.tx.send_replace(Some(owner));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// One in-memory collection per kind plus an uploader, with handles kept for inspection.
#[derive(Clone)]
pub struct MemoryBackend {
    pub notes: Arc<MemoryCollection<Note>>,
    pub connections: Arc<MemoryCollection<Connection>>,
    pub images: Arc<MemoryCollection<ImageElement>>,
    pub drawings: Arc<MemoryCollection<Drawing>>,
    pub uploads: Arc<MemoryUploader>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_uploader(MemoryUploader::new())
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_uploader(uploader: MemoryUploader) -> Self {
        Self {
            notes: Arc::new(MemoryCollection::new()),
            connections: Arc::new(MemoryCollection::new()),
            images: Arc::new(MemoryCollection::new()),
            drawings: Arc::new(MemoryCollection::new()),
            uploads: Arc::new(uploader),
        }
    }

    #[must_use]
    pub fn ports(&self) -> Ports {
        Ports {
            notes: self.notes.clone(),
            connections: self.connections.clone(),
            images: self.images.clone(),
            drawings: self.drawings.clone(),
            uploads: self.uploads.clone(),
        }
    }
}
