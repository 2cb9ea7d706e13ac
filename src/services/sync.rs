//! Sync bridge: mirrors local edits to the store and applies its snapshots.
//!
//! DESIGN
//! ======
//! Three kinds of background task feed one inbound channel:
//!
//! - the **supervisor** watches the identity source. On every owner change
//!   it aborts the previous owner's subscriptions, announces the change,
//!   and opens one subscription per entity kind for the new owner.
//! - a **subscription** forwards each full collection from its port as a
//!   snapshot tagged with the owner it was opened for.
//! - the **writer** drains the outbound channel and spawns every write on
//!   its own task, so a slow or hung write never delays another. The one
//!   exception is a write that refers to a record whose create is still in
//!   flight: it is parked until that create settles, then sent with the id
//!   the store kept.
//!
//! The event context owns the `EngineCore` and the `SyncBridge`. It calls
//! [`SyncBridge::submit`] with the actions each handler returned and
//! [`SyncBridge::apply`] (or [`SyncBridge::apply_pending`]) for inbound
//! events. Snapshots replace the local collection wholesale.
//!
//! ERROR HANDLING
//! ==============
//! Writes are fire-and-forget: a failure is logged and surfaced as a
//! [`Notice`]. Nothing is retried and the optimistic local edit is left in
//! place. Apart from parked writes, writes are not ordered against each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use canvas::doc::{ImageElement, Note};
use canvas::engine::{Action, EngineCore};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{Notice, SyncError, UploadError};
use crate::message::{Inbound, Outbound, Snapshot, Write};
use crate::ports::{CollectionPort, OwnerId, Ports, Record};
use crate::services::upload;

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

/// A write tagged with the owner that was signed in when it was made.
#[derive(Debug)]
struct Outgoing {
    owner: OwnerId,
    write: Outbound,
}

pub struct SyncBridge {
    config: SyncConfig,
    ports: Ports,
    /// Owner as last announced on the inbound channel.
    owner: Option<OwnerId>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    inbound_tx: mpsc::WeakUnboundedSender<Inbound>,
    outbound_tx: mpsc::UnboundedSender<Outgoing>,
    supervisor: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SyncBridge {
    /// Spawn the supervisor and writer tasks. Must be called inside a Tokio runtime.
    ///
    /// The first inbound event is always `OwnerChanged` with the identity
    /// source's current value.
    #[must_use]
    pub fn start(ports: Ports, identity: watch::Receiver<Option<OwnerId>>, config: SyncConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let weak_tx = inbound_tx.downgrade();

        let supervisor = tokio::spawn(supervise(ports.clone(), identity, inbound_tx));
        let writer = tokio::spawn(run_writer(ports.clone(), outbound_rx, weak_tx.clone()));
        info!(guard_active_interaction = config.guard_active_interaction, "sync bridge started");

        Self { config, ports, owner: None, inbound_rx, inbound_tx: weak_tx, outbound_tx, supervisor, writer }
    }

    #[must_use]
    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    /// Queue the persisted actions for writing. Returns how many writes were queued.
    ///
    /// Nothing is written while no owner is signed in; such actions are dropped.
    pub fn submit(&self, actions: &[Action]) -> usize {
        let writes: Vec<Outbound> = actions.iter().cloned().filter_map(Outbound::from_action).collect();
        if writes.is_empty() {
            return 0;
        }
        let Some(owner) = &self.owner else {
            warn!(count = writes.len(), "no signed-in owner; dropping writes");
            return 0;
        };
        let mut queued = 0;
        for write in writes {
            debug!(kind = ?write.kind(), %owner, "write queued");
            if self.outbound_tx.send(Outgoing { owner: owner.clone(), write }).is_err() {
                error!("writer task gone; dropping write");
                continue;
            }
            queued += 1;
        }
        queued
    }

    /// Start uploading an image for the signed-in owner.
    ///
    /// The outcome arrives later as `ImageUploaded` or a `Notice`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::EmptyFile`] for an empty payload and
    /// [`UploadError::Denied`] when nobody is signed in.
    pub fn upload_image(&self, bytes: Vec<u8>) -> Result<(), UploadError> {
        upload::validate(&bytes)?;
        let Some(owner) = self.owner.clone() else {
            return Err(UploadError::Denied("sign in to upload images".into()));
        };
        let Some(tx) = self.inbound_tx.upgrade() else {
            return Err(UploadError::Failed(SyncError::Closed.to_string()));
        };
        info!(%owner, size = bytes.len(), "image upload started");
        upload::spawn_upload(self.ports.uploads.clone(), owner, bytes, tx);
        Ok(())
    }

    /// Wait for the next inbound event.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Closed`] once the identity source is gone and
    /// every in-flight task has finished.
    pub async fn recv(&mut self) -> Result<Inbound, SyncError> {
        self.inbound_rx.recv().await.ok_or(SyncError::Closed)
    }

    /// Apply every event that is already waiting, without blocking.
    pub fn apply_pending(&mut self, core: &mut EngineCore) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(event) = self.inbound_rx.try_recv() {
            notices.extend(self.apply(core, event));
        }
        notices
    }

    /// Apply one inbound event to the engine. Returns a notice to show, if any.
    pub fn apply(&mut self, core: &mut EngineCore, event: Inbound) -> Option<Notice> {
        match event {
            Inbound::OwnerChanged(owner) => {
                info!(from = ?self.owner, to = ?owner, "clearing board for new owner");
                core.reset();
                self.owner = owner;
                None
            }
            Inbound::Snapshot { owner, snapshot } => {
                if self.is_current(&owner) {
                    self.apply_snapshot(core, snapshot);
                } else {
                    debug!(%owner, kind = ?snapshot.kind(), "stale snapshot dropped");
                }
                None
            }
            Inbound::Rekeyed { owner, kind, local, remote } => {
                if self.is_current(&owner) {
                    let found = core.rekey(kind, &local, remote);
                    debug!(?kind, %local, %remote, found, "record rekeyed");
                }
                None
            }
            Inbound::ImageUploaded { owner, url } => {
                if !self.is_current(&owner) {
                    debug!(%owner, "upload finished for previous owner; not placed");
                    return None;
                }
                let actions = core.add_image(&url, self.config.default_image_width, self.config.default_image_height);
                if actions.is_empty() {
                    warn!(%url, "uploaded image not placed while presenting");
                }
                self.submit(&actions);
                None
            }
            Inbound::Notice { owner, notice } => {
                if self.is_current(&owner) {
                    Some(notice)
                } else {
                    debug!(%owner, code = notice.code, "notice for previous owner dropped");
                    None
                }
            }
        }
    }

    fn is_current(&self, owner: &OwnerId) -> bool {
        self.owner.as_ref() == Some(owner)
    }

    fn apply_snapshot(&self, core: &mut EngineCore, snapshot: Snapshot) {
        debug!(kind = ?snapshot.kind(), count = snapshot.len(), "snapshot applied");
        let guard = self.config.guard_active_interaction;
        match snapshot {
            Snapshot::Notes(mut notes) => {
                if guard {
                    let local: Option<Note> = core.active_note().and_then(|id| core.note(&id)).cloned();
                    keep_local(&mut notes, local);
                }
                core.replace_notes(notes);
            }
            Snapshot::Connections(connections) => core.replace_connections(connections),
            Snapshot::Images(mut images) => {
                if guard {
                    let local: Option<ImageElement> =
                        core.active_image().and_then(|id| core.doc.image(&id)).cloned();
                    keep_local(&mut images, local);
                }
                core.replace_images(images);
            }
            Snapshot::Drawings(drawings) => core.replace_drawings(drawings),
        }
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.supervisor.abort();
        self.writer.abort();
    }
}

/// Swap the incoming copy of the record under interaction for the local one.
fn keep_local<R: Record>(records: &mut [R], local: Option<R>) {
    let Some(local) = local else {
        return;
    };
    if let Some(slot) = records.iter_mut().find(|r| r.id() == local.id()) {
        debug!(kind = ?R::KIND, id = %local.id(), "snapshot kept local copy under interaction");
        *slot = local;
    }
}

// =============================================================================
// SUPERVISOR
// =============================================================================

async fn supervise(ports: Ports, mut identity: watch::Receiver<Option<OwnerId>>, tx: mpsc::UnboundedSender<Inbound>) {
    let mut subscriptions: JoinSet<()> = JoinSet::new();
    let mut current: Option<Option<OwnerId>> = None;
    loop {
        let owner = identity.borrow_and_update().clone();
        if current.as_ref() != Some(&owner) {
            subscriptions.shutdown().await;
            info!(owner = ?owner, "board owner changed");
            if tx.send(Inbound::OwnerChanged(owner.clone())).is_err() {
                break;
            }
            if let Some(owner) = &owner {
                subscriptions.spawn(run_subscription(ports.notes.clone(), owner.clone(), tx.clone()));
                subscriptions.spawn(run_subscription(ports.connections.clone(), owner.clone(), tx.clone()));
                subscriptions.spawn(run_subscription(ports.images.clone(), owner.clone(), tx.clone()));
                subscriptions.spawn(run_subscription(ports.drawings.clone(), owner.clone(), tx.clone()));
            }
            current = Some(owner);
        }
        if identity.changed().await.is_err() {
            info!("identity source closed; supervisor stopping");
            break;
        }
    }
}

async fn run_subscription<R: Record>(
    port: Arc<dyn CollectionPort<R>>,
    owner: OwnerId,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    let mut stream = match port.subscribe(&owner).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(kind = ?R::KIND, %owner, error = %e, "subscription failed");
            let notice = Notice::subscription(R::KIND, &e);
            if tx.send(Inbound::Notice { owner: owner.clone(), notice }).is_err() {
                debug!("bridge closed before subscription failure was reported");
            }
            return;
        }
    };
    info!(kind = ?R::KIND, %owner, "subscription opened");
    while let Some(records) = stream.next().await {
        let snapshot = R::snapshot(records);
        if tx.send(Inbound::Snapshot { owner: owner.clone(), snapshot }).is_err() {
            return;
        }
    }
    info!(kind = ?R::KIND, %owner, "subscription ended");
}

// =============================================================================
// WRITER
// =============================================================================

/// Outcome of a create, reported back to the writer.
#[derive(Debug)]
struct CreateAck {
    local: Uuid,
    /// Id the store kept. `None` if the create failed.
    remote: Option<Uuid>,
}

/// Creates still in flight and the ids the store replaced.
#[derive(Debug, Default)]
struct IdLedger {
    creating: HashSet<Uuid>,
    remote: HashMap<Uuid, Uuid>,
    parked: Vec<Outgoing>,
}

impl IdLedger {
    /// Translate replaced ids, then either release `outgoing` or park it
    /// behind the create it depends on.
    fn admit(&mut self, mut outgoing: Outgoing) -> Option<Outgoing> {
        let remote = &self.remote;
        outgoing.write.remap(&|id| remote.get(&id).copied().unwrap_or(id));
        if let Some(id) = outgoing.write.created() {
            self.creating.insert(id);
        }
        if outgoing.write.depends_on().iter().any(|id| self.creating.contains(id)) {
            debug!(kind = ?outgoing.write.kind(), "write parked behind pending create");
            self.parked.push(outgoing);
            return None;
        }
        Some(outgoing)
    }

    /// Record a settled create and release every write it was holding back.
    /// After a failed create the held writes go out unchanged and fail on their own.
    fn settle(&mut self, ack: CreateAck) -> Vec<Outgoing> {
        self.creating.remove(&ack.local);
        if let Some(remote) = ack.remote.filter(|remote| *remote != ack.local) {
            self.remote.insert(ack.local, remote);
        }
        std::mem::take(&mut self.parked).into_iter().filter_map(|o| self.admit(o)).collect()
    }
}

async fn run_writer(
    ports: Ports,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    tx: mpsc::WeakUnboundedSender<Inbound>,
) {
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    let mut ledger = IdLedger::default();
    loop {
        let ready: Vec<Outgoing> = tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(outgoing) => ledger.admit(outgoing).into_iter().collect(),
                None => break,
            },
            Some(ack) = ack_rx.recv() => ledger.settle(ack),
        };
        for outgoing in ready {
            tokio::spawn(perform(ports.clone(), outgoing, tx.clone(), ack_tx.clone()));
        }
    }
}

async fn perform(
    ports: Ports,
    outgoing: Outgoing,
    tx: mpsc::WeakUnboundedSender<Inbound>,
    acks: mpsc::UnboundedSender<CreateAck>,
) {
    let Outgoing { owner, write } = outgoing;
    let event = match write {
        Outbound::Notes(w) => execute(ports.notes.as_ref(), &owner, w, &acks).await,
        Outbound::Connections(w) => execute(ports.connections.as_ref(), &owner, w, &acks).await,
        Outbound::Images(w) => execute(ports.images.as_ref(), &owner, w, &acks).await,
        Outbound::Drawings(w) => execute(ports.drawings.as_ref(), &owner, w, &acks).await,
    };
    let Some(event) = event else {
        return;
    };
    let undelivered = match tx.upgrade() {
        Some(tx) => tx.send(event).err().map(|e| e.0),
        None => Some(event),
    };
    if let Some(event) = undelivered {
        debug!(?event, "bridge closed before write result was delivered");
    }
}

/// Run one write. Returns the event to report, if any.
async fn execute<R: Record>(
    port: &dyn CollectionPort<R>,
    owner: &OwnerId,
    write: Write<R>,
    acks: &mpsc::UnboundedSender<CreateAck>,
) -> Option<Inbound> {
    let op = write.op();
    let id = write.id();
    let result = match write {
        Write::Create(record) => {
            let created = port.create(owner, record).await;
            let remote = match &created {
                Ok(remote) => Some(*remote),
                Err(_) => None,
            };
            if acks.send(CreateAck { local: id, remote }).is_err() {
                debug!(kind = ?R::KIND, %id, "writer gone before create was acknowledged");
            }
            match created {
                Ok(remote) if remote != id => {
                    info!(kind = ?R::KIND, local = %id, %remote, "store assigned a new id");
                    return Some(Inbound::Rekeyed { owner: owner.clone(), kind: R::KIND, local: id, remote });
                }
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Write::Update { id, patch } => port.update(id, patch).await,
        Write::Delete { id } => port.delete(id).await,
    };
    match result {
        Ok(()) => {
            debug!(kind = ?R::KIND, op, %id, "write committed");
            None
        }
        Err(e) => {
            error!(kind = ?R::KIND, op, %id, %owner, error = %e, "write failed");
            Some(Inbound::Notice { owner: owner.clone(), notice: Notice::persistence(op, R::KIND, &e) })
        }
    }
}
