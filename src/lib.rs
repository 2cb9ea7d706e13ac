//! Sync bridge for the strategy whiteboard.
//!
//! DESIGN
//! ======
//! The [`canvas`] crate applies every edit locally and reports it as an
//! `Action`. This crate mirrors those actions to an owner-scoped store and
//! feeds the store's snapshots back in:
//!
//! ```text
//!   EngineCore ──Action──▶ SyncBridge::submit ──Outbound──▶ writer task ──▶ CollectionPort
//!        ▲                                                                       │
//!        └──── SyncBridge::apply ◀──Inbound── subscription tasks ◀──snapshots────┘
//! ```
//!
//! The engine is owned by one event context and never shared; the bridge's
//! background tasks reach it only through channels.

pub mod config;
pub mod error;
pub mod message;
pub mod ports;
pub mod services;
pub mod telemetry;

pub use canvas;
pub use config::SyncConfig;
pub use error::{Notice, NoticeKind, PortError, SyncError, UploadError};
pub use message::{Inbound, Outbound, Snapshot, Write};
pub use ports::{BlobUploadPort, CollectionPort, OwnerId, Ports, Record, SnapshotStream};
pub use services::sync::SyncBridge;
