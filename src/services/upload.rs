//! Image upload flow: bytes → blob port → URL → new image on the board.
//!
//! The upload runs on its own task. Its outcome comes back to the event
//! context as an `Inbound` event, where the image is placed and persisted
//! like any other local edit.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{Notice, UploadError};
use crate::message::Inbound;
use crate::ports::{BlobUploadPort, OwnerId};

#[cfg(test)]
#[path = "upload_test.rs"]
mod upload_test;

/// Reject payloads that should never reach the port.
///
/// # Errors
///
/// Returns [`UploadError::EmptyFile`] for an empty payload.
pub fn validate(bytes: &[u8]) -> Result<(), UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::EmptyFile);
    }
    Ok(())
}

/// Upload `bytes` and describe the outcome as an inbound event.
pub async fn upload(port: &dyn BlobUploadPort, owner: OwnerId, bytes: Vec<u8>) -> Inbound {
    let size = bytes.len();
    match port.upload(&owner, bytes).await {
        Ok(url) => {
            info!(%owner, size, %url, "image uploaded");
            Inbound::ImageUploaded { owner, url }
        }
        Err(e) => {
            error!(%owner, size, error = %e, "image upload failed");
            Inbound::Notice { owner, notice: Notice::upload(&e) }
        }
    }
}

/// Run [`upload`] on a background task and deliver its event to `tx`.
pub(crate) fn spawn_upload(
    port: Arc<dyn BlobUploadPort>,
    owner: OwnerId,
    bytes: Vec<u8>,
    tx: mpsc::UnboundedSender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = upload(port.as_ref(), owner, bytes).await;
        if tx.send(event).is_err() {
            info!("upload finished after the bridge closed");
        }
    })
}
