//! Compensation for uploads made during one mutation.
//!
//! Each successful upload pushes its undo (a delete) onto the saga. A failed
//! request calls [`UploadSaga::rollback`], which runs the undos newest first.
//! A request that succeeds calls [`UploadSaga::commit`]. If the saga is
//! dropped without either, e.g. because the caller went away mid-request,
//! the undos run on a spawned task.

use std::sync::Arc;

use crate::domain::value_objects::{EmbeddedImage, ImageRef};
use crate::media::{ImageStore, MediaError};

pub struct UploadSaga {
    images: Arc<dyn ImageStore>,
    folder: String,
    uploaded: Vec<ImageRef>,
    settled: bool,
}

impl UploadSaga {
    pub fn new(images: Arc<dyn ImageStore>, folder: impl Into<String>) -> Self {
        Self { images, folder: folder.into(), uploaded: Vec::new(), settled: false }
    }

    pub async fn upload(&mut self, image: &EmbeddedImage) -> Result<ImageRef, MediaError> {
        let hosted = self.images.upload(image, &self.folder).await?;
        self.uploaded.push(hosted.clone());
        Ok(hosted)
    }

    pub fn uploaded_ids(&self) -> Vec<String> {
        self.uploaded.iter().map(|img| img.id.clone()).collect()
    }

    /// Deletes everything uploaded so far. Delete failures are logged only.
    pub async fn rollback(mut self) {
        self.settled = true;
        let uploaded = std::mem::take(&mut self.uploaded);
        compensate(self.images.as_ref(), uploaded).await;
    }

    pub fn commit(mut self) -> Vec<ImageRef> {
        self.settled = true;
        std::mem::take(&mut self.uploaded)
    }
}

impl Drop for UploadSaga {
    fn drop(&mut self) {
        if self.settled || self.uploaded.is_empty() {
            return;
        }
        let uploaded = std::mem::take(&mut self.uploaded);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(count = uploaded.len(), "mutation abandoned, deleting its uploads");
                let images = Arc::clone(&self.images);
                handle.spawn(async move { compensate(images.as_ref(), uploaded).await });
            }
            Err(_) => {
                let ids: Vec<_> = uploaded.into_iter().map(|img| img.id).collect();
                tracing::error!(orphaned = ?ids, "mutation abandoned outside a runtime, uploads left behind");
            }
        }
    }
}

async fn compensate(images: &dyn ImageStore, uploaded: Vec<ImageRef>) {
    for image in uploaded.into_iter().rev() {
        match images.delete(&image.id).await {
            Ok(()) => tracing::info!(image_id = %image.id, "rolled back upload"),
            Err(e) => tracing::warn!(image_id = %image.id, error = %e, "rollback delete failed"),
        }
    }
}

/// Best-effort delete of images a persisted record no longer references.
/// Returns the ids that could not be deleted.
pub async fn retire(images: &dyn ImageStore, ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut failed = Vec::new();
    for id in ids {
        if let Err(e) = images.delete(&id).await {
            tracing::warn!(image_id = %id, error = %e, "failed to delete retired image");
            failed.push(id);
        }
    }
    failed
}
