//! Image hosting.
//!
//! The pipeline only needs two calls from an image host: upload an inline
//! payload into a folder, and delete by id. [`ImageStore`] is that seam;
//! [`CloudinaryClient`] talks to the real host and [`InMemoryImageStore`]
//! stands in for it in tests and local runs.

mod cloudinary;
mod memory;

pub use cloudinary::{CloudinaryClient, CloudinaryConfig};
pub use memory::InMemoryImageStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::value_objects::{EmbeddedImage, ImageRef};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image host returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid image host URL: {0}")]
    InvalidUrl(String),

    #[error("image rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the payload under `folder` and returns where it lives.
    async fn upload(&self, image: &EmbeddedImage, folder: &str) -> Result<ImageRef, MediaError>;

    /// Removes an image. Deleting an id the host no longer has succeeds.
    async fn delete(&self, id: &str) -> Result<(), MediaError>;
}
