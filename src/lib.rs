//! OpenSASE Catalog
//!
//! Self-hosted product catalog for the OpenSASE storefront.
//!
//! ## Features
//! - Product create/update with hosted images and compensating deletes
//! - Variation normalization across every legacy input shape
//! - Reviews with live rating aggregates
//! - Categories, listing, search and pagination
//! - Catalog events over NATS

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod media;
pub mod store;

use thiserror::Error;

use crate::catalog::validator::ImageRejection;
use crate::media::MediaError;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

/// Failures surfaced by catalog mutations.
///
/// None of these are retried by the pipeline. Uploads made during a failed
/// request have already been deleted by the time the caller sees the error.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{field}: {rejection}")]
    InvalidImage {
        field: String,
        rejection: ImageRejection,
    },

    #[error("Variation {position}: {reason}")]
    InvalidVariation { position: usize, reason: String },

    #[error("Image upload failed: {0}")]
    Upload(#[source] MediaError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CatalogError {
    /// Stable wire code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidImage { .. } | Self::InvalidVariation { .. } => {
                "VALIDATION_ERROR"
            }
            Self::Upload(_) => "UPLOAD_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
