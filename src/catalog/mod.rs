//! Catalog mutations: inline image checks, variation normalization, upload
//! compensation and the product pipeline built on them.

pub mod migrate;
pub mod pipeline;
pub mod saga;
pub mod validator;
pub mod variations;

pub use pipeline::{DeletedProduct, PipelineSettings, ProductFields, ProductPipeline, ReviewInput};
pub use saga::UploadSaga;
