//! Aggregates module
pub mod product;
pub mod category;

pub use product::{Product, ProductError, Review, ReviewOutcome, ScalarPatch, Variation};
pub use category::{Category, CategoryError};
