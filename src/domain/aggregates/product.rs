//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;
use crate::domain::value_objects::{AuthorId, ImageRef};

/// Catalog product, stored as a single document.
///
/// `rating` and `num_of_reviews` are derived from `reviews` and only change
/// through [`Product::upsert_review`] and [`Product::remove_review`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    #[serde(rename = "ratings", default)]
    rating: f64,
    #[serde(default)]
    num_of_reviews: u32,
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default, deserialize_with = "crate::catalog::variations::deserialize_stored")]
    pub variations: Vec<Variation>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user: AuthorId,
    pub name: String,
    pub rating: u8,
    pub comment: String,
}

/// Canonical variation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub image: ImageRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewOutcome {
    Added,
    Updated,
}

/// Scalar fields that can be changed without touching media.
#[derive(Clone, Debug, Default)]
pub struct ScalarPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

impl Product {
    pub fn create(name: impl Into<String>, description: impl Into<String>, price: Decimal, stock: u32) -> Self {
        Self {
            id: Uuid::now_v7(), name: name.into(), description: description.into(), price, stock,
            rating: 0.0, num_of_reviews: 0, reviews: vec![], images: vec![],
            category: String::new(), sub_category: String::new(), variations: vec![],
            created_at: Utc::now(),
        }
    }

    pub fn rating(&self) -> f64 { self.rating }
    pub fn num_of_reviews(&self) -> u32 { self.num_of_reviews }
    pub fn reviews(&self) -> &[Review] { &self.reviews }
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }

    pub fn apply(&mut self, patch: ScalarPatch) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.price {
            self.price = v;
        }
        if let Some(v) = patch.stock {
            self.stock = v;
        }
        if let Some(v) = patch.category {
            self.category = v;
        }
        if let Some(v) = patch.sub_category {
            self.sub_category = v;
        }
    }

    /// Adds a review, or overwrites the author's existing one in place.
    pub fn upsert_review(
        &mut self,
        author: AuthorId,
        author_name: impl Into<String>,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<ReviewOutcome, ProductError> {
        if !(1..=5).contains(&rating) {
            return Err(ProductError::RatingOutOfRange(rating));
        }
        let comment = comment.into();
        let outcome = match self.reviews.iter_mut().find(|r| r.user == author) {
            Some(existing) => {
                existing.rating = rating;
                existing.comment = comment;
                ReviewOutcome::Updated
            }
            None => {
                let name = author_name.into();
                self.reviews.push(Review { id: Uuid::new_v4(), user: author, name, rating, comment });
                ReviewOutcome::Added
            }
        };
        self.recompute_rating();
        Ok(outcome)
    }

    pub fn remove_review(&mut self, review_id: Uuid) -> Result<Review, ProductError> {
        let pos = self.reviews.iter().position(|r| r.id == review_id).ok_or(ProductError::ReviewNotFound)?;
        let removed = self.reviews.remove(pos);
        self.recompute_rating();
        Ok(removed)
    }

    /// Ids of every hosted image the document owns, main and variation.
    pub fn image_ids(&self) -> BTreeSet<String> {
        self.images.iter()
            .chain(self.variations.iter().map(|v| &v.image))
            .filter(|img| !img.id.is_empty())
            .map(|img| img.id.clone())
            .collect()
    }

    fn recompute_rating(&mut self) {
        self.num_of_reviews = self.reviews.len() as u32;
        self.rating = if self.reviews.is_empty() {
            0.0
        } else {
            self.reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / self.reviews.len() as f64
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    RatingOutOfRange(u8),
    ReviewNotFound,
}

impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RatingOutOfRange(r) => write!(f, "Rating must be between 1 and 5, got {r}"),
            Self::ReviewNotFound => write!(f, "Review not found"),
        }
    }
}
