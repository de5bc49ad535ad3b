//! Product mutations.
//!
//! Every mutation is one linear sequence on the caller's task:
//! validate, upload, persist, then clean up. Nothing is uploaded until all
//! input has been validated, every upload is tracked by an [`UploadSaga`],
//! and images the saved record stopped referencing are deleted only after
//! the record has been persisted.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use ::validator::{Validate, ValidationError, ValidationErrors};

use super::saga::{retire, UploadSaga};
use super::validator::{validate as validate_image, ImageRejection, DEFAULT_MAX_SIZE_KB};
use super::variations::{self, VariationDraft};
use crate::domain::aggregates::{Product, ReviewOutcome, ScalarPatch, Variation};
use crate::domain::value_objects::{AuthorId, EmbeddedImage, ImageRef};
use crate::media::{ImageStore, MediaError};
use crate::store::CatalogStore;
use crate::{CatalogError, Result};

/// Incoming create/update body. Every field is optional here; `create`
/// enforces the required ones, `update` only touches what is present.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    #[validate(custom = "not_blank")]
    pub name: Option<String>,
    #[validate(custom = "not_blank")]
    pub description: Option<String>,
    #[validate(custom = "positive_price")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, max = 4294967295, message = "Stock must be a non-negative integer"))]
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    /// One inline payload, or a list of payloads and/or hosted `{url}` objects.
    pub images: Option<Value>,
    pub variations: Option<Value>,
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::from("must not be empty"));
        return Err(err);
    }
    Ok(())
}

fn positive_price(price: &Decimal) -> std::result::Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        let mut err = ValidationError::new("price_not_positive");
        err.message = Some(Cow::from("Price must be greater than 0"));
        return Err(err);
    }
    Ok(())
}

fn validation_message(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e.message.as_deref().unwrap_or(&*e.code);
                format!("{field}: {message}")
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}

impl ProductFields {
    fn checked(&self) -> Result<ScalarPatch> {
        self.validate().map_err(|e| CatalogError::Validation(validation_message(&e)))?;
        let trimmed = |v: &Option<String>| v.as_deref().map(|s| s.trim().to_string());
        Ok(ScalarPatch {
            name: trimmed(&self.name),
            description: trimmed(&self.description),
            price: self.price,
            stock: self.stock.and_then(|s| u32::try_from(s).ok()),
            category: trimmed(&self.category),
            sub_category: trimmed(&self.sub_category),
        })
    }
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub folder: String,
    pub max_image_kb: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { folder: "products".to_string(), max_image_kb: DEFAULT_MAX_SIZE_KB }
    }
}

#[derive(Clone, Debug)]
pub struct ReviewInput {
    pub author: AuthorId,
    pub author_name: String,
    pub rating: u8,
    pub comment: String,
}

#[derive(Clone, Debug)]
pub struct DeletedProduct {
    pub product: Product,
    /// Images that could not be removed from the image host.
    pub orphaned_images: Vec<String>,
}

/// One entry of the main image list after validation.
#[derive(Clone, Debug, PartialEq)]
enum MainImage {
    New(EmbeddedImage),
    Hosted(ImageRef),
}

pub struct ProductPipeline {
    images: Arc<dyn ImageStore>,
    store: Arc<dyn CatalogStore>,
    settings: PipelineSettings,
}

impl ProductPipeline {
    pub fn new(images: Arc<dyn ImageStore>, store: Arc<dyn CatalogStore>, settings: PipelineSettings) -> Self {
        Self { images, store, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn create(&self, fields: ProductFields) -> Result<Product> {
        let patch = fields.checked()?;
        let (Some(name), Some(description), Some(price), Some(stock)) =
            (patch.name.clone(), patch.description.clone(), patch.price, patch.stock)
        else {
            return Err(CatalogError::Validation("name, description, price and stock are required".into()));
        };

        let main = match &fields.images {
            Some(raw) => self.main_images(raw, None)?,
            None => vec![],
        };
        if main.is_empty() {
            return Err(CatalogError::Validation("At least one product image is required".into()));
        }
        let drafts = match &fields.variations {
            Some(raw) => variations::normalize_with_limit(raw, &[], &BTreeSet::new(), self.settings.max_image_kb)?,
            None => vec![],
        };

        let mut saga = UploadSaga::new(Arc::clone(&self.images), self.settings.folder.clone());
        let uploaded = match upload_all(&mut saga, Some(main), Some(drafts)).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                saga.rollback().await;
                return Err(CatalogError::Upload(e));
            }
        };

        let mut product = Product::create(name, description, price, stock);
        product.apply(ScalarPatch {
            category: patch.category,
            sub_category: patch.sub_category,
            ..Default::default()
        });
        product.images = uploaded.0.unwrap_or_default();
        product.variations = uploaded.1.unwrap_or_default();

        match self.store.create_product(&product).await {
            Ok(saved) => {
                saga.commit();
                tracing::info!(
                    product_id = %saved.id,
                    images = saved.images.len(),
                    variations = saved.variations.len(),
                    "product created"
                );
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(
                    product_id = %product.id,
                    uploaded = ?saga.uploaded_ids(),
                    error = %e,
                    "persisting new product failed, rolling back uploads"
                );
                saga.rollback().await;
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: Uuid, fields: ProductFields) -> Result<Product> {
        let current = self.find(id).await?;
        let patch = fields.checked()?;
        let owned = current.image_ids();

        let main = match &fields.images {
            Some(raw) => {
                let main = self.main_images(raw, Some((&current.images, &owned)))?;
                if main.is_empty() {
                    return Err(CatalogError::Validation("At least one product image is required".into()));
                }
                Some(main)
            }
            None => None,
        };
        let drafts = match &fields.variations {
            Some(raw) => {
                let max_kb = self.settings.max_image_kb;
                Some(variations::normalize_with_limit(raw, &current.variations, &owned, max_kb)?)
            }
            None => None,
        };

        let mut saga = UploadSaga::new(Arc::clone(&self.images), self.settings.folder.clone());
        let (images, variations) = match upload_all(&mut saga, main, drafts).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                saga.rollback().await;
                return Err(CatalogError::Upload(e));
            }
        };

        let mut updated = current.clone();
        updated.apply(patch);
        if let Some(images) = images {
            updated.images = images;
        }
        if let Some(variations) = variations {
            updated.variations = variations;
        }

        let saved = match self.store.update_product(&updated).await {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                saga.rollback().await;
                return Err(CatalogError::NotFound("Product".into()));
            }
            Err(e) => {
                tracing::error!(
                    product_id = %id,
                    uploaded = ?saga.uploaded_ids(),
                    error = %e,
                    "persisting product update failed, rolling back uploads"
                );
                saga.rollback().await;
                return Err(e.into());
            }
        };
        saga.commit();

        let kept = saved.image_ids();
        let dropped: Vec<String> = owned.into_iter().filter(|id| !kept.contains(id)).collect();
        if !dropped.is_empty() {
            let failed = retire(self.images.as_ref(), dropped).await;
            if !failed.is_empty() {
                tracing::warn!(product_id = %id, orphaned = ?failed, "some replaced images were not deleted");
            }
        }
        tracing::info!(product_id = %id, "product updated");
        Ok(saved)
    }

    /// Removes the document, then every image it owned. Image failures do not
    /// undo the delete; they are returned for reporting.
    pub async fn delete(&self, id: Uuid) -> Result<DeletedProduct> {
        let product = self.find(id).await?;
        if !self.store.delete_product(id).await? {
            return Err(CatalogError::NotFound("Product".into()));
        }
        let orphaned_images = retire(self.images.as_ref(), product.image_ids()).await;
        if orphaned_images.is_empty() {
            tracing::info!(product_id = %id, "product deleted");
        } else {
            tracing::warn!(product_id = %id, orphaned = ?orphaned_images, "product deleted, some images were not");
        }
        Ok(DeletedProduct { product, orphaned_images })
    }

    pub async fn add_or_update_review(
        &self,
        product_id: Uuid,
        review: ReviewInput,
    ) -> Result<(Product, ReviewOutcome)> {
        let mut product = self.find(product_id).await?;
        let outcome = product
            .upsert_review(review.author, review.author_name, review.rating, review.comment)
            .map_err(|e| CatalogError::Validation(e.to_string()))?;
        let saved = self.save(&product).await?;
        tracing::info!(product_id = %product_id, ?outcome, rating = saved.rating(), "review recorded");
        Ok((saved, outcome))
    }

    pub async fn delete_review(&self, product_id: Uuid, review_id: Uuid) -> Result<Product> {
        let mut product = self.find(product_id).await?;
        product.remove_review(review_id).map_err(|_| CatalogError::NotFound("Review".into()))?;
        self.save(&product).await
    }

    async fn find(&self, id: Uuid) -> Result<Product> {
        self.store.find_product(id).await?.ok_or_else(|| CatalogError::NotFound("Product".into()))
    }

    async fn save(&self, product: &Product) -> Result<Product> {
        self.store.update_product(product).await?.ok_or_else(|| CatalogError::NotFound("Product".into()))
    }

    /// Validates the main image list. Hosted `{url}` entries are only
    /// accepted on update (`current` is the record's images and owned ids),
    /// and any id they carry must be one the record already owns.
    fn main_images(
        &self,
        raw: &Value,
        current: Option<(&[ImageRef], &BTreeSet<String>)>,
    ) -> Result<Vec<MainImage>> {
        image_entries(raw)
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let reject = |rejection| CatalogError::InvalidImage { field: format!("images[{i}]"), rejection };
                match (entry, current) {
                    (Value::String(s), _) => validate_image(s, self.settings.max_image_kb)
                        .map(MainImage::New)
                        .map_err(reject),
                    (Value::Object(map), Some((images, owned))) => {
                        let url = map
                            .get("url")
                            .and_then(Value::as_str)
                            .filter(|u| !u.is_empty())
                            .ok_or_else(|| reject(ImageRejection::InvalidFormat("hosted image without a url".into())))?;
                        let id = map
                            .get("public_id")
                            .or_else(|| map.get("id"))
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        if !id.is_empty() && !owned.contains(id) {
                            return Err(reject(ImageRejection::NotOwned(id.to_string())));
                        }
                        Ok(MainImage::Hosted(adopt_id(id, url, images)))
                    }
                    _ => Err(reject(ImageRejection::InvalidFormat("expected a base64 encoded image".into()))),
                }
            })
            .collect()
    }
}

/// A hosted entry sent without its id gets the id of the current image with the same URL.
fn adopt_id(id: &str, url: &str, current: &[ImageRef]) -> ImageRef {
    if id.is_empty() {
        if let Some(known) = current.iter().find(|img| img.url == url) {
            return known.clone();
        }
    }
    ImageRef::new(id, url)
}

/// Coerces the `images` field to a list: a JSON-array string is parsed,
/// any other string is a single payload.
fn image_entries(raw: &Value) -> Vec<Value> {
    match raw {
        Value::Null => vec![],
        Value::Array(items) => items.clone(),
        Value::String(s) if s.trim_start().starts_with('[') => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => vec![raw.clone()],
        },
        other => vec![other.clone()],
    }
}

type Uploaded = (Option<Vec<ImageRef>>, Option<Vec<Variation>>);

/// Uploads main images, then variation images, in input order.
async fn upload_all(
    saga: &mut UploadSaga,
    main: Option<Vec<MainImage>>,
    drafts: Option<Vec<VariationDraft>>,
) -> std::result::Result<Uploaded, MediaError> {
    let images = match main {
        Some(main) => {
            let mut hosted = Vec::with_capacity(main.len());
            for entry in main {
                hosted.push(match entry {
                    MainImage::New(payload) => saga.upload(&payload).await?,
                    MainImage::Hosted(image) => image,
                });
            }
            Some(hosted)
        }
        None => None,
    };

    let variations = match drafts {
        Some(drafts) => {
            let mut out = Vec::with_capacity(drafts.len());
            for draft in drafts {
                let uploaded = match draft.pending_upload() {
                    Some(payload) => Some(saga.upload(payload).await?),
                    None => None,
                };
                out.push(match uploaded {
                    Some(image) => draft.into_variation(image),
                    None => draft.settle(),
                });
            }
            Some(out)
        }
        None => None,
    };

    Ok((images, variations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_field_coercion() {
        assert_eq!(image_entries(&json!("data:image/png;base64,AA")).len(), 1);
        assert_eq!(image_entries(&json!(r#"[{"url":"u1"},{"url":"u2"}]"#)).len(), 2);
        assert_eq!(image_entries(&json!(["a", "b", "c"])).len(), 3);
        assert!(image_entries(&Value::Null).is_empty());
    }

    #[test]
    fn scalar_validation_only_checks_present_fields() {
        assert!(ProductFields::default().checked().is_ok());
        let bad = ProductFields { price: Some(Decimal::ZERO), stock: Some(-1), ..Default::default() };
        let err = bad.checked().unwrap_err().to_string();
        assert!(err.contains("price: Price must be greater than 0"), "{err}");
        assert!(err.contains("stock:"), "{err}");
        let blank = ProductFields { name: Some("  ".into()), ..Default::default() };
        assert_eq!(blank.checked().unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn hosted_entry_without_id_adopts_current_id() {
        let current = vec![ImageRef::new("products/b", "https://cdn/b.png")];
        assert_eq!(adopt_id("", "https://cdn/b.png", &current), current[0]);
        assert_eq!(adopt_id("", "https://elsewhere", &current), ImageRef::new("", "https://elsewhere"));
    }

    #[test]
    fn fields_deserialize_camel_case() {
        let fields: ProductFields = serde_json::from_value(json!({
            "name": "Desk",
            "price": "12.50",
            "stock": 3,
            "subCategory": "Standing",
            "images": ["data:image/png;base64,AA"]
        }))
        .unwrap();
        assert_eq!(fields.sub_category.as_deref(), Some("Standing"));
        assert_eq!(fields.price, Some(Decimal::new(1250, 2)));
    }
}
