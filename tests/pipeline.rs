//! Product pipeline behaviour against the in-memory image host and catalog store.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use opensase_catalog::catalog::{PipelineSettings, ProductFields, ProductPipeline, ReviewInput};
use opensase_catalog::domain::aggregates::{Product, ReviewOutcome};
use opensase_catalog::domain::value_objects::AuthorId;
use opensase_catalog::media::InMemoryImageStore;
use opensase_catalog::store::{CatalogStore, InMemoryCatalogStore};

const PNG: &str = "data:image/png;base64,aGVsbG8=";
const JPEG: &str = "data:image/jpeg;base64,d29ybGQ=";

struct Harness {
    images: Arc<InMemoryImageStore>,
    store: Arc<InMemoryCatalogStore>,
    pipeline: ProductPipeline,
}

fn harness() -> Harness {
    let images = Arc::new(InMemoryImageStore::new());
    let store = Arc::new(InMemoryCatalogStore::new());
    let pipeline = ProductPipeline::new(images.clone(), store.clone(), PipelineSettings::default());
    Harness { images, store, pipeline }
}

fn fields(body: Value) -> ProductFields {
    serde_json::from_value(body).expect("valid product body")
}

fn desk(images: Value) -> ProductFields {
    fields(json!({
        "name": "Standing desk",
        "description": "Oak top, steel frame",
        "price": "249.99",
        "stock": 4,
        "category": "Furniture",
        "subCategory": "Desks",
        "images": images,
    }))
}

async fn seeded(h: &Harness, images: usize) -> Product {
    let payloads: Vec<&str> = (0..images).map(|_| PNG).collect();
    h.pipeline.create(desk(json!(payloads))).await.expect("seed product")
}

#[tokio::test]
async fn create_uploads_each_image_once_in_order() {
    let h = harness();
    let product = h.pipeline.create(desk(json!([PNG, JPEG, PNG]))).await.unwrap();

    assert_eq!(h.images.upload_calls(), 3);
    assert_eq!(product.images.len(), 3);
    assert!(product.images[1].url.ends_with(".jpg"));
    assert!(product.images.iter().all(|img| h.images.contains(&img.id)));
    assert_eq!(product.price, Decimal::new(24999, 2));

    let stored = h.store.find_product(product.id).await.unwrap().unwrap();
    assert_eq!(stored.images, product.images);
}

#[tokio::test]
async fn failed_kth_upload_deletes_the_earlier_ones() {
    for k in 1..=4 {
        let h = harness();
        h.images.fail_upload_at(k);
        let err = h.pipeline.create(desk(json!([PNG, PNG, PNG, PNG]))).await.unwrap_err();

        assert_eq!(err.code(), "UPLOAD_ERROR");
        assert_eq!(h.images.upload_calls(), k);
        assert_eq!(h.images.delete_calls().len(), k - 1);
        assert!(h.images.is_empty());
        assert_eq!(h.store.product_count().await, 0);
    }
}

#[tokio::test]
async fn failed_variation_upload_rolls_back_main_images() {
    let h = harness();
    let mut body = desk(json!([PNG, PNG]));
    body.variations = Some(json!([{ "name": "Walnut", "color": "brown", "price": 20, "image": PNG }]));
    h.images.fail_upload_at(3);

    let err = h.pipeline.create(body).await.unwrap_err();
    assert_eq!(err.code(), "UPLOAD_ERROR");
    assert_eq!(h.images.delete_calls().len(), 2);
    assert!(h.images.is_empty());
    assert_eq!(h.store.product_count().await, 0);
}

#[tokio::test]
async fn invalid_input_has_no_side_effects() {
    let h = harness();

    let err = h.pipeline.create(desk(json!([PNG, "data:image/gif;base64,R0lG"]))).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(err.to_string().starts_with("images[1]"), "{err}");

    let mut body = desk(json!([PNG]));
    body.variations = Some(json!([{ "name": "", "price": 1 }]));
    assert_eq!(h.pipeline.create(body).await.unwrap_err().code(), "VALIDATION_ERROR");

    let missing = fields(json!({ "name": "Desk", "images": [PNG] }));
    assert_eq!(h.pipeline.create(missing).await.unwrap_err().code(), "VALIDATION_ERROR");

    assert_eq!(h.pipeline.create(desk(json!([]))).await.unwrap_err().code(), "VALIDATION_ERROR");

    assert_eq!(h.images.upload_calls(), 0);
    assert_eq!(h.store.product_count().await, 0);
}

#[tokio::test]
async fn create_normalizes_legacy_variations() {
    let h = harness();
    let mut body = desk(json!([PNG]));
    body.variations = Some(json!(["Red", { "name": "{\"name\":\"Blue\",\"price\":5}", "color": "X" }]));

    let product = h.pipeline.create(body).await.unwrap();
    assert_eq!(product.variations.len(), 2);
    assert_eq!(product.variations[0].name, "Red");
    assert_eq!(product.variations[0].price, Decimal::ZERO);
    assert!(product.variations[0].image.is_placeholder());
    assert_eq!(product.variations[1].name, "Blue");
    assert_eq!(product.variations[1].color, "X");
    assert_eq!(product.variations[1].price, Decimal::new(5, 0));
    assert_eq!(h.images.upload_calls(), 1);
}

#[tokio::test]
async fn persistence_failure_rolls_back_uploads() {
    let h = harness();
    h.store.fail_next_write();

    let err = h.pipeline.create(desk(json!([PNG, PNG]))).await.unwrap_err();
    assert_eq!(err.code(), "STORAGE_ERROR");
    assert_eq!(h.images.upload_calls(), 2);
    assert!(h.images.is_empty());
}

#[tokio::test]
async fn update_keeps_hosted_images_and_retires_dropped_ones() {
    let h = harness();
    let product = seeded(&h, 2).await;
    let (a, b) = (product.images[0].clone(), product.images[1].clone());

    // B is sent back by URL only; C is new.
    let update = fields(json!({ "images": [{ "url": b.url }, JPEG] }));
    let updated = h.pipeline.update(product.id, update).await.unwrap();

    assert_eq!(h.images.upload_calls(), 3);
    assert_eq!(updated.images.len(), 2);
    assert_eq!(updated.images[0], b);
    assert!(h.images.contains(&b.id));
    assert!(!h.images.contains(&a.id));
    assert!(h.images.contains(&updated.images[1].id));
    assert_eq!(h.images.delete_calls(), vec![a.id]);
}

#[tokio::test]
async fn update_with_only_hosted_images_uploads_nothing() {
    let h = harness();
    let product = seeded(&h, 2).await;
    let kept = serde_json::to_string(&[&product.images[1]]).unwrap();

    let updated = h.pipeline.update(product.id, fields(json!({ "images": kept }))).await.unwrap();
    assert_eq!(h.images.upload_calls(), 2);
    assert_eq!(updated.images, vec![product.images[1].clone()]);
    assert_eq!(h.images.delete_calls(), vec![product.images[0].id.clone()]);
}

#[tokio::test]
async fn update_upload_failure_leaves_old_images_intact() {
    let h = harness();
    let product = seeded(&h, 2).await;
    h.images.fail_upload_at(2);

    let update = fields(json!({ "images": [PNG, PNG] }));
    let err = h.pipeline.update(product.id, update).await.unwrap_err();
    assert_eq!(err.code(), "UPLOAD_ERROR");

    assert_eq!(h.images.len(), 2);
    assert!(product.images.iter().all(|img| h.images.contains(&img.id)));
    let stored = h.store.find_product(product.id).await.unwrap().unwrap();
    assert_eq!(stored.images, product.images);
}

#[tokio::test]
async fn update_scalars_only_touches_nothing_else() {
    let h = harness();
    let product = seeded(&h, 1).await;

    let updated = h.pipeline.update(product.id, fields(json!({ "price": "199.00", "stock": 0 }))).await.unwrap();
    assert_eq!(updated.price, Decimal::new(19900, 2));
    assert!(!updated.is_in_stock());
    assert_eq!(updated.images, product.images);
    assert_eq!(updated.name, product.name);
    assert!(h.images.delete_calls().is_empty());
}

#[tokio::test]
async fn update_variation_image_carries_over_or_is_replaced() {
    let h = harness();
    let mut body = desk(json!([PNG]));
    body.variations = Some(json!([
        { "name": "Oak", "image": PNG },
        { "name": "Walnut", "image": PNG },
    ]));
    let product = h.pipeline.create(body).await.unwrap();
    let (oak, walnut) = (product.variations[0].image.clone(), product.variations[1].image.clone());

    let update = fields(json!({ "variations": [
        { "name": "Oak", "price": 10 },
        { "name": "Walnut", "image": JPEG },
    ]}));
    let updated = h.pipeline.update(product.id, update).await.unwrap();

    assert_eq!(updated.variations[0].image, oak);
    assert_ne!(updated.variations[1].image, walnut);
    assert!(!h.images.contains(&walnut.id));
    assert!(h.images.contains(&oak.id));
}

#[tokio::test]
async fn update_persistence_failure_rolls_back_new_uploads() {
    let h = harness();
    let product = seeded(&h, 1).await;
    h.store.fail_next_write();

    let err = h.pipeline.update(product.id, fields(json!({ "images": [JPEG] }))).await.unwrap_err();
    assert_eq!(err.code(), "STORAGE_ERROR");
    assert_eq!(h.images.ids(), vec![product.images[0].id.clone()]);
}

#[tokio::test]
async fn images_of_another_product_cannot_be_claimed() {
    let h = harness();
    let a = seeded(&h, 1).await;
    let b = seeded(&h, 1).await;
    let foreign = serde_json::to_value(&a.images[0]).unwrap();

    let err = h.pipeline.update(b.id, fields(json!({ "images": [foreign.clone()] }))).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    let err = h
        .pipeline
        .update(b.id, fields(json!({ "variations": [{ "name": "Oak", "image": foreign }] })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    h.pipeline.delete(b.id).await.unwrap();
    assert!(h.images.contains(&a.images[0].id));
    let stored = h.store.find_product(a.id).await.unwrap().unwrap();
    assert_eq!(stored.images, a.images);
}

#[tokio::test]
async fn missing_product_is_not_found() {
    let h = harness();
    let id = Uuid::new_v4();
    assert_eq!(h.pipeline.update(id, fields(json!({ "images": [PNG] }))).await.unwrap_err().code(), "NOT_FOUND");
    assert_eq!(h.pipeline.delete(id).await.unwrap_err().code(), "NOT_FOUND");
    assert_eq!(h.images.upload_calls(), 0);
}

#[tokio::test]
async fn delete_removes_every_owned_image() {
    let h = harness();
    let mut body = desk(json!([PNG, PNG]));
    body.variations = Some(json!([{ "name": "Oak", "image": PNG }]));
    let product = h.pipeline.create(body).await.unwrap();
    assert_eq!(h.images.len(), 3);

    let deleted = h.pipeline.delete(product.id).await.unwrap();
    assert!(deleted.orphaned_images.is_empty());
    assert!(h.images.is_empty());
    assert_eq!(h.store.product_count().await, 0);
}

#[tokio::test]
async fn delete_reports_images_it_could_not_remove() {
    let h = harness();
    let product = seeded(&h, 2).await;
    h.images.fail_deletes(true);

    let deleted = h.pipeline.delete(product.id).await.unwrap();
    assert_eq!(deleted.orphaned_images.len(), 2);
    assert_eq!(h.store.product_count().await, 0);
}

fn review(author: &str, rating: u8) -> ReviewInput {
    ReviewInput { author: AuthorId::new(author), author_name: author.to_uppercase(), rating, comment: "ok".into() }
}

#[tokio::test]
async fn reviews_keep_aggregates_in_step() {
    let h = harness();
    let product = seeded(&h, 1).await;

    let (_, outcome) = h.pipeline.add_or_update_review(product.id, review("ada", 5)).await.unwrap();
    assert_eq!(outcome, ReviewOutcome::Added);
    let (p, _) = h.pipeline.add_or_update_review(product.id, review("bob", 2)).await.unwrap();
    assert_eq!(p.num_of_reviews(), 2);
    assert!((p.rating() - 3.5).abs() < f64::EPSILON);

    let (p, outcome) = h.pipeline.add_or_update_review(product.id, review(" ada ", 3)).await.unwrap();
    assert_eq!(outcome, ReviewOutcome::Updated);
    assert_eq!(p.num_of_reviews(), 2);
    assert!((p.rating() - 2.5).abs() < f64::EPSILON);

    for id in p.reviews().iter().map(|r| r.id).collect::<Vec<_>>() {
        h.pipeline.delete_review(product.id, id).await.unwrap();
    }
    let stored = h.store.find_product(product.id).await.unwrap().unwrap();
    assert_eq!(stored.num_of_reviews(), 0);
    assert_eq!(stored.rating(), 0.0);
}

#[tokio::test]
async fn review_errors() {
    let h = harness();
    let product = seeded(&h, 1).await;
    let missing = Uuid::new_v4();

    assert_eq!(h.pipeline.add_or_update_review(missing, review("ada", 4)).await.unwrap_err().code(), "NOT_FOUND");
    let err = h.pipeline.add_or_update_review(product.id, review("ada", 9)).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(h.pipeline.delete_review(product.id, missing).await.unwrap_err().code(), "NOT_FOUND");
}
