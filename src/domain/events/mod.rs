//! Domain events
use serde::Serialize;
use uuid::Uuid;

/// Published on [`CatalogEvent::SUBJECT`] after a mutation has been persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    ProductCreated { product_id: Uuid, name: String },
    ProductUpdated { product_id: Uuid },
    ProductDeleted { product_id: Uuid, orphaned_images: Vec<String> },
    ReviewsChanged { product_id: Uuid, rating: f64, num_of_reviews: u32 },
    CategoryCreated { category_id: Uuid, name: String },
    CategoryDeleted { category_id: Uuid },
}

impl CatalogEvent {
    pub const SUBJECT: &'static str = "catalog.events";

    pub fn product_id(&self) -> Option<Uuid> {
        match self {
            Self::ProductCreated { product_id, .. }
            | Self::ProductUpdated { product_id }
            | Self::ProductDeleted { product_id, .. }
            | Self::ReviewsChanged { product_id, .. } => Some(*product_id),
            Self::CategoryCreated { .. } | Self::CategoryDeleted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(CatalogEvent::ProductUpdated { product_id: id }).unwrap();
        assert_eq!(json["type"], "product_updated");
        assert_eq!(CatalogEvent::ProductUpdated { product_id: id }.product_id(), Some(id));
    }
}
