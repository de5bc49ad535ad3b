//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    #[serde(alias = "category")]
    pub name: String,
    pub sub_category: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn create(name: impl Into<String>, sub_category: Vec<String>) -> Result<Self, CategoryError> {
        let name = name.into().trim().to_string();
        if name.is_empty() { return Err(CategoryError::MissingName); }
        let sub_category: Vec<String> = sub_category.into_iter().map(|s| s.trim().to_string()).collect();
        if sub_category.is_empty() || sub_category.iter().any(String::is_empty) {
            return Err(CategoryError::EmptySubCategory);
        }
        Ok(Self { id: Uuid::now_v7(), name, sub_category, created_at: Utc::now() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CategoryError { MissingName, EmptySubCategory }
impl std::error::Error for CategoryError {}
impl std::fmt::Display for CategoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Please enter product category"),
            Self::EmptySubCategory => write!(f, "Please enter product sub-category"),
        }
    }
}
