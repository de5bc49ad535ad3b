//! Variation normalization.
//!
//! Variations have been sent in several shapes over time:
//!
//! - a native array of `{name, color, price, image}` objects
//! - one comma-delimited string of bare names (`"Red, Blue"`)
//! - a string holding serialized JSON (`"[{\"name\":\"Red\"}]"`)
//! - array entries that are bare strings, or objects whose `name` is itself
//!   serialized JSON (`{"name": "{\"name\":\"Blue\",\"price\":5}", "color": "X"}`)
//!
//! All of them are classified into [`RawVariation`] and immediately turned
//! into [`VariationDraft`]s. Nothing past this module sees the raw shapes.

use std::collections::BTreeSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::validator::{self, ImageRejection, DEFAULT_MAX_SIZE_KB};
use crate::domain::aggregates::Variation;
use crate::domain::value_objects::{EmbeddedImage, ImageRef};
use crate::CatalogError;

/// One variation entry as received, before any field is interpreted.
#[derive(Clone, Debug, PartialEq)]
pub enum RawVariation {
    Bare(String),
    Structured(Map<String, Value>),
    /// `name` held serialized JSON; `inner` is what it decoded to.
    LegacyEncoded {
        inner: Map<String, Value>,
        outer: Map<String, Value>,
    },
}

/// Where a variation's image will come from.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSlot {
    /// New inline payload, already validated; must be uploaded.
    Upload(EmbeddedImage),
    /// Already hosted, carried over, or the empty placeholder.
    Keep(ImageRef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariationDraft {
    pub name: String,
    pub color: String,
    pub price: Decimal,
    pub image: ImageSlot,
}

impl VariationDraft {
    pub fn pending_upload(&self) -> Option<&EmbeddedImage> {
        match &self.image {
            ImageSlot::Upload(img) => Some(img),
            ImageSlot::Keep(_) => None,
        }
    }

    pub fn into_variation(self, image: ImageRef) -> Variation {
        Variation { name: self.name, color: self.color, price: self.price, image }
    }

    /// Converts without uploading; pending payloads become the placeholder.
    pub fn settle(self) -> Variation {
        let image = match &self.image {
            ImageSlot::Keep(img) => img.clone(),
            ImageSlot::Upload(_) => ImageRef::placeholder(),
        };
        self.into_variation(image)
    }
}

/// Normalizes `raw` against the record's current variations.
///
/// The result has one draft per input entry, in input order. `existing` only
/// supplies positional image carry-over for entries that omit an image.
pub fn normalize(raw: &Value, existing: &[Variation]) -> Result<Vec<VariationDraft>, CatalogError> {
    let owned: BTreeSet<String> = existing.iter().map(|v| v.image.id.clone()).filter(|id| !id.is_empty()).collect();
    normalize_with_limit(raw, existing, &owned, DEFAULT_MAX_SIZE_KB)
}

/// Hosted images may only carry an id from `owned`, the record's own image ids.
pub fn normalize_with_limit(
    raw: &Value,
    existing: &[Variation],
    owned: &BTreeSet<String>,
    max_size_kb: u64,
) -> Result<Vec<VariationDraft>, CatalogError> {
    let source = Source::Request { owned, max_size_kb };
    split_entries(raw)
        .into_iter()
        .enumerate()
        .map(|(i, entry)| resolve(i, entry, existing.get(i), &source))
        .collect()
}

/// Lenient reading of variations already in storage. Every entry is kept:
/// an empty name becomes `Variation <position>` and a negative price becomes 0.
pub fn from_stored(raw: &Value) -> Vec<Variation> {
    split_entries(raw)
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match resolve(i, entry, None, &Source::Stored) {
            Ok(draft) => draft.settle(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable stored variation, keeping a placeholder");
                Variation {
                    name: format!("Variation {}", i + 1),
                    color: String::new(),
                    price: Decimal::ZERO,
                    image: ImageRef::placeholder(),
                }
            }
        })
        .collect()
}

pub(crate) fn deserialize_stored<'de, D>(deserializer: D) -> Result<Vec<Variation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(from_stored(&raw))
}

/// Splits the top-level value into entries.
pub fn split_entries(raw: &Value) -> Vec<RawVariation> {
    match raw {
        Value::Null => vec![],
        Value::Array(items) => items.iter().map(classify).collect(),
        Value::Object(_) => vec![classify(raw)],
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return vec![];
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(parsed @ (Value::Array(_) | Value::Object(_))) => split_entries(&parsed),
                _ => trimmed.split(',').map(|part| RawVariation::Bare(part.trim().to_string())).collect(),
            }
        }
        Value::Bool(_) | Value::Number(_) => vec![RawVariation::Bare(raw.to_string())],
    }
}

fn classify(entry: &Value) -> RawVariation {
    match entry {
        Value::String(s) => match decode_object(s) {
            Some(map) => classify_object(map),
            None => RawVariation::Bare(s.trim().to_string()),
        },
        Value::Object(map) => classify_object(map.clone()),
        other => RawVariation::Bare(other.to_string()),
    }
}

fn classify_object(map: Map<String, Value>) -> RawVariation {
    match map.get("name") {
        None => RawVariation::Bare(Value::Object(map).to_string()),
        Some(Value::String(name)) => match decode_object(name).filter(has_name) {
            Some(inner) => RawVariation::LegacyEncoded { inner, outer: map },
            None => RawVariation::Structured(map),
        },
        Some(_) => RawVariation::Structured(map),
    }
}

/// Only a decoded object with a usable name counts as a double-encoded entry.
/// Anything else stays a plain name, so canonical output reads back unchanged.
fn has_name(map: &Map<String, Value>) -> bool {
    map.get("name").and_then(Value::as_str).is_some_and(|name| !name.trim().is_empty())
}

fn decode_object(s: &str) -> Option<Map<String, Value>> {
    let trimmed = s.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Where the entries being resolved came from.
enum Source<'a> {
    Request { owned: &'a BTreeSet<String>, max_size_kb: u64 },
    /// Already persisted: nothing is rejected and inline payloads are not uploaded.
    Stored,
}

fn resolve(
    index: usize,
    raw: RawVariation,
    prior: Option<&Variation>,
    source: &Source<'_>,
) -> Result<VariationDraft, CatalogError> {
    let position = index + 1;
    let invalid = |reason: &str| CatalogError::InvalidVariation { position, reason: reason.to_string() };
    let stored = matches!(source, Source::Stored);

    let (name, color, price, image) = match &raw {
        RawVariation::Bare(name) => (name.clone(), None, None, None),
        RawVariation::Structured(map) => (
            map.get("name").map(text).unwrap_or_default(),
            map.get("color"),
            map.get("price"),
            map.get("image"),
        ),
        // Inner name and price win; outer fields fill whatever the inner object lacks.
        RawVariation::LegacyEncoded { inner, outer } => (
            inner.get("name").map(text).unwrap_or_default(),
            present(inner, "color").or_else(|| present(outer, "color")),
            present(inner, "price").or_else(|| present(outer, "price")),
            present(inner, "image").or_else(|| present(outer, "image")),
        ),
    };

    let mut name = name.trim().to_string();
    if name.is_empty() {
        if !stored {
            return Err(invalid("name must not be empty"));
        }
        name = format!("Variation {position}");
        tracing::warn!(position, "stored variation without a name, using {name}");
    }
    let price = match parse_price(price) {
        Some(price) => price,
        None if stored => Decimal::ZERO,
        None => return Err(invalid("price must not be negative")),
    };
    let color = color.map(text).unwrap_or_default();

    let image = match image.and_then(|v| classify_image(index, v, prior, source).transpose()) {
        Some(slot) => slot?,
        None => ImageSlot::Keep(prior.map(|v| v.image.clone()).unwrap_or_default()),
    };

    Ok(VariationDraft { name, color, price, image })
}

/// `Ok(None)` means the entry carries no usable image.
fn classify_image(
    index: usize,
    value: &Value,
    prior: Option<&Variation>,
    source: &Source<'_>,
) -> Result<Option<ImageSlot>, CatalogError> {
    let reject = |rejection| CatalogError::InvalidImage { field: format!("variations[{index}].image"), rejection };
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => match source {
            Source::Stored => Ok(None),
            Source::Request { max_size_kb, .. } => validator::validate(s, *max_size_kb)
                .map(|img| Some(ImageSlot::Upload(img)))
                .map_err(reject),
        },
        Value::Object(map) => {
            let Some(url) = map.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()) else {
                return Ok(None);
            };
            let mut id = map
                .get("public_id")
                .or_else(|| map.get("id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if id.is_empty() {
                if let Some(prior) = prior.filter(|p| p.image.url == url) {
                    id = prior.image.id.clone();
                }
            } else if let Source::Request { owned, .. } = source {
                if !owned.contains(&id) {
                    return Err(reject(ImageRejection::NotOwned(id)));
                }
            }
            Ok(Some(ImageSlot::Keep(ImageRef::new(id, url))))
        }
        _ => Ok(None),
    }
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Missing or unparseable prices are 0; `None` only for negative prices.
fn parse_price(value: Option<&Value>) -> Option<Decimal> {
    let parsed = match value {
        Some(Value::Number(n)) => {
            let s = n.to_string();
            Decimal::from_str(&s).or_else(|_| Decimal::from_scientific(&s)).unwrap_or_default()
        }
        Some(Value::String(s)) => Decimal::from_str(s.trim()).unwrap_or_default(),
        _ => Decimal::ZERO,
    };
    (parsed >= Decimal::ZERO).then_some(parsed)
}
