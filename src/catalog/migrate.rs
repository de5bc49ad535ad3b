//! One-off rewrite of stored variations into the canonical object form.

use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::variations::from_stored;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigratedProduct {
    pub id: Uuid,
    pub name: String,
    pub before: usize,
    pub after: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub scanned: usize,
    pub dry_run: bool,
    pub migrated: Vec<MigratedProduct>,
}

/// Canonical form of a stored `variations` value, or `None` if it already is canonical.
///
/// Every stored entry survives: entries without a usable name get a
/// positional one rather than being dropped.
pub fn canonicalize(raw: &Value) -> Option<Value> {
    let canonical = serde_json::to_value(from_stored(raw)).ok()?;
    (canonical != *raw).then_some(canonical)
}

fn entry_count(raw: &Value) -> usize {
    match raw {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Scans every product and rewrites legacy variations. With `dry_run` the
/// report is produced but nothing is written.
pub async fn migrate_variations(pool: &PgPool, dry_run: bool) -> Result<MigrationReport, StoreError> {
    let rows: Vec<(Uuid, Option<String>, Option<Value>)> =
        sqlx::query_as("SELECT id, doc->>'name', doc->'variations' FROM products ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    let mut report = MigrationReport { scanned: rows.len(), dry_run, ..Default::default() };
    for (id, name, raw) in rows {
        let raw = raw.unwrap_or(Value::Null);
        let Some(canonical) = canonicalize(&raw) else { continue };
        let entry = MigratedProduct {
            id,
            name: name.unwrap_or_default(),
            before: entry_count(&raw),
            after: entry_count(&canonical),
        };

        if !dry_run {
            sqlx::query(
                "UPDATE products SET doc = jsonb_set(doc, '{variations}', $2), updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(Json(&canonical))
            .execute(pool)
            .await?;
        }
        tracing::info!(
            product_id = %entry.id,
            name = %entry.name,
            before = entry.before,
            after = entry.after,
            dry_run,
            "variations migrated"
        );
        report.migrated.push(entry);
    }

    tracing::info!(scanned = report.scanned, migrated = report.migrated.len(), dry_run, "variation migration finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_strings_are_rewritten() {
        let migrated = canonicalize(&json!(["Red", "Blue"])).unwrap();
        assert_eq!(migrated[0]["name"], "Red");
        assert_eq!(migrated[1]["image"], json!({"public_id": "", "url": ""}));
        assert_eq!(entry_count(&migrated), 2);
    }

    #[test]
    fn test_double_encoded_names_are_rewritten() {
        let raw = json!([{"name": "{\"name\":\"Blue\",\"price\":5}", "color": "navy"}]);
        let migrated = canonicalize(&raw).unwrap();
        assert_eq!(migrated[0]["name"], "Blue");
        assert_eq!(migrated[0]["color"], "navy");
    }

    #[test]
    fn test_unnamed_entries_are_kept() {
        let raw = json!(["Red", {"name": ""}, {"colour": "red"}, {"name": "Blue", "price": -2}]);
        let migrated = canonicalize(&raw).unwrap();
        assert_eq!(entry_count(&migrated), entry_count(&raw));
        assert_eq!(migrated[1]["name"], "Variation 2");
        assert_eq!(migrated[2]["name"], r#"{"colour":"red"}"#);
        assert_eq!(migrated[3]["price"], "0");
        assert_eq!(canonicalize(&migrated), None);
    }

    #[test]
    fn test_canonical_documents_are_left_alone() {
        let canonical = canonicalize(&json!(["Red"])).unwrap();
        assert_eq!(canonicalize(&canonical), None);
        assert_eq!(canonicalize(&json!([])), None);
    }
}
