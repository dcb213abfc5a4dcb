//! Database operations for the collections table.

use std::collections::HashSet;

use binder_engine::wire::CollectionRow;
use binder_engine::Timestamp;
use sqlx::{PgPool, Row};

use crate::error::{AppError, Result};

/// A stored row from the database.
#[derive(Debug)]
pub struct StoredRow {
    pub card_id: String,
    pub normal_count: i64,
    pub foil_count: i64,
    #[allow(dead_code)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredRow {
            card_id: row.try_get("card_id")?,
            normal_count: row.try_get("normal_count")?,
            foil_count: row.try_get("foil_count")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRow {
    /// Convert to the wire row, rejecting counts a client cannot hold.
    pub fn to_row(&self) -> std::result::Result<CollectionRow, binder_engine::Error> {
        let count = |value: i64| {
            u32::try_from(value).map_err(|_| binder_engine::Error::CountOutOfRange {
                card_id: self.card_id.clone(),
                value,
            })
        };
        Ok(CollectionRow {
            card_id: self.card_id.clone(),
            normal_count: count(self.normal_count)?,
            foil_count: count(self.foil_count)?,
        })
    }
}

/// Check a replacement snapshot before it touches the database.
///
/// Rows with both counts at zero are dropped, matching the "no empty
/// entries" rule. A card listed twice is rejected.
pub fn normalize_rows(rows: Vec<CollectionRow>) -> Result<Vec<CollectionRow>> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        if row.card_id.is_empty() {
            return Err(AppError::BadRequest("Card ID must not be empty".to_string()));
        }
        if !seen.insert(row.card_id.clone()) {
            return Err(AppError::BadRequest(format!(
                "Card '{}' is listed more than once",
                row.card_id
            )));
        }
        if row.normal_count > 0 || row.foil_count > 0 {
            kept.push(row);
        }
    }

    Ok(kept)
}

/// Fetch every row of a user.
pub async fn fetch_rows(pool: &PgPool, user_id: &str) -> Result<Vec<CollectionRow>> {
    let stored: Vec<StoredRow> = sqlx::query_as(
        r#"
        SELECT card_id, normal_count, foil_count, updated_at
        FROM collections
        WHERE user_id = $1
        ORDER BY card_id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let rows = stored
        .iter()
        .map(StoredRow::to_row)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace every row of a user in one transaction (delete-then-insert).
///
/// Returns the write time in milliseconds since the epoch.
pub async fn replace_rows(pool: &PgPool, user_id: &str, rows: &[CollectionRow]) -> Result<Timestamp> {
    let now = chrono::Utc::now();
    let card_ids: Vec<String> = rows.iter().map(|r| r.card_id.clone()).collect();
    let normal_counts: Vec<i64> = rows.iter().map(|r| i64::from(r.normal_count)).collect();
    let foil_counts: Vec<i64> = rows.iter().map(|r| i64::from(r.foil_count)).collect();

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM collections WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if !rows.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO collections (user_id, card_id, normal_count, foil_count, updated_at)
            SELECT $1, card_id, normal_count, foil_count, $5
            FROM UNNEST($2::text[], $3::bigint[], $4::bigint[])
                AS t(card_id, normal_count, foil_count)
            "#,
        )
        .bind(user_id)
        .bind(&card_ids)
        .bind(&normal_counts)
        .bind(&foil_counts)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(user_id = %user_id, rows = rows.len(), "Replaced collection rows");
    Ok(now.timestamp_millis().max(0) as Timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(card_id: &str, normal: u32, foil: u32) -> CollectionRow {
        CollectionRow {
            card_id: card_id.to_string(),
            normal_count: normal,
            foil_count: foil,
        }
    }

    #[test]
    fn test_normalize_drops_empty_rows() {
        let rows = normalize_rows(vec![row("a", 1, 0), row("b", 0, 0), row("c", 0, 2)]).unwrap();
        assert_eq!(rows, vec![row("a", 1, 0), row("c", 0, 2)]);
    }

    #[test]
    fn test_normalize_rejects_duplicates() {
        let err = normalize_rows(vec![row("a", 1, 0), row("a", 2, 0)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_normalize_rejects_empty_id() {
        let err = normalize_rows(vec![row("", 1, 0)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_stored_row_conversion() {
        let stored = StoredRow {
            card_id: "a".into(),
            normal_count: 3,
            foil_count: 1,
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(stored.to_row().unwrap(), row("a", 3, 1));

        let negative = StoredRow {
            normal_count: -1,
            ..stored
        };
        assert_eq!(
            negative.to_row().unwrap_err(),
            binder_engine::Error::CountOutOfRange {
                card_id: "a".into(),
                value: -1
            }
        );
    }
}
