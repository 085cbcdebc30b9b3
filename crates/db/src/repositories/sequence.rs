use async_trait::async_trait;
use chrono::{Datelike, Utc};
use sqlx::Row;

use parapheur_core::sequence::{format_reference, ReferenceSequence, SequenceError};

use crate::DbPool;

/// Database-backed reference sequence with one counter row per
/// (code, year). The upsert increment is atomic, so two concurrent
/// registrations never share a number.
pub struct SqlReferenceSequence {
    pool: DbPool,
}

impl SqlReferenceSequence {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceSequence for SqlReferenceSequence {
    async fn next_reference(&self, code: &str) -> Result<String, SequenceError> {
        let year = Utc::now().year();

        let row = sqlx::query(
            "INSERT INTO reference_sequence (code, year, next_value) VALUES (?, ?, 2)
             ON CONFLICT(code, year) DO UPDATE SET next_value = next_value + 1
             RETURNING next_value",
        )
        .bind(code)
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SequenceError::Unavailable(e.to_string()))?;

        let next_value: i64 =
            row.try_get("next_value").map_err(|e| SequenceError::Unavailable(e.to_string()))?;
        // next_value is the counter after reservation; the reserved number
        // precedes it.
        let reserved = u32::try_from(next_value - 1).map_err(|_| {
            SequenceError::Unavailable(format!(
                "reference counter for `{code}/{year}` is out of range: {next_value}"
            ))
        })?;
        Ok(format_reference(code, year, reserved))
    }
}
