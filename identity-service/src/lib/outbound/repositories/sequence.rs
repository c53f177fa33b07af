use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::user::errors::UserError;
use crate::domain::user::ports::SequenceAllocator;

/// Store-backed allocator for named, strictly increasing sequences.
///
/// The counter row is created lazily; the increment-and-fetch happens in a
/// single upsert, so the linearizability contract holds across any number
/// of processes sharing the database.
pub struct PostgresSequenceAllocator {
    pool: PgPool,
}

impl PostgresSequenceAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceAllocator for PostgresSequenceAllocator {
    async fn allocate_next(&self, sequence: &str) -> Result<i64, UserError> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, value)
            VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .bind(sequence)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok(value)
    }
}
