// crates/elixir-store-postgres/src/review_repo.rs
// ============================================================================
// Module: PostgresReviewRepository
// Description: `elixir_core::ReviewRepository` implementor.
// Purpose: Persist immutable `Review` rows. Reviews are append-only; there is
//          no update or delete method on the trait.
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::RepositoryError;
use elixir_core::Review;
use elixir_core::ReviewRepository;

use crate::error::StoreBackendError;

/// Postgres-backed [`ReviewRepository`].
pub struct PostgresReviewRepository {
    pool: Pool,
}

impl PostgresReviewRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for PostgresReviewRepository {
    async fn insert(&self, review: &Review) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(review).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO reviews (id, target_id, created_at, data) VALUES ($1, $2, $3, $4)",
                &[&review.id.get(), &review.target_id, &review.created_at.as_offset(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn list_for_target(&self, target_id: &str) -> Result<Vec<Review>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM reviews WHERE target_id = $1 ORDER BY created_at ASC", &[&target_id])
            .await
            .map_err(StoreBackendError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get(0);
                serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
            })
            .collect()
    }
}
