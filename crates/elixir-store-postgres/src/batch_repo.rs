// crates/elixir-store-postgres/src/batch_repo.rs
// ============================================================================
// Module: PostgresCriteriaBatchRepository
// Description: `elixir_core::CriteriaBatchRepository` implementor.
// Purpose: Persist `CriteriaBatch` rows and enforce "at most one active batch
//          per protocol" via `archive_all_for_protocol` ahead of a
//          re-extraction (spec.md §4.8).
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchId;
use elixir_core::CriteriaBatchRepository;
use elixir_core::ProtocolId;
use elixir_core::RepositoryError;

use crate::error::StoreBackendError;

/// Postgres-backed [`CriteriaBatchRepository`].
pub struct PostgresCriteriaBatchRepository {
    pool: Pool,
}

impl PostgresCriteriaBatchRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CriteriaBatchRepository for PostgresCriteriaBatchRepository {
    async fn insert(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(batch).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO criteria_batches (id, protocol_id, is_archived, created_at, data) VALUES ($1, $2, $3, $4, $5)",
                &[&batch.id.get(), &batch.protocol_id.get(), &batch.is_archived, &batch.created_at.as_offset(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn get(&self, id: CriteriaBatchId) -> Result<CriteriaBatch, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM criteria_batches WHERE id = $1", &[&id.get()])
            .await
            .map_err(StoreBackendError::from)?
            .ok_or_else(|| RepositoryError::NotFound { kind: "criteria_batch", id: id.to_string() })?;
        let data: serde_json::Value = row.get(0);
        serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
    }

    async fn active_for_protocol(&self, protocol_id: ProtocolId) -> Result<Option<CriteriaBatch>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt(
                "SELECT data FROM criteria_batches WHERE protocol_id = $1 AND is_archived = FALSE LIMIT 1",
                &[&protocol_id.get()],
            )
            .await
            .map_err(StoreBackendError::from)?;
        row.map(|row| {
            let data: serde_json::Value = row.get(0);
            serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
        })
        .transpose()
    }

    async fn update(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(batch).map_err(StoreBackendError::from)?;
        client
            .execute(
                "UPDATE criteria_batches SET is_archived = $2, data = $3 WHERE id = $1",
                &[&batch.id.get(), &batch.is_archived, &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn archive_all_for_protocol(&self, protocol_id: ProtocolId) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        client
            .execute(
                "UPDATE criteria_batches \
                 SET is_archived = TRUE, \
                     data = jsonb_set(data, '{is_archived}', 'true', true) \
                 WHERE protocol_id = $1 AND is_archived = FALSE",
                &[&protocol_id.get()],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn list_for_protocol(&self, protocol_id: ProtocolId) -> Result<Vec<CriteriaBatch>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query(
                "SELECT data FROM criteria_batches WHERE protocol_id = $1 ORDER BY created_at DESC",
                &[&protocol_id.get()],
            )
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
