// crates/elixir-store-postgres/src/checkpoint_store.rs
// ============================================================================
// Module: PostgresCheckpointStore
// Description: `elixir_core::CheckpointStore` implementor.
// Purpose: Persist one row per `(thread_id, node_name)`, written atomically
//          alongside each node's own domain writes (spec.md §4.6).
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::CheckpointError;
use elixir_core::CheckpointStore;
use elixir_core::PipelineCheckpoint;
use elixir_core::ProtocolId;

use crate::error::StoreBackendError;

/// Postgres-backed [`CheckpointStore`].
pub struct PostgresCheckpointStore {
    pool: Pool,
}

impl PostgresCheckpointStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn node_name_label(checkpoint: &PipelineCheckpoint) -> String {
    serde_json::to_value(checkpoint.node_name).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn put(&self, checkpoint: &PipelineCheckpoint) -> Result<(), CheckpointError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(checkpoint).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO pipeline_checkpoints (thread_id, node_name, written_at, data) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (thread_id, node_name) DO UPDATE SET written_at = EXCLUDED.written_at, data = EXCLUDED.data",
                &[&checkpoint.thread_id.get(), &node_name_label(checkpoint), &checkpoint.written_at.as_offset(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn list_for_protocol(&self, thread_id: ProtocolId) -> Result<Vec<PipelineCheckpoint>, CheckpointError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM pipeline_checkpoints WHERE thread_id = $1", &[&thread_id.get()])
            .await
            .map_err(StoreBackendError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get(0);
                serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
            })
            .collect()
    }

    async fn clear_for_protocol(&self, thread_id: ProtocolId) -> Result<(), CheckpointError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        client
            .execute("DELETE FROM pipeline_checkpoints WHERE thread_id = $1", &[&thread_id.get()])
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }
}
