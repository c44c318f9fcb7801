// crates/elixir-store-postgres/src/protocol_repo.rs
// ============================================================================
// Module: PostgresProtocolRepository
// Description: `elixir_core::ProtocolRepository` implementor.
// Purpose: Persist `Protocol` rows as a typed status/updated_at prefix plus a
//          jsonb payload, and apply lazy terminal-state archival on read.
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::Protocol;
use elixir_core::ProtocolId;
use elixir_core::ProtocolRepository;
use elixir_core::RepositoryError;
use elixir_core::Timestamp;

use crate::error::StoreBackendError;

/// Postgres-backed [`ProtocolRepository`].
pub struct PostgresProtocolRepository {
    pool: Pool,
}

impl PostgresProtocolRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProtocolRepository for PostgresProtocolRepository {
    async fn insert(&self, protocol: &Protocol) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(protocol).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO protocols (id, status, updated_at, data) VALUES ($1, $2, $3, $4)",
                &[&protocol.id.get(), &status_label(protocol), &protocol.updated_at.as_offset(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn get(&self, id: ProtocolId) -> Result<Protocol, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM protocols WHERE id = $1", &[&id.get()])
            .await
            .map_err(StoreBackendError::from)?
            .ok_or_else(|| RepositoryError::NotFound { kind: "protocol", id: id.to_string() })?;

        let data: serde_json::Value = row.get(0);
        let mut protocol: Protocol = serde_json::from_value(data).map_err(StoreBackendError::from)?;

        if protocol.archive_if_eligible(Timestamp::now()) {
            self.update(&protocol).await?;
        }
        Ok(protocol)
    }

    async fn update(&self, protocol: &Protocol) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(protocol).map_err(StoreBackendError::from)?;
        client
            .execute(
                "UPDATE protocols SET status = $2, updated_at = $3, data = $4 WHERE id = $1",
                &[&protocol.id.get(), &status_label(protocol), &protocol.updated_at.as_offset(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Protocol>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query(
                "SELECT data FROM protocols ORDER BY updated_at DESC LIMIT $1 OFFSET $2",
                &[&i64::from(limit), &i64::from(offset)],
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

fn status_label(protocol: &Protocol) -> String {
    serde_json::to_value(protocol.status).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}
