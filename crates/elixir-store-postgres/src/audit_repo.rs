// crates/elixir-store-postgres/src/audit_repo.rs
// ============================================================================
// Module: PostgresAuditLogRepository
// Description: `elixir_core::AuditLogRepository` implementor.
// Purpose: Persist append-only `AuditLog` rows and serve the integrity
//          checker's system-wide recency scan (spec.md §4.9).
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::AuditLog;
use elixir_core::AuditLogId;
use elixir_core::AuditLogRepository;
use elixir_core::RepositoryError;

use crate::error::StoreBackendError;

/// Postgres-backed [`AuditLogRepository`].
pub struct PostgresAuditLogRepository {
    pool: Pool,
}

impl PostgresAuditLogRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn target_type_label(entry: &AuditLog) -> String {
    serde_json::to_value(entry.target_type).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn insert(&self, entry: &AuditLog) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(entry).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO audit_logs (id, target_type, target_id, created_at, data) VALUES ($1, $2, $3, $4, $5)",
                &[&entry.id.get(), &target_type_label(entry), &entry.target_id, &entry.created_at.as_offset(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn get(&self, id: AuditLogId) -> Result<AuditLog, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM audit_logs WHERE id = $1", &[&id.get()])
            .await
            .map_err(StoreBackendError::from)?
            .ok_or_else(|| RepositoryError::NotFound { kind: "audit_log", id: id.to_string() })?;
        let data: serde_json::Value = row.get(0);
        serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
    }

    async fn list_for_target(&self, target_id: &str) -> Result<Vec<AuditLog>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM audit_logs WHERE target_id = $1 ORDER BY created_at DESC", &[&target_id])
            .await
            .map_err(StoreBackendError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get(0);
                serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
            })
            .collect()
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLog>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM audit_logs ORDER BY created_at DESC LIMIT $1", &[&i64::from(limit)])
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
