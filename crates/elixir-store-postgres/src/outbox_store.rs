// crates/elixir-store-postgres/src/outbox_store.rs
// ============================================================================
// Module: PostgresOutboxStore
// Description: `elixir_core::OutboxStore` implementor.
// Purpose: Own the `FOR UPDATE SKIP LOCKED` claim query so concurrent
//          consumers never double-claim a row (spec.md §8 invariant 6).
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::OutboxError;
use elixir_core::OutboxEvent;
use elixir_core::OutboxEventId;
use elixir_core::OutboxStatus;
use elixir_core::OutboxStore;
use elixir_core::Timestamp;
use elixir_core::backoff_for_attempt;
use elixir_core::domain::outbox_event::DEFAULT_MAX_ATTEMPTS;

use crate::error::StoreBackendError;

/// Postgres-backed [`OutboxStore`].
pub struct PostgresOutboxStore {
    pool: Pool,
}

impl PostgresOutboxStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn event_type_label(event: &OutboxEvent) -> String {
    serde_json::to_value(event.event_type).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

fn status_label(status: OutboxStatus) -> String {
    serde_json::to_value(status).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(event).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO outbox_events (id, event_type, status, next_retry_at, created_at, data) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &event.id.get(),
                    &event_type_label(event),
                    &status_label(event.status),
                    &event.next_retry_at.map(|ts| ts.as_offset()),
                    &event.created_at.as_offset(),
                    &data,
                ],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn claim_batch(&self, limit: u32) -> Result<Vec<OutboxEvent>, OutboxError> {
        let mut client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let transaction = client.transaction().await.map_err(StoreBackendError::from)?;

        let now = Timestamp::now();
        let rows = transaction
            .query(
                "SELECT data FROM outbox_events \
                 WHERE status IN ('pending', 'failed') \
                   AND (next_retry_at IS NULL OR next_retry_at <= $1) \
                 ORDER BY created_at ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED",
                &[&now.as_offset(), &i64::from(limit)],
            )
            .await
            .map_err(StoreBackendError::from)?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            let data: serde_json::Value = row.get(0);
            let mut event: OutboxEvent = serde_json::from_value(data).map_err(StoreBackendError::from)?;
            event.mark_claimed();
            let updated = serde_json::to_value(&event).map_err(StoreBackendError::from)?;
            transaction
                .execute(
                    "UPDATE outbox_events SET status = $2, data = $3 WHERE id = $1",
                    &[&event.id.get(), &status_label(event.status), &updated],
                )
                .await
                .map_err(StoreBackendError::from)?;
            claimed.push(event);
        }

        transaction.commit().await.map_err(StoreBackendError::from)?;
        Ok(claimed)
    }

    async fn mark_delivered(&self, id: OutboxEventId) -> Result<(), OutboxError> {
        let mut event = self.fetch(id).await?;
        event.mark_delivered();
        self.persist(&event).await
    }

    async fn mark_failed(&self, id: OutboxEventId, error: &str) -> Result<(), OutboxError> {
        let mut event = self.fetch(id).await?;
        let backoff = backoff_for_attempt(event.attempts + 1);
        event.mark_failed(error, DEFAULT_MAX_ATTEMPTS, backoff);
        self.persist(&event).await
    }

    async fn list_dead_letters(&self) -> Result<Vec<OutboxEvent>, OutboxError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM outbox_events WHERE status = 'dead_letter' ORDER BY created_at ASC", &[])
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

impl PostgresOutboxStore {
    async fn fetch(&self, id: OutboxEventId) -> Result<OutboxEvent, OutboxError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM outbox_events WHERE id = $1", &[&id.get()])
            .await
            .map_err(StoreBackendError::from)?
            .ok_or_else(|| StoreBackendError(format!("outbox event {id} not found")))?;
        let data: serde_json::Value = row.get(0);
        serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
    }

    async fn persist(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(event).map_err(StoreBackendError::from)?;
        client
            .execute(
                "UPDATE outbox_events SET status = $2, next_retry_at = $3, data = $4 WHERE id = $1",
                &[&event.id.get(), &status_label(event.status), &event.next_retry_at.map(|ts| ts.as_offset()), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }
}
