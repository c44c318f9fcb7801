// crates/elixir-store-postgres/src/review_transaction.rs
// ============================================================================
// Module: PostgresReviewTransaction
// Description: `elixir_core::ReviewTransaction` implementor.
// Purpose: Commit a review action's target update, `Review` insert,
//          `AuditLog` insert, and `CriteriaBatch` update as one Postgres
//          transaction (spec.md §4.7: "Review action is a single atomic DB
//          transaction"; "steps 5 and 6 commit together or both roll back").
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

//! ## Overview
//! Every other repository in this crate checks out its own pooled
//! connection per call, which is correct for single-row reads and writes
//! but cannot span four rows atomically. This type checks out one
//! connection, opens a single `tokio_postgres::Transaction` over it (the
//! same idiom `criterion_repo::insert_many` and `entity_repo::insert_many`
//! already use for their own batch inserts), issues all four statements
//! against it, and commits once. A failure partway rolls back every prior
//! statement in the same call.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::AuditLog;
use elixir_core::Criterion;
use elixir_core::CriteriaBatch;
use elixir_core::Entity;
use elixir_core::RepositoryError;
use elixir_core::Review;
use elixir_core::ReviewTransaction;

use crate::error::StoreBackendError;

/// Postgres-backed [`ReviewTransaction`].
pub struct PostgresReviewTransaction {
    pool: Pool,
}

impl PostgresReviewTransaction {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn criterion_type_label(criterion: &Criterion) -> String {
    serde_json::to_value(criterion.criterion_type).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

fn target_type_label(entry: &AuditLog) -> String {
    serde_json::to_value(entry.target_type).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

#[async_trait]
impl ReviewTransaction for PostgresReviewTransaction {
    async fn commit_criterion_review(
        &self,
        criterion: &Criterion,
        review: &Review,
        audit_log: &AuditLog,
        batch: &CriteriaBatch,
    ) -> Result<(), RepositoryError> {
        let mut client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let transaction = client.transaction().await.map_err(StoreBackendError::from)?;

        let criterion_data = serde_json::to_value(criterion).map_err(StoreBackendError::from)?;
        transaction
            .execute(
                "UPDATE criteria SET criterion_type = $2, text = $3, data = $4 WHERE id = $1",
                &[&criterion.id.get(), &criterion_type_label(criterion), &criterion.text, &criterion_data],
            )
            .await
            .map_err(StoreBackendError::from)?;

        insert_review_and_audit(&transaction, review, audit_log).await?;
        update_batch(&transaction, batch).await?;

        transaction.commit().await.map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn commit_entity_review(
        &self,
        entity: &Entity,
        review: &Review,
        audit_log: &AuditLog,
        batch: &CriteriaBatch,
    ) -> Result<(), RepositoryError> {
        let mut client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let transaction = client.transaction().await.map_err(StoreBackendError::from)?;

        let entity_data = serde_json::to_value(entity).map_err(StoreBackendError::from)?;
        transaction
            .execute("UPDATE entities SET data = $2 WHERE id = $1", &[&entity.id.get(), &entity_data])
            .await
            .map_err(StoreBackendError::from)?;

        insert_review_and_audit(&transaction, review, audit_log).await?;
        update_batch(&transaction, batch).await?;

        transaction.commit().await.map_err(StoreBackendError::from)?;
        Ok(())
    }
}

async fn insert_review_and_audit(
    transaction: &tokio_postgres::Transaction<'_>,
    review: &Review,
    audit_log: &AuditLog,
) -> Result<(), RepositoryError> {
    let review_data = serde_json::to_value(review).map_err(StoreBackendError::from)?;
    transaction
        .execute(
            "INSERT INTO reviews (id, target_id, created_at, data) VALUES ($1, $2, $3, $4)",
            &[&review.id.get(), &review.target_id, &review.created_at.as_offset(), &review_data],
        )
        .await
        .map_err(StoreBackendError::from)?;

    let audit_data = serde_json::to_value(audit_log).map_err(StoreBackendError::from)?;
    transaction
        .execute(
            "INSERT INTO audit_logs (id, target_type, target_id, created_at, data) VALUES ($1, $2, $3, $4, $5)",
            &[&audit_log.id.get(), &target_type_label(audit_log), &audit_log.target_id, &audit_log.created_at.as_offset(), &audit_data],
        )
        .await
        .map_err(StoreBackendError::from)?;

    Ok(())
}

async fn update_batch(transaction: &tokio_postgres::Transaction<'_>, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
    let batch_data = serde_json::to_value(batch).map_err(StoreBackendError::from)?;
    transaction
        .execute(
            "UPDATE criteria_batches SET is_archived = $2, data = $3 WHERE id = $1",
            &[&batch.id.get(), &batch.is_archived, &batch_data],
        )
        .await
        .map_err(StoreBackendError::from)?;
    Ok(())
}
