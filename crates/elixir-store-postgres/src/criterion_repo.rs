// crates/elixir-store-postgres/src/criterion_repo.rs
// ============================================================================
// Module: PostgresCriterionRepository
// Description: `elixir_core::CriterionRepository` implementor.
// Purpose: Persist `Criterion` rows (with a `(batch_id, criterion_type,
//          lower(text))` uniqueness constraint backing spec.md §8 invariant
//          2) and each criterion's `ExpressionTree`.
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::Criterion;
use elixir_core::CriteriaBatchId;
use elixir_core::CriterionId;
use elixir_core::CriterionRepository;
use elixir_core::ExpressionTree;
use elixir_core::RepositoryError;

use crate::error::StoreBackendError;

/// Postgres-backed [`CriterionRepository`].
pub struct PostgresCriterionRepository {
    pool: Pool,
}

impl PostgresCriterionRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn criterion_type_label(criterion: &Criterion) -> String {
    serde_json::to_value(criterion.criterion_type).ok().and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default()
}

#[async_trait]
impl CriterionRepository for PostgresCriterionRepository {
    async fn insert_many(&self, criteria: &[Criterion]) -> Result<(), RepositoryError> {
        if criteria.is_empty() {
            return Ok(());
        }
        let mut client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let transaction = client.transaction().await.map_err(StoreBackendError::from)?;

        for criterion in criteria {
            let data = serde_json::to_value(criterion).map_err(StoreBackendError::from)?;
            transaction
                .execute(
                    "INSERT INTO criteria (id, batch_id, criterion_type, text, data) VALUES ($1, $2, $3, $4, $5)",
                    &[&criterion.id.get(), &criterion.batch_id.get(), &criterion_type_label(criterion), &criterion.text, &data],
                )
                .await
                .map_err(map_insert_error)?;
        }

        transaction.commit().await.map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn get(&self, id: CriterionId) -> Result<Criterion, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM criteria WHERE id = $1", &[&id.get()])
            .await
            .map_err(StoreBackendError::from)?
            .ok_or_else(|| RepositoryError::NotFound { kind: "criterion", id: id.to_string() })?;
        let data: serde_json::Value = row.get(0);
        serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
    }

    async fn list_for_batch(&self, batch_id: CriteriaBatchId) -> Result<Vec<Criterion>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM criteria WHERE batch_id = $1", &[&batch_id.get()])
            .await
            .map_err(StoreBackendError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get(0);
                serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
            })
            .collect()
    }

    async fn update(&self, criterion: &Criterion) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(criterion).map_err(StoreBackendError::from)?;
        client
            .execute(
                "UPDATE criteria SET criterion_type = $2, text = $3, data = $4 WHERE id = $1",
                &[&criterion.id.get(), &criterion_type_label(criterion), &criterion.text, &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn put_tree(&self, criterion_id: CriterionId, tree: &ExpressionTree) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(tree).map_err(StoreBackendError::from)?;
        client
            .execute(
                "INSERT INTO expression_trees (criterion_id, data) VALUES ($1, $2) \
                 ON CONFLICT (criterion_id) DO UPDATE SET data = EXCLUDED.data",
                &[&criterion_id.get(), &data],
            )
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn get_tree(&self, criterion_id: CriterionId) -> Result<Option<ExpressionTree>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM expression_trees WHERE criterion_id = $1", &[&criterion_id.get()])
            .await
            .map_err(StoreBackendError::from)?;
        row.map(|row| {
            let data: serde_json::Value = row.get(0);
            serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
        })
        .transpose()
    }
}

fn map_insert_error(error: tokio_postgres::Error) -> RepositoryError {
    if error.code().is_some_and(|code| code == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
        RepositoryError::Constraint(format!("duplicate (batch_id, criterion_type, text): {error}"))
    } else {
        StoreBackendError::from(error).into()
    }
}
