// crates/elixir-store-postgres/src/entity_repo.rs
// ============================================================================
// Module: PostgresEntityRepository
// Description: `elixir_core::EntityRepository` implementor.
// Purpose: Persist extracted/grounded `Entity` rows, scoped either to a
//          single criterion or, via a join, to an entire criteria batch (for
//          the integrity checker's orphan scan, spec.md §4.9).
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::CriteriaBatchId;
use elixir_core::CriterionId;
use elixir_core::Entity;
use elixir_core::EntityId;
use elixir_core::EntityRepository;
use elixir_core::RepositoryError;

use crate::error::StoreBackendError;

/// Postgres-backed [`EntityRepository`].
pub struct PostgresEntityRepository {
    pool: Pool,
}

impl PostgresEntityRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityRepository for PostgresEntityRepository {
    async fn insert_many(&self, entities: &[Entity]) -> Result<(), RepositoryError> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let transaction = client.transaction().await.map_err(StoreBackendError::from)?;

        for entity in entities {
            let data = serde_json::to_value(entity).map_err(StoreBackendError::from)?;
            transaction
                .execute(
                    "INSERT INTO entities (id, criterion_id, data) VALUES ($1, $2, $3)",
                    &[&entity.id.get(), &entity.criterion_id.get(), &data],
                )
                .await
                .map_err(StoreBackendError::from)?;
        }

        transaction.commit().await.map_err(StoreBackendError::from)?;
        Ok(())
    }

    async fn get(&self, id: EntityId) -> Result<Entity, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let row = client
            .query_opt("SELECT data FROM entities WHERE id = $1", &[&id.get()])
            .await
            .map_err(StoreBackendError::from)?
            .ok_or_else(|| RepositoryError::NotFound { kind: "entity", id: id.to_string() })?;
        let data: serde_json::Value = row.get(0);
        serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
    }

    async fn list_for_criterion(&self, criterion_id: CriterionId) -> Result<Vec<Entity>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query("SELECT data FROM entities WHERE criterion_id = $1", &[&criterion_id.get()])
            .await
            .map_err(StoreBackendError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get(0);
                serde_json::from_value(data).map_err(|error| StoreBackendError::from(error).into())
            })
            .collect()
    }

    async fn list_for_batch(&self, batch_id: CriteriaBatchId) -> Result<Vec<Entity>, RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let rows = client
            .query(
                "SELECT e.data FROM entities e \
                 JOIN criteria c ON c.id = e.criterion_id \
                 WHERE c.batch_id = $1",
                &[&batch_id.get()],
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

    async fn update(&self, entity: &Entity) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(StoreBackendError::from)?;
        let data = serde_json::to_value(entity).map_err(StoreBackendError::from)?;
        client
            .execute("UPDATE entities SET data = $2 WHERE id = $1", &[&entity.id.get(), &data])
            .await
            .map_err(StoreBackendError::from)?;
        Ok(())
    }
}
