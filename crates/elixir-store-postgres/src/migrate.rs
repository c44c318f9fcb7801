// crates/elixir-store-postgres/src/migrate.rs
// ============================================================================
// Module: Migrations
// Description: Forward-only embedded SQL migration runner.
// Purpose: Apply the schema in order exactly once per deployment, tracked in
//          a `schema_migrations` table, the way a fresh environment or CI
//          test container bootstraps its schema.
// Dependencies: deadpool-postgres, tokio-postgres
// ============================================================================

//! ## Overview
//! Migrations are embedded at compile time via `include_str!` rather than
//! read from disk at runtime, so the binary is self-contained. Each entry is
//! applied inside its own transaction and recorded by file name; a name
//! already present in `schema_migrations` is skipped. There is no down
//! migration support — this is a forward-only ledger, matching the
//! transactional-outbox module's own "forward only" posture (spec.md §4.5).

use deadpool_postgres::Pool;

use crate::error::StoreBackendError;

/// One embedded migration, identified by its file name.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { name: "0001_init.sql", sql: include_str!("../migrations/0001_init.sql") },
    Migration { name: "0002_batch_created_at.sql", sql: include_str!("../migrations/0002_batch_created_at.sql") },
];

/// Applies every embedded migration not yet recorded as applied.
///
/// # Errors
/// Returns [`StoreBackendError`] if a connection cannot be checked out or a
/// migration fails to apply.
pub async fn run_migrations(pool: &Pool) -> Result<(), StoreBackendError> {
    let mut client = pool.get().await?;

    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (\
                 name TEXT PRIMARY KEY, \
                 applied_at TIMESTAMPTZ NOT NULL DEFAULT now()\
             )",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied = client.query_opt("SELECT 1 FROM schema_migrations WHERE name = $1", &[&migration.name]).await?.is_some();
        if already_applied {
            continue;
        }

        let transaction = client.transaction().await?;
        transaction.batch_execute(migration.sql).await?;
        transaction.execute("INSERT INTO schema_migrations (name) VALUES ($1)", &[&migration.name]).await?;
        transaction.commit().await?;
    }

    Ok(())
}
