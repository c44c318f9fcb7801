// crates/elixir-terminology/src/router.rs
// ============================================================================
// Module: Router
// Description: Entity-type-aware dispatch across registered vocabulary
//              clients, backed by a TTL cache.
// Purpose: Implement `TerminologyRouter` (spec.md §4.3): query every
//          candidate vocabulary for an entity type in priority order,
//          concatenate their candidate lists, and cap the result at 10.
// Dependencies: async-trait, elixir-core, elixir-config, crate::cache
// ============================================================================

//! ## Overview
//! Mirrors `decision-gate-providers::registry::ProviderRegistry`'s shape: a
//! map of boxed trait objects keyed by an identifier, with lookup dispatch
//! layered on top. Here the identifier is [`VocabSystem`] and every
//! registered client for an entity type's routing list is queried and
//! concatenated, rather than dispatch stopping at a single registered
//! provider per query.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use elixir_config::RoutingTable;
use elixir_core::Candidate;
use elixir_core::EntityType;
use elixir_core::TerminologyClient;
use elixir_core::TerminologyError;
use elixir_core::TerminologyRouter;
use elixir_core::VocabSystem;
use tracing::warn;

use crate::cache::TtlCache;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Dispatches searches across registered [`TerminologyClient`]s per an
/// [`RoutingTable`], caching results for [`crate::cache::DEFAULT_TTL_SECS`].
pub struct Router {
    clients: HashMap<VocabSystemKey, Arc<dyn TerminologyClient>>,
    routing: RoutingTable,
    cache: TtlCache<(VocabSystemKey, String), Vec<Candidate>>,
}

/// `VocabSystem` does not derive `Hash`/`Eq` for JSON serde reasons at the
/// domain layer; this router-local mirror does, so it can key a `HashMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VocabSystemKey {
    Umls,
    Snomed,
    Icd10,
    RxNorm,
    Loinc,
    Hpo,
}

impl From<VocabSystem> for VocabSystemKey {
    fn from(value: VocabSystem) -> Self {
        match value {
            VocabSystem::Umls => Self::Umls,
            VocabSystem::Snomed => Self::Snomed,
            VocabSystem::Icd10 => Self::Icd10,
            VocabSystem::RxNorm => Self::RxNorm,
            VocabSystem::Loinc => Self::Loinc,
            VocabSystem::Hpo => Self::Hpo,
        }
    }
}

impl Router {
    /// Builds an empty router over the given routing table; register clients
    /// with [`Router::register`] before use.
    #[must_use]
    pub fn new(routing: RoutingTable) -> Self {
        Self { clients: HashMap::new(), routing, cache: TtlCache::with_defaults() }
    }

    /// Registers a vocabulary client, replacing any prior client for the
    /// same [`VocabSystem`].
    pub fn register(&mut self, client: Arc<dyn TerminologyClient>) {
        self.clients.insert(client.system().into(), client);
    }
}

/// Maximum number of concatenated candidates [`Router::route_search`]
/// returns, across every system queried (spec.md §4.3).
const MAX_CANDIDATES: usize = 10;

#[async_trait]
impl TerminologyRouter for Router {
    async fn route_search(&self, entity_type: EntityType, query: &str) -> Result<Vec<Candidate>, TerminologyError> {
        let candidates = self.routing.candidates_for(entity_type);
        let mut last_error = None;
        let mut any_succeeded = false;
        let mut combined = Vec::new();

        for system in candidates {
            let key: VocabSystemKey = system.into();
            let cache_key = (key, query.to_string());
            if let Some(cached) = self.cache.get(&cache_key).await {
                combined.extend(cached);
                any_succeeded = true;
                continue;
            }

            let Some(client) = self.clients.get(&key) else {
                continue;
            };

            match client.search(query).await {
                Ok(found) => {
                    any_succeeded = true;
                    self.cache.put(cache_key, found.clone()).await;
                    combined.extend(found);
                }
                Err(err) => {
                    warn!(vocabulary = ?system, error = %err, "terminology search failed, trying next candidate");
                    last_error = Some(err);
                }
            }
        }

        if any_succeeded || candidates.is_empty() {
            combined.truncate(MAX_CANDIDATES);
            return Ok(combined);
        }

        Err(last_error.unwrap_or_else(|| TerminologyError::Upstream("no terminology client registered".to_string())))
    }
}
