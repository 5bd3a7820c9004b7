//! Semantic search over the catalog.

use crate::errors::Error;
use crate::types::{Role, SearchHit};

use super::store::CatalogStore;

impl CatalogStore {
    /// Find titles by meaning.
    ///
    /// Embeds the query once, ranks stored title vectors by cosine
    /// similarity through the vector index, filters by the configured
    /// minimum score and the requester's visibility, and joins each hit
    /// with availability and the requester's borrow flag.
    ///
    /// Unlike catalog writes, search cannot degrade: a provider outage
    /// surfaces as `ServiceUnavailable`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Query is empty
    /// - Limit is outside 1-50
    /// - The embedding provider is unreachable
    /// - Database operations fail
    pub fn semantic_search(
        &mut self,
        role: Role,
        member_id: i64,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, Error> {
        Self::validate_limit(limit)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("search query cannot be empty".to_string()));
        }

        let query_vector = self
            .embedder
            .embed(query)
            .map_err(|e| Error::ServiceUnavailable(e.to_string()))?;

        self.ensure_index()?;
        let Some(index) = self.index.as_ref() else {
            return Err(Error::ServiceUnavailable(
                "vector index unavailable".to_string(),
            ));
        };

        let ranked = self.db.search_by_vector(
            index,
            &query_vector,
            limit,
            self.config.similarity_threshold,
            role.is_staff(),
        )?;

        let mut hits = Vec::with_capacity(ranked.len());
        for (title, score) in ranked {
            let view = self.view(title, Some(member_id))?;
            hits.push(SearchHit {
                title: view,
                similarity_score: score,
            });
        }
        Ok(hits)
    }
}
