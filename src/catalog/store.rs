//! Core catalog store struct combining persistence and embedding upkeep.

use std::path::Path;

use crate::config::Config;
use crate::embedding::{EmbeddingService, TextEmbedder};
use crate::errors::Error;
use crate::ivf::IvfIndex;
use crate::sqlite::Database;
use crate::types::Role;

/// Minimum allowed limit for list and search operations.
pub const MIN_SEARCH_LIMIT: usize = 1;
/// Maximum allowed limit for list and search operations.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Catalog store combining the SQLite ledger, an injected embedding
/// provider, and a lazily built vector index.
///
/// The embedder is constructed explicitly and passed in; there is no
/// process-wide client. The index is rebuilt on demand after any write
/// that touches an embedding.
pub struct CatalogStore {
    pub(crate) db: Database,
    pub(crate) embedder: Box<dyn TextEmbedder>,
    pub(crate) config: Config,
    pub(crate) index: Option<IvfIndex>,
}

impl CatalogStore {
    /// Initialize a catalog store with a database path and an embedder.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database path contains path traversal sequences (e.g., "../")
    /// - Parent directory cannot be canonicalized
    /// - Database cannot be opened
    pub fn new(
        db_path: &Path,
        embedder: Box<dyn TextEmbedder>,
        config: Config,
    ) -> Result<Self, Error> {
        use std::path::Component;

        // Path traversal guard: reject parent directory components (works on all platforms)
        for component in db_path.components() {
            if matches!(component, Component::ParentDir) {
                return Err(Error::Config(
                    "Invalid database path: contains '..' which may escape the intended directory"
                        .to_string(),
                ));
            }
        }

        // Validate parent directory exists and is accessible
        if let Some(parent) = db_path.parent() {
            std::fs::canonicalize(parent).map_err(|e| {
                Error::Config(format!(
                    "Invalid database path: parent directory not accessible: {e}"
                ))
            })?;
        }

        let db = Database::open(db_path)?;
        Ok(CatalogStore {
            db,
            embedder,
            config,
            index: None,
        })
    }

    /// Convenience constructor: build the HTTP embedding service from the
    /// configuration and open the configured database path.
    pub fn open(config: Config) -> Result<Self, Error> {
        let embedder = Box::new(EmbeddingService::new(&config));
        let db_path = config.database_path.clone();
        Self::new(&db_path, embedder, config)
    }

    /// Validate a list/search limit against the accepted bounds (1-50).
    pub(crate) fn validate_limit(limit: usize) -> Result<(), Error> {
        if !(MIN_SEARCH_LIMIT..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(Error::InvalidLimit(format!(
                "limit {limit} outside accepted range {MIN_SEARCH_LIMIT}-{MAX_SEARCH_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Reject non-staff callers of privileged operations.
    pub(crate) fn require_staff(role: Role, operation: &str) -> Result<(), Error> {
        if !role.is_staff() {
            return Err(Error::Forbidden(format!(
                "{operation} requires a staff role"
            )));
        }
        Ok(())
    }

    /// Drop the vector index; the next semantic search rebuilds it from the
    /// stored embeddings.
    pub(crate) fn invalidate_index(&mut self) {
        self.index = None;
    }

    /// Build the vector index from the stored embeddings if it is missing.
    pub(crate) fn ensure_index(&mut self) -> Result<(), Error> {
        if self.index.is_none() {
            let items = self.db.embedded_titles()?;
            tracing::debug!(vectors = items.len(), "building vector index");
            self.index = Some(IvfIndex::build(items, self.config.index_lists));
        }
        Ok(())
    }
}
