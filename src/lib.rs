//! biblion - A library circulation ledger with semantic catalog discovery.
//!
//! This crate tracks titles, per-title copy counts, and member loans in a
//! local SQLite database, and finds catalog titles by meaning through an
//! external embedding provider. All operations are synchronous (no
//! async/await required).
//!
//! # Example
//!
//! ```no_run
//! use biblion::{CatalogStore, Config, NewTitle, Role};
//!
//! // Open the catalog store with the configured database and provider
//! let config = Config::load().expect("Failed to load config");
//! let mut store = CatalogStore::open(config).expect("Failed to open store");
//!
//! // Register a title and its inventory (staff operations)
//! let title = store.create_title(Role::Staff, &NewTitle {
//!     name: "The Left Hand of Darkness".to_string(),
//!     creator: "Ursula K. Le Guin".to_string(),
//!     publisher: None,
//!     summary: Some("An envoy on a planet of ambisexual humans".to_string()),
//!     category: Some("Science Fiction".to_string()),
//!     year: Some(1969),
//!     circulating: true,
//! }).expect("Failed to add title");
//! store.set_inventory(Role::Staff, title.id, 3, 0).expect("Failed to set inventory");
//!
//! // Borrow a copy and search the catalog by meaning
//! store.borrow(42, title.id).expect("Failed to borrow");
//! let hits = store.semantic_search(Role::Member, 42, "alien diplomacy", 10);
//! for hit in hits.unwrap() {
//!     println!("{:.2}: {}", hit.similarity_score, hit.title.name);
//! }
//! ```
//!
//! # Degraded operation
//!
//! Catalog writes never fail because the embedding provider is down: a
//! create stores the title without a vector, an edit keeps the previous
//! vector. Only semantic search requires the provider and reports
//! `ServiceUnavailable` without it.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod output;
pub mod types;
mod ivf;
mod sqlite;

// Re-export public API
pub use catalog::CatalogStore;
pub use catalog::store::{MAX_SEARCH_LIMIT, MIN_SEARCH_LIMIT};
pub use config::Config;
pub use embedding::{EMBEDDING_DIMS, EmbeddingService, TextEmbedder, document_text};
pub use errors::Error;
pub use sqlite::{CatalogStats, InventoryRecord, Loan, Title};
pub use types::{NewTitle, Role, SearchHit, TitlePatch, TitleView};
