//! High-level catalog store orchestrating persistence, embedding
//! generation, and the circulation ledger.
//!
//! Provides the operational API the CLI (or any other surface) talks to:
//! title CRUD with automatic embedding upkeep, borrow/return, inventory
//! administration, and semantic search.

mod circulation;
mod search;
mod titles;

// pub(crate): module internals hidden; public items re-exported explicitly via lib.rs
pub(crate) mod store;

pub use store::CatalogStore;
