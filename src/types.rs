//! Catalog data types shared across the store and CLI layers.

use serde::Serialize;

use crate::sqlite::Title;

/// Requester role, supplied by the external authorization collaborator.
///
/// The core never stores or mutates member identity; it only enforces the
/// role checks it is handed with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Staff,
    Superuser,
}

impl Role {
    /// True for roles allowed to use privileged catalog/inventory operations
    /// and to see non-circulating titles.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Superuser)
    }
}

/// Fields for creating a new catalog title.
#[derive(Debug, Clone)]
pub struct NewTitle {
    pub name: String,
    pub creator: String,
    pub publisher: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    /// Year of publication; may be negative for antiquity.
    pub year: Option<i64>,
    pub circulating: bool,
}

/// Typed partial update for a title.
///
/// Lists exactly the mutable fields; `None` means "leave unchanged".
/// Applied by name in one place (`CatalogStore::update_title`), never by
/// dynamic attribute patching.
#[derive(Debug, Clone, Default)]
pub struct TitlePatch {
    pub name: Option<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub year: Option<i64>,
    pub circulating: Option<bool>,
}

impl TitlePatch {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.creator.is_none()
            && self.publisher.is_none()
            && self.summary.is_none()
            && self.category.is_none()
            && self.year.is_none()
            && self.circulating.is_none()
    }

    /// True when the patch touches a field the embedding is derived from.
    /// Any such edit invalidates the stored vector.
    pub fn invalidates_embedding(&self) -> bool {
        self.name.is_some()
            || self.creator.is_some()
            || self.summary.is_some()
            || self.category.is_some()
    }
}

/// A title joined with circulation state for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct TitleView {
    pub id: i64,
    pub name: String,
    pub creator: String,
    pub publisher: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub year: Option<i64>,
    pub circulating: bool,
    /// total_copies - borrowed_copies; `None` when no inventory record exists.
    pub available_copies: Option<i64>,
    pub is_borrowed_by_requester: bool,
}

impl TitleView {
    pub(crate) fn from_parts(
        title: Title,
        available_copies: Option<i64>,
        is_borrowed_by_requester: bool,
    ) -> Self {
        TitleView {
            id: title.id,
            name: title.name,
            creator: title.creator,
            publisher: title.publisher,
            summary: title.summary,
            category: title.category,
            year: title.year,
            circulating: title.circulating,
            available_copies,
            is_borrowed_by_requester,
        }
    }
}

/// A semantic-search result: a title view plus its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub title: TitleView,
    pub similarity_score: f64,
}
