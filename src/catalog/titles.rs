//! Title CRUD with automatic embedding upkeep.
//!
//! Embedding generation is an external network call and must never hold a
//! store transaction open: vectors are generated first, then written. A
//! provider outage degrades the write (no vector on create, stale vector
//! on update) instead of failing it.

use crate::embedding::document_text;
use crate::errors::Error;
use crate::sqlite::Title;
use crate::types::{NewTitle, Role, TitlePatch, TitleView};

use super::store::CatalogStore;

impl CatalogStore {
    /// Create a catalog title (staff only).
    ///
    /// Generates the embedding from the descriptive fields before the
    /// insert; if the provider is unavailable the title is stored without a
    /// vector and the outage is logged, never propagated.
    pub fn create_title(&mut self, role: Role, new: &NewTitle) -> Result<TitleView, Error> {
        Self::require_staff(role, "creating titles")?;
        validate_descriptive_fields(&new.name, &new.creator)?;

        let doc = document_text(
            &new.name,
            &new.creator,
            new.summary.as_deref(),
            new.category.as_deref(),
        );
        let embedding = match self.embedder.embed(&doc) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(error = %e, name = %new.name, "embedding unavailable; storing title without vector");
                None
            }
        };

        let title = self.db.insert_title(new, embedding.as_deref())?;
        if embedding.is_some() {
            self.invalidate_index();
        }
        self.view(title, None)
    }

    /// Retrieve a single title.
    ///
    /// Non-circulating titles are hidden from ordinary members and read as
    /// absent rather than forbidden.
    pub fn get_title(
        &self,
        role: Role,
        member_id: i64,
        id: i64,
    ) -> Result<TitleView, Error> {
        let title = self.db.get_title(id)?.ok_or(Error::TitleNotFound(id))?;
        if !title.circulating && !role.is_staff() {
            return Err(Error::TitleNotFound(id));
        }
        self.view(title, Some(member_id))
    }

    /// List titles with optional category filter, joined with availability
    /// and the requester's borrow flag.
    pub fn list_titles(
        &self,
        role: Role,
        member_id: i64,
        category: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TitleView>, Error> {
        Self::validate_limit(limit)?;
        let titles = self
            .db
            .list_titles(category, role.is_staff(), limit, offset)?;

        titles
            .into_iter()
            .map(|title| self.view(title, Some(member_id)))
            .collect()
    }

    /// Apply a typed partial update to a title (staff only).
    ///
    /// Any change to name/creator/summary/category invalidates the stored
    /// embedding: a new vector is generated from the post-patch fields
    /// before the update commits. If regeneration is unavailable the
    /// previous vector is retained unchanged (and logged).
    pub fn update_title(
        &mut self,
        role: Role,
        id: i64,
        patch: &TitlePatch,
    ) -> Result<TitleView, Error> {
        Self::require_staff(role, "updating titles")?;

        let mut title = self.db.get_title(id)?.ok_or(Error::TitleNotFound(id))?;
        apply_patch(&mut title, patch);
        validate_descriptive_fields(&title.name, &title.creator)?;

        let embedding = if patch.invalidates_embedding() {
            let doc = document_text(
                &title.name,
                &title.creator,
                title.summary.as_deref(),
                title.category.as_deref(),
            );
            match self.embedder.embed(&doc) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    tracing::warn!(error = %e, title_id = id, "embedding regeneration unavailable; keeping previous vector");
                    None
                }
            }
        } else {
            None
        };

        self.db.update_title_row(id, &title, embedding.as_deref())?;
        if embedding.is_some() {
            self.invalidate_index();
        }

        let updated = self.db.get_title(id)?.ok_or(Error::TitleNotFound(id))?;
        self.view(updated, None)
    }

    /// Delete a title and its inventory record (staff only). Loan history
    /// for the title is preserved.
    pub fn delete_title(&mut self, role: Role, id: i64) -> Result<(), Error> {
        Self::require_staff(role, "deleting titles")?;
        if !self.db.delete_title(id)? {
            return Err(Error::TitleNotFound(id));
        }
        self.invalidate_index();
        Ok(())
    }

    /// Join a title row with circulation state for presentation.
    pub(crate) fn view(&self, title: Title, member_id: Option<i64>) -> Result<TitleView, Error> {
        let available = self.db.available_copies(title.id)?;
        let borrowed_by_requester = match member_id {
            Some(member_id) => self.db.active_loan(member_id, title.id)?.is_some(),
            None => false,
        };
        Ok(TitleView::from_parts(title, available, borrowed_by_requester))
    }
}

/// The single place where a patch maps onto a row, field by name.
fn apply_patch(title: &mut Title, patch: &TitlePatch) {
    if let Some(name) = &patch.name {
        title.name = name.clone();
    }
    if let Some(creator) = &patch.creator {
        title.creator = creator.clone();
    }
    if let Some(publisher) = &patch.publisher {
        title.publisher = Some(publisher.clone());
    }
    if let Some(summary) = &patch.summary {
        title.summary = Some(summary.clone());
    }
    if let Some(category) = &patch.category {
        title.category = Some(category.clone());
    }
    if let Some(year) = patch.year {
        title.year = Some(year);
    }
    if let Some(circulating) = patch.circulating {
        title.circulating = circulating;
    }
}

fn validate_descriptive_fields(name: &str, creator: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("title name cannot be empty".to_string()));
    }
    if creator.trim().is_empty() {
        return Err(Error::InvalidInput(
            "title creator cannot be empty".to_string(),
        ));
    }
    Ok(())
}
