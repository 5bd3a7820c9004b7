//! Similarity ranking over stored title embeddings.
//!
//! The vector index narrows the catalog to candidate ids; this module joins
//! the candidates back to their rows, scores them exactly against the
//! persisted vectors, and applies threshold and visibility filtering.

use rusqlite::OptionalExtension;

use crate::ivf::IvfIndex;

use super::{Database, Result, Title, embedding, title_from_row};

/// Candidate pool multiplier: fetch more ids than the caller's limit so
/// threshold and visibility filtering cannot starve the result set.
const CANDIDATE_FACTOR: usize = 4;
const MIN_CANDIDATE_POOL: usize = 50;

impl Database {
    /// Rank titles against a query vector.
    ///
    /// Only titles with a stored embedding participate (they are the only
    /// ones in the index). Results below `min_score` are excluded entirely;
    /// non-circulating titles are excluded unless `include_hidden`. Ordered
    /// by score descending, ties by title id ascending.
    pub(crate) fn search_by_vector(
        &self,
        index: &IvfIndex,
        query: &[f32],
        limit: usize,
        min_score: f64,
        include_hidden: bool,
    ) -> Result<Vec<(Title, f64)>> {
        let pool = limit
            .saturating_mul(CANDIDATE_FACTOR)
            .max(MIN_CANDIDATE_POOL)
            .min(index.len().max(1));

        let mut results: Vec<(Title, f64)> = Vec::new();
        for (id, _) in index.search(query, pool) {
            let row = self.title_with_vector(id)?;
            let Some((title, stored)) = row else {
                // Index can briefly outlive a deleted row; skip it.
                continue;
            };

            if !title.circulating && !include_hidden {
                continue;
            }

            let score = embedding::cosine_similarity(query, &stored)?;
            if score >= min_score {
                results.push((title, score));
            }
        }

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    fn title_with_vector(&self, id: i64) -> Result<Option<(Title, Vec<f32>)>> {
        let sql = format!(
            "SELECT {}, embedding FROM titles WHERE id = ?1 AND embedding IS NOT NULL",
            super::TITLE_COLUMNS
        );
        let row = self
            .conn()
            .query_row(&sql, [id], |row| {
                let title = title_from_row(row)?;
                let blob: Vec<u8> = row.get(11)?;
                Ok((title, blob))
            })
            .optional()?;

        match row {
            Some((title, blob)) => Ok(Some((title, embedding::blob_to_vec(&blob)?))),
            None => Ok(None),
        }
    }
}
