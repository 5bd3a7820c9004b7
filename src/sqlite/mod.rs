//! SQLite backend for the biblion catalog and circulation ledger.
//!
//! This module provides:
//! - `Database`: connection, schema, and title row management
//! - `embedding`: BLOB conversion and cosine similarity
//! - `inventory`: copy-count records and their range invariants
//! - `loans`: borrow/return transactions and loan history
//! - `search`: exact cosine ranking over stored embeddings

pub mod embedding;
pub mod inventory;
pub mod loans;
pub mod search;

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};
use serde::Serialize;

use crate::errors::Error;
use crate::types::NewTitle;

pub use self::inventory::InventoryRecord;
pub use self::loans::Loan;

pub type Result<T> = std::result::Result<T, Error>;

/// A catalog title row. The embedding vector itself stays in the database;
/// rows only carry whether one is present.
#[derive(Debug, Clone)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub creator: String,
    pub publisher: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub year: Option<i64>,
    pub circulating: bool,
    pub has_embedding: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Aggregate counts for the staff dashboard. Member counts are not
/// available here; member identity lives with the authorization
/// collaborator, not in this store.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_titles: i64,
    pub total_borrowed: i64,
    pub open_loans: i64,
}

/// SQLite database backend for biblion.
pub struct Database {
    conn: Connection,
}

/// Initialize database schema.
///
/// The partial unique index on open loans backs the at-most-one-active-loan
/// invariant at the storage layer; the state machine in `loans` never relies
/// on it, but a violation cannot slip through either.
fn create_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS titles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            creator TEXT NOT NULL,
            publisher TEXT,
            summary TEXT,
            category TEXT,
            year INTEGER,
            circulating INTEGER NOT NULL DEFAULT 1,
            embedding BLOB,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_titles_category ON titles(category);

        CREATE TABLE IF NOT EXISTS inventory (
            id INTEGER PRIMARY KEY,
            title_id INTEGER NOT NULL UNIQUE REFERENCES titles(id) ON DELETE CASCADE,
            total_copies INTEGER NOT NULL DEFAULT 0,
            borrowed_copies INTEGER NOT NULL DEFAULT 0,
            CHECK (total_copies >= 0),
            CHECK (borrowed_copies >= 0),
            CHECK (borrowed_copies <= total_copies)
        );

        -- No FK on title_id: closed loans are history and outlive deleted titles.
        CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY,
            member_id INTEGER NOT NULL,
            title_id INTEGER NOT NULL,
            repeat_count INTEGER NOT NULL DEFAULT 1,
            closed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (repeat_count >= 1)
        );

        CREATE INDEX IF NOT EXISTS idx_loans_member ON loans(member_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_loans_one_active
            ON loans(member_id, title_id) WHERE closed = 0;
        "#,
    )?;
    Ok(())
}

fn title_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<Title> {
    Ok(Title {
        id: row.get(0)?,
        name: row.get(1)?,
        creator: row.get(2)?,
        publisher: row.get(3)?,
        summary: row.get(4)?,
        category: row.get(5)?,
        year: row.get(6)?,
        circulating: row.get(7)?,
        has_embedding: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const TITLE_COLUMNS: &str = "id, name, creator, publisher, summary, category, year, \
     circulating, embedding IS NOT NULL, created_at, updated_at";

impl Database {
    /// Open or create a SQLite database at the given path.
    ///
    /// Opens in WAL mode with a busy timeout so concurrent writers queue on
    /// the write lock instead of failing, and enables foreign keys.
    pub fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        create_schema(&mut conn)?;
        Ok(Self { conn })
    }

    /// Insert a new title, with its embedding when one was generated.
    pub fn insert_title(&self, new: &NewTitle, embedding: Option<&[f32]>) -> Result<Title> {
        let now = Utc::now().to_rfc3339();
        let blob = match embedding {
            Some(vec) => Some(embedding::vec_to_blob(vec)?),
            None => None,
        };

        self.conn.execute(
            r#"
            INSERT INTO titles (name, creator, publisher, summary, category, year,
                                circulating, embedding, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
            params![
                &new.name,
                &new.creator,
                &new.publisher,
                &new.summary,
                &new.category,
                &new.year,
                new.circulating,
                &blob,
                &now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        let title = self
            .get_title(id)?
            .ok_or_else(|| Error::TitleNotFound(id))?;
        Ok(title)
    }

    /// Retrieve a single title by id. Returns None if absent.
    pub fn get_title(&self, id: i64) -> Result<Option<Title>> {
        let sql = format!("SELECT {TITLE_COLUMNS} FROM titles WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let result = stmt.query_row([id], title_from_row).optional()?;
        Ok(result)
    }

    /// List titles with optional category filter, ordered by id.
    ///
    /// Non-circulating titles are excluded unless `include_hidden` is set.
    pub fn list_titles(
        &self,
        category: Option<&str>,
        include_hidden: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Title>> {
        let sql = format!(
            r#"
            SELECT {TITLE_COLUMNS} FROM titles
            WHERE (?1 IS NULL OR category = ?1)
              AND (circulating = 1 OR ?2)
            ORDER BY id
            LIMIT ?3 OFFSET ?4
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let titles: SqliteResult<Vec<Title>> = stmt
            .query_map(
                params![category, include_hidden, limit as i64, offset as i64],
                title_from_row,
            )?
            .collect();

        Ok(titles?)
    }

    /// Write a title's mutable columns.
    ///
    /// `embedding`: `Some` replaces the stored vector; `None` leaves the
    /// existing one untouched (the stale-on-outage path for edits whose
    /// regeneration was unavailable).
    pub fn update_title_row(
        &self,
        id: i64,
        title: &Title,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let rows = match embedding {
            Some(vec) => {
                let blob = embedding::vec_to_blob(vec)?;
                self.conn.execute(
                    r#"
                    UPDATE titles
                    SET name = ?1, creator = ?2, publisher = ?3, summary = ?4,
                        category = ?5, year = ?6, circulating = ?7,
                        embedding = ?8, updated_at = ?9
                    WHERE id = ?10
                    "#,
                    params![
                        &title.name,
                        &title.creator,
                        &title.publisher,
                        &title.summary,
                        &title.category,
                        &title.year,
                        title.circulating,
                        &blob,
                        &now,
                        id,
                    ],
                )?
            }
            None => self.conn.execute(
                r#"
                UPDATE titles
                SET name = ?1, creator = ?2, publisher = ?3, summary = ?4,
                    category = ?5, year = ?6, circulating = ?7, updated_at = ?8
                WHERE id = ?9
                "#,
                params![
                    &title.name,
                    &title.creator,
                    &title.publisher,
                    &title.summary,
                    &title.category,
                    &title.year,
                    title.circulating,
                    &now,
                    id,
                ],
            )?,
        };

        if rows == 0 {
            return Err(Error::TitleNotFound(id));
        }
        Ok(())
    }

    /// Delete a title (its inventory row cascades). Loan rows are history
    /// and stay behind. Returns true if a title was deleted.
    pub fn delete_title(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM titles WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Load (id, embedding) for every title that has a vector. Feeds the
    /// in-memory vector index.
    pub fn embedded_titles(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, embedding FROM titles WHERE embedding IS NOT NULL ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            out.push((id, embedding::blob_to_vec(&blob)?));
        }
        Ok(out)
    }

    /// Aggregate catalog counts: title total, copies currently on loan
    /// across the whole inventory, and open loan records.
    pub fn catalog_stats(&self) -> Result<CatalogStats> {
        let total_titles: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM titles", [], |row| row.get(0))?;
        let total_borrowed: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(borrowed_copies), 0) FROM inventory",
            [],
            |row| row.get(0),
        )?;
        let open_loans: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM loans WHERE closed = 0",
            [],
            |row| row.get(0),
        )?;

        Ok(CatalogStats {
            total_titles,
            total_borrowed,
            open_loans,
        })
    }

    /// Internal connection handle for sibling modules.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn test_insert_and_get_title() {
        let db = create_test_db();
        let title = db
            .insert_title(&new_title("The Odyssey"), Some(&test_embedding(0.1)))
            .unwrap();

        let fetched = db.get_title(title.id).unwrap().unwrap();
        assert_eq!(fetched.name, "The Odyssey");
        assert_eq!(fetched.creator, "Test Creator");
        assert_eq!(fetched.year, Some(2001));
        assert!(fetched.circulating);
        assert!(fetched.has_embedding);
    }

    #[test]
    fn test_insert_title_without_embedding() {
        let db = create_test_db();
        let title = db.insert_title(&new_title("No Vector"), None).unwrap();
        assert!(!title.has_embedding);
    }

    #[test]
    fn test_negative_year_for_antiquity() {
        let db = create_test_db();
        let mut new = new_title("The Iliad");
        new.year = Some(-750);
        let title = db.insert_title(&new, None).unwrap();
        assert_eq!(title.year, Some(-750));
    }

    #[test]
    fn test_get_nonexistent_title() {
        let db = create_test_db();
        assert!(db.get_title(999).unwrap().is_none());
    }

    #[test]
    fn test_list_titles_category_filter() {
        let db = create_test_db();
        let mut a = new_title("A");
        a.category = Some("Epic".to_string());
        let mut b = new_title("B");
        b.category = Some("Novel".to_string());
        db.insert_title(&a, None).unwrap();
        db.insert_title(&b, None).unwrap();

        let epics = db.list_titles(Some("Epic"), false, 50, 0).unwrap();
        assert_eq!(epics.len(), 1);
        assert_eq!(epics[0].name, "A");

        let all = db.list_titles(None, false, 50, 0).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_list_titles_hides_non_circulating() {
        let db = create_test_db();
        let mut hidden = new_title("Hidden");
        hidden.circulating = false;
        db.insert_title(&hidden, None).unwrap();
        db.insert_title(&new_title("Visible"), None).unwrap();

        let member_view = db.list_titles(None, false, 50, 0).unwrap();
        assert_eq!(member_view.len(), 1);
        assert_eq!(member_view[0].name, "Visible");

        let staff_view = db.list_titles(None, true, 50, 0).unwrap();
        assert_eq!(staff_view.len(), 2);
    }

    #[test]
    fn test_list_titles_pagination() {
        let db = create_test_db();
        for i in 0..5 {
            db.insert_title(&new_title(&format!("T{i}")), None).unwrap();
        }

        let page = db.list_titles(None, false, 2, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "T2");
    }

    #[test]
    fn test_update_title_row_keeps_embedding_when_none() {
        let db = create_test_db();
        let mut title = db
            .insert_title(&new_title("Original"), Some(&test_embedding(0.2)))
            .unwrap();

        title.name = "Renamed".to_string();
        db.update_title_row(title.id, &title, None).unwrap();

        let fetched = db.get_title(title.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");
        assert!(fetched.has_embedding);

        let vectors = db.embedded_titles().unwrap();
        assert_eq!(vectors.len(), 1);
        assert!((vectors[0].1[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_update_title_row_replaces_embedding() {
        let db = create_test_db();
        let title = db
            .insert_title(&new_title("Original"), Some(&test_embedding(0.2)))
            .unwrap();

        db.update_title_row(title.id, &title, Some(&test_embedding(0.9)))
            .unwrap();

        let vectors = db.embedded_titles().unwrap();
        assert!((vectors[0].1[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_update_nonexistent_title() {
        let db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        let result = db.update_title_row(999, &title, None);
        assert!(matches!(result, Err(Error::TitleNotFound(999))));
    }

    #[test]
    fn test_delete_title_cascades_inventory() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        db.set_inventory(title.id, 3, 0).unwrap();

        assert!(db.delete_title(title.id).unwrap());
        assert!(db.get_title(title.id).unwrap().is_none());
        assert!(db.get_inventory(title.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_nonexistent_title() {
        let db = create_test_db();
        assert!(!db.delete_title(42).unwrap());
    }

    #[test]
    fn test_catalog_stats_counts() {
        let mut db = create_test_db();
        let empty = db.catalog_stats().unwrap();
        assert_eq!(empty.total_titles, 0);
        assert_eq!(empty.total_borrowed, 0);
        assert_eq!(empty.open_loans, 0);

        let a = db.insert_title(&new_title("A"), None).unwrap();
        let b = db.insert_title(&new_title("B"), None).unwrap();
        db.set_inventory(a.id, 3, 0).unwrap();
        db.set_inventory(b.id, 2, 0).unwrap();

        db.borrow_title(7, a.id).unwrap();
        db.borrow_title(7, a.id).unwrap(); // repeat borrow: one loan, two copies
        db.borrow_title(8, b.id).unwrap();
        db.return_title(8, b.id).unwrap();

        let stats = db.catalog_stats().unwrap();
        assert_eq!(stats.total_titles, 2);
        assert_eq!(stats.total_borrowed, 2);
        assert_eq!(stats.open_loans, 1);
    }

    #[test]
    fn test_embedded_titles_skips_null_vectors() {
        let db = create_test_db();
        db.insert_title(&new_title("Plain"), None).unwrap();
        let with_vec = db
            .insert_title(&new_title("Vectorized"), Some(&test_embedding(0.5)))
            .unwrap();

        let vectors = db.embedded_titles().unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].0, with_vec.id);
    }
}
