//! Inventory records: per-title copy counts and their range invariants.
//!
//! Every mutation runs inside an immediate (write-locked) transaction and
//! re-checks `0 <= borrowed_copies <= total_copies` on the values it is
//! about to write, so two racing updates cannot combine into an invalid
//! ledger state.

use rusqlite::{OptionalExtension, Result as SqliteResult, TransactionBehavior, params};
use serde::Serialize;

use crate::errors::Error;

use super::{Database, Result};

/// Copy counts for one title. `available_copies` is always derived,
/// never stored.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryRecord {
    pub id: i64,
    pub title_id: i64,
    pub total_copies: i64,
    pub borrowed_copies: i64,
}

impl InventoryRecord {
    pub fn available_copies(&self) -> i64 {
        self.total_copies - self.borrowed_copies
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<InventoryRecord> {
    Ok(InventoryRecord {
        id: row.get(0)?,
        title_id: row.get(1)?,
        total_copies: row.get(2)?,
        borrowed_copies: row.get(3)?,
    })
}

impl Database {
    /// Create the inventory record for a title.
    ///
    /// Fails with a conflict when a record already exists (the adjust path
    /// must be used instead) or when `borrowed > total`.
    pub fn set_inventory(
        &mut self,
        title_id: i64,
        total_copies: i64,
        borrowed_copies: i64,
    ) -> Result<InventoryRecord> {
        if total_copies < 0 || borrowed_copies < 0 {
            return Err(Error::InvalidRange(format!(
                "copy counts cannot be negative (total={total_copies}, borrowed={borrowed_copies})"
            )));
        }
        if borrowed_copies > total_copies {
            return Err(Error::InventoryConflict {
                title_id,
                reason: format!(
                    "borrowed_copies ({borrowed_copies}) cannot exceed total_copies ({total_copies})"
                ),
            });
        }

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let title_exists: bool = tx
            .query_row("SELECT 1 FROM titles WHERE id = ?1", [title_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !title_exists {
            return Err(Error::TitleNotFound(title_id));
        }

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM inventory WHERE title_id = ?1",
                [title_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(Error::InventoryConflict {
                title_id,
                reason: "inventory record already exists; use the adjust path".to_string(),
            });
        }

        tx.execute(
            "INSERT INTO inventory (title_id, total_copies, borrowed_copies) VALUES (?1, ?2, ?3)",
            params![title_id, total_copies, borrowed_copies],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(InventoryRecord {
            id,
            title_id,
            total_copies,
            borrowed_copies,
        })
    }

    /// Adjust an existing inventory record by signed deltas.
    ///
    /// Fails with `InvalidRange` when the result would violate
    /// `0 <= borrowed <= total`; the record is left untouched.
    pub fn update_inventory(
        &mut self,
        title_id: i64,
        total_delta: i64,
        borrowed_delta: i64,
    ) -> Result<InventoryRecord> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let record = tx
            .query_row(
                "SELECT id, title_id, total_copies, borrowed_copies FROM inventory WHERE title_id = ?1",
                [title_id],
                record_from_row,
            )
            .optional()?
            .ok_or(Error::InventoryNotFound(title_id))?;

        let total = record
            .total_copies
            .checked_add(total_delta)
            .ok_or_else(|| {
                Error::InvalidRange("adjustment overflows the copy count range".to_string())
            })?;
        let borrowed = record
            .borrowed_copies
            .checked_add(borrowed_delta)
            .ok_or_else(|| {
                Error::InvalidRange("adjustment overflows the copy count range".to_string())
            })?;

        if total < 0 || borrowed < 0 {
            return Err(Error::InvalidRange(format!(
                "adjustment would make counts negative (total={total}, borrowed={borrowed})"
            )));
        }
        if borrowed > total {
            return Err(Error::InvalidRange(format!(
                "adjustment would leave borrowed_copies ({borrowed}) above total_copies ({total})"
            )));
        }

        tx.execute(
            "UPDATE inventory SET total_copies = ?1, borrowed_copies = ?2 WHERE id = ?3",
            params![total, borrowed, record.id],
        )?;
        tx.commit()?;

        Ok(InventoryRecord {
            id: record.id,
            title_id,
            total_copies: total,
            borrowed_copies: borrowed,
        })
    }

    /// Retrieve the inventory record for a title. Returns None if absent.
    pub fn get_inventory(&self, title_id: i64) -> Result<Option<InventoryRecord>> {
        let result = self
            .conn()
            .query_row(
                "SELECT id, title_id, total_copies, borrowed_copies FROM inventory WHERE title_id = ?1",
                [title_id],
                record_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// List inventory records ordered by title id.
    pub fn list_inventory(&self, limit: usize, offset: usize) -> Result<Vec<InventoryRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title_id, total_copies, borrowed_copies FROM inventory \
             ORDER BY title_id LIMIT ?1 OFFSET ?2",
        )?;
        let records: SqliteResult<Vec<InventoryRecord>> = stmt
            .query_map(params![limit as i64, offset as i64], record_from_row)?
            .collect();
        Ok(records?)
    }

    /// Delete the inventory record for a title. Returns true if one existed.
    pub fn delete_inventory(&self, title_id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM inventory WHERE title_id = ?1", [title_id])?;
        Ok(rows > 0)
    }

    /// Derived availability for a title: `total - borrowed`, or None when no
    /// inventory record exists.
    pub fn available_copies(&self, title_id: i64) -> Result<Option<i64>> {
        Ok(self
            .get_inventory(title_id)?
            .map(|record| record.available_copies()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::errors::Error;

    #[test]
    fn test_set_and_get_inventory() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();

        let record = db.set_inventory(title.id, 5, 2).unwrap();
        assert_eq!(record.total_copies, 5);
        assert_eq!(record.borrowed_copies, 2);
        assert_eq!(record.available_copies(), 3);

        let fetched = db.get_inventory(title.id).unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
    }

    #[test]
    fn test_set_inventory_missing_title() {
        let mut db = create_test_db();
        let result = db.set_inventory(99, 5, 0);
        assert!(matches!(result, Err(Error::TitleNotFound(99))));
    }

    #[test]
    fn test_set_inventory_duplicate_conflicts() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        db.set_inventory(title.id, 5, 0).unwrap();

        let result = db.set_inventory(title.id, 7, 0);
        assert!(matches!(result, Err(Error::InventoryConflict { .. })));
    }

    #[test]
    fn test_set_inventory_borrowed_over_total_conflicts() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();

        let result = db.set_inventory(title.id, 2, 3);
        assert!(matches!(result, Err(Error::InventoryConflict { .. })));
    }

    #[test]
    fn test_set_inventory_negative_rejected() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();

        assert!(matches!(
            db.set_inventory(title.id, -1, 0),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_update_inventory_applies_deltas() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        db.set_inventory(title.id, 5, 1).unwrap();

        let record = db.update_inventory(title.id, 3, 1).unwrap();
        assert_eq!(record.total_copies, 8);
        assert_eq!(record.borrowed_copies, 2);
    }

    #[test]
    fn test_update_inventory_invalid_range_leaves_record_untouched() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        db.set_inventory(title.id, 5, 4).unwrap();

        // Shrinking total below borrowed must fail.
        let result = db.update_inventory(title.id, -2, 0);
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        // Negative borrowed must fail.
        let result = db.update_inventory(title.id, 0, -5);
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        let record = db.get_inventory(title.id).unwrap().unwrap();
        assert_eq!(record.total_copies, 5);
        assert_eq!(record.borrowed_copies, 4);
    }

    #[test]
    fn test_update_inventory_overflowing_delta_rejected() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        db.set_inventory(title.id, 5, 2).unwrap();

        let result = db.update_inventory(title.id, i64::MAX, 0);
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        let result = db.update_inventory(title.id, 0, i64::MAX);
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        let record = db.get_inventory(title.id).unwrap().unwrap();
        assert_eq!(record.total_copies, 5);
        assert_eq!(record.borrowed_copies, 2);
    }

    #[test]
    fn test_update_inventory_missing_record() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();

        let result = db.update_inventory(title.id, 1, 0);
        assert!(matches!(result, Err(Error::InventoryNotFound(_))));
    }

    #[test]
    fn test_delete_inventory() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        db.set_inventory(title.id, 5, 0).unwrap();

        assert!(db.delete_inventory(title.id).unwrap());
        assert!(db.get_inventory(title.id).unwrap().is_none());
        assert!(!db.delete_inventory(title.id).unwrap());
    }

    #[test]
    fn test_list_inventory() {
        let mut db = create_test_db();
        for i in 0..3 {
            let title = db.insert_title(&new_title(&format!("T{i}")), None).unwrap();
            db.set_inventory(title.id, i + 1, 0).unwrap();
        }

        let records = db.list_inventory(50, 0).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].total_copies, 1);
    }

    #[test]
    fn test_available_copies_derived() {
        let mut db = create_test_db();
        let title = db.insert_title(&new_title("T"), None).unwrap();
        assert_eq!(db.available_copies(title.id).unwrap(), None);

        db.set_inventory(title.id, 4, 1).unwrap();
        assert_eq!(db.available_copies(title.id).unwrap(), Some(3));
    }
}
