//! Loan records and the borrow/return state machine.
//!
//! A loan moves NoLoan -> Active(repeat_count >= 1) -> Closed. Closed is
//! terminal for the record; borrowing again after a return starts a fresh
//! Active record for the same pair. Borrow and Return each run as a single
//! immediate transaction over the inventory row and the loan row: a failure
//! partway leaves both untouched, and concurrent calls serialize on the
//! database write lock so counts are re-checked inside the lock scope.

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult, Transaction, TransactionBehavior, params};
use serde::Serialize;

use crate::errors::Error;

use super::{Database, Result};

/// A (member, title) loan record. `repeat_count` tracks re-borrows within
/// one active lifecycle; closed records persist as history.
#[derive(Debug, Clone, Serialize)]
pub struct Loan {
    pub id: i64,
    pub member_id: i64,
    pub title_id: i64,
    pub repeat_count: i64,
    pub closed: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn loan_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<Loan> {
    Ok(Loan {
        id: row.get(0)?,
        member_id: row.get(1)?,
        title_id: row.get(2)?,
        repeat_count: row.get(3)?,
        closed: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const LOAN_COLUMNS: &str = "id, member_id, title_id, repeat_count, closed, created_at, updated_at";

fn get_loan_tx(tx: &Transaction<'_>, id: i64) -> Result<Loan> {
    let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?1");
    Ok(tx.query_row(&sql, [id], loan_from_row)?)
}

impl Database {
    /// Borrow one copy of a title for a member.
    ///
    /// Fails `TitleNotFound` / `InventoryNotFound` when the title or its
    /// ledger row is absent, `Exhausted` when no copy is available. On
    /// success the borrowed count and the active loan (created or
    /// re-borrowed) commit together.
    pub fn borrow_title(&mut self, member_id: i64, title_id: i64) -> Result<Loan> {
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

        let counts: Option<(i64, i64)> = tx
            .query_row(
                "SELECT total_copies, borrowed_copies FROM inventory WHERE title_id = ?1",
                [title_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (total, borrowed) = counts.ok_or(Error::InventoryNotFound(title_id))?;

        if total - borrowed <= 0 {
            return Err(Error::Exhausted(title_id));
        }

        tx.execute(
            "UPDATE inventory SET borrowed_copies = borrowed_copies + 1 WHERE title_id = ?1",
            [title_id],
        )?;

        let now = Utc::now().to_rfc3339();
        let active: Option<i64> = tx
            .query_row(
                "SELECT id FROM loans WHERE member_id = ?1 AND title_id = ?2 AND closed = 0",
                params![member_id, title_id],
                |row| row.get(0),
            )
            .optional()?;

        let loan_id = match active {
            Some(id) => {
                tx.execute(
                    "UPDATE loans SET repeat_count = repeat_count + 1, updated_at = ?2 WHERE id = ?1",
                    params![id, &now],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO loans (member_id, title_id, repeat_count, closed, created_at, updated_at) \
                     VALUES (?1, ?2, 1, 0, ?3, ?3)",
                    params![member_id, title_id, &now],
                )?;
                tx.last_insert_rowid()
            }
        };

        let loan = get_loan_tx(&tx, loan_id)?;
        tx.commit()?;
        Ok(loan)
    }

    /// Return a borrowed title: close the active loan and release one copy.
    ///
    /// Fails `NoActiveLoan` when the pair has no open record. A ledger with
    /// `borrowed_copies <= 0` alongside an active loan fails
    /// `InventoryInconsistent`; the caller escalates that one, since
    /// paired borrows and returns can never produce it.
    pub fn return_title(&mut self, member_id: i64, title_id: i64) -> Result<Loan> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let active: Option<i64> = tx
            .query_row(
                "SELECT id FROM loans WHERE member_id = ?1 AND title_id = ?2 AND closed = 0",
                params![member_id, title_id],
                |row| row.get(0),
            )
            .optional()?;
        let loan_id = active.ok_or(Error::NoActiveLoan {
            member_id,
            title_id,
        })?;

        let borrowed: Option<i64> = tx
            .query_row(
                "SELECT borrowed_copies FROM inventory WHERE title_id = ?1",
                [title_id],
                |row| row.get(0),
            )
            .optional()?;
        let borrowed = borrowed.ok_or(Error::InventoryNotFound(title_id))?;

        if borrowed <= 0 {
            return Err(Error::InventoryInconsistent {
                title_id,
                borrowed_copies: borrowed,
            });
        }

        tx.execute(
            "UPDATE inventory SET borrowed_copies = borrowed_copies - 1 WHERE title_id = ?1",
            [title_id],
        )?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE loans SET closed = 1, updated_at = ?2 WHERE id = ?1",
            params![loan_id, &now],
        )?;

        let loan = get_loan_tx(&tx, loan_id)?;
        tx.commit()?;
        Ok(loan)
    }

    /// The open loan for a (member, title) pair, if any. At most one exists.
    pub fn active_loan(&self, member_id: i64, title_id: i64) -> Result<Option<Loan>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE member_id = ?1 AND title_id = ?2 AND closed = 0"
        );
        let result = self
            .conn()
            .query_row(&sql, params![member_id, title_id], loan_from_row)
            .optional()?;
        Ok(result)
    }

    /// All open loans for a member, ordered by loan id.
    pub fn active_loans(&self, member_id: i64) -> Result<Vec<Loan>> {
        let sql =
            format!("SELECT {LOAN_COLUMNS} FROM loans WHERE member_id = ?1 AND closed = 0 ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let loans: SqliteResult<Vec<Loan>> = stmt.query_map([member_id], loan_from_row)?.collect();
        Ok(loans?)
    }

    /// Full loan history for a member (open and closed), ordered by loan id.
    pub fn loan_history(&self, member_id: i64) -> Result<Vec<Loan>> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE member_id = ?1 ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let loans: SqliteResult<Vec<Loan>> = stmt.query_map([member_id], loan_from_row)?.collect();
        Ok(loans?)
    }
}
