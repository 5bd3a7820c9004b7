//! Circulation operations: borrow, return, and inventory administration.

use crate::errors::Error;
use crate::sqlite::{CatalogStats, InventoryRecord, Loan};
use crate::types::Role;

use super::store::CatalogStore;

impl CatalogStore {
    /// Borrow one copy of a title for a member.
    ///
    /// Re-borrowing while the loan is active increments its repeat count;
    /// the borrowed-copy count increases either way.
    pub fn borrow(&mut self, member_id: i64, title_id: i64) -> Result<Loan, Error> {
        self.db.borrow_title(member_id, title_id)
    }

    /// Return a borrowed title, closing the active loan.
    ///
    /// An inconsistent ledger is escalated in the log before propagating:
    /// it means a prior bug let counts and loan records drift apart, which
    /// needs operational follow-up rather than user-level handling.
    pub fn return_title(&mut self, member_id: i64, title_id: i64) -> Result<Loan, Error> {
        match self.db.return_title(member_id, title_id) {
            Err(e @ Error::InventoryInconsistent { .. }) => {
                tracing::error!(member_id, title_id, error = %e, "inventory inconsistency detected on return");
                Err(e)
            }
            other => other,
        }
    }

    /// The member's open loans.
    pub fn active_loans(&self, member_id: i64) -> Result<Vec<Loan>, Error> {
        self.db.active_loans(member_id)
    }

    /// The member's full loan history, closed records included.
    pub fn loan_history(&self, member_id: i64) -> Result<Vec<Loan>, Error> {
        self.db.loan_history(member_id)
    }

    /// Aggregate counts for the staff dashboard (staff only): title total,
    /// copies currently on loan, and open loan records.
    pub fn stats(&self, role: Role) -> Result<CatalogStats, Error> {
        Self::require_staff(role, "reading catalog statistics")?;
        self.db.catalog_stats()
    }

    /// Create the inventory record for a title (staff only).
    pub fn set_inventory(
        &mut self,
        role: Role,
        title_id: i64,
        total_copies: i64,
        borrowed_copies: i64,
    ) -> Result<InventoryRecord, Error> {
        Self::require_staff(role, "creating inventory records")?;
        self.db.set_inventory(title_id, total_copies, borrowed_copies)
    }

    /// Adjust an inventory record by signed deltas (staff only).
    pub fn update_inventory(
        &mut self,
        role: Role,
        title_id: i64,
        total_delta: i64,
        borrowed_delta: i64,
    ) -> Result<InventoryRecord, Error> {
        Self::require_staff(role, "adjusting inventory records")?;
        self.db.update_inventory(title_id, total_delta, borrowed_delta)
    }

    /// Read the inventory record for a title (staff only).
    pub fn get_inventory(&self, role: Role, title_id: i64) -> Result<InventoryRecord, Error> {
        Self::require_staff(role, "reading inventory records")?;
        self.db
            .get_inventory(title_id)?
            .ok_or(Error::InventoryNotFound(title_id))
    }

    /// List inventory records (staff only).
    pub fn list_inventory(
        &self,
        role: Role,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<InventoryRecord>, Error> {
        Self::require_staff(role, "listing inventory records")?;
        Self::validate_limit(limit)?;
        self.db.list_inventory(limit, offset)
    }

    /// Delete the inventory record for a title (staff only).
    pub fn delete_inventory(&mut self, role: Role, title_id: i64) -> Result<(), Error> {
        Self::require_staff(role, "deleting inventory records")?;
        if !self.db.delete_inventory(title_id)? {
            return Err(Error::InventoryNotFound(title_id));
        }
        Ok(())
    }
}
