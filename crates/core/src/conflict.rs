// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict table for request admission control.
//!
//! The table answers "which operation codes may not coexist with code X for
//! the same target entity". A `None` entry means no conflicts at all, and
//! any number of pending requests of that type may coexist. Every other
//! entry implicitly conflicts with itself, so at most one pending instance
//! of that operation is allowed per target.

use crate::operation::Op;
use std::collections::BTreeMap;
use thiserror::Error;

/// Error raised when the table has no entry for an operation code.
///
/// This is a configuration mistake and should be treated as fatal at
/// startup, not recovered per-call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no conflict table entry for operation {0}")]
pub struct UnknownOperationError(pub Op);

/// Static mapping from operation code to the codes it conflicts with.
#[derive(Debug, Clone)]
pub struct ConflictTable {
    entries: BTreeMap<Op, Option<Vec<Op>>>,
}

impl ConflictTable {
    /// Build an empty table. Useful for tests that want a custom mapping.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an entry. `None` means the operation has no conflicts.
    pub fn with_entry(mut self, op: Op, conflicts: Option<Vec<Op>>) -> Self {
        self.entries.insert(op, conflicts);
        self
    }

    /// The conflict set for `op`, with the implicit self-conflict appended.
    ///
    /// Pure: computes a fresh vector on every call, never mutating the
    /// table. The self-reference is added once, even when `op` already
    /// lists itself.
    pub fn conflicts_of(&self, op: Op) -> Result<Vec<Op>, UnknownOperationError> {
        let entry = self.entries.get(&op).ok_or(UnknownOperationError(op))?;
        Ok(match entry {
            None => Vec::new(),
            Some(listed) => {
                let mut conflicts = listed.clone();
                if !conflicts.contains(&op) {
                    conflicts.push(op);
                }
                conflicts
            }
        })
    }

    /// Check that every known operation code has an entry.
    ///
    /// Called at startup so a missing mapping fails before any request is
    /// admitted.
    pub fn validate(&self) -> Result<(), UnknownOperationError> {
        for op in Op::ALL {
            if !self.entries.contains_key(&op) {
                return Err(UnknownOperationError(op));
            }
        }
        Ok(())
    }
}

impl Default for ConflictTable {
    /// The production table.
    ///
    /// The four move operations are mutually exclusive and exclude delete;
    /// delete additionally excludes mailbox creation. Mailbox operations
    /// form their own cluster. Give-away, list-admin additions, and
    /// quarantine refreshes carry no conflicts and may pile up freely.
    fn default() -> Self {
        use Op::*;
        Self::empty()
            .with_entry(MoveUser, Some(vec![MoveStudent, MoveUserNow, MoveRequest, DeleteUser]))
            .with_entry(MoveStudent, Some(vec![MoveUser, MoveUserNow, MoveRequest, DeleteUser]))
            .with_entry(MoveUserNow, Some(vec![MoveStudent, MoveUser, MoveRequest, DeleteUser]))
            .with_entry(MoveRequest, Some(vec![MoveUser, MoveUserNow, MoveStudent, DeleteUser]))
            .with_entry(MoveGive, None)
            .with_entry(DeleteUser, Some(vec![MoveUser, MoveUserNow, MoveStudent, EmailCreate]))
            .with_entry(EmailMove, Some(vec![DeleteUser]))
            .with_entry(EmailCreate, Some(vec![EmailDelete, DeleteUser]))
            .with_entry(EmailDelete, Some(vec![EmailCreate, EmailMove]))
            .with_entry(EmailQuota, Some(vec![EmailDelete]))
            .with_entry(EmailConvert, Some(vec![EmailDelete]))
            .with_entry(ListCreate, Some(vec![ListRemove]))
            .with_entry(ListAddAdmin, None)
            .with_entry(ListRemove, Some(vec![ListCreate, ListAddAdmin]))
            .with_entry(QuarantineRefresh, None)
    }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
