// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation codes for deferred administrative requests.
//!
//! Each pending request carries one of these codes. The set is closed on
//! purpose: the conflict table must be exhaustive over it, so a missing
//! mapping is a startup error instead of a failure deep inside request
//! handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A deferred administrative operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Op {
    /// Move a user's home directory (batch slot)
    MoveUser,
    /// Move a student user between disks
    MoveStudent,
    /// Move a user's home directory immediately
    MoveUserNow,
    /// Queue a move that awaits remote-side confirmation
    MoveRequest,
    /// Hand a user over to a new owning group (matched by destination)
    MoveGive,
    /// Delete a user account
    DeleteUser,
    /// Move a mail spool between servers
    EmailMove,
    /// Provision a new mailbox
    EmailCreate,
    /// Remove a mailbox
    EmailDelete,
    /// Set a mailbox hard quota
    EmailQuota,
    /// Convert a user's mail configuration
    EmailConvert,
    /// Create a mailing list
    ListCreate,
    /// Add an admin address to a mailing list
    ListAddAdmin,
    /// Remove a mailing list
    ListRemove,
    /// Refresh quarantine state
    QuarantineRefresh,
}

impl Op {
    /// All operation codes, in a stable order.
    pub const ALL: [Op; 15] = [
        Op::MoveUser,
        Op::MoveStudent,
        Op::MoveUserNow,
        Op::MoveRequest,
        Op::MoveGive,
        Op::DeleteUser,
        Op::EmailMove,
        Op::EmailCreate,
        Op::EmailDelete,
        Op::EmailQuota,
        Op::EmailConvert,
        Op::ListCreate,
        Op::ListAddAdmin,
        Op::ListRemove,
        Op::QuarantineRefresh,
    ];

    /// Stable wire/config code for this operation.
    pub fn code(&self) -> &'static str {
        match self {
            Op::MoveUser => "move-user",
            Op::MoveStudent => "move-student",
            Op::MoveUserNow => "move-user-now",
            Op::MoveRequest => "move-request",
            Op::MoveGive => "move-give",
            Op::DeleteUser => "delete-user",
            Op::EmailMove => "email-move",
            Op::EmailCreate => "email-create",
            Op::EmailDelete => "email-delete",
            Op::EmailQuota => "email-quota",
            Op::EmailConvert => "email-convert",
            Op::ListCreate => "list-create",
            Op::ListAddAdmin => "list-add-admin",
            Op::ListRemove => "list-remove",
            Op::QuarantineRefresh => "quarantine-refresh",
        }
    }

    /// Human-readable description, used by reporting and error messages.
    pub fn description(&self) -> &'static str {
        match self {
            Op::MoveUser => "Move user (batch)",
            Op::MoveStudent => "Move student",
            Op::MoveUserNow => "Move user immediately",
            Op::MoveRequest => "Move request, awaiting confirmation",
            Op::MoveGive => "Give user away to group",
            Op::DeleteUser => "Delete user",
            Op::EmailMove => "Move mail spool",
            Op::EmailCreate => "Create mailbox",
            Op::EmailDelete => "Delete mailbox",
            Op::EmailQuota => "Set mailbox hard quota",
            Op::EmailConvert => "Convert user mail config",
            Op::ListCreate => "Create mailing list",
            Op::ListAddAdmin => "Add admin to mailing list",
            Op::ListRemove => "Remove mailing list",
            Op::QuarantineRefresh => "Refresh quarantine",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error for an unrecognized operation code string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation code: {0}")]
pub struct ParseOpError(pub String);

impl FromStr for Op {
    type Err = ParseOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::ALL
            .iter()
            .find(|op| op.code() == s)
            .copied()
            .ok_or_else(|| ParseOpError(s.to_string()))
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
