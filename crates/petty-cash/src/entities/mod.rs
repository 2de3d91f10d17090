//! Petty cash entities

pub mod category;
pub mod entry;
pub mod receipt;
pub mod reconciliation;
pub mod replenishment;
pub mod role;

pub use category::{Category, CategoryInput, CategoryRemoval};
pub use entry::{
    ApprovalStatus, BulkApproval, EntryFilter, EntryInput, PettyCashEntry, RecordedEntry,
    SkippedEntry, TransactionType,
};
pub use receipt::{EntryReceipt, EntryReceiptInput};
pub use reconciliation::{Reconciliation, ReconciliationInput, ReconciliationStatus};
pub use replenishment::{Replenishment, ReplenishmentInput, ReplenishmentStatus};
pub use role::{PettyCashRole, RoleAssignment};

pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
