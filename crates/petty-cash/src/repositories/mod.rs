//! SQL for the petty cash tables.
//!
//! Functions take an executor so services can run them on the pool or inside
//! their own transaction.

pub mod categories;
pub mod entries;
pub mod receipts;
pub mod reconciliations;
pub mod replenishments;
pub mod roles;

pub use categories::CategoryRepository;
pub use entries::{EntryRecord, EntryRepository, LedgerTotals};
pub use receipts::EntryReceiptRepository;
pub use reconciliations::{NewReconciliation, ReconciliationRepository};
pub use replenishments::ReplenishmentRepository;
pub use roles::PettyCashRoleRepository;
