//! Petty cash for the Feza backend.
//!
//! A debit/credit ledger whose balance only counts approved entries.
//! Entries start pending and lock on approval; reconciliation posts a
//! period's approved entries against a cash count, and completed
//! replenishments post approved credits. What a user may do is decided by
//! their petty cash role (viewer, custodian, approver, manager).

mod access;
pub mod entities;
mod error;
pub mod repositories;
pub mod services;

pub use access::Actor;
pub use entities::*;
pub use error::{PettyCashError, PettyCashResult};
pub use services::{CategorySpend, PettyCashService, PettyCashSummary};
