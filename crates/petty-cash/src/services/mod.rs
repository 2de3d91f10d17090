//! Petty cash workflows.
//!
//! A single [`PettyCashService`] carries the pool; its operations are split
//! by concern across the submodules.

mod approvals;
mod categories;
mod ledger;
mod reconciliation;
mod replenishment;
mod roles;
mod summary;

pub use summary::{CategorySpend, PettyCashSummary};

use chrono::{Datelike, Months, NaiveDate, Utc};
use feza_database::SettingsRepository;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::access::Actor;
use crate::entities::PettyCashRole;
use crate::repositories::{PettyCashRoleRepository, ReconciliationRepository};
use crate::{PettyCashError, PettyCashResult};

#[derive(Clone)]
pub struct PettyCashService {
    pool: SqlitePool,
    settings: SettingsRepository,
}

impl PettyCashService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            settings: SettingsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Resolve the petty cash role of a user.
    ///
    /// Holders of the global `petty_cash.manage` permission act as managers;
    /// users without an assignment are viewers.
    pub async fn actor(&self, user_id: i64, global_manager: bool) -> PettyCashResult<Actor> {
        if global_manager {
            return Ok(Actor::manager(user_id));
        }
        Ok(
            match PettyCashRoleRepository::for_user(&self.pool, user_id).await? {
                Some(assignment) => Actor::new(user_id, assignment.role, assignment.approval_limit),
                None => Actor::new(user_id, PettyCashRole::Viewer, None),
            },
        )
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Entries dated inside a reconciled period may no longer be added, edited or
/// approved.
pub(crate) async fn ensure_open_period<'e>(
    executor: impl SqliteExecutor<'e>,
    date: NaiveDate,
) -> PettyCashResult<()> {
    if ReconciliationRepository::overlaps(executor, date, date).await? {
        return Err(PettyCashError::Conflict(format!(
            "{date} falls inside a reconciled period"
        )));
    }
    Ok(())
}

/// First and last day of the month containing `date`.
pub(crate) fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_the_whole_month() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(month_bounds(d(2026, 2, 14)), (d(2026, 2, 1), d(2026, 2, 28)));
        assert_eq!(month_bounds(d(2028, 2, 29)), (d(2028, 2, 1), d(2028, 2, 29)));
        assert_eq!(month_bounds(d(2026, 12, 31)), (d(2026, 12, 1), d(2026, 12, 31)));
    }
}
