use chrono::NaiveDate;
use feza_database::now_rfc3339;
use sqlx::SqliteExecutor;

use crate::entities::{Replenishment, ReplenishmentStatus};
use crate::PettyCashResult;

const REPLENISHMENT_SELECT: &str = "SELECT r.id, r.public_id, r.request_date, r.amount, r.reason, \
     r.status, r.requested_by, u.username AS requested_by_name, r.approved_by, r.approved_at, \
     r.rejection_reason, r.completed_at, r.transaction_id, p.public_id AS transaction_public_id, \
     r.created_at, r.updated_at \
     FROM petty_cash_replenishment r \
     LEFT JOIN users u ON u.id = r.requested_by \
     LEFT JOIN petty_cash p ON p.id = r.transaction_id";

pub struct ReplenishmentRepository;

impl ReplenishmentRepository {
    pub async fn insert<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
        request_date: NaiveDate,
        amount: f64,
        reason: &str,
        requested_by: Option<i64>,
    ) -> PettyCashResult<i64> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO petty_cash_replenishment (public_id, request_date, amount, reason, status, \
             requested_by, created_at, updated_at) VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(public_id)
        .bind(request_date)
        .bind(amount)
        .bind(reason)
        .bind(requested_by)
        .bind(&now)
        .bind(&now)
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn find_by_public_id<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
    ) -> PettyCashResult<Option<Replenishment>> {
        let replenishment = sqlx::query_as::<_, Replenishment>(&format!(
            "{REPLENISHMENT_SELECT} WHERE r.public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(executor)
        .await?;
        Ok(replenishment)
    }

    pub async fn list<'e>(
        executor: impl SqliteExecutor<'e>,
        status: Option<ReplenishmentStatus>,
    ) -> PettyCashResult<Vec<Replenishment>> {
        let replenishments = match status {
            Some(status) => {
                sqlx::query_as::<_, Replenishment>(&format!(
                    "{REPLENISHMENT_SELECT} WHERE r.status = ? ORDER BY r.request_date DESC, r.id DESC"
                ))
                .bind(status)
                .fetch_all(executor)
                .await?
            }
            None => {
                sqlx::query_as::<_, Replenishment>(&format!(
                    "{REPLENISHMENT_SELECT} ORDER BY r.request_date DESC, r.id DESC"
                ))
                .fetch_all(executor)
                .await?
            }
        };
        Ok(replenishments)
    }

    /// Move a request from `from` to `to`; false when it was no longer in `from`.
    pub async fn transition<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        from: ReplenishmentStatus,
        to: ReplenishmentStatus,
        actor: i64,
        rejection_reason: Option<&str>,
    ) -> PettyCashResult<bool> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE petty_cash_replenishment SET status = ?, approved_by = ?, approved_at = ?, \
             rejection_reason = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to)
        .bind(actor)
        .bind(&now)
        .bind(rejection_reason)
        .bind(&now)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn complete<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        transaction_id: i64,
    ) -> PettyCashResult<bool> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE petty_cash_replenishment SET status = 'completed', completed_at = ?, \
             transaction_id = ?, updated_at = ? WHERE id = ? AND status = 'approved'",
        )
        .bind(&now)
        .bind(transaction_id)
        .bind(&now)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
