use chrono::NaiveDate;
use feza_database::now_rfc3339;
use sqlx::SqliteExecutor;

use crate::entities::{Reconciliation, ReconciliationStatus};
use crate::PettyCashResult;

const RECONCILIATION_SELECT: &str = "SELECT r.id, r.period_start, r.period_end, \
     r.opening_balance, r.total_credits, r.total_debits, r.expected_balance, r.actual_balance, \
     r.difference, r.status, r.notes, r.reconciled_by, u.username AS reconciled_by_name, \
     r.created_at, \
     (SELECT COUNT(*) FROM petty_cash p WHERE p.reconciliation_id = r.id) AS entry_count \
     FROM petty_cash_reconciliation r LEFT JOIN users u ON u.id = r.reconciled_by";

pub struct NewReconciliation<'a> {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: f64,
    pub total_credits: f64,
    pub total_debits: f64,
    pub expected_balance: f64,
    pub actual_balance: f64,
    pub difference: f64,
    pub status: ReconciliationStatus,
    pub notes: Option<&'a str>,
    pub reconciled_by: Option<i64>,
}

pub struct ReconciliationRepository;

impl ReconciliationRepository {
    pub async fn insert<'e>(
        executor: impl SqliteExecutor<'e>,
        record: &NewReconciliation<'_>,
    ) -> PettyCashResult<i64> {
        let id = sqlx::query(
            "INSERT INTO petty_cash_reconciliation (period_start, period_end, opening_balance, \
             total_credits, total_debits, expected_balance, actual_balance, difference, status, \
             notes, reconciled_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.period_start)
        .bind(record.period_end)
        .bind(record.opening_balance)
        .bind(record.total_credits)
        .bind(record.total_debits)
        .bind(record.expected_balance)
        .bind(record.actual_balance)
        .bind(record.difference)
        .bind(record.status)
        .bind(record.notes)
        .bind(record.reconciled_by)
        .bind(now_rfc3339())
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn find_by_id<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
    ) -> PettyCashResult<Option<Reconciliation>> {
        let reconciliation =
            sqlx::query_as::<_, Reconciliation>(&format!("{RECONCILIATION_SELECT} WHERE r.id = ?"))
                .bind(id)
                .fetch_optional(executor)
                .await?;
        Ok(reconciliation)
    }

    pub async fn list<'e>(executor: impl SqliteExecutor<'e>) -> PettyCashResult<Vec<Reconciliation>> {
        let reconciliations = sqlx::query_as::<_, Reconciliation>(&format!(
            "{RECONCILIATION_SELECT} ORDER BY r.period_end DESC, r.id DESC"
        ))
        .fetch_all(executor)
        .await?;
        Ok(reconciliations)
    }

    /// Whether an earlier reconciliation already covers part of the period.
    pub async fn overlaps<'e>(
        executor: impl SqliteExecutor<'e>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PettyCashResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM petty_cash_reconciliation WHERE period_start <= ? AND period_end >= ?",
        )
        .bind(to)
        .bind(from)
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }
}
