use chrono::NaiveDate;
use feza_database::{now_rfc3339, round_money, Page};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};

use crate::entities::{ApprovalStatus, EntryFilter, PettyCashEntry, TransactionType};
use crate::PettyCashResult;

const ENTRY_SELECT: &str = "SELECT e.id, e.public_id, e.transaction_date, e.description, e.amount, \
     e.transaction_type, e.category_id, c.name AS category_name, e.payee, e.payment_method, \
     e.receipt_number, e.notes, e.approval_status, e.approved_by, ap.username AS approved_by_name, \
     e.approved_at, e.rejection_reason, e.is_locked, e.reconciliation_id, e.created_by, \
     cr.username AS created_by_name, e.created_at, e.updated_at \
     FROM petty_cash e \
     LEFT JOIN petty_cash_categories c ON c.id = e.category_id \
     LEFT JOIN users ap ON ap.id = e.approved_by \
     LEFT JOIN users cr ON cr.id = e.created_by";

/// Editable columns of a ledger entry
pub struct EntryRecord<'a> {
    pub transaction_date: NaiveDate,
    pub description: &'a str,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category_id: Option<i64>,
    pub payee: Option<&'a str>,
    pub payment_method: Option<&'a str>,
    pub receipt_number: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Approved credits and debits over some window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct LedgerTotals {
    pub credits: f64,
    pub debits: f64,
}

impl LedgerTotals {
    pub fn net(&self) -> f64 {
        round_money(self.credits - self.debits)
    }
}

pub struct EntryRepository;

impl EntryRepository {
    pub async fn find_by_public_id<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
    ) -> PettyCashResult<Option<PettyCashEntry>> {
        let entry = sqlx::query_as::<_, PettyCashEntry>(&format!("{ENTRY_SELECT} WHERE e.public_id = ?"))
            .bind(public_id)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    pub async fn find_by_id<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
    ) -> PettyCashResult<Option<PettyCashEntry>> {
        let entry = sqlx::query_as::<_, PettyCashEntry>(&format!("{ENTRY_SELECT} WHERE e.id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &EntryFilter,
        page: Page,
    ) -> PettyCashResult<(Vec<PettyCashEntry>, i64)> {
        let mut query = QueryBuilder::<Sqlite>::new(ENTRY_SELECT);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY e.transaction_date DESC, e.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = query
            .build_query_as::<PettyCashEntry>()
            .fetch_all(&mut *conn)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM petty_cash e");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        Ok((items, total))
    }

    pub async fn insert<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
        record: &EntryRecord<'_>,
        created_by: Option<i64>,
    ) -> PettyCashResult<i64> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO petty_cash (public_id, transaction_date, description, amount, \
             transaction_type, category_id, payee, payment_method, receipt_number, notes, \
             approval_status, is_locked, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?, ?)",
        )
        .bind(public_id)
        .bind(record.transaction_date)
        .bind(record.description)
        .bind(record.amount)
        .bind(record.transaction_type)
        .bind(record.category_id)
        .bind(record.payee)
        .bind(record.payment_method)
        .bind(record.receipt_number)
        .bind(record.notes)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Insert an entry that is approved and locked from the start.
    pub async fn insert_approved<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
        record: &EntryRecord<'_>,
        created_by: Option<i64>,
        approved_by: i64,
    ) -> PettyCashResult<i64> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO petty_cash (public_id, transaction_date, description, amount, \
             transaction_type, category_id, payee, payment_method, receipt_number, notes, \
             approval_status, approved_by, approved_at, is_locked, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'approved', ?, ?, 1, ?, ?, ?)",
        )
        .bind(public_id)
        .bind(record.transaction_date)
        .bind(record.description)
        .bind(record.amount)
        .bind(record.transaction_type)
        .bind(record.category_id)
        .bind(record.payee)
        .bind(record.payment_method)
        .bind(record.receipt_number)
        .bind(record.notes)
        .bind(approved_by)
        .bind(&now)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Rewrite an unlocked entry; it goes back to pending either way.
    pub async fn update<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        record: &EntryRecord<'_>,
    ) -> PettyCashResult<bool> {
        let result = sqlx::query(
            "UPDATE petty_cash SET transaction_date = ?, description = ?, amount = ?, \
             transaction_type = ?, category_id = ?, payee = ?, payment_method = ?, \
             receipt_number = ?, notes = ?, approval_status = 'pending', approved_by = NULL, \
             approved_at = NULL, rejection_reason = NULL, updated_at = ? \
             WHERE id = ? AND is_locked = 0",
        )
        .bind(record.transaction_date)
        .bind(record.description)
        .bind(record.amount)
        .bind(record.transaction_type)
        .bind(record.category_id)
        .bind(record.payee)
        .bind(record.payment_method)
        .bind(record.receipt_number)
        .bind(record.notes)
        .bind(now_rfc3339())
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> PettyCashResult<bool> {
        let result = sqlx::query("DELETE FROM petty_cash WHERE id = ? AND is_locked = 0")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// pending → approved and locked; false when the entry was not pending.
    pub async fn approve<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        approver: i64,
    ) -> PettyCashResult<bool> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE petty_cash SET approval_status = 'approved', is_locked = 1, approved_by = ?, \
             approved_at = ?, rejection_reason = NULL, updated_at = ? \
             WHERE id = ? AND approval_status = 'pending'",
        )
        .bind(approver)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn reject<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        approver: i64,
        reason: &str,
    ) -> PettyCashResult<bool> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE petty_cash SET approval_status = 'rejected', approved_by = ?, approved_at = ?, \
             rejection_reason = ?, updated_at = ? \
             WHERE id = ? AND approval_status = 'pending'",
        )
        .bind(approver)
        .bind(&now)
        .bind(reason)
        .bind(&now)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Approved totals with `transaction_date` inside the inclusive bounds.
    pub async fn approved_totals<'e>(
        executor: impl SqliteExecutor<'e>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> PettyCashResult<LedgerTotals> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT TOTAL(CASE WHEN transaction_type = 'credit' THEN amount END) AS credits, \
             TOTAL(CASE WHEN transaction_type = 'debit' THEN amount END) AS debits \
             FROM petty_cash WHERE approval_status = 'approved'",
        );
        if let Some(from) = from {
            query.push(" AND transaction_date >= ").push_bind(from);
        }
        if let Some(to) = to {
            query.push(" AND transaction_date <= ").push_bind(to);
        }
        let totals = query
            .build_query_as::<LedgerTotals>()
            .fetch_one(executor)
            .await?;
        Ok(LedgerTotals {
            credits: round_money(totals.credits),
            debits: round_money(totals.debits),
        })
    }

    /// Σ approved credits − Σ approved debits
    pub async fn balance<'e>(executor: impl SqliteExecutor<'e>) -> PettyCashResult<f64> {
        Ok(Self::approved_totals(executor, None, None).await?.net())
    }

    /// Count and total amount of entries awaiting approval.
    pub async fn pending<'e>(executor: impl SqliteExecutor<'e>) -> PettyCashResult<(i64, f64)> {
        let (count, amount): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), TOTAL(amount) FROM petty_cash WHERE approval_status = 'pending'",
        )
        .fetch_one(executor)
        .await?;
        Ok((count, round_money(amount)))
    }

    pub async fn pending_between<'e>(
        executor: impl SqliteExecutor<'e>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PettyCashResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM petty_cash WHERE approval_status = 'pending' \
             AND transaction_date >= ? AND transaction_date <= ?",
        )
        .bind(from)
        .bind(to)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Debits charged to a category between two dates, excluding rejected
    /// entries and optionally one entry being edited.
    pub async fn category_spend<'e>(
        executor: impl SqliteExecutor<'e>,
        category_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        exclude: Option<i64>,
    ) -> PettyCashResult<f64> {
        let spent: f64 = sqlx::query_scalar(
            "SELECT TOTAL(amount) FROM petty_cash WHERE category_id = ? \
             AND transaction_type = 'debit' AND approval_status != 'rejected' \
             AND transaction_date >= ? AND transaction_date <= ? AND id != ?",
        )
        .bind(category_id)
        .bind(from)
        .bind(to)
        .bind(exclude.unwrap_or(-1))
        .fetch_one(executor)
        .await?;
        Ok(round_money(spent))
    }

    /// Attach the period's approved, unposted entries to a reconciliation.
    pub async fn post_to_reconciliation<'e>(
        executor: impl SqliteExecutor<'e>,
        reconciliation_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PettyCashResult<u64> {
        let result = sqlx::query(
            "UPDATE petty_cash SET reconciliation_id = ?, is_locked = 1, updated_at = ? \
             WHERE approval_status = 'approved' AND reconciliation_id IS NULL \
             AND transaction_date >= ? AND transaction_date <= ?",
        )
        .bind(reconciliation_id)
        .bind(now_rfc3339())
        .bind(from)
        .bind(to)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_category<'e>(
        executor: impl SqliteExecutor<'e>,
        category_id: i64,
    ) -> PettyCashResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM petty_cash WHERE category_id = ?")
            .bind(category_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &EntryFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(kind) = filter.transaction_type {
        query.push(" AND e.transaction_type = ").push_bind(kind);
    }
    if let Some(status) = filter.approval_status {
        query.push(" AND e.approval_status = ").push_bind(status);
    }
    if let Some(category_id) = filter.category_id {
        query.push(" AND e.category_id = ").push_bind(category_id);
    }
    if let Some(from) = filter.from {
        query.push(" AND e.transaction_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND e.transaction_date <= ").push_bind(to);
    }
    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", search.to_lowercase());
        query
            .push(" AND (lower(e.description) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(COALESCE(e.payee, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
