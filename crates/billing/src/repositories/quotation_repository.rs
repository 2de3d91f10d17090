use chrono::NaiveDate;
use feza_database::{now_rfc3339, Page};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};

use super::{push_date_range, search_pattern};
use crate::entities::{CustomerInput, LineItem, Quotation, QuotationFilter, QuotationStatus};
use crate::totals::Totals;
use crate::BillingResult;

const QUOTATION_COLUMNS: &str = "id, public_id, quotation_number, customer_name, customer_email, \
     customer_phone, customer_address, issue_date, valid_until, currency, subtotal, tax_rate, \
     tax_amount, total, status, converted_invoice_id, notes, verification_hash, created_by, \
     created_at, updated_at";

pub struct QuotationRecord<'a> {
    pub public_id: &'a str,
    pub quotation_number: &'a str,
    pub customer: &'a CustomerInput,
    pub issue_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub currency: &'a str,
    pub totals: &'a Totals,
    pub notes: Option<&'a str>,
    pub verification_hash: &'a str,
    pub created_by: Option<i64>,
}

pub struct QuotationRepository;

impl QuotationRepository {
    pub async fn find_by_public_id<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
    ) -> BillingResult<Option<Quotation>> {
        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(executor)
        .await?;
        Ok(quotation)
    }

    pub async fn items<'e>(
        executor: impl SqliteExecutor<'e>,
        quotation_id: i64,
    ) -> BillingResult<Vec<LineItem>> {
        let items = sqlx::query_as::<_, LineItem>(
            "SELECT id, description, quantity, unit_price, line_total, position \
             FROM quotation_items WHERE quotation_id = ? ORDER BY position, id",
        )
        .bind(quotation_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &QuotationFilter,
        page: Page,
    ) -> BillingResult<(Vec<Quotation>, i64)> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {QUOTATION_COLUMNS} FROM quotations"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY issue_date DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = query
            .build_query_as::<Quotation>()
            .fetch_all(&mut *conn)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM quotations");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        Ok((items, total))
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        record: &QuotationRecord<'_>,
    ) -> BillingResult<i64> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO quotations (public_id, quotation_number, customer_name, customer_email, \
             customer_phone, customer_address, issue_date, valid_until, currency, subtotal, \
             tax_rate, tax_amount, total, status, notes, verification_hash, created_by, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?, ?, ?)",
        )
        .bind(record.public_id)
        .bind(record.quotation_number)
        .bind(&record.customer.customer_name)
        .bind(&record.customer.customer_email)
        .bind(&record.customer.customer_phone)
        .bind(&record.customer.customer_address)
        .bind(record.issue_date)
        .bind(record.valid_until)
        .bind(record.currency)
        .bind(record.totals.subtotal)
        .bind(record.totals.tax_rate)
        .bind(record.totals.tax_amount)
        .bind(record.totals.total)
        .bind(record.notes)
        .bind(record.verification_hash)
        .bind(record.created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        Self::insert_items(conn, id, record.totals).await?;
        Ok(id)
    }

    pub async fn rewrite(
        conn: &mut SqliteConnection,
        id: i64,
        record: &QuotationRecord<'_>,
    ) -> BillingResult<()> {
        sqlx::query(
            "UPDATE quotations SET customer_name = ?, customer_email = ?, customer_phone = ?, \
             customer_address = ?, issue_date = ?, valid_until = ?, currency = ?, subtotal = ?, \
             tax_rate = ?, tax_amount = ?, total = ?, notes = ?, verification_hash = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&record.customer.customer_name)
        .bind(&record.customer.customer_email)
        .bind(&record.customer.customer_phone)
        .bind(&record.customer.customer_address)
        .bind(record.issue_date)
        .bind(record.valid_until)
        .bind(record.currency)
        .bind(record.totals.subtotal)
        .bind(record.totals.tax_rate)
        .bind(record.totals.tax_amount)
        .bind(record.totals.total)
        .bind(record.notes)
        .bind(record.verification_hash)
        .bind(now_rfc3339())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM quotation_items WHERE quotation_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Self::insert_items(conn, id, record.totals).await
    }

    pub async fn set_status<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        status: QuotationStatus,
    ) -> BillingResult<()> {
        sqlx::query("UPDATE quotations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(now_rfc3339())
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Mark a quotation converted, linking the invoice it became.
    ///
    /// Guarded on the current status so a concurrent conversion of the same
    /// quotation updates nothing.
    pub async fn mark_converted<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        invoice_id: i64,
    ) -> BillingResult<bool> {
        let result = sqlx::query(
            "UPDATE quotations SET status = 'converted', converted_invoice_id = ?, updated_at = ? \
             WHERE id = ? AND status IN ('sent', 'accepted')",
        )
        .bind(invoice_id)
        .bind(now_rfc3339())
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> BillingResult<()> {
        sqlx::query("DELETE FROM quotations WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Flag open quotations whose validity has lapsed.
    pub async fn mark_expired<'e>(
        executor: impl SqliteExecutor<'e>,
        today: NaiveDate,
    ) -> BillingResult<u64> {
        let result = sqlx::query(
            "UPDATE quotations SET status = 'expired', updated_at = ? \
             WHERE status IN ('draft', 'sent') AND valid_until < ?",
        )
        .bind(now_rfc3339())
        .bind(today)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_items(
        conn: &mut SqliteConnection,
        quotation_id: i64,
        totals: &Totals,
    ) -> BillingResult<()> {
        for line in &totals.lines {
            sqlx::query(
                "INSERT INTO quotation_items (quotation_id, description, quantity, unit_price, line_total, position) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(quotation_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .bind(line.position)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &QuotationFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(pattern) = search_pattern(filter.search.as_deref()) {
        query
            .push(" AND (lower(customer_name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(quotation_number) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    push_date_range(query, "issue_date", filter.from, filter.to);
}
