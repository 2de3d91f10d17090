use chrono::NaiveDate;
use feza_database::{now_rfc3339, Page};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};

use super::{push_date_range, search_pattern};
use crate::entities::{CustomerInput, Invoice, InvoiceFilter, InvoiceStatus, LineItem};
use crate::totals::Totals;
use crate::BillingResult;

const INVOICE_COLUMNS: &str = "id, public_id, invoice_number, customer_name, customer_email, \
     customer_phone, customer_address, issue_date, due_date, currency, subtotal, tax_rate, \
     tax_amount, total, amount_paid, status, notes, verification_hash, created_by, created_at, \
     updated_at";

/// Column values for a new or rewritten invoice
pub struct InvoiceRecord<'a> {
    pub public_id: &'a str,
    pub invoice_number: &'a str,
    pub customer: &'a CustomerInput,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: &'a str,
    pub totals: &'a Totals,
    pub status: InvoiceStatus,
    pub notes: Option<&'a str>,
    pub verification_hash: &'a str,
    pub created_by: Option<i64>,
}

pub struct InvoiceRepository;

impl InvoiceRepository {
    pub async fn find_by_public_id<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
    ) -> BillingResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(executor)
        .await?;
        Ok(invoice)
    }

    pub async fn find_by_id<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
    ) -> BillingResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(invoice)
    }

    pub async fn items<'e>(
        executor: impl SqliteExecutor<'e>,
        invoice_id: i64,
    ) -> BillingResult<Vec<LineItem>> {
        let items = sqlx::query_as::<_, LineItem>(
            "SELECT id, description, quantity, unit_price, line_total, position \
             FROM invoice_items WHERE invoice_id = ? ORDER BY position, id",
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &InvoiceFilter,
        page: Page,
    ) -> BillingResult<(Vec<Invoice>, i64)> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {INVOICE_COLUMNS} FROM invoices"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY issue_date DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = query.build_query_as::<Invoice>().fetch_all(&mut *conn).await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM invoices");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        Ok((items, total))
    }

    pub async fn insert(conn: &mut SqliteConnection, record: &InvoiceRecord<'_>) -> BillingResult<i64> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO invoices (public_id, invoice_number, customer_name, customer_email, \
             customer_phone, customer_address, issue_date, due_date, currency, subtotal, tax_rate, \
             tax_amount, total, amount_paid, status, notes, verification_hash, created_by, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.public_id)
        .bind(record.invoice_number)
        .bind(&record.customer.customer_name)
        .bind(&record.customer.customer_email)
        .bind(&record.customer.customer_phone)
        .bind(&record.customer.customer_address)
        .bind(record.issue_date)
        .bind(record.due_date)
        .bind(record.currency)
        .bind(record.totals.subtotal)
        .bind(record.totals.tax_rate)
        .bind(record.totals.tax_amount)
        .bind(record.totals.total)
        .bind(record.status)
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

    /// Rewrite customer, dates, totals and items of an existing invoice.
    pub async fn rewrite(
        conn: &mut SqliteConnection,
        id: i64,
        record: &InvoiceRecord<'_>,
    ) -> BillingResult<()> {
        sqlx::query(
            "UPDATE invoices SET customer_name = ?, customer_email = ?, customer_phone = ?, \
             customer_address = ?, issue_date = ?, due_date = ?, currency = ?, subtotal = ?, \
             tax_rate = ?, tax_amount = ?, total = ?, notes = ?, verification_hash = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&record.customer.customer_name)
        .bind(&record.customer.customer_email)
        .bind(&record.customer.customer_phone)
        .bind(&record.customer.customer_address)
        .bind(record.issue_date)
        .bind(record.due_date)
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

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Self::insert_items(conn, id, record.totals).await
    }

    pub async fn set_status<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        status: InvoiceStatus,
    ) -> BillingResult<()> {
        sqlx::query("UPDATE invoices SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(now_rfc3339())
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_payment<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        amount_paid: f64,
        status: InvoiceStatus,
    ) -> BillingResult<()> {
        sqlx::query("UPDATE invoices SET amount_paid = ?, status = ?, updated_at = ? WHERE id = ?")
            .bind(amount_paid)
            .bind(status)
            .bind(now_rfc3339())
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> BillingResult<()> {
        sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Flag sent invoices whose due date has passed; returns how many changed.
    pub async fn mark_overdue<'e>(
        executor: impl SqliteExecutor<'e>,
        today: NaiveDate,
    ) -> BillingResult<u64> {
        let result = sqlx::query(
            "UPDATE invoices SET status = 'overdue', updated_at = ? \
             WHERE status = 'sent' AND due_date < ?",
        )
        .bind(now_rfc3339())
        .bind(today)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_items(conn: &mut SqliteConnection, invoice_id: i64, totals: &Totals) -> BillingResult<()> {
        for line in &totals.lines {
            sqlx::query(
                "INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, line_total, position) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(invoice_id)
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

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &InvoiceFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(pattern) = search_pattern(filter.search.as_deref()) {
        query
            .push(" AND (lower(customer_name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(invoice_number) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    push_date_range(query, "issue_date", filter.from, filter.to);
}
