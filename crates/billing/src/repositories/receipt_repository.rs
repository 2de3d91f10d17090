use chrono::NaiveDate;
use feza_database::{now_rfc3339, Page};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};

use super::{push_date_range, search_pattern};
use crate::entities::{PaymentMethod, Receipt, ReceiptFilter};
use crate::BillingResult;

const RECEIPT_SELECT: &str = "SELECT r.id, r.public_id, r.receipt_number, r.invoice_id, \
     i.invoice_number, r.payer_name, r.payer_email, r.amount, r.currency, r.payment_method, \
     r.payment_date, r.reference, r.notes, r.verification_hash, r.created_by, r.created_at \
     FROM receipts r LEFT JOIN invoices i ON i.id = r.invoice_id";

pub struct ReceiptRecord<'a> {
    pub public_id: &'a str,
    pub receipt_number: &'a str,
    pub invoice_id: Option<i64>,
    pub payer_name: &'a str,
    pub payer_email: Option<&'a str>,
    pub amount: f64,
    pub currency: &'a str,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub verification_hash: &'a str,
    pub created_by: Option<i64>,
}

pub struct ReceiptRepository;

impl ReceiptRepository {
    pub async fn find_by_public_id<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
    ) -> BillingResult<Option<Receipt>> {
        let receipt = sqlx::query_as::<_, Receipt>(&format!("{RECEIPT_SELECT} WHERE r.public_id = ?"))
            .bind(public_id)
            .fetch_optional(executor)
            .await?;
        Ok(receipt)
    }

    pub async fn find_by_id<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
    ) -> BillingResult<Option<Receipt>> {
        let receipt = sqlx::query_as::<_, Receipt>(&format!("{RECEIPT_SELECT} WHERE r.id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(receipt)
    }

    pub async fn for_invoice<'e>(
        executor: impl SqliteExecutor<'e>,
        invoice_id: i64,
    ) -> BillingResult<Vec<Receipt>> {
        let receipts = sqlx::query_as::<_, Receipt>(&format!(
            "{RECEIPT_SELECT} WHERE r.invoice_id = ? ORDER BY r.payment_date, r.id"
        ))
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;
        Ok(receipts)
    }

    pub async fn count_for_invoice<'e>(
        executor: impl SqliteExecutor<'e>,
        invoice_id: i64,
    ) -> BillingResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM receipts WHERE invoice_id = ?")
            .bind(invoice_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &ReceiptFilter,
        page: Page,
    ) -> BillingResult<(Vec<Receipt>, i64)> {
        let mut query = QueryBuilder::<Sqlite>::new(RECEIPT_SELECT);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY r.payment_date DESC, r.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = query
            .build_query_as::<Receipt>()
            .fetch_all(&mut *conn)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM receipts r LEFT JOIN invoices i ON i.id = r.invoice_id",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        Ok((items, total))
    }

    pub async fn insert<'e>(
        executor: impl SqliteExecutor<'e>,
        record: &ReceiptRecord<'_>,
    ) -> BillingResult<i64> {
        let id = sqlx::query(
            "INSERT INTO receipts (public_id, receipt_number, invoice_id, payer_name, payer_email, \
             amount, currency, payment_method, payment_date, reference, notes, verification_hash, \
             created_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.public_id)
        .bind(record.receipt_number)
        .bind(record.invoice_id)
        .bind(record.payer_name)
        .bind(record.payer_email)
        .bind(record.amount)
        .bind(record.currency)
        .bind(record.payment_method)
        .bind(record.payment_date)
        .bind(record.reference)
        .bind(record.notes)
        .bind(record.verification_hash)
        .bind(record.created_by)
        .bind(now_rfc3339())
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn delete<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> BillingResult<()> {
        sqlx::query("DELETE FROM receipts WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ReceiptFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(method) = filter.payment_method {
        query.push(" AND r.payment_method = ").push_bind(method);
    }
    if let Some(pattern) = search_pattern(filter.search.as_deref()) {
        query
            .push(" AND (lower(r.payer_name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(r.receipt_number) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(i.invoice_number) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    push_date_range(query, "r.payment_date", filter.from, filter.to);
}
