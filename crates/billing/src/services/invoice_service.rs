use chrono::{Datelike, NaiveDate};
use feza_config::DocumentsConfig;
use feza_database::{new_public_id, Page, Paginated, SettingsRepository};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{default_term, normalise_currency, today, BillingDefaults};
use crate::entities::{
    non_empty, CustomerInput, Invoice, InvoiceDocument, InvoiceFilter, InvoiceInput,
    InvoiceStatus, Receipt,
};
use crate::numbering::next_number;
use crate::repositories::{InvoiceRecord, InvoiceRepository, ReceiptRepository};
use crate::totals::{compute_totals, Totals};
use crate::verification::{compute_hash, generate_salt, verification_url, DocumentKind};
use crate::{BillingError, BillingResult};

/// Validated content of an invoice, ready to be written
pub(crate) struct PreparedInvoice {
    pub customer: CustomerInput,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub totals: Totals,
    pub notes: Option<String>,
}

/// Allocate a number and hash, then insert the invoice and its items.
///
/// Shared by invoice creation and quotation conversion; runs on the caller's
/// transaction.
pub(crate) async fn insert_invoice(
    conn: &mut SqliteConnection,
    prepared: &PreparedInvoice,
    created_by: Option<i64>,
) -> BillingResult<i64> {
    let number = next_number(conn, DocumentKind::Invoice, prepared.issue_date.year()).await?;
    let hash = compute_hash(
        DocumentKind::Invoice,
        &number,
        prepared.totals.total,
        prepared.issue_date,
        &generate_salt(),
    );
    let public_id = new_public_id();

    InvoiceRepository::insert(
        conn,
        &InvoiceRecord {
            public_id: &public_id,
            invoice_number: &number,
            customer: &prepared.customer,
            issue_date: prepared.issue_date,
            due_date: prepared.due_date,
            currency: &prepared.currency,
            totals: &prepared.totals,
            status: InvoiceStatus::Draft,
            notes: prepared.notes.as_deref(),
            verification_hash: &hash,
            created_by,
        },
    )
    .await
}

#[derive(Clone)]
pub struct InvoiceService {
    pool: SqlitePool,
    settings: SettingsRepository,
    verification_base_url: String,
}

impl InvoiceService {
    pub fn new(pool: SqlitePool, documents: &DocumentsConfig) -> Self {
        Self {
            settings: SettingsRepository::new(pool.clone()),
            pool,
            verification_base_url: documents.verification_base_url.clone(),
        }
    }

    pub async fn create(
        &self,
        input: &InvoiceInput,
        created_by: Option<i64>,
    ) -> BillingResult<InvoiceDocument> {
        let prepared = self.prepare(input, None).await?;

        let mut tx = self.pool.begin().await?;
        let id = insert_invoice(&mut tx, &prepared, created_by).await?;
        tx.commit().await?;

        let document = self.document_by_id(id).await?;
        info!(
            invoice = %document.invoice.invoice_number,
            total = document.invoice.total,
            "invoice created"
        );
        Ok(document)
    }

    pub async fn get(&self, public_id: &str) -> BillingResult<InvoiceDocument> {
        let invoice = self.find(public_id).await?;
        self.document(invoice).await
    }

    pub async fn list(
        &self,
        filter: &InvoiceFilter,
        page: Page,
    ) -> BillingResult<Paginated<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        let (items, total) = InvoiceRepository::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Replace the content of an unpaid, uncancelled invoice.
    pub async fn update(
        &self,
        public_id: &str,
        input: &InvoiceInput,
    ) -> BillingResult<InvoiceDocument> {
        let current = self.find(public_id).await?;
        ensure_editable(&current)?;
        let prepared = self.prepare(input, Some(&current)).await?;

        let mut tx = self.pool.begin().await?;
        let invoice = InvoiceRepository::find_by_id(&mut *tx, current.id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("invoice {public_id}")))?;
        ensure_editable(&invoice)?;

        let hash = compute_hash(
            DocumentKind::Invoice,
            &invoice.invoice_number,
            prepared.totals.total,
            prepared.issue_date,
            &generate_salt(),
        );
        InvoiceRepository::rewrite(
            &mut tx,
            invoice.id,
            &InvoiceRecord {
                public_id: &invoice.public_id,
                invoice_number: &invoice.invoice_number,
                customer: &prepared.customer,
                issue_date: prepared.issue_date,
                due_date: prepared.due_date,
                currency: &prepared.currency,
                totals: &prepared.totals,
                status: invoice.status,
                notes: prepared.notes.as_deref(),
                verification_hash: &hash,
                created_by: invoice.created_by,
            },
        )
        .await?;
        tx.commit().await?;

        debug!(invoice = %invoice.invoice_number, "invoice updated");
        self.document_by_id(invoice.id).await
    }

    /// Move an invoice to one of the manually settable statuses.
    pub async fn set_status(
        &self,
        public_id: &str,
        status: InvoiceStatus,
    ) -> BillingResult<InvoiceDocument> {
        if !status.is_manual() {
            return Err(BillingError::Validation(format!(
                "status {status} follows recorded payments and cannot be set directly"
            )));
        }

        let invoice = self.find(public_id).await?;
        if invoice.status == status {
            return self.document(invoice).await;
        }
        if invoice.status == InvoiceStatus::Paid {
            return Err(BillingError::Conflict(format!(
                "invoice {} is paid and can no longer change status",
                invoice.invoice_number
            )));
        }
        if invoice.amount_paid > 0.0 && status != InvoiceStatus::Overdue {
            return Err(BillingError::Conflict(format!(
                "invoice {} has payments recorded; only overdue may be set",
                invoice.invoice_number
            )));
        }

        InvoiceRepository::set_status(&self.pool, invoice.id, status).await?;
        info!(invoice = %invoice.invoice_number, from = %invoice.status, to = %status, "invoice status changed");
        self.document_by_id(invoice.id).await
    }

    pub async fn delete(&self, public_id: &str) -> BillingResult<Invoice> {
        let invoice = self.find(public_id).await?;
        let payments = ReceiptRepository::count_for_invoice(&self.pool, invoice.id).await?;
        if payments > 0 || invoice.amount_paid > 0.0 {
            return Err(BillingError::Conflict(format!(
                "invoice {} has payments recorded and cannot be deleted",
                invoice.invoice_number
            )));
        }

        InvoiceRepository::delete(&self.pool, invoice.id).await?;
        info!(invoice = %invoice.invoice_number, "invoice deleted");
        Ok(invoice)
    }

    pub async fn receipts(&self, public_id: &str) -> BillingResult<Vec<Receipt>> {
        let invoice = self.find(public_id).await?;
        ReceiptRepository::for_invoice(&self.pool, invoice.id).await
    }

    /// Flag sent invoices past their due date as overdue.
    pub async fn mark_overdue(&self, today: NaiveDate) -> BillingResult<u64> {
        let changed = InvoiceRepository::mark_overdue(&self.pool, today).await?;
        if changed > 0 {
            info!(count = changed, "invoices marked overdue");
        }
        Ok(changed)
    }

    pub(crate) async fn find(&self, public_id: &str) -> BillingResult<Invoice> {
        InvoiceRepository::find_by_public_id(&self.pool, public_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("invoice {public_id}")))
    }

    pub(crate) async fn document_by_id(&self, id: i64) -> BillingResult<InvoiceDocument> {
        let invoice = InvoiceRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("invoice #{id}")))?;
        self.document(invoice).await
    }

    pub(crate) async fn document(&self, invoice: Invoice) -> BillingResult<InvoiceDocument> {
        let items = InvoiceRepository::items(&self.pool, invoice.id).await?;
        let verification_url = verification_url(
            &self.verification_base_url,
            DocumentKind::Invoice,
            &invoice.public_id,
            &invoice.verification_hash,
        );
        Ok(InvoiceDocument {
            balance_due: invoice.balance_due(),
            items,
            verification_url,
            invoice,
        })
    }

    async fn prepare(
        &self,
        input: &InvoiceInput,
        current: Option<&Invoice>,
    ) -> BillingResult<PreparedInvoice> {
        let customer = input.customer.normalised()?;
        let defaults = match current {
            Some(invoice) => BillingDefaults {
                currency: invoice.currency.clone(),
                tax_rate: invoice.tax_rate,
            },
            None => BillingDefaults::load(&self.settings).await?,
        };

        let issue_date = input
            .issue_date
            .or(current.map(|i| i.issue_date))
            .unwrap_or_else(today);
        let due_date = input
            .due_date
            .or(current.map(|i| i.due_date))
            .unwrap_or_else(|| default_term(issue_date));
        if due_date < issue_date {
            return Err(BillingError::Validation(
                "due date cannot be before the issue date".into(),
            ));
        }

        Ok(PreparedInvoice {
            customer,
            issue_date,
            due_date,
            currency: normalise_currency(&input.currency, &defaults.currency)?,
            totals: compute_totals(&input.items, input.tax_rate.unwrap_or(defaults.tax_rate))?,
            notes: non_empty(&input.notes),
        })
    }
}

fn ensure_editable(invoice: &Invoice) -> BillingResult<()> {
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(BillingError::Conflict(format!(
            "invoice {} is cancelled",
            invoice.invoice_number
        )));
    }
    if invoice.amount_paid > 0.0 {
        return Err(BillingError::Conflict(format!(
            "invoice {} has payments recorded and cannot be edited",
            invoice.invoice_number
        )));
    }
    Ok(())
}
