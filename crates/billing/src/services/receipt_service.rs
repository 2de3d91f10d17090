use chrono::Datelike;
use feza_config::DocumentsConfig;
use feza_database::{new_public_id, round_money, Page, Paginated, SettingsRepository};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{normalise_currency, today, BillingDefaults};
use crate::entities::{non_empty, Invoice, InvoiceStatus, Receipt, ReceiptFilter, ReceiptInput};
use crate::numbering::next_number;
use crate::repositories::{InvoiceRepository, ReceiptRecord, ReceiptRepository};
use crate::verification::{compute_hash, generate_salt, verification_url, DocumentKind};
use crate::{BillingError, BillingResult};

/// Smallest difference treated as money.
const CENT: f64 = 0.005;

#[derive(Clone)]
pub struct ReceiptService {
    pool: SqlitePool,
    settings: SettingsRepository,
    verification_base_url: String,
}

impl ReceiptService {
    pub fn new(pool: SqlitePool, documents: &DocumentsConfig) -> Self {
        Self {
            settings: SettingsRepository::new(pool.clone()),
            pool,
            verification_base_url: documents.verification_base_url.clone(),
        }
    }

    /// Record a payment, settling the linked invoice in the same transaction.
    pub async fn create(
        &self,
        input: &ReceiptInput,
        created_by: Option<i64>,
    ) -> BillingResult<Receipt> {
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(BillingError::Validation(
                "amount must be greater than zero".into(),
            ));
        }
        let amount = round_money(input.amount);
        let defaults = BillingDefaults::load(&self.settings).await?;
        let payment_date = input.payment_date.unwrap_or_else(today);
        let public_id = new_public_id();

        let mut tx = self.pool.begin().await?;

        let invoice = match non_empty(&input.invoice_id) {
            Some(invoice_id) => Some(
                InvoiceRepository::find_by_public_id(&mut *tx, &invoice_id)
                    .await?
                    .ok_or_else(|| BillingError::NotFound(format!("invoice {invoice_id}")))?,
            ),
            None => None,
        };
        if let Some(invoice) = &invoice {
            ensure_payable(invoice, amount)?;
        }

        let payer_name = non_empty(&input.payer_name)
            .or_else(|| invoice.as_ref().map(|i| i.customer_name.clone()))
            .ok_or_else(|| BillingError::Validation("payer name is required".into()))?;
        let payer_email = non_empty(&input.payer_email)
            .or_else(|| invoice.as_ref().and_then(|i| i.customer_email.clone()));
        let fallback_currency = invoice
            .as_ref()
            .map(|i| i.currency.as_str())
            .unwrap_or(defaults.currency.as_str());
        let currency = normalise_currency(&input.currency, fallback_currency)?;
        if let Some(invoice) = &invoice {
            if currency != invoice.currency {
                return Err(BillingError::Validation(format!(
                    "invoice {} is billed in {}, not {currency}",
                    invoice.invoice_number, invoice.currency
                )));
            }
        }

        let number = next_number(&mut tx, DocumentKind::Receipt, payment_date.year()).await?;
        let hash = compute_hash(
            DocumentKind::Receipt,
            &number,
            amount,
            payment_date,
            &generate_salt(),
        );
        let reference = non_empty(&input.reference);
        let notes = non_empty(&input.notes);
        let id = ReceiptRepository::insert(
            &mut *tx,
            &ReceiptRecord {
                public_id: &public_id,
                receipt_number: &number,
                invoice_id: invoice.as_ref().map(|i| i.id),
                payer_name: &payer_name,
                payer_email: payer_email.as_deref(),
                amount,
                currency: &currency,
                payment_method: input.payment_method,
                payment_date,
                reference: reference.as_deref(),
                notes: notes.as_deref(),
                verification_hash: &hash,
                created_by,
            },
        )
        .await?;

        if let Some(invoice) = &invoice {
            let amount_paid = round_money(invoice.amount_paid + amount);
            let status =
                Invoice::payment_status(invoice.total, amount_paid).unwrap_or(invoice.status);
            InvoiceRepository::set_payment(&mut *tx, invoice.id, amount_paid, status).await?;
            info!(
                invoice = %invoice.invoice_number,
                amount_paid,
                status = %status,
                "invoice payment applied"
            );
        }

        tx.commit().await?;
        info!(receipt = %number, amount, "receipt recorded");

        self.find_by_id(id).await
    }

    pub async fn get(&self, public_id: &str) -> BillingResult<Receipt> {
        ReceiptRepository::find_by_public_id(&self.pool, public_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("receipt {public_id}")))
    }

    pub async fn list(
        &self,
        filter: &ReceiptFilter,
        page: Page,
    ) -> BillingResult<Paginated<Receipt>> {
        let mut conn = self.pool.acquire().await?;
        let (items, total) = ReceiptRepository::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Delete a receipt and take its amount back off the invoice.
    pub async fn delete(&self, public_id: &str) -> BillingResult<Receipt> {
        let mut tx = self.pool.begin().await?;
        let receipt = ReceiptRepository::find_by_public_id(&mut *tx, public_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("receipt {public_id}")))?;

        if let Some(invoice_id) = receipt.invoice_id {
            match InvoiceRepository::find_by_id(&mut *tx, invoice_id).await? {
                Some(invoice) => {
                    let amount_paid = round_money(invoice.amount_paid - receipt.amount).max(0.0);
                    let status = reversed_status(&invoice, amount_paid);
                    InvoiceRepository::set_payment(&mut *tx, invoice.id, amount_paid, status)
                        .await?;
                    info!(
                        invoice = %invoice.invoice_number,
                        amount_paid,
                        status = %status,
                        "invoice payment reversed"
                    );
                }
                None => warn!(receipt = %receipt.receipt_number, "linked invoice missing"),
            }
        }

        ReceiptRepository::delete(&mut *tx, receipt.id).await?;
        tx.commit().await?;

        info!(receipt = %receipt.receipt_number, "receipt deleted");
        Ok(receipt)
    }

    pub fn verification_url(&self, receipt: &Receipt) -> String {
        verification_url(
            &self.verification_base_url,
            DocumentKind::Receipt,
            &receipt.public_id,
            &receipt.verification_hash,
        )
    }

    async fn find_by_id(&self, id: i64) -> BillingResult<Receipt> {
        ReceiptRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("receipt #{id}")))
    }
}

fn ensure_payable(invoice: &Invoice, amount: f64) -> BillingResult<()> {
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(BillingError::Conflict(format!(
            "invoice {} is cancelled and cannot take payments",
            invoice.invoice_number
        )));
    }
    let outstanding = invoice.balance_due();
    if amount > outstanding + CENT {
        return Err(BillingError::Validation(format!(
            "amount {amount:.2} exceeds the outstanding balance of {outstanding:.2} on invoice {}",
            invoice.invoice_number
        )));
    }
    Ok(())
}

/// Status after a payment is taken back off an invoice.
fn reversed_status(invoice: &Invoice, amount_paid: f64) -> InvoiceStatus {
    match Invoice::payment_status(invoice.total, amount_paid) {
        Some(status) => status,
        None => match invoice.status {
            InvoiceStatus::Paid | InvoiceStatus::PartiallyPaid => {
                if invoice.due_date < today() {
                    InvoiceStatus::Overdue
                } else {
                    InvoiceStatus::Sent
                }
            }
            other => other,
        },
    }
}
