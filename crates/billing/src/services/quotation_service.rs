use chrono::{Datelike, NaiveDate};
use feza_config::DocumentsConfig;
use feza_database::{new_public_id, Page, Paginated, SettingsRepository};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::invoice_service::{insert_invoice, PreparedInvoice};
use super::{default_term, normalise_currency, today, BillingDefaults, InvoiceService};
use crate::entities::{
    non_empty, CustomerInput, InvoiceDocument, Quotation, QuotationDocument, QuotationFilter,
    QuotationInput, QuotationStatus,
};
use crate::numbering::next_number;
use crate::repositories::{InvoiceRepository, QuotationRecord, QuotationRepository};
use crate::totals::{compute_totals, LineItemInput, Totals};
use crate::verification::{compute_hash, generate_salt, verification_url, DocumentKind};
use crate::{BillingError, BillingResult};

struct PreparedQuotation {
    customer: CustomerInput,
    issue_date: NaiveDate,
    valid_until: NaiveDate,
    currency: String,
    totals: Totals,
    notes: Option<String>,
}

#[derive(Clone)]
pub struct QuotationService {
    pool: SqlitePool,
    settings: SettingsRepository,
    invoices: InvoiceService,
    verification_base_url: String,
}

impl QuotationService {
    pub fn new(pool: SqlitePool, documents: &DocumentsConfig) -> Self {
        Self {
            settings: SettingsRepository::new(pool.clone()),
            invoices: InvoiceService::new(pool.clone(), documents),
            pool,
            verification_base_url: documents.verification_base_url.clone(),
        }
    }

    pub async fn create(
        &self,
        input: &QuotationInput,
        created_by: Option<i64>,
    ) -> BillingResult<QuotationDocument> {
        let prepared = self.prepare(input, None).await?;
        let public_id = new_public_id();

        let mut tx = self.pool.begin().await?;
        let number = next_number(&mut tx, DocumentKind::Quotation, prepared.issue_date.year()).await?;
        let hash = compute_hash(
            DocumentKind::Quotation,
            &number,
            prepared.totals.total,
            prepared.issue_date,
            &generate_salt(),
        );
        let id = QuotationRepository::insert(
            &mut tx,
            &QuotationRecord {
                public_id: &public_id,
                quotation_number: &number,
                customer: &prepared.customer,
                issue_date: prepared.issue_date,
                valid_until: prepared.valid_until,
                currency: &prepared.currency,
                totals: &prepared.totals,
                notes: prepared.notes.as_deref(),
                verification_hash: &hash,
                created_by,
            },
        )
        .await?;
        tx.commit().await?;

        info!(quotation = %number, id, total = prepared.totals.total, "quotation created");
        self.get(&public_id).await
    }

    pub async fn get(&self, public_id: &str) -> BillingResult<QuotationDocument> {
        let quotation = self.find(public_id).await?;
        self.document(quotation).await
    }

    pub async fn list(
        &self,
        filter: &QuotationFilter,
        page: Page,
    ) -> BillingResult<Paginated<Quotation>> {
        let mut conn = self.pool.acquire().await?;
        let (items, total) = QuotationRepository::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn update(
        &self,
        public_id: &str,
        input: &QuotationInput,
    ) -> BillingResult<QuotationDocument> {
        let current = self.find(public_id).await?;
        ensure_not_converted(&current)?;
        let prepared = self.prepare(input, Some(&current)).await?;

        let hash = compute_hash(
            DocumentKind::Quotation,
            &current.quotation_number,
            prepared.totals.total,
            prepared.issue_date,
            &generate_salt(),
        );
        let mut tx = self.pool.begin().await?;
        QuotationRepository::rewrite(
            &mut tx,
            current.id,
            &QuotationRecord {
                public_id: &current.public_id,
                quotation_number: &current.quotation_number,
                customer: &prepared.customer,
                issue_date: prepared.issue_date,
                valid_until: prepared.valid_until,
                currency: &prepared.currency,
                totals: &prepared.totals,
                notes: prepared.notes.as_deref(),
                verification_hash: &hash,
                created_by: current.created_by,
            },
        )
        .await?;
        tx.commit().await?;

        debug!(quotation = %current.quotation_number, "quotation updated");
        self.get(public_id).await
    }

    pub async fn set_status(
        &self,
        public_id: &str,
        status: QuotationStatus,
    ) -> BillingResult<QuotationDocument> {
        if status == QuotationStatus::Converted {
            return Err(BillingError::Validation(
                "use conversion to turn a quotation into an invoice".into(),
            ));
        }
        let quotation = self.find(public_id).await?;
        ensure_not_converted(&quotation)?;

        QuotationRepository::set_status(&self.pool, quotation.id, status).await?;
        info!(quotation = %quotation.quotation_number, from = %quotation.status, to = %status, "quotation status changed");
        self.get(public_id).await
    }

    pub async fn delete(&self, public_id: &str) -> BillingResult<Quotation> {
        let quotation = self.find(public_id).await?;
        ensure_not_converted(&quotation)?;
        QuotationRepository::delete(&self.pool, quotation.id).await?;
        info!(quotation = %quotation.quotation_number, "quotation deleted");
        Ok(quotation)
    }

    /// Turn a sent or accepted quotation into a new draft invoice.
    ///
    /// The invoice insert and the quotation's move to `converted` commit
    /// together; a second conversion of the same quotation is refused.
    pub async fn convert(
        &self,
        public_id: &str,
        created_by: Option<i64>,
    ) -> BillingResult<InvoiceDocument> {
        let quotation = self.find(public_id).await?;
        ensure_convertible(&quotation)?;

        let items = QuotationRepository::items(&self.pool, quotation.id)
            .await?
            .into_iter()
            .map(|item| LineItemInput {
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect::<Vec<_>>();
        let issue_date = today();
        let prepared = PreparedInvoice {
            customer: CustomerInput {
                customer_name: quotation.customer_name.clone(),
                customer_email: quotation.customer_email.clone(),
                customer_phone: quotation.customer_phone.clone(),
                customer_address: quotation.customer_address.clone(),
            },
            issue_date,
            due_date: default_term(issue_date),
            currency: quotation.currency.clone(),
            totals: compute_totals(&items, quotation.tax_rate)?,
            notes: Some(match &quotation.notes {
                Some(notes) => format!("{notes}\nConverted from {}", quotation.quotation_number),
                None => format!("Converted from {}", quotation.quotation_number),
            }),
        };

        let mut tx = self.pool.begin().await?;
        let invoice_id = insert_invoice(&mut tx, &prepared, created_by).await?;
        if !QuotationRepository::mark_converted(&mut *tx, quotation.id, invoice_id).await? {
            return Err(BillingError::Conflict(format!(
                "quotation {} was converted concurrently",
                quotation.quotation_number
            )));
        }
        tx.commit().await?;

        let invoice = self.invoices.document_by_id(invoice_id).await?;
        info!(
            quotation = %quotation.quotation_number,
            invoice = %invoice.invoice.invoice_number,
            "quotation converted"
        );
        Ok(invoice)
    }

    /// Flag draft and sent quotations past their validity as expired.
    pub async fn mark_expired(&self, today: NaiveDate) -> BillingResult<u64> {
        let changed = QuotationRepository::mark_expired(&self.pool, today).await?;
        if changed > 0 {
            info!(count = changed, "quotations expired");
        }
        Ok(changed)
    }

    pub(crate) async fn find(&self, public_id: &str) -> BillingResult<Quotation> {
        QuotationRepository::find_by_public_id(&self.pool, public_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("quotation {public_id}")))
    }

    pub(crate) async fn document(&self, quotation: Quotation) -> BillingResult<QuotationDocument> {
        let items = QuotationRepository::items(&self.pool, quotation.id).await?;
        let converted_invoice = match quotation.converted_invoice_id {
            Some(id) => InvoiceRepository::find_by_id(&self.pool, id)
                .await?
                .map(|invoice| invoice.public_id),
            None => None,
        };
        let verification_url = verification_url(
            &self.verification_base_url,
            DocumentKind::Quotation,
            &quotation.public_id,
            &quotation.verification_hash,
        );
        Ok(QuotationDocument {
            quotation,
            items,
            converted_invoice,
            verification_url,
        })
    }

    async fn prepare(
        &self,
        input: &QuotationInput,
        current: Option<&Quotation>,
    ) -> BillingResult<PreparedQuotation> {
        let customer = input.customer.normalised()?;
        let defaults = match current {
            Some(quotation) => BillingDefaults {
                currency: quotation.currency.clone(),
                tax_rate: quotation.tax_rate,
            },
            None => BillingDefaults::load(&self.settings).await?,
        };

        let issue_date = input
            .issue_date
            .or(current.map(|q| q.issue_date))
            .unwrap_or_else(today);
        let valid_until = input
            .valid_until
            .or(current.map(|q| q.valid_until))
            .unwrap_or_else(|| default_term(issue_date));
        if valid_until < issue_date {
            return Err(BillingError::Validation(
                "valid until cannot be before the issue date".into(),
            ));
        }

        Ok(PreparedQuotation {
            customer,
            issue_date,
            valid_until,
            currency: normalise_currency(&input.currency, &defaults.currency)?,
            totals: compute_totals(&input.items, input.tax_rate.unwrap_or(defaults.tax_rate))?,
            notes: non_empty(&input.notes),
        })
    }
}

fn ensure_not_converted(quotation: &Quotation) -> BillingResult<()> {
    if quotation.status == QuotationStatus::Converted {
        return Err(BillingError::Conflict(format!(
            "quotation {} has already been converted",
            quotation.quotation_number
        )));
    }
    Ok(())
}

fn ensure_convertible(quotation: &Quotation) -> BillingResult<()> {
    ensure_not_converted(quotation)?;
    if !quotation.status.can_convert() {
        return Err(BillingError::Conflict(format!(
            "quotation {} is {} and cannot be converted",
            quotation.quotation_number, quotation.status
        )));
    }
    Ok(())
}
