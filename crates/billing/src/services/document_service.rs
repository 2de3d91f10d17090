//! Emailing invoices, quotations and receipts to customers.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::NaiveDate;
use feza_config::{DocumentsConfig, MailConfig};
use feza_database::{EmailLogRepository, EmailStatus, NewEmailLog, SettingsRepository};
use feza_mailer::{default_sender, MailMessage, Mailbox, Mailer};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{InvoiceService, QuotationService, ReceiptService};
use crate::entities::{InvoiceStatus, LineItem, QuotationStatus};
use crate::repositories::{InvoiceRepository, QuotationRepository};
use crate::verification::{self, DocumentKind, VerificationResult};
use crate::{BillingError, BillingResult};

/// Outcome of a successful document email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailDispatch {
    pub document_type: DocumentKind,
    pub document_number: String,
    pub recipient: String,
    pub subject: String,
    pub message_id: String,
}

/// Everything the email body needs, independent of document kind
struct RenderedDocument {
    kind: DocumentKind,
    number: String,
    party: String,
    email: Option<String>,
    date: NaiveDate,
    currency: String,
    items: Vec<LineItem>,
    summary: Vec<(String, f64)>,
    details: Vec<(String, String)>,
    verification_url: String,
}

#[derive(Clone)]
pub struct DocumentService {
    pool: SqlitePool,
    mailer: Arc<dyn Mailer>,
    mail: MailConfig,
    settings: SettingsRepository,
    email_logs: EmailLogRepository,
    invoices: InvoiceService,
    quotations: QuotationService,
    receipts: ReceiptService,
}

impl DocumentService {
    pub fn new(
        pool: SqlitePool,
        mailer: Arc<dyn Mailer>,
        mail: MailConfig,
        documents: &DocumentsConfig,
    ) -> Self {
        Self {
            mailer,
            mail,
            settings: SettingsRepository::new(pool.clone()),
            email_logs: EmailLogRepository::new(pool.clone()),
            invoices: InvoiceService::new(pool.clone(), documents),
            quotations: QuotationService::new(pool.clone(), documents),
            receipts: ReceiptService::new(pool.clone(), documents),
            pool,
        }
    }

    /// Check a document for the public verification page.
    pub async fn verify(
        &self,
        kind: &str,
        id: &str,
        hash: Option<&str>,
    ) -> BillingResult<VerificationResult> {
        verification::verify(&self.pool, kind, id, hash).await
    }

    /// Email a document to its customer, or to `recipient` when given.
    ///
    /// Every attempt lands in the email log. A draft invoice or quotation is
    /// marked sent once delivery succeeds.
    pub async fn email(
        &self,
        kind: DocumentKind,
        public_id: &str,
        recipient: Option<&str>,
        sent_by: Option<i64>,
    ) -> BillingResult<EmailDispatch> {
        let document = self.render(kind, public_id).await?;
        let recipient = recipient
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| document.email.clone())
            .ok_or_else(|| {
                BillingError::Validation(format!(
                    "{} {} has no email address; supply a recipient",
                    kind.title(),
                    document.number
                ))
            })?;

        let company = self
            .settings
            .get("company_name")
            .await?
            .unwrap_or_else(|| self.mail.from_name.clone());
        let subject = format!("{} {} from {company}", kind.title(), document.number);

        let message = MailMessage::new(default_sender(&self.mail)?, subject.clone())
            .to(Mailbox::new(Some(document.party.clone()), recipient.clone())?)
            .text(render_text(&document, &company))
            .html(render_html(&document, &company));

        let mut log = NewEmailLog {
            recipient: recipient.clone(),
            subject: subject.clone(),
            document_type: Some(kind.as_str().to_string()),
            document_id: Some(public_id.to_string()),
            status: EmailStatus::Sent,
            error: None,
            message_id: None,
            sent_by,
        };

        match self.mailer.send(&message).await {
            Ok(receipt) => {
                log.message_id = Some(receipt.message_id.clone());
                self.email_logs.record(&log).await?;
                self.mark_sent(kind, public_id).await?;
                info!(document = %document.number, recipient = %recipient, "document emailed");
                Ok(EmailDispatch {
                    document_type: kind,
                    document_number: document.number,
                    recipient,
                    subject,
                    message_id: receipt.message_id,
                })
            }
            Err(error) => {
                warn!(document = %document.number, recipient = %recipient, error = %error, "document email failed");
                log.status = EmailStatus::Failed;
                log.error = Some(error.to_string());
                self.email_logs.record(&log).await?;
                Err(error.into())
            }
        }
    }

    async fn mark_sent(&self, kind: DocumentKind, public_id: &str) -> BillingResult<()> {
        match kind {
            DocumentKind::Invoice => {
                let invoice = self.invoices.find(public_id).await?;
                if invoice.status == InvoiceStatus::Draft {
                    InvoiceRepository::set_status(&self.pool, invoice.id, InvoiceStatus::Sent).await?;
                }
            }
            DocumentKind::Quotation => {
                let quotation = self.quotations.find(public_id).await?;
                if quotation.status == QuotationStatus::Draft {
                    QuotationRepository::set_status(&self.pool, quotation.id, QuotationStatus::Sent)
                        .await?;
                }
            }
            DocumentKind::Receipt => {}
        }
        Ok(())
    }

    async fn render(&self, kind: DocumentKind, public_id: &str) -> BillingResult<RenderedDocument> {
        match kind {
            DocumentKind::Invoice => {
                let doc = self.invoices.get(public_id).await?;
                let invoice = doc.invoice;
                Ok(RenderedDocument {
                    kind,
                    number: invoice.invoice_number,
                    party: invoice.customer_name,
                    email: invoice.customer_email,
                    date: invoice.issue_date,
                    currency: invoice.currency,
                    items: doc.items,
                    summary: vec![
                        ("Subtotal".into(), invoice.subtotal),
                        (format!("Tax ({}%)", invoice.tax_rate), invoice.tax_amount),
                        ("Total".into(), invoice.total),
                        ("Paid".into(), invoice.amount_paid),
                        ("Balance due".into(), doc.balance_due),
                    ],
                    details: vec![("Due date".into(), invoice.due_date.to_string())],
                    verification_url: doc.verification_url,
                })
            }
            DocumentKind::Quotation => {
                let doc = self.quotations.get(public_id).await?;
                let quotation = doc.quotation;
                Ok(RenderedDocument {
                    kind,
                    number: quotation.quotation_number,
                    party: quotation.customer_name,
                    email: quotation.customer_email,
                    date: quotation.issue_date,
                    currency: quotation.currency,
                    items: doc.items,
                    summary: vec![
                        ("Subtotal".into(), quotation.subtotal),
                        (format!("Tax ({}%)", quotation.tax_rate), quotation.tax_amount),
                        ("Total".into(), quotation.total),
                    ],
                    details: vec![("Valid until".into(), quotation.valid_until.to_string())],
                    verification_url: doc.verification_url,
                })
            }
            DocumentKind::Receipt => {
                let receipt = self.receipts.get(public_id).await?;
                let verification_url = self.receipts.verification_url(&receipt);
                let mut details = vec![(
                    "Payment method".to_string(),
                    receipt.payment_method.label().to_string(),
                )];
                if let Some(invoice) = &receipt.invoice_number {
                    details.push(("Invoice".into(), invoice.clone()));
                }
                if let Some(reference) = &receipt.reference {
                    details.push(("Reference".into(), reference.clone()));
                }
                Ok(RenderedDocument {
                    kind,
                    number: receipt.receipt_number,
                    party: receipt.payer_name,
                    email: receipt.payer_email,
                    date: receipt.payment_date,
                    currency: receipt.currency,
                    items: Vec::new(),
                    summary: vec![("Amount received".into(), receipt.amount)],
                    details,
                    verification_url,
                })
            }
        }
    }
}

fn render_text(doc: &RenderedDocument, company: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dear {},", doc.party);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Please find below {} {} issued by {company} on {}.",
        doc.kind.as_str(),
        doc.number,
        doc.date
    );
    let _ = writeln!(out);
    for (label, value) in &doc.details {
        let _ = writeln!(out, "{label}: {value}");
    }
    if !doc.items.is_empty() {
        let _ = writeln!(out);
        for item in &doc.items {
            let _ = writeln!(
                out,
                "- {} x {} @ {:.2} = {:.2} {}",
                item.quantity, item.description, item.unit_price, item.line_total, doc.currency
            );
        }
    }
    let _ = writeln!(out);
    for (label, amount) in &doc.summary {
        let _ = writeln!(out, "{label}: {amount:.2} {}", doc.currency);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Verify this document: {}", doc.verification_url);
    let _ = writeln!(out);
    let _ = write!(out, "{company}");
    out
}

fn render_html(doc: &RenderedDocument, company: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<html><body><p>Dear {},</p><p>Please find below {} <strong>{}</strong> issued by {} on {}.</p>",
        escape_html(&doc.party),
        doc.kind.as_str(),
        escape_html(&doc.number),
        escape_html(company),
        doc.date
    );
    if !doc.details.is_empty() {
        out.push_str("<ul>");
        for (label, value) in &doc.details {
            let _ = write!(out, "<li>{}: {}</li>", escape_html(label), escape_html(value));
        }
        out.push_str("</ul>");
    }
    if !doc.items.is_empty() {
        out.push_str(
            "<table><tr><th>Description</th><th>Qty</th><th>Unit price</th><th>Total</th></tr>",
        );
        for item in &doc.items {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td></tr>",
                escape_html(&item.description),
                item.quantity,
                item.unit_price,
                item.line_total
            );
        }
        out.push_str("</table>");
    }
    out.push_str("<table>");
    for (label, amount) in &doc.summary {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{amount:.2} {}</td></tr>",
            escape_html(label),
            escape_html(&doc.currency)
        );
    }
    let _ = write!(
        out,
        "</table><p><a href=\"{0}\">Verify this document</a></p><p>{1}</p></body></html>",
        escape_html(&doc.verification_url),
        escape_html(company)
    );
    out
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RenderedDocument {
        RenderedDocument {
            kind: DocumentKind::Invoice,
            number: "INV-2026-0001".into(),
            party: "Kigali <Freight>".into(),
            email: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            currency: "RWF".into(),
            items: vec![LineItem {
                id: 1,
                description: "Customs clearance".into(),
                quantity: 2.0,
                unit_price: 50.0,
                line_total: 100.0,
                position: 0,
            }],
            summary: vec![("Total".into(), 118.0)],
            details: vec![],
            verification_url: "https://feza.test/verify?type=invoice&id=x&hash=y".into(),
        }
    }

    #[test]
    fn text_body_lists_items_totals_and_link() {
        let text = render_text(&sample(), "Feza Logistics");
        assert!(text.contains("invoice INV-2026-0001"));
        assert!(text.contains("Customs clearance"));
        assert!(text.contains("Total: 118.00 RWF"));
        assert!(text.contains("https://feza.test/verify?type=invoice&id=x&hash=y"));
    }

    #[test]
    fn html_body_escapes_customer_content() {
        let html = render_html(&sample(), "Feza Logistics");
        assert!(html.contains("Kigali &lt;Freight&gt;"));
        assert!(html.contains("type=invoice&amp;id=x"));
        assert!(!html.contains("<Freight>"));
    }
}
