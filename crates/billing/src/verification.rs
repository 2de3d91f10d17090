//! Document kinds, verification hashes and the public verification check.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::BillingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Quotation,
    Receipt,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quotation => "quotation",
            DocumentKind::Receipt => "receipt",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Quotation => "QUO",
            DocumentKind::Receipt => "RCT",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::Quotation => "Quotation",
            DocumentKind::Receipt => "Receipt",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoices",
            DocumentKind::Quotation => "quotations",
            DocumentKind::Receipt => "receipts",
        }
    }

    pub(crate) fn number_column(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice_number",
            DocumentKind::Quotation => "quotation_number",
            DocumentKind::Receipt => "receipt_number",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "invoice" | "invoices" => Ok(DocumentKind::Invoice),
            "quotation" | "quotations" | "quote" => Ok(DocumentKind::Quotation),
            "receipt" | "receipts" => Ok(DocumentKind::Receipt),
            other => Err(format!("unknown document type {other}")),
        }
    }
}

/// Fresh random salt for a document hash.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 over `kind|number|amount|date|salt`, hex encoded.
pub fn compute_hash(
    kind: DocumentKind,
    number: &str,
    amount: f64,
    date: NaiveDate,
    salt: &str,
) -> String {
    let payload = format!(
        "{}|{}|{:.2}|{}|{}",
        kind.as_str(),
        number,
        amount,
        date.format("%Y-%m-%d"),
        salt
    );
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Public link a customer can open to check a document.
pub fn verification_url(base_url: &str, kind: DocumentKind, public_id: &str, hash: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}type={kind}&id={public_id}&hash={hash}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    HashMismatch,
    NotFound,
    InvalidRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct VerifiedDocument {
    pub number: String,
    pub party: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub status: Option<String>,
    #[serde(skip_serializing)]
    pub verification_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub kind: Option<DocumentKind>,
    pub document: Option<VerifiedDocument>,
}

impl VerificationResult {
    fn bare(status: VerificationStatus, kind: Option<DocumentKind>) -> Self {
        Self {
            status,
            kind,
            document: None,
        }
    }
}

/// Check a document by public id (or number) and optional hash.
pub async fn verify(
    pool: &SqlitePool,
    kind: &str,
    id: &str,
    hash: Option<&str>,
) -> BillingResult<VerificationResult> {
    let Ok(kind) = kind.parse::<DocumentKind>() else {
        return Ok(VerificationResult::bare(VerificationStatus::InvalidRequest, None));
    };
    let id = id.trim();
    if id.is_empty() {
        return Ok(VerificationResult::bare(
            VerificationStatus::InvalidRequest,
            Some(kind),
        ));
    }

    let query = match kind {
        DocumentKind::Invoice => {
            "SELECT invoice_number AS number, customer_name AS party, total AS amount, currency, \
             issue_date AS date, status, verification_hash FROM invoices \
             WHERE public_id = ?1 OR invoice_number = ?1"
        }
        DocumentKind::Quotation => {
            "SELECT quotation_number AS number, customer_name AS party, total AS amount, currency, \
             issue_date AS date, status, verification_hash FROM quotations \
             WHERE public_id = ?1 OR quotation_number = ?1"
        }
        DocumentKind::Receipt => {
            "SELECT receipt_number AS number, payer_name AS party, amount, currency, \
             payment_date AS date, NULL AS status, verification_hash FROM receipts \
             WHERE public_id = ?1 OR receipt_number = ?1"
        }
    };

    let Some(document) = sqlx::query_as::<_, VerifiedDocument>(query)
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(VerificationResult::bare(VerificationStatus::NotFound, Some(kind)));
    };

    let supplied = hash.map(str::trim).filter(|h| !h.is_empty());
    if let Some(supplied) = supplied {
        if !supplied.eq_ignore_ascii_case(&document.verification_hash) {
            return Ok(VerificationResult::bare(
                VerificationStatus::HashMismatch,
                Some(kind),
            ));
        }
    }

    Ok(VerificationResult {
        status: VerificationStatus::Valid,
        kind: Some(kind),
        document: Some(document),
    })
}
