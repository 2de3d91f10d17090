//! Yearly sequential document numbers such as `INV-2026-0042`.

use sqlx::SqliteConnection;

use crate::verification::DocumentKind;
use crate::BillingResult;

pub fn format_number(kind: DocumentKind, year: i32, sequence: i64) -> String {
    format!("{}-{year}-{sequence:04}", kind.prefix())
}

/// Allocate the next number for `kind` in `year`.
///
/// Must run on the connection of the transaction that inserts the document
/// so the unique constraint on the number column catches any race.
pub async fn next_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    year: i32,
) -> BillingResult<String> {
    let prefix = format!("{}-{year}-", kind.prefix());
    let column = kind.number_column();
    let last: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX(CAST(substr({column}, ?) AS INTEGER)), 0) FROM {} WHERE {column} LIKE ?",
        kind.table()
    ))
    .bind(prefix.len() as i64 + 1)
    .bind(format!("{prefix}%"))
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_number(kind, year, last + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_number(DocumentKind::Invoice, 2026, 1), "INV-2026-0001");
        assert_eq!(format_number(DocumentKind::Quotation, 2026, 42), "QUO-2026-0042");
        assert_eq!(format_number(DocumentKind::Receipt, 2027, 12_345), "RCT-2027-12345");
    }
}
