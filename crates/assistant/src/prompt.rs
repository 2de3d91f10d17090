use chrono::NaiveDate;

const SCHEMA: &str = "\
invoices(id, invoice_number, customer_name, customer_email, issue_date, due_date, currency, \
subtotal, tax_rate, tax_amount, total, amount_paid, status[draft|sent|partially_paid|paid|overdue|cancelled], created_at)
invoice_items(invoice_id, description, quantity, unit_price, line_total)
quotations(id, quotation_number, customer_name, issue_date, valid_until, currency, subtotal, \
tax_amount, total, status[draft|sent|accepted|rejected|expired|converted], converted_invoice_id)
quotation_items(quotation_id, description, quantity, unit_price, line_total)
receipts(id, receipt_number, invoice_id, payer_name, amount, currency, \
payment_method[cash|bank_transfer|mobile_money|cheque|card], payment_date)
petty_cash(id, transaction_date, description, amount, transaction_type[credit|debit], category_id, \
payee, approval_status[pending|approved|rejected], is_locked, reconciliation_id)
petty_cash_categories(id, name, budget_limit, is_active)
petty_cash_reconciliation(id, period_start, period_end, expected_balance, actual_balance, difference, status)
petty_cash_replenishment(id, request_date, amount, reason, status[pending|approved|rejected|completed])
users(id, username, email, first_name, last_name, status)";

/// Wrap a user question with the schema and answering rules.
pub(crate) fn build(question: &str, today: NaiveDate) -> String {
    format!(
        "You are the data assistant of Feza Logistics, answering questions about its \
         back-office SQLite database. Today is {today}.\n\n\
         Tables:\n{SCHEMA}\n\n\
         Rules:\n\
         - If the question needs data, reply with exactly one SQLite SELECT statement in a \
         ```sql fenced block.\n\
         - Never modify data. Dates are stored as YYYY-MM-DD text, amounts as REAL.\n\
         - The petty cash balance is approved credits minus approved debits.\n\
         - Otherwise answer briefly in plain text.\n\n\
         Question: {question}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_question_and_date() {
        let prompt = build(
            "How many invoices are overdue?",
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        );
        assert!(prompt.contains("Today is 2026-05-01"));
        assert!(prompt.ends_with("Question: How many invoices are overdue?\n"));
        assert!(!prompt.contains("password_hash"));
    }
}
