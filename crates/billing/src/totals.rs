//! Line and document totals.

use feza_database::round_money;
use serde::{Deserialize, Serialize};

use crate::{BillingError, BillingResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedLine {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub lines: Vec<ComputedLine>,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Price a list of items.
///
/// line = quantity × unit price, subtotal = Σ lines,
/// tax = subtotal × rate / 100, total = subtotal + tax; every figure is
/// rounded to cents.
pub fn compute_totals(items: &[LineItemInput], tax_rate: f64) -> BillingResult<Totals> {
    if items.is_empty() {
        return Err(BillingError::Validation("at least one line item is required".into()));
    }
    if !tax_rate.is_finite() || !(0.0..=100.0).contains(&tax_rate) {
        return Err(BillingError::Validation("tax rate must be between 0 and 100".into()));
    }

    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let description = item.description.trim();
        if description.is_empty() {
            return Err(BillingError::Validation(format!(
                "item {} needs a description",
                index + 1
            )));
        }
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Err(BillingError::Validation(format!(
                "item {} quantity must be greater than zero",
                index + 1
            )));
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(BillingError::Validation(format!(
                "item {} unit price cannot be negative",
                index + 1
            )));
        }

        let unit_price = round_money(item.unit_price);
        lines.push(ComputedLine {
            description: description.to_string(),
            quantity: item.quantity,
            unit_price,
            line_total: round_money(item.quantity * unit_price),
            position: index as i64,
        });
    }

    let subtotal = round_money(lines.iter().map(|line| line.line_total).sum());
    let tax_amount = round_money(subtotal * tax_rate / 100.0);
    Ok(Totals {
        lines,
        subtotal,
        tax_rate,
        tax_amount,
        total: round_money(subtotal + tax_amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, quantity: f64, unit_price: f64) -> LineItemInput {
        LineItemInput {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn single_item_with_standard_vat() {
        let totals = compute_totals(&[item("Freight Kigali-Mombasa", 1.0, 1_500.0)], 18.0).unwrap();
        assert_eq!(totals.subtotal, 1_500.0);
        assert_eq!(totals.tax_amount, 270.0);
        assert_eq!(totals.total, 1_770.0);
        assert_eq!(totals.total, round_money(totals.subtotal * 1.18));
    }

    #[test]
    fn lines_are_rounded_to_cents() {
        let totals = compute_totals(
            &[item("Handling", 3.0, 33.333), item("Storage", 2.5, 10.0)],
            0.0,
        )
        .unwrap();
        assert_eq!(totals.lines[0].unit_price, 33.33);
        assert_eq!(totals.lines[0].line_total, 99.99);
        assert_eq!(totals.lines[1].line_total, 25.0);
        assert_eq!(totals.lines[1].position, 1);
        assert_eq!(totals.total, 124.99);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(compute_totals(&[], 18.0).is_err());
        assert!(compute_totals(&[item(" ", 1.0, 1.0)], 18.0).is_err());
        assert!(compute_totals(&[item("x", 0.0, 1.0)], 18.0).is_err());
        assert!(compute_totals(&[item("x", 1.0, -1.0)], 18.0).is_err());
        assert!(compute_totals(&[item("x", 1.0, 1.0)], 101.0).is_err());
        assert!(compute_totals(&[item("x", f64::NAN, 1.0)], 18.0).is_err());
    }
}
