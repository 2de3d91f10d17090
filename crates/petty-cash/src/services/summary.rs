use chrono::NaiveDate;
use feza_database::round_money;
use serde::Serialize;

use super::{month_bounds, PettyCashService};
use crate::repositories::{CategoryRepository, EntryRepository};
use crate::PettyCashResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category_id: i64,
    pub name: String,
    pub budget_limit: Option<f64>,
    pub spent: f64,
    pub remaining: Option<f64>,
    pub over_budget: bool,
}

/// Dashboard figures for the petty cash module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PettyCashSummary {
    pub balance: f64,
    pub total_credits: f64,
    pub total_debits: f64,
    pub pending_count: i64,
    pub pending_amount: f64,
    pub low_balance_threshold: Option<f64>,
    pub low_balance: bool,
    pub month_start: NaiveDate,
    pub categories: Vec<CategorySpend>,
}

impl PettyCashService {
    /// Balance, pending work and month-to-date spend per active category.
    pub async fn summary(&self, as_of: NaiveDate) -> PettyCashResult<PettyCashSummary> {
        let totals = EntryRepository::approved_totals(&self.pool, None, None).await?;
        let balance = totals.net();
        let (pending_count, pending_amount) = EntryRepository::pending(&self.pool).await?;
        let threshold = self.settings.get_f64("petty_cash_low_balance").await?;

        let (month_start, _) = month_bounds(as_of);
        let mut categories = Vec::new();
        for category in CategoryRepository::list(&self.pool, false).await? {
            let spent =
                EntryRepository::category_spend(&self.pool, category.id, month_start, as_of, None)
                    .await?;
            let remaining = category.budget_limit.map(|limit| round_money(limit - spent));
            categories.push(CategorySpend {
                category_id: category.id,
                over_budget: remaining.is_some_and(|r| r < -0.005),
                name: category.name,
                budget_limit: category.budget_limit,
                spent,
                remaining,
            });
        }

        Ok(PettyCashSummary {
            balance,
            total_credits: totals.credits,
            total_debits: totals.debits,
            pending_count,
            pending_amount,
            low_balance: threshold.is_some_and(|t| balance < t),
            low_balance_threshold: threshold,
            month_start,
            categories,
        })
    }
}
