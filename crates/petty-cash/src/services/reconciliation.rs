use chrono::Duration;
use feza_database::round_money;
use tracing::{info, warn};

use super::PettyCashService;
use crate::access::Actor;
use crate::entities::{non_empty, Reconciliation, ReconciliationInput, ReconciliationStatus};
use crate::repositories::{EntryRepository, NewReconciliation, ReconciliationRepository};
use crate::{PettyCashError, PettyCashResult};

impl PettyCashService {
    /// Reconcile a period against the cash counted in the box.
    ///
    /// opening = approved net before the period, expected = opening +
    /// credits − debits of the period, difference = actual − expected. The
    /// period's approved entries are posted to the reconciliation. Pending
    /// entries in the period, or an overlap with an earlier reconciliation,
    /// block it.
    pub async fn reconcile(
        &self,
        actor: &Actor,
        input: &ReconciliationInput,
    ) -> PettyCashResult<Reconciliation> {
        actor.require_manager()?;
        if input.period_end < input.period_start {
            return Err(PettyCashError::Validation(
                "period end cannot be before period start".into(),
            ));
        }
        if !input.actual_balance.is_finite() {
            return Err(PettyCashError::Validation("actual balance must be a number".into()));
        }
        let notes = non_empty(&input.notes);

        let mut tx = self.pool.begin().await?;

        if ReconciliationRepository::overlaps(&mut *tx, input.period_start, input.period_end).await? {
            return Err(PettyCashError::Conflict(
                "the period overlaps an existing reconciliation".into(),
            ));
        }
        let pending =
            EntryRepository::pending_between(&mut *tx, input.period_start, input.period_end).await?;
        if pending > 0 {
            return Err(PettyCashError::Conflict(format!(
                "{pending} pending entries in the period must be approved or rejected first"
            )));
        }

        let opening = EntryRepository::approved_totals(
            &mut *tx,
            None,
            Some(input.period_start - Duration::days(1)),
        )
        .await?
        .net();
        let period =
            EntryRepository::approved_totals(&mut *tx, Some(input.period_start), Some(input.period_end))
                .await?;
        let expected = round_money(opening + period.credits - period.debits);
        let actual = round_money(input.actual_balance);
        let difference = round_money(actual - expected);
        let status = ReconciliationStatus::from_difference(difference);

        let id = ReconciliationRepository::insert(
            &mut *tx,
            &NewReconciliation {
                period_start: input.period_start,
                period_end: input.period_end,
                opening_balance: opening,
                total_credits: period.credits,
                total_debits: period.debits,
                expected_balance: expected,
                actual_balance: actual,
                difference,
                status,
                notes: notes.as_deref(),
                reconciled_by: Some(actor.user_id),
            },
        )
        .await?;
        let posted = EntryRepository::post_to_reconciliation(
            &mut *tx,
            id,
            input.period_start,
            input.period_end,
        )
        .await?;
        tx.commit().await?;

        match status {
            ReconciliationStatus::Balanced => {
                info!(reconciliation = id, posted, expected, "petty cash reconciled")
            }
            ReconciliationStatus::Discrepancy => {
                warn!(reconciliation = id, posted, expected, actual, difference, "petty cash discrepancy")
            }
        }

        ReconciliationRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("reconciliation #{id}")))
    }

    pub async fn reconciliations(&self) -> PettyCashResult<Vec<Reconciliation>> {
        ReconciliationRepository::list(&self.pool).await
    }
}
