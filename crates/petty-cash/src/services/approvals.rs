use std::collections::HashSet;

use feza_database::round_money;
use tracing::{info, warn};

use super::{ensure_open_period, PettyCashService};
use crate::access::Actor;
use crate::entities::{
    ApprovalStatus, BulkApproval, PettyCashEntry, SkippedEntry, TransactionType,
};
use crate::repositories::EntryRepository;
use crate::{PettyCashError, PettyCashResult};

impl PettyCashService {
    /// Approve a pending entry, locking it.
    pub async fn approve_entry(
        &self,
        actor: &Actor,
        public_id: &str,
    ) -> PettyCashResult<PettyCashEntry> {
        actor.require_approver()?;

        let mut tx = self.pool.begin().await?;
        let entry = EntryRepository::find_by_public_id(&mut *tx, public_id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("petty cash entry {public_id}")))?;
        let balance = EntryRepository::balance(&mut *tx).await?;
        check_approval(actor, &entry, balance)?;
        ensure_open_period(&mut *tx, entry.transaction_date).await?;

        if !EntryRepository::approve(&mut *tx, entry.id, actor.user_id).await? {
            return Err(not_pending(&entry));
        }
        tx.commit().await?;

        info!(entry = %entry.public_id, approver = actor.user_id, amount = entry.amount, "petty cash entry approved");
        self.entry_by_id(entry.id).await
    }

    pub async fn reject_entry(
        &self,
        actor: &Actor,
        public_id: &str,
        reason: &str,
    ) -> PettyCashResult<PettyCashEntry> {
        actor.require_approver()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PettyCashError::Validation(
                "a rejection reason is required".into(),
            ));
        }

        let entry = self.entry(public_id).await?;
        if entry.approval_status != ApprovalStatus::Pending {
            return Err(not_pending(&entry));
        }
        if !EntryRepository::reject(&self.pool, entry.id, actor.user_id, reason).await? {
            return Err(not_pending(&entry));
        }

        info!(entry = %entry.public_id, approver = actor.user_id, "petty cash entry rejected");
        self.entry_by_id(entry.id).await
    }

    /// Approve several entries in one transaction.
    ///
    /// Each id goes through the same checks as a single approval, against a
    /// balance that includes the entries approved earlier in the batch.
    /// Entries failing a check are skipped with the reason.
    pub async fn bulk_approve(
        &self,
        actor: &Actor,
        public_ids: &[String],
    ) -> PettyCashResult<BulkApproval> {
        actor.require_approver()?;
        if public_ids.is_empty() {
            return Err(PettyCashError::Validation("no entries selected".into()));
        }

        let mut outcome = BulkApproval::default();
        let mut seen = HashSet::new();

        let mut tx = self.pool.begin().await?;
        let mut balance = EntryRepository::balance(&mut *tx).await?;

        for public_id in public_ids {
            if !seen.insert(public_id.as_str()) {
                continue;
            }
            let skip = |reason: String| SkippedEntry {
                id: public_id.clone(),
                reason,
            };

            let Some(entry) = EntryRepository::find_by_public_id(&mut *tx, public_id).await? else {
                outcome.skipped.push(skip("not found".into()));
                continue;
            };
            if let Err(error) = check_approval(actor, &entry, balance) {
                outcome.skipped.push(skip(error.to_string()));
                continue;
            }
            if let Err(error) = ensure_open_period(&mut *tx, entry.transaction_date).await {
                match error {
                    PettyCashError::Conflict(reason) => {
                        outcome.skipped.push(skip(reason));
                        continue;
                    }
                    other => return Err(other),
                }
            }
            if !EntryRepository::approve(&mut *tx, entry.id, actor.user_id).await? {
                outcome.skipped.push(skip(not_pending(&entry).to_string()));
                continue;
            }

            balance = round_money(balance + entry.signed_amount());
            outcome.approved.push(entry.public_id);
        }

        tx.commit().await?;

        if !outcome.skipped.is_empty() {
            warn!(skipped = outcome.skipped.len(), "bulk approval skipped entries");
        }
        info!(approved = outcome.approved.len(), approver = actor.user_id, "bulk approval finished");
        Ok(outcome)
    }
}

/// Rules an approval must pass, given the current approved balance.
fn check_approval(actor: &Actor, entry: &PettyCashEntry, balance: f64) -> PettyCashResult<()> {
    if entry.approval_status != ApprovalStatus::Pending {
        return Err(not_pending(entry));
    }
    if entry.created_by == Some(actor.user_id) {
        return Err(PettyCashError::Forbidden(
            "you cannot approve your own entry".into(),
        ));
    }
    if !actor.within_limit(entry.amount) {
        return Err(PettyCashError::Forbidden(format!(
            "amount {:.2} exceeds your approval limit of {:.2}",
            entry.amount,
            actor.approval_limit.unwrap_or_default()
        )));
    }
    if entry.transaction_type == TransactionType::Debit && balance - entry.amount < -0.005 {
        return Err(PettyCashError::Conflict(format!(
            "approving {:.2} would overdraw petty cash (balance {balance:.2})",
            entry.amount
        )));
    }
    Ok(())
}

fn not_pending(entry: &PettyCashEntry) -> PettyCashError {
    PettyCashError::Conflict(format!(
        "petty cash entry {} is {}",
        entry.public_id, entry.approval_status
    ))
}
