use feza_database::{new_public_id, round_money};
use tracing::info;

use super::{ensure_open_period, today, PettyCashService};
use crate::access::Actor;
use crate::entities::{Replenishment, ReplenishmentInput, ReplenishmentStatus, TransactionType};
use crate::repositories::{EntryRecord, EntryRepository, ReplenishmentRepository};
use crate::{PettyCashError, PettyCashResult};

impl PettyCashService {
    pub async fn request_replenishment(
        &self,
        actor: &Actor,
        input: &ReplenishmentInput,
    ) -> PettyCashResult<Replenishment> {
        actor.require_record()?;
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(PettyCashError::Validation(
                "amount must be greater than zero".into(),
            ));
        }
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(PettyCashError::Validation("a reason is required".into()));
        }

        let public_id = new_public_id();
        ReplenishmentRepository::insert(
            &self.pool,
            &public_id,
            input.request_date.unwrap_or_else(today),
            round_money(input.amount),
            reason,
            Some(actor.user_id),
        )
        .await?;
        info!(replenishment = %public_id, amount = input.amount, "replenishment requested");
        self.replenishment(&public_id).await
    }

    pub async fn replenishment(&self, public_id: &str) -> PettyCashResult<Replenishment> {
        ReplenishmentRepository::find_by_public_id(&self.pool, public_id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("replenishment {public_id}")))
    }

    pub async fn replenishments(
        &self,
        status: Option<ReplenishmentStatus>,
    ) -> PettyCashResult<Vec<Replenishment>> {
        ReplenishmentRepository::list(&self.pool, status).await
    }

    pub async fn approve_replenishment(
        &self,
        actor: &Actor,
        public_id: &str,
    ) -> PettyCashResult<Replenishment> {
        self.decide_replenishment(actor, public_id, ReplenishmentStatus::Approved, None)
            .await
    }

    pub async fn reject_replenishment(
        &self,
        actor: &Actor,
        public_id: &str,
        reason: &str,
    ) -> PettyCashResult<Replenishment> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PettyCashError::Validation(
                "a rejection reason is required".into(),
            ));
        }
        self.decide_replenishment(actor, public_id, ReplenishmentStatus::Rejected, Some(reason))
            .await
    }

    /// Post the approved top-up as an approved, locked credit and link it.
    pub async fn complete_replenishment(
        &self,
        actor: &Actor,
        public_id: &str,
    ) -> PettyCashResult<Replenishment> {
        actor.require_manager()?;

        let mut tx = self.pool.begin().await?;
        let request = ReplenishmentRepository::find_by_public_id(&mut *tx, public_id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("replenishment {public_id}")))?;
        ensure_transition(&request, ReplenishmentStatus::Completed)?;
        let posted_on = today();
        ensure_open_period(&mut *tx, posted_on).await?;

        let description = format!("Replenishment: {}", request.reason);
        let entry_id = EntryRepository::insert_approved(
            &mut *tx,
            &new_public_id(),
            &EntryRecord {
                transaction_date: posted_on,
                description: &description,
                amount: request.amount,
                transaction_type: TransactionType::Credit,
                category_id: None,
                payee: None,
                payment_method: Some("replenishment"),
                receipt_number: None,
                notes: None,
            },
            request.requested_by,
            actor.user_id,
        )
        .await?;
        if !ReplenishmentRepository::complete(&mut *tx, request.id, entry_id).await? {
            return Err(bad_transition(&request, ReplenishmentStatus::Completed));
        }
        tx.commit().await?;

        info!(replenishment = %request.public_id, amount = request.amount, "replenishment completed");
        self.replenishment(public_id).await
    }

    async fn decide_replenishment(
        &self,
        actor: &Actor,
        public_id: &str,
        next: ReplenishmentStatus,
        reason: Option<&str>,
    ) -> PettyCashResult<Replenishment> {
        actor.require_manager()?;
        let request = self.replenishment(public_id).await?;
        ensure_transition(&request, next)?;

        if !ReplenishmentRepository::transition(
            &self.pool,
            request.id,
            request.status,
            next,
            actor.user_id,
            reason,
        )
        .await?
        {
            return Err(bad_transition(&request, next));
        }
        info!(replenishment = %request.public_id, status = %next, "replenishment decided");
        self.replenishment(public_id).await
    }
}

fn ensure_transition(request: &Replenishment, next: ReplenishmentStatus) -> PettyCashResult<()> {
    if request.status.can_become(next) {
        Ok(())
    } else {
        Err(bad_transition(request, next))
    }
}

fn bad_transition(request: &Replenishment, next: ReplenishmentStatus) -> PettyCashError {
    PettyCashError::Conflict(format!(
        "replenishment {} is {} and cannot become {next}",
        request.public_id, request.status
    ))
}
