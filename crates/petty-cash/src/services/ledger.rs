use feza_database::{new_public_id, round_money, Page, Paginated};
use tracing::{debug, info};

use super::{ensure_open_period, month_bounds, today, PettyCashService};
use crate::access::Actor;
use crate::entities::{
    non_empty, EntryFilter, EntryInput, EntryReceipt, EntryReceiptInput, PettyCashEntry,
    RecordedEntry, TransactionType,
};
use crate::repositories::{CategoryRepository, EntryReceiptRepository, EntryRecord, EntryRepository};
use crate::{PettyCashError, PettyCashResult};

/// Trimmed, validated entry fields
struct CleanEntry {
    transaction_date: chrono::NaiveDate,
    description: String,
    amount: f64,
    transaction_type: TransactionType,
    category_id: Option<i64>,
    payee: Option<String>,
    payment_method: Option<String>,
    receipt_number: Option<String>,
    notes: Option<String>,
}

impl CleanEntry {
    fn record(&self) -> EntryRecord<'_> {
        EntryRecord {
            transaction_date: self.transaction_date,
            description: &self.description,
            amount: self.amount,
            transaction_type: self.transaction_type,
            category_id: self.category_id,
            payee: self.payee.as_deref(),
            payment_method: self.payment_method.as_deref(),
            receipt_number: self.receipt_number.as_deref(),
            notes: self.notes.as_deref(),
        }
    }
}

impl PettyCashService {
    /// Record a new pending entry.
    pub async fn record_entry(
        &self,
        actor: &Actor,
        input: &EntryInput,
    ) -> PettyCashResult<RecordedEntry> {
        actor.require_record()?;
        let clean = self.clean_entry(input).await?;
        ensure_open_period(&self.pool, clean.transaction_date).await?;

        let id = EntryRepository::insert(
            &self.pool,
            &new_public_id(),
            &clean.record(),
            Some(actor.user_id),
        )
        .await?;
        let entry = self.entry_by_id(id).await?;
        info!(
            entry = %entry.public_id,
            kind = ?entry.transaction_type,
            amount = entry.amount,
            "petty cash entry recorded"
        );
        self.with_budget(entry).await
    }

    pub async fn entry(&self, public_id: &str) -> PettyCashResult<PettyCashEntry> {
        EntryRepository::find_by_public_id(&self.pool, public_id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("petty cash entry {public_id}")))
    }

    pub async fn entries(
        &self,
        filter: &EntryFilter,
        page: Page,
    ) -> PettyCashResult<Paginated<PettyCashEntry>> {
        let mut conn = self.pool.acquire().await?;
        let (items, total) = EntryRepository::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Edit an unlocked entry. A rejected entry goes back to pending.
    pub async fn update_entry(
        &self,
        actor: &Actor,
        public_id: &str,
        input: &EntryInput,
    ) -> PettyCashResult<RecordedEntry> {
        actor.require_record()?;
        let entry = self.entry(public_id).await?;
        ensure_mutable(actor, &entry)?;
        let clean = self.clean_entry(input).await?;
        ensure_open_period(&self.pool, entry.transaction_date).await?;
        ensure_open_period(&self.pool, clean.transaction_date).await?;

        if !EntryRepository::update(&self.pool, entry.id, &clean.record()).await? {
            return Err(locked(&entry));
        }
        debug!(entry = %entry.public_id, previous = %entry.approval_status, "petty cash entry updated");
        let updated = self.entry_by_id(entry.id).await?;
        self.with_budget(updated).await
    }

    pub async fn delete_entry(
        &self,
        actor: &Actor,
        public_id: &str,
    ) -> PettyCashResult<PettyCashEntry> {
        actor.require_record()?;
        let entry = self.entry(public_id).await?;
        ensure_mutable(actor, &entry)?;

        if !EntryRepository::delete(&self.pool, entry.id).await? {
            return Err(locked(&entry));
        }
        info!(entry = %entry.public_id, "petty cash entry deleted");
        Ok(entry)
    }

    /// Σ approved credits − Σ approved debits
    pub async fn balance(&self) -> PettyCashResult<f64> {
        EntryRepository::balance(&self.pool).await
    }

    /// Register a scanned receipt against an entry; locked entries accept them too.
    pub async fn add_receipt(
        &self,
        actor: &Actor,
        public_id: &str,
        input: &EntryReceiptInput,
    ) -> PettyCashResult<EntryReceipt> {
        actor.require_record()?;
        if input.file_name.trim().is_empty() || input.storage_path.trim().is_empty() {
            return Err(PettyCashError::Validation(
                "receipt file name and storage path are required".into(),
            ));
        }
        if input.content_type.trim().is_empty() {
            return Err(PettyCashError::Validation("receipt content type is required".into()));
        }
        if input.file_size < 0 {
            return Err(PettyCashError::Validation("receipt size cannot be negative".into()));
        }

        let entry = self.entry(public_id).await?;
        let id = EntryReceiptRepository::insert(&self.pool, entry.id, input, Some(actor.user_id))
            .await?;
        debug!(entry = %entry.public_id, receipt = id, "petty cash receipt registered");

        EntryReceiptRepository::for_entry(&self.pool, entry.id)
            .await?
            .into_iter()
            .find(|receipt| receipt.id == id)
            .ok_or_else(|| PettyCashError::NotFound(format!("receipt #{id}")))
    }

    pub async fn receipts(&self, public_id: &str) -> PettyCashResult<Vec<EntryReceipt>> {
        let entry = self.entry(public_id).await?;
        EntryReceiptRepository::for_entry(&self.pool, entry.id).await
    }

    pub(crate) async fn entry_by_id(&self, id: i64) -> PettyCashResult<PettyCashEntry> {
        EntryRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("petty cash entry #{id}")))
    }

    /// Attach the monthly budget check for the entry's category.
    async fn with_budget(&self, entry: PettyCashEntry) -> PettyCashResult<RecordedEntry> {
        let mut recorded = RecordedEntry {
            entry,
            over_budget: false,
            budget_remaining: None,
        };
        if recorded.entry.transaction_type != TransactionType::Debit {
            return Ok(recorded);
        }
        let Some(category_id) = recorded.entry.category_id else {
            return Ok(recorded);
        };
        let Some(limit) = CategoryRepository::find_by_id(&self.pool, category_id)
            .await?
            .and_then(|category| category.budget_limit)
        else {
            return Ok(recorded);
        };

        let (from, to) = month_bounds(recorded.entry.transaction_date);
        let spent = EntryRepository::category_spend(&self.pool, category_id, from, to, None).await?;
        recorded.over_budget = spent > limit + 0.005;
        recorded.budget_remaining = Some(round_money(limit - spent));
        if recorded.over_budget {
            info!(
                entry = %recorded.entry.public_id,
                category = category_id,
                spent,
                limit,
                "petty cash category over budget"
            );
        }
        Ok(recorded)
    }

    async fn clean_entry(&self, input: &EntryInput) -> PettyCashResult<CleanEntry> {
        let description = input.description.trim();
        if description.is_empty() {
            return Err(PettyCashError::Validation("description is required".into()));
        }
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(PettyCashError::Validation(
                "amount must be greater than zero".into(),
            ));
        }
        if let Some(category_id) = input.category_id {
            let category = CategoryRepository::find_by_id(&self.pool, category_id)
                .await?
                .ok_or_else(|| PettyCashError::NotFound(format!("category #{category_id}")))?;
            if !category.is_active {
                return Err(PettyCashError::Validation(format!(
                    "category {} is inactive",
                    category.name
                )));
            }
        }

        Ok(CleanEntry {
            transaction_date: input.transaction_date.unwrap_or_else(today),
            description: description.to_string(),
            amount: round_money(input.amount),
            transaction_type: input.transaction_type,
            category_id: input.category_id,
            payee: non_empty(&input.payee),
            payment_method: non_empty(&input.payment_method),
            receipt_number: non_empty(&input.receipt_number),
            notes: non_empty(&input.notes),
        })
    }
}

/// Only unlocked entries may change, and only by their creator or a manager.
fn ensure_mutable(actor: &Actor, entry: &PettyCashEntry) -> PettyCashResult<()> {
    if entry.is_locked {
        return Err(locked(entry));
    }
    if entry.created_by != Some(actor.user_id) && !actor.role.is_manager() {
        return Err(PettyCashError::Forbidden(
            "only the creator or a petty cash manager may change this entry".into(),
        ));
    }
    Ok(())
}

fn locked(entry: &PettyCashEntry) -> PettyCashError {
    PettyCashError::Conflict(format!(
        "petty cash entry {} is locked",
        entry.public_id
    ))
}
