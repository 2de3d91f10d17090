use std::str::FromStr;

use chrono::NaiveDate;
use feza_database::{NewUser, Page, UserRepository, UserStatus};
use feza_petty_cash::{
    Actor, ApprovalStatus, CategoryInput, CategoryRemoval, EntryFilter, EntryInput,
    EntryReceiptInput, PettyCashError, PettyCashRole, PettyCashService, ReconciliationInput,
    ReconciliationStatus, ReplenishmentInput, ReplenishmentStatus, TransactionType,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

struct TestContext {
    pool: SqlitePool,
    service: PettyCashService,
    custodian: Actor,
    approver: Actor,
    manager: Actor,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("petty_cash.sqlite");
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        let service = PettyCashService::new(pool.clone());
        let manager_id = create_user(&pool, "manager").await?.0;
        let manager = Actor::manager(manager_id);

        let custodian_public = create_user(&pool, "custodian").await?.1;
        let approver_public = create_user(&pool, "approver").await?.1;
        let custodian = service
            .assign_role(&manager, &custodian_public, PettyCashRole::Custodian, None)
            .await?;
        let approver = service
            .assign_role(&manager, &approver_public, PettyCashRole::Approver, Some(50_000.0))
            .await?;

        Ok(Self {
            custodian: service.actor(custodian.user_id, false).await?,
            approver: service.actor(approver.user_id, false).await?,
            manager,
            service,
            pool,
            _temp_dir: temp_dir,
        })
    }

    async fn record(&self, kind: TransactionType, amount: f64) -> TestResult<String> {
        let recorded = self
            .service
            .record_entry(&self.custodian, &entry(kind, amount, date(2026, 5, 10)))
            .await?;
        Ok(recorded.entry.public_id)
    }

    /// Fund the box with an approved credit.
    async fn fund(&self, amount: f64) -> TestResult<String> {
        let id = self.record(TransactionType::Credit, amount).await?;
        self.service.approve_entry(&self.manager, &id).await?;
        Ok(id)
    }
}

async fn create_user(pool: &SqlitePool, username: &str) -> TestResult<(i64, String)> {
    let user = UserRepository::new(pool.clone())
        .create(&NewUser {
            username: username.into(),
            email: format!("{username}@feza.test"),
            password_hash: "not-a-real-hash".into(),
            first_name: None,
            last_name: None,
            phone: None,
            status: UserStatus::Active,
        })
        .await?;
    Ok((user.id, user.public_id))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entry(kind: TransactionType, amount: f64, on: NaiveDate) -> EntryInput {
    EntryInput {
        transaction_date: Some(on),
        description: "Office supplies".into(),
        amount,
        transaction_type: kind,
        category_id: None,
        payee: Some("Simba Stores".into()),
        payment_method: Some("cash".into()),
        receipt_number: None,
        notes: None,
    }
}

#[tokio::test]
async fn approval_locks_the_entry_against_edits() -> TestResult {
    let ctx = TestContext::new().await?;
    let id = ctx.record(TransactionType::Credit, 20_000.0).await?;

    let pending = ctx.service.entry(&id).await?;
    assert_eq!(pending.approval_status, ApprovalStatus::Pending);
    assert!(!pending.is_locked);
    assert_eq!(ctx.service.balance().await?, 0.0);

    let approved = ctx.service.approve_entry(&ctx.approver, &id).await?;
    assert_eq!(approved.approval_status, ApprovalStatus::Approved);
    assert!(approved.is_locked);
    assert_eq!(approved.approved_by_name.as_deref(), Some("approver"));
    assert_eq!(ctx.service.balance().await?, 20_000.0);

    let edit = ctx
        .service
        .update_entry(&ctx.custodian, &id, &entry(TransactionType::Credit, 1.0, date(2026, 5, 10)))
        .await;
    assert!(matches!(edit, Err(PettyCashError::Conflict(_))));
    let delete = ctx.service.delete_entry(&ctx.manager, &id).await;
    assert!(matches!(delete, Err(PettyCashError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn debits_that_would_overdraw_are_refused() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.fund(1_000.0).await?;
    let debit = ctx.record(TransactionType::Debit, 1_500.0).await?;

    let result = ctx.service.approve_entry(&ctx.approver, &debit).await;
    assert!(matches!(result, Err(PettyCashError::Conflict(_))));
    assert_eq!(
        ctx.service.entry(&debit).await?.approval_status,
        ApprovalStatus::Pending
    );
    Ok(())
}

#[tokio::test]
async fn approvers_respect_ownership_and_limits() -> TestResult {
    let ctx = TestContext::new().await?;

    let big = ctx.record(TransactionType::Credit, 80_000.0).await?;
    let over_limit = ctx.service.approve_entry(&ctx.approver, &big).await;
    assert!(matches!(over_limit, Err(PettyCashError::Forbidden(_))));
    ctx.service.approve_entry(&ctx.manager, &big).await?;

    let own = ctx
        .service
        .record_entry(&ctx.approver, &entry(TransactionType::Debit, 10.0, date(2026, 5, 11)))
        .await?;
    let result = ctx.service.approve_entry(&ctx.approver, &own.entry.public_id).await;
    assert!(matches!(result, Err(PettyCashError::Forbidden(_))));

    let custodian_try = ctx.service.approve_entry(&ctx.custodian, &own.entry.public_id).await;
    assert!(matches!(custodian_try, Err(PettyCashError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn rejected_entries_return_to_pending_when_edited() -> TestResult {
    let ctx = TestContext::new().await?;
    let id = ctx.record(TransactionType::Debit, 300.0).await?;

    let missing_reason = ctx.service.reject_entry(&ctx.approver, &id, "  ").await;
    assert!(matches!(missing_reason, Err(PettyCashError::Validation(_))));

    let rejected = ctx
        .service
        .reject_entry(&ctx.approver, &id, "No receipt attached")
        .await?;
    assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("No receipt attached"));

    let edited = ctx
        .service
        .update_entry(&ctx.custodian, &id, &entry(TransactionType::Debit, 250.0, date(2026, 5, 12)))
        .await?;
    assert_eq!(edited.entry.approval_status, ApprovalStatus::Pending);
    assert_eq!(edited.entry.amount, 250.0);
    assert!(edited.entry.rejection_reason.is_none());

    let stranger_input = entry(TransactionType::Debit, 1.0, date(2026, 5, 12));
    let stranger = ctx.service.update_entry(
        &ctx.approver,
        &id,
        &stranger_input,
    );
    assert!(matches!(stranger.await, Err(PettyCashError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn bulk_approval_tracks_the_running_balance() -> TestResult {
    let ctx = TestContext::new().await?;
    let credit = ctx.record(TransactionType::Credit, 1_000.0).await?;
    let first_debit = ctx.record(TransactionType::Debit, 800.0).await?;
    let second_debit = ctx.record(TransactionType::Debit, 500.0).await?;

    let outcome = ctx
        .service
        .bulk_approve(
            &ctx.approver,
            &[
                credit.clone(),
                first_debit.clone(),
                second_debit.clone(),
                "missing".to_string(),
                credit.clone(),
            ],
        )
        .await?;

    assert_eq!(outcome.approved, vec![credit, first_debit]);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[0].id, second_debit);
    assert!(outcome.skipped[0].reason.contains("overdraw"));
    assert_eq!(outcome.skipped[1].reason, "not found");
    assert_eq!(ctx.service.balance().await?, 200.0);
    Ok(())
}

#[tokio::test]
async fn over_budget_entries_are_recorded_and_flagged() -> TestResult {
    let ctx = TestContext::new().await?;
    let fuel = ctx
        .service
        .create_category(
            &ctx.manager,
            &CategoryInput {
                name: "Fuel".into(),
                description: None,
                budget_limit: Some(1_000.0),
                is_active: None,
            },
        )
        .await?;

    let mut input = entry(TransactionType::Debit, 600.0, date(2026, 5, 3));
    input.category_id = Some(fuel.id);
    let first = ctx.service.record_entry(&ctx.custodian, &input).await?;
    assert!(!first.over_budget);
    assert_eq!(first.budget_remaining, Some(400.0));
    assert_eq!(first.entry.category_name.as_deref(), Some("Fuel"));

    let second = ctx.service.record_entry(&ctx.custodian, &input).await?;
    assert!(second.over_budget);
    assert_eq!(second.budget_remaining, Some(-200.0));

    input.transaction_date = Some(date(2026, 6, 1));
    let next_month = ctx.service.record_entry(&ctx.custodian, &input).await?;
    assert!(!next_month.over_budget);

    let summary = ctx.service.summary(date(2026, 5, 31)).await?;
    let spend = summary
        .categories
        .iter()
        .find(|c| c.category_id == fuel.id)
        .ok_or("missing category")?;
    assert_eq!(spend.spent, 1_200.0);
    assert!(spend.over_budget);

    assert_eq!(
        ctx.service.remove_category(&ctx.manager, fuel.id).await?,
        CategoryRemoval::Deactivated
    );
    assert!(!ctx.service.category(fuel.id).await?.is_active);
    let blocked = ctx.service.record_entry(&ctx.custodian, &input).await;
    assert!(matches!(blocked, Err(PettyCashError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn unused_categories_are_deleted_and_only_managers_edit_them() -> TestResult {
    let ctx = TestContext::new().await?;
    let input = CategoryInput {
        name: "Postage".into(),
        description: Some("Courier and stamps".into()),
        budget_limit: None,
        is_active: None,
    };

    let refused = ctx.service.create_category(&ctx.custodian, &input).await;
    assert!(matches!(refused, Err(PettyCashError::Forbidden(_))));

    let category = ctx.service.create_category(&ctx.manager, &input).await?;
    assert_eq!(
        ctx.service.remove_category(&ctx.manager, category.id).await?,
        CategoryRemoval::Deleted
    );
    assert!(matches!(
        ctx.service.category(category.id).await,
        Err(PettyCashError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn reconciliation_posts_the_period_and_reports_differences() -> TestResult {
    let ctx = TestContext::new().await?;

    let april = ctx
        .service
        .record_entry(&ctx.custodian, &entry(TransactionType::Credit, 10_000.0, date(2026, 4, 20)))
        .await?;
    ctx.service.approve_entry(&ctx.manager, &april.entry.public_id).await?;

    let may_credit = ctx
        .service
        .record_entry(&ctx.custodian, &entry(TransactionType::Credit, 5_000.0, date(2026, 5, 2)))
        .await?;
    let may_debit = ctx
        .service
        .record_entry(&ctx.custodian, &entry(TransactionType::Debit, 3_000.0, date(2026, 5, 15)))
        .await?;
    ctx.service.approve_entry(&ctx.manager, &may_credit.entry.public_id).await?;

    let may = ReconciliationInput {
        period_start: date(2026, 5, 1),
        period_end: date(2026, 5, 31),
        actual_balance: 11_900.0,
        notes: Some("Counted by cashier".into()),
    };
    let blocked = ctx.service.reconcile(&ctx.manager, &may).await;
    assert!(matches!(blocked, Err(PettyCashError::Conflict(_))));

    ctx.service.approve_entry(&ctx.manager, &may_debit.entry.public_id).await?;
    let custodian_try = ctx.service.reconcile(&ctx.custodian, &may).await;
    assert!(matches!(custodian_try, Err(PettyCashError::Forbidden(_))));

    let result = ctx.service.reconcile(&ctx.manager, &may).await?;
    assert_eq!(result.opening_balance, 10_000.0);
    assert_eq!(result.total_credits, 5_000.0);
    assert_eq!(result.total_debits, 3_000.0);
    assert_eq!(result.expected_balance, 12_000.0);
    assert_eq!(result.difference, -100.0);
    assert_eq!(result.status, ReconciliationStatus::Discrepancy);
    assert_eq!(result.entry_count, 2);

    let posted = ctx.service.entry(&may_debit.entry.public_id).await?;
    assert_eq!(posted.reconciliation_id, Some(result.id));
    let unposted = ctx.service.entry(&april.entry.public_id).await?;
    assert_eq!(unposted.reconciliation_id, None);

    let overlap = ctx.service.reconcile(&ctx.manager, &may).await;
    assert!(matches!(overlap, Err(PettyCashError::Conflict(_))));

    let june = ReconciliationInput {
        period_start: date(2026, 6, 1),
        period_end: date(2026, 6, 30),
        actual_balance: 12_000.0,
        notes: None,
    };
    let balanced = ctx.service.reconcile(&ctx.manager, &june).await?;
    assert_eq!(balanced.status, ReconciliationStatus::Balanced);
    assert_eq!(ctx.service.reconciliations().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn reconciled_periods_refuse_new_edited_and_approved_entries() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.fund(2_000.0).await?;

    let rejected = ctx
        .service
        .record_entry(&ctx.custodian, &entry(TransactionType::Debit, 40.0, date(2026, 5, 12)))
        .await?;
    ctx.service
        .reject_entry(&ctx.approver, &rejected.entry.public_id, "No receipt")
        .await?;
    let june = ctx
        .service
        .record_entry(&ctx.custodian, &entry(TransactionType::Debit, 60.0, date(2026, 6, 5)))
        .await?;

    let may = ReconciliationInput {
        period_start: date(2026, 5, 1),
        period_end: date(2026, 5, 31),
        actual_balance: 2_000.0,
        notes: None,
    };
    ctx.service.reconcile(&ctx.manager, &may).await?;

    let late = ctx
        .service
        .record_entry(&ctx.custodian, &entry(TransactionType::Debit, 25.0, date(2026, 5, 15)))
        .await;
    assert!(matches!(late, Err(PettyCashError::Conflict(_))));

    let reopened = ctx
        .service
        .update_entry(
            &ctx.custodian,
            &rejected.entry.public_id,
            &entry(TransactionType::Debit, 40.0, date(2026, 5, 12)),
        )
        .await;
    assert!(matches!(reopened, Err(PettyCashError::Conflict(_))));
    let still_rejected = ctx.service.entry(&rejected.entry.public_id).await?;
    assert_eq!(still_rejected.approval_status, ApprovalStatus::Rejected);

    let backdated = ctx
        .service
        .update_entry(
            &ctx.custodian,
            &june.entry.public_id,
            &entry(TransactionType::Debit, 60.0, date(2026, 5, 30)),
        )
        .await;
    assert!(matches!(backdated, Err(PettyCashError::Conflict(_))));

    // A pending row already sitting in the closed month.
    sqlx::query("UPDATE petty_cash SET transaction_date = ? WHERE public_id = ?")
        .bind(date(2026, 5, 20))
        .bind(&june.entry.public_id)
        .execute(&ctx.pool)
        .await?;
    let approval = ctx.service.approve_entry(&ctx.approver, &june.entry.public_id).await;
    assert!(matches!(approval, Err(PettyCashError::Conflict(_))));

    let bulk = ctx
        .service
        .bulk_approve(&ctx.approver, &[june.entry.public_id.clone()])
        .await?;
    assert!(bulk.approved.is_empty());
    assert_eq!(bulk.skipped.len(), 1);
    assert!(bulk.skipped[0].reason.contains("reconciled"));

    let pending = ctx.service.entry(&june.entry.public_id).await?;
    assert_eq!(pending.approval_status, ApprovalStatus::Pending);
    assert_eq!(ctx.service.balance().await?, 2_000.0);
    Ok(())
}

#[tokio::test]
async fn replenishment_completes_with_a_locked_credit() -> TestResult {
    let ctx = TestContext::new().await?;
    let request = ctx
        .service
        .request_replenishment(
            &ctx.custodian,
            &ReplenishmentInput {
                amount: 25_000.0,
                reason: "Month-end top up".into(),
                request_date: None,
            },
        )
        .await?;
    assert_eq!(request.status, ReplenishmentStatus::Pending);
    assert_eq!(request.requested_by_name.as_deref(), Some("custodian"));

    let early = ctx
        .service
        .complete_replenishment(&ctx.manager, &request.public_id)
        .await;
    assert!(matches!(early, Err(PettyCashError::Conflict(_))));
    let not_manager = ctx
        .service
        .approve_replenishment(&ctx.approver, &request.public_id)
        .await;
    assert!(matches!(not_manager, Err(PettyCashError::Forbidden(_))));

    ctx.service
        .approve_replenishment(&ctx.manager, &request.public_id)
        .await?;
    let completed = ctx
        .service
        .complete_replenishment(&ctx.manager, &request.public_id)
        .await?;
    assert_eq!(completed.status, ReplenishmentStatus::Completed);
    assert!(completed.completed_at.is_some());

    let credit_id = completed.transaction_public_id.ok_or("no linked entry")?;
    let credit = ctx.service.entry(&credit_id).await?;
    assert_eq!(credit.transaction_type, TransactionType::Credit);
    assert_eq!(credit.approval_status, ApprovalStatus::Approved);
    assert!(credit.is_locked);
    assert_eq!(ctx.service.balance().await?, 25_000.0);

    let again = ctx
        .service
        .complete_replenishment(&ctx.manager, &request.public_id)
        .await;
    assert!(matches!(again, Err(PettyCashError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn rejected_replenishments_need_a_reason() -> TestResult {
    let ctx = TestContext::new().await?;
    let request = ctx
        .service
        .request_replenishment(
            &ctx.custodian,
            &ReplenishmentInput {
                amount: 5_000.0,
                reason: "Fuel advance".into(),
                request_date: Some(date(2026, 5, 2)),
            },
        )
        .await?;

    let missing = ctx
        .service
        .reject_replenishment(&ctx.manager, &request.public_id, "")
        .await;
    assert!(matches!(missing, Err(PettyCashError::Validation(_))));

    let rejected = ctx
        .service
        .reject_replenishment(&ctx.manager, &request.public_id, "Budget frozen")
        .await?;
    assert_eq!(rejected.status, ReplenishmentStatus::Rejected);
    assert_eq!(
        ctx.service
            .replenishments(Some(ReplenishmentStatus::Rejected))
            .await?
            .len(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn roles_decide_what_each_user_may_do() -> TestResult {
    let ctx = TestContext::new().await?;
    let (viewer_id, viewer_public) = create_user(&ctx.pool, "viewer").await?;

    let viewer = ctx.service.actor(viewer_id, false).await?;
    assert_eq!(viewer.role, PettyCashRole::Viewer);
    let refused = ctx
        .service
        .record_entry(&viewer, &entry(TransactionType::Debit, 5.0, date(2026, 5, 1)))
        .await;
    assert!(matches!(refused, Err(PettyCashError::Forbidden(_))));

    assert_eq!(
        ctx.service.actor(viewer_id, true).await?.role,
        PettyCashRole::Manager
    );
    assert_eq!(ctx.approver.approval_limit, Some(50_000.0));

    ctx.service
        .assign_role(&ctx.manager, &viewer_public, PettyCashRole::Custodian, None)
        .await?;
    assert_eq!(ctx.service.role_assignments(&ctx.manager).await?.len(), 3);
    ctx.service.remove_role(&ctx.manager, &viewer_public).await?;
    assert!(matches!(
        ctx.service.remove_role(&ctx.manager, &viewer_public).await,
        Err(PettyCashError::NotFound(_))
    ));
    assert!(matches!(
        ctx.service.role_assignments(&ctx.custodian).await,
        Err(PettyCashError::Forbidden(_))
    ));
    Ok(())
}

#[tokio::test]
async fn receipts_attach_even_to_locked_entries() -> TestResult {
    let ctx = TestContext::new().await?;
    let id = ctx.fund(500.0).await?;

    let receipt = ctx
        .service
        .add_receipt(
            &ctx.custodian,
            &id,
            &EntryReceiptInput {
                file_name: "receipt.jpg".into(),
                content_type: "image/jpeg".into(),
                file_size: 48_213,
                storage_path: "receipts/2026/05/receipt.jpg".into(),
            },
        )
        .await?;
    assert_eq!(receipt.file_name, "receipt.jpg");
    assert_eq!(ctx.service.receipts(&id).await?.len(), 1);

    let invalid = ctx
        .service
        .add_receipt(
            &ctx.custodian,
            &id,
            &EntryReceiptInput {
                file_name: " ".into(),
                content_type: "image/jpeg".into(),
                file_size: 1,
                storage_path: "x".into(),
            },
        )
        .await;
    assert!(matches!(invalid, Err(PettyCashError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn summary_flags_low_balance_and_pending_work() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.fund(30_000.0).await?;
    ctx.record(TransactionType::Debit, 1_000.0).await?;

    let summary = ctx.service.summary(date(2026, 5, 20)).await?;
    assert_eq!(summary.balance, 30_000.0);
    assert_eq!(summary.pending_count, 1);
    assert_eq!(summary.pending_amount, 1_000.0);
    assert_eq!(summary.low_balance_threshold, Some(50_000.0));
    assert!(summary.low_balance);
    assert_eq!(summary.month_start, date(2026, 5, 1));

    ctx.fund(40_000.0).await?;
    assert!(!ctx.service.summary(date(2026, 5, 20)).await?.low_balance);
    Ok(())
}

#[tokio::test]
async fn entries_filter_by_type_and_status() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.fund(1_000.0).await?;
    ctx.record(TransactionType::Debit, 10.0).await?;
    ctx.record(TransactionType::Debit, 20.0).await?;

    let debits = ctx
        .service
        .entries(
            &EntryFilter {
                transaction_type: Some(TransactionType::Debit),
                ..EntryFilter::default()
            },
            Page::default(),
        )
        .await?;
    assert_eq!(debits.total, 2);

    let approved = ctx
        .service
        .entries(
            &EntryFilter {
                approval_status: Some(ApprovalStatus::Approved),
                ..EntryFilter::default()
            },
            Page::default(),
        )
        .await?;
    assert_eq!(approved.total, 1);

    let search = ctx
        .service
        .entries(
            &EntryFilter {
                search: Some("simba".into()),
                ..EntryFilter::default()
            },
            Page::new(Some(2), Some(0)),
        )
        .await?;
    assert_eq!(search.total, 3);
    assert_eq!(search.items.len(), 2);
    Ok(())
}
