//! Repository-level tests for the shared tables

use std::collections::BTreeMap;

use feza_config::DatabaseConfig;
use feza_database::{
    initialize_database, ActivityFilter, ActivityRepository, DatabaseError, EmailLogRepository,
    EmailStatus, LoginAttemptRepository, NewActivity, NewEmailLog, NewUser, Page, RoleRepository,
    SessionRepository, SettingsRepository, UserProfileUpdate, UserRepository, UserStatus,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn create_test_database() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("repository_tests.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 2,
    };
    let pool = initialize_database(&config).await.unwrap();
    (pool, temp_dir)
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@Example.com"),
        password_hash: "hash".to_string(),
        first_name: Some("Test".into()),
        last_name: Some(username.to_string()),
        phone: None,
        status: UserStatus::Active,
    }
}

#[tokio::test]
async fn user_crud_and_lookup() {
    let (pool, _temp_dir) = create_test_database().await;
    let repo = UserRepository::new(pool);

    let created = repo.create(&new_user("alice")).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.email, "alice@example.com");
    assert_eq!(created.status, UserStatus::Active);
    assert!(!created.public_id.is_empty());

    let by_email = repo.find_by_login("ALICE@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, created.id);
    let by_name = repo.find_by_login(" Alice ").await.unwrap().unwrap();
    assert_eq!(by_name.id, created.id);
    assert!(repo.find_by_login("nobody").await.unwrap().is_none());

    let updated = repo
        .update_profile(
            created.id,
            &UserProfileUpdate {
                phone: Some("+250 788 000 000".into()),
                ..UserProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.phone.as_deref(), Some("+250 788 000 000"));
    assert_eq!(updated.first_name.as_deref(), Some("Test"));

    repo.set_status(created.id, UserStatus::Suspended).await.unwrap();
    let suspended = repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(suspended.status, UserStatus::Suspended);

    repo.delete(created.id).await.unwrap();
    assert!(repo.find_by_id(created.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(created.id).await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_username_is_reported_as_duplicate() {
    let (pool, _temp_dir) = create_test_database().await;
    let repo = UserRepository::new(pool);

    repo.create(&new_user("bob")).await.unwrap();
    let error = repo.create(&new_user("bob")).await.unwrap_err();
    assert!(matches!(error, DatabaseError::Duplicate(_)), "{error:?}");
}

#[tokio::test]
async fn user_listing_searches_and_paginates() {
    let (pool, _temp_dir) = create_test_database().await;
    let repo = UserRepository::new(pool);

    for name in ["carol", "dave", "erin"] {
        repo.create(&new_user(name)).await.unwrap();
    }

    let page = repo.list(None, Page::new(Some(2), Some(0))).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].username, "carol");

    let found = repo.list(Some("DAV"), Page::default()).await.unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].username, "dave");
}

#[tokio::test]
async fn otp_columns_are_set_and_cleared() {
    let (pool, _temp_dir) = create_test_database().await;
    let repo = UserRepository::new(pool);
    let user = repo.create(&new_user("frank")).await.unwrap();

    repo.set_otp(user.id, "digest", "2030-01-01T00:00:00+00:00")
        .await
        .unwrap();
    let with_otp = repo.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(with_otp.otp_hash.as_deref(), Some("digest"));

    repo.clear_otp(user.id).await.unwrap();
    let cleared = repo.find_by_id(user.id).await.unwrap().unwrap();
    assert!(cleared.otp_hash.is_none());
    assert!(cleared.otp_expires_at.is_none());
}

#[tokio::test]
async fn role_permissions_and_assignments() {
    let (pool, _temp_dir) = create_test_database().await;
    let users = UserRepository::new(pool.clone());
    let roles = RoleRepository::new(pool);

    let user = users.create(&new_user("grace")).await.unwrap();
    let auditor = roles.create("auditor", Some("Reads things")).await.unwrap();

    roles
        .set_role_permissions(
            auditor.id,
            &["invoices.view".to_string(), "activity.view".to_string()],
        )
        .await
        .unwrap();
    let granted = roles.permissions_for_role(auditor.id).await.unwrap();
    assert_eq!(granted.len(), 2);

    let unknown = roles
        .set_role_permissions(auditor.id, &["made.up".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(unknown, DatabaseError::Validation(_)));
    assert_eq!(roles.permissions_for_role(auditor.id).await.unwrap().len(), 2);

    let viewer = roles.find_by_name("viewer").await.unwrap().unwrap();
    roles
        .set_user_roles(user.id, &[auditor.id, viewer.id])
        .await
        .unwrap();

    let names = roles.permission_names_for_user(user.id).await.unwrap();
    assert!(names.contains(&"activity.view".to_string()));
    assert!(names.contains(&"petty_cash.view".to_string()));
    assert_eq!(roles.roles_for_user(user.id).await.unwrap().len(), 2);
    assert_eq!(roles.count_users_with_role("auditor").await.unwrap(), 1);

    roles.delete(auditor.id).await.unwrap();
    assert_eq!(roles.roles_for_user(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sessions_are_revoked_selectively() {
    let (pool, _temp_dir) = create_test_database().await;
    let users = UserRepository::new(pool.clone());
    let sessions = SessionRepository::new(pool);
    let user = users.create(&new_user("heidi")).await.unwrap();

    sessions
        .create(user.id, "keep", None, "2099-01-01T00:00:00+00:00")
        .await
        .unwrap();
    sessions
        .create(user.id, "drop", Some("10.0.0.1"), "2099-01-01T00:00:00+00:00")
        .await
        .unwrap();
    sessions
        .create(user.id, "stale", None, "2000-01-01T00:00:00+00:00")
        .await
        .unwrap();

    assert_eq!(
        sessions
            .delete_expired("2026-01-01T00:00:00+00:00")
            .await
            .unwrap(),
        1
    );
    assert_eq!(sessions.delete_for_user(user.id, Some("keep")).await.unwrap(), 1);
    assert!(sessions.find_by_token("keep").await.unwrap().is_some());
    assert!(sessions.find_by_token("drop").await.unwrap().is_none());
    assert!(sessions.delete_by_token("keep").await.unwrap());
}

#[tokio::test]
async fn login_attempts_upsert_and_clear() {
    let (pool, _temp_dir) = create_test_database().await;
    let users = UserRepository::new(pool.clone());
    let attempts = LoginAttemptRepository::new(pool);
    let user = users.create(&new_user("ivan")).await.unwrap();

    attempts
        .upsert(user.id, 1, "2026-01-01T00:00:00+00:00", None, None)
        .await
        .unwrap();
    attempts
        .upsert(
            user.id,
            3,
            "2026-01-01T00:05:00+00:00",
            Some("2026-01-02T00:05:00+00:00"),
            Some("127.0.0.1"),
        )
        .await
        .unwrap();

    let row = attempts.find_for_user(user.id).await.unwrap().unwrap();
    assert_eq!(row.attempts, 3);
    assert_eq!(row.locked_until.as_deref(), Some("2026-01-02T00:05:00+00:00"));

    assert!(attempts.clear(user.id).await.unwrap());
    assert!(!attempts.clear(user.id).await.unwrap());
}

#[tokio::test]
async fn activity_log_filters_newest_first() {
    let (pool, _temp_dir) = create_test_database().await;
    let users = UserRepository::new(pool.clone());
    let activity = ActivityRepository::new(pool);
    let user = users.create(&new_user("judy")).await.unwrap();

    activity
        .record(&NewActivity::new(Some(user.id), "login", "user").entity(user.id))
        .await
        .unwrap();
    activity
        .record(
            &NewActivity::new(Some(user.id), "create", "invoice")
                .entity("INV-2026-0001")
                .details(serde_json::json!({ "total": 118.0 })),
        )
        .await
        .unwrap();

    let all = activity
        .list(&ActivityFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.items[0].action, "create");
    assert_eq!(all.items[0].username.as_deref(), Some("judy"));

    let invoices = activity
        .list(
            &ActivityFilter {
                entity_type: Some("invoice".into()),
                ..ActivityFilter::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(invoices.total, 1);
    assert!(invoices.items[0].details.as_deref().unwrap().contains("118"));
}

#[tokio::test]
async fn settings_upsert_and_numeric_lookup() {
    let (pool, _temp_dir) = create_test_database().await;
    let settings = SettingsRepository::new(pool);

    assert_eq!(
        settings.get_f64("petty_cash_low_balance").await.unwrap(),
        Some(50_000.0)
    );

    let mut values = BTreeMap::new();
    values.insert("company_name".to_string(), "Feza Logistics Ltd".to_string());
    values.insert("invoice_footer".to_string(), "Thank you".to_string());
    settings.set_many(&values, None).await.unwrap();

    assert_eq!(
        settings.get("company_name").await.unwrap().as_deref(),
        Some("Feza Logistics Ltd")
    );
    assert!(settings.all().await.unwrap().iter().any(|s| s.key == "invoice_footer"));
    assert_eq!(settings.get_f64("company_name").await.unwrap(), None);
}

#[tokio::test]
async fn email_log_records_attempts() {
    let (pool, _temp_dir) = create_test_database().await;
    let logs = EmailLogRepository::new(pool);

    logs.record(&NewEmailLog {
        recipient: "client@example.com".into(),
        subject: "Invoice INV-2026-0001".into(),
        document_type: Some("invoice".into()),
        document_id: Some("abc".into()),
        status: EmailStatus::Failed,
        error: Some("smtp down".into()),
        message_id: None,
        sent_by: None,
    })
    .await
    .unwrap();

    let page = logs.list(Page::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].status, EmailStatus::Failed);
}
