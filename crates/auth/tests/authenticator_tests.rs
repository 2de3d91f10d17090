use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feza_auth::{
    permissions, AccessControl, AuthError, Authenticator, LockoutPolicy, LoginOutcome, NewAccount,
    RoleInput, UserAdmin,
};
use feza_config::{AuthConfig, LockoutConfig, MailConfig, OtpConfig};
use feza_database::{UserProfileUpdate, UserStatus};
use feza_mailer::{DeliveryReceipt, MailMessage, MailResult, Mailer};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const PASSWORD: &str = "Str0ngPassw0rd";

#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl CapturingMailer {
    fn last_code(&self) -> Option<String> {
        let sent = self.sent.lock().ok()?;
        let text = &sent.last()?.text;
        text.split(|c: char| !c.is_ascii_digit())
            .find(|chunk| chunk.len() == 6)
            .map(str::to_string)
    }

    fn count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: &MailMessage) -> MailResult<DeliveryReceipt> {
        message.validate()?;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(DeliveryReceipt {
            message_id: message.message_id.clone(),
            location: None,
        })
    }
}

fn auth_config(otp_enabled: bool) -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        lockout: LockoutConfig::default(),
        otp: OtpConfig {
            enabled: otp_enabled,
            ..OtpConfig::default()
        },
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    admin: UserAdmin,
    access: AccessControl,
    mailer: Arc<CapturingMailer>,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("auth.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let mailer = Arc::new(CapturingMailer::default());
        let authenticator = Authenticator::new(
            pool.clone(),
            &config,
            mailer.clone(),
            MailConfig::default(),
        );
        let admin = UserAdmin::new(pool.clone(), LockoutPolicy::from_config(&config.lockout));
        let access = AccessControl::new(pool.clone());

        Ok(Self {
            pool,
            authenticator,
            admin,
            access,
            mailer,
            _temp_dir: temp_dir,
        })
    }

    async fn without_otp() -> TestResult<Self> {
        Self::new(auth_config(false)).await
    }

    async fn create_user(&self, username: &str, roles: &[&str]) -> TestResult<feza_auth::UserDetails> {
        Ok(self
            .admin
            .create(NewAccount {
                username: username.into(),
                email: format!("{username}@fezalogistics.com"),
                password: PASSWORD.into(),
                first_name: None,
                last_name: None,
                phone: None,
                roles: roles.iter().map(|r| r.to_string()).collect(),
            })
            .await?)
    }
}

#[tokio::test]
async fn login_without_otp_issues_a_session() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let details = ctx.create_user("alice", &["accountant"]).await?;

    let outcome = ctx
        .authenticator
        .login("alice@fezalogistics.com", PASSWORD, Some("127.0.0.1"))
        .await?;
    let LoginOutcome::Authenticated { user, session } = outcome else {
        return Err("expected a session".into());
    };
    assert_eq!(user.id, details.user.id);

    let (resolved, _) = ctx.authenticator.authenticate_token(&session.token).await?;
    assert_eq!(resolved.username, "alice");
    assert!(resolved.last_login_at.is_some());

    ctx.authenticator.logout(&session.token).await?;
    assert!(matches!(
        ctx.authenticator.authenticate_token(&session.token).await,
        Err(AuthError::SessionNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn three_failures_lock_the_account_even_for_the_right_password() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let details = ctx.create_user("bob", &[]).await?;

    for _ in 0..2 {
        assert!(matches!(
            ctx.authenticator.login("bob", "wrong-pass1", None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }
    assert!(matches!(
        ctx.authenticator.login("bob", "wrong-pass1", None).await,
        Err(AuthError::AccountLocked { .. })
    ));
    match ctx.authenticator.login("bob", PASSWORD, None).await {
        Err(AuthError::AccountLocked { remaining_minutes, .. }) => {
            assert!(remaining_minutes > 23 * 60);
        }
        other => return Err(format!("expected lockout, got {other:?}").into()),
    }

    let shown = ctx.admin.get(&details.user.public_id).await?;
    assert!(shown.locked_until.is_some());

    // Let the lock elapse.
    sqlx::query(
        "UPDATE failed_login_attempts SET locked_until = '2000-01-02T00:00:00+00:00', \
         last_attempt_at = '2000-01-01T00:00:00+00:00' WHERE user_id = ?",
    )
    .bind(details.user.id)
    .execute(&ctx.pool)
    .await?;

    assert!(matches!(
        ctx.authenticator.login("bob", PASSWORD, None).await?,
        LoginOutcome::Authenticated { .. }
    ));
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM failed_login_attempts")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(remaining, 0);
    Ok(())
}

#[tokio::test]
async fn admin_unlock_clears_the_counter() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let details = ctx.create_user("carol", &[]).await?;

    for _ in 0..3 {
        let _ = ctx.authenticator.login("carol", "nope-nope1", None).await;
    }
    assert!(ctx.authenticator.login("carol", PASSWORD, None).await.is_err());

    let unlocked = ctx.admin.unlock(&details.user.public_id).await?;
    assert!(unlocked.locked_until.is_none());
    assert!(ctx.authenticator.login("carol", PASSWORD, None).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn otp_flow_emails_a_code_and_verifies_it() -> TestResult {
    let ctx = TestContext::new(auth_config(true)).await?;
    ctx.create_user("dave", &[]).await?;

    let LoginOutcome::OtpRequired(challenge) =
        ctx.authenticator.login("dave", PASSWORD, None).await?
    else {
        return Err("expected an OTP challenge".into());
    };
    assert_eq!(challenge.sent_to, "d***@fezalogistics.com");
    assert_eq!(ctx.mailer.count(), 1);

    let code = ctx.mailer.last_code().ok_or("code missing from email")?;
    let wrong = if code == "000000" { "111111" } else { "000000" };
    assert!(matches!(
        ctx.authenticator.verify_otp(&challenge.user_id, wrong, None).await,
        Err(AuthError::InvalidOtp)
    ));

    let (user, session) = ctx
        .authenticator
        .verify_otp(&challenge.user_id, &code, None)
        .await?;
    assert_eq!(user.username, "dave");
    assert!(!session.token.is_empty());

    // The code is single use.
    assert!(matches!(
        ctx.authenticator.verify_otp(&challenge.user_id, &code, None).await,
        Err(AuthError::OtpExpired)
    ));
    Ok(())
}

#[tokio::test]
async fn expired_and_resent_codes() -> TestResult {
    let ctx = TestContext::new(auth_config(true)).await?;
    ctx.create_user("erin", &[]).await?;

    let LoginOutcome::OtpRequired(challenge) =
        ctx.authenticator.login("erin", PASSWORD, None).await?
    else {
        return Err("expected an OTP challenge".into());
    };
    let first = ctx.mailer.last_code().ok_or("code missing")?;

    let resent = ctx.authenticator.resend_otp(&challenge.user_id).await?;
    assert_eq!(ctx.mailer.count(), 2);
    let second = ctx.mailer.last_code().ok_or("code missing")?;
    if first != second {
        assert!(ctx
            .authenticator
            .verify_otp(&resent.user_id, &first, None)
            .await
            .is_err());
    }

    sqlx::query("UPDATE users SET otp_expires_at = '2000-01-01T00:00:00+00:00' WHERE username = 'erin'")
        .execute(&ctx.pool)
        .await?;
    assert!(matches!(
        ctx.authenticator.verify_otp(&resent.user_id, &second, None).await,
        Err(AuthError::OtpExpired)
    ));
    Ok(())
}

#[tokio::test]
async fn wrong_otps_feed_the_lockout() -> TestResult {
    let ctx = TestContext::new(auth_config(true)).await?;
    ctx.create_user("frank", &[]).await?;

    let LoginOutcome::OtpRequired(challenge) =
        ctx.authenticator.login("frank", PASSWORD, None).await?
    else {
        return Err("expected an OTP challenge".into());
    };
    let code = ctx.mailer.last_code().ok_or("code missing")?;
    let wrong = if code == "999999" { "888888" } else { "999999" };

    let _ = ctx.authenticator.verify_otp(&challenge.user_id, wrong, None).await;
    let _ = ctx.authenticator.verify_otp(&challenge.user_id, wrong, None).await;
    assert!(matches!(
        ctx.authenticator.verify_otp(&challenge.user_id, wrong, None).await,
        Err(AuthError::AccountLocked { .. })
    ));
    assert!(matches!(
        ctx.authenticator.verify_otp(&challenge.user_id, &code, None).await,
        Err(AuthError::AccountLocked { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn inactive_accounts_cannot_log_in() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let admin = ctx.create_user("root", &["admin"]).await?;
    let target = ctx.create_user("grace", &[]).await?;

    let LoginOutcome::Authenticated { session, .. } =
        ctx.authenticator.login("grace", PASSWORD, None).await?
    else {
        return Err("expected a session".into());
    };

    ctx.admin
        .set_status(admin.user.id, &target.user.public_id, UserStatus::Suspended)
        .await?;
    assert!(ctx.authenticator.authenticate_token(&session.token).await.is_err());
    assert!(matches!(
        ctx.authenticator.login("grace", PASSWORD, None).await,
        Err(AuthError::AccountInactive)
    ));
    Ok(())
}

#[tokio::test]
async fn password_change_revokes_other_sessions() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let details = ctx.create_user("heidi", &[]).await?;

    let mut tokens = Vec::new();
    for _ in 0..2 {
        if let LoginOutcome::Authenticated { session, .. } =
            ctx.authenticator.login("heidi", PASSWORD, None).await?
        {
            tokens.push(session.token);
        }
    }
    assert_eq!(tokens.len(), 2);

    assert!(matches!(
        ctx.authenticator
            .change_password(details.user.id, "not-it-123", "N3wPassword", Some(&tokens[0]))
            .await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        ctx.authenticator
            .change_password(details.user.id, PASSWORD, "weak", Some(&tokens[0]))
            .await,
        Err(AuthError::Validation(_))
    ));

    let revoked = ctx
        .authenticator
        .change_password(details.user.id, PASSWORD, "N3wPassword", Some(&tokens[0]))
        .await?;
    assert_eq!(revoked, 1);
    assert!(ctx.authenticator.authenticate_token(&tokens[0]).await.is_ok());
    assert!(ctx.authenticator.authenticate_token(&tokens[1]).await.is_err());
    assert!(ctx.authenticator.login("heidi", "N3wPassword", None).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn expired_sessions_are_removed_on_use() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    ctx.create_user("ivan", &[]).await?;
    let LoginOutcome::Authenticated { session, .. } =
        ctx.authenticator.login("ivan", PASSWORD, None).await?
    else {
        return Err("expected a session".into());
    };

    sqlx::query("UPDATE sessions SET expires_at = '2000-01-01T00:00:00+00:00' WHERE token = ?")
        .bind(&session.token)
        .execute(&ctx.pool)
        .await?;

    assert!(matches!(
        ctx.authenticator.authenticate_token(&session.token).await,
        Err(AuthError::SessionExpired)
    ));
    assert!(matches!(
        ctx.authenticator.authenticate_token(&session.token).await,
        Err(AuthError::SessionNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn rbac_resolves_permissions_through_roles() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let admin = ctx.create_user("root", &["admin"]).await?;
    let viewer = ctx.create_user("judy", &["viewer"]).await?;

    let admin_set = ctx.access.permissions_for(admin.user.id).await?;
    assert!(admin_set.has(permissions::SETTINGS_MANAGE));

    let viewer_set = ctx.access.permissions_for(viewer.user.id).await?;
    assert!(viewer_set.has(permissions::INVOICES_VIEW));
    assert!(!viewer_set.has(permissions::INVOICES_CREATE));
    assert!(matches!(
        ctx.access.require(viewer.user.id, permissions::USERS_MANAGE).await,
        Err(AuthError::Forbidden(_))
    ));

    let role = ctx
        .access
        .create_role(RoleInput {
            name: Some("cashier".into()),
            description: Some("Front desk".into()),
            permissions: Some(vec![permissions::RECEIPTS_CREATE.into()]),
        })
        .await?;
    assert_eq!(role.permissions, vec!["receipts.create".to_string()]);

    ctx.admin
        .set_roles(&viewer.user.public_id, &["viewer".into(), "cashier".into()])
        .await?;
    assert!(ctx
        .access
        .permissions_for(viewer.user.id)
        .await?
        .has(permissions::RECEIPTS_CREATE));

    let admin_role = ctx
        .access
        .list_roles()
        .await?
        .into_iter()
        .find(|r| r.role.name == "admin")
        .ok_or("admin role missing")?;
    assert!(matches!(
        ctx.access.delete_role(admin_role.role.id).await,
        Err(AuthError::Conflict(_))
    ));
    ctx.access.delete_role(role.role.id).await?;
    Ok(())
}

#[tokio::test]
async fn last_admin_and_self_deletion_are_refused() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    let root = ctx.create_user("root", &["admin"]).await?;
    let other = ctx.create_user("kate", &["accountant"]).await?;

    assert!(matches!(
        ctx.admin.delete(root.user.id, &root.user.public_id).await,
        Err(AuthError::Conflict(_))
    ));
    assert!(matches!(
        ctx.admin.delete(other.user.id, &root.user.public_id).await,
        Err(AuthError::Conflict(_))
    ));
    assert!(matches!(
        ctx.admin.set_roles(&root.user.public_id, &["viewer".into()]).await,
        Err(AuthError::Conflict(_))
    ));

    ctx.admin.delete(root.user.id, &other.user.public_id).await?;
    assert!(matches!(
        ctx.admin.get(&other.user.public_id).await,
        Err(AuthError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn account_creation_validates_input() -> TestResult {
    let ctx = TestContext::without_otp().await?;
    ctx.create_user("leo", &[]).await?;

    let duplicate = ctx.create_user("leo", &[]).await;
    assert!(matches!(duplicate, Err(e) if e.to_string().contains("already exists")));

    let weak = ctx
        .admin
        .create(NewAccount {
            username: "mallory".into(),
            email: "mallory@fezalogistics.com".into(),
            password: "password".into(),
            first_name: None,
            last_name: None,
            phone: None,
            roles: vec![],
        })
        .await;
    assert!(matches!(weak, Err(AuthError::Validation(_))));

    let unknown_role = ctx
        .admin
        .create(NewAccount {
            username: "nina".into(),
            email: "nina@fezalogistics.com".into(),
            password: PASSWORD.into(),
            first_name: None,
            last_name: None,
            phone: None,
            roles: vec!["wizard".into()],
        })
        .await;
    assert!(matches!(unknown_role, Err(AuthError::Validation(_))));
    assert!(ctx.admin.find_by_login("nina").await.is_err());

    let updated = ctx
        .admin
        .update_profile(
            &ctx.admin.find_by_login("leo").await?.public_id,
            UserProfileUpdate {
                first_name: Some("Leo".into()),
                ..UserProfileUpdate::default()
            },
        )
        .await?;
    assert_eq!(updated.user.display_name(), "Leo");
    Ok(())
}
