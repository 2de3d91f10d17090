use std::str::FromStr;

use feza_assistant::{Assistant, AssistantError, ChatStatus, ModelClient};
use feza_config::AssistantConfig;
use feza_database::{NewUser, Page, UserRepository, UserStatus};
use httpmock::prelude::*;
use serde_json::json;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

struct TestContext {
    pool: SqlitePool,
    server: MockServer,
    user_id: i64,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("assistant.sqlite");
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        let user = UserRepository::new(pool.clone())
            .create(&NewUser {
                username: "analyst".into(),
                email: "analyst@feza.test".into(),
                password_hash: "not-a-real-hash".into(),
                first_name: None,
                last_name: None,
                phone: None,
                status: UserStatus::Active,
            })
            .await?;

        Ok(Self {
            pool,
            server: MockServer::start_async().await,
            user_id: user.id,
            _temp_dir: temp_dir,
        })
    }

    fn config(&self) -> AssistantConfig {
        AssistantConfig {
            base_url: self.server.base_url(),
            max_attempts: 3,
            retry_delay_ms: 1,
            request_timeout_seconds: 5,
            ..AssistantConfig::default()
        }
    }

    fn assistant(&self) -> TestResult<Assistant> {
        Ok(Assistant::new(self.pool.clone(), &self.config())?)
    }

    async fn answer_with(&self, response: &str) {
        self.server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({ "response": response }));
            })
            .await;
    }
}

#[tokio::test]
async fn client_sends_generate_request_with_options() -> TestResult {
    let ctx = TestContext::new().await?;
    let mock = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body_partial(r#"{"model":"llama3","stream":false,"options":{"num_predict":512,"top_k":40}}"#);
            then.status(200).json_body(json!({ "response": "hello", "done": true }));
        })
        .await;

    let client = ModelClient::new(&ctx.config())?;
    assert_eq!(client.generate("ping").await?, "hello");
    mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn client_retries_exactly_max_attempts() -> TestResult {
    let ctx = TestContext::new().await?;
    let mock = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(503).body("loading model");
        })
        .await;

    let client = ModelClient::new(&ctx.config())?;
    let error = client.generate("ping").await.unwrap_err();
    assert!(matches!(error, AssistantError::Unavailable { attempts: 3, .. }));
    mock.assert_hits_async(3).await;
    Ok(())
}

#[tokio::test]
async fn unreadable_bodies_count_as_failed_attempts() -> TestResult {
    let ctx = TestContext::new().await?;
    let mock = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).body("not json");
        })
        .await;

    let mut config = ctx.config();
    config.max_attempts = 2;
    let client = ModelClient::new(&config)?;
    assert!(client.generate("ping").await.is_err());
    mock.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn generated_select_is_executed_and_logged() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("Here is the query:\n```sql\nSELECT name FROM roles ORDER BY name;\n```")
        .await;

    let assistant = ctx.assistant()?;
    let reply = assistant.ask(ctx.user_id, "Which roles exist?").await?;

    assert_eq!(reply.status, ChatStatus::Executed);
    assert_eq!(reply.sql.as_deref(), Some("SELECT name FROM roles ORDER BY name;"));
    let result = reply.result.ok_or("missing result")?;
    assert_eq!(result.columns, vec!["name".to_string()]);
    assert_eq!(
        result.rows,
        vec![
            vec![json!("accountant")],
            vec![json!("admin")],
            vec![json!("manager")],
            vec![json!("viewer")],
        ]
    );
    assert!(!result.truncated);

    let history = assistant.history(ctx.user_id, Page::default()).await?;
    assert_eq!(history.total, 1);
    assert_eq!(history.items[0].status, ChatStatus::Executed);
    assert_eq!(history.items[0].row_count, Some(4));
    assert_eq!(history.items[0].prompt, "Which roles exist?");
    Ok(())
}

#[tokio::test]
async fn results_are_capped_at_max_rows() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with(
        "```sql\nWITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 10) \
         SELECT x, x * 1.5 AS half_more FROM n;\n```",
    )
    .await;

    let mut config = ctx.config();
    config.max_rows = 3;
    let assistant = Assistant::new(ctx.pool.clone(), &config)?;
    let reply = assistant.ask(ctx.user_id, "Count to ten").await?;

    let result = reply.result.ok_or("missing result")?;
    assert_eq!(result.rows.len(), 3);
    assert!(result.truncated);
    assert_eq!(result.rows[1], vec![json!(2), json!(3.0)]);
    Ok(())
}

#[tokio::test]
async fn write_statements_are_blocked_and_never_run() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("```sql\nDELETE FROM roles;\n```").await;

    let assistant = ctx.assistant()?;
    let reply = assistant.ask(ctx.user_id, "Remove every role").await?;

    assert_eq!(reply.status, ChatStatus::Blocked);
    assert!(reply.result.is_none());
    assert!(reply
        .blocked_reason
        .as_deref()
        .is_some_and(|r| r.contains("SELECT")));

    let roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(roles, 4);

    let history = assistant.history(ctx.user_id, Page::default()).await?;
    assert_eq!(history.items[0].status, ChatStatus::Blocked);
    assert_eq!(history.items[0].generated_sql.as_deref(), Some("DELETE FROM roles;"));
    Ok(())
}

#[tokio::test]
async fn secret_columns_are_blocked() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("SELECT username, password_hash FROM users;").await;

    let reply = ctx.assistant()?.ask(ctx.user_id, "Show passwords").await?;
    assert_eq!(reply.status, ChatStatus::Blocked);
    Ok(())
}

#[tokio::test]
async fn wildcard_selects_over_credentials_are_blocked() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("```sql\nSELECT * FROM users\n```").await;

    let assistant = ctx.assistant()?;
    let reply = assistant.ask(ctx.user_id, "List every user").await?;
    assert_eq!(reply.status, ChatStatus::Blocked);
    assert!(reply.result.is_none());
    assert!(reply
        .blocked_reason
        .as_deref()
        .is_some_and(|r| r.contains("password_hash")));

    let history = assistant.history(ctx.user_id, Page::default()).await?;
    assert_eq!(history.items[0].status, ChatStatus::Blocked);
    assert!(history.items[0].row_count.is_none());
    Ok(())
}

#[tokio::test]
async fn empty_wildcard_results_are_still_checked() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("SELECT s.* FROM sessions s WHERE s.id < 0;").await;

    let reply = ctx.assistant()?.ask(ctx.user_id, "Open sessions?").await?;
    assert_eq!(reply.status, ChatStatus::Blocked);
    assert!(reply.result.is_none());
    Ok(())
}

#[tokio::test]
async fn plain_answers_are_logged_without_sql() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("Invoices become overdue the day after their due date.")
        .await;

    let assistant = ctx.assistant()?;
    let reply = assistant.ask(ctx.user_id, "When is an invoice overdue?").await?;
    assert_eq!(reply.status, ChatStatus::Answered);
    assert!(reply.sql.is_none());

    let history = assistant.history(ctx.user_id, Page::default()).await?;
    assert_eq!(history.items[0].status, ChatStatus::Answered);
    assert!(history.items[0].generated_sql.is_none());
    Ok(())
}

#[tokio::test]
async fn unavailable_model_fails_and_is_logged() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500);
        })
        .await;

    let assistant = ctx.assistant()?;
    let error = assistant.ask(ctx.user_id, "Total paid this month?").await.unwrap_err();
    assert!(matches!(error, AssistantError::Unavailable { .. }));

    let history = assistant.history(ctx.user_id, Page::default()).await?;
    assert_eq!(history.total, 1);
    assert_eq!(history.items[0].status, ChatStatus::Failed);
    assert!(history.items[0].error.is_some());
    Ok(())
}

#[tokio::test]
async fn broken_queries_fail_and_are_logged() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.answer_with("```sql\nSELECT missing_column FROM invoices\n```").await;

    let assistant = ctx.assistant()?;
    let error = assistant.ask(ctx.user_id, "Anything").await.unwrap_err();
    assert!(matches!(error, AssistantError::Query(_)));

    let history = assistant.history(ctx.user_id, Page::default()).await?;
    assert_eq!(history.items[0].status, ChatStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn empty_questions_are_refused_without_calling_the_model() -> TestResult {
    let ctx = TestContext::new().await?;
    let mock = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "response": "unused" }));
        })
        .await;

    let error = ctx.assistant()?.ask(ctx.user_id, "   ").await.unwrap_err();
    assert!(matches!(error, AssistantError::Validation(_)));
    mock.assert_hits_async(0).await;
    Ok(())
}
