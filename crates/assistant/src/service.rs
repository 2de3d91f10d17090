use std::time::Instant;

use chrono::Utc;
use feza_config::AssistantConfig;
use feza_database::{Page, Paginated};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::client::ModelClient;
use crate::executor::{run_read_only, QueryResult};
use crate::history::{ChatLog, ChatLogRepository, ChatStatus, NewChatLog};
use crate::sql::{extract_sql, guard};
use crate::{prompt, AssistantError, AssistantResult};

/// What the assistant made of a question
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub status: ChatStatus,
    pub answer: String,
    pub sql: Option<String>,
    pub result: Option<QueryResult>,
    /// Why the guard refused the generated SQL.
    pub blocked_reason: Option<String>,
}

#[derive(Clone)]
pub struct Assistant {
    pool: SqlitePool,
    client: ModelClient,
    logs: ChatLogRepository,
    max_rows: u32,
}

impl Assistant {
    pub fn new(pool: SqlitePool, config: &AssistantConfig) -> AssistantResult<Self> {
        Ok(Self {
            client: ModelClient::new(config)?,
            logs: ChatLogRepository::new(pool.clone()),
            max_rows: config.max_rows,
            pool,
        })
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Answer a question, running the generated query when it is read-only.
    pub async fn ask(&self, user_id: i64, question: &str) -> AssistantResult<AssistantReply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::Validation("question is required".into()));
        }
        let started = Instant::now();
        let mut log = NewChatLog {
            user_id: Some(user_id),
            prompt: question.to_string(),
            response: None,
            generated_sql: None,
            row_count: None,
            status: ChatStatus::Failed,
            error: None,
            duration_ms: 0,
        };

        let answer = match self
            .client
            .generate(&prompt::build(question, Utc::now().date_naive()))
            .await
        {
            Ok(answer) => answer,
            Err(error) => {
                log.error = Some(error.to_string());
                self.finish(log, started).await;
                return Err(error);
            }
        };
        log.response = Some(answer.clone());

        let mut reply = AssistantReply {
            status: ChatStatus::Answered,
            answer,
            sql: None,
            result: None,
            blocked_reason: None,
        };

        let Some(sql) = extract_sql(&reply.answer) else {
            log.status = ChatStatus::Answered;
            self.finish(log, started).await;
            return Ok(reply);
        };
        log.generated_sql = Some(sql.clone());
        reply.sql = Some(sql.clone());

        let statement = match guard(&sql) {
            Ok(statement) => statement,
            Err(reason) => return Ok(self.block(user_id, log, reply, reason, started).await),
        };

        match run_read_only(&self.pool, &statement, self.max_rows).await {
            Ok(result) => {
                log.status = ChatStatus::Executed;
                log.row_count = Some(result.rows.len() as i64);
                self.finish(log, started).await;
                info!(user = user_id, rows = result.rows.len(), "assistant query answered");
                reply.status = ChatStatus::Executed;
                reply.result = Some(result);
                Ok(reply)
            }
            Err(AssistantError::Blocked(reason)) => {
                Ok(self.block(user_id, log, reply, reason, started).await)
            }
            Err(error) => {
                log.error = Some(error.to_string());
                self.finish(log, started).await;
                Err(error)
            }
        }
    }

    pub async fn history(&self, user_id: i64, page: Page) -> AssistantResult<Paginated<ChatLog>> {
        Ok(self.logs.for_user(user_id, page).await?)
    }

    async fn block(
        &self,
        user_id: i64,
        mut log: NewChatLog,
        mut reply: AssistantReply,
        reason: String,
        started: Instant,
    ) -> AssistantReply {
        warn!(user = user_id, %reason, "assistant query blocked");
        log.status = ChatStatus::Blocked;
        log.error = Some(reason.clone());
        self.finish(log, started).await;
        reply.status = ChatStatus::Blocked;
        reply.blocked_reason = Some(reason);
        reply
    }

    /// Write the exchange to the log; a failed write does not fail the reply.
    async fn finish(&self, mut log: NewChatLog, started: Instant) {
        log.duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        if let Err(error) = self.logs.record(&log).await {
            warn!(%error, "failed to record assistant exchange");
        }
    }
}
