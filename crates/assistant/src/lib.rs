//! Natural-language questions over the back-office data.
//!
//! The [`Assistant`] asks a local model server to answer a question, pulls
//! any SQL out of the answer, checks that it only reads, runs it with a row
//! cap and logs the exchange to `ai_chat_logs`.

mod client;
mod error;
mod executor;
mod history;
mod prompt;
mod service;
pub mod sql;

pub use client::ModelClient;
pub use error::{AssistantError, AssistantResult};
pub use executor::{run_read_only, QueryResult};
pub use history::{ChatLog, ChatLogRepository, ChatStatus, NewChatLog};
pub use service::{Assistant, AssistantReply};
