//! Feza Database Crate
//!
//! Connection management, migrations and the repositories shared by every
//! module: identity (users, roles, sessions, login attempts), the activity
//! log, business settings and the email log. Domain crates (billing, petty
//! cash, assistant) own their own repositories on top of the same pool.

use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{
    ActivityRepository, EmailLogRepository, LoginAttemptRepository, RoleRepository,
    SessionRepository, SettingsRepository, UserRepository,
};

pub use entities::{
    activity::{ActivityFilter, ActivityLog, NewActivity},
    email_log::{EmailLog, EmailStatus, NewEmailLog},
    login_attempt::LoginAttempt,
    role::{Permission, Role},
    session::Session,
    setting::Setting,
    user::{NewUser, User, UserProfileUpdate, UserStatus},
};

pub use types::{
    errors::DatabaseError, format_timestamp, new_public_id, now_rfc3339, parse_timestamp,
    round_money, DatabaseResult, Page, Paginated,
};

pub use sqlx::SqlitePool as Pool;

/// Connect to the configured database and bring its schema up to date.
pub async fn initialize_database(
    config: &feza_config::DatabaseConfig,
) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::Connection(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("{e:#}")))?;

    Ok(pool)
}
