//! Repositories for the shared tables

pub mod activity_repository;
pub mod email_log_repository;
pub mod login_attempt_repository;
pub mod role_repository;
pub mod session_repository;
pub mod settings_repository;
pub mod user_repository;

pub use activity_repository::ActivityRepository;
pub use email_log_repository::EmailLogRepository;
pub use login_attempt_repository::LoginAttemptRepository;
pub use role_repository::RoleRepository;
pub use session_repository::SessionRepository;
pub use settings_repository::SettingsRepository;
pub use user_repository::UserRepository;
