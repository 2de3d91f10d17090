//! Entity definitions for the shared database layer

pub mod activity;
pub mod email_log;
pub mod login_attempt;
pub mod role;
pub mod session;
pub mod setting;
pub mod user;

pub use activity::{ActivityFilter, ActivityLog, NewActivity};
pub use email_log::{EmailLog, EmailStatus, NewEmailLog};
pub use login_attempt::LoginAttempt;
pub use role::{Permission, Role};
pub use session::Session;
pub use setting::Setting;
pub use user::{NewUser, User, UserProfileUpdate, UserStatus};
