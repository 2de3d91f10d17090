//! Authentication and access control for the Feza backend.
//!
//! * [`Authenticator`] drives password login, the emailed one-time code,
//!   bearer sessions and password changes.
//! * [`LockoutPolicy`] is the pure failed-login state machine behind it.
//! * [`AccessControl`] resolves role based permissions.
//! * [`UserAdmin`] covers account administration.

pub mod access;
mod authenticator;
mod error;
pub mod lockout;
pub mod otp;
pub mod password;
mod users;
pub mod validation;

pub use access::{permissions, AccessControl, PermissionSet, RoleDetails, RoleInput, ADMIN_ROLE};
pub use authenticator::{AuthSession, Authenticator, LoginOutcome, OtpChallenge};
pub use error::{AuthError, AuthResult};
pub use lockout::{LockoutPolicy, LockoutState, LockoutStatus};
pub use users::{NewAccount, UserAdmin, UserDetails};

pub(crate) fn seconds(value: u64) -> chrono::Duration {
    // Clamp to a century so date arithmetic cannot overflow.
    const MAX_SECONDS: u64 = 100 * 365 * 86_400;
    chrono::Duration::seconds(value.min(MAX_SECONDS) as i64)
}
