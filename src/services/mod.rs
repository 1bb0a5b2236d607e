pub mod admin_service;
pub mod auth_service;
pub mod credential_store;
pub mod notifier;
pub mod otp_ledger;
pub mod reaper;
pub mod token_ledger;
pub mod validation;

pub use admin_service::{AdminError, AdminService};
pub use auth_service::{AuthError, AuthService};
pub use credential_store::{CredentialError, CredentialStore};
pub use notifier::{Notification, NotificationDispatcher, Notifier};
pub use otp_ledger::{OtpError, OtpLedger};
pub use token_ledger::{TokenError, TokenLedger, TokenPair};
