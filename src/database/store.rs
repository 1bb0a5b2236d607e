use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::memory::MemoryStore;
use super::models::{
    Enrollment, NewEnrollment, NewOtpRecord, NewTokenRecord, NewUser, OtpRecord, ProfileUpdate, Role,
    StoredCredentials, TokenRecord, User, UserFilter, UserPatch,
};
use super::postgres::PgStore;

/// Persisted user records. Emails are matched case-insensitively.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `DuplicateKey("email")` when the email is taken.
    async fn insert(&self, user: &NewUser, password_hash: &str) -> Result<User, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<StoredCredentials>, DatabaseError>;

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, DatabaseError>;

    /// Replace the password hash. `complete_first_login` also clears the
    /// first-login and forced-change flags.
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        complete_first_login: bool,
    ) -> Result<(), DatabaseError>;

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError>;

    async fn update_profile(&self, id: Uuid, profile: &ProfileUpdate) -> Result<User, DatabaseError>;

    async fn update_fields(&self, id: Uuid, patch: &UserPatch) -> Result<User, DatabaseError>;

    /// Returns false when no such user exists.
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Matching users, newest first.
    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DatabaseError>;

    async fn count(&self, role: Option<Role>, is_active: Option<bool>) -> Result<i64, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

/// The token ledger's persistence. Lookups ignore revoked and expired records.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: NewTokenRecord) -> Result<TokenRecord, DatabaseError>;

    async fn find_live_by_refresh(
        &self,
        refresh_token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError>;

    async fn find_live_by_access(
        &self,
        access_token_hash: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError>;

    /// Atomically swap the pair on the live record currently holding
    /// `old_refresh_hash`. Returns `None` when another caller got there first.
    async fn replace_pair(
        &self,
        old_refresh_hash: &str,
        new_access_hash: &str,
        new_refresh_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError>;

    /// Returns whether a record was newly revoked.
    async fn revoke_by_refresh(&self, refresh_token_hash: &str) -> Result<bool, DatabaseError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

/// The OTP ledger's persistence.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Delete every record for the email, then insert the new one.
    async fn replace_for_email(&self, record: NewOtpRecord) -> Result<OtpRecord, DatabaseError>;

    /// Most recently issued record for the email, whatever its state.
    async fn find_latest_for_email(&self, email: &str) -> Result<Option<OtpRecord>, DatabaseError>;

    async fn find_by_email_and_code(&self, email: &str, code: &str) -> Result<Option<OtpRecord>, DatabaseError>;

    /// Test-and-set of `is_used`; only succeeds while unused, unexpired and
    /// under the attempt limit.
    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError>;

    /// Returns the new attempt count, or `None` if the record is gone.
    async fn increment_attempts(&self, id: Uuid) -> Result<Option<i32>, DatabaseError>;

    async fn list_recent(&self, email: Option<&str>, limit: i64) -> Result<Vec<OtpRecord>, DatabaseError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<Enrollment, DatabaseError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>, DatabaseError>;
}

/// Handles to every store, shared across services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub otps: Arc<dyn OtpStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
}

impl Stores {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            tokens: store.clone(),
            otps: store.clone(),
            enrollments: store,
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            tokens: store.clone(),
            otps: store.clone(),
            enrollments: store,
        }
    }
}
