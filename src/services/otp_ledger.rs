use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::auth::{codes_match, generate_otp};
use crate::config::OtpConfig;
use crate::database::models::{MaskedOtp, NewOtpRecord, OtpRecord};
use crate::database::{DatabaseError, OtpStore};
use crate::services::validation::normalize_email;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("Invalid OTP")]
    NotFound,

    #[error("Invalid OTP")]
    Mismatch,

    #[error("OTP already used")]
    AlreadyUsed,

    #[error("OTP expired")]
    Expired,

    #[error("Maximum attempts exceeded")]
    TooManyAttempts,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One-time codes keyed by email. At most one record per email survives an issue.
#[derive(Clone)]
pub struct OtpLedger {
    otps: Arc<dyn OtpStore>,
    config: OtpConfig,
}

impl OtpLedger {
    pub fn new(otps: Arc<dyn OtpStore>, config: OtpConfig) -> Self {
        Self { otps, config }
    }

    /// Replace every record for the email with a fresh code and return the
    /// code for delivery. The email need not belong to a user.
    pub async fn issue_for(&self, email: &str) -> Result<String, OtpError> {
        let code = generate_otp(self.config.length);
        let record = self
            .otps
            .replace_for_email(NewOtpRecord {
                email: normalize_email(email),
                otp: code.clone(),
                expires_at: Utc::now() + Duration::minutes(self.config.ttl_minutes),
                max_attempts: self.config.max_attempts,
            })
            .await?;

        tracing::debug!(otp_id = %record.id, expires_at = %record.expires_at, "Issued OTP");
        Ok(code)
    }

    /// Spend a code. Succeeds at most once per record.
    pub async fn consume(&self, email: &str, candidate: &str) -> Result<(), OtpError> {
        let email = normalize_email(email);
        if self.config.count_failed_attempts {
            self.consume_counting(&email, candidate).await
        } else {
            self.consume_exact(&email, candidate).await
        }
    }

    /// Lookup by (email, code); a wrong code misses without touching any record.
    async fn consume_exact(&self, email: &str, candidate: &str) -> Result<(), OtpError> {
        let record = self
            .otps
            .find_by_email_and_code(email, candidate)
            .await?
            .ok_or(OtpError::NotFound)?;
        self.check_usable(&record)?;
        self.spend(&record).await
    }

    /// Lookup by email, then compare; a wrong code costs one attempt.
    async fn consume_counting(&self, email: &str, candidate: &str) -> Result<(), OtpError> {
        let record = self
            .otps
            .find_latest_for_email(email)
            .await?
            .ok_or(OtpError::NotFound)?;
        self.check_usable(&record)?;

        if !codes_match(&record.otp, candidate) {
            let attempts = self.otps.increment_attempts(record.id).await?;
            tracing::warn!(
                email = %email,
                attempts = attempts.unwrap_or_default(),
                max_attempts = record.max_attempts,
                "OTP mismatch"
            );
            return Err(OtpError::Mismatch);
        }
        self.spend(&record).await
    }

    fn check_usable(&self, record: &OtpRecord) -> Result<(), OtpError> {
        if record.is_used {
            return Err(OtpError::AlreadyUsed);
        }
        if record.is_expired(Utc::now()) {
            return Err(OtpError::Expired);
        }
        if record.attempts_exhausted() {
            return Err(OtpError::TooManyAttempts);
        }
        Ok(())
    }

    async fn spend(&self, record: &OtpRecord) -> Result<(), OtpError> {
        if self.otps.mark_used(record.id, Utc::now()).await? {
            Ok(())
        } else {
            // Lost a race with a concurrent consume or attempt
            Err(OtpError::AlreadyUsed)
        }
    }

    /// Newest records, codes masked, for the admin view.
    pub async fn list_masked(&self, email: Option<&str>, limit: i64) -> Result<Vec<MaskedOtp>, DatabaseError> {
        let email = email.map(normalize_email);
        let records = self.otps.list_recent(email.as_deref(), limit).await?;
        Ok(records.iter().map(OtpRecord::masked).collect())
    }
}
