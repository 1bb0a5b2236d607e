use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: Uuid,
    pub email: String,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Admin read-path view: only a two-character prefix of the code survives.
    pub fn masked(&self) -> MaskedOtp {
        let prefix: String = self.otp.chars().take(2).collect();
        MaskedOtp {
            id: self.id,
            email: self.email.clone(),
            otp_masked: format!("{}****", prefix),
            expires_at: self.expires_at,
            is_used: self.is_used,
            attempts: self.attempts,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOtpRecord {
    pub email: String,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    pub max_attempts: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedOtp {
    pub id: Uuid,
    pub email: String,
    pub otp_masked: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_keeps_only_a_prefix() {
        let now = Utc::now();
        let record = OtpRecord {
            id: Uuid::new_v4(),
            email: "alice@x.com".to_string(),
            otp: "482913".to_string(),
            expires_at: now,
            attempts: 0,
            max_attempts: 5,
            is_used: false,
            created_at: now,
        };
        let masked = record.masked();
        assert_eq!(masked.otp_masked, "48****");
        let json = serde_json::to_value(&masked).unwrap();
        assert!(json.get("otp").is_none());
        assert_eq!(json["otpMasked"], "48****");
    }
}
