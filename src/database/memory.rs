use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    Address, Education, Enrollment, EnrollmentStatus, NewEnrollment, NewOtpRecord, NewTokenRecord, NewUser,
    OtpRecord, ProfileUpdate, Role, StoredCredentials, TokenRecord, User, UserFilter, UserPatch,
};
use super::store::{EnrollmentStore, OtpStore, TokenStore, UserStore};

/// In-process store used by tests and by development runs without `DATABASE_URL`.
///
/// Each table sits behind its own lock; every trait method takes the lock once,
/// so conditional updates are atomic in the same way the SQL statements are.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, StoredCredentials>>,
    tokens: RwLock<HashMap<Uuid, TokenRecord>>,
    otps: RwLock<HashMap<Uuid, OtpRecord>>,
    enrollments: RwLock<Vec<Enrollment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<Uuid, StoredCredentials>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|c| Some(c.user.id) != except && c.user.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &NewUser, password_hash: &str) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        if email_taken(&users, &user.email, None) {
            return Err(DatabaseError::DuplicateKey("email".to_string()));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.to_lowercase(),
            mobile_no: user.mobile_no.clone(),
            gender: user.gender,
            role: user.role,
            status: user.status,
            profile_image: None,
            bio: String::new(),
            phone: String::new(),
            address: Address::default(),
            education: Education::default(),
            is_active: user.is_active,
            is_first_login: user.is_first_login,
            requires_password_change: user.requires_password_change,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(
            record.id,
            StoredCredentials {
                user: record.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.get(&id).map(|c| c.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.find_credentials_by_email(email).await?.map(|c| c.user))
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<StoredCredentials>, DatabaseError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, DatabaseError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|c| c.user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        complete_first_login: bool,
    ) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        let creds = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        creds.password_hash = password_hash.to_string();
        if complete_first_login {
            creds.user.is_first_login = false;
            creds.user.requires_password_change = false;
        }
        creds.user.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        if let Some(creds) = self.users.write().await.get_mut(&id) {
            creds.user.last_login = Some(at);
            creds.user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, profile: &ProfileUpdate) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        let creds = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        creds.user.address = profile.address.clone();
        creds.user.education = profile.education.clone();
        creds.user.bio = profile.bio.clone();
        creds.user.updated_at = Utc::now();
        Ok(creds.user.clone())
    }

    async fn update_fields(&self, id: Uuid, patch: &UserPatch) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        if let Some(email) = &patch.email {
            if email_taken(&users, email, Some(id)) {
                return Err(DatabaseError::DuplicateKey("email".to_string()));
            }
        }

        let creds = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        let user = &mut creds.user;
        if let Some(v) = &patch.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &patch.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &patch.email {
            user.email = v.to_lowercase();
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = patch.status {
            user.status = v;
        }
        if let Some(v) = patch.is_active {
            user.is_active = v;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            // Mirrors ON DELETE CASCADE
            self.tokens.write().await.retain(|_, t| t.user_id != id);
            self.enrollments.write().await.retain(|e| e.user_id != id);
        }
        Ok(removed)
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DatabaseError> {
        let users = self.users.read().await;
        let mut matched: Vec<User> = users
            .values()
            .map(|c| &c.user)
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn count(&self, role: Option<Role>, is_active: Option<bool>) -> Result<i64, DatabaseError> {
        let users = self.users.read().await;
        let count = users
            .values()
            .filter(|c| role.map_or(true, |r| c.user.role == r))
            .filter(|c| is_active.map_or(true, |a| c.user.is_active == a))
            .count();
        Ok(count as i64)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, record: NewTokenRecord) -> Result<TokenRecord, DatabaseError> {
        let mut tokens = self.tokens.write().await;
        if tokens
            .values()
            .any(|t| t.refresh_token_hash == record.refresh_token_hash)
        {
            return Err(DatabaseError::DuplicateKey("refresh token".to_string()));
        }
        let now = Utc::now();
        let stored = TokenRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            access_token_hash: record.access_token_hash,
            refresh_token_hash: record.refresh_token_hash,
            expires_at: record.expires_at,
            is_revoked: false,
            created_at: now,
            updated_at: now,
        };
        tokens.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_live_by_refresh(
        &self,
        refresh_token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .values()
            .find(|t| t.refresh_token_hash == refresh_token_hash && t.is_live(now))
            .cloned())
    }

    async fn find_live_by_access(
        &self,
        access_token_hash: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .values()
            .find(|t| t.access_token_hash == access_token_hash && t.user_id == user_id && t.is_live(now))
            .cloned())
    }

    async fn replace_pair(
        &self,
        old_refresh_hash: &str,
        new_access_hash: &str,
        new_refresh_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError> {
        let mut tokens = self.tokens.write().await;
        let Some(record) = tokens
            .values_mut()
            .find(|t| t.refresh_token_hash == old_refresh_hash && t.is_live(now))
        else {
            return Ok(None);
        };
        record.access_token_hash = new_access_hash.to_string();
        record.refresh_token_hash = new_refresh_hash.to_string();
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    async fn revoke_by_refresh(&self, refresh_token_hash: &str) -> Result<bool, DatabaseError> {
        let mut tokens = self.tokens.write().await;
        match tokens
            .values_mut()
            .find(|t| t.refresh_token_hash == refresh_token_hash && !t.is_revoked)
        {
            Some(record) => {
                record.is_revoked = true;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn replace_for_email(&self, record: NewOtpRecord) -> Result<OtpRecord, DatabaseError> {
        let email = record.email.to_lowercase();
        let mut otps = self.otps.write().await;
        otps.retain(|_, o| o.email != email);

        let stored = OtpRecord {
            id: Uuid::new_v4(),
            email,
            otp: record.otp,
            expires_at: record.expires_at,
            attempts: 0,
            max_attempts: record.max_attempts,
            is_used: false,
            created_at: Utc::now(),
        };
        otps.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_latest_for_email(&self, email: &str) -> Result<Option<OtpRecord>, DatabaseError> {
        let email = email.to_lowercase();
        let otps = self.otps.read().await;
        Ok(otps
            .values()
            .filter(|o| o.email == email)
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn find_by_email_and_code(&self, email: &str, code: &str) -> Result<Option<OtpRecord>, DatabaseError> {
        let email = email.to_lowercase();
        let otps = self.otps.read().await;
        Ok(otps
            .values()
            .filter(|o| o.email == email && o.otp == code)
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let mut otps = self.otps.write().await;
        match otps.get_mut(&id) {
            Some(o) if !o.is_used && !o.attempts_exhausted() && !o.is_expired(now) => {
                o.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_attempts(&self, id: Uuid) -> Result<Option<i32>, DatabaseError> {
        let mut otps = self.otps.write().await;
        Ok(otps.get_mut(&id).map(|o| {
            o.attempts += 1;
            o.attempts
        }))
    }

    async fn list_recent(&self, email: Option<&str>, limit: i64) -> Result<Vec<OtpRecord>, DatabaseError> {
        let email = email.map(str::to_lowercase);
        let otps = self.otps.read().await;
        let mut matched: Vec<OtpRecord> = otps
            .values()
            .filter(|o| email.as_deref().map_or(true, |e| o.email == e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut otps = self.otps.write().await;
        let before = otps.len();
        otps.retain(|_, o| o.expires_at > now);
        Ok((before - otps.len()) as u64)
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<Enrollment, DatabaseError> {
        let now = Utc::now();
        let stored = Enrollment {
            id: Uuid::new_v4(),
            user_id: enrollment.user_id,
            progress: Vec::new(),
            purchased_at: now,
            order_id: enrollment.order_id,
            payment_id: enrollment.payment_id,
            status: EnrollmentStatus::Active,
            created_at: now,
        };
        self.enrollments.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>, DatabaseError> {
        let enrollments = self.enrollments.read().await;
        let mut matched: Vec<Enrollment> = enrollments.iter().filter(|e| e.user_id == user_id).cloned().collect();
        matched.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Gender;
    use chrono::Duration;

    fn alice() -> NewUser {
        NewUser::student("Alice", "Smith", "Alice@X.com", "Secret1", "9876543210", Gender::Female)
    }

    #[tokio::test]
    async fn email_uniqueness_is_case_insensitive() {
        let store = MemoryStore::new();
        let user = UserStore::insert(&store, &alice(), "hash").await.unwrap();
        assert_eq!(user.email, "alice@x.com");

        let mut dup = alice();
        dup.email = "ALICE@x.com".to_string();
        assert!(matches!(
            UserStore::insert(&store, &dup, "hash").await,
            Err(DatabaseError::DuplicateKey(_))
        ));
        assert!(store.find_by_email("aLiCe@x.COM").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replace_pair_is_single_use() {
        let store = MemoryStore::new();
        let now = Utc::now();
        TokenStore::insert(
            &store,
            NewTokenRecord {
                user_id: Uuid::new_v4(),
                access_token_hash: "a1".to_string(),
                refresh_token_hash: "r1".to_string(),
                expires_at: now + Duration::days(7),
            },
        )
        .await
        .unwrap();

        assert!(store.replace_pair("r1", "a2", "r2", now).await.unwrap().is_some());
        assert!(store.replace_pair("r1", "a3", "r3", now).await.unwrap().is_none());
        assert!(store.find_live_by_refresh("r2", now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mark_used_is_test_and_set() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let otp = store
            .replace_for_email(NewOtpRecord {
                email: "bob@x.com".to_string(),
                otp: "123456".to_string(),
                expires_at: now + Duration::minutes(10),
                max_attempts: 5,
            })
            .await
            .unwrap();

        assert!(store.mark_used(otp.id, now).await.unwrap());
        assert!(!store.mark_used(otp.id, now).await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_records() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (email, offset) in [("old@x.com", -1), ("new@x.com", 10)] {
            store
                .replace_for_email(NewOtpRecord {
                    email: email.to_string(),
                    otp: "000000".to_string(),
                    expires_at: now + Duration::minutes(offset),
                    max_attempts: 5,
                })
                .await
                .unwrap();
        }
        assert_eq!(OtpStore::purge_expired(&store, now).await.unwrap(), 1);
        assert_eq!(store.list_recent(None, 50).await.unwrap().len(), 1);
    }
}
