use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    Address, Education, Enrollment, EnrollmentStatus, Gender, NewEnrollment, NewOtpRecord, NewTokenRecord,
    NewUser, OtpRecord, ProfileUpdate, ProgressItem, Role, StoredCredentials, TokenRecord, User, UserFilter,
    UserPatch, UserStatus,
};
use super::store::{EnrollmentStore, OtpStore, TokenStore, UserStore};

const USER_COLUMNS: &str = "id, first_name, last_name, email, mobile_no, gender, role, status, profile_image, \
     bio, phone, address, education, is_active, is_first_login, requires_password_change, last_login, \
     created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, user_id, access_token_hash, refresh_token_hash, expires_at, is_revoked, created_at, updated_at";

const OTP_COLUMNS: &str = "id, email, otp, expires_at, attempts, max_attempts, is_used, created_at";

const ENROLLMENT_COLUMNS: &str = "id, user_id, progress, purchased_at, order_id, payment_id, status, created_at";

/// Postgres-backed implementation of every store trait
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_err(column: &str, detail: String) -> DatabaseError {
    DatabaseError::Sqlx(sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: detail.into(),
    })
}

fn user_from_row(row: &PgRow) -> Result<User, DatabaseError> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;
    let gender: Option<String> = row.try_get("gender")?;
    let address: Json<Address> = row.try_get("address")?;
    let education: Json<Education> = row.try_get("education")?;

    Ok(User {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        mobile_no: row.try_get("mobile_no")?,
        gender: gender
            .map(|g| g.parse::<Gender>())
            .transpose()
            .map_err(|e| decode_err("gender", e))?,
        role: role.parse::<Role>().map_err(|e| decode_err("role", e))?,
        status: status.parse::<UserStatus>().map_err(|e| decode_err("status", e))?,
        profile_image: row.try_get("profile_image")?,
        bio: row.try_get("bio")?,
        phone: row.try_get("phone")?,
        address: address.0,
        education: education.0,
        is_active: row.try_get("is_active")?,
        is_first_login: row.try_get("is_first_login")?,
        requires_password_change: row.try_get("requires_password_change")?,
        last_login: row.try_get("last_login")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn credentials_from_row(row: &PgRow) -> Result<StoredCredentials, DatabaseError> {
    Ok(StoredCredentials {
        user: user_from_row(row)?,
        password_hash: row.try_get("password_hash")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<TokenRecord, DatabaseError> {
    Ok(TokenRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        access_token_hash: row.try_get("access_token_hash")?,
        refresh_token_hash: row.try_get("refresh_token_hash")?,
        expires_at: row.try_get("expires_at")?,
        is_revoked: row.try_get("is_revoked")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn otp_from_row(row: &PgRow) -> Result<OtpRecord, DatabaseError> {
    Ok(OtpRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        otp: row.try_get("otp")?,
        expires_at: row.try_get("expires_at")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        is_used: row.try_get("is_used")?,
        created_at: row.try_get("created_at")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment, DatabaseError> {
    let progress: Json<Vec<ProgressItem>> = row.try_get("progress")?;
    let status: String = row.try_get("status")?;
    Ok(Enrollment {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        progress: progress.0,
        purchased_at: row.try_get("purchased_at")?,
        order_id: row.try_get("order_id")?,
        payment_id: row.try_get("payment_id")?,
        status: EnrollmentStatus::parse(&status)
            .ok_or_else(|| decode_err("status", format!("unknown enrollment status '{}'", status)))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: &NewUser, password_hash: &str) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, mobile_no, gender, role, status, \
             is_active, is_first_login, requires_password_change) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.email.to_lowercase())
            .bind(password_hash)
            .bind(&user.mobile_no)
            .bind(user.gender.map(|g| g.as_str()))
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(user.is_active)
            .bind(user.is_first_login)
            .bind(user.requires_password_change)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "email"))?;
        user_from_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<StoredCredentials>, DatabaseError> {
        let sql = format!("SELECT {}, password_hash FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(credentials_from_row).transpose()
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, DatabaseError> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(credentials_from_row).transpose()
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        complete_first_login: bool,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, \
             is_first_login = CASE WHEN $3 THEN false ELSE is_first_login END, \
             requires_password_change = CASE WHEN $3 THEN false ELSE requires_password_change END, \
             updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(complete_first_login)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET last_login = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, profile: &ProfileUpdate) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET address = $2, education = $3, bio = $4, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Json(&profile.address))
            .bind(Json(&profile.education))
            .bind(&profile.bio)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        user_from_row(&row)
    }

    async fn update_fields(&self, id: Uuid, patch: &UserPatch) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET \
             first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), \
             email = COALESCE($4, email), \
             role = COALESCE($5, role), \
             status = COALESCE($6, status), \
             is_active = COALESCE($7, is_active), \
             updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&patch.first_name)
            .bind(&patch.last_name)
            .bind(patch.email.as_ref().map(|e| e.to_lowercase()))
            .bind(patch.role.map(|r| r.as_str()))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "email"))?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        user_from_row(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DatabaseError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let sql = format!(
            "SELECT {} FROM users \
             WHERE ($1::text IS NULL OR role = $1) \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::text IS NULL OR first_name ILIKE $3 OR last_name ILIKE $3 OR email ILIKE $3) \
             ORDER BY created_at DESC",
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.role.map(|r| r.as_str()))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(search)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn count(&self, role: Option<Role>, is_active: Option<bool>) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE ($1::text IS NULL OR role = $1) AND ($2::boolean IS NULL OR is_active = $2)",
        )
        .bind(role.map(|r| r.as_str()))
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        super::manager::DatabaseManager::health_check(&self.pool).await
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, record: NewTokenRecord) -> Result<TokenRecord, DatabaseError> {
        let sql = format!(
            "INSERT INTO tokens (id, user_id, access_token_hash, refresh_token_hash, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TOKEN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(record.user_id)
            .bind(&record.access_token_hash)
            .bind(&record.refresh_token_hash)
            .bind(record.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "refresh token"))?;
        token_from_row(&row)
    }

    async fn find_live_by_refresh(
        &self,
        refresh_token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM tokens \
             WHERE refresh_token_hash = $1 AND is_revoked = false AND expires_at > $2",
            TOKEN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(refresh_token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn find_live_by_access(
        &self,
        access_token_hash: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM tokens \
             WHERE access_token_hash = $1 AND user_id = $2 AND is_revoked = false AND expires_at > $3",
            TOKEN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(access_token_hash)
            .bind(user_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn replace_pair(
        &self,
        old_refresh_hash: &str,
        new_access_hash: &str,
        new_refresh_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, DatabaseError> {
        // Single conditional UPDATE: of two racing rotations only one matches the old hash
        let sql = format!(
            "UPDATE tokens SET access_token_hash = $2, refresh_token_hash = $3, updated_at = $4 \
             WHERE refresh_token_hash = $1 AND is_revoked = false AND expires_at > $4 \
             RETURNING {}",
            TOKEN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(old_refresh_hash)
            .bind(new_access_hash)
            .bind(new_refresh_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn revoke_by_refresh(&self, refresh_token_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE tokens SET is_revoked = true, updated_at = now() \
             WHERE refresh_token_hash = $1 AND is_revoked = false",
        )
        .bind(refresh_token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn replace_for_email(&self, record: NewOtpRecord) -> Result<OtpRecord, DatabaseError> {
        let email = record.email.to_lowercase();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM otps WHERE email = $1")
            .bind(&email)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO otps (id, email, otp, expires_at, max_attempts) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            OTP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(&record.otp)
            .bind(record.expires_at)
            .bind(record.max_attempts)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        otp_from_row(&row)
    }

    async fn find_latest_for_email(&self, email: &str) -> Result<Option<OtpRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM otps WHERE email = lower($1) ORDER BY created_at DESC LIMIT 1",
            OTP_COLUMNS
        );
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(otp_from_row).transpose()
    }

    async fn find_by_email_and_code(&self, email: &str, code: &str) -> Result<Option<OtpRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM otps WHERE email = lower($1) AND otp = $2 \
             ORDER BY created_at DESC LIMIT 1",
            OTP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(email)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(otp_from_row).transpose()
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE otps SET is_used = true \
             WHERE id = $1 AND is_used = false AND attempts < max_attempts AND expires_at > $2",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn increment_attempts(&self, id: Uuid) -> Result<Option<i32>, DatabaseError> {
        let attempts: Option<i32> =
            sqlx::query_scalar("UPDATE otps SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(attempts)
    }

    async fn list_recent(&self, email: Option<&str>, limit: i64) -> Result<Vec<OtpRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM otps WHERE ($1::text IS NULL OR email = lower($1)) \
             ORDER BY created_at DESC LIMIT $2",
            OTP_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(email)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(otp_from_row).collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM otps WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<Enrollment, DatabaseError> {
        let sql = format!(
            "INSERT INTO enrollments (id, user_id, order_id, payment_id) VALUES ($1, $2, $3, $4) RETURNING {}",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(enrollment.user_id)
            .bind(&enrollment.order_id)
            .bind(&enrollment.payment_id)
            .fetch_one(&self.pool)
            .await?;
        enrollment_from_row(&row)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE user_id = $1 ORDER BY purchased_at DESC",
            ENROLLMENT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(enrollment_from_row).collect()
    }
}
