use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::database::models::{NewUser, ProfileUpdate, Role, StoredCredentials, User};
use crate::database::{DatabaseError, UserStore};
use crate::services::validation::{self, FieldError};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<FieldError> for CredentialError {
    fn from(err: FieldError) -> Self {
        CredentialError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<DatabaseError> for CredentialError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::DuplicateKey(_) => CredentialError::DuplicateEmail,
            other => CredentialError::Database(other),
        }
    }
}

/// User records plus password handling. Plain lookups never carry the hash;
/// the `*_credentials` variants are the only way to reach it.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Validate by role, hash the password, persist.
    pub async fn create(&self, mut new_user: NewUser) -> Result<User, CredentialError> {
        new_user.first_name = new_user.first_name.trim().to_string();
        new_user.last_name = new_user.last_name.trim().to_string();
        new_user.email = validation::normalize_email(&new_user.email);

        validation::name("firstName", "First name", &new_user.first_name)?;
        validation::name("lastName", "Last name", &new_user.last_name)?;
        validation::email(&new_user.email)?;
        validation::required("password", "Password is required", &new_user.password)?;
        if new_user.role == Role::Student {
            validation::mobile(new_user.mobile_no.as_deref())?;
            if new_user.gender.is_none() {
                return Err(FieldError::new("gender", "Please select a valid gender").into());
            }
        }

        let hash = hash_password(&new_user.password).map_err(|e| CredentialError::Hashing(e.to_string()))?;
        let user = self.users.insert(&new_user, &hash).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user)
    }

    pub fn verify_password(&self, credentials: &StoredCredentials, candidate: &str) -> bool {
        verify_password(candidate, &credentials.password_hash)
    }

    /// Hash and store a new password. `complete_first_login` clears the
    /// instructor first-login gate in the same write.
    pub async fn set_password(
        &self,
        user_id: Uuid,
        new_password: &str,
        complete_first_login: bool,
    ) -> Result<(), CredentialError> {
        let hash = hash_password(new_password).map_err(|e| CredentialError::Hashing(e.to_string()))?;
        self.users.update_password(user_id, &hash, complete_first_login).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, CredentialError> {
        Ok(self.users.find_by_id(id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, CredentialError> {
        Ok(self.users.find_by_email(&validation::normalize_email(email)).await?)
    }

    pub async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<StoredCredentials>, CredentialError> {
        Ok(self.users.find_credentials_by_id(id).await?)
    }

    pub async fn find_credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, CredentialError> {
        Ok(self
            .users
            .find_credentials_by_email(&validation::normalize_email(email))
            .await?)
    }

    pub async fn update_profile(&self, id: Uuid, profile: &ProfileUpdate) -> Result<User, CredentialError> {
        Ok(self.users.update_profile(id, profile).await?)
    }

    pub async fn touch_last_login(&self, user: &mut User) -> Result<(), CredentialError> {
        let now = chrono::Utc::now();
        self.users.touch_last_login(user.id, now).await?;
        user.last_login = Some(now);
        Ok(())
    }
}
