use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{generate_temporary_password, Capability};
use crate::database::models::{Address, Education, NewUser, ProfileUpdate, Role, User, UserStatus};
use crate::database::DatabaseError;
use crate::services::credential_store::{CredentialError, CredentialStore};
use crate::services::notifier::{Notification, NotificationDispatcher};
use crate::services::otp_ledger::{OtpError, OtpLedger};
use crate::services::token_ledger::{TokenError, TokenLedger, TokenPair};
use crate::services::validation::{self, FieldError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Passwords do not match")]
    PasswordsMismatch,

    #[error("New password must be different from current password")]
    SamePassword,

    #[error("{0}")]
    Forbidden(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account has been deactivated")]
    Deactivated,

    #[error("Your account is {0}. Please wait for admin approval.")]
    NotApproved(UserStatus),

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("Refresh token required")]
    MissingRefreshToken,
}

impl From<FieldError> for AuthError {
    fn from(err: FieldError) -> Self {
        AuthError::Credential(err.into())
    }
}

/// Self-service student registration
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_no: Option<String>,
    pub gender: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

/// Exactly one of `password` or `otp` selects the verification path.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileInput {
    pub address: Option<Address>,
    pub education: Option<Education>,
    pub bio: Option<String>,
}

impl From<ProfileInput> for ProfileUpdate {
    fn from(input: ProfileInput) -> Self {
        ProfileUpdate {
            address: input.address.unwrap_or_default(),
            education: input.education.unwrap_or_default(),
            bio: input.bio.unwrap_or_default(),
        }
    }
}

/// A freshly authenticated session, as returned to the client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_password_change: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_first_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_password_reset: Option<bool>,
}

impl AuthSession {
    fn new(tokens: TokenPair, user: User) -> Self {
        Self {
            tokens,
            user,
            requires_password_change: None,
            is_first_login: None,
            requires_password_reset: None,
        }
    }
}

/// How a login proved identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginPath {
    Password,
    Otp,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn require_role(role: Role, capability: Capability) -> Result<(), AuthError> {
    if role.allows(capability) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(capability.denial_message().to_string()))
    }
}

/// Validate a chosen password and its confirmation
fn check_new_password(new_password: &str, confirm_password: &str) -> Result<(), AuthError> {
    validation::password("newPassword", new_password)?;
    validation::required("confirmPassword", "Confirm password is required", confirm_password)?;
    if new_password != confirm_password {
        return Err(AuthError::PasswordsMismatch);
    }
    Ok(())
}

/// Ties credentials, sessions and one-time codes together
#[derive(Clone)]
pub struct AuthService {
    credentials: CredentialStore,
    tokens: TokenLedger,
    otps: OtpLedger,
    notifications: NotificationDispatcher,
}

impl AuthService {
    pub fn new(
        credentials: CredentialStore,
        tokens: TokenLedger,
        otps: OtpLedger,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            credentials,
            tokens,
            otps,
            notifications,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn otps(&self) -> &OtpLedger {
        &self.otps
    }

    pub async fn signup_student(&self, input: SignupInput) -> Result<AuthSession, AuthError> {
        validation::name("firstName", "First name", &input.first_name)?;
        validation::name("lastName", "Last name", &input.last_name)?;
        validation::email(&input.email)?;
        validation::mobile(input.mobile_no.as_deref())?;
        let gender = validation::gender(input.gender.as_deref())?;
        validation::password("password", &input.password)?;
        validation::required("confirmPassword", "Confirm password is required", &input.confirm_password)?;
        if input.password != input.confirm_password {
            return Err(AuthError::PasswordsMismatch);
        }

        let user = self
            .credentials
            .create(NewUser::student(
                input.first_name,
                input.last_name,
                input.email,
                input.password,
                input.mobile_no.unwrap_or_default(),
                gender,
            ))
            .await?;

        self.notifications.dispatch(Notification::Welcome {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        });

        let tokens = self.tokens.issue(user.id, user.role).await?;
        Ok(AuthSession::new(tokens, user))
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        validation::email(&input.email)?;
        let password = non_empty(input.password);
        let otp = non_empty(input.otp);
        if password.is_none() && otp.is_none() {
            return Err(FieldError::new("password", "Password or OTP is required").into());
        }

        let Some(credentials) = self.credentials.find_credentials_by_email(&input.email).await? else {
            tracing::warn!(email = %validation::normalize_email(&input.email), "Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let mut user = credentials.user.clone();

        if !user.is_active {
            return Err(AuthError::Deactivated);
        }
        if user.role == Role::Instructor && user.status != UserStatus::Approved {
            return Err(AuthError::NotApproved(user.status));
        }

        let path = match (otp, password) {
            (Some(code), _) => {
                self.otps.consume(&user.email, &code).await?;
                LoginPath::Otp
            }
            (None, Some(password)) => {
                if !self.credentials.verify_password(&credentials, &password) {
                    tracing::warn!(user_id = %user.id, "Login with wrong password");
                    return Err(AuthError::InvalidCredentials);
                }
                LoginPath::Password
            }
            (None, None) => return Err(FieldError::new("password", "Password or OTP is required").into()),
        };

        let first_login_gate = path == LoginPath::Password
            && user.role == Role::Instructor
            && user.is_first_login
            && user.requires_password_change;

        if first_login_gate {
            // Session is issued, but the client must complete set-password first
            let tokens = self.tokens.issue(user.id, user.role).await?;
            tracing::info!(user_id = %user.id, "Instructor first login, password change required");
            return Ok(AuthSession {
                requires_password_change: Some(true),
                is_first_login: Some(true),
                ..AuthSession::new(tokens, user)
            });
        }

        self.credentials.touch_last_login(&mut user).await?;
        let tokens = self.tokens.issue(user.id, user.role).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(AuthSession {
            requires_password_change: Some(false),
            is_first_login: Some(false),
            ..AuthSession::new(tokens, user)
        })
    }

    /// Issue a recovery code. The outcome is identical whether or not the
    /// email belongs to an account; only the email send differs.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        validation::required("email", "Email is required", email.trim())?;
        validation::email(email)?;
        let email = validation::normalize_email(email);

        let code = self.otps.issue_for(&email).await?;
        match self.credentials.find_by_email(&email).await? {
            Some(user) => {
                self.notifications.dispatch(Notification::Otp {
                    email: user.email,
                    otp: code,
                });
            }
            None => tracing::debug!("Forgot-password for unregistered email, no OTP sent"),
        }
        Ok(())
    }

    /// Recovery login. The session is flagged so the client prompts for a new password.
    pub async fn verify_otp_login(&self, email: &str, otp: &str) -> Result<AuthSession, AuthError> {
        validation::required("email", "Email is required", email.trim())?;
        validation::required("otp", "OTP is required", otp)?;

        self.otps.consume(email, otp).await?;

        let mut user = self
            .credentials
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active {
            return Err(AuthError::Deactivated);
        }

        self.credentials.touch_last_login(&mut user).await?;
        let tokens = self.tokens.issue(user.id, user.role).await?;
        tracing::info!(user_id = %user.id, "User logged in with recovery OTP");
        Ok(AuthSession {
            requires_password_reset: Some(true),
            ..AuthSession::new(tokens, user)
        })
    }

    /// First-login completion for instructors
    pub async fn set_instructor_password(
        &self,
        user_id: Uuid,
        role: Role,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        require_role(role, Capability::SetInstructorPassword)?;
        check_new_password(new_password, confirm_password)?;

        self.credentials
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.credentials.set_password(user_id, new_password, true).await?;

        tracing::info!(user_id = %user_id, "Instructor set initial password");
        Ok(())
    }

    /// Password change for a signed-in user who knows the current password
    pub async fn reset_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        validation::required("currentPassword", "Current password is required", current_password)?;
        check_new_password(new_password, confirm_password)?;
        if current_password == new_password {
            return Err(AuthError::SamePassword);
        }

        let credentials = self
            .credentials
            .find_credentials_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !self.credentials.verify_password(&credentials, current_password) {
            tracing::warn!(user_id = %user_id, "Password reset with wrong current password");
            return Err(AuthError::WrongCurrentPassword);
        }
        if !credentials.user.is_active {
            return Err(AuthError::Deactivated);
        }

        self.credentials.set_password(user_id, new_password, false).await?;
        tracing::info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    /// Password change after OTP recovery; identity was already proven by the code.
    pub async fn reset_password_after_otp(
        &self,
        user_id: Uuid,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        check_new_password(new_password, confirm_password)?;

        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active {
            return Err(AuthError::Deactivated);
        }

        self.credentials.set_password(user_id, new_password, false).await?;
        tracing::info!(user_id = %user_id, "Password reset after OTP recovery");
        Ok(())
    }

    /// Admin-provisioned instructor. The temporary password only leaves by email.
    pub async fn create_instructor(
        &self,
        acting_role: Role,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<User, AuthError> {
        require_role(acting_role, Capability::ProvisionInstructors)?;

        let temporary_password = generate_temporary_password();
        let user = self
            .credentials
            .create(NewUser::provisioned_instructor(
                first_name,
                last_name,
                email,
                temporary_password.clone(),
            ))
            .await?;

        self.notifications.dispatch(Notification::InstructorPassword {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            temporary_password,
        });
        Ok(user)
    }

    /// Best-effort revocation of the presented session
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            self.tokens.revoke(token).await?;
        }
        Ok(())
    }

    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenPair, AuthError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;
        Ok(self.tokens.rotate(token).await?)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.credentials
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn complete_profile(&self, user_id: Uuid, input: ProfileInput) -> Result<User, AuthError> {
        match self.credentials.update_profile(user_id, &input.into()).await {
            Ok(user) => Ok(user),
            Err(CredentialError::Database(DatabaseError::NotFound(_))) => Err(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKeys;
    use crate::config::AppConfig;
    use crate::database::Stores;
    use crate::services::notifier::Notifier;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send_welcome(&self, email: &str, _: &str, _: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(("welcome".into(), email.into()));
            Ok(())
        }

        async fn send_instructor_password(&self, email: &str, _: &str, password: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(("instructor".into(), format!("{}:{}", email, password)));
            Ok(())
        }

        async fn send_otp(&self, email: &str, otp: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(("otp".into(), format!("{}:{}", email, otp)));
            Ok(())
        }
    }

    impl Recorder {
        async fn wait_for(&self, kind: &str) -> Option<String> {
            for _ in 0..100 {
                if let Some((_, v)) = self.sent.lock().unwrap().iter().find(|(k, _)| k == kind) {
                    return Some(v.clone());
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            None
        }
    }

    fn service() -> (AuthService, Arc<Recorder>, Stores) {
        let config = AppConfig::development();
        let stores = Stores::memory();
        let recorder = Arc::new(Recorder::default());
        let keys = Arc::new(TokenKeys::from_config(&config.security));
        let service = AuthService::new(
            CredentialStore::new(stores.users.clone()),
            TokenLedger::new(keys, stores.tokens.clone(), stores.users.clone(), Duration::days(7)),
            OtpLedger::new(stores.otps.clone(), config.otp.clone()),
            NotificationDispatcher::new(recorder.clone(), 0, std::time::Duration::from_millis(1)),
        );
        (service, recorder, stores)
    }

    fn alice() -> SignupInput {
        SignupInput {
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            email: "alice@x.com".into(),
            mobile_no: Some("9876543210".into()),
            gender: Some("female".into()),
            password: "Secret1".into(),
            confirm_password: "Secret1".into(),
        }
    }

    fn password_login(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: Some(password.into()),
            otp: None,
        }
    }

    #[tokio::test]
    async fn signup_then_login() {
        let (service, recorder, _) = service();
        let session = service.signup_student(alice()).await.unwrap();
        assert_eq!(session.user.role, Role::Student);
        assert!(recorder.wait_for("welcome").await.is_some());

        let session = service.login(password_login("ALICE@x.com", "Secret1")).await.unwrap();
        assert_eq!(session.requires_password_change, Some(false));
        assert!(session.user.last_login.is_some());

        let json = serde_json::to_value(&session).unwrap();
        assert!(json["accessToken"].is_string());
        assert!(json["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn signup_rejects_mismatch_and_duplicates() {
        let (service, _, _) = service();
        let mut input = alice();
        input.confirm_password = "Secret2".into();
        assert!(matches!(service.signup_student(input).await, Err(AuthError::PasswordsMismatch)));

        service.signup_student(alice()).await.unwrap();
        assert!(matches!(
            service.signup_student(alice()).await,
            Err(AuthError::Credential(CredentialError::DuplicateEmail))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (service, _, _) = service();
        service.signup_student(alice()).await.unwrap();
        let a = service.login(password_login("alice@x.com", "Wrong1")).await.unwrap_err();
        let b = service.login(password_login("nobody@x.com", "Wrong1")).await.unwrap_err();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[tokio::test]
    async fn login_requires_a_credential() {
        let (service, _, _) = service();
        let err = service
            .login(LoginInput {
                email: "alice@x.com".into(),
                password: Some(String::new()),
                otp: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Password or OTP is required");
    }

    #[tokio::test]
    async fn instructor_first_login_flow() {
        let (service, recorder, _) = service();
        service
            .create_instructor(Role::Admin, "Bob", "Jones", "bob@x.com")
            .await
            .unwrap();
        let sent = recorder.wait_for("instructor").await.unwrap();
        let temp = sent.split_once(':').unwrap().1.to_string();

        let session = service.login(password_login("bob@x.com", &temp)).await.unwrap();
        assert_eq!(session.requires_password_change, Some(true));
        assert!(session.user.last_login.is_none());

        let err = service
            .set_instructor_password(session.user.id, Role::Student, "NewPass1", "NewPass1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));

        service
            .set_instructor_password(session.user.id, Role::Instructor, "NewPass1", "NewPass1")
            .await
            .unwrap();

        let session = service.login(password_login("bob@x.com", "NewPass1")).await.unwrap();
        assert_eq!(session.requires_password_change, Some(false));
        assert!(session.user.last_login.is_some());
    }

    #[tokio::test]
    async fn only_admins_create_instructors() {
        let (service, _, _) = service();
        assert!(matches!(
            service.create_instructor(Role::Instructor, "Bob", "Jones", "bob@x.com").await,
            Err(AuthError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn pending_instructors_cannot_log_in() {
        let (service, _, stores) = service();
        let creds = CredentialStore::new(stores.users.clone());
        creds
            .create(NewUser::instructor("Carol", "White", "carol@x.com", "Secret1"))
            .await
            .unwrap();
        let err = service.login(password_login("carol@x.com", "Secret1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Your account is pending. Please wait for admin approval.");
    }

    #[tokio::test]
    async fn forgot_password_only_mails_known_users() {
        let (service, recorder, _) = service();
        service.forgot_password("ghost@x.com").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(recorder.sent.lock().unwrap().is_empty());

        service.signup_student(alice()).await.unwrap();
        service.forgot_password("alice@x.com").await.unwrap();
        let sent = recorder.wait_for("otp").await.unwrap();
        let code = sent.split_once(':').unwrap().1.to_string();

        let session = service.verify_otp_login("alice@x.com", &code).await.unwrap();
        assert_eq!(session.requires_password_reset, Some(true));
        assert!(matches!(
            service.verify_otp_login("alice@x.com", &code).await,
            Err(AuthError::Otp(OtpError::AlreadyUsed))
        ));

        service
            .reset_password_after_otp(session.user.id, "Fresh123", "Fresh123")
            .await
            .unwrap();
        service.login(password_login("alice@x.com", "Fresh123")).await.unwrap();
    }

    #[tokio::test]
    async fn otp_login_path_skips_first_login_gate() {
        let (service, recorder, _) = service();
        service
            .create_instructor(Role::Admin, "Bob", "Jones", "bob@x.com")
            .await
            .unwrap();
        recorder.wait_for("instructor").await.unwrap();

        service.forgot_password("bob@x.com").await.unwrap();
        let code = recorder.wait_for("otp").await.unwrap().split_once(':').unwrap().1.to_string();
        let session = service
            .login(LoginInput {
                email: "bob@x.com".into(),
                password: None,
                otp: Some(code),
            })
            .await
            .unwrap();
        assert_eq!(session.requires_password_change, Some(false));
    }

    #[tokio::test]
    async fn reset_password_rules() {
        let (service, _, _) = service();
        let user = service.signup_student(alice()).await.unwrap().user;

        assert!(matches!(
            service.reset_password(user.id, "Secret1", "Secret1", "Secret1").await,
            Err(AuthError::SamePassword)
        ));
        assert!(matches!(
            service.reset_password(user.id, "Secret1", "Other12", "Other13").await,
            Err(AuthError::PasswordsMismatch)
        ));
        assert!(matches!(
            service.reset_password(user.id, "Wrong11", "Other12", "Other12").await,
            Err(AuthError::WrongCurrentPassword)
        ));
        service.reset_password(user.id, "Secret1", "Other12", "Other12").await.unwrap();
        service.login(password_login("alice@x.com", "Other12")).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_and_logout() {
        let (service, _, _) = service();
        let session = service.signup_student(alice()).await.unwrap();

        assert!(matches!(service.refresh(None).await, Err(AuthError::MissingRefreshToken)));
        let pair = service.refresh(Some(&session.tokens.refresh_token)).await.unwrap();
        assert!(service.refresh(Some(&session.tokens.refresh_token)).await.is_err());

        service.logout(Some(&pair.refresh_token)).await.unwrap();
        service.logout(Some(&pair.refresh_token)).await.unwrap();
        service.logout(None).await.unwrap();
        assert!(service.tokens().validate_access(&pair.access_token).await.is_err());
    }

    #[tokio::test]
    async fn complete_profile_replaces_fields() {
        let (service, _, _) = service();
        let user = service.signup_student(alice()).await.unwrap().user;
        let updated = service
            .complete_profile(
                user.id,
                ProfileInput {
                    bio: Some("Learning Rust".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio, "Learning Rust");
        assert_eq!(updated.address, Address::default());
        assert!(matches!(
            service.complete_profile(Uuid::new_v4(), ProfileInput::default()).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
