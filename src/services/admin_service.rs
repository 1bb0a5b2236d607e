use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{MaskedOtp, Role, User, UserFilter, UserPatch, UserStatus};
use crate::database::{DatabaseError, UserStore};
use crate::services::credential_store::CredentialError;
use crate::services::otp_ledger::OtpLedger;
use crate::services::validation;

/// Newest OTP records shown on the admin view
pub const OTP_LISTING_LIMIT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    ProtectedAdmin(&'static str),

    #[error("Invalid status")]
    InvalidStatus,

    #[error("Invalid role")]
    InvalidRole,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for AdminError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => AdminError::UserNotFound,
            DatabaseError::DuplicateKey(_) => AdminError::Credential(CredentialError::DuplicateEmail),
            other => AdminError::Database(other),
        }
    }
}

impl From<validation::FieldError> for AdminError {
    fn from(err: validation::FieldError) -> Self {
        AdminError::Credential(err.into())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub total: usize,
    pub users: Vec<User>,
}

/// Fields an admin may edit directly. Anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserEdit {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: i64,
    pub total_instructors: i64,
    pub active_users: i64,
    pub inactive_users: i64,
    pub total_users: i64,
}

/// Account administration behind the admin capability gate
#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserStore>,
    otps: OtpLedger,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserStore>, otps: OtpLedger) -> Self {
        Self { users, otps }
    }

    pub async fn list_users(&self, query: UserQuery) -> Result<UserList, AdminError> {
        // Unknown role/status values match nothing rather than everything
        let role = match query.role.as_deref().filter(|r| !r.is_empty()) {
            Some(r) => match r.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => return Ok(UserList { total: 0, users: Vec::new() }),
            },
            None => None,
        };
        let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => match s.parse::<UserStatus>() {
                Ok(status) => Some(status),
                Err(_) => return Ok(UserList { total: 0, users: Vec::new() }),
            },
            None => None,
        };

        let users = self
            .users
            .list(&UserFilter {
                role,
                status,
                search: query.search,
            })
            .await?;
        Ok(UserList {
            total: users.len(),
            users,
        })
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AdminError> {
        self.users.find_by_id(id).await?.ok_or(AdminError::UserNotFound)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), AdminError> {
        let user = self.get_user(id).await?;
        if user.role == Role::Admin {
            return Err(AdminError::ProtectedAdmin("Cannot delete admin account"));
        }
        if !self.users.delete(id).await? {
            return Err(AdminError::UserNotFound);
        }
        tracing::info!(user_id = %id, role = %user.role, "Deleted user");
        Ok(())
    }

    pub async fn set_status(&self, id: Uuid, status: &str) -> Result<User, AdminError> {
        let status = status.parse::<UserStatus>().map_err(|_| AdminError::InvalidStatus)?;
        let user = self
            .users
            .update_fields(
                id,
                &UserPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(user_id = %id, status = %status, "Updated user status");
        Ok(user)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<User, AdminError> {
        let user = self.get_user(id).await?;
        if user.role == Role::Admin {
            return Err(AdminError::ProtectedAdmin("Cannot deactivate admin account"));
        }
        self.set_active(id, false).await
    }

    pub async fn activate(&self, id: Uuid) -> Result<User, AdminError> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<User, AdminError> {
        let user = self
            .users
            .update_fields(
                id,
                &UserPatch {
                    is_active: Some(is_active),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(user_id = %id, is_active, "Updated user activation");
        Ok(user)
    }

    pub async fn update_user(&self, id: Uuid, edit: UserEdit) -> Result<User, AdminError> {
        let first_name = edit.first_name.map(|v| v.trim().to_string());
        let last_name = edit.last_name.map(|v| v.trim().to_string());
        if let Some(v) = &first_name {
            validation::name("firstName", "First name", v)?;
        }
        if let Some(v) = &last_name {
            validation::name("lastName", "Last name", v)?;
        }
        let email = match edit.email {
            Some(v) => {
                validation::email(&v)?;
                Some(validation::normalize_email(&v))
            }
            None => None,
        };
        let role = edit
            .role
            .map(|r| r.parse::<Role>().map_err(|_| AdminError::InvalidRole))
            .transpose()?;

        let patch = UserPatch {
            first_name,
            last_name,
            email,
            role,
            ..Default::default()
        };
        if patch.is_empty() {
            return self.get_user(id).await;
        }
        Ok(self.users.update_fields(id, &patch).await?)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, AdminError> {
        let total_students = self.users.count(Some(Role::Student), None).await?;
        let total_instructors = self.users.count(Some(Role::Instructor), None).await?;
        let active_users = self.users.count(None, Some(true)).await?;
        let inactive_users = self.users.count(None, Some(false)).await?;
        let total_users = self.users.count(None, None).await?;
        Ok(DashboardStats {
            total_students,
            total_instructors,
            active_users,
            inactive_users,
            total_users,
        })
    }

    pub async fn recent_otps(&self, email: Option<&str>) -> Result<Vec<MaskedOtp>, AdminError> {
        let email = email.filter(|e| !e.is_empty());
        Ok(self.otps.list_masked(email, OTP_LISTING_LIMIT).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{Gender, NewUser};
    use crate::database::MemoryStore;

    async fn setup() -> (AdminService, Arc<MemoryStore>, User, User) {
        let store = Arc::new(MemoryStore::new());
        let otps = OtpLedger::new(store.clone(), AppConfig::development().otp);
        let admin = UserStore::insert(&*store, &NewUser::admin("Root", "Admin", "root@x.com", "x"), "hash")
            .await
            .unwrap();
        let student = UserStore::insert(
            &*store,
            &NewUser::student("Alice", "Smith", "alice@x.com", "x", "9876543210", Gender::Female),
            "hash",
        )
        .await
            .unwrap();
        (AdminService::new(store.clone(), otps), store, admin, student)
    }

    #[tokio::test]
    async fn admins_are_protected() {
        let (service, _, admin, student) = setup().await;
        let err = service.delete_user(admin.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete admin account");
        let err = service.deactivate(admin.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot deactivate admin account");

        service.delete_user(student.id).await.unwrap();
        assert!(matches!(service.delete_user(student.id).await, Err(AdminError::UserNotFound)));
    }

    #[tokio::test]
    async fn status_must_be_known() {
        let (service, _, _, student) = setup().await;
        assert!(matches!(
            service.set_status(student.id, "archived").await,
            Err(AdminError::InvalidStatus)
        ));
        let user = service.set_status(student.id, "rejected").await.unwrap();
        assert_eq!(user.status, UserStatus::Rejected);
    }

    #[tokio::test]
    async fn listing_filters_and_counts() {
        let (service, _, _, _) = setup().await;
        let all = service.list_users(UserQuery::default()).await.unwrap();
        assert_eq!(all.total, 2);

        let students = service
            .list_users(UserQuery {
                role: Some("student".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(students.total, 1);

        let searched = service
            .list_users(UserQuery {
                search: Some("SMI".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.users[0].email, "alice@x.com");
    }

    #[tokio::test]
    async fn stats_track_activation() {
        let (service, _, _, student) = setup().await;
        service.deactivate(student.id).await.unwrap();
        let stats = service.dashboard_stats().await.unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_students: 1,
                total_instructors: 0,
                active_users: 1,
                inactive_users: 1,
                total_users: 2,
            }
        );
        service.activate(student.id).await.unwrap();
        assert_eq!(service.dashboard_stats().await.unwrap().inactive_users, 0);
    }

    #[tokio::test]
    async fn update_applies_whitelisted_fields() {
        let (service, _, _, student) = setup().await;
        let user = service
            .update_user(
                student.id,
                UserEdit {
                    first_name: Some("Alicia".into()),
                    role: Some("instructor".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(user.first_name, "Alicia");
        assert_eq!(user.role, Role::Instructor);

        let err = service
            .update_user(
                student.id,
                UserEdit {
                    email: Some("ROOT@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Credential(CredentialError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn otp_listing_is_masked() {
        let (service, _, _, _) = setup().await;
        service.otps.issue_for("alice@x.com").await.unwrap();
        let listed = service.recent_otps(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].otp_masked.ends_with("****"));
    }
}
