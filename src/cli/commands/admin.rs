use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{connect, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::NewUser;
use crate::database::{DatabaseManager, Stores};
use crate::services::CredentialStore;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create an administrator account if none exists for the email")]
    Seed {
        #[arg(long, env = "ADMIN_EMAIL")]
        email: String,

        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "Admin")]
        first_name: String,

        #[arg(long, default_value = "User")]
        last_name: String,
    },
}

pub async fn handle(cmd: AdminCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Seed {
            email,
            password,
            first_name,
            last_name,
        } => {
            let pool = connect(config).await?;
            DatabaseManager::ensure_schema(&pool).await?;
            let credentials = CredentialStore::new(Stores::postgres(pool).users);
            seed(&credentials, &first_name, &last_name, &email, &password, output_format).await
        }
    }
}

pub(crate) async fn seed(
    credentials: &CredentialStore,
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(existing) = credentials.find_by_email(email).await? {
        return output_success(
            output_format,
            &format!("Admin already exists: {}", existing.email),
            Some(json!({ "id": existing.id, "created": false })),
        );
    }

    let admin = credentials
        .create(NewUser::admin(first_name, last_name, email, password))
        .await?;
    tracing::info!(user_id = %admin.id, "Seeded admin account");
    output_success(
        output_format,
        &format!("Admin created: {}", admin.email),
        Some(json!({ "id": admin.id, "created": true })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let credentials = CredentialStore::new(Stores::memory().users);
        seed(&credentials, "Root", "Admin", "root@x.com", "Secret1", OutputFormat::Json)
            .await
            .unwrap();
        seed(&credentials, "Root", "Admin", "ROOT@x.com", "Other12", OutputFormat::Json)
            .await
            .unwrap();

        let creds = credentials.find_credentials_by_email("root@x.com").await.unwrap().unwrap();
        assert_eq!(creds.user.role, Role::Admin);
        assert!(credentials.verify_password(&creds, "Secret1"));
    }
}
