use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub cookies: CookieConfig,
    pub otp: OtpConfig,
    pub email: EmailConfig,
    pub payments: PaymentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. `None` selects the in-memory store (development only).
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub reap_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    /// Ceiling on a ledger record, independent of the embedded token lifetimes
    pub ledger_ttl_days: i64,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSitePolicy,
    pub path: String,
    pub access_max_age_ms: i64,
    pub refresh_max_age_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl_minutes: i64,
    pub max_attempts: i32,
    /// When true a wrong code for a known email counts against that email's attempts.
    /// When false lookups are by exact (email, code) and misses never touch a record.
    pub count_failed_attempts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    pub from_name: String,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub razorpay_key_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Refuse to start a non-development deployment without a signing secret or database.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Development {
            if self.database.url.is_none() {
                tracing::warn!("DATABASE_URL not set, using the in-memory store");
            }
            return Ok(());
        }
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("BIND_HOST") {
            self.server.bind_host = v;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs = v.parse().unwrap_or(self.database.connection_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_REAP_INTERVAL_SECS") {
            self.database.reap_interval_secs = v.parse().unwrap_or(self.database.reap_interval_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_TTL_MINUTES") {
            self.security.access_token_ttl_minutes = v.parse().unwrap_or(self.security.access_token_ttl_minutes);
        }
        if let Ok(v) = env::var("JWT_REFRESH_TTL_DAYS") {
            self.security.refresh_token_ttl_days = v.parse().unwrap_or(self.security.refresh_token_ttl_days);
        }
        if let Ok(v) = env::var("TOKEN_LEDGER_TTL_DAYS") {
            self.security.ledger_ttl_days = v.parse().unwrap_or(self.security.ledger_ttl_days);
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Cookie overrides
        if let Ok(v) = env::var("ACCESS_TOKEN_MAX_AGE_MS") {
            self.cookies.access_max_age_ms = v.parse().unwrap_or(self.cookies.access_max_age_ms);
        }

        // OTP overrides
        if let Ok(v) = env::var("OTP_LENGTH") {
            self.otp.length = v.parse().unwrap_or(self.otp.length);
        }
        if let Ok(v) = env::var("OTP_TTL_MINUTES") {
            self.otp.ttl_minutes = v.parse().unwrap_or(self.otp.ttl_minutes);
        }
        if let Ok(v) = env::var("OTP_MAX_ATTEMPTS") {
            self.otp.max_attempts = v.parse().unwrap_or(self.otp.max_attempts);
        }
        if let Ok(v) = env::var("OTP_COUNT_FAILED_ATTEMPTS") {
            self.otp.count_failed_attempts = v.parse().unwrap_or(self.otp.count_failed_attempts);
        }

        // Email overrides
        if let Ok(v) = env::var("SMTP_HOST") {
            self.email.smtp_host = Some(v);
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            self.email.smtp_port = v.parse().unwrap_or(self.email.smtp_port);
        }
        if let Ok(v) = env::var("SMTP_USER") {
            self.email.smtp_username = Some(v);
        }
        if let Ok(v) = env::var("SMTP_PASS") {
            self.email.smtp_password = Some(v);
        }
        if let Ok(v) = env::var("SMTP_TLS") {
            self.email.smtp_tls = v.parse().unwrap_or(self.email.smtp_tls);
        }
        if let Ok(v) = env::var("SMTP_FROM_EMAIL") {
            self.email.from_address = Some(v);
        } else if self.email.from_address.is_none() {
            self.email.from_address = self.email.smtp_username.clone();
        }
        if let Ok(v) = env::var("SMTP_FROM_NAME") {
            self.email.from_name = v;
        }
        if let Ok(v) = env::var("EMAIL_MAX_RETRIES") {
            self.email.max_retries = v.parse().unwrap_or(self.email.max_retries);
        }

        // Payment overrides
        if let Ok(v) = env::var("RAZORPAY_KEY_ID") {
            self.payments.razorpay_key_id = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind_host: "0.0.0.0".to_string(),
                port: 4000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout_secs: 30,
                reap_interval_secs: 300,
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret".to_string(),
                access_token_ttl_minutes: 15,
                refresh_token_ttl_days: 30,
                ledger_ttl_days: 7,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            cookies: CookieConfig {
                http_only: true,
                secure: false,
                same_site: SameSitePolicy::Lax,
                path: "/".to_string(),
                access_max_age_ms: 15 * 60 * 1000,
                refresh_max_age_ms: 30 * 24 * 60 * 60 * 1000,
            },
            otp: OtpConfig {
                length: 6,
                ttl_minutes: 10,
                max_attempts: 5,
                count_failed_attempts: true,
            },
            email: EmailConfig {
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                smtp_tls: true,
                from_address: None,
                from_name: "LMS".to_string(),
                max_retries: 3,
                retry_base_delay_ms: 2000,
            },
            payments: PaymentConfig {
                razorpay_key_id: String::new(),
            },
        }
    }

    fn staging() -> Self {
        let dev = Self::development();
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout_secs: 10,
                ..dev.database
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cors_origins: vec!["https://staging.example.com".to_string()],
                ..dev.security
            },
            cookies: CookieConfig {
                secure: true,
                same_site: SameSitePolicy::None,
                ..dev.cookies
            },
            ..dev
        }
    }

    fn production() -> Self {
        let dev = Self::development();
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
                ..dev.database
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cors_origins: Vec::new(),
                ..dev.security
            },
            // Cross-origin cookies need SameSite=None, which browsers only accept with Secure
            cookies: CookieConfig {
                secure: true,
                same_site: SameSitePolicy::None,
                ..dev.cookies
            },
            ..dev
        }
    }
}
