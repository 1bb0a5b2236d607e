//! Outbound account notifications.
//!
//! Requests hand a [`Notification`] to the [`NotificationDispatcher`], which
//! delivers it on its own Tokio task with bounded exponential backoff. The
//! request never waits on delivery and never sees its outcome; a message that
//! exhausts its retries is logged under the `notifications::dead_letter` target.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::EmailConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_welcome(&self, email: &str, first_name: &str, last_name: &str) -> Result<()>;

    async fn send_instructor_password(&self, email: &str, first_name: &str, temporary_password: &str) -> Result<()>;

    async fn send_otp(&self, email: &str, otp: &str) -> Result<()>;
}

/// A message waiting for delivery. Not `Debug`: two variants carry secrets.
#[derive(Clone)]
pub enum Notification {
    Welcome {
        email: String,
        first_name: String,
        last_name: String,
    },
    InstructorPassword {
        email: String,
        first_name: String,
        temporary_password: String,
    },
    Otp {
        email: String,
        otp: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::InstructorPassword { .. } => "instructor_password",
            Notification::Otp { .. } => "otp",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::Welcome { email, .. }
            | Notification::InstructorPassword { email, .. }
            | Notification::Otp { email, .. } => email,
        }
    }

    async fn send_via(&self, notifier: &dyn Notifier) -> Result<()> {
        match self {
            Notification::Welcome {
                email,
                first_name,
                last_name,
            } => notifier.send_welcome(email, first_name, last_name).await,
            Notification::InstructorPassword {
                email,
                first_name,
                temporary_password,
            } => {
                notifier
                    .send_instructor_password(email, first_name, temporary_password)
                    .await
            }
            Notification::Otp { email, otp } => notifier.send_otp(email, otp).await,
        }
    }
}

/// Fire-and-forget delivery with retries
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    max_retries: u32,
    base_delay: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            notifier,
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(notifier: Arc<dyn Notifier>, email: &EmailConfig) -> Self {
        Self::new(
            notifier,
            email.max_retries,
            Duration::from_millis(email.retry_base_delay_ms),
        )
    }

    /// Queue a notification. The handle resolves to whether it was delivered;
    /// callers on the request path drop it.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<bool> {
        let notifier = self.notifier.clone();
        let max_retries = self.max_retries;
        let base_delay = self.base_delay;

        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                match notification.send_via(notifier.as_ref()).await {
                    Ok(()) => {
                        tracing::debug!(
                            kind = notification.kind(),
                            to = %notification.recipient(),
                            attempt,
                            "Notification delivered"
                        );
                        return true;
                    }
                    Err(e) if attempt < max_retries => {
                        let delay = base_delay * 2u32.saturating_pow(attempt);
                        tracing::warn!(
                            kind = notification.kind(),
                            to = %notification.recipient(),
                            attempt,
                            "Notification delivery failed, retrying in {:?}: {}",
                            delay,
                            e
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            target: "notifications::dead_letter",
                            kind = notification.kind(),
                            to = %notification.recipient(),
                            attempts = attempt + 1,
                            "Giving up on notification: {}",
                            e
                        );
                        return false;
                    }
                }
            }
        })
    }
}

/// Notifier used when SMTP is not configured; it records the intent and drops the message.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_welcome(&self, email: &str, _first_name: &str, _last_name: &str) -> Result<()> {
        tracing::warn!("Email not configured, skipping welcome email to {}", email);
        Ok(())
    }

    async fn send_instructor_password(&self, email: &str, _first_name: &str, _temporary_password: &str) -> Result<()> {
        tracing::warn!("Email not configured, skipping instructor password email to {}", email);
        Ok(())
    }

    async fn send_otp(&self, email: &str, _otp: &str) -> Result<()> {
        tracing::warn!("Email not configured, skipping OTP email to {}", email);
        Ok(())
    }
}

/// SMTP delivery through lettre
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    async fn send_email(&self, to_email: &str, subject: &str, html_body: String, text_body: String) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text_body))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html_body)),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port)
        .timeout(Some(Duration::from_secs(30)));

        let mailer = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                mailer.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => mailer,
        };

        mailer.build().send(email).await?;
        tracing::info!(to = %to_email, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_welcome(&self, email: &str, first_name: &str, last_name: &str) -> Result<()> {
        let name = format!("{} {}", first_name, last_name);
        self.send_email(
            email,
            "Welcome to the LMS",
            layout(
                "Welcome!",
                &format!(
                    "<p>Hi {},</p><p>Your student account is ready. Sign in any time to start learning.</p>",
                    name
                ),
            ),
            format!("Hi {},\n\nYour student account is ready. Sign in any time to start learning.\n", name),
        )
        .await
    }

    async fn send_instructor_password(&self, email: &str, first_name: &str, temporary_password: &str) -> Result<()> {
        self.send_email(
            email,
            "Your instructor account",
            layout(
                "Your instructor account",
                &format!(
                    "<p>Hi {},</p><p>An administrator created an instructor account for you.</p>\
                     <p>Temporary password: <code>{}</code></p>\
                     <p>You will be asked to choose a new password when you first sign in.</p>",
                    first_name, temporary_password
                ),
            ),
            format!(
                "Hi {},\n\nAn administrator created an instructor account for you.\n\n\
                 Temporary password: {}\n\nYou will be asked to choose a new password when you first sign in.\n",
                first_name, temporary_password
            ),
        )
        .await
    }

    async fn send_otp(&self, email: &str, otp: &str) -> Result<()> {
        self.send_email(
            email,
            "Your one-time password",
            layout(
                "Password reset",
                &format!(
                    "<p>Your one-time password is <strong>{}</strong>.</p>\
                     <p>It expires in 10 minutes. If you did not ask for it, ignore this email.</p>",
                    otp
                ),
            ),
            format!(
                "Your one-time password is {}.\n\nIt expires in 10 minutes. If you did not ask for it, ignore this email.\n",
                otp
            ),
        )
        .await
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; color: #374151;">
<div style="max-width: 560px; margin: 0 auto; padding: 32px 20px;">
<h1 style="font-size: 22px;">{title}</h1>
{body}
</div>
</body>
</html>"#
    )
}

/// SMTP when configured, otherwise the logging fallback
pub fn from_config(config: &EmailConfig) -> Arc<dyn Notifier> {
    if config.is_configured() {
        Arc::new(SmtpNotifier::new(config.clone()))
    } else {
        tracing::warn!("SMTP not configured, notifications will be logged and dropped");
        Arc::new(LogNotifier)
    }
}
