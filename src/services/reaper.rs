use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::database::{DatabaseError, Stores};

/// Counts from one purge pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub tokens: u64,
    pub otps: u64,
}

/// Delete token and OTP records past their ceiling. Queries already ignore
/// them; this only reclaims space.
pub async fn purge_expired(stores: &Stores) -> Result<PurgeReport, DatabaseError> {
    let now = Utc::now();
    let tokens = stores.tokens.purge_expired(now).await?;
    let otps = stores.otps.purge_expired(now).await?;
    Ok(PurgeReport { tokens, otps })
}

/// Run [`purge_expired`] every `interval` until the runtime shuts down.
pub fn spawn(stores: Stores, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match purge_expired(&stores).await {
                Ok(report) if report.tokens + report.otps > 0 => {
                    tracing::info!(tokens = report.tokens, otps = report.otps, "Purged expired records");
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Expired record purge failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::otp_ledger::OtpLedger;

    #[tokio::test]
    async fn purges_only_expired_otps() {
        let stores = Stores::memory();
        let mut config = AppConfig::development().otp;
        config.ttl_minutes = -1;
        OtpLedger::new(stores.otps.clone(), config.clone())
            .issue_for("old@x.com")
            .await
            .unwrap();
        config.ttl_minutes = 10;
        let fresh = OtpLedger::new(stores.otps.clone(), config);
        let code = fresh.issue_for("new@x.com").await.unwrap();

        let report = purge_expired(&stores).await.unwrap();
        assert_eq!(report, PurgeReport { tokens: 0, otps: 1 });
        fresh.consume("new@x.com", &code).await.unwrap();
    }
}
