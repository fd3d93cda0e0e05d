//! Periodic deletion of dead session rows.
//!
//! Sign-out and expiry only move `expires_at` back; this job is the only
//! place session rows are physically removed.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tally_db::repositories::SessionRepo;
use tokio_util::sync::CancellationToken;

/// Delete every session that expired before now. Returns the number removed.
pub async fn sweep_once(pool: &PgPool) -> Result<u64, sqlx::Error> {
    SessionRepo::delete_expired(pool, Utc::now()).await
}

/// Run the sweep every `interval` until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(pool: PgPool, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Session sweep started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(&pool).await {
                    Ok(0) => tracing::debug!("Session sweep: nothing to delete"),
                    Ok(deleted) => tracing::info!(deleted, "Session sweep: deleted expired sessions"),
                    Err(e) => tracing::error!(error = %e, "Session sweep failed"),
                }
            }
        }
    }
}
