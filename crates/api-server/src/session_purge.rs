use std::sync::Arc;

use campaign_engine::session::SessionRegistry;
use chrono::{Duration, Utc};
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info};

pub fn purge_idle_sessions(registry: &SessionRegistry, idle_ttl_seconds: u64) -> usize {
    let idle_ttl = i64::try_from(idle_ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    let purged = registry.purge_idle(Utc::now(), idle_ttl);

    if purged == 0 {
        debug!(
            active_sessions = registry.len(),
            idle_ttl_seconds, "session purge tick found no idle sessions"
        );
    }

    purged
}

/// Runs until `shutdown` flips to true.
pub async fn run_purge_loop(
    registry: Arc<SessionRegistry>,
    idle_ttl_seconds: u64,
    interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "session purge task starting (tick every {} seconds, idle ttl {} seconds)",
        interval_seconds, idle_ttl_seconds
    );

    let mut ticker = time::interval(time::Duration::from_secs(interval_seconds));

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("session purge task stopping");
                    break;
                }
            }
            _ = ticker.tick() => {
                purge_idle_sessions(&registry, idle_ttl_seconds);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use campaign_engine::session::{Session, SessionRegistry};
    use tokio::sync::watch;

    use super::{purge_idle_sessions, run_purge_loop};

    #[test]
    fn fresh_sessions_survive_a_purge_tick() {
        let registry = SessionRegistry::new();
        registry.insert(Session::new("policy"));

        assert_eq!(purge_idle_sessions(&registry, 3600), 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn purge_loop_stops_on_shutdown_signal() {
        let registry = Arc::new(SessionRegistry::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_purge_loop(registry, 3600, 1, shutdown_rx));

        shutdown_tx.send(true).expect("shutdown signal should send");
        task.await.expect("purge task should join");
    }
}
