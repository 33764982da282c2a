use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Spawn the liveness sweeper: stale marking, idle kicks, inactive turn
/// hand-off, timed-turn timeouts and spy timer expiry.
pub fn spawn_liveness_sweeper(state: Arc<AppState>) {
    let period = state.config.sweep_interval.max(Duration::from_millis(100));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            for (room_id, report) in state.sweep_all().await {
                tracing::debug!(
                    room_id = %room_id,
                    stale = report.marked_stale.len(),
                    kicked = report.kicked.len(),
                    turn_passed_to = ?report.turn_passed_to,
                    turn_timed_out = report.turn_timed_out,
                    spy_timer_expired = report.spy_timer_expired,
                    "Liveness sweep changed room"
                );
            }
        }
    });
}

/// Spawn the TTL eviction job for unauthenticated players
pub fn spawn_eviction_job(state: Arc<AppState>) {
    let period = state.config.evict_interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let reports = state.evict_all().await;
            if reports.is_empty() {
                continue;
            }
            let evicted: usize = reports.iter().map(|(_, r)| r.evicted.len()).sum();
            let deleted = reports.iter().filter(|(_, r)| r.room_deleted).count();
            tracing::info!(evicted, rooms_deleted = deleted, "Eviction pass complete");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::state::JoinRequest;
    use crate::words::ThemeRegistry;

    #[tokio::test]
    async fn test_eviction_job_deletes_abandoned_room() {
        let config = GameConfig {
            evict_ttl: Duration::ZERO,
            evict_interval: Duration::from_secs(1),
            ..GameConfig::default()
        };
        let state = Arc::new(AppState::with_config(config, ThemeRegistry::builtin()));
        state
            .join_room(JoinRequest::anonymous("R1", "alice", "p1"))
            .await
            .unwrap();
        assert_eq!(state.room_count().await, 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        spawn_eviction_job(state.clone());

        for _ in 0..50 {
            if state.room_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state.room_count().await, 0);
    }
}
