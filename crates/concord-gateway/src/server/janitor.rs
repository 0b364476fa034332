//! Expiry of detached sessions

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::GatewayState;

/// Periodically drop sessions that stayed detached past the resume window
pub fn spawn_janitor(state: GatewayState, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config().session.janitor_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    sweep_expired(&state).await;
                }
            }
        }
        tracing::debug!("Session janitor stopped");
    })
}

/// One expiry pass; returns how many sessions were dropped
pub async fn sweep_expired(state: &GatewayState) -> usize {
    let expired = state
        .registry()
        .expire_detached(state.config().session.resume_window());

    for session in &expired {
        let user_id = session.user_id();
        if state.registry().sessions_for_user(user_id).is_empty() {
            for guild_id in session.watched_guilds() {
                state.watchers().unmark(guild_id, user_id);
            }
        }
        state.settle_presence(user_id).await;
        tracing::debug!(session_id = %session.id(), user_id = %user_id, "Session expired");
    }

    if !expired.is_empty() {
        tracing::info!(count = expired.len(), remaining = state.registry().len(), "Expired detached sessions");
    }
    expired.len()
}
