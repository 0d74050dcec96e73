//! Background poll loop for the board.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::board::Board;
use crate::error::AppError;

/// Configuration for the poll loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// How often to poll (in seconds)
    pub interval_secs: u64,
}

/// Start polling the results service.
///
/// Ticks missed while a poll is slow are skipped rather than replayed, so
/// polls never queue up behind each other.
pub fn start_poll_task(board: Arc<Board>, config: PollerConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting poller (interval: {} seconds)", config.interval_secs);

        let mut ticker = interval(Duration::from_secs(config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the initial load covers it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_poll(&board).await;
        }
    })
}

async fn run_poll(board: &Board) {
    match board.poll().await {
        Ok(outcome) => debug!(
            pushes = outcome.pushes_added.len(),
            jobs = outcome.jobs_merged,
            "Poll finished"
        ),
        Err(AppError::Conflict(_)) => debug!("Previous poll still running, skipping"),
        // Already surfaced as a notification by the board.
        Err(e) => warn!("Poll failed: {}", e),
    }
}
