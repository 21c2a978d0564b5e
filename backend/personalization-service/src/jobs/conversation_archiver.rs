//! Conversation Archiver Background Job
//!
//! Periodically sweeps the active-conversation index and archives every
//! conversation whose idle deadline has passed. The sweep dispatches the
//! digest-and-index work asynchronously and never waits on it, so one slow
//! or failing conversation cannot stall the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::services::ChatMemoryService;

/// Sweep cadence when none is configured.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

pub async fn start_conversation_archiver(memory: Arc<ChatMemoryService>, interval: Duration) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Starting conversation archiver background job"
    );

    loop {
        sleep(interval).await;

        match memory.run_archive_scan(chrono::Utc::now()).await {
            Ok(stats) => {
                if stats.due > 0 {
                    tracing::info!(
                        due = stats.due,
                        dispatched = stats.dispatched,
                        skipped = stats.skipped,
                        failed = stats.failed,
                        "Archive sweep completed"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Archive sweep failed");
            }
        }
    }
}
