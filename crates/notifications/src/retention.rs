//! Deletion of rendered invoice files after a grace period.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Schedules rendered files for deletion.
///
/// Each scheduled file gets its own timer task. [`RetentionScheduler::shutdown`]
/// cuts every pending timer short, deletes the files right away and waits
/// for the tasks to finish.
#[derive(Clone)]
pub struct RetentionScheduler {
    delay: Duration,
    tracker: TaskTracker,
    expire_now: CancellationToken,
}

impl RetentionScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            tracker: TaskTracker::new(),
            expire_now: CancellationToken::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of files still waiting for deletion.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Deletes `path` once the retention delay has passed.
    pub fn schedule(&self, path: PathBuf) {
        let delay = self.delay;
        let expire_now = self.expire_now.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = expire_now.cancelled() => {}
            }
            remove(path).await;
        });
    }

    /// Deletes every pending file now and waits for the timers to exit.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.expire_now.cancel();
        self.tracker.wait().await;
    }
}

async fn remove(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            metrics::counter!("notifications_files_deleted_total").increment(1);
            tracing::debug!(path = %path.display(), "rendered invoice deleted");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete rendered invoice");
        }
    }
}
