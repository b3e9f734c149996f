//! Periodic reflection sweep: recalls a recency window of memories,
//! generates belief summaries via the memory backend's reflection endpoint,
//! and retains them back unless running in dry-run mode (§4.3 final paragraph).

use crate::orchestration::memory_client::MemoryClient;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct ReflectionJob {
    memory_client: Arc<MemoryClient>,
    window_days: i64,
    dry_run: bool,
}

impl ReflectionJob {
    pub fn new(memory_client: Arc<MemoryClient>, window_days: i64, dry_run: bool) -> Self {
        Self {
            memory_client,
            window_days,
            dry_run,
        }
    }

    pub async fn run_once(&self) {
        let to = Utc::now();
        let from = to - ChronoDuration::days(self.window_days);
        match self.memory_client.reflect(from, to, self.dry_run).await {
            Ok(response) => {
                info!(count = response.beliefs.len(), dry_run = self.dry_run, "reflection sweep produced beliefs");
                if self.dry_run {
                    return;
                }
                for belief in &response.beliefs {
                    if let Err(err) = self.memory_client.retain("beliefs", belief).await {
                        error!(error = %err, "failed to retain reflected belief");
                    }
                }
            }
            Err(err) => error!(error = %err, "reflection sweep failed"),
        }
    }

    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}
