//! Periodic memory maintenance
//!
//! Daily sweep over every user with memories: promote aged short-term
//! memories that cleared the importance threshold, run the cleanup passes,
//! and refresh contexts for recently active conversations. Idempotent and
//! safe to re-run or skip; one failing user never aborts the batch.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::memory::MemoryManager;
use crate::storage::{queries, Storage};
use crate::types::MaintenanceReport;

/// Default period between maintenance runs
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Run one maintenance sweep across all users with memories
///
/// `now` is injected so schedulers and tests share the same entry point.
pub fn run_maintenance(
    storage: &Storage,
    config: &MemoryConfig,
    now: DateTime<Utc>,
) -> Result<MaintenanceReport> {
    let users = storage.with_connection(queries::users_with_memories)?;

    let mut report = MaintenanceReport::default();

    for user_id in users {
        match maintain_user(storage, config, &user_id, now) {
            Ok((promoted, cleaned, refreshed)) => {
                report.users_processed += 1;
                report.memories_promoted += promoted;
                report.memories_cleaned += cleaned;
                report.contexts_refreshed += refreshed;
            }
            Err(e) => {
                // A user deleted mid-batch or a row-level failure is
                // skipped, never fatal to the sweep
                warn!(user_id = %user_id, error = %e, "Skipping user during memory maintenance");
            }
        }
    }

    info!(
        users_processed = report.users_processed,
        memories_promoted = report.memories_promoted,
        memories_cleaned = report.memories_cleaned,
        contexts_refreshed = report.contexts_refreshed,
        "Memory maintenance completed"
    );

    Ok(report)
}

fn maintain_user(
    storage: &Storage,
    config: &MemoryConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(i64, i64, i64)> {
    let manager = MemoryManager::new(storage, config.clone(), user_id);

    // Promote aged, important short-term memories. Eligibility is
    // re-validated inside promote, so a score that dropped between
    // selection and promotion resolves to a skip.
    let cutoff = now - ChronoDuration::hours(config.promotion_min_age_hours);
    let candidates = storage.with_connection(|conn| {
        queries::promotable_short_term(
            conn,
            user_id,
            config.long_term_importance_threshold,
            cutoff,
        )
    })?;

    let mut promoted = 0;
    for memory_id in candidates {
        if manager.promote_to_long_term(memory_id)? {
            promoted += 1;
        }
    }

    let cleaned = manager.cleanup_short_term_memory(now)?.total();

    // Refresh contexts for recently active conversations. The refresh is
    // currently just ensuring the context row exists; topic recomputation
    // happens in the extraction jobs.
    let since = now - ChronoDuration::days(config.active_conversation_window_days);
    let refreshed = storage.with_connection(|conn| {
        let active = queries::active_conversations(conn, user_id, since)?;
        for conversation_id in &active {
            queries::get_or_create_context(conn, *conversation_id)?;
        }
        Ok(active.len() as i64)
    })?;

    Ok((promoted, cleaned, refreshed))
}

/// Commands for the maintenance worker
#[derive(Debug)]
enum MaintenanceCommand {
    RunNow,
    Stop,
}

/// Background maintenance worker running the sweep on a fixed interval
pub struct MaintenanceWorker {
    sender: mpsc::Sender<MaintenanceCommand>,
}

impl MaintenanceWorker {
    /// Start the worker; the first scheduled run happens one period in
    pub fn start(storage: Arc<Storage>, config: MemoryConfig, every: Duration) -> Self {
        let (sender, mut receiver) = mpsc::channel::<MaintenanceCommand>(16);

        tokio::spawn(async move {
            let mut ticker = interval(every);
            // interval fires immediately; swallow the first tick so the
            // initial run happens one period after startup
            ticker.tick().await;

            loop {
                tokio::select! {
                    Some(cmd) = receiver.recv() => {
                        match cmd {
                            MaintenanceCommand::RunNow => {
                                Self::sweep(&storage, &config);
                            }
                            MaintenanceCommand::Stop => break,
                        }
                    }
                    _ = ticker.tick() => {
                        Self::sweep(&storage, &config);
                    }
                }
            }

            info!("Maintenance worker stopped");
        });

        Self { sender }
    }

    fn sweep(storage: &Storage, config: &MemoryConfig) {
        if let Err(e) = run_maintenance(storage, config, Utc::now()) {
            warn!(error = %e, "Failed to run memory maintenance");
        }
    }

    /// Trigger a sweep outside the schedule
    pub async fn run_now(&self) {
        let _ = self.sender.send(MaintenanceCommand::RunNow).await;
    }

    /// Stop the worker
    pub async fn stop(&self) {
        let _ = self.sender.send(MaintenanceCommand::Stop).await;
    }
}
