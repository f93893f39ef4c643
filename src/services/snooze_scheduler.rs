//! Background requeue of expired snoozes.
//!
//! Polls on a fixed interval and moves snoozed runs whose wake time has
//! passed back to Pending, so they reappear in the work queue without any
//! human intervention.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::run_lifecycle::RunLifecycleService;

pub struct SnoozeScheduler {
    lifecycle: Arc<RunLifecycleService>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl SnoozeScheduler {
    pub fn new(lifecycle: Arc<RunLifecycleService>, poll_interval_secs: u64) -> Self {
        Self {
            lifecycle,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the poll loop. Returns the task handle; a second call while
    /// already running returns None.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        info!(interval_secs = self.poll_interval.as_secs(), "snooze scheduler started");

        let lifecycle = Arc::clone(&self.lifecycle);
        let running = Arc::clone(&self.running);
        let interval = self.poll_interval;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match lifecycle.requeue_expired_snoozes(Utc::now()).await {
                    Ok(count) if count > 0 => {
                        info!(count, "requeued expired snoozes");
                    }
                    Ok(_) => debug!("no expired snoozes"),
                    // Poll errors are transient; the next tick retries.
                    Err(e) => error!(error = %e, "snooze requeue pass failed"),
                }
            }
            info!("snooze scheduler stopped");
        }))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
