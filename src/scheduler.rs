use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{RESCHEDULE_MAX_MINUTES, RESCHEDULE_MIN_MINUTES};
use crate::types::TriggerOrigin;

/// Installs one-shot triggers for future scan cycles. A trigger is a named
/// tokio task that sleeps until its fire time and then requests a scheduled
/// cycle; installing a new one first removes every pending trigger carrying
/// this job's name prefix, so at most one is ever outstanding.
pub struct Rescheduler {
    job_name: String,
    cycle_tx: mpsc::Sender<TriggerOrigin>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Rescheduler {
    pub fn new(job_name: String, cycle_tx: mpsc::Sender<TriggerOrigin>) -> Self {
        Self {
            job_name,
            cycle_tx,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Remove any prior trigger for this job and install a new one at a
    /// randomized future time.
    pub fn schedule_next(&self) {
        let minutes = rand::rng().random_range(RESCHEDULE_MIN_MINUTES..RESCHEDULE_MAX_MINUTES);
        self.schedule_in_minutes(minutes);
    }

    fn schedule_in_minutes(&self, minutes: u64) {
        let fire_at = Utc::now() + chrono::Duration::minutes(minutes as i64);
        let trigger_name = format!("{}{}", self.prefix(), fire_at.format("%Y%m%d%H%M"));

        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Idempotent cleanup: aborting an already-finished trigger is a no-op.
        let prefix = self.prefix();
        let stale: Vec<String> = pending
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect();
        for name in stale {
            if let Some(handle) = pending.remove(&name) {
                handle.abort();
                info!("removed pending trigger {name}");
            }
        }

        let cycle_tx = self.cycle_tx.clone();
        let task_name = trigger_name.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
            if let Err(e) = cycle_tx.send(TriggerOrigin::Schedule).await {
                warn!("trigger {task_name} could not request a cycle: {e}");
            }
        });
        pending.insert(trigger_name.clone(), handle);

        info!("next run scheduled in {minutes} minutes ({fire_at}), trigger {trigger_name}");
    }

    fn prefix(&self) -> String {
        format!("{}-trigger-", self.job_name)
    }

    pub fn pending_trigger_count(&self) -> usize {
        match self.pending.lock() {
            Ok(p) => p.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
