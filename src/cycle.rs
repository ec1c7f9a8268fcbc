use std::sync::Arc;

use tracing::{error, info, warn};

use crate::db::ItemStore;
use crate::lock::{AcquireOutcome, RunLockManager};
use crate::notifier::Notifier;
use crate::scanner::SaleScanner;
use crate::scheduler::Rescheduler;
use crate::types::{CycleOutcome, CycleReport, TriggerOrigin};

/// Runs one full scan cycle: lock → scan → notify → persist → release →
/// reschedule. Shared by the scheduled trigger path and the on-demand API.
pub struct CycleRunner {
    store: ItemStore,
    lock: RunLockManager,
    scanner: SaleScanner,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<Rescheduler>,
    job_name: String,
}

impl CycleRunner {
    pub fn new(
        store: ItemStore,
        lock: RunLockManager,
        scanner: SaleScanner,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<Rescheduler>,
        job_name: String,
    ) -> Self {
        Self { store, lock, scanner, notifier, scheduler, job_name }
    }

    pub async fn run(&self, origin: TriggerOrigin) -> CycleOutcome {
        info!("starting sale scan cycle (origin: {origin:?})");

        let outcome = self.run_locked().await;

        // The next trigger is independent of this cycle's outcome: a busy
        // lock or a failed run must not break the chain. Only on-demand
        // invocations skip it.
        if origin == TriggerOrigin::Schedule {
            self.scheduler.schedule_next();
        } else {
            info!("on-demand cycle — not rescheduling");
        }

        outcome
    }

    async fn run_locked(&self) -> CycleOutcome {
        match self.lock.acquire(&self.job_name).await {
            Ok(AcquireOutcome::Acquired) => {}
            Ok(AcquireOutcome::Busy) => {
                warn!("a scan is already running — skipping this cycle");
                return CycleOutcome::Busy;
            }
            Err(e) => {
                error!("failed to check/set the run lock: {e}");
                return CycleOutcome::Failed(e.to_string());
            }
        }

        let result = self.scan_and_persist().await;

        // Release on every exit path. A release failure after an error must
        // not mask the error already being reported.
        if let Err(e) = self.lock.release().await {
            error!("failed to release the run lock: {e}");
        }

        match result {
            Ok(report) => {
                info!(
                    "cycle complete: {} items processed, {} notified",
                    report.processed_items_count, report.sale_items_count,
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                error!("cycle failed: {e}");
                CycleOutcome::Failed(e.to_string())
            }
        }
    }

    async fn scan_and_persist(&self) -> crate::error::Result<CycleReport> {
        let mut items = self.store.list_items().await?;
        info!("scanning {} watched items", items.len());

        let candidates = self.scanner.scan(&mut items).await;

        if candidates.is_empty() {
            info!("no sale items to notify");
        } else {
            info!("{} sale items detected — notifying", candidates.len());
            // Best effort: scanning completed, a transport failure does not
            // fail the cycle.
            if let Err(e) = self.notifier.notify(&candidates).await {
                error!("notification failed: {e}");
            }
        }

        for item in &items {
            if let Err(e) = self.store.update_scan_fields(item).await {
                error!(item_id = %item.id, "failed to persist item: {e}");
            }
        }

        Ok(CycleReport {
            processed_items_count: items.len(),
            sale_items_count: candidates.len(),
        })
    }
}
