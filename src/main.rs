mod api;
mod config;
mod cycle;
mod db;
mod detector;
mod error;
mod fetcher;
mod lock;
mod notifier;
mod scanner;
mod scheduler;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::cycle::CycleRunner;
use crate::db::ItemStore;
use crate::error::Result;
use crate::fetcher::HttpPageFetcher;
use crate::lock::RunLockManager;
use crate::notifier::LineNotifier;
use crate::scanner::{SaleScanner, SaleThresholds, ScanPacing};
use crate::scheduler::Rescheduler;
use crate::types::TriggerOrigin;

/// Capacity for the cycle-request channel. Requests are rare (one pending
/// trigger plus the odd on-demand call), so small is plenty.
const CYCLE_CHANNEL_CAPACITY: usize = 8;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool =
        sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let store = ItemStore::new(pool);

    if cfg.line_channel_access_token.is_empty() || cfg.line_user_id.is_empty() {
        warn!("LINE_CHANNEL_ACCESS_TOKEN / LINE_USER_ID not set — sale notifications will be skipped");
    }

    // --- Cycle pipeline ---
    let (cycle_tx, mut cycle_rx) = mpsc::channel::<TriggerOrigin>(CYCLE_CHANNEL_CAPACITY);
    let scheduler = Arc::new(Rescheduler::new(cfg.job_name.clone(), cycle_tx.clone()));

    let scanner = SaleScanner::new(
        Arc::new(HttpPageFetcher::new()?),
        SaleThresholds {
            sale_percentage: cfg.sale_percentage,
            sale_price: cfg.sale_price,
            cooldown_days: cfg.notification_interval_days,
        },
        ScanPacing::default(),
    );
    let notifier = Arc::new(LineNotifier::new(
        cfg.line_channel_access_token.clone(),
        cfg.line_user_id.clone(),
    )?);
    let runner = Arc::new(CycleRunner::new(
        store.clone(),
        RunLockManager::new(store.clone(), cfg.lock_ttl_minutes),
        scanner,
        notifier,
        Arc::clone(&scheduler),
        cfg.job_name.clone(),
    ));

    // Scheduled-cycle worker: one request at a time, in arrival order.
    let worker_runner = Arc::clone(&runner);
    tokio::spawn(async move {
        while let Some(origin) = cycle_rx.recv().await {
            let outcome = worker_runner.run(origin).await;
            info!("cycle worker outcome: {outcome:?}");
        }
    });

    // Kick off the first scheduled cycle immediately; it reschedules itself.
    if let Err(e) = cycle_tx.send(TriggerOrigin::Schedule).await {
        error!("failed to enqueue the initial cycle: {e}");
    }

    // --- HTTP API server ---
    let api_state = ApiState { store, runner };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
