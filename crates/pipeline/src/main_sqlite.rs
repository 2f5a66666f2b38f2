// Rust guideline compliant 2026-03-07

//! Transfer pipeline entry point -- `SQLite` ledger demo.
//!
//! Identical to the main `transfer_pipeline` binary except that the wallet
//! store is backed by a `SQLite` file (`transfer_pipeline.db` in the current
//! working directory) instead of an in-memory map. This demonstrates that the
//! hexagonal `WalletStore` port is truly swappable: only this entry point and
//! the adapter change; the gateway, broker, and consumer crates are untouched.
//! Wallets and transfer history survive restarts; seeded wallets are reused
//! when they already exist.
//!
//! # Usage
//!
//! ```text
//! # Infinite mode -- press CTRL+C to stop
//! RUST_LOG=info cargo run --bin transfer_pipeline_sqlite
//!
//! # Also show per-event debug output
//! RUST_LOG=debug cargo run --bin transfer_pipeline_sqlite
//! ```
//!
//! The file `transfer_pipeline.db` is created on first run. Inspect rows with
//! any `SQLite` browser.

mod adapters;

// Load sqlite_wallet_store directly so it only enters this binary's module
// tree, avoiding dead_code warnings in the `transfer_pipeline` binary (which
// uses InMemoryWalletStore instead).
#[path = "adapters/sqlite_wallet_store.rs"]
mod sqlite_wallet_store;

use adapters::file_audit_log::FileAuditLog;
use adapters::log_alert::LogAlert;
use anyhow::Context as _;
use broker::EventLog;
use domain::{LedgerError, TransferRequest, WalletStore as _};
use gateway::{GatewayConfig, GatewayError, Queries, TransferGateway};
use notifier::{Notifier, NotifierConfig, SharedNotificationStore};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use screen::{FraudPolicy, FraudScreen, ScreenConfig};
use sqlite_wallet_store::SqliteWalletStore;
use std::sync::Arc;
use std::time::Duration;

/// Database file created in the current working directory on first run.
///
/// Using the current working directory is acceptable for a demo binary. A
/// production deployment would read this from configuration or environment.
const DB_URL: &str = "sqlite:transfer_pipeline.db";

/// Partitions per topic; one consumer task per group per partition.
const PARTITIONS: usize = 4;
/// Consumer group reading the raw transfer topic.
const SCREEN_GROUP: &str = "fraud-screen";
/// Consumer group reading the filtered clean topic.
const NOTIFIER_GROUP: &str = "notifier";
/// Audit file created in the current working directory.
const AUDIT_PATH: &str = "transfer-audit.log";
/// Demo users and their starting balances.
const SEED_WALLETS: &[(i64, i64)] =
    &[(1, 10_000_000), (2, 10_000_000), (3, 10_000_000), (4, 10_000_000)];
/// Delay between demo transfers; keeps logs readable in real time.
const DRIVE_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // SqliteWalletStore: opens or creates transfer_pipeline.db in the working
    // directory. Wallets persist, so seeding reuses existing rows.
    let wallet_store = SqliteWalletStore::new(DB_URL)
        .await
        .context("failed to open SQLite wallet store")?;
    for &(owner, balance) in SEED_WALLETS {
        let wallet = match wallet_store.get_by_owner(owner).await {
            Ok(wallet) => wallet,
            Err(LedgerError::UserNotFound { .. }) => {
                wallet_store.create(owner, balance).await?
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(owner, wallet = wallet.id, balance = wallet.balance, "main.seeded");
    }

    let raw_log = EventLog::new(PARTITIONS);
    let clean_log = EventLog::new(PARTITIONS);

    // -- Fraud screen: one task per raw partition, forwarding clean events --
    let mut screen_tasks = Vec::with_capacity(PARTITIONS);
    for partition in 0..PARTITIONS {
        let source = raw_log.subscribe(SCREEN_GROUP, partition);
        let downstream = clean_log.clone();
        let config = ScreenConfig::builder(50)
            .build()
            .context("failed to build screen config")?;
        let screen = FraudScreen::new(config, FraudPolicy::default());
        screen_tasks.push(tokio::spawn(async move {
            screen.run(&source, &LogAlert::new(), &downstream).await
        }));
    }

    // -- Notifier: one task per clean partition, feeding the shared store --
    let notification_store = Arc::new(SharedNotificationStore::new());
    let audit = Arc::new(
        FileAuditLog::create(AUDIT_PATH)
            .await
            .context("failed to open audit log")?,
    );
    let mut notifier_tasks = Vec::with_capacity(PARTITIONS);
    for partition in 0..PARTITIONS {
        let source = clean_log.subscribe(NOTIFIER_GROUP, partition);
        let store = Arc::clone(&notification_store);
        let audit = Arc::clone(&audit);
        let config = NotifierConfig::builder(50)
            .build()
            .context("failed to build notifier config")?;
        let notifier = Notifier::new(config);
        notifier_tasks.push(tokio::spawn(async move {
            notifier.run(&source, audit.as_ref(), store.as_ref()).await
        }));
    }

    // -- Demo driver: random transfers, some above the fraud threshold --
    let gateway = TransferGateway::new(
        GatewayConfig::builder()
            .build()
            .context("failed to build gateway config")?,
    );
    let driver = async {
        let mut rng = StdRng::from_os_rng();
        loop {
            let from = SEED_WALLETS[rng.random_range(0..SEED_WALLETS.len())].0;
            let mut to = from;
            while to == from {
                to = SEED_WALLETS[rng.random_range(0..SEED_WALLETS.len())].0;
            }
            // Up to 1.5x the fraud threshold so some transfers get flagged.
            let amount = rng.random_range(1..=1_500_000);
            let request = TransferRequest { from_owner: from, to_owner: to, amount };
            match gateway.submit(&wallet_store, &raw_log, request).await {
                Ok(outcome) => tracing::info!(
                    from,
                    to,
                    amount,
                    balance = outcome.source_wallet.balance,
                    published = outcome.published,
                    "main.transfer.accepted"
                ),
                Err(GatewayError::Ledger(LedgerError::InsufficientFunds { .. })) => {
                    tracing::info!(from, to, amount, "main.transfer.declined");
                }
                Err(e) => tracing::warn!(error = %e, "main.transfer.failed"),
            }
            tokio::time::sleep(DRIVE_INTERVAL).await;
        }
    };

    // Race the driver against CTRL+C, then cascade the shutdown:
    // raw close -> screens drain -> clean close -> notifiers drain.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received, closing event logs");
        }
        _ = driver => {}
    }

    raw_log.close();
    for task in screen_tasks {
        task.await.context("screen task panicked")??;
    }
    clean_log.close();
    for task in notifier_tasks {
        task.await.context("notifier task panicked")??;
    }

    // -- Summary: balances stay conserved; feeds reflect clean transfers --
    let queries = Queries::new();
    let mut total = 0;
    for &(owner, _) in SEED_WALLETS {
        let wallet = queries.wallet(&wallet_store, owner).await?;
        let notifications = queries.notifications(notification_store.as_ref(), owner);
        tracing::info!(
            owner,
            balance = wallet.balance,
            notifications = notifications.len(),
            "main.summary"
        );
        total += wallet.balance;
    }
    tracing::info!(
        total,
        delivered = notification_store.len(),
        "main.summary.totals"
    );

    Ok(())
}
