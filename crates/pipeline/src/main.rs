// Rust guideline compliant 2026-03-07

//! Transfer pipeline entry point -- in-memory ledger demo.
//!
//! Wires the transfer gateway, the raw and clean event logs, one fraud-screen
//! task per raw partition, and one notifier task per clean partition, then
//! drives the pipeline with random transfer traffic (some of it above the
//! fraud threshold) until CTRL+C.
//!
//! # Usage
//!
//! ```text
//! # Infinite mode -- press CTRL+C to stop
//! RUST_LOG=info cargo run --bin transfer_pipeline
//!
//! # Also show per-event debug output
//! RUST_LOG=debug cargo run --bin transfer_pipeline
//! ```

mod adapters;

use adapters::file_audit_log::FileAuditLog;
use adapters::in_memory_wallet_store::InMemoryWalletStore;
use adapters::log_alert::LogAlert;
use anyhow::Context as _;
use broker::EventLog;
use domain::{TransferRequest, WalletStore as _};
use gateway::{GatewayConfig, GatewayError, Queries, TransferGateway};
use notifier::{Notifier, NotifierConfig, SharedNotificationStore};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use screen::{FraudPolicy, FraudScreen, ScreenConfig};
use std::sync::Arc;
use std::time::Duration;

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

    let wallet_store = InMemoryWalletStore::new();
    for &(owner, balance) in SEED_WALLETS {
        let wallet = wallet_store.create(owner, balance).await?;
        tracing::info!(owner, wallet = wallet.id, balance, "main.seeded");
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
                Err(GatewayError::Ledger(domain::LedgerError::InsufficientFunds { .. })) => {
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
