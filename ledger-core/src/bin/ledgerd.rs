//! Ledger daemon binary
//!
//! Opens the ledger, seeds the administrator account on first start, and
//! runs the batch-job scheduler until interrupted.

use ledger_core::{Config, Ledger, NewAccount, OperationKind, Role, Scheduler};
use rust_decimal::Decimal;
use std::error::Error;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting DemoBank Ledger");

    // Load configuration
    let config = Config::from_env()?;
    let scheduler_config = config.scheduler.clone();

    // Open ledger
    let ledger = Arc::new(Ledger::open(config).await?);
    tracing::info!("Ledger opened successfully");

    seed_if_needed(&ledger).await?;

    // Start the batch-job scheduler
    let scheduler = Scheduler::start(ledger.clone(), scheduler_config);

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger");
    scheduler.shutdown().await;
    ledger.shutdown().await?;
    Ok(())
}

/// Create the administrator account and default-rate setting on first start
async fn seed_if_needed(ledger: &Ledger) -> Result<(), Box<dyn Error>> {
    let seed = ledger.config().seed.clone();
    if !seed.enabled {
        return Ok(());
    }

    if ledger.account_by_email(&seed.admin_email)?.is_some() {
        tracing::debug!("Admin account already present, skipping seed");
        return Ok(());
    }

    let admin = ledger
        .register_account(NewAccount {
            name: seed.admin_name,
            email: seed.admin_email,
            password_hash: seed.admin_password_hash,
            role: Role::Administrator,
            rate_override: Some(seed.admin_rate),
        })
        .await?;

    if seed.opening_balance > Decimal::ZERO {
        ledger
            .perform_operation(
                admin.id,
                seed.opening_balance,
                OperationKind::Deposit,
                Some("Opening balance".to_string()),
            )
            .await?;
    }

    let default_rate = ledger.config().default_interest_rate;
    ledger.set_default_rate(default_rate).await?;

    tracing::info!(account_id = %admin.id, "Seeded admin account");
    Ok(())
}
