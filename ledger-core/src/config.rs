//! Configuration for the ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Annual rate (percent) written to the default-rate setting when the
    /// store is first seeded
    pub default_interest_rate: Decimal,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Seed bootstrap configuration
    pub seed: SeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "demobank-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            default_interest_rate: Decimal::new(35, 1), // 3.5%
            rocksdb: RocksDbConfig::default(),
            scheduler: SchedulerConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
        }
    }
}

/// Scheduler configuration
///
/// No distributed lock is taken: run exactly one scheduler instance per
/// deployment, or the batch jobs execute once per instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// UTC hour at which the daily accrual fires
    pub accrual_hour: u32,

    /// UTC minute at which the daily accrual fires
    pub accrual_minute: u32,

    /// Day of month on which the monthly credit fires (clamped to the last
    /// day of short months)
    pub credit_day_of_month: u32,

    /// UTC hour at which the monthly credit fires
    pub credit_hour: u32,

    /// UTC minute at which the monthly credit fires
    pub credit_minute: u32,

    /// Lookback window for the monthly credit, in days
    pub lookback_days: i64,

    /// Run one accrual and one credit pass immediately after startup
    /// (demo bootstrap)
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            accrual_hour: 0,
            accrual_minute: 0,   // daily at 00:00 UTC
            credit_day_of_month: 1,
            credit_hour: 0,
            credit_minute: 1,    // monthly on the 1st at 00:01 UTC
            lookback_days: 30,
            run_on_startup: false,
        }
    }
}

/// Seed bootstrap configuration (administrator account created on first
/// start if absent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Create the admin account and default-rate setting on startup
    pub enabled: bool,

    /// Admin display name
    pub admin_name: String,

    /// Admin login identifier
    pub admin_email: String,

    /// Admin credential hash (pre-hashed; the core never hashes passwords)
    pub admin_password_hash: String,

    /// Admin annual rate (percent)
    pub admin_rate: Decimal,

    /// Opening balance deposited into the admin account
    pub opening_balance: Decimal,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_name: "admin".to_string(),
            admin_email: "admin@demobank.local".to_string(),
            admin_password_hash: String::new(),
            admin_rate: Decimal::new(50, 1),       // 5.0%
            opening_balance: Decimal::from(1000),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(rate) = std::env::var("LEDGER_DEFAULT_INTEREST_RATE") {
            config.default_interest_rate = rate
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid rate: {}", rate)))?;
        }

        if let Ok(run) = std::env::var("LEDGER_RUN_JOBS_ON_STARTUP") {
            config.scheduler.run_on_startup = run == "1" || run.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }
}
