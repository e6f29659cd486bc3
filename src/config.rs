use crate::domain::money::Amount;
use crate::domain::tariff::Tariff;
use crate::error::{RentalError, Result};
use crate::infrastructure::locks::DEFAULT_LOCK_WAIT;
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "FILMRENT_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// CSV file (`id,title`) of films to register at startup.
    #[arg(long, env = "FILMRENT_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    /// Flat fee charged when a rental starts.
    #[arg(long, env = "FILMRENT_BASE_FEE", default_value = "10.00", global = true)]
    pub base_fee: Decimal,

    /// Amount added per elapsed minute of an open rental.
    #[arg(long, env = "FILMRENT_ACCRUAL_RATE", default_value = "1.50", global = true)]
    pub accrual_rate: Decimal,

    /// How long a transaction waits for a row lock before giving up.
    #[arg(long, env = "FILMRENT_LOCK_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub lock_timeout_ms: u64,
}

impl EngineArgs {
    pub fn tariff(&self) -> Result<Tariff> {
        if self.base_fee.is_sign_negative() {
            return Err(RentalError::InvalidConfig(format!(
                "base fee must not be negative, got {}",
                self.base_fee
            )));
        }
        if self.accrual_rate.is_sign_negative() {
            return Err(RentalError::InvalidConfig(format!(
                "accrual rate must not be negative, got {}",
                self.accrual_rate
            )));
        }
        Ok(Tariff::new(Amount::new(self.base_fee), self.accrual_rate))
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for EngineArgs {
    fn default() -> Self {
        let tariff = Tariff::default();
        Self {
            db_path: None,
            catalog: None,
            base_fee: tariff.base_fee.value(),
            accrual_rate: tariff.accrual_rate,
            lock_timeout_ms: DEFAULT_LOCK_WAIT.as_millis() as u64,
        }
    }
}
