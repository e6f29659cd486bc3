use crate::domain::{FeeId, ItemId, RentalId};
use crate::error::{RentalError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

/// How long a transaction waits for a row lock before giving up.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Identifies one lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Item(ItemId),
    Rental(RentalId),
    Fee(FeeId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Item(id) => write!(f, "item {id}"),
            RowKey::Rental(id) => write!(f, "rental {id}"),
            RowKey::Fee(id) => write!(f, "fee {id}"),
        }
    }
}

/// Exclusive hold on one row. The lock is released when the guard drops.
#[derive(Debug)]
pub struct RowGuard {
    key: RowKey,
    _guard: OwnedMutexGuard<()>,
}

impl RowGuard {
    pub fn key(&self) -> RowKey {
        self.key
    }
}

/// Pessimistic row lock manager shared by all transactions of one store.
///
/// Each row gets its own async mutex, created on first use. Waiters are
/// granted the lock in FIFO order, which is what `tokio::sync::Mutex`
/// guarantees.
#[derive(Debug)]
pub struct RowLocks {
    rows: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    wait_timeout: Duration,
}

impl Default for RowLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_WAIT)
    }
}

impl RowLocks {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    /// Waits for the row lock on `key`, up to the configured timeout.
    pub async fn acquire(&self, key: RowKey) -> Result<RowGuard> {
        let row = {
            let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
            rows.entry(key).or_default().clone()
        };

        match tokio::time::timeout(self.wait_timeout, row.lock_owned()).await {
            Ok(guard) => Ok(RowGuard { key, _guard: guard }),
            Err(_) => Err(RentalError::LockTimeout(key.to_string())),
        }
    }

    /// Forgets rows nobody holds or waits on.
    pub fn prune(&self) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.retain(|_, row| Arc::strong_count(row) > 1);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
