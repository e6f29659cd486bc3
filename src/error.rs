use crate::domain::{FeeId, ItemId};
use thiserror::Error;

/// Every way a rental operation can end other than success.
///
/// The first group are business outcomes: the transaction was rolled back
/// because a rule said no, and nothing is wrong with the system. The rest are
/// storage faults; the transaction was rolled back and the whole operation
/// may be retried.
#[derive(Error, Debug)]
pub enum RentalError {
    #[error("item {0} is not available for rent")]
    ItemUnavailable(ItemId),
    #[error("fee {0} is already paid")]
    AlreadyPaid(FeeId),
    #[error("fee {0} does not belong to the caller")]
    NotOwner(FeeId),
    #[error("invalid {0} id")]
    InvalidId(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("lock wait timeout on {0}")]
    LockTimeout(String),
    #[error("amount overflow: {0}")]
    AmountOverflow(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl RentalError {
    /// True for infrastructure faults, false for business rule rejections.
    pub fn is_storage_fault(&self) -> bool {
        match self {
            RentalError::ItemUnavailable(_)
            | RentalError::AlreadyPaid(_)
            | RentalError::NotOwner(_)
            | RentalError::InvalidId(_)
            | RentalError::InvalidConfig(_) => false,
            RentalError::Storage(_)
            | RentalError::LockTimeout(_)
            | RentalError::AmountOverflow(_)
            | RentalError::Io(_)
            | RentalError::Csv(_)
            | RentalError::Serialization(_) => true,
            #[cfg(feature = "storage-rocksdb")]
            RentalError::RocksDb(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, RentalError>;
