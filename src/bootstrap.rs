//! Wires storage, catalog, clock and engine together from [`EngineArgs`].

use crate::application::catalog::StoreCatalog;
use crate::application::engine::RentalEngine;
use crate::config::EngineArgs;
use crate::domain::clock::SystemClock;
use crate::domain::item::Item;
use crate::domain::ports::RentalStoreRef;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryStore;
use crate::interfaces::csv::catalog_reader::CatalogReader;
use crate::interfaces::router::CommandRouter;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;

/// Opens the configured backend. RocksDB when `--db-path` is set and the
/// `storage-rocksdb` feature is compiled in, memory otherwise.
pub fn open_store(args: &EngineArgs) -> Result<RentalStoreRef> {
    match &args.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            tracing::info!(path = %path.display(), "opening RocksDB store");
            let store = crate::infrastructure::rocksdb::RocksDBStore::open_with_lock_wait(
                path,
                args.lock_wait(),
            )?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Arc::new(InMemoryStore::with_lock_wait(args.lock_wait())))
        }
        None => Ok(Arc::new(InMemoryStore::with_lock_wait(args.lock_wait()))),
    }
}

/// Registers every readable row of a catalog CSV. Bad rows are logged and
/// skipped. Returns how many items were newly added.
pub async fn seed_catalog<R: Read>(store: &RentalStoreRef, source: R) -> Result<usize> {
    let mut added = 0;
    for (row, record) in CatalogReader::new(source).records().enumerate() {
        match record {
            Ok(record) if record.id == 0 => {
                tracing::warn!(row = row + 1, "skipping catalog row with id 0");
            }
            Ok(record) => {
                let item = Item::from(record);
                let id = item.id;
                if store.register_item(item).await? {
                    added += 1;
                } else {
                    tracing::debug!(item_id = id, "catalog item already registered");
                }
            }
            Err(e) => tracing::warn!(row = row + 1, error = %e, "skipping bad catalog row"),
        }
    }
    Ok(added)
}

/// Builds a ready-to-serve router.
pub async fn build_router(args: &EngineArgs) -> Result<CommandRouter> {
    let tariff = args.tariff()?;
    let store = open_store(args)?;

    if let Some(path) = &args.catalog {
        let added = seed_catalog(&store, File::open(path)?).await?;
        tracing::info!(path = %path.display(), added, "catalog loaded");
    }

    let catalog = Arc::new(StoreCatalog::new(store.clone()));
    let engine = RentalEngine::new(store, catalog.clone(), Arc::new(SystemClock), tariff);
    Ok(CommandRouter::new(Arc::new(engine), catalog))
}
