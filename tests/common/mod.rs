#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use filmrent::application::catalog::StoreCatalog;
use filmrent::application::engine::RentalEngine;
use filmrent::domain::clock::ManualClock;
use filmrent::domain::fee::{Fee, NewFee};
use filmrent::domain::invoice::{Invoice, NewInvoice};
use filmrent::domain::item::Item;
use filmrent::domain::ports::{RentalStore, RentalStoreRef, StoreTransaction};
use filmrent::domain::rental::{NewRental, Rental};
use filmrent::domain::tariff::Tariff;
use filmrent::domain::{FeeId, ItemId, RenterId};
use filmrent::error::{RentalError, Result};
use filmrent::infrastructure::in_memory::InMemoryStore;
use filmrent::interfaces::router::CommandRouter;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const FILMS: [(ItemId, &str); 3] = [(1, "Alien"), (2, "Heat"), (3, "Ran")];

/// An engine over an in-memory store, a manual clock and the default tariff.
pub struct Harness {
    pub store: InMemoryStore,
    pub clock: ManualClock,
    pub engine: Arc<RentalEngine>,
    pub router: CommandRouter,
}

impl Harness {
    pub async fn new() -> Self {
        Self::over(InMemoryStore::new(), None).await
    }

    /// Builds the engine on top of `store`, optionally seen through a
    /// [`FaultyStore`].
    pub async fn over(store: InMemoryStore, faulty: Option<FaultyStore>) -> Self {
        Self::build(store, faulty, Tariff::default()).await
    }

    pub async fn with_tariff(tariff: Tariff) -> Self {
        Self::build(InMemoryStore::new(), None, tariff).await
    }

    async fn build(store: InMemoryStore, faulty: Option<FaultyStore>, tariff: Tariff) -> Self {
        for (id, title) in FILMS {
            store.register_item(Item::new(id, title)).await.unwrap();
        }
        let backend: RentalStoreRef = match faulty {
            Some(faulty) => Arc::new(faulty),
            None => Arc::new(store.clone()),
        };
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
        let catalog = Arc::new(StoreCatalog::new(backend.clone()));
        let engine = Arc::new(RentalEngine::new(
            backend,
            catalog.clone(),
            Arc::new(clock.clone()),
            tariff,
        ));
        let router = CommandRouter::new(engine.clone(), catalog);
        Self {
            store,
            clock,
            engine,
            router,
        }
    }

    pub async fn send(&self, line: &str) -> Vec<String> {
        self.router.handle_line(line).await.lines()
    }

    /// Fails when an item's availability disagrees with its open rentals.
    pub async fn assert_availability_consistent(&self) {
        let rentals = self.store.all_rentals().await;
        for item in self.store.items().await.unwrap() {
            let open = rentals
                .iter()
                .filter(|r| r.item_id == item.id && r.is_open())
                .count();
            assert!(open <= 1, "item {} has {} open rentals", item.id, open);
            assert_eq!(
                item.available,
                open == 0,
                "item {} available={} with {} open rentals",
                item.id,
                item.available,
                open
            );
        }
    }
}

/// Wraps a store so that commits can be made to fail on demand.
#[derive(Clone)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_commits: Arc<AtomicBool>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_commits: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RentalStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }

    async fn register_item(&self, item: Item) -> Result<bool> {
        self.inner.register_item(item).await
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>> {
        self.inner.item(item_id).await
    }

    async fn items(&self) -> Result<Vec<Item>> {
        self.inner.items().await
    }

    async fn fees_of_renter(&self, renter_id: RenterId) -> Result<Vec<(Fee, Rental)>> {
        self.inner.fees_of_renter(renter_id).await
    }

    async fn rentals_of_renter(&self, renter_id: RenterId) -> Result<Vec<Rental>> {
        self.inner.rentals_of_renter(renter_id).await
    }

    async fn invoices_of_renter(&self, renter_id: RenterId) -> Result<Vec<Invoice>> {
        self.inner.invoices_of_renter(renter_id).await
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_commit: bool,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>> {
        self.inner.lock_item(item_id).await
    }

    async fn lock_fee(&mut self, fee_id: FeeId) -> Result<Option<(Fee, Rental)>> {
        self.inner.lock_fee(fee_id).await
    }

    async fn insert_rental(&mut self, rental: NewRental) -> Result<Rental> {
        self.inner.insert_rental(rental).await
    }

    async fn insert_fee(&mut self, fee: NewFee) -> Result<Fee> {
        self.inner.insert_fee(fee).await
    }

    async fn insert_invoice(&mut self, invoice: NewInvoice) -> Result<Invoice> {
        self.inner.insert_invoice(invoice).await
    }

    async fn update_item(&mut self, item: Item) -> Result<()> {
        self.inner.update_item(item).await
    }

    async fn update_rental(&mut self, rental: Rental) -> Result<()> {
        self.inner.update_rental(rental).await
    }

    async fn update_fee(&mut self, fee: Fee) -> Result<()> {
        self.inner.update_fee(fee).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit {
            self.inner.rollback().await?;
            return Err(RentalError::Storage("injected commit failure".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

/// Writes `lines` to a fresh temporary file.
pub fn script(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

pub fn catalog_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("films.csv");
    let mut wtr = csv::Writer::from_path(&path).unwrap();
    wtr.write_record(["id", "title"]).unwrap();
    for (id, title) in FILMS {
        wtr.write_record([id.to_string().as_str(), title]).unwrap();
    }
    wtr.flush().unwrap();
    path
}
