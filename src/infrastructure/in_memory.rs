use super::locks::{RowKey, RowLocks};
use super::sequence::Sequences;
use super::write_set::WriteSet;
use crate::domain::fee::{Fee, NewFee};
use crate::domain::invoice::{Invoice, NewInvoice};
use crate::domain::item::Item;
use crate::domain::ports::{RentalStore, StoreTransaction};
use crate::domain::rental::{NewRental, Rental};
use crate::domain::{FeeId, InvoiceId, ItemId, RentalId, RenterId};
use crate::error::{RentalError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<ItemId, Item>,
    rentals: BTreeMap<RentalId, Rental>,
    fees: BTreeMap<FeeId, Fee>,
    invoices: BTreeMap<InvoiceId, Invoice>,
}

/// A thread-safe in-memory rental store.
///
/// Committed rows live in `Arc<RwLock<Tables>>`. Row-level exclusivity comes
/// from the shared [`RowLocks`], so transactions on different rows run
/// concurrently and only the final apply step takes the table write lock.
/// Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: Arc<RowLocks>,
    sequences: Arc<Sequences>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose transactions give up waiting for a row
    /// lock after `lock_wait`.
    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            locks: Arc::new(RowLocks::new(lock_wait)),
            ..Self::default()
        }
    }

    /// Number of invoices ever issued.
    pub async fn invoice_count(&self) -> usize {
        self.tables.read().await.invoices.len()
    }

    /// All rentals, open or closed.
    pub async fn all_rentals(&self) -> Vec<Rental> {
        self.tables.read().await.rentals.values().cloned().collect()
    }
}

#[async_trait]
impl RentalStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            tables: self.tables.clone(),
            sequences: self.sequences.clone(),
            writes: WriteSet::new(self.locks.clone()),
        }))
    }

    async fn register_item(&self, item: Item) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.items.contains_key(&item.id) {
            return Ok(false);
        }
        tables.items.insert(item.id, item);
        Ok(true)
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.items.get(&item_id).cloned())
    }

    async fn items(&self) -> Result<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.items.values().cloned().collect())
    }

    async fn fees_of_renter(&self, renter_id: RenterId) -> Result<Vec<(Fee, Rental)>> {
        let tables = self.tables.read().await;
        let fees = tables
            .fees
            .values()
            .filter_map(|fee| {
                tables
                    .rentals
                    .get(&fee.rental_id)
                    .filter(|rental| rental.renter_id == renter_id)
                    .map(|rental| (fee.clone(), rental.clone()))
            })
            .collect();
        Ok(fees)
    }

    async fn rentals_of_renter(&self, renter_id: RenterId) -> Result<Vec<Rental>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rentals
            .values()
            .filter(|rental| rental.renter_id == renter_id)
            .cloned()
            .collect())
    }

    async fn invoices_of_renter(&self, renter_id: RenterId) -> Result<Vec<Invoice>> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .values()
            .filter(|invoice| invoice.renter_id == renter_id)
            .cloned()
            .collect())
    }
}

/// One open transaction against an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
    writes: WriteSet,
}

impl InMemoryTransaction {
    async fn current_rental(&self, rental_id: RentalId) -> Option<Rental> {
        if let Some(staged) = self.writes.rentals.get(&rental_id) {
            return Some(staged.clone());
        }
        self.tables.read().await.rentals.get(&rental_id).cloned()
    }

    async fn current_fee(&self, fee_id: FeeId) -> Option<Fee> {
        if let Some(staged) = self.writes.fees.get(&fee_id) {
            return Some(staged.clone());
        }
        self.tables.read().await.fees.get(&fee_id).cloned()
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>> {
        self.writes.lock(RowKey::Item(item_id)).await?;
        if let Some(staged) = self.writes.items.get(&item_id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.tables.read().await.items.get(&item_id).cloned())
    }

    async fn lock_fee(&mut self, fee_id: FeeId) -> Result<Option<(Fee, Rental)>> {
        self.writes.lock(RowKey::Fee(fee_id)).await?;
        let Some(fee) = self.current_fee(fee_id).await else {
            return Ok(None);
        };

        self.writes.lock(RowKey::Rental(fee.rental_id)).await?;
        let rental = self.current_rental(fee.rental_id).await.ok_or_else(|| {
            RentalError::Storage(format!(
                "fee {} references missing rental {}",
                fee.id, fee.rental_id
            ))
        })?;
        Ok(Some((fee, rental)))
    }

    async fn insert_rental(&mut self, rental: NewRental) -> Result<Rental> {
        let rental = rental.with_id(self.sequences.rentals.next_id());
        self.writes.insert_rental(rental.clone());
        Ok(rental)
    }

    async fn insert_fee(&mut self, fee: NewFee) -> Result<Fee> {
        let fee = fee.with_id(self.sequences.fees.next_id());
        self.writes.insert_fee(fee.clone());
        Ok(fee)
    }

    async fn insert_invoice(&mut self, invoice: NewInvoice) -> Result<Invoice> {
        let invoice = invoice.with_id(self.sequences.invoices.next_id());
        self.writes.insert_invoice(invoice.clone());
        Ok(invoice)
    }

    async fn update_item(&mut self, item: Item) -> Result<()> {
        self.writes.stage_item(item)
    }

    async fn update_rental(&mut self, rental: Rental) -> Result<()> {
        self.writes.stage_rental(rental)
    }

    async fn update_fee(&mut self, fee: Fee) -> Result<()> {
        let committed = self.tables.read().await.fees.get(&fee.id).cloned();
        self.writes.stage_fee(fee, committed.as_ref())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            tables, mut writes, ..
        } = *self;

        {
            // Staged rows are either new or locked by us, so applying them
            // cannot overwrite another transaction's work.
            let mut tables = tables.write().await;
            tables.items.append(&mut writes.items);
            tables.rentals.append(&mut writes.rentals);
            tables.fees.append(&mut writes.fees);
            tables.invoices.append(&mut writes.invoices);
        }

        writes.release();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.writes.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn store_with_item() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.register_item(Item::new(1, "Alien")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_register_item_keeps_existing_row() {
        let store = store_with_item().await;
        let mut rented = Item::new(1, "Alien");
        rented.available = false;

        assert!(!store.register_item(rented).await.unwrap());
        assert!(store.item(1).await.unwrap().unwrap().available);
        assert!(store.register_item(Item::new(2, "Heat")).await.unwrap());
        assert_eq!(store.items().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = store_with_item().await;

        let mut tx = store.begin().await.unwrap();
        let mut item = tx.lock_item(1).await.unwrap().unwrap();
        item.available = false;
        tx.update_item(item).await.unwrap();
        let rental = tx
            .insert_rental(NewRental {
                item_id: 1,
                renter_id: 7,
                rented_at: Utc::now(),
            })
            .await
            .unwrap();

        // Not visible before commit.
        assert!(store.item(1).await.unwrap().unwrap().available);
        assert!(store.rentals_of_renter(7).await.unwrap().is_empty());

        tx.commit().await.unwrap();

        assert!(!store.item(1).await.unwrap().unwrap().available);
        assert_eq!(store.rentals_of_renter(7).await.unwrap(), vec![rental]);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = store_with_item().await;

        let mut tx = store.begin().await.unwrap();
        let mut item = tx.lock_item(1).await.unwrap().unwrap();
        item.available = false;
        tx.update_item(item).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.item(1).await.unwrap().unwrap().available);
    }

    #[tokio::test]
    async fn test_dropped_transaction_releases_lock() {
        let store = InMemoryStore::with_lock_wait(Duration::from_millis(50));
        store.register_item(Item::new(1, "Alien")).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_item(1).await.unwrap();

        let mut second = store.begin().await.unwrap();
        assert!(matches!(
            second.lock_item(1).await,
            Err(RentalError::LockTimeout(_))
        ));

        drop(first);
        assert!(second.lock_item(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_without_lock_is_rejected() {
        let store = store_with_item().await;
        let mut tx = store.begin().await.unwrap();
        let result = tx.update_item(Item::new(1, "Alien")).await;
        assert!(matches!(result, Err(RentalError::Storage(_))));
    }

    #[tokio::test]
    async fn test_lock_fee_joins_rental() {
        let store = store_with_item().await;

        let mut tx = store.begin().await.unwrap();
        let rental = tx
            .insert_rental(NewRental {
                item_id: 1,
                renter_id: 3,
                rented_at: Utc::now(),
            })
            .await
            .unwrap();
        let fee = tx
            .insert_fee(NewFee {
                rental_id: rental.id,
                amount: Amount::new(dec!(10.00)),
                reason: "start".to_string(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let (locked_fee, locked_rental) = tx.lock_fee(fee.id).await.unwrap().unwrap();
        assert_eq!(locked_fee, fee);
        assert_eq!(locked_rental, rental);
        assert!(tx.lock_fee(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reads_filter_by_renter() {
        let store = store_with_item().await;
        store.register_item(Item::new(2, "Heat")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        for (item_id, renter_id) in [(1, 10), (2, 20)] {
            let rental = tx
                .insert_rental(NewRental {
                    item_id,
                    renter_id,
                    rented_at: Utc::now(),
                })
                .await
                .unwrap();
            tx.insert_fee(NewFee {
                rental_id: rental.id,
                amount: Amount::new(dec!(10.00)),
                reason: "start".to_string(),
            })
            .await
            .unwrap();
        }
        tx.insert_invoice(NewInvoice {
            renter_id: 10,
            issued_at: Utc::now(),
            total: Amount::new(dec!(10.00)),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let fees = store.fees_of_renter(10).await.unwrap();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].1.item_id, 1);
        assert_eq!(store.invoices_of_renter(10).await.unwrap().len(), 1);
        assert!(store.invoices_of_renter(20).await.unwrap().is_empty());
        assert_eq!(store.invoice_count().await, 1);
    }
}
