use super::locks::{RowKey, RowLocks};
use super::sequence::{IdSequence, Sequences};
use super::write_set::WriteSet;
use crate::domain::fee::{Fee, NewFee};
use crate::domain::invoice::{Invoice, NewInvoice};
use crate::domain::item::Item;
use crate::domain::ports::{RentalStore, StoreTransaction};
use crate::domain::rental::{NewRental, Rental};
use crate::domain::{FeeId, ItemId, RentalId, RenterId};
use crate::error::{RentalError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Column Family for inventory items.
pub const CF_ITEMS: &str = "items";
/// Column Family for rentals.
pub const CF_RENTALS: &str = "rentals";
/// Column Family for fees.
pub const CF_FEES: &str = "fees";
/// Column Family for invoices.
pub const CF_INVOICES: &str = "invoices";

const COLUMN_FAMILIES: [&str; 4] = [CF_ITEMS, CF_RENTALS, CF_FEES, CF_INVOICES];

/// A persistent rental store backed by RocksDB.
///
/// Each entity lives in its own column family keyed by its big-endian id,
/// with JSON values. A transaction stages its rows in memory and commits them
/// with a single `WriteBatch`, so a crash never leaves half a settlement on
/// disk. Row locks are held in process; RocksDB's own lock file keeps a
/// second process from opening the same path.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: Arc<RowLocks>,
    sequences: Arc<Sequences>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column family. Id sequences resume after the highest stored id.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_wait(path, super::locks::DEFAULT_LOCK_WAIT)
    }

    pub fn open_with_lock_wait<P: AsRef<Path>>(path: P, lock_wait: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let sequences = Sequences {
            rentals: IdSequence::starting_at(last_key(&db, CF_RENTALS)? + 1),
            fees: IdSequence::starting_at(last_key(&db, CF_FEES)? + 1),
            invoices: IdSequence::starting_at(last_key(&db, CF_INVOICES)? + 1),
        };

        Ok(Self {
            db: Arc::new(db),
            locks: Arc::new(RowLocks::new(lock_wait)),
            sequences: Arc::new(sequences),
        })
    }
}

fn column<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| RentalError::Storage(format!("{name} column family not found")))
}

fn last_key(db: &DB, name: &str) -> Result<u64> {
    let cf = column(db, name)?;
    match db.iterator_cf(cf, IteratorMode::End).next() {
        Some(entry) => {
            let (key, _) = entry?;
            decode_key(&key)
        }
        None => Ok(0),
    }
}

fn decode_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| RentalError::Storage(format!("malformed key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn get_row<T: DeserializeOwned>(db: &DB, name: &str, id: u64) -> Result<Option<T>> {
    let cf = column(db, name)?;
    match db.get_pinned_cf(cf, id.to_be_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn scan<T: DeserializeOwned>(db: &DB, name: &str) -> Result<Vec<T>> {
    let cf = column(db, name)?;
    let mut rows = Vec::new();
    for entry in db.iterator_cf(cf, IteratorMode::Start) {
        let (_key, value) = entry?;
        rows.push(serde_json::from_slice(&value)?);
    }
    Ok(rows)
}

fn put_row<T: Serialize>(
    db: &DB,
    batch: &mut WriteBatch,
    name: &str,
    id: u64,
    row: &T,
) -> Result<()> {
    let cf = column(db, name)?;
    batch.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(row)?);
    Ok(())
}

#[async_trait]
impl RentalStore for RocksDBStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(RocksDBTransaction {
            db: self.db.clone(),
            sequences: self.sequences.clone(),
            writes: WriteSet::new(self.locks.clone()),
        }))
    }

    async fn register_item(&self, item: Item) -> Result<bool> {
        // Serialize against transactions touching the same item.
        let _row = self.locks.acquire(RowKey::Item(item.id)).await?;
        if get_row::<Item>(&self.db, CF_ITEMS, item.id)?.is_some() {
            return Ok(false);
        }
        let cf = column(&self.db, CF_ITEMS)?;
        self.db
            .put_cf(cf, item.id.to_be_bytes(), serde_json::to_vec(&item)?)?;
        Ok(true)
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>> {
        get_row(&self.db, CF_ITEMS, item_id)
    }

    async fn items(&self) -> Result<Vec<Item>> {
        scan(&self.db, CF_ITEMS)
    }

    async fn fees_of_renter(&self, renter_id: RenterId) -> Result<Vec<(Fee, Rental)>> {
        let rentals: Vec<Rental> = self.rentals_of_renter(renter_id).await?;
        let ids: HashSet<RentalId> = rentals.iter().map(|rental| rental.id).collect();

        let fees: Vec<Fee> = scan(&self.db, CF_FEES)?;
        Ok(fees
            .into_iter()
            .filter(|fee| ids.contains(&fee.rental_id))
            .filter_map(|fee| {
                rentals
                    .iter()
                    .find(|rental| rental.id == fee.rental_id)
                    .cloned()
                    .map(|rental| (fee, rental))
            })
            .collect())
    }

    async fn rentals_of_renter(&self, renter_id: RenterId) -> Result<Vec<Rental>> {
        let rentals: Vec<Rental> = scan(&self.db, CF_RENTALS)?;
        Ok(rentals
            .into_iter()
            .filter(|rental| rental.renter_id == renter_id)
            .collect())
    }

    async fn invoices_of_renter(&self, renter_id: RenterId) -> Result<Vec<Invoice>> {
        let invoices: Vec<Invoice> = scan(&self.db, CF_INVOICES)?;
        Ok(invoices
            .into_iter()
            .filter(|invoice| invoice.renter_id == renter_id)
            .collect())
    }
}

/// One open transaction against a [`RocksDBStore`].
pub struct RocksDBTransaction {
    db: Arc<DB>,
    sequences: Arc<Sequences>,
    writes: WriteSet,
}

impl RocksDBTransaction {
    fn current_fee(&self, fee_id: FeeId) -> Result<Option<Fee>> {
        match self.writes.fees.get(&fee_id) {
            Some(staged) => Ok(Some(staged.clone())),
            None => get_row(&self.db, CF_FEES, fee_id),
        }
    }

    fn current_rental(&self, rental_id: RentalId) -> Result<Option<Rental>> {
        match self.writes.rentals.get(&rental_id) {
            Some(staged) => Ok(Some(staged.clone())),
            None => get_row(&self.db, CF_RENTALS, rental_id),
        }
    }
}

#[async_trait]
impl StoreTransaction for RocksDBTransaction {
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>> {
        self.writes.lock(RowKey::Item(item_id)).await?;
        match self.writes.items.get(&item_id) {
            Some(staged) => Ok(Some(staged.clone())),
            None => get_row(&self.db, CF_ITEMS, item_id),
        }
    }

    async fn lock_fee(&mut self, fee_id: FeeId) -> Result<Option<(Fee, Rental)>> {
        self.writes.lock(RowKey::Fee(fee_id)).await?;
        let Some(fee) = self.current_fee(fee_id)? else {
            return Ok(None);
        };

        self.writes.lock(RowKey::Rental(fee.rental_id)).await?;
        let rental = self.current_rental(fee.rental_id)?.ok_or_else(|| {
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
        let committed: Option<Fee> = get_row(&self.db, CF_FEES, fee.id)?;
        self.writes.stage_fee(fee, committed.as_ref())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let RocksDBTransaction { db, writes, .. } = *self;

        if !writes.is_empty() {
            let mut batch = WriteBatch::default();
            for (id, item) in &writes.items {
                put_row(&db, &mut batch, CF_ITEMS, *id, item)?;
            }
            for (id, rental) in &writes.rentals {
                put_row(&db, &mut batch, CF_RENTALS, *id, rental)?;
            }
            for (id, fee) in &writes.fees {
                put_row(&db, &mut batch, CF_FEES, *id, fee)?;
            }
            for (id, invoice) in &writes.invoices {
                put_row(&db, &mut batch, CF_INVOICES, *id, invoice)?;
            }
            db.write(batch)?;
        }

        writes.release();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.writes.release();
        Ok(())
    }
}
