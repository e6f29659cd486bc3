use super::locks::{RowGuard, RowKey, RowLocks};
use crate::domain::fee::Fee;
use crate::domain::invoice::Invoice;
use crate::domain::item::Item;
use crate::domain::rental::Rental;
use crate::domain::{FeeId, InvoiceId, ItemId, RentalId};
use crate::error::{RentalError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Private state of one open transaction: the row locks it holds and the rows
/// it has staged.
///
/// Both store backends build their transactions on top of this. The backend
/// reads committed rows; the write set overlays the staged ones and decides
/// what may be written. Dropping it releases every lock and discards every
/// staged row.
pub struct WriteSet {
    locks: Arc<RowLocks>,
    held: HashMap<RowKey, RowGuard>,
    inserted: HashSet<RowKey>,
    pub items: BTreeMap<ItemId, Item>,
    pub rentals: BTreeMap<RentalId, Rental>,
    pub fees: BTreeMap<FeeId, Fee>,
    pub invoices: BTreeMap<InvoiceId, Invoice>,
}

impl WriteSet {
    pub fn new(locks: Arc<RowLocks>) -> Self {
        Self {
            locks,
            held: HashMap::new(),
            inserted: HashSet::new(),
            items: BTreeMap::new(),
            rentals: BTreeMap::new(),
            fees: BTreeMap::new(),
            invoices: BTreeMap::new(),
        }
    }

    /// Takes the row lock unless this transaction already holds it.
    pub async fn lock(&mut self, key: RowKey) -> Result<()> {
        if self.held.contains_key(&key) || self.inserted.contains(&key) {
            return Ok(());
        }
        let guard = self.locks.acquire(key).await?;
        self.held.insert(key, guard);
        Ok(())
    }

    pub fn holds(&self, key: RowKey) -> bool {
        self.held.contains_key(&key) || self.inserted.contains(&key)
    }

    fn ensure_writable(&self, key: RowKey) -> Result<()> {
        if self.holds(key) {
            Ok(())
        } else {
            Err(RentalError::Storage(format!(
                "{key} written without holding its lock"
            )))
        }
    }

    pub fn stage_item(&mut self, item: Item) -> Result<()> {
        self.ensure_writable(RowKey::Item(item.id))?;
        self.items.insert(item.id, item);
        Ok(())
    }

    pub fn stage_rental(&mut self, rental: Rental) -> Result<()> {
        self.ensure_writable(RowKey::Rental(rental.id))?;
        self.rentals.insert(rental.id, rental);
        Ok(())
    }

    /// Stages a fee update. `committed` is the stored row, if any; a fee that
    /// is settled there or in this transaction keeps its settlement.
    pub fn stage_fee(&mut self, fee: Fee, committed: Option<&Fee>) -> Result<()> {
        self.ensure_writable(RowKey::Fee(fee.id))?;
        let previous = self.fees.get(&fee.id).or(committed);
        if let Some(previous) = previous
            && previous.settlement.is_some()
            && previous.settlement != fee.settlement
        {
            return Err(RentalError::Storage(format!(
                "fee {} settlement is immutable",
                fee.id
            )));
        }
        self.fees.insert(fee.id, fee);
        Ok(())
    }

    /// Rows created by this transaction count as locked by it.
    pub fn insert_rental(&mut self, rental: Rental) {
        self.inserted.insert(RowKey::Rental(rental.id));
        self.rentals.insert(rental.id, rental);
    }

    pub fn insert_fee(&mut self, fee: Fee) {
        self.inserted.insert(RowKey::Fee(fee.id));
        self.fees.insert(fee.id, fee);
    }

    pub fn insert_invoice(&mut self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.rentals.is_empty()
            && self.fees.is_empty()
            && self.invoices.is_empty()
    }

    /// Releases all locks. Called by backends once the staged rows are
    /// visible, so a waiter always reads the committed state.
    pub fn release(self) {
        let locks = self.locks.clone();
        drop(self);
        locks.prune();
    }
}
