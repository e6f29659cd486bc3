use super::fee::{Fee, NewFee};
use super::invoice::{Invoice, NewInvoice};
use super::item::Item;
use super::rental::{NewRental, Rental};
use super::{FeeId, ItemId, RenterId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Backing store for items, rentals, fees and invoices.
///
/// All mutation of rental state goes through a [`StoreTransaction`] obtained
/// from [`RentalStore::begin`]. The remaining methods are lock-free snapshot
/// reads and catalog registration.
#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Opens a transaction. Nothing it writes is visible until commit.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Registers an item if no item with that id exists. Returns whether the
    /// item was inserted.
    async fn register_item(&self, item: Item) -> Result<bool>;

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>>;

    async fn items(&self) -> Result<Vec<Item>>;

    /// Every fee of every rental of `renter_id`, paired with its rental.
    async fn fees_of_renter(&self, renter_id: RenterId) -> Result<Vec<(Fee, Rental)>>;

    async fn rentals_of_renter(&self, renter_id: RenterId) -> Result<Vec<Rental>>;

    async fn invoices_of_renter(&self, renter_id: RenterId) -> Result<Vec<Invoice>>;
}

/// A unit of work against a [`RentalStore`].
///
/// `lock_*` methods take an exclusive row lock held until the transaction
/// ends, then read the committed row. Updates are only accepted for rows this
/// transaction has locked or inserted. Dropping the transaction without
/// calling [`StoreTransaction::commit`] rolls it back and releases its locks.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>>;

    /// Locks a fee and the rental it belongs to, in that order.
    async fn lock_fee(&mut self, fee_id: FeeId) -> Result<Option<(Fee, Rental)>>;

    async fn insert_rental(&mut self, rental: NewRental) -> Result<Rental>;

    async fn insert_fee(&mut self, fee: NewFee) -> Result<Fee>;

    async fn insert_invoice(&mut self, invoice: NewInvoice) -> Result<Invoice>;

    async fn update_item(&mut self, item: Item) -> Result<()>;

    async fn update_rental(&mut self, rental: Rental) -> Result<()>;

    async fn update_fee(&mut self, fee: Fee) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// The catalog service's view of the engine.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn is_known_item(&self, item_id: ItemId) -> bool;

    /// Called after a settlement has committed and freed `item_id`.
    async fn on_returned(&self, item_id: ItemId);
}

pub type RentalStoreRef = Arc<dyn RentalStore>;
pub type CatalogRef = Arc<dyn Catalog>;
