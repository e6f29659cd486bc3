use crate::domain::clock::ClockRef;
use crate::domain::fee::{BASE_FEE_REASON, Fee, FeeView, NewFee};
use crate::domain::invoice::{Invoice, NewInvoice};
use crate::domain::money::Amount;
use crate::domain::ports::{CatalogRef, RentalStoreRef, StoreTransaction};
use crate::domain::rental::{NewRental, Rental, RentalView};
use crate::domain::tariff::{Tariff, elapsed_minutes};
use crate::domain::{FeeId, InvoiceId, ItemId, RentalId, RenterId};
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Outcome of a successful rent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rented {
    pub rental_id: RentalId,
    pub fee_id: FeeId,
    pub base_fee: Amount,
}

/// Outcome of a successful pay-and-return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub fee_id: FeeId,
    pub invoice_id: InvoiceId,
    pub final_amount: Amount,
    /// The item freed by this settlement, if the rental was still open.
    pub returned_item: Option<ItemId>,
}

/// The rental transaction engine.
///
/// `RentalEngine` keeps no mutable state of its own: every operation opens a
/// store transaction, takes the row locks it needs, and either commits all of
/// its writes or none. It can be shared freely between connection tasks
/// behind an `Arc`.
pub struct RentalEngine {
    store: RentalStoreRef,
    catalog: CatalogRef,
    clock: ClockRef,
    tariff: Tariff,
}

impl RentalEngine {
    /// Creates a new `RentalEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Backing store for items, rentals, fees and invoices.
    /// * `catalog` - Catalog collaborator consulted on rent and notified on return.
    /// * `clock` - Source of rental timestamps and accrual time.
    /// * `tariff` - Base fee and per-minute accrual rate.
    pub fn new(
        store: RentalStoreRef,
        catalog: CatalogRef,
        clock: ClockRef,
        tariff: Tariff,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            tariff,
        }
    }

    /// Rents `item_id` to `renter_id`.
    ///
    /// Locks the item row, flips it to unavailable, and records the rental
    /// together with its base fee. Of two concurrent calls on one item exactly
    /// one succeeds; the other gets [`RentalError::ItemUnavailable`].
    pub async fn rent(&self, renter_id: RenterId, item_id: ItemId) -> Result<Rented> {
        if item_id == 0 {
            return Err(RentalError::InvalidId("item"));
        }
        if renter_id == 0 {
            return Err(RentalError::InvalidId("renter"));
        }
        if !self.catalog.is_known_item(item_id).await {
            tracing::debug!(item_id, "rent of unknown item");
            return Err(RentalError::ItemUnavailable(item_id));
        }

        let mut tx = self.store.begin().await?;
        let rented = match self.rent_in(tx.as_mut(), renter_id, item_id).await {
            Ok(rented) => rented,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        if let Err(e) = tx.commit().await {
            tracing::warn!(item_id, renter_id, error = %e, "rent commit failed");
            return Err(e);
        }

        tracing::info!(
            item_id,
            renter_id,
            rental_id = rented.rental_id,
            fee_id = rented.fee_id,
            "item rented"
        );
        Ok(rented)
    }

    async fn rent_in(
        &self,
        tx: &mut dyn StoreTransaction,
        renter_id: RenterId,
        item_id: ItemId,
    ) -> Result<Rented> {
        let Some(mut item) = tx.lock_item(item_id).await? else {
            return Err(RentalError::ItemUnavailable(item_id));
        };
        if !item.available {
            return Err(RentalError::ItemUnavailable(item_id));
        }

        item.available = false;
        tx.update_item(item).await?;

        let rental = tx
            .insert_rental(NewRental {
                item_id,
                renter_id,
                rented_at: self.clock.now(),
            })
            .await?;
        let fee = tx
            .insert_fee(NewFee {
                rental_id: rental.id,
                amount: self.tariff.base_fee,
                reason: BASE_FEE_REASON.to_string(),
            })
            .await?;

        Ok(Rented {
            rental_id: rental.id,
            fee_id: fee.id,
            base_fee: fee.amount,
        })
    }

    /// Every fee of `renter_id`, newest first.
    ///
    /// Lock-free snapshot. Unpaid fees on open rentals report their live
    /// accrued amount as of now; the figure can be stale by the time the
    /// renter pays, which re-derives it under lock.
    pub async fn list_outstanding(&self, renter_id: RenterId) -> Result<Vec<FeeView>> {
        if renter_id == 0 {
            return Ok(Vec::new());
        }

        let fees = self.store.fees_of_renter(renter_id).await?;
        let now = self.clock.now();
        let mut views = fees
            .into_iter()
            .map(|(fee, rental)| self.fee_view(fee, &rental, now))
            .collect::<Result<Vec<FeeView>>>()?;
        views.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(views)
    }

    fn fee_view(&self, fee: Fee, rental: &Rental, now: DateTime<Utc>) -> Result<FeeView> {
        let amount = if rental.is_open() && !fee.is_settled() {
            self.tariff.accrued(fee.amount, rental.rented_at, now)?
        } else {
            fee.amount
        };
        Ok(FeeView {
            id: fee.id,
            rental_id: rental.id,
            item_id: rental.item_id,
            amount,
            status: fee.status(),
            reason: fee.reason,
        })
    }

    /// Pays fee `fee_id` on behalf of `renter_id` and returns the item.
    ///
    /// Under the fee and rental row locks: freezes the accrued amount into the
    /// fee, closes the rental, frees the item, issues the invoice and marks
    /// the fee settled, all in one commit. A fee that is already settled
    /// yields [`RentalError::AlreadyPaid`]; a missing fee or one owned by
    /// another renter yields [`RentalError::NotOwner`].
    pub async fn pay_and_return(&self, fee_id: FeeId, renter_id: RenterId) -> Result<Settlement> {
        if fee_id == 0 || renter_id == 0 {
            return Err(RentalError::NotOwner(fee_id));
        }

        let mut tx = self.store.begin().await?;
        let settlement = match self.settle_in(tx.as_mut(), fee_id, renter_id).await {
            Ok(settlement) => settlement,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        if let Err(e) = tx.commit().await {
            tracing::warn!(fee_id, renter_id, error = %e, "settlement commit failed");
            return Err(e);
        }

        tracing::info!(
            fee_id,
            renter_id,
            invoice_id = settlement.invoice_id,
            amount = %settlement.final_amount,
            "fee settled"
        );
        if let Some(item_id) = settlement.returned_item {
            self.catalog.on_returned(item_id).await;
        }
        Ok(settlement)
    }

    async fn settle_in(
        &self,
        tx: &mut dyn StoreTransaction,
        fee_id: FeeId,
        renter_id: RenterId,
    ) -> Result<Settlement> {
        let Some((mut fee, mut rental)) = tx.lock_fee(fee_id).await? else {
            return Err(RentalError::NotOwner(fee_id));
        };
        if fee.is_settled() {
            return Err(RentalError::AlreadyPaid(fee_id));
        }
        if rental.renter_id != renter_id {
            return Err(RentalError::NotOwner(fee_id));
        }

        let now = self.clock.now();
        let mut returned_item = None;
        if rental.is_open() {
            let Some(mut item) = tx.lock_item(rental.item_id).await? else {
                return Err(RentalError::Storage(format!(
                    "rental {} references missing item {}",
                    rental.id, rental.item_id
                )));
            };

            let minutes = elapsed_minutes(rental.rented_at, now);
            fee.amount = self.tariff.accrued(fee.amount, rental.rented_at, now)?;
            fee.reason = format!("Rental fee for {:.2} min", minutes);

            rental.returned_at = Some(now);
            item.available = true;
            returned_item = Some(item.id);

            tx.update_rental(rental).await?;
            tx.update_item(item).await?;
        }

        let invoice = tx
            .insert_invoice(NewInvoice {
                renter_id,
                issued_at: now,
                total: fee.amount,
            })
            .await?;

        let final_amount = fee.amount;
        fee.settlement = Some(invoice.id);
        tx.update_fee(fee).await?;

        Ok(Settlement {
            fee_id,
            invoice_id: invoice.id,
            final_amount,
            returned_item,
        })
    }

    /// Rental history of `renter_id`, newest first, with item titles.
    pub async fn list_rentals(&self, renter_id: RenterId) -> Result<Vec<RentalView>> {
        if renter_id == 0 {
            return Ok(Vec::new());
        }

        let titles: HashMap<ItemId, String> = self
            .store
            .items()
            .await?
            .into_iter()
            .map(|item| (item.id, item.title))
            .collect();
        let mut rentals = self.store.rentals_of_renter(renter_id).await?;
        rentals.sort_by(|a, b| b.rented_at.cmp(&a.rented_at).then(b.id.cmp(&a.id)));

        Ok(rentals
            .into_iter()
            .map(|rental| RentalView {
                title: titles.get(&rental.item_id).cloned().unwrap_or_default(),
                rental,
            })
            .collect())
    }

    /// Invoices issued to `renter_id`, newest first.
    pub async fn list_invoices(&self, renter_id: RenterId) -> Result<Vec<Invoice>> {
        if renter_id == 0 {
            return Ok(Vec::new());
        }
        let mut invoices = self.store.invoices_of_renter(renter_id).await?;
        invoices.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(invoices)
    }
}

async fn abort(tx: Box<dyn StoreTransaction>, cause: &RentalError) {
    if cause.is_storage_fault() {
        tracing::warn!(error = %cause, "rolling back");
    } else {
        tracing::debug!(reason = %cause, "rejected");
    }
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}
