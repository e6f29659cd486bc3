use super::command::{Command, PayStatus, RentStatus, Reply};
use crate::application::catalog::StoreCatalog;
use crate::application::engine::RentalEngine;
use crate::domain::money::Amount;
use crate::error::RentalError;
use std::sync::Arc;

/// Maps protocol commands onto engine calls and engine outcomes onto status
/// tokens. Holds no state besides its collaborators.
pub struct CommandRouter {
    engine: Arc<RentalEngine>,
    catalog: Arc<StoreCatalog>,
}

impl CommandRouter {
    pub fn new(engine: Arc<RentalEngine>, catalog: Arc<StoreCatalog>) -> Self {
        Self { engine, catalog }
    }

    /// Parses and runs one request line.
    pub async fn handle_line(&self, line: &str) -> Reply {
        match line.parse::<Command>() {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                tracing::debug!(line, error = %e, "malformed command");
                Reply::Error(e.to_string())
            }
        }
    }

    pub async fn dispatch(&self, command: Command) -> Reply {
        match command {
            Command::Rent { item_id, renter_id } => {
                let (status, base_fee) = match self.engine.rent(renter_id, item_id).await {
                    Ok(rented) => (RentStatus::Ok, rented.base_fee),
                    Err(e) => (rent_status(&e), Amount::ZERO),
                };
                Reply::Rent { status, base_fee }
            }
            Command::Pay { fee_id, renter_id } => {
                let (status, final_amount) =
                    match self.engine.pay_and_return(fee_id, renter_id).await {
                        Ok(settlement) => (PayStatus::Settled, settlement.final_amount),
                        Err(e) => (pay_status(&e), Amount::ZERO),
                    };
                Reply::Pay {
                    status,
                    final_amount,
                }
            }
            Command::ListFees { renter_id } => {
                listing(self.engine.list_outstanding(renter_id).await, Reply::Fees)
            }
            Command::ListRentals { renter_id } => {
                listing(self.engine.list_rentals(renter_id).await, Reply::Rentals)
            }
            Command::ListInvoices { renter_id } => {
                listing(self.engine.list_invoices(renter_id).await, Reply::Invoices)
            }
            Command::ListFilms => listing(self.catalog.list_items().await, Reply::Films),
        }
    }
}

fn rent_status(error: &RentalError) -> RentStatus {
    if error.is_storage_fault() {
        RentStatus::StorageError
    } else {
        RentStatus::ItemUnavailable
    }
}

/// A missing fee and someone else's fee look the same to the caller.
fn pay_status(error: &RentalError) -> PayStatus {
    match error {
        RentalError::AlreadyPaid(_) => PayStatus::AlreadyPaid,
        e if e.is_storage_fault() => PayStatus::StorageError,
        _ => PayStatus::NotOwner,
    }
}

fn listing<T>(result: crate::error::Result<Vec<T>>, reply: fn(Vec<T>) -> Reply) -> Reply {
    match result {
        Ok(rows) => reply(rows),
        Err(e) => {
            tracing::warn!(error = %e, "listing failed");
            Reply::ListFailed
        }
    }
}
