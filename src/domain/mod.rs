//! Domain model of the rental desk: inventory items, rentals, fees and
//! invoices, plus the storage ports the engine talks through.

pub mod clock;
pub mod fee;
pub mod invoice;
pub mod item;
pub mod money;
pub mod ports;
pub mod rental;
pub mod tariff;

pub type ItemId = u64;
pub type RenterId = u64;
pub type RentalId = u64;
pub type FeeId = u64;
pub type InvoiceId = u64;
