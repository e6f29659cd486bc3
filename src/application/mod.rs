//! Application layer containing the rental orchestration.
//!
//! [`engine::RentalEngine`] runs Rent, ListOutstanding and PayAndReturn, one
//! store transaction per call. [`catalog::StoreCatalog`] is the catalog
//! collaborator the engine consults and notifies.

pub mod catalog;
pub mod engine;
