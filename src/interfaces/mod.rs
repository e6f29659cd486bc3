//! Adapters between the engine and the outside world: the line protocol,
//! its TCP transport, and catalog CSV import.

pub mod command;
pub mod csv;
pub mod router;
pub mod tcp;
