//! The line protocol spoken by rental desk clients.
//!
//! Requests are single lines of `;`-separated fields, verb first. Replies are
//! one status line, or a stream of record lines closed by `END`.

use crate::domain::fee::FeeView;
use crate::domain::invoice::Invoice;
use crate::domain::item::Item;
use crate::domain::money::Amount;
use crate::domain::rental::RentalView;
use crate::domain::{FeeId, ItemId, RenterId};
use std::str::FromStr;
use thiserror::Error;

pub const FIELD_SEPARATOR: char = ';';
pub const END_OF_LIST: &str = "END";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Rent { item_id: ItemId, renter_id: RenterId },
    ListFees { renter_id: RenterId },
    Pay { fee_id: FeeId, renter_id: RenterId },
    ListRentals { renter_id: RenterId },
    ListInvoices { renter_id: RenterId },
    ListFilms,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0}")]
    UnknownVerb(String),
    #[error("{verb} expects {expected} argument(s), got {got}")]
    Arity {
        verb: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{field} is not a valid id: {value}")]
    BadId { field: &'static str, value: String },
}

fn parse_id(field: &'static str, value: &str) -> Result<u64, CommandError> {
    value.trim().parse().map_err(|_| CommandError::BadId {
        field,
        value: value.to_string(),
    })
}

fn expect_args<'a>(
    verb: &'static str,
    args: &'a [&'a str],
    expected: usize,
) -> Result<&'a [&'a str], CommandError> {
    if args.len() == expected {
        Ok(args)
    } else {
        Err(CommandError::Arity {
            verb,
            expected,
            got: args.len(),
        })
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        let (verb, args) = fields.split_first().ok_or(CommandError::Empty)?;

        match verb.trim() {
            "RENT" => {
                let args = expect_args("RENT", args, 2)?;
                Ok(Command::Rent {
                    item_id: parse_id("itemId", args[0])?,
                    renter_id: parse_id("renterId", args[1])?,
                })
            }
            "LIST_FEES" => {
                let args = expect_args("LIST_FEES", args, 1)?;
                Ok(Command::ListFees {
                    renter_id: parse_id("renterId", args[0])?,
                })
            }
            "PAY" => {
                let args = expect_args("PAY", args, 2)?;
                Ok(Command::Pay {
                    fee_id: parse_id("feeId", args[0])?,
                    renter_id: parse_id("renterId", args[1])?,
                })
            }
            "LIST_RENTALS" => {
                let args = expect_args("LIST_RENTALS", args, 1)?;
                Ok(Command::ListRentals {
                    renter_id: parse_id("renterId", args[0])?,
                })
            }
            "LIST_INVOICES" => {
                let args = expect_args("LIST_INVOICES", args, 1)?;
                Ok(Command::ListInvoices {
                    renter_id: parse_id("renterId", args[0])?,
                })
            }
            "LIST_FILMS" => {
                expect_args("LIST_FILMS", args, 0)?;
                Ok(Command::ListFilms)
            }
            other => Err(CommandError::UnknownVerb(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentStatus {
    Ok,
    ItemUnavailable,
    StorageError,
}

impl RentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentStatus::Ok => "OK",
            RentStatus::ItemUnavailable => "ITEM_UNAVAILABLE",
            RentStatus::StorageError => "STORAGE_ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayStatus {
    Settled,
    AlreadyPaid,
    NotOwner,
    StorageError,
}

impl PayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayStatus::Settled => "SETTLED",
            PayStatus::AlreadyPaid => "ALREADY_PAID",
            PayStatus::NotOwner => "NOT_OWNER",
            PayStatus::StorageError => "STORAGE_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Rent { status: RentStatus, base_fee: Amount },
    Pay { status: PayStatus, final_amount: Amount },
    Fees(Vec<FeeView>),
    Rentals(Vec<RentalView>),
    Invoices(Vec<Invoice>),
    Films(Vec<Item>),
    /// A listing that could not be produced. Still closed by `END` so
    /// clients reading until `END` do not hang.
    ListFailed,
    Error(String),
}

/// Free text must not break the framing.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            FIELD_SEPARATOR | '\n' | '\r' => ' ',
            c => c,
        })
        .collect()
}

impl Reply {
    /// The reply as protocol lines, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Reply::Rent { status, base_fee } => {
                vec![format!("RENT_RESULT;{};{}", status.as_str(), base_fee)]
            }
            Reply::Pay {
                status,
                final_amount,
            } => vec![format!("PAY_RESULT;{};{}", status.as_str(), final_amount)],
            Reply::Fees(fees) => with_end(fees.iter().map(|fee| {
                format!(
                    "FEE;{};{};{};{}",
                    fee.id,
                    fee.amount,
                    sanitize(&fee.reason),
                    fee.status.as_str()
                )
            })),
            Reply::Rentals(rentals) => with_end(rentals.iter().map(|view| {
                let returned = view
                    .rental
                    .returned_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "RENTAL;{};{};{};{};{}",
                    view.rental.id,
                    view.rental.item_id,
                    sanitize(&view.title),
                    view.rental.rented_at.to_rfc3339(),
                    returned
                )
            })),
            Reply::Invoices(invoices) => with_end(invoices.iter().map(|invoice| {
                format!(
                    "INVOICE;{};{};{}",
                    invoice.id,
                    invoice.issued_at.to_rfc3339(),
                    invoice.total
                )
            })),
            Reply::Films(items) => with_end(items.iter().map(|item| {
                let availability = if item.available { "AVAILABLE" } else { "RENTED" };
                format!("FILM;{};{};{}", item.id, sanitize(&item.title), availability)
            })),
            Reply::ListFailed => vec!["ERROR;STORAGE_ERROR".to_string(), END_OF_LIST.to_string()],
            Reply::Error(message) => vec![format!("ERROR;{}", sanitize(message))],
        }
    }
}

fn with_end(lines: impl Iterator<Item = String>) -> Vec<String> {
    lines.chain(std::iter::once(END_OF_LIST.to_string())).collect()
}
