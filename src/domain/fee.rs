use super::money::Amount;
use super::{FeeId, InvoiceId, ItemId, RentalId};
use serde::{Deserialize, Serialize};

pub const BASE_FEE_REASON: &str = "Rental start fee";

/// A monetary obligation tied to a rental.
///
/// `settlement` is the invoice that paid the fee. Once set it never changes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Fee {
    pub id: FeeId,
    pub rental_id: RentalId,
    pub amount: Amount,
    pub reason: String,
    pub settlement: Option<InvoiceId>,
}

impl Fee {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    pub fn status(&self) -> SettlementStatus {
        if self.is_settled() {
            SettlementStatus::Paid
        } else {
            SettlementStatus::Unpaid
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewFee {
    pub rental_id: RentalId,
    pub amount: Amount,
    pub reason: String,
}

impl NewFee {
    pub fn with_id(self, id: FeeId) -> Fee {
        Fee {
            id,
            rental_id: self.rental_id,
            amount: self.amount,
            reason: self.reason,
            settlement: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStatus {
    Paid,
    Unpaid,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Paid => "PAID",
            SettlementStatus::Unpaid => "UNPAID",
        }
    }
}

/// A fee as reported to a renter. For an unpaid fee on an open rental the
/// amount is the live accrued value, not the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeView {
    pub id: FeeId,
    pub rental_id: RentalId,
    pub item_id: ItemId,
    pub amount: Amount,
    pub reason: String,
    pub status: SettlementStatus,
}
