use super::money::Amount;
use super::{InvoiceId, RenterId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of a completed settlement.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Invoice {
    pub id: InvoiceId,
    pub renter_id: RenterId,
    pub issued_at: DateTime<Utc>,
    pub total: Amount,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub renter_id: RenterId,
    pub issued_at: DateTime<Utc>,
    pub total: Amount,
}

impl NewInvoice {
    pub fn with_id(self, id: InvoiceId) -> Invoice {
        Invoice {
            id,
            renter_id: self.renter_id,
            issued_at: self.issued_at,
            total: self.total,
        }
    }
}
