use super::{ItemId, RentalId, RenterId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One borrow-to-return cycle of one item by one renter.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Rental {
    pub id: RentalId,
    pub item_id: ItemId,
    pub renter_id: RenterId,
    pub rented_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Rental {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// A rental row before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewRental {
    pub item_id: ItemId,
    pub renter_id: RenterId,
    pub rented_at: DateTime<Utc>,
}

impl NewRental {
    pub fn with_id(self, id: RentalId) -> Rental {
        Rental {
            id,
            item_id: self.item_id,
            renter_id: self.renter_id,
            rented_at: self.rented_at,
            returned_at: None,
        }
    }
}

/// A rental joined with the title of its item, for history listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalView {
    pub rental: Rental,
    pub title: String,
}
