use super::ItemId;
use serde::{Deserialize, Serialize};

/// A rentable unit of inventory.
///
/// `available` is false exactly while an open rental references the item.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub available: bool,
}

impl Item {
    pub fn new(id: ItemId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            available: true,
        }
    }
}
