use crate::domain::ItemId;
use crate::domain::item::Item;
use crate::domain::ports::{Catalog, RentalStoreRef};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

const RETURN_EVENTS_CAPACITY: usize = 64;

/// Catalog listing backed directly by the rental store.
///
/// Availability is always read from the store. Returns are announced on a
/// broadcast channel so listeners can refresh without polling.
pub struct StoreCatalog {
    store: RentalStoreRef,
    returned: broadcast::Sender<ItemId>,
}

impl StoreCatalog {
    pub fn new(store: RentalStoreRef) -> Self {
        let (returned, _) = broadcast::channel(RETURN_EVENTS_CAPACITY);
        Self { store, returned }
    }

    /// Every catalog item ordered by id.
    pub async fn list_items(&self) -> Result<Vec<Item>> {
        let mut items = self.store.items().await?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    /// Receives the id of every item freed by a settlement from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemId> {
        self.returned.subscribe()
    }
}

#[async_trait]
impl Catalog for StoreCatalog {
    async fn is_known_item(&self, item_id: ItemId) -> bool {
        match self.store.item(item_id).await {
            Ok(item) => item.is_some(),
            Err(e) => {
                // The rent transaction will hit the same fault and report it.
                tracing::warn!(item_id, error = %e, "catalog lookup failed");
                true
            }
        }
    }

    async fn on_returned(&self, item_id: ItemId) {
        tracing::debug!(item_id, "item back in catalog");
        // No receivers is fine.
        let _ = self.returned.send(item_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::RentalStore;
    use crate::infrastructure::in_memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_known_items_come_from_store() {
        let store = Arc::new(InMemoryStore::new());
        store.register_item(Item::new(3, "Heat")).await.unwrap();
        store.register_item(Item::new(1, "Alien")).await.unwrap();
        let catalog = StoreCatalog::new(store);

        assert!(catalog.is_known_item(1).await);
        assert!(!catalog.is_known_item(2).await);

        let ids: Vec<ItemId> = catalog
            .list_items()
            .await
            .unwrap()
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_on_returned_is_broadcast() {
        let catalog = StoreCatalog::new(Arc::new(InMemoryStore::new()));
        let mut events = catalog.subscribe();

        catalog.on_returned(5).await;
        assert_eq!(events.recv().await.unwrap(), 5);
    }
}
