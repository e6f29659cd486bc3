use crate::domain::ItemId;
use crate::domain::item::Item;
use crate::error::{RentalError, Result};
use serde::Deserialize;
use std::io::Read;

/// One row of a catalog file: `id,title`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CatalogRecord {
    pub id: ItemId,
    pub title: String,
}

impl From<CatalogRecord> for Item {
    fn from(record: CatalogRecord) -> Self {
        Item::new(record.id, record.title)
    }
}

/// Reads catalog items from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming, yielding one
/// `Result<CatalogRecord>` per row so a bad row does not stop the import.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    /// Creates a new `CatalogReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes records.
    pub fn records(self) -> impl Iterator<Item = Result<CatalogRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(RentalError::from))
    }
}
