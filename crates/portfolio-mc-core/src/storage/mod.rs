//! Boundaries to the external collaborators: price source, object store and
//! metadata store.
//!
//! Every call is blocking and all-or-nothing: nothing written by a call is
//! visible to readers until the call has returned successfully.

pub mod local;
pub mod memory;
pub mod price_source;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::PortfolioMcError;
use crate::records::KeyedRecord;
use crate::table::PriceTable;
use crate::types::Symbol;
use crate::PortfolioMcResult;

pub use local::{LocalMetadataStore, LocalObjectStore};
pub use memory::{MemoryMetadataStore, MemoryObjectStore};
pub use price_source::{CsvPriceSource, StaticPriceSource};

/// Historical closing prices for a date range and asset list.
pub trait PriceSource: Send + Sync {
    /// Prices for `assets` over `[start, end)`.
    fn fetch(&self, assets: &[Symbol], start: NaiveDate, end: NaiveDate)
        -> PortfolioMcResult<PriceTable>;
}

/// Blob storage addressed by bucket and key.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> PortfolioMcResult<Vec<u8>>;

    /// Store `body` and return its location.
    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> PortfolioMcResult<String>;

    fn contains(&self, bucket: &str, key: &str) -> PortfolioMcResult<bool>;
}

/// Upsert-by-key document store.
pub trait MetadataStore: Send + Sync {
    fn put_item(&self, table: &str, key: &str, item: Value) -> PortfolioMcResult<()>;

    fn get_item(&self, table: &str, key: &str) -> PortfolioMcResult<Option<Value>>;
}

/// Upsert a typed record under its own key.
pub fn put_record<R: KeyedRecord>(
    store: &dyn MetadataStore,
    table: &str,
    record: &R,
) -> PortfolioMcResult<()> {
    let item = serde_json::to_value(record)?;
    store.put_item(table, record.key(), item)
}

/// Load and decode a typed record.
pub fn get_record<R: DeserializeOwned>(
    store: &dyn MetadataStore,
    table: &str,
    key: &str,
) -> PortfolioMcResult<Option<R>> {
    match store.get_item(table, key)? {
        Some(item) => serde_json::from_value(item).map(Some).map_err(|e| {
            PortfolioMcError::MalformedRecord(format!("{table}/{key}: {e}"))
        }),
        None => Ok(None),
    }
}

fn missing_object(bucket: &str, key: &str) -> PortfolioMcError {
    PortfolioMcError::io(
        format!("get {bucket}/{key}"),
        "object does not exist",
    )
}
