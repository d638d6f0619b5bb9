pub mod csv_store;
pub mod image_dir;

pub use csv_store::CsvRecordStore;
pub use image_dir::ImageDirectory;

use crate::domain::models::{PersistenceMode, Persisted, RecallRecord};
use crate::error::Result;

/// History of finalized records: read once at run start, written once at the end.
pub trait RecordStore: Send + Sync {
    /// `(date, brandName)` of every stored record, in store order.
    fn load_identities(&self) -> Result<Vec<(String, String)>>;

    /// Commits a finalized batch. An empty batch is reported, not written.
    fn persist(&self, batch: &[RecallRecord], mode: PersistenceMode) -> Result<Persisted>;
}
