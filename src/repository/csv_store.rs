//! Flat CSV record store.
//!
//! The store is the run-to-run history: its `date`/`brandName` columns seed
//! dedup, and finalized records are written back at the end of a run.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use crate::domain::models::{PersistenceMode, Persisted, RecallRecord};
use crate::error::{AppError, Result};
use crate::repository::RecordStore;

pub const BASE_COLUMNS: [&str; 8] = [
    "date",
    "brandName",
    "productDescription",
    "productType",
    "recallReason",
    "companyName",
    "detailPageURL",
    "caption",
];
pub const TERMINATED_COLUMN: &str = "terminated";

pub struct CsvRecordStore {
    path: PathBuf,
    track_terminated: bool,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>, track_terminated: bool) -> Self {
        Self {
            path: path.into(),
            track_terminated,
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = BASE_COLUMNS.to_vec();
        if self.track_terminated {
            columns.push(TERMINATED_COLUMN);
        }
        columns
    }

    /// Value of `column` for `record`; empty for columns this store does not write.
    fn field<'a>(&self, record: &'a RecallRecord, column: &str) -> &'a str {
        match column {
            "date" => record.date.as_str(),
            "brandName" => record.brand_name.as_str(),
            "productDescription" => record.product_description.as_str(),
            "productType" => record.product_type.as_str(),
            "recallReason" => record.recall_reason.as_str(),
            "companyName" => record.company_name.as_str(),
            "detailPageURL" => record.detail_page_url.as_str(),
            "caption" => record.caption.as_deref().unwrap_or(""),
            TERMINATED_COLUMN if self.track_terminated => record.terminated.as_str(),
            _ => "",
        }
    }

    fn row<'a, S: AsRef<str>>(&self, record: &'a RecallRecord, header: &[S]) -> Vec<&'a str> {
        header
            .iter()
            .map(|column| self.field(record, column.as_ref()))
            .collect()
    }

    fn has_content(&self) -> bool {
        fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false)
    }

    /// Header and rows of the existing store; empty when there is no store yet.
    fn read_existing(&self) -> Result<Option<(StringRecord, Vec<StringRecord>)>> {
        if !self.has_content() {
            return Ok(None);
        }
        let mut reader = ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some((headers, rows)))
    }

    /// Rows are written in the order of the header already on disk. A column
    /// this run writes but the header lacks cannot be appended; the store has
    /// to be migrated with one overwrite run first.
    fn append(&self, batch: &[RecallRecord]) -> Result<()> {
        let header: Vec<String> = if self.has_content() {
            let mut reader = ReaderBuilder::new().from_path(&self.path)?;
            reader.headers()?.iter().map(String::from).collect()
        } else {
            Vec::new()
        };

        if let Some(missing) = self
            .columns()
            .into_iter()
            .find(|c| !header.is_empty() && !header.iter().any(|h| h.as_str() == *c))
        {
            return Err(AppError::config(format!(
                "record store {} has no `{missing}` column; run once in overwrite mode to add it",
                self.path.display()
            )));
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if header.is_empty() {
            let columns = self.columns();
            writer.write_record(&columns)?;
            for record in batch {
                writer.write_record(self.row(record, &columns))?;
            }
        } else {
            for record in batch {
                writer.write_record(self.row(record, &header))?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Rewrites history + batch through a sibling temp file, then renames it
    /// over the store. Columns only the history carries are kept after the
    /// current ones.
    fn overwrite(&self, batch: &[RecallRecord]) -> Result<usize> {
        let existing = self.read_existing()?;

        let mut header: Vec<String> = self.columns().into_iter().map(String::from).collect();
        if let Some((old_header, _)) = &existing {
            for column in old_header.iter() {
                if !column.is_empty() && !header.iter().any(|h| h == column) {
                    header.push(column.to_string());
                }
            }
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "recalls.csv".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut writer = WriterBuilder::new().has_headers(false).from_path(&tmp_path)?;
        writer.write_record(&header)?;

        let mut history_rows = 0;
        if let Some((old_header, rows)) = existing {
            let positions: Vec<Option<usize>> = header
                .iter()
                .map(|c| old_header.iter().position(|h| h == c))
                .collect();
            for row in &rows {
                writer.write_record(
                    positions
                        .iter()
                        .map(|p| p.and_then(|i| row.get(i)).unwrap_or("")),
                )?;
            }
            history_rows = rows.len();
        }
        for record in batch {
            writer.write_record(self.row(record, &header))?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp_path, &self.path)?;
        Ok(history_rows)
    }
}

impl RecordStore for CsvRecordStore {
    fn load_identities(&self) -> Result<Vec<(String, String)>> {
        let Some((headers, rows)) = self.read_existing()? else {
            tracing::info!("[STORE] No history at {}", self.path.display());
            return Ok(Vec::new());
        };

        let column = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                AppError::config(format!(
                    "record store {} has no `{name}` column",
                    self.path.display()
                ))
            })
        };
        let date_idx = column("date")?;
        let brand_idx = column("brandName")?;

        let identities: Vec<(String, String)> = rows
            .iter()
            .map(|row| {
                (
                    row.get(date_idx).unwrap_or("").to_string(),
                    row.get(brand_idx).unwrap_or("").to_string(),
                )
            })
            .collect();
        tracing::info!(
            "[STORE] Loaded {} history records from {}",
            identities.len(),
            self.path.display()
        );
        Ok(identities)
    }

    fn persist(&self, batch: &[RecallRecord], mode: PersistenceMode) -> Result<Persisted> {
        if batch.is_empty() {
            tracing::info!("[STORE] Nothing to persist");
            return Ok(Persisted::NothingToPersist);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match mode {
            PersistenceMode::Append => {
                self.append(batch)?;
                tracing::info!(
                    "[STORE] Appended {} records to {}",
                    batch.len(),
                    self.path.display()
                );
            }
            PersistenceMode::Overwrite => {
                let history = self.overwrite(batch)?;
                tracing::info!(
                    "[STORE] Rewrote {} with {} history + {} new records",
                    self.path.display(),
                    history,
                    batch.len()
                );
            }
        }
        Ok(Persisted::Written {
            records: batch.len(),
        })
    }
}
