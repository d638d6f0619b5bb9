//! Run orchestration: listing → filter → dedup → images → caption → store.

use crate::domain::models::{RecallRecord, RunIssue, RunReport};
use crate::domain::settings::RecallSettings;
use crate::error::{AppError, Result};
use crate::extractor::listing::ListingDocument;
use crate::repository::{CsvRecordStore, ImageDirectory, RecordStore};
use crate::service::caption::CaptionGenerator;
use crate::service::dedup::{Admission, SeenKeys};
use crate::service::filter::CategoryFilter;
use crate::service::http::{decode_markup, HttpFetcher, PageFetcher, RequestPacer};
use crate::service::images::ImageSelector;

pub struct RecallPipeline<F: PageFetcher, S: RecordStore> {
    settings: RecallSettings,
    fetcher: F,
    store: S,
    images: ImageDirectory,
    filter: CategoryFilter,
    selector: ImageSelector,
    captions: CaptionGenerator,
}

impl RecallPipeline<HttpFetcher, CsvRecordStore> {
    /// Pipeline over HTTP and the CSV store named in `settings`.
    pub fn from_settings(settings: RecallSettings) -> Result<Self> {
        let fetcher = HttpFetcher::new(&settings)?;
        let store = CsvRecordStore::new(&settings.store_path, settings.track_terminated);
        Self::new(settings, fetcher, store)
    }
}

impl<F: PageFetcher, S: RecordStore> RecallPipeline<F, S> {
    pub fn new(settings: RecallSettings, fetcher: F, store: S) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            images: ImageDirectory::new(&settings.image_dir),
            filter: CategoryFilter::new(&settings.excluded_categories),
            selector: ImageSelector::new(&settings),
            captions: CaptionGenerator::new(&settings),
            settings,
            fetcher,
            store,
        })
    }

    pub fn settings(&self) -> &RecallSettings {
        &self.settings
    }

    /// Runs the pipeline once.
    ///
    /// Returns `Err` only for run-fatal failures (listing unreachable, table
    /// missing, store unreadable or unwritable); nothing is persisted then.
    /// Everything else is collected in the report.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::start();
        let run_id = report.run_id;
        tracing::info!("[RUN {}] Starting from {}", run_id, self.settings.listing_url);

        let mut pacer = RequestPacer::from_millis(self.settings.request_delay_ms);
        let candidates = self.extract_listing(&mut pacer, &mut report).await?;

        let admitted = self.admit(candidates, &mut report)?;
        tracing::info!(
            "[RUN {}] {} admitted, {} filtered out, {} already seen",
            run_id,
            admitted.len(),
            report.filtered_out,
            report.duplicates
        );

        let mut batch = Vec::with_capacity(admitted.len());
        for record in admitted {
            let record = self
                .selector
                .enrich(record, &self.fetcher, &self.images, &mut pacer, &mut report)
                .await;
            batch.push(self.captions.finalize(record));
        }

        report.persisted = self.store.persist(&batch, self.settings.persistence_mode)?;
        report.records = batch;

        let report = report.finish();
        tracing::info!(
            "[RUN {}] Completed in {}ms: {} records, {} images, {} issues",
            run_id,
            report.elapsed_ms(),
            report.admitted,
            report.images_saved,
            report.issues.len()
        );
        Ok(report)
    }

    async fn extract_listing(
        &self,
        pacer: &mut RequestPacer,
        report: &mut RunReport,
    ) -> Result<Vec<RecallRecord>> {
        let url = &self.settings.listing_url;
        pacer.wait_turn().await;
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| AppError::ListingUnavailable {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let markup = decode_markup(&bytes);
        let base = self.settings.base()?;
        let extraction =
            ListingDocument::parse(&markup).extract(&self.settings.table_selector, &base)?;

        report.rows_seen = extraction.rows_seen();
        report.rows_skipped = extraction.skipped.len();
        for skipped in &extraction.skipped {
            report.push_issue(RunIssue::new(
                skipped.scope(),
                "listing",
                skipped.to_string(),
            ));
        }
        Ok(extraction.records)
    }

    fn admit(
        &self,
        candidates: Vec<RecallRecord>,
        report: &mut RunReport,
    ) -> Result<Vec<RecallRecord>> {
        let mut seen = SeenKeys::from_history(self.store.load_identities()?);
        let mut admitted = Vec::new();

        for record in candidates {
            if !self.filter.keep(&record) {
                tracing::debug!(
                    "[FILTER] Dropping {} ({})",
                    record.brand_name,
                    record.product_type
                );
                report.filtered_out += 1;
                continue;
            }
            match seen.admit(&record) {
                Admission::Admitted => admitted.push(record),
                Admission::Undated => {
                    tracing::debug!("[DEDUP] Undated record admitted: {}", record.brand_name);
                    admitted.push(record);
                }
                Admission::Duplicate => report.duplicates += 1,
            }
        }

        report.admitted = admitted.len();
        Ok(admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PersistenceMode, Persisted};
    use crate::error::FailureScope;
    use crate::test_utils::fixtures::{detail_html, listing_html, ListingRow, StaticFetcher};
    use tempfile::TempDir;

    const LISTING: &str = "https://www.fda.gov/safety/recalls-market-withdrawals-safety-alerts";

    fn settings(dir: &TempDir, mode: PersistenceMode) -> RecallSettings {
        let mut settings = RecallSettings::defaults_with_mode(mode);
        settings.request_delay_ms = 0;
        settings.store_path = dir.path().join("recalls.csv");
        settings.image_dir = dir.path().join("images");
        settings
    }

    fn pipeline(
        dir: &TempDir,
        mode: PersistenceMode,
        fetcher: StaticFetcher,
    ) -> RecallPipeline<StaticFetcher, CsvRecordStore> {
        let settings = settings(dir, mode);
        let store = CsvRecordStore::new(&settings.store_path, settings.track_terminated);
        RecallPipeline::new(settings, fetcher, store).unwrap()
    }

    fn sample_listing() -> String {
        listing_html(&[
            ListingRow::new("03/01/2024", "Fresh Direct")
                .description("Dark Chocolate Covered Pretzels")
                .product_type("Food & Beverages")
                .reason("Undeclared milk")
                .company("Acme Co")
                .link("/recalls/fresh-direct"),
            ListingRow::new("03/02/2024", "Good Dog")
                .product_type("Animal & Veterinary, Pet Food")
                .reason("Salmonella"),
            ListingRow::new("", "Mystery Snacks").reason("Recalled due to undeclared peanut"),
        ])
    }

    #[tokio::test]
    async fn test_listing_unreachable_is_fatal() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir, PersistenceMode::Append, StaticFetcher::default());
        let err = p.run().await.unwrap_err();
        assert!(matches!(err, AppError::ListingUnavailable { .. }));
        assert!(!dir.path().join("recalls.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_table_is_fatal() {
        let dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default().page(LISTING, "<html><p>maintenance</p></html>");
        let err = pipeline(&dir, PersistenceMode::Append, fetcher)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn test_filter_dedup_and_enrichment() {
        let dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default()
            .page(LISTING, &sample_listing())
            .page(
                "https://www.fda.gov/recalls/fresh-direct",
                &detail_html(&[&[("/img/a.jpg?w=200", 200), ("/img/a.jpg?w=400", 400)]]),
            )
            .page("https://www.fda.gov/img/a.jpg?w=400", "A400");

        let p = pipeline(&dir, PersistenceMode::Append, fetcher);
        let report = p.run().await.unwrap();

        assert_eq!(report.rows_seen, 3);
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.admitted, 2);
        assert_eq!(report.images_saved, 1);
        assert_eq!(report.persisted, Persisted::Written { records: 2 });
        assert!(report.issues.is_empty(), "{:?}", report.issues);

        let fresh = &report.records[0];
        assert_eq!(fresh.image_filenames, vec!["Fresh Direct_image_1.jpg"]);
        assert!(fresh.caption.as_deref().unwrap().contains("#MilkAllergy"));
        assert_eq!(
            std::fs::read(dir.path().join("images/Fresh Direct_image_1.jpg")).unwrap(),
            b"A400"
        );

        let undated = &report.records[1];
        assert!(undated.image_filenames.is_empty());
        assert!(undated
            .caption
            .as_deref()
            .unwrap()
            .contains("Mystery Snacks is recalling  due to undeclared peanut."));
        assert!(report.records.iter().all(RecallRecord::is_finalized));

        assert_eq!(
            p.fetcher.requests(),
            vec![
                LISTING.to_string(),
                "https://www.fda.gov/recalls/fresh-direct".to_string(),
                "https://www.fda.gov/img/a.jpg?w=400".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_run_admits_only_undated() {
        let dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default().page(LISTING, &sample_listing());
        let p = pipeline(&dir, PersistenceMode::Append, fetcher);

        let first = p.run().await.unwrap();
        assert_eq!(first.admitted, 2);
        // The detail page is missing from the fetcher: record-local, not fatal.
        assert_eq!(first.issues_in(FailureScope::RecordLocal), 1);

        let second = p.run().await.unwrap();
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.admitted, 1);
        assert_eq!(second.records[0].brand_name, "Mystery Snacks");
    }

    #[tokio::test]
    async fn test_image_failure_is_item_local() {
        let dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default()
            .page(LISTING, &sample_listing())
            .page(
                "https://www.fda.gov/recalls/fresh-direct",
                &detail_html(&[&[("/img/a.jpg", 400)], &[("/img/b.jpg", 800)]]),
            )
            .page("https://www.fda.gov/img/b.jpg", "B");

        let report = pipeline(&dir, PersistenceMode::Overwrite, fetcher)
            .run()
            .await
            .unwrap();
        assert_eq!(report.issues_in(FailureScope::ItemLocal), 1);
        assert_eq!(report.records[0].image_filenames, vec!["Fresh Direct_image_2.jpg"]);
        assert_eq!(report.persisted, Persisted::Written { records: 2 });
    }

    #[tokio::test]
    async fn test_nothing_new_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let listing = listing_html(&[ListingRow::new("03/05/2024", "Only Pets")
            .product_type("Animal & Veterinary")]);
        let fetcher = StaticFetcher::default().page(LISTING, &listing);
        let report = pipeline(&dir, PersistenceMode::Append, fetcher)
            .run()
            .await
            .unwrap();
        assert_eq!(report.persisted, Persisted::NothingToPersist);
        assert!(!dir.path().join("recalls.csv").exists());
    }
}
