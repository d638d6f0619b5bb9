//! Image selection for admitted records.
//!
//! A detail page offers each photo at several resolutions. Candidates are
//! grouped by their base address and the widest variant of each group wins
//! (first one on ties). Winners are numbered in group-discovery order and
//! saved as `{brand}_image_{n}.{ext}`.

use url::Url;

use crate::domain::models::{ImageCandidate, RecallRecord, RunIssue, RunReport, SelectedImage};
use crate::domain::settings::RecallSettings;
use crate::error::{AppError, FailureScope, Result};
use crate::extractor::gallery;
use crate::repository::ImageDirectory;
use crate::service::http::{decode_markup, PageFetcher, RequestPacer};

/// One winner per base address, in the order groups were first seen.
pub fn select_winners(candidates: &[ImageCandidate]) -> Vec<&ImageCandidate> {
    let mut winners: Vec<&ImageCandidate> = Vec::new();
    for candidate in candidates {
        match winners
            .iter()
            .position(|w| w.base_url == candidate.base_url)
        {
            Some(i) if candidate.width > winners[i].width => winners[i] = candidate,
            Some(_) => {}
            None => winners.push(candidate),
        }
    }
    winners
}

/// Maps every character outside `[A-Za-z0-9_.\- ]` to `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Extension from the final path segment, or `default` when there is none.
pub fn image_extension(url: &str, default: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| default.to_string())
}

pub fn image_filename(brand_name: &str, index: usize, extension: &str) -> String {
    format!("{}_image_{}.{}", sanitize(brand_name), index, extension)
}

/// Picks the winners and assigns their filenames (1-based index).
pub fn plan_images(
    brand_name: &str,
    candidates: &[ImageCandidate],
    default_extension: &str,
) -> Vec<SelectedImage> {
    select_winners(candidates)
        .into_iter()
        .enumerate()
        .map(|(idx, winner)| SelectedImage {
            url: winner.full_url.clone(),
            width: winner.width,
            filename: image_filename(
                brand_name,
                idx + 1,
                &image_extension(&winner.full_url, default_extension),
            ),
        })
        .collect()
}

pub struct ImageSelector {
    gallery_selector: String,
    default_extension: String,
}

impl ImageSelector {
    pub fn new(settings: &RecallSettings) -> Self {
        Self {
            gallery_selector: settings.gallery_selector.clone(),
            default_extension: settings.default_image_extension.clone(),
        }
    }

    /// Parses a detail page into the images to download.
    /// `None` when the page has no gallery.
    pub fn plan(
        &self,
        brand_name: &str,
        markup: &str,
        page_url: &str,
    ) -> Result<Option<Vec<SelectedImage>>> {
        let page_url = Url::parse(page_url)
            .map_err(|e| AppError::InvalidUrl(format!("{page_url}: {e}")))?;
        let Some(candidates) =
            gallery::extract_candidates(markup, &self.gallery_selector, &page_url)?
        else {
            return Ok(None);
        };
        tracing::debug!(
            "[IMAGES] {} candidates on {}",
            candidates.len(),
            page_url
        );
        Ok(Some(plan_images(brand_name, &candidates, &self.default_extension)))
    }

    /// Fetches the detail page, downloads the winning images and returns the
    /// record with the filenames that were actually saved.
    ///
    /// Detail-page failures are record-local and image failures item-local;
    /// both land in `report` and never abort the run.
    pub async fn enrich<F: PageFetcher + ?Sized>(
        &self,
        record: RecallRecord,
        fetcher: &F,
        images: &ImageDirectory,
        pacer: &mut RequestPacer,
        report: &mut RunReport,
    ) -> RecallRecord {
        if !record.has_detail_page() {
            return record;
        }

        pacer.wait_turn().await;
        let markup = match fetcher.fetch(&record.detail_page_url).await {
            Ok(bytes) => decode_markup(&bytes),
            Err(e) => {
                report.push_issue(RunIssue::new(
                    FailureScope::RecordLocal,
                    &record.detail_page_url,
                    e.to_string(),
                ));
                return record;
            }
        };

        let planned = match self.plan(&record.brand_name, &markup, &record.detail_page_url) {
            Ok(Some(planned)) => planned,
            Ok(None) => {
                tracing::debug!("[IMAGES] No gallery on {}", record.detail_page_url);
                return record;
            }
            Err(e) => {
                report.push_issue(RunIssue::new(
                    FailureScope::RecordLocal,
                    &record.detail_page_url,
                    e.to_string(),
                ));
                return record;
            }
        };

        let mut saved = Vec::with_capacity(planned.len());
        for image in planned {
            pacer.wait_turn().await;
            let bytes = match fetcher.fetch(&image.url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    report.push_issue(RunIssue::new(
                        FailureScope::ItemLocal,
                        &image.url,
                        e.to_string(),
                    ));
                    continue;
                }
            };
            match images.save(&image.filename, &bytes).await {
                Ok(path) => {
                    tracing::info!(
                        "[IMAGES] Saved {} ({}w) -> {}",
                        image.url,
                        image.width,
                        path.display()
                    );
                    report.images_saved += 1;
                    saved.push(image.filename);
                }
                Err(e) => {
                    report.push_issue(RunIssue::new(
                        FailureScope::ItemLocal,
                        &image.filename,
                        e.to_string(),
                    ));
                }
            }
        }

        record.with_images(saved)
    }
}
