//! Rich domain entities - behavior lives WITH data

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::FailureScope;

// ====== Record ======

/// One entry of the recall listing.
///
/// Everything up to `terminated` is filled by the listing extractor.
/// `image_filenames` and `caption` are enrichment and stay empty until the
/// record survives filtering and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RecallRecord {
    pub date: String,
    pub brand_name: String,
    pub product_description: String,
    pub product_type: String,
    pub recall_reason: String,
    pub company_name: String,
    pub detail_page_url: String,
    pub terminated: String,
    pub image_filenames: Vec<String>,
    pub caption: Option<String>,
}

impl RecallRecord {
    pub fn has_detail_page(&self) -> bool {
        !self.detail_page_url.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.caption.is_some()
    }

    /// Stamps the caption. Consumes the record so a finalized record is never
    /// mutated by a stage that does not own it.
    pub fn finalize(self, caption: String) -> Self {
        Self {
            caption: Some(caption),
            ..self
        }
    }

    pub fn with_images(self, image_filenames: Vec<String>) -> Self {
        Self {
            image_filenames,
            ..self
        }
    }
}

// ====== Images ======

/// One resolution variant of a photo found on a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// Address with the query string and size suffix stripped; the group key.
    pub base_url: String,
    pub width: u32,
    pub full_url: String,
}

/// The variant chosen to represent one photo, with its target filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub url: String,
    pub width: u32,
    pub filename: String,
}

// ====== Persistence ======

/// How the record store is written at the end of a run.
///
/// No `Default`: callers pick a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// Rewrite the whole store (history + this run's batch).
    Overwrite,
    /// Header once, then append only newly admitted records.
    Append,
}

impl PersistenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceMode::Overwrite => "overwrite",
            PersistenceMode::Append => "append",
        }
    }
}

impl std::str::FromStr for PersistenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(PersistenceMode::Overwrite),
            "append" | "incremental" => Ok(PersistenceMode::Append),
            other => Err(format!("unknown persistence mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Persisted {
    Written { records: usize },
    NothingToPersist,
}

// ====== Run reporting ======

/// A non-fatal failure observed during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunIssue {
    pub scope: FailureScope,
    pub subject: String,
    pub message: String,
}

impl RunIssue {
    pub fn new(
        scope: FailureScope,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub filtered_out: usize,
    pub duplicates: usize,
    pub admitted: usize,
    pub images_saved: usize,
    pub persisted: Persisted,
    pub issues: Vec<RunIssue>,
    pub records: Vec<RecallRecord>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            rows_seen: 0,
            rows_skipped: 0,
            filtered_out: 0,
            duplicates: 0,
            admitted: 0,
            images_saved: 0,
            persisted: Persisted::NothingToPersist,
            issues: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn push_issue(&mut self, issue: RunIssue) {
        tracing::warn!(
            "[RUN {}] {} failure on {}: {}",
            self.run_id,
            issue.scope.as_str(),
            issue.subject,
            issue.message
        );
        self.issues.push(issue);
    }

    pub fn issues_in(&self, scope: FailureScope) -> usize {
        self.issues.iter().filter(|i| i.scope == scope).count()
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}
