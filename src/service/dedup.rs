//! Identity keys and cross-run deduplication.
//!
//! The listing has no primary key, so a record is identified by its date and
//! brand. Records with an empty date are always admitted: a malformed row must
//! never be merged into an unrelated one, at the price of re-admitting undated
//! entries on every run.

use std::collections::HashSet;

use crate::domain::models::RecallRecord;

const SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// `None` for undated records, which never take part in dedup.
    pub fn new(date: &str, brand_name: &str) -> Option<Self> {
        if date.is_empty() {
            return None;
        }
        Some(Self(format!("{date}{SEPARATOR}{brand_name}")))
    }

    pub fn of(record: &RecallRecord) -> Option<Self> {
        Self::new(&record.date, &record.brand_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Undated,
    Duplicate,
}

/// Identities seen so far: the history store plus everything admitted this run.
#[derive(Debug, Default)]
pub struct SeenKeys {
    keys: HashSet<IdentityKey>,
}

impl SeenKeys {
    pub fn from_history<I>(history: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let keys: HashSet<IdentityKey> = history
            .into_iter()
            .filter_map(|(date, brand)| IdentityKey::new(&date, &brand))
            .collect();
        tracing::debug!("[DEDUP] Seeded {} identities from history", keys.len());
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, record: &RecallRecord) -> bool {
        IdentityKey::of(record).is_some_and(|k| self.keys.contains(&k))
    }

    /// Admits `record` unless its identity is already known, remembering it.
    pub fn admit(&mut self, record: &RecallRecord) -> Admission {
        let Some(key) = IdentityKey::of(record) else {
            return Admission::Undated;
        };
        if self.keys.insert(key) {
            return Admission::Admitted;
        }
        tracing::trace!(
            "[DEDUP] Already seen: {} / {}",
            record.date,
            record.brand_name
        );
        Admission::Duplicate
    }
}
