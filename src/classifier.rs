use crate::aging::bucket_label;
use crate::reference::ReferenceSelection;
use crate::schema::{EngineConfig, FallbackPolicy, LedgerRow, SentinelLabels};
use crate::utils::normalize_label;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const OVERDUE_LABEL: &str = "OVERDUE";
pub const UPCOMING_LABEL: &str = "UPCOMING";

/// Computed status of a row. Never stored on the row itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "status", content = "label", rename_all = "snake_case")]
pub enum Status {
    Overdue,
    Upcoming,
    /// Normalized raw status used when a date is missing.
    Other(String),
}

/// The two status columns that can be pivoted into aging buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAxis {
    Overdue,
    Upcoming,
}

impl StatusAxis {
    pub const ALL: [StatusAxis; 2] = [StatusAxis::Overdue, StatusAxis::Upcoming];

    pub fn label(&self) -> &'static str {
        match self {
            StatusAxis::Overdue => OVERDUE_LABEL,
            StatusAxis::Upcoming => UPCOMING_LABEL,
        }
    }
}

impl Status {
    pub fn label(&self) -> &str {
        match self {
            Status::Overdue => OVERDUE_LABEL,
            Status::Upcoming => UPCOMING_LABEL,
            Status::Other(label) => label,
        }
    }

    pub fn axis(&self) -> Option<StatusAxis> {
        match self {
            Status::Overdue => Some(StatusAxis::Overdue),
            Status::Upcoming => Some(StatusAxis::Upcoming),
            Status::Other(_) => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A row visible under the current selection together with its computed status
/// and normalized aging bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow<'a> {
    /// Position of the row in the caller's input slice.
    pub index: usize,
    pub row: &'a LedgerRow,
    pub status: Status,
    pub bucket: String,
}

/// The classified rows of one pipeline pass, kept in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedSet<'a> {
    entries: Vec<ClassifiedRow<'a>>,
}

impl<'a> ClassifiedSet<'a> {
    pub fn entries(&self) -> &[ClassifiedRow<'a>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassifiedRow<'a>> {
        self.entries.iter()
    }

    /// Looks a row up by its input index.
    pub fn get(&self, index: usize) -> Option<&ClassifiedRow<'a>> {
        self.entries
            .binary_search_by_key(&index, |entry| entry.index)
            .ok()
            .map(|pos| &self.entries[pos])
    }
}

pub struct StatusClassifier<'c> {
    labels: &'c SentinelLabels,
    fallback: &'c FallbackPolicy,
}

impl<'c> StatusClassifier<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self {
            labels: &config.labels,
            fallback: &config.fallback,
        }
    }

    /// Classifies a row under the given selection.
    pub fn classify(&self, row: &LedgerRow, selection: ReferenceSelection) -> Status {
        self.classify_against(row, selection.effective_date(row))
    }

    /// Classifies a row against an already resolved reference date.
    ///
    /// A row due on the reference date itself is overdue.
    pub fn classify_against(&self, row: &LedgerRow, reference: Option<NaiveDate>) -> Status {
        match (row.due_date, reference) {
            (Some(due), Some(reference)) if due <= reference => Status::Overdue,
            (Some(_), Some(_)) => Status::Upcoming,
            _ => self.fallback_status(&row.raw_status),
        }
    }

    fn fallback_status(&self, raw: &str) -> Status {
        let Some(normalized) = normalize_label(raw) else {
            return Status::Other(self.labels.unknown_status.clone());
        };

        if let FallbackPolicy::Keywords { overdue, upcoming } = self.fallback {
            if contains_any(&normalized, upcoming) {
                return Status::Upcoming;
            }
            if contains_any(&normalized, overdue) {
                return Status::Overdue;
            }
        }

        Status::Other(normalized)
    }

    /// Filters `rows` by the selection and classifies what remains.
    pub fn classify_rows<'a>(
        &self,
        rows: &'a [LedgerRow],
        selection: ReferenceSelection,
    ) -> ClassifiedSet<'a> {
        let entries = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| selection.admits(row))
            .map(|(index, row)| ClassifiedRow {
                index,
                row,
                status: self.classify(row, selection),
                bucket: bucket_label(&row.aging_label, self.labels),
            })
            .collect();

        ClassifiedSet { entries }
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .filter_map(|k| normalize_label(k))
        .any(|k| haystack.contains(&k))
}

/// Classifies a single row with the default labels and verbatim fallback.
pub fn classify_row(row: &LedgerRow, selection: ReferenceSelection) -> Status {
    let config = EngineConfig::default();
    StatusClassifier::new(&config).classify(row, selection)
}
