use crate::classifier::{ClassifiedRow, ClassifiedSet, StatusAxis};
use crate::schema::SentinelLabels;
use crate::utils::{add_amount, collate, normalize_label};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Normalized aging bucket of a raw label, or the "no aging" sentinel.
pub fn bucket_label(raw: &str, labels: &SentinelLabels) -> String {
    normalize_label(raw).unwrap_or_else(|| labels.no_aging.clone())
}

/// Distinct aging buckets among overdue rows and, separately, upcoming rows.
///
/// Computed once over the whole filtered set so every node shares the same
/// columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBucketSet {
    pub overdue: Vec<String>,
    pub upcoming: Vec<String>,
}

impl AgingBucketSet {
    pub fn resolve(classified: &ClassifiedSet<'_>) -> Self {
        let mut overdue = BTreeSet::new();
        let mut upcoming = BTreeSet::new();

        for entry in classified.iter() {
            match entry.status.axis() {
                Some(StatusAxis::Overdue) => {
                    overdue.insert(entry.bucket.as_str());
                }
                Some(StatusAxis::Upcoming) => {
                    upcoming.insert(entry.bucket.as_str());
                }
                None => {}
            }
        }

        Self {
            overdue: sorted(overdue),
            upcoming: sorted(upcoming),
        }
    }

    pub fn for_axis(&self, axis: StatusAxis) -> &[String] {
        match axis {
            StatusAxis::Overdue => &self.overdue,
            StatusAxis::Upcoming => &self.upcoming,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.upcoming.is_empty()
    }
}

fn sorted(labels: BTreeSet<&str>) -> Vec<String> {
    let mut out: Vec<String> = labels.into_iter().map(str::to_string).collect();
    out.sort_by(|a, b| collate(a, b));
    out
}

/// Fixed day ranges used to break an aging bucket down further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DaysBucket {
    Zero,
    UpTo7,
    UpTo15,
    UpTo30,
    UpTo60,
    UpTo90,
    Over90,
    NoDays,
}

impl DaysBucket {
    /// Canonical display order.
    pub const ALL: [DaysBucket; 8] = [
        DaysBucket::Zero,
        DaysBucket::UpTo7,
        DaysBucket::UpTo15,
        DaysBucket::UpTo30,
        DaysBucket::UpTo60,
        DaysBucket::UpTo90,
        DaysBucket::Over90,
        DaysBucket::NoDays,
    ];

    pub fn from_days(days: Option<i64>) -> Self {
        match days {
            None => DaysBucket::NoDays,
            Some(d) if d <= 0 => DaysBucket::Zero,
            Some(d) if d <= 7 => DaysBucket::UpTo7,
            Some(d) if d <= 15 => DaysBucket::UpTo15,
            Some(d) if d <= 30 => DaysBucket::UpTo30,
            Some(d) if d <= 60 => DaysBucket::UpTo60,
            Some(d) if d <= 90 => DaysBucket::UpTo90,
            Some(_) => DaysBucket::Over90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DaysBucket::Zero => "0",
            DaysBucket::UpTo7 => "1-7",
            DaysBucket::UpTo15 => "8-15",
            DaysBucket::UpTo30 => "16-30",
            DaysBucket::UpTo60 => "31-60",
            DaysBucket::UpTo90 => "61-90",
            DaysBucket::Over90 => "90+",
            DaysBucket::NoDays => "(no days)",
        }
    }
}

impl fmt::Display for DaysBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysSlice {
    pub bucket: DaysBucket,
    pub amount: Decimal,
    pub row_count: usize,
}

/// Days breakdown of one open status/aging bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysPanel {
    pub axis: StatusAxis,
    pub bucket: String,
    pub slices: Vec<DaysSlice>,
}

/// Breaks the rows of one status/aging bucket down by day range.
///
/// Only ranges with at least one row are returned, in canonical order.
pub fn days_breakdown<'r, 'a: 'r, I>(entries: I, axis: StatusAxis, bucket: &str) -> Vec<DaysSlice>
where
    I: IntoIterator<Item = &'r ClassifiedRow<'a>>,
{
    let mut slices: Vec<DaysSlice> = DaysBucket::ALL
        .iter()
        .map(|&b| DaysSlice {
            bucket: b,
            amount: Decimal::ZERO,
            row_count: 0,
        })
        .collect();

    for entry in entries {
        if entry.status.axis() != Some(axis) || entry.bucket != bucket {
            continue;
        }
        let days = DaysBucket::from_days(entry.row.days);
        if let Some(slice) = slices.iter_mut().find(|s| s.bucket == days) {
            add_amount(&mut slice.amount, entry.row.amount);
            slice.row_count += 1;
        }
    }

    slices.retain(|s| s.row_count > 0);
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::StatusClassifier;
    use crate::reference::ReferenceSelection;
    use crate::schema::{EngineConfig, LedgerRow};
    use chrono::NaiveDate;

    fn row(due_day: u32, aging: &str, amount: i64, days: Option<i64>) -> LedgerRow {
        LedgerRow {
            amount: Decimal::from(amount),
            due_date: NaiveDate::from_ymd_opt(2024, 1, due_day),
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            aging_label: aging.to_string(),
            days,
            ..Default::default()
        }
    }

    #[test]
    fn test_bucket_label_normalizes_and_defaults() {
        let labels = SentinelLabels::default();
        assert_eq!(bucket_label(" 1-30 dias ", &labels), "1-30 DIAS");
        assert_eq!(bucket_label("", &labels), "NO AGING");
    }

    #[test]
    fn test_bucket_sets_are_per_status_and_sorted() {
        let rows = vec![
            row(1, "31-60", 10, None),
            row(2, "1-30", 10, None),
            row(3, "1-30", 10, None),
            row(20, "a vencer 1-30", 10, None),
            row(25, "", 10, None),
        ];
        let config = EngineConfig::default();
        let classified = StatusClassifier::new(&config).classify_rows(&rows, ReferenceSelection::All);

        let buckets = AgingBucketSet::resolve(&classified);
        assert_eq!(buckets.overdue, vec!["1-30", "31-60"]);
        assert_eq!(buckets.upcoming, vec!["A VENCER 1-30", "NO AGING"]);
    }

    #[test]
    fn test_empty_status_yields_empty_bucket_set() {
        let rows = vec![row(20, "1-30", 10, None)];
        let config = EngineConfig::default();
        let classified = StatusClassifier::new(&config).classify_rows(&rows, ReferenceSelection::All);

        let buckets = AgingBucketSet::resolve(&classified);
        assert!(buckets.overdue.is_empty());
        assert_eq!(buckets.for_axis(StatusAxis::Upcoming), &["1-30".to_string()]);
    }

    #[test]
    fn test_days_bucket_ranges() {
        assert_eq!(DaysBucket::from_days(Some(-3)), DaysBucket::Zero);
        assert_eq!(DaysBucket::from_days(Some(7)), DaysBucket::UpTo7);
        assert_eq!(DaysBucket::from_days(Some(8)), DaysBucket::UpTo15);
        assert_eq!(DaysBucket::from_days(Some(90)), DaysBucket::UpTo90);
        assert_eq!(DaysBucket::from_days(Some(91)), DaysBucket::Over90);
        assert_eq!(DaysBucket::from_days(None).label(), "(no days)");
    }

    #[test]
    fn test_days_breakdown_keeps_canonical_order() {
        let rows = vec![
            row(1, "1-30", 100, Some(14)),
            row(2, "1-30", 40, None),
            row(3, "1-30", 60, Some(3)),
            row(4, "31-60", 500, Some(40)),
            row(20, "1-30", 999, Some(3)),
        ];
        let config = EngineConfig::default();
        let classified = StatusClassifier::new(&config).classify_rows(&rows, ReferenceSelection::All);

        let slices = days_breakdown(classified.iter(), StatusAxis::Overdue, "1-30");
        let labels: Vec<&str> = slices.iter().map(|s| s.bucket.label()).collect();
        assert_eq!(labels, vec!["1-7", "8-15", "(no days)"]);
        assert_eq!(slices[0].amount, Decimal::from(60));
        assert_eq!(slices[1].amount, Decimal::from(100));
        assert_eq!(slices[2].row_count, 1);
    }
}
