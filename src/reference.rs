use crate::error::{LedgerError, Result};
use crate::schema::LedgerRow;
use crate::utils::parse_iso_date;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which snapshot the dashboard is looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "date", rename_all = "snake_case")]
pub enum ReferenceSelection {
    /// Every snapshot; each row is classified against its own reference date.
    #[default]
    All,
    /// Only rows of this snapshot, classified against it.
    Date(NaiveDate),
}

impl ReferenceSelection {
    /// The date a row's due date is compared with.
    pub fn effective_date(&self, row: &LedgerRow) -> Option<NaiveDate> {
        match self {
            ReferenceSelection::All => row.reference_date,
            ReferenceSelection::Date(date) => Some(*date),
        }
    }

    /// Whether the row belongs to the selected snapshot.
    pub fn admits(&self, row: &LedgerRow) -> bool {
        match self {
            ReferenceSelection::All => true,
            ReferenceSelection::Date(date) => row.reference_date == Some(*date),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ReferenceSelection::All)
    }
}

impl fmt::Display for ReferenceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceSelection::All => write!(f, "all"),
            ReferenceSelection::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for ReferenceSelection {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(ReferenceSelection::All);
        }
        parse_iso_date(trimmed)
            .map(ReferenceSelection::Date)
            .ok_or_else(|| {
                LedgerError::InvalidConfig(format!(
                    "Invalid reference selection '{}'. Expected 'all' or YYYY-MM-DD",
                    s
                ))
            })
    }
}

/// Distinct snapshot dates present in the rows, newest first.
pub fn reference_options(rows: &[LedgerRow]) -> Vec<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = rows.iter().filter_map(|r| r.reference_date).collect();
    dates.into_iter().rev().collect()
}

/// Indices of the rows visible under `selection`, in input order.
pub fn filter_rows(rows: &[LedgerRow], selection: ReferenceSelection) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| selection.admits(row))
        .map(|(idx, _)| idx)
        .collect()
}
