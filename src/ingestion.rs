use crate::error::Result;
use crate::schema::LedgerRow;
use crate::utils::parse_iso_date;
use log::warn;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Largest magnitude accepted from the wire. Bigger values are treated as corrupt.
pub const MAX_ABS_AMOUNT: f64 = 1e15;

/// A ledger row as the row source delivers it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowRecord {
    pub amount: f64,

    #[serde(default)]
    #[schemars(description = "Due date as YYYY-MM-DD, or null")]
    pub due_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Snapshot date as YYYY-MM-DD, or null")]
    pub reference_date: Option<String>,

    #[serde(default)]
    pub dimensions: Vec<String>,

    #[serde(default)]
    pub raw_status: String,

    #[serde(default)]
    pub aging_label: String,

    #[serde(default)]
    pub days: Option<i64>,
}

impl RowRecord {
    /// Converts the wire record into a ledger row. Dates that are not strict
    /// ISO dates become `None`; the engine never guesses other formats.
    pub fn into_row(self) -> LedgerRow {
        let amount = if self.amount.abs() > MAX_ABS_AMOUNT {
            warn!("Out-of-range amount {} replaced with zero", self.amount);
            Decimal::ZERO
        } else {
            Decimal::from_f64(self.amount).unwrap_or_else(|| {
                warn!("Non-finite amount {} replaced with zero", self.amount);
                Decimal::ZERO
            })
        };

        LedgerRow {
            amount,
            due_date: lenient_date(self.due_date.as_deref(), "due date"),
            reference_date: lenient_date(self.reference_date.as_deref(), "reference date"),
            dimensions: self.dimensions,
            raw_status: self.raw_status,
            aging_label: self.aging_label,
            days: self.days,
        }
    }
}

fn lenient_date(raw: Option<&str>, field: &str) -> Option<chrono::NaiveDate> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = parse_iso_date(raw);
    if parsed.is_none() {
        warn!("Unparseable {} '{}' treated as missing", field, raw);
    }
    parsed
}

pub fn convert_records(records: Vec<RowRecord>) -> Vec<LedgerRow> {
    records.into_iter().map(RowRecord::into_row).collect()
}

/// Parses a JSON array of row records.
pub fn rows_from_json(json: &str) -> Result<Vec<LedgerRow>> {
    let records: Vec<RowRecord> = serde_json::from_str(json)?;
    Ok(convert_records(records))
}

pub fn record_schema_as_json() -> std::result::Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(RowRecord);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    #[test]
    fn test_rows_from_json() {
        let json = r#"[
            {
                "amount": 1250.75,
                "dueDate": "2024-01-10",
                "referenceDate": "2024-01-15",
                "dimensions": ["SUPPLIERS", "RAW", "", "", "", "ACME"],
                "rawStatus": "vencido",
                "agingLabel": "1-30"
            },
            {
                "amount": -20,
                "dueDate": "10/01/2024",
                "referenceDate": null
            }
        ]"#;

        let rows = rows_from_json(json).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].amount, Decimal::from_str("1250.75").unwrap());
        assert_eq!(rows[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(rows[0].dimensions.len(), 6);

        assert_eq!(rows[1].amount, Decimal::from(-20));
        assert_eq!(rows[1].due_date, None);
        assert_eq!(rows[1].reference_date, None);
        assert!(rows[1].raw_status.is_empty());
    }

    #[test]
    fn test_out_of_range_amounts_are_zeroed() {
        let json = r#"[
            { "amount": 7.0e28, "dimensions": ["A"] },
            { "amount": -7.0e28, "dimensions": ["A"] },
            { "amount": 123456789.5, "dimensions": ["A"] }
        ]"#;

        let rows = rows_from_json(json).unwrap();
        assert_eq!(rows[0].amount, Decimal::ZERO);
        assert_eq!(rows[1].amount, Decimal::ZERO);
        assert_eq!(rows[2].amount, Decimal::from_str("123456789.5").unwrap());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(rows_from_json("{ not json").is_err());
    }

    #[test]
    fn test_record_schema() {
        let schema = record_schema_as_json().unwrap();
        assert!(schema.contains("dueDate"));
        assert!(schema.contains("agingLabel"));
    }
}
