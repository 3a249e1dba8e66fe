use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One payable or receivable line item, already normalized by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    /// The snapshot ("data base") date this row was ingested under.
    pub reference_date: Option<NaiveDate>,
    /// Classification labels in indicator order; any entry may be empty.
    pub dimensions: Vec<String>,
    pub raw_status: String,
    pub aging_label: String,
    /// Day count used by the days drill-down of an aging bucket.
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    #[schemars(description = "Accounts payable: type, subtype, group, classification, nature, payee")]
    Payables,

    #[schemars(
        description = "Accounts receivable: type, subtype, group, classification, nature, drawee, bearer, operation"
    )]
    Receivables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyView {
    /// Full category structure ending at the counterparty.
    #[default]
    Structure,
    /// Receivables by bearer (fund) and operation.
    Funds,
    /// Receivables by drawee and bearer.
    Delinquency,
}

pub mod payables {
    pub const TYPE: usize = 0;
    pub const SUBTYPE: usize = 1;
    pub const GROUP: usize = 2;
    pub const CLASSIFICATION: usize = 3;
    pub const NATURE: usize = 4;
    pub const PAYEE: usize = 5;
    pub const ARITY: usize = 6;
}

pub mod receivables {
    pub const TYPE: usize = 0;
    pub const SUBTYPE: usize = 1;
    pub const GROUP: usize = 2;
    pub const CLASSIFICATION: usize = 3;
    pub const NATURE: usize = 4;
    pub const DRAWEE: usize = 5;
    pub const BEARER: usize = 6;
    pub const OPERATION: usize = 7;
    pub const ARITY: usize = 8;
}

impl Indicator {
    /// Number of dimension labels every row of this indicator carries.
    pub fn arity(&self) -> usize {
        match self {
            Indicator::Payables => payables::ARITY,
            Indicator::Receivables => receivables::ARITY,
        }
    }

    pub fn views(&self) -> &'static [HierarchyView] {
        match self {
            Indicator::Payables => &[HierarchyView::Structure],
            Indicator::Receivables => &[
                HierarchyView::Funds,
                HierarchyView::Delinquency,
                HierarchyView::Structure,
            ],
        }
    }

    pub fn structure(&self) -> Vec<Dimension> {
        match self {
            Indicator::Payables => vec![
                Dimension::new("type", payables::TYPE),
                Dimension::new("subtype", payables::SUBTYPE),
                Dimension::new("group", payables::GROUP),
                Dimension::new("classification", payables::CLASSIFICATION),
                Dimension::new("nature", payables::NATURE),
                Dimension::new("payee", payables::PAYEE),
            ],
            Indicator::Receivables => vec![
                Dimension::new("type", receivables::TYPE).with_empty_label("NO TYPE"),
                Dimension::new("subtype", receivables::SUBTYPE).with_empty_label("NO SUBTYPE"),
                Dimension::new("group", receivables::GROUP).with_empty_label("NO GROUP"),
                Dimension::new("classification", receivables::CLASSIFICATION)
                    .with_empty_label("NO CLASSIFICATION"),
                Dimension::new("nature", receivables::NATURE).with_empty_label("NO NATURE"),
                Dimension::new("drawee", receivables::DRAWEE).with_empty_label("NO DRAWEE"),
            ],
        }
    }

    pub fn dimensions_for(&self, view: HierarchyView) -> Result<Vec<Dimension>> {
        match (self, view) {
            (_, HierarchyView::Structure) => Ok(self.structure()),
            (Indicator::Receivables, HierarchyView::Funds) => Ok(vec![
                Dimension::new("bearer", receivables::BEARER).with_empty_label("NO BEARER"),
                Dimension::new("operation", receivables::OPERATION)
                    .with_empty_label("NO OPERATION"),
            ]),
            (Indicator::Receivables, HierarchyView::Delinquency) => Ok(vec![
                Dimension::new("drawee", receivables::DRAWEE).with_empty_label("NO DRAWEE"),
                Dimension::new("bearer", receivables::BEARER).with_empty_label("NO BEARER"),
            ]),
            (Indicator::Payables, other) => Err(LedgerError::InvalidConfig(format!(
                "View {:?} is not available for payables",
                other
            ))),
        }
    }
}

/// One hierarchy level: which dimension column feeds it and how blanks are labelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Dimension {
    #[schemars(description = "Display name of the level (e.g. 'type', 'payee')")]
    pub name: String,

    #[schemars(description = "Zero-based position of the label inside each row's dimensions list")]
    pub column: usize,

    #[serde(default)]
    #[schemars(
        description = "Label used when the row's value is empty. Falls back to the engine-wide empty label."
    )]
    pub empty_label: Option<String>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, column: usize) -> Self {
        Self {
            name: name.into(),
            column,
            empty_label: None,
        }
    }

    pub fn with_empty_label(mut self, label: impl Into<String>) -> Self {
        self.empty_label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SentinelLabels {
    #[serde(default = "default_empty_dimension")]
    #[schemars(description = "Label for rows whose dimension value is missing or blank")]
    pub empty_dimension: String,

    #[serde(default = "default_no_aging")]
    #[schemars(description = "Aging bucket for rows without an aging label")]
    pub no_aging: String,

    #[serde(default = "default_unknown_status")]
    #[schemars(description = "Status for rows with no usable dates and no raw status")]
    pub unknown_status: String,
}

fn default_empty_dimension() -> String {
    "(empty)".to_string()
}

fn default_no_aging() -> String {
    "NO AGING".to_string()
}

fn default_unknown_status() -> String {
    "UNKNOWN".to_string()
}

impl Default for SentinelLabels {
    fn default() -> Self {
        Self {
            empty_dimension: default_empty_dimension(),
            no_aging: default_no_aging(),
            unknown_status: default_unknown_status(),
        }
    }
}

/// How a row is labelled when it cannot be classified from its dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[schemars(description = "Keep the trimmed, upper-cased raw status as the row's label")]
    #[default]
    Verbatim,

    #[schemars(
        description = "Map raw statuses containing one of the keywords onto UPCOMING or OVERDUE. Upcoming keywords are checked first."
    )]
    Keywords {
        overdue: Vec<String>,
        upcoming: Vec<String>,
    },
}

impl FallbackPolicy {
    /// Keyword set used by the receivables extracts ("VENCIDO", "A VENCER").
    pub fn receivables_keywords() -> Self {
        FallbackPolicy::Keywords {
            overdue: vec!["VENC".to_string(), "OVERDUE".to_string()],
            upcoming: vec![
                "A VENC".to_string(),
                "AVENC".to_string(),
                "UPCOMING".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    pub labels: SentinelLabels,

    #[serde(default)]
    pub fallback: FallbackPolicy,

    #[schemars(description = "Ordered hierarchy levels, outermost first")]
    pub dimensions: Vec<Dimension>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_indicator(Indicator::Payables)
    }
}

impl EngineConfig {
    pub fn for_indicator(indicator: Indicator) -> Self {
        let fallback = match indicator {
            Indicator::Payables => FallbackPolicy::Verbatim,
            Indicator::Receivables => FallbackPolicy::receivables_keywords(),
        };
        Self {
            labels: SentinelLabels::default(),
            fallback,
            dimensions: indicator.structure(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Checks the dimension list against the number of labels rows carry.
    pub fn validate(&self, arity: usize) -> Result<()> {
        let mut seen = BTreeSet::new();
        for dimension in &self.dimensions {
            if dimension.name.trim().is_empty() {
                return Err(LedgerError::InvalidConfig(format!(
                    "Dimension reading column {} has an empty name",
                    dimension.column
                )));
            }
            if dimension.column >= arity {
                return Err(LedgerError::DimensionOutOfRange {
                    dimension: dimension.name.clone(),
                    column: dimension.column,
                    arity,
                });
            }
            if !seen.insert(dimension.column) {
                return Err(LedgerError::InvalidConfig(format!(
                    "Column {} is used by more than one dimension",
                    dimension.column
                )));
            }
        }

        if self.labels.empty_dimension.trim().is_empty()
            || self.labels.no_aging.trim().is_empty()
            || self.labels.unknown_status.trim().is_empty()
        {
            return Err(LedgerError::InvalidConfig(
                "Sentinel labels must not be blank".to_string(),
            ));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = EngineConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("dimensions"));
        assert!(schema_json.contains("empty_dimension"));
        assert!(schema_json.contains("fallback"));
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let json = r#"{
            "dimensions": [
                { "name": "type", "column": 0 },
                { "name": "payee", "column": 5, "empty_label": "NO PAYEE" }
            ]
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.labels, SentinelLabels::default());
        assert_eq!(config.fallback, FallbackPolicy::Verbatim);
        assert_eq!(config.dimensions.len(), 2);
        assert_eq!(config.dimensions[1].empty_label.as_deref(), Some("NO PAYEE"));
        assert!(config.validate(Indicator::Payables.arity()).is_ok());
    }

    #[test]
    fn test_keyword_policy_round_trips() {
        let config = EngineConfig::for_indicator(Indicator::Receivables);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"policy\":\"keywords\""));

        let back = EngineConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_rejects_bad_dimensions() {
        let mut config = EngineConfig::default();
        config.dimensions.push(Dimension::new("extra", 9));
        assert!(matches!(
            config.validate(payables::ARITY),
            Err(LedgerError::DimensionOutOfRange { column: 9, .. })
        ));

        let mut config = EngineConfig::default();
        config.dimensions[1].column = 0;
        assert!(matches!(
            config.validate(payables::ARITY),
            Err(LedgerError::InvalidConfig(_))
        ));

        let mut config = EngineConfig::default();
        config.dimensions[0].name = "  ".to_string();
        assert!(config.validate(payables::ARITY).is_err());
    }

    #[test]
    fn test_indicator_views() {
        let funds = Indicator::Receivables
            .dimensions_for(HierarchyView::Funds)
            .unwrap();
        assert_eq!(funds.len(), 2);
        assert_eq!(funds[0].column, receivables::BEARER);

        assert!(Indicator::Payables
            .dimensions_for(HierarchyView::Delinquency)
            .is_err());
        assert_eq!(
            Indicator::Payables
                .dimensions_for(HierarchyView::Structure)
                .unwrap()
                .len(),
            payables::ARITY
        );
    }
}
