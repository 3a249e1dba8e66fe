//! # Ledger Aging
//!
//! Hierarchical aggregation and aging engine for payable/receivable ledger
//! extracts.
//!
//! ## Core Concepts
//!
//! - **Reference date**: the snapshot ("data base") a row's due date is compared with.
//!   Either one selected date or each row's own snapshot.
//! - **Status**: OVERDUE when the due date is on or before the reference date,
//!   UPCOMING after it, otherwise the row's normalized raw status.
//! - **Hierarchy**: rows partitioned by an ordered list of dimensions
//!   (type → subtype → group → classification → nature → counterparty).
//! - **Aging buckets**: the distinct aging labels among overdue rows and among
//!   upcoming rows, shared as columns by every node.
//! - **Pivot state**: which status columns are split into buckets and which
//!   nodes are expanded. It only affects what is shown, never the totals.
//!
//! The pipeline is a pure function of `(rows, selection, dimensions)`; callers
//! re-run it whenever one of them changes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_aging::*;
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let rows = vec![
//!     LedgerRow {
//!         amount: Decimal::from(100),
//!         due_date: NaiveDate::from_ymd_opt(2024, 1, 10),
//!         reference_date: NaiveDate::from_ymd_opt(2024, 1, 15),
//!         dimensions: vec!["SUPPLIERS".into(), "RAW".into()],
//!         ..Default::default()
//!     },
//! ];
//! let dims = vec![Dimension::new("type", 0), Dimension::new("subtype", 1)];
//!
//! let tree = build_aging_tree(&rows, ReferenceSelection::All, &dims);
//! assert_eq!(tree.summary().overdue_total, Decimal::from(100));
//! ```

pub mod aggregator;
pub mod aging;
pub mod classifier;
pub mod error;
pub mod hierarchy;
pub mod ingestion;
pub mod pivot;
pub mod reference;
pub mod schema;
pub mod session;
pub mod utils;
pub mod verification;

pub use aggregator::{AggregatedNode, AggregatedTree, Aggregator, LedgerSummary};
pub use aging::{
    bucket_label, days_breakdown, AgingBucketSet, DaysBucket, DaysPanel, DaysSlice,
};
pub use classifier::{
    classify_row, ClassifiedRow, ClassifiedSet, Status, StatusAxis, StatusClassifier,
};
pub use error::{LedgerError, Result};
pub use hierarchy::{
    build_hierarchy, DimensionExtractor, FnDimension, HierarchyBuilder, HierarchyNode,
};
pub use ingestion::*;
pub use pivot::{AxisState, ColumnDescriptor, ColumnKind, NodeView, PivotState};
pub use reference::{filter_rows, reference_options, ReferenceSelection};
pub use schema::*;
pub use session::{FetchTicket, LedgerSession, RequestGuard, RowSource};
pub use utils::*;
pub use verification::{verify_consistency, ConsistencyChecker};

use log::{debug, info};

/// Classification → hierarchy → buckets → aggregation over one row set.
pub struct AgingPipeline<'c> {
    config: &'c EngineConfig,
}

impl<'c> AgingPipeline<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline with the configured dimensions.
    pub fn run(&self, rows: &[LedgerRow], selection: ReferenceSelection) -> AggregatedTree {
        self.run_with(rows, selection, &self.config.dimensions)
    }

    /// Runs the pipeline with an explicit list of extractors.
    pub fn run_with<E: DimensionExtractor>(
        &self,
        rows: &[LedgerRow],
        selection: ReferenceSelection,
        extractors: &[E],
    ) -> AggregatedTree {
        info!(
            "Aggregating {} ledger row(s) at reference {} over {} level(s)",
            rows.len(),
            selection,
            extractors.len()
        );

        let classifier = StatusClassifier::new(self.config);
        let classified = classifier.classify_rows(rows, selection);
        let buckets = AgingBucketSet::resolve(&classified);
        debug!(
            "{} row(s) visible; {} overdue bucket(s), {} upcoming bucket(s)",
            classified.len(),
            buckets.overdue.len(),
            buckets.upcoming.len()
        );

        let hierarchy = build_hierarchy(&classified, extractors, &self.config.labels);
        let root = Aggregator::new(&classified, &buckets).aggregate(&hierarchy);

        AggregatedTree::new(
            selection,
            extractors.iter().map(|e| e.name().to_string()).collect(),
            buckets,
            root,
        )
    }

    /// Runs the pipeline and checks the result with [`verify_consistency`].
    pub fn run_with_verification(
        &self,
        rows: &[LedgerRow],
        selection: ReferenceSelection,
    ) -> Result<AggregatedTree> {
        let tree = self.run(rows, selection);
        verify_consistency(&tree)?;
        Ok(tree)
    }

    /// Days breakdown of one aging bucket under the node at `path`.
    pub fn days_breakdown(
        &self,
        rows: &[LedgerRow],
        tree: &AggregatedTree,
        path: &[String],
        axis: StatusAxis,
        bucket: &str,
    ) -> Result<Vec<DaysSlice>> {
        let node = tree
            .find(path)
            .ok_or_else(|| LedgerError::UnknownNode(path_key(path)))?;

        let classified = StatusClassifier::new(self.config).classify_rows(rows, tree.selection);
        let entries = node
            .row_indices()
            .into_iter()
            .filter_map(|index| classified.get(index));

        Ok(days_breakdown(entries, axis, bucket))
    }
}

/// Builds the aggregated tree with default labels and fallback.
pub fn build_aging_tree(
    rows: &[LedgerRow],
    selection: ReferenceSelection,
    dimensions: &[Dimension],
) -> AggregatedTree {
    let config = EngineConfig {
        dimensions: dimensions.to_vec(),
        ..Default::default()
    };
    AgingPipeline::new(&config).run(rows, selection)
}

/// Builds the aggregated tree from a full engine configuration.
pub fn build_aging_tree_with_config(
    rows: &[LedgerRow],
    selection: ReferenceSelection,
    config: &EngineConfig,
) -> AggregatedTree {
    AgingPipeline::new(config).run(rows, selection)
}
