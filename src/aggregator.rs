use crate::aging::AgingBucketSet;
use crate::classifier::{ClassifiedRow, ClassifiedSet, Status, StatusAxis};
use crate::hierarchy::HierarchyNode;
use crate::reference::ReferenceSelection;
use crate::utils::{add_amount, collate, path_key};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A hierarchy node decorated with its monetary totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedNode {
    pub label: String,
    pub depth: usize,
    /// Labels from the top level down to this node. Empty for the root.
    pub path: Vec<String>,
    pub row_count: usize,
    pub total: Decimal,
    pub overdue_total: Decimal,
    pub upcoming_total: Decimal,
    pub overdue_by_bucket: BTreeMap<String, Decimal>,
    pub upcoming_by_bucket: BTreeMap<String, Decimal>,
    /// Ordered by descending absolute total.
    pub children: Vec<AggregatedNode>,
    /// Input indices of the rows, populated on leaves only.
    pub rows: Vec<usize>,
}

impl AggregatedNode {
    fn empty(label: String, depth: usize, path: Vec<String>, buckets: &AgingBucketSet) -> Self {
        Self {
            label,
            depth,
            path,
            row_count: 0,
            total: Decimal::ZERO,
            overdue_total: Decimal::ZERO,
            upcoming_total: Decimal::ZERO,
            overdue_by_bucket: seed(&buckets.overdue),
            upcoming_by_bucket: seed(&buckets.upcoming),
            children: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn absorb_row(&mut self, entry: &ClassifiedRow<'_>) {
        let amount = entry.row.amount;
        self.row_count += 1;
        add_amount(&mut self.total, amount);

        match entry.status {
            Status::Overdue => {
                add_amount(&mut self.overdue_total, amount);
                add_amount(
                    self.overdue_by_bucket
                        .entry(entry.bucket.clone())
                        .or_insert(Decimal::ZERO),
                    amount,
                );
            }
            Status::Upcoming => {
                add_amount(&mut self.upcoming_total, amount);
                add_amount(
                    self.upcoming_by_bucket
                        .entry(entry.bucket.clone())
                        .or_insert(Decimal::ZERO),
                    amount,
                );
            }
            Status::Other(_) => {}
        }
    }

    fn absorb_child(&mut self, child: &AggregatedNode) {
        self.row_count += child.row_count;
        add_amount(&mut self.total, child.total);
        add_amount(&mut self.overdue_total, child.overdue_total);
        add_amount(&mut self.upcoming_total, child.upcoming_total);

        for (bucket, amount) in &child.overdue_by_bucket {
            add_amount(
                self.overdue_by_bucket
                    .entry(bucket.clone())
                    .or_insert(Decimal::ZERO),
                *amount,
            );
        }
        for (bucket, amount) in &child.upcoming_by_bucket {
            add_amount(
                self.upcoming_by_bucket
                    .entry(bucket.clone())
                    .or_insert(Decimal::ZERO),
                *amount,
            );
        }
    }

    pub fn key(&self) -> String {
        path_key(&self.path)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn status_total(&self, axis: StatusAxis) -> Decimal {
        match axis {
            StatusAxis::Overdue => self.overdue_total,
            StatusAxis::Upcoming => self.upcoming_total,
        }
    }

    pub fn by_bucket(&self, axis: StatusAxis) -> &BTreeMap<String, Decimal> {
        match axis {
            StatusAxis::Overdue => &self.overdue_by_bucket,
            StatusAxis::Upcoming => &self.upcoming_by_bucket,
        }
    }

    /// Sum of one aging bucket. `None` when the bucket is not part of the axis.
    pub fn bucket_total(&self, axis: StatusAxis, bucket: &str) -> Option<Decimal> {
        self.by_bucket(axis).get(bucket).copied()
    }

    /// Input indices of every row under this node, leaves first-to-last.
    pub fn row_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.row_count);
        self.collect_rows(&mut out);
        out
    }

    fn collect_rows(&self, out: &mut Vec<usize>) {
        out.extend_from_slice(&self.rows);
        for child in &self.children {
            child.collect_rows(out);
        }
    }

    pub fn find(&self, path: &[String]) -> Option<&AggregatedNode> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        self.children
            .iter()
            .find(|c| &c.label == head)
            .and_then(|c| c.find(rest))
    }
}

fn seed(labels: &[String]) -> BTreeMap<String, Decimal> {
    labels.iter().map(|l| (l.clone(), Decimal::ZERO)).collect()
}

/// Sibling order: largest absolute total first, labels break ties.
fn sibling_order(a: &AggregatedNode, b: &AggregatedNode) -> Ordering {
    b.total
        .abs()
        .cmp(&a.total.abs())
        .then_with(|| collate(&a.label, &b.label))
}

pub struct Aggregator<'s, 'a> {
    classified: &'s ClassifiedSet<'a>,
    buckets: &'s AgingBucketSet,
}

impl<'s, 'a> Aggregator<'s, 'a> {
    pub fn new(classified: &'s ClassifiedSet<'a>, buckets: &'s AgingBucketSet) -> Self {
        Self {
            classified,
            buckets,
        }
    }

    /// Single bottom-up pass: leaves sum their rows, inner nodes sum their
    /// already aggregated children.
    pub fn aggregate(&self, root: &HierarchyNode) -> AggregatedNode {
        self.aggregate_at(root, Vec::new())
    }

    fn aggregate_at(&self, node: &HierarchyNode, path: Vec<String>) -> AggregatedNode {
        let mut agg = AggregatedNode::empty(node.label.clone(), node.depth, path, self.buckets);

        if node.is_leaf() {
            for &index in &node.rows {
                if let Some(entry) = self.classified.get(index) {
                    agg.absorb_row(entry);
                }
            }
            agg.rows = node.rows.clone();
            return agg;
        }

        let mut children = Vec::with_capacity(node.children.len());
        for child in node.children.values() {
            let mut child_path = agg.path.clone();
            child_path.push(child.label.clone());
            let aggregated = self.aggregate_at(child, child_path);
            agg.absorb_child(&aggregated);
            children.push(aggregated);
        }
        children.sort_by(sibling_order);
        agg.children = children;

        agg
    }
}

/// Headline figures of the filtered set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub row_count: usize,
    pub overdue_total: Decimal,
    pub upcoming_total: Decimal,
    pub total: Decimal,
}

/// Result of one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedTree {
    pub selection: ReferenceSelection,
    /// Names of the hierarchy levels, outermost first.
    pub dimensions: Vec<String>,
    pub buckets: AgingBucketSet,
    pub root: AggregatedNode,
}

impl AggregatedTree {
    pub fn new(
        selection: ReferenceSelection,
        dimensions: Vec<String>,
        buckets: AgingBucketSet,
        root: AggregatedNode,
    ) -> Self {
        debug!(
            "Aggregated {} row(s) into {} top-level node(s)",
            root.row_count,
            root.children.len()
        );
        Self {
            selection,
            dimensions,
            buckets,
            root,
        }
    }

    pub fn top_level(&self) -> &[AggregatedNode] {
        &self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.row_count == 0
    }

    pub fn find(&self, path: &[String]) -> Option<&AggregatedNode> {
        self.root.find(path)
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            row_count: self.root.row_count,
            overdue_total: self.root.overdue_total,
            upcoming_total: self.root.upcoming_total,
            total: self.root.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::StatusClassifier;
    use crate::hierarchy::build_hierarchy;
    use crate::schema::{Dimension, EngineConfig, LedgerRow};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn row(dims: &[&str], amount: &str, due_day: Option<u32>, aging: &str) -> LedgerRow {
        LedgerRow {
            amount: Decimal::from_str(amount).unwrap(),
            due_date: due_day.and_then(|d| NaiveDate::from_ymd_opt(2024, 1, d)),
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            aging_label: aging.to_string(),
            ..Default::default()
        }
    }

    fn aggregate(rows: &[LedgerRow], dimensions: &[Dimension]) -> AggregatedNode {
        let config = EngineConfig::default();
        let classified = StatusClassifier::new(&config).classify_rows(rows, ReferenceSelection::All);
        let buckets = AgingBucketSet::resolve(&classified);
        let hierarchy = build_hierarchy(&classified, dimensions, &config.labels);
        Aggregator::new(&classified, &buckets).aggregate(&hierarchy)
    }

    #[test]
    fn test_totals_roll_up() {
        let rows = vec![
            row(&["A", "X"], "100.10", Some(10), "1-30"),
            row(&["A", "Y"], "50.20", Some(20), "A VENCER"),
            row(&["B", "Z"], "0.30", None, ""),
        ];
        let dims = vec![Dimension::new("level 1", 0), Dimension::new("level 2", 1)];
        let root = aggregate(&rows, &dims);

        assert_eq!(root.total, Decimal::from_str("150.60").unwrap());
        assert_eq!(root.overdue_total, Decimal::from_str("100.10").unwrap());
        assert_eq!(root.upcoming_total, Decimal::from_str("50.20").unwrap());
        assert_eq!(root.row_count, 3);

        let a = &root.children[0];
        assert_eq!(a.label, "A");
        assert_eq!(a.path, vec!["A".to_string()]);
        assert_eq!(a.overdue_by_bucket["1-30"], Decimal::from_str("100.10").unwrap());
        assert_eq!(a.upcoming_by_bucket["A VENCER"], Decimal::from_str("50.20").unwrap());

        let b = &root.children[1];
        assert_eq!(b.total, Decimal::from_str("0.30").unwrap());
        assert_eq!(b.overdue_by_bucket["1-30"], Decimal::ZERO);
        assert_eq!(b.upcoming_by_bucket["A VENCER"], Decimal::ZERO);
    }

    #[test]
    fn test_children_sorted_by_absolute_total() {
        let rows = vec![
            row(&["SMALL"], "10", Some(10), ""),
            row(&["REFUND"], "-500", Some(10), ""),
            row(&["LARGE"], "200", Some(10), ""),
            row(&["TIE"], "10", Some(10), ""),
        ];
        let dims = vec![Dimension::new("level 1", 0)];
        let root = aggregate(&rows, &dims);

        let labels: Vec<&str> = root.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["REFUND", "LARGE", "SMALL", "TIE"]);
    }

    #[test]
    fn test_leaf_rows_and_lookup() {
        let rows = vec![
            row(&["A", "X"], "1", Some(10), ""),
            row(&["A", "X"], "2", Some(10), ""),
            row(&["A", "Y"], "3", Some(10), ""),
        ];
        let dims = vec![Dimension::new("level 1", 0), Dimension::new("level 2", 1)];
        let root = aggregate(&rows, &dims);

        let x = root
            .find(&["A".to_string(), "X".to_string()])
            .expect("node A > X");
        assert_eq!(x.rows, vec![0, 1]);
        assert_eq!(x.key(), "A > X");

        let mut all = root.row_indices();
        all.sort();
        assert_eq!(all, vec![0, 1, 2]);
        assert!(root.find(&["B".to_string()]).is_none());
    }

    #[test]
    fn test_empty_rows_give_empty_root() {
        let dims = vec![Dimension::new("level 1", 0)];
        let root = aggregate(&[], &dims);

        assert!(root.children.is_empty());
        assert_eq!(root.total, Decimal::ZERO);
        assert!(root.overdue_by_bucket.is_empty());
    }

    #[test]
    fn test_overflowing_sums_saturate() {
        let mut rows = vec![
            row(&["A", "X"], "0", Some(10), "1-30"),
            row(&["A", "X"], "0", Some(10), "1-30"),
            row(&["B", "X"], "0", Some(10), "1-30"),
        ];
        for r in &mut rows {
            r.amount = Decimal::MAX;
        }
        let dims = vec![Dimension::new("level 1", 0), Dimension::new("level 2", 1)];
        let root = aggregate(&rows, &dims);

        assert_eq!(root.row_count, 3);
        assert_eq!(root.total, Decimal::MAX);
        assert_eq!(root.overdue_total, Decimal::MAX);
        assert_eq!(root.overdue_by_bucket["1-30"], Decimal::MAX);
        assert_eq!(root.children[0].total, Decimal::MAX);
    }
}
