use crate::aggregator::{AggregatedNode, AggregatedTree};
use crate::aging::AgingBucketSet;
use crate::classifier::StatusAxis;
use crate::utils::path_key;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const TOTAL_LABEL: &str = "TOTAL";
const TOTAL_ID: &str = "total";
const BUCKET_SEPARATOR: &str = " · ";

/// Whether a status column is shown as one aggregate or split into buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisState {
    #[default]
    Collapsed,
    Expanded,
}

impl AxisState {
    pub fn toggled(self) -> Self {
        match self {
            AxisState::Collapsed => AxisState::Expanded,
            AxisState::Expanded => AxisState::Collapsed,
        }
    }

    pub fn is_expanded(self) -> bool {
        self == AxisState::Expanded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Status(StatusAxis),
    Total,
}

/// One rendered value column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: String,
    pub label: String,
    pub kind: ColumnKind,
    /// Set when the column shows a single aging bucket.
    pub bucket: Option<String>,
}

impl ColumnDescriptor {
    fn aggregate(axis: StatusAxis) -> Self {
        Self {
            id: axis_id(axis).to_string(),
            label: axis.label().to_string(),
            kind: ColumnKind::Status(axis),
            bucket: None,
        }
    }

    fn bucket(axis: StatusAxis, bucket: &str) -> Self {
        Self {
            id: format!("{}:{}", axis_id(axis), bucket),
            label: format!("{}{}{}", axis.label(), BUCKET_SEPARATOR, bucket),
            kind: ColumnKind::Status(axis),
            bucket: Some(bucket.to_string()),
        }
    }

    fn total() -> Self {
        Self {
            id: TOTAL_ID.to_string(),
            label: TOTAL_LABEL.to_string(),
            kind: ColumnKind::Total,
            bucket: None,
        }
    }
}

fn axis_id(axis: StatusAxis) -> &'static str {
    match axis {
        StatusAxis::Overdue => "overdue",
        StatusAxis::Upcoming => "upcoming",
    }
}

fn parse_column_id(id: &str) -> Option<(ColumnKind, Option<&str>)> {
    if id == TOTAL_ID {
        return Some((ColumnKind::Total, None));
    }
    let (axis_part, bucket) = match id.split_once(':') {
        Some((axis, bucket)) => (axis, Some(bucket)),
        None => (id, None),
    };
    let axis = StatusAxis::ALL
        .into_iter()
        .find(|a| axis_id(*a) == axis_part)?;
    Some((ColumnKind::Status(axis), bucket))
}

impl AggregatedNode {
    /// Value of this node in the given column.
    pub fn value_for(&self, column: &ColumnDescriptor) -> Decimal {
        match (column.kind, column.bucket.as_deref()) {
            (ColumnKind::Total, _) => self.total,
            (ColumnKind::Status(axis), None) => self.status_total(axis),
            (ColumnKind::Status(axis), Some(bucket)) => {
                self.bucket_total(axis, bucket).unwrap_or(Decimal::ZERO)
            }
        }
    }

    /// Value by column id; `None` for ids that name no column of this node.
    pub fn value_by_id(&self, column_id: &str) -> Option<Decimal> {
        match parse_column_id(column_id)? {
            (ColumnKind::Total, _) => Some(self.total),
            (ColumnKind::Status(axis), None) => Some(self.status_total(axis)),
            (ColumnKind::Status(axis), Some(bucket)) => self.bucket_total(axis, bucket),
        }
    }
}

/// A node as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView<'t> {
    pub node: &'t AggregatedNode,
    pub key: String,
    pub label: &'t str,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

impl<'t> NodeView<'t> {
    pub fn value(&self, column_id: &str) -> Option<Decimal> {
        self.node.value_by_id(column_id)
    }
}

/// UI session state: bucket pivots and expanded nodes. Never touches totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotState {
    overdue: AxisState,
    upcoming: AxisState,
    expanded_nodes: BTreeSet<String>,
    /// Aging buckets, per status axis, whose days drill-down is open.
    open_days: BTreeSet<(StatusAxis, String)>,
}

impl PivotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: StatusAxis) -> AxisState {
        match axis {
            StatusAxis::Overdue => self.overdue,
            StatusAxis::Upcoming => self.upcoming,
        }
    }

    pub fn set_axis(&mut self, axis: StatusAxis, state: AxisState) {
        match axis {
            StatusAxis::Overdue => self.overdue = state,
            StatusAxis::Upcoming => self.upcoming = state,
        }
    }

    pub fn toggle_axis(&mut self, axis: StatusAxis) -> AxisState {
        let next = self.axis(axis).toggled();
        self.set_axis(axis, next);
        next
    }

    pub fn is_expanded<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.expanded_nodes.contains(&path_key(path))
    }

    /// Flips a node's expand state. Returns whether it is now expanded.
    pub fn toggle_node<S: AsRef<str>>(&mut self, path: &[S]) -> bool {
        self.toggle_key(path_key(path))
    }

    pub fn toggle_key(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.expanded_nodes.remove(&key) {
            false
        } else {
            self.expanded_nodes.insert(key);
            true
        }
    }

    pub fn expanded_keys(&self) -> impl Iterator<Item = &str> {
        self.expanded_nodes.iter().map(String::as_str)
    }

    /// Pre-expands the first `limit` top-level nodes.
    pub fn expand_top_level(&mut self, tree: &AggregatedTree, limit: usize) {
        for node in tree.top_level().iter().take(limit) {
            self.expanded_nodes.insert(node.key());
        }
    }

    /// Flips the days drill-down of one bucket. Returns whether it is now open.
    pub fn toggle_days(&mut self, axis: StatusAxis, bucket: &str) -> bool {
        let key = (axis, bucket.to_string());
        if self.open_days.remove(&key) {
            false
        } else {
            self.open_days.insert(key);
            true
        }
    }

    pub fn is_days_open(&self, axis: StatusAxis, bucket: &str) -> bool {
        self.open_days.contains(&(axis, bucket.to_string()))
    }

    /// Open drill-downs that are currently visible: the axis is split into
    /// buckets and the bucket exists in `buckets`. Axis order, then bucket order.
    pub fn visible_days(&self, buckets: &AgingBucketSet) -> Vec<(StatusAxis, String)> {
        StatusAxis::ALL
            .into_iter()
            .filter(|axis| self.axis(*axis).is_expanded())
            .flat_map(|axis| {
                buckets
                    .for_axis(axis)
                    .iter()
                    .filter(move |b| self.is_days_open(axis, b))
                    .map(move |b| (axis, b.clone()))
            })
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Column layout for the current state: overdue, upcoming, then total.
    ///
    /// An expanded axis with no buckets still renders one aggregate column.
    pub fn columns(&self, buckets: &AgingBucketSet) -> Vec<ColumnDescriptor> {
        let mut columns = Vec::new();

        for axis in StatusAxis::ALL {
            let labels = buckets.for_axis(axis);
            if self.axis(axis).is_expanded() && !labels.is_empty() {
                columns.extend(labels.iter().map(|b| ColumnDescriptor::bucket(axis, b)));
            } else {
                columns.push(ColumnDescriptor::aggregate(axis));
            }
        }

        columns.push(ColumnDescriptor::total());
        columns
    }

    /// Nodes to render, depth-first, descending only into expanded nodes.
    ///
    /// A tree built without dimensions has no top level; its root is shown instead.
    pub fn visible_nodes<'t>(&self, tree: &'t AggregatedTree) -> Vec<NodeView<'t>> {
        let mut out = Vec::new();
        if tree.top_level().is_empty() && !tree.is_empty() {
            self.collect_visible(&tree.root, &mut out);
            return out;
        }
        for node in tree.top_level() {
            self.collect_visible(node, &mut out);
        }
        out
    }

    fn collect_visible<'t>(&self, node: &'t AggregatedNode, out: &mut Vec<NodeView<'t>>) {
        let key = node.key();
        let expanded = self.expanded_nodes.contains(&key);
        out.push(NodeView {
            node,
            key,
            label: &node.label,
            depth: node.depth,
            has_children: node.has_children(),
            expanded,
        });

        if expanded {
            for child in &node.children {
                self.collect_visible(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets(overdue: &[&str], upcoming: &[&str]) -> AgingBucketSet {
        AgingBucketSet {
            overdue: overdue.iter().map(|s| s.to_string()).collect(),
            upcoming: upcoming.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(columns: &[ColumnDescriptor]) -> Vec<&str> {
        columns.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_collapsed_columns() {
        let pivot = PivotState::new();
        let columns = pivot.columns(&buckets(&["1-30"], &["31-60"]));
        assert_eq!(ids(&columns), vec!["overdue", "upcoming", "total"]);
        assert_eq!(columns[2].label, "TOTAL");
    }

    #[test]
    fn test_axes_toggle_independently() {
        let mut pivot = PivotState::new();
        assert_eq!(pivot.toggle_axis(StatusAxis::Upcoming), AxisState::Expanded);
        assert_eq!(pivot.axis(StatusAxis::Overdue), AxisState::Collapsed);

        let columns = pivot.columns(&buckets(&["1-30"], &["1-30", "31-60"]));
        assert_eq!(
            ids(&columns),
            vec!["overdue", "upcoming:1-30", "upcoming:31-60", "total"]
        );
        assert_eq!(columns[2].label, "UPCOMING · 31-60");
        assert_eq!(columns[2].bucket.as_deref(), Some("31-60"));

        assert_eq!(pivot.toggle_axis(StatusAxis::Upcoming), AxisState::Collapsed);
        assert_eq!(pivot, PivotState::new());
    }

    #[test]
    fn test_expanded_axis_without_buckets_keeps_one_column() {
        let mut pivot = PivotState::new();
        pivot.toggle_axis(StatusAxis::Overdue);

        let columns = pivot.columns(&buckets(&[], &["1-30"]));
        assert_eq!(ids(&columns), vec!["overdue", "upcoming", "total"]);
        assert_eq!(columns[0].kind, ColumnKind::Status(StatusAxis::Overdue));
    }

    #[test]
    fn test_toggle_node_and_days() {
        let mut pivot = PivotState::new();
        assert!(pivot.toggle_node(&["A", "B"]));
        assert!(pivot.is_expanded(&["A", "B"]));
        assert!(!pivot.is_expanded(&["A"]));
        assert!(!pivot.toggle_key("A > B"));
        assert!(!pivot.is_expanded(&["A", "B"]));

        assert!(pivot.toggle_days(StatusAxis::Overdue, "1-30"));
        assert!(pivot.is_days_open(StatusAxis::Overdue, "1-30"));
        pivot.reset();
        assert!(!pivot.is_days_open(StatusAxis::Overdue, "1-30"));
    }

    #[test]
    fn test_days_drill_down_is_per_axis() {
        let mut pivot = PivotState::new();
        let set = buckets(&["1-30", "31-60"], &["1-30"]);

        assert!(pivot.toggle_days(StatusAxis::Overdue, "1-30"));
        assert!(pivot.is_days_open(StatusAxis::Overdue, "1-30"));
        assert!(!pivot.is_days_open(StatusAxis::Upcoming, "1-30"));

        // hidden while the axis is collapsed
        assert!(pivot.visible_days(&set).is_empty());
        pivot.toggle_axis(StatusAxis::Overdue);
        pivot.toggle_axis(StatusAxis::Upcoming);
        assert_eq!(
            pivot.visible_days(&set),
            vec![(StatusAxis::Overdue, "1-30".to_string())]
        );

        pivot.toggle_days(StatusAxis::Upcoming, "1-30");
        pivot.toggle_days(StatusAxis::Overdue, "90+");
        assert_eq!(
            pivot.visible_days(&set),
            vec![
                (StatusAxis::Overdue, "1-30".to_string()),
                (StatusAxis::Upcoming, "1-30".to_string()),
            ]
        );
    }

    #[test]
    fn test_label_with_separator_does_not_expand_deeper_path() {
        let mut pivot = PivotState::new();
        assert!(pivot.toggle_node(&["A > B"]));
        assert!(pivot.is_expanded(&["A > B"]));
        assert!(!pivot.is_expanded(&["A", "B"]));
    }

    #[test]
    fn test_parse_column_ids() {
        assert_eq!(parse_column_id("total"), Some((ColumnKind::Total, None)));
        assert_eq!(
            parse_column_id("overdue:1-30"),
            Some((ColumnKind::Status(StatusAxis::Overdue), Some("1-30")))
        );
        assert_eq!(
            parse_column_id("upcoming"),
            Some((ColumnKind::Status(StatusAxis::Upcoming), None))
        );
        assert_eq!(parse_column_id("paid"), None);
    }
}
