use crate::classifier::{ClassifiedRow, ClassifiedSet};
use crate::schema::{Dimension, LedgerRow, SentinelLabels};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label of the synthetic node holding the whole filtered set.
pub const ROOT_LABEL: &str = "TOTAL";

/// Pulls one hierarchy level's label out of a row.
pub trait DimensionExtractor {
    fn name(&self) -> &str;

    /// The raw label, or `None` when the row has no value for this level.
    fn extract<'r>(&self, row: &'r LedgerRow) -> Option<&'r str>;

    /// Label for rows with no value. `None` defers to the engine-wide sentinel.
    fn empty_label(&self) -> Option<&str> {
        None
    }
}

impl DimensionExtractor for Dimension {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract<'r>(&self, row: &'r LedgerRow) -> Option<&'r str> {
        row.dimensions.get(self.column).map(String::as_str)
    }

    fn empty_label(&self) -> Option<&str> {
        self.empty_label.as_deref()
    }
}

/// Extractor backed by a function, for levels that are not plain dimension columns.
pub struct FnDimension<F> {
    name: String,
    extract: F,
}

impl<F> FnDimension<F>
where
    F: for<'r> Fn(&'r LedgerRow) -> Option<&'r str>,
{
    pub fn new(name: impl Into<String>, extract: F) -> Self {
        Self {
            name: name.into(),
            extract,
        }
    }
}

impl<F> DimensionExtractor for FnDimension<F>
where
    F: for<'r> Fn(&'r LedgerRow) -> Option<&'r str>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extract<'r>(&self, row: &'r LedgerRow) -> Option<&'r str> {
        (self.extract)(row)
    }
}

/// One grouping level. Leaves (depth == number of dimensions) hold the input
/// indices of their rows; inner nodes only hold children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub label: String,
    pub depth: usize,
    pub children: BTreeMap<String, HierarchyNode>,
    pub rows: Vec<usize>,
}

impl HierarchyNode {
    fn new(label: String, depth: usize) -> Self {
        Self {
            label,
            depth,
            children: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Rows under this node, counted through the leaves.
    pub fn row_count(&self) -> usize {
        if self.is_leaf() {
            self.rows.len()
        } else {
            self.children.values().map(HierarchyNode::row_count).sum()
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .values()
            .map(HierarchyNode::node_count)
            .sum::<usize>()
    }
}

pub struct HierarchyBuilder<'e, E> {
    extractors: &'e [E],
    labels: &'e SentinelLabels,
}

impl<'e, E: DimensionExtractor> HierarchyBuilder<'e, E> {
    pub fn new(extractors: &'e [E], labels: &'e SentinelLabels) -> Self {
        Self { extractors, labels }
    }

    pub fn build(&self, classified: &ClassifiedSet<'_>) -> HierarchyNode {
        let members: Vec<&ClassifiedRow<'_>> = classified.iter().collect();
        let root = self.partition(ROOT_LABEL.to_string(), 0, members);

        debug!(
            "Built hierarchy over {} dimension(s): {} node(s), {} row(s)",
            self.extractors.len(),
            root.node_count(),
            root.row_count()
        );

        root
    }

    fn partition(
        &self,
        label: String,
        depth: usize,
        members: Vec<&ClassifiedRow<'_>>,
    ) -> HierarchyNode {
        let mut node = HierarchyNode::new(label, depth);

        let Some(extractor) = self.extractors.get(depth) else {
            node.rows = members.iter().map(|entry| entry.index).collect();
            return node;
        };

        let mut groups: BTreeMap<String, Vec<&ClassifiedRow<'_>>> = BTreeMap::new();
        for entry in members {
            groups
                .entry(self.label_for(extractor, entry.row))
                .or_default()
                .push(entry);
        }

        for (child_label, child_members) in groups {
            let child = self.partition(child_label.clone(), depth + 1, child_members);
            node.children.insert(child_label, child);
        }

        node
    }

    fn label_for(&self, extractor: &E, row: &LedgerRow) -> String {
        match extractor.extract(row).map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => extractor
                .empty_label()
                .unwrap_or(&self.labels.empty_dimension)
                .to_string(),
        }
    }
}

/// Partitions the classified rows by the given levels, outermost first.
pub fn build_hierarchy<E: DimensionExtractor>(
    classified: &ClassifiedSet<'_>,
    extractors: &[E],
    labels: &SentinelLabels,
) -> HierarchyNode {
    HierarchyBuilder::new(extractors, labels).build(classified)
}
