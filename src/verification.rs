use crate::aggregator::{AggregatedNode, AggregatedTree};
use crate::classifier::StatusAxis;
use crate::error::{LedgerError, Result};
use crate::utils::sum_amounts;
use rust_decimal::Decimal;

/// Walks an aggregated tree and checks that every node equals the sum of its
/// parts and that siblings are ordered by absolute total.
pub struct ConsistencyChecker<'t> {
    tree: &'t AggregatedTree,
}

impl<'t> ConsistencyChecker<'t> {
    pub fn new(tree: &'t AggregatedTree) -> Self {
        Self { tree }
    }

    pub fn verify(&self) -> Result<()> {
        self.verify_node(&self.tree.root)
    }

    fn verify_node(&self, node: &AggregatedNode) -> Result<()> {
        for axis in StatusAxis::ALL {
            for bucket in self.tree.buckets.for_axis(axis) {
                if node.bucket_total(axis, bucket).is_none() {
                    return Err(violation(
                        node,
                        format!("{} bucket '{}' presence", axis.label(), bucket),
                        Decimal::ONE,
                        Decimal::ZERO,
                    ));
                }
            }

            let bucket_sum: Decimal = sum_amounts(node.by_bucket(axis).values().copied());
            check(
                node,
                format!("{} buckets", axis.label()),
                node.status_total(axis),
                bucket_sum,
            )?;
        }

        if !node.has_children() {
            return check(
                node,
                "leaf row count".to_string(),
                Decimal::from(node.rows.len()),
                Decimal::from(node.row_count),
            );
        }

        check(
            node,
            "total".to_string(),
            node.total,
            sum_amounts(node.children.iter().map(|c| c.total)),
        )?;
        check(
            node,
            "row count".to_string(),
            Decimal::from(node.row_count),
            Decimal::from(node.children.iter().map(|c| c.row_count).sum::<usize>()),
        )?;

        for axis in StatusAxis::ALL {
            check(
                node,
                format!("{} total", axis.label()),
                node.status_total(axis),
                sum_amounts(node.children.iter().map(|c| c.status_total(axis))),
            )?;

            for (bucket, amount) in node.by_bucket(axis) {
                let from_children = sum_amounts(
                    node.children
                        .iter()
                        .map(|c| c.bucket_total(axis, bucket).unwrap_or(Decimal::ZERO)),
                );
                check(
                    node,
                    format!("{} bucket '{}'", axis.label(), bucket),
                    *amount,
                    from_children,
                )?;
            }
        }

        for pair in node.children.windows(2) {
            if pair[0].total.abs() < pair[1].total.abs() {
                return Err(violation(
                    &pair[1],
                    "sibling order by absolute total".to_string(),
                    pair[0].total.abs(),
                    pair[1].total.abs(),
                ));
            }
        }

        for child in &node.children {
            self.verify_node(child)?;
        }

        Ok(())
    }
}

fn check(node: &AggregatedNode, measure: String, expected: Decimal, actual: Decimal) -> Result<()> {
    if expected != actual {
        return Err(violation(node, measure, expected, actual));
    }
    Ok(())
}

fn violation(
    node: &AggregatedNode,
    measure: String,
    expected: Decimal,
    actual: Decimal,
) -> LedgerError {
    let path = if node.path.is_empty() {
        node.label.clone()
    } else {
        node.key()
    };
    LedgerError::ConsistencyViolation {
        path,
        measure,
        expected,
        actual,
    }
}

pub fn verify_consistency(tree: &AggregatedTree) -> Result<()> {
    ConsistencyChecker::new(tree).verify()
}
