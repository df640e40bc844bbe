//! Plan rewrite rules.
//!
//! Two rewrites run bottom-up over the plan tree:
//!
//! - a nested loop join whose predicate is a pure conjunction of
//!   `left.col = right.col` equalities becomes a hash join;
//! - a sequential scan whose filter is a disjunction of `col = const`
//!   equalities on one column with a single-column index becomes an index
//!   scan over those constants.
//!
//! Anything that does not match exactly falls back to the original plan.

use tracing::debug;

use crate::catalog::Catalog;
use crate::expr::{ComparisonOp, Expr, LogicOp};
use crate::plan::{HashJoinPlan, IndexScanPlan, PlanNode};
use crate::value::Value;

/// Runs every rewrite over the plan.
pub fn optimize(plan: PlanNode, catalog: &Catalog) -> PlanNode {
    let plan = optimize_nlj_as_hash_join(plan);
    optimize_seq_scan_as_index_scan(plan, catalog)
}

/// Applies `f` to each child plan, rebuilding the node.
fn rewrite_children(plan: PlanNode, f: &dyn Fn(PlanNode) -> PlanNode) -> PlanNode {
    match plan {
        PlanNode::Insert(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::Insert(p)
        }
        PlanNode::Update(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::Update(p)
        }
        PlanNode::Delete(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::Delete(p)
        }
        PlanNode::NestedLoopJoin(mut p) => {
            p.left = Box::new(f(*p.left));
            p.right = Box::new(f(*p.right));
            PlanNode::NestedLoopJoin(p)
        }
        PlanNode::NestedIndexJoin(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::NestedIndexJoin(p)
        }
        PlanNode::HashJoin(mut p) => {
            p.left = Box::new(f(*p.left));
            p.right = Box::new(f(*p.right));
            PlanNode::HashJoin(p)
        }
        PlanNode::Sort(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::Sort(p)
        }
        PlanNode::TopN(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::TopN(p)
        }
        PlanNode::Window(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::Window(p)
        }
        PlanNode::Aggregation(mut p) => {
            p.child = Box::new(f(*p.child));
            PlanNode::Aggregation(p)
        }
        leaf @ (PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_)) => leaf,
    }
}

/// Collects `left.col = right.col` equalities from a conjunction. Returns
/// false as soon as anything else appears.
fn extract_equi_conditions(
    expr: &Expr,
    left_keys: &mut Vec<Expr>,
    right_keys: &mut Vec<Expr>,
) -> bool {
    match expr {
        Expr::Logic {
            op: LogicOp::And,
            left,
            right,
        } => {
            extract_equi_conditions(left, left_keys, right_keys)
                && extract_equi_conditions(right, left_keys, right_keys)
        }
        Expr::Comparison {
            op: ComparisonOp::Equal,
            left,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (
                Expr::Column {
                    tuple_idx: 0,
                    col_idx: l,
                },
                Expr::Column {
                    tuple_idx: 1,
                    col_idx: r,
                },
            ) => {
                left_keys.push(Expr::column_of(0, *l));
                right_keys.push(Expr::column_of(1, *r));
                true
            }
            (
                Expr::Column {
                    tuple_idx: 1,
                    col_idx: r,
                },
                Expr::Column {
                    tuple_idx: 0,
                    col_idx: l,
                },
            ) => {
                left_keys.push(Expr::column_of(0, *l));
                right_keys.push(Expr::column_of(1, *r));
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Rewrites equi-join nested loop joins into hash joins.
pub fn optimize_nlj_as_hash_join(plan: PlanNode) -> PlanNode {
    let plan = rewrite_children(plan, &optimize_nlj_as_hash_join);

    if let PlanNode::NestedLoopJoin(nlj) = plan {
        if let Some(predicate) = &nlj.predicate {
            let mut left_keys = Vec::new();
            let mut right_keys = Vec::new();
            if extract_equi_conditions(predicate, &mut left_keys, &mut right_keys)
                && !left_keys.is_empty()
            {
                debug!(keys = left_keys.len(), "rewrote nlj to hash join");
                return PlanNode::HashJoin(HashJoinPlan {
                    left: nlj.left,
                    right: nlj.right,
                    left_keys,
                    right_keys,
                    join_type: nlj.join_type,
                    output_schema: nlj.output_schema,
                });
            }
        }
        return PlanNode::NestedLoopJoin(nlj);
    }
    plan
}

/// Collects `col = const` equalities over a single column from a
/// disjunction. Returns false as soon as anything else appears.
fn extract_equality_constants(
    expr: &Expr,
    col_idx: &mut Option<usize>,
    constants: &mut Vec<Value>,
) -> bool {
    match expr {
        Expr::Logic {
            op: LogicOp::Or,
            left,
            right,
        } => {
            extract_equality_constants(left, col_idx, constants)
                && extract_equality_constants(right, col_idx, constants)
        }
        Expr::Comparison {
            op: ComparisonOp::Equal,
            left,
            right,
        } => {
            let (column, constant) = match (left.as_ref(), right.as_ref()) {
                (Expr::Column { tuple_idx: 0, col_idx }, Expr::Constant(v)) => (*col_idx, v),
                (Expr::Constant(v), Expr::Column { tuple_idx: 0, col_idx }) => (*col_idx, v),
                _ => return false,
            };
            match col_idx {
                None => *col_idx = Some(column),
                Some(existing) if *existing == column => {}
                Some(_) => return false,
            }
            constants.push(constant.clone());
            true
        }
        _ => false,
    }
}

/// Rewrites equality-filtered sequential scans into index scans when a
/// single-column index covers the filtered column.
pub fn optimize_seq_scan_as_index_scan(plan: PlanNode, catalog: &Catalog) -> PlanNode {
    let plan = rewrite_children(plan, &|child| {
        optimize_seq_scan_as_index_scan(child, catalog)
    });

    if let PlanNode::SeqScan(seq_scan) = plan {
        if let Some(filter) = &seq_scan.filter {
            let mut col_idx = None;
            let mut constants = Vec::new();
            if extract_equality_constants(filter, &mut col_idx, &mut constants) {
                if let (Some(col), Some(table)) = (col_idx, catalog.get_table(seq_scan.table_oid))
                {
                    for index in catalog.get_table_indexes(&table.name) {
                        if index.get_key_attrs() == [col] {
                            debug!(
                                table = %table.name,
                                index = %index.name,
                                keys = constants.len(),
                                "rewrote seq scan to index scan"
                            );
                            return PlanNode::IndexScan(IndexScanPlan {
                                table_oid: seq_scan.table_oid,
                                index_oid: index.oid,
                                pred_keys: constants
                                    .into_iter()
                                    .map(Expr::Constant)
                                    .collect(),
                                filter: seq_scan.filter.clone(),
                                output_schema: seq_scan.output_schema,
                            });
                        }
                    }
                }
            }
        }
        return PlanNode::SeqScan(seq_scan);
    }
    plan
}
