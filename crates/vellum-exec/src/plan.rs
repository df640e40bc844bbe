//! Physical plan nodes.
//!
//! The surrounding planner is an external collaborator; these nodes are
//! the contract it hands to the executor factory and the two rewrite
//! rules transform.

use std::collections::BTreeMap;

use vellum_common::types::Oid;

use crate::expr::Expr;
use crate::schema::Schema;

/// Join flavors. Only `Inner` and `Left` are executable; the others exist
/// so planners can be told "no" explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Inner join.
    Inner,
    /// Left outer join.
    Left,
    /// Right outer join (not executable).
    Right,
    /// Full outer join (not executable).
    Full,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// One sort criterion.
pub type OrderBy = (OrderByType, Expr);

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    /// `COUNT(*)`.
    CountStar,
    /// `COUNT(expr)`.
    Count,
    /// `SUM(expr)`.
    Sum,
    /// `MIN(expr)`.
    Min,
    /// `MAX(expr)`.
    Max,
}

/// Window function flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunctionType {
    /// `RANK()`.
    Rank,
    /// `COUNT(*)`.
    CountStar,
    /// `COUNT(expr)`.
    Count,
    /// `SUM(expr)`.
    Sum,
    /// `MIN(expr)`.
    Min,
    /// `MAX(expr)`.
    Max,
}

/// One window function with its partitioning and ordering.
#[derive(Debug, Clone)]
pub struct WindowFunction {
    /// The aggregated expression (ignored for rank and count-star).
    pub function: Expr,
    /// Function flavor.
    pub kind: WindowFunctionType,
    /// `PARTITION BY` expressions.
    pub partition_by: Vec<Expr>,
    /// `ORDER BY` criteria.
    pub order_by: Vec<OrderBy>,
}

/// A physical plan node.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Full-table scan with an optional residual filter.
    SeqScan(SeqScanPlan),
    /// Index scan: point lookups or a full index walk.
    IndexScan(IndexScanPlan),
    /// Literal row source.
    Values(ValuesPlan),
    /// Insert into a table.
    Insert(InsertPlan),
    /// Update rows of a table.
    Update(UpdatePlan),
    /// Delete rows of a table.
    Delete(DeletePlan),
    /// Tuple-at-a-time join.
    NestedLoopJoin(NestedLoopJoinPlan),
    /// Index-probing join.
    NestedIndexJoin(NestedIndexJoinPlan),
    /// Partitioned hash join.
    HashJoin(HashJoinPlan),
    /// External merge sort.
    Sort(SortPlan),
    /// Bounded top-N.
    TopN(TopNPlan),
    /// Window functions.
    Window(WindowPlan),
    /// Hash aggregation.
    Aggregation(AggregationPlan),
}

impl PlanNode {
    /// The node's output schema.
    pub fn output_schema(&self) -> &Schema {
        match self {
            PlanNode::SeqScan(p) => &p.output_schema,
            PlanNode::IndexScan(p) => &p.output_schema,
            PlanNode::Values(p) => &p.output_schema,
            PlanNode::Insert(p) => &p.output_schema,
            PlanNode::Update(p) => &p.output_schema,
            PlanNode::Delete(p) => &p.output_schema,
            PlanNode::NestedLoopJoin(p) => &p.output_schema,
            PlanNode::NestedIndexJoin(p) => &p.output_schema,
            PlanNode::HashJoin(p) => &p.output_schema,
            PlanNode::Sort(p) => &p.output_schema,
            PlanNode::TopN(p) => &p.output_schema,
            PlanNode::Window(p) => &p.output_schema,
            PlanNode::Aggregation(p) => &p.output_schema,
        }
    }
}

/// Sequential scan.
#[derive(Debug, Clone)]
pub struct SeqScanPlan {
    /// Scanned table.
    pub table_oid: Oid,
    /// Residual filter predicate.
    pub filter: Option<Expr>,
    /// Output schema (the table schema).
    pub output_schema: Schema,
}

/// Index scan.
#[derive(Debug, Clone)]
pub struct IndexScanPlan {
    /// Base table.
    pub table_oid: Oid,
    /// Probed index.
    pub index_oid: Oid,
    /// Point-lookup key expressions (constants). Empty means a full walk.
    pub pred_keys: Vec<Expr>,
    /// Residual filter predicate.
    pub filter: Option<Expr>,
    /// Output schema (the table schema).
    pub output_schema: Schema,
}

/// Literal rows.
#[derive(Debug, Clone)]
pub struct ValuesPlan {
    /// One expression list per produced row.
    pub rows: Vec<Vec<Expr>>,
    /// Output schema.
    pub output_schema: Schema,
}

/// Insert.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    /// Target table.
    pub table_oid: Oid,
    /// Row producer.
    pub child: Box<PlanNode>,
    /// Single-integer result schema.
    pub output_schema: Schema,
}

/// Update.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    /// Target table.
    pub table_oid: Oid,
    /// One expression per target column, evaluated over the old tuple.
    pub target_exprs: Vec<Expr>,
    /// Row producer identifying the tuples to update.
    pub child: Box<PlanNode>,
    /// Single-integer result schema.
    pub output_schema: Schema,
}

/// Delete.
#[derive(Debug, Clone)]
pub struct DeletePlan {
    /// Target table.
    pub table_oid: Oid,
    /// Row producer identifying the tuples to delete.
    pub child: Box<PlanNode>,
    /// Single-integer result schema.
    pub output_schema: Schema,
}

/// Nested loop join.
#[derive(Debug, Clone)]
pub struct NestedLoopJoinPlan {
    /// Outer input.
    pub left: Box<PlanNode>,
    /// Inner input, re-initialized per outer tuple.
    pub right: Box<PlanNode>,
    /// Join predicate.
    pub predicate: Option<Expr>,
    /// Inner or left.
    pub join_type: JoinType,
    /// Concatenated output schema.
    pub output_schema: Schema,
}

/// Nested index join.
#[derive(Debug, Clone)]
pub struct NestedIndexJoinPlan {
    /// Outer input.
    pub child: Box<PlanNode>,
    /// Inner table.
    pub inner_table_oid: Oid,
    /// Index probed per outer tuple.
    pub index_oid: Oid,
    /// Builds the probe key from an outer tuple.
    pub key_predicate: Expr,
    /// Inner table schema.
    pub inner_schema: Schema,
    /// Inner or left.
    pub join_type: JoinType,
    /// Concatenated output schema.
    pub output_schema: Schema,
}

/// Hash join.
#[derive(Debug, Clone)]
pub struct HashJoinPlan {
    /// Probe input.
    pub left: Box<PlanNode>,
    /// Build input.
    pub right: Box<PlanNode>,
    /// Key expressions over the left input.
    pub left_keys: Vec<Expr>,
    /// Key expressions over the right input.
    pub right_keys: Vec<Expr>,
    /// Inner or left.
    pub join_type: JoinType,
    /// Concatenated output schema.
    pub output_schema: Schema,
}

/// External merge sort.
#[derive(Debug, Clone)]
pub struct SortPlan {
    /// Input.
    pub child: Box<PlanNode>,
    /// Sort criteria, most significant first.
    pub order_bys: Vec<OrderBy>,
    /// Output schema (the child schema).
    pub output_schema: Schema,
}

/// Top-N.
#[derive(Debug, Clone)]
pub struct TopNPlan {
    /// Input.
    pub child: Box<PlanNode>,
    /// Sort criteria.
    pub order_bys: Vec<OrderBy>,
    /// Number of rows to keep.
    pub n: usize,
    /// Output schema (the child schema).
    pub output_schema: Schema,
}

/// Window functions.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    /// Input.
    pub child: Box<PlanNode>,
    /// Output column expressions; positions present in `window_functions`
    /// are placeholders filled by the corresponding function.
    pub columns: Vec<Expr>,
    /// Window functions keyed by output column position.
    pub window_functions: BTreeMap<usize, WindowFunction>,
    /// Output schema.
    pub output_schema: Schema,
}

/// Hash aggregation.
#[derive(Debug, Clone)]
pub struct AggregationPlan {
    /// Input.
    pub child: Box<PlanNode>,
    /// Grouping expressions.
    pub group_bys: Vec<Expr>,
    /// Aggregated expressions, parallel to `agg_types`.
    pub aggregates: Vec<Expr>,
    /// Aggregate function per aggregated expression.
    pub agg_types: Vec<AggregationType>,
    /// Group-bys followed by aggregates.
    pub output_schema: Schema,
}
