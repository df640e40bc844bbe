//! Batched pull operators.
//!
//! Every operator exposes `init` and a batched `next` that fills the output
//! vectors with up to `batch_size` tuples, returning true while at least
//! one row was produced. Insert, update, and delete are exceptions: each
//! emits exactly one single-integer batch reporting the affected row count.

use std::cmp::Ordering;
use std::sync::Arc;

use vellum_common::types::{Rid, TxnId};
use vellum_storage::buffer::BufferPoolManager;

use crate::catalog::Catalog;
use crate::plan::{OrderBy, OrderByType, PlanNode};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

mod aggregation;
mod delete;
mod hash_join;
mod index_scan;
mod insert;
mod nested_index_join;
mod nested_loop_join;
mod seq_scan;
mod sort;
mod topn;
mod update;
mod values;
mod window;

pub use aggregation::AggregationExecutor;
pub use delete::DeleteExecutor;
pub use hash_join::HashJoinExecutor;
pub use index_scan::IndexScanExecutor;
pub use insert::InsertExecutor;
pub use nested_index_join::NestedIndexJoinExecutor;
pub use nested_loop_join::NestedLoopJoinExecutor;
pub use seq_scan::SeqScanExecutor;
pub use sort::ExternalMergeSortExecutor;
pub use topn::TopNExecutor;
pub use update::UpdateExecutor;
pub use values::ValuesExecutor;
pub use window::WindowFunctionExecutor;

/// Everything an operator needs from its surroundings.
pub struct ExecutorContext {
    /// The catalog.
    pub catalog: Arc<Catalog>,
    /// The buffer pool, for operators that spill.
    pub bpm: Arc<BufferPoolManager>,
    /// The running transaction, passed through to heap and index calls.
    pub txn: TxnId,
}

impl ExecutorContext {
    /// Creates a context.
    pub fn new(catalog: Arc<Catalog>, bpm: Arc<BufferPoolManager>, txn: TxnId) -> Arc<Self> {
        Arc::new(Self { catalog, bpm, txn })
    }
}

/// A batched pull operator.
pub trait Executor {
    /// Prepares (or re-prepares) the operator for a fresh pull sequence.
    fn init(&mut self);

    /// Produces the next batch. Clears the output vectors, fills them with
    /// up to `batch_size` rows, and returns true if any row was produced.
    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool;

    /// The operator's output schema.
    fn output_schema(&self) -> &Schema;
}

/// Builds the executor tree for a plan.
pub fn create_executor(ctx: &Arc<ExecutorContext>, plan: &PlanNode) -> Box<dyn Executor> {
    match plan {
        PlanNode::SeqScan(p) => Box::new(SeqScanExecutor::new(Arc::clone(ctx), p.clone())),
        PlanNode::IndexScan(p) => Box::new(IndexScanExecutor::new(Arc::clone(ctx), p.clone())),
        PlanNode::Values(p) => Box::new(ValuesExecutor::new(p.clone())),
        PlanNode::Insert(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(InsertExecutor::new(Arc::clone(ctx), p.clone(), child))
        }
        PlanNode::Update(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(UpdateExecutor::new(Arc::clone(ctx), p.clone(), child))
        }
        PlanNode::Delete(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(DeleteExecutor::new(Arc::clone(ctx), p.clone(), child))
        }
        PlanNode::NestedLoopJoin(p) => {
            let left = create_executor(ctx, &p.left);
            let right = create_executor(ctx, &p.right);
            Box::new(NestedLoopJoinExecutor::new(p.clone(), left, right))
        }
        PlanNode::NestedIndexJoin(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(NestedIndexJoinExecutor::new(Arc::clone(ctx), p.clone(), child))
        }
        PlanNode::HashJoin(p) => {
            let left = create_executor(ctx, &p.left);
            let right = create_executor(ctx, &p.right);
            Box::new(HashJoinExecutor::new(Arc::clone(ctx), p.clone(), left, right))
        }
        PlanNode::Sort(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(ExternalMergeSortExecutor::new(Arc::clone(ctx), p.clone(), child))
        }
        PlanNode::TopN(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(TopNExecutor::new(p.clone(), child))
        }
        PlanNode::Window(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(WindowFunctionExecutor::new(p.clone(), child))
        }
        PlanNode::Aggregation(p) => {
            let child = create_executor(ctx, &p.child);
            Box::new(AggregationExecutor::new(p.clone(), child))
        }
    }
}

/// Pulls every batch of an executor and collects the tuples.
pub fn collect(executor: &mut dyn Executor, batch_size: usize) -> Vec<Tuple> {
    let mut out = Vec::new();
    let mut tuples = Vec::new();
    let mut rids = Vec::new();
    while executor.next(&mut tuples, &mut rids, batch_size) {
        out.append(&mut tuples);
        rids.clear();
    }
    out
}

/// Evaluates the sort criteria against a tuple.
pub(crate) fn generate_sort_key(tuple: &Tuple, order_bys: &[OrderBy], schema: &Schema) -> Vec<Value> {
    order_bys
        .iter()
        .map(|(_, expr)| expr.evaluate(tuple, schema))
        .collect()
}

/// Compares two sort keys under the criteria's directions.
pub(crate) fn compare_sort_keys(a: &[Value], b: &[Value], order_bys: &[OrderBy]) -> Ordering {
    for (i, (direction, _)) in order_bys.iter().enumerate() {
        let ord = a[i].compare(&b[i]);
        let ord = match direction {
            OrderByType::Asc => ord,
            OrderByType::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
