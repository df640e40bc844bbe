//! Top-N.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::{OrderBy, TopNPlan};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::{compare_sort_keys, generate_sort_key, Executor};

/// A heap entry ordered by the plan's sort criteria.
struct HeapEntry {
    key: Vec<Value>,
    tuple: Tuple,
    order_bys: Arc<Vec<OrderBy>>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_sort_keys(&self.key, &other.key, &self.order_bys)
    }
}

/// Keeps the N first tuples under the sort criteria using a bounded
/// max-heap, then emits them in ascending order.
pub struct TopNExecutor {
    plan: TopNPlan,
    child: Box<dyn Executor>,
    order_bys: Arc<Vec<OrderBy>>,
    top_entries: Vec<Tuple>,
    cursor: usize,
}

impl TopNExecutor {
    /// Creates a top-N executor.
    pub fn new(plan: TopNPlan, child: Box<dyn Executor>) -> Self {
        let order_bys = Arc::new(plan.order_bys.clone());
        Self {
            plan,
            child,
            order_bys,
            top_entries: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) {
        self.child.init();

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        let mut batch = Vec::new();
        let mut rids = Vec::new();
        while self.child.next(&mut batch, &mut rids, BATCH_SIZE) {
            for tuple in batch.drain(..) {
                let key = generate_sort_key(&tuple, &self.order_bys, self.child.output_schema());
                heap.push(HeapEntry {
                    key,
                    tuple,
                    order_bys: Arc::clone(&self.order_bys),
                });
                // The heap's greatest element is the first to fall outside
                // the top N.
                if heap.len() > self.plan.n {
                    heap.pop();
                }
            }
        }

        self.top_entries = heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.tuple)
            .collect();
        self.cursor = 0;
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        while self.cursor < self.top_entries.len() && tuples.len() < batch_size {
            let tuple = self.top_entries[self.cursor].clone();
            rids.push(tuple.rid());
            tuples.push(tuple);
            self.cursor += 1;
        }

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
