//! Nested index join.

use std::sync::Arc;

use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::{JoinType, NestedIndexJoinPlan};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::{Executor, ExecutorContext};

/// For each outer tuple, builds the key from the key predicate, probes the
/// inner index, and fetches matches from the inner heap.
pub struct NestedIndexJoinExecutor {
    ctx: Arc<ExecutorContext>,
    plan: NestedIndexJoinPlan,
    child: Box<dyn Executor>,

    left_tuples: Vec<Tuple>,
    left_idx: usize,
    probe_rids: Vec<Rid>,
    probe_idx: usize,
    probed: bool,
    emitted_any: bool,
}

impl NestedIndexJoinExecutor {
    /// Creates a nested index join.
    ///
    /// # Panics
    ///
    /// Panics for join types other than inner and left.
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: NestedIndexJoinPlan,
        child: Box<dyn Executor>,
    ) -> Self {
        assert!(
            matches!(plan.join_type, JoinType::Inner | JoinType::Left),
            "join type {:?} not supported",
            plan.join_type
        );
        Self {
            ctx,
            plan,
            child,
            left_tuples: Vec::new(),
            left_idx: 0,
            probe_rids: Vec::new(),
            probe_idx: 0,
            probed: false,
            emitted_any: false,
        }
    }

    fn join_row(&self, left: &Tuple, inner: Option<&Tuple>) -> Tuple {
        let mut values = left.values(self.child.output_schema());
        match inner {
            Some(inner) => values.extend(inner.values(&self.plan.inner_schema)),
            None => values.extend(
                std::iter::repeat(Value::Null).take(self.plan.inner_schema.column_count()),
            ),
        }
        Tuple::from_values(&values, &self.plan.output_schema)
    }
}

impl Executor for NestedIndexJoinExecutor {
    fn init(&mut self) {
        self.child.init();
        self.left_tuples.clear();
        self.left_idx = 0;
        self.probe_rids.clear();
        self.probe_idx = 0;
        self.probed = false;
        self.emitted_any = false;

        let mut rids = Vec::new();
        self.child.next(&mut self.left_tuples, &mut rids, BATCH_SIZE);
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        let inner_table = self
            .ctx
            .catalog
            .get_table(self.plan.inner_table_oid)
            .expect("inner table exists");
        let index = self
            .ctx
            .catalog
            .get_index(self.plan.index_oid)
            .expect("probe index exists");

        while self.left_idx < self.left_tuples.len() {
            let left_tuple = self.left_tuples[self.left_idx].clone();

            if !self.probed {
                let key_value = self
                    .plan
                    .key_predicate
                    .evaluate(&left_tuple, self.child.output_schema());
                let key = Tuple::from_values(&[key_value], &index.key_schema);
                self.probe_rids.clear();
                index.scan_key(&key, &mut self.probe_rids, self.ctx.txn);
                self.probe_idx = 0;
                self.probed = true;
                self.emitted_any = false;
            }

            while self.probe_idx < self.probe_rids.len() {
                let rid = self.probe_rids[self.probe_idx];
                self.probe_idx += 1;

                let Some((meta, inner_tuple)) = inner_table.table.get_tuple(rid) else {
                    continue;
                };
                if meta.is_deleted {
                    continue;
                }
                self.emitted_any = true;
                tuples.push(self.join_row(&left_tuple, Some(&inner_tuple)));
                rids.push(Rid::INVALID);
                if tuples.len() >= batch_size {
                    return true;
                }
            }

            if self.plan.join_type == JoinType::Left && !self.emitted_any {
                tuples.push(self.join_row(&left_tuple, None));
                rids.push(Rid::INVALID);
            }

            // Advance the outer side.
            self.left_idx += 1;
            self.probed = false;
            self.probe_rids.clear();
            self.probe_idx = 0;

            if self.left_idx >= self.left_tuples.len() {
                self.left_idx = 0;
                let mut left_rids = Vec::new();
                if !self.child.next(&mut self.left_tuples, &mut left_rids, BATCH_SIZE) {
                    self.left_tuples.clear();
                    return !tuples.is_empty();
                }
            }

            if tuples.len() >= batch_size {
                return true;
            }
        }

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
