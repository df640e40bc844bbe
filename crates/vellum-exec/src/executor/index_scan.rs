//! Index scan.

use std::sync::Arc;

use vellum_common::types::Rid;

use crate::plan::IndexScanPlan;
use crate::schema::Schema;
use crate::tuple::Tuple;

use super::{Executor, ExecutorContext};

/// Scans via a secondary index.
///
/// With `pred_keys` present this is a set of point lookups resolved through
/// `scan_key`; otherwise the whole index is walked in key order. Either way
/// rids resolve to tuples through the table heap, deleted tuples are
/// skipped, and the optional residual filter applies last.
pub struct IndexScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: IndexScanPlan,
    /// Rids gathered at init; consumed batch by batch.
    rids: Vec<Rid>,
    cursor: usize,
}

impl IndexScanExecutor {
    /// Creates an index scan.
    pub fn new(ctx: Arc<ExecutorContext>, plan: IndexScanPlan) -> Self {
        Self {
            ctx,
            plan,
            rids: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) {
        let index = self
            .ctx
            .catalog
            .get_index(self.plan.index_oid)
            .expect("scanned index exists");

        self.rids.clear();
        self.cursor = 0;

        if !self.plan.pred_keys.is_empty() {
            // Point lookups: each key expression is a constant.
            let dummy = Tuple::default();
            let empty = Schema::default();
            for expr in &self.plan.pred_keys {
                let value = expr.evaluate(&dummy, &empty);
                let key = Tuple::from_values(&[value], &index.key_schema);
                index.scan_key(&key, &mut self.rids, self.ctx.txn);
            }
        } else {
            // Full walk in key order.
            for (_, rid) in index.iter() {
                self.rids.push(rid);
            }
        }
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        let table = self
            .ctx
            .catalog
            .get_table(self.plan.table_oid)
            .expect("scanned table exists");

        while tuples.len() < batch_size && self.cursor < self.rids.len() {
            let rid = self.rids[self.cursor];
            self.cursor += 1;

            let Some((meta, tuple)) = table.table.get_tuple(rid) else {
                continue;
            };
            if meta.is_deleted {
                continue;
            }
            if let Some(filter) = &self.plan.filter {
                if !filter.evaluate(&tuple, &self.plan.output_schema).to_bool() {
                    continue;
                }
            }
            tuples.push(tuple);
            rids.push(rid);
        }

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
