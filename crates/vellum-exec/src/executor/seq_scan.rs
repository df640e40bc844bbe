//! Sequential scan.

use std::sync::Arc;

use vellum_common::types::{PageId, Rid};

use crate::plan::SeqScanPlan;
use crate::schema::Schema;
use crate::tuple::Tuple;

use super::{Executor, ExecutorContext};

/// Walks the table heap, skipping deleted tuples and applying the optional
/// filter predicate.
///
/// The heap tail is captured at `init`, so tuples appended behind the scan
/// (by an update feeding from it, say) are never revisited.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: SeqScanPlan,
    /// Resume position: (page, slot) the next batch starts from.
    cursor: (PageId, u32),
    /// Heap tail captured at init.
    stop: (PageId, u32),
}

impl SeqScanExecutor {
    /// Creates a sequential scan.
    pub fn new(ctx: Arc<ExecutorContext>, plan: SeqScanPlan) -> Self {
        Self {
            ctx,
            plan,
            cursor: (PageId::INVALID, 0),
            stop: (PageId::INVALID, 0),
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) {
        let table = self
            .ctx
            .catalog
            .get_table(self.plan.table_oid)
            .expect("scanned table exists");
        self.cursor = (table.table.first_page_id(), 0);
        self.stop = table.table.stop_position();
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        let table = self
            .ctx
            .catalog
            .get_table(self.plan.table_oid)
            .expect("scanned table exists");

        let mut iter = table.table.iter_range(self.cursor.0, self.cursor.1, self.stop);
        while tuples.len() < batch_size {
            let Some((rid, meta, tuple)) = iter.next() else {
                break;
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
        self.cursor = iter.position();

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
