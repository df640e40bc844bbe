//! Delete.

use std::sync::Arc;

use tracing::debug;
use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::DeletePlan;
use crate::schema::Schema;
use crate::tuple::{Tuple, TupleMeta};
use crate::value::Value;

use super::{Executor, ExecutorContext};

/// Marks child rows deleted, removes their index entries, and reports the
/// count once.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    plan: DeletePlan,
    child: Box<dyn Executor>,
    finished: bool,
}

impl DeleteExecutor {
    /// Creates a delete executor.
    pub fn new(ctx: Arc<ExecutorContext>, plan: DeletePlan, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            finished: false,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) {
        self.child.init();
        self.finished = false;
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, _batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();
        if self.finished {
            return false;
        }

        let table = self
            .ctx
            .catalog
            .get_table(self.plan.table_oid)
            .expect("delete target exists");
        let indexes = self.ctx.catalog.get_table_indexes(&table.name);

        let mut count: i32 = 0;
        let mut child_tuples = Vec::new();
        let mut child_rids = Vec::new();
        while self.child.next(&mut child_tuples, &mut child_rids, BATCH_SIZE) {
            for (tuple, rid) in child_tuples.iter().zip(child_rids.iter()) {
                table.table.update_tuple_meta(
                    TupleMeta {
                        ts: 0,
                        is_deleted: true,
                    },
                    *rid,
                );
                for index in &indexes {
                    let key = tuple.key_from_tuple(
                        &table.schema,
                        &index.key_schema,
                        index.get_key_attrs(),
                    );
                    index.delete_entry(&key, *rid, self.ctx.txn);
                }
                count += 1;
            }
        }
        debug!(table = %table.name, count, "delete finished");

        tuples.push(Tuple::from_values(
            &[Value::Integer(count)],
            &self.plan.output_schema,
        ));
        rids.push(Rid::INVALID);
        self.finished = true;
        true
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
