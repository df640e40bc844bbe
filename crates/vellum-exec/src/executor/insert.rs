//! Insert.

use std::sync::Arc;

use tracing::debug;
use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::InsertPlan;
use crate::schema::Schema;
use crate::tuple::{Tuple, TupleMeta};
use crate::value::Value;

use super::{Executor, ExecutorContext};

/// Inserts child rows into the table, maintaining every secondary index,
/// then reports the row count once.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    plan: InsertPlan,
    child: Box<dyn Executor>,
    finished: bool,
}

impl InsertExecutor {
    /// Creates an insert executor.
    pub fn new(ctx: Arc<ExecutorContext>, plan: InsertPlan, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            finished: false,
        }
    }
}

impl Executor for InsertExecutor {
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
            .expect("insert target exists");
        let indexes = self.ctx.catalog.get_table_indexes(&table.name);

        let mut count: i32 = 0;
        let mut child_tuples = Vec::new();
        let mut child_rids = Vec::new();
        while self.child.next(&mut child_tuples, &mut child_rids, BATCH_SIZE) {
            for tuple in &child_tuples {
                let Some(rid) = table.table.insert_tuple(TupleMeta::default(), tuple) else {
                    continue;
                };
                for index in &indexes {
                    let key = tuple.key_from_tuple(
                        &table.schema,
                        &index.key_schema,
                        index.get_key_attrs(),
                    );
                    index.insert_entry(&key, rid, self.ctx.txn);
                }
                count += 1;
            }
        }
        debug!(table = %table.name, count, "insert finished");

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
