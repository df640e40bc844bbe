//! Update.
//!
//! Update is delete-then-insert: the old tuple is marked deleted, its index
//! entries removed, the new tuple inserted, and fresh index entries added.
//! This keeps every secondary index consistent without in-place rewrites.

use std::sync::Arc;

use tracing::debug;
use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::UpdatePlan;
use crate::schema::Schema;
use crate::tuple::{Tuple, TupleMeta};
use crate::value::Value;

use super::{Executor, ExecutorContext};

/// Applies the target expressions to each child row and reports the count
/// once.
pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    plan: UpdatePlan,
    child: Box<dyn Executor>,
    finished: bool,
}

impl UpdateExecutor {
    /// Creates an update executor.
    pub fn new(ctx: Arc<ExecutorContext>, plan: UpdatePlan, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            finished: false,
        }
    }
}

impl Executor for UpdateExecutor {
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
            .expect("update target exists");
        let indexes = self.ctx.catalog.get_table_indexes(&table.name);
        let child_schema = self.child.output_schema().clone();

        let mut count: i32 = 0;
        let mut child_tuples = Vec::new();
        let mut child_rids = Vec::new();
        while self.child.next(&mut child_tuples, &mut child_rids, BATCH_SIZE) {
            for (old_tuple, old_rid) in child_tuples.iter().zip(child_rids.iter()) {
                let values: Vec<Value> = self
                    .plan
                    .target_exprs
                    .iter()
                    .map(|expr| expr.evaluate(old_tuple, &child_schema))
                    .collect();
                let new_tuple = Tuple::from_values(&values, &table.schema);

                table.table.update_tuple_meta(
                    TupleMeta {
                        ts: 0,
                        is_deleted: true,
                    },
                    *old_rid,
                );
                for index in &indexes {
                    let old_key = old_tuple.key_from_tuple(
                        &table.schema,
                        &index.key_schema,
                        index.get_key_attrs(),
                    );
                    index.delete_entry(&old_key, *old_rid, self.ctx.txn);
                }

                let Some(new_rid) = table.table.insert_tuple(TupleMeta::default(), &new_tuple)
                else {
                    continue;
                };
                for index in &indexes {
                    let new_key = new_tuple.key_from_tuple(
                        &table.schema,
                        &index.key_schema,
                        index.get_key_attrs(),
                    );
                    index.insert_entry(&new_key, new_rid, self.ctx.txn);
                }
                count += 1;
            }
        }
        debug!(table = %table.name, count, "update finished");

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
