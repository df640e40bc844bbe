//! Literal row source.

use vellum_common::types::Rid;

use crate::plan::ValuesPlan;
use crate::schema::Schema;
use crate::tuple::Tuple;

use super::Executor;

/// Produces the plan's literal rows once per `init`.
pub struct ValuesExecutor {
    plan: ValuesPlan,
    cursor: usize,
}

impl ValuesExecutor {
    /// Creates a values executor.
    pub fn new(plan: ValuesPlan) -> Self {
        Self { plan, cursor: 0 }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) {
        self.cursor = 0;
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        let dummy = Tuple::default();
        let empty = Schema::default();
        while self.cursor < self.plan.rows.len() && tuples.len() < batch_size {
            let values: Vec<_> = self.plan.rows[self.cursor]
                .iter()
                .map(|expr| expr.evaluate(&dummy, &empty))
                .collect();
            tuples.push(Tuple::from_values(&values, &self.plan.output_schema));
            rids.push(Rid::INVALID);
            self.cursor += 1;
        }

        !tuples.is_empty()
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
