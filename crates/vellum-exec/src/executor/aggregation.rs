//! Hash aggregation.

use std::collections::HashMap;

use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::{AggregationPlan, AggregationType};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::Executor;

/// Hash aggregation keyed by the group-by values.
///
/// On an empty input with no group-bys the identity tuple is produced:
/// zero for counts, NULL for the other aggregates.
pub struct AggregationExecutor {
    plan: AggregationPlan,
    child: Box<dyn Executor>,
    results: Vec<(Vec<Value>, Vec<Value>)>,
    cursor: usize,
}

impl AggregationExecutor {
    /// Creates an aggregation executor.
    pub fn new(plan: AggregationPlan, child: Box<dyn Executor>) -> Self {
        Self {
            plan,
            child,
            results: Vec::new(),
            cursor: 0,
        }
    }

    fn initial_accumulators(&self) -> Vec<Value> {
        self.plan
            .agg_types
            .iter()
            .map(|t| match t {
                AggregationType::CountStar => Value::Integer(0),
                _ => Value::Null,
            })
            .collect()
    }

    fn combine(accumulators: &mut [Value], agg_types: &[AggregationType], inputs: &[Value]) {
        for ((acc, agg_type), input) in
            accumulators.iter_mut().zip(agg_types.iter()).zip(inputs.iter())
        {
            match agg_type {
                AggregationType::CountStar => {
                    *acc = acc.add(&Value::Integer(1));
                }
                AggregationType::Count => {
                    if !input.is_null() {
                        *acc = match acc {
                            Value::Null => Value::Integer(1),
                            ref other => other.add(&Value::Integer(1)),
                        };
                    }
                }
                AggregationType::Sum => {
                    if !input.is_null() {
                        *acc = match acc {
                            Value::Null => input.clone(),
                            ref other => other.add(input),
                        };
                    }
                }
                AggregationType::Min => {
                    if !input.is_null()
                        && (acc.is_null() || input.compare(acc) == std::cmp::Ordering::Less)
                    {
                        *acc = input.clone();
                    }
                }
                AggregationType::Max => {
                    if !input.is_null()
                        && (acc.is_null() || input.compare(acc) == std::cmp::Ordering::Greater)
                    {
                        *acc = input.clone();
                    }
                }
            }
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) {
        self.child.init();

        let schema = self.child.output_schema().clone();
        let mut table: HashMap<Vec<Value>, Vec<Value>> = HashMap::new();
        let mut saw_input = false;

        let mut batch = Vec::new();
        let mut rids = Vec::new();
        while self.child.next(&mut batch, &mut rids, BATCH_SIZE) {
            saw_input = true;
            for tuple in batch.drain(..) {
                let group: Vec<Value> = self
                    .plan
                    .group_bys
                    .iter()
                    .map(|e| e.evaluate(&tuple, &schema))
                    .collect();
                let inputs: Vec<Value> = self
                    .plan
                    .aggregates
                    .iter()
                    .map(|e| e.evaluate(&tuple, &schema))
                    .collect();

                let accumulators = table
                    .entry(group)
                    .or_insert_with(|| self.initial_accumulators());
                Self::combine(accumulators, &self.plan.agg_types, &inputs);
            }
        }

        if !saw_input && self.plan.group_bys.is_empty() {
            table.insert(Vec::new(), self.initial_accumulators());
        }

        self.results = table.into_iter().collect();
        self.cursor = 0;
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        while self.cursor < self.results.len() && tuples.len() < batch_size {
            let (group, accumulators) = &self.results[self.cursor];
            let mut values = group.clone();
            values.extend(accumulators.iter().cloned());
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
