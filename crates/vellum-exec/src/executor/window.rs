//! Window functions.
//!
//! The input is materialized, sorted by `(partition_by, order_by)` per
//! window function, and each function is computed over its partitions:
//! whole-partition aggregates when no `ORDER BY` is present, range-peer
//! running aggregates (and rank) when one is.

use std::cmp::Ordering;
use std::collections::HashMap;

use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::{OrderByType, WindowFunction, WindowFunctionType, WindowPlan};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::Executor;

/// Computes every window function of the plan over the materialized input.
pub struct WindowFunctionExecutor {
    plan: WindowPlan,
    child: Box<dyn Executor>,
    computed: Vec<Tuple>,
    cursor: usize,
}

impl WindowFunctionExecutor {
    /// Creates a window function executor.
    pub fn new(plan: WindowPlan, child: Box<dyn Executor>) -> Self {
        Self {
            plan,
            child,
            computed: Vec::new(),
            cursor: 0,
        }
    }

    fn sort_indices(
        indices: &mut [usize],
        tuples: &[Tuple],
        schema: &Schema,
        wf: &WindowFunction,
    ) {
        indices.sort_by(|&a, &b| {
            let ta = &tuples[a];
            let tb = &tuples[b];

            for expr in &wf.partition_by {
                let va = expr.evaluate(ta, schema);
                let vb = expr.evaluate(tb, schema);
                let ord = va.compare(&vb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            for (direction, expr) in &wf.order_by {
                let va = expr.evaluate(ta, schema);
                let vb = expr.evaluate(tb, schema);
                let ord = match direction {
                    OrderByType::Asc => va.compare(&vb),
                    OrderByType::Desc => va.compare(&vb).reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    fn same_partition(
        tuples: &[Tuple],
        schema: &Schema,
        wf: &WindowFunction,
        a: usize,
        b: usize,
    ) -> bool {
        wf.partition_by
            .iter()
            .all(|expr| expr.evaluate(&tuples[a], schema) == expr.evaluate(&tuples[b], schema))
    }

    fn same_peer_group(
        tuples: &[Tuple],
        schema: &Schema,
        wf: &WindowFunction,
        a: usize,
        b: usize,
    ) -> bool {
        wf.order_by
            .iter()
            .all(|(_, expr)| expr.evaluate(&tuples[a], schema) == expr.evaluate(&tuples[b], schema))
    }

    fn accumulate(kind: WindowFunctionType, acc: &mut Value, input: &Value) {
        match kind {
            WindowFunctionType::CountStar => {
                *acc = acc.add(&Value::Integer(1));
            }
            WindowFunctionType::Count => {
                if !input.is_null() {
                    *acc = match acc {
                        Value::Null => Value::Integer(1),
                        ref other => other.add(&Value::Integer(1)),
                    };
                }
            }
            WindowFunctionType::Sum => {
                if !input.is_null() {
                    *acc = match acc {
                        Value::Null => input.clone(),
                        ref other => other.add(input),
                    };
                }
            }
            WindowFunctionType::Min => {
                if !input.is_null() && (acc.is_null() || input.compare(acc) == Ordering::Less) {
                    *acc = input.clone();
                }
            }
            WindowFunctionType::Max => {
                if !input.is_null() && (acc.is_null() || input.compare(acc) == Ordering::Greater) {
                    *acc = input.clone();
                }
            }
            WindowFunctionType::Rank => unreachable!("rank is not an accumulator"),
        }
    }

    fn initial_accumulator(kind: WindowFunctionType) -> Value {
        match kind {
            WindowFunctionType::CountStar => Value::Integer(0),
            _ => Value::Null,
        }
    }

    /// Counts report zero instead of NULL when nothing accumulated.
    fn finalize(kind: WindowFunctionType, acc: Value) -> Value {
        match kind {
            WindowFunctionType::Count | WindowFunctionType::CountStar if acc.is_null() => {
                Value::Integer(0)
            }
            _ => acc,
        }
    }
}

impl Executor for WindowFunctionExecutor {
    fn init(&mut self) {
        self.child.init();
        self.computed.clear();
        self.cursor = 0;

        let schema = self.child.output_schema().clone();
        let mut input: Vec<Tuple> = Vec::new();
        let mut batch = Vec::new();
        let mut rids = Vec::new();
        while self.child.next(&mut batch, &mut rids, BATCH_SIZE) {
            input.append(&mut batch);
        }
        if input.is_empty() {
            return;
        }

        let n = input.len();
        let mut indices: Vec<usize> = (0..n).collect();
        // Result values per window function, addressed by original tuple
        // position.
        let mut window_results: HashMap<usize, Vec<Value>> = HashMap::new();

        for (&col_idx, wf) in &self.plan.window_functions {
            let mut results = vec![Value::Null; n];
            Self::sort_indices(&mut indices, &input, &schema, wf);

            let mut start = 0;
            while start < n {
                // Find the partition boundary.
                let mut end = start + 1;
                while end < n
                    && Self::same_partition(&input, &schema, wf, indices[start], indices[end])
                {
                    end += 1;
                }

                if wf.order_by.is_empty() {
                    // Whole-partition aggregate.
                    let mut acc = Self::initial_accumulator(wf.kind);
                    for &idx in &indices[start..end] {
                        let input_value = wf.function.evaluate(&input[idx], &schema);
                        Self::accumulate(wf.kind, &mut acc, &input_value);
                    }
                    let result = Self::finalize(wf.kind, acc);
                    for &idx in &indices[start..end] {
                        results[idx] = result.clone();
                    }
                } else {
                    // Range-peer semantics: walk peer groups, assigning
                    // each group the accumulation up to its end.
                    let mut acc = Self::initial_accumulator(wf.kind);
                    let mut i = start;
                    while i < end {
                        let mut peer_end = i + 1;
                        while peer_end < end
                            && Self::same_peer_group(
                                &input, &schema, wf, indices[i], indices[peer_end],
                            )
                        {
                            peer_end += 1;
                        }

                        if wf.kind == WindowFunctionType::Rank {
                            let rank = (i - start + 1) as i32;
                            for &idx in &indices[i..peer_end] {
                                results[idx] = Value::Integer(rank);
                            }
                        } else {
                            for &idx in &indices[i..peer_end] {
                                let input_value = wf.function.evaluate(&input[idx], &schema);
                                Self::accumulate(wf.kind, &mut acc, &input_value);
                            }
                            let result = Self::finalize(wf.kind, acc.clone());
                            for &idx in &indices[i..peer_end] {
                                results[idx] = result.clone();
                            }
                        }
                        i = peer_end;
                    }
                }
                start = end;
            }

            window_results.insert(col_idx, results);
        }

        // Emit in the order of the final sort pass.
        self.computed.reserve(n);
        for &idx in &indices {
            let mut values = Vec::with_capacity(self.plan.columns.len());
            for (col_idx, expr) in self.plan.columns.iter().enumerate() {
                if let Some(results) = window_results.get(&col_idx) {
                    values.push(results[idx].clone());
                } else {
                    values.push(expr.evaluate(&input[idx], &schema));
                }
            }
            self.computed
                .push(Tuple::from_values(&values, &self.plan.output_schema));
        }
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        while self.cursor < self.computed.len() && tuples.len() < batch_size {
            let tuple = self.computed[self.cursor].clone();
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
