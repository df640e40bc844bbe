//! Nested loop join.

use vellum_common::constants::BATCH_SIZE;
use vellum_common::types::Rid;

use crate::plan::{JoinType, NestedLoopJoinPlan};
use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

use super::Executor;

/// The two-loop join: for each outer tuple the inner child is pulled to
/// exhaustion and re-initialized. Supports inner and left joins only.
pub struct NestedLoopJoinExecutor {
    plan: NestedLoopJoinPlan,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,

    left_tuples: Vec<Tuple>,
    left_idx: usize,
    right_tuples: Vec<Tuple>,
    right_idx: usize,
    matched: bool,
    right_exhausted: bool,
}

impl NestedLoopJoinExecutor {
    /// Creates a nested loop join.
    ///
    /// # Panics
    ///
    /// Panics for join types other than inner and left.
    pub fn new(plan: NestedLoopJoinPlan, left: Box<dyn Executor>, right: Box<dyn Executor>) -> Self {
        assert!(
            matches!(plan.join_type, JoinType::Inner | JoinType::Left),
            "join type {:?} not supported",
            plan.join_type
        );
        Self {
            plan,
            left,
            right,
            left_tuples: Vec::new(),
            left_idx: 0,
            right_tuples: Vec::new(),
            right_idx: 0,
            matched: false,
            right_exhausted: false,
        }
    }

    fn join_row(&self, left: &Tuple, right: Option<&Tuple>) -> Tuple {
        let left_schema = self.left.output_schema();
        let right_schema = self.right.output_schema();
        let mut values = left.values(left_schema);
        match right {
            Some(right) => values.extend(right.values(right_schema)),
            None => values.extend(std::iter::repeat(Value::Null).take(right_schema.column_count())),
        }
        Tuple::from_values(&values, &self.plan.output_schema)
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) {
        self.left.init();
        self.right.init();
        self.left_tuples.clear();
        self.left_idx = 0;
        self.right_tuples.clear();
        self.right_idx = 0;
        self.matched = false;
        self.right_exhausted = false;

        let mut rids = Vec::new();
        self.left.next(&mut self.left_tuples, &mut rids, BATCH_SIZE);
    }

    fn next(&mut self, tuples: &mut Vec<Tuple>, rids: &mut Vec<Rid>, batch_size: usize) -> bool {
        tuples.clear();
        rids.clear();

        while self.left_idx < self.left_tuples.len() {
            let left_tuple = self.left_tuples[self.left_idx].clone();

            while !self.right_exhausted {
                if self.right_idx >= self.right_tuples.len() {
                    self.right_idx = 0;
                    let mut right_rids = Vec::new();
                    if !self
                        .right
                        .next(&mut self.right_tuples, &mut right_rids, BATCH_SIZE)
                    {
                        self.right_exhausted = true;
                        break;
                    }
                }

                while self.right_idx < self.right_tuples.len() {
                    let right_tuple = &self.right_tuples[self.right_idx];
                    self.right_idx += 1;

                    let accept = match &self.plan.predicate {
                        Some(pred) => pred
                            .evaluate_join(
                                &left_tuple,
                                self.left.output_schema(),
                                right_tuple,
                                self.right.output_schema(),
                            )
                            .to_bool(),
                        None => true,
                    };
                    if accept {
                        self.matched = true;
                        tuples.push(self.join_row(&left_tuple, Some(right_tuple)));
                        rids.push(Rid::INVALID);
                        if tuples.len() >= batch_size {
                            return true;
                        }
                    }
                }
            }

            // Inner child exhausted for this outer tuple.
            if self.plan.join_type == JoinType::Left && !self.matched {
                tuples.push(self.join_row(&left_tuple, None));
                rids.push(Rid::INVALID);
            }

            self.left_idx += 1;
            self.right.init();
            self.right_tuples.clear();
            self.right_idx = 0;
            self.matched = false;
            self.right_exhausted = false;

            if self.left_idx >= self.left_tuples.len() {
                self.left_idx = 0;
                let mut left_rids = Vec::new();
                if !self.left.next(&mut self.left_tuples, &mut left_rids, BATCH_SIZE) {
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
