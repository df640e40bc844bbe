//! Expression trees.
//!
//! Column references carry the side of the tuple they read from
//! (`tuple_idx` 0 = left/outer, 1 = right/inner), which is what the join
//! evaluator and the optimizer's equi-condition extraction key off.

use std::cmp::Ordering;

use crate::schema::Schema;
use crate::tuple::Tuple;
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// Addition.
    Add,
    /// Subtraction.
    Subtract,
}

/// An expression over one or two input tuples.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column of an input tuple.
    Column {
        /// Which input tuple the column reads (0 = left/outer, 1 = right/inner).
        tuple_idx: usize,
        /// Column position within that tuple.
        col_idx: usize,
    },
    /// A constant.
    Constant(Value),
    /// A comparison.
    Comparison {
        /// Operator.
        op: ComparisonOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A logical connective.
    Logic {
        /// Connective.
        op: LogicOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// An arithmetic operation.
    Arithmetic {
        /// Operator.
        op: ArithmeticOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
}

impl Expr {
    /// A column of the single (or left) input.
    pub fn column(col_idx: usize) -> Expr {
        Expr::Column {
            tuple_idx: 0,
            col_idx,
        }
    }

    /// A column of a specific input side.
    pub fn column_of(tuple_idx: usize, col_idx: usize) -> Expr {
        Expr::Column { tuple_idx, col_idx }
    }

    /// An integer constant.
    pub fn int(v: i32) -> Expr {
        Expr::Constant(Value::Integer(v))
    }

    /// `left op right` comparison.
    pub fn cmp(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left = right`.
    pub fn eq(left: Expr, right: Expr) -> Expr {
        Self::cmp(ComparisonOp::Equal, left, right)
    }

    /// `left AND right`.
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::Logic {
            op: LogicOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left OR right`.
    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Logic {
            op: LogicOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluates against a single tuple.
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Value {
        match self {
            Expr::Column { col_idx, .. } => tuple.value_at(schema, *col_idx),
            Expr::Constant(v) => v.clone(),
            Expr::Comparison { op, left, right } => {
                let l = left.evaluate(tuple, schema);
                let r = right.evaluate(tuple, schema);
                Self::compare(*op, &l, &r)
            }
            Expr::Logic { op, left, right } => {
                let l = left.evaluate(tuple, schema).to_bool();
                let r = right.evaluate(tuple, schema).to_bool();
                Value::Boolean(match op {
                    LogicOp::And => l && r,
                    LogicOp::Or => l || r,
                })
            }
            Expr::Arithmetic { op, left, right } => {
                let l = left.evaluate(tuple, schema);
                let r = right.evaluate(tuple, schema);
                Self::arith(*op, &l, &r)
            }
        }
    }

    /// Evaluates against a pair of join inputs; column references pick
    /// their side via `tuple_idx`.
    pub fn evaluate_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> Value {
        match self {
            Expr::Column { tuple_idx, col_idx } => {
                if *tuple_idx == 0 {
                    left_tuple.value_at(left_schema, *col_idx)
                } else {
                    right_tuple.value_at(right_schema, *col_idx)
                }
            }
            Expr::Constant(v) => v.clone(),
            Expr::Comparison { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                Self::compare(*op, &l, &r)
            }
            Expr::Logic { op, left, right } => {
                let l = left
                    .evaluate_join(left_tuple, left_schema, right_tuple, right_schema)
                    .to_bool();
                let r = right
                    .evaluate_join(left_tuple, left_schema, right_tuple, right_schema)
                    .to_bool();
                Value::Boolean(match op {
                    LogicOp::And => l && r,
                    LogicOp::Or => l || r,
                })
            }
            Expr::Arithmetic { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                Self::arith(*op, &l, &r)
            }
        }
    }

    fn compare(op: ComparisonOp, l: &Value, r: &Value) -> Value {
        if l.is_null() || r.is_null() {
            return Value::Null;
        }
        let ord = l.compare(r);
        let result = match op {
            ComparisonOp::Equal => ord == Ordering::Equal,
            ComparisonOp::NotEqual => ord != Ordering::Equal,
            ComparisonOp::LessThan => ord == Ordering::Less,
            ComparisonOp::LessThanOrEqual => ord != Ordering::Greater,
            ComparisonOp::GreaterThan => ord == Ordering::Greater,
            ComparisonOp::GreaterThanOrEqual => ord != Ordering::Less,
        };
        Value::Boolean(result)
    }

    fn arith(op: ArithmeticOp, l: &Value, r: &Value) -> Value {
        match (l, r) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(match op {
                ArithmeticOp::Add => a.wrapping_add(*b),
                ArithmeticOp::Subtract => a.wrapping_sub(*b),
            }),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::value::DataType;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Integer),
        ])
    }

    fn row(a: i32, b: i32) -> Tuple {
        Tuple::from_values(&[Value::Integer(a), Value::Integer(b)], &schema())
    }

    #[test]
    fn comparison_and_logic() {
        let s = schema();
        let t = row(3, 7);
        let pred = Expr::and(
            Expr::cmp(ComparisonOp::GreaterThan, Expr::column(1), Expr::column(0)),
            Expr::eq(Expr::column(0), Expr::int(3)),
        );
        assert_eq!(pred.evaluate(&t, &s), Value::Boolean(true));

        let pred = Expr::or(
            Expr::eq(Expr::column(0), Expr::int(99)),
            Expr::eq(Expr::column(1), Expr::int(7)),
        );
        assert_eq!(pred.evaluate(&t, &s), Value::Boolean(true));
    }

    #[test]
    fn null_comparison_yields_null() {
        let s = schema();
        let t = Tuple::from_values(&[Value::Null, Value::Integer(1)], &s);
        let pred = Expr::eq(Expr::column(0), Expr::int(1));
        assert!(pred.evaluate(&t, &s).is_null());
    }

    #[test]
    fn join_columns_pick_their_side() {
        let s = schema();
        let left = row(1, 2);
        let right = row(10, 2);
        let pred = Expr::eq(Expr::column_of(0, 1), Expr::column_of(1, 1));
        assert_eq!(
            pred.evaluate_join(&left, &s, &right, &s),
            Value::Boolean(true)
        );
        let pred = Expr::eq(Expr::column_of(0, 0), Expr::column_of(1, 0));
        assert_eq!(
            pred.evaluate_join(&left, &s, &right, &s),
            Value::Boolean(false)
        );
    }

    #[test]
    fn arithmetic_evaluates() {
        let s = schema();
        let t = row(4, 5);
        let e = Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(Expr::column(0)),
            right: Box::new(Expr::column(1)),
        };
        assert_eq!(e.evaluate(&t, &s), Value::Integer(9));
    }
}
