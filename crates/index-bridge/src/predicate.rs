//! Typed construction of `where` trees.
//!
//! [`Predicate`] is a strongly-typed front end for the same grammar the
//! compiler accepts. It renders into the untyped form with
//! [`Predicate::to_where`], so typed and untyped callers share one compile
//! path.
//!
//! # Example
//!
//! ```
//! use index_bridge::Predicate;
//!
//! let predicate = Predicate::and([
//!     Predicate::eq("state", "OR"),
//!     Predicate::gt("followers", 1000),
//! ]);
//!
//! assert_eq!(predicate.compile(), r#"state:"OR" AND followers > 1000"#);
//! ```

use serde_json::{Map, Value};

use crate::compile::compile;
use crate::op::Op;

/// Comparison applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    Inq,
    Nin,
}

impl Comparator {
    /// Returns the operator key, or `None` for plain equality.
    pub fn op(self) -> Option<Op> {
        match self {
            Comparator::Eq => None,
            Comparator::Neq => Some(Op::Neq),
            Comparator::Gt => Some(Op::Gt),
            Comparator::Gte => Some(Op::Gte),
            Comparator::Lt => Some(Op::Lt),
            Comparator::Lte => Some(Op::Lte),
            Comparator::Between => Some(Op::Between),
            Comparator::Inq => Some(Op::Inq),
            Comparator::Nin => Some(Op::Nin),
        }
    }
}

/// Logical combinator of sub-predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    fn op(self) -> Op {
        match self {
            Logic::And => Op::And,
            Logic::Or => Op::Or,
        }
    }
}

/// A node of a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A comparison on one field.
    Comparison {
        field: String,
        op: Comparator,
        value: Value,
    },
    /// A logical combination of sub-predicates.
    Logical { kind: Logic, children: Vec<Predicate> },
}

impl Predicate {
    /// Creates a comparison node.
    pub fn comparison(field: impl Into<String>, op: Comparator, value: impl Into<Value>) -> Self {
        Predicate::Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::comparison(field, Comparator::Eq, value)
    }

    pub fn neq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::comparison(field, Comparator::Neq, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::comparison(field, Comparator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::comparison(field, Comparator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::comparison(field, Comparator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::comparison(field, Comparator::Lte, value)
    }

    /// Inclusive numeric range.
    pub fn between(field: impl Into<String>, lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        let range = Value::Array(vec![lo.into(), hi.into()]);
        Predicate::comparison(field, Comparator::Between, range)
    }

    /// Field equals any of `values`.
    pub fn inq<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Predicate::comparison(field, Comparator::Inq, values)
    }

    /// Field equals none of `values`.
    pub fn nin<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Predicate::comparison(field, Comparator::Nin, values)
    }

    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Logical {
            kind: Logic::And,
            children: children.into_iter().collect(),
        }
    }

    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Logical {
            kind: Logic::Or,
            children: children.into_iter().collect(),
        }
    }

    /// Renders the untyped `where` form.
    pub fn to_where(&self) -> Value {
        match self {
            Predicate::Comparison { field, op, value } => {
                let condition = match op.op() {
                    None => value.clone(),
                    Some(op) => single(op.as_str(), value.clone()),
                };
                single(field, condition)
            }
            Predicate::Logical { kind, children } => {
                let children: Vec<Value> = children.iter().map(Predicate::to_where).collect();
                single(kind.op().as_str(), Value::Array(children))
            }
        }
    }

    /// Compiles the predicate into a filter expression.
    pub fn compile(&self) -> String {
        compile(&self.to_where())
    }
}

impl From<Predicate> for Value {
    fn from(predicate: Predicate) -> Self {
        predicate.to_where()
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}
