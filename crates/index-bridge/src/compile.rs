//! Compilation of `where` trees into filter expressions.
//!
//! The input is the untyped nested-object grammar: at each level a key is
//! either a reserved operator (see [`Op`]) or a field name that opens a
//! nested scope for the operators below it.
//!
//! ```text
//! { "state": "OR" }                          state:"OR"
//! { "followers": { "gt": 1000 } }            followers > 1000
//! { "state": { "inq": ["OR", "CA"] } }       (state:"OR" OR state:"CA")
//! { "followers": { "between": [1, 5] } }     followers:1 TO 5
//! { "city": { "neq": "Salem" } }             NOT city:"Salem"
//! ```
//!
//! Fragments produced at one level are joined with `AND`. Levels under a
//! field that produce more than one fragment are parenthesized, as are
//! `and`/`or` groups whose meaning would otherwise change once embedded.
//! The top level never is. Unsupported or malformed shapes contribute nothing, so
//! compilation never fails.
//!
//! # Example
//!
//! ```
//! use index_bridge::compile;
//! use serde_json::json;
//!
//! let filters = compile(&json!({
//!     "and": [
//!         { "state": "OR" },
//!         { "or": [{ "city": "Salem" }, { "city": "Eugene" }] }
//!     ]
//! }));
//!
//! assert_eq!(filters, r#"state:"OR" AND (city:"Salem" OR city:"Eugene")"#);
//! ```

use serde_json::{Map, Value};

use crate::op::Op;

/// Compiles a `where` tree into a filter expression.
///
/// Empty or absent input compiles to an empty string.
pub fn compile(clause: &Value) -> String {
    compile_scoped(clause, Scope::TOP)
}

/// Position of a level inside the tree being compiled.
#[derive(Debug, Clone, Copy)]
struct Scope<'a> {
    /// Field the operators of this level apply to.
    field: Option<&'a str>,
    /// What the output of this level is joined into.
    within: Within,
}

/// The expression a fragment ends up embedded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Within {
    Top,
    Field,
    And,
    Or,
}

impl Within {
    /// Whether a join with `joiner` must be grouped to keep its meaning here.
    ///
    /// Field scopes always group multi-part output.
    fn groups(self, joiner: Op) -> bool {
        match self {
            Within::Top => false,
            Within::Field => true,
            Within::And => joiner == Op::Or,
            Within::Or => joiner == Op::And,
        }
    }
}

impl<'a> Scope<'a> {
    const TOP: Scope<'static> = Scope {
        field: None,
        within: Within::Top,
    };

    fn field(field: &'a str) -> Scope<'a> {
        Scope {
            field: Some(field),
            within: Within::Field,
        }
    }

    fn within(self, within: Within) -> Scope<'a> {
        Scope { within, ..self }
    }
}

fn compile_scoped(clause: &Value, scope: Scope<'_>) -> String {
    let map = match clause {
        Value::Object(map) => map,
        scalar => {
            // A bare value under a field is an implicit equality.
            return match scope.field {
                Some(field) => equality(field, scalar),
                None => String::new(),
            };
        }
    };

    let fragments: Vec<String> = map
        .iter()
        .map(|(key, value)| match Op::from_key(key) {
            Some(op) => compile_operator(op, value, map, scope),
            None => compile_field(key, value),
        })
        .filter(|fragment| !fragment.is_empty())
        .collect();

    group(fragments, Op::And, scope.within.groups(Op::And))
}

fn compile_field(field: &str, value: &Value) -> String {
    match value {
        Value::Object(_) => compile_scoped(value, Scope::field(field)),
        other => equality(field, other),
    }
}

fn compile_operator(op: Op, value: &Value, level: &Map<String, Value>, scope: Scope<'_>) -> String {
    match op {
        Op::And | Op::Or => compile_logical(op, value, level, scope),
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            let (Some(field), Some(symbol)) = (scope.field, op.symbol()) else {
                return String::new();
            };
            match bare(value) {
                Some(operand) => format!("{field} {symbol} {operand}"),
                None => String::new(),
            }
        }
        Op::Between => {
            let Some(field) = scope.field else {
                return String::new();
            };
            match value.as_array().map(Vec::as_slice) {
                Some([Value::Number(lo), Value::Number(hi)]) => format!("{field}:{lo} TO {hi}"),
                _ => String::new(),
            }
        }
        Op::Inq | Op::Nin => match scope.field {
            Some(field) => membership(field, value, op == Op::Nin),
            None => String::new(),
        },
        Op::Neq => {
            let Some(field) = scope.field else {
                return String::new();
            };
            let negated = compile_scoped(value, Scope::field(field));
            if negated.is_empty() {
                negated
            } else {
                format!("NOT {negated}")
            }
        }
        Op::Near | Op::Like | Op::Nlike => String::new(),
    }
}

/// Compiles an `and`/`or` list.
///
/// A single sub-clause flattens into the current scope. Sub-clauses keep the
/// field in scope, so `{age: {or: [{lt: 18}, {gt: 65}]}}` compares `age`
/// twice.
fn compile_logical(op: Op, value: &Value, level: &Map<String, Value>, scope: Scope<'_>) -> String {
    let Some(items) = value.as_array() else {
        return String::new();
    };
    // Sibling keys are AND-joined with this group.
    let within = match scope.within {
        Within::Field => Within::Field,
        _ if level.len() > 1 => Within::And,
        other => other,
    };
    if let [single] = items.as_slice() {
        return compile_scoped(single, scope.within(within));
    }

    let child = match op {
        Op::Or => Within::Or,
        _ => Within::And,
    };
    let parts: Vec<String> = items
        .iter()
        .map(|item| compile_scoped(item, scope.within(child)))
        .filter(|part| !part.is_empty())
        .collect();
    group(parts, op, within.groups(op))
}

fn group(parts: Vec<String>, joiner: Op, parenthesize: bool) -> String {
    let joined = parts.join(joiner.joiner().unwrap_or(" AND "));
    if parts.len() > 1 && parenthesize {
        format!("({joined})")
    } else {
        joined
    }
}

fn equality(field: &str, value: &Value) -> String {
    match value {
        Value::Array(_) => membership(field, value, false),
        Value::Object(_) => compile_scoped(value, Scope::field(field)),
        scalar => format!("{field}:{}", quote(scalar)),
    }
}

fn membership(field: &str, value: &Value, negate: bool) -> String {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    };
    if candidates.is_empty() {
        return String::new();
    }

    let prefix = if negate { "NOT " } else { "" };
    let terms: Vec<String> = candidates
        .into_iter()
        .map(|candidate| format!("{prefix}{field}:{}", quote(candidate)))
        .collect();
    format!("({})", terms.join(" OR "))
}

/// Renders an equality operand: strings quoted, everything else bare.
fn quote(value: &Value) -> String {
    match value {
        Value::String(text) => format!("\"{}\"", text.replace('"', "\\\"")),
        other => other.to_string(),
    }
}

/// Renders a comparison operand without quotes.
fn bare(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
