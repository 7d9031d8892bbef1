//! Type expressions for validating loosely-typed values.
//!
//! A type expression is a small string grammar:
//!
//! ```text
//! String            - a named primitive kind
//! Boolean|String    - union, any alternative may match
//! [String]          - array whose every element matches
//! *                 - anything
//! ```
//!
//! Matching is total: every value either matches or it does not. Unknown
//! kind names parse fine and never match.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::date;

static ARRAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(\S+)\]$").expect("array type pattern is valid"));

/// Primitive kind names recognized by [`TypeExpr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Number,
    Integer,
    Boolean,
    /// Any array.
    Array,
    /// Objects and arrays alike.
    Object,
    /// Objects only.
    PlainObject,
    Null,
    /// A string holding a parseable date.
    Date,
    /// Unrecognized kind name. Never matches.
    Unknown(String),
}

impl Kind {
    /// Resolves a kind name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Kind {
        match name.to_ascii_lowercase().as_str() {
            "string" => Kind::String,
            "number" => Kind::Number,
            "integer" => Kind::Integer,
            "boolean" => Kind::Boolean,
            "array" => Kind::Array,
            "object" => Kind::Object,
            "plainobject" => Kind::PlainObject,
            "null" => Kind::Null,
            "date" => Kind::Date,
            _ => Kind::Unknown(name.to_string()),
        }
    }

    /// Returns `true` if the value is of this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Number => value.is_number(),
            Kind::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value
                        .as_f64()
                        .map_or(false, |n| n.is_finite() && n.fract() == 0.0)
            }
            Kind::Boolean => value.is_boolean(),
            Kind::Array => value.is_array(),
            Kind::Object => value.is_object() || value.is_array(),
            Kind::PlainObject => value.is_object(),
            Kind::Null => value.is_null(),
            Kind::Date => date::is_date(value),
            Kind::Unknown(_) => false,
        }
    }
}

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A single primitive kind.
    Kind(Kind),
    /// Alternatives tried left to right.
    Union(Vec<TypeExpr>),
    /// Homogeneous array of the inner type.
    ArrayOf(Box<TypeExpr>),
    /// Matches everything.
    Any,
}

impl TypeExpr {
    /// Parses a type expression. Never fails.
    ///
    /// Unions are split before arrays are recognized, so `[String]|String`
    /// is a union of `[String]` and `String`.
    pub fn parse(expr: &str) -> TypeExpr {
        let expr = expr.trim();
        if expr.contains('|') {
            return TypeExpr::Union(expr.split('|').map(TypeExpr::parse).collect());
        }
        if let Some(caps) = ARRAY_PATTERN.captures(expr) {
            return TypeExpr::ArrayOf(Box::new(TypeExpr::parse(&caps[1])));
        }
        if expr == "*" {
            return TypeExpr::Any;
        }
        TypeExpr::Kind(Kind::from_name(expr))
    }

    /// Returns `true` if the value satisfies this expression.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TypeExpr::Kind(kind) => kind.matches(value),
            TypeExpr::Union(alternatives) => alternatives.iter().any(|alt| alt.matches(value)),
            TypeExpr::ArrayOf(inner) => match value {
                Value::Array(items) => items.iter().all(|item| inner.matches(item)),
                _ => false,
            },
            TypeExpr::Any => true,
        }
    }
}

impl From<&str> for TypeExpr {
    fn from(expr: &str) -> Self {
        TypeExpr::parse(expr)
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Kind(Kind::Unknown(name)) => write!(f, "{name}"),
            TypeExpr::Kind(kind) => write!(f, "{kind:?}"),
            TypeExpr::Union(alternatives) => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
            TypeExpr::ArrayOf(inner) => write!(f, "[{inner}]"),
            TypeExpr::Any => f.write_str("*"),
        }
    }
}

/// Checks a value against a type expression string.
pub fn matches(value: &Value, expr: &str) -> bool {
    TypeExpr::parse(expr).matches(value)
}
