//! Reserved operator keys of the `where` grammar.
//!
//! The [`Op`] enum lists every key the predicate compiler treats as an
//! operator rather than a field name. Not all operators produce output:
//! `near`, `like` and `nlike` are recognized and then dropped because the
//! target filter language has no equivalent.

/// Operator key inside a `where` clause.
///
/// Operators are grouped by how they compile:
/// - **Logical**: `And`, `Or` - combine sub-clauses
/// - **Comparison**: `Gt`, `Gte`, `Lt`, `Lte` - `field > value`
/// - **Range**: `Between` - `field:lo TO hi`
/// - **Membership**: `Inq`, `Nin` - parenthesized disjunction
/// - **Negation**: `Neq` - `NOT field:value`
/// - **Unsupported**: `Near`, `Like`, `Nlike` - accepted, no output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    And,
    Or,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    Inq,
    Nin,
    Neq,
    Near,
    Like,
    Nlike,
}

impl Op {
    /// Every reserved operator, in declaration order.
    pub const ALL: [Op; 13] = [
        Op::And,
        Op::Or,
        Op::Gt,
        Op::Gte,
        Op::Lt,
        Op::Lte,
        Op::Between,
        Op::Inq,
        Op::Nin,
        Op::Neq,
        Op::Near,
        Op::Like,
        Op::Nlike,
    ];

    /// Recognizes a `where` key as an operator.
    ///
    /// Returns `None` for anything else, which the compiler then treats as
    /// a field name.
    pub fn from_key(key: &str) -> Option<Op> {
        Op::ALL.into_iter().find(|op| op.as_str() == key)
    }

    /// Returns `true` for the logical combinators `and` and `or`.
    pub fn is_logical(self) -> bool {
        matches!(self, Op::And | Op::Or)
    }

    /// Returns `true` for operators the target filter language cannot express.
    pub fn is_unsupported(self) -> bool {
        matches!(self, Op::Near | Op::Like | Op::Nlike)
    }

    /// Returns the filter-language symbol for the ordering comparisons.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            Op::Gt => Some(">"),
            Op::Gte => Some(">="),
            Op::Lt => Some("<"),
            Op::Lte => Some("<="),
            _ => None,
        }
    }

    /// Returns the joiner used between sub-clauses of a logical operator.
    pub fn joiner(self) -> Option<&'static str> {
        match self {
            Op::And => Some(" AND "),
            Op::Or => Some(" OR "),
            _ => None,
        }
    }

    /// Returns the `where` key of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::And => "and",
            Op::Or => "or",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Between => "between",
            Op::Inq => "inq",
            Op::Nin => "nin",
            Op::Neq => "neq",
            Op::Near => "near",
            Op::Like => "like",
            Op::Nlike => "nlike",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns `true` if `key` is a reserved operator key.
pub fn is_reserved(key: &str) -> bool {
    Op::from_key(key).is_some()
}
