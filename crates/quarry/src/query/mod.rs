mod eval;
mod fingerprint;
mod like;

pub use eval::Evaluator;
pub use fingerprint::{QueryFingerprint, fingerprint};
pub(crate) use like::like_to_regex;

use crate::{attribute::AttributeName, error::QueryError, value::Value};
use std::ops::{BitAnd, BitOr};

/// Default expansion cap for prefix text queries.
pub const DEFAULT_MAX_EXPANSIONS: usize = 50;

///
/// Query AST
///
/// Pure representation of a query: structured predicates, logical
/// composition, and full-text nodes. No index logic or execution
/// semantics live here; interpretation happens in the optimizer and
/// executor passes.
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Like,
    Regex,
    Contains,
    ContainsAll,
    ContainsAny,
}

///
/// Compare
///

#[derive(Clone, Debug, PartialEq)]
pub struct Compare {
    pub attribute: AttributeName,
    pub op: CompareOp,
    pub value: Value,
}

///
/// Between
///
/// Range predicate with explicit inclusivity. The builder defaults to
/// `[lower, upper)`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Between {
    pub attribute: AttributeName,
    pub lower: Value,
    pub upper: Value,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

///
/// TextQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct MatchQuery {
    pub field: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhraseQuery {
    pub field: String,
    pub text: String,
    pub slop: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub max_expansions: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TextQuery {
    Match(MatchQuery),
    Phrase(PhraseQuery),
    Prefix(PrefixQuery),
}

impl TextQuery {
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Match(m) => &m.field,
            Self::Phrase(p) => &p.field,
            Self::Prefix(p) => &p.field,
        }
    }
}

///
/// Query
///

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Compare(Compare),
    Between(Between),
    Has { attribute: AttributeName },
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Text(TextQuery),
}

impl Query {
    ///
    /// BUILDERS
    ///

    fn compare(attribute: impl Into<AttributeName>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Eq, value)
    }

    pub fn ne(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Ne, value)
    }

    pub fn gt(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Gt, value)
    }

    pub fn gte(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Gte, value)
    }

    pub fn lt(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Lt, value)
    }

    pub fn lte(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Lte, value)
    }

    /// `[lower, upper)` range; use `between_bounds` for full control.
    pub fn between(
        attribute: impl Into<AttributeName>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> Self {
        Self::between_bounds(attribute, lower, true, upper, false)
    }

    pub fn between_bounds(
        attribute: impl Into<AttributeName>,
        lower: impl Into<Value>,
        lower_inclusive: bool,
        upper: impl Into<Value>,
        upper_inclusive: bool,
    ) -> Self {
        Self::Between(Between {
            attribute: attribute.into(),
            lower: lower.into(),
            upper: upper.into(),
            lower_inclusive,
            upper_inclusive,
        })
    }

    pub fn is_in(attribute: impl Into<AttributeName>, values: Vec<Value>) -> Self {
        Self::compare(attribute, CompareOp::In, Value::List(values))
    }

    pub fn has(attribute: impl Into<AttributeName>) -> Self {
        Self::Has {
            attribute: attribute.into(),
        }
    }

    pub fn like(attribute: impl Into<AttributeName>, pattern: impl Into<String>) -> Self {
        Self::compare(attribute, CompareOp::Like, pattern.into())
    }

    pub fn regex(attribute: impl Into<AttributeName>, pattern: impl Into<String>) -> Self {
        Self::compare(attribute, CompareOp::Regex, pattern.into())
    }

    pub fn contains(attribute: impl Into<AttributeName>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Contains, value)
    }

    pub fn contains_all(attribute: impl Into<AttributeName>, values: Vec<Value>) -> Self {
        Self::compare(attribute, CompareOp::ContainsAll, Value::List(values))
    }

    pub fn contains_any(attribute: impl Into<AttributeName>, values: Vec<Value>) -> Self {
        Self::compare(attribute, CompareOp::ContainsAny, Value::List(values))
    }

    pub fn matches(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text(TextQuery::Match(MatchQuery {
            field: field.into(),
            text: text.into(),
        }))
    }

    pub fn match_phrase(field: impl Into<String>, text: impl Into<String>, slop: u32) -> Self {
        Self::Text(TextQuery::Phrase(PhraseQuery {
            field: field.into(),
            text: text.into(),
            slop,
        }))
    }

    pub fn match_prefix(
        field: impl Into<String>,
        prefix: impl Into<String>,
        max_expansions: Option<usize>,
    ) -> Self {
        Self::Text(TextQuery::Prefix(PrefixQuery {
            field: field.into(),
            prefix: prefix.into(),
            max_expansions: max_expansions.unwrap_or(DEFAULT_MAX_EXPANSIONS),
        }))
    }

    pub fn and(children: Vec<Self>) -> Self {
        Self::And(children)
    }

    pub fn or(children: Vec<Self>) -> Self {
        Self::Or(children)
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    ///
    /// SHAPE
    ///

    /// Validate AST shape ahead of planning: logical nodes must have
    /// children, list operators need list literals, and patterns must
    /// compile. Evaluation and registration rely on this having passed.
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            Self::Compare(cmp) => match cmp.op {
                CompareOp::In | CompareOp::ContainsAll | CompareOp::ContainsAny => {
                    if matches!(cmp.value, Value::List(_)) {
                        Ok(())
                    } else {
                        Err(QueryError::NonListLiteral {
                            op: op_name(cmp.op),
                        })
                    }
                }
                CompareOp::Like => {
                    let pattern = cmp.value.as_text().unwrap_or_default();
                    like_to_regex(pattern).map(|_| ())
                }
                CompareOp::Regex => {
                    let pattern = cmp.value.as_text().unwrap_or_default();
                    regex::Regex::new(pattern)
                        .map(|_| ())
                        .map_err(|source| QueryError::InvalidRegex {
                            pattern: pattern.to_string(),
                            source: Box::new(source),
                        })
                }
                _ => Ok(()),
            },
            Self::Between(_) | Self::Has { .. } | Self::Text(_) => Ok(()),
            Self::And(children) => {
                if children.is_empty() {
                    return Err(QueryError::EmptyLogical { op: "and" });
                }
                children.iter().try_for_each(Self::validate)
            }
            Self::Or(children) => {
                if children.is_empty() {
                    return Err(QueryError::EmptyLogical { op: "or" });
                }
                children.iter().try_for_each(Self::validate)
            }
            Self::Not(child) => child.validate(),
        }
    }

    /// True when any node in the tree is a full-text query.
    #[must_use]
    pub fn contains_text(&self) -> bool {
        match self {
            Self::Text(_) => true,
            Self::And(children) | Self::Or(children) => {
                children.iter().any(Self::contains_text)
            }
            Self::Not(child) => child.contains_text(),
            _ => false,
        }
    }

    /// The query as a single atomic text node, when it is exactly that.
    #[must_use]
    pub fn as_single_text(&self) -> Option<&TextQuery> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Canonical fingerprint; structurally equal queries hash equal.
    #[must_use]
    pub fn fingerprint(&self) -> QueryFingerprint {
        fingerprint(self)
    }
}

pub(crate) const fn op_name(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "eq",
        CompareOp::Ne => "ne",
        CompareOp::Gt => "gt",
        CompareOp::Gte => "gte",
        CompareOp::Lt => "lt",
        CompareOp::Lte => "lte",
        CompareOp::In => "in",
        CompareOp::Like => "like",
        CompareOp::Regex => "regex",
        CompareOp::Contains => "contains",
        CompareOp::ContainsAll => "contains_all",
        CompareOp::ContainsAny => "contains_any",
    }
}

impl BitAnd for Query {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match self {
            Self::And(mut children) => {
                children.push(rhs);
                Self::And(children)
            }
            lhs => Self::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Query {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match self {
            Self::Or(mut children) => {
                children.push(rhs);
                Self::Or(children)
            }
            lhs => Self::Or(vec![lhs, rhs]),
        }
    }
}
