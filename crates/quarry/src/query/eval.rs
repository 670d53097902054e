use super::{Between, Compare, CompareOp, Query, TextQuery, like_to_regex};
use crate::{
    attribute::{AttributeName, Schema},
    error::QueryError,
    value::Value,
};
use regex::Regex;
use std::{cmp::Ordering, collections::HashMap};

///
/// Evaluator
///
/// Predicate evaluation against live records, used by full scans,
/// filter steps, and standing indexes. Evaluation is total over record
/// shape: a missing attribute means "no match", never a fault. Pattern
/// compilation is the only fallible path and is cached per query run.
///

pub struct Evaluator<'a, V> {
    schema: &'a Schema<V>,
    patterns: HashMap<String, Regex>,
}

impl<'a, V> Evaluator<'a, V> {
    #[must_use]
    pub fn new(schema: &'a Schema<V>) -> Self {
        Self {
            schema,
            patterns: HashMap::new(),
        }
    }

    pub fn matches(&mut self, query: &Query, record: &V) -> Result<bool, QueryError> {
        match query {
            Query::Compare(cmp) => self.compare(cmp, record),
            Query::Between(between) => Ok(self.between(between, record)),
            Query::Has { attribute } => Ok(self
                .schema
                .values(attribute, record)
                .iter()
                .any(|v| !v.is_null())),
            Query::And(children) => {
                if children.is_empty() {
                    return Err(QueryError::EmptyLogical { op: "and" });
                }
                for child in children {
                    if !self.matches(child, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Query::Or(children) => {
                if children.is_empty() {
                    return Err(QueryError::EmptyLogical { op: "or" });
                }
                for child in children {
                    if self.matches(child, record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Query::Not(child) => Ok(!self.matches(child, record)?),
            Query::Text(text) => Ok(self.text_fallback(text, record)),
        }
    }

    fn compare(&mut self, cmp: &Compare, record: &V) -> Result<bool, QueryError> {
        let values = self.schema.values(&cmp.attribute, record);

        match cmp.op {
            CompareOp::Eq => Ok(values.iter().any(|v| is_eq(v, &cmp.value))),
            // Set semantics for multi-value attributes: the record must
            // participate and no extracted value may equal the literal.
            CompareOp::Ne => {
                Ok(!values.is_empty() && !values.iter().any(|v| is_eq(v, &cmp.value)))
            }
            CompareOp::Gt => Ok(ordered(&values, &cmp.value, |o| o == Ordering::Greater)),
            CompareOp::Gte => Ok(ordered(&values, &cmp.value, |o| o != Ordering::Less)),
            CompareOp::Lt => Ok(ordered(&values, &cmp.value, |o| o == Ordering::Less)),
            CompareOp::Lte => Ok(ordered(&values, &cmp.value, |o| o != Ordering::Greater)),
            CompareOp::In => {
                let Value::List(items) = &cmp.value else {
                    return Err(QueryError::NonListLiteral { op: "in" });
                };
                Ok(values
                    .iter()
                    .any(|v| items.iter().any(|item| is_eq(v, item))))
            }
            CompareOp::Like => {
                let pattern = cmp.value.as_text().unwrap_or_default();
                let regex = self.compiled(cmp.op, pattern)?;
                Ok(values
                    .iter()
                    .filter_map(Value::as_text)
                    .any(|text| regex.is_match(text)))
            }
            CompareOp::Regex => {
                let pattern = cmp.value.as_text().unwrap_or_default();
                let regex = self.compiled(cmp.op, pattern)?;
                Ok(values
                    .iter()
                    .filter_map(Value::as_text)
                    .any(|text| regex.is_match(text)))
            }
            CompareOp::Contains => Ok(collection_items(&values)
                .iter()
                .any(|v| is_eq(v, &cmp.value))),
            CompareOp::ContainsAll => {
                let Value::List(needles) = &cmp.value else {
                    return Err(QueryError::NonListLiteral { op: "contains_all" });
                };
                let items = collection_items(&values);
                Ok(needles
                    .iter()
                    .all(|needle| items.iter().any(|v| is_eq(v, needle))))
            }
            CompareOp::ContainsAny => {
                let Value::List(needles) = &cmp.value else {
                    return Err(QueryError::NonListLiteral { op: "contains_any" });
                };
                let items = collection_items(&values);
                Ok(needles
                    .iter()
                    .any(|needle| items.iter().any(|v| is_eq(v, needle))))
            }
        }
    }

    fn between(&self, between: &Between, record: &V) -> bool {
        let values = self.schema.values(&between.attribute, record);
        values.iter().any(|v| {
            let lower_ok = Value::compare(v, &between.lower).is_some_and(|o| {
                o == Ordering::Greater || (between.lower_inclusive && o == Ordering::Equal)
            });
            let upper_ok = Value::compare(v, &between.upper).is_some_and(|o| {
                o == Ordering::Less || (between.upper_inclusive && o == Ordering::Equal)
            });
            lower_ok && upper_ok
        })
    }

    // Full-scan fallback for text nodes: case-insensitive substring
    // against the field's text value.
    fn text_fallback(&self, text: &TextQuery, record: &V) -> bool {
        let field = AttributeName::from(text.field());
        let Some(value) = self.schema.value(&field, record) else {
            return false;
        };
        let Some(haystack) = value.as_text() else {
            return false;
        };
        let haystack = Value::fold_ci(haystack);

        let needle = match text {
            TextQuery::Match(m) => &m.text,
            TextQuery::Phrase(p) => &p.text,
            TextQuery::Prefix(p) => &p.prefix,
        };

        haystack.contains(Value::fold_ci(needle).as_ref())
    }

    fn compiled(&mut self, op: CompareOp, pattern: &str) -> Result<&Regex, QueryError> {
        let cache_key = format!("{}:{pattern}", super::op_name(op));
        if !self.patterns.contains_key(&cache_key) {
            let regex = match op {
                CompareOp::Like => like_to_regex(pattern)?,
                _ => Regex::new(pattern).map_err(|source| QueryError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source: Box::new(source),
                })?,
            };
            self.patterns.insert(cache_key.clone(), regex);
        }

        match self.patterns.get(&cache_key) {
            Some(regex) => Ok(regex),
            None => unreachable!("pattern was just cached"),
        }
    }
}

fn is_eq(left: &Value, right: &Value) -> bool {
    Value::compare(left, right) == Some(Ordering::Equal)
}

fn ordered(values: &[Value], literal: &Value, test: impl Fn(Ordering) -> bool) -> bool {
    values
        .iter()
        .any(|v| Value::compare(v, literal).is_some_and(&test))
}

// The collection an array predicate runs over: the extracted values for
// a multi-value attribute, or the items of a single list value.
fn collection_items(values: &[Value]) -> Vec<Value> {
    match values {
        [Value::List(items)] => items.clone(),
        other => other.to_vec(),
    }
}
