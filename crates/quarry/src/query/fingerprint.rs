use super::{Between, Compare, CompareOp, Query, TextQuery};
use crate::value::write_value;
use derive_more::Display;
use xxhash_rust::xxh3::Xxh3;

/// Fingerprint format version byte.
const FINGERPRINT_VERSION: u8 = 1;

/// Stable XXH3 seed for query fingerprints.
const FINGERPRINT_SEED: u64 = 0;

///
/// QueryFingerprint
///
/// Deterministic canonical hash of a query AST. Structurally equal
/// queries fingerprint equal; keys the standing and live registries and
/// the cursor predicate signature.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0:032x}")]
pub struct QueryFingerprint(u128);

impl QueryFingerprint {
    #[must_use]
    pub const fn to_u128(self) -> u128 {
        self.0
    }

    /// Hex form carried inside cursor tokens.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{self}")
    }
}

#[must_use]
pub fn fingerprint(query: &Query) -> QueryFingerprint {
    let mut hasher = Xxh3::with_seed(FINGERPRINT_SEED);
    hasher.update(&[FINGERPRINT_VERSION]);
    write_query(&mut hasher, query);

    QueryFingerprint(hasher.digest128())
}

fn feed_str(h: &mut Xxh3, s: &str) {
    h.update(&(s.len() as u32).to_be_bytes());
    h.update(s.as_bytes());
}

const fn op_tag(op: CompareOp) -> u8 {
    match op {
        CompareOp::Eq => 0x01,
        CompareOp::Ne => 0x02,
        CompareOp::Gt => 0x03,
        CompareOp::Gte => 0x04,
        CompareOp::Lt => 0x05,
        CompareOp::Lte => 0x06,
        CompareOp::In => 0x07,
        CompareOp::Like => 0x08,
        CompareOp::Regex => 0x09,
        CompareOp::Contains => 0x0A,
        CompareOp::ContainsAll => 0x0B,
        CompareOp::ContainsAny => 0x0C,
    }
}

fn write_query(h: &mut Xxh3, query: &Query) {
    match query {
        Query::Compare(Compare {
            attribute,
            op,
            value,
        }) => {
            h.update(&[0x10, op_tag(*op)]);
            feed_str(h, attribute.as_str());
            write_value(h, value);
        }
        Query::Between(Between {
            attribute,
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
        }) => {
            h.update(&[0x11, u8::from(*lower_inclusive), u8::from(*upper_inclusive)]);
            feed_str(h, attribute.as_str());
            write_value(h, lower);
            write_value(h, upper);
        }
        Query::Has { attribute } => {
            h.update(&[0x12]);
            feed_str(h, attribute.as_str());
        }
        Query::And(children) => {
            h.update(&[0x20]);
            h.update(&(children.len() as u32).to_be_bytes());
            for child in children {
                write_query(h, child);
            }
        }
        Query::Or(children) => {
            h.update(&[0x21]);
            h.update(&(children.len() as u32).to_be_bytes());
            for child in children {
                write_query(h, child);
            }
        }
        Query::Not(child) => {
            h.update(&[0x22]);
            write_query(h, child);
        }
        Query::Text(text) => match text {
            TextQuery::Match(m) => {
                h.update(&[0x30]);
                feed_str(h, &m.field);
                feed_str(h, &m.text);
            }
            TextQuery::Phrase(p) => {
                h.update(&[0x31]);
                h.update(&p.slop.to_be_bytes());
                feed_str(h, &p.field);
                feed_str(h, &p.text);
            }
            TextQuery::Prefix(p) => {
                h.update(&[0x32]);
                h.update(&(p.max_expansions as u32).to_be_bytes());
                feed_str(h, &p.field);
                feed_str(h, &p.prefix);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn structural_equality_means_equal_fingerprints() {
        let a = Query::and(vec![
            Query::eq("status", "active"),
            Query::lte("price", 800),
        ]);
        let b = Query::and(vec![
            Query::eq("status", "active"),
            Query::lte("price", 800),
        ]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn different_shapes_fingerprint_differently() {
        let base = Query::eq("status", "active");
        assert_ne!(base.fingerprint(), Query::ne("status", "active").fingerprint());
        assert_ne!(
            base.fingerprint(),
            Query::eq("status", "inactive").fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            Query::eq("state", "active").fingerprint()
        );
        assert_ne!(
            Query::and(vec![base.clone()]).fingerprint(),
            Query::or(vec![base.clone()]).fingerprint()
        );
        assert_ne!(base.fingerprint(), base.clone().negate().fingerprint());
    }

    #[test]
    fn attribute_and_value_boundaries_do_not_bleed() {
        // "ab" + "c" must not hash like "a" + "bc".
        let a = Query::eq("ab", "c");
        let b = Query::eq("a", "bc");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn text_queries_distinguish_kinds() {
        let m = Query::matches("body", "rust");
        let p = Query::match_phrase("body", "rust", 0);
        let x = Query::match_prefix("body", "rust", None);
        assert_ne!(m.fingerprint(), p.fingerprint());
        assert_ne!(m.fingerprint(), x.fingerprint());
        assert_ne!(p.fingerprint(), x.fingerprint());
    }

    #[test]
    fn in_list_order_is_structural() {
        let a = Query::is_in("id", vec![Value::Int(1), Value::Int(2)]);
        let b = Query::is_in("id", vec![Value::Int(2), Value::Int(1)]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
