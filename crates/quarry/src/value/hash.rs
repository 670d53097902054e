use super::{Value, canonical_float_bits};
use derive_more::Display;
use xxhash_rust::xxh3::Xxh3;

/// Value-digest format version byte used by the canonical encoding.
const VALUE_DIGEST_VERSION: u8 = 1;

/// Stable XXH3 seed used by canonical value hashing.
const VALUE_DIGEST_SEED: u64 = 0;

///
/// ValueDigest
///
/// Canonical 128-bit digest of a value. Structurally equal values digest
/// equal; used by query fingerprints and index diagnostics.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0:032x}")]
pub struct ValueDigest(u128);

impl ValueDigest {
    #[must_use]
    pub const fn to_u128(self) -> u128 {
        self.0
    }
}

fn feed_u8(h: &mut Xxh3, x: u8) {
    h.update(&[x]);
}

fn feed_u32(h: &mut Xxh3, x: u32) {
    h.update(&x.to_be_bytes());
}

fn feed_u64(h: &mut Xxh3, x: u64) {
    h.update(&x.to_be_bytes());
}

fn feed_i64(h: &mut Xxh3, x: i64) {
    h.update(&x.to_be_bytes());
}

fn feed_bytes(h: &mut Xxh3, b: &[u8]) {
    feed_u32(h, b.len() as u32);
    h.update(b);
}

/// Write one value into the hasher under the canonical tagged encoding.
pub(crate) fn write_value(h: &mut Xxh3, value: &Value) {
    match value {
        Value::Null => feed_u8(h, 0x00),
        Value::Bool(b) => {
            feed_u8(h, 0x01);
            feed_u8(h, u8::from(*b));
        }
        Value::Int(i) => {
            feed_u8(h, 0x02);
            feed_i64(h, *i);
        }
        Value::Uint(u) => {
            feed_u8(h, 0x03);
            feed_u64(h, *u);
        }
        Value::Float(f) => {
            feed_u8(h, 0x04);
            feed_u64(h, canonical_float_bits(*f));
        }
        Value::Text(s) => {
            feed_u8(h, 0x05);
            feed_bytes(h, s.as_bytes());
        }
        Value::Bytes(b) => {
            feed_u8(h, 0x06);
            feed_bytes(h, b);
        }
        Value::List(items) => {
            feed_u8(h, 0x07);
            feed_u32(h, items.len() as u32);
            for item in items {
                write_value(h, item);
            }
        }
    }
}

pub(super) fn digest(value: &Value) -> ValueDigest {
    let mut hasher = Xxh3::with_seed(VALUE_DIGEST_SEED);
    feed_u8(&mut hasher, VALUE_DIGEST_VERSION);
    write_value(&mut hasher, value);

    ValueDigest(hasher.digest128())
}
