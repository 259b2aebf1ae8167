//! Fingerprint construction.
//!
//! A fingerprint reduces a chosen subset of a record's attributes to a
//! fixed-length identity key. Hashing bounds the key length regardless of
//! attribute count, and the type prefix namespaces fingerprints so that
//! different entity kinds never collide even with identical attribute
//! values.

use std::fmt;

use sha1::{Digest, Sha1};

use super::attributes::AttributeMap;

/// Hex-encoded 160-bit digest identifying a logical record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a deterministic fingerprint for `type_id` from the selected
/// attributes.
///
/// `keys` names the participating attributes in exactly the order given; an
/// empty list selects every attribute in the mapping's own order. Names
/// absent from the mapping are skipped, so a partial attribute set (say,
/// only a session identifier) still produces a usable fingerprint from the
/// available fields. The result is a pure function of `type_id` and the
/// selected attribute values.
pub fn build_key(attributes: &AttributeMap, keys: &[&str], type_id: &str) -> Fingerprint {
    let mut canonical = format!("typeId={type_id};");

    if keys.is_empty() {
        for (name, value) in attributes.iter() {
            canonical.push_str(&format!("{name}={value};"));
        }
    } else {
        for name in keys {
            if let Some(value) = attributes.get(name) {
                canonical.push_str(&format!("{name}={value};"));
            }
        }
    }

    Fingerprint(hex::encode(Sha1::digest(canonical.as_bytes())))
}
