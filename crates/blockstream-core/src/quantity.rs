//! JSON-RPC quantity encoding (`"0x1b4"`) for block numbers and log indices.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use thiserror::Error;

/// A string that is not a hex-encoded integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{value:?} is not a hex encoded integer")]
pub struct QuantityError {
    pub value: String,
}

/// Parse a hex-encoded quantity (with or without `0x`) to `u64`.
pub fn parse_hex_quantity(s: &str) -> Result<u64, QuantityError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|_| QuantityError {
        value: s.to_string(),
    })
}

/// Format a `u64` as a JSON-RPC quantity.
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hex quantity string or a non-negative integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative quantity {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        parse_hex_quantity(v).map_err(E::custom)
    }
}

pub(crate) fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex_quantity(*value))
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(QuantityVisitor)
}

/// `Option<u64>` flavour, for fields that providers may omit.
pub(crate) mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super")] u64);

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(v)| v))
    }
}
