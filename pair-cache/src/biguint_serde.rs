//! Decimal-string (de)serialization for [`num_bigint::BigUint`], the same shape as
//! `rust_decimal`'s `serde-with-str` feature: on the wire a big integer is always a
//! decimal string, never a JSON number, so no precision is lost crossing the
//! serde_json boundary.

use std::str::FromStr;

use num_bigint::BigUint;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    BigUint::from_str(&raw).map_err(|err| D::Error::custom(format!("invalid BigUint `{raw}`: {err}")))
}
