//! Misc Serde helpers for node payloads.
//!
//! Tezos RPC encodes amounts, fees and limits as decimal strings, while dApps frequently send
//! plain JSON numbers. The helpers here accept both.

use serde::{Deserialize, Deserializer, Serializer, de};
use std::{fmt::Display, str::FromStr};

/// Helper type to parse a number encoded either as a JSON number or a decimal string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum StringOrNumber<T> {
    /// A JSON number.
    Num(T),
    /// A decimal string.
    Str(String),
}

impl<T> StringOrNumber<T>
where
    T: FromStr,
    T::Err: Display,
{
    /// Converts into the numeric value.
    pub fn into_value<E: de::Error>(self) -> Result<T, E> {
        match self {
            Self::Num(num) => Ok(num),
            Self::Str(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

/// (De)serializes a `u64` as a decimal string, accepting numbers on input.
pub mod string_u64 {
    use super::*;

    /// Deserializes a `u64` from a decimal string or a number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        StringOrNumber::<u64>::deserialize(deserializer)?.into_value()
    }

    /// Serializes a `u64` as a decimal string.
    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }
}

/// (De)serializes an `Option<u64>` as an optional decimal string, accepting numbers on input.
pub mod string_u64_opt {
    use super::*;

    /// Deserializes an optional `u64` from a decimal string or a number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<StringOrNumber<u64>>::deserialize(deserializer)? {
            Some(value) => value.into_value().map(Some),
            None => Ok(None),
        }
    }

    /// Serializes an optional `u64` as an optional decimal string.
    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.collect_str(value),
            None => serializer.serialize_none(),
        }
    }
}

/// (De)serializes an `i64` as a decimal string, accepting numbers on input.
pub mod string_i64 {
    use super::*;

    /// Deserializes an `i64` from a decimal string or a number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        StringOrNumber::<i64>::deserialize(deserializer)?.into_value()
    }

    /// Serializes an `i64` as a decimal string.
    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }
}
