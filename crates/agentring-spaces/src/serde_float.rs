//! `#[serde(with = ...)]` helpers that keep non-finite `f64`s intact by using
//! the same `"NaN"`/`"Infinity"`/`"-Infinity"` tokens as the codec.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::numeric::{float_from_json, float_to_json};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    float_to_json(*value).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    float_from_json(&value, "value").map_err(D::Error::custom)
}

/// The same for `Option<f64>`; `None` stays `null`.
pub mod option {
    use super::{Deserialize, Deserializer, Serialize, Serializer, Value, float_from_json, float_to_json};
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(float_to_json).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => float_from_json(&value, "value")
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}
