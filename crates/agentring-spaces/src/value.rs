use std::collections::BTreeMap;

use crate::space::SpaceKind;

/// A concrete value conforming to a [`Space`](crate::Space).
///
/// Array-valued spaces hold their elements row-major; the shape lives on the
/// descriptor. Box elements are always `f64` and integer-valued spaces always
/// `i64`, whatever dtype the environment uses internally.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceValue {
    Box(Vec<f64>),
    Discrete(i64),
    MultiBinary(Vec<i64>),
    MultiDiscrete(Vec<i64>),
    Tuple(Vec<SpaceValue>),
    Dict(BTreeMap<String, SpaceValue>),
}

impl SpaceValue {
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, SpaceValue)>) -> Self {
        SpaceValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn kind(&self) -> SpaceKind {
        match self {
            SpaceValue::Box(_) => SpaceKind::Box,
            SpaceValue::Discrete(_) => SpaceKind::Discrete,
            SpaceValue::MultiBinary(_) => SpaceKind::MultiBinary,
            SpaceValue::MultiDiscrete(_) => SpaceKind::MultiDiscrete,
            SpaceValue::Tuple(_) => SpaceKind::Tuple,
            SpaceValue::Dict(_) => SpaceKind::Dict,
        }
    }

    pub fn as_discrete(&self) -> Option<i64> {
        match self {
            SpaceValue::Discrete(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_box(&self) -> Option<&[f64]> {
        match self {
            SpaceValue::Box(data) => Some(data),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&SpaceValue> {
        match self {
            SpaceValue::Dict(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Structural equality that treats `NaN` elements as equal to each other.
    pub fn same_as(&self, other: &SpaceValue) -> bool {
        match (self, other) {
            (SpaceValue::Box(a), SpaceValue::Box(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
            }
            (SpaceValue::Tuple(a), SpaceValue::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (SpaceValue::Dict(a), SpaceValue::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.same_as(other)))
            }
            (a, b) => a == b,
        }
    }
}

impl From<i64> for SpaceValue {
    fn from(n: i64) -> Self {
        SpaceValue::Discrete(n)
    }
}

impl From<Vec<f64>> for SpaceValue {
    fn from(data: Vec<f64>) -> Self {
        SpaceValue::Box(data)
    }
}
