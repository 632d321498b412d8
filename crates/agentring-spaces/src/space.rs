use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value, json};

use crate::error::{Result, SpaceError, index_path, key_path};
use crate::numeric::{
    collect_shaped, element_count, float_from_json, float_to_json, int_from_json, nest,
    type_name,
};
use crate::value::SpaceValue;

pub const DEFAULT_BOX_DTYPE: &str = "float32";

/// Structural type of an action or observation.
///
/// Descriptors are immutable once built, either by a local environment or by
/// parsing the JSON schema a remote server advertises.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    Box(BoxSpace),
    Discrete { n: i64, start: i64 },
    MultiBinary { shape: Vec<usize> },
    MultiDiscrete { nvec: Vec<i64>, shape: Vec<usize> },
    Tuple(Vec<Space>),
    Dict(BTreeMap<String, Space>),
}

/// Bounded box in R^n. Bounds are stored row-major, one entry per element.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
    pub shape: Vec<usize>,
    pub dtype: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceKind {
    Box,
    Discrete,
    MultiBinary,
    MultiDiscrete,
    Tuple,
    Dict,
}

impl SpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceKind::Box => "Box",
            SpaceKind::Discrete => "Discrete",
            SpaceKind::MultiBinary => "MultiBinary",
            SpaceKind::MultiDiscrete => "MultiDiscrete",
            SpaceKind::Tuple => "Tuple",
            SpaceKind::Dict => "Dict",
        }
    }
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BoxSpace {
    /// Box with explicit per-element bounds. `low` and `high` must each hold
    /// `shape.iter().product()` elements.
    pub fn new(low: Vec<f64>, high: Vec<f64>, shape: Vec<usize>) -> Self {
        Self {
            low,
            high,
            shape,
            dtype: DEFAULT_BOX_DTYPE.to_string(),
        }
    }

    /// Box whose every element shares the same bounds.
    pub fn uniform(low: f64, high: f64, shape: Vec<usize>) -> Self {
        let count = element_count(&shape);
        Self::new(vec![low; count], vec![high; count], shape)
    }

    pub fn with_dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = dtype.into();
        self
    }

    pub fn element_count(&self) -> usize {
        element_count(&self.shape)
    }
}

impl Space {
    pub fn discrete(n: i64) -> Self {
        Space::Discrete { n, start: 0 }
    }

    pub fn multi_binary(n: usize) -> Self {
        Space::MultiBinary { shape: vec![n] }
    }

    pub fn multi_discrete(nvec: Vec<i64>) -> Self {
        let shape = vec![nvec.len()];
        Space::MultiDiscrete { nvec, shape }
    }

    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Space)>) -> Self {
        Space::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn kind(&self) -> SpaceKind {
        match self {
            Space::Box(_) => SpaceKind::Box,
            Space::Discrete { .. } => SpaceKind::Discrete,
            Space::MultiBinary { .. } => SpaceKind::MultiBinary,
            Space::MultiDiscrete { .. } => SpaceKind::MultiDiscrete,
            Space::Tuple(_) => SpaceKind::Tuple,
            Space::Dict(_) => SpaceKind::Dict,
        }
    }

    /// Parse the tagged JSON form a remote server advertises, e.g.
    /// `{"type": "Discrete", "n": 4}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        Self::from_json_at(value, "space")
    }

    pub fn from_json_at(value: &Value, path: &str) -> Result<Self> {
        let Value::Object(obj) = value else {
            return Err(SpaceError::invalid(
                path,
                format!("expected an object, got {}", type_name(value)),
            ));
        };
        let tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SpaceError::invalid(path, "missing string field 'type'"))?;

        let space = match tag {
            "Box" => Space::Box(parse_box(obj, path)?),
            "Discrete" => Space::Discrete {
                n: int_from_json(required(obj, "n", path)?, &key_path(path, "n"))?,
                start: match obj.get("start") {
                    Some(start) => int_from_json(start, &key_path(path, "start"))?,
                    None => 0,
                },
            },
            "MultiBinary" => Space::MultiBinary {
                shape: parse_shape(required(obj, "n", path)?, &key_path(path, "n"))?,
            },
            "MultiDiscrete" => {
                let nvec_value = required(obj, "nvec", path)?;
                let nvec_path = key_path(path, "nvec");
                let shape = infer_shape(nvec_value);
                let nvec = collect_shaped(nvec_value, &shape, &nvec_path, &int_from_json)?;
                Space::MultiDiscrete { nvec, shape }
            }
            "Tuple" => {
                let spaces_path = key_path(path, "spaces");
                let Value::Array(items) = required(obj, "spaces", path)? else {
                    return Err(SpaceError::invalid(spaces_path, "expected an array"));
                };
                Space::Tuple(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| Space::from_json_at(item, &index_path(&spaces_path, i)))
                        .collect::<Result<_>>()?,
                )
            }
            "Dict" => {
                let spaces_path = key_path(path, "spaces");
                let Value::Object(entries) = required(obj, "spaces", path)? else {
                    return Err(SpaceError::invalid(spaces_path, "expected an object"));
                };
                Space::Dict(
                    entries
                        .iter()
                        .map(|(name, item)| {
                            Space::from_json_at(item, &key_path(&spaces_path, name))
                                .map(|space| (name.clone(), space))
                        })
                        .collect::<Result<_>>()?,
                )
            }
            other => {
                return Err(SpaceError::UnsupportedSpace {
                    tag: other.to_string(),
                    path: path.to_string(),
                });
            }
        };

        space.validate_at(path)?;
        Ok(space)
    }

    /// Emit the same tagged JSON form accepted by [`Space::from_json`].
    pub fn to_json(&self) -> Value {
        match self {
            Space::Box(space) => json!({
                "type": "Box",
                "low": nest(&space.low, &space.shape, &|v| float_to_json(*v)),
                "high": nest(&space.high, &space.shape, &|v| float_to_json(*v)),
                "shape": space.shape,
                "dtype": space.dtype,
            }),
            Space::Discrete { n, start } => json!({ "type": "Discrete", "n": n, "start": start }),
            Space::MultiBinary { shape } => match shape.as_slice() {
                [n] => json!({ "type": "MultiBinary", "n": n }),
                _ => json!({ "type": "MultiBinary", "n": shape }),
            },
            Space::MultiDiscrete { nvec, shape } => json!({
                "type": "MultiDiscrete",
                "nvec": nest(nvec, shape, &|v| json!(v)),
            }),
            Space::Tuple(spaces) => json!({
                "type": "Tuple",
                "spaces": spaces.iter().map(Space::to_json).collect::<Vec<_>>(),
            }),
            Space::Dict(spaces) => json!({
                "type": "Dict",
                "spaces": spaces
                    .iter()
                    .map(|(name, space)| (name.clone(), space.to_json()))
                    .collect::<Map<_, _>>(),
            }),
        }
    }

    /// Check internal consistency of the descriptor.
    pub fn validate(&self) -> Result<()> {
        self.validate_at("space")
    }

    fn validate_at(&self, path: &str) -> Result<()> {
        match self {
            Space::Box(space) => {
                let count = space.element_count();
                if space.low.len() != count || space.high.len() != count {
                    return Err(SpaceError::invalid(
                        path,
                        format!(
                            "shape {:?} holds {count} elements but low has {} and high has {}",
                            space.shape,
                            space.low.len(),
                            space.high.len()
                        ),
                    ));
                }
                if let Some(i) = space
                    .low
                    .iter()
                    .zip(&space.high)
                    .position(|(low, high)| low > high)
                {
                    return Err(SpaceError::invalid(
                        index_path(&key_path(path, "low"), i),
                        "lower bound exceeds upper bound",
                    ));
                }
            }
            Space::Discrete { n, .. } => {
                if *n <= 0 {
                    return Err(SpaceError::invalid(key_path(path, "n"), "n must be positive"));
                }
            }
            Space::MultiBinary { .. } => {}
            Space::MultiDiscrete { nvec, shape } => {
                if nvec.len() != element_count(shape) {
                    return Err(SpaceError::invalid(
                        key_path(path, "nvec"),
                        "nvec does not match its shape",
                    ));
                }
                if let Some(i) = nvec.iter().position(|n| *n <= 0) {
                    return Err(SpaceError::invalid(
                        index_path(&key_path(path, "nvec"), i),
                        "every nvec entry must be positive",
                    ));
                }
            }
            Space::Tuple(spaces) => {
                for (i, space) in spaces.iter().enumerate() {
                    space.validate_at(&index_path(path, i))?;
                }
            }
            Space::Dict(spaces) => {
                for (name, space) in spaces {
                    space.validate_at(&key_path(path, name))?;
                }
            }
        }
        Ok(())
    }

    /// Structural conformance: kind, cardinality and integer ranges.
    /// Box bounds are not enforced so non-finite values pass through.
    pub fn check(&self, value: &SpaceValue) -> Result<()> {
        crate::codec::encode(value, self).map(|_| ())
    }

    /// Full membership test, including Box bounds.
    pub fn contains(&self, value: &SpaceValue) -> bool {
        if self.check(value).is_err() {
            return false;
        }
        match (self, value) {
            (Space::Box(space), SpaceValue::Box(data)) => data
                .iter()
                .zip(space.low.iter().zip(&space.high))
                .all(|(v, (low, high))| v >= low && v <= high),
            (Space::Tuple(spaces), SpaceValue::Tuple(values)) => spaces
                .iter()
                .zip(values)
                .all(|(space, value)| space.contains(value)),
            (Space::Dict(spaces), SpaceValue::Dict(values)) => spaces
                .iter()
                .all(|(name, space)| values.get(name).is_some_and(|v| space.contains(v))),
            _ => true,
        }
    }
}

fn required<'a>(obj: &'a Map<String, Value>, field: &str, path: &str) -> Result<&'a Value> {
    obj.get(field)
        .ok_or_else(|| SpaceError::invalid(path, format!("missing field '{field}'")))
}

fn parse_box(obj: &Map<String, Value>, path: &str) -> Result<BoxSpace> {
    let low = required(obj, "low", path)?;
    let high = required(obj, "high", path)?;
    let shape = match obj.get("shape") {
        Some(shape) => parse_shape(shape, &key_path(path, "shape"))?,
        None => infer_shape(low),
    };
    let dtype = obj
        .get("dtype")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_BOX_DTYPE)
        .to_string();

    Ok(BoxSpace {
        low: parse_bound(low, &shape, &key_path(path, "low"))?,
        high: parse_bound(high, &shape, &key_path(path, "high"))?,
        shape,
        dtype,
    })
}

/// Bounds may arrive as a scalar that applies to every element.
fn parse_bound(value: &Value, shape: &[usize], path: &str) -> Result<Vec<f64>> {
    if value.is_array() {
        collect_shaped(value, shape, path, &float_from_json)
            .map_err(|err| SpaceError::invalid(err.path(), err.to_string()))
    } else {
        Ok(vec![float_from_json(value, path)?; element_count(shape)])
    }
}

fn parse_shape(value: &Value, path: &str) -> Result<Vec<usize>> {
    let dim = |item: &Value, item_path: &str| -> Result<usize> {
        let n = int_from_json(item, item_path)?;
        usize::try_from(n)
            .map_err(|_| SpaceError::invalid(item_path, format!("negative dimension {n}")))
    };
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| dim(item, &index_path(path, i)))
            .collect(),
        scalar => Ok(vec![dim(scalar, path)?]),
    }
}

fn infer_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }
    shape
}
