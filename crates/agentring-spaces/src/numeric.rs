//! Scalar and array helpers shared by descriptor parsing and the codec.
//!
//! JSON has no representation for non-finite floats, so `NaN` and the
//! infinities travel as the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
//! `null` decodes to `NaN`, which is what most JSON encoders emit for it.

use serde_json::{Number, Value};

use crate::error::{Result, SpaceError, index_path};

pub(crate) const NAN_TOKEN: &str = "NaN";
pub(crate) const POS_INF_TOKEN: &str = "Infinity";
pub(crate) const NEG_INF_TOKEN: &str = "-Infinity";

pub(crate) fn float_to_json(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None if value.is_nan() => Value::String(NAN_TOKEN.to_string()),
        None if value.is_sign_positive() => Value::String(POS_INF_TOKEN.to_string()),
        None => Value::String(NEG_INF_TOKEN.to_string()),
    }
}

pub(crate) fn float_from_json(value: &Value, path: &str) -> Result<f64> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| SpaceError::mismatch(path, format!("{number} is not representable as f64"))),
        Value::Null => Ok(f64::NAN),
        Value::String(token) => match token.as_str() {
            "NaN" | "nan" => Ok(f64::NAN),
            "Infinity" | "inf" | "+inf" | "+Infinity" => Ok(f64::INFINITY),
            "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
            other => Err(SpaceError::mismatch(
                path,
                format!("expected a number, got string '{other}'"),
            )),
        },
        other => Err(SpaceError::mismatch(
            path,
            format!("expected a number, got {}", type_name(other)),
        )),
    }
}

/// Integral numbers only. Booleans are rejected; see [`bit_from_json`].
pub(crate) fn int_from_json(value: &Value, path: &str) -> Result<i64> {
    if let Some(int) = value.as_i64() {
        return Ok(int);
    }
    if let Some(float) = value.as_f64()
        && float.fract() == 0.0
        && float >= i64::MIN as f64
        && float <= i64::MAX as f64
    {
        return Ok(float as i64);
    }
    Err(SpaceError::mismatch(
        path,
        format!("expected an integer, got {}", describe(value)),
    ))
}

/// MultiBinary elements. Servers that serialize boolean arrays send
/// `true`/`false`, which decode as 1/0.
pub(crate) fn bit_from_json(value: &Value, path: &str) -> Result<i64> {
    match value {
        Value::Bool(flag) => Ok(i64::from(*flag)),
        other => int_from_json(other, path),
    }
}

pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Lay a row-major buffer out as nested arrays following `shape`.
///
/// The caller guarantees `data.len() == element_count(shape)`.
pub(crate) fn nest<T>(data: &[T], shape: &[usize], leaf: &dyn Fn(&T) -> Value) -> Value {
    match shape.split_first() {
        None => data.first().map_or(Value::Null, leaf),
        Some((&len, rest)) => {
            let stride = element_count(rest);
            Value::Array(
                (0..len)
                    .map(|i| {
                        let start = i * stride;
                        let chunk = data.get(start..start + stride).unwrap_or(&[]);
                        nest(chunk, rest, leaf)
                    })
                    .collect(),
            )
        }
    }
}

/// Collect a transport array into a row-major buffer of exactly
/// `element_count(shape)` elements.
///
/// A flat array of scalars is accepted for any shape with the right element
/// count; nested input must match `shape` dimension by dimension.
pub(crate) fn collect_shaped<T>(
    value: &Value,
    shape: &[usize],
    path: &str,
    leaf: &dyn Fn(&Value, &str) -> Result<T>,
) -> Result<Vec<T>> {
    let expected = element_count(shape);

    if shape.is_empty() && !value.is_array() {
        return Ok(vec![leaf(value, path)?]);
    }

    let Value::Array(items) = value else {
        return Err(SpaceError::mismatch(
            path,
            format!("expected an array of shape {shape:?}, got {}", describe(value)),
        ));
    };

    if items.iter().all(|item| !item.is_array()) {
        if items.len() != expected {
            return Err(SpaceError::mismatch(
                path,
                format!(
                    "expected {expected} elements for shape {shape:?}, got {}",
                    items.len()
                ),
            ));
        }
        return items
            .iter()
            .enumerate()
            .map(|(i, item)| leaf(item, &index_path(path, i)))
            .collect();
    }

    let mut out = Vec::with_capacity(expected);
    collect_nested(value, shape, path, leaf, &mut out)?;
    Ok(out)
}

fn collect_nested<T>(
    value: &Value,
    shape: &[usize],
    path: &str,
    leaf: &dyn Fn(&Value, &str) -> Result<T>,
    out: &mut Vec<T>,
) -> Result<()> {
    let Some((&len, rest)) = shape.split_first() else {
        out.push(leaf(value, path)?);
        return Ok(());
    };

    let Value::Array(items) = value else {
        return Err(SpaceError::mismatch(
            path,
            format!("expected an array of length {len}, got {}", describe(value)),
        ));
    };
    if items.len() != len {
        return Err(SpaceError::mismatch(
            path,
            format!("expected an array of length {len}, got {}", items.len()),
        ));
    }
    for (i, item) in items.iter().enumerate() {
        collect_nested(item, rest, &index_path(path, i), leaf, out)?;
    }
    Ok(())
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(number) => format!("the number {number}"),
        Value::String(text) => format!("the string '{text}'"),
        other => type_name(other).to_string(),
    }
}
