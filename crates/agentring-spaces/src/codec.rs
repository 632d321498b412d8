//! Lossless conversion between [`SpaceValue`]s and their JSON transport form.
//!
//! Both directions are driven by the descriptor, never by inspecting the
//! value alone: Dict entries are looked up by name, Tuple entries by position,
//! and array lengths are checked against the descriptor's shape.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Result, SpaceError, index_path, key_path};
use crate::numeric::{
    bit_from_json, collect_shaped, element_count, float_from_json, float_to_json, int_from_json,
    nest, type_name,
};
use crate::space::Space;
use crate::value::SpaceValue;

const ROOT: &str = "value";

pub fn encode(value: &SpaceValue, space: &Space) -> Result<Value> {
    encode_at(value, space, ROOT)
}

pub fn decode(transport: &Value, space: &Space) -> Result<SpaceValue> {
    decode_at(transport, space, ROOT)
}

/// Encode with error paths rooted at `root`, e.g. `"action"`.
pub fn encode_at(value: &SpaceValue, space: &Space, root: &str) -> Result<Value> {
    match (space, value) {
        (Space::Box(space), SpaceValue::Box(data)) => {
            expect_len(data.len(), space.element_count(), &space.shape, root)?;
            Ok(nest(data, &space.shape, &|v| float_to_json(*v)))
        }
        (Space::Discrete { n, start }, SpaceValue::Discrete(v)) => {
            check_discrete(*v, *n, *start, root)?;
            Ok(Value::from(*v))
        }
        (Space::MultiBinary { shape }, SpaceValue::MultiBinary(data)) => {
            expect_len(data.len(), element_count(shape), shape, root)?;
            for (i, bit) in data.iter().enumerate() {
                check_binary(*bit, &index_path(root, i))?;
            }
            Ok(nest(data, shape, &|v| Value::from(*v)))
        }
        (Space::MultiDiscrete { nvec, shape }, SpaceValue::MultiDiscrete(data)) => {
            expect_len(data.len(), nvec.len(), shape, root)?;
            for (i, (v, n)) in data.iter().zip(nvec).enumerate() {
                check_discrete(*v, *n, 0, &index_path(root, i))?;
            }
            Ok(nest(data, shape, &|v| Value::from(*v)))
        }
        (Space::Tuple(spaces), SpaceValue::Tuple(values)) => {
            if spaces.len() != values.len() {
                return Err(SpaceError::mismatch(
                    root,
                    format!(
                        "tuple has {} components but the space declares {}",
                        values.len(),
                        spaces.len()
                    ),
                ));
            }
            spaces
                .iter()
                .zip(values)
                .enumerate()
                .map(|(i, (space, value))| encode_at(value, space, &index_path(root, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        (Space::Dict(spaces), SpaceValue::Dict(values)) => {
            check_keys(spaces.keys(), values.keys(), root, |k| spaces.contains_key(k), |k| {
                values.contains_key(k)
            })?;
            let mut out = Map::with_capacity(spaces.len());
            for (name, space) in spaces {
                let path = key_path(root, name);
                let value = values
                    .get(name)
                    .ok_or_else(|| SpaceError::mismatch(&path, "missing key"))?;
                out.insert(name.clone(), encode_at(value, space, &path)?);
            }
            Ok(Value::Object(out))
        }
        (space, value) => Err(SpaceError::mismatch(
            root,
            format!("expected a {} value, got {}", space.kind(), value.kind()),
        )),
    }
}

/// Decode with error paths rooted at `root`, e.g. `"observation"`.
pub fn decode_at(transport: &Value, space: &Space, root: &str) -> Result<SpaceValue> {
    match space {
        Space::Box(space) => {
            collect_shaped(transport, &space.shape, root, &float_from_json).map(SpaceValue::Box)
        }
        Space::Discrete { n, start } => {
            let v = int_from_json(transport, root)?;
            check_discrete(v, *n, *start, root)?;
            Ok(SpaceValue::Discrete(v))
        }
        Space::MultiBinary { shape } => {
            let data = collect_shaped(transport, shape, root, &bit_from_json)?;
            for (i, bit) in data.iter().enumerate() {
                check_binary(*bit, &index_path(root, i))?;
            }
            Ok(SpaceValue::MultiBinary(data))
        }
        Space::MultiDiscrete { nvec, shape } => {
            let data = collect_shaped(transport, shape, root, &int_from_json)?;
            for (i, (v, n)) in data.iter().zip(nvec).enumerate() {
                check_discrete(*v, *n, 0, &index_path(root, i))?;
            }
            Ok(SpaceValue::MultiDiscrete(data))
        }
        Space::Tuple(spaces) => {
            let Value::Array(items) = transport else {
                return Err(SpaceError::mismatch(
                    root,
                    format!("expected an array for a Tuple, got {}", type_name(transport)),
                ));
            };
            if items.len() != spaces.len() {
                return Err(SpaceError::mismatch(
                    root,
                    format!(
                        "tuple has {} components but the space declares {}",
                        items.len(),
                        spaces.len()
                    ),
                ));
            }
            spaces
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (space, item))| decode_at(item, space, &index_path(root, i)))
                .collect::<Result<Vec<_>>>()
                .map(SpaceValue::Tuple)
        }
        Space::Dict(spaces) => {
            let Value::Object(entries) = transport else {
                return Err(SpaceError::mismatch(
                    root,
                    format!("expected an object for a Dict, got {}", type_name(transport)),
                ));
            };
            check_keys(spaces.keys(), entries.keys(), root, |k| spaces.contains_key(k), |k| {
                entries.contains_key(k)
            })?;
            let mut out = BTreeMap::new();
            for (name, space) in spaces {
                let path = key_path(root, name);
                let item = entries
                    .get(name)
                    .ok_or_else(|| SpaceError::mismatch(&path, "missing key"))?;
                out.insert(name.clone(), decode_at(item, space, &path)?);
            }
            Ok(SpaceValue::Dict(out))
        }
    }
}

fn expect_len(actual: usize, expected: usize, shape: &[usize], path: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(SpaceError::mismatch(
            path,
            format!("expected {expected} elements for shape {shape:?}, got {actual}"),
        ))
    }
}

fn check_discrete(v: i64, n: i64, start: i64, path: &str) -> Result<()> {
    if v >= start && v < start.saturating_add(n) {
        Ok(())
    } else {
        Err(SpaceError::mismatch(
            path,
            format!("{v} is outside [{start}, {})", start.saturating_add(n)),
        ))
    }
}

fn check_binary(bit: i64, path: &str) -> Result<()> {
    if bit == 0 || bit == 1 {
        Ok(())
    } else {
        Err(SpaceError::mismatch(path, format!("{bit} is not 0 or 1")))
    }
}

fn check_keys<'a>(
    declared: impl Iterator<Item = &'a String>,
    supplied: impl Iterator<Item = &'a String>,
    path: &str,
    is_declared: impl Fn(&str) -> bool,
    is_supplied: impl Fn(&str) -> bool,
) -> Result<()> {
    let missing: Vec<&str> = declared
        .map(String::as_str)
        .filter(|k| !is_supplied(k))
        .collect();
    if let Some(first) = missing.first() {
        return Err(SpaceError::mismatch(
            key_path(path, first),
            format!("missing key (missing: {})", missing.join(", ")),
        ));
    }
    let extra: Vec<&str> = supplied
        .map(String::as_str)
        .filter(|k| !is_declared(k))
        .collect();
    if let Some(first) = extra.first() {
        return Err(SpaceError::mismatch(
            key_path(path, first),
            format!("unexpected key (extra: {})", extra.join(", ")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::BoxSpace;
    use proptest::prelude::*;
    use serde_json::json;

    fn position_velocity() -> Space {
        Space::dict([
            ("position", Space::discrete(4)),
            ("velocity", Space::Box(BoxSpace::new(vec![0.0], vec![1.0], vec![1]))),
        ])
    }

    #[test]
    fn box_value_round_trips_unchanged() {
        let space = Space::Box(BoxSpace::new(vec![-1.0, -1.0], vec![1.0, 1.0], vec![2]));
        let value = SpaceValue::Box(vec![0.5, -0.5]);

        let encoded = encode(&value, &space).unwrap();
        assert_eq!(encoded, json!([0.5, -0.5]));
        assert_eq!(decode(&encoded, &space).unwrap(), value);
    }

    #[test]
    fn dict_value_round_trips_exactly() {
        let space = position_velocity();
        let value = SpaceValue::dict([
            ("position", SpaceValue::Discrete(2)),
            ("velocity", SpaceValue::Box(vec![0.3])),
        ]);

        let encoded = encode(&value, &space).unwrap();
        assert_eq!(encoded, json!({"position": 2, "velocity": [0.3]}));
        assert_eq!(decode(&encoded, &space).unwrap(), value);
    }

    #[test]
    fn dict_missing_key_is_a_schema_mismatch_naming_the_key() {
        let space = position_velocity();

        let err = decode(&json!({"position": 2}), &space).unwrap_err();
        assert!(matches!(err, SpaceError::SchemaMismatch { .. }));
        assert_eq!(err.path(), "value.velocity");

        let missing = SpaceValue::dict([("position", SpaceValue::Discrete(2))]);
        let err = encode_at(&missing, &space, "action").unwrap_err();
        assert_eq!(err.path(), "action.velocity");
    }

    #[test]
    fn dict_extra_key_is_rejected() {
        let err = decode(
            &json!({"position": 1, "velocity": [0.1], "spin": 3}),
            &position_velocity(),
        )
        .unwrap_err();
        assert_eq!(err.path(), "value.spin");
    }

    #[test]
    fn dict_decoding_ignores_transport_key_order() {
        let text = r#"{"velocity": [0.25], "position": 3}"#;
        let transport: Value = serde_json::from_str(text).unwrap();
        let decoded = decode(&transport, &position_velocity()).unwrap();
        assert_eq!(decoded.get("position"), Some(&SpaceValue::Discrete(3)));
    }

    #[test]
    fn tuple_length_mismatch_is_rejected() {
        let space = Space::Tuple(vec![Space::discrete(2), Space::discrete(3)]);
        let err = decode(&json!([1]), &space).unwrap_err();
        assert!(matches!(err, SpaceError::SchemaMismatch { .. }));

        let err = encode(&SpaceValue::Tuple(vec![SpaceValue::Discrete(0)]), &space).unwrap_err();
        assert!(matches!(err, SpaceError::SchemaMismatch { .. }));
    }

    #[test]
    fn box_length_is_never_truncated_or_padded() {
        let space = Space::Box(BoxSpace::uniform(-1.0, 1.0, vec![3]));
        assert!(decode(&json!([0.1, 0.2]), &space).is_err());
        assert!(decode(&json!([0.1, 0.2, 0.3, 0.4]), &space).is_err());
        assert!(encode(&SpaceValue::Box(vec![0.1]), &space).is_err());
    }

    #[test]
    fn non_finite_box_values_pass_through() {
        let space = Space::Box(BoxSpace::uniform(-1.0, 1.0, vec![3]));
        let value = SpaceValue::Box(vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);

        let encoded = encode(&value, &space).unwrap();
        assert_eq!(encoded, json!(["NaN", "Infinity", "-Infinity"]));
        assert!(decode(&encoded, &space).unwrap().same_as(&value));
    }

    #[test]
    fn multi_dimensional_box_uses_nested_arrays() {
        let space = Space::Box(BoxSpace::uniform(0.0, 9.0, vec![2, 2]));
        let value = SpaceValue::Box(vec![1.0, 2.0, 3.0, 4.0]);

        let encoded = encode(&value, &space).unwrap();
        assert_eq!(encoded, json!([[1.0, 2.0], [3.0, 4.0]]));
        assert_eq!(decode(&encoded, &space).unwrap(), value);
        assert_eq!(decode(&json!([1.0, 2.0, 3.0, 4.0]), &space).unwrap(), value);
    }

    #[test]
    fn discrete_respects_start_offset() {
        let space = Space::Discrete { n: 3, start: 5 };
        assert_eq!(decode(&json!(7), &space).unwrap(), SpaceValue::Discrete(7));
        assert!(decode(&json!(8), &space).is_err());
        assert!(decode(&json!(4), &space).is_err());
    }

    #[test]
    fn extreme_discrete_values_are_rejected_not_wrapped() {
        let space = Space::Discrete { n: 4, start: -1 };
        for v in [i64::MAX, i64::MIN, 3] {
            let err = decode(&json!(v), &space).unwrap_err();
            assert!(matches!(err, SpaceError::SchemaMismatch { .. }));
            assert!(encode(&SpaceValue::Discrete(v), &space).is_err());
        }
        assert_eq!(decode(&json!(2), &space).unwrap(), SpaceValue::Discrete(2));
        assert!(decode(&json!(true), &space).is_err());

        let wide = Space::Discrete { n: i64::MAX, start: -5 };
        assert!(decode(&json!(i64::MAX), &wide).is_err());
        assert!(decode(&json!(i64::MAX - 6), &wide).is_ok());

        let multi = Space::multi_discrete(vec![3, 3]);
        let err = decode(&json!([0, i64::MAX]), &multi).unwrap_err();
        assert_eq!(err.path(), "value[1]");
    }

    #[test]
    fn multi_binary_accepts_boolean_arrays() {
        let decoded = decode(&json!([true, false, true]), &Space::multi_binary(3)).unwrap();
        assert_eq!(decoded, SpaceValue::MultiBinary(vec![1, 0, 1]));
    }

    #[test]
    fn kind_mismatch_names_both_kinds() {
        let err = encode(&SpaceValue::Discrete(1), &Space::multi_binary(2)).unwrap_err();
        assert!(err.to_string().contains("MultiBinary"));
        assert!(err.to_string().contains("Discrete"));
    }

    #[test]
    fn nested_error_paths_point_at_the_leaf() {
        let space = Space::dict([(
            "sensors",
            Space::Tuple(vec![Space::discrete(2), Space::multi_binary(2)]),
        )]);
        let err = decode(&json!({"sensors": [1, [0, 2]]}), &space).unwrap_err();
        assert_eq!(err.path(), "value.sensors[1][1]");
    }

    fn arb_space() -> impl Strategy<Value = Space> {
        let leaf = prop_oneof![
            (1usize..4, 1usize..3).prop_map(|(a, b)| Space::Box(BoxSpace::uniform(
                -10.0,
                10.0,
                vec![a, b]
            ))),
            (1i64..6, -3i64..3).prop_map(|(n, start)| Space::Discrete { n, start }),
            (1usize..5).prop_map(Space::multi_binary),
            prop::collection::vec(1i64..5, 1..4).prop_map(Space::multi_discrete),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(Space::Tuple),
                prop::collection::btree_map("[a-z]{1,6}", inner, 1..4).prop_map(Space::Dict),
            ]
        })
    }

    fn arb_value(space: &Space) -> BoxedStrategy<SpaceValue> {
        match space {
            Space::Box(space) => {
                prop::collection::vec(-10.0f64..10.0, space.element_count())
                    .prop_map(SpaceValue::Box)
                    .boxed()
            }
            Space::Discrete { n, start } => {
                (*start..*start + *n).prop_map(SpaceValue::Discrete).boxed()
            }
            Space::MultiBinary { shape } => {
                prop::collection::vec(0i64..2, element_count(shape))
                    .prop_map(SpaceValue::MultiBinary)
                    .boxed()
            }
            Space::MultiDiscrete { nvec, .. } => nvec
                .iter()
                .map(|n| 0..*n)
                .collect::<Vec<_>>()
                .prop_map(SpaceValue::MultiDiscrete)
                .boxed(),
            Space::Tuple(spaces) => spaces
                .iter()
                .map(arb_value)
                .collect::<Vec<_>>()
                .prop_map(SpaceValue::Tuple)
                .boxed(),
            Space::Dict(spaces) => {
                let names: Vec<String> = spaces.keys().cloned().collect();
                spaces
                    .values()
                    .map(arb_value)
                    .collect::<Vec<_>>()
                    .prop_map(move |values| {
                        SpaceValue::Dict(names.iter().cloned().zip(values).collect())
                    })
                    .boxed()
            }
        }
    }

    fn arb_pair() -> impl Strategy<Value = (Space, SpaceValue)> {
        arb_space().prop_flat_map(|space| {
            let value = arb_value(&space);
            (Just(space), value)
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode((space, value) in arb_pair()) {
            let encoded = encode(&value, &space).unwrap();
            let decoded = decode(&encoded, &space).unwrap();
            prop_assert_eq!(&decoded, &value);
            prop_assert_eq!(encode(&decoded, &space).unwrap(), encoded);
        }
    }
}
