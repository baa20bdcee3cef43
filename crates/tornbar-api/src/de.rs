// Lenient deserializers shared by the wire types.
//
// The Torn API drops fields, sends null, and occasionally negative counters
// depending on which selections were requested. None of that should fail a
// whole response.
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Whatever numeric shape a counter arrives in. Unsigned first so values
/// above `i64::MAX` survive.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireCounter {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl WireCounter {
    fn clamped(self) -> u64 {
        match self {
            WireCounter::Unsigned(value) => value,
            WireCounter::Signed(value) => value.max(0) as u64,
            // `as` saturates and maps NaN to 0
            WireCounter::Float(value) => value.max(0.0) as u64,
        }
    }
}

/// Counter that defaults to 0 when missing or null and clamps negatives to 0
pub(crate) fn counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<WireCounter>::deserialize(deserializer)?;
    Ok(value.map(WireCounter::clamped).unwrap_or(0))
}

/// Optional counter, negatives clamp to 0
pub(crate) fn opt_counter<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<WireCounter>::deserialize(deserializer)?;
    Ok(value.map(WireCounter::clamped))
}

/// Id-keyed collections come back as an object in the current API and as a
/// plain array from older endpoints (and whenever PHP serializes an empty
/// map). Object first, array second; array entries are keyed by position.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyedShape<T> {
    Map(BTreeMap<String, T>),
    List(Vec<T>),
}

pub(crate) fn keyed<'de, D, T>(deserializer: D) -> Result<Option<BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let shape = Option::<KeyedShape<T>>::deserialize(deserializer)?;
    Ok(shape.map(|shape| match shape {
        KeyedShape::Map(map) => map,
        KeyedShape::List(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
    }))
}

pub(crate) fn is_zero(value: &u64) -> bool {
    *value == 0
}
