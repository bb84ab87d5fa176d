//! Maps keyed by types that are not strings, such as [`Chain`](alloy_chains::Chain).
//!
//! Keys are written with [`ToString`] and parsed back with [`FromStr`], so a chain can be keyed
//! by its name (`base`) or its id (`8453`). Keys are written in sorted order.

use alloy::primitives::map::HashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
use std::{collections::BTreeMap, fmt::Display, hash::Hash, str::FromStr};

/// Serializes a map with stringified keys.
pub fn serialize<S, K, V>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: ToString,
    V: Serialize,
    S: Serializer,
{
    let sorted: BTreeMap<String, &V> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();
    sorted.serialize(serializer)
}

/// Deserializes a map with string keys, parsing each key.
pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
where
    K: FromStr<Err: Display> + Hash + Eq,
    V: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
    let mut map = HashMap::with_capacity_and_hasher(raw.len(), Default::default());
    for (key, value) in raw {
        let parsed =
            key.parse().map_err(|err| D::Error::custom(format!("invalid key `{key}`: {err}")))?;
        if map.insert(parsed, value).is_some() {
            return Err(D::Error::custom(format!("duplicate key `{key}`")));
        }
    }
    Ok(map)
}
