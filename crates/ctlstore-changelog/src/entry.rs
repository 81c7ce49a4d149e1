use serde::{Deserialize, Serialize};

/// One key field's value as it appears in a changelog entry (spec.md 4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: serde_json::Value,
}

/// The changelog wire form (spec.md 3): one line per primary-key tuple
/// affected by a change. `seq` round-trips bit-exact through `serde_json`
/// because it is carried as a native JSON integer literal, never passed
/// through a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub seq: i64,
    pub family: String,
    pub table: String,
    pub key: Vec<KeyValue>,
}

/// A changelog entry as delivered to a tail consumer (identical payload to
/// [`ChangelogEntry`]; named separately because spec.md 4.10 calls it an
/// `Event` in the consumer-facing API).
pub type Event = ChangelogEntry;
