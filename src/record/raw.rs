use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading keys of a turn object holding speaker utterances.
const SPEAKER_SLOTS: usize = 2;
const INFO_KEY: &str = "info";

/// An annotated dialogue, as found in the gold label files. It must be flattened with
/// [`flatten`](crate::flatten) before being scored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDocument {
    pub id: String,
    pub content: Vec<RawTurn>,
}

/// A single turn of a dialogue. The utterances are the values of the first two keys of the turn
/// object, in the order they appear in the source text. Deserializing from an already parsed map
/// that does not keep the key order (such as a `serde_json::Value` without `preserve_order`)
/// loses this information. When `info` is one of the first two keys, its slot holds an empty
/// utterance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTurn {
    pub utterances: Vec<String>,
    pub info: TurnInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnInfo {
    #[serde(default)]
    pub ents: Vec<RawEntity>,
    #[serde(default)]
    pub triples: Vec<RawTriple>,
}

/// Entity annotation of a turn. Every `pos` entry is a `[slot, start, end]` triple: the slot
/// addresses an utterance relative to the end of the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub pos: Vec<[usize; 3]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTriple {
    #[serde(rename = "ent-id")]
    pub ent_id: String,
    #[serde(rename = "ent-name")]
    pub ent_name: String,
    pub prop: String,
    pub value: String,
    pub pos: [usize; 3],
}

impl<'de> Deserialize<'de> for RawTurn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TurnVisitor)
    }
}

struct TurnVisitor;

impl<'de> Visitor<'de> for TurnVisitor {
    type Value = RawTurn;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a dialogue turn object with speaker utterances and an `info` block")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut utterances = Vec::with_capacity(SPEAKER_SLOTS);
        let mut info = None;
        let mut key_position = 0;
        while let Some(key) = map.next_key::<String>()? {
            if key == INFO_KEY {
                if info.is_some() {
                    return Err(de::Error::duplicate_field(INFO_KEY));
                }
                info = Some(map.next_value::<TurnInfo>()?);
                // A leading `info` still occupies a speaker slot, keeping slot decoding aligned.
                if key_position < SPEAKER_SLOTS {
                    utterances.push(String::new());
                }
            } else if key_position < SPEAKER_SLOTS {
                utterances.push(map.next_value::<String>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
            key_position += 1;
        }
        let info = info.ok_or_else(|| de::Error::missing_field(INFO_KEY))?;
        Ok(RawTurn { utterances, info })
    }
}
