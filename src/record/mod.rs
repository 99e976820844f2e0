/*!
Flat representation of annotated dialogues. Every entity mention and every triple is tagged with
the index of the utterance it occurs in and its character offsets inside that utterance.
*/
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod raw;

pub use raw::{RawDocument, RawEntity, RawTriple, RawTurn, TurnInfo};

/// `ent-id` of the triples which are not attached to any entity cluster.
pub const UNATTACHED: &str = "NA";

/// Assigned id of a predicted cluster left out of the alignment.
pub const UNMATCHED: &str = "None";

/// Character offsets `[start, end)` inside an utterance.
pub type Position = (usize, usize);

/// Location of a span inside a document: utterance index, start and end offsets.
pub(crate) type SpanId = (usize, usize, usize);

/// A typed entity mention. Mentions sharing the same `id` inside a document form an entity
/// cluster. The `id` is only meaningful on its own side: predicted ids do not correspond to gold
/// ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMention {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub position: Position,
    pub utterance_id: usize,
    /// Gold cluster this mention's cluster was aligned to. Only set on aligned predictions.
    #[serde(rename = "assign-id", default, skip_serializing_if = "Option::is_none")]
    pub assign_id: Option<String>,
}

impl EntityMention {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        position: Position,
        utterance_id: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type: entity_type.into(),
            position,
            utterance_id,
            assign_id: None,
        }
    }

    pub(crate) fn span(&self) -> SpanId {
        (self.utterance_id, self.position.0, self.position.1)
    }
}

/// A property-value assertion about an entity cluster, located at the span of its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    #[serde(rename = "ent-id")]
    pub ent_id: String,
    #[serde(rename = "ent-name")]
    pub ent_name: String,
    pub prop: String,
    pub value: String,
    pub position: Position,
    pub utterance_id: usize,
    /// Gold cluster id of the triple's entity after alignment, [`UNATTACHED`] or [`UNMATCHED`].
    #[serde(
        rename = "assign-ent-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub assign_ent_id: Option<String>,
}

impl Triple {
    pub fn new(
        ent_id: impl Into<String>,
        ent_name: impl Into<String>,
        prop: impl Into<String>,
        value: impl Into<String>,
        position: Position,
        utterance_id: usize,
    ) -> Self {
        Self {
            ent_id: ent_id.into(),
            ent_name: ent_name.into(),
            prop: prop.into(),
            value: value.into(),
            position,
            utterance_id,
            assign_ent_id: None,
        }
    }

    pub(crate) fn span(&self) -> SpanId {
        (self.utterance_id, self.position.0, self.position.1)
    }
}

/// One dialogue transcript. The `id` is the only identifier shared between the predictions and
/// the gold labels. Predictions do not need to carry their `utterances`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utterances: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntityMention>,
    #[serde(default)]
    pub triples: Vec<Triple>,
}

impl DocumentRecord {
    /// Checks that every entity name and triple value is found at its declared position. Records
    /// without utterances cannot be checked and are accepted as is.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.utterances.is_empty() {
            return Ok(());
        }
        for entity in self.entities.iter() {
            let utterance = utterance_at(&self.id, &self.utterances, entity.utterance_id)?;
            check_span(&self.id, utterance, entity.utterance_id, entity.position, &entity.name)?;
        }
        for triple in self.triples.iter() {
            let utterance = utterance_at(&self.id, &self.utterances, triple.utterance_id)?;
            check_span(&self.id, utterance, triple.utterance_id, triple.position, &triple.value)?;
        }
        Ok(())
    }
}

/// Flattens the turns of an annotated dialogue into a [`DocumentRecord`]. A mention whose text
/// is not found at its decoded position aborts the conversion.
pub fn flatten(raw: RawDocument) -> Result<DocumentRecord, RecordError> {
    let RawDocument { id, content } = raw;
    let mut utterances: Vec<String> = Vec::with_capacity(content.len() * 2);
    let mut entities = Vec::new();
    let mut triples = Vec::new();
    for turn in content {
        utterances.extend(turn.utterances);
        for entity in turn.info.ents {
            for [slot, start, end] in entity.pos.iter().copied() {
                let utterance_id = decode_slot(&id, &utterances, slot)?;
                check_span(
                    &id,
                    &utterances[utterance_id],
                    utterance_id,
                    (start, end),
                    &entity.name,
                )?;
                entities.push(EntityMention::new(
                    entity.id.as_str(),
                    entity.name.as_str(),
                    entity.entity_type.as_str(),
                    (start, end),
                    utterance_id,
                ));
            }
        }
        for triple in turn.info.triples {
            let [slot, start, end] = triple.pos;
            let utterance_id = decode_slot(&id, &utterances, slot)?;
            check_span(
                &id,
                &utterances[utterance_id],
                utterance_id,
                (start, end),
                &triple.value,
            )?;
            triples.push(Triple::new(
                triple.ent_id,
                triple.ent_name,
                triple.prop,
                triple.value,
                (start, end),
                utterance_id,
            ));
        }
    }
    Ok(DocumentRecord {
        id,
        utterances,
        entities,
        triples,
    })
}

/// Flattens a whole gold corpus, stopping at the first invalid document.
pub fn flatten_corpus<I>(raws: I) -> Result<Vec<DocumentRecord>, RecordError>
where
    I: IntoIterator<Item = RawDocument>,
{
    raws.into_iter().map(flatten).collect()
}

/// Number of utterances a slot counts back from, once the current turn is read.
const SLOT_WINDOW: usize = 3;

/// A slot `s` addresses the utterance `len(utterances) - (3 - s)`, counted when the turn holding
/// the annotation has been read.
fn decode_slot(doc_id: &str, utterances: &[String], slot: usize) -> Result<usize, RecordError> {
    utterances
        .len()
        .checked_add(slot)
        .and_then(|n| n.checked_sub(SLOT_WINDOW))
        .filter(|index| *index < utterances.len())
        .ok_or_else(|| {
            // Widening to i128 is lossless, so the reported index is exact.
            let index = utterances.len() as i128 + slot as i128 - SLOT_WINDOW as i128;
            out_of_range(doc_id, index, utterances.len())
        })
}

fn utterance_at<'a>(
    doc_id: &str,
    utterances: &'a [String],
    index: usize,
) -> Result<&'a str, RecordError> {
    utterances
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| out_of_range(doc_id, index as i128, utterances.len()))
}

fn out_of_range(doc_id: &str, index: i128, utterances: usize) -> RecordError {
    RecordError::PositionOutOfRange(PositionOutOfRangeError {
        doc_id: doc_id.to_string(),
        utterance_id: index,
        utterances,
    })
}

fn check_span(
    doc_id: &str,
    utterance: &str,
    utterance_id: usize,
    position: Position,
    expected: &str,
) -> Result<(), RecordError> {
    let found = char_slice(utterance, position.0, position.1);
    if found == expected {
        Ok(())
    } else {
        Err(RecordError::SpanMismatch(SpanMismatchError {
            doc_id: doc_id.to_string(),
            utterance_id,
            position,
            expected: expected.to_string(),
            found: found.to_string(),
        }))
    }
}

/// Slices `text` by character offsets. Offsets past the end are clipped and an inverted range is
/// empty.
fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_offset = |n: usize| text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
    let byte_start = byte_offset(start);
    let byte_end = byte_offset(end).max(byte_start);
    &text[byte_start..byte_end]
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The text found at a position differs from the annotated name or value.
pub struct SpanMismatchError {
    pub doc_id: String,
    pub utterance_id: usize,
    pub position: Position,
    pub expected: String,
    pub found: String,
}

impl Display for SpanMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document {}: expected {:?} in utterance {} at [{}, {}), found {:?}",
            self.doc_id,
            self.expected,
            self.utterance_id,
            self.position.0,
            self.position.1,
            self.found
        )
    }
}
impl Error for SpanMismatchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A position refers to an utterance that does not exist.
pub struct PositionOutOfRangeError {
    pub doc_id: String,
    /// Decoded utterance index, negative when it falls before the first utterance.
    pub utterance_id: i128,
    pub utterances: usize,
}

impl Display for PositionOutOfRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document {}: utterance {} is out of range, only {} utterances are available",
            self.doc_id, self.utterance_id, self.utterances
        )
    }
}
impl Error for PositionOutOfRangeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Data integrity violations found while reading annotated documents. These are not recoverable.
pub enum RecordError {
    SpanMismatch(SpanMismatchError),
    PositionOutOfRange(PositionOutOfRangeError),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpanMismatch(err) => Display::fmt(err, f),
            Self::PositionOutOfRange(err) => Display::fmt(err, f),
        }
    }
}
impl Error for RecordError {}

impl From<SpanMismatchError> for RecordError {
    fn from(value: SpanMismatchError) -> Self {
        Self::SpanMismatch(value)
    }
}

impl From<PositionOutOfRangeError> for RecordError {
    fn from(value: PositionOutOfRangeError) -> Self {
        Self::PositionOutOfRange(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn turn(first: &str, second: &str, info: TurnInfo) -> RawTurn {
        RawTurn {
            utterances: vec![first.to_string(), second.to_string()],
            info,
        }
    }

    fn entity(id: &str, name: &str, pos: Vec<[usize; 3]>) -> RawEntity {
        RawEntity {
            id: id.to_string(),
            name: name.to_string(),
            entity_type: String::from("PER"),
            pos,
        }
    }

    fn triple(ent_id: &str, value: &str, pos: [usize; 3]) -> RawTriple {
        RawTriple {
            ent_id: ent_id.to_string(),
            ent_name: String::from("Bob"),
            prop: String::from("age"),
            value: value.to_string(),
            pos,
        }
    }

    #[rstest]
    #[case("Bob", 0, 3, "Bob")]
    #[case("Bob", 1, 3, "ob")]
    #[case("Bob", 2, 10, "b")]
    #[case("Bob", 2, 1, "")]
    #[case("Bob", 5, 7, "")]
    #[case("我叫小明", 2, 4, "小明")]
    fn test_char_slice(
        #[case] text: &str,
        #[case] start: usize,
        #[case] end: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(char_slice(text, start, end), expected)
    }

    #[test]
    fn test_flatten_decodes_slots() {
        let raw = RawDocument {
            id: String::from("d1"),
            content: vec![
                turn(
                    "Hi, I am Bob",
                    "Hello Bob",
                    TurnInfo {
                        ents: vec![entity("e1", "Bob", vec![[1, 9, 12], [2, 6, 9]])],
                        triples: vec![],
                    },
                ),
                turn(
                    "Bob again, I am 30",
                    "Noted",
                    TurnInfo {
                        ents: vec![entity("e1", "Bob", vec![[0, 6, 9], [1, 0, 3]])],
                        triples: vec![triple("e1", "30", [1, 16, 18])],
                    },
                ),
            ],
        };
        let doc = flatten(raw).unwrap();
        assert_eq!(doc.utterances.len(), 4);
        let located: Vec<_> = doc.entities.iter().map(|e| e.span()).collect();
        // Slot 0 of the second turn is the last utterance of the first turn.
        assert_eq!(located, vec![(0, 9, 12), (1, 6, 9), (1, 6, 9), (2, 0, 3)]);
        assert_eq!(doc.triples[0].span(), (2, 16, 18));
        assert_eq!(doc.triples[0].assign_ent_id, None);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_flatten_span_mismatch() {
        let raw = RawDocument {
            id: String::from("d1"),
            content: vec![turn(
                "Hi, I am Bob",
                "Hello",
                TurnInfo {
                    ents: vec![entity("e1", "Bob", vec![[1, 0, 3]])],
                    triples: vec![],
                },
            )],
        };
        let expected = RecordError::SpanMismatch(SpanMismatchError {
            doc_id: String::from("d1"),
            utterance_id: 0,
            position: (0, 3),
            expected: String::from("Bob"),
            found: String::from("Hi,"),
        });
        assert_eq!(flatten(raw), Err(expected));
    }

    #[test]
    fn test_flatten_triple_mismatch() {
        let raw = RawDocument {
            id: String::from("d1"),
            content: vec![turn(
                "I am 30",
                "ok",
                TurnInfo {
                    ents: vec![],
                    triples: vec![triple("NA", "31", [1, 5, 7])],
                },
            )],
        };
        assert!(matches!(flatten(raw), Err(RecordError::SpanMismatch(_))));
    }

    #[rstest]
    #[case(4)]
    #[case(3)]
    #[case(usize::MAX / 2 + 1)]
    #[case(usize::MAX - 1)]
    #[case(usize::MAX)]
    fn test_flatten_slot_out_of_range(#[case] slot: usize) {
        let raw = RawDocument {
            id: String::from("d1"),
            content: vec![turn(
                "Bob",
                "ok",
                TurnInfo {
                    ents: vec![entity("e1", "Bob", vec![[slot, 0, 3]])],
                    triples: vec![],
                },
            )],
        };
        assert!(matches!(
            flatten(raw),
            Err(RecordError::PositionOutOfRange(_))
        ));
    }

    #[test]
    fn test_huge_slot_does_not_wrap_to_earlier_utterance() {
        // With four utterances read, a wrapping `usize::MAX` slot would land on utterance 0.
        let raw = RawDocument {
            id: String::from("d1"),
            content: vec![
                turn("Bob", "ok", TurnInfo::default()),
                turn(
                    "Hi",
                    "there",
                    TurnInfo {
                        ents: vec![entity("e1", "Bob", vec![[usize::MAX, 0, 3]])],
                        triples: vec![triple("e1", "Bob", [usize::MAX, 0, 3])],
                    },
                ),
            ],
        };
        let expected = RecordError::PositionOutOfRange(PositionOutOfRangeError {
            doc_id: String::from("d1"),
            utterance_id: usize::MAX as i128 + 1,
            utterances: 4,
        });
        assert_eq!(flatten(raw), Err(expected));
    }

    #[test]
    fn test_leading_info_keeps_slots_aligned() {
        let raw: RawDocument = serde_json::from_str(
            r#"{"id": "d1", "content": [
                {"info": {}, "user": "Hi"},
                {"user": "Bob", "agent": "ok", "info": {
                    "ents": [{"id": "e1", "name": "Hi", "type": "MISC", "pos": [[0, 0, 2]]}]
                }}
            ]}"#,
        )
        .unwrap();
        let doc = flatten(raw).unwrap();
        assert_eq!(doc.utterances, vec!["", "Hi", "Bob", "ok"]);
        assert_eq!(doc.entities[0].utterance_id, 1);
    }

    #[test]
    fn test_flatten_negative_index() {
        let raw = RawDocument {
            id: String::from("d1"),
            content: vec![RawTurn {
                utterances: vec![String::from("Bob")],
                info: TurnInfo {
                    ents: vec![entity("e1", "Bob", vec![[0, 0, 3]])],
                    triples: vec![],
                },
            }],
        };
        let expected = RecordError::PositionOutOfRange(PositionOutOfRangeError {
            doc_id: String::from("d1"),
            utterance_id: -2,
            utterances: 1,
        });
        assert_eq!(flatten(raw), Err(expected));
    }

    #[test]
    fn test_validate() {
        let mut doc = DocumentRecord {
            id: String::from("d1"),
            utterances: vec![String::from("Bob is 30")],
            entities: vec![EntityMention::new("x1", "Bob", "PER", (0, 3), 0)],
            triples: vec![Triple::new("x1", "Bob", "age", "30", (7, 9), 0)],
        };
        assert!(doc.validate().is_ok());
        doc.triples[0].value = String::from("31");
        assert!(matches!(doc.validate(), Err(RecordError::SpanMismatch(_))));
        doc.triples[0].value = String::from("30");
        doc.entities[0].utterance_id = usize::MAX;
        let expected = RecordError::PositionOutOfRange(PositionOutOfRangeError {
            doc_id: String::from("d1"),
            utterance_id: usize::MAX as i128,
            utterances: 1,
        });
        assert_eq!(doc.validate(), Err(expected));
        doc.utterances.clear();
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_record_wire_names() {
        let doc: DocumentRecord = serde_json::from_str(
            r#"{"id": "d1",
                "entities": [{"id": "x1", "name": "Bob", "type": "PER", "position": [0, 3], "utterance_id": 0}],
                "triples": [{"ent-id": "x1", "ent-name": "Bob", "prop": "age", "value": "30", "position": [7, 9], "utterance_id": 0}]}"#,
        )
        .unwrap();
        assert!(doc.utterances.is_empty());
        assert_eq!(doc.entities[0].entity_type, "PER");
        assert_eq!(doc.triples[0].position, (7, 9));
        let mut aligned = doc.clone();
        aligned.triples[0].assign_ent_id = Some(String::from("e1"));
        let json = serde_json::to_string(&aligned).unwrap();
        assert!(json.contains(r#""assign-ent-id":"e1""#));
        assert!(!json.contains("assign-id\""));
        assert!(!json.contains("utterances"));
    }
}
