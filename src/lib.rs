/*!
This library evaluates entity and triple extraction on dialogues. Predicted entity clusters are
aligned to the gold clusters with an optimal one-to-one assignment, then the predicted entity
mentions and triples are scored against the gold ones with precision, recall and F1.

# Terminology
* A document is one dialogue transcript: an ordered list of utterances. Only its `id` is shared
    between the predictions and the gold labels.
* An entity mention is a typed span `(utterance, start, end)` of a document. Offsets are counted
    in characters, not bytes.
* An entity cluster is the set of mentions sharing the same entity id. Predicted ids are local to
    the system that produced them and do not correspond to gold ids.
* A triple is a property-value assertion about an entity cluster, located at the span of its
    value. Triples whose entity id is `NA` are not attached to any cluster.
* Aligning a predicted document assigns every predicted cluster the id of the gold cluster it
    stands for (`assign-id`), or `None` when it has no counterpart. Triples inherit the assignment
    of their entity (`assign-ent-id`).

# Scoring
* Entities: a predicted mention is correct when a gold mention of the same document has the same
    span and type.
* Triples: a predicted triple is correct when a gold triple of the same document has the same
    value span and property, and belongs to the gold cluster its entity was aligned to.

The gold labels are stored turn by turn, with positions relative to the current turn. They are
converted to the flat representation of the predictions with [`flatten`] or [`flatten_corpus`].

# Example
```rust
use dialeval::{evaluate_raw, DocumentRecord, EntityMention, EvalConfig, RawDocument, Triple};

let gold: RawDocument = serde_json::from_str(r#"{
    "id": "d1",
    "content": [{
        "usr": "Hi, who is this?",
        "sys": "Bob here, my age is 30",
        "info": {
            "ents": [{"id": "g1", "name": "Bob", "type": "PER", "pos": [[2, 0, 3]]}],
            "triples": [{"ent-id": "g1", "ent-name": "Bob", "prop": "age", "value": "30",
                         "pos": [2, 20, 22]}]
        }
    }]
}"#).unwrap();

let prediction = DocumentRecord {
    id: String::from("d1"),
    utterances: vec![],
    entities: vec![EntityMention::new("x1", "Bob", "PER", (0, 3), 1)],
    triples: vec![Triple::new("x1", "Bob", "age", "30", (20, 22), 1)],
};

let evaluation = evaluate_raw(&[prediction], vec![gold], &EvalConfig::default()).unwrap();
assert_eq!(evaluation.entity_f1(), 1.0);
assert_eq!(evaluation.triple_f1(), 1.0);
assert_eq!(evaluation.predictions[0].triples[0].assign_ent_id.as_deref(), Some("g1"));
```
*/

mod align;
mod assignment;
mod config;
mod datastructure;
mod metrics;
mod record;
mod reporter;

// The public api starts here
pub use record::{
    flatten, flatten_corpus, DocumentRecord, EntityMention, Position, PositionOutOfRangeError,
    RawDocument, RawEntity, RawTriple, RawTurn, RecordError, SpanMismatchError, Triple, TurnInfo,
    UNATTACHED, UNMATCHED,
};

pub use assignment::{linear_sum_assignment, maximum_score_assignment, AssignmentError};

pub use align::{align, align_with_details, cost_matrix, AlignedPair, Alignment};

pub use metrics::{
    evaluate, evaluate_raw, membership_prf, score, DivByZeroStrat, Evaluation, EvaluationError,
    ParsingDivisionByZeroStrategyError, PrecisionRecallFScore, EPSILON,
};

pub use reporter::{DocumentMetrics, Metric, MetricParsingError, ReportRow, Reporter};

pub use config::{EvalConfig, EvalConfigBuilder, MissingGoldStrat, ParsingMissingGoldStrategyError};
