/**
This module computes the precision, recall and fscore of predicted entities and triples against
the gold labels of a whole corpus. Predicted documents are first aligned to their gold
counterparts (see the `align` module), then every entity and every triple of the corpus is
flattened into a single collection of identifiers per side.
*/
use crate::align::align;
use crate::assignment::AssignmentError;
use crate::config::{EvalConfig, MissingGoldStrat};
use crate::record::{flatten_corpus, DocumentRecord, RawDocument, RecordError};
use crate::reporter::{DocumentMetrics, Reporter};
use ahash::{AHashMap, AHashSet};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{self, Debug, Display},
    hash::Hash,
    str::FromStr,
};

/// Value added to every denominator by [`DivByZeroStrat::Epsilon`].
pub const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
/// How do we handle empty denominators when computing precision, recall and fscore? Both
/// strategies return 0 instead of failing.
pub enum DivByZeroStrat {
    /// Returns 0 when the denominator is 0. Other ratios are exact, so that identical collections
    /// score exactly 1.
    #[default]
    ReplaceBy0,
    /// Adds [`EPSILON`] to every denominator.
    Epsilon,
}

impl DivByZeroStrat {
    fn divide(self, numerator: f64, denominator: f64) -> f64 {
        match self {
            Self::ReplaceBy0 if denominator == 0.0 => 0.0,
            Self::ReplaceBy0 => numerator / denominator,
            Self::Epsilon => numerator / (denominator + EPSILON),
        }
    }
}

#[derive(Debug)]
pub struct ParsingDivisionByZeroStrategyError<S: Debug + Display>(S);

impl<S: Debug + Display> Display for ParsingDivisionByZeroStrategyError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse the {} into a `DivByZeroStrat`", self.0)
    }
}
impl<S: Debug + Display> Error for ParsingDivisionByZeroStrategyError<S> {}

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby0" | "replacebyzero" | "zero" => Ok(DivByZeroStrat::ReplaceBy0),
            "epsilon" | "eps" => Ok(DivByZeroStrat::Epsilon),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// Precision, recall and fscore of a predicted collection, with the counts they were computed
/// from.
pub struct PrecisionRecallFScore {
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
    /// Number of predicted elements.
    pub predicted: usize,
    /// Number of gold elements, i.e. the support.
    pub gold: usize,
    /// Number of predicted elements found among the gold elements.
    pub true_positive: usize,
}

impl PrecisionRecallFScore {
    pub fn from_counts(
        true_positive: usize,
        predicted: usize,
        gold: usize,
        zero_division: DivByZeroStrat,
    ) -> Self {
        let precision = zero_division.divide(true_positive as f64, predicted as f64);
        let recall = zero_division.divide(true_positive as f64, gold as f64);
        let fscore = zero_division.divide(2.0 * precision * recall, precision + recall);
        Self {
            precision,
            recall,
            fscore,
            predicted,
            gold,
            true_positive,
        }
    }
}

/// Computes the precision, recall and fscore of `predicted` against `gold`. Both sides are
/// multisets: every predicted element is a true positive when an equal element is found in
/// `gold`, whatever the number of times it was already matched.
pub fn membership_prf<T, P, G>(
    predicted: P,
    gold: G,
    zero_division: DivByZeroStrat,
) -> PrecisionRecallFScore
where
    T: Hash + Eq,
    P: IntoIterator<Item = T>,
    G: IntoIterator<Item = T>,
{
    let mut gold_count = 0;
    let mut gold_set = AHashSet::new();
    for element in gold {
        gold_count += 1;
        gold_set.insert(element);
    }
    let mut predicted_count = 0;
    let mut true_positive = 0;
    for element in predicted {
        predicted_count += 1;
        if gold_set.contains(&element) {
            true_positive += 1;
        }
    }
    PrecisionRecallFScore::from_counts(true_positive, predicted_count, gold_count, zero_division)
}

/// Document id, utterance index, start, end and type of an entity mention.
type EntityKey<'a> = (&'a str, usize, usize, usize, &'a str);
/// Document id, entity cluster id, utterance index, start, end and property of a triple.
type TripleKey<'a> = (&'a str, &'a str, usize, usize, usize, &'a str);

fn entity_keys(doc: &DocumentRecord) -> impl Iterator<Item = EntityKey<'_>> {
    doc.entities.iter().map(move |e| {
        (
            doc.id.as_str(),
            e.utterance_id,
            e.position.0,
            e.position.1,
            e.entity_type.as_str(),
        )
    })
}

/// Only the triples that went through the alignment have a key.
fn predicted_triple_keys(doc: &DocumentRecord) -> impl Iterator<Item = TripleKey<'_>> {
    doc.triples.iter().filter_map(move |t| {
        t.assign_ent_id.as_deref().map(|assigned| {
            (
                doc.id.as_str(),
                assigned,
                t.utterance_id,
                t.position.0,
                t.position.1,
                t.prop.as_str(),
            )
        })
    })
}

fn gold_triple_keys(doc: &DocumentRecord) -> impl Iterator<Item = TripleKey<'_>> {
    doc.triples.iter().map(move |t| {
        (
            doc.id.as_str(),
            t.ent_id.as_str(),
            t.utterance_id,
            t.position.0,
            t.position.1,
            t.prop.as_str(),
        )
    })
}

#[derive(Debug, Clone, PartialEq)]
/// Enum error encompassing the failures that could happen while evaluating a corpus.
pub enum EvaluationError {
    /// The gold labels could not be read.
    Record(RecordError),
    Assignment(AssignmentError),
    /// No gold document has the id of this predicted document.
    MissingGold(String),
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(err) => Display::fmt(err, f),
            Self::Assignment(err) => Display::fmt(err, f),
            Self::MissingGold(id) => {
                write!(f, "The predicted document {} has no gold labels", id)
            }
        }
    }
}
impl Error for EvaluationError {}

impl From<RecordError> for EvaluationError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

impl From<AssignmentError> for EvaluationError {
    fn from(value: AssignmentError) -> Self {
        Self::Assignment(value)
    }
}

/// Result of an evaluation: the aligned predictions and their metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Predicted documents in input order. Aligned ones carry `assign-id` and `assign-ent-id`.
    pub predictions: Vec<DocumentRecord>,
    pub report: Reporter,
}

impl Evaluation {
    pub fn entity_f1(&self) -> f64 {
        self.report.entity.fscore
    }
    pub fn triple_f1(&self) -> f64 {
        self.report.triple.fscore
    }
}

/// Main entrypoint of the library. Aligns every predicted document to the gold document sharing
/// its id, then computes the corpus level entity and triple metrics, as well as a per document
/// breakdown.
///
/// * `predictions`: Predicted documents. They are not modified.
/// * `golds`: Flattened gold documents. When two of them share an id, the last one is used.
/// * `config`: Division by zero strategy, missing gold policy and parallelism.
pub fn evaluate(
    predictions: &[DocumentRecord],
    golds: &[DocumentRecord],
    config: &EvalConfig,
) -> Result<Evaluation, EvaluationError> {
    let zero_division = config.zero_division;
    let mut gold_by_id: AHashMap<&str, &DocumentRecord> = AHashMap::with_capacity(golds.len());
    for gold in golds.iter() {
        if gold_by_id.insert(gold.id.as_str(), gold).is_some() {
            debug!("Gold document {} appears more than once, keeping the last one", gold.id);
        }
    }
    let align_one = |pred: &DocumentRecord| -> Result<Option<DocumentRecord>, EvaluationError> {
        match gold_by_id.get(pred.id.as_str()) {
            Some(gold) => Ok(Some(align(pred, gold, zero_division)?)),
            None => match config.missing_gold {
                MissingGoldStrat::Skip => {
                    warn!("The id {} is not in the gold labels, skipping it", pred.id);
                    Ok(None)
                }
                MissingGoldStrat::ReturnError => Err(EvaluationError::MissingGold(pred.id.clone())),
            },
        }
    };
    // Every document is aligned before anything is aggregated.
    let outcomes: Vec<Option<DocumentRecord>> = if config.parallel {
        predictions
            .par_iter()
            .map(align_one)
            .collect::<Result<Vec<_>, EvaluationError>>()?
    } else {
        predictions
            .iter()
            .map(align_one)
            .collect::<Result<Vec<_>, EvaluationError>>()?
    };

    let mut aligned = Vec::with_capacity(predictions.len());
    let mut skipped = Vec::new();
    for (pred, outcome) in predictions.iter().zip(outcomes) {
        match outcome {
            Some(doc) => aligned.push(doc),
            None => {
                skipped.push(pred.id.clone());
                aligned.push(pred.clone());
            }
        }
    }

    let entity = membership_prf(
        aligned.iter().flat_map(entity_keys),
        golds.iter().flat_map(entity_keys),
        zero_division,
    );
    let triple = membership_prf(
        aligned.iter().flat_map(predicted_triple_keys),
        golds.iter().flat_map(gold_triple_keys),
        zero_division,
    );
    let documents = aligned
        .iter()
        .map(|pred| document_metrics(pred, gold_by_id.get(pred.id.as_str()).copied(), zero_division))
        .collect();
    debug!(
        "Evaluated {} documents ({} skipped): entity f1 {}, triple f1 {}",
        aligned.len(),
        skipped.len(),
        entity.fscore,
        triple.fscore
    );
    Ok(Evaluation {
        predictions: aligned,
        report: Reporter::new(entity, triple, documents, skipped),
    })
}

/// Flattens the raw gold documents, then evaluates the predictions against them.
pub fn evaluate_raw<I>(
    predictions: &[DocumentRecord],
    raw_golds: I,
    config: &EvalConfig,
) -> Result<Evaluation, EvaluationError>
where
    I: IntoIterator<Item = RawDocument>,
{
    let golds = flatten_corpus(raw_golds)?;
    evaluate(predictions, &golds, config)
}

/// Computes the corpus entity F1 and triple F1 with the default configuration.
///
/// * `predictions`: Predicted documents
/// * `golds`: Flattened gold documents
pub fn score(
    predictions: &[DocumentRecord],
    golds: &[DocumentRecord],
) -> Result<(f64, f64), EvaluationError> {
    let evaluation = evaluate(predictions, golds, &EvalConfig::default())?;
    Ok((evaluation.entity_f1(), evaluation.triple_f1()))
}

fn document_metrics(
    pred: &DocumentRecord,
    gold: Option<&DocumentRecord>,
    zero_division: DivByZeroStrat,
) -> DocumentMetrics {
    let entity = membership_prf(
        entity_keys(pred),
        gold.into_iter().flat_map(entity_keys),
        zero_division,
    );
    let triple = membership_prf(
        predicted_triple_keys(pred),
        gold.into_iter().flat_map(gold_triple_keys),
        zero_division,
    );
    DocumentMetrics {
        id: pred.id.clone(),
        entity,
        triple,
    }
}
