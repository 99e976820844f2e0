/**
Alignment of the entity clusters of a predicted document to the clusters of its gold document.
Predicted cluster ids are local to the system that produced them, so before triples can be
compared every predicted cluster has to be renamed after the gold cluster it stands for.

Every (predicted cluster, gold cluster) pair is scored by the F1 of their triples, compared by
the position of their value only. Pairs whose mentions share no position score 0 without looking
at the triples. The best one-to-one mapping is then the solution of the assignment problem
maximizing the total score; predicted clusters left out of it are assigned [`UNMATCHED`].
*/
use crate::assignment::{maximum_score_assignment, AssignmentError};
use crate::datastructure::Clusters;
use crate::metrics::{membership_prf, DivByZeroStrat};
use crate::record::{DocumentRecord, EntityMention, SpanId, Triple, UNATTACHED, UNMATCHED};
use log::{debug, trace};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Entity clusters of a document and the triples attached to them.
struct ClusterTables<'a> {
    entities: Clusters<'a, EntityMention>,
    triples: Clusters<'a, Triple>,
}

impl<'a> ClusterTables<'a> {
    fn new(doc: &'a DocumentRecord) -> Self {
        Self {
            entities: Clusters::new(&doc.entities, |e| e.id.as_str()),
            triples: Clusters::new(&doc.triples, |t| t.ent_id.as_str()),
        }
    }

    /// Mention spans and triple spans of every entity cluster, in cluster order.
    fn spans(&self) -> Vec<(Vec<SpanId>, Vec<SpanId>)> {
        self.entities
            .iter_clusters()
            .map(|(id, mentions)| {
                let mention_spans = mentions.iter().map(|e| e.span()).collect();
                let triple_spans = self.triples.get(id).iter().map(|t| t.span()).collect();
                (mention_spans, triple_spans)
            })
            .collect()
    }
}

fn score_matrix(
    pred: &ClusterTables,
    gold: &ClusterTables,
    zero_division: DivByZeroStrat,
) -> Array2<f64> {
    let pred_spans = pred.spans();
    let gold_spans = gold.spans();
    let mut scores = Array2::zeros((pred_spans.len(), gold_spans.len()));
    for (i, (pred_mentions, pred_triples)) in pred_spans.iter().enumerate() {
        for (j, (gold_mentions, gold_triples)) in gold_spans.iter().enumerate() {
            let entity_f1 = membership_prf(pred_mentions, gold_mentions, zero_division).fscore;
            if entity_f1 == 0.0 {
                continue;
            }
            scores[[i, j]] = membership_prf(pred_triples, gold_triples, zero_division).fscore;
        }
    }
    scores
}

/// Scores of every (predicted cluster, gold cluster) pair. Rows follow the sorted predicted
/// cluster ids and columns the sorted gold cluster ids.
pub fn cost_matrix(
    pred: &DocumentRecord,
    gold: &DocumentRecord,
    zero_division: DivByZeroStrat,
) -> Array2<f64> {
    score_matrix(
        &ClusterTables::new(pred),
        &ClusterTables::new(gold),
        zero_division,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub predicted: String,
    pub gold: String,
    /// Triple F1 of the two clusters.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Mapping from predicted cluster ids to gold cluster ids found for one document.
pub struct Alignment {
    pub pairs: Vec<AlignedPair>,
    /// Predicted clusters without a gold counterpart.
    pub unmatched: Vec<String>,
}

impl Alignment {
    /// Gold id assigned to the predicted cluster `predicted`, if it is part of the alignment.
    pub fn assigned(&self, predicted: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.predicted == predicted)
            .map(|p| p.gold.as_str())
    }

    pub fn total_score(&self) -> f64 {
        self.pairs.iter().map(|p| p.score).sum()
    }
}

/// Returns a copy of `pred` where every entity carries the gold id of its cluster (`assign-id`)
/// and every triple the gold id of its entity (`assign-ent-id`).
pub fn align(
    pred: &DocumentRecord,
    gold: &DocumentRecord,
    zero_division: DivByZeroStrat,
) -> Result<DocumentRecord, AssignmentError> {
    align_with_details(pred, gold, zero_division).map(|(aligned, _)| aligned)
}

/// Same as [`align`], also returning the mapping between the clusters.
pub fn align_with_details(
    pred: &DocumentRecord,
    gold: &DocumentRecord,
    zero_division: DivByZeroStrat,
) -> Result<(DocumentRecord, Alignment), AssignmentError> {
    let pred_tables = ClusterTables::new(pred);
    let gold_tables = ClusterTables::new(gold);
    let scores = score_matrix(&pred_tables, &gold_tables, zero_division);
    trace!(
        "Document {}: {}x{} cluster score matrix",
        pred.id,
        scores.nrows(),
        scores.ncols()
    );
    let pairs = maximum_score_assignment(scores.view())?;

    let pred_ids = pred_tables.entities.ids();
    let gold_ids = gold_tables.entities.ids();
    let clusters = pred_tables.entities.len();
    let mut assigned: Vec<&str> = vec![UNMATCHED; clusters];
    let mut is_matched = vec![false; clusters];
    for &(row, column) in pairs.iter() {
        assigned[row] = gold_ids[column];
        is_matched[row] = true;
    }
    // Triples may name a cluster without any mention.
    let assign = |cluster: &str| {
        pred_tables
            .entities
            .position(cluster)
            .map_or(UNMATCHED, |i| assigned[i])
    };

    let mut aligned = pred.clone();
    for entity in aligned.entities.iter_mut() {
        entity.assign_id = Some(assign(&entity.id).to_string());
    }
    for triple in aligned.triples.iter_mut() {
        let assigned_id = if triple.ent_id == UNATTACHED {
            UNATTACHED
        } else {
            assign(&triple.ent_id)
        };
        triple.assign_ent_id = Some(assigned_id.to_string());
    }

    let alignment = Alignment {
        pairs: pairs
            .iter()
            .map(|&(row, column)| AlignedPair {
                predicted: pred_ids[row].to_string(),
                gold: gold_ids[column].to_string(),
                score: scores[[row, column]],
            })
            .collect(),
        unmatched: pred_ids
            .iter()
            .zip(is_matched)
            .filter(|(_, matched)| !matched)
            .map(|(id, _)| id.to_string())
            .collect(),
    };
    debug!(
        "Document {}: aligned {} of {} predicted clusters to {} gold clusters",
        pred.id,
        alignment.pairs.len(),
        clusters,
        gold_tables.entities.len()
    );
    Ok((aligned, alignment))
}
