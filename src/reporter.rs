/**
This modules gives a few tools to prettyprint the corpus metrics and the per document breakdown
of an evaluation.
*/
use crate::metrics::PrecisionRecallFScore;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{self, Display},
    str::FromStr,
};

/// The reporter holds the corpus level entity and triple metrics, the metrics of every predicted
/// document and the ids of the documents skipped for lack of gold labels. When displayed, it acts
/// as a dataframe.
///
/// # Example
///
/// ```rust
/// use dialeval::{PrecisionRecallFScore, Reporter, DivByZeroStrat};
///
/// let entity = PrecisionRecallFScore::from_counts(1, 2, 1, DivByZeroStrat::ReplaceBy0);
/// let triple = PrecisionRecallFScore::from_counts(1, 1, 1, DivByZeroStrat::ReplaceBy0);
/// let reporter = Reporter::new(entity, triple, vec![], vec![]);
///
/// let expected_report =
/// "Scope, Metric, Precision, Recall, Fscore, Support
/// Overall, Entity, 0.5, 1, 0.6666666666666666, 1
/// Overall, Triple, 1, 1, 1, 1\n";
///
/// assert_eq!(expected_report, reporter.to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reporter {
    pub entity: PrecisionRecallFScore,
    pub triple: PrecisionRecallFScore,
    /// Predicted documents in input order.
    pub documents: Vec<DocumentMetrics>,
    /// Ids of the predicted documents without gold labels.
    pub skipped: Vec<String>,
}

impl Reporter {
    pub fn new(
        entity: PrecisionRecallFScore,
        triple: PrecisionRecallFScore,
        documents: Vec<DocumentMetrics>,
        skipped: Vec<String>,
    ) -> Self {
        Self {
            entity,
            triple,
            documents,
            skipped,
        }
    }

    /// Metrics of the document `id`, if it was predicted.
    pub fn document(&self, id: &str) -> Option<&DocumentMetrics> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Lines of the dataframe: the overall metrics first, then every document.
    pub fn rows(&self) -> impl Iterator<Item = ReportRow<'_>> + '_ {
        let overall = [
            ReportRow::new(OVERALL_SCOPE, Metric::Entity, &self.entity),
            ReportRow::new(OVERALL_SCOPE, Metric::Triple, &self.triple),
        ];
        overall.into_iter().chain(self.documents.iter().flat_map(|d| {
            [
                ReportRow::new(&d.id, Metric::Entity, &d.entity),
                ReportRow::new(&d.id, Metric::Triple, &d.triple),
            ]
        }))
    }
}

const OVERALL_SCOPE: &str = "Overall";

/// The Reporter struct acts as a dataframe when displayed.
impl Display for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scope, Metric, Precision, Recall, Fscore, Support")?;
        for row in self.rows() {
            writeln!(f, "{}", row)?
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Entity and triple metrics of a single predicted document.
pub struct DocumentMetrics {
    pub id: String,
    pub entity: PrecisionRecallFScore,
    pub triple: PrecisionRecallFScore,
}

impl DocumentMetrics {
    pub fn get(&self, metric: Metric) -> &PrecisionRecallFScore {
        match metric {
            Metric::Entity => &self.entity,
            Metric::Triple => &self.triple,
        }
    }
}

/// A single line of the report. It borrows its metrics from the `Reporter`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportRow<'a> {
    /// `Overall` or a document id
    pub scope: &'a str,
    pub metric: Metric,
    pub values: &'a PrecisionRecallFScore,
}

impl<'a> ReportRow<'a> {
    fn new(scope: &'a str, metric: Metric, values: &'a PrecisionRecallFScore) -> Self {
        Self {
            scope,
            metric,
            values,
        }
    }
}

/// The ReportRow struct acts as a line in a dataframe when displayed.
impl Display for ReportRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}",
            self.scope,
            self.metric,
            self.values.precision,
            self.values.recall,
            self.values.fscore,
            self.values.gold
        )
    }
}

/// What is being scored. &str can be parsed to create a `Metric`.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum Metric {
    /// Typed entity mentions, identified by their position.
    Entity,
    /// Triples, identified by their aligned entity id, position and property.
    Triple,
}

impl Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Metric {
    type Err = MetricParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entity" | "ent" => Ok(Metric::Entity),
            "triple" => Ok(Metric::Triple),
            _ => Err(MetricParsingError(String::from(s))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MetricParsingError(String);
impl Display for MetricParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Impossible to parse the string ({}) into a Metric", self.0)
    }
}
impl Error for MetricParsingError {}
