/*
 * This modules contains the `EvalConfig` struct, which implements the default trait. This config
 * can be passed to the `evaluate` function to decide how divisions by zero and predicted
 * documents without gold labels are handled, and whether the documents are aligned in parallel.
*/
use crate::metrics::DivByZeroStrat;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{self, Debug, Display},
    str::FromStr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
/// What to do with a predicted document whose id is not found in the gold labels.
pub enum MissingGoldStrat {
    /// Log a warning and leave the document unaligned. Its entities are still counted as
    /// predictions, its triples are not scored.
    #[default]
    Skip,
    /// Stop the evaluation and return an error.
    ReturnError,
}

#[derive(Debug)]
pub struct ParsingMissingGoldStrategyError<S: Debug + Display>(S);

impl<S: Debug + Display> Display for ParsingMissingGoldStrategyError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse the {} into a `MissingGoldStrat`", self.0)
    }
}
impl<S: Debug + Display> Error for ParsingMissingGoldStrategyError<S> {}

impl FromStr for MissingGoldStrat {
    type Err = ParsingMissingGoldStrategyError<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "skip" => Ok(MissingGoldStrat::Skip),
            "returnerror" | "error" => Ok(MissingGoldStrat::ReturnError),
            _ => Err(ParsingMissingGoldStrategyError(String::from(s))),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
/// Config struct used to simplify the inputs of the `evaluate` function. It implements the
/// default trait.
pub struct EvalConfig {
    /// How precision, recall and fscore are computed when their denominator is zero.
    pub(crate) zero_division: DivByZeroStrat,
    /// Policy for predicted documents without gold labels.
    pub(crate) missing_gold: MissingGoldStrat,
    /// Can we align the documents on multiple cores? The final aggregation always happens once
    /// every document is aligned.
    pub(crate) parallel: bool,
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn zero_division(&self) -> DivByZeroStrat {
        self.zero_division
    }
    pub fn missing_gold(&self) -> MissingGoldStrat {
        self.missing_gold
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            zero_division: DivByZeroStrat::ReplaceBy0,
            missing_gold: MissingGoldStrat::Skip,
            parallel: false,
        }
    }
}

impl Display for EvalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Strategy when encountering a division by zero: {:?}\n Strategy for documents without gold labels: {:?}\n Using parallel computations: {}",
            self.zero_division, self.missing_gold, self.parallel
        )
    }
}

impl<ZeroDiv> From<EvalConfigBuilder<ZeroDiv>> for EvalConfig
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    fn from(value: EvalConfigBuilder<ZeroDiv>) -> Self {
        Self {
            zero_division: value.zero_division.either_into(),
            missing_gold: value.missing_gold,
            parallel: value.parallel,
        }
    }
}

/// This builder can be used to build and customize an `EvalConfig` structure.
pub struct EvalConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    zero_division: LeftOrRight<ZeroDiv, DivByZeroStrat>,
    missing_gold: MissingGoldStrat,
    parallel: bool,
}

impl Default for EvalConfigBuilder<DivByZeroStrat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ZeroDiv> EvalConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    pub fn division_by_zero(mut self, division_by_zero: ZeroDiv) -> Self {
        self.zero_division = LeftOrRight::Left(division_by_zero);
        self
    }
    pub fn missing_gold(mut self, missing_gold: MissingGoldStrat) -> Self {
        self.missing_gold = missing_gold;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn new() -> Self {
        Self {
            zero_division: LeftOrRight::Right(DivByZeroStrat::ReplaceBy0),
            missing_gold: MissingGoldStrat::Skip,
            parallel: false,
        }
    }
    pub fn build(self) -> EvalConfig {
        EvalConfig::from(self)
    }
}
