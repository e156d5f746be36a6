use std::{cell::Cell, time::Duration};

use automata_core::{prelude::*, show_duration};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::{Equivalence, ObservationTable, Oracle, OracleError};

const ITERATION_THRESHOLD: usize = if cfg!(debug_assertions) { 300 } else { 200000 };

/// Errors that end a learning run. The table built so far stays available through
/// [`LStar::partial_table`], it must not be mistaken for a learned hypothesis though.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearningError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// The oracle did not accept a hypothesis within the configured number of rounds.
    #[error("no hypothesis was accepted within {rounds} equivalence rounds")]
    NonConvergence { rounds: usize },
}

/// Settings for a run of [`LStar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LStarConfig {
    /// The maximal number of equivalence queries that are posed before giving up.
    pub max_rounds: usize,
}

impl Default for LStarConfig {
    fn default() -> Self {
        Self {
            max_rounds: ITERATION_THRESHOLD,
        }
    }
}

impl LStarConfig {
    pub fn with_max_rounds(max_rounds: usize) -> Self {
        Self { max_rounds }
    }

    /// Reads the bound from the `MAX_ITERATIONS` environment variable, falling back to the
    /// default if it is missing or not a number.
    pub fn from_env() -> Self {
        match std::env::var("MAX_ITERATIONS").map(|value| value.parse::<usize>()) {
            Ok(Ok(max_rounds)) => Self { max_rounds },
            Ok(Err(e)) => {
                warn!("ignoring MAX_ITERATIONS, {e}");
                Self::default()
            }
            Err(_) => Self::default(),
        }
    }
}

/// The outcome of a successful run.
#[derive(Debug, Clone)]
pub struct Learned {
    /// The closed table whose hypothesis the oracle accepted.
    pub table: ObservationTable,
    /// The number of equivalence queries that were posed, including the final one.
    pub rounds: usize,
    /// The number of membership queries that were posed.
    pub membership_queries: usize,
    pub elapsed: Duration,
}

impl Learned {
    /// The number of states of the learned automaton.
    pub fn size(&self) -> usize {
        self.table.main_end()
    }
}

/// Keeps track of how many queries pass through it.
struct Counting<'a, O: ?Sized> {
    oracle: &'a O,
    membership: Cell<usize>,
}

impl<'a, O: Oracle + ?Sized> Counting<'a, O> {
    fn new(oracle: &'a O) -> Self {
        Self {
            oracle,
            membership: Cell::new(0),
        }
    }
}

impl<O: Oracle + ?Sized> Oracle for Counting<'_, O> {
    fn membership(&self, word: &Word) -> Result<bool, OracleError> {
        self.membership.set(self.membership.get() + 1);
        self.oracle.membership(word)
    }

    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError> {
        self.oracle.equivalence(table)
    }
}

/// An implementation of the L* algorithm for deterministic finite automata, where
/// counterexamples are handled by adding all their suffixes as columns.
///
/// # Example
/// ```
/// use automata_core::prelude::*;
/// use automata_learning::active::{BoundedOracle, LStar};
///
/// let oracle = BoundedOracle::new(alphabet!(simple 'a', 'b'), 6, |w: &Word| {
///     w.as_string().ends_with("ab")
/// });
/// let mut learner = LStar::new(oracle.alphabet().clone(), oracle);
/// let learned = learner.infer().unwrap();
/// assert_eq!(learned.size(), 3);
/// ```
pub struct LStar<O: Oracle> {
    alphabet: CharAlphabet,
    oracle: O,
    config: LStarConfig,
    // table of the last run that failed
    partial: Option<ObservationTable>,
}

impl<O: Oracle> LStar<O> {
    pub fn new(alphabet: CharAlphabet, oracle: O) -> Self {
        Self::with_config(alphabet, oracle, LStarConfig::default())
    }

    pub fn with_config(alphabet: CharAlphabet, oracle: O, config: LStarConfig) -> Self {
        Self {
            alphabet,
            oracle,
            config,
            partial: None,
        }
    }

    pub fn config(&self) -> &LStarConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Gives back the oracle, which ends its use by the learner.
    pub fn into_oracle(self) -> O {
        self.oracle
    }

    /// The table as it was when the last run failed. Meant for diagnostics only.
    pub fn partial_table(&self) -> Option<&ObservationTable> {
        self.partial.as_ref()
    }

    /// Runs the learner until the oracle accepts a hypothesis. Fails if the oracle fails or
    /// if the round bound of the configuration is exceeded.
    pub fn infer(&mut self) -> Result<Learned, LearningError> {
        let start = std::time::Instant::now();
        self.partial = None;
        let oracle = Counting::new(&self.oracle);

        info!(
            "starting L* over alphabet {}, at most {} rounds",
            self.alphabet.universe().collect::<String>(),
            self.config.max_rounds
        );
        let mut table = ObservationTable::new(self.alphabet.clone(), &oracle)?;

        match Self::run(&mut table, &oracle, self.config.max_rounds) {
            Ok(rounds) => {
                let elapsed = start.elapsed();
                info!(
                    "learned automaton with {} states in {rounds} rounds and {} membership queries, took {}",
                    table.main_end(),
                    oracle.membership.get(),
                    show_duration(elapsed)
                );
                Ok(Learned {
                    table,
                    rounds,
                    membership_queries: oracle.membership.get(),
                    elapsed,
                })
            }
            Err(e) => {
                warn!("learning aborted after {}: {e}", show_duration(start.elapsed()));
                self.partial = Some(table);
                Err(e)
            }
        }
    }

    fn run<P: Oracle + ?Sized>(
        table: &mut ObservationTable,
        oracle: &P,
        max_rounds: usize,
    ) -> Result<usize, LearningError> {
        for round in 1..=max_rounds {
            table.expand_frontier(oracle)?;
            trace!("L* round {round} with table\n{table}");

            match oracle.equivalence(table)? {
                Equivalence::Equivalent => {
                    debug!("hypothesis with {} states accepted", table.main_end());
                    return Ok(round);
                }
                Equivalence::Counterexample(word) => {
                    info!(
                        "round {round}: counterexample {} for hypothesis with {} states",
                        word.show(),
                        table.main_end()
                    );
                    Self::process_counterexample(table, word, oracle)?;
                }
            }
        }

        Err(LearningError::NonConvergence { rounds: max_rounds })
    }

    /// Adds every non-empty suffix of `word` as a column, shortest first, and classifies the
    /// pending rows against the refined outputs.
    fn process_counterexample<P: Oracle + ?Sized>(
        table: &mut ObservationTable,
        word: Word,
        oracle: &P,
    ) -> Result<(), OracleError> {
        if word.is_empty() {
            return Err(OracleError::MalformedResponse(
                "the empty word cannot be a counterexample".to_string(),
            ));
        }
        if let Some(sym) = word.foreign_symbol(table.alphabet()) {
            return Err(OracleError::MalformedResponse(format!(
                "counterexample {} contains symbol {sym:?} outside of the alphabet",
                word.show()
            )));
        }

        let mut added = 0;
        for suffix in word.suffixes() {
            if table.add_suffix(suffix, oracle)? {
                added += 1;
            }
        }
        if added == 0 {
            warn!(
                "counterexample {} did not contribute a new suffix",
                word.show()
            );
        }

        let promoted = table.classify_pending();
        debug!("counterexample added {added} suffixes and promoted {promoted} rows");
        Ok(())
    }
}
