use std::cell::{Cell, RefCell};

use automata_core::prelude::*;
use thiserror::Error;
use tracing::trace;

use super::ObservationTable;

/// Errors that an [`Oracle`] can report. Neither of them may be papered over by a default
/// answer, as a wrong cell silently corrupts the classification of rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The oracle could not be reached, timed out or answered with a non-success status.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    /// The oracle answered, but the answer is not one of the permitted ones.
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
}

/// Answer to an equivalence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Equivalence {
    /// The hypothesis described by the table is accepted.
    Equivalent,
    /// A word on which the hypothesis and the target language disagree.
    Counterexample(Word),
}

/// A minimally adequate teacher (MAT) for learning a regular language. It answers membership
/// queries for single words and equivalence queries for the hypothesis that an
/// [`ObservationTable`] describes.
///
/// Both queries are blocking. Methods take `&self`, implementations that need to keep track of
/// something do so through interior mutability.
pub trait Oracle {
    /// Decides whether `word` belongs to the target language.
    fn membership(&self, word: &Word) -> Result<bool, OracleError>;

    /// Decides whether the hypothesis given by `table` is equivalent to the target language.
    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn membership(&self, word: &Word) -> Result<bool, OracleError> {
        O::membership(self, word)
    }

    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError> {
        O::equivalence(self, table)
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn membership(&self, word: &Word) -> Result<bool, OracleError> {
        O::membership(self, word)
    }

    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError> {
        O::equivalence(self, table)
    }
}

/// Wraps an oracle and remembers the answers to all membership queries, so that each word is
/// asked at most once even if it arises from different prefix/suffix combinations. Only
/// successful answers are stored.
pub struct CachingOracle<O> {
    inner: O,
    cache: RefCell<math::Map<Word, bool>>,
    forwarded: Cell<usize>,
}

impl<O: Oracle> CachingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cache: RefCell::new(math::Map::default()),
            forwarded: Cell::new(0),
        }
    }

    /// The number of membership queries that were passed on to the wrapped oracle.
    pub fn forwarded(&self) -> usize {
        self.forwarded.get()
    }

    /// The number of distinct words whose membership is known.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Oracle> Oracle for CachingOracle<O> {
    fn membership(&self, word: &Word) -> Result<bool, OracleError> {
        if let Some(known) = self.cache.borrow().get(word) {
            trace!("cache hit for {}", word.show());
            return Ok(*known);
        }

        let output = self.inner.membership(word)?;
        self.forwarded.set(self.forwarded.get() + 1);
        self.cache.borrow_mut().insert(word.clone(), output);
        Ok(output)
    }

    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError> {
        self.inner.equivalence(table)
    }
}

/// An oracle that knows the target language through a membership predicate. Equivalence is
/// decided by comparing the hypothesis with the predicate on all words up to a length bound,
/// shortest words first, so a returned counterexample is always a shortest one.
///
/// Words on which the hypothesis cannot be evaluated count as disagreements.
#[derive(Clone)]
pub struct BoundedOracle<F> {
    alphabet: CharAlphabet,
    max_len: usize,
    target: F,
}

impl<F: Fn(&Word) -> bool> BoundedOracle<F> {
    pub fn new(alphabet: CharAlphabet, max_len: usize, target: F) -> Self {
        Self {
            alphabet,
            max_len,
            target,
        }
    }

    pub fn alphabet(&self) -> &CharAlphabet {
        &self.alphabet
    }
}

impl<F: Fn(&Word) -> bool> Oracle for BoundedOracle<F> {
    fn membership(&self, word: &Word) -> Result<bool, OracleError> {
        Ok((self.target)(word))
    }

    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError> {
        for word in Word::up_to_length(&self.alphabet, self.max_len) {
            let expected = (self.target)(&word);
            if table.output(&word) != Some(expected) {
                trace!(
                    "hypothesis disagrees on {}, expected {}",
                    word.show(),
                    expected.show()
                );
                return Ok(Equivalence::Counterexample(word));
            }
        }
        Ok(Equivalence::Equivalent)
    }
}
