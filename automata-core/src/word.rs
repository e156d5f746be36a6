use std::collections::VecDeque;

use crate::{
    alphabet::{Alphabet, CharAlphabet},
    Show,
};

/// A finite word over a [`CharAlphabet`]. Prefixes and suffixes of the observation table,
/// membership queries and counterexamples are all words.
///
/// # Example
/// ```
/// use automata_core::word::Word;
/// let word = Word::from("ab");
/// assert_eq!(word.concat(&Word::from("ba")).as_string(), "abba");
/// assert_eq!(Word::empty().show_word(), "ε");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Word(Vec<char>);

impl Word {
    /// The empty word ε.
    pub fn empty() -> Self {
        Self(vec![])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the symbol at the given `position`, if it exists.
    pub fn nth(&self, position: usize) -> Option<char> {
        self.0.get(position).copied()
    }

    /// Returns an iterator over the symbols of `self`.
    pub fn symbols(&self) -> impl DoubleEndedIterator<Item = char> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[char] {
        &self.0
    }

    /// Returns a new word consisting of `self` followed by `symbol`.
    pub fn append(&self, symbol: char) -> Word {
        let mut symbols = Vec::with_capacity(self.len() + 1);
        symbols.extend_from_slice(&self.0);
        symbols.push(symbol);
        Word(symbols)
    }

    /// Returns the concatenation of `self` and `other`.
    pub fn concat(&self, other: &Word) -> Word {
        Word(self.0.iter().chain(other.0.iter()).copied().collect())
    }

    /// The suffix of `self` that starts at `offset`. Gives the empty word if `offset`
    /// is past the end.
    pub fn skip(&self, offset: usize) -> Word {
        Word(self.0.iter().skip(offset).copied().collect())
    }

    /// Iterates over all non-empty suffixes of `self`, starting with the one consisting only
    /// of the last symbol and ending with `self`.
    pub fn suffixes(&self) -> impl Iterator<Item = Word> + '_ {
        (0..self.len()).rev().map(|offset| self.skip(offset))
    }

    /// Returns the first symbol of `self` that is not contained in `alphabet`.
    pub fn foreign_symbol<A: Alphabet<Symbol = char>>(&self, alphabet: &A) -> Option<char> {
        self.symbols().find(|sym| !alphabet.contains(*sym))
    }

    /// The plain concatenation of all symbols, the empty word gives the empty string.
    pub fn as_string(&self) -> String {
        self.0.iter().collect()
    }

    /// Like [`Word::as_string`], but the empty word is shown as `ε`.
    pub fn show_word(&self) -> String {
        if self.is_empty() {
            "ε".to_string()
        } else {
            self.as_string()
        }
    }

    /// Enumerates all words over `alphabet` of length at most `max_len` in length-lexicographic
    /// order, where symbols are ordered as in the alphabet. The first word is always ε.
    pub fn up_to_length(alphabet: &CharAlphabet, max_len: usize) -> UpToLength<'_> {
        UpToLength {
            alphabet,
            max_len,
            queue: VecDeque::from([Word::empty()]),
        }
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.show_word())
    }
}

impl Show for Word {
    fn show(&self) -> String {
        self.show_word()
    }
}

impl From<&str> for Word {
    fn from(value: &str) -> Self {
        Self(value.chars().collect())
    }
}

impl From<String> for Word {
    fn from(value: String) -> Self {
        Self(value.chars().collect())
    }
}

impl From<Vec<char>> for Word {
    fn from(value: Vec<char>) -> Self {
        Self(value)
    }
}

impl FromIterator<char> for Word {
    fn from_iter<T: IntoIterator<Item = char>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Iterator returned by [`Word::up_to_length`]. Breadth first, so words come out ordered by
/// length and then by the position of their symbols in the alphabet.
#[derive(Clone, Debug)]
pub struct UpToLength<'a> {
    alphabet: &'a CharAlphabet,
    max_len: usize,
    queue: VecDeque<Word>,
}

impl Iterator for UpToLength<'_> {
    type Item = Word;

    fn next(&mut self) -> Option<Self::Item> {
        let word = self.queue.pop_front()?;
        if word.len() < self.max_len {
            self.queue
                .extend(self.alphabet.universe().map(|sym| word.append(sym)));
        }
        Some(word)
    }
}
