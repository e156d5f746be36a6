use automata_core::prelude::*;
use itertools::Itertools;
use tracing::{debug, trace};

use super::{Oracle, OracleError};

/// The membership results of a single prefix, one entry per suffix of the table and in the
/// same order as the suffixes. Two rows are considered equal if their outputs coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OutputRow(pub(super) Vec<bool>);

impl OutputRow {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, column: usize) -> Option<bool> {
        self.0.get(column).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<bool>> for OutputRow {
    fn from(value: Vec<bool>) -> Self {
        Self(value)
    }
}

impl Show for OutputRow {
    fn show(&self) -> String {
        self.0.show()
    }
}

/// A prefix together with its outputs. For a pending row, `class` points to the classified
/// row with the same outputs once [`ObservationTable::classify_pending`] found one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    prefix: Word,
    outputs: OutputRow,
    class: Option<usize>,
}

impl Row {
    pub fn prefix(&self) -> &Word {
        &self.prefix
    }

    pub fn outputs(&self) -> &OutputRow {
        &self.outputs
    }
}

/// The observation table of an L*-style learner.
///
/// Rows are kept in a single vector. The classified rows, whose outputs are pairwise
/// distinct, occupy `[0, main_end)` in the order in which they were classified, and row 0
/// always belongs to the empty prefix. All remaining rows are pending. Suffixes are shared
/// by all rows and the empty suffix is always the first one.
///
/// Classified rows never move. Pending rows keep their relative order but may be shifted one
/// position to the back whenever a pending row in front of them is promoted, so indices of
/// pending rows are only stable between two calls to [`ObservationTable::classify_pending`].
#[derive(Clone, PartialEq, Eq)]
pub struct ObservationTable {
    alphabet: CharAlphabet,
    suffixes: Vec<Word>,
    rows: Vec<Row>,
    main_end: usize,
    // classified rows before this position have been extended by every symbol
    cursor: usize,
}

impl ObservationTable {
    /// Creates a table over `alphabet` that consists of the classified row for the empty
    /// prefix and the column for the empty suffix. This poses a single membership query.
    pub fn new<O: Oracle + ?Sized>(
        alphabet: CharAlphabet,
        oracle: &O,
    ) -> Result<Self, OracleError> {
        let empty = oracle.membership(&Word::empty())?;
        trace!("seeding table, ε maps to {}", empty.show());
        Ok(Self {
            alphabet,
            suffixes: vec![Word::empty()],
            rows: vec![Row {
                prefix: Word::empty(),
                outputs: OutputRow(vec![empty]),
                class: None,
            }],
            main_end: 1,
            cursor: 0,
        })
    }

    pub fn alphabet(&self) -> &CharAlphabet {
        &self.alphabet
    }

    /// The number of classified rows, these are the rows `[0, main_end)`.
    pub fn main_end(&self) -> usize {
        self.main_end
    }

    /// The total number of rows, classified and pending.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false, a table contains at least the row of the empty prefix.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn suffixes(&self) -> &[Word] {
        &self.suffixes
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn row_function(&self, idx: usize) -> Option<&OutputRow> {
        self.rows.get(idx).map(|row| &row.outputs)
    }

    pub fn is_classified(&self, idx: usize) -> bool {
        idx < self.main_end
    }

    pub fn main_prefixes(&self) -> impl Iterator<Item = &Word> + '_ {
        self.rows[..self.main_end].iter().map(|row| &row.prefix)
    }

    pub fn pending_prefixes(&self) -> impl Iterator<Item = &Word> + '_ {
        self.rows[self.main_end..].iter().map(|row| &row.prefix)
    }

    /// Returns the index of the classified row that the row at `idx` is equivalent to. For
    /// a classified row that is the row itself, for a pending row it is only known after
    /// [`Self::classify_pending`] has been called since the last suffix was added.
    pub fn class_of(&self, idx: usize) -> Option<usize> {
        if idx < self.main_end {
            Some(idx)
        } else {
            self.rows.get(idx).and_then(|row| row.class)
        }
    }

    /// Gives the position of the row belonging to `prefix`.
    pub fn position(&self, prefix: &Word) -> Option<usize> {
        self.rows.iter().position(|row| &row.prefix == prefix)
    }

    /// A table is closed if every classified row has been extended by all symbols and every
    /// pending row is known to be equivalent to some classified row.
    pub fn is_closed(&self) -> bool {
        self.cursor == self.main_end
            && self.rows[self.main_end..]
                .iter()
                .all(|row| row.class.is_some())
    }

    /// Adds `suffix` as a new column, unless it is already present. Every existing row is
    /// extended by the membership result for its prefix followed by `suffix`. Returns whether
    /// the column was added.
    ///
    /// All queries are posed before the table is modified, so if the oracle fails, the table
    /// is left as it was.
    pub fn add_suffix<O: Oracle + ?Sized>(
        &mut self,
        suffix: Word,
        oracle: &O,
    ) -> Result<bool, OracleError> {
        if self.suffixes.contains(&suffix) {
            trace!("suffix {} is already present", suffix.show());
            return Ok(false);
        }

        let column: Vec<bool> = self
            .rows
            .iter()
            .map(|row| oracle.membership(&row.prefix.concat(&suffix)))
            .collect::<Result<_, _>>()?;

        for (idx, (row, output)) in self.rows.iter_mut().zip(column).enumerate() {
            row.outputs.0.push(output);
            if idx >= self.main_end {
                // the outputs changed, so the previous equivalence may no longer hold
                row.class = None;
            }
        }
        debug!(
            "added suffix {} as column {}",
            suffix.show(),
            self.suffixes.len()
        );
        self.suffixes.push(suffix);
        Ok(true)
    }

    /// Appends `prefix` as a pending row whose outputs are obtained by one membership query
    /// per suffix. Returns the index of the new row.
    pub fn add_pending_prefix<O: Oracle + ?Sized>(
        &mut self,
        prefix: Word,
        oracle: &O,
    ) -> Result<usize, OracleError> {
        let row = self.query_row(prefix, oracle)?;
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    fn query_row<O: Oracle + ?Sized>(&self, prefix: Word, oracle: &O) -> Result<Row, OracleError> {
        let outputs: Vec<bool> = self
            .suffixes
            .iter()
            .map(|suffix| oracle.membership(&prefix.concat(suffix)))
            .collect::<Result<_, _>>()?;
        trace!("adding pending row {} with {}", prefix.show(), outputs.show());

        Ok(Row {
            prefix,
            outputs: OutputRow(outputs),
            class: None,
        })
    }

    /// Goes through the pending rows from front to back. A row whose outputs differ from those
    /// of every classified row is promoted, all other rows remember which classified row they
    /// match. Returns the number of promoted rows.
    pub fn classify_pending(&mut self) -> usize {
        let mut promoted = 0;
        let mut idx = self.main_end;

        while idx < self.rows.len() {
            match self.matching_classified(idx) {
                Some(class) => self.rows[idx].class = Some(class),
                None => {
                    self.promote(idx);
                    promoted += 1;
                }
            }
            idx += 1;
        }

        promoted
    }

    fn matching_classified(&self, idx: usize) -> Option<usize> {
        let outputs = &self.rows[idx].outputs;
        (0..self.main_end).find(|main| &self.rows[*main].outputs == outputs)
    }

    /// Moves the pending row at `idx` to position `main_end` and grows the classified region
    /// by one. The pending rows in `[main_end, idx)` move one position to the back.
    fn promote(&mut self, idx: usize) {
        debug_assert!(idx >= self.main_end && idx < self.rows.len());

        self.rows[self.main_end..=idx].rotate_right(1);
        let row = &mut self.rows[self.main_end];
        row.class = None;
        trace!(
            "promoted {} from position {idx} to {}",
            row.prefix.show(),
            self.main_end
        );
        self.main_end += 1;
    }

    /// Extends every classified row that has not yet been extended by each symbol of the
    /// alphabet, classifying after each new row. Promotions made along the way are picked up
    /// as well, so once this returns every classified row has been extended.
    ///
    /// The rows for one classified prefix are only added once all of their queries were
    /// answered. If the oracle fails, the table is left as it was after the last fully
    /// extended prefix, and calling this again resumes from there.
    pub fn expand_frontier<O: Oracle + ?Sized>(&mut self, oracle: &O) -> Result<(), OracleError> {
        let symbols = self.alphabet.universe().collect_vec();

        while self.cursor < self.main_end {
            let prefix = &self.rows[self.cursor].prefix;
            let extensions: Vec<Row> = symbols
                .iter()
                .map(|&sym| self.query_row(prefix.append(sym), oracle))
                .collect::<Result<_, _>>()?;

            for row in extensions {
                self.rows.push(row);
                self.classify_pending();
            }
            self.cursor += 1;
        }

        debug!(
            "expanded frontier, {} classified and {} pending rows",
            self.main_end,
            self.rows.len() - self.main_end
        );
        Ok(())
    }

    /// Evaluates `word` on the automaton that the table describes: starting from the row of
    /// the empty prefix, each symbol leads to the classified row that is equivalent to the
    /// current prefix extended by that symbol. The output is the entry for the empty suffix.
    ///
    /// Gives `None` if the table is not closed or `word` contains a symbol that is not part
    /// of the alphabet.
    pub fn output(&self, word: &Word) -> Option<bool> {
        let mut state = 0;
        for sym in word.symbols() {
            if !self.alphabet.contains(sym) {
                return None;
            }
            let successor = self.position(&self.rows[state].prefix.append(sym))?;
            state = self.class_of(successor)?;
        }
        self.rows[state].outputs.get(0)
    }
}

impl std::fmt::Display for ObservationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();

        let mut header = vec![String::new()];
        header.extend(self.suffixes.iter().map(Word::show_word));
        builder.push_record(header);

        for (idx, row) in self.rows.iter().enumerate() {
            if idx == self.main_end {
                let mut separator = vec!["+".to_string()];
                separator.extend(self.suffixes.iter().map(|_| String::new()));
                builder.push_record(separator);
            }
            let mut record = vec![row.prefix.show_word()];
            record.extend(row.outputs.iter().map(|b| b.show()));
            builder.push_record(record);
        }

        write!(f, "{}", builder.build())
    }
}

impl std::fmt::Debug for ObservationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "ObservationTable over {} (main_end {}, cursor {})",
            self.alphabet.universe().collect::<String>(),
            self.main_end,
            self.cursor
        )?;
        write!(f, "{self}")
    }
}
