//! Shared building blocks for active learning: alphabets over `char` symbols,
//! finite words over them and a couple of helpers for showing things in logs.

/// Defines the mathematical collections that are used throughout, this is mainly
/// to hide which concrete map and set implementation is in use.
pub mod math;

mod show;
pub use show::{show_duration, Show};

/// An alphabet is a finite, ordered collection of symbols. Since every word is sent
/// over the wire by simply concatenating its symbols, a symbol is a single `char`.
#[macro_use]
pub mod alphabet;

/// Finite words over an alphabet, together with the operations that the observation
/// table needs: concatenation, enumeration of suffixes and length-lexicographic
/// enumeration of all words up to a given length.
pub mod word;

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use automata_core::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        alphabet,
        alphabet::{Alphabet, CharAlphabet, Symbol},
        math,
        word::Word,
        Show,
    };
}
