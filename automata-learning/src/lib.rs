//! A library for learning automata by asking questions to a teacher.

/// Deals with active learning, that is the L* algorithm, its observation table and
/// the oracles that it can query.
pub mod active;
