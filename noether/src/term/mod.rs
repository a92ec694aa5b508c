//! The LF-style term language: terms, substitutions, and pattern unification.
//!
//! Terms are immutable values; every transformation builds new terms and the
//! only mutable structure in this module is [`Substitution`], which keeps its
//! entries eagerly composed so lookups never need re-substitution.

mod repr;
mod substitution;
#[cfg(test)]
mod tests;
mod unify;

pub use repr::{Atom, Constant, FreeVar, Term};
pub use substitution::Substitution;
pub use unify::UnificationError;
