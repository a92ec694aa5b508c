#![deny(clippy::disallowed_methods)]
#![deny(clippy::self_named_module_files)]
#![deny(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::branches_sharing_code)]
#![warn(clippy::cloned_instead_of_copied)]
#![warn(clippy::copy_iterator)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::equatable_if_let)]
#![warn(clippy::explicit_into_iter_loop)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::from_iter_instead_of_collect)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::inconsistent_struct_constructor)]
#![warn(clippy::index_refutable_slice)]
#![warn(clippy::inefficient_to_string)]
#![warn(clippy::items_after_statements)]
#![warn(clippy::large_types_passed_by_value)]
#![warn(clippy::manual_assert)]
#![warn(clippy::manual_ok_or)]
#![warn(clippy::map_unwrap_or)]
#![warn(clippy::match_wildcard_for_single_variants)]
#![warn(clippy::mixed_read_write_in_expression)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::str_to_string)]
#![warn(clippy::string_to_string)]
#![warn(clippy::trivially_copy_pass_by_ref)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unnested_or_patterns)]
#![warn(clippy::unused_self)]

//! A proof engine for natural-deduction logical frameworks.
//!
//! The crate has three independent layers: an LF-style term language with
//! substitution and pattern unification ([`term`]), an LR(0)/GLR parse-table
//! builder for user-declared concrete syntax ([`grammar`]), and a
//! depth-bounded backtracking prover over a mutable proof tree ([`prover`]).
//! The surrounding tool (file handling, diagnostics, the type checker for
//! declared judgments) lives outside this crate and talks to it through
//! plain in-memory calls.

pub mod grammar;
pub mod prover;
pub mod term;
mod utils;

use grammar::ParseError;
use term::UnificationError;
use thiserror::Error;

pub type NoetherResult<T> = Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Unification(#[from] UnificationError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
