//! Imputation module for handling missing values.
//!
//! Only sentinel imputation is provided: each mapped column gets a fixed
//! domain code for its missing cells.

mod sentinel;

pub use sentinel::SentinelImputer;
