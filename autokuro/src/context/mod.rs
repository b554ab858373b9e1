//! Per-run context.
//!
//! [`RunOptions`] carries what the operator asked for. [`RunContext`] is the
//! immutable result of combining those options with the validated
//! configuration, and is shared by every stage of the run.

mod options;
mod run;

pub use options::{validate_domain, RunOptions};
pub use run::RunContext;
