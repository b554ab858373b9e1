//! External command model and execution.
//!
//! - [`FlagSet`]: configured flags parsed into typed arguments
//! - [`CommandInvocation`]: a resolved one- or two-process command
//! - [`Modifiers`]: per-tool proxy and cookie injection
//! - [`CommandRunner`]: the execution seam, with [`ProcessRunner`] as the real implementation

mod flags;
mod invocation;
mod modifiers;
mod runner;

pub use flags::{
    quote_token, tokenize_pipeline, Arg, FlagParseError, FlagSet, Tunable, TunableKind,
    SCALE_FLOOR, THROTTLE_FLOOR,
};
pub use invocation::{parse_pipeline, CommandInvocation, ProcessSpec};
pub use modifiers::{Modifiers, ToolFamily};
pub use runner::{CommandRunner, ProcessRunner, RunFailure, DEFAULT_STDERR_LIMIT};

#[cfg(test)]
pub use runner::MockCommandRunner;
