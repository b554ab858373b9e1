//! Logging setup and wide events.

mod logging;
mod wide_events;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use wide_events::WideEventEmitter;
