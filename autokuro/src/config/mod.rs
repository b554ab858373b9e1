//! Configuration loading and validation.
//!
//! The YAML document is parsed into [`ReconConfig`] and validated against an
//! explicit schema before any stage runs. Mode tables are turned into typed
//! [`ModeFlags`] on demand.

mod mode;
mod settings;

pub use mode::{ModeFlags, OPTIONAL_MODE_KEYS, REQUIRED_MODE_KEYS};
pub use settings::{
    BackoffConfig, HardwareProfile, HardwareProfileConfig, ReconConfig, TelegramConfig,
    DEFAULT_CONFIG_PATH, DEFAULT_PRIORITY_KEYWORDS,
};
