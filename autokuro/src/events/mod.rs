//! Event sink system for observability.
//!
//! The sequencer reports progress as [`PipelineEvent`]s through an
//! [`EventSink`]. Front-ends plug in their own sink for progress rendering.

mod event;
mod sink;

pub use event::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
