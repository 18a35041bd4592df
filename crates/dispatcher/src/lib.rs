//! # Dispatcher
//!
//! Output dispatcher: resolves configured output modes to sink handlers,
//! validates batch shape before any sink is attempted, applies retry to the
//! queue republish path, and honors the paper-trading override that
//! redirects all output to a single sink.
//!
//! Sink failures are recorded and isolated - one sink failing never aborts
//! dispatch to the remaining configured modes.

mod dispatcher;
mod error;
mod sinks;

pub use dispatcher::{
    DispatchSummary, DispatcherBuilder, DispatcherConfig, OutputDispatcher, SinkDependencies,
    SinkOutcome,
};
pub use error::DispatcherError;
pub use sinks::{DatabaseSink, LogSink, ObjectStoreSink, QueueSink, RestSink, StdoutSink};
