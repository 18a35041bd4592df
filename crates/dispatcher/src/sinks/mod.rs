//! Sink implementations
//!
//! Log, stdout, queue republish, REST, object store, and database.

mod database;
mod log;
mod object_store;
mod queue;
mod rest;
mod stdout;

pub use self::database::DatabaseSink;
pub use self::log::LogSink;
pub use self::object_store::ObjectStoreSink;
pub use self::queue::QueueSink;
pub use self::rest::RestSink;
pub use self::stdout::StdoutSink;
