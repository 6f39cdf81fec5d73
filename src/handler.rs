use crate::context::LogContext;
use crate::record::{Attr, Level, Record};
use std::io;

/// Error returned by [`Handler::handle`].
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("attribute {key:?} has unsupported float value {value}")]
    UnsupportedFloat { key: String, value: f64 },

    #[error("failed to write log record: {0}")]
    Io(#[from] io::Error),
}

/// Sink-side transformer for [`Record`]s.
///
/// Handlers are immutable configuration values. `with_attrs` and
/// `with_group` return a new handler layered on top of the receiver,
/// which keeps its own behavior; all derived handlers share the
/// receiver's output sink.
pub trait Handler: Send + Sync {
    /// Whether a record at `level` would be written at all.
    fn enabled(&self, level: Level) -> bool;

    /// Transform and write a single record.
    ///
    /// **Parameters**
    /// - `ctx`: request-scoped context the record was produced in. May
    ///   carry a trace identifier.
    /// - `record`: the record as produced by the logging call. It is
    ///   never modified.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was written or skipped by level.
    /// - `Err(..)` if it could not be rendered or the sink write failed.
    ///   Nothing is written in the first case; there is no retry in the
    ///   second.
    fn handle(&self, ctx: &LogContext, record: &Record) -> Result<(), HandlerError>;

    /// Derive a handler whose records also carry `attrs`, placed under
    /// the groups open at the time of the call.
    fn with_attrs(&self, attrs: Vec<Attr>) -> Self
    where
        Self: Sized;

    /// Derive a handler that nests all later attributes under `name`.
    /// An empty name returns an equivalent handler.
    fn with_group(&self, name: &str) -> Self
    where
        Self: Sized;
}
