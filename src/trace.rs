//! Trace identifiers derived from inbound requests.
//!
//! The value is stored in a [`LogContext`] under a private key type, so
//! only [`with_trace`] can set it and only [`trace_from_context`] can
//! read it.

use crate::context::LogContext;

/// Header set by Google front ends: `TRACE_ID/SPAN_ID;o=OPTIONS`.
pub const TRACE_HEADER: &str = "x-cloud-trace-context";

#[derive(Clone, Debug)]
struct TraceKey(String);

/// Build the fully-qualified trace resource name from a raw header value.
///
/// Returns `None` when the header has no leading trace id segment.
pub fn trace_resource(project_id: &str, header: &str) -> Option<String> {
    let trace_id = header.split('/').next().filter(|id| !id.is_empty())?;
    Some(format!("projects/{}/traces/{}", project_id, trace_id))
}

/// Derive a context carrying `trace`. An empty trace means "no trace".
pub fn with_trace(ctx: &LogContext, trace: impl Into<String>) -> LogContext {
    ctx.with_value(TraceKey(trace.into()))
}

/// The trace stored by [`with_trace`], if any.
pub fn trace_from_context(ctx: &LogContext) -> Option<&str> {
    ctx.value::<TraceKey>().map(|key| key.0.as_str())
}
