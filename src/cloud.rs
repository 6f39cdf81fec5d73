use crate::context::LogContext;
use crate::handler::{Handler, HandlerError};
use crate::json::{JsonHandler, JsonOptions, ReplaceAttr, LEVEL_KEY, MESSAGE_KEY, SOURCE_KEY};
use crate::platform::Platform;
use crate::record::{Attr, Level, Record};
use crate::trace::trace_from_context;
use chrono::Utc;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Correlates an entry with the request trace.
/// See <https://cloud.google.com/trace/docs/trace-log-integration>.
pub const TRACE_KEY: &str = "logging.googleapis.com/trace";

pub const SOURCE_LOCATION_KEY: &str = "logging.googleapis.com/sourceLocation";

/// Marks an entry for Error Reporting ingestion.
pub const TYPE_KEY: &str = "@type";

/// See <https://cloud.google.com/error-reporting/docs/formatting-error-messages#log-text>.
pub const REPORTED_ERROR_EVENT: &str =
    "type.googleapis.com/google.devtools.clouderrorreporting.v1beta1.ReportedErrorEvent";

pub const SERVICE_CONTEXT_KEY: &str = "serviceContext";

/// Delivery time of the entry, written next to the record's own `time`.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Handler emitting Google Cloud Logging structured JSON.
///
/// Built-in keys are renamed to the names Cloud Logging understands, and
/// every entry gains trace correlation (when the context carries a
/// trace), an Error Reporting marker (for errors), the service context
/// and a delivery timestamp. These synthetic keys are always written at
/// the top level of the entry.
pub struct CloudHandler<W = fn() -> io::Stderr> {
    project_id: Arc<str>,
    platform: Platform,
    inner: JsonHandler<W>,
}

impl<W> Clone for CloudHandler<W> {
    fn clone(&self) -> Self {
        CloudHandler {
            project_id: Arc::clone(&self.project_id),
            platform: self.platform.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl CloudHandler {
    /// Handler writing to standard error, the stream Cloud Run and App
    /// Engine collect.
    pub fn new(project_id: impl Into<String>, level: Level) -> Self {
        CloudHandler::with_writer(project_id, level, io::stderr as fn() -> io::Stderr)
    }
}

impl<W> CloudHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    pub fn with_writer(project_id: impl Into<String>, level: Level, writer: W) -> Self {
        let options = JsonOptions {
            add_source: true,
            level,
            replace_attr: Some(cloud_keys()),
        };
        CloudHandler {
            project_id: Arc::from(project_id.into()),
            platform: Platform::current().clone(),
            inner: JsonHandler::new(writer, options),
        }
    }

    /// Override the detected platform identity.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Middleware that stores request traces qualified with this
    /// handler's project id.
    #[cfg(feature = "middleware")]
    pub fn trace_layer(&self) -> crate::middleware::TraceContextLayer {
        crate::middleware::TraceContextLayer::new(self.project_id.to_string())
    }

    fn synthetic_attrs(&self, ctx: &LogContext, record: &Record) -> Vec<Attr> {
        let mut attrs = Vec::with_capacity(4);
        if let Some(trace) = trace_from_context(ctx).filter(|trace| !trace.is_empty()) {
            attrs.push(Attr::new(TRACE_KEY, trace));
        }
        if record.level >= Level::Error {
            attrs.push(Attr::new(TYPE_KEY, REPORTED_ERROR_EVENT));
        }
        attrs.push(Attr::group(
            SERVICE_CONTEXT_KEY,
            vec![Attr::new("service", self.platform.service_name())],
        ));
        attrs.push(Attr::new(TIMESTAMP_KEY, Utc::now()));
        attrs
    }
}

/// Rename the top-level built-ins; everything else passes through.
fn cloud_keys() -> ReplaceAttr {
    Arc::new(|groups: &[String], mut attr: Attr| {
        if !groups.is_empty() {
            return attr;
        }
        let renamed = match attr.key.as_str() {
            MESSAGE_KEY => "message",
            LEVEL_KEY => "severity",
            SOURCE_KEY => SOURCE_LOCATION_KEY,
            _ => return attr,
        };
        attr.key = renamed.to_string();
        attr
    })
}

impl<W> Handler for CloudHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fn enabled(&self, level: Level) -> bool {
        self.inner.enabled(level)
    }

    fn handle(&self, ctx: &LogContext, record: &Record) -> Result<(), HandlerError> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        let synthetic = self.synthetic_attrs(ctx, record);
        self.inner.emit(record, synthetic)
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        CloudHandler {
            project_id: Arc::clone(&self.project_id),
            platform: self.platform.clone(),
            inner: self.inner.with_attrs(attrs),
        }
    }

    fn with_group(&self, name: &str) -> Self {
        CloudHandler {
            project_id: Arc::clone(&self.project_id),
            platform: self.platform.clone(),
            inner: self.inner.with_group(name),
        }
    }
}
