use crate::context::LogContext;
use crate::handler::{Handler, HandlerError};
use crate::json::{JsonHandler, JsonOptions};
use crate::record::{Attr, Level, Record};
use chrono::Local;
use std::io;
use tracing_subscriber::fmt::MakeWriter;

const RED: &str = "\x1b[0;31m";
const YELLOW: &str = "\x1b[0;33m";
const BLUE: &str = "\x1b[0;34m";
const MAGENTA: &str = "\x1b[0;35m";
const CYAN: &str = "\x1b[0;36m";

pub const RESET: &str = "\x1b[0m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => MAGENTA,
        Level::Info => BLUE,
        Level::Warn => YELLOW,
        Level::Error => RED,
    }
}

/// Handler printing one colorized, human-oriented line per record:
///
/// ```text
/// [15:04:05.000] INFO: message {
///   "key": "value"
/// }
/// ```
///
/// Attributes are resolved exactly as [`JsonHandler`] would, then
/// pretty-printed.
pub struct LocalHandler<W = fn() -> io::Stderr> {
    inner: JsonHandler<W>,
}

impl<W> Clone for LocalHandler<W> {
    fn clone(&self) -> Self {
        LocalHandler {
            inner: self.inner.clone(),
        }
    }
}

impl LocalHandler {
    pub fn new(level: Level) -> Self {
        LocalHandler::with_writer(level, io::stderr as fn() -> io::Stderr)
    }
}

impl<W> LocalHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    pub fn with_writer(level: Level, writer: W) -> Self {
        let options = JsonOptions {
            level,
            ..JsonOptions::default()
        };
        LocalHandler {
            inner: JsonHandler::new(writer, options),
        }
    }

    fn render(&self, record: &Record) -> Result<String, HandlerError> {
        let attrs = serde_json::to_string_pretty(&self.inner.attributes(record)?)?;
        let time = record.time.with_timezone(&Local).format("%H:%M:%S%.3f");
        Ok(format!(
            "[{time}] {color}{level}:{RESET} {CYAN}{message}{RESET} {attrs}\n",
            color = level_color(record.level),
            level = record.level,
            message = record.message,
        ))
    }
}

impl<W> Handler for LocalHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fn enabled(&self, level: Level) -> bool {
        self.inner.enabled(level)
    }

    fn handle(&self, _ctx: &LogContext, record: &Record) -> Result<(), HandlerError> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        let line = self.render(record)?;
        self.inner.write(line.as_bytes())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        LocalHandler {
            inner: self.inner.with_attrs(attrs),
        }
    }

    fn with_group(&self, name: &str) -> Self {
        LocalHandler {
            inner: self.inner.with_group(name),
        }
    }
}
