use crate::context::LogContext;
use crate::handler::Handler;
use crate::record::{Attr, Level, Record, Source, Value};
use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanRecord};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`Record`]s and
/// hands them to a [`Handler`].
///
/// Fields of the enclosing spans, root first, come before the event's
/// own fields. The request context is taken from
/// [`LogContext::current`], so events emitted inside a
/// [`crate::middleware::TraceContextLayer`] service carry its trace.
pub struct HandlerLayer<H> {
    handler: H,
}

impl<H> HandlerLayer<H>
where
    H: Handler + 'static,
{
    pub fn new(handler: H) -> Self {
        HandlerLayer { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Key of a span's own `message` field. Kept apart from the event message,
/// which handlers write under the built-in message slot.
pub const SPAN_MESSAGE_KEY: &str = "span.message";

/// Fields recorded on a span, kept in the span's extensions. Shared by
/// every `HandlerLayer` on the same registry.
struct SpanFields(Vec<Attr>);

impl<S, H> Layer<S> for HandlerLayer<H>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    H: Handler + 'static,
{
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata.is_span() || self.handler.enabled(Level::from(metadata.level()))
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        if span.extensions().get::<SpanFields>().is_some() {
            return;
        }
        let mut fields = Vec::new();
        let mut message = None;
        attrs.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        if let Some(message) = message {
            fields.push(Attr::new(SPAN_MESSAGE_KEY, message));
        }
        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &SpanRecord<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() else {
            return;
        };
        let mut recorded = Vec::new();
        let mut message = None;
        values.record(&mut FieldVisitor {
            fields: &mut recorded,
            message: &mut message,
        });
        if let Some(message) = message {
            recorded.push(Attr::new(SPAN_MESSAGE_KEY, message));
        }
        for attr in recorded {
            match fields.iter_mut().find(|existing| existing.key == attr.key) {
                Some(existing) => existing.value = attr.value,
                None => fields.push(attr),
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(meta.level());
        if !self.handler.enabled(level) {
            return;
        }

        let mut attrs = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    attrs.extend(fields.iter().cloned());
                }
            }
        }

        let mut message = None;
        event.record(&mut FieldVisitor {
            fields: &mut attrs,
            message: &mut message,
        });

        let record = Record {
            time: Utc::now(),
            level,
            message: message.unwrap_or_default(),
            attrs,
            source: Some(Source {
                function: meta.module_path().map(|s| s.to_string()),
                file: meta.file().map(|s| s.to_string()),
                line: meta.line(),
            }),
        };

        // Logging through `tracing` from here would re-enter this layer.
        if let Err(e) = self.handler.handle(&LogContext::current(), &record) {
            eprintln!("error handling log record: {}", e);
        }
    }
}

/// Collects `tracing` fields as [`Attr`]s, pulling out `message`.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<Attr>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push(Attr {
            key: field.name().to_string(),
            value,
        });
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, Value::from(format!("{:?}", value)));
        }
    }
}
