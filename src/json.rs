use crate::context::LogContext;
use crate::handler::{Handler, HandlerError};
use crate::record::{Attr, Level, Record, Value};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value as Json};
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Key of the built-in record time.
pub const TIME_KEY: &str = "time";
/// Key of the built-in record level.
pub const LEVEL_KEY: &str = "level";
/// Key of the built-in record message.
pub const MESSAGE_KEY: &str = "msg";
/// Key of the built-in source location.
pub const SOURCE_KEY: &str = "source";

/// Hook called for every non-group attribute, built-ins included, with
/// the list of groups the attribute sits in. Returns the attribute to
/// write instead.
pub type ReplaceAttr = Arc<dyn Fn(&[String], Attr) -> Attr + Send + Sync>;

/// Options for [`JsonHandler`].
#[derive(Clone, Default)]
pub struct JsonOptions {
    /// Emit the record's source location under [`SOURCE_KEY`].
    pub add_source: bool,
    /// Records below this level are skipped.
    pub level: Level,
    pub replace_attr: Option<ReplaceAttr>,
}

impl fmt::Debug for JsonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonOptions")
            .field("add_source", &self.add_source)
            .field("level", &self.level)
            .field("replace_attr", &self.replace_attr.is_some())
            .finish()
    }
}

/// Attributes bound by `with_attrs`, with the group path open at the time.
#[derive(Clone, Debug)]
struct BoundAttrs {
    groups: Vec<String>,
    attrs: Vec<Attr>,
}

/// Handler writing each record as one line of JSON.
///
/// The writer is shared by every handler derived from this one; each
/// record is rendered into memory first and written with a single
/// `write_all`.
pub struct JsonHandler<W = fn() -> io::Stderr> {
    writer: Arc<W>,
    options: JsonOptions,
    groups: Vec<String>,
    bound: Vec<BoundAttrs>,
}

impl<W> Clone for JsonHandler<W> {
    fn clone(&self) -> Self {
        JsonHandler {
            writer: Arc::clone(&self.writer),
            options: self.options.clone(),
            groups: self.groups.clone(),
            bound: self.bound.clone(),
        }
    }
}

impl<W> fmt::Debug for JsonHandler<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonHandler")
            .field("options", &self.options)
            .field("groups", &self.groups)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl JsonHandler {
    /// Handler writing to standard error.
    pub fn stderr(options: JsonOptions) -> Self {
        JsonHandler::new(io::stderr as fn() -> io::Stderr, options)
    }
}

impl<W> JsonHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    pub fn new(writer: W, options: JsonOptions) -> Self {
        JsonHandler {
            writer: Arc::new(writer),
            options,
            groups: Vec::new(),
            bound: Vec::new(),
        }
    }

    /// Render everything except the built-ins: bound attributes, then the
    /// record's attributes under the open groups.
    pub(crate) fn attributes(&self, record: &Record) -> Result<Map<String, Json>, HandlerError> {
        let mut object = Map::new();
        for bound in &self.bound {
            self.append_at(&mut object, &bound.groups, &bound.attrs)?;
        }
        self.append_at(&mut object, &self.groups, &record.attrs)?;
        Ok(object)
    }

    /// Render the full object for `record`, with `root` attributes appended
    /// at the top level regardless of open groups.
    pub(crate) fn object(&self, record: &Record, root: Vec<Attr>) -> Result<Map<String, Json>, HandlerError> {
        let mut builtins = vec![
            Attr::new(TIME_KEY, record.time),
            Attr::new(LEVEL_KEY, record.level.as_str()),
        ];
        if self.options.add_source {
            if let Some(source) = &record.source {
                builtins.push(Attr::new(SOURCE_KEY, Value::any(source.clone())));
            }
        }
        builtins.push(Attr::new(MESSAGE_KEY, record.message.as_str()));

        let mut object = Map::new();
        for attr in builtins {
            self.append_attr(&mut object, &[], attr)?;
        }
        object.extend(self.attributes(record)?);
        for attr in root {
            self.append_attr(&mut object, &[], attr)?;
        }
        Ok(object)
    }

    /// Render `record` plus `root` attributes and write it as one line.
    pub(crate) fn emit(&self, record: &Record, root: Vec<Attr>) -> Result<(), HandlerError> {
        let object = self.object(record, root)?;
        let mut buf = serde_json::to_vec(&object)?;
        buf.push(b'\n');
        self.write(&buf)
    }

    pub(crate) fn write(&self, buf: &[u8]) -> Result<(), HandlerError> {
        let mut writer = self.writer.make_writer();
        writer.write_all(buf)?;
        writer.flush()?;
        Ok(())
    }

    fn append_at(
        &self,
        object: &mut Map<String, Json>,
        groups: &[String],
        attrs: &[Attr],
    ) -> Result<(), HandlerError> {
        let mut nested = Map::new();
        for attr in attrs {
            self.append_attr(&mut nested, groups, attr.clone())?;
        }
        if !nested.is_empty() {
            merge_at(object, groups, nested);
        }
        Ok(())
    }

    fn append_attr(
        &self,
        object: &mut Map<String, Json>,
        groups: &[String],
        attr: Attr,
    ) -> Result<(), HandlerError> {
        let attr = match &self.options.replace_attr {
            Some(replace) if !attr.value.is_group() => replace(groups, attr),
            _ => attr,
        };

        let json = match attr.value {
            Value::Group(attrs) => {
                if attr.key.is_empty() {
                    for attr in attrs {
                        self.append_attr(object, groups, attr)?;
                    }
                    return Ok(());
                }
                let mut path = groups.to_vec();
                path.push(attr.key.clone());
                let mut nested = Map::new();
                for attr in attrs {
                    self.append_attr(&mut nested, &path, attr)?;
                }
                if !nested.is_empty() {
                    merge_at(object, &[attr.key], nested);
                }
                return Ok(());
            }
            _ if attr.key.is_empty() => return Ok(()),
            Value::Str(s) => Json::String(s),
            Value::I64(n) => Json::from(n),
            Value::U64(n) => Json::from(n),
            Value::F64(n) => match Number::from_f64(n) {
                Some(number) => Json::Number(number),
                None => {
                    return Err(HandlerError::UnsupportedFloat {
                        key: attr.key,
                        value: n,
                    })
                }
            },
            Value::Bool(b) => Json::Bool(b),
            Value::Time(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Any(value) => value.to_json()?,
        };
        object.insert(attr.key, json);
        Ok(())
    }
}

/// Merge `nested` into the object found at `path`, creating objects on
/// the way and replacing non-object values that stand in the path.
fn merge_at(object: &mut Map<String, Json>, path: &[String], nested: Map<String, Json>) {
    let mut wrapped = nested;
    for key in path.iter().rev() {
        let mut parent = Map::new();
        parent.insert(key.clone(), Json::Object(wrapped));
        wrapped = parent;
    }
    merge(object, wrapped);
}

fn merge(target: &mut Map<String, Json>, source: Map<String, Json>) {
    for (key, value) in source {
        match value {
            Json::Object(incoming) => match target.get_mut(&key) {
                Some(Json::Object(existing)) => merge(existing, incoming),
                _ => {
                    target.insert(key, Json::Object(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

impl<W> Handler for JsonHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fn enabled(&self, level: Level) -> bool {
        level >= self.options.level
    }

    fn handle(&self, _ctx: &LogContext, record: &Record) -> Result<(), HandlerError> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        self.emit(record, Vec::new())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        let mut handler = self.clone();
        if !attrs.is_empty() {
            handler.bound.push(BoundAttrs {
                groups: self.groups.clone(),
                attrs,
            });
        }
        handler
    }

    fn with_group(&self, name: &str) -> Self {
        let mut handler = self.clone();
        if !name.is_empty() {
            handler.groups.push(name.to_string());
        }
        handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;
    use crate::testing::ListWriter;
    use serde_json::json;
    use std::collections::HashMap;

    fn handler(writer: &ListWriter, options: JsonOptions) -> JsonHandler<ListWriter> {
        JsonHandler::new(writer.clone(), options)
    }

    fn last_object(writer: &ListWriter) -> Json {
        let lines = writer.lines();
        let line = lines.last().expect("a line was written");
        serde_json::from_str(line).expect("valid json")
    }

    #[test]
    fn writes_builtins_then_attributes() {
        let writer = ListWriter::default();
        let h = handler(&writer, JsonOptions::default());
        let record = Record::new(Level::Info, "hello").with_attr(Attr::new("user", 42));
        h.handle(&LogContext::new(), &record).unwrap();

        let line = &writer.lines()[0];
        assert!(line.ends_with("}\n"));
        let object = last_object(&writer);
        let keys: Vec<&str> = object.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["time", "level", "msg", "user"]);
        assert_eq!(object["level"], "INFO");
        assert_eq!(object["msg"], "hello");
        assert_eq!(object["user"], 42);
    }

    #[test]
    fn skips_records_below_level() {
        let writer = ListWriter::default();
        let h = handler(
            &writer,
            JsonOptions {
                level: Level::Warn,
                ..JsonOptions::default()
            },
        );
        assert!(!h.enabled(Level::Info));
        h.handle(&LogContext::new(), &Record::new(Level::Info, "quiet")).unwrap();
        assert!(writer.lines().is_empty());
    }

    #[test]
    fn source_only_when_requested() {
        let writer = ListWriter::default();
        let record = Record::new(Level::Info, "located").with_source(Source {
            function: Some("app::handler".to_string()),
            file: Some("src/handler.rs".to_string()),
            line: Some(12),
        });

        handler(&writer, JsonOptions::default())
            .handle(&LogContext::new(), &record)
            .unwrap();
        assert!(last_object(&writer).get("source").is_none());

        handler(
            &writer,
            JsonOptions {
                add_source: true,
                ..JsonOptions::default()
            },
        )
        .handle(&LogContext::new(), &record)
        .unwrap();
        assert_eq!(
            last_object(&writer)["source"],
            json!({"function": "app::handler", "file": "src/handler.rs", "line": 12})
        );
    }

    #[test]
    fn groups_nest_bound_and_record_attributes() {
        let writer = ListWriter::default();
        let h = handler(&writer, JsonOptions::default())
            .with_attrs(vec![Attr::new("app", "billing")])
            .with_group("request")
            .with_attrs(vec![Attr::new("id", "r-1")])
            .with_group("db");
        let record = Record::new(Level::Info, "query").with_attr(Attr::new("rows", 3u64));
        h.handle(&LogContext::new(), &record).unwrap();

        let object = last_object(&writer);
        assert_eq!(object["app"], "billing");
        assert_eq!(object["request"], json!({"id": "r-1", "db": {"rows": 3}}));
    }

    #[test]
    fn empty_groups_are_omitted_and_unnamed_groups_inlined() {
        let writer = ListWriter::default();
        let h = handler(&writer, JsonOptions::default()).with_group("unused");
        let record = Record::new(Level::Info, "shape")
            .with_attr(Attr::group("empty", vec![]))
            .with_attr(Attr::group("", vec![Attr::new("inlined", true)]))
            .with_attr(Attr::new("", "dropped"));
        h.handle(&LogContext::new(), &record).unwrap();

        let object = last_object(&writer);
        assert_eq!(object["unused"], json!({"inlined": true}));
        assert!(object["unused"].get("empty").is_none());

        let record = Record::new(Level::Info, "nothing").with_attr(Attr::group("empty", vec![]));
        h.handle(&LogContext::new(), &record).unwrap();
        assert!(last_object(&writer).get("unused").is_none());
    }

    #[test]
    fn replace_attr_sees_group_path() {
        let writer = ListWriter::default();
        let replace: ReplaceAttr = Arc::new(|groups: &[String], mut attr: Attr| {
            if groups.is_empty() && attr.key == MESSAGE_KEY {
                attr.key = "text".to_string();
            } else if !groups.is_empty() {
                attr.key = format!("{}.{}", groups.join("."), attr.key);
            }
            attr
        });
        let h = handler(
            &writer,
            JsonOptions {
                replace_attr: Some(replace),
                ..JsonOptions::default()
            },
        )
        .with_group("g");
        let record = Record::new(Level::Info, "renamed").with_attr(Attr::new("k", 1));
        h.handle(&LogContext::new(), &record).unwrap();

        let object = last_object(&writer);
        assert_eq!(object["text"], "renamed");
        assert_eq!(object["g"], json!({"g.k": 1}));
    }

    #[test]
    fn unrenderable_values_fail_without_writing() {
        let writer = ListWriter::default();
        let h = handler(&writer, JsonOptions::default());

        let record = Record::new(Level::Info, "nan").with_attr(Attr::new("ratio", f64::NAN));
        let err = h.handle(&LogContext::new(), &record).unwrap_err();
        assert!(matches!(err, HandlerError::UnsupportedFloat { ref key, .. } if key == "ratio"));

        let mut bad_keys = HashMap::new();
        bad_keys.insert((1, 2), "tuple keys");
        let record = Record::new(Level::Info, "map").with_attr(Attr::new("bad", Value::any(bad_keys)));
        let err = h.handle(&LogContext::new(), &record).unwrap_err();
        assert!(matches!(err, HandlerError::Serialize(_)));

        assert!(writer.lines().is_empty());
    }

    #[test]
    fn sink_errors_are_returned() {
        let h = JsonHandler::new(crate::testing::BrokenWriter, JsonOptions::default());
        let err = h
            .handle(&LogContext::new(), &Record::new(Level::Error, "lost"))
            .unwrap_err();
        assert!(matches!(err, HandlerError::Io(_)));
    }

    #[test]
    fn deriving_leaves_the_receiver_unchanged() {
        let writer = ListWriter::default();
        let base = handler(&writer, JsonOptions::default());
        let _derived = base.with_group("g").with_attrs(vec![Attr::new("k", "v")]);

        base.handle(&LogContext::new(), &Record::new(Level::Info, "plain")).unwrap();
        let object = last_object(&writer);
        assert!(object.get("g").is_none());
        assert!(object.get("k").is_none());
    }

    #[test]
    fn group_path_replaces_scalar_of_same_name() {
        let writer = ListWriter::default();
        let h = handler(&writer, JsonOptions::default())
            .with_attrs(vec![Attr::new("request", "plain")])
            .with_group("request")
            .with_group("db");
        let record = Record::new(Level::Info, "shadowed").with_attr(Attr::new("rows", 2));
        h.handle(&LogContext::new(), &record).unwrap();

        assert_eq!(last_object(&writer)["request"], json!({"db": {"rows": 2}}));
    }
}
