#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Sink that keeps every `write` call as its own entry, so a record split
/// across several writes shows up as several entries.
#[derive(Clone, Default)]
pub struct ListWriter {
    store: Arc<Mutex<Vec<String>>>,
}

impl ListWriter {
    pub fn lines(&self) -> Vec<String> {
        self.store.lock().unwrap().clone()
    }
}

pub struct ListEntry {
    store: Arc<Mutex<Vec<String>>>,
}

impl io::Write for ListEntry {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.store
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for ListWriter {
    type Writer = ListEntry;

    fn make_writer(&'a self) -> Self::Writer {
        ListEntry {
            store: Arc::clone(&self.store),
        }
    }
}

pub fn parse(line: &str) -> serde_json::Value {
    serde_json::from_str(line).unwrap_or_else(|e| panic!("invalid json {line:?}: {e}"))
}
