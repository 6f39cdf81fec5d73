//! Capture writers for unit tests.

use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Stores every `write` call as a separate entry.
#[derive(Clone, Default)]
pub(crate) struct ListWriter {
    store: Arc<Mutex<Vec<String>>>,
}

impl ListWriter {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.store.lock().unwrap().clone()
    }
}

pub(crate) struct ListEntry {
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

/// A sink whose every write fails, like a closed pipe.
#[derive(Clone, Copy, Default)]
pub(crate) struct BrokenWriter;

impl io::Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BrokenWriter {
    type Writer = BrokenWriter;

    fn make_writer(&'a self) -> Self::Writer {
        *self
    }
}
