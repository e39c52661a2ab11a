//! In-memory capture of encoded log output for tests.

use std::io;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use super::Logger;

/// Collects everything a [`Logger`] writes and parses it back into records.
#[derive(Clone, Default)]
pub(crate) struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
}

/// One parsed line of [`TextFormat`](super::TextFormat) output.
#[derive(Debug)]
pub(crate) struct Record {
    pub level: String,
    pub target: String,
    pub caller: String,
    pub message: String,
    pub fields: Map<String, Value>,
    pub stack: Option<String>,
}

impl Capture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn logger(&self) -> Logger {
        let buf = Arc::clone(&self.buf);
        Logger::with_writer(move || Writer(Arc::clone(&buf)))
    }

    pub(crate) fn raw(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }

    pub(crate) fn records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = Vec::new();
        for line in self.raw().lines() {
            if let Some(frame) = line.strip_prefix('\t') {
                let record = records.last_mut().expect("stack line before any record");
                let stack = record.stack.get_or_insert_with(String::new);
                if !stack.is_empty() {
                    stack.push('\n');
                }
                stack.push_str(frame);
                continue;
            }

            let columns: Vec<&str> = line.splitn(6, '\t').collect();
            assert!(columns.len() >= 5, "malformed record: {line:?}");
            let fields = match columns.get(5) {
                Some(json) => serde_json::from_str(json).unwrap(),
                None => Map::new(),
            };
            records.push(Record {
                level: columns[1].to_owned(),
                target: columns[2].to_owned(),
                caller: columns[3].to_owned(),
                message: columns[4].to_owned(),
                fields,
                stack: None,
            });
        }
        records
    }
}

struct Writer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
