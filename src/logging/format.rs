//! Text encoder for log records.
//!
//! One record per line, tab separated:
//!
//! ```text
//! 2026-10-19T08:12:45.031207Z  info  warden::middleware::logger  middleware/logger.rs:47  /hello  {"status":200,...}
//! ```
//!
//! Timestamp (RFC 3339, UTC), lowercase level, logger name (the event
//! target), short caller, message, then the remaining fields as a JSON object
//! in recording order. A `stack` field is not put in the object; its lines
//! follow the record, each indented by one tab.

use std::fmt;

use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const MESSAGE: &str = "message";
const STACK: &str = "stack";

/// `FormatEvent` producing the line layout described in the module docs.
#[derive(Debug, Default)]
pub struct TextFormat {
    timer: SystemTime,
}

impl<S, N> FormatEvent<S, N> for TextFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        if self.timer.format_time(&mut writer).is_err() {
            writer.write_str("<unknown time>")?;
        }
        write!(writer, "\t{}\t{}", level_name(meta.level()), meta.target())?;
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            write!(writer, "\t{}:{}", short_caller(file), line)?;
        }

        let mut record = Collector::default();
        event.record(&mut record);

        write!(writer, "\t{}", record.message)?;
        if !record.fields.is_empty() {
            write!(writer, "\t{}", Value::Object(record.fields))?;
        }
        writeln!(writer)?;

        if let Some(stack) = record.stack {
            for line in stack.lines() {
                writeln!(writer, "\t{line}")?;
            }
        }
        Ok(())
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        _ => "trace",
    }
}

/// Keeps the last directory and the file name: `src/middleware/logger.rs`
/// becomes `middleware/logger.rs`.
fn short_caller(file: &str) -> &str {
    let is_sep = |c: char| c == '/' || c == '\\';
    let Some(last) = file.rfind(is_sep) else { return file };
    match file[..last].rfind(is_sep) {
        Some(prev) => &file[prev + 1..],
        None => file,
    }
}

#[derive(Default)]
struct Collector {
    message: String,
    stack: Option<String>,
    fields: Map<String, Value>,
}

impl Collector {
    fn text(&mut self, field: &Field, value: String) {
        match field.name() {
            MESSAGE => self.message = value,
            STACK => self.stack = Some(value),
            name => {
                self.fields.insert(name.to_owned(), Value::String(value));
            }
        }
    }

    fn value(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_owned(), value);
    }
}

impl Visit for Collector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.text(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.text(field, value.to_owned());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.value(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.value(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.value(field, Number::from_f64(value).map_or(Value::Null, Value::Number));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.value(field, value.into());
    }
}
