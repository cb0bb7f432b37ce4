//! Loading raw events from files, pipes and captured program output
//!
//! Three encodings are accepted:
//!
//! - a JSON array of events;
//! - NDJSON, one event per line (blank lines skipped);
//! - tagged output: arbitrary text in which instrumented programs embed
//!   events as `<trace id="...">{json}</trace>`. Text around the tags is
//!   ordinary program output and is passed through untouched.
//!
//! `Auto` picks one from the content: a leading `[` means JSON, any `<trace`
//! tag means tagged, anything else is read as NDJSON.

use crate::error::{Result, TimelineError};
use crate::event::RawEvent;
use clap::ValueEnum;
use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// `<trace id="...">...</trace>`, non-greedy so several tags share a line
static TRACE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<trace id="([^"]*)">(.*?)</trace>"#).expect("Invalid trace tag regex pattern")
});

const TRACE_TAG_OPEN: &str = "<trace";

/// Input encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputFormat {
    /// Detect from content
    #[default]
    Auto,
    /// JSON array of events
    Json,
    /// One JSON event per line
    Ndjson,
    /// Program output with embedded trace tags
    Tagged,
}

/// One line of tagged output split into program text and events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedLine {
    /// The line with every complete trace tag removed
    pub passthrough: String,
    pub events: Vec<RawEvent>,
}

impl TaggedLine {
    /// Whether the passthrough text has anything worth printing
    pub fn has_text(&self) -> bool {
        !self
            .passthrough
            .trim_matches(|c: char| c.is_whitespace() || c == '\x08')
            .is_empty()
    }
}

/// Resolve `Auto` against the content
pub fn detect_format(text: &str) -> InputFormat {
    if text.trim_start().starts_with('[') {
        InputFormat::Json
    } else if text.contains(TRACE_TAG_OPEN) {
        InputFormat::Tagged
    } else {
        InputFormat::Ndjson
    }
}

/// Parse every event in `text`
///
/// # Example
/// ```
/// use tracelines::ingest::{parse_events, InputFormat};
///
/// let text = r#"hello <trace id="a">{"trace_id":"a","parent_id":"orphan-1","trace_type":"Enter","timestamp":1,"start_pos":{"filepath":"x.js","line":1,"column":0},"end_pos":{"filepath":"x.js","line":1,"column":9}}</trace>"#;
/// let events = parse_events(text, InputFormat::Auto).unwrap();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].trace_id, "a");
/// ```
pub fn parse_events(text: &str, format: InputFormat) -> Result<Vec<RawEvent>> {
    let format = match format {
        InputFormat::Auto => detect_format(text),
        other => other,
    };
    tracing::debug!(?format, bytes = text.len(), "Parsing events");

    match format {
        InputFormat::Json => parse_json_array(text),
        InputFormat::Ndjson => parse_ndjson(text),
        InputFormat::Tagged | InputFormat::Auto => parse_tagged(text),
    }
}

/// Parse a JSON array of events
pub fn parse_json_array(text: &str) -> Result<Vec<RawEvent>> {
    serde_json::from_str(text).map_err(|e| TimelineError::Ingest {
        line: e.line(),
        message: e.to_string(),
    })
}

/// Parse one event per non-blank line
pub fn parse_ndjson(text: &str) -> Result<Vec<RawEvent>> {
    let mut events = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        events.push(parse_event(line, idx + 1)?);
    }
    Ok(events)
}

/// Collect the events embedded in tagged program output
pub fn parse_tagged(text: &str) -> Result<Vec<RawEvent>> {
    let mut events = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        events.extend(extract_tagged_traces(line, idx + 1)?.events);
    }
    Ok(events)
}

/// Split one line of program output into text and embedded events
///
/// An opening tag without its closing `</trace>` is left in the text.
pub fn extract_tagged_traces(line: &str, line_number: usize) -> Result<TaggedLine> {
    let mut tagged = TaggedLine::default();
    let mut cursor = 0;

    for caps in TRACE_TAG_RE.captures_iter(line) {
        let (Some(whole), Some(id), Some(body)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };

        tagged.passthrough.push_str(&line[cursor..whole.start()]);
        cursor = whole.end();

        let event = parse_event(body.as_str(), line_number)?;
        if event.trace_id != id.as_str() {
            tracing::warn!(
                line = line_number,
                tag_id = id.as_str(),
                trace_id = %event.trace_id,
                "Trace tag id differs from embedded trace_id"
            );
        }
        tagged.events.push(event);
    }

    tagged.passthrough.push_str(&line[cursor..]);
    Ok(tagged)
}

/// Classify one line of a live stream
///
/// Lines with trace tags are split, lines that look like a JSON object are
/// read as a single event, and everything else is passed through.
pub fn parse_stream_line(line: &str, line_number: usize) -> Result<TaggedLine> {
    if line.contains(TRACE_TAG_OPEN) {
        return extract_tagged_traces(line, line_number);
    }

    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        return Ok(TaggedLine {
            passthrough: String::new(),
            events: vec![parse_event(trimmed, line_number)?],
        });
    }

    Ok(TaggedLine {
        passthrough: line.to_string(),
        events: Vec::new(),
    })
}

/// Read all of `reader` and parse it
pub fn read_events<R: Read>(mut reader: R, format: InputFormat) -> Result<Vec<RawEvent>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_events(&text, format)
}

/// Load and parse a trace file
pub fn load_events_from_path<P: AsRef<Path>>(path: P, format: InputFormat) -> Result<Vec<RawEvent>> {
    let text = fs::read_to_string(path.as_ref())?;
    let events = parse_events(&text, format)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        events = events.len(),
        "Loaded trace file"
    );
    Ok(events)
}

fn parse_event(json: &str, line_number: usize) -> Result<RawEvent> {
    serde_json::from_str(json).map_err(|e| TimelineError::Ingest {
        line: line_number,
        message: e.to_string(),
    })
}
