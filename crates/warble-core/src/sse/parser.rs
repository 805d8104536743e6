//! Classification of assembled event lines.
//!
//! Implements a tolerant reader: lines that are not events are ignored,
//! events that fail to parse are dropped without ending the session.

use serde_json::Value;
use tracing::debug;

/// Literal payload that terminates an upstream stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Outcome of inspecting one assembled line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A delta payload. The token may be empty when the event carries no
    /// content (role-only first event, finish event).
    Delta(String),
    /// The stream-complete sentinel.
    Done,
    /// Not an event-data line (blank separator, comment, other field).
    NotData,
    /// A `data:` line whose payload could not be understood. Dropped.
    Malformed,
}

/// Inspect one line of the upstream stream.
///
/// Leading and trailing whitespace is insignificant. Only `data:` lines are
/// events. A payload that is not valid JSON is dropped, which also covers a
/// half-written trailing line at end of stream; a payload without the delta
/// field yields an empty token.
pub fn parse_line(line: &str) -> ParsedLine {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return ParsedLine::NotData;
    };
    let payload = payload.trim_start();
    if payload == DONE_SENTINEL {
        return ParsedLine::Done;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(event) => ParsedLine::Delta(delta_content(&event).unwrap_or_default().to_owned()),
        Err(err) => {
            debug!(error = %err, "dropping malformed event line");
            ParsedLine::Malformed
        }
    }
}

/// Extraction path for the upstream token payload.
///
/// The provider's event schema is a compatibility surface: every caller
/// reaches the token through this one adapter.
fn delta_content(event: &Value) -> Option<&str> {
    event
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}
