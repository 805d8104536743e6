//! Downstream wire frames.
//!
//! Surviving tokens are re-wrapped in the same JSON shape the upstream
//! uses, so existing SSE consumers need no format change.

use serde::Serialize;

use super::parser::DONE_SENTINEL;

/// One event written to the downstream sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// A budget-clipped, non-empty token.
    Delta(String),
    /// Terminal sentinel; exactly one per session, always last.
    Done,
    /// Upstream was unreachable or unusable.
    Error,
}

#[derive(Serialize)]
struct DeltaFrame<'a> {
    choices: [Choice<'a>; 1],
}

#[derive(Serialize)]
struct Choice<'a> {
    delta: Delta<'a>,
}

#[derive(Serialize)]
struct Delta<'a> {
    content: &'a str,
}

impl OutboundEvent {
    /// Serialize to one `data: …\n\n` event-stream frame.
    pub fn to_frame(&self) -> String {
        match self {
            Self::Delta(token) => {
                let frame = DeltaFrame {
                    choices: [Choice {
                        delta: Delta { content: token },
                    }],
                };
                // Serializing borrowed strings into a buffer cannot fail.
                let json = serde_json::to_string(&frame).unwrap_or_default();
                format!("data: {json}\n\n")
            }
            Self::Done => format!("data: {DONE_SENTINEL}\n\n"),
            Self::Error => "data: {\"error\":\"upstream failed\"}\n\n".to_string(),
        }
    }
}
