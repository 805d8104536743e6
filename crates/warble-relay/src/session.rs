//! Relay session state machine.
//!
//! Drives one upstream token stream to completion: bytes in, budget-clipped
//! SSE frames out. The synchronous [`RelaySession`] core is a state machine
//! over chunks, so the drain/flush/terminate paths are testable without a
//! transport; [`run`] is the async driver that pumps a byte stream through
//! it into an mpsc sink.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use warble_core::sse::{FrameAssembler, OutboundEvent, ParsedLine, ReplyBudget, parse_line};

/// Lifecycle of one relay session.
///
/// Opening the upstream request happens before a session exists; an
/// unusable upstream never reaches `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reading upstream chunks and relaying clipped tokens.
    Streaming,
    /// Budget spent; upstream is still drained but nothing is emitted.
    Draining,
    /// Sentinel emitted; no further events of any kind.
    Done,
}

/// Per-session counters, logged when the session ends.
///
/// `malformed_lines` makes the skip-and-continue parse policy observable
/// without changing behavior.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Assembled lines inspected (including blank separators).
    pub lines: u64,
    /// Event lines dropped because their payload failed to parse.
    pub malformed_lines: u64,
    /// Non-empty delta frames written downstream.
    pub deltas_out: u64,
    /// Code points written downstream; never exceeds the budget limit.
    pub chars_out: u64,
    /// Bytes the decoder discarded (invalid or truncated sequences).
    pub dropped_bytes: u64,
}

/// One client request's relay state: its own line buffer and budget.
///
/// Never shared across sessions; concurrent requests each construct their
/// own instance.
pub struct RelaySession {
    assembler: FrameAssembler,
    budget: ReplyBudget,
    state: SessionState,
    stats: SessionStats,
}

impl RelaySession {
    pub fn new(limit: usize) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            budget: ReplyBudget::new(limit),
            state: SessionState::Streaming,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats;
        stats.dropped_bytes = self.assembler.dropped_bytes();
        stats
    }

    /// Feed one upstream chunk; returns the frames it completes, in the
    /// order their source lines arrived.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<OutboundEvent> {
        if self.state == SessionState::Done {
            return Vec::new();
        }
        let mut out = Vec::new();
        for line in self.assembler.feed(chunk) {
            self.accept_line(&line, &mut out);
            if self.state == SessionState::Done {
                break;
            }
        }
        out
    }

    /// Upstream ended without a sentinel (exhaustion or transport drop).
    ///
    /// Flushes the unterminated remainder through the same token path, then
    /// closes the session with the sentinel.
    pub fn on_eof(&mut self) -> Vec<OutboundEvent> {
        if self.state == SessionState::Done {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Some(tail) = self.assembler.flush() {
            self.accept_line(&tail, &mut out);
        }
        if self.state != SessionState::Done {
            self.finish(&mut out);
        }
        out
    }

    fn accept_line(&mut self, line: &str, out: &mut Vec<OutboundEvent>) {
        self.stats.lines += 1;
        match parse_line(line) {
            ParsedLine::Done => self.finish(out),
            ParsedLine::Delta(token) => {
                let clipped = self.budget.clip(&token);
                if !clipped.is_empty() {
                    self.stats.deltas_out += 1;
                    self.stats.chars_out += clipped.chars().count() as u64;
                    out.push(OutboundEvent::Delta(clipped.to_owned()));
                }
                if self.budget.exhausted() && self.state == SessionState::Streaming {
                    debug!(
                        limit = self.budget.limit(),
                        "reply budget spent; draining upstream"
                    );
                    self.state = SessionState::Draining;
                }
            }
            ParsedLine::Malformed => self.stats.malformed_lines += 1,
            ParsedLine::NotData => {}
        }
    }

    fn finish(&mut self, out: &mut Vec<OutboundEvent>) {
        out.push(OutboundEvent::Done);
        self.state = SessionState::Done;
    }
}

/// Pump an upstream byte stream through a session into `sink`.
///
/// Frames are written one at a time, in source order, as soon as their
/// chunk arrives. A closed sink means the downstream consumer went away:
/// the read loop stops and dropping `upstream` releases the connection. A
/// mid-stream transport error is treated as end of stream, so the client
/// sees a normally terminated (if short) response.
pub async fn run<S, E>(mut upstream: S, sink: mpsc::Sender<Bytes>, limit: usize) -> SessionStats
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut session = RelaySession::new(limit);

    'read: loop {
        let events = match upstream.next().await {
            Some(Ok(chunk)) => session.on_chunk(&chunk),
            Some(Err(err)) => {
                info!(error = %err, "upstream interrupted; closing session normally");
                session.on_eof()
            }
            None => session.on_eof(),
        };
        for event in events {
            if sink.send(Bytes::from(event.to_frame())).await.is_err() {
                debug!("downstream disconnected; abandoning upstream");
                break 'read;
            }
        }
        if session.state() == SessionState::Done {
            break;
        }
    }

    let stats = session.stats();
    info!(
        lines = stats.lines,
        malformed = stats.malformed_lines,
        deltas = stats.deltas_out,
        chars = stats.chars_out,
        dropped_bytes = stats.dropped_bytes,
        "relay session finished"
    );
    stats
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::mpsc;
    use warble_core::sse::OutboundEvent;

    use super::{RelaySession, SessionState, run};

    fn delta_line(token: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(token).unwrap()
        )
    }

    fn tokens(events: &[OutboundEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::Delta(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn five_cjk_tokens_then_sentinel() {
        let mut session = RelaySession::new(120);
        let mut events = Vec::new();
        for token in ["你", "好", "，", "世", "界"] {
            events.extend(session.on_chunk(delta_line(token).as_bytes()));
        }
        events.extend(session.on_chunk(b"data: [DONE]\n\n"));

        assert_eq!(tokens(&events), vec!["你", "好", "，", "世", "界"]);
        assert_eq!(events.last(), Some(&OutboundEvent::Done));
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(session.stats().chars_out, 5);
        assert_eq!(session.stats().deltas_out, 5);
    }

    #[test]
    fn oversized_token_clipped_then_drained() {
        let long: String = "雨".repeat(200);
        let mut session = RelaySession::new(120);

        let events = session.on_chunk(delta_line(&long).as_bytes());
        assert_eq!(tokens(&events), vec!["雨".repeat(120).as_str()]);
        assert_eq!(session.state(), SessionState::Draining);

        // Later tokens are drained and discarded.
        let events = session.on_chunk(delta_line("more").as_bytes());
        assert!(events.is_empty());

        let events = session.on_chunk(b"data: [DONE]\n\n");
        assert_eq!(events, vec![OutboundEvent::Done]);
        assert_eq!(session.stats().chars_out, 120);
        assert_eq!(session.stats().deltas_out, 1);
    }

    #[test]
    fn eof_without_sentinel_flushes_and_terminates() {
        let mut session = RelaySession::new(120);
        assert!(session.on_chunk(b"data: {\"choices\":[{\"del").is_empty());
        // Rest of the line arrives but its newline never does.
        let events =
            session.on_chunk(b"ta\":{\"content\":\"tail\"}}]}");
        assert!(events.is_empty());

        let events = session.on_eof();
        assert_eq!(
            events,
            vec![
                OutboundEvent::Delta("tail".to_string()),
                OutboundEvent::Done
            ]
        );
        assert_eq!(session.state(), SessionState::Done);
    }

    #[test]
    fn malformed_line_does_not_end_session() {
        let mut session = RelaySession::new(120);
        let mut events = session.on_chunk(b"data: {\"choices\":[{\"delta\":{\"content\":\"cut\n\n");
        events.extend(session.on_chunk(delta_line("ok").as_bytes()));
        events.extend(session.on_chunk(b"data: [DONE]\n\n"));

        assert_eq!(tokens(&events), vec!["ok"]);
        assert_eq!(session.stats().malformed_lines, 1);
        assert_eq!(events.last(), Some(&OutboundEvent::Done));
    }

    #[test]
    fn sentinel_emitted_exactly_once() {
        let mut session = RelaySession::new(120);
        let mut events = session.on_chunk(b"data: [DONE]\n\ndata: [DONE]\n\n");
        events.extend(session.on_chunk(b"data: [DONE]\n\n"));
        events.extend(session.on_eof());

        let dones = events
            .iter()
            .filter(|e| matches!(e, OutboundEvent::Done))
            .count();
        assert_eq!(dones, 1);
    }

    #[test]
    fn chunking_does_not_change_output() {
        let body = format!(
            "{}{}{}data: [DONE]\n\n",
            delta_line("你好"),
            "event: ping\n\n",
            delta_line("🦀 world")
        );
        let bytes = body.as_bytes();

        let mut whole = RelaySession::new(120);
        let expected = whole.on_chunk(bytes);

        for split in 0..=bytes.len() {
            let mut session = RelaySession::new(120);
            let mut events = session.on_chunk(&bytes[..split]);
            events.extend(session.on_chunk(&bytes[split..]));
            events.extend(session.on_eof());
            assert_eq!(events, expected, "split at {split}");
        }
    }

    #[tokio::test]
    async fn run_relays_frames_in_order() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta_line("a"))),
            Ok(Bytes::from(delta_line("b"))),
            Ok(Bytes::from("data: [DONE]\n\n")),
        ];
        let (tx, mut rx) = mpsc::channel(16);
        let stats = run(tokio_stream::iter(chunks), tx, 120).await;

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(String::from_utf8(frame.to_vec()).unwrap());
        }
        assert_eq!(
            frames,
            vec![
                OutboundEvent::Delta("a".to_string()).to_frame(),
                OutboundEvent::Delta("b".to_string()).to_frame(),
                "data: [DONE]\n\n".to_string(),
            ]
        );
        assert_eq!(stats.deltas_out, 2);
    }

    #[tokio::test]
    async fn run_treats_transport_error_as_eof() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta_line("a"))),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
        ];
        let (tx, mut rx) = mpsc::channel(16);
        run(tokio_stream::iter(chunks), tx, 120).await;

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(String::from_utf8(frame.to_vec()).unwrap());
        }
        // Short but normally terminated: token then sentinel.
        assert_eq!(frames.last().map(String::as_str), Some("data: [DONE]\n\n"));
        assert_eq!(frames.len(), 2);
    }

    #[tokio::test]
    async fn run_stops_when_downstream_disconnects() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta_line("a"))),
            Ok(Bytes::from(delta_line("b"))),
            Ok(Bytes::from("data: [DONE]\n\n")),
        ];
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        // Must return promptly instead of pumping a stream nobody reads.
        let stats = run(tokio_stream::iter(chunks), tx, 120).await;
        assert_eq!(stats.deltas_out, 1);
    }
}
