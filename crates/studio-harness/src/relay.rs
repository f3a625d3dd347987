//! Cumulative-text stream relay.
//!
//! Providers stream the full text generated so far in every frame. The relay
//! decodes SSE frames, keeps the last cumulative text it accepted and emits
//! only the newly appended suffix.
//!
//! A frame whose text does not extend the accepted text (shorter, or
//! diverging from it) is dropped and the accepted text is kept, so the
//! concatenated output is always a prefix of the longest text seen.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream::{self, Stream};
use tracing::{debug, warn};

use crate::errors::ProviderError;
use crate::model::ProviderId;
use crate::sse::{SseDecoder, SseFrame};

/// What a provider-specific decoder found inside one frame payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FramePayload {
    /// Full text generated so far.
    Cumulative(String),
    /// Valid frame with nothing to relay (heartbeat, usage-only update).
    Ignore,
    /// Provider reported an error inside the stream; terminal.
    Fault(String),
}

/// Outcome of offering a new cumulative text to `CumulativeText`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    Append(String),
    Unchanged,
    /// The new text is a strict prefix of the accepted text.
    Regressed,
    /// The new text neither extends nor prefixes the accepted text.
    Diverged,
}

/// Last cumulative text accepted from the provider.
#[derive(Debug, Default)]
pub struct CumulativeText {
    seen: String,
}

impl CumulativeText {
    pub fn advance(&mut self, cumulative: &str) -> Advance {
        if cumulative == self.seen {
            return Advance::Unchanged;
        }
        if cumulative.starts_with(self.seen.as_str()) {
            let delta = cumulative[self.seen.len()..].to_string();
            self.seen.clear();
            self.seen.push_str(cumulative);
            return Advance::Append(delta);
        }
        if self.seen.starts_with(cumulative) {
            Advance::Regressed
        } else {
            Advance::Diverged
        }
    }

    pub fn as_str(&self) -> &str {
        &self.seen
    }
}

struct RelayState<S, D> {
    provider_id: ProviderId,
    bytes_stream: S,
    decode: D,
    decoder: SseDecoder,
    text: CumulativeText,
    pending: VecDeque<String>,
    /// Terminal provider fault, yielded once `pending` is drained.
    fault: Option<ProviderError>,
    frames: u64,
    done: bool,
}

impl<S, D> RelayState<S, D>
where
    D: Fn(&str) -> Result<FramePayload, serde_json::Error>,
{
    fn absorb(&mut self, frame: SseFrame) {
        if self.fault.is_some() {
            return;
        }
        self.frames += 1;
        let data = frame.data.trim();
        if data.is_empty() || data == "[DONE]" {
            return;
        }
        let payload = match (self.decode)(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    event = "relay.frame_skipped",
                    domain = "relay",
                    provider = %self.provider_id,
                    frame = self.frames,
                    error = %e,
                    "skipping malformed stream frame"
                );
                return;
            }
        };
        match payload {
            FramePayload::Cumulative(text) => match self.text.advance(&text) {
                Advance::Append(delta) => {
                    if !delta.is_empty() {
                        self.pending.push_back(delta);
                    }
                }
                Advance::Unchanged => {}
                outcome @ (Advance::Regressed | Advance::Diverged) => {
                    warn!(
                        event = "relay.frame_discarded",
                        domain = "relay",
                        provider = %self.provider_id,
                        frame = self.frames,
                        outcome = ?outcome,
                        accepted_len = self.text.as_str().len(),
                        frame_len = text.len(),
                        "cumulative text does not extend accepted text"
                    );
                }
            },
            FramePayload::Ignore => {}
            FramePayload::Fault(message) => {
                warn!(
                    event = "relay.provider_fault",
                    domain = "relay",
                    provider = %self.provider_id,
                    frame = self.frames,
                    queued = self.pending.len() as u64
                );
                self.fault = Some(ProviderError::provider(
                    self.provider_id.clone(),
                    message,
                    None,
                ));
                self.done = true;
            }
        }
    }
}

/// Turns a cumulative-text SSE byte stream into a lazy stream of deltas.
///
/// The upstream is only read when the returned stream is polled. Malformed
/// frames are logged and skipped. A read failure or a provider fault frame
/// ends the stream with an error item; deltas decoded before a fault are
/// still yielded first.
pub fn relay_deltas<S, E, D>(
    provider_id: ProviderId,
    bytes_stream: S,
    decode: D,
) -> impl Stream<Item = Result<String, ProviderError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: fmt::Display + Send + 'static,
    D: Fn(&str) -> Result<FramePayload, serde_json::Error> + Send + 'static,
{
    stream::try_unfold(
        RelayState {
            provider_id,
            bytes_stream,
            decode,
            decoder: SseDecoder::default(),
            text: CumulativeText::default(),
            pending: VecDeque::new(),
            fault: None,
            frames: 0,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(delta) = state.pending.pop_front() {
                    return Ok(Some((delta, state)));
                }
                if let Some(fault) = state.fault.take() {
                    return Err(fault);
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            state.absorb(frame);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("stream read failed: {e}"),
                        ));
                    }
                    None => {
                        state.done = true;
                        if let Some(frame) = state.decoder.finish() {
                            state.absorb(frame);
                        }
                        debug!(
                            event = "relay.upstream_closed",
                            domain = "relay",
                            provider = %state.provider_id,
                            frames = state.frames,
                            relayed_bytes = state.text.as_str().len() as u64
                        );
                    }
                }
            }
        },
    )
}
