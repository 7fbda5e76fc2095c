//! Live-reply relay
//!
//! Per-persona scratch buffers that hand streamed fragments from the generation
//! task to consumers running on their own schedule. Fragments arriving between
//! two polls are coalesced. Consumers that prefer push delivery can subscribe to
//! a broadcast of the same fragments instead.

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Raw buffer value reported once a stream has ended and all text was drained
pub const END_OF_STREAM: &str = "[DONE]";

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct ReplyBuffer {
    text: String,
    finished: bool,
}

/// Result of polling one persona's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPoll {
    /// Nothing new since the last poll
    Empty,
    /// Text that arrived since the last poll; the buffer is now drained
    Text(String),
    /// The stream ended and every fragment has been delivered
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEventKind {
    Fragment(String),
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub key: String,
    pub kind: RelayEventKind,
}

pub struct LiveReplyRelay {
    buffers: DashMap<String, ReplyBuffer>,
    events: broadcast::Sender<RelayEvent>,
}

impl LiveReplyRelay {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            buffers: DashMap::new(),
            events,
        }
    }

    pub fn append(&self, key: &str, fragment: &str) {
        self.buffers
            .entry(key.to_string())
            .or_default()
            .text
            .push_str(fragment);
        self.publish(key, RelayEventKind::Fragment(fragment.to_string()));
    }

    /// Mark the end of the current stream for `key`
    pub fn finish(&self, key: &str) {
        self.buffers.entry(key.to_string()).or_default().finished = true;
        self.publish(key, RelayEventKind::Finished);
    }

    /// Empty the buffer and forget any end-of-stream mark
    pub fn clear(&self, key: &str) {
        let mut buffer = self.buffers.entry(key.to_string()).or_default();
        buffer.text.clear();
        buffer.finished = false;
    }

    /// Drain pending text; reports `Done` once, after the text is gone
    pub fn poll(&self, key: &str) -> RelayPoll {
        let Some(mut buffer) = self.buffers.get_mut(key) else {
            return RelayPoll::Empty;
        };

        if !buffer.text.is_empty() {
            RelayPoll::Text(std::mem::take(&mut buffer.text))
        } else if buffer.finished {
            buffer.finished = false;
            RelayPoll::Done
        } else {
            RelayPoll::Empty
        }
    }

    /// Raw buffer contents without draining, [`END_OF_STREAM`] when finished and empty
    pub fn peek(&self, key: &str) -> Option<String> {
        self.buffers.get(key).map(|buffer| {
            if buffer.text.is_empty() && buffer.finished {
                END_OF_STREAM.to_string()
            } else {
                buffer.text.clone()
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    fn publish(&self, key: &str, kind: RelayEventKind) {
        // no receivers is fine: polling consumers don't subscribe
        let _ = self.events.send(RelayEvent {
            key: key.to_string(),
            kind,
        });
    }
}

impl Default for LiveReplyRelay {
    fn default() -> Self {
        Self::new()
    }
}
