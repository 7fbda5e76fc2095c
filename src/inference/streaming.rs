//! Streaming completion client
//!
//! Sends one completion request per turn to the local server and reads the
//! newline-delimited JSON response as it arrives. Each `content` delta is handed
//! to a callback and accumulated into the full reply.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inference::prompt::render_prompt;
use crate::session::{SessionState, SessionStore, DEFAULT_PERSONA_KEY, FALLBACK_SYSTEM_PROMPT};
use crate::storage::settings::AppSettings;
use crate::types::config::{SamplingConfig, ServerEndpoint};
use crate::types::message::{Role, Turn};

/// Transport failures; surfaced to callers only as an `Error: ...` reply
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Body of a `/completion` request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub n_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub stop: [&'static str; 3],
    pub stream: bool,
    pub repeat_penalty: f32,
}

impl CompletionRequest {
    pub fn new(transcript: &[Turn], sampling: &SamplingConfig) -> Self {
        Self {
            prompt: render_prompt(transcript),
            n_predict: sampling.n_predict,
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            stop: Role::all_markers(),
            stream: true,
            repeat_penalty: sampling.repeat_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    content: Option<String>,
}

/// Parse one response line into an optional text fragment.
///
/// Accepts an optional `data:` prefix. Lines without a `content` string yield
/// `Ok(None)`; an empty string is still a fragment.
pub fn parse_fragment(line: &str) -> Result<Option<String>, serde_json::Error> {
    let payload = line.trim();
    let payload = payload
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(payload);
    let chunk: CompletionChunk = serde_json::from_str(payload)?;
    Ok(chunk.content)
}

/// Splits a byte stream into lines, keeping partial lines (and partial UTF-8
/// sequences) until their newline arrives
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    /// Remaining bytes after the stream ended without a final newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

/// Accumulates fragments of one reply
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    decoder: LineDecoder,
    reply: String,
    fragments: usize,
    skipped: usize,
}

impl ReplyAssembler {
    pub fn push_bytes<F>(&mut self, bytes: &[u8], on_partial: &mut F)
    where
        F: FnMut(&str) + ?Sized,
    {
        for line in self.decoder.push(bytes) {
            self.handle_line(&line, on_partial);
        }
    }

    /// Flush any trailing line and return the full reply
    pub fn finish<F>(mut self, on_partial: &mut F) -> String
    where
        F: FnMut(&str) + ?Sized,
    {
        if let Some(line) = self.decoder.finish() {
            self.handle_line(&line, on_partial);
        }
        tracing::debug!(
            "Stream finished: {} fragments, {} skipped lines, {} chars",
            self.fragments,
            self.skipped,
            self.reply.len()
        );
        self.reply
    }

    fn handle_line<F>(&mut self, line: &str, on_partial: &mut F)
    where
        F: FnMut(&str) + ?Sized,
    {
        if line.trim().is_empty() {
            return;
        }

        match parse_fragment(line) {
            Ok(Some(fragment)) => {
                self.reply.push_str(&fragment);
                self.fragments += 1;
                on_partial(&fragment);
            }
            Ok(None) => {}
            Err(e) => {
                self.skipped += 1;
                tracing::debug!("Skipping unparseable stream line {:?}: {}", line, e);
            }
        }
    }
}

/// Completion client bound to the persona session store
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: ServerEndpoint,
    sampling: SamplingConfig,
    sessions: Arc<SessionStore>,
}

impl CompletionClient {
    pub fn new(settings: &AppSettings, sessions: Arc<SessionStore>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint: settings.endpoint.clone(),
            sampling: settings.sampling.clone(),
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run one turn against the active persona.
    ///
    /// Never fails: transport errors come back as a reply starting with
    /// `"Error: "`, and the unanswered user turn is removed from the transcript.
    pub async fn chat<F>(&self, question: &str, mut on_partial: F) -> String
    where
        F: FnMut(&str) + Send,
    {
        let key = match self.sessions.active_key() {
            Some(key) => key,
            None => self
                .sessions
                .activate_persona(DEFAULT_PERSONA_KEY, FALLBACK_SYSTEM_PROMPT),
        };

        self.sessions.append_user(&key, question);
        let transcript = self.sessions.transcript(&key).unwrap_or_default();
        let request = CompletionRequest::new(&transcript, &self.sampling);

        match self.stream_completion(&request, &mut on_partial).await {
            Ok(reply) => {
                if self.sessions.state(&key) == SessionState::AwaitingReply {
                    self.sessions.append_assistant(&key, &reply);
                } else {
                    tracing::warn!("Persona '{}' was reset mid-turn, reply not recorded", key);
                }
                reply
            }
            Err(e) => {
                tracing::warn!("Completion for persona '{}' failed: {}", key, e);
                self.sessions.pop_pending_user(&key);
                format!("Error: {}", e)
            }
        }
    }

    async fn stream_completion<F>(
        &self,
        request: &CompletionRequest,
        on_partial: &mut F,
    ) -> Result<String, StreamError>
    where
        F: FnMut(&str) + Send,
    {
        let mut response = self
            .http
            .post(self.endpoint.completion_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status { status, body });
        }

        let mut assembler = ReplyAssembler::default();
        while let Some(chunk) = response.chunk().await? {
            assembler.push_bytes(&chunk, on_partial);
        }
        Ok(assembler.finish(on_partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockResponse, MockServer};

    fn assemble(chunks: &[&[u8]]) -> (String, Vec<String>) {
        let mut partials = Vec::new();
        let mut on_partial = |fragment: &str| partials.push(fragment.to_string());
        let mut assembler = ReplyAssembler::default();
        for chunk in chunks {
            assembler.push_bytes(chunk, &mut on_partial);
        }
        let reply = assembler.finish(&mut on_partial);
        (reply, partials)
    }

    fn client_for(port: u16) -> CompletionClient {
        let mut settings = AppSettings::default();
        settings.endpoint.port = port;
        CompletionClient::new(&settings, Arc::new(SessionStore::new()))
    }

    #[test]
    fn test_parse_fragment_variants() {
        assert_eq!(parse_fragment(r#"{"content":"Hi"}"#).unwrap().as_deref(), Some("Hi"));
        assert_eq!(
            parse_fragment(r#"data: {"content":" there"}"#).unwrap().as_deref(),
            Some(" there")
        );
        assert_eq!(parse_fragment(r#"{"stop":true}"#).unwrap(), None);
        assert_eq!(parse_fragment(r#"{"content":""}"#).unwrap().as_deref(), Some(""));
        assert_eq!(parse_fragment(r#"{"content":null}"#).unwrap(), None);
        assert!(parse_fragment("data: [DONE]").is_err());
    }

    #[test]
    fn test_assembles_reply_in_order() {
        let body = b"data: {\"content\":\"Hi\"}\n\ndata: {\"content\":\" there\"}\n\ndata: {\"content\":\"!\"}\n\ndata: {\"stop\":true,\"tokens_predicted\":3}\n\n";
        let (reply, partials) = assemble(&[body]);

        assert_eq!(reply, "Hi there!");
        assert_eq!(partials, vec!["Hi", " there", "!"]);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let body = b"{\"content\":\"Hello\"}\n{not json at all\n{\"content\":\" world\"}\n";
        let (reply, partials) = assemble(&[body]);

        assert_eq!(reply, "Hello world");
        assert_eq!(partials, vec!["Hello", " world"]);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let line = "data: {\"content\":\"caf\u{e9} \u{2615}\"}\r\n".as_bytes();
        // split inside the multi-byte characters
        let (a, rest) = line.split_at(22);
        let (b, c) = rest.split_at(3);
        let (reply, partials) = assemble(&[a, b, c]);

        assert_eq!(reply, "caf\u{e9} \u{2615}");
        assert_eq!(partials.len(), 1);
    }

    #[test]
    fn test_empty_content_still_reaches_callback() {
        let body = b"{\"content\":\"Hi\"}\n{\"content\":\"\"}\n{\"stop\":true}\n";
        let (reply, partials) = assemble(&[body]);

        assert_eq!(reply, "Hi");
        assert_eq!(partials, vec!["Hi", ""]);
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let (reply, _) = assemble(&[b"{\"content\":\"a\"}\n{\"content\":\"b\"}"]);
        assert_eq!(reply, "ab");
    }

    #[test]
    fn test_request_body_shape() {
        let transcript = vec![Turn::system("sys"), Turn::user("q")];
        let request = CompletionRequest::new(&transcript, &SamplingConfig::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["prompt"], "<|system|> sys <|user|> q <|assistant|>");
        assert_eq!(json["n_predict"], 2048);
        assert_eq!(json["top_k"], 20);
        assert_eq!(json["stream"], true);
        assert_eq!(
            json["stop"],
            serde_json::json!(["<|user|>", "<|system|>", "<|assistant|>"])
        );
    }

    #[tokio::test]
    async fn test_chat_streams_and_records_turns() {
        let server = MockServer::start(|_| {
            MockResponse::ok(vec![
                "data: {\"content\":\"Hi\"}\n\n",
                "data: {\"content\":\" there\"}\n\n",
                "data: {\"content\":\"!\"}\n\n",
                "data: {\"stop\":true}\n\n",
            ])
        })
        .await;
        let client = client_for(server.port);
        client.sessions().activate_persona("Clinic|Dana", "You are Dana.");

        let mut partials = Vec::new();
        let reply = client
            .chat("Hello?", |fragment| partials.push(fragment.to_string()))
            .await;

        assert_eq!(reply, "Hi there!");
        assert_eq!(partials, vec!["Hi", " there", "!"]);

        let transcript = client.sessions().transcript("Clinic|Dana").unwrap();
        let roles: Vec<Role> = transcript.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(transcript[2].content, "Hi there!");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0]["prompt"],
            "<|system|> You are Dana. <|user|> Hello? <|assistant|>"
        );
    }

    #[tokio::test]
    async fn test_chat_without_active_persona_uses_default() {
        let server = MockServer::start(|_| MockResponse::ok(vec!["{\"content\":\"ok\"}\n"])).await;
        let client = client_for(server.port);

        let reply = client.chat("ping", |_| {}).await;

        assert_eq!(reply, "ok");
        let transcript = client.sessions().transcript(DEFAULT_PERSONA_KEY).unwrap();
        assert_eq!(transcript[0].content, FALLBACK_SYSTEM_PROMPT);
        assert_eq!(transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_reply_dropped_after_mid_turn_reset() {
        let server = MockServer::start(|_| {
            MockResponse::ok(vec!["{\"content\":\"late\"}\n", "{\"content\":\" reply\"}\n"])
                .with_delay(Duration::from_millis(100))
        })
        .await;
        let client = client_for(server.port);
        client.sessions().activate_persona("S|A", "sys");

        let (reply, _) = tokio::join!(client.chat("q", |_| {}), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.sessions().reset_conversation("S|A", "sys")
        });

        assert_eq!(reply, "late reply");
        assert_eq!(client.sessions().state("S|A"), SessionState::Seeded);
        let roles: Vec<Role> = client
            .sessions()
            .transcript("S|A")
            .unwrap()
            .iter()
            .map(|turn| turn.role)
            .collect();
        assert_eq!(roles, vec![Role::System]);
    }

    #[tokio::test]
    async fn test_error_status_becomes_error_reply() {
        let server = MockServer::start(|_| MockResponse::status(503, "loading model")).await;
        let client = client_for(server.port);
        client.sessions().activate_persona("k", "sys");

        let reply = client.chat("hello", |_| {}).await;

        assert!(reply.starts_with("Error: "), "{reply}");
        assert!(reply.contains("503"));
        assert_eq!(client.sessions().transcript("k").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_becomes_error_reply() {
        let port = crate::test_support::unused_port().await;
        let client = client_for(port);
        client.sessions().activate_persona("k", "sys");

        let mut calls = 0;
        let reply = client.chat("hello", |_| calls += 1).await;

        assert!(reply.starts_with("Error: "), "{reply}");
        assert_eq!(calls, 0);
        assert_eq!(client.sessions().transcript("k").unwrap().len(), 1);
    }
}
