//! Gemini provider (Google Generative Language API).
//!
//! One-shot calls use `:generateContent`; chat replies stream over
//! `:streamGenerateContent?alt=sse`. SSE framing is parsed by hand on
//! double-newline boundaries.

use std::collections::VecDeque;
use std::pin::Pin;

use anyhow::{Context, Result, anyhow};
use futures_util::Stream;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use crate::providers::{ProviderError, ProviderErrorKind, StreamEvent, Usage};
use crate::transcript::Turn;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    /// Creates a new config from environment.
    ///
    /// Environment variables:
    /// - `GEMINI_API_KEY` (required)
    /// - `GEMINI_BASE_URL` (optional)
    pub fn from_env(
        model: String,
        max_output_tokens: u32,
        config_base_url: Option<&str>,
    ) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY is not set. Set it to use Psique.")?;
        let base_url = resolve_base_url(config_base_url)?;

        Ok(Self {
            api_key,
            base_url,
            model,
            max_output_tokens,
        })
    }
}

/// Gemini client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sends the turns and returns the complete response text.
    pub async fn generate(&self, turns: &[Turn]) -> Result<String> {
        let request = build_request(turns, self.config.max_output_tokens);
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        debug!(model = %self.config.model, turns = turns.len(), "generateContent request");

        let response = self
            .http
            .post(&url)
            .headers(build_headers(&self.config.api_key, "application/json"))
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Parse, e.to_string()))?;
        extract_response_text(&body)
    }

    /// Sends the turns and returns a stream of events for the reply.
    pub async fn generate_stream(
        &self,
        turns: &[Turn],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let request = build_request(turns, self.config.max_output_tokens);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, self.config.model
        );
        debug!(model = %self.config.model, turns = turns.len(), "streamGenerateContent request");

        let response = self
            .http
            .post(&url)
            .headers(build_headers(&self.config.api_key, "text/event-stream"))
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body).into());
        }

        let byte_stream = response.bytes_stream();
        Ok(Box::pin(GeminiSseParser::new(byte_stream)))
    }
}

fn resolve_base_url(config_base_url: Option<&str>) -> Result<String> {
    if let Ok(env_url) = std::env::var("GEMINI_BASE_URL") {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(DEFAULT_BASE_URL.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid Gemini base URL: {}", url))?;
    Ok(())
}

fn build_headers(api_key: &str, accept: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static(accept));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

fn classify_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {}", e))
    } else if e.is_connect() {
        ProviderError::timeout(format!("Connection failed: {}", e))
    } else if e.is_request() {
        ProviderError::new(
            ProviderErrorKind::HttpStatus,
            format!("Request error: {}", e),
        )
    } else {
        ProviderError::new(
            ProviderErrorKind::HttpStatus,
            format!("Network error: {}", e),
        )
    }
}

/// Builds the request body from the outbound turns.
fn build_request(turns: &[Turn], max_output_tokens: u32) -> Value {
    let contents: Vec<Value> = turns
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{"text": turn.content}]
            })
        })
        .collect();

    let mut request = json!({
        "contents": contents,
    });

    if max_output_tokens > 0 {
        request["generation_config"] = json!({
            "max_output_tokens": max_output_tokens
        });
    }

    request
}

/// Concatenated text of the first candidate's parts.
fn extract_response_text(body: &Value) -> Result<String> {
    let candidate = body
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::Parse, "Response contained no candidates")
        })?;

    let mut text = String::new();
    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|v| v.as_array())
    {
        for part in parts {
            if let Some(fragment) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(fragment);
            }
        }
    }

    Ok(text)
}

struct GeminiSseParser<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    last_text: String,
    final_usage: Option<Usage>,
    final_finish_reason: Option<String>,
    emitted_done: bool,
}

impl<S> GeminiSseParser<S> {
    fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            last_text: String::new(),
            final_usage: None,
            final_finish_reason: None,
            emitted_done: false,
        }
    }

    fn try_next_event(&mut self) -> Option<Result<StreamEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }

        let (pos, delim_len) = find_double_newline(&self.buffer)?;
        let chunk = self.buffer.drain(..pos).collect::<Vec<u8>>();
        self.buffer.drain(..delim_len);

        let chunk_text = String::from_utf8_lossy(&chunk);
        let data = match parse_sse_data(&chunk_text) {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        };

        let value = data?;
        self.handle_chunk(&value);
        self.pending.pop_front().map(Ok)
    }

    fn handle_chunk(&mut self, value: &Value) {
        if let Some(error) = value.get("error") {
            let error_type = error
                .get("status")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| error.get("code").map(std::string::ToString::to_string))
                .unwrap_or_else(|| "error".to_string());
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            self.pending.push_back(StreamEvent::Error {
                error_type,
                message,
            });
            return;
        }

        if let Some(usage) = value
            .get("usageMetadata")
            .or_else(|| value.get("usage_metadata"))
        {
            let prompt = usage
                .get("promptTokenCount")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0);
            let completion = usage
                .get("candidatesTokenCount")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0);
            self.final_usage = Some(Usage {
                input_tokens: prompt,
                output_tokens: completion,
            });
        }

        if let Some(candidates) = value.get("candidates").and_then(|v| v.as_array())
            && let Some(candidate) = candidates.first()
        {
            if let Some(reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
                self.final_finish_reason = Some(reason.to_string());
            }

            if let Some(parts) = candidate
                .get("content")
                .and_then(|c| c.get("parts"))
                .and_then(|v| v.as_array())
            {
                let mut combined_text = String::new();
                for part in parts {
                    if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                        combined_text.push_str(text);
                    }
                }

                if !combined_text.is_empty() {
                    // Some backends replay the accumulated text instead of a
                    // fresh fragment; emit only the unseen suffix then.
                    let delta = if combined_text.starts_with(&self.last_text) {
                        combined_text[self.last_text.len()..].to_string()
                    } else {
                        combined_text.clone()
                    };
                    self.last_text = combined_text;
                    if !delta.is_empty() {
                        self.pending.push_back(StreamEvent::TextDelta { text: delta });
                    }
                }
            }
        }

        if let Some(reason) = self.final_finish_reason.clone()
            && !self.emitted_done
        {
            self.emitted_done = true;
            let usage = self.final_usage.clone().unwrap_or_default();
            self.pending.push_back(StreamEvent::MessageDelta {
                stop_reason: Some(map_finish_reason(&reason)),
                usage: Some(usage),
            });
            self.pending.push_back(StreamEvent::MessageStop);
        }
    }
}

impl<S, E> Stream for GeminiSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<StreamEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(event) = self.try_next_event() {
                return Poll::Ready(Some(event));
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(anyhow!("Stream error: {}", e))));
                }
                Poll::Ready(None) => {
                    let is_empty = self.buffer.iter().all(u8::is_ascii_whitespace);
                    if is_empty {
                        return Poll::Ready(None);
                    }
                    if let Some(event) = self.try_next_event() {
                        return Poll::Ready(Some(event));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn map_finish_reason(reason: &str) -> String {
    match reason {
        "MAX_TOKENS" | "max_tokens" => "max_tokens".to_string(),
        "STOP" | "stop" => "stop".to_string(),
        other => other.to_lowercase(),
    }
}

/// Finds the position of a double newline in the buffer.
fn find_double_newline(buffer: &[u8]) -> Option<(usize, usize)> {
    let crlf_pos = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    let lf_pos = buffer.windows(2).position(|w| w == b"\n\n");

    match (crlf_pos, lf_pos) {
        (Some(c), Some(l)) => {
            if l <= c {
                Some((l, 2))
            } else {
                Some((c, 4))
            }
        }
        (Some(c), None) => Some((c, 4)),
        (None, Some(l)) => Some((l, 2)),
        (None, None) => None,
    }
}

fn parse_sse_data(chunk: &str) -> Result<Option<Value>> {
    let mut data_lines = Vec::new();
    for line in chunk.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim());
        }
    }
    if data_lines.is_empty() {
        return Ok(None);
    }
    let data = data_lines.join("\n");
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "[DONE]" {
        return Ok(None);
    }
    let value = serde_json::from_str::<Value>(trimmed)
        .map_err(|err| anyhow!("Failed to parse SSE JSON: {}", err))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::transcript::Turn;

    #[test]
    fn test_build_request_maps_roles_to_wire_names() {
        let turns = vec![Turn::model("seed"), Turn::user("hello")];
        let request = build_request(&turns, 0);

        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[0]["parts"][0]["text"], "seed");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[1]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_build_request_sets_generation_config_when_limited() {
        let turns = vec![Turn::user("hi")];

        let request = build_request(&turns, 1024);
        assert_eq!(request["generation_config"]["max_output_tokens"], 1024);

        let unlimited = build_request(&turns, 0);
        assert!(unlimited.get("generation_config").is_none());
    }

    #[test]
    fn test_extract_response_text_concatenates_parts() {
        let body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "Hello, "}, {"text": "world!"}]
                },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_response_text(&body).unwrap(), "Hello, world!");
    }

    #[test]
    fn test_extract_response_text_errors_without_candidates() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(extract_response_text(&body).is_err());
    }

    #[test]
    fn test_parse_sse_data_reads_data_lines() {
        let value = parse_sse_data("data: {\"a\":1}\n").unwrap().unwrap();
        assert_eq!(value["a"], 1);
        assert!(parse_sse_data(": keepalive\n").unwrap().is_none());
        assert!(parse_sse_data("data: [DONE]\n").unwrap().is_none());
    }

    #[test]
    fn test_find_double_newline_prefers_earliest() {
        assert_eq!(find_double_newline(b"abc\n\ndef"), Some((3, 2)));
        assert_eq!(find_double_newline(b"abc\r\n\r\ndef"), Some((3, 4)));
        assert_eq!(find_double_newline(b"abc"), None);
    }

    fn sse_bytes(chunks: &[&str]) -> Vec<std::result::Result<bytes::Bytes, std::io::Error>> {
        chunks
            .iter()
            .map(|c| Ok(bytes::Bytes::from(format!("data: {}\n\n", c))))
            .collect()
    }

    #[tokio::test]
    async fn test_parser_emits_deltas_and_stop() {
        let chunks = sse_bytes(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":", world!"}],"role":"model"},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":5}}"#,
        ]);
        let mut parser = GeminiSseParser::new(futures_util::stream::iter(chunks));

        let mut text = String::new();
        let mut saw_stop = false;
        while let Some(event) = parser.next().await {
            match event.unwrap() {
                StreamEvent::TextDelta { text: t } => text.push_str(&t),
                StreamEvent::MessageDelta { stop_reason, usage } => {
                    assert_eq!(stop_reason.as_deref(), Some("stop"));
                    assert_eq!(usage.unwrap().output_tokens, 5);
                }
                StreamEvent::MessageStop => saw_stop = true,
                StreamEvent::Error { .. } => panic!("unexpected error event"),
            }
        }
        assert_eq!(text, "Hello, world!");
        assert!(saw_stop);
    }

    #[tokio::test]
    async fn test_parser_deduplicates_cumulative_replays() {
        let chunks = sse_bytes(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"Hel"}],"role":"model"}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"},"finishReason":"STOP"}]}"#,
        ]);
        let mut parser = GeminiSseParser::new(futures_util::stream::iter(chunks));

        let mut text = String::new();
        while let Some(event) = parser.next().await {
            if let StreamEvent::TextDelta { text: t } = event.unwrap() {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_parser_surfaces_error_chunk() {
        let chunks = sse_bytes(&[
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        ]);
        let mut parser = GeminiSseParser::new(futures_util::stream::iter(chunks));

        let event = parser.next().await.unwrap().unwrap();
        match event {
            StreamEvent::Error {
                error_type,
                message,
            } => {
                assert_eq!(error_type, "RESOURCE_EXHAUSTED");
                assert_eq!(message, "Quota exceeded");
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }
}
