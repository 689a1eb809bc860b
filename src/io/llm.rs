//! Chat-completion client for an OpenAI-compatible API.
//!
//! The [`CompletionClient`] trait decouples the phase loop from the HTTP
//! backend; tests use scripted clients that return predetermined responses
//! without network access.

use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// One completion request issued by the phase loop.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fully rendered prompt text, sent as a single user message.
    pub prompt: String,
    /// Sampling temperature for this attempt.
    pub temperature: f64,
}

/// Abstraction over completion backends.
pub trait CompletionClient {
    /// Request a completion and return the full assistant reply text.
    ///
    /// Streaming implementations may forward fragments to stdout as they
    /// arrive; the returned string is always the full concatenation.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Blocking client for the OpenAI chat-completions endpoint.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
    model: String,
    stream: bool,
}

impl OpenAiClient {
    /// Build a client with a per-request timeout.
    ///
    /// `stream` selects SSE streaming; fragments are echoed to stdout as they
    /// arrive for live observability.
    pub fn new(
        api_base: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
        stream: bool,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            stream,
        })
    }

    /// Build a client reading the API key from `OPENAI_API_KEY`.
    pub fn from_env(api_base: &str, model: &str, timeout: Duration, stream: bool) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        Self::new(api_base, model, &api_key, timeout, stream)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, streaming = self.stream, temperature = request.temperature))]
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            stream: self.stream,
        };

        info!(prompt_bytes = request.prompt.len(), "requesting completion");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("send completion request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("completion request failed: HTTP {status} - {body}");
        }

        if self.stream {
            read_sse_body(response)
        } else {
            let parsed: ChatResponse = response.json().context("parse completion response")?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("completion response contained no choices"))?;
            Ok(content.trim().to_string())
        }
    }
}

/// Read an SSE chat-completion body, echoing each fragment to stdout.
///
/// Concatenation of the fragments in arrival order reconstructs the reply.
fn read_sse_body(response: reqwest::blocking::Response) -> Result<String> {
    let mut buffer = String::new();
    let reader = BufReader::new(response);
    let mut stdout = std::io::stdout();

    for line in reader.lines() {
        let line = line.context("read stream line")?;
        let Some(payload) = line.strip_prefix("data: ") else {
            continue;
        };
        if payload == "[DONE]" {
            break;
        }
        let chunk: StreamChunk =
            serde_json::from_str(payload).context("parse stream chunk")?;
        for choice in chunk.choices {
            if let Some(fragment) = choice.delta.content {
                print!("{fragment}");
                stdout.flush().ok();
                buffer.push_str(&fragment);
            }
        }
    }
    println!();

    debug!(reply_bytes = buffer.len(), "stream complete");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_serializes_single_user_message() {
        let body = ChatRequest {
            model: "gpt-4",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            temperature: 0.0,
            stream: false,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn response_parses_first_choice_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"reply"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).expect("parse");
        let content = parsed.choices[0].message.content.as_deref();
        assert_eq!(content, Some("reply"));
    }

    #[test]
    fn stream_chunk_tolerates_missing_delta_content() {
        let raw = r#"{"choices":[{"delta":{}}]}"#;
        let parsed: StreamChunk = serde_json::from_str(raw).expect("parse");
        assert!(parsed.choices[0].delta.content.is_none());

        let raw = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let parsed: StreamChunk = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("hi"));
    }
}
