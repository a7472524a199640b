//! A small client for the Generative Language API, shaped after the official
//! SDKs: a model handle, a chat session seeded with history, and a streaming
//! send that yields typed response chunks.

use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiErrorBody, StreamingProvider, check_status};
use crate::config::Provider;
use crate::conversation::Role;
use crate::error::StreamError;
use crate::llm::ChatTurn;
use crate::prompts::{TUTOR_ACK, TUTOR_PROMPT};
use crate::streaming::{ChunkStream, sse_stream};

pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const GOOGLE_MODEL: &str = "gemma-3-27b-it";

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_p: 0.8,
    top_k: 40,
    max_output_tokens: 2048,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: GenerationConfig,
}

/// One streamed chunk of a reply
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; empty for metadata-only chunks
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    #[serde(flatten)]
    response: GenerateContentResponse,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

fn decode_response(data: &str) -> Result<Option<GenerateContentResponse>, StreamError> {
    let envelope: ChunkEnvelope =
        serde_json::from_str(data).map_err(|e| StreamError::Malformed(e.to_string()))?;

    if let Some(error) = envelope.error {
        return Err(StreamError::Api(error.message));
    }
    if let Some(reason) = envelope
        .response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(StreamError::Api(format!("response blocked ({reason})")));
    }

    Ok(Some(envelope.response))
}

/// Handle on one hosted model
#[derive(Debug, Clone)]
pub struct GenerativeModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    generation_config: GenerationConfig,
}

impl GenerativeModel {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            generation_config: GENERATION_CONFIG,
        }
    }

    pub fn start_chat(&self, history: Vec<Content>) -> ChatSession {
        ChatSession {
            model: self.clone(),
            history,
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// History plus the model it is replayed against
#[derive(Debug, Clone)]
pub struct ChatSession {
    model: GenerativeModel,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Send `text` as the next user turn and stream the reply chunks
    pub async fn send_message_stream(
        mut self,
        text: &str,
    ) -> Result<BoxStream<'static, Result<GenerateContentResponse, StreamError>>, StreamError> {
        self.history.push(Content::new("user", text));

        let request = GenerateContentRequest {
            contents: &self.history,
            generation_config: self.model.generation_config,
        };

        let url = self.model.stream_url();
        debug!(%url, contents = self.history.len(), "sending google request");
        let response = self
            .model
            .client
            .post(&url)
            .header("x-goog-api-key", &self.model.api_key)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response, Provider::Google).await?;
        Ok(sse_stream(response.bytes_stream(), decode_response))
    }
}

fn model_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Google binding. The model has no system role, so the tutoring prompt is
/// replayed as the opening user turn followed by a canned acknowledgement.
pub struct GoogleProvider {
    model: GenerativeModel,
}

impl GoogleProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: GenerativeModel::new(client, base_url, api_key, GOOGLE_MODEL),
        }
    }
}

#[async_trait]
impl StreamingProvider for GoogleProvider {
    fn kind(&self) -> Provider {
        Provider::Google
    }

    async fn open(&self, history: Vec<ChatTurn>) -> Result<ChunkStream, StreamError> {
        let (last, earlier) = history.split_last().ok_or(StreamError::EmptyHistory)?;

        let mut contents = Vec::with_capacity(earlier.len() + 2);
        contents.push(Content::new("user", TUTOR_PROMPT));
        contents.push(Content::new("model", TUTOR_ACK));
        contents.extend(
            earlier
                .iter()
                .map(|turn| Content::new(model_role(turn.role), turn.content.as_str())),
        );

        let chunks = self
            .model
            .start_chat(contents)
            .send_message_stream(&last.content)
            .await?;

        Ok(chunks
            .filter_map(|chunk| {
                future::ready(match chunk {
                    Ok(response) => {
                        let text = response.text();
                        (!text.is_empty()).then_some(Ok(text))
                    }
                    Err(err) => Some(Err(err)),
                })
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_parts_of_first_candidate() {
        let chunk = decode_response(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.text(), "Hello");
    }

    #[test]
    fn metadata_only_chunk_has_no_text() {
        let chunk = decode_response(
            r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":12}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.text(), "");
        assert_eq!(chunk.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let err = decode_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert_eq!(err.to_string(), "API Error: response blocked (SAFETY)");
    }

    #[test]
    fn error_envelope_is_surfaced() {
        let err = decode_response(r#"{"error":{"code":400,"message":"API key not valid"}}"#)
            .unwrap_err();
        assert!(matches!(err, StreamError::Api(ref m) if m == "API key not valid"));
    }

    #[test]
    fn generation_config_serializes_camel_case() {
        let value = serde_json::to_value(GENERATION_CONFIG).unwrap();
        assert_eq!(value["topK"], 40);
        assert_eq!(value["maxOutputTokens"], 2048);
    }

    #[test]
    fn start_chat_keeps_history() {
        let model = GenerativeModel::new(reqwest::Client::new(), GOOGLE_API_BASE, "key", GOOGLE_MODEL);
        let chat = model.start_chat(vec![Content::new("user", "hi"), Content::new("model", "hello")]);
        assert_eq!(chat.history().len(), 2);
        assert_eq!(
            model.stream_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemma-3-27b-it:streamGenerateContent?alt=sse"
        );
    }
}
