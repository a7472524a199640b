use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiErrorBody, StreamingProvider, check_status};
use crate::config::Provider;
use crate::conversation::Role;
use crate::error::StreamError;
use crate::llm::ChatTurn;
use crate::prompts::TUTOR_PROMPT;
use crate::streaming::{ChunkStream, sse_stream};

pub const ZHIPU_CHAT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
pub const ZHIPU_MODEL: &str = "GLM-4.5-Flash";
pub const ZHIPU_TEMPERATURE: f64 = 0.7;
pub const ZHIPU_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

fn api_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Text delta of one `data:` payload; role-only and finish frames yield `None`
pub fn decode_chunk(data: &str) -> Result<Option<String>, StreamError> {
    let chunk: ChatChunk =
        serde_json::from_str(data).map_err(|e| StreamError::Malformed(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(StreamError::Api(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

/// BigModel chat completions over a raw SSE body
pub struct ZhipuProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl ZhipuProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl StreamingProvider for ZhipuProvider {
    fn kind(&self) -> Provider {
        Provider::Zhipu
    }

    async fn open(&self, history: Vec<ChatTurn>) -> Result<ChunkStream, StreamError> {
        if history.is_empty() {
            return Err(StreamError::EmptyHistory);
        }

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ApiMessage {
            role: "system",
            content: TUTOR_PROMPT,
        });
        messages.extend(history.iter().map(|turn| ApiMessage {
            role: api_role(turn.role),
            content: &turn.content,
        }));

        let request = ChatRequest {
            model: ZHIPU_MODEL,
            messages,
            stream: true,
            temperature: ZHIPU_TEMPERATURE,
            max_tokens: ZHIPU_MAX_TOKENS,
        };

        debug!(url = %self.url, messages = request.messages.len(), "sending zhipu request");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response = check_status(response, Provider::Zhipu).await?;
        Ok(sse_stream(response.bytes_stream(), decode_chunk))
    }
}
