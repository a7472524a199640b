use anyhow::{Context, Result};
use futures::future;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Provider, ProviderSettings};
use crate::conversation::{Message, Role};
use crate::error::StreamError;
use crate::providers::{Endpoints, GoogleProvider, StreamingProvider, ZhipuProvider};
use crate::streaming::{ChunkStream, FragmentStream, collect_text, into_fragments, single_fragment};

/// One entry of the history sent to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Entry point of the streaming adapter.
///
/// Whatever backend is selected, a reply comes back as a lazy stream of text
/// fragments. Failures of any kind end the stream with one readable fragment
/// instead of an error.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl LlmClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tutorchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoints: Endpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Binding for the selected provider, holding a copy of its credential
    pub fn provider_for(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn StreamingProvider>, StreamError> {
        let selected = settings.selected_provider;
        let api_key = settings
            .api_key(selected)
            .ok_or(StreamError::NotConfigured(selected))?;

        Ok(match selected {
            Provider::Google => Box::new(GoogleProvider::new(
                self.client.clone(),
                self.endpoints.google_base.clone(),
                api_key,
            )),
            Provider::Zhipu => Box::new(ZhipuProvider::new(
                self.client.clone(),
                self.endpoints.zhipu_url.clone(),
                api_key,
            )),
        })
    }

    /// Stream the reply to `history` (oldest first, newest user message last).
    ///
    /// Credentials are read from `settings` now; nothing touches the network
    /// until the returned stream is first polled. The stream cannot be restarted.
    pub fn stream(&self, history: Vec<ChatTurn>, settings: &ProviderSettings) -> FragmentStream {
        let provider = match self.provider_for(settings) {
            Ok(provider) => provider,
            Err(err) => {
                warn!(error = %err, "cannot stream reply");
                return single_fragment(err.to_string());
            }
        };

        info!(provider = %provider.kind(), turns = history.len(), "streaming reply");
        let chunks: ChunkStream = stream::once(async move { provider.open(history).await })
            .flat_map(|opened| match opened {
                Ok(chunks) => chunks,
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            })
            .boxed();

        into_fragments(chunks)
    }

    /// Full reply text, for callers with no use for incremental output
    pub async fn complete(&self, history: Vec<ChatTurn>, settings: &ProviderSettings) -> String {
        collect_text(self.stream(history, settings)).await
    }
}
