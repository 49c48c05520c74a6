//! Chat-completions client for a language model deployment behind an API
//! gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{NarrativeError, NarrativeResult};
use super::NarrativeSynthesizer;
use crate::config::OpenAiSettings;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Message {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Message {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub stream: bool,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub user: &'a str,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice.
    pub fn into_content(self) -> NarrativeResult<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(NarrativeError::EmptyResponse)
    }
}

/// Calls one chat-completions deployment.
pub struct ChatCompletionClient {
    settings: OpenAiSettings,
    http_client: Client,
}

impl ChatCompletionClient {
    pub fn new(settings: &OpenAiSettings) -> NarrativeResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;
        Ok(Self {
            settings: settings.clone(),
            http_client,
        })
    }

    fn request<'a>(&'a self, system_prompt: &str, text: &str) -> ChatRequest<'a> {
        ChatRequest {
            stream: false,
            max_tokens: self.settings.max_tokens,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            user: &self.settings.user,
            messages: vec![Message::system(system_prompt), Message::user(text)],
        }
    }
}

#[async_trait]
impl NarrativeSynthesizer for ChatCompletionClient {
    async fn synthesize(&self, system_prompt: &str, text: &str) -> NarrativeResult<String> {
        debug!(chars = text.len(), "requesting completion");

        let response = self
            .http_client
            .post(self.settings.chat_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.settings.subscription_key)
            .header("Cache-Control", "no-cache")
            .json(&self.request(system_prompt, text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.into_content()
    }
}
