use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::error::ChatError;

const TUTOR_PROMPT: &str = "You are a patient Mandarin tutor. Reply briefly, \
give pinyin for any Chinese you use, and correct mistakes gently.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in a tutoring conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Free-form tutor conversation over a chat-completions endpoint.
#[derive(Clone)]
pub struct TutorChatService {
    client: Client,
    config: Option<ChatConfig>,
}

impl TutorChatService {
    /// # Errors
    ///
    /// Returns `ChatError::Http` if the HTTP client cannot be built.
    pub fn new(config: Option<ChatConfig>, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Send the conversation so far and return the tutor's reply.
    ///
    /// # Errors
    ///
    /// Returns `ChatError` when the service is disabled, the history is empty,
    /// the request fails, or the response is empty.
    pub async fn reply(&self, history: &[ChatTurn]) -> Result<String, ChatError> {
        let config = self.config.as_ref().ok_or(ChatError::Disabled)?;
        if history.iter().all(|turn| turn.content.trim().is_empty()) {
            return Err(ChatError::EmptyConversation);
        }

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: &config.model,
            messages: build_messages(history),
            temperature: 0.4,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ChatError::EmptyResponse)?;

        Ok(content)
    }
}

fn build_messages(history: &[ChatTurn]) -> Vec<ChatMessage<'_>> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: TUTOR_PROMPT,
    });
    messages.extend(
        history
            .iter()
            .filter(|turn| !turn.content.trim().is_empty())
            .map(|turn| ChatMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: turn.content.as_str(),
            }),
    );
    messages
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
