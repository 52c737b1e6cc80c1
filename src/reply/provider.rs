//! Response generator (LLM) collaborator

use std::collections::VecDeque;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure from a response generator
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider asked us to slow down
    #[error("rate limited by provider")]
    RateLimited {
        /// Server-suggested wait, if it sent one
        retry_after: Option<Duration>,
    },

    /// Credentials rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Request never completed
    #[error("network error: {0}")]
    Network(String),

    /// Provider returned an error status
    #[error("provider error {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Provider answered with nothing usable
    #[error("provider returned an empty reply")]
    EmptyReply,
}

/// Turns a user utterance into reply text
pub trait ResponseGenerator {
    /// Generate a reply
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any provider failure
    fn respond(&mut self, utterance: &str) -> Result<String, ProviderError>;

    /// Forget any conversation state
    fn reset(&mut self) {}
}

/// Chat completion settings
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model identifier
    pub model: String,
    /// Maximum reply tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Persona prompt
    pub system_prompt: String,
    /// Past exchanges kept as context
    pub history_turns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// `OpenAI` chat completions client with short conversation memory
pub struct OpenAiResponder {
    client: reqwest::blocking::Client,
    api_key: SecretString,
    options: ChatOptions,
    system: ChatMessage,
    history: VecDeque<ChatMessage>,
}

impl OpenAiResponder {
    /// Create a responder
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(api_key: SecretString, options: ChatOptions) -> crate::Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(crate::Error::Config(
                "OpenAI API key required for responses".to_string(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let system = ChatMessage::new("system", &options.system_prompt);

        Ok(Self {
            client,
            api_key,
            options,
            system,
            history: VecDeque::new(),
        })
    }

    fn remember(&mut self, user: &str, assistant: &str) {
        self.history.push_back(ChatMessage::new("user", user));
        self.history.push_back(ChatMessage::new("assistant", assistant));
        while self.history.len() > self.options.history_turns * 2 {
            self.history.pop_front();
        }
    }
}

impl ResponseGenerator for OpenAiResponder {
    fn respond(&mut self, utterance: &str) -> Result<String, ProviderError> {
        let user = ChatMessage::new("user", utterance);
        let messages = std::iter::once(&self.system)
            .chain(self.history.iter())
            .chain(std::iter::once(&user))
            .collect();

        let request = ChatRequest {
            model: &self.options.model,
            messages,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), body, retry_after));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyReply)?;

        tracing::debug!(response_len = reply.len(), "provider responded");
        self.remember(utterance, &reply);
        Ok(reply)
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

/// Map an error status to a [`ProviderError`]
#[must_use]
pub fn classify_status(status: u16, body: String, retry_after: Option<Duration>) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after },
        401 | 403 => ProviderError::Auth(body),
        _ => ProviderError::Api { status, body },
    }
}

/// Parse a delay-seconds `Retry-After` value
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(429, String::new(), Some(Duration::from_secs(3))),
            ProviderError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
        assert!(matches!(classify_status(401, "bad key".into(), None), ProviderError::Auth(_)));
        assert!(matches!(
            classify_status(500, "oops".into(), None),
            ProviderError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut responder = OpenAiResponder::new(
            SecretString::from("sk-test".to_string()),
            ChatOptions {
                model: "gpt-4o".to_string(),
                max_tokens: 300,
                temperature: 0.8,
                system_prompt: "You are a robot.".to_string(),
                history_turns: 2,
            },
        )
        .unwrap();

        for i in 0..5 {
            responder.remember(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(responder.history.len(), 4);
        assert_eq!(responder.history[0].content, "q3");

        responder.reset();
        assert!(responder.history.is_empty());
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = OpenAiResponder::new(
            SecretString::from(String::new()),
            ChatOptions {
                model: "gpt-4o".to_string(),
                max_tokens: 300,
                temperature: 0.8,
                system_prompt: String::new(),
                history_turns: 0,
            },
        );
        assert!(result.is_err());
    }
}
