//! Generator backed by an OpenAI-compatible chat completions endpoint.

use crate::config::ProviderConfig;
use crate::error::GenerationError;
use crate::generation::StepGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "You write one section of a longer document at a time. \
Return only the section body in markdown, without repeating the section heading.";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl HttpGenerator {
    /// Builds a generator from provider configuration. The API key is read from the
    /// environment variable named by `api_key_env`, when one is set.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, GenerationError> {
        let api_key = match config.api_key_env.as_deref() {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                GenerationError::NotConfigured(format!("environment variable {} is not set", var))
            })?),
            None => None,
        };
        let client = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                GenerationError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, step_description: &str, prior_context: &str) -> ChatCompletionRequest {
        let mut user = format!("Write the section: {}", step_description);
        if !prior_context.trim().is_empty() {
            user.push_str("\n\nEarlier sections, for continuity:\n");
            user.push_str(prior_context);
        }
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl StepGenerator for HttpGenerator {
    async fn generate(
        &self,
        step_description: &str,
        prior_context: &str,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .json(&self.build_request(step_description, prior_context));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status(status, body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("No choices in response".to_string()))
    }
}

fn map_status(status: u16, body: String) -> GenerationError {
    match status {
        401 | 403 => GenerationError::AuthFailed(body),
        429 => GenerationError::RateLimited(body),
        _ => GenerationError::RequestFailed(format!("status {}: {}", status, body)),
    }
}

fn map_http_error(error: reqwest::Error) -> GenerationError {
    if let Some(status) = error.status() {
        map_status(status.as_u16(), error.to_string())
    } else if error.is_timeout() {
        GenerationError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        GenerationError::RequestFailed(format!("Connection error: {}", error))
    } else {
        GenerationError::RequestFailed(format!("HTTP error: {}", error))
    }
}
