// Classification Provider Service
// Implements the remote chat-completion call used for sponsor classification

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

const PROVIDER_NAME: &str = "deepseek";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_TIMEOUT_SECS: u64 = 80;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

impl ProviderError {
    /// Transient failures are worth one retry; auth and response-shape
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

pub struct ProviderClient {
    client: Client,
    chat_url: String,
    model: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            chat_url: resolve_chat_url(),
            model: resolve_model(),
        }
    }

    pub fn with_proxy(proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .proxy(proxy)
            .build()?;

        Ok(Self {
            client,
            chat_url: resolve_chat_url(),
            model: resolve_model(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat-completion request and return the assistant content.
    pub async fn call_chat(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            // Low temperature for consistent classification results.
            temperature: 0.1,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.chat_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult {
            content,
            latency_ms,
        })
    }
}

/// Resolve the chat URL: environment first, config file second, built-in
/// default last (same precedence as `get_api_key`).
fn resolve_chat_url() -> String {
    let env_url = non_empty_env("SPONSORSKIP_PROVIDER_URL")
        .or_else(|| non_empty_env("DEEPSEEK_API_URL"));
    pick_chat_url(env_url, config_provider().and_then(|p| p.base_url))
}

fn resolve_model() -> String {
    let env_model = non_empty_env("SPONSORSKIP_PROVIDER_MODEL");
    pick_model(env_model, config_provider().and_then(|p| p.model))
}

fn pick_chat_url(env_url: Option<String>, config_url: Option<String>) -> String {
    env_url
        .or(config_url)
        .unwrap_or_else(|| DEEPSEEK_DEFAULT_URL.to_string())
}

fn pick_model(env_model: Option<String>, config_model: Option<String>) -> String {
    env_model
        .or(config_model)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Provider settings stored in the config file, if any.
fn config_provider() -> Option<super::ProviderConfig> {
    let config_dir = super::ConfigStore::default_config_dir()?;
    let store = super::ConfigStore::new(config_dir);
    store.get_provider(PROVIDER_NAME).ok().flatten()
}

/// Get the classification API key from environment or config file.
/// Absent key means the provider is unconfigured and the adapter
/// short-circuits to the heuristic without attempting a call.
pub fn get_api_key() -> Option<String> {
    for key in ["DEEPSEEK_API_KEY", "SPONSORSKIP_API_KEY"] {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(PROVIDER_NAME) {
            return Some(key);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_client_creation() {
        let client = ProviderClient::new();
        assert!(client.chat_url.contains("/chat/completions"));
        assert!(!client.model().is_empty());
    }

    #[test]
    fn test_chat_url_precedence_env_then_config_then_default() {
        let env_url = Some("http://env.example/chat/completions".to_string());
        let config_url = Some("http://config.example/chat/completions".to_string());

        assert_eq!(
            pick_chat_url(env_url.clone(), config_url.clone()),
            "http://env.example/chat/completions"
        );
        assert_eq!(
            pick_chat_url(None, config_url),
            "http://config.example/chat/completions"
        );
        assert_eq!(pick_chat_url(None, None), DEEPSEEK_DEFAULT_URL);
    }

    #[test]
    fn test_model_precedence_env_then_config_then_default() {
        assert_eq!(
            pick_model(Some("env-model".to_string()), Some("config-model".to_string())),
            "env-model"
        );
        assert_eq!(
            pick_model(None, Some("config-model".to_string())),
            "config-model"
        );
        assert_eq!(pick_model(None, None), DEFAULT_MODEL);
    }

    #[test]
    fn test_api_error_transience() {
        let server_side = ProviderError::ApiError {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(server_side.is_transient());

        let auth = ProviderError::ApiError {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(!auth.is_transient());

        assert!(!ProviderError::MissingApiKey.is_transient());
        assert!(!ProviderError::MissingContent.is_transient());
    }
}
