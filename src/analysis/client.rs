// file: src/analysis/client.rs
// description: openai-compatible chat completions client for alert assessment
// reference: https://platform.openai.com/docs/api-reference/chat

use crate::analysis::AlertAnalyzer;
use crate::analysis::prompt::build_prompt;
use crate::config::{AiConfig, OutputConfig};
use crate::error::{Result, TriageError};
use crate::models::{ExtractedRecord, PairIntel};
use crate::utils::Validator;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct ChatCompletionAnalyzer {
    client: Client,
    api_key: String,
    endpoint: String,
    ai: AiConfig,
    output: OutputConfig,
}

impl ChatCompletionAnalyzer {
    /// Fails with `ConfigMissing` when no api key is configured.
    pub fn from_config(ai: &AiConfig, output: &OutputConfig) -> Result<Self> {
        let api_key = ai
            .credential()
            .ok_or_else(|| TriageError::ConfigMissing("ai.api_key".to_string()))?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(ai.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", ai.base_url.trim_end_matches('/')),
            ai: ai.clone(),
            output: output.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.ai.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.ai.temperature,
            max_tokens: self.ai.max_tokens,
        };

        debug!(
            "Requesting assessment from {} ({} prompt chars)",
            self.ai.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TriageError::AiCall("request timed out".to_string())
                } else {
                    TriageError::AiCall(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TriageError::AiCall(format!(
                "{}: {}",
                status.as_u16(),
                Validator::truncate_text(&body, ERROR_BODY_CHARS)
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| TriageError::AiCall(format!("malformed response: {}", e)))?;

        first_content(body)
    }
}

fn first_content(body: ChatResponse) -> Result<String> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TriageError::AiCall("empty response".to_string()))?;

    choice
        .message
        .and_then(|m| m.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| TriageError::AiCall("response has no content".to_string()))
}

impl AlertAnalyzer for ChatCompletionAnalyzer {
    fn analyze<'a>(
        &'a self,
        record: &'a ExtractedRecord,
        intel: Option<&'a PairIntel>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let prompt = build_prompt(record, intel, &self.ai, &self.output);
            self.complete(&prompt).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_key() {
        let ai = AiConfig::default();
        assert!(matches!(
            ChatCompletionAnalyzer::from_config(&ai, &OutputConfig::default()),
            Err(TriageError::ConfigMissing(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let ai = AiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://llm.example.com/v1/".to_string(),
            ..AiConfig::default()
        };
        let analyzer = ChatCompletionAnalyzer::from_config(&ai, &OutputConfig::default()).unwrap();
        assert_eq!(
            analyzer.endpoint(),
            "https://llm.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_first_content() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Threat level: high"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(body).unwrap(), "Threat level: high");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_content(empty), Err(TriageError::AiCall(_))));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.7,
            max_tokens: 1000,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 1000);
    }
}
