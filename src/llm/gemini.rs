//! Google Gemini `generateContent` client

use super::types::{LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default model for transcript questions
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const PUBLIC_API: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP client timeout. Callers still enforce their own deadline on top,
/// since a stalled response body can outlive this.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GeminiService {
    client: Client,
    endpoint: String,
    /// `None` when a gateway holds the credentials
    api_key: Option<String>,
    model_id: String,
}

impl GeminiService {
    pub fn new(api_key: String, model: &str, gateway: Option<&str>) -> Result<Self, LlmError> {
        let (api_root, api_key) = match gateway {
            Some(gw) => (format!("{}/gemini/v1beta", gw.trim_end_matches('/')), None),
            None => (PUBLIC_API.to_string(), Some(api_key)),
        };

        Ok(Self {
            client: Client::builder().timeout(CLIENT_TIMEOUT).build()?,
            endpoint: format!("{api_root}/models/{model}:generateContent"),
            api_key,
            model_id: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut call = self.client.post(&self.endpoint).json(&build_request(request));
        if let Some(key) = &self.api_key {
            call = call.header("x-goog-api-key", key);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => envelope.error.message,
                Err(_) => body,
            };
            return Err(LlmError::from_status(status, &detail));
        }

        into_response(response.json().await?)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// System turns become the system instruction; the dialogue keeps its order,
/// with assistant turns sent under Gemini's `model` role.
fn build_request(request: &LlmRequest) -> GenerateRequest<'_> {
    let system_instruction = (!request.system.is_empty()).then(|| Content {
        role: None,
        parts: request
            .system
            .iter()
            .map(|text| Part { text: text.as_str() })
            .collect(),
    });

    let contents = request
        .messages
        .iter()
        .map(|msg| Content {
            role: Some(match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            }),
            parts: vec![Part { text: &msg.text }],
        })
        .collect();

    GenerateRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

fn into_response(resp: GenerateResponse) -> Result<LlmResponse, LlmError> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::malformed("response has no candidates"))?;

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::malformed(format!(
            "empty reply (finish reason {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(LlmResponse {
        text,
        usage: Usage {
            input_tokens: resp.usage_metadata.prompt_token_count,
            output_tokens: resp.usage_metadata.candidates_token_count,
        },
    })
}

// Wire format

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
