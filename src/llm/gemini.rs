use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{Config, COMPOSITOR_INSTRUCTION};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

/// Outbound `generateContent` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiRequestContent>,
    pub generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequestContent {
    pub role: String,
    pub parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiRequestInlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequestInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub response_modalities: Vec<String>,
}

// Every level of the response is optional, including individual array
// entries; a missing or null level just means there is no image there.
#[derive(Debug, Default, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Option<GeminiCandidate>>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Option<Vec<Option<GeminiPart>>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiInlineData {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub data: String,
    pub mime_type: String,
}

impl GeminiInlineData {
    fn is_image(&self) -> bool {
        let has_data = self.data.as_deref().is_some_and(|data| !data.is_empty());
        let is_image_mime = self
            .mime_type
            .as_deref()
            .is_some_and(|mime| mime.starts_with("image/"));
        has_data && is_image_mime
    }
}

impl GeminiResponse {
    /// First inline image in candidate order, then part order.
    pub fn into_first_image(self) -> Option<ExtractedImage> {
        self.candidates
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|candidate| candidate.content)
            .filter_map(|content| content.parts)
            .flatten()
            .flatten()
            .filter_map(|part| part.inline_data)
            .find(GeminiInlineData::is_image)
            .and_then(|inline| {
                Some(ExtractedImage {
                    data: inline.data?,
                    mime_type: inline.mime_type?,
                })
            })
    }
}

/// Seam between the composite handler and the model provider.
#[async_trait]
pub trait CompositeProvider: Send + Sync {
    async fn generate_content(
        &self,
        api_key: &str,
        request: GenerateContentRequest,
    ) -> Result<GeminiResponse>;
}

pub fn build_composite_request(
    prompt: &str,
    character: GeminiRequestInlineData,
    clothing: GeminiRequestInlineData,
) -> GenerateContentRequest {
    let parts = vec![
        GeminiRequestPart::Text {
            text: format!("{COMPOSITOR_INSTRUCTION} {prompt}"),
        },
        GeminiRequestPart::InlineData {
            inline_data: character,
        },
        GeminiRequestPart::InlineData {
            inline_data: clothing,
        },
    ];

    GenerateContentRequest {
        contents: vec![GeminiRequestContent {
            role: "user".to_string(),
            parts,
        }],
        generation_config: GeminiGenerationConfig {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
        },
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_base: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_base: &str, model: &str, timeout: Duration) -> Self {
        GeminiClient {
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        GeminiClient::new(
            &config.gemini_api_base,
            &config.gemini_image_model,
            Duration::from_secs(config.gemini_timeout_seconds),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

#[async_trait]
impl CompositeProvider for GeminiClient {
    async fn generate_content(
        &self,
        api_key: &str,
        request: GenerateContentRequest,
    ) -> Result<GeminiResponse> {
        let metadata = json!({ "parts": request.contents.iter().map(|c| c.parts.len()).sum::<usize>() });
        log_llm_timing("gemini", &self.model, "composite", Some(metadata), || async {
            call_gemini_api(self, api_key, &request).await
        })
        .await
    }
}

fn redact_api_key(text: &str, api_key: &str) -> String {
    let key = api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_request(request: &GenerateContentRequest) -> Value {
    let contents: Vec<Value> = request
        .contents
        .iter()
        .map(|content| {
            let parts: Vec<Value> = content
                .parts
                .iter()
                .map(|part| match part {
                    GeminiRequestPart::Text { text } => {
                        json!({ "text": truncate_for_log(text, 200) })
                    }
                    GeminiRequestPart::InlineData { inline_data } => json!({
                        "inlineData": {
                            "mimeType": inline_data.mime_type,
                            "dataLen": inline_data.data.len()
                        }
                    }),
                })
                .collect();
            json!({ "role": content.role, "parts": parts })
        })
        .collect();

    json!({
        "contents": contents,
        "generationConfig": { "responseModalities": request.generation_config.response_modalities }
    })
}

fn summarize_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut other_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates.iter().flatten() {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts.iter().flatten() {
            if let Some(inline_data) = &part.inline_data {
                if inline_data.is_image() {
                    image_parts += 1;
                } else {
                    other_parts += 1;
                }
            } else if let Some(text) = &part.text {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            } else {
                other_parts += 1;
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
        "otherParts": other_parts,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

async fn call_gemini_api(
    client_config: &GeminiClient,
    api_key: &str,
    request: &GenerateContentRequest,
) -> Result<GeminiResponse> {
    let client = get_http_client();
    let model = client_config.model.as_str();

    if tracing::enabled!(tracing::Level::DEBUG) {
        let payload_summary = summarize_request(request);
        debug!(target: "llm.gemini", model = model, payload = %payload_summary);
    }

    let response = match client
        .post(client_config.endpoint())
        .header("x-goog-api-key", api_key)
        .timeout(client_config.timeout)
        .json(request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            let err_text = redact_api_key(&err.to_string(), api_key);
            warn!(
                "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                err_text,
                err.is_timeout(),
                err.is_connect(),
                err.status(),
            );
            return Err(anyhow!("Gemini request failed: {}", err_text));
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body = redact_api_key(&body, api_key);
        let (message, body_summary) = summarize_error_body(&body);
        warn!("Gemini API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "Gemini request failed with status {}: {}",
            status,
            detail
        ));
    }

    let value = response
        .json::<GeminiResponse>()
        .await
        .map_err(|err| anyhow!("Failed to decode Gemini response: {}", err))?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        let response_summary = summarize_response(&value);
        debug!(target: "llm.gemini", model = model, response = %response_summary);
    }
    Ok(value)
}
