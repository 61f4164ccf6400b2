use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::settings::ApiBase;
use crate::models::{CompositionRequest, NO_IMAGE_RETURNED};
use crate::utils::http::get_http_client;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("NO_IMAGE_RETURNED")]
    NoImageReturned,
    #[error("GENERATION_FAILED:{0}")]
    GenerationFailed(String),
    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub base64: String,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(&self.base64)
    }
}

/// Where and how long to talk to the composite proxy.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub api_base: ApiBase,
    pub endpoint: String,
    pub local_origin: String,
    pub timeout: Duration,
}

impl ProxyTarget {
    pub fn url(&self) -> String {
        self.api_base.endpoint_url(&self.endpoint, &self.local_origin)
    }
}

pub async fn generate_dress_up_image(
    target: &ProxyTarget,
    request: &CompositionRequest,
) -> Result<GeneratedImage, GenerationError> {
    let url = target.url();
    debug!("Posting composite request to {}", url);

    let response = get_http_client()
        .post(&url)
        .timeout(target.timeout)
        .json(request)
        .send()
        .await
        .map_err(|err| {
            warn!(
                "Composite request to {} failed to send: {} (timeout={}, connect={})",
                url,
                err,
                err.is_timeout(),
                err.is_connect()
            );
            GenerationError::Unknown(err.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_GATEWAY && body.trim() == NO_IMAGE_RETURNED {
            warn!("Composite proxy returned no image");
            return Err(GenerationError::NoImageReturned);
        }
        let detail = if body.trim().is_empty() {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string())
        } else {
            body
        };
        warn!("Composite proxy returned {}: {}", status, detail);
        return Err(GenerationError::GenerationFailed(detail));
    }

    let body = response
        .json::<Value>()
        .await
        .map_err(|err| GenerationError::Unknown(err.to_string()))?;
    parse_generated_image(&body).ok_or(GenerationError::NoImageReturned)
}

fn parse_generated_image(body: &Value) -> Option<GeneratedImage> {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    Some(GeneratedImage {
        base64: field("imageBase64")?,
        mime_type: field("mimeType")?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use serde_json::json;

    use super::*;
    use crate::config::{Config, DEFAULT_COMPOSITE_ENDPOINT};
    use crate::llm::gemini::{GeminiResponse, GenerateContentRequest};
    use crate::llm::CompositeProvider;
    use crate::models::EncodedImage;
    use crate::proxy::{create_router, AppState};

    struct OneImageProvider;

    #[async_trait::async_trait]
    impl CompositeProvider for OneImageProvider {
        async fn generate_content(
            &self,
            _api_key: &str,
            _request: GenerateContentRequest,
        ) -> anyhow::Result<GeminiResponse> {
            Ok(serde_json::from_value(json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "Done." },
                    { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
                ] } }]
            }))?)
        }
    }

    struct TextOnlyProvider;

    #[async_trait::async_trait]
    impl CompositeProvider for TextOnlyProvider {
        async fn generate_content(
            &self,
            _api_key: &str,
            _request: GenerateContentRequest,
        ) -> anyhow::Result<GeminiResponse> {
            Ok(serde_json::from_value(json!({
                "candidates": [{ "content": { "parts": [{ "text": "No outfit for you." }] } }]
            }))?)
        }
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn target(origin: &str) -> ProxyTarget {
        ProxyTarget {
            api_base: ApiBase::parse(origin).unwrap(),
            endpoint: DEFAULT_COMPOSITE_ENDPOINT.to_string(),
            local_origin: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    fn request() -> CompositionRequest {
        CompositionRequest {
            character: EncodedImage::new("Q0hBUg==".to_string(), "image/png"),
            clothing: EncodedImage::new("Q0xPVEg=".to_string(), "image/webp"),
            prompt: "Dress the character in this coat".to_string(),
        }
    }

    #[tokio::test]
    async fn end_to_end_through_the_proxy() {
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            ..Config::default()
        };
        let state = AppState::new(Arc::new(config), Arc::new(OneImageProvider));
        let origin = spawn(create_router(state)).await;

        let image = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.base64, "aGVsbG8=");
        assert_eq!(image.decode().unwrap(), b"hello");
        assert_eq!(image.data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn proxy_error_text_is_carried_verbatim() {
        let router = Router::new().route(
            DEFAULT_COMPOSITE_ENDPOINT,
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "Quota exceeded") }),
        );
        let origin = spawn(router).await;

        let err = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap_err();

        assert!(matches!(&err, GenerationError::GenerationFailed(text) if text == "Quota exceeded"));
        assert_eq!(err.to_string(), "GENERATION_FAILED:Quota exceeded");
    }

    #[tokio::test]
    async fn proxy_no_image_sentinel_maps_to_no_image() {
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            ..Config::default()
        };
        let state = AppState::new(Arc::new(config), Arc::new(TextOnlyProvider));
        let origin = spawn(create_router(state)).await;

        let err = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::NoImageReturned));
    }

    #[tokio::test]
    async fn sentinel_text_on_other_status_stays_generation_failed() {
        let router = Router::new().route(
            DEFAULT_COMPOSITE_ENDPOINT,
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "NO_IMAGE_RETURNED") }),
        );
        let origin = spawn(router).await;

        let err = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap_err();

        assert!(matches!(&err, GenerationError::GenerationFailed(text) if text == "NO_IMAGE_RETURNED"));
    }

    #[tokio::test]
    async fn empty_error_body_uses_status_reason() {
        let router = Router::new().route(
            DEFAULT_COMPOSITE_ENDPOINT,
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let origin = spawn(router).await;

        let err = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap_err();

        assert!(
            matches!(&err, GenerationError::GenerationFailed(text) if text == "Service Unavailable")
        );
    }

    #[tokio::test]
    async fn success_without_image_fields_is_no_image() {
        let router = Router::new().route(
            DEFAULT_COMPOSITE_ENDPOINT,
            post(|| async { axum::Json(json!({ "imageBase64": "", "mimeType": "image/png" })) }),
        );
        let origin = spawn(router).await;

        let err = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::NoImageReturned));
    }

    #[tokio::test]
    async fn unreachable_proxy_is_unknown() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = generate_dress_up_image(&target(&origin), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Unknown(_)));
    }

    #[test]
    fn parse_requires_both_fields() {
        assert!(parse_generated_image(&json!({ "imageBase64": "YQ==" })).is_none());
        assert!(parse_generated_image(&json!({ "mimeType": "image/png" })).is_none());
        assert_eq!(
            parse_generated_image(&json!({ "imageBase64": "YQ==", "mimeType": "image/png" })),
            Some(GeneratedImage {
                base64: "YQ==".to_string(),
                mime_type: "image/png".to_string(),
            })
        );
    }
}
