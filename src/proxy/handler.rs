use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{build_composite_request, GeminiRequestInlineData};
use crate::models::{CompositeImage, CompositionRequest, EncodedImage};
use crate::proxy::{AppState, CompositeError};
use crate::utils::timing::RequestTimer;

/// Terminal state of one composite request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    ImageFound,
    NoImage,
    Rejected,
    Faulted,
}

impl RequestOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestOutcome::ImageFound => "image_found",
            RequestOutcome::NoImage => "no_image",
            RequestOutcome::Rejected => "rejected",
            RequestOutcome::Faulted => "faulted",
        }
    }
}

impl From<&CompositeError> for RequestOutcome {
    fn from(err: &CompositeError) -> Self {
        match err {
            CompositeError::MethodNotAllowed
            | CompositeError::MissingCredential
            | CompositeError::InvalidInput => RequestOutcome::Rejected,
            CompositeError::NoImageReturned => RequestOutcome::NoImage,
            CompositeError::Unknown(_) => RequestOutcome::Faulted,
        }
    }
}

pub async fn composite_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    let mut timer = RequestTimer::start(&state.config.composite_endpoint, method.as_str());

    match compose(&state, &method, body).await {
        Ok(image) => {
            let detail = format!(
                "mime={} data_len={}",
                image.mime_type,
                image.image_base64.len()
            );
            timer.finish(RequestOutcome::ImageFound.as_str(), Some(detail.as_str()));
            (StatusCode::OK, Json(image)).into_response()
        }
        Err(err) => {
            let outcome = RequestOutcome::from(&err);
            if outcome == RequestOutcome::Faulted {
                warn!("Composite request failed: {err}");
            }
            timer.finish(outcome.as_str(), Some(err.to_string().as_str()));
            err.into_response()
        }
    }
}

async fn compose(
    state: &AppState,
    method: &Method,
    body: Bytes,
) -> Result<CompositeImage, CompositeError> {
    if method != Method::POST {
        return Err(CompositeError::MethodNotAllowed);
    }

    let api_key = state
        .config
        .gemini_api_key()
        .ok_or(CompositeError::MissingCredential)?;

    let request = parse_composition_body(&body)?;
    drop(body);
    debug!(
        "Composite request validated (character={}, clothing={}, prompt_len={}); awaiting provider",
        request.character.mime_type,
        request.clothing.mime_type,
        request.prompt.chars().count()
    );

    let CompositionRequest {
        character,
        clothing,
        prompt,
    } = request;
    let provider_request =
        build_composite_request(&prompt, inline_part(character), inline_part(clothing));

    let response = state
        .provider
        .generate_content(api_key, provider_request)
        .await
        .map_err(|err| CompositeError::unknown(err.to_string()))?;

    let image = response
        .into_first_image()
        .ok_or(CompositeError::NoImageReturned)?;

    Ok(CompositeImage {
        image_base64: image.data,
        mime_type: image.mime_type,
    })
}

fn inline_part(image: EncodedImage) -> GeminiRequestInlineData {
    GeminiRequestInlineData {
        mime_type: image.mime_type,
        data: image.base64,
    }
}

/// Malformed JSON is a fault; well-formed JSON missing a required field is
/// invalid input.
fn parse_composition_body(body: &[u8]) -> Result<CompositionRequest, CompositeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| CompositeError::unknown(err.to_string()))?;

    let character = encoded_image_field(&value, "character").ok_or(CompositeError::InvalidInput)?;
    let clothing = encoded_image_field(&value, "clothing").ok_or(CompositeError::InvalidInput)?;
    let prompt = value
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or(CompositeError::InvalidInput)?;

    Ok(CompositionRequest {
        character,
        clothing,
        prompt: prompt.to_string(),
    })
}

fn encoded_image_field(value: &Value, field: &str) -> Option<EncodedImage> {
    let image = value.get(field)?;
    let base64 = image
        .get("base64")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())?;
    let mime_type = image
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(EncodedImage::new(base64.to_string(), mime_type))
}
