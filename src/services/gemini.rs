//! Gemini REST implementation of the inference traits.
//!
//! Edits, analyses and chat turns go through `models/<model>:generateContent` with
//! inline base64 image parts. Generation uses Imagen's `:predict` endpoint, or
//! `generateContent` with an `imageConfig` when a Gemini image model is configured.
//!
//! Request and response framing lives in small pure functions so it can be tested
//! without a network.

use crate::models::{AspectRatio, Image, ImageFormat, StudioSettings};
use crate::services::{ChatSession, InferenceClient, ServiceError};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Instruction used for the one-click description (no user question)
pub const QUICK_ANALYSIS_PROMPT: &str =
    "Describe this image in one short paragraph: the main subject, the setting, colors and mood.";

/// Longest error body echoed back to the user
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Request header carrying the API key; the key never appears in a URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Environment variables checked for the API key, in order
const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read the API key from `GEMINI_API_KEY`, `GOOGLE_API_KEY` or `API_KEY`
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS.iter().find_map(|key| non_empty_env(key))
}

/// HTTP client for the Gemini API.
///
/// Cheap to clone: the underlying `reqwest::Client` and settings are shared.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    settings: Arc<StudioSettings>,
    api_key: Option<String>,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base", &self.settings.normalized_api_base())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GeminiClient {
    /// Build a client. A missing key is not an error here; every call reports
    /// [`ServiceError::MissingApiKey`] instead, so the rest of the app keeps working.
    pub fn new(settings: &StudioSettings, api_key: Option<String>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(ServiceError::Transport)?;

        if api_key.is_none() {
            tracing::warn!("No Gemini API key configured; remote operations will fail");
        }

        Ok(Self {
            http,
            settings: Arc::new(settings.clone()),
            api_key,
        })
    }

    pub fn settings(&self) -> &StudioSettings {
        &self.settings
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        self.api_key.as_deref().ok_or(ServiceError::MissingApiKey)
    }

    /// `<api_base>/models/<model>:<method>`
    pub fn endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!(
            "{}/{}:{}",
            self.settings.normalized_api_base(),
            model_path,
            method
        )
    }

    async fn post(
        &self,
        operation: &'static str,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Value, ServiceError> {
        let api_key = self.api_key()?;
        tracing::debug!("{} request: POST {}", operation, endpoint);

        let response = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::warn!("{} request returned HTTP {}", operation, status.as_u16());
            return Err(ServiceError::Api {
                operation,
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ServiceError::InvalidResponse(format!("{operation} returned invalid JSON: {e}"))
        })
    }

    async fn generate_content_image(
        &self,
        operation: &'static str,
        model: &str,
        payload: Value,
    ) -> Result<Image, ServiceError> {
        let endpoint = self.endpoint(model, "generateContent");
        let response = self.post(operation, &endpoint, &payload).await?;
        extract_image(&response)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn edit(&self, image: &Image, instruction: &str) -> Result<Image, ServiceError> {
        let payload = edit_payload(image, instruction);
        self.generate_content_image("Edit", &self.settings.edit_model, payload)
            .await
    }

    async fn analyze(&self, image: &Image, question: Option<String>) -> Result<String, ServiceError> {
        let (model, prompt) = match question.as_deref() {
            Some(question) => (&self.settings.analysis_model, question),
            None => (&self.settings.quick_analysis_model, QUICK_ANALYSIS_PROMPT),
        };

        let endpoint = self.endpoint(model, "generateContent");
        let response = self
            .post("Analysis", &endpoint, &analysis_payload(image, prompt))
            .await?;
        extract_text(&response)
    }

    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<Image, ServiceError> {
        let model = &self.settings.generation_model;

        if is_imagen_model(model) {
            let endpoint = self.endpoint(model, "predict");
            let response = self
                .post("Generation", &endpoint, &imagen_payload(prompt, aspect_ratio))
                .await?;
            extract_prediction(&response)
        } else {
            self.generate_content_image(
                "Generation",
                model,
                gemini_generation_payload(prompt, aspect_ratio),
            )
            .await
        }
    }

    fn create_session(&self) -> Arc<dyn ChatSession> {
        tracing::info!("Creating chat session ({})", self.settings.chat_model);
        Arc::new(GeminiChatSession::new(self.clone()))
    }
}

/// A Gemini conversation.
///
/// The API is stateless, so the session keeps the turn history and replays it on
/// every request. A turn is recorded only after the model replies; failed sends
/// leave the history untouched. Sends are serialized by the history lock.
pub struct GeminiChatSession {
    client: GeminiClient,
    history: Mutex<Vec<Value>>,
}

impl GeminiChatSession {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            history: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    async fn turn_count(&self) -> usize {
        self.history.lock().await.len()
    }
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send(&self, message: &str) -> Result<String, ServiceError> {
        let mut history = self.history.lock().await;

        let mut contents = history.clone();
        contents.push(text_turn("user", message));

        let settings = self.client.settings();
        let payload = chat_payload(&contents, settings.chat_system_instruction.as_deref());
        let endpoint = self.client.endpoint(&settings.chat_model, "generateContent");

        let response = self.client.post("Chat", &endpoint, &payload).await?;
        let reply = extract_text(&response)?;

        history.push(text_turn("user", message));
        history.push(text_turn("model", &reply));

        Ok(reply)
    }
}

/// Transport errors render their URL; strip it so endpoints stay out of banners and logs
fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.without_url())
}

// ---------------------------------------------------------------------------
// Request framing
// ---------------------------------------------------------------------------

fn is_imagen_model(model: &str) -> bool {
    model
        .trim()
        .trim_start_matches("models/")
        .to_ascii_lowercase()
        .starts_with("imagen")
}

fn inline_image_part(image: &Image) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.to_base64(),
        }
    })
}

fn text_turn(role: &str, text: &str) -> Value {
    json!({
        "role": role,
        "parts": [{ "text": text }],
    })
}

pub fn edit_payload(image: &Image, instruction: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(image), { "text": instruction }],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
        },
    })
}

pub fn analysis_payload(image: &Image, prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(image), { "text": prompt }],
        }],
    })
}

pub fn imagen_payload(prompt: &str, aspect_ratio: AspectRatio) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": aspect_ratio.as_str(),
            "outputMimeType": "image/png",
        },
    })
}

pub fn gemini_generation_payload(prompt: &str, aspect_ratio: AspectRatio) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": { "aspectRatio": aspect_ratio.as_str() },
        },
    })
}

pub fn chat_payload(contents: &[Value], system_instruction: Option<&str>) -> Value {
    let mut payload = json!({ "contents": contents });
    if let Some(instruction) = system_instruction.map(str::trim).filter(|s| !s.is_empty()) {
        payload["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }
    payload
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Pull a readable message out of an error body (`{"error": {"message": ...}}`),
/// falling back to the truncated raw body.
pub fn api_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|value| value.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty());

    match message {
        Some(message) => message.to_string(),
        None => truncate_text(body.trim(), MAX_ERROR_BODY_CHARS),
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn check_prompt_feedback(payload: &Value) -> Result<(), ServiceError> {
    match payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        Some(reason) => Err(ServiceError::Blocked(reason.to_string())),
        None => Ok(()),
    }
}

fn first_candidate(payload: &Value) -> Option<&Value> {
    payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
}

fn candidate_parts(payload: &Value) -> Vec<&Value> {
    first_candidate(payload)
        .and_then(|candidate| candidate.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| parts.iter().collect())
        .unwrap_or_default()
}

fn finish_reason(payload: &Value) -> Option<&str> {
    first_candidate(payload)
        .and_then(|candidate| candidate.get("finishReason"))
        .and_then(Value::as_str)
}

fn joined_text(parts: &[&Value]) -> String {
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}

fn decode_inline_image(data: &str, mime_type: Option<&str>) -> Result<Image, ServiceError> {
    let bytes = BASE64
        .decode(data.trim().as_bytes())
        .map_err(|e| ServiceError::InvalidResponse(format!("image base64 decode failed: {e}")))?;

    let format = mime_type
        .and_then(ImageFormat::from_mime_type)
        .or_else(|| {
            image::guess_format(&bytes)
                .ok()
                .and_then(ImageFormat::from_detected)
        })
        .ok_or_else(|| {
            ServiceError::InvalidResponse(format!(
                "unsupported image type '{}'",
                mime_type.unwrap_or("unknown")
            ))
        })?;

    Ok(Image::new(bytes, format))
}

/// Extract the first inline image from a `generateContent` response
pub fn extract_image(payload: &Value) -> Result<Image, ServiceError> {
    check_prompt_feedback(payload)?;

    let parts = candidate_parts(payload);
    for part in &parts {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str);
        return decode_inline_image(data, mime_type);
    }

    let text = joined_text(&parts);
    if text.is_empty() {
        if let Some(reason) = finish_reason(payload).filter(|reason| *reason != "STOP") {
            return Err(ServiceError::Blocked(reason.to_string()));
        }
        return Err(ServiceError::NoImage(None));
    }
    Err(ServiceError::NoImage(Some(text)))
}

/// Extract the concatenated text of the first candidate
pub fn extract_text(payload: &Value) -> Result<String, ServiceError> {
    check_prompt_feedback(payload)?;

    let text = joined_text(&candidate_parts(payload));
    if !text.is_empty() {
        return Ok(text);
    }

    match finish_reason(payload).filter(|reason| *reason != "STOP") {
        Some(reason) => Err(ServiceError::Blocked(reason.to_string())),
        None => Err(ServiceError::EmptyResponse),
    }
}

/// Extract the first image from an Imagen `:predict` response
pub fn extract_prediction(payload: &Value) -> Result<Image, ServiceError> {
    let predictions = payload
        .get("predictions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for prediction in predictions {
        if let Some(data) = prediction
            .get("bytesBase64Encoded")
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty())
        {
            let mime_type = prediction.get("mimeType").and_then(Value::as_str);
            return decode_inline_image(data, mime_type);
        }
    }

    let filtered = predictions
        .iter()
        .find_map(|prediction| prediction.get("raiFilteredReason").and_then(Value::as_str));
    match filtered {
        Some(reason) => Err(ServiceError::Blocked(reason.to_string())),
        None => Err(ServiceError::NoImage(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> Image {
        Image::new(b"\x89PNG\r\n\x1a\nrest".to_vec(), ImageFormat::Png)
    }

    fn client(api_key: Option<&str>) -> GeminiClient {
        GeminiClient::new(&StudioSettings::default(), api_key.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_endpoint_normalizes_model_path() {
        let client = client(Some("k"));
        assert_eq!(
            client.endpoint("gemini-2.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            client.endpoint("models/imagen-4.0-generate-001", "predict"),
            "https://generativelanguage.googleapis.com/v1beta/models/imagen-4.0-generate-001:predict"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", client(Some("secret-key")));
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_is_imagen_model() {
        assert!(is_imagen_model("imagen-4.0-generate-001"));
        assert!(is_imagen_model("models/Imagen-3"));
        assert!(!is_imagen_model("gemini-2.5-flash-image"));
    }

    #[test]
    fn test_edit_payload_shape() {
        let payload = edit_payload(&sample_image(), "Make it blue");
        let parts = payload.pointer("/contents/0/parts").unwrap().as_array().unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], sample_image().to_base64());
        assert_eq!(parts[1]["text"], "Make it blue");
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_imagen_payload_carries_aspect_ratio() {
        let payload = imagen_payload("a cat", AspectRatio::Wide);
        assert_eq!(payload["instances"][0]["prompt"], "a cat");
        assert_eq!(payload["parameters"]["aspectRatio"], "16:9");
        assert_eq!(payload["parameters"]["sampleCount"], 1);
    }

    #[test]
    fn test_gemini_generation_payload_carries_aspect_ratio() {
        let payload = gemini_generation_payload("a cat", AspectRatio::Portrait);
        assert_eq!(payload["generationConfig"]["imageConfig"]["aspectRatio"], "3:4");
    }

    #[test]
    fn test_chat_payload_system_instruction() {
        let contents = vec![text_turn("user", "hi")];

        let plain = chat_payload(&contents, None);
        assert!(plain.get("systemInstruction").is_none());

        let blank = chat_payload(&contents, Some("   "));
        assert!(blank.get("systemInstruction").is_none());

        let with = chat_payload(&contents, Some("Be brief."));
        assert_eq!(with["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(with["contents"][0]["role"], "user");
    }

    #[test]
    fn test_extract_image() {
        let data = BASE64.encode(b"jpegbytes");
        let payload = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here you go" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": data } }
                ]}
            }]
        });

        let image = extract_image(&payload).unwrap();
        assert_eq!(image.format(), ImageFormat::Jpeg);
        assert_eq!(image.bytes(), b"jpegbytes");
    }

    #[test]
    fn test_extract_image_snake_case_and_sniffed_format() {
        let data = BASE64.encode(b"\x89PNG\r\n\x1a\n0000");
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "inline_data": { "data": data } }] }
            }]
        });

        let image = extract_image(&payload).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
    }

    #[test]
    fn test_extract_image_text_only() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "I cannot edit this image." }] },
                "finishReason": "STOP"
            }]
        });

        match extract_image(&payload) {
            Err(ServiceError::NoImage(Some(text))) => assert_eq!(text, "I cannot edit this image."),
            other => panic!("Expected NoImage with text, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_image_safety_finish() {
        let payload = json!({ "candidates": [{ "finishReason": "IMAGE_SAFETY" }] });
        assert!(matches!(
            extract_image(&payload),
            Err(ServiceError::Blocked(reason)) if reason == "IMAGE_SAFETY"
        ));
    }

    #[test]
    fn test_extract_image_blocked_prompt() {
        let payload = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(extract_image(&payload), Err(ServiceError::Blocked(_))));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "A red " }, { "text": "bicycle.\n" }] }
            }]
        });
        assert_eq!(extract_text(&payload).unwrap(), "A red bicycle.");
    }

    #[test]
    fn test_extract_text_empty() {
        let payload = json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "STOP" }] });
        assert!(matches!(extract_text(&payload), Err(ServiceError::EmptyResponse)));

        let payload = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        assert!(matches!(extract_text(&payload), Err(ServiceError::Blocked(_))));
    }

    #[test]
    fn test_extract_prediction() {
        let data = BASE64.encode(b"pngbytes");
        let payload = json!({
            "predictions": [{ "bytesBase64Encoded": data, "mimeType": "image/png" }]
        });

        let image = extract_prediction(&payload).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.bytes(), b"pngbytes");
    }

    #[test]
    fn test_extract_prediction_filtered() {
        let payload = json!({ "predictions": [{ "raiFilteredReason": "Filtered for safety" }] });
        assert!(matches!(
            extract_prediction(&payload),
            Err(ServiceError::Blocked(_))
        ));

        assert!(matches!(
            extract_prediction(&json!({})),
            Err(ServiceError::NoImage(None))
        ));
    }

    #[test]
    fn test_extract_rejects_bad_base64() {
        let payload = json!({ "predictions": [{ "bytesBase64Encoded": "%%%", "mimeType": "image/png" }] });
        assert!(matches!(
            extract_prediction(&payload),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid.");

        assert_eq!(api_error_message("  Bad Gateway \n"), "Bad Gateway");

        let long = "x".repeat(600);
        let message = api_error_message(&long);
        assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(message.ends_with("..."));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = client(None);

        let result = client.edit(&sample_image(), "Enhance").await;
        assert!(matches!(result, Err(ServiceError::MissingApiKey)));

        let result = client.analyze(&sample_image(), None).await;
        assert!(matches!(result, Err(ServiceError::MissingApiKey)));

        let result = client.generate("a cat", AspectRatio::Square).await;
        assert!(matches!(result, Err(ServiceError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_failed_chat_send_keeps_history_empty() {
        let session = GeminiChatSession::new(client(None));

        let result = session.send("Hello").await;

        assert!(matches!(result, Err(ServiceError::MissingApiKey)));
        assert_eq!(session.turn_count().await, 0);
    }

    fn unreachable_client(api_key: &str) -> GeminiClient {
        let settings = StudioSettings {
            api_base: "http://127.0.0.1:1/v1beta".to_string(),
            request_timeout_secs: 5,
            ..StudioSettings::default()
        };
        GeminiClient::new(&settings, Some(api_key.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_api_key() {
        let client = unreachable_client("SECRET123");
        let state = crate::state::StateManager::new();
        let image = sample_image();

        let result = state
            .with_loading("Applying: Enhance...", || client.edit(&image, "Enhance"))
            .await;

        assert!(result.is_none());
        let banner = state.read(|s| s.error().map(str::to_string)).unwrap();
        assert!(banner.starts_with("Request failed"), "unexpected banner: {banner}");
        assert!(!banner.contains("SECRET123"));
        assert!(!banner.contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_failed_chat_transport_does_not_expose_api_key() {
        let session = GeminiChatSession::new(unreachable_client("SECRET123"));

        let err = session.send("Hello").await.unwrap_err();

        assert!(matches!(err, ServiceError::Transport(_)));
        assert!(!err.to_string().contains("SECRET123"));
        assert_eq!(session.turn_count().await, 0);
    }
}
