//! OpenAI client: writes stories and paints pages.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::constants::{DEFAULT_IMAGE_SIZE, OPENAI_API_BASE, OPENAI_TIMEOUT_SECONDS};
use crate::provider::{ImageProvider, ProviderError};

/// Connection settings for the OpenAI API.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Bearer token
    pub api_key: String,
    /// API root, eg `https://api.openai.com/v1`
    pub base_url: String,
    /// Requested image size, eg `1024x1024`
    pub image_size: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Config for the public API with default size and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            timeout: Duration::from_secs(OPENAI_TIMEOUT_SECONDS),
        }
    }
}

/// Talks to the Responses and Images APIs.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

// -----------------------------
// Responses API (text)
// -----------------------------

#[derive(Debug, Deserialize)]
struct ResponsesCreateResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<ResponseOutputItem>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseOutputItem {
    #[serde(default)]
    content: Vec<ResponseContentItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentItem {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(other)]
    Other,
}

fn story_instructions() -> &'static str {
    r#"You write short children's stories that will be turned into an illustrated storybook.

Rules:
- Simple sentences, each ending with a full stop.
- Between 6 and 15 sentences.
- A clear, gentle moral.
- One image prompt for every three sentences, describing the scene visually.
- Image prompts must not contain any text or lettering.

Return JSON that matches the provided schema."#
}

fn story_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "title": {"type": "string"},
            "story": {"type": "string"},
            "moral": {"type": "string"},
            "imagePrompts": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["title", "story", "moral", "imagePrompts"]
    })
}

/// Pulls the model's text out of a Responses API body.
fn extract_output_text(bytes: &[u8]) -> Result<String, ProviderError> {
    let parsed: ResponsesCreateResponse = serde_json::from_slice(bytes)
        .map_err(|err| ProviderError::InvalidResponse(format!("responses JSON: {err}")))?;
    if let Some(err) = parsed.error.filter(|err| !err.is_null()) {
        return Err(ProviderError::InvalidResponse(format!(
            "responses API returned error: {err}"
        )));
    }

    parsed
        .output_text
        .or_else(|| {
            parsed
                .output
                .iter()
                .flat_map(|item| item.content.iter())
                .find_map(|content| {
                    if let ResponseContentItem::OutputText { text } = content {
                        Some(text.clone())
                    } else {
                        None
                    }
                })
        })
        .ok_or_else(|| ProviderError::InvalidResponse("missing output_text".to_string()))
}

// -----------------------------
// Images API
// -----------------------------

/// Request body for POST /images/generations
#[derive(Serialize, Debug, PartialEq)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,

    // For GPT image models.
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    output_format: Option<&'a str>,

    // For dall-e models.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
}

impl<'a> ImagesGenerateRequest<'a> {
    /// GPT image models always return base64; dall-e needs asking.
    fn for_model(model: &'a str, prompt: &'a str, size: &'a str) -> Self {
        let base = Self {
            model,
            prompt,
            n: 1,
            size,
            quality: None,
            output_format: None,
            response_format: Some("b64_json"),
            style: None,
        };
        if model.starts_with("gpt-image") {
            Self {
                quality: Some("high"),
                output_format: Some("png"),
                response_format: None,
                ..base
            }
        } else if model == "dall-e-3" {
            Self {
                quality: Some("hd"),
                style: Some("vivid"),
                ..base
            }
        } else {
            base
        }
    }
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// What the Images API handed back.
#[derive(Debug, PartialEq, Eq)]
enum ImagePayload {
    Bytes(Vec<u8>),
    Url(String),
}

fn parse_images_response(bytes: &[u8]) -> Result<ImagePayload, ProviderError> {
    let parsed: ImagesGenerateResponse = serde_json::from_slice(bytes)
        .map_err(|err| ProviderError::InvalidResponse(format!("images JSON: {err}")))?;
    let first = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("no image data returned".to_string()))?;

    if let Some(revised_prompt) = first.revised_prompt {
        debug!("Revised prompt from OpenAI: {}", revised_prompt);
    }

    if let Some(b64_json) = first.b64_json {
        general_purpose::STANDARD
            .decode(b64_json)
            .map(ImagePayload::Bytes)
            .map_err(|err| ProviderError::InvalidResponse(format!("bad base64 image: {err}")))
    } else if let Some(url) = first.url {
        Ok(ImagePayload::Url(url))
    } else {
        Err(ProviderError::InvalidResponse(
            "image response missing b64_json and url fields".to_string(),
        ))
    }
}

/// The Images API has no negative prompt, so it becomes part of the prompt.
fn full_prompt(prompt: &str, negative_prompt: &str) -> String {
    let negative_prompt = negative_prompt.trim();
    if negative_prompt.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nAvoid: {negative_prompt}")
    }
}

fn request_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Request(err.to_string())
    }
}

fn status_error(status: reqwest::StatusCode, body: &[u8]) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited
    } else {
        ProviderError::Status(status.as_u16(), String::from_utf8_lossy(body).to_string())
    }
}

impl OpenAiClient {
    /// Builds a client with the configured timeout.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Request(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<Vec<u8>, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| request_error(&err))?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|err| request_error(&err))?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    /// Asks the text model for a story about `prompt`.
    ///
    /// Returns the model's raw text; [`crate::document::StoryDocument::parse`]
    /// pulls the story out of it.
    pub async fn generate_story(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        // Structured outputs: text.format.type = "json_schema".
        let req_body = json!({
            "model": model,
            "instructions": story_instructions(),
            "input": [
                {"role": "user", "content": [{"type": "input_text", "text": prompt}]}
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "storybook",
                    "strict": true,
                    "schema": story_schema()
                }
            }
        });

        info!("Writing story with {}", model);
        let bytes = self.post_json("responses", &req_body).await?;
        extract_output_text(&bytes)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| request_error(&err))?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|err| request_error(&err))?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageProvider for OpenAiClient {
    async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        negative_prompt: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let prompt = full_prompt(prompt, negative_prompt);
        let req_body = ImagesGenerateRequest::for_model(model, &prompt, &self.config.image_size);

        debug!("Requesting image from {}", model);
        let bytes = self.post_json("images/generations", &req_body).await?;
        match parse_images_response(&bytes)? {
            ImagePayload::Bytes(image) => Ok(image),
            ImagePayload::Url(url) => self.download(&url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_follows_model_family() {
        let gpt = ImagesGenerateRequest::for_model("gpt-image-1.5", "cat", "1024x1024");
        assert_eq!(gpt.output_format, Some("png"));
        assert_eq!(gpt.response_format, None);

        let dalle3 = ImagesGenerateRequest::for_model("dall-e-3", "cat", "1024x1024");
        assert_eq!(dalle3.response_format, Some("b64_json"));
        assert_eq!(dalle3.quality, Some("hd"));

        let dalle2 = ImagesGenerateRequest::for_model("dall-e-2", "cat", "512x512");
        assert_eq!(dalle2.quality, None);
        assert_eq!(dalle2.size, "512x512");

        let body = serde_json::to_value(&gpt).expect("serialize request");
        assert!(body.get("style").is_none());
        assert_eq!(body["n"], 1);
    }

    #[test]
    fn images_response_decodes_base64_or_url() {
        let encoded = general_purpose::STANDARD.encode(b"png-bytes");
        let body = json!({"data": [{"b64_json": encoded}]}).to_string();
        assert_eq!(
            parse_images_response(body.as_bytes()),
            Ok(ImagePayload::Bytes(b"png-bytes".to_vec()))
        );

        let body = json!({"data": [{"url": "https://example.org/cat.png", "revised_prompt": "a cat"}]})
            .to_string();
        assert_eq!(
            parse_images_response(body.as_bytes()),
            Ok(ImagePayload::Url("https://example.org/cat.png".to_string()))
        );

        assert!(matches!(
            parse_images_response(br#"{"data": []}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_images_response(br#"{"data": [{}]}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn output_text_found_in_either_place() {
        let direct = json!({"output_text": "{\"title\": \"t\"}"}).to_string();
        assert_eq!(
            extract_output_text(direct.as_bytes()),
            Ok("{\"title\": \"t\"}".to_string())
        );

        let nested = json!({
            "output": [
                {"content": [{"type": "reasoning"}, {"type": "output_text", "text": "story"}]}
            ],
            "error": null
        })
        .to_string();
        assert_eq!(extract_output_text(nested.as_bytes()), Ok("story".to_string()));

        let failed = json!({"error": {"message": "nope"}}).to_string();
        assert!(extract_output_text(failed.as_bytes()).is_err());
    }

    #[test]
    fn negative_prompt_is_appended() {
        assert_eq!(full_prompt("a cat", ""), "a cat");
        assert_eq!(full_prompt("a cat", "  dogs "), "a cat\n\nAvoid: dogs");
    }

    #[test]
    fn rate_limits_are_recognised() {
        assert_eq!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, b"slow down"),
            ProviderError::RateLimited
        );
        assert_eq!(
            status_error(reqwest::StatusCode::BAD_GATEWAY, b"oops"),
            ProviderError::Status(502, "oops".to_string())
        );
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let mut config = OpenAiConfig::new("key");
        config.base_url = "http://localhost:9999/v1/".to_string();
        let client = OpenAiClient::new(config).expect("client");
        assert_eq!(client.endpoint("responses"), "http://localhost:9999/v1/responses");
    }
}
