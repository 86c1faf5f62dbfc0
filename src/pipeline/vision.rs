//! Vision-to-layout extraction: one VLM call per page, one retry on bad JSON.
//!
//! The backend seam is the [`VisionBackend`] trait. Two implementations ship:
//!
//! * [`GroqBackend`]: the default. Talks to Groq's OpenAI-compatible
//!   `chat/completions` endpoint directly so it can ask for
//!   `response_format: json_object`.
//! * [`ProviderBackend`]: wraps any `edgequake_llm` provider (OpenAI,
//!   Anthropic, Gemini, Ollama, …). JSON-only output is requested through the
//!   prompt alone.
//!
//! ## Retry policy
//!
//! The only retry is a *reparse* retry. If the response is not JSON or has no
//! `paragraphs` list, the same request is sent once more at
//! `retry_temperature` (0.0 by default). A second bad response fails the
//! conversion with [`Img2DocxError::InvalidModelOutput`]. Transport and API
//! errors are returned immediately: there is no backoff or rate-limit
//! handling.

use crate::config::ConversionConfig;
use crate::error::Img2DocxError;
use crate::layout::{parse_layout, LayoutDocument};
use crate::pipeline::encode::{encode_jpeg, EncodedImage};
use crate::pipeline::input::PageImage;
use crate::prompts::{SYSTEM_PROMPT, USER_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Number of model calls allowed per page (first try + one reparse retry).
pub const MAX_ATTEMPTS: u32 = 2;

/// Everything a backend needs for one chat-style vision call.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub page_num: usize,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub image: EncodedImage,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Ask the API for a JSON-only response where it supports it.
    pub json_mode: bool,
}

/// Raw text returned by the model plus token accounting.
#[derive(Debug, Clone, Default)]
pub struct VisionResponse {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A hosted vision model.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short provider label used in logs and error messages.
    fn name(&self) -> &str;

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, Img2DocxError>;
}

/// Result of a successful layout extraction.
#[derive(Debug, Clone)]
pub struct LayoutExtraction {
    pub layout: LayoutDocument,
    /// 1 when the first response parsed, 2 when the retry was needed.
    pub attempts: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Extract a layout document from one page.
pub async fn extract_layout(
    backend: &dyn VisionBackend,
    page: &PageImage,
    config: &ConversionConfig,
) -> Result<LayoutExtraction, Img2DocxError> {
    let start = Instant::now();
    let image = encode_jpeg(&page.image).map_err(|e| Img2DocxError::ImageEncode {
        page: page.page_num,
        detail: e.to_string(),
    })?;

    let mut request = VisionRequest {
        page_num: page.page_num,
        model: config.model.clone(),
        system_prompt: config
            .system_prompt
            .as_deref()
            .unwrap_or(SYSTEM_PROMPT)
            .trim()
            .to_string(),
        user_prompt: USER_PROMPT.to_string(),
        image,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        json_mode: true,
    };

    let mut input_tokens = 0;
    let mut output_tokens = 0;
    let mut last_err = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            request.temperature = config.retry_temperature;
            warn!(
                "Page {}: retrying at temperature {} after invalid output",
                page.page_num, request.temperature
            );
        }

        let response = backend.complete(&request).await?;
        input_tokens += response.prompt_tokens;
        output_tokens += response.completion_tokens;

        match parse_layout(&response.content) {
            Ok(layout) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "Page {}: {} paragraphs, {} in / {} out tokens, {}ms",
                    page.page_num,
                    layout.paragraphs.len(),
                    input_tokens,
                    output_tokens,
                    duration_ms
                );
                return Ok(LayoutExtraction {
                    layout,
                    attempts: attempt,
                    input_tokens,
                    output_tokens,
                    duration_ms,
                });
            }
            Err(e) => {
                warn!(
                    "Page {}: attempt {} returned invalid layout — {}",
                    page.page_num, attempt, e
                );
                last_err = e.to_string();
            }
        }
    }

    Err(Img2DocxError::InvalidModelOutput {
        page: page.page_num,
        attempts: MAX_ATTEMPTS,
        detail: last_err,
    })
}

// ── Groq (OpenAI-compatible) backend ─────────────────────────────────────

/// Direct client for Groq's OpenAI-compatible chat completions API.
pub struct GroqBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl GroqBackend {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Img2DocxError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Img2DocxError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Build the `chat/completions` request body.
fn build_request_body(request: &VisionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {
                "role": "user",
                "content": [
                    {"type": "text", "text": request.user_prompt},
                    {"type": "image_url", "image_url": {"url": request.image.data_url()}}
                ]
            }
        ],
        "temperature": request.temperature,
        "max_completion_tokens": request.max_tokens,
    });
    if request.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[async_trait]
impl VisionBackend for GroqBackend {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, Img2DocxError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&build_request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Img2DocxError::ApiTimeout {
                        page: request.page_num,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    Img2DocxError::LlmApiError {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => Img2DocxError::AuthError {
                    provider: self.name().to_string(),
                    detail,
                },
                429 => Img2DocxError::RateLimitExceeded {
                    provider: self.name().to_string(),
                    retry_after_secs,
                },
                _ => Img2DocxError::LlmApiError {
                    message: format!("HTTP {status}: {detail}"),
                },
            });
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Img2DocxError::ApiTimeout {
                    page: request.page_num,
                    elapsed_ms: self.timeout_secs * 1000,
                }
            } else {
                Img2DocxError::LlmApiError {
                    message: format!("unreadable response body: {e}"),
                }
            }
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Img2DocxError::LlmApiError {
                message: "response contained no choices".into(),
            })?
            .message
            .content
            .unwrap_or_default();
        let usage = completion.usage.unwrap_or_default();

        Ok(VisionResponse {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

// ── edgequake-llm provider backend ───────────────────────────────────────

/// Adapter exposing an `edgequake_llm` provider as a [`VisionBackend`].
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    timeout_secs: u64,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            provider,
            label: label.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl VisionBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, Img2DocxError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(
                request.user_prompt.as_str(),
                vec![ImageData::new(
                    request.image.base64.clone(),
                    request.image.mime_type,
                )],
            ),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| Img2DocxError::ApiTimeout {
                page: request.page_num,
                elapsed_ms: start.elapsed().as_millis() as u64,
            })?
            .map_err(|e| Img2DocxError::LlmApiError {
                message: format!("{}: {}", self.label, e),
            })?;

        Ok(VisionResponse {
            content: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Alignment;
    use image::{Rgb, RgbImage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records the temperature of each call.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, Img2DocxError>>>,
        temperatures: Mutex<Vec<f32>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, Img2DocxError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                temperatures: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, Img2DocxError> {
            self.temperatures.lock().unwrap().push(request.temperature);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left");
            reply.map(|content| VisionResponse {
                content,
                prompt_tokens: 100,
                completion_tokens: 10,
            })
        }
    }

    const GOOD: &str =
        r#"{"paragraphs":[{"alignment":"center","runs":[{"text":"Hi","bold":true,"italic":false}]}]}"#;

    fn page() -> PageImage {
        PageImage::new(1, "page.png", RgbImage::from_pixel(8, 8, Rgb([200, 200, 200])))
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let backend = ScriptedBackend::new(vec![Ok(GOOD.into())]);
        let out = extract_layout(&backend, &page(), &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.attempts, 1);
        assert_eq!(out.layout.paragraphs[0].alignment, Alignment::Center);
        assert_eq!(*backend.temperatures.lock().unwrap(), vec![0.2]);
    }

    #[tokio::test]
    async fn retry_then_succeed_lowers_temperature() {
        let backend = ScriptedBackend::new(vec![Ok("{\"oops\": true}".into()), Ok(GOOD.into())]);
        let out = extract_layout(&backend, &page(), &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.attempts, 2);
        assert_eq!(out.input_tokens, 200);
        assert_eq!(*backend.temperatures.lock().unwrap(), vec![0.2, 0.0]);
    }

    #[tokio::test]
    async fn two_bad_responses_fail() {
        let backend = ScriptedBackend::new(vec![Ok("not json".into()), Ok("[]".into())]);
        let err = extract_layout(&backend, &page(), &ConversionConfig::default())
            .await
            .unwrap_err();
        match err {
            Img2DocxError::InvalidModelOutput { page, attempts, .. } => {
                assert_eq!(page, 1);
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.temperatures.lock().unwrap().len(), 2);
    }

    #[test]
    fn api_error_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(Img2DocxError::LlmApiError {
            message: "HTTP 500".into(),
        })]);
        let err = tokio_test::block_on(extract_layout(
            &backend,
            &page(),
            &ConversionConfig::default(),
        ))
        .unwrap_err();
        assert!(matches!(err, Img2DocxError::LlmApiError { .. }));
        assert_eq!(backend.temperatures.lock().unwrap().len(), 1);
    }

    #[test]
    fn request_body_has_json_mode_and_image() {
        let request = VisionRequest {
            page_num: 1,
            model: "m".into(),
            system_prompt: "sys".into(),
            user_prompt: "usr".into(),
            image: EncodedImage {
                base64: "QUJD".into(),
                mime_type: "image/jpeg",
            },
            temperature: 0.2,
            max_tokens: 2048,
            json_mode: true,
        };
        let body = build_request_body(&request);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_completion_tokens"], 2048);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"][0]["text"], "usr");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
    }

    #[test]
    fn request_body_without_json_mode() {
        let request = VisionRequest {
            page_num: 1,
            model: "m".into(),
            system_prompt: String::new(),
            user_prompt: String::new(),
            image: EncodedImage {
                base64: String::new(),
                mime_type: "image/jpeg",
            },
            temperature: 0.0,
            max_tokens: 1,
            json_mode: false,
        };
        assert!(build_request_body(&request).get("response_format").is_none());
    }

    #[test]
    fn groq_endpoint_trims_slash() {
        let b = GroqBackend::new("k", "https://api.groq.com/openai/v1/", 5).unwrap();
        assert_eq!(b.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
    }
}
