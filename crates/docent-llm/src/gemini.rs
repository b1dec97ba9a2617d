use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, EmbedMode, LlmProvider};
use crate::retry::send_with_retry;
use crate::sse::gemini_sse_to_stream;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "gemini";

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    generation_model: String,
    max_retries: u32,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("generation_model", &self.generation_model)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GeminiProvider {
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` for a blank key, or an HTTP error if the
    /// client cannot be constructed.
    pub fn new(
        api_key: String,
        mut base_url: String,
        embedding_model: String,
        generation_model: String,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey { provider: PROVIDER });
        }
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client()?,
            api_key,
            base_url,
            embedding_model,
            generation_model,
            max_retries: 3,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Retries applied to generation requests answered with HTTP 429.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url)
    }

    async fn check_status(response: reqwest::Response) -> Result<String, LlmError> {
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!("Gemini API error {status}: {text}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        Ok(text)
    }

    fn generate_body(prompt: &str) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn embed(
        &self,
        text: &str,
        mode: EmbedMode,
        dimension: usize,
    ) -> Result<Vec<f32>, LlmError> {
        let model = format!("models/{}", self.embedding_model);
        let body = EmbedContentRequest {
            model: &model,
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
            task_type: task_type(mode),
            output_dimensionality: dimension,
        };

        let response = self
            .client
            .post(self.model_url(&self.embedding_model, "embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let text = Self::check_status(response).await?;
        let resp: EmbedContentResponse = serde_json::from_str(&text)?;

        if resp.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }
        Ok(resp.embedding.values)
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = Self::generate_body(prompt);
        let url = self.model_url(&self.generation_model, "generateContent");

        let response = send_with_retry(PROVIDER, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let text = Self::check_status(response).await?;
        let resp: GenerateContentResponse = serde_json::from_str(&text)?;
        let answer = resp.text();
        if answer.is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }
        Ok(answer)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ChatStream, LlmError> {
        let body = Self::generate_body(prompt);
        let url = format!(
            "{}?alt=sse",
            self.model_url(&self.generation_model, "streamGenerateContent")
        );

        let response = send_with_retry(PROVIDER, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            tracing::error!("Gemini streaming request error {status}: {text}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(gemini_sse_to_stream(response))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn task_type(mode: EmbedMode) -> &'static str {
    match mode {
        EmbedMode::Document => "RETRIEVAL_DOCUMENT",
        EmbedMode::Query => "RETRIEVAL_QUERY",
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
    output_dimensionality: usize,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub(crate) fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
