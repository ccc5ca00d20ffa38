use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{GenerateError, Result};
use crate::session::GenerationRequest;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-2.5-flash";

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const OUTPUT_MODE_VAR: &str = "ALT_TEXT_OUTPUT_MODE";

/// Response shape requested from the model. Selected once at service
/// construction, never switched mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Bare description string.
    FreeText,
    /// JSON payload with `altText` and `keywords`, constrained by a
    /// declared response schema.
    Structured,
}

impl OutputMode {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(OUTPUT_MODE_VAR).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("text") | Some("free-text") => OutputMode::FreeText,
            _ => OutputMode::Structured,
        }
    }
}

/// {description, keywords}. Keywords are empty in free-text mode and 3–5
/// short strings in structured mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub description: String,
    pub keywords: Vec<String>,
}

fn build_prompt(max_chars: u32, mode: OutputMode) -> String {
    let base = format!(
        "Gere um texto alternativo (alt text) conciso e descritivo para esta imagem, \
         ideal para acessibilidade web. O texto deve ser puramente descritivo, focando \
         nos elementos visuais importantes, e não deve exceder {max_chars} caracteres. \
         O texto deve estar em português do Brasil."
    );
    match mode {
        OutputMode::FreeText => base,
        OutputMode::Structured => format!(
            "{base} Responda em JSON com os campos \"altText\" (o texto alternativo) e \
             \"keywords\" (de 3 a 5 palavras-chave curtas)."
        ),
    }
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "altText": { "type": "STRING" },
            "keywords": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": 3,
                "maxItems": 5
            }
        },
        "required": ["altText", "keywords"]
    })
}

fn build_request_body(payload: &str, mime_type: &str, max_chars: u32, mode: OutputMode) -> Value {
    let mut body = json!({
        "contents": [
            {
                "parts": [
                    { "text": build_prompt(max_chars, mode) },
                    { "inline_data": { "mime_type": mime_type, "data": payload } }
                ]
            }
        ]
    });
    if mode == OutputMode::Structured {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        });
    }
    body
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredAltText {
    #[serde(rename = "altText")]
    alt_text: String,
    keywords: Vec<String>,
}

fn parse_result(text: &str, mode: OutputMode) -> Result<GenerationResult> {
    match mode {
        OutputMode::FreeText => Ok(GenerationResult {
            description: text.trim().to_string(),
            keywords: Vec::new(),
        }),
        OutputMode::Structured => {
            let parsed: StructuredAltText = serde_json::from_str(text.trim())
                .map_err(|err| GenerateError::ResponseFormat(err.to_string()))?;
            if parsed.alt_text.trim().is_empty() {
                return Err(GenerateError::ResponseFormat("altText is empty".to_string()));
            }
            Ok(GenerationResult {
                description: parsed.alt_text.trim().to_string(),
                keywords: parsed.keywords,
            })
        }
    }
}

/// Gemini `generateContent` client. Holds the HTTP client and the API key.
#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GenerateError::Configuration(format!("{API_KEY_VAR} is not set")))?;
        Ok(Self {
            http: Client::new(),
            api_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var(API_KEY_VAR).ok())
    }

    /// One call, no retries, no local timeout beyond the transport default.
    /// `max_chars` is advisory to the model; the caller compares the
    /// returned length against the limit.
    pub async fn generate(
        &self,
        payload: &str,
        mime_type: &str,
        max_chars: u32,
        mode: OutputMode,
    ) -> Result<GenerationResult> {
        let url = format!(
            "{GEMINI_API_BASE}/{GEMINI_MODEL}:generateContent?key={}",
            self.api_key
        );
        let body = build_request_body(payload, mime_type, max_chars, mode);

        info!(mime_type, max_chars, ?mode, "requesting alt text generation");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerateError::Service(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "generation service returned an error");
            return Err(GenerateError::Service(format!("{status}: {text}")));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| GenerateError::Service(err.to_string()))?;
        if let Some(message) = envelope.error.and_then(|err| err.message) {
            return Err(GenerateError::Service(message));
        }
        let text = envelope
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts)
            .and_then(|parts| parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| GenerateError::Service("no text in response".to_string()))?;

        parse_result(&text, mode)
    }
}

/// Description Generator owned by the application shell. The underlying
/// client is built lazily on first use, so a missing credential is a
/// recoverable per-request error rather than a startup failure.
pub struct AltTextService {
    mode: OutputMode,
    client: OnceCell<GeminiClient>,
}

impl AltTextService {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            client: OnceCell::new(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    fn client(&self) -> Result<&GeminiClient> {
        self.client.get_or_try_init(GeminiClient::from_env)
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let client = self.client()?;
        client
            .generate(
                &request.payload,
                &request.mime_type,
                request.max_chars,
                self.mode,
            )
            .await
    }
}
