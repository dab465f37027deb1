//! A thin client for the advisory chatbot's HTTP endpoints, used by the smoke-test commands.
//!
//! Responses are not validated against a schema; callers only check that expected fields exist.

use crate::{HarvestError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;
use url::Url;

pub const ASK_TIMEOUT: Duration = Duration::from_secs(60);
pub const SHOWCASE_ASK_TIMEOUT: Duration = Duration::from_secs(180);
pub const SCAN_IMAGE_TIMEOUT: Duration = Duration::from_secs(45);
pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(60);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Response languages the chatbot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Marathi,
    Tamil,
    Telugu,
    Kannada,
    Punjabi,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Marathi => "marathi",
            Language::Tamil => "tamil",
            Language::Telugu => "telugu",
            Language::Kannada => "kannada",
            Language::Punjabi => "punjabi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body of an `/ask` request.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
    pub language: Language,
}

/// A response body: parsed JSON when possible, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(String),
}

/// The status and body of one endpoint call.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl EndpointResponse {
    async fn from_response(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let text = response.text().await?;
        debug!("Response status: {}, {} bytes", status, text.len());

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(json) => ResponseBody::Json(json),
            Err(_) => ResponseBody::Raw(text),
        };

        Ok(Self { status, body })
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(json) => Some(json),
            ResponseBody::Raw(_) => None,
        }
    }

    /// A top-level string field of the JSON body.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.json()?.get(field)?.as_str()
    }

    /// The expected top-level fields the JSON body does not have.
    pub fn missing_fields<'f>(&self, fields: &[&'f str]) -> Vec<&'f str> {
        fields
            .iter()
            .copied()
            .filter(|field| self.json().and_then(|json| json.get(field)).is_none())
            .collect()
    }

    /// Pretty-printed JSON, or the raw body.
    pub fn pretty(&self) -> String {
        match &self.body {
            ResponseBody::Json(json) => {
                serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string())
            }
            ResponseBody::Raw(text) => text.clone(),
        }
    }
}

/// The `ChatbotClient` struct issues single, unretried requests against the chatbot service.
pub struct ChatbotClient {
    client: Client,
    base_url: Url,
}

impl ChatbotClient {
    /// Creates a client for `http://{host}:{port}`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_base_url(&format!("http://{host}:{port}"))
    }

    /// Creates a client for an explicit base URL such as `http://127.0.0.1:5000`.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|source| HarvestError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            client: Client::builder().build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path (e.g. `/ask`) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|source| HarvestError::InvalidUrl {
                url: path.to_string(),
                source,
            })
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<EndpointResponse> {
        let response = self.client.get(self.endpoint("/health")?).send().await?;
        EndpointResponse::from_response(response).await
    }

    /// `POST /ask` with a JSON `{question, language}` body.
    pub async fn ask(
        &self,
        question: &str,
        language: Language,
        timeout: Duration,
    ) -> Result<EndpointResponse> {
        let response = self
            .client
            .post(self.endpoint("/ask")?)
            .json(&AskRequest { question, language })
            .timeout(timeout)
            .send()
            .await?;

        EndpointResponse::from_response(response).await
    }

    /// `POST /scan-image` with the image as the multipart `file` field plus `language` and `prompt`.
    pub async fn scan_image(
        &self,
        image: &Path,
        language: Language,
        prompt: &str,
    ) -> Result<EndpointResponse> {
        let form = Form::new()
            .part("file", image_part(image).await?)
            .text("language", language.as_str())
            .text("prompt", prompt.to_string());

        let response = self
            .client
            .post(self.endpoint("/scan-image")?)
            .multipart(form)
            .timeout(SCAN_IMAGE_TIMEOUT)
            .send()
            .await?;

        EndpointResponse::from_response(response).await
    }

    /// `POST /classify-plant` with the image as the multipart `image` field plus `language`.
    pub async fn classify_plant(
        &self,
        image: &Path,
        language: Language,
    ) -> Result<EndpointResponse> {
        let form = Form::new()
            .part("image", image_part(image).await?)
            .text("language", language.as_str());

        let response = self
            .client
            .post(self.endpoint("/classify-plant")?)
            .multipart(form)
            .timeout(CLASSIFY_TIMEOUT)
            .send()
            .await?;

        EndpointResponse::from_response(response).await
    }

    /// Whether a `HEAD` on the given path (relative or absolute) answers `200 OK`.
    pub async fn is_reachable(&self, path: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.endpoint(path)?)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;

        Ok(response.status() == StatusCode::OK)
    }
}

/// The MIME type sent for an image: JPEG for `.jpg`/`.jpeg`, PNG otherwise.
pub fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

async fn image_part(path: &Path) -> Result<Part> {
    let bytes = fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("image"));

    Ok(Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(image_mime(path))?)
}

/// Renders a `/classify-plant` JSON body for the terminal.
pub fn render_classification(result: &Value) -> String {
    let classification = result
        .get("classification")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_uppercase();
    let confidence = result
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        * 100.0;

    let mut lines = vec![
        String::from("CLASSIFICATION RESULT"),
        "=".repeat(60),
        format!("Type:           {}", classification),
        format!("Confidence:     {:.1}%", confidence),
    ];

    if let Some(plant_type) = non_empty_str(result, "plant_type") {
        lines.push(format!("Plant Type:     {}", plant_type));
    }

    lines.push(String::from("\nDetails:"));
    lines.push(format!(
        "  {}",
        non_empty_str(result, "details").unwrap_or("N/A")
    ));

    if let Some(characteristics) = non_empty_str(result, "characteristics") {
        lines.push(format!("\nCharacteristics:\n  {}", characteristics));
    }
    if let Some(recommendation) = non_empty_str(result, "recommendation") {
        lines.push(format!("\nRecommendation:\n  {}", recommendation));
    }

    lines.push("=".repeat(60));
    lines.join("\n")
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Farming questions that the chatbot answers with an infographic.
pub const SHOWCASE_QUESTIONS: [(&str, &str); 5] = [
    (
        "Tell me about sugarcane growth stages from planting to harvest. What are the different phases?",
        "Sugarcane growth stages timeline",
    ),
    (
        "I need to understand the fertilizer schedule for my sugarcane farm. When should I apply which nutrients?",
        "Fertilizer application schedule",
    ),
    (
        "Can you explain different irrigation methods for sugarcane? I want to know which is best for my farm.",
        "Irrigation methods comparison",
    ),
    (
        "Help me with disease identification in sugarcane. What are the common diseases and how to spot them?",
        "Sugarcane disease identification guide",
    ),
    (
        "Which sugarcane varieties should I choose for my region? I need to compare different options.",
        "Sugarcane varieties comparison chart",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("leaf.JPG")), "image/jpeg");
        assert_eq!(image_mime(Path::new("leaf.jpeg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("leaf.png")), "image/png");
        assert_eq!(image_mime(Path::new("leaf")), "image/png");
    }

    #[test]
    fn test_endpoint_resolution() {
        let client = ChatbotClient::new("localhost", 5000).unwrap();

        assert_eq!(
            client.endpoint("/scan-image").unwrap().as_str(),
            "http://localhost:5000/scan-image"
        );
        assert_eq!(
            client.endpoint("/uploads/infographics/a.png").unwrap().as_str(),
            "http://localhost:5000/uploads/infographics/a.png"
        );
    }

    #[test]
    fn test_missing_fields() {
        let response = EndpointResponse {
            status: StatusCode::OK,
            body: ResponseBody::Json(json!({"response": "Use resistant varieties"})),
        };
        assert_eq!(
            response.missing_fields(&["response", "infographic_url"]),
            vec!["infographic_url"]
        );

        let raw = EndpointResponse {
            status: StatusCode::BAD_GATEWAY,
            body: ResponseBody::Raw(String::from("bad gateway")),
        };
        assert_eq!(raw.missing_fields(&["response"]), vec!["response"]);
        assert_eq!(raw.pretty(), "bad gateway");
    }

    #[test]
    fn test_render_classification() {
        let rendered = render_classification(&json!({
            "classification": "weed",
            "confidence": 0.875,
            "details": "Broad leaves",
            "recommendation": "Remove manually"
        }));

        assert!(rendered.contains("Type:           WEED"));
        assert!(rendered.contains("Confidence:     87.5%"));
        assert!(rendered.contains("Details:\n  Broad leaves"));
        assert!(rendered.contains("Recommendation:\n  Remove manually"));
        assert!(!rendered.contains("Plant Type"));
    }

    #[test]
    fn test_language_serializes_lowercase() {
        let body = serde_json::to_value(AskRequest {
            question: "When to irrigate?",
            language: Language::Tamil,
        })
        .unwrap();

        assert_eq!(body, json!({"question": "When to irrigate?", "language": "tamil"}));
    }
}
