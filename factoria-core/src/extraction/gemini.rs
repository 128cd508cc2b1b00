use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::GeminiConfig;

/// Raw answer from a text-generation call.
///
/// Some gateways return the generated text directly in `text`; the native
/// API only returns it split across the parts of each candidate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GenerateResponse {
    /// A response carrying only the direct `text` field.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            candidates: Vec::new(),
        }
    }
}

/// A generative-AI text completion backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<GenerateResponse>;
}

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

/// Client for the Google Generative Language REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow!("failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            endpoint: generate_endpoint(&config.api_base, &config.model_id),
            api_key: config.api_key.clone(),
        })
    }
}

fn generate_endpoint(api_base: &str, model_id: &str) -> String {
    let model = if model_id.starts_with("models/") {
        model_id.to_string()
    } else {
        format!("models/{}", model_id)
    };
    format!("{}/v1beta/{}:generateContent", api_base.trim_end_matches('/'), model)
}

impl GeminiClient {
    /// Builds the `generateContent` call. The API key travels in the
    /// `x-goog-api-key` header, never in the URL.
    fn build_request(&self, prompt: &str) -> reqwest::Result<reqwest::Request> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        self.http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .build()
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate_content(&self, prompt: &str) -> Result<GenerateResponse> {
        let request = self.build_request(prompt)?;
        let response = self.http.execute(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini error {}: {}", status, body));
        }

        let body: GenerateResponse = response.json().await?;
        debug!("Gemini returned {} candidate(s)", body.candidates.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_accepts_bare_and_prefixed_model_ids() {
        assert_eq!(
            generate_endpoint("https://generativelanguage.googleapis.com/", "models/gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            generate_endpoint("http://localhost:9000", "gemini-2.5-flash"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_native_response_decodes() {
        let raw = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"es_factura\":"}, {"text": " true}"}]}}
            ],
            "usageMetadata": {"totalTokenCount": 12}
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();

        assert!(response.text.is_none());
        let parts = &response.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_api_key_is_sent_as_header_only() {
        let client = GeminiClient::new(&GeminiConfig {
            api_key: "secret-key".into(),
            model_id: "gemini-2.5-flash".into(),
            api_base: "http://localhost:9000".into(),
            timeout: std::time::Duration::from_secs(5),
        })
        .unwrap();

        let request = client.build_request("hola").unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.headers()[API_KEY_HEADER], "secret-key");
        assert!(request.url().query().is_none());
        assert!(!request.url().as_str().contains("secret-key"));
    }
}
