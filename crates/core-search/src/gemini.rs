//! Gemini `generateContent` backend with Google Maps grounding.

use crate::{CandidateSource, Coordinates, SearchError, SearchFilters, SearchResults, parse_response};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";
const MIN_TIMEOUT_SECONDS: u64 = 5;

const SYSTEM_INSTRUCTION: &str = "You are a local food guide. You use Google Maps to find restaurants near the user. Your tone is funny, high-energy, and Gen-Z (using words like 'bussing', 'no cap', 'vibe', 'lowkey'). Always prioritize grounding results from the Maps tool.";

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "API_KEY".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct GeminiSearch {
    client: reqwest::Client,
    settings: GeminiSettings,
    api_key: String,
}

/// Accept a key only if it is present, non-blank and not the literal
/// `"undefined"` left behind by some build pipelines.
fn resolve_api_key(env: &str, value: Option<String>) -> Result<String, SearchError> {
    match value {
        Some(key) if !key.trim().is_empty() && key.trim() != "undefined" => {
            Ok(key.trim().to_string())
        }
        _ => Err(SearchError::MissingCredential {
            env: env.to_string(),
        }),
    }
}

impl GeminiSearch {
    /// Read the API key from `settings.api_key_env`.
    pub fn from_env(settings: GeminiSettings) -> Result<Self, SearchError> {
        let value = std::env::var(&settings.api_key_env).ok();
        let key = resolve_api_key(&settings.api_key_env, value)?;
        Self::with_api_key(settings, key)
    }

    pub fn with_api_key(
        settings: GeminiSettings,
        api_key: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let api_key = resolve_api_key(&settings.api_key_env, Some(api_key.into()))?;
        let timeout = if settings.timeout < Duration::from_secs(MIN_TIMEOUT_SECONDS) {
            warn!(target: "search.gemini", configured_ms = settings.timeout.as_millis() as u64, "timeout_raised_to_minimum");
            Duration::from_secs(MIN_TIMEOUT_SECONDS)
        } else {
            settings.timeout
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::TransientFailure(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

fn build_prompt(coordinates: Coordinates, filters: &SearchFilters) -> String {
    format!(
        "Search for food spots and restaurants near Latitude {}, Longitude {}.\n\
         The user is looking for spots within {} meters.\n\
         Target Budget: {}.\n\n\
         CRITICAL:\n\
         1. Use the Google Maps tool for ALL results.\n\
         2. Provide a short, funny Gen-Z style 'vibe check' for each restaurant found.\n\
         3. Return local results only.",
        coordinates.latitude,
        coordinates.longitude,
        filters.radius_meters,
        filters.budget.label()
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    tools: Vec<Tool>,
    tool_config: ToolConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_maps: Empty,
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    retrieval_config: RetrievalConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfig {
    lat_lng: Coordinates,
}

fn build_request(coordinates: Coordinates, filters: &SearchFilters) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part {
                text: build_prompt(coordinates, filters),
            }],
        }],
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_INSTRUCTION.to_string(),
            }],
        },
        tools: vec![Tool { google_maps: Empty {} }],
        tool_config: ToolConfig {
            retrieval_config: RetrievalConfig {
                lat_lng: coordinates,
            },
        },
    }
}

#[async_trait]
impl CandidateSource for GeminiSearch {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn search(
        &self,
        coordinates: Coordinates,
        filters: &SearchFilters,
    ) -> Result<SearchResults, SearchError> {
        debug!(target: "search.gemini", model = %self.settings.model, %coordinates, radius = filters.radius_meters, budget = filters.budget.as_str(), "search_request");
        let request = build_request(coordinates, filters);
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::TransientFailure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "search.gemini", status = status.as_u16(), "search_http_error");
            return Err(SearchError::from_status(status.as_u16(), &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::TransientFailure(format!("unreadable response: {e}")))?;
        let results = parse_response(&body);
        info!(target: "search.gemini", candidates = results.len(), "search_complete");
        Ok(results)
    }
}
