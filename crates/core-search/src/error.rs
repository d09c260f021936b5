use thiserror::Error;

/// Why a search produced no candidate list. An empty list is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("API key is missing: set the {env} environment variable")]
    MissingCredential { env: String },
    #[error("API key was rejected: {0}")]
    AuthRejected(String),
    #[error("search failed: {0}")]
    TransientFailure(String),
}

impl SearchError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {status}: {}", body.trim());
        if status == 401 || status == 403 || body.contains("API_KEY_INVALID") {
            SearchError::AuthRejected(detail)
        } else {
            SearchError::TransientFailure(detail)
        }
    }

    /// User-facing message shown by the front end.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::MissingCredential { env } => format!(
                "API Key is missing. Please ensure '{env}' is set in your environment."
            ),
            SearchError::AuthRejected(_) => "Invalid or Restricted API Key. Ensure the key has Gemini API and Google Maps grounding access.".to_string(),
            SearchError::TransientFailure(detail) => format!("The Lunch Bot fumbled the bag: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(SearchError::from_status(403, "nope"), SearchError::AuthRejected(_)));
        assert!(matches!(SearchError::from_status(401, ""), SearchError::AuthRejected(_)));
        assert!(matches!(
            SearchError::from_status(400, r#"{"error":{"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#),
            SearchError::AuthRejected(_)
        ));
        assert!(matches!(SearchError::from_status(500, "boom"), SearchError::TransientFailure(_)));
        assert!(matches!(SearchError::from_status(429, "slow down"), SearchError::TransientFailure(_)));
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let err = SearchError::MissingCredential { env: "API_KEY".into() };
        assert!(err.to_string().contains("API_KEY"));
        assert!(err.user_message().contains("'API_KEY'"));
    }
}
