/// Failure of a single request against the backend API.
///
/// Every request is single-shot: callers surface the error and never retry.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {status} ({status_text})")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Failed to parse JSON: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text shown to the operator for console actions (the HTTP reason phrase).
    pub fn status_text(&self) -> String {
        match self {
            ApiError::Status { status_text, .. } => status_text.clone(),
            other => other.to_string(),
        }
    }

    /// Text shown to the operator for auth flows (the response body).
    pub fn response_text(&self) -> String {
        match self {
            ApiError::Status {
                body, status_text, ..
            } => {
                if body.trim().is_empty() {
                    status_text.clone()
                } else {
                    body.trim().trim_matches('"').to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::Url(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidden(body: &str) -> ApiError {
        ApiError::Status {
            status: 403,
            status_text: "Forbidden".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_status_accessors() {
        let err = forbidden("");
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.status_text(), "Forbidden");
        assert_eq!(err.response_text(), "Forbidden");
        assert_eq!(err.to_string(), "HTTP error: 403 (Forbidden)");
        assert_eq!(ApiError::Transport("refused".into()).status(), None);
    }

    #[test]
    fn test_response_text_prefers_body() {
        assert_eq!(
            forbidden("\"wrong captcha\"\n").response_text(),
            "wrong captcha"
        );
    }
}
