//! Operator notices (toasts) and the shared HTTP-error-to-notice mapping.

use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Danger,
    Light,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn new(message: impl Into<String>, level: NoticeLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NoticeLevel::Success)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NoticeLevel::Warning)
    }
}

/// 401, 403 and 500 are shown as danger, every other status as a neutral notice.
pub fn notice_for_http_error(status: Option<u16>, message: &str) -> Notice {
    match status {
        Some(401) | Some(403) | Some(500) => Notice::new(message, NoticeLevel::Danger),
        _ => Notice::new(message, NoticeLevel::Light),
    }
}

/// Notice for a failed console request, worded with the HTTP reason phrase.
pub fn notice_for_api_error(err: &ApiError) -> Notice {
    notice_for_http_error(err.status(), &err.status_text())
}

/// Notice for a failed auth request, worded with the response body.
pub fn notice_for_auth_error(err: &ApiError) -> Notice {
    notice_for_http_error(err.status(), &err.response_text())
}
