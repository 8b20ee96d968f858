//! Login page flows: captcha, password reset, token, password change.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use shared_types::{Captcha, PasswordUpdateRequest, ResetPasswordRequest, TokenRequest};
use validator::Validate;

use crate::api::AuthApi;
use crate::config::ConsoleConfig;
use crate::effects::Effect;
use crate::error::ApiError;
use crate::notice::{notice_for_auth_error, Notice};
use crate::save::FieldError;

pub const MISSING_EMAIL: &str = "enter your email in the login form";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("enter your email in the login form")]
    MissingEmail,

    #[error("captcha image is not valid base64: {0}")]
    InvalidCaptcha(#[from] base64::DecodeError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    pub fn notice(&self) -> Notice {
        match self {
            AuthError::MissingEmail => Notice::warning(MISSING_EMAIL),
            AuthError::InvalidCaptcha(e) => Notice::warning(format!("captcha unavailable: {e}")),
            AuthError::Api(e) => notice_for_auth_error(e),
        }
    }
}

/// Decoded captcha challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub uid: String,
    pub png: Vec<u8>,
}

impl CaptchaChallenge {
    pub fn decode(captcha: Captcha) -> Result<Self, AuthError> {
        let png = STANDARD.decode(captcha.image.trim())?;
        Ok(Self {
            uid: captcha.uid,
            png,
        })
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// Inputs of the login page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub person_email: String,
    pub person_password: String,
    pub captcha_text: String,
    pub captcha: Option<CaptchaChallenge>,
}

impl LoginForm {
    fn email(&self) -> Result<String, AuthError> {
        let email = self.person_email.trim();
        if email.is_empty() {
            return Err(AuthError::MissingEmail);
        }
        Ok(email.to_string())
    }

    /// Captcha row is shown while a challenge is pending
    pub fn captcha_visible(&self) -> bool {
        self.captcha.is_some()
    }
}

/// Password change form, both entries must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct PasswordForm {
    #[validate(
        length(min = 1, message = "enter your new password"),
        must_match(
            other = "person_password2",
            message = "you have not entered the same password"
        )
    )]
    pub person_password: String,
    #[validate(length(min = 1, message = "enter your new password"))]
    pub person_password2: String,
}

impl PasswordForm {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, rules)| {
                let rule = rules.first()?;
                let message = rule
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| rule.code.to_string());
                Some(FieldError::new(field.to_string(), message))
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Err(fields)
    }
}

/// Auth flows bound to one API client.
pub struct AuthFlows<A: AuthApi + ?Sized> {
    api: Arc<A>,
    config: ConsoleConfig,
}

impl<A: AuthApi + ?Sized> AuthFlows<A> {
    pub fn new(api: Arc<A>, config: ConsoleConfig) -> Self {
        Self { api, config }
    }

    /// Ask for a captcha before a password reset.
    pub async fn request_captcha(&self, form: &mut LoginForm) -> Vec<Effect> {
        if let Err(e) = form.email() {
            return vec![Effect::Notify(e.notice())];
        }
        let mut effects = vec![Effect::Notify(Notice::success("are you a robot?"))];

        let challenge = match self.api.get_captcha().await {
            Ok(captcha) => CaptchaChallenge::decode(captcha),
            Err(e) => Err(AuthError::from(e)),
        };
        match challenge {
            Ok(challenge) => {
                tracing::debug!(uid = %challenge.uid, bytes = challenge.png.len(), "Captcha received");
                form.captcha = Some(challenge);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to get captcha");
                effects.push(Effect::Notify(e.notice()));
            }
        }
        effects
    }

    /// Send the captcha answer. Inputs are cleared whatever the outcome.
    pub async fn reset_password(&self, form: &mut LoginForm) -> Vec<Effect> {
        let email = match form.email() {
            Ok(email) => email,
            Err(e) => return vec![Effect::Notify(e.notice())],
        };
        let request = ResetPasswordRequest {
            person_email: email.clone(),
            captcha_text: form.captcha_text.trim().to_string(),
            captcha_uid: form
                .captcha
                .as_ref()
                .map(|c| c.uid.clone())
                .unwrap_or_default(),
        };
        let mut effects = vec![Effect::Notify(Notice::success("validating..."))];

        let result = self.api.reset_password(&request).await;

        form.person_email.clear();
        form.captcha_text.clear();
        form.captcha = None;

        match result {
            Ok(()) => {
                tracing::info!(email = %email, "Password reset link sent");
                effects.push(Effect::Notify(Notice::success(format!(
                    "a reinitialization link has been sent to {email}"
                ))));
            }
            Err(e) => {
                tracing::error!(error = %e, "Password reset failed");
                effects.push(Effect::Notify(notice_for_auth_error(&e)));
            }
        }
        effects
    }

    /// Log in; success lands on the landing route right away.
    pub async fn get_token(&self, form: &LoginForm) -> Vec<Effect> {
        let email = match form.email() {
            Ok(email) => email,
            Err(e) => return vec![Effect::Notify(e.notice())],
        };
        let request = TokenRequest {
            person_email: email,
            person_password: form.person_password.clone(),
        };
        match self.api.get_token(&request).await {
            Ok(()) => vec![Effect::Redirect {
                route: self.config.landing_route.clone(),
                after: std::time::Duration::ZERO,
            }],
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                vec![Effect::Notify(notice_for_auth_error(&e))]
            }
        }
    }

    pub async fn change_password(
        &self,
        form: &PasswordForm,
    ) -> Result<Vec<Effect>, Vec<FieldError>> {
        form.check()?;
        let request = PasswordUpdateRequest {
            person_password: form.person_password.clone(),
        };
        Ok(match self.api.update_password(&request).await {
            Ok(()) => vec![
                Effect::Notify(Notice::success("password updated")),
                Effect::Redirect {
                    route: self.config.landing_route.clone(),
                    after: self.config.redirect_delay,
                },
            ],
            Err(e) => {
                tracing::error!(error = %e, "Password update failed");
                vec![Effect::Notify(notice_for_auth_error(&e))]
            }
        })
    }
}

/// Value of cookie `name` in a `Cookie` header.
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}
