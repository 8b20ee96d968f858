use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{
    parse_validation_answer, Captcha, EmailValidationRequest, Entity, EntityId, Page,
    PasswordUpdateRequest, PermissionGrant, Person, PersonId, PersonPayload, ResetPasswordRequest,
    TokenRequest, NEW_PERSON_ID,
};
use url::Url;

use crate::config::ConsoleConfig;
use crate::error::ApiError;

// ============================================================================
// Request types
// ============================================================================

/// Query string of `GET entities`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub page: u32,
    pub offset: u64,
    pub limit: u32,
}

impl EntityQuery {
    /// Page numbers start at 1; a missing page means the first one.
    pub fn new(search: Option<&str>, page: Option<u32>, limit: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        Self {
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            page,
            offset: u64::from(page - 1) * u64::from(limit),
            limit,
        }
    }
}

/// Query string of `GET people`, passed through as-is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeopleQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    pub offset: u64,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityId>,
}

/// Outcome of the remote email uniqueness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailCheck {
    Available,
    Rejected(String),
}

// ============================================================================
// API seams
// ============================================================================

/// People and entity endpoints used by the console.
#[async_trait]
pub trait PeopleApi: Send + Sync {
    async fn search_entities(&self, query: &EntityQuery) -> Result<Page<Entity>, ApiError>;

    async fn list_people(&self, query: &PeopleQuery) -> Result<Page<Person>, ApiError>;

    async fn get_person(&self, person_id: PersonId) -> Result<Person, ApiError>;

    /// Entities the person is a manager of
    async fn get_managed_entities(&self, person_id: PersonId) -> Result<Vec<Entity>, ApiError>;

    /// Entities the person belongs to
    async fn get_person_entities(&self, person_id: PersonId) -> Result<Vec<Entity>, ApiError>;

    async fn get_person_permissions(
        &self,
        person_id: PersonId,
    ) -> Result<Vec<PermissionGrant>, ApiError>;

    async fn create_person(&self, payload: &PersonPayload) -> Result<Person, ApiError>;

    async fn update_person(
        &self,
        person_id: PersonId,
        payload: &PersonPayload,
    ) -> Result<Person, ApiError>;

    async fn delete_person(&self, person_id: PersonId) -> Result<(), ApiError>;

    /// `person_id` is `None` while creating a person.
    async fn validate_person_email(
        &self,
        person_id: Option<PersonId>,
        email: &str,
    ) -> Result<EmailCheck, ApiError>;

    /// Whether the logged user may issue `method` on `item/item_id`.
    async fn has_permission(
        &self,
        item: &str,
        item_id: i64,
        method: &Method,
    ) -> Result<bool, ApiError>;
}

/// Unauthenticated login page endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn get_captcha(&self) -> Result<Captcha, ApiError>;

    async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), ApiError>;

    async fn get_token(&self, request: &TokenRequest) -> Result<(), ApiError>;

    async fn update_password(&self, request: &PasswordUpdateRequest) -> Result<(), ApiError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// reqwest-backed client; every path is relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct HttpPeopleApi {
    client: Client,
    base_url: Url,
}

impl HttpPeopleApi {
    pub fn new(config: &ConsoleConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.url(path)?).send().await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let rows: Option<Vec<T>> = self.get_json(path).await?;
        Ok(rows.unwrap_or_default())
    }

    async fn send_form<F: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        form: &F,
    ) -> Result<Response, ApiError> {
        let response = self
            .client
            .request(method, self.url(path)?)
            .form(form)
            .send()
            .await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(describe_http_error(response).await)
}

async fn describe_http_error(response: Response) -> ApiError {
    let status = response.status();
    let status_text = status
        .canonical_reason()
        .map(ToString::to_string)
        .unwrap_or_else(|| status.as_str().to_string());
    let body = response.text().await.unwrap_or_default();

    let body = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => json
            .get("error")
            .or_else(|| json.get("message"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .unwrap_or(body),
        Err(_) => body,
    };

    ApiError::Status {
        status: status.as_u16(),
        status_text,
        body,
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl PeopleApi for HttpPeopleApi {
    async fn search_entities(&self, query: &EntityQuery) -> Result<Page<Entity>, ApiError> {
        let response = self
            .client
            .get(self.url("entities")?)
            .query(query)
            .send()
            .await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn list_people(&self, query: &PeopleQuery) -> Result<Page<Person>, ApiError> {
        let response = self
            .client
            .get(self.url("people")?)
            .query(query)
            .send()
            .await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn get_person(&self, person_id: PersonId) -> Result<Person, ApiError> {
        self.get_json(&format!("people/{person_id}")).await
    }

    async fn get_managed_entities(&self, person_id: PersonId) -> Result<Vec<Entity>, ApiError> {
        self.get_list(&format!("people/{person_id}/manageentities"))
            .await
    }

    async fn get_person_entities(&self, person_id: PersonId) -> Result<Vec<Entity>, ApiError> {
        self.get_list(&format!("people/{person_id}/entities")).await
    }

    async fn get_person_permissions(
        &self,
        person_id: PersonId,
    ) -> Result<Vec<PermissionGrant>, ApiError> {
        self.get_list(&format!("people/{person_id}/permissions"))
            .await
    }

    async fn create_person(&self, payload: &PersonPayload) -> Result<Person, ApiError> {
        let response = self
            .send_form(Method::POST, "people", &payload.to_form_fields())
            .await?;
        decode_json(response).await
    }

    async fn update_person(
        &self,
        person_id: PersonId,
        payload: &PersonPayload,
    ) -> Result<Person, ApiError> {
        let response = self
            .send_form(
                Method::PUT,
                &format!("people/{person_id}"),
                &payload.to_form_fields(),
            )
            .await?;
        decode_json(response).await
    }

    async fn delete_person(&self, person_id: PersonId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("people/{person_id}"))?)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn validate_person_email(
        &self,
        person_id: Option<PersonId>,
        email: &str,
    ) -> Result<EmailCheck, ApiError> {
        let id = person_id.unwrap_or(NEW_PERSON_ID);
        let request = EmailValidationRequest {
            person_email: email.to_string(),
        };
        let response = self
            .send_form(
                Method::POST,
                &format!("validate/person/{id}/email/"),
                &request,
            )
            .await?;
        let answer: serde_json::Value = decode_json(response).await?;
        Ok(match parse_validation_answer(&answer) {
            Ok(()) => EmailCheck::Available,
            Err(message) => EmailCheck::Rejected(message),
        })
    }

    async fn has_permission(
        &self,
        item: &str,
        item_id: i64,
        method: &Method,
    ) -> Result<bool, ApiError> {
        let url = self.url(&format!("f/{item}/{item_id}/{}", method.as_str()))?;
        let response = self.client.get(url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            _ => Err(describe_http_error(response).await),
        }
    }
}

#[async_trait]
impl AuthApi for HttpPeopleApi {
    async fn get_captcha(&self) -> Result<Captcha, ApiError> {
        self.get_json("captcha").await
    }

    async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), ApiError> {
        self.send_form(Method::POST, "reset-password", request)
            .await?;
        Ok(())
    }

    async fn get_token(&self, request: &TokenRequest) -> Result<(), ApiError> {
        self.send_form(Method::POST, "get-token", request).await?;
        Ok(())
    }

    async fn update_password(&self, request: &PasswordUpdateRequest) -> Result<(), ApiError> {
        self.send_form(Method::POST, "peoplep", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_query_offsets() {
        let first = EntityQuery::new(Some("chem"), None, 10);
        assert_eq!(first.page, 1);
        assert_eq!(first.offset, 0);
        assert_eq!(first.search.as_deref(), Some("chem"));

        let third = EntityQuery::new(None, Some(3), 10);
        assert_eq!(third.offset, 20);
        assert_eq!(third.limit, 10);
        assert_eq!(third.search, None);
    }

    #[test]
    fn test_entity_query_clamps_page_zero() {
        let query = EntityQuery::new(Some("  "), Some(0), 10);
        assert_eq!(query.page, 1);
        assert_eq!(query.offset, 0);
        assert_eq!(query.search, None);
    }

    #[test]
    fn test_api_paths_stay_under_base() {
        let config = ConsoleConfig::with_base_url("http://localhost:8081/chim/").unwrap();
        let api = HttpPeopleApi::new(&config).unwrap();
        assert_eq!(
            api.url("people/42/manageentities").unwrap().as_str(),
            "http://localhost:8081/chim/people/42/manageentities"
        );
        assert_eq!(
            api.url("validate/person/-1/email/").unwrap().as_str(),
            "http://localhost:8081/chim/validate/person/-1/email/"
        );
    }
}
