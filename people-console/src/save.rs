//! Submit pipeline of the edit panel: validate, serialize, write.

use serde::Serialize;
use shared_types::{Person, PersonId, PersonPayload};
use validator::Validate;

use crate::api::{EmailCheck, PeopleApi};
use crate::entities::EntityAssociation;
use crate::error::ApiError;
use crate::notice::{notice_for_api_error, Notice};
use crate::permissions::PermissionWidgetSet;

/// Scalar fields of the edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct PersonForm {
    pub person_id: Option<PersonId>,
    #[validate(
        length(min = 1, message = "required"),
        email(message = "invalid email")
    )]
    pub person_email: String,
    /// Table row the form was opened from
    pub row_index: Option<usize>,
}

impl PersonForm {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn edit(person_id: PersonId, row_index: Option<usize>) -> Self {
        Self {
            person_id: Some(person_id),
            person_email: String::new(),
            row_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Local checks only; keeps the first failing rule per field.
pub fn validate_form(form: &PersonForm) -> Result<(), Vec<FieldError>> {
    let Err(errors) = form.validate() else {
        return Ok(());
    };

    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, rules)| {
            let rule = rules
                .iter()
                .find(|r| r.code == "length")
                .or_else(|| rules.first())?;
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Create,
    Update(PersonId),
}

impl SaveMode {
    pub fn person_id(&self) -> Option<PersonId> {
        match self {
            SaveMode::Create => None,
            SaveMode::Update(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub mode: SaveMode,
    pub row_index: Option<usize>,
    pub payload: PersonPayload,
}

/// Snapshot the current widget state into a write request.
pub fn build_save_request(
    form: &PersonForm,
    association: &EntityAssociation,
    permissions: &PermissionWidgetSet,
) -> SaveRequest {
    let mode = match form.person_id {
        Some(id) => SaveMode::Update(id),
        None => SaveMode::Create,
    };
    SaveRequest {
        mode,
        row_index: form.row_index,
        payload: PersonPayload {
            person_id: form.person_id,
            person_email: form.person_email.trim().to_string(),
            entities: association.selected().to_vec(),
            permissions: permissions.checked(),
        },
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("invalid form: {}", .0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect::<Vec<_>>().join(", "))]
    Invalid(Vec<FieldError>),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SaveError {
    /// Field errors to show inline, if this is a validation failure.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            SaveError::Invalid(errors) => Some(errors),
            SaveError::Api(_) => None,
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        match self {
            SaveError::Invalid(_) => None,
            SaveError::Api(err) => Some(notice_for_api_error(err)),
        }
    }
}

/// Remote uniqueness check of the email, keyed by the current person id.
pub async fn check_email<A: PeopleApi + ?Sized>(
    api: &A,
    request: &SaveRequest,
) -> Result<(), SaveError> {
    match api
        .validate_person_email(request.mode.person_id(), &request.payload.person_email)
        .await?
    {
        EmailCheck::Available => Ok(()),
        EmailCheck::Rejected(message) => Err(SaveError::Invalid(vec![FieldError::new(
            "person_email",
            message,
        )])),
    }
}

/// POST for a new person, PUT for an existing one. Single attempt.
pub async fn submit<A: PeopleApi + ?Sized>(
    api: &A,
    request: &SaveRequest,
) -> Result<Person, SaveError> {
    let person = match request.mode {
        SaveMode::Create => api.create_person(&request.payload).await?,
        SaveMode::Update(id) => api.update_person(id, &request.payload).await?,
    };
    tracing::info!(
        person_id = person.person_id,
        mode = ?request.mode,
        entities = request.payload.entities.len(),
        permissions = request.payload.permissions.len(),
        "Person saved"
    );
    Ok(person)
}
