//! Shared types between the people console and the backend API
//!
//! These types mirror the JSON the backend speaks:
//! - person, entity and permission records
//! - paginated list envelopes
//! - authentication requests (captcha, password reset, token)
//!
//! Serializable with serde; TypeScript bindings are generated with ts-rs.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

// ============================================================================
// Identifiers
// ============================================================================

pub type PersonId = i64;
pub type EntityId = i64;

/// Entity id used by grants that apply to every entity.
pub const GLOBAL_ENTITY_ID: EntityId = -1;

/// Person id sent to the email validator while creating a person.
pub const NEW_PERSON_ID: PersonId = -1;

/// The backend answers `null` instead of `[]` for empty collections.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Records
// ============================================================================

/// Organizational unit a person can belong to or manage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct Entity {
    pub entity_id: EntityId,
    pub entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_description: Option<String>,
}

/// Minimal entity reference carried by selections and save payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct EntityRef {
    pub entity_id: EntityId,
    pub entity_name: String,
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_id: entity.entity_id,
            entity_name: entity.entity_name.clone(),
        }
    }
}

impl From<Entity> for EntityRef {
    fn from(entity: Entity) -> Self {
        Self {
            entity_id: entity.entity_id,
            entity_name: entity.entity_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct Person {
    pub person_id: PersonId,
    pub person_email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[ts(type = "Array<Entity>")]
    pub entities: Vec<Entity>,
}

/// A (perm, item) pair granted to a person, scoped to one entity.
///
/// `permission_entity_id == GLOBAL_ENTITY_ID` scopes the grant to every entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct PermissionGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_id: Option<i64>,
    pub permission_perm_name: String,
    pub permission_item_name: String,
    pub permission_entity_id: EntityId,
}

impl PermissionGrant {
    pub fn new(entity_id: EntityId, perm_name: &str, item_name: &str) -> Self {
        Self {
            permission_id: None,
            permission_perm_name: perm_name.to_string(),
            permission_item_name: item_name.to_string(),
            permission_entity_id: entity_id,
        }
    }
}

// ============================================================================
// List envelopes
// ============================================================================

/// `{rows, total}` envelope returned by list endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    #[serde(
        default = "Vec::new",
        deserialize_with = "null_as_empty",
        bound(deserialize = "T: Deserialize<'de>")
    )]
    pub rows: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
        }
    }
}

// ============================================================================
// Save payload
// ============================================================================

/// Create/update body for `people[/:id]`.
///
/// The backend decodes a flat form with indexed keys, see [`PersonPayload::to_form_fields`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct PersonPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<PersonId>,
    pub person_email: String,
    pub entities: Vec<EntityRef>,
    pub permissions: Vec<PermissionGrant>,
}

impl PersonPayload {
    /// Flatten into `entities.<i>.*` / `permissions.<i>.*` keys plus scalar fields.
    ///
    /// Indices run 0..N-1 in selection order with no gaps.
    pub fn to_form_fields(&self) -> Vec<(String, String)> {
        let mut fields =
            Vec::with_capacity(2 + self.entities.len() * 2 + self.permissions.len() * 3);

        for (index, grant) in self.permissions.iter().enumerate() {
            fields.push((
                format!("permissions.{index}.permission_perm_name"),
                grant.permission_perm_name.clone(),
            ));
            fields.push((
                format!("permissions.{index}.permission_item_name"),
                grant.permission_item_name.clone(),
            ));
            fields.push((
                format!("permissions.{index}.permission_entity_id"),
                grant.permission_entity_id.to_string(),
            ));
        }

        for (index, entity) in self.entities.iter().enumerate() {
            fields.push((
                format!("entities.{index}.entity_id"),
                entity.entity_id.to_string(),
            ));
            fields.push((
                format!("entities.{index}.entity_name"),
                entity.entity_name.clone(),
            ));
        }

        if let Some(person_id) = self.person_id {
            fields.push(("person_id".to_string(), person_id.to_string()));
        }
        fields.push(("person_email".to_string(), self.person_email.clone()));

        fields
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Body of `POST validate/person/:id/email/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct EmailValidationRequest {
    pub person_email: String,
}

/// Interpret a remote validator answer.
///
/// `true` or `"true"` means valid; any other string is the message to show.
pub fn parse_validation_answer(answer: &serde_json::Value) -> Result<(), String> {
    match answer {
        serde_json::Value::Bool(true) => Ok(()),
        serde_json::Value::String(s) if s == "true" => Ok(()),
        serde_json::Value::String(s) => Err(s.clone()),
        other => Err(other.to_string()),
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Captcha challenge, `image` is a base64 encoded PNG
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct Captcha {
    pub uid: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct ResetPasswordRequest {
    pub person_email: String,
    pub captcha_text: String,
    pub captcha_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct TokenRequest {
    pub person_email: String,
    pub person_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/people.ts")]
pub struct PasswordUpdateRequest {
    pub person_password: String,
}

// ============================================================================
// Tests
// ============================================================================
