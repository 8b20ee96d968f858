//! Four concurrent reads that populate one edit form.

use shared_types::{Entity, PermissionGrant, Person, PersonId};

use crate::api::PeopleApi;
use crate::error::ApiError;
use crate::notice::{notice_for_api_error, Notice};
use crate::permissions::ManagedIds;

/// Identifies one edit-open action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenTicket {
    pub generation: u64,
    pub person_id: PersonId,
}

/// Joined result of the four reads. Failed reads are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRecord {
    pub generation: u64,
    pub person_id: PersonId,
    pub person: Option<Person>,
    pub managed: Vec<Entity>,
    pub entities: Vec<Entity>,
    pub permissions: Vec<PermissionGrant>,
    /// One notice per failed read
    pub notices: Vec<Notice>,
}

impl FetchedRecord {
    pub fn managed_ids(&self) -> ManagedIds {
        ManagedIds::from_entities(&self.managed)
    }
}

fn settle<T>(
    what: &str,
    person_id: PersonId,
    result: Result<T, ApiError>,
    notices: &mut Vec<Notice>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(person_id, read = what, error = %err, "Record read failed");
            notices.push(notice_for_api_error(&err));
            None
        }
    }
}

/// Issue the reads concurrently and wait for all of them to settle.
pub async fn fetch_record<A: PeopleApi + ?Sized>(api: &A, ticket: OpenTicket) -> FetchedRecord {
    let id = ticket.person_id;
    tracing::debug!(
        person_id = id,
        generation = ticket.generation,
        "Fetching record"
    );

    let (person, managed, entities, permissions) = futures::join!(
        api.get_person(id),
        api.get_managed_entities(id),
        api.get_person_entities(id),
        api.get_person_permissions(id),
    );

    let mut notices = Vec::new();
    let person = settle("person", id, person, &mut notices);
    let managed = settle("manageentities", id, managed, &mut notices).unwrap_or_default();
    let entities = settle("entities", id, entities, &mut notices).unwrap_or_default();
    let permissions = settle("permissions", id, permissions, &mut notices).unwrap_or_default();

    FetchedRecord {
        generation: ticket.generation,
        person_id: id,
        person,
        managed,
        entities,
        permissions,
        notices,
    }
}
