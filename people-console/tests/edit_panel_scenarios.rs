//! Edit panel workflows against an in-memory API

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tokio::sync::Semaphore;

use people_console::api::{EmailCheck, EntityQuery, PeopleQuery};
use people_console::console::SaveStatus;
use people_console::fetcher::{fetch_record, OpenTicket};
use people_console::notice::{Notice, NoticeLevel};
use people_console::{ApiError, ConsoleConfig, Effect, PanelPhase, PeopleApi, PeopleConsole};
use shared_types::{
    Entity, EntityId, EntityRef, Page, PermissionGrant, Person, PersonId, PersonPayload,
};

fn entity(id: EntityId, name: &str) -> Entity {
    Entity {
        entity_id: id,
        entity_name: name.to_string(),
        entity_description: None,
    }
}

fn forbidden() -> ApiError {
    ApiError::Status {
        status: 403,
        status_text: "Forbidden".to_string(),
        body: String::new(),
    }
}

#[derive(Default)]
struct FakeApi {
    people: HashMap<PersonId, Person>,
    managed: HashMap<PersonId, Vec<Entity>>,
    owned: HashMap<PersonId, Vec<Entity>>,
    grants: HashMap<PersonId, Vec<PermissionGrant>>,
    failing_reads: HashSet<&'static str>,
    /// get_person waits on this gate for the given person
    gate: Option<(PersonId, Arc<Semaphore>)>,
    writes: Mutex<Vec<(&'static str, PersonPayload)>>,
}

impl FakeApi {
    fn scenario_42() -> Self {
        let mut api = FakeApi::default();
        api.people.insert(
            42,
            Person {
                person_id: 42,
                person_email: "jane@lab.org".to_string(),
                entities: Vec::new(),
            },
        );
        api.managed.insert(42, vec![entity(7, "chemistry")]);
        api.owned
            .insert(42, vec![entity(7, "chemistry"), entity(9, "physics")]);
        api.grants
            .insert(42, vec![PermissionGrant::new(9, "read", "doc")]);
        api
    }

    fn read<T: Clone + Default>(
        &self,
        what: &'static str,
        map: &HashMap<PersonId, T>,
        id: PersonId,
    ) -> Result<T, ApiError> {
        if self.failing_reads.contains(what) {
            return Err(forbidden());
        }
        Ok(map.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PeopleApi for FakeApi {
    async fn search_entities(&self, query: &EntityQuery) -> Result<Page<Entity>, ApiError> {
        let rows = (0..query.limit)
            .map(|i| entity(100 + query.offset as i64 + i as i64, "lab"))
            .collect();
        Ok(Page { rows, total: 15 })
    }

    async fn list_people(&self, _query: &PeopleQuery) -> Result<Page<Person>, ApiError> {
        Ok(Page {
            rows: self.people.values().cloned().collect(),
            total: self.people.len() as u64,
        })
    }

    async fn get_person(&self, person_id: PersonId) -> Result<Person, ApiError> {
        if let Some((gated, gate)) = &self.gate {
            if *gated == person_id {
                let _permit = gate.acquire().await;
            }
        }
        if self.failing_reads.contains("person") {
            return Err(forbidden());
        }
        self.people
            .get(&person_id)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                status_text: "Not Found".to_string(),
                body: String::new(),
            })
    }

    async fn get_managed_entities(&self, person_id: PersonId) -> Result<Vec<Entity>, ApiError> {
        self.read("manageentities", &self.managed, person_id)
    }

    async fn get_person_entities(&self, person_id: PersonId) -> Result<Vec<Entity>, ApiError> {
        self.read("entities", &self.owned, person_id)
    }

    async fn get_person_permissions(
        &self,
        person_id: PersonId,
    ) -> Result<Vec<PermissionGrant>, ApiError> {
        self.read("permissions", &self.grants, person_id)
    }

    async fn create_person(&self, payload: &PersonPayload) -> Result<Person, ApiError> {
        self.writes
            .lock()
            .unwrap()
            .push(("POST people", payload.clone()));
        Ok(Person {
            person_id: 51,
            person_email: payload.person_email.clone(),
            entities: Vec::new(),
        })
    }

    async fn update_person(
        &self,
        person_id: PersonId,
        payload: &PersonPayload,
    ) -> Result<Person, ApiError> {
        self.writes
            .lock()
            .unwrap()
            .push(("PUT people/:id", payload.clone()));
        Ok(Person {
            person_id,
            person_email: payload.person_email.clone(),
            entities: Vec::new(),
        })
    }

    async fn delete_person(&self, _person_id: PersonId) -> Result<(), ApiError> {
        Ok(())
    }

    async fn validate_person_email(
        &self,
        _person_id: Option<PersonId>,
        _email: &str,
    ) -> Result<EmailCheck, ApiError> {
        Ok(EmailCheck::Available)
    }

    async fn has_permission(
        &self,
        _item: &str,
        _item_id: i64,
        _method: &Method,
    ) -> Result<bool, ApiError> {
        Ok(true)
    }
}

fn config() -> ConsoleConfig {
    let mut config = ConsoleConfig::with_base_url("http://localhost:8081/").unwrap();
    config
        .permission_catalog
        .entity_items
        .push("doc".to_string());
    config
}

#[tokio::test]
async fn test_scenario_managed_entity_is_locked() {
    let console = PeopleConsole::new(Arc::new(FakeApi::scenario_42()), config());
    assert_eq!(console.open_edit(42, None).await, PanelPhase::Populated);

    let view = console.panel_view().await;
    let chemistry = view.group(7).unwrap();
    assert!(chemistry.locked);
    assert!(chemistry
        .items
        .iter()
        .flat_map(|i| &i.choices)
        .all(|c| c.disabled && !c.checked));

    let physics = view.group(9).unwrap();
    assert!(!physics.locked);
    assert_eq!(view.checked(9, "doc"), Some("r"));
    assert_eq!(view.person_email, "jane@lab.org");
}

#[tokio::test]
async fn test_scenario_unselecting_managed_entity_is_cancelled() {
    let console = PeopleConsole::new(Arc::new(FakeApi::scenario_42()), config());
    console.open_edit(42, None).await;
    console.drain_effects().await;
    let before = console.panel_snapshot().await;

    console.unselect_entity(7).await;

    let effects = console.drain_effects().await;
    assert_eq!(
        effects,
        vec![Effect::Notify(Notice::new(
            "this entity can not be removed, the user is one of its manager",
            NoticeLevel::Success
        ))]
    );
    let after = console.panel_snapshot().await;
    assert_eq!(after, before);
    assert!(console.panel_view().await.group(7).is_some());
}

#[tokio::test]
async fn test_scenario_create_redirects_to_listing() {
    let api = Arc::new(FakeApi::default());
    let console = PeopleConsole::new(api.clone(), config());

    assert_eq!(console.open_create().await, PanelPhase::Populated);
    console.edit_email("a@b.com").await;
    assert!(matches!(console.save().await, SaveStatus::Created(_)));

    let writes = api.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "POST people");
    assert_eq!(writes[0].1.person_id, None);

    assert_eq!(
        console.drain_effects().await,
        vec![
            Effect::Notify(Notice::success("person a@b.com created")),
            Effect::Redirect {
                route: "v/people".to_string(),
                after: Duration::from_millis(1000),
            },
        ]
    );
    assert_eq!(console.panel_snapshot().await.phase, PanelPhase::Closed);
}

#[tokio::test]
async fn test_update_uses_put_and_closes_panel() {
    let api = Arc::new(FakeApi::scenario_42());
    let console = PeopleConsole::new(api.clone(), config());
    console.open_edit(42, None).await;

    assert!(matches!(console.save().await, SaveStatus::Updated(_)));
    let writes = api.writes.lock().unwrap().clone();
    assert_eq!(writes[0].0, "PUT people/:id");
    assert_eq!(writes[0].1.person_id, Some(42));
    assert_eq!(
        writes[0].1.permissions,
        vec![PermissionGrant::new(9, "r", "doc")]
    );
    assert_eq!(console.panel_snapshot().await.phase, PanelPhase::Closed);
}

#[tokio::test]
async fn test_one_failed_read_joins_once_with_defaults() {
    for failing in ["person", "manageentities", "entities", "permissions"] {
        let mut api = FakeApi::scenario_42();
        api.failing_reads.insert(failing);

        let record = fetch_record(
            &api,
            OpenTicket {
                generation: 3,
                person_id: 42,
            },
        )
        .await;

        assert_eq!(record.generation, 3);
        assert_eq!(record.notices.len(), 1, "failing read: {failing}");
        assert_eq!(record.notices[0].level, NoticeLevel::Danger);
        match failing {
            "person" => assert!(record.person.is_none()),
            "manageentities" => assert!(record.managed.is_empty()),
            "entities" => assert!(record.entities.is_empty()),
            _ => assert!(record.permissions.is_empty()),
        }
    }
}

#[tokio::test]
async fn test_failed_read_still_opens_panel() {
    let mut api = FakeApi::scenario_42();
    api.failing_reads.insert("manageentities");
    let console = PeopleConsole::new(Arc::new(api), config());

    assert_eq!(console.open_edit(42, None).await, PanelPhase::Populated);
    let panel = console.panel_snapshot().await;
    assert_eq!(panel.permissions.editable_entity_ids(), vec![7, 9]);
    assert_eq!(console.drain_effects().await.len(), 1);
}

#[tokio::test]
async fn test_stale_join_does_not_overwrite_newer_open() {
    let gate = Arc::new(Semaphore::new(0));
    let mut api = FakeApi::scenario_42();
    api.people.insert(
        43,
        Person {
            person_id: 43,
            person_email: "john@lab.org".to_string(),
            entities: Vec::new(),
        },
    );
    api.owned.insert(43, vec![entity(4, "biology")]);
    api.gate = Some((42, gate.clone()));

    let console = Arc::new(PeopleConsole::new(Arc::new(api), config()));
    let first = tokio::spawn({
        let console = console.clone();
        async move { console.open_edit(42, None).await }
    });
    while console.panel_snapshot().await.generation < 1 {
        tokio::task::yield_now().await;
    }

    assert_eq!(console.open_edit(43, None).await, PanelPhase::Populated);
    gate.add_permits(1);
    first.await.unwrap();

    let panel = console.panel_snapshot().await;
    assert_eq!(panel.generation, 2);
    assert_eq!(panel.form.person_id, Some(43));
    assert_eq!(panel.form.person_email, "john@lab.org");
    assert_eq!(panel.association.selected_ids(), vec![4]);
    assert_eq!(panel.permissions.editable_entity_ids(), vec![4]);
}

#[tokio::test]
async fn test_editable_groups_track_selection_minus_managed() {
    let console = PeopleConsole::new(Arc::new(FakeApi::scenario_42()), config());
    console.open_edit(42, None).await;

    let candidates: Vec<EntityId> = vec![7, 9, 11, 12, 13];
    // fixed LCG so the action sequence is reproducible
    let mut seed: u64 = 0x2545_f491;
    for _ in 0..200 {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let id = candidates[(seed >> 33) as usize % candidates.len()];
        if (seed >> 17) & 1 == 0 {
            console
                .select_entity(EntityRef {
                    entity_id: id,
                    entity_name: format!("entity {id}"),
                })
                .await;
        } else {
            console.unselect_entity(id).await;
        }

        let panel = console.panel_snapshot().await;
        let mut expected: Vec<EntityId> = panel
            .association
            .selected_ids()
            .into_iter()
            .filter(|id| !panel.association.is_managed(*id))
            .collect();
        let mut editable = panel.permissions.editable_entity_ids();
        expected.sort_unstable();
        editable.sort_unstable();
        assert_eq!(editable, expected);
        assert!(panel.association.selected_ids().contains(&7));
    }
}

#[tokio::test]
async fn test_entity_search_pages_accumulate() {
    let console = PeopleConsole::new(Arc::new(FakeApi::default()), config());
    console.open_create().await;

    assert_eq!(console.search_entities(Some("lab"), None).await, 10);
    let view = console.panel_view().await;
    assert_eq!(view.options.len(), 10);
    assert!(view.more_options);

    console.search_entities(Some("lab"), Some(2)).await;
    let view = console.panel_view().await;
    assert_eq!(view.options.len(), 20);
    assert!(!view.more_options);
}
