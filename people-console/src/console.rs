//! Console orchestration: owns the panel, table and capability cache, and runs
//! the network side of every panel action.

use std::sync::Arc;

use reqwest::Method;
use shared_types::{EntityId, EntityRef, Person, PersonId};
use tokio::sync::Mutex;

use crate::api::{PeopleApi, PeopleQuery};
use crate::capabilities::{probe_rows, CapabilityCache, RowActions};
use crate::config::ConsoleConfig;
use crate::effects::Effect;
use crate::fetcher::{fetch_record, OpenTicket};
use crate::notice::{notice_for_api_error, Notice};
use crate::panel::{reduce, EditPanel, PanelAction, PanelPhase};
use crate::permissions::PermName;
use crate::save::{check_email, submit, FieldError, SaveError, SaveMode};
use crate::table::PeopleTable;
use crate::view::{project, PanelView};

/// Result of a submit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    /// Panel was not in an editable state
    Ignored,
    Invalid(Vec<FieldError>),
    Created(Person),
    Updated(Person),
    Failed(Notice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub person: Person,
    pub actions: RowActions,
}

pub struct PeopleConsole<A: PeopleApi + ?Sized> {
    api: Arc<A>,
    config: ConsoleConfig,
    // Locks are held while reducing, never across a request.
    panel: Mutex<EditPanel>,
    table: Mutex<PeopleTable>,
    capabilities: Mutex<CapabilityCache>,
}

impl<A: PeopleApi + ?Sized> PeopleConsole<A> {
    pub fn new(api: Arc<A>, config: ConsoleConfig) -> Self {
        let query = PeopleQuery {
            limit: u64::from(config.page_size),
            ..PeopleQuery::default()
        };
        Self {
            api,
            panel: Mutex::new(EditPanel::new(&config)),
            table: Mutex::new(PeopleTable::new(query)),
            capabilities: Mutex::new(CapabilityCache::default()),
            config,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub async fn dispatch(&self, action: PanelAction) -> PanelPhase {
        let mut panel = self.panel.lock().await;
        let current = std::mem::take(&mut *panel);
        *panel = reduce(current, action);
        panel.phase
    }

    async fn notify(&self, notice: Notice) {
        self.dispatch(PanelAction::Notify(notice)).await;
    }

    // ========================================================================
    // Edit panel
    // ========================================================================

    pub async fn open_create(&self) -> PanelPhase {
        tracing::info!("Opening create panel");
        self.dispatch(PanelAction::OpenCreate).await
    }

    /// Start loading a person; the join is applied only if no newer open
    /// happened meanwhile.
    pub async fn open_edit(&self, person_id: PersonId, row_index: Option<usize>) -> PanelPhase {
        let ticket = {
            let mut panel = self.panel.lock().await;
            let current = std::mem::take(&mut *panel);
            *panel = reduce(
                current,
                PanelAction::OpenEdit {
                    person_id,
                    row_index,
                },
            );
            OpenTicket {
                generation: panel.generation,
                person_id,
            }
        };
        tracing::info!(
            person_id,
            generation = ticket.generation,
            "Opening edit panel"
        );

        let record = fetch_record(self.api.as_ref(), ticket).await;
        self.dispatch(PanelAction::Joined(record)).await
    }

    pub async fn close(&self) -> PanelPhase {
        self.dispatch(PanelAction::Close).await
    }

    pub async fn edit_email(&self, email: &str) {
        self.dispatch(PanelAction::EmailEdited(email.to_string()))
            .await;
    }

    /// Typeahead request; a failure is reported as a notice.
    pub async fn search_entities(&self, search: Option<&str>, page: Option<u32>) -> usize {
        let query = self.panel.lock().await.picker.query_for(search, page);
        match self.api.search_entities(&query).await {
            Ok(result) => {
                let fetched = result.rows.len();
                self.dispatch(PanelAction::EntitiesSearched { query, result })
                    .await;
                fetched
            }
            Err(e) => {
                tracing::error!(error = %e, "Entity search failed");
                self.notify(notice_for_api_error(&e)).await;
                0
            }
        }
    }

    pub async fn select_entity(&self, entity: EntityRef) {
        self.dispatch(PanelAction::SelectEntity(entity)).await;
    }

    pub async fn unselect_entity(&self, entity_id: EntityId) {
        self.dispatch(PanelAction::UnselectEntity(entity_id)).await;
    }

    pub async fn set_permission(&self, entity_id: EntityId, item: &str, perm: PermName) {
        self.dispatch(PanelAction::SetPermission {
            entity_id,
            item: item.to_string(),
            perm,
        })
        .await;
    }

    /// Validate locally, then remotely, then write.
    pub async fn save(&self) -> SaveStatus {
        let request = {
            let mut panel = self.panel.lock().await;
            let current = std::mem::take(&mut *panel);
            *panel = reduce(current, PanelAction::SubmitRequested);
            match (&panel.phase, &panel.pending) {
                (PanelPhase::Saving, Some(request)) => request.clone(),
                (PanelPhase::Populated, _) => {
                    return SaveStatus::Invalid(panel.field_errors.clone());
                }
                _ => return SaveStatus::Ignored,
            }
        };

        let outcome = match check_email(self.api.as_ref(), &request).await {
            Ok(()) => submit(self.api.as_ref(), &request).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(person) => {
                if let (SaveMode::Update(_), Some(index)) = (request.mode, request.row_index) {
                    self.table
                        .lock()
                        .await
                        .update_row(index, &person.person_email);
                }
                self.dispatch(PanelAction::SaveSucceeded(person.clone()))
                    .await;
                match request.mode {
                    SaveMode::Create => SaveStatus::Created(person),
                    SaveMode::Update(_) => SaveStatus::Updated(person),
                }
            }
            Err(SaveError::Invalid(errors)) => {
                tracing::debug!(?errors, "Remote validation rejected the form");
                self.dispatch(PanelAction::ValidationFailed(errors.clone()))
                    .await;
                SaveStatus::Invalid(errors)
            }
            Err(SaveError::Api(e)) => {
                tracing::error!(error = %e, mode = ?request.mode, "Save failed");
                let notice = notice_for_api_error(&e);
                self.dispatch(PanelAction::SaveFailed(notice.clone())).await;
                SaveStatus::Failed(notice)
            }
        }
    }

    pub async fn drain_effects(&self) -> Vec<Effect> {
        self.panel.lock().await.drain_effects()
    }

    pub async fn panel_view(&self) -> PanelView {
        project(&*self.panel.lock().await)
    }

    pub async fn panel_snapshot(&self) -> EditPanel {
        self.panel.lock().await.clone()
    }

    // ========================================================================
    // People table
    // ========================================================================

    /// Load a table page and refresh the row capabilities.
    pub async fn load_table(&self, query: PeopleQuery) -> Result<usize, Notice> {
        let page = match self.api.list_people(&query).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load people");
                let notice = notice_for_api_error(&e);
                self.notify(notice.clone()).await;
                return Err(notice);
            }
        };
        let ids: Vec<PersonId> = page.rows.iter().map(|p| p.person_id).collect();
        let total = page.total;
        self.table.lock().await.apply_page(query, page);

        let probed = probe_rows(self.api.as_ref(), &ids).await;
        let mut capabilities = self.capabilities.lock().await;
        capabilities.retain_rows(&ids);
        for (id, method, allowed) in probed {
            capabilities.set(crate::capabilities::PEOPLE_ITEM, id, &method, allowed);
        }
        tracing::debug!(rows = ids.len(), total, "People table loaded");
        Ok(ids.len())
    }

    pub async fn reload_table(&self) -> Result<usize, Notice> {
        let query = self.table.lock().await.query.clone();
        self.load_table(query).await
    }

    pub async fn rows(&self) -> Vec<RowView> {
        let table = self.table.lock().await;
        let capabilities = self.capabilities.lock().await;
        table
            .rows
            .iter()
            .map(|person| RowView {
                person: person.clone(),
                actions: capabilities.row_actions(person.person_id),
            })
            .collect()
    }

    pub async fn table(&self) -> PeopleTable {
        self.table.lock().await.clone()
    }

    /// Delete after the operator confirmed; refreshes the table on success.
    pub async fn delete_person(&self, person_id: PersonId) -> Result<(), Notice> {
        if let Err(e) = self.api.delete_person(person_id).await {
            tracing::error!(person_id, error = %e, "Failed to delete person");
            let notice = notice_for_api_error(&e);
            self.notify(notice.clone()).await;
            return Err(notice);
        }
        tracing::info!(person_id, "Person deleted");
        {
            let mut capabilities = self.capabilities.lock().await;
            for method in crate::capabilities::row_methods() {
                capabilities.set(crate::capabilities::PEOPLE_ITEM, person_id, &method, false);
            }
        }
        self.notify(Notice::success("person deleted")).await;
        self.reload_table().await.map(|_| ())
    }

    pub async fn can(&self, person_id: PersonId, method: &Method) -> bool {
        self.capabilities
            .lock()
            .await
            .get(crate::capabilities::PEOPLE_ITEM, person_id, method)
            .unwrap_or(false)
    }
}
