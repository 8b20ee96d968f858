//! Edit panel state machine.
//!
//! `Closed -> Loading -> Populated -> Saving -> {Closed | Populated}`.
//! [`reduce`] is pure: side effects are queued as [`Effect`]s and drained by
//! the caller.

use std::time::Duration;

use shared_types::{Entity, EntityId, EntityRef, Page, Person, PersonId};

use crate::api::EntityQuery;
use crate::config::ConsoleConfig;
use crate::effects::Effect;
use crate::entities::{EntityAssociation, EntityPicker};
use crate::fetcher::FetchedRecord;
use crate::notice::Notice;
use crate::permissions::{PermName, PermissionWidgetSet};
use crate::save::{
    build_save_request, validate_form, FieldError, PersonForm, SaveMode, SaveRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPhase {
    #[default]
    Closed,
    Loading,
    Populated,
    Saving,
}

/// Settings the panel needs from [`ConsoleConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSettings {
    pub page_size: u32,
    pub redirect_delay: Duration,
    pub listing_route: String,
}

impl From<&ConsoleConfig> for PanelSettings {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            page_size: config.page_size,
            redirect_delay: config.redirect_delay,
            listing_route: config.listing_route.clone(),
        }
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            redirect_delay: crate::config::DEFAULT_REDIRECT_DELAY,
            listing_route: crate::config::DEFAULT_LISTING_ROUTE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPanel {
    pub phase: PanelPhase,
    /// Bumped by every open; joins from older opens are dropped
    pub generation: u64,
    pub settings: PanelSettings,
    pub form: PersonForm,
    pub association: EntityAssociation,
    pub picker: EntityPicker,
    pub permissions: PermissionWidgetSet,
    pub field_errors: Vec<FieldError>,
    pub pending: Option<SaveRequest>,
    effects: Vec<Effect>,
}

impl Default for EditPanel {
    fn default() -> Self {
        Self::with_settings(PanelSettings::default(), PermissionWidgetSet::default())
    }
}

impl EditPanel {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self::with_settings(
            PanelSettings::from(config),
            PermissionWidgetSet::new(config.permission_catalog.clone()),
        )
    }

    fn with_settings(settings: PanelSettings, permissions: PermissionWidgetSet) -> Self {
        Self {
            phase: PanelPhase::Closed,
            generation: 0,
            picker: EntityPicker::new(settings.page_size),
            settings,
            form: PersonForm::default(),
            association: EntityAssociation::default(),
            permissions,
            field_errors: Vec::new(),
            pending: None,
            effects: Vec::new(),
        }
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn is_editable(&self) -> bool {
        self.phase == PanelPhase::Populated
    }

    fn reset_form(&mut self, form: PersonForm) {
        self.form = form;
        self.association = EntityAssociation::default();
        self.picker.reset();
        self.permissions.clear();
        self.field_errors.clear();
        self.pending = None;
    }

    fn notify(&mut self, notice: Notice) {
        self.effects.push(Effect::Notify(notice));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    OpenCreate,
    OpenEdit {
        person_id: PersonId,
        row_index: Option<usize>,
    },
    Joined(FetchedRecord),
    EmailEdited(String),
    EntitiesSearched {
        query: EntityQuery,
        result: Page<Entity>,
    },
    SelectEntity(EntityRef),
    UnselectEntity(EntityId),
    SetPermission {
        entity_id: EntityId,
        item: String,
        perm: PermName,
    },
    SubmitRequested,
    ValidationFailed(Vec<FieldError>),
    SaveSucceeded(Person),
    SaveFailed(Notice),
    /// Notice not tied to a phase change
    Notify(Notice),
    Close,
}

pub fn reduce(mut panel: EditPanel, action: PanelAction) -> EditPanel {
    match action {
        PanelAction::OpenCreate => {
            panel.generation += 1;
            panel.reset_form(PersonForm::create());
            panel.phase = PanelPhase::Populated;
        }
        PanelAction::OpenEdit {
            person_id,
            row_index,
        } => {
            panel.generation += 1;
            panel.reset_form(PersonForm::edit(person_id, row_index));
            panel.phase = PanelPhase::Loading;
        }
        PanelAction::Joined(record) => {
            if record.generation != panel.generation || panel.phase != PanelPhase::Loading {
                tracing::debug!(
                    person_id = record.person_id,
                    generation = record.generation,
                    current = panel.generation,
                    "Dropping stale record join"
                );
                return panel;
            }
            populate(&mut panel, record);
        }
        PanelAction::EmailEdited(email) => {
            if panel.is_editable() {
                panel.form.person_email = email.trim().to_string();
                panel.field_errors.retain(|e| e.field != "person_email");
            }
        }
        PanelAction::EntitiesSearched { query, result } => {
            panel.picker.merge(&query, result);
        }
        PanelAction::SelectEntity(entity) => {
            if panel.is_editable() {
                let entity_id = entity.entity_id;
                if panel.association.select(entity.clone()) {
                    let locked = panel.association.is_managed(entity_id);
                    panel.permissions.append(entity, locked);
                }
            }
        }
        PanelAction::UnselectEntity(entity_id) => {
            if panel.is_editable() {
                match panel.association.unselect(entity_id) {
                    Ok(_) => {
                        panel.permissions.remove(entity_id);
                    }
                    Err(veto) => panel.notify(veto),
                }
            }
        }
        PanelAction::SetPermission {
            entity_id,
            item,
            perm,
        } => {
            if panel.is_editable() {
                if let Err(e) = panel.permissions.set(entity_id, &item, perm) {
                    tracing::debug!(entity_id, item = %item, error = %e, "Permission change rejected");
                }
            }
        }
        PanelAction::SubmitRequested => {
            if !panel.is_editable() {
                return panel;
            }
            match validate_form(&panel.form) {
                Ok(()) => {
                    panel.field_errors.clear();
                    panel.pending = Some(build_save_request(
                        &panel.form,
                        &panel.association,
                        &panel.permissions,
                    ));
                    panel.phase = PanelPhase::Saving;
                }
                Err(errors) => panel.field_errors = errors,
            }
        }
        PanelAction::ValidationFailed(errors) => {
            if panel.phase == PanelPhase::Saving {
                panel.field_errors = errors;
                panel.pending = None;
                panel.phase = PanelPhase::Populated;
            }
        }
        PanelAction::SaveSucceeded(person) => {
            if panel.phase != PanelPhase::Saving {
                return panel;
            }
            let Some(request) = panel.pending.take() else {
                return panel;
            };
            let email = if person.person_email.is_empty() {
                request.payload.person_email.clone()
            } else {
                person.person_email.clone()
            };
            match request.mode {
                SaveMode::Create => {
                    panel.notify(Notice::success(format!("person {email} created")));
                    panel.effects.push(Effect::Redirect {
                        route: panel.settings.listing_route.clone(),
                        after: panel.settings.redirect_delay,
                    });
                }
                SaveMode::Update(_) => {
                    panel.notify(Notice::success(format!("person {email} updated")));
                    panel.effects.push(Effect::ShowList);
                }
            }
            panel.reset_form(PersonForm::default());
            panel.phase = PanelPhase::Closed;
        }
        PanelAction::SaveFailed(notice) => {
            if panel.phase == PanelPhase::Saving {
                panel.pending = None;
                panel.phase = PanelPhase::Populated;
            }
            panel.notify(notice);
        }
        PanelAction::Notify(notice) => panel.notify(notice),
        PanelAction::Close => {
            panel.reset_form(PersonForm::default());
            panel.phase = PanelPhase::Closed;
        }
    }
    panel
}

fn populate(panel: &mut EditPanel, record: FetchedRecord) {
    for notice in &record.notices {
        panel.notify(notice.clone());
    }
    if let Some(person) = &record.person {
        panel.form.person_email = person.person_email.clone();
    }

    let managed = record.managed_ids();
    panel.permissions.render(&record.entities, &managed);
    let hydrated = panel.permissions.hydrate(&record.permissions);
    panel.association = EntityAssociation::load(&record.entities, managed);
    panel.phase = PanelPhase::Populated;

    tracing::debug!(
        person_id = record.person_id,
        generation = record.generation,
        entities = record.entities.len(),
        hydrated,
        "Edit panel populated"
    );
}
