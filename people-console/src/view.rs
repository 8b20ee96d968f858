//! Read-only projection of the edit panel for renderers.

use serde::Serialize;
use shared_types::{EntityId, EntityRef, PersonId};

use crate::panel::{EditPanel, PanelPhase};
use crate::permissions::{PermName, PermissionCatalog, PermissionGroup};
use crate::save::FieldError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceView {
    pub perm: &'static str,
    pub checked: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub item: String,
    pub choices: Vec<ChoiceView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub locked: bool,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedEntityView {
    pub entity_id: EntityId,
    pub entity_name: String,
    /// False for managed entities
    pub removable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub phase: PanelPhase,
    pub visible: bool,
    pub person_id: Option<PersonId>,
    pub person_email: String,
    pub field_errors: Vec<FieldError>,
    pub selected: Vec<SelectedEntityView>,
    pub options: Vec<EntityRef>,
    pub more_options: bool,
    pub global: GroupView,
    pub groups: Vec<GroupView>,
}

impl PanelView {
    pub fn group(&self, entity_id: EntityId) -> Option<&GroupView> {
        self.groups.iter().find(|g| g.entity_id == entity_id)
    }

    pub fn checked(&self, entity_id: EntityId, item: &str) -> Option<&'static str> {
        let group = if entity_id == self.global.entity_id {
            &self.global
        } else {
            self.group(entity_id)?
        };
        group
            .items
            .iter()
            .find(|i| i.item == item)?
            .choices
            .iter()
            .find(|c| c.checked)
            .map(|c| c.perm)
    }
}

fn group_view(group: &PermissionGroup, catalog: &PermissionCatalog, read_only: bool) -> GroupView {
    let locked = group.is_locked();
    GroupView {
        entity_id: group.entity_id(),
        entity_name: group.entity.entity_name.clone(),
        locked,
        items: group
            .items
            .iter()
            .map(|selection| {
                // a hydrated level outside the offered choices is still shown
                let mut choices: Vec<PermName> = catalog.choices.clone();
                if let Some(perm) = selection.perm {
                    if !choices.contains(&perm) {
                        choices.push(perm);
                    }
                }
                ItemView {
                    item: selection.item.clone(),
                    choices: choices
                        .into_iter()
                        .map(|perm| ChoiceView {
                            perm: perm.as_str(),
                            checked: selection.perm == Some(perm),
                            disabled: locked || read_only,
                        })
                        .collect(),
                }
            })
            .collect(),
    }
}

pub fn project(panel: &EditPanel) -> PanelView {
    let read_only = panel.phase != PanelPhase::Populated;
    let catalog = panel.permissions.catalog();

    PanelView {
        phase: panel.phase,
        visible: panel.phase != PanelPhase::Closed,
        person_id: panel.form.person_id,
        person_email: panel.form.person_email.clone(),
        field_errors: panel.field_errors.clone(),
        selected: panel
            .association
            .selected()
            .iter()
            .map(|e| SelectedEntityView {
                entity_id: e.entity_id,
                entity_name: e.entity_name.clone(),
                removable: !panel.association.is_managed(e.entity_id),
            })
            .collect(),
        options: panel.picker.options.clone(),
        more_options: panel.picker.more,
        global: group_view(panel.permissions.global(), catalog, read_only),
        groups: panel
            .permissions
            .groups()
            .iter()
            .map(|g| group_view(g, catalog, read_only))
            .collect(),
    }
}
