//! Per-entity permission widgets.
//!
//! One group per associated entity. Groups of entities the person manages are
//! locked: they are shown but cannot be edited. A global group (entity `-1`)
//! holds the permissions that apply to every entity.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use shared_types::{Entity, EntityId, EntityRef, PermissionGrant, GLOBAL_ENTITY_ID};

/// Permission level of one item, `n` / `r` / `w` / `all` on the wire.
///
/// Older grants may spell the level out (`read`, `write`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermName {
    None,
    Read,
    Write,
    All,
}

impl PermName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermName::None => "n",
            PermName::Read => "r",
            PermName::Write => "w",
            PermName::All => "all",
        }
    }
}

impl fmt::Display for PermName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermName {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" | "none" => Ok(PermName::None),
            "r" | "read" => Ok(PermName::Read),
            "w" | "write" => Ok(PermName::Write),
            "all" => Ok(PermName::All),
            other => Err(PermissionError::UnknownChoice(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("permissions of entity {0} are locked, the person manages it")]
    Locked(EntityId),

    #[error("no permission group for entity {0}")]
    UnknownGroup(EntityId),

    #[error("unknown permission item: {0}")]
    UnknownItem(String),

    #[error("unknown permission: {0}")]
    UnknownChoice(String),
}

/// Items and levels offered by the widgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCatalog {
    /// Items of each per-entity group
    pub entity_items: Vec<String>,
    /// Items of the global group
    pub global_items: Vec<String>,
    /// Levels the operator can pick
    pub choices: Vec<PermName>,
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self {
            entity_items: ["storages", "storelocations", "people"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            global_items: ["products", "rproducts"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            choices: vec![PermName::None, PermName::Read, PermName::Write],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    Editable,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSelection {
    pub item: String,
    pub perm: Option<PermName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGroup {
    pub entity: EntityRef,
    pub mode: GroupMode,
    pub items: Vec<ItemSelection>,
}

impl PermissionGroup {
    fn new(entity: EntityRef, mode: GroupMode, items: &[String]) -> Self {
        Self {
            entity,
            mode,
            items: items
                .iter()
                .map(|item| ItemSelection {
                    item: item.clone(),
                    perm: None,
                })
                .collect(),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity.entity_id
    }

    pub fn is_locked(&self) -> bool {
        self.mode == GroupMode::Locked
    }

    pub fn selection(&self, item: &str) -> Option<PermName> {
        self.items
            .iter()
            .find(|s| s.item == item)
            .and_then(|s| s.perm)
    }

    fn select(&mut self, item: &str, perm: PermName) -> Result<(), PermissionError> {
        let slot = self
            .items
            .iter_mut()
            .find(|s| s.item == item)
            .ok_or_else(|| PermissionError::UnknownItem(item.to_string()))?;
        slot.perm = Some(perm);
        Ok(())
    }

    fn checked(&self) -> impl Iterator<Item = PermissionGrant> + '_ {
        self.items.iter().filter_map(move |s| {
            s.perm
                .map(|perm| PermissionGrant::new(self.entity.entity_id, perm.as_str(), &s.item))
        })
    }
}

/// Ids of the entities a person manages, projected once for membership checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedIds(HashSet<EntityId>);

impl ManagedIds {
    pub fn from_entities(entities: &[Entity]) -> Self {
        Self(entities.iter().map(|e| e.entity_id).collect())
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.0.contains(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<EntityId> for ManagedIds {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionWidgetSet {
    catalog: PermissionCatalog,
    global: PermissionGroup,
    groups: Vec<PermissionGroup>,
}

impl Default for PermissionWidgetSet {
    fn default() -> Self {
        Self::new(PermissionCatalog::default())
    }
}

impl PermissionWidgetSet {
    pub fn new(catalog: PermissionCatalog) -> Self {
        let global = Self::global_group(&catalog);
        Self {
            catalog,
            global,
            groups: Vec::new(),
        }
    }

    fn global_group(catalog: &PermissionCatalog) -> PermissionGroup {
        PermissionGroup::new(
            EntityRef {
                entity_id: GLOBAL_ENTITY_ID,
                entity_name: String::new(),
            },
            GroupMode::Editable,
            &catalog.global_items,
        )
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn global(&self) -> &PermissionGroup {
        &self.global
    }

    pub fn groups(&self) -> &[PermissionGroup] {
        &self.groups
    }

    pub fn group(&self, entity_id: EntityId) -> Option<&PermissionGroup> {
        if entity_id == GLOBAL_ENTITY_ID {
            return Some(&self.global);
        }
        self.groups.iter().find(|g| g.entity_id() == entity_id)
    }

    fn group_mut(&mut self, entity_id: EntityId) -> Option<&mut PermissionGroup> {
        if entity_id == GLOBAL_ENTITY_ID {
            return Some(&mut self.global);
        }
        self.groups.iter_mut().find(|g| g.entity_id() == entity_id)
    }

    /// Drop every group and clear the global selections.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.global = Self::global_group(&self.catalog);
    }

    /// Rebuild one group per owned entity; calling it twice with the same
    /// inputs yields the same widgets.
    pub fn render(&mut self, owned: &[Entity], managed: &ManagedIds) {
        self.clear();
        for entity in owned {
            self.append(EntityRef::from(entity), managed.contains(entity.entity_id));
        }
    }

    /// Add a group for a newly associated entity. No-op if one already exists.
    pub fn append(&mut self, entity: EntityRef, locked: bool) {
        if entity.entity_id == GLOBAL_ENTITY_ID || self.group(entity.entity_id).is_some() {
            return;
        }
        let mode = if locked {
            GroupMode::Locked
        } else {
            GroupMode::Editable
        };
        self.groups.push(PermissionGroup::new(
            entity,
            mode,
            &self.catalog.entity_items,
        ));
    }

    pub fn remove(&mut self, entity_id: EntityId) -> Option<PermissionGroup> {
        let index = self
            .groups
            .iter()
            .position(|g| g.entity_id() == entity_id)?;
        Some(self.groups.remove(index))
    }

    /// Mark the selections matching previously granted permissions.
    ///
    /// Grants for entities without a group, unknown items or unknown levels are
    /// skipped. Locked groups are hydrated too so they show what the person holds.
    pub fn hydrate(&mut self, grants: &[PermissionGrant]) -> usize {
        let mut applied = 0;
        for grant in grants {
            let Ok(perm) = grant.permission_perm_name.parse::<PermName>() else {
                tracing::debug!(perm = %grant.permission_perm_name, "Skipping unknown permission");
                continue;
            };
            let Some(group) = self.group_mut(grant.permission_entity_id) else {
                continue;
            };
            if group.select(&grant.permission_item_name, perm).is_ok() {
                applied += 1;
            }
        }
        applied
    }

    /// Operator picks a level for one item of one entity.
    pub fn set(
        &mut self,
        entity_id: EntityId,
        item: &str,
        perm: PermName,
    ) -> Result<(), PermissionError> {
        if !self.catalog.choices.contains(&perm) {
            return Err(PermissionError::UnknownChoice(perm.to_string()));
        }
        let group = self
            .group_mut(entity_id)
            .ok_or(PermissionError::UnknownGroup(entity_id))?;
        if group.is_locked() {
            return Err(PermissionError::Locked(entity_id));
        }
        group.select(item, perm)
    }

    /// Every selected (entity, item, level): global group first, then groups
    /// in render order, items in catalog order.
    pub fn checked(&self) -> Vec<PermissionGrant> {
        std::iter::once(&self.global)
            .chain(self.groups.iter())
            .flat_map(PermissionGroup::checked)
            .collect()
    }

    pub fn editable_entity_ids(&self) -> Vec<EntityId> {
        self.groups
            .iter()
            .filter(|g| !g.is_locked())
            .map(PermissionGroup::entity_id)
            .collect()
    }

    pub fn locked_entity_ids(&self) -> Vec<EntityId> {
        self.groups
            .iter()
            .filter(|g| g.is_locked())
            .map(PermissionGroup::entity_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: EntityId, name: &str) -> Entity {
        Entity {
            entity_id: id,
            entity_name: name.to_string(),
            entity_description: None,
        }
    }

    fn catalog() -> PermissionCatalog {
        PermissionCatalog {
            entity_items: vec!["doc".to_string(), "storages".to_string()],
            global_items: vec!["products".to_string()],
            choices: vec![PermName::None, PermName::Read, PermName::Write],
        }
    }

    #[test]
    fn test_render_marks_managed_groups_locked() {
        let mut set = PermissionWidgetSet::new(catalog());
        let managed: ManagedIds = [7].into_iter().collect();
        set.render(&[entity(7, "chemistry"), entity(9, "physics")], &managed);

        assert_eq!(set.locked_entity_ids(), vec![7]);
        assert_eq!(set.editable_entity_ids(), vec![9]);
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut set = PermissionWidgetSet::new(catalog());
        let owned = [entity(7, "chemistry"), entity(9, "physics")];
        let managed: ManagedIds = [7].into_iter().collect();
        let grants = [PermissionGrant::new(9, "r", "doc")];

        set.render(&owned, &managed);
        set.hydrate(&grants);
        let first = set.clone();

        set.set(9, "storages", PermName::Write).unwrap();
        set.render(&owned, &managed);
        set.hydrate(&grants);

        assert_eq!(set, first);
    }

    #[test]
    fn test_hydrate_skips_unknown_targets() {
        let mut set = PermissionWidgetSet::new(catalog());
        set.render(&[entity(9, "physics")], &ManagedIds::default());
        let applied = set.hydrate(&[
            PermissionGrant::new(9, "r", "doc"),
            PermissionGrant::new(9, "r", "unknown-item"),
            PermissionGrant::new(12, "w", "doc"),
            PermissionGrant::new(9, "x", "storages"),
            PermissionGrant::new(GLOBAL_ENTITY_ID, "w", "products"),
        ]);

        assert_eq!(applied, 2);
        assert_eq!(set.group(9).unwrap().selection("doc"), Some(PermName::Read));
        assert_eq!(set.group(9).unwrap().selection("storages"), None);
        assert_eq!(set.global().selection("products"), Some(PermName::Write));
    }

    #[test]
    fn test_locked_group_rejects_edits() {
        let mut set = PermissionWidgetSet::new(catalog());
        let managed: ManagedIds = [7].into_iter().collect();
        set.render(&[entity(7, "chemistry")], &managed);

        assert_eq!(
            set.set(7, "doc", PermName::Write),
            Err(PermissionError::Locked(7))
        );
        assert_eq!(set.group(7).unwrap().selection("doc"), None);
    }

    #[test]
    fn test_set_replaces_item_selection() {
        let mut set = PermissionWidgetSet::new(catalog());
        set.append(
            EntityRef {
                entity_id: 9,
                entity_name: "physics".to_string(),
            },
            false,
        );
        set.set(9, "doc", PermName::Read).unwrap();
        set.set(9, "doc", PermName::Write).unwrap();

        assert_eq!(set.checked(), vec![PermissionGrant::new(9, "w", "doc")]);
        assert_eq!(
            set.set(9, "doc", PermName::All),
            Err(PermissionError::UnknownChoice("all".to_string()))
        );
        assert_eq!(
            set.set(3, "doc", PermName::Read),
            Err(PermissionError::UnknownGroup(3))
        );
        assert_eq!(
            set.set(9, "nope", PermName::Read),
            Err(PermissionError::UnknownItem("nope".to_string()))
        );
    }

    #[test]
    fn test_checked_order() {
        let mut set = PermissionWidgetSet::new(catalog());
        set.render(
            &[entity(9, "physics"), entity(4, "biology")],
            &ManagedIds::default(),
        );
        set.set(4, "doc", PermName::Read).unwrap();
        set.set(9, "storages", PermName::Write).unwrap();
        set.set(9, "doc", PermName::None).unwrap();
        set.set(GLOBAL_ENTITY_ID, "products", PermName::Read)
            .unwrap();

        assert_eq!(
            set.checked(),
            vec![
                PermissionGrant::new(GLOBAL_ENTITY_ID, "r", "products"),
                PermissionGrant::new(9, "n", "doc"),
                PermissionGrant::new(9, "w", "storages"),
                PermissionGrant::new(4, "r", "doc"),
            ]
        );
    }

    #[test]
    fn test_append_and_remove() {
        let mut set = PermissionWidgetSet::new(catalog());
        let physics = EntityRef {
            entity_id: 9,
            entity_name: "physics".to_string(),
        };
        set.append(physics.clone(), false);
        set.append(physics, false);
        assert_eq!(set.groups().len(), 1);

        assert!(set.remove(9).is_some());
        assert!(set.remove(9).is_none());
        assert!(set.groups().is_empty());
    }

    #[test]
    fn test_perm_name_round_trip() {
        for perm in [
            PermName::None,
            PermName::Read,
            PermName::Write,
            PermName::All,
        ] {
            assert_eq!(perm.as_str().parse::<PermName>(), Ok(perm));
        }
        assert_eq!("read".parse::<PermName>(), Ok(PermName::Read));
        assert!("rw".parse::<PermName>().is_err());
    }
}
