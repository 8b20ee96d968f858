//! Entity typeahead and the person's entity association list.

use shared_types::{Entity, EntityId, EntityRef, Page};

use crate::api::EntityQuery;
use crate::notice::Notice;
use crate::permissions::ManagedIds;

pub const MANAGED_ENTITY_VETO: &str =
    "this entity can not be removed, the user is one of its manager";

/// Accumulated results of the remote entity search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPicker {
    pub page_size: u32,
    pub search: Option<String>,
    pub page: u32,
    pub options: Vec<EntityRef>,
    /// Whether the server reported more results than fetched so far
    pub more: bool,
}

impl EntityPicker {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            search: None,
            page: 0,
            options: Vec::new(),
            more: false,
        }
    }

    pub fn query_for(&self, search: Option<&str>, page: Option<u32>) -> EntityQuery {
        EntityQuery::new(search, page, self.page_size)
    }

    /// Fold one result page in. The first page replaces previous options,
    /// later pages append.
    pub fn merge(&mut self, query: &EntityQuery, result: Page<Entity>) {
        if query.page <= 1 || query.search != self.search {
            self.options.clear();
        }
        self.search = query.search.clone();
        self.page = query.page;
        for entity in result.rows {
            let option = EntityRef::from(entity);
            if !self.options.contains(&option) {
                self.options.push(option);
            }
        }
        self.more = u64::from(query.page) * u64::from(self.page_size) < result.total;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.page_size);
    }
}

/// Entities currently attached to the person being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAssociation {
    selected: Vec<EntityRef>,
    managed: ManagedIds,
}

impl EntityAssociation {
    /// Repeated entity ids keep their first occurrence.
    pub fn load(owned: &[Entity], managed: ManagedIds) -> Self {
        let mut association = Self {
            selected: Vec::with_capacity(owned.len()),
            managed,
        };
        for entity in owned {
            association.select(EntityRef::from(entity));
        }
        association
    }

    pub fn selected(&self) -> &[EntityRef] {
        &self.selected
    }

    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.selected.iter().map(|e| e.entity_id).collect()
    }

    pub fn managed(&self) -> &ManagedIds {
        &self.managed
    }

    pub fn is_selected(&self, entity_id: EntityId) -> bool {
        self.selected.iter().any(|e| e.entity_id == entity_id)
    }

    pub fn is_managed(&self, entity_id: EntityId) -> bool {
        self.managed.contains(entity_id)
    }

    /// Returns false when the entity was already selected.
    pub fn select(&mut self, entity: EntityRef) -> bool {
        if self.is_selected(entity.entity_id) {
            return false;
        }
        self.selected.push(entity);
        true
    }

    /// Vetoes detaching an entity the person manages. Runs before any mutation.
    pub fn guard_unselect(&self, entity_id: EntityId) -> Result<(), Notice> {
        if self.is_managed(entity_id) {
            return Err(Notice::success(MANAGED_ENTITY_VETO));
        }
        Ok(())
    }

    pub fn unselect(&mut self, entity_id: EntityId) -> Result<Option<EntityRef>, Notice> {
        self.guard_unselect(entity_id)?;
        let removed = self
            .selected
            .iter()
            .position(|e| e.entity_id == entity_id)
            .map(|index| self.selected.remove(index));
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;

    fn entity(id: EntityId, name: &str) -> Entity {
        Entity {
            entity_id: id,
            entity_name: name.to_string(),
            entity_description: None,
        }
    }

    #[test]
    fn test_picker_pages_append_and_track_more() {
        let mut picker = EntityPicker::new(2);
        let first = picker.query_for(Some("ch"), None);
        picker.merge(
            &first,
            Page {
                rows: vec![entity(1, "chemistry"), entity(2, "chimie")],
                total: 3,
            },
        );
        assert_eq!(picker.options.len(), 2);
        assert!(picker.more);

        let second = picker.query_for(Some("ch"), Some(2));
        assert_eq!(second.offset, 2);
        picker.merge(
            &second,
            Page {
                rows: vec![entity(3, "chem lab")],
                total: 3,
            },
        );
        assert_eq!(picker.options.len(), 3);
        assert!(!picker.more);
    }

    #[test]
    fn test_picker_new_search_replaces_options() {
        let mut picker = EntityPicker::new(10);
        let query = picker.query_for(Some("ch"), None);
        picker.merge(
            &query,
            Page {
                rows: vec![entity(1, "chemistry")],
                total: 1,
            },
        );
        let query = picker.query_for(Some("ph"), None);
        picker.merge(
            &query,
            Page {
                rows: vec![entity(9, "physics")],
                total: 1,
            },
        );
        assert_eq!(picker.options.len(), 1);
        assert_eq!(picker.options[0].entity_id, 9);
    }

    #[test]
    fn test_unselect_managed_is_vetoed() {
        let managed: ManagedIds = [7].into_iter().collect();
        let mut association =
            EntityAssociation::load(&[entity(7, "chemistry"), entity(9, "physics")], managed);

        let notice = association.unselect(7).unwrap_err();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.message, MANAGED_ENTITY_VETO);
        assert_eq!(association.selected_ids(), vec![7, 9]);

        let removed = association.unselect(9).unwrap();
        assert_eq!(removed.map(|e| e.entity_id), Some(9));
        assert_eq!(association.selected_ids(), vec![7]);
    }

    #[test]
    fn test_load_drops_repeated_entities() {
        let mut association = EntityAssociation::load(
            &[
                entity(9, "physics"),
                entity(7, "chemistry"),
                entity(9, "physics"),
            ],
            ManagedIds::default(),
        );
        assert_eq!(association.selected_ids(), vec![9, 7]);

        association.unselect(9).unwrap();
        assert!(!association.is_selected(9));
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut association = EntityAssociation::default();
        let physics = EntityRef::from(entity(9, "physics"));
        assert!(association.select(physics.clone()));
        assert!(!association.select(physics));
        assert_eq!(association.selected_ids(), vec![9]);
    }
}
