//! Session-scoped cache of what the logged user may do on each table row.

use std::collections::HashMap;

use futures::future::join_all;
use reqwest::Method;
use serde::Serialize;
use shared_types::PersonId;

use crate::api::PeopleApi;

pub const PEOPLE_ITEM: &str = "people";

/// Methods probed for every row
pub fn row_methods() -> [Method; 3] {
    [Method::GET, Method::PUT, Method::DELETE]
}

pub fn capability_key(item: &str, item_id: i64, method: &Method) -> String {
    format!("{item}:{item_id}:{}", method.as_str())
}

/// Buttons a row shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowActions {
    pub view: bool,
    pub edit: bool,
    pub delete: bool,
}

/// In-memory, last write wins.
#[derive(Debug, Clone, Default)]
pub struct CapabilityCache {
    flags: HashMap<String, bool>,
}

impl CapabilityCache {
    pub fn get(&self, item: &str, item_id: i64, method: &Method) -> Option<bool> {
        self.flags
            .get(&capability_key(item, item_id, method))
            .copied()
    }

    pub fn set(&mut self, item: &str, item_id: i64, method: &Method, allowed: bool) {
        self.flags
            .insert(capability_key(item, item_id, method), allowed);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn clear(&mut self) {
        self.flags.clear();
    }

    /// Forget every row not in `person_ids`.
    pub fn retain_rows(&mut self, person_ids: &[PersonId]) {
        self.flags.retain(|key, _| {
            person_ids
                .iter()
                .any(|id| key.starts_with(&format!("{PEOPLE_ITEM}:{id}:")))
        });
    }

    /// Unknown capabilities hide the button.
    pub fn row_actions(&self, person_id: PersonId) -> RowActions {
        let allowed = |method: &Method| self.get(PEOPLE_ITEM, person_id, method).unwrap_or(false);
        RowActions {
            view: allowed(&Method::GET),
            edit: allowed(&Method::PUT),
            delete: allowed(&Method::DELETE),
        }
    }
}

/// Probe every (row, method) pair concurrently. A failed probe counts as denied.
pub async fn probe_rows<A: PeopleApi + ?Sized>(
    api: &A,
    person_ids: &[PersonId],
) -> Vec<(PersonId, Method, bool)> {
    let mut probes = Vec::with_capacity(person_ids.len() * 3);
    for &id in person_ids {
        for method in row_methods() {
            probes.push(async move {
                let allowed = match api.has_permission(PEOPLE_ITEM, id, &method).await {
                    Ok(allowed) => allowed,
                    Err(e) => {
                        tracing::warn!(person_id = id, method = %method, error = %e, "Capability probe failed");
                        false
                    }
                };
                (id, method, allowed)
            });
        }
    }
    join_all(probes).await
}
