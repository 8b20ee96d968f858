//! People table mirror.

use shared_types::{Page, Person, PersonId};
use url::Url;

use crate::api::PeopleQuery;

impl PeopleQuery {
    /// First page query, seeded with the `search` and `entity` parameters of the
    /// page URL.
    pub fn from_page_url(url: &Url, limit: u32) -> Self {
        let mut query = PeopleQuery {
            limit: u64::from(limit),
            ..PeopleQuery::default()
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "search" if !value.trim().is_empty() => query.search = Some(value.into_owned()),
                "entity" => match value.parse() {
                    Ok(id) => query.entity = Some(id),
                    Err(_) => tracing::debug!(value = %value, "Ignoring non numeric entity filter"),
                },
                _ => {}
            }
        }
        query
    }

    /// Same filters, page `page` (1 based).
    pub fn page(&self, page: u32) -> Self {
        Self {
            offset: u64::from(page.max(1) - 1) * self.limit,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleTable {
    pub query: PeopleQuery,
    pub rows: Vec<Person>,
    pub total: u64,
}

impl PeopleTable {
    pub fn new(query: PeopleQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn apply_page(&mut self, query: PeopleQuery, page: Page<Person>) {
        self.query = query;
        self.rows = page.rows;
        self.total = page.total;
    }

    /// Reflect a saved email on the row the edit started from.
    pub fn update_row(&mut self, index: usize, person_email: &str) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.person_email = person_email.to_string();
                true
            }
            None => false,
        }
    }

    pub fn row_index(&self, person_id: PersonId) -> Option<usize> {
        self.rows.iter().position(|p| p.person_id == person_id)
    }

    pub fn row_ids(&self) -> Vec<PersonId> {
        self.rows.iter().map(|p| p.person_id).collect()
    }
}
