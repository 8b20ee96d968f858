use std::time::Duration;

use serde::Serialize;

use crate::notice::Notice;

/// Side effects the console asks its renderer to carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Notify(Notice),
    /// Navigate to a console route once `after` has elapsed
    Redirect {
        route: String,
        #[serde(with = "millis")]
        after: Duration,
    },
    /// Hide the edit panel and show the people table
    ShowList,
}

impl Effect {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Effect::Notify(notice) => Some(notice),
            _ => None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
