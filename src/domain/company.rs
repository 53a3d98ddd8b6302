use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// The COMPANY user allowed to mutate this record and its job posts.
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.created_by_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub description: String,
    pub created_by_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}
