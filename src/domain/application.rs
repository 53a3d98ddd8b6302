use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// `Pending` is initial, `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl FromStr for ApplicationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicationStatus::Pending),
            "Accepted" => Ok(ApplicationStatus::Accepted),
            "Rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(ValidationError::InvalidValue {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_post_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub job_post_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ApplicationFilter {
    pub fn for_job_post(job_post_id: Uuid) -> Self {
        Self {
            job_post_id: Some(job_post_id),
            user_id: None,
        }
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            job_post_id: None,
            user_id: Some(user_id),
        }
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.job_post_id.map_or(true, |id| id == application.job_post_id)
            && self.user_id.map_or(true, |id| id == application.user_id)
    }
}
