use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// `Open` is initial, `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPostStatus {
    Open,
    Closed,
}

impl JobPostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPostStatus::Open => "Open",
            JobPostStatus::Closed => "Closed",
        }
    }
}

impl FromStr for JobPostStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(JobPostStatus::Open),
            "Closed" => Ok(JobPostStatus::Closed),
            other => Err(invalid("status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Experience {
    Internship,
    Junior,
    Mid,
    Senior,
}

impl Experience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Experience::Internship => "Internship",
            Experience::Junior => "Junior",
            Experience::Mid => "Mid",
            Experience::Senior => "Senior",
        }
    }
}

impl FromStr for Experience {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Internship" => Ok(Experience::Internship),
            "Junior" => Ok(Experience::Junior),
            "Mid" => Ok(Experience::Mid),
            "Senior" => Ok(Experience::Senior),
            other => Err(invalid("experience", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkMode {
    Remote,
    Hybrid,
    OnSite,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::Remote => "Remote",
            WorkMode::Hybrid => "Hybrid",
            WorkMode::OnSite => "OnSite",
        }
    }
}

impl FromStr for WorkMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Remote" => Ok(WorkMode::Remote),
            "Hybrid" => Ok(WorkMode::Hybrid),
            "OnSite" => Ok(WorkMode::OnSite),
            other => Err(invalid("type", other)),
        }
    }
}

fn invalid(field: &str, value: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPost {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: i64,
    pub experience: Experience,
    #[serde(rename = "type")]
    pub work_mode: WorkMode,
    pub company_id: Uuid,
    pub status: JobPostStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJobPost {
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: i64,
    pub experience: Experience,
    pub work_mode: WorkMode,
    pub company_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPostUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary: Option<i64>,
    pub experience: Option<Experience>,
    #[serde(rename = "type")]
    pub work_mode: Option<WorkMode>,
    pub status: Option<JobPostStatus>,
}

impl JobPostUpdate {
    pub fn apply_to(&self, post: &mut JobPost) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(description) = &self.description {
            post.description = description.clone();
        }
        if let Some(location) = &self.location {
            post.location = location.clone();
        }
        if let Some(salary) = self.salary {
            post.salary = salary;
        }
        if let Some(experience) = self.experience {
            post.experience = experience;
        }
        if let Some(work_mode) = self.work_mode {
            post.work_mode = work_mode;
        }
        if let Some(status) = self.status {
            post.status = status;
        }
    }
}

/// Conjunction of optional predicates over job posts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPostFilter {
    /// Substring match.
    pub title: Option<String>,
    pub location: Option<String>,
    /// Company name, exact match.
    pub company: Option<String>,
    pub experience: Option<Experience>,
    #[serde(rename = "type")]
    pub work_mode: Option<WorkMode>,
    pub status: Option<JobPostStatus>,
    /// Strictly greater than.
    pub minimum_salary: Option<i64>,
}

impl JobPostFilter {
    pub fn matches(&self, post: &JobPost, company_name: Option<&str>) -> bool {
        if let Some(title) = &self.title {
            if !post.title.contains(title.as_str()) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if &post.location != location {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if company_name != Some(company.as_str()) {
                return false;
            }
        }
        if self.experience.map_or(false, |e| e != post.experience) {
            return false;
        }
        if self.work_mode.map_or(false, |m| m != post.work_mode) {
            return false;
        }
        if self.status.map_or(false, |s| s != post.status) {
            return false;
        }
        if let Some(minimum) = self.minimum_salary {
            if post.salary <= minimum {
                return false;
            }
        }
        true
    }
}
