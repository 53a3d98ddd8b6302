/// Persistence contract
///
/// Business logic talks to storage only through `JobBoardStore`, injected as
/// `Arc<dyn JobBoardStore>`. Two adapters ship with the crate: an in-memory
/// store used by tests and the Postgres store used in production.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Application, ApplicationFilter, ApplicationStatus, Company, CompanyUpdate, JobPost,
    JobPostFilter, JobPostStatus, JobPostUpdate, NewApplication, NewCompany, NewJobPost, NewUser,
    User, UserUpdate,
};

/// Store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The job post a write depends on is no longer open.
    #[error("job post closed: {0}")]
    Closed(String),
    /// A required batch statement matched no rows; nothing was committed.
    #[error("batch aborted at statement {step}")]
    Aborted { step: usize },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A stored value could not be mapped back into the domain.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Which applicants an application update targets, by user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicants {
    In(Vec<Uuid>),
    NotIn(Vec<Uuid>),
}

impl Applicants {
    pub fn contains(&self, user_id: &Uuid) -> bool {
        match self {
            Applicants::In(ids) => ids.contains(user_id),
            Applicants::NotIn(ids) => !ids.contains(user_id),
        }
    }
}

/// A filtered bulk update.
///
/// Both variants only touch rows of a job post whose company was created by
/// `owner_id`; for anyone else they match nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    SetApplicationStatus {
        job_post_id: Uuid,
        owner_id: Uuid,
        applicants: Applicants,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    SetJobPostStatus {
        job_post_id: Uuid,
        owner_id: Uuid,
        from: JobPostStatus,
        to: JobPostStatus,
    },
}

impl Statement {
    pub fn job_post_id(&self) -> Uuid {
        match self {
            Statement::SetApplicationStatus { job_post_id, .. }
            | Statement::SetJobPostStatus { job_post_id, .. } => *job_post_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStep {
    pub statement: Statement,
    /// Abort the whole batch when this statement affects zero rows.
    pub required: bool,
}

/// Statements executed as one all-or-nothing unit, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    steps: Vec<BatchStep>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, statement: Statement) -> Self {
        self.steps.push(BatchStep {
            statement,
            required: false,
        });
        self
    }

    pub fn then_required(mut self, statement: Statement) -> Self {
        self.steps.push(BatchStep {
            statement,
            required: true,
        });
        self
    }

    pub fn steps(&self) -> &[BatchStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Job posts the batch touches, sorted and deduplicated.
    pub fn job_post_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.steps.iter().map(|s| s.statement.job_post_id()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[async_trait]
pub trait JobBoardStore: Send + Sync {
    // users
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError>;

    // companies
    /// Fails with `Conflict` when the name is taken or the owner already has
    /// a company.
    async fn insert_company(&self, company: NewCompany) -> Result<Company, StoreError>;
    async fn find_company(&self, id: Uuid) -> Result<Option<Company>, StoreError>;
    async fn find_company_by_owner(&self, owner_id: Uuid) -> Result<Option<Company>, StoreError>;
    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, StoreError>;
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError>;
    async fn update_company(
        &self,
        id: Uuid,
        update: CompanyUpdate,
    ) -> Result<Option<Company>, StoreError>;
    /// Job posts of the company and their applications go with it.
    async fn delete_company(&self, id: Uuid) -> Result<bool, StoreError>;

    // job posts
    async fn insert_job_post(&self, post: NewJobPost) -> Result<JobPost, StoreError>;
    async fn find_job_post(&self, id: Uuid) -> Result<Option<JobPost>, StoreError>;
    async fn list_job_posts(&self, filter: &JobPostFilter) -> Result<Vec<JobPost>, StoreError>;
    async fn update_job_post(
        &self,
        id: Uuid,
        update: JobPostUpdate,
    ) -> Result<Option<JobPost>, StoreError>;
    async fn delete_job_post(&self, id: Uuid) -> Result<bool, StoreError>;

    // applications
    /// Insert a pending application. Fails with `Closed` unless the job post
    /// is Open at the moment of the write.
    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, StoreError>;
    async fn find_application(&self, id: Uuid) -> Result<Option<Application>, StoreError>;
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError>;
    async fn delete_application(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Run every statement of `batch` in one transaction and return the
    /// affected-row count of each, in order.
    async fn execute_batch(&self, batch: Batch) -> Result<Vec<u64>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applicants_membership() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(Applicants::In(vec![a]).contains(&a));
        assert!(!Applicants::In(vec![a]).contains(&b));
        assert!(Applicants::NotIn(vec![a]).contains(&b));
        assert!(Applicants::NotIn(vec![]).contains(&a));
    }

    #[test]
    fn test_batch_keeps_order_and_required_flags() {
        let post = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let close = Statement::SetJobPostStatus {
            job_post_id: post,
            owner_id: owner,
            from: JobPostStatus::Open,
            to: JobPostStatus::Closed,
        };

        let batch = Batch::new().then(close.clone()).then_required(close);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.job_post_ids(), vec![post]);
        assert!(!batch.steps()[0].required);
        assert!(batch.steps()[1].required);
    }
}
