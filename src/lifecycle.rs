/// Application Lifecycle Engine
///
/// State machine over applications (`Pending -> Accepted | Rejected`) and
/// job posts (`Open -> Closed`). The only multi-record transition is
/// "decide applicants": accept the chosen applicants, reject every other
/// pending applicant and close the post, as one atomic batch.
///
/// Ownership failures are reported as `NotFound`, so callers cannot discover
/// for other companies' postings.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Application, ApplicationStatus, JobPost, JobPostStatus, NewApplication, UserSnapshot,
};
use crate::error::{AppError, DatabaseError, LifecycleError};
use crate::store::{Applicants, Batch, JobBoardStore, Statement, StoreError};

const JOB_POST_NOT_FOUND: &str = "job post not found";
const ACCEPTED_NOT_FOUND: &str = "accepted applicants were not found";

/// What `decide_applicants` does when none of the accepted user ids match a
/// pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroMatchPolicy {
    /// Commit the rejections and the close, then report `NotFound`.
    CommitAndReport,
    /// Roll the whole batch back and report `NotFound`; nothing changes.
    #[default]
    RollBack,
}

/// One user id or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AcceptedUsers {
    One(Uuid),
    Many(Vec<Uuid>),
}

impl AcceptedUsers {
    pub fn into_vec(self) -> Vec<Uuid> {
        match self {
            AcceptedUsers::One(id) => vec![id],
            AcceptedUsers::Many(mut ids) => {
                ids.sort();
                ids.dedup();
                ids
            }
        }
    }
}

impl From<Vec<Uuid>> for AcceptedUsers {
    fn from(ids: Vec<Uuid>) -> Self {
        AcceptedUsers::Many(ids)
    }
}

impl From<Uuid> for AcceptedUsers {
    fn from(id: Uuid) -> Self {
        AcceptedUsers::One(id)
    }
}

/// Request body of the decide-applicants operation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideApplicants {
    pub job_post_id: Uuid,
    pub accepted_users: AcceptedUsers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionReport {
    pub job_post_id: Uuid,
    pub accepted: u64,
    pub rejected: u64,
    pub closed: bool,
    pub rows_affected: u64,
}

pub struct LifecycleEngine {
    store: Arc<dyn JobBoardStore>,
    policy: ZeroMatchPolicy,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn JobBoardStore>, policy: ZeroMatchPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ZeroMatchPolicy {
        self.policy
    }

    /// Load a job post the acting user's company owns.
    ///
    /// Absent and not-owned are indistinguishable to the caller.
    pub async fn owned_job_post(
        &self,
        acting: &UserSnapshot,
        job_post_id: Uuid,
    ) -> Result<JobPost, AppError> {
        let post = self
            .store
            .find_job_post(job_post_id)
            .await?
            .ok_or_else(|| AppError::not_found(JOB_POST_NOT_FOUND))?;

        let owned = self
            .store
            .find_company(post.company_id)
            .await?
            .map_or(false, |company| company.is_owned_by(acting.id));

        if !owned {
            tracing::debug!(
                user_id = %acting.id,
                job_post_id = %job_post_id,
                "Job post not owned by acting user"
            );
            return Err(AppError::not_found(JOB_POST_NOT_FOUND));
        }
        Ok(post)
    }

    /// Create a pending application of `applicant` to an open job post.
    ///
    /// The status read here only fails fast; the store re-checks Open at
    /// insert time, so a close that lands in between still wins.
    pub async fn apply(
        &self,
        applicant: &UserSnapshot,
        job_post_id: Uuid,
    ) -> Result<Application, AppError> {
        let post = self
            .store
            .find_job_post(job_post_id)
            .await?
            .ok_or_else(|| AppError::not_found(JOB_POST_NOT_FOUND))?;

        if post.status == JobPostStatus::Closed {
            return Err(LifecycleError::JobPostClosed.into());
        }

        let application = self
            .store
            .insert_application(NewApplication {
                job_post_id,
                user_id: applicant.id,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => LifecycleError::DuplicateApplication.into(),
                StoreError::Closed(_) => LifecycleError::JobPostClosed.into(),
                StoreError::NotFound(_) => AppError::not_found(JOB_POST_NOT_FOUND),
                other => AppError::from(other),
            })?;

        tracing::info!(
            application_id = %application.id,
            job_post_id = %job_post_id,
            user_id = %applicant.id,
            "Application created"
        );
        Ok(application)
    }

    /// Accept `accepted` applicants, reject every other pending applicant
    /// and close the job post, atomically.
    pub async fn decide_applicants(
        &self,
        acting: &UserSnapshot,
        job_post_id: Uuid,
        accepted: AcceptedUsers,
    ) -> Result<DecisionReport, AppError> {
        let accepted = accepted.into_vec();
        let post = self.owned_job_post(acting, job_post_id).await?;

        if post.status == JobPostStatus::Closed {
            return Err(LifecycleError::JobPostClosed.into());
        }

        let strict = self.policy == ZeroMatchPolicy::RollBack;
        let accept = Statement::SetApplicationStatus {
            job_post_id,
            owner_id: acting.id,
            applicants: Applicants::In(accepted.clone()),
            from: ApplicationStatus::Pending,
            to: ApplicationStatus::Accepted,
        };
        let reject = Statement::SetApplicationStatus {
            job_post_id,
            owner_id: acting.id,
            applicants: Applicants::NotIn(accepted),
            from: ApplicationStatus::Pending,
            to: ApplicationStatus::Rejected,
        };
        let close = Statement::SetJobPostStatus {
            job_post_id,
            owner_id: acting.id,
            from: JobPostStatus::Open,
            to: JobPostStatus::Closed,
        };
        let batch = if strict {
            Batch::new()
                .then_required(accept)
                .then(reject)
                .then_required(close)
        } else {
            Batch::new().then(accept).then(reject).then(close)
        };

        let counts = match self.store.execute_batch(batch).await {
            Ok(counts) => counts,
            Err(StoreError::Aborted { step: 0 }) => {
                tracing::info!(
                    job_post_id = %job_post_id,
                    "No pending application matched the accepted users, rolled back"
                );
                return Err(AppError::not_found(ACCEPTED_NOT_FOUND));
            }
            Err(StoreError::Aborted { .. }) => {
                // Closed or handed over between the ownership check and the batch.
                return Err(LifecycleError::JobPostClosed.into());
            }
            Err(e) => {
                tracing::error!(job_post_id = %job_post_id, error = %e, "Decide applicants failed");
                return Err(DatabaseError::TransactionFailure(e.to_string()).into());
            }
        };

        let accepted = counts.first().copied().unwrap_or(0);
        let rejected = counts.get(1).copied().unwrap_or(0);
        let closed = counts.get(2).copied().unwrap_or(0);

        if accepted == 0 {
            tracing::warn!(
                job_post_id = %job_post_id,
                rejected,
                closed,
                "No pending application matched the accepted users; rejections and close committed"
            );
            return Err(AppError::not_found(ACCEPTED_NOT_FOUND));
        }

        tracing::info!(
            job_post_id = %job_post_id,
            user_id = %acting.id,
            accepted,
            rejected,
            "Applicants decided and job post closed"
        );

        Ok(DecisionReport {
            job_post_id,
            accepted,
            rejected,
            closed: closed > 0,
            rows_affected: accepted + rejected + closed,
        })
    }

    /// Close a job post on behalf of an administrator, rejecting every
    /// application still pending on it.
    pub async fn close_job_post(&self, job_post_id: Uuid) -> Result<DecisionReport, AppError> {
        let post = self
            .store
            .find_job_post(job_post_id)
            .await?
            .ok_or_else(|| AppError::not_found(JOB_POST_NOT_FOUND))?;
        if post.status == JobPostStatus::Closed {
            return Err(LifecycleError::JobPostClosed.into());
        }
        let owner_id = self
            .store
            .find_company(post.company_id)
            .await?
            .map(|company| company.created_by_id)
            .ok_or_else(|| AppError::not_found(JOB_POST_NOT_FOUND))?;

        let batch = Batch::new()
            .then(Statement::SetApplicationStatus {
                job_post_id,
                owner_id,
                applicants: Applicants::NotIn(Vec::new()),
                from: ApplicationStatus::Pending,
                to: ApplicationStatus::Rejected,
            })
            .then_required(Statement::SetJobPostStatus {
                job_post_id,
                owner_id,
                from: JobPostStatus::Open,
                to: JobPostStatus::Closed,
            });

        let counts = self.store.execute_batch(batch).await.map_err(|e| match e {
            StoreError::Aborted { .. } => AppError::from(LifecycleError::JobPostClosed),
            other => DatabaseError::TransactionFailure(other.to_string()).into(),
        })?;
        let rejected = counts.first().copied().unwrap_or(0);

        tracing::info!(job_post_id = %job_post_id, rejected, "Job post closed");

        Ok(DecisionReport {
            job_post_id,
            accepted: 0,
            rejected,
            closed: true,
            rows_affected: rejected + 1,
        })
    }
}
