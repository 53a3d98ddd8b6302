use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Batch, JobBoardStore, Statement, StoreError};
use crate::domain::{
    Application, ApplicationFilter, ApplicationStatus, Company, CompanyUpdate, JobPost,
    JobPostFilter, JobPostStatus, JobPostUpdate, NewApplication, NewCompany, NewJobPost, NewUser,
    User, UserUpdate,
};

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<Uuid, User>,
    companies: HashMap<Uuid, Company>,
    job_posts: HashMap<Uuid, JobPost>,
    applications: HashMap<Uuid, Application>,
}

impl State {
    fn owns_job_post(&self, job_post_id: Uuid, owner_id: Uuid) -> bool {
        self.job_posts
            .get(&job_post_id)
            .and_then(|post| self.companies.get(&post.company_id))
            .map_or(false, |company| company.is_owned_by(owner_id))
    }

    fn apply(&mut self, statement: &Statement) -> u64 {
        match statement {
            Statement::SetApplicationStatus {
                job_post_id,
                owner_id,
                applicants,
                from,
                to,
            } => {
                if !self.owns_job_post(*job_post_id, *owner_id) {
                    return 0;
                }
                let mut affected = 0;
                for application in self.applications.values_mut() {
                    if application.job_post_id == *job_post_id
                        && application.status == *from
                        && applicants.contains(&application.user_id)
                    {
                        application.status = *to;
                        affected += 1;
                    }
                }
                affected
            }
            Statement::SetJobPostStatus {
                job_post_id,
                owner_id,
                from,
                to,
            } => {
                if !self.owns_job_post(*job_post_id, *owner_id) {
                    return 0;
                }
                match self.job_posts.get_mut(job_post_id) {
                    Some(post) if post.status == *from => {
                        post.status = *to;
                        1
                    }
                    _ => 0,
                }
            }
        }
    }
}

/// Mutex-guarded in-process store.
///
/// A single lock serializes every operation, so batches are trivially
/// isolated; they run against a copy of the state that only replaces the
/// live one once every step has passed.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn sorted<T: Clone>(
    items: impl Iterator<Item = T>,
    key: impl Fn(&T) -> chrono::DateTime<Utc>,
) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl JobBoardStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username already taken".to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            image: None,
            cv: None,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError> {
        let mut state = self.lock()?;
        if let Some(email) = &update.email {
            if state.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict("email already registered".to_string()));
            }
        }
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn insert_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let mut state = self.lock()?;
        if state.companies.values().any(|c| c.name == company.name) {
            return Err(StoreError::Conflict("company name already taken".to_string()));
        }
        if state.companies.values().any(|c| c.is_owned_by(company.created_by_id)) {
            return Err(StoreError::Conflict("user already owns a company".to_string()));
        }
        if !state.users.contains_key(&company.created_by_id) {
            return Err(StoreError::NotFound("owning user".to_string()));
        }
        let company = Company {
            id: Uuid::new_v4(),
            name: company.name,
            description: company.description,
            created_by_id: company.created_by_id,
            created_at: Utc::now(),
        };
        state.companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn find_company(&self, id: Uuid) -> Result<Option<Company>, StoreError> {
        Ok(self.lock()?.companies.get(&id).cloned())
    }

    async fn find_company_by_owner(&self, owner_id: Uuid) -> Result<Option<Company>, StoreError> {
        let state = self.lock()?;
        let owned = sorted(
            state.companies.values().filter(|c| c.is_owned_by(owner_id)).cloned(),
            |c| c.created_at,
        );
        Ok(owned.into_iter().next())
    }

    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, StoreError> {
        Ok(self
            .lock()?
            .companies
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let state = self.lock()?;
        Ok(sorted(state.companies.values().cloned(), |c| c.created_at))
    }

    async fn update_company(
        &self,
        id: Uuid,
        update: CompanyUpdate,
    ) -> Result<Option<Company>, StoreError> {
        let mut state = self.lock()?;
        if let Some(name) = &update.name {
            if state.companies.values().any(|c| c.id != id && &c.name == name) {
                return Err(StoreError::Conflict("company name already taken".to_string()));
            }
        }
        let Some(company) = state.companies.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            company.name = name;
        }
        if let Some(description) = update.description {
            company.description = description;
        }
        Ok(Some(company.clone()))
    }

    async fn delete_company(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if state.companies.remove(&id).is_none() {
            return Ok(false);
        }
        state.job_posts.retain(|_, p| p.company_id != id);
        let State {
            job_posts,
            applications,
            ..
        } = &mut *state;
        applications.retain(|_, a| job_posts.contains_key(&a.job_post_id));
        Ok(true)
    }

    async fn insert_job_post(&self, post: NewJobPost) -> Result<JobPost, StoreError> {
        let mut state = self.lock()?;
        if !state.companies.contains_key(&post.company_id) {
            return Err(StoreError::NotFound("company".to_string()));
        }
        let post = JobPost {
            id: Uuid::new_v4(),
            title: post.title,
            description: post.description,
            location: post.location,
            salary: post.salary,
            experience: post.experience,
            work_mode: post.work_mode,
            company_id: post.company_id,
            status: JobPostStatus::Open,
            created_at: Utc::now(),
        };
        state.job_posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_job_post(&self, id: Uuid) -> Result<Option<JobPost>, StoreError> {
        Ok(self.lock()?.job_posts.get(&id).cloned())
    }

    async fn list_job_posts(&self, filter: &JobPostFilter) -> Result<Vec<JobPost>, StoreError> {
        let state = self.lock()?;
        let matching = state.job_posts.values().filter(|post| {
            let company_name = state
                .companies
                .get(&post.company_id)
                .map(|c| c.name.as_str());
            filter.matches(post, company_name)
        });
        Ok(sorted(matching.cloned(), |p| p.created_at))
    }

    async fn update_job_post(
        &self,
        id: Uuid,
        update: JobPostUpdate,
    ) -> Result<Option<JobPost>, StoreError> {
        let mut state = self.lock()?;
        Ok(state.job_posts.get_mut(&id).map(|post| {
            update.apply_to(post);
            post.clone()
        }))
    }

    async fn delete_job_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if state.job_posts.remove(&id).is_none() {
            return Ok(false);
        }
        state.applications.retain(|_, a| a.job_post_id != id);
        Ok(true)
    }

    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, StoreError> {
        let mut state = self.lock()?;
        match state.job_posts.get(&application.job_post_id) {
            None => return Err(StoreError::NotFound("job post".to_string())),
            Some(post) if post.status != JobPostStatus::Open => {
                return Err(StoreError::Closed(post.id.to_string()));
            }
            Some(_) => (),
        }
        if !state.users.contains_key(&application.user_id) {
            return Err(StoreError::NotFound("user".to_string()));
        }
        if state.applications.values().any(|a| {
            a.job_post_id == application.job_post_id && a.user_id == application.user_id
        }) {
            return Err(StoreError::Conflict("application already exists".to_string()));
        }
        let application = Application {
            id: Uuid::new_v4(),
            job_post_id: application.job_post_id,
            user_id: application.user_id,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        };
        state.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn find_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let state = self.lock()?;
        Ok(sorted(
            state.applications.values().filter(|a| filter.matches(a)).cloned(),
            |a| a.created_at,
        ))
    }

    async fn delete_application(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock()?.applications.remove(&id).is_some())
    }

    async fn execute_batch(&self, batch: Batch) -> Result<Vec<u64>, StoreError> {
        let mut state = self.lock()?;
        let mut working = state.clone();
        let mut counts = Vec::with_capacity(batch.len());

        for (step, item) in batch.steps().iter().enumerate() {
            let affected = working.apply(&item.statement);
            if item.required && affected == 0 {
                return Err(StoreError::Aborted { step });
            }
            counts.push(affected);
        }

        *state = working;
        Ok(counts)
    }
}
