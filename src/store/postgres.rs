use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{Applicants, Batch, JobBoardStore, Statement, StoreError};
use crate::domain::{
    Application, ApplicationFilter, Company, CompanyUpdate, JobPost, JobPostFilter, JobPostUpdate,
    NewApplication, NewCompany, NewJobPost, NewUser, User, UserUpdate,
};
use crate::error::ValidationError;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, image, cv, created_at";
const COMPANY_COLUMNS: &str = "id, name, description, created_by_id, created_at";
const JOB_POST_COLUMNS: &str = "id, title, description, location, salary, experience, \
                                work_mode, company_id, status, created_at";
const APPLICATION_COLUMNS: &str = "id, job_post_id, user_id, status, created_at";

const POSTGRES_UNIQUE_VIOLATION: &str = "23505";
const POSTGRES_FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(POSTGRES_UNIQUE_VIOLATION) => StoreError::Conflict(db.message().to_string()),
                Some(POSTGRES_FOREIGN_KEY_VIOLATION) => {
                    StoreError::NotFound(db.message().to_string())
                }
                _ => StoreError::Unavailable(err.to_string()),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

fn corrupt(err: ValidationError) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    image: Option<String>,
    cv: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(corrupt)?,
            image: row.image,
            cv: row.cv,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    description: String,
    created_by_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            name: row.name,
            description: row.description,
            created_by_id: row.created_by_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct JobPostRow {
    id: Uuid,
    title: String,
    description: String,
    location: String,
    salary: i64,
    experience: String,
    work_mode: String,
    company_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<JobPostRow> for JobPost {
    type Error = StoreError;

    fn try_from(row: JobPostRow) -> Result<Self, Self::Error> {
        Ok(JobPost {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            salary: row.salary,
            experience: row.experience.parse().map_err(corrupt)?,
            work_mode: row.work_mode.parse().map_err(corrupt)?,
            company_id: row.company_id,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    job_post_id: Uuid,
    user_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StoreError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            id: row.id,
            job_post_id: row.job_post_id,
            user_id: row.user_id,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn execute_statement(
        tx: &mut Transaction<'_, Postgres>,
        statement: &Statement,
    ) -> Result<u64, sqlx::Error> {
        let result = match statement {
            Statement::SetApplicationStatus {
                job_post_id,
                owner_id,
                applicants,
                from,
                to,
            } => {
                let (membership, ids) = match applicants {
                    Applicants::In(ids) => ("a.user_id = ANY($5)", ids),
                    Applicants::NotIn(ids) => ("NOT (a.user_id = ANY($5))", ids),
                };
                let sql = format!(
                    r#"
                    UPDATE applications AS a
                    SET status = $1
                    FROM job_posts jp
                    JOIN companies c ON c.id = jp.company_id
                    WHERE a.job_post_id = $2
                      AND jp.id = a.job_post_id
                      AND c.created_by_id = $3
                      AND a.status = $4
                      AND {}
                    "#,
                    membership
                );
                sqlx::query(&sql)
                    .bind(to.as_str())
                    .bind(job_post_id)
                    .bind(owner_id)
                    .bind(from.as_str())
                    .bind(ids.as_slice())
                    .execute(&mut *tx)
                    .await?
            }
            Statement::SetJobPostStatus {
                job_post_id,
                owner_id,
                from,
                to,
            } => {
                sqlx::query(
                    r#"
                    UPDATE job_posts AS jp
                    SET status = $1
                    FROM companies c
                    WHERE jp.id = $2
                      AND c.id = jp.company_id
                      AND c.created_by_id = $3
                      AND jp.status = $4
                    "#,
                )
                .bind(to.as_str())
                .bind(job_post_id)
                .bind(owner_id)
                .bind(from.as_str())
                .execute(&mut *tx)
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobBoardStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        User::try_from(row)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET email = COALESCE($2, email), role = COALESCE($3, role) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(update.email)
            .bind(update.role.map(|r| r.as_str()))
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let sql = format!(
            "INSERT INTO companies (id, name, description, created_by_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            COMPANY_COLUMNS
        );
        let row = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&company.name)
            .bind(&company.description)
            .bind(company.created_by_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_company(&self, id: Uuid) -> Result<Option<Company>, StoreError> {
        let sql = format!("SELECT {} FROM companies WHERE id = $1", COMPANY_COLUMNS);
        let row = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Company::from))
    }

    async fn find_company_by_owner(&self, owner_id: Uuid) -> Result<Option<Company>, StoreError> {
        let sql = format!(
            "SELECT {} FROM companies WHERE created_by_id = $1 ORDER BY created_at LIMIT 1",
            COMPANY_COLUMNS
        );
        let row = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Company::from))
    }

    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, StoreError> {
        let sql = format!("SELECT {} FROM companies WHERE name = $1", COMPANY_COLUMNS);
        let row = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Company::from))
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let sql = format!("SELECT {} FROM companies ORDER BY created_at", COMPANY_COLUMNS);
        let rows = sqlx::query_as::<_, CompanyRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn update_company(
        &self,
        id: Uuid,
        update: CompanyUpdate,
    ) -> Result<Option<Company>, StoreError> {
        let sql = format!(
            "UPDATE companies SET name = COALESCE($2, name), \
             description = COALESCE($3, description) WHERE id = $1 RETURNING {}",
            COMPANY_COLUMNS
        );
        let row = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(id)
            .bind(update.name)
            .bind(update.description)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Company::from))
    }

    async fn delete_company(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_job_post(&self, post: NewJobPost) -> Result<JobPost, StoreError> {
        let sql = format!(
            "INSERT INTO job_posts (id, title, description, location, salary, experience, \
             work_mode, company_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'Open', $9) RETURNING {}",
            JOB_POST_COLUMNS
        );
        let row = sqlx::query_as::<_, JobPostRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&post.title)
            .bind(&post.description)
            .bind(&post.location)
            .bind(post.salary)
            .bind(post.experience.as_str())
            .bind(post.work_mode.as_str())
            .bind(post.company_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        JobPost::try_from(row)
    }

    async fn find_job_post(&self, id: Uuid) -> Result<Option<JobPost>, StoreError> {
        let sql = format!("SELECT {} FROM job_posts WHERE id = $1", JOB_POST_COLUMNS);
        sqlx::query_as::<_, JobPostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(JobPost::try_from)
            .transpose()
    }

    async fn list_job_posts(&self, filter: &JobPostFilter) -> Result<Vec<JobPost>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT jp.id, jp.title, jp.description, jp.location, jp.salary, jp.experience, \
             jp.work_mode, jp.company_id, jp.status, jp.created_at \
             FROM job_posts jp JOIN companies c ON c.id = jp.company_id WHERE TRUE",
        );
        if let Some(title) = &filter.title {
            query.push(" AND strpos(jp.title, ");
            query.push_bind(title.clone());
            query.push(") > 0");
        }
        if let Some(location) = &filter.location {
            query.push(" AND jp.location = ");
            query.push_bind(location.clone());
        }
        if let Some(company) = &filter.company {
            query.push(" AND c.name = ");
            query.push_bind(company.clone());
        }
        if let Some(experience) = filter.experience {
            query.push(" AND jp.experience = ");
            query.push_bind(experience.as_str());
        }
        if let Some(work_mode) = filter.work_mode {
            query.push(" AND jp.work_mode = ");
            query.push_bind(work_mode.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND jp.status = ");
            query.push_bind(status.as_str());
        }
        if let Some(minimum) = filter.minimum_salary {
            query.push(" AND jp.salary > ");
            query.push_bind(minimum);
        }
        query.push(" ORDER BY jp.created_at");

        let rows = query
            .build_query_as::<JobPostRow>()
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn update_job_post(
        &self,
        id: Uuid,
        update: JobPostUpdate,
    ) -> Result<Option<JobPost>, StoreError> {
        let sql = format!(
            "UPDATE job_posts SET title = COALESCE($2, title), \
             description = COALESCE($3, description), location = COALESCE($4, location), \
             salary = COALESCE($5, salary), experience = COALESCE($6, experience), \
             work_mode = COALESCE($7, work_mode), status = COALESCE($8, status) \
             WHERE id = $1 RETURNING {}",
            JOB_POST_COLUMNS
        );
        sqlx::query_as::<_, JobPostRow>(&sql)
            .bind(id)
            .bind(update.title)
            .bind(update.description)
            .bind(update.location)
            .bind(update.salary)
            .bind(update.experience.map(|e| e.as_str()))
            .bind(update.work_mode.map(|m| m.as_str()))
            .bind(update.status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?
            .map(JobPost::try_from)
            .transpose()
    }

    async fn delete_job_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM job_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, StoreError> {
        // FOR SHARE waits on a batch holding the post and re-reads its status.
        let sql = format!(
            "INSERT INTO applications (id, job_post_id, user_id, status, created_at) \
             SELECT $1, jp.id, $3, 'Pending', $4 FROM job_posts jp \
             WHERE jp.id = $2 AND jp.status = 'Open' FOR SHARE \
             RETURNING {}",
            APPLICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(application.job_post_id)
            .bind(application.user_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Application::try_from(row),
            None => match self.find_job_post(application.job_post_id).await? {
                Some(post) => Err(StoreError::Closed(post.id.to_string())),
                None => Err(StoreError::NotFound("job post".to_string())),
            },
        }
    }

    async fn find_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        let sql = format!("SELECT {} FROM applications WHERE id = $1", APPLICATION_COLUMNS);
        sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Application::try_from)
            .transpose()
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let sql = format!(
            "SELECT {} FROM applications \
             WHERE ($1::uuid IS NULL OR job_post_id = $1) \
             AND ($2::uuid IS NULL OR user_id = $2) \
             ORDER BY created_at",
            APPLICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(filter.job_post_id)
            .bind(filter.user_id)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn delete_application(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn execute_batch(&self, batch: Batch) -> Result<Vec<u64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut counts = Vec::with_capacity(batch.len());

        // Concurrent batches and applications on the same posts queue here.
        sqlx::query("SELECT id FROM job_posts WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(batch.job_post_ids())
            .execute(&mut tx)
            .await?;

        for (step, item) in batch.steps().iter().enumerate() {
            let affected = Self::execute_statement(&mut tx, &item.statement).await?;
            if item.required && affected == 0 {
                tx.rollback().await?;
                tracing::debug!(step, "Required batch statement matched no rows, rolled back");
                return Err(StoreError::Aborted { step });
            }
            counts.push(affected);
        }

        tx.commit().await?;
        Ok(counts)
    }
}
