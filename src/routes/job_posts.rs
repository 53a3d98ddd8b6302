use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{
    Experience, JobPost, JobPostFilter, JobPostStatus, JobPostUpdate, NewJobPost, Role,
    UserSnapshot, WorkMode,
};
use crate::error::{AppError, AuthError, ErrorContext, LifecycleError};
use crate::lifecycle::LifecycleEngine;
use crate::store::JobBoardStore;
use crate::validators::{is_valid_salary, is_valid_text};

const MAX_TITLE_LENGTH: usize = 100;
const MAX_LOCATION_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 5000;

#[derive(Deserialize)]
pub struct JobPostRequest {
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: i64,
    pub experience: Experience,
    #[serde(rename = "type")]
    pub work_mode: WorkMode,
}

/// Admin variant: the post goes under the company named in the body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminJobPostRequest {
    #[serde(flatten)]
    pub post: JobPostRequest,
    pub company_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryOrder {
    Asc,
    Desc,
}

#[derive(Deserialize)]
pub struct SortJobPostsRequest {
    #[serde(flatten)]
    pub filter: JobPostFilter,
    pub order: SalaryOrder,
}

fn new_job_post(form: JobPostRequest, company_id: Uuid) -> Result<NewJobPost, AppError> {
    Ok(NewJobPost {
        title: is_valid_text("title", &form.title, MAX_TITLE_LENGTH)?,
        description: is_valid_text("description", &form.description, MAX_DESCRIPTION_LENGTH)?,
        location: is_valid_text("location", &form.location, MAX_LOCATION_LENGTH)?,
        salary: is_valid_salary(form.salary)?,
        experience: form.experience,
        work_mode: form.work_mode,
        company_id,
    })
}

fn sort_by_salary(posts: &mut [JobPost], order: SalaryOrder) {
    match order {
        SalaryOrder::Asc => posts.sort_by_key(|p| p.salary),
        SalaryOrder::Desc => posts.sort_by_key(|p| std::cmp::Reverse(p.salary)),
    }
}

fn validate_update(update: JobPostUpdate) -> Result<JobPostUpdate, AppError> {
    Ok(JobPostUpdate {
        title: update
            .title
            .map(|t| is_valid_text("title", &t, MAX_TITLE_LENGTH))
            .transpose()?,
        description: update
            .description
            .map(|d| is_valid_text("description", &d, MAX_DESCRIPTION_LENGTH))
            .transpose()?,
        location: update
            .location
            .map(|l| is_valid_text("location", &l, MAX_LOCATION_LENGTH))
            .transpose()?,
        salary: update.salary.map(is_valid_salary).transpose()?,
        ..update
    })
}

/// GET /api/jobPosts
pub async fn list_job_posts(
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let posts = store.list_job_posts(&JobPostFilter::default()).await?;
    Ok(HttpResponse::Ok().json(posts))
}

/// GET /api/jobPosts/getJobPost/{id}
pub async fn get_job_post(
    path: web::Path<Uuid>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let post = store
        .find_job_post(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("job post not found"))?;
    Ok(HttpResponse::Ok().json(post))
}

/// POST /api/jobPosts/getJobPostsMatching
pub async fn get_job_posts_matching(
    filter: web::Json<JobPostFilter>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let posts = store.list_job_posts(&filter).await?;
    tracing::debug!(matches = posts.len(), "Job post search");
    Ok(HttpResponse::Ok().json(posts))
}

/// POST /api/jobPosts/sortJobPostsBySalary
///
/// Same predicates as the matching search, ordered by salary.
pub async fn sort_job_posts_by_salary(
    form: web::Json<SortJobPostsRequest>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let SortJobPostsRequest { filter, order } = form.into_inner();
    let mut posts = store.list_job_posts(&filter).await?;
    sort_by_salary(&mut posts, order);
    Ok(HttpResponse::Ok().json(posts))
}

/// POST /api/jobPosts
pub async fn add_job_post(
    form: web::Json<AdminJobPostRequest>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let AdminJobPostRequest { post, company_name } = form.into_inner();

    let company = store
        .find_company_by_name(&company_name)
        .await?
        .ok_or_else(|| AppError::not_found("company not found"))?;

    let post = store.insert_job_post(new_job_post(post, company.id)?).await?;

    tracing::info!(
        user_id = %acting.id,
        job_post_id = %post.id,
        company_id = %company.id,
        "Job post created by administrator"
    );

    Ok(HttpResponse::Created().json(post))
}

/// POST /api/jobPosts/addOwnJobPost
///
/// The post is created Open under the acting user's company.
pub async fn add_own_job_post(
    form: web::Json<JobPostRequest>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("job_post_create").with_user_id(acting.id);
    let form = form.into_inner();

    let company = store
        .find_company_by_owner(acting.id)
        .await?
        .ok_or_else(|| AppError::not_found("company not found"))?;

    let post = store
        .insert_job_post(new_job_post(form, company.id)?)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %acting.id,
        job_post_id = %post.id,
        company_id = %company.id,
        "Job post created"
    );

    Ok(HttpResponse::Created().json(post))
}

/// PUT /api/jobPosts/updateJobPost/{id}
///
/// ADMIN may edit any post and close it. COMPANY may edit its own posts but
/// not their status; closing goes through deciding applicants. Closed is
/// terminal for everyone.
pub async fn update_job_post(
    path: web::Path<Uuid>,
    form: web::Json<JobPostUpdate>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
    engine: web::Data<LifecycleEngine>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("job_post_update").with_user_id(acting.id);
    let id = path.into_inner();
    let mut update = validate_update(form.into_inner())?;

    let post = if acting.role == Role::Admin {
        store
            .find_job_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("job post not found"))?
    } else {
        let post = engine.owned_job_post(&acting, id).await?;
        if update.status.is_some() {
            return Err(AuthError::Forbidden.into());
        }
        post
    };

    let close = match (post.status, update.status.take()) {
        (JobPostStatus::Closed, Some(JobPostStatus::Open)) => {
            return Err(LifecycleError::JobPostClosed.into());
        }
        (JobPostStatus::Open, Some(JobPostStatus::Closed)) => true,
        _ => false,
    };

    let mut post = store
        .update_job_post(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("job post not found"))?;

    if close {
        let report = engine.close_job_post(id).await?;
        post.status = JobPostStatus::Closed;
        tracing::info!(
            request_id = %context.request_id,
            job_post_id = %id,
            rejected = report.rejected,
            "Job post closed by administrator"
        );
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %acting.id,
        job_post_id = %id,
        "Job post updated"
    );

    Ok(HttpResponse::Ok().json(post))
}

/// DELETE /api/jobPosts/deleteJobPost/{id}
///
/// Applications to the post go with it.
pub async fn delete_job_post(
    path: web::Path<Uuid>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("job_post_delete").with_user_id(acting.id);
    let id = path.into_inner();

    if !store.delete_job_post(id).await? {
        return Err(AppError::not_found("job post not found"));
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %acting.id,
        job_post_id = %id,
        "Job post deleted"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Job post deleted successfully" })))
}

/// DELETE /api/jobPosts/deleteOwnJobPost/{id}
///
/// Someone else's post is reported as not found.
pub async fn delete_own_job_post(
    path: web::Path<Uuid>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
    engine: web::Data<LifecycleEngine>,
) -> Result<HttpResponse, AppError> {
    let post = engine.owned_job_post(&acting, path.into_inner()).await?;

    if !store.delete_job_post(post.id).await? {
        return Err(AppError::not_found("job post not found"));
    }

    tracing::info!(user_id = %acting.id, job_post_id = %post.id, "Own job post deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Job post deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_validation_trims_and_rejects() {
        let update: JobPostUpdate = serde_json::from_value(serde_json::json!({
            "title": "  Backend Engineer ",
            "type": "Hybrid"
        }))
        .unwrap();

        let update = validate_update(update).unwrap();
        assert_eq!(update.title.as_deref(), Some("Backend Engineer"));
        assert_eq!(update.work_mode, Some(WorkMode::Hybrid));

        let negative = JobPostUpdate {
            salary: Some(-5),
            ..JobPostUpdate::default()
        };
        assert!(validate_update(negative).is_err());
    }

    #[test]
    fn test_request_uses_type_for_work_mode() {
        let request: JobPostRequest = serde_json::from_value(serde_json::json!({
            "title": "Engineer",
            "description": "Build things",
            "location": "Remote",
            "salary": 1000,
            "experience": "Junior",
            "type": "OnSite"
        }))
        .unwrap();

        assert_eq!(request.work_mode, WorkMode::OnSite);
        assert_eq!(request.experience, Experience::Junior);
    }

    #[test]
    fn test_admin_request_carries_company_name() {
        let request: AdminJobPostRequest = serde_json::from_value(serde_json::json!({
            "title": "Engineer",
            "description": "Build things",
            "location": "Remote",
            "salary": 1000,
            "experience": "Mid",
            "type": "Hybrid",
            "companyName": "Acme"
        }))
        .unwrap();

        assert_eq!(request.company_name, "Acme");
        assert_eq!(request.post.work_mode, WorkMode::Hybrid);
    }

    #[test]
    fn test_sort_request_requires_order() {
        let request: SortJobPostsRequest = serde_json::from_value(serde_json::json!({
            "minimumSalary": 100,
            "type": "Remote",
            "order": "desc"
        }))
        .unwrap();
        assert_eq!(request.order, SalaryOrder::Desc);
        assert_eq!(request.filter.minimum_salary, Some(100));
        assert_eq!(request.filter.work_mode, Some(WorkMode::Remote));

        let missing = serde_json::from_value::<SortJobPostsRequest>(serde_json::json!({}));
        assert!(missing.is_err());
        let sideways =
            serde_json::from_value::<SortJobPostsRequest>(serde_json::json!({ "order": "up" }));
        assert!(sideways.is_err());
    }

    #[test]
    fn test_sort_by_salary_both_ways() {
        let company_id = Uuid::new_v4();
        let mut posts: Vec<JobPost> = [300, 100, 200]
            .into_iter()
            .map(|salary| JobPost {
                id: Uuid::new_v4(),
                title: "Engineer".to_string(),
                description: "Build".to_string(),
                location: "Remote".to_string(),
                salary,
                experience: Experience::Mid,
                work_mode: WorkMode::Remote,
                company_id,
                status: JobPostStatus::Open,
                created_at: chrono::Utc::now(),
            })
            .collect();

        sort_by_salary(&mut posts, SalaryOrder::Asc);
        assert_eq!(posts.iter().map(|p| p.salary).collect::<Vec<_>>(), vec![100, 200, 300]);

        sort_by_salary(&mut posts, SalaryOrder::Desc);
        assert_eq!(posts.iter().map(|p| p.salary).collect::<Vec<_>>(), vec![300, 200, 100]);
    }
}
