use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{ApplicationFilter, Role, UserSnapshot};
use crate::error::{AppError, ErrorContext};
use crate::lifecycle::{DecideApplicants, LifecycleEngine};
use crate::store::JobBoardStore;

const APPLICATION_NOT_FOUND: &str = "application not found";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub job_post_id: Uuid,
}

/// POST /api/applications/applyAsUser
pub async fn apply_as_user(
    form: web::Json<ApplyRequest>,
    acting: web::ReqData<UserSnapshot>,
    engine: web::Data<LifecycleEngine>,
) -> Result<HttpResponse, AppError> {
    let application = engine.apply(&acting, form.job_post_id).await?;
    Ok(HttpResponse::Created().json(application))
}

/// GET /api/applications/myApplications
pub async fn my_applications(
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let applications = store
        .list_applications(&ApplicationFilter::for_user(acting.id))
        .await?;
    Ok(HttpResponse::Ok().json(applications))
}

/// GET /api/applications/jobPost/{id}
///
/// Only the owning company sees the applicants; anyone else gets not found.
pub async fn job_post_applications(
    path: web::Path<Uuid>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
    engine: web::Data<LifecycleEngine>,
) -> Result<HttpResponse, AppError> {
    let post = engine.owned_job_post(&acting, path.into_inner()).await?;
    let applications = store
        .list_applications(&ApplicationFilter::for_job_post(post.id))
        .await?;
    Ok(HttpResponse::Ok().json(applications))
}

/// POST /api/applications/decideApplicants
///
/// Body: `{ "jobPostId": id, "acceptedUsers": id | [id, ...] }`.
///
/// # Errors
/// - 404: job post absent or not owned, or no pending application matched
/// - 409: job post already closed
/// - 500: the batch could not be committed
pub async fn decide_applicants(
    form: web::Json<DecideApplicants>,
    acting: web::ReqData<UserSnapshot>,
    engine: web::Data<LifecycleEngine>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("decide_applicants").with_user_id(acting.id);
    let DecideApplicants {
        job_post_id,
        accepted_users,
    } = form.into_inner();

    tracing::info!(
        request_id = %context.request_id,
        user_id = %acting.id,
        job_post_id = %job_post_id,
        policy = ?engine.policy(),
        "Deciding applicants"
    );

    let report = engine
        .decide_applicants(&acting, job_post_id, accepted_users)
        .await?;

    Ok(HttpResponse::Ok().json(report))
}

/// GET /api/applications
pub async fn list_applications(
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let applications = store
        .list_applications(&ApplicationFilter::default())
        .await?;
    Ok(HttpResponse::Ok().json(applications))
}

/// GET /api/applications/{id}
///
/// ADMIN sees any application, USER only their own, COMPANY only those to
/// its own job posts. Everything else is not found.
pub async fn get_application(
    path: web::Path<Uuid>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
    engine: web::Data<LifecycleEngine>,
) -> Result<HttpResponse, AppError> {
    let application = store
        .find_application(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found(APPLICATION_NOT_FOUND))?;

    let visible = match acting.role {
        Role::Admin => true,
        Role::User => application.user_id == acting.id,
        Role::Company => engine
            .owned_job_post(&acting, application.job_post_id)
            .await
            .is_ok(),
        Role::Guest => false,
    };
    if !visible {
        return Err(AppError::not_found(APPLICATION_NOT_FOUND));
    }

    Ok(HttpResponse::Ok().json(application))
}

/// DELETE /api/applications/deleteApplication/{id}
pub async fn delete_application(
    path: web::Path<Uuid>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    if !store.delete_application(id).await? {
        return Err(AppError::not_found(APPLICATION_NOT_FOUND));
    }

    tracing::info!(user_id = %acting.id, application_id = %id, "Application deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Application deleted successfully"
    })))
}
