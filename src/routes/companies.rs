use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{CompanyUpdate, NewCompany, UserSnapshot};
use crate::error::{AppError, ErrorContext};
use crate::store::JobBoardStore;
use crate::validators::{is_valid_company_description, is_valid_company_name};

#[derive(Deserialize)]
pub struct CompanyRequest {
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct CompanyUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// GET /api/companies
pub async fn list_companies(
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(store.list_companies().await?))
}

/// GET /api/companies/{id}
pub async fn get_company(
    path: web::Path<Uuid>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let company = store
        .find_company(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("company not found"))?;
    Ok(HttpResponse::Ok().json(company))
}

/// POST /api/companies/addOwnCompany
///
/// A COMPANY user owns at most one company; its job posts hang off it. The
/// store rejects a second one with a conflict.
pub async fn add_own_company(
    form: web::Json<CompanyRequest>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("company_create").with_user_id(acting.id);

    let name = is_valid_company_name(&form.name)?;
    let description = is_valid_company_description(&form.description)?;

    let company = store
        .insert_company(NewCompany {
            name,
            description,
            created_by_id: acting.id,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %acting.id,
        company_id = %company.id,
        "Company created"
    );

    Ok(HttpResponse::Created().json(company))
}

/// PUT /api/companies/updateOwnCompany/{id}
///
/// Someone else's company is reported as not found.
pub async fn update_own_company(
    path: web::Path<Uuid>,
    form: web::Json<CompanyUpdateRequest>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("company_update").with_user_id(acting.id);
    let id = path.into_inner();

    let update = CompanyUpdate {
        name: form.name.as_deref().map(is_valid_company_name).transpose()?,
        description: form
            .description
            .as_deref()
            .map(is_valid_company_description)
            .transpose()?,
    };

    let owned = store
        .find_company(id)
        .await?
        .filter(|company| company.is_owned_by(acting.id))
        .is_some();
    if !owned {
        return Err(AppError::not_found("company not found"));
    }

    let company = store
        .update_company(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("company not found"))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %acting.id,
        company_id = %company.id,
        "Company updated"
    );

    Ok(HttpResponse::Ok().json(company))
}

/// DELETE /api/companies/{id}
///
/// Takes the company's job posts and their applications with it.
pub async fn delete_company(
    path: web::Path<Uuid>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    if !store.delete_company(id).await? {
        return Err(AppError::not_found("company not found"));
    }

    tracing::info!(user_id = %acting.id, company_id = %id, "Company deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Company deleted successfully" })))
}
