use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;

use crate::http::{self, company_scope, parse_path_id, ApiError, ApiJson, ApiQuery};
use crate::workflows::accounts::{UserId, UserRepository};
use crate::workflows::packages::{PackageId, PackageRepository};

use super::domain::{PreAlertChanges, PreAlertDraft, PreAlertId, PreAlertQuery};
use super::matching::{CustomerNotifier, MatchError, PreAlertMatcher};
use super::repository::PreAlertRepository;
use super::service::{PreAlertService, PreAlertServiceError};
use super::validation::PreAlertValidationError;

/// Collaborators shared by the pre-alert handlers.
pub struct PreAlertApi<R, U, K, N> {
    pub service: Arc<PreAlertService<R, U>>,
    pub matcher: Arc<PreAlertMatcher<R, K, N>>,
}

impl<R, U, K, N> PreAlertApi<R, U, K, N> {
    pub fn new(
        service: Arc<PreAlertService<R, U>>,
        matcher: Arc<PreAlertMatcher<R, K, N>>,
    ) -> Self {
        Self { service, matcher }
    }
}

type ApiState<R, U, K, N> = State<Arc<PreAlertApi<R, U, K, N>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub package_id: PackageId,
    #[serde(default)]
    pub send_notification: bool,
}

#[derive(Debug, Deserialize)]
pub struct DocumentsRequest {
    pub documents: Vec<String>,
}

/// Company-scoped pre-alert endpoints. The company comes from the path.
pub fn prealert_router<R, U, K, N>(api: Arc<PreAlertApi<R, U, K, N>>) -> Router
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/companies/:company_id/pre-alerts",
            get(search_handler::<R, U, K, N>).post(create_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/unmatched",
            get(unmatched_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/user/:user_id",
            get(by_user_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/status/:status",
            get(by_status_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/:pre_alert_id",
            get(get_handler::<R, U, K, N>)
                .put(update_handler::<R, U, K, N>)
                .delete(delete_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/:pre_alert_id/cancel",
            patch(cancel_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/:pre_alert_id/match",
            post(match_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/:pre_alert_id/documents",
            post(add_documents_handler::<R, U, K, N>),
        )
        .route(
            "/api/v1/companies/:company_id/pre-alerts/:pre_alert_id/documents/:index",
            delete(remove_document_handler::<R, U, K, N>),
        )
        .with_state(api)
}

fn pre_alert_id(raw: &str) -> Result<PreAlertId, ApiError> {
    parse_path_id(raw, "pre-alert id")
}

impl From<PreAlertServiceError> for ApiError {
    fn from(err: PreAlertServiceError) -> Self {
        match err {
            PreAlertServiceError::Repository(source) => {
                ApiError::internal("Failed to process pre-alert", &source)
            }
            other => ApiError::from_kind(other.kind(), other.to_string()),
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Repository(source) => {
                ApiError::internal("Failed to match pre-alert", &source)
            }
            other => ApiError::from_kind(other.kind(), other.to_string()),
        }
    }
}

pub(crate) async fn search_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path(company_id): Path<String>,
    ApiQuery(query): ApiQuery<PreAlertQuery>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let page = api.service.search(query, scope)?;
    Ok(http::ok(page))
}

pub(crate) async fn create_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path(company_id): Path<String>,
    ApiJson(draft): ApiJson<PreAlertDraft>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let created = api.service.create(draft, scope)?;
    Ok(http::success(
        StatusCode::CREATED,
        "Pre-alert created successfully",
        created,
    ))
}

pub(crate) async fn unmatched_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path(company_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    Ok(http::ok(api.service.list_unmatched(scope)?))
}

pub(crate) async fn by_user_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, user_id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let user_id: UserId = parse_path_id(&user_id, "user id")?;
    Ok(http::ok(api.service.list_by_user(&user_id, scope)?))
}

pub(crate) async fn by_status_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, status)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    Ok(http::ok(api.service.list_by_status(&status, scope)?))
}

pub(crate) async fn get_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    Ok(http::ok(api.service.get(&id, scope)?))
}

pub(crate) async fn update_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id)): Path<(String, String)>,
    ApiJson(changes): ApiJson<PreAlertChanges>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    let updated = api.service.update(&id, changes, scope)?;
    Ok(http::success(
        StatusCode::OK,
        "Pre-alert updated successfully",
        updated,
    ))
}

pub(crate) async fn delete_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    api.service.delete(&id, scope)?;
    Ok(http::success(
        StatusCode::OK,
        "Pre-alert deleted successfully",
        serde_json::Value::Null,
    ))
}

pub(crate) async fn cancel_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    let cancelled = api.service.cancel(&id, scope)?;
    Ok(http::success(
        StatusCode::OK,
        "Pre-alert cancelled successfully",
        cancelled,
    ))
}

pub(crate) async fn match_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id)): Path<(String, String)>,
    ApiJson(request): ApiJson<MatchRequest>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    let matched = api.matcher.match_to_package(
        &id,
        &request.package_id,
        scope,
        request.send_notification,
    )?;
    Ok(http::success(
        StatusCode::OK,
        "Pre-alert matched to package successfully",
        matched,
    ))
}

pub(crate) async fn add_documents_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id)): Path<(String, String)>,
    ApiJson(request): ApiJson<DocumentsRequest>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    let updated = api.service.add_documents(&id, request.documents, scope)?;
    Ok(http::success(
        StatusCode::OK,
        "Documents added successfully",
        updated,
    ))
}

pub(crate) async fn remove_document_handler<R, U, K, N>(
    State(api): ApiState<R, U, K, N>,
    Path((company_id, id, index)): Path<(String, String, String)>,
) -> Result<Response, ApiError>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let id = pre_alert_id(&id)?;
    let index: usize = index.trim().parse().map_err(|_| {
        ApiError::validation(PreAlertValidationError::InvalidDocumentIndex.to_string())
    })?;
    let updated = api.service.remove_document(&id, index, scope)?;
    Ok(http::success(
        StatusCode::OK,
        "Document removed successfully",
        updated,
    ))
}
