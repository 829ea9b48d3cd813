use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};

use crate::http::{self, company_scope, parse_path_id, ApiError, ApiJson};
use crate::workflows::accounts::UserRepository;
use crate::workflows::prealerts::{CustomerNotifier, PreAlertRepository};

use super::domain::{PackageDraft, PackageId};
use super::repository::PackageRepository;
use super::service::{PackageService, PackageServiceError};

pub fn package_router<K, R, U, N>(service: Arc<PackageService<K, R, U, N>>) -> Router
where
    K: PackageRepository + 'static,
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    N: CustomerNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/companies/:company_id/packages",
            post(register_handler::<K, R, U, N>),
        )
        .route(
            "/api/v1/companies/:company_id/packages/:package_id",
            get(get_handler::<K, R, U, N>),
        )
        .with_state(service)
}

impl From<PackageServiceError> for ApiError {
    fn from(err: PackageServiceError) -> Self {
        match err {
            PackageServiceError::Repository(source) => {
                ApiError::internal("Failed to process package", &source)
            }
            other => ApiError::from_kind(other.kind(), other.to_string()),
        }
    }
}

pub(crate) async fn register_handler<K, R, U, N>(
    State(service): State<Arc<PackageService<K, R, U, N>>>,
    Path(company_id): Path<String>,
    ApiJson(draft): ApiJson<PackageDraft>,
) -> Result<Response, ApiError>
where
    K: PackageRepository + 'static,
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let registration = service.register(draft, scope)?;
    Ok(http::success(
        StatusCode::CREATED,
        "Package registered successfully",
        registration,
    ))
}

pub(crate) async fn get_handler<K, R, U, N>(
    State(service): State<Arc<PackageService<K, R, U, N>>>,
    Path((company_id, package_id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    K: PackageRepository + 'static,
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    N: CustomerNotifier + 'static,
{
    let scope = company_scope(&company_id)?;
    let package_id: PackageId = parse_path_id(&package_id, "package id")?;
    Ok(http::ok(service.get(&package_id, scope)?))
}
