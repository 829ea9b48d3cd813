use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};

use crate::http::{self, parse_path_id, ApiError, ApiJson, ApiQuery};
use crate::workflows::accounts::{CompanyRepository, UserRepository};

use super::domain::{InvitationId, InvitationQuery, RegistrationRequest, SendInvitationRequest};
use super::mailer::InvitationMailer;
use super::repository::InvitationRepository;
use super::service::{InvitationService, InvitationServiceError};

type ServiceState<I, C, U, M> = State<Arc<InvitationService<I, C, U, M>>>;

/// Platform-level invitation endpoints.
pub fn invitation_router<I, C, U, M>(service: Arc<InvitationService<I, C, U, M>>) -> Router
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    Router::new()
        .route(
            "/api/v1/company-invitations",
            get(list_handler::<I, C, U, M>).post(send_handler::<I, C, U, M>),
        )
        .route(
            "/api/v1/company-invitations/verify/:token",
            get(verify_handler::<I, C, U, M>),
        )
        .route(
            "/api/v1/company-invitations/register/:token",
            post(register_handler::<I, C, U, M>),
        )
        .route(
            "/api/v1/company-invitations/:invitation_id/resend",
            post(resend_handler::<I, C, U, M>),
        )
        .route(
            "/api/v1/company-invitations/:invitation_id/revoke",
            post(revoke_handler::<I, C, U, M>),
        )
        .with_state(service)
}

impl From<InvitationServiceError> for ApiError {
    fn from(err: InvitationServiceError) -> Self {
        match err {
            // Invitation conflicts are reported as bad requests.
            InvitationServiceError::Conflict(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, message)
            }
            InvitationServiceError::Delivery(source) => {
                ApiError::internal("Failed to send invitation", &source)
            }
            InvitationServiceError::Provisioning(message) => ApiError::internal(&message, &message),
            err @ InvitationServiceError::PartialProvisioning { .. } => {
                ApiError::internal("Failed to register company", &err)
            }
            InvitationServiceError::Password(source) => {
                ApiError::internal("Failed to register company", &source)
            }
            InvitationServiceError::Repository(source) => {
                ApiError::internal("Failed to process invitation", &source)
            }
            other => ApiError::from_kind(other.kind(), other.to_string()),
        }
    }
}

fn invitation_id(raw: &str) -> Result<InvitationId, ApiError> {
    parse_path_id(raw, "invitation id")
}

pub(crate) async fn send_handler<I, C, U, M>(
    State(service): ServiceState<I, C, U, M>,
    ApiJson(request): ApiJson<SendInvitationRequest>,
) -> Result<Response, ApiError>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    let email = request.email.unwrap_or_default();
    service.send(&email, request.issued_by)?;
    Ok(http::success(
        StatusCode::CREATED,
        "Invitation sent successfully",
        (),
    ))
}

pub(crate) async fn list_handler<I, C, U, M>(
    State(service): ServiceState<I, C, U, M>,
    ApiQuery(query): ApiQuery<InvitationQuery>,
) -> Result<Response, ApiError>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    Ok(http::ok(service.list(query)?))
}

pub(crate) async fn verify_handler<I, C, U, M>(
    State(service): ServiceState<I, C, U, M>,
    Path(token): Path<String>,
) -> Result<Response, ApiError>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    Ok(http::ok(service.verify(&token)?))
}

pub(crate) async fn register_handler<I, C, U, M>(
    State(service): ServiceState<I, C, U, M>,
    Path(token): Path<String>,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<Response, ApiError>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    let registered = service.register(&token, request)?;
    Ok(http::success(
        StatusCode::CREATED,
        "Company registered successfully",
        registered,
    ))
}

pub(crate) async fn resend_handler<I, C, U, M>(
    State(service): ServiceState<I, C, U, M>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    service.resend(invitation_id(&raw_id)?)?;
    Ok(http::success(
        StatusCode::OK,
        "Invitation resent successfully",
        (),
    ))
}

pub(crate) async fn revoke_handler<I, C, U, M>(
    State(service): ServiceState<I, C, U, M>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    service.revoke(invitation_id(&raw_id)?)?;
    Ok(http::success(
        StatusCode::OK,
        "Invitation revoked successfully",
        (),
    ))
}
