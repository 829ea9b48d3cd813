//! Company invitations: issuing, verification, and provisioning a company from an
//! accepted invitation.

pub mod domain;
pub mod mailer;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    CompanyDetails, CompanyInvitation, InvitationFilter, InvitationId, InvitationQuery,
    InvitationStatus, InvitationView, NewInvitation, RegistrantDetails, RegistrationRequest,
    SendInvitationRequest, VerifyInvitationResponse,
};
pub use mailer::{InvitationMailer, MailError};
pub use repository::InvitationRepository;
pub use router::invitation_router;
pub use service::{
    InvitationService, InvitationServiceError, IssuedInvitation, RegisteredCompany,
};

#[cfg(test)]
mod tests;
