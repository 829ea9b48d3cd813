use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::InvitationSettings;
use crate::error::ErrorKind;
use crate::pagination::Paginated;
use crate::security::{hash_password, InvitationToken, PasswordError, TokenDigest};
use crate::storage::RepositoryError;
use crate::tenancy::{CompanyId, CompanyScope};
use crate::workflows::accounts::{
    Company, CompanyRepository, NewCompany, User, UserId, UserRepository, UserRole,
};

use super::domain::{
    CompanyDetails, CompanyInvitation, InvitationId, InvitationQuery, InvitationStatus,
    InvitationView, NewInvitation, RegistrantDetails, RegistrationRequest,
    VerifyInvitationResponse,
};
use super::mailer::{InvitationMailer, MailError};
use super::repository::InvitationRepository;

pub const DUPLICATE_PENDING: &str = "There is already a pending invitation for this email";
pub const INVALID_OR_EXPIRED: &str = "Invalid or expired invitation";
pub const CANNOT_RESEND: &str = "Cannot resend an invitation that is not pending";
pub const CANNOT_REVOKE: &str = "Cannot revoke an invitation that is not pending";
const MIN_PASSWORD_CHARS: usize = 8;

/// A freshly issued or rotated invitation together with the raw token. The token
/// is returned to the caller once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: CompanyInvitation,
    pub token: InvitationToken,
    pub link: String,
}

/// Company and first administrator created from an invitation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredCompany {
    pub company: Company,
    pub admin: User,
}

/// Company onboarding: invitations, token checks, and provisioning of the company
/// with its first `admin_l2` user.
pub struct InvitationService<I, C, U, M> {
    invitations: Arc<I>,
    companies: Arc<C>,
    users: Arc<U>,
    mailer: Arc<M>,
    clock: Arc<dyn Clock>,
    settings: InvitationSettings,
}

impl<I, C, U, M> InvitationService<I, C, U, M>
where
    I: InvitationRepository + 'static,
    C: CompanyRepository + 'static,
    U: UserRepository + 'static,
    M: InvitationMailer + 'static,
{
    pub fn new(
        invitations: Arc<I>,
        companies: Arc<C>,
        users: Arc<U>,
        mailer: Arc<M>,
        clock: Arc<dyn Clock>,
        settings: InvitationSettings,
    ) -> Self {
        Self {
            invitations,
            companies,
            users,
            mailer,
            clock,
            settings,
        }
    }

    /// Issue an invitation and email the registration link.
    ///
    /// The row is committed before the mail goes out. When delivery fails the
    /// invitation stays pending and the caller gets [`InvitationServiceError::Delivery`];
    /// `resend` is the recovery path.
    pub fn send(
        &self,
        email: &str,
        issued_by: Option<UserId>,
    ) -> Result<IssuedInvitation, InvitationServiceError> {
        let email = normalize_email(email)?;
        let now = self.clock.now();

        if !self.invitations.find_pending_by_email(&email, now)?.is_empty() {
            return Err(InvitationServiceError::Conflict(DUPLICATE_PENDING.to_string()));
        }

        let token = InvitationToken::generate();
        let invitation = match self.invitations.insert_pending(NewInvitation {
            email: email.clone(),
            token_digest: token.digest(),
            expires_at: now + self.settings.ttl,
            created_at: now,
            created_by: issued_by,
        }) {
            Ok(invitation) => invitation,
            Err(RepositoryError::Conflict) => {
                return Err(InvitationServiceError::Conflict(DUPLICATE_PENDING.to_string()))
            }
            Err(other) => return Err(other.into()),
        };
        info!(invitation_id = %invitation.id, email = %invitation.email, "company invitation issued");

        let link = self.settings.invitation_link(token.as_str());
        self.deliver(&invitation, &link)?;

        Ok(IssuedInvitation {
            invitation,
            token,
            link,
        })
    }

    /// Report whether `token` is currently usable. Unknown, revoked, accepted and
    /// expired tokens all read as invalid.
    pub fn verify(&self, token: &str) -> Result<VerifyInvitationResponse, InvitationServiceError> {
        let found = self
            .invitations
            .find_valid_by_token(&TokenDigest::of(token), self.clock.now())?;

        Ok(match found {
            Some(invitation) => VerifyInvitationResponse {
                is_valid: true,
                email: Some(invitation.email),
            },
            None => VerifyInvitationResponse {
                is_valid: false,
                email: None,
            },
        })
    }

    /// Create the invited company and its first administrator, then accept the
    /// invitation.
    ///
    /// Failures after the company row exists are compensated by deleting what was
    /// created. If that cleanup fails the error is
    /// [`InvitationServiceError::PartialProvisioning`] naming the orphaned company.
    pub fn register(
        &self,
        token: &str,
        request: RegistrationRequest,
    ) -> Result<RegisteredCompany, InvitationServiceError> {
        let (Some(registrant), Some(details)) = (request.user, request.company) else {
            return Err(InvitationServiceError::Validation(
                "User and company information are required".to_string(),
            ));
        };
        validate_registrant(&registrant)?;
        validate_company(&details)?;

        let now = self.clock.now();
        let digest = TokenDigest::of(token);
        let invitation = self
            .invitations
            .find_valid_by_token(&digest, now)?
            .ok_or_else(|| InvitationServiceError::Conflict(INVALID_OR_EXPIRED.to_string()))?;

        if self.users.find_by_email(&invitation.email)?.is_some() {
            return Err(InvitationServiceError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&registrant.password)?;

        let company = match self
            .companies
            .insert(Company::from_new(new_company(&details), now))
        {
            Ok(Some(company)) => company,
            Ok(None) => {
                error!(invitation_id = %invitation.id, "company insert returned no row");
                return Err(InvitationServiceError::Provisioning(
                    "Failed to create company".to_string(),
                ));
            }
            Err(RepositoryError::Conflict) => {
                return Err(InvitationServiceError::Conflict(
                    "Subdomain is already taken".to_string(),
                ))
            }
            Err(other) => return Err(other.into()),
        };

        let admin = User {
            id: UserId::new(),
            company_id: company.id,
            email: invitation.email.clone(),
            first_name: registrant.first_name.trim().to_string(),
            last_name: registrant.last_name.trim().to_string(),
            phone: registrant.phone.clone(),
            role: UserRole::AdminL2,
            password_hash,
            created_at: now,
        };

        let admin = match self.users.insert(admin) {
            Ok(admin) => admin,
            Err(err) => {
                error!(company_id = %company.id, error = %err, "admin user creation failed; removing company");
                self.discard_company(company.id)?;
                return Err(match err {
                    RepositoryError::Conflict => InvitationServiceError::Conflict(
                        "A user with this email already exists".to_string(),
                    ),
                    _ => InvitationServiceError::Provisioning(
                        "Failed to create company administrator".to_string(),
                    ),
                });
            }
        };

        match self.invitations.mark_accepted(invitation.id, &digest, company.id, now) {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(invitation_id = %invitation.id, "invitation changed before acceptance; rolling back");
                self.discard_admin(&admin)?;
                self.discard_company(company.id)?;
                return Err(InvitationServiceError::Conflict(INVALID_OR_EXPIRED.to_string()));
            }
            Err(err) => {
                error!(invitation_id = %invitation.id, error = %err, "accepting invitation failed; rolling back");
                self.discard_admin(&admin)?;
                self.discard_company(company.id)?;
                return Err(err.into());
            }
        }

        info!(
            invitation_id = %invitation.id,
            company_id = %company.id,
            user_id = %admin.id,
            "company registered from invitation"
        );

        if let Err(err) = self.mailer.send_welcome(&admin.email, &admin.first_name) {
            warn!(user_id = %admin.id, error = %err, "welcome email failed");
        }

        Ok(RegisteredCompany { company, admin })
    }

    /// Issue a new token and expiry for a pending invitation and mail it again.
    /// The previous token stops verifying immediately. A lapsed invitation whose
    /// email has since been invited again is not revived.
    pub fn resend(&self, id: InvitationId) -> Result<IssuedInvitation, InvitationServiceError> {
        let current = self
            .invitations
            .find_by_id(id)?
            .ok_or(InvitationServiceError::NotFound)?;
        if current.status != InvitationStatus::Pending {
            return Err(InvitationServiceError::Conflict(CANNOT_RESEND.to_string()));
        }

        let now = self.clock.now();
        let token = InvitationToken::generate();
        let invitation = match self
            .invitations
            .rotate_token(id, token.digest(), now + self.settings.ttl, now)
        {
            Ok(Some(invitation)) => invitation,
            Ok(None) => return Err(self.lost_race(id, CANNOT_RESEND)),
            Err(RepositoryError::Conflict) => {
                return Err(InvitationServiceError::Conflict(DUPLICATE_PENDING.to_string()))
            }
            Err(other) => return Err(other.into()),
        };
        info!(invitation_id = %invitation.id, "company invitation reissued");

        let link = self.settings.invitation_link(token.as_str());
        self.deliver(&invitation, &link)?;

        Ok(IssuedInvitation {
            invitation,
            token,
            link,
        })
    }

    pub fn revoke(&self, id: InvitationId) -> Result<CompanyInvitation, InvitationServiceError> {
        let current = self
            .invitations
            .find_by_id(id)?
            .ok_or(InvitationServiceError::NotFound)?;
        if current.status != InvitationStatus::Pending {
            return Err(InvitationServiceError::Conflict(CANNOT_REVOKE.to_string()));
        }

        let revoked = self
            .invitations
            .mark_cancelled(id, self.clock.now())?
            .ok_or_else(|| self.lost_race(id, CANNOT_REVOKE))?;
        info!(invitation_id = %revoked.id, "company invitation revoked");
        Ok(revoked)
    }

    pub fn list(
        &self,
        query: InvitationQuery,
    ) -> Result<Paginated<InvitationView>, InvitationServiceError> {
        let now = self.clock.now();
        let page = self.invitations.list(&query.into_filter())?;
        Ok(page.map(|invitation| invitation.view(now)))
    }

    fn deliver(&self, invitation: &CompanyInvitation, link: &str) -> Result<(), InvitationServiceError> {
        self.mailer
            .send_company_invitation(&invitation.email, link)
            .map_err(|err| {
                warn!(
                    invitation_id = %invitation.id,
                    error = %err,
                    "invitation email failed; invitation left pending"
                );
                InvitationServiceError::Delivery(err)
            })
    }

    fn lost_race(&self, id: InvitationId, message: &str) -> InvitationServiceError {
        match self.invitations.find_by_id(id) {
            Ok(Some(_)) => InvitationServiceError::Conflict(message.to_string()),
            Ok(None) => InvitationServiceError::NotFound,
            Err(err) => err.into(),
        }
    }

    fn discard_company(&self, company_id: CompanyId) -> Result<(), InvitationServiceError> {
        match self.companies.delete(&company_id) {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(company_id = %company_id, error = %err, "orphaned company left behind");
                Err(InvitationServiceError::PartialProvisioning { company_id })
            }
        }
    }

    fn discard_admin(&self, admin: &User) -> Result<(), InvitationServiceError> {
        match self.users.delete(&admin.id, CompanyScope::new(admin.company_id)) {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(user_id = %admin.id, error = %err, "orphaned administrator left behind");
                Err(InvitationServiceError::PartialProvisioning {
                    company_id: admin.company_id,
                })
            }
        }
    }
}

fn normalize_email(raw: &str) -> Result<String, InvitationServiceError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(InvitationServiceError::Validation("Email is required".to_string()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_string())
        }
        _ => Err(InvitationServiceError::Validation(
            "Invalid email address".to_string(),
        )),
    }
}

fn validate_registrant(registrant: &RegistrantDetails) -> Result<(), InvitationServiceError> {
    if registrant.first_name.trim().is_empty() || registrant.last_name.trim().is_empty() {
        return Err(InvitationServiceError::Validation(
            "First and last name are required".to_string(),
        ));
    }
    if registrant.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(InvitationServiceError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_company(details: &CompanyDetails) -> Result<(), InvitationServiceError> {
    let required = [
        ("name", &details.name),
        ("subdomain", &details.subdomain),
        ("email", &details.email),
        ("phone", &details.phone),
        ("addressLine1", &details.address_line1),
        ("city", &details.city),
        ("country", &details.country),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(InvitationServiceError::Validation(format!(
            "Company {field} is required"
        )));
    }

    let subdomain = details.subdomain.trim();
    let well_formed = subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-');
    if !well_formed {
        return Err(InvitationServiceError::Validation(
            "Subdomain may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }
    Ok(())
}

fn new_company(details: &CompanyDetails) -> NewCompany {
    NewCompany {
        name: details.name.trim().to_string(),
        subdomain: details.subdomain.trim().to_string(),
        email: details.email.trim().to_string(),
        phone: details.phone.trim().to_string(),
        address: details.address(),
        website: details.website.clone(),
        locations: details.locations.clone(),
        bank_info: details.bank_info.clone(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvitationServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Invitation not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("invitation email could not be delivered: {0}")]
    Delivery(#[source] MailError),
    #[error("{0}")]
    Provisioning(String),
    #[error("company {company_id} was created but provisioning could not be rolled back")]
    PartialProvisioning { company_id: CompanyId },
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InvitationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvitationServiceError::Validation(_) => ErrorKind::Validation,
            InvitationServiceError::NotFound => ErrorKind::NotFound,
            InvitationServiceError::Conflict(_) => ErrorKind::Conflict,
            InvitationServiceError::Delivery(_)
            | InvitationServiceError::Provisioning(_)
            | InvitationServiceError::PartialProvisioning { .. }
            | InvitationServiceError::Password(_)
            | InvitationServiceError::Repository(_) => ErrorKind::Internal,
        }
    }
}
