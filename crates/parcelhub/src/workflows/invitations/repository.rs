use chrono::{DateTime, Utc};

use crate::pagination::Paginated;
use crate::security::TokenDigest;
use crate::storage::RepositoryError;
use crate::tenancy::CompanyId;

use super::domain::{CompanyInvitation, InvitationFilter, InvitationId, NewInvitation};

/// Platform-global invitation storage. Tokens are looked up by digest only.
pub trait InvitationRepository: Send + Sync {
    /// Insert a pending invitation unless the email already has a pending,
    /// unexpired one at `new.created_at`; that case is [`RepositoryError::Conflict`].
    /// The check and the insert happen as one atomic step.
    fn insert_pending(&self, new: NewInvitation) -> Result<CompanyInvitation, RepositoryError>;

    fn find_by_id(&self, id: InvitationId) -> Result<Option<CompanyInvitation>, RepositoryError>;

    /// Pending invitations for `email` that are still unexpired at `now`.
    fn find_pending_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompanyInvitation>, RepositoryError>;

    /// The invitation whose current token hashes to `digest`, if it is pending and
    /// unexpired at `now`.
    fn find_valid_by_token(
        &self,
        digest: &TokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError>;

    /// Replace the token and expiry of a pending invitation. `Ok(None)` when the row
    /// is missing or no longer pending; [`RepositoryError::Conflict`] when another
    /// invitation for the same email is pending and unexpired at `now`.
    fn rotate_token(
        &self,
        id: InvitationId,
        digest: TokenDigest,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError>;

    /// Pending → accepted, recording the provisioned company. Conditional on the
    /// row still being pending, unexpired at `now` and carrying `digest`.
    fn mark_accepted(
        &self,
        id: InvitationId,
        digest: &TokenDigest,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError>;

    /// Pending → cancelled. Conditional on the row still being pending.
    fn mark_cancelled(
        &self,
        id: InvitationId,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError>;

    /// Newest first.
    fn list(&self, filter: &InvitationFilter) -> Result<Paginated<CompanyInvitation>, RepositoryError>;
}
