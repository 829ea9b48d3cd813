use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::pagination::Paginated;
use crate::security::TokenDigest;
use crate::storage::{lock, RepositoryError};
use crate::tenancy::CompanyId;
use crate::workflows::invitations::{
    CompanyInvitation, InvitationFilter, InvitationId, InvitationRepository, InvitationStatus,
    NewInvitation,
};

/// Invitation store with serial ids. The pending-per-email check runs under the
/// same lock as the insert, standing in for a partial unique index.
#[derive(Clone)]
pub struct InMemoryInvitationRepository {
    records: Arc<Mutex<BTreeMap<InvitationId, CompanyInvitation>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for InMemoryInvitationRepository {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl InMemoryInvitationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InvitationRepository for InMemoryInvitationRepository {
    fn insert_pending(&self, new: NewInvitation) -> Result<CompanyInvitation, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let duplicate = guard.values().any(|existing| {
            existing.email.eq_ignore_ascii_case(&new.email) && existing.is_valid_at(new.created_at)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let invitation = CompanyInvitation {
            id: InvitationId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            email: new.email,
            token_digest: new.token_digest,
            company_id: None,
            status: InvitationStatus::Pending,
            expires_at: new.expires_at,
            created_at: new.created_at,
            updated_at: new.created_at,
            created_by: new.created_by,
        };
        guard.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    fn find_by_id(&self, id: InvitationId) -> Result<Option<CompanyInvitation>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(&id).cloned())
    }

    fn find_pending_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompanyInvitation>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard
            .values()
            .filter(|invitation| {
                invitation.email.eq_ignore_ascii_case(email.trim()) && invitation.is_valid_at(now)
            })
            .cloned()
            .collect())
    }

    fn find_valid_by_token(
        &self,
        digest: &TokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard
            .values()
            .find(|invitation| &invitation.token_digest == digest && invitation.is_valid_at(now))
            .cloned())
    }

    fn rotate_token(
        &self,
        id: InvitationId,
        digest: TokenDigest,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let Some(email) = guard
            .get(&id)
            .filter(|invitation| invitation.status == InvitationStatus::Pending)
            .map(|invitation| invitation.email.clone())
        else {
            return Ok(None);
        };
        let superseded = guard.values().any(|other| {
            other.id != id && other.email.eq_ignore_ascii_case(&email) && other.is_valid_at(now)
        });
        if superseded {
            return Err(RepositoryError::Conflict);
        }

        let found = guard.get_mut(&id).map(|invitation| {
            invitation.token_digest = digest;
            invitation.expires_at = expires_at;
            invitation.updated_at = now;
            invitation.clone()
        });
        Ok(found)
    }

    fn mark_accepted(
        &self,
        id: InvitationId,
        digest: &TokenDigest,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        match guard.get_mut(&id) {
            Some(invitation) if &invitation.token_digest == digest && invitation.is_valid_at(now) => {
                invitation.status = InvitationStatus::Accepted;
                invitation.company_id = Some(company_id);
                invitation.updated_at = now;
                Ok(Some(invitation.clone()))
            }
            _ => Ok(None),
        }
    }

    fn mark_cancelled(
        &self,
        id: InvitationId,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        match guard.get_mut(&id) {
            Some(invitation) if invitation.status == InvitationStatus::Pending => {
                invitation.status = InvitationStatus::Cancelled;
                invitation.updated_at = now;
                Ok(Some(invitation.clone()))
            }
            _ => Ok(None),
        }
    }

    fn list(
        &self,
        filter: &InvitationFilter,
    ) -> Result<Paginated<CompanyInvitation>, RepositoryError> {
        let guard = lock(&self.records)?;
        // Serial ids follow insertion order, so reverse id order is newest first.
        let rows: Vec<CompanyInvitation> = guard
            .values()
            .rev()
            .filter(|invitation| filter.matches(invitation))
            .cloned()
            .collect();
        Ok(Paginated::from_sorted(rows, filter.page))
    }
}
