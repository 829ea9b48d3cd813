use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::config::PreAlertSettings;
use crate::error::ErrorKind;
use crate::pagination::Paginated;
use crate::storage::RepositoryError;
use crate::tenancy::CompanyScope;
use crate::workflows::accounts::{UserId, UserRepository};

use super::domain::{
    PreAlert, PreAlertChanges, PreAlertDraft, PreAlertId, PreAlertQuery, PreAlertStatus,
};
use super::repository::PreAlertRepository;
use super::validation::{self, PreAlertValidationError};

pub const MATCHED_STATUS_LOCKED: &str =
    "Cannot change status of pre-alerts that are already matched to packages";
pub const CANCELLED_STATUS_LOCKED: &str = "Cannot change status of cancelled pre-alerts";
pub const MATCH_ONLY_VIA_OPERATION: &str =
    "Pre-alerts can only be matched through the match operation";
pub const CANNOT_CANCEL_MATCHED: &str =
    "Cannot cancel pre-alerts that are already matched to packages";
pub const ALREADY_CANCELLED: &str = "Pre-alert is already cancelled";
pub const CANNOT_DELETE_MATCHED: &str =
    "Cannot delete pre-alerts that are already matched to packages";
pub const CONCURRENT_CHANGE: &str = "Pre-alert was changed by another request";

/// Business rules over the pre-alert store: validation, ownership checks, and the
/// pending → matched | cancelled state machine.
pub struct PreAlertService<R, U> {
    repository: Arc<R>,
    users: Arc<U>,
    clock: Arc<dyn Clock>,
    settings: PreAlertSettings,
}

impl<R, U> PreAlertService<R, U>
where
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        users: Arc<U>,
        clock: Arc<dyn Clock>,
        settings: PreAlertSettings,
    ) -> Self {
        Self {
            repository,
            users,
            clock,
            settings,
        }
    }

    /// File a new pending pre-alert for a customer of the scoped company.
    pub fn create(
        &self,
        draft: PreAlertDraft,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        validation::validate_draft(&draft)?;
        self.require_user(&draft.user_id, scope)?;

        let now = self.clock.now();
        let record = PreAlert {
            id: PreAlertId::new(),
            company_id: scope.company_id(),
            user_id: draft.user_id,
            tracking_number: draft.tracking_number,
            courier: draft.courier,
            description: draft.description,
            estimated_weight: draft.estimated_weight,
            estimated_arrival: Some(
                draft
                    .estimated_arrival
                    .unwrap_or(now + self.settings.default_arrival),
            ),
            package_id: None,
            status: PreAlertStatus::Pending,
            documents: draft.documents,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert(record)?;
        info!(
            pre_alert_id = %stored.id,
            company_id = %stored.company_id,
            tracking_number = %stored.tracking_number,
            "pre-alert filed"
        );
        Ok(stored)
    }

    pub fn get(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        self.repository
            .find_by_id(id, scope)?
            .ok_or(PreAlertServiceError::NotFound)
    }

    pub fn list(&self, scope: CompanyScope) -> Result<Vec<PreAlert>, PreAlertServiceError> {
        Ok(self.repository.list(scope)?)
    }

    pub fn list_by_user(
        &self,
        user_id: &UserId,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, PreAlertServiceError> {
        self.require_user(user_id, scope)?;
        Ok(self.repository.find_by_user(user_id, scope)?)
    }

    pub fn list_by_status(
        &self,
        status: &str,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, PreAlertServiceError> {
        let status =
            PreAlertStatus::parse(status).ok_or(PreAlertValidationError::UnknownStatus)?;
        Ok(self.repository.find_by_status(status, scope)?)
    }

    pub fn list_unmatched(
        &self,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, PreAlertServiceError> {
        Ok(self.repository.find_unmatched(scope)?)
    }

    pub fn search(
        &self,
        query: PreAlertQuery,
        scope: CompanyScope,
    ) -> Result<Paginated<PreAlert>, PreAlertServiceError> {
        Ok(self.repository.search(scope, &query.into_search())?)
    }

    /// General field update. Status may only leave `pending` for `cancelled`; the
    /// package link is never touched here.
    pub fn update(
        &self,
        id: &PreAlertId,
        changes: PreAlertChanges,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        validation::validate_changes(&changes)?;
        let current = self.get(id, scope)?;

        if let Some(user_id) = changes.user_id {
            if user_id != current.user_id {
                self.require_user(&user_id, scope)?;
            }
        }
        if let Some(next) = changes.status {
            check_transition(current.status, next)?;
        }

        let updated = self
            .repository
            .update(id, &changes, current.status, self.clock.now(), scope)?;
        match updated {
            Some(record) => Ok(record),
            None => Err(self.lost_race(id, scope)?),
        }
    }

    pub fn cancel(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        let current = self.get(id, scope)?;
        match current.status {
            PreAlertStatus::Matched => return Err(conflict(CANNOT_CANCEL_MATCHED)),
            PreAlertStatus::Cancelled => return Err(conflict(ALREADY_CANCELLED)),
            PreAlertStatus::Pending => {}
        }

        let cancelled = self.repository.update(
            id,
            &PreAlertChanges::cancel(),
            PreAlertStatus::Pending,
            self.clock.now(),
            scope,
        )?;
        match cancelled {
            Some(record) => {
                info!(pre_alert_id = %record.id, company_id = %record.company_id, "pre-alert cancelled");
                Ok(record)
            }
            None => Err(self.lost_race(id, scope)?),
        }
    }

    pub fn delete(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        let current = self.get(id, scope)?;
        if current.is_linked() {
            return Err(conflict(CANNOT_DELETE_MATCHED));
        }

        match self.repository.delete(id, scope)? {
            Some(removed) => {
                info!(pre_alert_id = %removed.id, company_id = %removed.company_id, "pre-alert deleted");
                Ok(removed)
            }
            None => Err(self.lost_race(id, scope)?),
        }
    }

    pub fn add_documents(
        &self,
        id: &PreAlertId,
        documents: Vec<String>,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        if documents.is_empty() {
            return Err(PreAlertValidationError::NoDocuments.into());
        }
        validation::documents(&documents)?;

        self.repository
            .append_documents(id, &documents, self.clock.now(), scope)?
            .ok_or(PreAlertServiceError::NotFound)
    }

    pub fn remove_document(
        &self,
        id: &PreAlertId,
        index: usize,
        scope: CompanyScope,
    ) -> Result<PreAlert, PreAlertServiceError> {
        let current = self.get(id, scope)?;
        if index >= current.documents.len() {
            return Err(PreAlertValidationError::InvalidDocumentIndex.into());
        }

        match self
            .repository
            .remove_document(id, index, self.clock.now(), scope)?
        {
            Some(record) => Ok(record),
            // Still visible means the list shrank underneath us.
            None => match self.repository.find_by_id(id, scope)? {
                Some(_) => Err(PreAlertValidationError::InvalidDocumentIndex.into()),
                None => Err(PreAlertServiceError::NotFound),
            },
        }
    }

    fn require_user(&self, user_id: &UserId, scope: CompanyScope) -> Result<(), PreAlertServiceError> {
        self.users
            .find_by_id(user_id, scope)?
            .map(|_| ())
            .ok_or(PreAlertServiceError::UserNotFound)
    }

    /// A conditional write affected nothing: either the row vanished or another
    /// request moved it first.
    fn lost_race(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<PreAlertServiceError, PreAlertServiceError> {
        Ok(match self.repository.find_by_id(id, scope)? {
            Some(_) => conflict(CONCURRENT_CHANGE),
            None => PreAlertServiceError::NotFound,
        })
    }
}

fn check_transition(
    current: PreAlertStatus,
    next: PreAlertStatus,
) -> Result<(), PreAlertServiceError> {
    match (current, next) {
        (current, next) if current == next => Ok(()),
        (PreAlertStatus::Matched, _) => Err(conflict(MATCHED_STATUS_LOCKED)),
        (PreAlertStatus::Cancelled, _) => Err(conflict(CANCELLED_STATUS_LOCKED)),
        (PreAlertStatus::Pending, PreAlertStatus::Matched) => {
            Err(conflict(MATCH_ONLY_VIA_OPERATION))
        }
        (PreAlertStatus::Pending, _) => Ok(()),
    }
}

fn conflict(message: &str) -> PreAlertServiceError {
    PreAlertServiceError::Conflict(message.to_string())
}

/// Error raised by the pre-alert service.
#[derive(Debug, thiserror::Error)]
pub enum PreAlertServiceError {
    #[error(transparent)]
    Validation(#[from] PreAlertValidationError),
    #[error("Pre-alert not found")]
    NotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PreAlertServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PreAlertServiceError::Validation(_) => ErrorKind::Validation,
            PreAlertServiceError::NotFound | PreAlertServiceError::UserNotFound => {
                ErrorKind::NotFound
            }
            PreAlertServiceError::Conflict(_) => ErrorKind::Conflict,
            PreAlertServiceError::Repository(_) => ErrorKind::Internal,
        }
    }
}
