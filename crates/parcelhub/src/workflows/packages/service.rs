use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::storage::RepositoryError;
use crate::tenancy::CompanyScope;
use crate::workflows::accounts::UserRepository;
use crate::workflows::prealerts::{
    CustomerNotifier, MatchError, PreAlert, PreAlertMatcher, PreAlertRepository,
};

use super::domain::{Package, PackageDraft, PackageId, PackageStatus};
use super::repository::PackageRepository;

/// Result of registering a package, including any pre-alert it was linked to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRegistration {
    pub package: Package,
    pub matched_pre_alert: Option<PreAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_issue: Option<String>,
}

/// Warehouse intake. A registered package is linked to the customer's pre-alert,
/// either the one named in the draft or the unmatched one with the same tracking
/// number.
pub struct PackageService<K, R, U, N> {
    packages: Arc<K>,
    users: Arc<U>,
    matcher: Arc<PreAlertMatcher<R, K, N>>,
    clock: Arc<dyn Clock>,
}

impl<K, R, U, N> PackageService<K, R, U, N>
where
    K: PackageRepository + 'static,
    R: PreAlertRepository + 'static,
    U: UserRepository + 'static,
    N: CustomerNotifier + 'static,
{
    pub fn new(
        packages: Arc<K>,
        users: Arc<U>,
        matcher: Arc<PreAlertMatcher<R, K, N>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            packages,
            users,
            matcher,
            clock,
        }
    }

    pub fn register(
        &self,
        draft: PackageDraft,
        scope: CompanyScope,
    ) -> Result<PackageRegistration, PackageServiceError> {
        let tracking_number = draft.tracking_number.trim().to_string();
        let length = tracking_number.chars().count();
        if !(3..=100).contains(&length) {
            return Err(PackageServiceError::Validation(
                "trackingNumber must be between 3 and 100 characters".to_string(),
            ));
        }
        if draft.weight.is_some_and(|weight| weight <= Decimal::ZERO) {
            return Err(PackageServiceError::Validation(
                "weight must be positive".to_string(),
            ));
        }
        if let Some(user_id) = &draft.user_id {
            if self.users.find_by_id(user_id, scope)?.is_none() {
                return Err(PackageServiceError::UserNotFound);
            }
        }
        if let Some(pre_alert_id) = &draft.pre_alert_id {
            if self.matcher.find_pre_alert(pre_alert_id, scope)?.is_none() {
                return Err(PackageServiceError::PreAlertNotFound);
            }
        }

        let now = self.clock.now();
        let status = draft.status.unwrap_or(PackageStatus::Received);
        let received_date = match (draft.received_date, status) {
            (Some(date), _) => Some(date),
            (None, PackageStatus::Received) => Some(now),
            (None, _) => None,
        };
        let package = Package {
            id: PackageId::new(),
            company_id: scope.company_id(),
            user_id: draft.user_id,
            tracking_number,
            status,
            description: draft.description,
            weight: draft.weight,
            received_date,
            created_at: now,
            updated_at: now,
        };

        let package = match self.packages.insert(package) {
            Ok(package) => package,
            Err(RepositoryError::Conflict) => return Err(PackageServiceError::DuplicateTracking),
            Err(other) => return Err(other.into()),
        };
        info!(
            package_id = %package.id,
            company_id = %package.company_id,
            tracking_number = %package.tracking_number,
            "package registered"
        );

        let outcome = match &draft.pre_alert_id {
            Some(pre_alert_id) => self
                .matcher
                .match_to_package(pre_alert_id, &package.id, scope, false)
                .map(Some),
            None => self
                .matcher
                .match_by_tracking_number(&package.tracking_number, &package.id, scope, false),
        };

        // The package row stands even when linking fails.
        let (matched_pre_alert, match_issue) = match outcome {
            Ok(matched) => (matched, None),
            Err(MatchError::Repository(source)) => return Err(source.into()),
            Err(err) => {
                warn!(package_id = %package.id, error = %err, "package registered without a pre-alert match");
                (None, Some(err.to_string()))
            }
        };

        Ok(PackageRegistration {
            package,
            matched_pre_alert,
            match_issue,
        })
    }

    pub fn get(&self, id: &PackageId, scope: CompanyScope) -> Result<Package, PackageServiceError> {
        self.packages
            .find_by_id(id, scope)?
            .ok_or(PackageServiceError::NotFound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackageServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Package not found")]
    NotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Pre-alert not found")]
    PreAlertNotFound,
    #[error("Tracking number is already registered")]
    DuplicateTracking,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PackageServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackageServiceError::Validation(_) => ErrorKind::Validation,
            PackageServiceError::NotFound
            | PackageServiceError::UserNotFound
            | PackageServiceError::PreAlertNotFound => ErrorKind::NotFound,
            PackageServiceError::DuplicateTracking => ErrorKind::Conflict,
            PackageServiceError::Repository(_) => ErrorKind::Internal,
        }
    }
}
