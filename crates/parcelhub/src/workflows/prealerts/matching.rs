use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::storage::RepositoryError;
use crate::tenancy::{CompanyId, CompanyScope};
use crate::workflows::accounts::UserId;
use crate::workflows::packages::{PackageId, PackageRepository};

use super::domain::{PreAlert, PreAlertId, PreAlertStatus};
use super::repository::PreAlertRepository;

/// What the customer is told once their shipment has been received and linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchNotice {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub pre_alert_id: PreAlertId,
    pub package_id: PackageId,
    pub tracking_number: String,
}

impl MatchNotice {
    fn for_match(record: &PreAlert, package_id: PackageId) -> Self {
        Self {
            company_id: record.company_id,
            user_id: record.user_id,
            pre_alert_id: record.id,
            package_id,
            tracking_number: record.tracking_number.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// Outbound channel for customer notifications.
pub trait CustomerNotifier: Send + Sync {
    fn pre_alert_matched(&self, notice: &MatchNotice) -> Result<(), NotificationError>;
}

/// Links pending pre-alerts to received packages.
pub struct PreAlertMatcher<R, K, N> {
    pre_alerts: Arc<R>,
    packages: Arc<K>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<R, K, N> PreAlertMatcher<R, K, N>
where
    R: PreAlertRepository + 'static,
    K: PackageRepository + 'static,
    N: CustomerNotifier + 'static,
{
    pub fn new(pre_alerts: Arc<R>, packages: Arc<K>, notifier: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pre_alerts,
            packages,
            notifier,
            clock,
        }
    }

    pub fn find_pre_alert(
        &self,
        pre_alert_id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        self.pre_alerts.find_by_id(pre_alert_id, scope)
    }

    /// Link `pre_alert_id` to `package_id`. Both must belong to the scoped company.
    /// The store performs the link as one conditional write, so of two concurrent
    /// calls racing for the same pre-alert or the same package exactly one wins.
    ///
    /// A failed notification is logged and never undoes the match.
    pub fn match_to_package(
        &self,
        pre_alert_id: &PreAlertId,
        package_id: &PackageId,
        scope: CompanyScope,
        send_notification: bool,
    ) -> Result<PreAlert, MatchError> {
        let current = self
            .pre_alerts
            .find_by_id(pre_alert_id, scope)?
            .ok_or(MatchError::PreAlertNotFound)?;
        self.packages
            .find_by_id(package_id, scope)?
            .ok_or(MatchError::PackageNotFound)?;

        match current.status {
            PreAlertStatus::Matched => return Err(MatchError::AlreadyMatched),
            PreAlertStatus::Cancelled => return Err(MatchError::Cancelled),
            PreAlertStatus::Pending => {}
        }

        let matched = match self.pre_alerts.match_to_package(
            pre_alert_id,
            package_id,
            self.clock.now(),
            scope,
        )? {
            Some(record) => record,
            None => return Err(self.explain_rejection(pre_alert_id, package_id, scope)?),
        };

        info!(
            pre_alert_id = %matched.id,
            package_id = %package_id,
            company_id = %matched.company_id,
            "pre-alert matched to package"
        );

        if send_notification {
            let notice = MatchNotice::for_match(&matched, *package_id);
            if let Err(err) = self.notifier.pre_alert_matched(&notice) {
                warn!(
                    pre_alert_id = %matched.id,
                    user_id = %matched.user_id,
                    error = %err,
                    "match notification failed"
                );
            }
        }

        Ok(matched)
    }

    /// Match an incoming package to the unmatched pre-alert filed for the same
    /// tracking number, if any. Used when staff register a package without naming
    /// the pre-alert explicitly.
    pub fn match_by_tracking_number(
        &self,
        tracking_number: &str,
        package_id: &PackageId,
        scope: CompanyScope,
        send_notification: bool,
    ) -> Result<Option<PreAlert>, MatchError> {
        let Some(candidate) = self
            .pre_alerts
            .find_by_tracking_number(tracking_number, scope)?
            .filter(PreAlert::is_unmatched)
        else {
            return Ok(None);
        };

        self.match_to_package(&candidate.id, package_id, scope, send_notification)
            .map(Some)
    }

    fn explain_rejection(
        &self,
        pre_alert_id: &PreAlertId,
        package_id: &PackageId,
        scope: CompanyScope,
    ) -> Result<MatchError, RepositoryError> {
        let Some(current) = self.pre_alerts.find_by_id(pre_alert_id, scope)? else {
            return Ok(MatchError::PreAlertNotFound);
        };
        Ok(match current.status {
            PreAlertStatus::Matched => MatchError::AlreadyMatched,
            PreAlertStatus::Cancelled => MatchError::Cancelled,
            PreAlertStatus::Pending => match self.pre_alerts.find_by_package(package_id, scope)? {
                Some(_) => MatchError::PackageAlreadyLinked,
                None => MatchError::AlreadyMatched,
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Pre-alert not found")]
    PreAlertNotFound,
    #[error("Package not found")]
    PackageNotFound,
    #[error("Pre-alert is already matched to a package")]
    AlreadyMatched,
    #[error("Cancelled pre-alerts cannot be matched")]
    Cancelled,
    #[error("Package is already matched to another pre-alert")]
    PackageAlreadyLinked,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchError::PreAlertNotFound | MatchError::PackageNotFound => ErrorKind::NotFound,
            MatchError::AlreadyMatched
            | MatchError::Cancelled
            | MatchError::PackageAlreadyLinked => ErrorKind::Conflict,
            MatchError::Repository(_) => ErrorKind::Internal,
        }
    }
}
