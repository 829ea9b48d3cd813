use chrono::{DateTime, Utc};

use crate::pagination::Paginated;
use crate::storage::RepositoryError;
use crate::tenancy::CompanyScope;
use crate::workflows::accounts::UserId;
use crate::workflows::packages::PackageId;

use super::domain::{PreAlert, PreAlertChanges, PreAlertId, PreAlertSearch, PreAlertStatus};

/// Company-scoped pre-alert storage.
///
/// Lookups report absence as `Ok(None)` or an empty list. Conditional writes return
/// `Ok(None)` when their guard did not hold or the row is not visible to `scope`;
/// that is the "zero rows affected" signal the services turn into a conflict.
pub trait PreAlertRepository: Send + Sync {
    fn insert(&self, record: PreAlert) -> Result<PreAlert, RepositoryError>;

    fn find_by_id(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    fn find_by_tracking_number(
        &self,
        tracking_number: &str,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    fn find_by_package(
        &self,
        package_id: &PackageId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    /// Newest first.
    fn find_by_user(
        &self,
        user_id: &UserId,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, RepositoryError>;

    /// Newest first.
    fn find_by_status(
        &self,
        status: PreAlertStatus,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, RepositoryError>;

    /// Pending rows without a package, soonest estimated arrival first.
    fn find_unmatched(&self, scope: CompanyScope) -> Result<Vec<PreAlert>, RepositoryError>;

    /// Newest first.
    fn list(&self, scope: CompanyScope) -> Result<Vec<PreAlert>, RepositoryError>;

    fn search(
        &self,
        scope: CompanyScope,
        search: &PreAlertSearch,
    ) -> Result<Paginated<PreAlert>, RepositoryError>;

    /// Apply `changes` only while the row is still in `expected` status.
    fn update(
        &self,
        id: &PreAlertId,
        changes: &PreAlertChanges,
        expected: PreAlertStatus,
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    /// Link the package and flip to matched, only while pending and only if no
    /// other pre-alert in the company already holds `package_id`.
    fn match_to_package(
        &self,
        id: &PreAlertId,
        package_id: &PackageId,
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    /// Hard delete, refused for rows linked to a package.
    fn delete(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    fn append_documents(
        &self,
        id: &PreAlertId,
        documents: &[String],
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;

    /// `Ok(None)` when the row is missing or `index` is out of range.
    fn remove_document(
        &self,
        id: &PreAlertId,
        index: usize,
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError>;
}
