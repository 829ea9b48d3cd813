use crate::storage::RepositoryError;
use crate::tenancy::CompanyScope;

use super::domain::{Package, PackageId};

pub trait PackageRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the company already holds the
    /// tracking number. The check and the insert are one atomic step.
    fn insert(&self, package: Package) -> Result<Package, RepositoryError>;
    fn find_by_id(&self, id: &PackageId, scope: CompanyScope)
        -> Result<Option<Package>, RepositoryError>;
}
