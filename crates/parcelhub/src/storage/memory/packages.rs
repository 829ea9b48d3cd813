use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::storage::{lock, RepositoryError};
use crate::tenancy::CompanyScope;
use crate::workflows::packages::{Package, PackageId, PackageRepository};

#[derive(Default, Clone)]
pub struct InMemoryPackageRepository {
    records: Arc<Mutex<HashMap<PackageId, Package>>>,
}

impl InMemoryPackageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PackageRepository for InMemoryPackageRepository {
    fn insert(&self, package: Package) -> Result<Package, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let scope = CompanyScope::new(package.company_id);
        let duplicate = guard.contains_key(&package.id)
            || scope
                .visible(guard.values())
                .any(|existing| existing.tracking_number == package.tracking_number);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(package.id, package.clone());
        Ok(package)
    }

    fn find_by_id(
        &self,
        id: &PackageId,
        scope: CompanyScope,
    ) -> Result<Option<Package>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(scope.scoped(guard.get(id)).cloned())
    }
}
