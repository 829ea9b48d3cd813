use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::storage::{lock, RepositoryError};
use crate::tenancy::{CompanyId, CompanyScope};
use crate::workflows::accounts::{Company, CompanyRepository, User, UserId, UserRepository};

#[derive(Default, Clone)]
pub struct InMemoryCompanyRepository {
    records: Arc<Mutex<HashMap<CompanyId, Company>>>,
}

impl InMemoryCompanyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompanyRepository for InMemoryCompanyRepository {
    fn insert(&self, company: Company) -> Result<Option<Company>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let taken = guard.values().any(|existing| {
            existing.id == company.id || existing.subdomain.eq_ignore_ascii_case(&company.subdomain)
        });
        if taken {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(company.id, company.clone());
        Ok(Some(company))
    }

    fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    fn delete(&self, id: &CompanyId) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.records)?;
        Ok(guard.remove(id).is_some())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserRepository {
    records: Arc<Mutex<HashMap<UserId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for InMemoryUserRepository {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let taken = guard
            .values()
            .any(|existing| existing.id == user.id || existing.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_by_id(&self, id: &UserId, scope: CompanyScope) -> Result<Option<User>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(scope.scoped(guard.get(id)).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let guard = lock(&self.records)?;
        let email = email.trim();
        Ok(guard
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn delete(&self, id: &UserId, scope: CompanyScope) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if scope.scoped(guard.get(id)).is_none() {
            return Ok(false);
        }
        Ok(guard.remove(id).is_some())
    }
}
