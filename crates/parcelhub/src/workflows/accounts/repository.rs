use crate::storage::RepositoryError;
use crate::tenancy::{CompanyId, CompanyScope};

use super::domain::{Company, User, UserId};

/// Company rows are platform-global; subdomains are unique.
pub trait CompanyRepository: Send + Sync {
    /// `Ok(None)` means the store accepted the call but produced no row.
    fn insert(&self, company: Company) -> Result<Option<Company>, RepositoryError>;
    fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn delete(&self, id: &CompanyId) -> Result<bool, RepositoryError>;
}

/// Users are tenant-owned; email addresses are unique across the platform.
pub trait UserRepository: Send + Sync {
    fn insert(&self, user: User) -> Result<User, RepositoryError>;
    fn find_by_id(&self, id: &UserId, scope: CompanyScope) -> Result<Option<User>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn delete(&self, id: &UserId, scope: CompanyScope) -> Result<bool, RepositoryError>;
}
