use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a tenant company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CompanyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Records that belong to exactly one company.
pub trait TenantOwned {
    fn company_id(&self) -> CompanyId;
}

/// Company context required by every tenant-scoped store call.
///
/// Stores never reach for an ambient tenant; callers pass the scope explicitly and
/// the store narrows its rows with [`CompanyScope::visible`], [`CompanyScope::scoped`]
/// or [`CompanyScope::scoped_mut`]. A row owned by another company is reported as
/// absent, never as forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompanyScope {
    company_id: CompanyId,
}

impl CompanyScope {
    pub fn new(company_id: CompanyId) -> Self {
        Self { company_id }
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn permits<R>(&self, record: &R) -> bool
    where
        R: TenantOwned + ?Sized,
    {
        record.company_id() == self.company_id
    }

    /// Narrow an iterator of rows to the ones owned by this company.
    pub fn visible<'a, R, I>(self, records: I) -> impl Iterator<Item = &'a R> + 'a
    where
        R: TenantOwned + 'a,
        I: IntoIterator<Item = &'a R>,
        I::IntoIter: 'a,
    {
        records
            .into_iter()
            .filter(move |record| record.company_id() == self.company_id)
    }

    pub fn scoped<'a, R>(&self, record: Option<&'a R>) -> Option<&'a R>
    where
        R: TenantOwned,
    {
        record.filter(|record| self.permits(*record))
    }

    pub fn scoped_mut<'a, R>(&self, record: Option<&'a mut R>) -> Option<&'a mut R>
    where
        R: TenantOwned,
    {
        record.filter(|record| self.permits(&**record))
    }
}

impl From<CompanyId> for CompanyScope {
    fn from(company_id: CompanyId) -> Self {
        Self::new(company_id)
    }
}
