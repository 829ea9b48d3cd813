use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenancy::{CompanyId, TenantOwned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    AdminL1,
    AdminL2,
    SuperAdmin,
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::AdminL1 => "admin_l1",
            UserRole::AdminL2 => "admin_l2",
            UserRole::SuperAdmin => "super_admin",
        }
    }
}

/// Input for a company row; `address` is already collapsed into one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompany {
    pub name: String,
    pub subdomain: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub website: Option<String>,
    pub locations: Vec<String>,
    pub bank_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub subdomain: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub locations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn from_new(input: NewCompany, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CompanyId::new(),
            name: input.name,
            subdomain: input.subdomain,
            email: input.email,
            phone: input.phone,
            address: input.address,
            website: input.website,
            locations: input.locations,
            bank_info: input.bank_info,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub company_id: CompanyId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl TenantOwned for User {
    fn company_id(&self) -> CompanyId {
        self.company_id
    }
}
