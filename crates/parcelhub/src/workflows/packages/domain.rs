use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenancy::{CompanyId, TenantOwned};
use crate::workflows::accounts::UserId;
use crate::workflows::prealerts::PreAlertId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub Uuid);

impl PackageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PackageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PackageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    InTransit,
    PreAlert,
    #[default]
    Received,
    Processed,
    ReadyForPickup,
    Delivered,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: PackageId,
    pub company_id: CompanyId,
    pub user_id: Option<UserId>,
    pub tracking_number: String,
    pub status: PackageStatus,
    pub description: Option<String>,
    pub weight: Option<Decimal>,
    pub received_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantOwned for Package {
    fn company_id(&self) -> CompanyId {
        self.company_id
    }
}

/// Intake payload for a package arriving at the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDraft {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub tracking_number: String,
    #[serde(default)]
    pub status: Option<PackageStatus>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub received_date: Option<DateTime<Utc>>,
    /// Explicit pre-alert to link; otherwise one is looked up by tracking number.
    #[serde(default)]
    pub pre_alert_id: Option<PreAlertId>,
}
