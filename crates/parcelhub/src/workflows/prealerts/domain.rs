use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pagination::PageRequest;
use crate::tenancy::{CompanyId, TenantOwned};
use crate::workflows::accounts::UserId;
use crate::workflows::packages::PackageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreAlertId(pub Uuid);

impl PreAlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreAlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PreAlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PreAlertId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Pre-alert lifecycle. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreAlertStatus {
    #[default]
    Pending,
    Matched,
    Cancelled,
}

impl PreAlertStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PreAlertStatus::Pending => "pending",
            PreAlertStatus::Matched => "matched",
            PreAlertStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "matched" => Some(Self::Matched),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A customer's advance notice of an inbound shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAlert {
    pub id: PreAlertId,
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub tracking_number: String,
    pub courier: String,
    pub description: Option<String>,
    pub estimated_weight: Option<Decimal>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub package_id: Option<PackageId>,
    pub status: PreAlertStatus,
    pub documents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PreAlert {
    /// Pending and not linked to any package.
    pub fn is_unmatched(&self) -> bool {
        self.status == PreAlertStatus::Pending && self.package_id.is_none()
    }

    /// Matched pre-alerts keep their package link forever.
    pub fn is_linked(&self) -> bool {
        self.status == PreAlertStatus::Matched && self.package_id.is_some()
    }
}

impl TenantOwned for PreAlert {
    fn company_id(&self) -> CompanyId {
        self.company_id
    }
}

/// Payload for filing a new pre-alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAlertDraft {
    pub user_id: UserId,
    pub tracking_number: String,
    pub courier: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_weight: Option<Decimal>,
    #[serde(default)]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Partial update. No package field: the link is only written by the matching
/// operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAlertChanges {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_weight: Option<Decimal>,
    #[serde(default)]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<PreAlertStatus>,
}

impl PreAlertChanges {
    pub fn cancel() -> Self {
        Self {
            status: Some(PreAlertStatus::Cancelled),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, record: &mut PreAlert) {
        if let Some(user_id) = self.user_id {
            record.user_id = user_id;
        }
        if let Some(tracking_number) = &self.tracking_number {
            record.tracking_number = tracking_number.clone();
        }
        if let Some(courier) = &self.courier {
            record.courier = courier.clone();
        }
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        if let Some(weight) = self.estimated_weight {
            record.estimated_weight = Some(weight);
        }
        if let Some(arrival) = self.estimated_arrival {
            record.estimated_arrival = Some(arrival);
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    EstimatedArrival,
    TrackingNumber,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Resolved ordering. An unknown key resets to newest-first regardless of the
/// requested direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreAlertSort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl PreAlertSort {
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        let order = match sort_order.map(|raw| raw.trim().to_ascii_lowercase()) {
            Some(value) if value == "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        match sort_by.map(str::trim) {
            None | Some("") => Self {
                key: SortKey::CreatedAt,
                order,
            },
            Some("createdAt") => Self {
                key: SortKey::CreatedAt,
                order,
            },
            Some("estimatedArrival") => Self {
                key: SortKey::EstimatedArrival,
                order,
            },
            Some("trackingNumber") => Self {
                key: SortKey::TrackingNumber,
                order,
            },
            Some(_) => Self::default(),
        }
    }
}

/// Raw query-string filters for the search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAlertQuery {
    #[serde(default, alias = "search")]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub estimated_arrival_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_arrival_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default, alias = "pageSize")]
    pub limit: Option<u64>,
}

impl PreAlertQuery {
    /// Normalize the query. Unrecognized status values are ignored rather than
    /// rejected so a stale UI filter still returns rows.
    pub fn into_search(self) -> PreAlertSearch {
        PreAlertSearch {
            tracking_number: self
                .tracking_number
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            user_id: self.user_id,
            status: self.status.as_deref().and_then(PreAlertStatus::parse),
            arrival_from: self.estimated_arrival_from,
            arrival_to: self.estimated_arrival_to,
            sort: PreAlertSort::parse(self.sort_by.as_deref(), self.sort_order.as_deref()),
            page: PageRequest::new(self.page, self.limit),
        }
    }
}

/// Normalized search consumed by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreAlertSearch {
    pub tracking_number: Option<String>,
    pub user_id: Option<UserId>,
    pub status: Option<PreAlertStatus>,
    pub arrival_from: Option<DateTime<Utc>>,
    pub arrival_to: Option<DateTime<Utc>>,
    pub sort: PreAlertSort,
    pub page: PageRequest,
}

impl PreAlertSearch {
    pub fn matches(&self, record: &PreAlert) -> bool {
        if let Some(needle) = &self.tracking_number {
            let haystack = record.tracking_number.to_lowercase();
            if !haystack.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if record.user_id != user_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if self.arrival_from.is_some() || self.arrival_to.is_some() {
            let Some(arrival) = record.estimated_arrival else {
                return false;
            };
            if self.arrival_from.is_some_and(|from| arrival < from) {
                return false;
            }
            if self.arrival_to.is_some_and(|to| arrival > to) {
                return false;
            }
        }
        true
    }
}
