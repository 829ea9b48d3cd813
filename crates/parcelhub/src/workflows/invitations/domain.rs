use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pagination::PageRequest;
use crate::security::TokenDigest;
use crate::tenancy::CompanyId;
use crate::workflows::accounts::UserId;

/// Serial invitation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationId(pub u64);

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for InvitationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Stored invitation status. `Expired` exists for completeness of the wire
/// vocabulary; nothing writes it, expiry is derived from `expires_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInvitation {
    pub id: InvitationId,
    pub email: String,
    #[serde(skip_serializing)]
    pub token_digest: TokenDigest,
    pub company_id: Option<CompanyId>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl CompanyInvitation {
    /// Pending and not yet past its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && self.expires_at > now
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            InvitationStatus::Expired => true,
            InvitationStatus::Pending => self.expires_at <= now,
            InvitationStatus::Accepted | InvitationStatus::Cancelled => false,
        }
    }

    pub fn view(self, now: DateTime<Utc>) -> InvitationView {
        let is_expired = self.is_expired_at(now);
        InvitationView {
            invitation: self,
            is_expired,
        }
    }
}

/// Invitation as returned by the listing endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    #[serde(flatten)]
    pub invitation: CompanyInvitation,
    pub is_expired: bool,
}

/// Row handed to the store by `send`; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub token_digest: TokenDigest,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInvitationRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub issued_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyInvitationResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// First admin of the company being registered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantDetails {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub name: String,
    pub subdomain: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub bank_info: Option<String>,
}

impl CompanyDetails {
    /// Single-line address from the non-empty parts, joined by ", ".
    pub fn address(&self) -> String {
        [
            Some(self.address_line1.as_str()),
            self.address_line2.as_deref(),
            Some(self.city.as_str()),
            Some(self.state.as_str()),
            Some(self.postal_code.as_str()),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub user: Option<RegistrantDetails>,
    #[serde(default)]
    pub company: Option<CompanyDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default, alias = "pageSize")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Normalized listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationFilter {
    pub status: Option<InvitationStatus>,
    pub email_contains: Option<String>,
    pub page: PageRequest,
}

impl InvitationQuery {
    pub fn into_filter(self) -> InvitationFilter {
        InvitationFilter {
            status: self.status.as_deref().and_then(InvitationStatus::parse),
            email_contains: self
                .search
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty()),
            page: PageRequest::new(self.page, self.limit),
        }
    }
}

impl InvitationFilter {
    pub fn matches(&self, invitation: &CompanyInvitation) -> bool {
        if self.status.is_some_and(|status| invitation.status != status) {
            return false;
        }
        match &self.email_contains {
            Some(needle) => invitation.email.to_lowercase().contains(needle),
            None => true,
        }
    }
}
