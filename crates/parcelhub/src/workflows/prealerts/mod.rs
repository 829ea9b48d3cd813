//! Pre-alerts: customer notices of inbound shipments and their matching to
//! received packages.

pub mod domain;
pub mod matching;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

pub use domain::{
    PreAlert, PreAlertChanges, PreAlertDraft, PreAlertId, PreAlertQuery, PreAlertSearch,
    PreAlertSort, PreAlertStatus, SortKey, SortOrder,
};
pub use matching::{CustomerNotifier, MatchError, MatchNotice, NotificationError, PreAlertMatcher};
pub use repository::PreAlertRepository;
pub use router::{prealert_router, PreAlertApi};
pub use service::{PreAlertService, PreAlertServiceError};
pub use validation::PreAlertValidationError;

#[cfg(test)]
mod tests;
