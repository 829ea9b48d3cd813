use rust_decimal::Decimal;

use super::domain::{PreAlertChanges, PreAlertDraft};

const TRACKING_NUMBER_LEN: (usize, usize) = (3, 100);
const COURIER_LEN: (usize, usize) = (2, 50);

/// Schema violations raised before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreAlertValidationError {
    #[error("trackingNumber must be between 3 and 100 characters")]
    TrackingNumberLength,
    #[error("courier must be between 2 and 50 characters")]
    CourierLength,
    #[error("estimatedWeight must be positive")]
    NonPositiveWeight,
    #[error("document references must not be blank")]
    BlankDocument,
    #[error("at least one document reference is required")]
    NoDocuments,
    #[error("Invalid document index")]
    InvalidDocumentIndex,
    #[error("Invalid pre-alert status")]
    UnknownStatus,
}

pub fn validate_draft(draft: &PreAlertDraft) -> Result<(), PreAlertValidationError> {
    tracking_number(&draft.tracking_number)?;
    courier(&draft.courier)?;
    weight(draft.estimated_weight)?;
    documents(&draft.documents)
}

pub fn validate_changes(changes: &PreAlertChanges) -> Result<(), PreAlertValidationError> {
    if let Some(value) = &changes.tracking_number {
        tracking_number(value)?;
    }
    if let Some(value) = &changes.courier {
        courier(value)?;
    }
    weight(changes.estimated_weight)
}

pub fn documents(references: &[String]) -> Result<(), PreAlertValidationError> {
    if references.iter().any(|reference| reference.trim().is_empty()) {
        return Err(PreAlertValidationError::BlankDocument);
    }
    Ok(())
}

fn tracking_number(value: &str) -> Result<(), PreAlertValidationError> {
    within(value, TRACKING_NUMBER_LEN)
        .then_some(())
        .ok_or(PreAlertValidationError::TrackingNumberLength)
}

fn courier(value: &str) -> Result<(), PreAlertValidationError> {
    within(value, COURIER_LEN)
        .then_some(())
        .ok_or(PreAlertValidationError::CourierLength)
}

fn weight(value: Option<Decimal>) -> Result<(), PreAlertValidationError> {
    match value {
        Some(weight) if weight <= Decimal::ZERO => Err(PreAlertValidationError::NonPositiveWeight),
        _ => Ok(()),
    }
}

fn within(value: &str, (min, max): (usize, usize)) -> bool {
    let len = value.chars().count();
    (min..=max).contains(&len)
}
