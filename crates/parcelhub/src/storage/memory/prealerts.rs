use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::pagination::Paginated;
use crate::storage::{lock, RepositoryError};
use crate::tenancy::CompanyScope;
use crate::workflows::accounts::UserId;
use crate::workflows::packages::PackageId;
use crate::workflows::prealerts::{
    PreAlert, PreAlertChanges, PreAlertId, PreAlertRepository, PreAlertSearch, PreAlertSort,
    PreAlertStatus, SortKey, SortOrder,
};

/// Pre-alert store backed by a single mutex. Every conditional write checks its
/// guard and mutates under the same lock, which gives the one-winner semantics a
/// `WHERE status = 'pending'` update would give in SQL.
#[derive(Default, Clone)]
pub struct InMemoryPreAlertRepository {
    records: Arc<Mutex<HashMap<PreAlertId, PreAlert>>>,
}

impl InMemoryPreAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<F>(&self, scope: CompanyScope, keep: F) -> Result<Vec<PreAlert>, RepositoryError>
    where
        F: Fn(&PreAlert) -> bool,
    {
        let guard = lock(&self.records)?;
        let mut rows: Vec<PreAlert> = scope
            .visible(guard.values())
            .filter(|record| keep(*record))
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }
}

fn newest_first(a: &PreAlert, b: &PreAlert) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn by_sort(sort: PreAlertSort, a: &PreAlert, b: &PreAlert) -> Ordering {
    let primary = match sort.key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::EstimatedArrival => a.estimated_arrival.cmp(&b.estimated_arrival),
        SortKey::TrackingNumber => a.tracking_number.cmp(&b.tracking_number),
    };
    let ordering = primary
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id));
    match sort.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

impl PreAlertRepository for InMemoryPreAlertRepository {
    fn insert(&self, record: PreAlert) -> Result<PreAlert, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_by_id(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(scope.scoped(guard.get(id)).cloned())
    }

    /// Several pre-alerts may share a tracking number; an unmatched one wins,
    /// then the most recent.
    fn find_by_tracking_number(
        &self,
        tracking_number: &str,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let guard = lock(&self.records)?;
        let needle = tracking_number.trim();
        let found = scope
            .visible(guard.values())
            .filter(|record| record.tracking_number == needle)
            .max_by_key(|record| (record.is_unmatched(), record.created_at))
            .cloned();
        Ok(found)
    }

    fn find_by_package(
        &self,
        package_id: &PackageId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let guard = lock(&self.records)?;
        let found = scope
            .visible(guard.values())
            .find(|record| record.package_id.as_ref() == Some(package_id))
            .cloned();
        Ok(found)
    }

    fn find_by_user(
        &self,
        user_id: &UserId,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, RepositoryError> {
        self.collect(scope, |record| &record.user_id == user_id)
    }

    fn find_by_status(
        &self,
        status: PreAlertStatus,
        scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, RepositoryError> {
        self.collect(scope, |record| record.status == status)
    }

    fn find_unmatched(&self, scope: CompanyScope) -> Result<Vec<PreAlert>, RepositoryError> {
        let mut rows = self.collect(scope, PreAlert::is_unmatched)?;
        // Unknown arrival sorts last.
        rows.sort_by(|a, b| {
            (a.estimated_arrival.is_none(), a.estimated_arrival, a.created_at).cmp(&(
                b.estimated_arrival.is_none(),
                b.estimated_arrival,
                b.created_at,
            ))
        });
        Ok(rows)
    }

    fn list(&self, scope: CompanyScope) -> Result<Vec<PreAlert>, RepositoryError> {
        self.collect(scope, |_| true)
    }

    fn search(
        &self,
        scope: CompanyScope,
        search: &PreAlertSearch,
    ) -> Result<Paginated<PreAlert>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut rows: Vec<PreAlert> = scope
            .visible(guard.values())
            .filter(|record| search.matches(record))
            .cloned()
            .collect();
        drop(guard);

        rows.sort_by(|a, b| by_sort(search.sort, a, b));
        Ok(Paginated::from_sorted(rows, search.page))
    }

    fn update(
        &self,
        id: &PreAlertId,
        changes: &PreAlertChanges,
        expected: PreAlertStatus,
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let Some(record) = scope.scoped_mut(guard.get_mut(id)) else {
            return Ok(None);
        };
        if record.status != expected {
            return Ok(None);
        }
        changes.apply(record);
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    fn match_to_package(
        &self,
        id: &PreAlertId,
        package_id: &PackageId,
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let package_taken = scope
            .visible(guard.values())
            .any(|record| record.package_id.as_ref() == Some(package_id) && &record.id != id);
        if package_taken {
            return Ok(None);
        }

        let Some(record) = scope.scoped_mut(guard.get_mut(id)) else {
            return Ok(None);
        };
        if !record.is_unmatched() {
            return Ok(None);
        }
        record.package_id = Some(*package_id);
        record.status = PreAlertStatus::Matched;
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    fn delete(
        &self,
        id: &PreAlertId,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        match scope.scoped(guard.get(id)) {
            Some(record) if record.package_id.is_none() => {}
            _ => return Ok(None),
        }
        Ok(guard.remove(id))
    }

    fn append_documents(
        &self,
        id: &PreAlertId,
        documents: &[String],
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let Some(record) = scope.scoped_mut(guard.get_mut(id)) else {
            return Ok(None);
        };
        record.documents.extend(documents.iter().cloned());
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    fn remove_document(
        &self,
        id: &PreAlertId,
        index: usize,
        now: DateTime<Utc>,
        scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let Some(record) = scope.scoped_mut(guard.get_mut(id)) else {
            return Ok(None);
        };
        if index >= record.documents.len() {
            return Ok(None);
        }
        record.documents.remove(index);
        record.updated_at = now;
        Ok(Some(record.clone()))
    }
}
