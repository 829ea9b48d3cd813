use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::{Clock, ManualClock};
use crate::config::PreAlertSettings;
use crate::pagination::Paginated;
use crate::storage::memory::{
    InMemoryPackageRepository, InMemoryPreAlertRepository, InMemoryUserRepository,
};
use crate::storage::RepositoryError;
use crate::tenancy::{CompanyId, CompanyScope};
use crate::workflows::accounts::{User, UserId, UserRepository, UserRole};
use crate::workflows::packages::{Package, PackageId, PackageRepository, PackageStatus};
use crate::workflows::prealerts::{
    prealert_router, CustomerNotifier, MatchNotice, NotificationError, PreAlert, PreAlertApi,
    PreAlertChanges, PreAlertDraft, PreAlertId, PreAlertMatcher, PreAlertRepository,
    PreAlertSearch, PreAlertService, PreAlertStatus,
};

pub(super) type Service = PreAlertService<InMemoryPreAlertRepository, InMemoryUserRepository>;
pub(super) type Matcher =
    PreAlertMatcher<InMemoryPreAlertRepository, InMemoryPackageRepository, RecordingNotifier>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

pub(super) struct Fixture {
    pub(super) clock: ManualClock,
    pub(super) pre_alerts: Arc<InMemoryPreAlertRepository>,
    pub(super) packages: Arc<InMemoryPackageRepository>,
    pub(super) users: Arc<InMemoryUserRepository>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) service: Arc<Service>,
    pub(super) matcher: Arc<Matcher>,
    pub(super) scope: CompanyScope,
    pub(super) customer: User,
}

impl Fixture {
    pub(super) fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub(super) fn with_notifier(notifier: RecordingNotifier) -> Self {
        let clock = ManualClock::new(start());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let pre_alerts = Arc::new(InMemoryPreAlertRepository::new());
        let packages = Arc::new(InMemoryPackageRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let notifier = Arc::new(notifier);

        let service = Arc::new(PreAlertService::new(
            pre_alerts.clone(),
            users.clone(),
            shared_clock.clone(),
            PreAlertSettings::default(),
        ));
        let matcher = Arc::new(PreAlertMatcher::new(
            pre_alerts.clone(),
            packages.clone(),
            notifier.clone(),
            shared_clock,
        ));

        let scope = CompanyScope::new(CompanyId::new());
        let customer = add_customer(&users, scope, "customer@example.test");

        Self {
            clock,
            pre_alerts,
            packages,
            users,
            notifier,
            service,
            matcher,
            scope,
            customer,
        }
    }

    /// A second tenant with its own customer, sharing the same stores.
    pub(super) fn other_company(&self) -> (CompanyScope, User) {
        let scope = CompanyScope::new(CompanyId::new());
        let user = add_customer(&self.users, scope, "other@example.test");
        (scope, user)
    }

    pub(super) fn file(&self, tracking_number: &str) -> PreAlert {
        self.service
            .create(draft(self.customer.id, tracking_number), self.scope)
            .expect("pre-alert filed")
    }

    pub(super) fn receive(&self, tracking_number: &str) -> Package {
        add_package(&self.packages, self.scope, tracking_number, self.clock.now())
    }

    pub(super) fn router(&self) -> axum::Router {
        prealert_router(Arc::new(PreAlertApi::new(
            self.service.clone(),
            self.matcher.clone(),
        )))
    }
}

pub(super) fn add_customer(
    users: &InMemoryUserRepository,
    scope: CompanyScope,
    email: &str,
) -> User {
    users
        .insert(User {
            id: UserId::new(),
            company_id: scope.company_id(),
            email: email.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Brown".to_string(),
            phone: None,
            role: UserRole::Customer,
            password_hash: "not-a-real-hash".to_string(),
            created_at: start(),
        })
        .expect("customer stored")
}

pub(super) fn add_package(
    packages: &InMemoryPackageRepository,
    scope: CompanyScope,
    tracking_number: &str,
    now: DateTime<Utc>,
) -> Package {
    packages
        .insert(Package {
            id: PackageId::new(),
            company_id: scope.company_id(),
            user_id: None,
            tracking_number: tracking_number.to_string(),
            status: PackageStatus::Received,
            description: None,
            weight: None,
            received_date: Some(now),
            created_at: now,
            updated_at: now,
        })
        .expect("package stored")
}

pub(super) fn draft(user_id: UserId, tracking_number: &str) -> PreAlertDraft {
    PreAlertDraft {
        user_id,
        tracking_number: tracking_number.to_string(),
        courier: "FedEx".to_string(),
        description: Some("Laptop".to_string()),
        estimated_weight: None,
        estimated_arrival: None,
        documents: Vec::new(),
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<MatchNotice>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(super) fn failing() -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(super) fn notices(&self) -> Vec<MatchNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl CustomerNotifier for RecordingNotifier {
    fn pre_alert_matched(&self, notice: &MatchNotice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice.clone());
        if self.fail {
            return Err(NotificationError::Transport("smtp relay offline".to_string()));
        }
        Ok(())
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl PreAlertRepository for UnavailableRepository {
    fn insert(&self, _record: PreAlert) -> Result<PreAlert, RepositoryError> {
        offline()
    }

    fn find_by_id(
        &self,
        _id: &PreAlertId,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn find_by_tracking_number(
        &self,
        _tracking_number: &str,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn find_by_package(
        &self,
        _package_id: &PackageId,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn find_by_user(
        &self,
        _user_id: &UserId,
        _scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, RepositoryError> {
        offline()
    }

    fn find_by_status(
        &self,
        _status: PreAlertStatus,
        _scope: CompanyScope,
    ) -> Result<Vec<PreAlert>, RepositoryError> {
        offline()
    }

    fn find_unmatched(&self, _scope: CompanyScope) -> Result<Vec<PreAlert>, RepositoryError> {
        offline()
    }

    fn list(&self, _scope: CompanyScope) -> Result<Vec<PreAlert>, RepositoryError> {
        offline()
    }

    fn search(
        &self,
        _scope: CompanyScope,
        _search: &PreAlertSearch,
    ) -> Result<Paginated<PreAlert>, RepositoryError> {
        offline()
    }

    fn update(
        &self,
        _id: &PreAlertId,
        _changes: &PreAlertChanges,
        _expected: PreAlertStatus,
        _now: DateTime<Utc>,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn match_to_package(
        &self,
        _id: &PreAlertId,
        _package_id: &PackageId,
        _now: DateTime<Utc>,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn delete(
        &self,
        _id: &PreAlertId,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn append_documents(
        &self,
        _id: &PreAlertId,
        _documents: &[String],
        _now: DateTime<Utc>,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }

    fn remove_document(
        &self,
        _id: &PreAlertId,
        _index: usize,
        _now: DateTime<Utc>,
        _scope: CompanyScope,
    ) -> Result<Option<PreAlert>, RepositoryError> {
        offline()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
