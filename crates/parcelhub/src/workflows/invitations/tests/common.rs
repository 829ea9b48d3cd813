use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::{Clock, ManualClock};
use crate::config::InvitationSettings;
use crate::pagination::Paginated;
use crate::security::TokenDigest;
use crate::storage::memory::{
    InMemoryCompanyRepository, InMemoryInvitationRepository, InMemoryUserRepository,
};
use crate::storage::RepositoryError;
use crate::tenancy::{CompanyId, CompanyScope};
use crate::workflows::accounts::{Company, CompanyRepository, User, UserId, UserRepository};
use crate::workflows::invitations::{
    invitation_router, CompanyDetails, CompanyInvitation, InvitationFilter, InvitationId,
    InvitationMailer, InvitationRepository, InvitationService, MailError, NewInvitation,
    RegistrantDetails, RegistrationRequest,
};

pub(super) type Service = InvitationService<TestInvitations, TestCompanies, TestUsers, RecordingMailer>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 12, 8, 30, 0)
        .single()
        .expect("valid start time")
}

pub(super) struct Fixture {
    pub(super) clock: ManualClock,
    pub(super) invitations: Arc<TestInvitations>,
    pub(super) companies: Arc<TestCompanies>,
    pub(super) users: Arc<TestUsers>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) service: Arc<Service>,
}

impl Fixture {
    pub(super) fn new() -> Self {
        let clock = ManualClock::new(start());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let invitations = Arc::new(TestInvitations::default());
        let companies = Arc::new(TestCompanies::default());
        let users = Arc::new(TestUsers::default());
        let mailer = Arc::new(RecordingMailer::default());

        let service = Arc::new(InvitationService::new(
            invitations.clone(),
            companies.clone(),
            users.clone(),
            mailer.clone(),
            shared_clock,
            InvitationSettings {
                base_url: "https://app.parcelhub.test".to_string(),
                ..InvitationSettings::default()
            },
        ));

        Self {
            clock,
            invitations,
            companies,
            users,
            mailer,
            service,
        }
    }

    pub(super) fn router(&self) -> axum::Router {
        invitation_router(self.service.clone())
    }
}

pub(super) fn registrant() -> RegistrantDetails {
    RegistrantDetails {
        first_name: "Marcia".to_string(),
        last_name: "Reid".to_string(),
        password: "correct horse battery".to_string(),
        phone: Some("+1 876 555 0142".to_string()),
    }
}

pub(super) fn company_details(subdomain: &str) -> CompanyDetails {
    CompanyDetails {
        name: "Island Freight".to_string(),
        subdomain: subdomain.to_string(),
        email: "ops@islandfreight.test".to_string(),
        phone: "+1 876 555 0100".to_string(),
        address_line1: "12 Harbour St".to_string(),
        address_line2: None,
        city: "Kingston".to_string(),
        state: "St. Andrew".to_string(),
        postal_code: "JMAKN01".to_string(),
        country: "Jamaica".to_string(),
        website: None,
        locations: vec!["Kingston".to_string()],
        bank_info: None,
    }
}

pub(super) fn registration(subdomain: &str) -> RegistrationRequest {
    RegistrationRequest {
        user: Some(registrant()),
        company: Some(company_details(subdomain)),
    }
}

/// Invitation store with hooks that revoke the invitation, or reissue its token,
/// right before it is accepted, reproducing a lost acceptance race.
#[derive(Default)]
pub(super) struct TestInvitations {
    inner: InMemoryInvitationRepository,
    revoke_before_accept: AtomicBool,
    reissue_before_accept: AtomicBool,
}

impl TestInvitations {
    pub(super) fn revoke_before_accept(&self) {
        self.revoke_before_accept.store(true, Ordering::SeqCst);
    }

    pub(super) fn reissue_before_accept(&self) {
        self.reissue_before_accept.store(true, Ordering::SeqCst);
    }
}

impl InvitationRepository for TestInvitations {
    fn insert_pending(&self, new: NewInvitation) -> Result<CompanyInvitation, RepositoryError> {
        self.inner.insert_pending(new)
    }

    fn find_by_id(&self, id: InvitationId) -> Result<Option<CompanyInvitation>, RepositoryError> {
        self.inner.find_by_id(id)
    }

    fn find_pending_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompanyInvitation>, RepositoryError> {
        self.inner.find_pending_by_email(email, now)
    }

    fn find_valid_by_token(
        &self,
        digest: &TokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        self.inner.find_valid_by_token(digest, now)
    }

    fn rotate_token(
        &self,
        id: InvitationId,
        digest: TokenDigest,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        self.inner.rotate_token(id, digest, expires_at, now)
    }

    fn mark_accepted(
        &self,
        id: InvitationId,
        digest: &TokenDigest,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        if self.revoke_before_accept.load(Ordering::SeqCst) {
            self.inner.mark_cancelled(id, now)?;
        }
        if self.reissue_before_accept.load(Ordering::SeqCst) {
            self.inner.rotate_token(
                id,
                TokenDigest::of("reissued-elsewhere"),
                now + chrono::Duration::hours(24),
                now,
            )?;
        }
        self.inner.mark_accepted(id, digest, company_id, now)
    }

    fn mark_cancelled(
        &self,
        id: InvitationId,
        now: DateTime<Utc>,
    ) -> Result<Option<CompanyInvitation>, RepositoryError> {
        self.inner.mark_cancelled(id, now)
    }

    fn list(
        &self,
        filter: &InvitationFilter,
    ) -> Result<Paginated<CompanyInvitation>, RepositoryError> {
        self.inner.list(filter)
    }
}

/// Company store that tracks live rows and can refuse deletes.
#[derive(Default)]
pub(super) struct TestCompanies {
    inner: InMemoryCompanyRepository,
    live: Mutex<HashSet<CompanyId>>,
    refuse_delete: AtomicBool,
}

impl TestCompanies {
    pub(super) fn refuse_delete(&self) {
        self.refuse_delete.store(true, Ordering::SeqCst);
    }

    pub(super) fn live(&self) -> HashSet<CompanyId> {
        self.live.lock().expect("companies mutex poisoned").clone()
    }
}

impl CompanyRepository for TestCompanies {
    fn insert(&self, company: Company) -> Result<Option<Company>, RepositoryError> {
        let stored = self.inner.insert(company)?;
        if let Some(company) = &stored {
            self.live
                .lock()
                .expect("companies mutex poisoned")
                .insert(company.id);
        }
        Ok(stored)
    }

    fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.find_by_id(id)
    }

    fn delete(&self, id: &CompanyId) -> Result<bool, RepositoryError> {
        if self.refuse_delete.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("delete refused".to_string()));
        }
        let removed = self.inner.delete(id)?;
        self.live.lock().expect("companies mutex poisoned").remove(id);
        Ok(removed)
    }
}

/// User store that can be told to fail inserts.
#[derive(Default)]
pub(super) struct TestUsers {
    inner: InMemoryUserRepository,
    fail_insert: AtomicBool,
}

impl TestUsers {
    pub(super) fn fail_insert(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }
}

impl UserRepository for TestUsers {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("users table locked".to_string()));
        }
        self.inner.insert(user)
    }

    fn find_by_id(&self, id: &UserId, scope: CompanyScope) -> Result<Option<User>, RepositoryError> {
        self.inner.find_by_id(id, scope)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.inner.find_by_email(email)
    }

    fn delete(&self, id: &UserId, scope: CompanyScope) -> Result<bool, RepositoryError> {
        self.inner.delete(id, scope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SentMail {
    Invitation { email: String, link: String },
    Welcome { email: String, first_name: String },
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    offline: AtomicBool,
}

impl RecordingMailer {
    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(super) fn come_back(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    pub(super) fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }

    fn record(&self, mail: SentMail) -> Result<(), MailError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MailError::Transport("smtp relay offline".to_string()));
        }
        self.sent.lock().expect("mailer mutex poisoned").push(mail);
        Ok(())
    }
}

impl InvitationMailer for RecordingMailer {
    fn send_company_invitation(&self, email: &str, link: &str) -> Result<(), MailError> {
        self.record(SentMail::Invitation {
            email: email.to_string(),
            link: link.to_string(),
        })
    }

    fn send_welcome(&self, email: &str, first_name: &str) -> Result<(), MailError> {
        self.record(SentMail::Welcome {
            email: email.to_string(),
            first_name: first_name.to_string(),
        })
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
