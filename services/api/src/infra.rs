use metrics_exporter_prometheus::PrometheusHandle;
use parcelhub::clock::Clock;
use parcelhub::config::{InvitationSettings, PreAlertSettings};
use parcelhub::storage::memory::{
    InMemoryCompanyRepository, InMemoryInvitationRepository, InMemoryPackageRepository,
    InMemoryPreAlertRepository, InMemoryUserRepository,
};
use parcelhub::workflows::invitations::{InvitationMailer, InvitationService, MailError};
use parcelhub::workflows::packages::PackageService;
use parcelhub::workflows::prealerts::{
    CustomerNotifier, MatchNotice, NotificationError, PreAlertApi, PreAlertMatcher,
    PreAlertService,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type PreAlerts = PreAlertService<InMemoryPreAlertRepository, InMemoryUserRepository>;
pub(crate) type Matcher =
    PreAlertMatcher<InMemoryPreAlertRepository, InMemoryPackageRepository, OutboxNotifier>;
pub(crate) type Packages = PackageService<
    InMemoryPackageRepository,
    InMemoryPreAlertRepository,
    InMemoryUserRepository,
    OutboxNotifier,
>;
pub(crate) type Invitations = InvitationService<
    InMemoryInvitationRepository,
    InMemoryCompanyRepository,
    InMemoryUserRepository,
    OutboxMailer,
>;

/// Services wired over one set of in-memory stores and a shared clock.
pub(crate) struct Platform {
    pub(crate) pre_alerts: Arc<PreAlertApi<
        InMemoryPreAlertRepository,
        InMemoryUserRepository,
        InMemoryPackageRepository,
        OutboxNotifier,
    >>,
    pub(crate) packages: Arc<Packages>,
    pub(crate) invitations: Arc<Invitations>,
    pub(crate) users: Arc<InMemoryUserRepository>,
    pub(crate) notifier: Arc<OutboxNotifier>,
    pub(crate) mailer: Arc<OutboxMailer>,
}

impl Platform {
    pub(crate) fn in_memory(
        invitation_settings: InvitationSettings,
        pre_alert_settings: PreAlertSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pre_alert_store = Arc::new(InMemoryPreAlertRepository::new());
        let package_store = Arc::new(InMemoryPackageRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let notifier = Arc::new(OutboxNotifier::default());
        let mailer = Arc::new(OutboxMailer::default());

        let service: Arc<PreAlerts> = Arc::new(PreAlertService::new(
            pre_alert_store.clone(),
            users.clone(),
            clock.clone(),
            pre_alert_settings,
        ));
        let matcher: Arc<Matcher> = Arc::new(PreAlertMatcher::new(
            pre_alert_store,
            package_store.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let packages = Arc::new(PackageService::new(
            package_store,
            users.clone(),
            matcher.clone(),
            clock.clone(),
        ));
        let invitations = Arc::new(InvitationService::new(
            Arc::new(InMemoryInvitationRepository::new()),
            Arc::new(InMemoryCompanyRepository::new()),
            users.clone(),
            mailer.clone(),
            clock,
            invitation_settings,
        ));

        Self {
            pre_alerts: Arc::new(PreAlertApi::new(service, matcher)),
            packages,
            invitations,
            users,
            notifier,
            mailer,
        }
    }
}

/// Mail captured in the process outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutboundMail {
    Invitation { email: String, link: String },
    Welcome { email: String, first_name: String },
}

/// Stand-in for an SMTP relay: every message is logged and kept in memory.
#[derive(Default, Clone)]
pub(crate) struct OutboxMailer {
    sent: Arc<Mutex<Vec<OutboundMail>>>,
}

impl OutboxMailer {
    pub(crate) fn sent(&self) -> Vec<OutboundMail> {
        self.sent.lock().expect("outbox mutex poisoned").clone()
    }

    /// Token from the most recent invitation link for `email`.
    pub(crate) fn latest_token_for(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|mail| match mail {
            OutboundMail::Invitation { email: to, link } if to.eq_ignore_ascii_case(email) => link
                .split_once("token=")
                .map(|(_, token)| token.to_string()),
            _ => None,
        })
    }
}

impl InvitationMailer for OutboxMailer {
    fn send_company_invitation(&self, email: &str, link: &str) -> Result<(), MailError> {
        info!(recipient = %email, "company invitation queued");
        debug!(recipient = %email, %link, "invitation link");
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("outbox mutex poisoned".to_string()))?
            .push(OutboundMail::Invitation {
                email: email.to_string(),
                link: link.to_string(),
            });
        Ok(())
    }

    fn send_welcome(&self, email: &str, first_name: &str) -> Result<(), MailError> {
        info!(recipient = %email, "welcome email queued");
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("outbox mutex poisoned".to_string()))?
            .push(OutboundMail::Welcome {
                email: email.to_string(),
                first_name: first_name.to_string(),
            });
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct OutboxNotifier {
    notices: Arc<Mutex<Vec<MatchNotice>>>,
}

impl OutboxNotifier {
    pub(crate) fn notices(&self) -> Vec<MatchNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl CustomerNotifier for OutboxNotifier {
    fn pre_alert_matched(&self, notice: &MatchNotice) -> Result<(), NotificationError> {
        info!(
            user_id = %notice.user_id,
            pre_alert_id = %notice.pre_alert_id,
            package_id = %notice.package_id,
            "customer notified of received package"
        );
        self.notices
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?
            .push(notice.clone());
        Ok(())
    }
}
