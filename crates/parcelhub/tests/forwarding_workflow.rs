//! End-to-end behavior of pre-alert filing, package intake and matching, and
//! company onboarding through the public routers.
//!
//! Everything here goes through HTTP against the in-memory stores so tenant
//! scoping and status codes are checked the way a client sees them.

mod common {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use axum::Router;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use parcelhub::clock::{Clock, ManualClock};
    use parcelhub::config::{InvitationSettings, PreAlertSettings};
    use parcelhub::storage::memory::{
        InMemoryCompanyRepository, InMemoryInvitationRepository, InMemoryPackageRepository,
        InMemoryPreAlertRepository, InMemoryUserRepository,
    };
    use parcelhub::tenancy::{CompanyId, CompanyScope};
    use parcelhub::workflows::accounts::{User, UserId, UserRepository, UserRole};
    use parcelhub::workflows::invitations::{
        invitation_router, InvitationMailer, InvitationService, MailError,
    };
    use parcelhub::workflows::packages::{package_router, PackageService};
    use parcelhub::workflows::prealerts::{
        prealert_router, CustomerNotifier, MatchNotice, NotificationError, PreAlertApi,
        PreAlertMatcher, PreAlertService,
    };

    pub(super) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 7, 14, 0, 0)
            .single()
            .expect("valid start time")
    }

    #[derive(Default)]
    pub(super) struct Outbox {
        notices: Mutex<Vec<MatchNotice>>,
        links: Mutex<Vec<String>>,
    }

    impl Outbox {
        pub(super) fn notices(&self) -> Vec<MatchNotice> {
            self.notices.lock().expect("outbox mutex poisoned").clone()
        }

        /// Token carried by the most recent invitation link.
        pub(super) fn last_token(&self) -> String {
            let links = self.links.lock().expect("outbox mutex poisoned");
            let link = links.last().expect("an invitation was mailed");
            link.split("token=")
                .nth(1)
                .expect("link carries a token")
                .to_string()
        }
    }

    impl CustomerNotifier for Outbox {
        fn pre_alert_matched(&self, notice: &MatchNotice) -> Result<(), NotificationError> {
            self.notices
                .lock()
                .expect("outbox mutex poisoned")
                .push(notice.clone());
            Ok(())
        }
    }

    impl InvitationMailer for Outbox {
        fn send_company_invitation(&self, _email: &str, link: &str) -> Result<(), MailError> {
            self.links
                .lock()
                .expect("outbox mutex poisoned")
                .push(link.to_string());
            Ok(())
        }

        fn send_welcome(&self, _email: &str, _first_name: &str) -> Result<(), MailError> {
            Ok(())
        }
    }

    pub(super) struct Platform {
        pub(super) clock: ManualClock,
        pub(super) users: Arc<InMemoryUserRepository>,
        pub(super) outbox: Arc<Outbox>,
        router: Router,
    }

    impl Platform {
        pub(super) fn new() -> Self {
            let clock = ManualClock::new(start());
            let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
            let pre_alerts = Arc::new(InMemoryPreAlertRepository::new());
            let packages = Arc::new(InMemoryPackageRepository::new());
            let users = Arc::new(InMemoryUserRepository::new());
            let companies = Arc::new(InMemoryCompanyRepository::new());
            let invitations = Arc::new(InMemoryInvitationRepository::new());
            let outbox = Arc::new(Outbox::default());

            let service = Arc::new(PreAlertService::new(
                pre_alerts.clone(),
                users.clone(),
                shared_clock.clone(),
                PreAlertSettings::default(),
            ));
            let matcher = Arc::new(PreAlertMatcher::new(
                pre_alerts,
                packages.clone(),
                outbox.clone(),
                shared_clock.clone(),
            ));
            let package_service = Arc::new(PackageService::new(
                packages,
                users.clone(),
                matcher.clone(),
                shared_clock.clone(),
            ));
            let invitation_service = Arc::new(InvitationService::new(
                invitations,
                companies,
                users.clone(),
                outbox.clone(),
                shared_clock,
                InvitationSettings::default(),
            ));

            let router = Router::new()
                .merge(prealert_router(Arc::new(PreAlertApi::new(service, matcher))))
                .merge(package_router(package_service))
                .merge(invitation_router(invitation_service));

            Self {
                clock,
                users,
                outbox,
                router,
            }
        }

        pub(super) fn tenant(&self, email: &str) -> (CompanyScope, User) {
            let scope = CompanyScope::new(CompanyId::new());
            let customer = self
                .users
                .insert(User {
                    id: UserId::new(),
                    company_id: scope.company_id(),
                    email: email.to_string(),
                    first_name: "Devon".to_string(),
                    last_name: "Clarke".to_string(),
                    phone: None,
                    role: UserRole::Customer,
                    password_hash: "unused".to_string(),
                    created_at: start(),
                })
                .expect("customer stored");
            (scope, customer)
        }

        pub(super) async fn call(&self, request: Request<Body>) -> (u16, Value) {
            let response: Response = self
                .router
                .clone()
                .oneshot(request)
                .await
                .expect("route executes");
            let status = response.status().as_u16();
            let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
                .await
                .expect("read body");
            (status, serde_json::from_slice(&body).expect("json payload"))
        }

        pub(super) async fn post(&self, uri: &str, body: Value) -> (u16, Value) {
            self.call(json_request("POST", uri, body)).await
        }

        pub(super) async fn put(&self, uri: &str, body: Value) -> (u16, Value) {
            self.call(json_request("PUT", uri, body)).await
        }

        pub(super) async fn patch(&self, uri: &str) -> (u16, Value) {
            self.call(empty_request("PATCH", uri)).await
        }

        pub(super) async fn get(&self, uri: &str) -> (u16, Value) {
            self.call(empty_request("GET", uri)).await
        }

        pub(super) async fn delete(&self, uri: &str) -> (u16, Value) {
            self.call(empty_request("DELETE", uri)).await
        }
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
            .expect("request")
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    pub(super) fn pre_alerts(scope: CompanyScope) -> String {
        format!("/api/v1/companies/{}/pre-alerts", scope.company_id())
    }

    pub(super) fn packages(scope: CompanyScope) -> String {
        format!("/api/v1/companies/{}/packages", scope.company_id())
    }
}

use chrono::Duration;
use serde_json::json;

use common::*;

#[tokio::test]
async fn pre_alert_is_matched_once_and_customer_is_told() {
    let platform = Platform::new();
    let (scope, customer) = platform.tenant("devon@example.test");

    let (status, created) = platform
        .post(
            &pre_alerts(scope),
            json!({ "trackingNumber": "1Z999", "courier": "UPS", "userId": customer.id }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(created["data"]["status"], "pending");
    assert!(created["data"]["packageId"].is_null());
    let pre_alert_id = created["data"]["id"].as_str().expect("id").to_string();

    let (status, first) = platform
        .post(&packages(scope), json!({ "trackingNumber": "WH-0001" }))
        .await;
    assert_eq!(status, 201);
    assert!(first["data"]["matchedPreAlert"].is_null());
    let first_id = first["data"]["package"]["id"].as_str().expect("id").to_string();

    let (_, second) = platform
        .post(&packages(scope), json!({ "trackingNumber": "WH-0002" }))
        .await;
    let second_id = second["data"]["package"]["id"].as_str().expect("id").to_string();

    let match_uri = format!("{}/{pre_alert_id}/match", pre_alerts(scope));
    let (status, matched) = platform
        .post(&match_uri, json!({ "packageId": first_id, "sendNotification": true }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(matched["data"]["status"], "matched");
    assert_eq!(matched["data"]["packageId"], first_id.as_str());
    assert_eq!(platform.outbox.notices().len(), 1);

    let (status, _) = platform
        .post(&match_uri, json!({ "packageId": second_id }))
        .await;
    assert_eq!(status, 409);

    let (_, current) = platform
        .get(&format!("{}/{pre_alert_id}", pre_alerts(scope)))
        .await;
    assert_eq!(current["data"]["packageId"], first_id.as_str());
}

#[tokio::test]
async fn package_intake_links_the_waiting_pre_alert() {
    let platform = Platform::new();
    let (scope, customer) = platform.tenant("devon@example.test");

    platform
        .post(
            &pre_alerts(scope),
            json!({ "trackingNumber": "1ZINTAKE", "courier": "DHL", "userId": customer.id }),
        )
        .await;

    let (status, registered) = platform
        .post(
            &packages(scope),
            json!({ "trackingNumber": "1ZINTAKE", "userId": customer.id, "weight": "3.2" }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(registered["data"]["matchedPreAlert"]["status"], "matched");
    assert_eq!(
        registered["data"]["matchedPreAlert"]["packageId"],
        registered["data"]["package"]["id"]
    );
    assert!(platform.outbox.notices().is_empty());

    let (_, unmatched) = platform
        .get(&format!("{}/unmatched", pre_alerts(scope)))
        .await;
    assert_eq!(unmatched["data"], json!([]));

    let (status, _) = platform
        .post(&packages(scope), json!({ "trackingNumber": "1ZINTAKE" }))
        .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn cancelled_pre_alert_cannot_be_cancelled_or_matched() {
    let platform = Platform::new();
    let (scope, customer) = platform.tenant("devon@example.test");

    let (_, created) = platform
        .post(
            &pre_alerts(scope),
            json!({ "trackingNumber": "1ZCANCEL", "courier": "UPS", "userId": customer.id }),
        )
        .await;
    let item = format!(
        "{}/{}",
        pre_alerts(scope),
        created["data"]["id"].as_str().expect("id")
    );

    let (status, cancelled) = platform.patch(&format!("{item}/cancel")).await;
    assert_eq!(status, 200);
    assert_eq!(cancelled["data"]["status"], "cancelled");

    let (status, _) = platform.patch(&format!("{item}/cancel")).await;
    assert_eq!(status, 409);

    let (_, package) = platform
        .post(&packages(scope), json!({ "trackingNumber": "WH-CANCEL" }))
        .await;
    let (status, _) = platform
        .post(
            &format!("{item}/match"),
            json!({ "packageId": package["data"]["package"]["id"] }),
        )
        .await;
    assert_eq!(status, 409);

    let (status, _) = platform.put(&item, json!({ "status": "pending" })).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn another_company_cannot_see_or_touch_a_pre_alert() {
    let platform = Platform::new();
    let (owner, customer) = platform.tenant("devon@example.test");
    let (intruder, _) = platform.tenant("mallory@example.test");

    let (_, created) = platform
        .post(
            &pre_alerts(owner),
            json!({ "trackingNumber": "1ZPRIVATE", "courier": "UPS", "userId": customer.id }),
        )
        .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();
    let foreign_item = format!("{}/{id}", pre_alerts(intruder));

    assert_eq!(platform.get(&foreign_item).await.0, 404);
    assert_eq!(
        platform
            .put(&foreign_item, json!({ "description": "hijacked" }))
            .await
            .0,
        404
    );
    assert_eq!(platform.patch(&format!("{foreign_item}/cancel")).await.0, 404);
    assert_eq!(platform.delete(&foreign_item).await.0, 404);
    assert_eq!(
        platform
            .post(&format!("{foreign_item}/documents"), json!({ "documents": ["x"] }))
            .await
            .0,
        404
    );

    let (_, listed) = platform.get(&pre_alerts(intruder)).await;
    assert_eq!(listed["data"]["pagination"]["total"], 0);

    let (_, filed_for_outsider) = platform
        .post(
            &pre_alerts(intruder),
            json!({ "trackingNumber": "1ZSNEAK", "courier": "UPS", "userId": customer.id }),
        )
        .await;
    assert_eq!(filed_for_outsider["message"], "User not found");

    let (status, untouched) = platform
        .get(&format!("{}/{id}", pre_alerts(owner)))
        .await;
    assert_eq!(status, 200);
    assert_eq!(untouched["data"]["status"], "pending");
    assert!(untouched["data"]["description"].is_null());
    assert_eq!(untouched["data"]["documents"], json!([]));
}

#[tokio::test]
async fn repeated_invitation_for_pending_email_is_rejected() {
    let platform = Platform::new();

    let (status, _) = platform
        .post("/api/v1/company-invitations", json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, 201);

    let (status, body) = platform
        .post("/api/v1/company-invitations", json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, 400);
    assert!(body["message"]
        .as_str()
        .is_some_and(|message| message.contains("already a pending invitation")));
}

#[tokio::test]
async fn invitation_stops_verifying_once_expired() {
    let platform = Platform::new();
    platform
        .post("/api/v1/company-invitations", json!({ "email": "owner@freight.test" }))
        .await;
    let verify_uri = format!(
        "/api/v1/company-invitations/verify/{}",
        platform.outbox.last_token()
    );

    let (_, fresh) = platform.get(&verify_uri).await;
    assert_eq!(fresh["data"]["isValid"], true);

    platform.clock.advance(Duration::hours(24));
    let (_, lapsed) = platform.get(&verify_uri).await;
    assert_eq!(lapsed["data"]["isValid"], false);

    let (_, listed) = platform.get("/api/v1/company-invitations").await;
    assert_eq!(listed["data"]["data"][0]["isExpired"], true);
    assert_eq!(listed["data"]["data"][0]["status"], "pending");
}

#[tokio::test]
async fn resend_replaces_the_token() {
    let platform = Platform::new();
    platform
        .post("/api/v1/company-invitations", json!({ "email": "owner@freight.test" }))
        .await;
    let old_token = platform.outbox.last_token();
    let (_, listed) = platform.get("/api/v1/company-invitations?search=owner@freight.test").await;
    let id = listed["data"]["data"][0]["id"].as_u64().expect("numeric id");

    let (status, _) = platform
        .post(&format!("/api/v1/company-invitations/{id}/resend"), json!({}))
        .await;
    assert_eq!(status, 200);
    let new_token = platform.outbox.last_token();
    assert_ne!(old_token, new_token);

    let (_, old) = platform
        .get(&format!("/api/v1/company-invitations/verify/{old_token}"))
        .await;
    assert_eq!(old["data"]["isValid"], false);
    let (_, new) = platform
        .get(&format!("/api/v1/company-invitations/verify/{new_token}"))
        .await;
    assert_eq!(new["data"]["isValid"], true);
}

#[tokio::test]
async fn invited_company_registers_once() {
    let platform = Platform::new();
    let (status, sent) = platform
        .post("/api/v1/company-invitations", json!({ "email": "owner@freight.test" }))
        .await;
    assert_eq!(status, 201);
    assert!(sent["data"].is_null());
    let token = platform.outbox.last_token();

    let body = json!({
        "user": { "firstName": "Nadine", "lastName": "Grant", "password": "harbour-lights-42" },
        "company": {
            "name": "Freight Co",
            "subdomain": "freightco",
            "email": "hello@freight.test",
            "phone": "+1 876 555 0199",
            "addressLine1": "1 Port Royal Rd",
            "city": "Kingston",
            "state": "",
            "postalCode": "",
            "country": "Jamaica",
            "locations": ["Kingston", "Montego Bay"]
        }
    });
    let register_uri = format!("/api/v1/company-invitations/register/{token}");

    let (status, registered) = platform.post(&register_uri, body.clone()).await;
    assert_eq!(status, 201);
    assert_eq!(registered["data"]["admin"]["role"], "admin_l2");
    assert_eq!(registered["data"]["admin"]["email"], "owner@freight.test");
    assert_eq!(
        registered["data"]["company"]["address"],
        "1 Port Royal Rd, Kingston, Jamaica"
    );

    let (_, accepted) = platform
        .get("/api/v1/company-invitations?status=accepted")
        .await;
    assert_eq!(accepted["data"]["pagination"]["total"], 1);
    assert_eq!(accepted["data"]["data"][0]["email"], "owner@freight.test");
    assert_eq!(
        accepted["data"]["data"][0]["companyId"],
        registered["data"]["company"]["id"]
    );

    let (status, again) = platform.post(&register_uri, body).await;
    assert_eq!(status, 400);
    assert_eq!(again["message"], "Invalid or expired invitation");
}
