use crate::infra::{OutboundMail, Platform};
use chrono::{Duration, Utc};
use clap::Args;
use parcelhub::clock::{Clock, ManualClock};
use parcelhub::config::{InvitationSettings, PreAlertSettings};
use parcelhub::error::AppError;
use parcelhub::tenancy::CompanyScope;
use parcelhub::workflows::accounts::{User, UserId, UserRepository, UserRole};
use parcelhub::workflows::invitations::{CompanyDetails, RegistrantDetails, RegistrationRequest};
use parcelhub::workflows::packages::PackageDraft;
use parcelhub::workflows::prealerts::PreAlertDraft;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Email address the company invitation is sent to
    #[arg(long, default_value = "owner@islandfreight.test")]
    pub(crate) email: String,
    /// Subdomain requested for the new company
    #[arg(long, default_value = "islandfreight")]
    pub(crate) subdomain: String,
    /// Tracking number used for the pre-alert and the arriving package
    #[arg(long, default_value = "1Z999AA10123456784")]
    pub(crate) tracking_number: String,
    /// Skip the pre-alert and package intake portion of the demo
    #[arg(long)]
    pub(crate) skip_intake: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        email,
        subdomain,
        tracking_number,
        skip_intake,
    } = args;

    let clock = ManualClock::new(Utc::now());
    let platform = Platform::in_memory(
        InvitationSettings::default(),
        PreAlertSettings::default(),
        Arc::new(clock.clone()),
    );

    println!("ParcelHub onboarding demo");
    let issued = match platform.invitations.send(&email, None) {
        Ok(issued) => issued,
        Err(err) => {
            println!("  Invitation rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Invitation {} sent to {} (expires {})",
        issued.invitation.id,
        issued.invitation.email,
        issued.invitation.expires_at.to_rfc3339()
    );

    if let Err(err) = platform.invitations.send(&email, None) {
        println!("  Second invitation for the same address: {err}");
    }

    let Some(token) = platform.mailer.latest_token_for(&email) else {
        println!("  Outbox holds no invitation link");
        return Ok(());
    };
    match platform.invitations.verify(&token) {
        Ok(check) => println!("  Token valid: {}", check.is_valid),
        Err(err) => println!("  Verification unavailable: {err}"),
    }

    let registered = match platform
        .invitations
        .register(&token, demo_registration(&subdomain))
    {
        Ok(registered) => registered,
        Err(err) => {
            println!("  Registration failed: {err}");
            return Ok(());
        }
    };
    println!(
        "- Company {} ({}) registered; admin {} has role {}",
        registered.company.name,
        registered.company.subdomain,
        registered.admin.email,
        registered.admin.role.label()
    );
    if let Err(err) = platform
        .invitations
        .register(&token, demo_registration(&subdomain))
    {
        println!("  Reusing the token: {err}");
    }

    let welcomes = platform
        .mailer
        .sent()
        .into_iter()
        .filter(|mail| matches!(mail, OutboundMail::Welcome { .. }))
        .count();
    println!("  Welcome emails queued: {welcomes}");

    let late_email = format!("late@{subdomain}.test");
    if let Ok(late) = platform.invitations.send(&late_email, None) {
        clock.advance(InvitationSettings::default().ttl + Duration::minutes(1));
        match platform.invitations.verify(late.token.as_str()) {
            Ok(check) => println!(
                "- Invitation for {late_email} checked after its expiry: valid = {}",
                check.is_valid
            ),
            Err(err) => println!("  Verification unavailable: {err}"),
        }
    }

    if skip_intake {
        return Ok(());
    }

    println!("\nPre-alert intake demo");
    let scope = CompanyScope::new(registered.company.id);
    let customer = match platform.users.insert(User {
        id: UserId::new(),
        company_id: registered.company.id,
        email: format!("customer@{subdomain}.test"),
        first_name: "Devon".to_string(),
        last_name: "Clarke".to_string(),
        phone: None,
        role: UserRole::Customer,
        password_hash: String::new(),
        created_at: clock.now(),
    }) {
        Ok(customer) => customer,
        Err(err) => {
            println!("  Customer could not be created: {err}");
            return Ok(());
        }
    };

    let service = &platform.pre_alerts.service;
    let pre_alert = match service.create(
        PreAlertDraft {
            user_id: customer.id,
            tracking_number: tracking_number.clone(),
            courier: "UPS".to_string(),
            description: Some("Laptop and charger".to_string()),
            estimated_weight: None,
            estimated_arrival: None,
            documents: vec!["blob://invoices/laptop.pdf".to_string()],
        },
        scope,
    ) {
        Ok(pre_alert) => pre_alert,
        Err(err) => {
            println!("  Pre-alert rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Pre-alert {} filed for {} via {} (status {})",
        pre_alert.id,
        pre_alert.tracking_number,
        pre_alert.courier,
        pre_alert.status.label()
    );

    clock.advance(Duration::days(3));
    let intake = match platform.packages.register(
        PackageDraft {
            user_id: Some(customer.id),
            tracking_number: tracking_number.clone(),
            status: None,
            description: None,
            weight: None,
            received_date: None,
            pre_alert_id: None,
        },
        scope,
    ) {
        Ok(intake) => intake,
        Err(err) => {
            println!("  Package intake failed: {err}");
            return Ok(());
        }
    };
    println!("- Package {} received", intake.package.id);
    match &intake.matched_pre_alert {
        Some(matched) => println!(
            "  Linked to pre-alert {} (status {})",
            matched.id,
            matched.status.label()
        ),
        None => println!(
            "  No pre-alert linked{}",
            intake
                .match_issue
                .as_deref()
                .map(|issue| format!(": {issue}"))
                .unwrap_or_default()
        ),
    }

    if let Err(err) = service.cancel(&pre_alert.id, scope) {
        println!("  Cancelling the matched pre-alert: {err}");
    }

    match service.list_unmatched(scope) {
        Ok(rows) => println!("  Unmatched pre-alerts remaining: {}", rows.len()),
        Err(err) => println!("  Unmatched listing unavailable: {err}"),
    }
    println!(
        "  Customer notifications sent: {}",
        platform.notifier.notices().len()
    );

    Ok(())
}

fn demo_registration(subdomain: &str) -> RegistrationRequest {
    RegistrationRequest {
        user: Some(RegistrantDetails {
            first_name: "Marcia".to_string(),
            last_name: "Reid".to_string(),
            password: "harbour-lights-42".to_string(),
            phone: None,
        }),
        company: Some(CompanyDetails {
            name: "Island Freight".to_string(),
            subdomain: subdomain.to_string(),
            email: format!("ops@{subdomain}.test"),
            phone: "+1 876 555 0100".to_string(),
            address_line1: "12 Harbour St".to_string(),
            address_line2: None,
            city: "Kingston".to_string(),
            state: String::new(),
            postal_code: String::new(),
            country: "Jamaica".to_string(),
            website: None,
            locations: vec!["Kingston".to_string()],
            bank_info: None,
        }),
    }
}
