mod common;

use std::sync::{Arc, Mutex};

use academy::config::{NotificationConfig, PricingConfig};
use academy::db;
use academy::models::{NotificationChannel, NotificationStatus, SourceChannel};
use academy::services::notifications::{
    EmailMessage, Mailer, NotifyError, SmsMessage, SmsSender,
};
use academy::services::{EnrolmentService, Notifier, Submitter};
use async_trait::async_trait;
use common::*;
use serde_json::json;
use sqlx::SqlitePool;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct FailingSms;

#[async_trait]
impl SmsSender for FailingSms {
    async fn send(&self, _message: &SmsMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Sms("gateway returned 502".to_string()))
    }
}

#[derive(Default)]
struct RecordingSms {
    sent: Mutex<Vec<SmsMessage>>,
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn config(email_quota: u32) -> NotificationConfig {
    NotificationConfig {
        monthly_email_quota: email_quota,
        payment_instructions: "BSB 062-000, Account 1234 5678".to_string(),
        ..NotificationConfig::default()
    }
}

fn service_with(
    pool: &SqlitePool,
    mailer: Arc<dyn Mailer>,
    sms: Arc<dyn SmsSender>,
    config: NotificationConfig,
) -> EnrolmentService {
    let notifier = Notifier::new(
        pool.clone(),
        Some(mailer),
        Some(sms),
        config,
        PricingConfig::default(),
    );
    EnrolmentService::new(pool.clone(), Arc::new(notifier))
}

#[tokio::test]
async fn test_pending_email_carries_reference_and_payment_details() {
    let pool = setup_test_db().await;
    let course = create_test_course(&pool, json!({ "registration_fee": "20" })).await;
    let mailer = Arc::new(RecordingMailer::default());
    let sms = Arc::new(RecordingSms::default());
    let service = service_with(&pool, mailer.clone(), sms.clone(), config(10));

    let outcome = service
        .submit(adult_form(course.id, "Quinn"), Submitter::Public(SourceChannel::Website), today())
        .await
        .unwrap();

    let sent = mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let email = &sent[0];
    assert_eq!(email.to, "quinn@mail.example");
    assert!(email.subject.contains(&outcome.reference));
    assert!(email.html_body.contains("BSB 062-000"));
    assert!(email.html_body.contains("$100.00 (inc GST)"));
    assert!(email.html_body.contains("$20.00 (inc GST)"));
    assert!(email.html_body.contains("$120.00 (inc GST)"));

    let texts = sms.sent.lock().unwrap().clone();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].body.contains(&outcome.reference));

    let logs = db::notification_logs::fetch_for_enrolment(&pool, outcome.enrolment.id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == NotificationStatus::Sent));
    assert!(logs.iter().all(|l| l.kind == "enrolment_pending"));
}

#[tokio::test]
async fn test_sms_failure_does_not_block_email_or_confirmation() {
    let pool = setup_test_db().await;
    let course = create_test_course(&pool, json!({})).await;
    let staff = admin(&pool).await;
    let mailer = Arc::new(RecordingMailer::default());
    let service = service_with(&pool, mailer.clone(), Arc::new(FailingSms), config(10));

    let outcome = service
        .submit(adult_form(course.id, "Rae"), Submitter::Public(SourceChannel::Website), today())
        .await
        .unwrap();
    let confirmed = service
        .confirm(outcome.enrolment.id, &staff, None, today())
        .await
        .unwrap();
    assert_eq!(confirmed.enrolment.status, academy::models::EnrolmentStatus::Confirmed);

    let subjects: Vec<_> = mailer.sent.lock().unwrap().iter().map(|m| m.subject.clone()).collect();
    assert_eq!(subjects.len(), 2);
    assert!(subjects[1].starts_with("Enrolment confirmed"));

    let logs = db::notification_logs::fetch_for_enrolment(&pool, outcome.enrolment.id)
        .await
        .unwrap();
    let failed: Vec<_> = logs
        .iter()
        .filter(|l| l.status == NotificationStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|l| l.channel == NotificationChannel::Sms));
    assert!(failed[0].error_message.as_deref().unwrap().contains("502"));
}

#[tokio::test]
async fn test_monthly_quota_stops_email() {
    let pool = setup_test_db().await;
    let course = create_test_course(&pool, json!({})).await;
    let mailer = Arc::new(RecordingMailer::default());
    let service = service_with(
        &pool,
        mailer.clone(),
        Arc::new(RecordingSms::default()),
        config(1),
    );

    service
        .submit(adult_form(course.id, "Sol"), Submitter::Public(SourceChannel::Website), today())
        .await
        .unwrap();
    let second = service
        .submit(adult_form(course.id, "Tia"), Submitter::Public(SourceChannel::Website), today())
        .await
        .unwrap();

    assert_eq!(mailer.sent.lock().unwrap().len(), 1);

    let logs = db::notification_logs::fetch_for_enrolment(&pool, second.enrolment.id)
        .await
        .unwrap();
    let email = logs
        .iter()
        .find(|l| l.channel == NotificationChannel::Email)
        .unwrap();
    assert_eq!(email.status, NotificationStatus::QuotaExceeded);
    let sms = logs
        .iter()
        .find(|l| l.channel == NotificationChannel::Sms)
        .unwrap();
    assert_eq!(sms.status, NotificationStatus::Sent);
}
