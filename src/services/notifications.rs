//! Outbound email and SMS for enrolment events.
//!
//! Delivery problems never reach the caller: each channel is attempted on its
//! own, checked against its monthly quota and recorded in
//! `notification_logs`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{NotificationConfig, PricingConfig, SmsConfig, SmtpConfig};
use crate::db;
use crate::models::{Course, Enrolment, NotificationChannel, NotificationStatus, Student};
use crate::services::pricing::format_price;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("email failed: {0}")]
    Email(String),

    #[error("sms failed: {0}")]
    Sms(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| NotifyError::Email(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(30)))
            .build();
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| NotifyError::Address(format!("Invalid from address: {e}")))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotifyError::Address(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| NotifyError::Email(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Email(format!("Failed to send email: {e}")))
    }
}

/// Posts messages to an HTTP SMS gateway with a bearer token.
pub struct HttpSmsSender {
    client: Client,
    config: SmsConfig,
}

#[derive(Serialize)]
struct SmsGatewayRequest<'a> {
    from: &'a str,
    to: &'a str,
    body: &'a str,
}

impl HttpSmsSender {
    pub fn new(config: SmsConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Sms(format!("Failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.gateway_url)
            .bearer_auth(&self.config.api_token)
            .json(&SmsGatewayRequest {
                from: &self.config.sender_id,
                to: &message.to,
                body: &message.body,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Sms(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Sms(format!("gateway returned {}: {}", status, body)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    EnrolmentPending,
    EnrolmentConfirmed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EnrolmentPending => "enrolment_pending",
            NotificationKind::EnrolmentConfirmed => "enrolment_confirmed",
        }
    }
}

pub struct Notifier {
    db: SqlitePool,
    mailer: Option<Arc<dyn Mailer>>,
    sms: Option<Arc<dyn SmsSender>>,
    config: NotificationConfig,
    pricing: PricingConfig,
}

impl Notifier {
    pub fn new(
        db: SqlitePool,
        mailer: Option<Arc<dyn Mailer>>,
        sms: Option<Arc<dyn SmsSender>>,
        config: NotificationConfig,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            db,
            mailer,
            sms,
            config,
            pricing,
        }
    }

    /// Notifier with no channels configured; every call is a no-op.
    pub fn disabled(db: SqlitePool) -> Self {
        Self::new(db, None, None, NotificationConfig::default(), PricingConfig::default())
    }

    pub async fn enrolment_pending(&self, enrolment: &Enrolment, student: &Student, course: &Course) {
        let email = pending_email(enrolment, student, course, &self.config, &self.pricing);
        let sms = SmsMessage {
            to: student.contact_phone.clone(),
            body: format!(
                "Thanks for enrolling in {}. Your reference is {}. Payment details have been emailed.",
                course.name,
                enrolment.reference()
            ),
        };
        self.dispatch(NotificationKind::EnrolmentPending, enrolment.id, email, sms)
            .await;
    }

    pub async fn enrolment_confirmed(
        &self,
        enrolment: &Enrolment,
        student: &Student,
        course: &Course,
    ) {
        let email = confirmation_email(enrolment, student, course, &self.pricing);
        let sms = SmsMessage {
            to: student.contact_phone.clone(),
            body: format!(
                "Your enrolment in {} ({}) is confirmed. First class: {} at {}.",
                course.name,
                enrolment.reference(),
                course.start_date.format("%d/%m/%Y"),
                course.start_time.format("%H:%M")
            ),
        };
        self.dispatch(NotificationKind::EnrolmentConfirmed, enrolment.id, email, sms)
            .await;
    }

    async fn dispatch(
        &self,
        kind: NotificationKind,
        enrolment_id: i64,
        email: EmailMessage,
        sms: SmsMessage,
    ) {
        if let Some(mailer) = &self.mailer {
            let recipient = email.to.clone();
            self.deliver(
                NotificationChannel::Email,
                kind,
                enrolment_id,
                &recipient,
                self.config.monthly_email_quota,
                mailer.send(&email),
            )
            .await;
        }
        if let Some(sender) = &self.sms {
            if sms.to.is_empty() {
                return;
            }
            let recipient = sms.to.clone();
            self.deliver(
                NotificationChannel::Sms,
                kind,
                enrolment_id,
                &recipient,
                self.config.monthly_sms_quota,
                sender.send(&sms),
            )
            .await;
        }
    }

    async fn deliver<F>(
        &self,
        channel: NotificationChannel,
        kind: NotificationKind,
        enrolment_id: i64,
        recipient: &str,
        quota: u32,
        send: F,
    ) where
        F: std::future::Future<Output = Result<(), NotifyError>>,
    {
        let (status, error) = match self.quota_left(channel, quota).await {
            Ok(false) => {
                warn!(?channel, kind = kind.as_str(), enrolment_id, "monthly quota reached");
                (NotificationStatus::QuotaExceeded, None)
            }
            Ok(true) => match send.await {
                Ok(()) => {
                    info!(?channel, kind = kind.as_str(), enrolment_id, "notification sent");
                    (NotificationStatus::Sent, None)
                }
                Err(e) => {
                    warn!(?channel, kind = kind.as_str(), enrolment_id, error = %e, "notification failed");
                    (NotificationStatus::Failed, Some(e.to_string()))
                }
            },
            Err(e) => {
                warn!(?channel, error = %e, "could not read notification quota");
                (NotificationStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = db::notification_logs::insert_log(
            &self.db,
            channel,
            kind.as_str(),
            recipient,
            status,
            error.as_deref(),
            Some(enrolment_id),
        )
        .await
        {
            warn!(?channel, error = %e, "failed to record notification");
        }
    }

    async fn quota_left(&self, channel: NotificationChannel, quota: u32) -> Result<bool, sqlx::Error> {
        let since = month_start(Utc::now().date_naive());
        let sent = db::notification_logs::count_sent_since(&self.db, channel, since).await?;
        Ok(sent < i64::from(quota))
    }
}

fn month_start(today: NaiveDate) -> DateTime<Utc> {
    today
        .with_day(1)
        .and_then(|first| first.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or_else(Utc::now)
}

fn greeting(student: &Student) -> String {
    format!("Dear {},", student.contact_name())
}

pub fn pending_email(
    enrolment: &Enrolment,
    student: &Student,
    course: &Course,
    config: &NotificationConfig,
    pricing: &PricingConfig,
) -> EmailMessage {
    let reference = enrolment.reference();
    let mut fees = format!(
        "<li><strong>Course Fee:</strong> {}</li>",
        format_price(enrolment.course_fee, pricing)
    );
    if !enrolment.registration_fee.is_zero() {
        fees.push_str(&format!(
            "\n<li><strong>Registration Fee:</strong> {}</li>",
            format_price(enrolment.registration_fee, pricing)
        ));
    }
    fees.push_str(&format!(
        "\n<li><strong>Total:</strong> {}</li>",
        format_price(enrolment.total_fee(), pricing)
    ));

    let instructions = if config.payment_instructions.is_empty() {
        String::new()
    } else {
        format!(
            "<h3>Payment</h3>\n<p>{}</p>\n<p>Please use <strong>{}</strong> as the payment reference.</p>\n",
            config.payment_instructions, reference
        )
    };

    EmailMessage {
        to: student.contact_email.clone(),
        subject: format!("Enrolment received: {} ({})", course.name, reference),
        html_body: format!(
            "<p>{}</p>\n<p>We have received the enrolment of {} in <strong>{}</strong>. \
             Your reference is <strong>{}</strong>.</p>\n<ul>\n{}\n</ul>\n{}\
             <p>Your place is confirmed once payment has been received.</p>\n",
            greeting(student),
            student.full_name(),
            course.name,
            reference,
            fees,
            instructions
        ),
    }
}

pub fn confirmation_email(
    enrolment: &Enrolment,
    student: &Student,
    course: &Course,
    pricing: &PricingConfig,
) -> EmailMessage {
    let reference = enrolment.reference();
    EmailMessage {
        to: student.contact_email.clone(),
        subject: format!("Enrolment confirmed: {} ({})", course.name, reference),
        html_body: format!(
            "<p>{}</p>\n<p>The enrolment of {} in <strong>{}</strong> is confirmed.</p>\n<ul>\n\
             <li><strong>Reference:</strong> {}</li>\n\
             <li><strong>Starts:</strong> {} at {}</li>\n\
             <li><strong>Total paid:</strong> {}</li>\n</ul>\n",
            greeting(student),
            student.full_name(),
            course.name,
            reference,
            course.start_date.format("%d %B %Y"),
            course.start_time.format("%H:%M"),
            format_price(enrolment.total_fee(), pricing)
        ),
    }
}
