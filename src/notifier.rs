//! Allocation-assigned notification hook (§4.5 step 7). Failures here are
//! logged, never propagated — the allocation has already succeeded by the
//! time the notifier runs. Grounded on the teacher's SMTP helper; repurposed
//! from a verification-link email to an allocation-assigned summary.

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct AllocationNotification<'a> {
    pub deal_id: uuid::Uuid,
    pub adviser_email: &'a str,
    pub service_package: &'a str,
    pub earliest_available_week: NaiveDate,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_allocation(&self, notification: AllocationNotification<'_>);
}

/// Default production notifier. If SMTP is not configured it logs instead
/// of sending, matching the teacher's "no mail server in dev" fallback.
pub struct SmtpNotifier {
    config: Config,
}

impl SmtpNotifier {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.config.smtp_from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())?;

        let creds = Credentials::new(self.config.smtp_user.clone(), self.config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        transport.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify_allocation(&self, n: AllocationNotification<'_>) {
        if self.config.smtp_host.is_empty() {
            tracing::info!(
                deal_id = %n.deal_id,
                adviser_email = n.adviser_email,
                earliest_week = %n.earliest_available_week,
                "SMTP not configured — allocation notification logged here instead"
            );
            return;
        }

        let subject = format!("Deal {} allocated — {}", n.deal_id, n.service_package);
        let body = format!(
            "Deal {} ({}) has been allocated to you.\n\nEarliest available week: {}\n",
            n.deal_id, n.service_package, n.earliest_available_week
        );

        if let Err(err) = self.send(n.adviser_email, &subject, &body).await {
            tracing::warn!(error = ?err, deal_id = %n.deal_id, "allocation notification failed");
        }
    }
}

/// Used in tests and any deployment without a configured notification path.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_allocation(&self, _notification: AllocationNotification<'_>) {}
}
