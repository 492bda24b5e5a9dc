/// SMTP delivery
///
/// Sends notifications as HTML mail through an SMTP relay, upgrading the
/// connection with STARTTLS and authenticating when credentials are set.
///
/// # Example
///
/// ```no_run
/// use taskhub_worker::config::WorkerConfig;
/// use taskhub_worker::mailer::SmtpMailer;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = WorkerConfig::from_env()?;
/// let mailer = SmtpMailer::new(&config.smtp)?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use taskhub_shared::notify::{Notification, Notifier, NotifyError};
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Notifier backed by an SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport
    ///
    /// No connection is opened until the first message is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender address is invalid or TLS can't be
    /// set up for the relay host.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.from.parse()?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        };
        let builder = builder.port(config.port);
        let builder = match config.credentials() {
            Some((user, pass)) => builder.credentials(Credentials::new(user, pass)),
            None => builder,
        };

        info!(
            server = %config.server,
            port = config.port,
            starttls = config.starttls,
            "SMTP mailer configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Sends one notification
    pub async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        let message = build_message(&self.from, notification)?;
        self.transport.send(message).await?;

        debug!(notification_id = %notification.id, "Mail accepted by relay");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.send(notification)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

/// Renders a notification as an HTML message
pub fn build_message(from: &Mailbox, notification: &Notification) -> Result<Message, MailError> {
    let message = Message::builder()
        .from(from.clone())
        .to(notification.to.parse()?)
        .subject(notification.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(notification.body.clone())?;

    Ok(message)
}
