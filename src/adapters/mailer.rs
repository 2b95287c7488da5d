use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{instrument, warn};

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Digest {
    pub subject: String,
    pub plain_body: String,
    pub html_body: String,
    pub from: String,
    pub to: Vec<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, digest: &Digest) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Result<Self> {
        let creds = Credentials::new(user.to_string(), password.to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| AppError::MailError(e.to_string()))?
            .port(port)
            .credentials(creds)
            .build();
        Ok(Self { transport })
    }

    fn build_message(&self, digest: &Digest) -> Result<Message> {
        let mut builder = Message::builder()
            .from(digest.from.parse().map_err(|e: lettre::address::AddressError| AppError::MailError(e.to_string()))?)
            .subject(&digest.subject);

        for recipient in &digest.to {
            builder = builder.to(recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::MailError(e.to_string()))?);
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(digest.plain_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(digest.html_body.clone()),
                    ),
            )
            .map_err(|e| AppError::MailError(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    /// Dispatch errors are retried once, per §4.J.
    #[instrument(skip(self, digest), fields(subject = %digest.subject, recipients = digest.to.len()))]
    async fn send(&self, digest: &Digest) -> Result<()> {
        let message = self.build_message(digest)?;

        match self.transport.send(message.clone()).await {
            Ok(_) => Ok(()),
            Err(first_err) => {
                warn!(error = %first_err, "digest dispatch failed, retrying once");
                self.transport
                    .send(message)
                    .await
                    .map(|_| ())
                    .map_err(|e| AppError::MailError(e.to_string()))
            }
        }
    }
}
