use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use tracing::{instrument, warn};

use crate::error::{AppError, Result};

use super::Backoff;

pub type MessageId = u32;

/// A newsletter message with its HTML body and inline images, ordered by
/// appearance in the MIME tree (§4.B).
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub html_parts: Vec<String>,
    pub inline_images: Vec<InlineImage>,
}

#[derive(Debug, Clone)]
pub struct InlineImage {
    /// Stable positional index within the message's MIME tree.
    pub index: usize,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait MailSource: Send + Sync {
    async fn list_messages(
        &self,
        subject_query: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MessageId>>;

    async fn fetch(&self, id: MessageId) -> Result<Message>;
}

/// IMAP-backed newsletter source. Connects lazily per call; transient
/// transport failures retry with the shared exponential backoff.
pub struct ImapMailSource {
    host: String,
    port: u16,
    user: String,
    password: String,
    backoff: Backoff,
}

impl ImapMailSource {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            backoff: Backoff::default(),
        }
    }

    fn connect(&self) -> Result<imap::Session<native_tls::TlsStream<std::net::TcpStream>>> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;
        let client = imap::connect((self.host.as_str(), self.port), &self.host, &tls)
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;
        let mut session = client
            .login(&self.user, &self.password)
            .map_err(|(e, _)| AppError::SourceUnavailable(e.to_string()))?;
        session
            .select("INBOX")
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;
        Ok(session)
    }

    async fn with_retry<T>(&self, op: impl Fn() -> Result<T> + Send + Sync) -> Result<T> {
        let mut last_err = None;
        for attempt in 0..self.backoff.max_attempts() {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(attempt, error = %e, "newsletter source call failed, retrying");
                    last_err = Some(e);
                    tokio::time::sleep(self.backoff.delay_for(attempt)).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::SourceUnavailable("retries exhausted".to_string())))
    }
}

#[async_trait]
impl MailSource for ImapMailSource {
    #[instrument(skip(self))]
    async fn list_messages(
        &self,
        subject_query: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MessageId>> {
        let subject_query = subject_query.to_string();
        let since_date = since.date_naive();
        self.with_retry(move || {
            let mut session = self.connect()?;
            let query = format!(
                "SUBJECT \"{}\" SINCE {}",
                subject_query,
                since_date.format("%d-%b-%Y")
            );
            let uids = session
                .search(&query)
                .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;
            let mut ids: Vec<MessageId> = uids.into_iter().collect();
            ids.sort_unstable();
            let _ = until;
            Ok(ids)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: MessageId) -> Result<Message> {
        self.with_retry(move || {
            let mut session = self.connect()?;
            let messages = session
                .fetch(id.to_string(), "RFC822")
                .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;
            let raw = messages
                .iter()
                .next()
                .and_then(|m| m.body())
                .ok_or_else(|| AppError::SourceUnavailable(format!("empty body for message {id}")))?;
            parse_message(id, raw)
        })
        .await
    }
}

fn parse_message(id: MessageId, raw: &[u8]) -> Result<Message> {
    let parsed = parse_mail(raw).map_err(|e| AppError::SourceUnavailable(e.to_string()))?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();
    let date = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut html_parts = Vec::new();
    let mut inline_images = Vec::new();
    let mut index = 0usize;
    walk_mime(&parsed, &mut html_parts, &mut inline_images, &mut index);

    Ok(Message {
        id,
        subject,
        date,
        html_parts,
        inline_images,
    })
}

fn walk_mime(part: &ParsedMail, html: &mut Vec<String>, images: &mut Vec<InlineImage>, index: &mut usize) {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();

    if mimetype == "text/html" {
        if let Ok(body) = part.get_body() {
            html.push(body);
        }
    } else if mimetype.starts_with("image/") {
        if let Ok(bytes) = part.get_body_raw() {
            images.push(InlineImage {
                index: *index,
                bytes,
                content_type: mimetype.clone(),
            });
            *index += 1;
        }
    }

    for sub in &part.subparts {
        walk_mime(sub, html, images, index);
    }
}
