// src/services/notifier.rs

//! Email notification of new gazette notices.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{MailConfig, NoticeBatch};
use crate::utils::escape_html;

/// Dispatches a summary of a batch to its readers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the batch summary. An error means nobody was told.
    async fn notify(&self, batch: &NoticeBatch) -> Result<()>;
}

/// Render the HTML report for a batch.
///
/// One table row per notice; page and download links are labelled with the
/// notice title.
pub fn render_report(batch: &NoticeBatch) -> String {
    let mut rows = String::new();
    for notice in batch.notices() {
        let title = escape_html(&notice.title);
        rows.push_str(&format!(
            "<tr><td>{date}</td><td>{issue}</td><td>{title}</td>\
             <td><a href=\"{page}\">Page {title}</a></td>\
             <td><a href=\"{download}\">Download {title}</a></td>\
             <td>{tag}</td></tr>\n",
            date = notice.publication_date.format("%Y-%m-%d"),
            issue = escape_html(&notice.issue_category),
            page = escape_html(&notice.page_link),
            download = escape_html(&notice.download_link),
            tag = escape_html(&notice.classification.label()),
        ));
    }

    format!(
        "<html>\n<body>\n\
         <h2>Recent Kenya Law Notices</h2>\n\
         <h3>Date: <b>{date}</b></h3>\n\
         <p>Please find below the latest gazette posts:</p>\n\
         <table border=\"1\">\n\
         <thead><tr><th>Date</th><th>Issue</th><th>Title</th><th>Page Link</th>\
         <th>Download Link</th><th>EPRA/Energy Act</th></tr></thead>\n\
         <tbody>\n{rows}</tbody>\n</table>\n\
         </body>\n</html>\n",
        date = batch.publication_date().format("%d %B, %Y"),
    )
}

/// Sends the report over authenticated SMTP (STARTTLS).
pub struct MailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject: String,
}

impl MailNotifier {
    /// Build a notifier from validated mail settings.
    ///
    /// No connection is opened until the first message is sent.
    pub fn new(config: &MailConfig) -> Result<Self> {
        config.validate()?;

        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>>>()?;
        let credentials = Credentials::new(
            config.from.clone(),
            config.password.clone().unwrap_or_default(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(AppError::mail)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from,
            to,
            subject: config.subject.clone(),
        })
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, batch: &NoticeBatch) -> Result<()> {
        let message = compose_message(&self.from, &self.to, &self.subject, batch)?;
        self.transport
            .send(message)
            .await
            .map_err(AppError::mail)?;
        log::info!(
            "Notification sent to {} recipient(s) for {}",
            self.to.len(),
            batch.publication_date()
        );
        Ok(())
    }
}

/// Assemble the full message in memory.
fn compose_message(
    from: &Mailbox,
    to: &[Mailbox],
    subject: &str,
    batch: &NoticeBatch,
) -> Result<Message> {
    let builder = to
        .iter()
        .cloned()
        .fold(Message::builder().from(from.clone()), |b, to| b.to(to));

    builder
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(render_report(batch))
        .map_err(AppError::mail)
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.trim()
        .parse::<Mailbox>()
        .map_err(|e| AppError::mail(format!("invalid address '{addr}': {e}")))
}
