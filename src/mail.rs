//! Outgoing mail: the welcome message sent when an account holder is registered.

use crate::error::MailError;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Account details quoted in the welcome message.
#[derive(Clone, Debug)]
pub struct WelcomeRecipient {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

#[derive(Clone, Debug)]
pub struct WelcomeTemplate {
    pub brand: String,
    pub support: String,
}

impl WelcomeTemplate {
    pub fn render(&self, to: &WelcomeRecipient) -> MailMessage {
        let brand = escape_html(&self.brand);
        let html = format!(
            "<html><body>\
             <h3>Thanks for registering with {brand}</h3>\
             <p>Hi {name},</p>\
             <p>To get started, please download the app from the App Store or Google Play.</p>\
             <p>Your login details are:</p>\
             <p>Email address: {email}<br>Password: {password}</p>\
             <p>If you have any questions regarding your account, please send us an email to {support} \
             and we'll be happy to help.</p>\
             <p>The {brand} team</p>\
             </body></html>",
            brand = brand,
            name = escape_html(&to.name),
            email = escape_html(&to.email),
            password = escape_html(&to.password),
            support = escape_html(&self.support),
        );
        MailMessage {
            to: to.email.clone(),
            subject: format!("Welcome To {}", self.brand),
            html,
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Sends through an SMTP relay with implicit TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self, MailError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(format!("{}: {}", from, e)))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(port);
        if let Some(user) = username {
            builder = builder.credentials(Credentials::new(
                user.to_string(),
                password.unwrap_or_default().to_string(),
            ));
        }
        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(format!("{}: {}", message.to, e)))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        tracing::info!(to = %message.to, subject = %message.subject, "mail sent");
        Ok(())
    }
}

/// Logs messages instead of delivering them. Used when no SMTP host is configured.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "mail not delivered (no SMTP host)");
        Ok(())
    }
}
