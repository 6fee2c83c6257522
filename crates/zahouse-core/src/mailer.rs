use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::{config::Config, types::Inquiry};

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Sends through an SMTP relay. Port 465 uses implicit TLS, anything else STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, user: &str, pass: &str, from: &str) -> Result<Self> {
        let builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .with_context(|| format!("SMTP relay {host}"))?
        .port(port);

        let builder = if user.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(user.to_string(), pass.to_string()))
        };

        let from: Mailbox = from
            .parse()
            .with_context(|| format!("invalid MAIL_FROM {from:?}"))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let to: Mailbox = email
            .to
            .parse()
            .with_context(|| format!("invalid recipient {:?}", email.to))?;
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse().context("invalid reply-to")?);
        }
        let message = builder.body(email.body)?;
        self.transport.send(message).await.context("SMTP send")?;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Used when SMTP is not configured.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, email: Email) -> Result<()> {
        warn!(to = %email.to, subject = %email.subject, "mail not configured, dropping email");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

pub fn mailer_from_config(config: &Config) -> Arc<dyn Mailer> {
    if !config.mail_enabled() {
        info!("SMTP not configured, outgoing email disabled");
        return Arc::new(NoopMailer);
    }
    match SmtpMailer::new(
        &config.smtp_host,
        config.smtp_port,
        &config.smtp_user,
        &config.smtp_pass,
        &config.mail_from,
    ) {
        Ok(m) => {
            info!(host = %config.smtp_host, port = config.smtp_port, "SMTP mailer ready");
            Arc::new(m)
        }
        Err(e) => {
            warn!("SMTP setup failed, outgoing email disabled: {e:#}");
            Arc::new(NoopMailer)
        }
    }
}

/// Fire-and-forget: a failed send is logged and never reaches the caller.
pub fn send_in_background(mailer: Arc<dyn Mailer>, email: Email) {
    tokio::spawn(async move {
        let to = email.to.clone();
        if let Err(e) = mailer.send(email).await {
            warn!(to = %to, "email send failed: {e:#}");
        }
    });
}

// ── Templates ─────────────────────────────────────────────────────────────

pub fn lead_welcome(email: &str, name: Option<&str>) -> Email {
    let greeting = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("What's good {n},"),
        None => "What's good,".to_string(),
    };
    Email {
        to: email.to_string(),
        subject: "Welcome to ZaHouse: your contract audit is unlocked".into(),
        body: format!(
            "{greeting}\n\n\
             You're in. Upload any deal you've been handed and the ZaHouse Strategist \
             will break it down clause by clause: the traps, the leverage, and the \
             artist-friendly rewrites.\n\n\
             Remember: this is strategy, not legal advice. Run anything you plan to sign \
             past a licensed entertainment attorney.\n\n\
             - ZaHouse"
        ),
        reply_to: None,
    }
}

pub fn inquiry_auto_reply(inquiry: &Inquiry) -> Email {
    Email {
        to: inquiry.email.clone(),
        subject: "We got your inquiry | ZaHouse".into(),
        body: format!(
            "Hi {},\n\n\
             Thanks for reaching out about \"{}\". Your reference is {}. \
             Someone from the team will get back to you within two business days.\n\n\
             Your message:\n{}\n\n\
             - ZaHouse",
            inquiry.name, inquiry.inquiry_type, inquiry.id, inquiry.message
        ),
        reply_to: None,
    }
}

pub fn inquiry_admin_notice(inquiry: &Inquiry, admin_email: &str) -> Email {
    let mut body = format!(
        "New inquiry {}\n\nName: {}\nEmail: {}\nType: {}\n",
        inquiry.id, inquiry.name, inquiry.email, inquiry.inquiry_type
    );
    if let Some(phone) = &inquiry.phone {
        body.push_str(&format!("Phone: {phone}\n"));
    }
    if let Some(artist) = &inquiry.artist_name {
        body.push_str(&format!("Artist: {artist}\n"));
    }
    body.push_str(&format!(
        "Received: {}\n\n{}\n",
        inquiry.created_at.to_rfc3339(),
        inquiry.message
    ));
    Email {
        to: admin_email.to_string(),
        subject: format!("[ZaHouse] New {} inquiry from {}", inquiry.inquiry_type, inquiry.name),
        body,
        reply_to: Some(inquiry.email.clone()),
    }
}
