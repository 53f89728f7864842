//! Mail rendering and the log-backed [`Mailer`].
//!
//! Transport is deliberately absent: [`LogMailer`] renders the message and
//! records that it was handed off. The rendered body carries a live
//! activation token, so only its size is ever logged.

use askama::Template;
use async_trait::async_trait;
use domains::{error::Result, DomainError, Mail, Mailer};

#[derive(Template)]
#[template(path = "welcome.txt")]
struct WelcomeText<'a> {
    username: &'a str,
    user_id: i64,
    activation_token: &'a str,
}

#[derive(Template)]
#[template(path = "welcome.html")]
struct WelcomeHtml<'a> {
    username: &'a str,
    user_id: i64,
    activation_token: &'a str,
}

/// A message ready for a transport.
pub struct RenderedMail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn render(mail: &Mail) -> Result<RenderedMail> {
    match mail {
        Mail::Welcome {
            user_id,
            username,
            activation_token,
        } => {
            let text = WelcomeText {
                username,
                user_id: *user_id,
                activation_token,
            }
            .render()
            .map_err(|e| DomainError::Internal(format!("rendering welcome.txt: {e}")))?;
            let html = WelcomeHtml {
                username,
                user_id: *user_id,
                activation_token,
            }
            .render()
            .map_err(|e| DomainError::Internal(format!("rendering welcome.html: {e}")))?;

            Ok(RenderedMail {
                subject: "Welcome to the forum!".into(),
                text,
                html,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, mail: &Mail) -> Result<()> {
        let rendered = render(mail)?;
        tracing::info!(
            sender = %self.sender,
            recipient,
            kind = mail.kind(),
            subject = %rendered.subject,
            text_bytes = rendered.text.len(),
            html_bytes = rendered.html.len(),
            "mail handed off"
        );
        Ok(())
    }
}
