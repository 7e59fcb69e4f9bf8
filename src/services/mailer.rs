//! Outgoing mail: Mailgun over its REST API, a logging fallback and an
//! in-memory outbox for tests.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::{
    config::MailgunConfig,
    error::{AppError, AppResult},
};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

pub fn activation_subject() -> &'static str {
    "Costume Store Account Activation"
}

pub fn activation_body(name: &str, link: &str) -> String {
    let mut chars = name.chars();
    let name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    format!("Hi {name}, click on the link to activate your account {link}")
}

pub struct MailgunMailer {
    client: reqwest::Client,
    config: MailgunConfig,
}

impl MailgunMailer {
    pub fn new(config: MailgunConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let resp = self
            .client
            .post(format!(
                "https://api.mailgun.net/v3/{}/messages",
                self.config.domain
            ))
            .basic_auth("api", Some(&self.config.api_key))
            .form(&[
                ("from", self.config.from.as_str()),
                ("to", to),
                ("subject", subject),
                ("text", body),
            ])
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("mail: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("mail: {status} {detail}")));
        }

        tracing::info!(to, subject, "mail sent");
        Ok(())
    }
}

/// Writes mail to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!(to, subject, body, "mail not sent, no provider configured");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct Outbox {
    sent: Vec<SentMail>,
    fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    outbox: Arc<RwLock<Outbox>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.outbox
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    /// Most recent mail addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<SentMail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let mut outbox = self.outbox.write().unwrap_or_else(PoisonError::into_inner);
        if outbox.fail {
            return Err(AppError::Upstream("mail: delivery refused".into()));
        }
        outbox.sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
