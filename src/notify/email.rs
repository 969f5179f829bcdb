// src/notify/email.rs
//! SMTP delivery of a rendered digest.

use std::path::Path;

use anyhow::{Context, Result};
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::EmailConfig;

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Build from config; the SMTP password may come from $SMTP_PASS when
    /// the config file leaves it out.
    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        let password = cfg
            .password
            .clone()
            .or_else(|| std::env::var("SMTP_PASS").ok())
            .context("smtp password missing (config [email].password or $SMTP_PASS)")?;

        let creds = Credentials::new(cfg.username.clone(), password);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("invalid smtp host")?
            .credentials(creds)
            .build();

        let from = cfg.from.parse().context("invalid from address")?;
        let to = cfg.to.parse().context("invalid recipient address")?;

        Ok(Self { mailer, from, to })
    }

    /// Send the saved digest as a multipart (plain preview + HTML) message.
    pub async fn send_digest(&self, digest_path: &Path, subject: &str) -> Result<()> {
        let html = tokio::fs::read_to_string(digest_path)
            .await
            .with_context(|| format!("reading digest {}", digest_path.display()))?;
        let plain = plain_text_preview(&html);

        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(plain, html))
            .context("building digest email")?;

        self.mailer.send(msg).await.context("sending digest email")?;
        Ok(())
    }
}

/// Short plain-text body for clients that do not render HTML.
fn plain_text_preview(html: &str) -> String {
    static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
    let text = RE_TAG.replace_all(html, " ");
    let text = RE_WS.replace_all(&text, " ");
    let mut preview: String = text.trim().chars().take(500).collect();
    preview.push_str("\n\nView the HTML version for full formatting.");
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_preview_strips_markup_and_caps_length() {
        let html = format!("<html><body><p>{}</p></body></html>", "word ".repeat(200));
        let preview = plain_text_preview(&html);
        assert!(!preview.contains('<'));
        assert!(preview.starts_with("word word"));
        assert!(preview.chars().count() <= 500 + 45);
    }

    #[serial_test::serial]
    #[test]
    fn sender_requires_a_password_source() {
        std::env::remove_var("SMTP_PASS");
        let cfg = EmailConfig {
            to: "reader@example.test".into(),
            from: "digest@example.test".into(),
            host: "smtp.example.test".into(),
            username: "digest".into(),
            password: None,
        };
        assert!(EmailSender::from_config(&cfg).is_err());
    }
}
