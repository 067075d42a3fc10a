use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Notifier;
use crate::error::DeliveryError;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHANNEL_ID: &str = "TELEGRAM_CHANNEL_ID";

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends digest parts to one Telegram chat through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the bot token
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(15),
            max_retries: 3,
        }
    }

    pub fn from_env() -> Result<Self> {
        let token = std::env::var(ENV_BOT_TOKEN).with_context(|| format!("{ENV_BOT_TOKEN} missing"))?;
        let chat_id =
            std::env::var(ENV_CHANNEL_ID).with_context(|| format!("{ENV_CHANNEL_ID} missing"))?;
        Ok(Self::new(token, chat_id))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let endpoint = self.endpoint();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&endpoint)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let (wait, last) = match res {
                Ok(rsp) => {
                    let status = rsp.status().as_u16();
                    let body: TelegramResponse = rsp.json().await.unwrap_or_default();
                    if (200..300).contains(&status) && body.ok {
                        return Ok(());
                    }
                    let description = body
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("HTTP {status}"));
                    match retry_decision(status, &body) {
                        RetryDecision::Never => {
                            return Err(DeliveryError::Rejected {
                                status,
                                description,
                            })
                        }
                        RetryDecision::After(wait) => (wait, description),
                        RetryDecision::Backoff => (backoff(attempt), description),
                    }
                }
                // without_url: the endpoint embeds the bot token
                Err(e) => (backoff(attempt), e.without_url().to_string()),
            };

            if attempt >= self.max_retries {
                return Err(DeliveryError::Exhausted {
                    attempts: attempt,
                    last,
                });
            }
            tracing::warn!(
                target: "notify",
                attempt,
                wait_ms = wait.as_millis() as u64,
                reason = %last,
                "telegram send failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn destination(&self) -> &str {
        &self.chat_id
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryDecision {
    Never,
    /// Flood control: wait what the API asked for.
    After(Duration),
    Backoff,
}

fn retry_decision(status: u16, body: &TelegramResponse) -> RetryDecision {
    match status {
        429 => {
            let secs = body
                .parameters
                .as_ref()
                .and_then(|p| p.retry_after)
                .unwrap_or(1);
            RetryDecision::After(Duration::from_secs(secs + 1))
        }
        500..=599 => RetryDecision::Backoff,
        _ => RetryDecision::Never,
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_control_waits_retry_after_plus_one() {
        let body: TelegramResponse = serde_json::from_str(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":7}}"#,
        )
        .unwrap();
        assert_eq!(
            retry_decision(429, &body),
            RetryDecision::After(Duration::from_secs(8))
        );
    }

    #[test]
    fn client_errors_are_not_retried() {
        let body: TelegramResponse =
            serde_json::from_str(r#"{"ok":false,"description":"Bad Request: can't parse entities"}"#)
                .unwrap();
        assert_eq!(retry_decision(400, &body), RetryDecision::Never);
        assert_eq!(retry_decision(502, &TelegramResponse::default()), RetryDecision::Backoff);
    }

    #[test]
    fn payload_uses_html_and_disables_previews() {
        let p = SendMessage {
            chat_id: "@ai",
            text: "<b>x</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["parse_mode"], "HTML");
        assert_eq!(v["disable_web_page_preview"], true);
        assert_eq!(v["chat_id"], "@ai");
    }

    #[test]
    fn debug_output_hides_token() {
        let n = TelegramNotifier::new("123:SECRET".into(), "@ai".into())
            .with_api_base("http://localhost:9/");
        let dbg = format!("{n:?}");
        assert!(!dbg.contains("SECRET"));
        assert!(n.endpoint().starts_with("http://localhost:9/bot123:SECRET/"));
        assert_eq!(n.destination(), "@ai");
    }

    #[tokio::test]
    async fn unreachable_api_is_a_delivery_error() {
        let n = TelegramNotifier::new("t".into(), "@ai".into())
            .with_api_base("http://127.0.0.1:9")
            .with_retries(1)
            .with_timeout(1);
        let err = n.send("hello").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Exhausted { attempts: 1, .. }));
        assert!(!err.to_string().contains("/bott/"));
    }
}
