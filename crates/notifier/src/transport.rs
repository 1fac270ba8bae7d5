//! Webhook transport: turns a [`Message`] into one HTTP call.
//!
//! The chat robot API answers every request with `{"errcode": .., "errmsg": ..}`;
//! `errcode == 0` is the only success. Signed robots additionally require
//! `timestamp` and `sign` query parameters, where `sign` is the base64
//! HMAC-SHA256 of `"{timestamp}\n{secret}"` keyed by the secret.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use beacon_common::types::Destination;

use crate::composer::Mentions;

type HmacSha256 = Hmac<Sha256>;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable reply: {0}")]
    Decode(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// A message ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text {
        content: String,
        mentions: Mentions,
    },
    Markdown {
        title: String,
        text: String,
        mentions: Mentions,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Markdown { .. } => "markdown",
        }
    }

    pub fn mentions(&self) -> &Mentions {
        match self {
            Message::Text { mentions, .. } | Message::Markdown { mentions, .. } => mentions,
        }
    }

    /// Body as the robot API expects it.
    pub fn payload(&self) -> Payload<'_> {
        match self {
            Message::Text { content, mentions } => Payload::Text {
                text: TextBody { content },
                at: At::from(mentions),
            },
            Message::Markdown {
                title,
                text,
                mentions,
            } => Payload::Markdown {
                markdown: MarkdownBody { title, text },
                at: At::from(mentions),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum Payload<'a> {
    Text { text: TextBody<'a>, at: At<'a> },
    Markdown { markdown: MarkdownBody<'a>, at: At<'a> },
}

#[derive(Debug, Serialize)]
pub struct TextBody<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MarkdownBody<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct At<'a> {
    at_mobiles: &'a [String],
    is_at_all: bool,
}

impl<'a> From<&'a Mentions> for At<'a> {
    fn from(mentions: &'a Mentions) -> Self {
        Self {
            at_mobiles: mentions.mobiles(),
            is_at_all: mentions.is_all(),
        }
    }
}

/// Structured reply from the robot API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportReply {
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl TransportReply {
    pub fn ok() -> Self {
        Self {
            errcode: 0,
            errmsg: "ok".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errcode == 0
    }
}

/// One destination's delivery channel.
pub trait Transport {
    fn send(
        &self,
        message: &Message,
    ) -> impl Future<Output = Result<TransportReply, TransportError>>;
}

/// Builds a transport for each destination of a run.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self, destination: &Destination) -> Result<Self::Transport, TransportError>;
}

/// Transport for DingTalk-style custom robot webhooks.
#[derive(Debug, Clone)]
pub struct DingTalkTransport {
    http: reqwest::Client,
    webhook: Url,
    secret: Option<String>,
}

impl DingTalkTransport {
    pub fn new(
        http: reqwest::Client,
        webhook: &str,
        secret: Option<String>,
    ) -> Result<Self, TransportError> {
        let webhook =
            Url::parse(webhook).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            http,
            webhook,
            secret: secret.filter(|s| !s.is_empty()),
        })
    }

    pub fn is_signed(&self) -> bool {
        self.secret.is_some()
    }

    /// Webhook URL for a request issued at `timestamp_ms`.
    pub fn request_url(&self, timestamp_ms: i64) -> Result<Url, TransportError> {
        let mut url = self.webhook.clone();
        if let Some(secret) = &self.secret {
            let sign = sign(secret, timestamp_ms)?;
            url.query_pairs_mut()
                .append_pair("timestamp", &timestamp_ms.to_string())
                .append_pair("sign", &sign);
        }
        Ok(url)
    }
}

impl Transport for DingTalkTransport {
    async fn send(&self, message: &Message) -> Result<TransportReply, TransportError> {
        let url = self.request_url(chrono::Utc::now().timestamp_millis())?;

        let response = self.http.post(url).json(&message.payload()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Signature for a signed robot request.
pub fn sign(secret: &str, timestamp_ms: i64) -> Result<String, TransportError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TransportError::Signing(e.to_string()))?;
    mac.update(format!("{timestamp_ms}\n{secret}").as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

/// Creates [`DingTalkTransport`]s sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct DingTalkConnector {
    http: reqwest::Client,
}

impl DingTalkConnector {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl Connector for DingTalkConnector {
    type Transport = DingTalkTransport;

    fn connect(&self, destination: &Destination) -> Result<DingTalkTransport, TransportError> {
        DingTalkTransport::new(
            self.http.clone(),
            &destination.webhook,
            destination.secret.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = "https://oapi.dingtalk.com/robot/send?access_token=abc123";

    #[test]
    fn test_sign_matches_reference_vector() {
        assert_eq!(
            sign("SEC000test", 1_700_000_000_000).unwrap(),
            "1hLl2KkRX3rps9FaitIUwaac+CtAFEaP345jvdrTL7c="
        );
    }

    #[test]
    fn test_signed_url_encodes_signature() {
        let transport = DingTalkTransport::new(
            reqwest::Client::new(),
            WEBHOOK,
            Some("SEC000test".to_string()),
        )
        .unwrap();
        assert!(transport.is_signed());

        let url = transport.request_url(1_700_000_000_000).unwrap();
        assert_eq!(
            url.as_str(),
            "https://oapi.dingtalk.com/robot/send?access_token=abc123\
             &timestamp=1700000000000\
             &sign=1hLl2KkRX3rps9FaitIUwaac%2BCtAFEaP345jvdrTL7c%3D"
        );
    }

    #[test]
    fn test_unsigned_url_is_untouched() {
        let transport =
            DingTalkTransport::new(reqwest::Client::new(), WEBHOOK, Some(String::new())).unwrap();
        assert!(!transport.is_signed());
        assert_eq!(transport.request_url(42).unwrap().as_str(), WEBHOOK);
    }

    #[test]
    fn test_invalid_webhook_url() {
        let err = DingTalkTransport::new(reqwest::Client::new(), "not a url", None).unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_markdown_payload_shape() {
        let message = Message::Markdown {
            title: "Daily".to_string(),
            text: "@138 body".to_string(),
            mentions: Mentions::new(&["138".to_string()], false),
        };
        let json = serde_json::to_value(message.payload()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "msgtype": "markdown",
                "markdown": { "title": "Daily", "text": "@138 body" },
                "at": { "atMobiles": ["138"], "isAtAll": false }
            })
        );
    }

    #[test]
    fn test_text_payload_shape() {
        let message = Message::Text {
            content: "@all hello".to_string(),
            mentions: Mentions::new(&[], true),
        };
        assert_eq!(message.kind(), "text");
        let json = serde_json::to_value(message.payload()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "msgtype": "text",
                "text": { "content": "@all hello" },
                "at": { "atMobiles": [], "isAtAll": true }
            })
        );
    }

    #[test]
    fn test_reply_parsing() {
        let reply: TransportReply =
            serde_json::from_str(r#"{"errcode":310000,"errmsg":"sign not match"}"#).unwrap();
        assert!(!reply.is_success());
        assert_eq!(reply.errmsg, "sign not match");

        let reply: TransportReply = serde_json::from_str(r#"{"errcode":0}"#).unwrap();
        assert!(reply.is_success());
    }
}
