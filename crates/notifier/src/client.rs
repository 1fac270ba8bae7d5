//! Delivery client: one destination, retried sends.
//!
//! Both message kinds share the same retry loop: up to `max_attempts` calls,
//! sleeping `initial_delay * 2^attempt + jitter` between them. A reply with a
//! non-zero `errcode` and a transport error are retried alike.

use beacon_common::config::RetryPolicy;
use beacon_common::types::{Destination, ENDPOINT_TOKEN, endpoint_suffix};

use crate::backoff::backoff_delay;
use crate::composer::{Mentions, compose};
use crate::error::DeliveryError;
use crate::transport::{Connector, Message, Transport};
use crate::validator::{ACCEPTED, UrlValidator};

pub struct DeliveryClient<T> {
    transport: T,
    endpoint: String,
    validator: UrlValidator,
    retry: RetryPolicy,
}

impl<T: Transport> DeliveryClient<T> {
    /// Wrap `transport` for `webhook`, which must carry the endpoint token.
    pub fn new(
        webhook: &str,
        transport: T,
        validator: UrlValidator,
        retry: RetryPolicy,
    ) -> Result<Self, DeliveryError> {
        check_endpoint(webhook)?;
        Ok(Self {
            transport,
            endpoint: endpoint_suffix(webhook).to_string(),
            validator,
            retry,
        })
    }

    /// Check the destination's endpoint, then build its transport.
    pub fn connect<C>(
        connector: &C,
        destination: &Destination,
        validator: UrlValidator,
        retry: RetryPolicy,
    ) -> Result<Self, DeliveryError>
    where
        C: Connector<Transport = T>,
    {
        check_endpoint(&destination.webhook)?;
        let transport = connector.connect(destination)?;

        tracing::info!(
            endpoint = %destination.endpoint_suffix(),
            signed = destination.secret.as_deref().is_some_and(|s| !s.is_empty()),
            "Delivery client ready"
        );

        Self::new(&destination.webhook, transport, validator, retry)
    }

    /// Trailing part of the endpoint used in logs.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a plain text message, prefixed with mention markup when requested.
    pub async fn send_text(
        &self,
        message: &str,
        at_mobiles: &[String],
        is_at_all: bool,
    ) -> Result<(), DeliveryError> {
        let mentions = Mentions::new(at_mobiles, is_at_all);
        let content = mentions.apply(message);

        self.send_with_retry(Message::Text { content, mentions })
            .await
    }

    /// Validate `image_url`, merge it into `content` and send as Markdown.
    ///
    /// An invalid URL fails immediately without touching the network.
    pub async fn send_markdown_with_image(
        &self,
        title: &str,
        content: &str,
        image_url: &str,
        placeholder: &str,
        at_mobiles: &[String],
        is_at_all: bool,
    ) -> Result<(), DeliveryError> {
        if let Err(rejection) = self.validator.validate(image_url) {
            tracing::error!(
                endpoint = %self.endpoint,
                url = image_url,
                reason = %rejection,
                "Image URL failed validation"
            );
            return Err(rejection.into());
        }
        tracing::info!(endpoint = %self.endpoint, url = image_url, "{}", ACCEPTED);

        let mentions = Mentions::new(at_mobiles, is_at_all);
        let text = mentions.apply(&compose(content, image_url, placeholder));

        self.send_with_retry(Message::Markdown {
            title: title.to_string(),
            text,
            mentions,
        })
        .await
    }

    async fn send_with_retry(&self, message: Message) -> Result<(), DeliveryError> {
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts {
            let failure = match self.transport.send(&message).await {
                Ok(reply) if reply.is_success() => {
                    tracing::info!(
                        endpoint = %self.endpoint,
                        kind = message.kind(),
                        attempt = attempt + 1,
                        "Message delivered"
                    );
                    return Ok(());
                }
                Ok(reply) => format!("errcode {}: {}", reply.errcode, reply.errmsg),
                Err(e) => e.to_string(),
            };

            tracing::error!(
                endpoint = %self.endpoint,
                kind = message.kind(),
                attempt = attempt + 1,
                error = %failure,
                "Send attempt failed"
            );

            if self.retry.has_remaining(attempt) {
                let delay = backoff_delay(&self.retry, attempt);
                tracing::info!(
                    endpoint = %self.endpoint,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before retry"
                );
                tokio::time::sleep(delay).await;
            }

            last_error = failure;
        }

        tracing::error!(
            endpoint = %self.endpoint,
            attempts = self.retry.max_attempts,
            "Giving up on destination"
        );

        Err(DeliveryError::Exhausted {
            attempts: self.retry.max_attempts,
            last_error,
        })
    }
}

fn check_endpoint(webhook: &str) -> Result<(), DeliveryError> {
    if webhook.contains(ENDPOINT_TOKEN) {
        Ok(())
    } else {
        Err(DeliveryError::InvalidEndpoint(format!(
            "webhook must contain {ENDPOINT_TOKEN}"
        )))
    }
}
