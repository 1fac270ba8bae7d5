//! Fan-out orchestrator.
//!
//! One run:
//! 1. Pop a single image URL from the queue (abort if none)
//! 2. Load the destination list (abort if unreadable or empty)
//! 3. Deliver to each destination in order, pacing between them
//! 4. Report `success/total`
//!
//! A destination that cannot be built, rejects the image, or exhausts its
//! retries is recorded as a failure; the loop always moves on to the next one.
//! Destinations are processed strictly one at a time so the pacing pause
//! bounds the request rate toward the chat platform.

use std::path::PathBuf;

use tracing::Instrument;
use uuid::Uuid;

use beacon_common::config::{AppConfig, PacingPolicy, RetryPolicy, ValidationRules};
use beacon_common::error::AppError;
use beacon_common::types::{DeliveryOutcome, Destination, IMAGE_PLACEHOLDER, RunSummary};

use crate::backoff::pacing_delay;
use crate::client::DeliveryClient;
use crate::error::DeliveryError;
use crate::loader::load_destinations;
use crate::queue::ResourceQueue;
use crate::transport::Connector;
use crate::validator::UrlValidator;

pub struct Dispatcher<C> {
    connector: C,
    queue: ResourceQueue,
    config_path: PathBuf,
    default_title: String,
    placeholder: String,
    validator: UrlValidator,
    retry: RetryPolicy,
    pacing: PacingPolicy,
}

impl<C: Connector> Dispatcher<C> {
    pub fn new(connector: C, queue: ResourceQueue, config_path: impl Into<PathBuf>) -> Self {
        Self {
            connector,
            queue,
            config_path: config_path.into(),
            default_title: beacon_common::types::DEFAULT_TITLE.to_string(),
            placeholder: IMAGE_PLACEHOLDER.to_string(),
            validator: UrlValidator::default(),
            retry: RetryPolicy::default(),
            pacing: PacingPolicy::default(),
        }
    }

    /// Build a dispatcher wired to the paths and policies in `config`.
    pub fn from_config(connector: C, config: &AppConfig) -> Self {
        Self::new(
            connector,
            ResourceQueue::new(config.queue_path()),
            config.config_path(),
        )
        .with_default_title(config.default_title.clone())
        .with_retry(config.retry_policy())
        .with_pacing(config.pacing_policy())
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validator = UrlValidator::new(rules);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// Execute one full run inside a span tagged with a fresh run id.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let run_id = Uuid::new_v4();
        self.execute()
            .instrument(tracing::info_span!("run", %run_id))
            .await
    }

    async fn execute(&self) -> Result<RunSummary, AppError> {
        tracing::info!("Run started");

        let image_url = self.queue.pop_front().await.ok_or_else(|| {
            AppError::ResourceUnavailable(format!(
                "check queue file {}",
                self.queue.path().display()
            ))
        })?;
        tracing::info!(url = %image_url, "Using one image URL for every destination");

        let destinations = load_destinations(&self.config_path, &self.default_title).await?;
        if destinations.is_empty() {
            return Err(AppError::NoDestinations);
        }

        Ok(self.dispatch(&image_url, &destinations).await)
    }

    /// Deliver `image_url` to every destination, in order.
    pub async fn dispatch(&self, image_url: &str, destinations: &[Destination]) -> RunSummary {
        let mut summary = RunSummary::new(image_url, destinations.len());

        for (idx, destination) in destinations.iter().enumerate() {
            let index = idx + 1;
            let endpoint = destination.endpoint_suffix();
            tracing::info!(index, endpoint, "Processing destination");

            let result = self.deliver(destination, image_url).await;
            if let Err(e) = &result {
                tracing::error!(index, endpoint, error = %e, "Destination failed");
            }

            summary.record(DeliveryOutcome {
                index,
                endpoint_suffix: endpoint.to_string(),
                succeeded: result.is_ok(),
                error_detail: result.err().map(|e| e.to_string()),
            });

            let delay = pacing_delay(&self.pacing);
            tracing::debug!(
                delay_ms = delay.as_millis() as u64,
                "Pausing before next destination"
            );
            tokio::time::sleep(delay).await;
        }

        tracing::info!(
            success = summary.success_count,
            total = summary.total_count,
            url = %summary.image_url,
            "Run finished, {} messages sent with one shared image",
            summary
        );
        if !summary.is_complete() {
            tracing::warn!(
                failed = summary.total_count - summary.success_count,
                "Some messages were not delivered, check the log"
            );
        }

        summary
    }

    async fn deliver(&self, destination: &Destination, image_url: &str) -> Result<(), DeliveryError> {
        let client = DeliveryClient::<C::Transport>::connect(
            &self.connector,
            destination,
            self.validator.clone(),
            self.retry.clone(),
        )?;

        client
            .send_markdown_with_image(
                &destination.title,
                &destination.template,
                image_url,
                &self.placeholder,
                &destination.at_mobiles,
                destination.is_at_all,
            )
            .await
    }
}
