use serde::{Deserialize, Serialize};

/// Title used when a destination does not configure one.
pub const DEFAULT_TITLE: &str = "Safety Reminder";

/// Token a template may embed to position the image URL.
pub const IMAGE_PLACEHOLDER: &str = "{IMAGE_URL}";

/// Substring every webhook endpoint must carry to be accepted.
pub const ENDPOINT_TOKEN: &str = "access_token";

/// Number of trailing endpoint characters written to logs.
const ENDPOINT_SUFFIX_LEN: usize = 20;

/// One configured chat-notification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Webhook URL, expected to embed [`ENDPOINT_TOKEN`]
    pub webhook: String,
    /// Signing secret; `None` for unsigned endpoints
    pub secret: Option<String>,
    /// Markdown message title
    pub title: String,
    /// Markdown body, optionally containing [`IMAGE_PLACEHOLDER`]
    pub template: String,
    /// Phone numbers to mention
    pub at_mobiles: Vec<String>,
    /// Mention everyone in the group
    pub is_at_all: bool,
}

impl Destination {
    pub fn endpoint_suffix(&self) -> &str {
        endpoint_suffix(&self.webhook)
    }
}

/// Trailing part of an endpoint, safe to log without exposing the whole URL.
pub fn endpoint_suffix(endpoint: &str) -> &str {
    let start = endpoint
        .char_indices()
        .rev()
        .nth(ENDPOINT_SUFFIX_LEN - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &endpoint[start..]
}

/// Result of delivering the shared image to one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// 1-based position in the destination list
    pub index: usize,
    pub endpoint_suffix: String,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

/// Aggregate of a full fan-out run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// The image URL every destination received
    pub image_url: String,
    pub success_count: usize,
    pub total_count: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl RunSummary {
    pub fn new(image_url: impl Into<String>, total_count: usize) -> Self {
        Self {
            image_url: image_url.into(),
            success_count: 0,
            total_count,
            outcomes: Vec::with_capacity(total_count),
        }
    }

    pub fn record(&mut self, outcome: DeliveryOutcome) {
        if outcome.succeeded {
            self.success_count += 1;
        }
        self.outcomes.push(outcome);
    }

    /// True when every destination accepted the message.
    pub fn is_complete(&self) -> bool {
        self.success_count == self.total_count
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.success_count, self.total_count)
    }
}
