use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::DEFAULT_TITLE;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base directory every relative path below is resolved against
    pub base_dir: PathBuf,

    /// Destination list (JSON array), relative to `base_dir` unless absolute
    pub config_file: PathBuf,

    /// Image URL queue (one URL per line), relative to `base_dir` unless absolute
    pub queue_file: PathBuf,

    /// Directory holding `run.log`, relative to `base_dir` unless absolute
    pub log_dir: PathBuf,

    /// Title used for destinations that do not set one
    pub default_title: String,

    /// Maximum send attempts per destination (default: 3)
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds, doubled per attempt (default: 1000)
    pub retry_initial_delay_ms: u64,

    /// Upper bound of the random jitter added to each retry delay (default: 1000)
    pub retry_jitter_ms: u64,

    /// Lower bound of the pause between destinations in milliseconds (default: 1000)
    pub pace_min_ms: u64,

    /// Upper bound of the pause between destinations in milliseconds (default: 3000)
    pub pace_max_ms: u64,

    /// HTTP request timeout for webhook calls (default: 10)
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            base_dir: std::env::var("BEACON_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_base_dir()),
            config_file: std::env::var("BEACON_CONFIG_FILE")
                .unwrap_or_else(|_| "config/config.json".to_string())
                .into(),
            queue_file: std::env::var("BEACON_QUEUE_FILE")
                .unwrap_or_else(|_| "config/image.txt".to_string())
                .into(),
            log_dir: std::env::var("BEACON_LOG_DIR")
                .unwrap_or_else(|_| "logs".to_string())
                .into(),
            default_title: std::env::var("BEACON_DEFAULT_TITLE")
                .unwrap_or_else(|_| DEFAULT_TITLE.to_string()),
            max_attempts: std::env::var("BEACON_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BEACON_MAX_ATTEMPTS must be a valid u32"))?,
            retry_initial_delay_ms: std::env::var("BEACON_RETRY_INITIAL_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("BEACON_RETRY_INITIAL_DELAY_MS must be a valid u64")
                })?,
            retry_jitter_ms: std::env::var("BEACON_RETRY_JITTER_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BEACON_RETRY_JITTER_MS must be a valid u64"))?,
            pace_min_ms: std::env::var("BEACON_PACE_MIN_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BEACON_PACE_MIN_MS must be a valid u64"))?,
            pace_max_ms: std::env::var("BEACON_PACE_MAX_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BEACON_PACE_MAX_MS must be a valid u64"))?,
            http_timeout_secs: std::env::var("BEACON_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BEACON_HTTP_TIMEOUT_SECS must be a valid u64"))?,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn queue_path(&self) -> PathBuf {
        self.resolve(&self.queue_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_jitter: Duration::from_millis(self.retry_jitter_ms),
        }
    }

    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            min: Duration::from_millis(self.pace_min_ms),
            max: Duration::from_millis(self.pace_max_ms.max(self.pace_min_ms)),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// The directory containing the running executable, or `.` when it cannot be determined.
fn default_base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Acceptance rules for image URLs, checked before any network call.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Required URL prefix (secure transport only)
    pub required_scheme: String,
    /// Substrings rejected case-insensitively
    pub blocked_domains: Vec<String>,
    /// Substrings expected to render reliably; a miss only warns
    pub recommended_domains: Vec<String>,
    /// Accepted file extensions, without the leading dot
    pub image_extensions: Vec<String>,
    /// Characters that must be percent-encoded before use
    pub illegal_characters: Vec<char>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            required_scheme: "https://".to_string(),
            blocked_domains: to_strings(&[
                "github.com",
                "raw.githubusercontent.com",
                "localhost",
                "127.0.0.1",
            ]),
            recommended_domains: to_strings(&[
                "alicdn.com",
                "qiniucdn.com",
                "aliyuncs.com",
                "cdn.",
                "img.",
                "oss-",
                "yourcompany.com",
            ]),
            image_extensions: to_strings(&["jpg", "jpeg", "png", "gif", "webp"]),
            illegal_characters: vec![' ', '|', '{', '}'],
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Retry behaviour shared by every send operation.
///
/// The delay before retry `n` (0-indexed) is `initial_delay * 2^n` plus a
/// uniformly random jitter in `[0, max_jitter)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt may follow the (0-indexed) attempt `attempt`.
    pub fn has_remaining(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Deterministic part of the delay after attempt `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(multiplier)
    }
}

/// Bounds of the random pause between two destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

impl PacingPolicy {
    /// No pause at all; used when pacing is handled elsewhere.
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(base: &str) -> AppConfig {
        AppConfig {
            base_dir: PathBuf::from(base),
            config_file: "config/config.json".into(),
            queue_file: "/var/lib/beacon/image.txt".into(),
            log_dir: "logs".into(),
            default_title: DEFAULT_TITLE.to_string(),
            max_attempts: 0,
            retry_initial_delay_ms: 500,
            retry_jitter_ms: 0,
            pace_min_ms: 2000,
            pace_max_ms: 1000,
            http_timeout_secs: 10,
        }
    }

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let config = config_with("/opt/beacon");
        assert_eq!(
            config.config_path(),
            PathBuf::from("/opt/beacon/config/config.json")
        );
        assert_eq!(config.log_path(), PathBuf::from("/opt/beacon/logs"));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let config = config_with("/opt/beacon");
        assert_eq!(
            config.queue_path(),
            PathBuf::from("/var/lib/beacon/image.txt")
        );
    }

    #[test]
    fn test_policies_are_clamped() {
        let config = config_with(".");
        assert_eq!(config.retry_policy().max_attempts, 1);
        let pacing = config.pacing_policy();
        assert_eq!(pacing.min, Duration::from_millis(2000));
        assert_eq!(pacing.max, Duration::from_millis(2000));
    }

    #[test]
    fn test_base_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_base_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(40), Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_has_remaining() {
        let policy = RetryPolicy::default();
        assert!(policy.has_remaining(0));
        assert!(policy.has_remaining(1));
        assert!(!policy.has_remaining(2));
    }

    #[test]
    fn test_default_rules() {
        let rules = ValidationRules::default();
        assert_eq!(rules.required_scheme, "https://");
        assert!(rules.blocked_domains.iter().any(|d| d == "github.com"));
        assert_eq!(rules.image_extensions.len(), 5);
        assert!(rules.illegal_characters.contains(&' '));
    }
}
