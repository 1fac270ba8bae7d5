//! Image URL acceptance checks.
//!
//! Chat platforms silently drop images they cannot fetch, so URLs are screened
//! before any request is made. Checks run in a fixed order and stop at the
//! first failure:
//! 1. secure scheme
//! 2. blocked domains (case-insensitive)
//! 3. recommended domains (warning only)
//! 4. image extension (case-insensitive)
//! 5. illegal raw characters

use thiserror::Error;

use beacon_common::config::ValidationRules;

/// Reason an image URL was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("URL does not use the {0} scheme")]
    InsecureScheme(String),

    #[error("URL domain is blocked ({0})")]
    BlockedDomain(String),

    #[error("URL is not a supported image format ({0})")]
    UnsupportedFormat(String),

    #[error("URL contains illegal character {0:?}, percent-encode it first")]
    IllegalCharacter(char),
}

/// Message logged when every check passes.
pub const ACCEPTED: &str = "URL passed validation";

#[derive(Debug, Clone, Default)]
pub struct UrlValidator {
    rules: ValidationRules,
}

impl UrlValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Check `url` against the configured rules.
    ///
    /// A URL outside the recommended domains is still accepted; the miss is
    /// only logged, since the recommended list is not exhaustive.
    pub fn validate(&self, url: &str) -> Result<(), Rejection> {
        let rules = &self.rules;

        if !url.starts_with(&rules.required_scheme) {
            return Err(Rejection::InsecureScheme(rules.required_scheme.clone()));
        }

        let lowered = url.to_lowercase();
        if let Some(blocked) = rules
            .blocked_domains
            .iter()
            .find(|domain| lowered.contains(&domain.to_lowercase()))
        {
            return Err(Rejection::BlockedDomain(blocked.clone()));
        }

        if !self.is_recommended(url) {
            tracing::warn!(url, "Image domain is not in the recommended list, it may not render");
        }

        let has_image_extension = rules
            .image_extensions
            .iter()
            .any(|ext| lowered.ends_with(&format!(".{}", ext.to_lowercase())));
        if !has_image_extension {
            return Err(Rejection::UnsupportedFormat(
                rules.image_extensions.join("/"),
            ));
        }

        if let Some(c) = url.chars().find(|c| rules.illegal_characters.contains(c)) {
            return Err(Rejection::IllegalCharacter(c));
        }

        Ok(())
    }

    /// Case-sensitive match against the recommended domain list.
    pub fn is_recommended(&self, url: &str) -> bool {
        self.rules
            .recommended_domains
            .iter()
            .any(|domain| url.contains(domain.as_str()))
    }
}
