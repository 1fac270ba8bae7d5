//! Destination list loader.
//!
//! The config file is a JSON array of objects. Entries missing `webhook`,
//! `secret` or `template` (or carrying fields of the wrong type) are skipped
//! with a warning; only a missing or malformed file is fatal.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use beacon_common::error::AppError;
use beacon_common::types::Destination;

const REQUIRED_FIELDS: &[&str] = &["webhook", "secret", "template"];

/// One entry as written in the config file.
#[derive(Debug, Deserialize)]
struct DestinationRecord {
    webhook: String,
    secret: Option<String>,
    template: String,
    title: Option<String>,
    #[serde(default)]
    at_mobiles: Vec<String>,
    #[serde(default)]
    is_at_all: bool,
}

impl DestinationRecord {
    fn into_destination(self, default_title: &str) -> Destination {
        Destination {
            webhook: self.webhook,
            secret: self.secret.filter(|s| !s.is_empty()),
            title: self.title.unwrap_or_else(|| default_title.to_string()),
            template: self.template,
            at_mobiles: self.at_mobiles,
            is_at_all: self.is_at_all,
        }
    }
}

/// Read and validate the destination list at `path`.
pub async fn load_destinations(
    path: &Path,
    default_title: &str,
) -> Result<Vec<Destination>, AppError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    parse_destinations(&contents, default_title)
}

/// Validate a destination list already read into memory.
pub fn parse_destinations(
    contents: &str,
    default_title: &str,
) -> Result<Vec<Destination>, AppError> {
    let root: Value = serde_json::from_str(contents)?;
    let Value::Array(entries) = root else {
        return Err(AppError::Config(
            "config file must contain a JSON array".to_string(),
        ));
    };

    let total = entries.len();
    let mut destinations = Vec::with_capacity(total);

    for (idx, entry) in entries.into_iter().enumerate() {
        let position = idx + 1;

        let Some(object) = entry.as_object() else {
            tracing::warn!(entry = position, "Config entry is not an object, skipped");
            continue;
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !object.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                entry = position,
                missing = %missing.join(", "),
                "Config entry is missing required fields, skipped"
            );
            continue;
        }

        match serde_json::from_value::<DestinationRecord>(entry) {
            Ok(record) => destinations.push(record.into_destination(default_title)),
            Err(e) => {
                tracing::warn!(entry = position, error = %e, "Config entry is malformed, skipped");
            }
        }
    }

    tracing::info!(
        valid = destinations.len(),
        total,
        "Loaded destination config"
    );

    Ok(destinations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "Safety Reminder";

    #[test]
    fn test_defaults_applied() {
        let destinations = parse_destinations(
            r#"[{"webhook": "https://x/robot/send?access_token=a", "secret": "SEC1", "template": "hi"}]"#,
            TITLE,
        )
        .unwrap();

        assert_eq!(
            destinations,
            vec![Destination {
                webhook: "https://x/robot/send?access_token=a".to_string(),
                secret: Some("SEC1".to_string()),
                title: TITLE.to_string(),
                template: "hi".to_string(),
                at_mobiles: vec![],
                is_at_all: false,
            }]
        );
    }

    #[test]
    fn test_optional_fields_kept() {
        let destinations = parse_destinations(
            r#"[{
                "webhook": "https://x/robot/send?access_token=a",
                "secret": null,
                "template": "{IMAGE_URL}",
                "title": "Ward 3",
                "at_mobiles": ["138"],
                "is_at_all": true
            }]"#,
            TITLE,
        )
        .unwrap();

        let d = &destinations[0];
        assert_eq!(d.secret, None);
        assert_eq!(d.title, "Ward 3");
        assert_eq!(d.at_mobiles, vec!["138".to_string()]);
        assert!(d.is_at_all);
    }

    #[test]
    fn test_empty_secret_means_unsigned() {
        let destinations = parse_destinations(
            r#"[{"webhook": "w?access_token=a", "secret": "", "template": "t"}]"#,
            TITLE,
        )
        .unwrap();
        assert_eq!(destinations[0].secret, None);
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let destinations = parse_destinations(
            r#"[
                "not an object",
                {"webhook": "w?access_token=a", "template": "missing secret"},
                {"webhook": 42, "secret": "s", "template": "wrong type"},
                {"webhook": "w?access_token=b", "secret": "s", "template": "ok"}
            ]"#,
            TITLE,
        )
        .unwrap();

        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0].template, "ok");
    }

    #[test]
    fn test_non_array_is_fatal() {
        let err = parse_destinations(r#"{"webhook": "w"}"#, TITLE).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let err = parse_destinations("[{", TITLE).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_empty_array_is_ok() {
        assert!(parse_destinations("[]", TITLE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_destinations(&dir.path().join("config.json"), TITLE)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"[{"webhook": "w?access_token=a", "secret": "s", "template": "t"}]"#,
        )
        .unwrap();

        let destinations = load_destinations(&path, TITLE).await.unwrap();
        assert_eq!(destinations.len(), 1);
    }
}
