use thiserror::Error;

/// Run-level failures. Every variant aborts the run with a non-zero exit code;
/// per-destination problems never surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No image URL available: {0}")]
    ResourceUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No valid destinations configured")]
    NoDestinations,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::ResourceUnavailable(_)
            | AppError::Config(_)
            | AppError::NoDestinations
            | AppError::Io(_)
            | AppError::Internal(_) => 1,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_exits_with_one() {
        let errors = [
            AppError::ResourceUnavailable("empty".into()),
            AppError::Config("bad".into()),
            AppError::NoDestinations,
            AppError::Io(std::io::Error::other("disk")),
            AppError::Internal("oops".into()),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1, "{err}");
        }
    }

    #[test]
    fn test_json_errors_map_to_config() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Config(_)));
    }
}
