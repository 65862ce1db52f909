use crate::foundation::core::Severity;

pub type ArcraftResult<T> = Result<T, ArcraftError>;

#[derive(thiserror::Error, Debug)]
pub enum ArcraftError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("invalid transition from step {from} to step {to}")]
    InvalidTransition { from: u8, to: u8 },

    #[error("qr generation failed: {0}")]
    QrGenerationFailed(String),

    #[error("experience not found: {0}")]
    ExperienceNotFound(String),

    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArcraftError {
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn missing_prerequisite(msg: impl Into<String>) -> Self {
        Self::MissingPrerequisite(msg.into())
    }

    pub fn qr_generation_failed(msg: impl Into<String>) -> Self {
        Self::QrGenerationFailed(msg.into())
    }

    pub fn experience_not_found(id: impl Into<String>) -> Self {
        Self::ExperienceNotFound(id.into())
    }

    pub fn storage_write_failed(msg: impl Into<String>) -> Self {
        Self::StorageWriteFailed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Severity of the notice shown when this error reaches the user.
    pub fn severity(&self) -> Severity {
        match self {
            Self::StorageWriteFailed(_) | Self::QrGenerationFailed(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ArcraftError::unsupported_format("x")
                .to_string()
                .contains("unsupported format:")
        );
        assert!(
            ArcraftError::missing_prerequisite("x")
                .to_string()
                .contains("missing prerequisite:")
        );
        assert_eq!(
            ArcraftError::InvalidTransition { from: 1, to: 4 }.to_string(),
            "invalid transition from step 1 to step 4"
        );
        assert!(
            ArcraftError::FileTooLarge { size: 10, max: 5 }
                .to_string()
                .contains("max 5 bytes")
        );
    }

    #[test]
    fn degraded_paths_are_warnings() {
        assert_eq!(
            ArcraftError::storage_write_failed("quota").severity(),
            Severity::Warning
        );
        assert_eq!(
            ArcraftError::experience_not_found("abc").severity(),
            Severity::Error
        );
    }

    #[test]
    fn rejected_upload_is_an_error() {
        let e = ArcraftError::FileTooLarge {
            size: 11 * 1024 * 1024,
            max: 10 * 1024 * 1024,
        };
        assert_eq!(e.severity(), Severity::Error);
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ArcraftError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
