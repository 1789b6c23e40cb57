use thiserror::Error;

pub type SimplexResult<T> = Result<T, SimplexError>;

#[derive(Debug, Error)]
pub enum SimplexError {
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Out of space: {requested} sectors requested, {available} free")]
    OutOfSpace { requested: usize, available: usize },

    #[error("Corrupt image ({field}): expected {expected}, found {actual}")]
    CorruptImage {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported SimplexFS version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Hex image format error: {0}")]
    HexFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SimplexError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SimplexError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    pub fn corrupt(
        field: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        SimplexError::CorruptImage {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, SimplexError::CorruptImage { .. })
    }
}
