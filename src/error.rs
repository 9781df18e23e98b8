// error.rs - Error types; every variant is shown to the user and recoverable

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZipperError {
    /// One or more files of an intake batch had a MIME type outside the
    /// accepted set. Holds the distinct rejected subtypes in first-seen order.
    #[error("Unsupported file format(s): {}", .formats.join(", "))]
    UnsupportedFormat { formats: Vec<String> },

    /// The image bytes could not be decoded.
    #[error("Could not decode image: {0}")]
    DecodeFailure(String),

    /// The resized surface could not be encoded.
    #[error("Could not encode image: {0}")]
    EncodeFailure(String),

    /// The compressed bytes could not be fetched for export.
    #[error("Could not read compressed image: {0}")]
    ExportFailure(String),

    /// The zip archive could not be serialized.
    #[error("Could not build archive: {0}")]
    ArchiveFailure(String),

    /// A tunable was set outside its allowed range.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("No file at position {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A picked or dropped file could not be read from disk.
    #[error("Could not read {}: {reason}", .path.display())]
    ReadFailure { path: PathBuf, reason: String },

    /// The finished archive could not be written to its destination.
    #[error("Could not save archive: {0}")]
    SaveFailure(String),
}

/// Convenience result type for zipper operations.
pub type ZipperResult<T> = Result<T, ZipperError>;

impl ZipperError {
    pub fn decode<T: ToString>(err: T) -> Self {
        Self::DecodeFailure(err.to_string())
    }

    pub fn encode<T: ToString>(err: T) -> Self {
        Self::EncodeFailure(err.to_string())
    }

    pub fn export<T: ToString>(err: T) -> Self {
        Self::ExportFailure(err.to_string())
    }

    pub fn archive<T: ToString>(err: T) -> Self {
        Self::ArchiveFailure(err.to_string())
    }

    pub fn setting<T: ToString>(msg: T) -> Self {
        Self::InvalidSetting(msg.to_string())
    }

    pub fn save<T: ToString>(err: T) -> Self {
        Self::SaveFailure(err.to_string())
    }

    pub fn read(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::ReadFailure {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for ZipperError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::archive(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_message() {
        let err = ZipperError::UnsupportedFormat {
            formats: vec!["gif".into(), "bmp".into()],
        };
        assert_eq!(err.to_string(), "Unsupported file format(s): gif, bmp");
    }

    #[test]
    fn test_index_out_of_range_message() {
        let err = ZipperError::IndexOutOfRange { index: 3, len: 2 };
        assert_eq!(err.to_string(), "No file at position 3 (list has 2)");
    }
}
