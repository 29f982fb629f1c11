//! Application-wide error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    /// A stored line could not be parsed. `line` is 1-based.
    #[error("corrupt record in {} at line {line}: {reason}", path.display())]
    CorruptRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Infrastructure failures the caller may retry. Data errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }

    /// Stable kind string used in protocol error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::CorruptRecord { .. } => "corrupt_record",
            AppError::EntityNotFound(_) => "entity_not_found",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::Config(_) | AppError::Logger(_) | AppError::Memory(_) | AppError::Io(_) => {
                "internal"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("config error"));
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn corrupt_record_names_file_and_line() {
        let e = AppError::CorruptRecord {
            path: PathBuf::from("/data/memory_ab.json"),
            line: 7,
            reason: "expected value".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("memory_ab.json"));
        assert!(msg.contains("line 7"));
        assert_eq!(e.kind(), "corrupt_record");
    }

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(AppError::StorageUnavailable("disk full".into()).is_retryable());
        assert!(!AppError::EntityNotFound("Alice".into()).is_retryable());
        assert!(!AppError::Memory("join".into()).is_retryable());
    }

    #[test]
    fn entity_not_found_kind() {
        let e = AppError::EntityNotFound("Bob".into());
        assert_eq!(e.kind(), "entity_not_found");
        assert!(e.to_string().contains("Bob"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        // satisfies std::error::Error trait
        let _: &dyn Error = &e;
    }
}
