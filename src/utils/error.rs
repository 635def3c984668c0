use crate::domain::model::BookId;
use thiserror::Error;

/// 外部協作者（BookInfoService / ReviewService）回報的錯誤
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Book {0} not found")]
    NotFound(BookId),
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Error, Debug)]
pub enum BookError {
    #[error("Exception occurred while fetching books: {source}")]
    Lookup {
        #[source]
        source: SourceError,
    },

    #[error("Retries exhausted after {retries} retries: {last}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        last: Box<BookError>,
    },

    #[error("Review {review_id} belongs to book {found}, expected book {expected}")]
    Integrity {
        review_id: u64,
        expected: BookId,
        found: BookId,
    },

    #[error("Stream overflow: {message}")]
    Overflow { message: String },

    #[error("Illegal state: {message}")]
    IllegalState { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lookup,
    Retry,
    Data,
    Stream,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SourceError> for BookError {
    fn from(source: SourceError) -> Self {
        BookError::Lookup { source }
    }
}

impl BookError {
    pub fn lookup(source: SourceError) -> Self {
        BookError::Lookup { source }
    }

    /// 只有查詢失敗（協作者錯誤轉換後的領域錯誤）才值得重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookError::Lookup { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BookError::Lookup { .. } => ErrorCategory::Lookup,
            BookError::RetriesExhausted { .. } => ErrorCategory::Retry,
            BookError::Integrity { .. } | BookError::ProcessingError { .. } => ErrorCategory::Data,
            BookError::Overflow { .. } | BookError::IllegalState { .. } => ErrorCategory::Stream,
            BookError::ConfigError { .. }
            | BookError::ConfigValidationError { .. }
            | BookError::InvalidConfigValueError { .. }
            | BookError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BookError::IoError(_) | BookError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Lookup | ErrorCategory::Retry => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Stream | ErrorCategory::Configuration => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BookError::Lookup { .. } => {
                "Check that the book and review sources are reachable, or run with a retry policy"
                    .to_string()
            }
            BookError::RetriesExhausted { retries, .. } => format!(
                "The lookup kept failing after {} retries; raise retry.max_retries or retry.max_delay_ms",
                retries
            ),
            BookError::Integrity { expected, .. } => format!(
                "Fix the review data for book {} so every review references its own book",
                expected
            ),
            BookError::Overflow { .. } => {
                "Increase the consumer demand or the buffer size".to_string()
            }
            BookError::ConfigError { .. }
            | BookError::ConfigValidationError { .. }
            | BookError::InvalidConfigValueError { .. }
            | BookError::MissingConfigError { .. } => {
                "Review the TOML configuration file and fix the reported field".to_string()
            }
            BookError::IoError(_) => "Check file paths and permissions".to_string(),
            _ => "Re-run with --verbose for more details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BookError::Lookup { .. } => "Could not fetch books right now".to_string(),
            BookError::RetriesExhausted { retries, .. } => {
                format!("Could not fetch books, gave up after {} retries", retries)
            }
            BookError::MissingConfigError { field } => {
                format!("Missing configuration field '{}'", field)
            }
            BookError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid configuration for '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BookError>;
