use crate::domain::model::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

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

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Authentication,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::ApiError(_) => ErrorCategory::Network,
            ClientError::IoError(_) => ErrorCategory::System,
            ClientError::SerializationError(_) | ClientError::ValidationError { .. } => {
                ErrorCategory::Data
            }
            ClientError::ConfigError { .. }
            | ClientError::ConfigValidationError { .. }
            | ClientError::InvalidConfigValueError { .. }
            | ClientError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ClientError::AuthenticationRequired => ErrorCategory::Authentication,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Authentication | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 對應到回傳給呼叫端的錯誤代碼
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ClientError::ApiError(e) if e.is_timeout() => ErrorCode::Timeout,
            ClientError::ApiError(e) => match e.status() {
                Some(status) => ErrorCode::from_status(status.as_u16()),
                None => ErrorCode::NetworkError,
            },
            ClientError::AuthenticationRequired => ErrorCode::Unauthorized,
            ClientError::SerializationError(_) | ClientError::IoError(_) => {
                ErrorCode::NetworkError
            }
            _ => ErrorCode::Unknown,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ClientError::ApiError(_) | ClientError::AuthenticationRequired => {
                self.error_code().user_message().to_string()
            }
            ClientError::IoError(e) => format!("File system error: {}", e),
            ClientError::SerializationError(_) => {
                "The server returned data that could not be read.".to_string()
            }
            ClientError::ConfigError { message } => format!("Configuration problem: {}", message),
            ClientError::ConfigValidationError { field, message } => {
                format!("Configuration field '{}' is invalid: {}", field, message)
            }
            ClientError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration field '{}' is invalid: {}", field, reason)
            }
            ClientError::MissingConfigError { field } => {
                format!("Configuration field '{}' is required", field)
            }
            ClientError::ValidationError { message } => format!("Invalid input: {}", message),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check your internet connection and the API base URL, then try again.",
            ErrorCategory::Configuration => "Review the configuration file and command-line overrides.",
            ErrorCategory::Authentication => "Sign in again or pass a valid identity token with --token.",
            ErrorCategory::Data => "Check the request payload and the server response format.",
            ErrorCategory::System => "Check file permissions and available disk space.",
        }
    }
}
