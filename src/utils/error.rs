use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcureError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{service} returned {status}: {body}")]
    UpstreamError {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Model output could not be parsed: {message}")]
    ModelOutputError { message: String },

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

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Payment error: {message}")]
    PaymentError { message: String, budget_exceeded: bool },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    ModelOutput,
    Configuration,
    Validation,
    Payment,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ProcureError {
    pub fn validation(message: impl Into<String>) -> Self {
        ProcureError::ValidationError {
            message: message.into(),
        }
    }

    pub fn model_output(message: impl Into<String>) -> Self {
        ProcureError::ModelOutputError {
            message: message.into(),
        }
    }

    pub fn payment(message: impl Into<String>) -> Self {
        ProcureError::PaymentError {
            message: message.into(),
            budget_exceeded: false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ProcureError::ApiError(_) => ErrorCategory::Network,
            ProcureError::UpstreamError { .. } => ErrorCategory::Upstream,
            ProcureError::ModelOutputError { .. } | ProcureError::SerializationError(_) => {
                ErrorCategory::ModelOutput
            }
            ProcureError::ConfigError { .. }
            | ProcureError::ConfigValidationError { .. }
            | ProcureError::InvalidConfigValueError { .. }
            | ProcureError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ProcureError::ValidationError { .. } | ProcureError::NotFound { .. } => {
                ErrorCategory::Validation
            }
            ProcureError::PaymentError { .. } => ErrorCategory::Payment,
            ProcureError::IoError(_) | ProcureError::ZipError(_) | ProcureError::CsvError(_) => {
                ErrorCategory::Storage
            }
            ProcureError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Upstream | ErrorCategory::ModelOutput => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Storage | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Payment => ErrorSeverity::Critical,
        }
    }

    /// 只有暫時性的網路錯誤、429 與 5xx 可以重試
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcureError::ApiError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            ProcureError::UpstreamError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the upstream base URL",
            ErrorCategory::Upstream => {
                "Check the API key and quota of the upstream service, then retry"
            }
            ErrorCategory::ModelOutput => "Retry the operation; the model returned malformed JSON",
            ErrorCategory::Configuration => {
                "Review the TOML configuration and required environment variables"
            }
            ErrorCategory::Validation => "Fix the highlighted input and submit again",
            ErrorCategory::Payment => {
                "Review the plan totals and vendor wallet addresses before re-running the payment"
            }
            ErrorCategory::Storage => "Check that the output directory exists and is writable",
            ErrorCategory::Processing => "Retry the operation or contact support",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ProcureError::ApiError(_) => "Could not reach an external service".to_string(),
            ProcureError::UpstreamError { service, status, .. } => {
                format!("{} rejected the request (HTTP {})", service, status)
            }
            ProcureError::ModelOutputError { .. } | ProcureError::SerializationError(_) => {
                "The AI response could not be understood".to_string()
            }
            ProcureError::ValidationError { message } => message.clone(),
            ProcureError::PaymentError { message, .. } => format!("Payment failed: {}", message),
            ProcureError::MissingConfigError { field } => {
                format!("Missing configuration: {}", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcureError>;
