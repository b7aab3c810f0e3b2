use crate::conversion::ConversionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde_json::json;
use std::fmt;

/// Application errors and how they are reported over HTTP
#[derive(Debug, Clone)]
pub enum BusinessError {
    /// Validation errors for user input (400 Bad Request)
    ValidationError { field: String, message: String },
    /// Input that is well-formed but cannot be converted (422 Unprocessable Entity)
    BusinessRuleViolation { rule: String, message: String },
    /// Resource not found (404 Not Found)
    NotFound { resource: String, id: String },
    /// External service errors, including a disabled database (502 Bad Gateway)
    ExternalServiceError { service: String, message: String },
    /// Generic application error (500 Internal Server Error)
    InternalError { message: String },
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::ValidationError { field, message } => {
                write!(f, "Validation error in field '{field}': {message}")
            }
            BusinessError::BusinessRuleViolation { rule, message } => {
                write!(f, "Business rule '{rule}' violated: {message}")
            }
            BusinessError::NotFound { resource, id } => {
                write!(f, "{resource} with id '{id}' not found")
            }
            BusinessError::ExternalServiceError { service, message } => {
                write!(f, "External service '{service}' error: {message}")
            }
            BusinessError::InternalError { message } => {
                write!(f, "Internal error: {message}")
            }
        }
    }
}

impl std::error::Error for BusinessError {}

impl BusinessError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            BusinessError::ValidationError { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            BusinessError::BusinessRuleViolation { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "BUSINESS_RULE_VIOLATION",
            ),
            BusinessError::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            BusinessError::ExternalServiceError { .. } => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR")
            }
            BusinessError::InternalError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            BusinessError::ValidationError { .. } => "ValidationError",
            BusinessError::BusinessRuleViolation { .. } => "BusinessRuleViolation",
            BusinessError::NotFound { .. } => "NotFound",
            BusinessError::ExternalServiceError { .. } => "ExternalServiceError",
            BusinessError::InternalError { .. } => "InternalError",
        }
    }

    pub fn database_disabled() -> Self {
        BusinessError::ExternalServiceError {
            service: "database".to_string(),
            message: "submission persistence is not configured".to_string(),
        }
    }
}

/// Convert `BusinessError` to HTTP responses
impl IntoResponse for BusinessError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::debug!("Request rejected: {self}");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "type": self.type_name(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<ConversionError> for BusinessError {
    fn from(err: ConversionError) -> Self {
        let message = err.to_string();
        match err {
            ConversionError::EmptyCsv => BusinessError::BusinessRuleViolation {
                rule: "csv_not_empty".to_string(),
                message,
            },
            ConversionError::CsvRead { .. } => BusinessError::ValidationError {
                field: "csvFile".to_string(),
                message,
            },
            ConversionError::MissingSheet { .. } => BusinessError::BusinessRuleViolation {
                rule: "template_sheets".to_string(),
                message,
            },
            ConversionError::InvalidAddress { .. }
            | ConversionError::Template { .. }
            | ConversionError::Container { .. } => BusinessError::InternalError { message },
        }
    }
}

/// Maps database errors onto business errors with the resource they concern
pub struct ErrorMapper;

impl ErrorMapper {
    pub fn map_db_error(err: DbErr, context: &str) -> BusinessError {
        match err {
            DbErr::RecordNotFound(msg) => BusinessError::NotFound {
                resource: Self::extract_resource_from_context(context),
                id: Self::extract_id_from_message(&msg),
            },
            DbErr::Conn(conn_err) => BusinessError::ExternalServiceError {
                service: "database".to_string(),
                message: conn_err.to_string(),
            },
            _ => BusinessError::InternalError {
                message: err.to_string(),
            },
        }
    }

    fn extract_resource_from_context(context: &str) -> String {
        context.replace('_', " ")
    }

    /// Pull an id out of messages like "... id 'value' ..." or a bare UUID
    fn extract_id_from_message(msg: &str) -> String {
        if let Some(start_pos) = msg.find(" id '") {
            let after_id = &msg[start_pos + 5..];
            if let Some(end_pos) = after_id.find('\'') {
                return after_id[..end_pos].to_string();
            }
        }

        msg.split_whitespace()
            .find_map(|word| {
                let cleaned = word.trim_matches('\'').trim_matches('"');
                uuid::Uuid::parse_str(cleaned)
                    .is_ok()
                    .then(|| cleaned.to_string())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[macro_export]
macro_rules! validation_error {
    ($field:expr, $message:expr) => {
        $crate::common::errors::BusinessError::ValidationError {
            field: $field.to_string(),
            message: $message.to_string(),
        }
    };
}

#[macro_export]
macro_rules! not_found {
    ($resource:expr, $id:expr) => {
        $crate::common::errors::BusinessError::NotFound {
            resource: $resource.to_string(),
            id: $id.to_string(),
        }
    };
}

/// Extension trait to add business error conversion to `DbErr`
pub trait DbErrorExt {
    fn to_business_error(self, context: &str) -> BusinessError;
}

impl DbErrorExt for DbErr {
    fn to_business_error(self, context: &str) -> BusinessError {
        ErrorMapper::map_db_error(self, context)
    }
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;
