use actix_web::{HttpResponse, http::StatusCode};
use std::fmt;

#[derive(Debug, Clone)]
pub enum RelayError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Serialization(String),
    Outbound(String),
    Internal(String),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::DatabaseConfig(_) => "E001",
            RelayError::DatabaseConnection(_) => "E002",
            RelayError::DatabaseOperation(_) => "E003",
            RelayError::Validation(_) => "E004",
            RelayError::NotFound(_) => "E005",
            RelayError::Unauthorized(_) => "E006",
            RelayError::Forbidden(_) => "E007",
            RelayError::Serialization(_) => "E008",
            RelayError::Outbound(_) => "E009",
            RelayError::Internal(_) => "E010",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::DatabaseConfig(_) => "Database Configuration Error",
            RelayError::DatabaseConnection(_) => "Database Connection Error",
            RelayError::DatabaseOperation(_) => "Database Operation Error",
            RelayError::Validation(_) => "Validation Error",
            RelayError::NotFound(_) => "Resource Not Found",
            RelayError::Unauthorized(_) => "Unauthorized",
            RelayError::Forbidden(_) => "Forbidden",
            RelayError::Serialization(_) => "Serialization Error",
            RelayError::Outbound(_) => "Outbound Request Error",
            RelayError::Internal(_) => "Internal Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RelayError::DatabaseConfig(msg)
            | RelayError::DatabaseConnection(msg)
            | RelayError::DatabaseOperation(msg)
            | RelayError::Validation(msg)
            | RelayError::NotFound(msg)
            | RelayError::Unauthorized(msg)
            | RelayError::Forbidden(msg)
            | RelayError::Serialization(msg)
            | RelayError::Outbound(msg)
            | RelayError::Internal(msg) => msg,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for RelayError {}

// Convenience constructors
impl RelayError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        RelayError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        RelayError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        RelayError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        RelayError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        RelayError::NotFound(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        RelayError::Unauthorized(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        RelayError::Forbidden(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        RelayError::Serialization(msg.into())
    }

    pub fn outbound<T: Into<String>>(msg: T) -> Self {
        RelayError::Outbound(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        RelayError::Internal(msg.into())
    }
}

impl From<sea_orm::DbErr> for RelayError {
    fn from(err: sea_orm::DbErr) -> Self {
        RelayError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Internal(err.to_string())
    }
}

impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::Validation(err.to_string())
    }
}

// Handlers return Result<HttpResponse, RelayError>; storage failures on the
// matching/write path surface as 500 with no partial state assumed committed.
impl actix_web::ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::Forbidden(_) => StatusCode::FORBIDDEN,
            RelayError::Outbound(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(("Content-Type", "application/json; charset=utf-8"))
            .json(serde_json::json!({
                "code": self.code(),
                "error": self.message(),
            }))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
