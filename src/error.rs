use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authorization failed: {message}")]
    Auth { message: String },

    #[error("Client secret file {path} is invalid: {message}")]
    InvalidClientSecret { path: String, message: String },

    #[error("Listing accessible accounts failed: {}", .errors.join("; "))]
    AccountListing { errors: Vec<String> },

    #[error("Reporting query for account {account_id} failed: {}", .errors.join("; "))]
    Reporting {
        account_id: String,
        errors: Vec<String>,
    },

    #[error("Platform responded with {status}: {}", .errors.join("; "))]
    Platform {
        status: StatusCode,
        errors: Vec<String>,
    },

    #[error("Database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("API request failed: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("The date supplied {date} is invalid")]
    InvalidDate { date: String },

    #[error("Field {field} has invalid value {value}")]
    InvalidField { field: &'static str, value: String },
}
