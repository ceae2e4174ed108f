use crate::model::{AuthType, ValidationIssue};
use serde::Serialize;
use thiserror::Error;

/// Malformed request payload. Rejected before any repository call and never retried.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvalidParamsError {
    operation: &'static str,
    message: String,
    path: Option<String>,
}

impl InvalidParamsError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Failures raised by a [`crate::repository::SpreadsheetRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("spreadsheet '{document_id}' was not found")]
    NotFound { document_id: String },
    #[error("permission denied for spreadsheet '{document_id}' using {auth_type} credentials")]
    PermissionDenied {
        document_id: String,
        auth_type: AuthType,
    },
    #[error("sheet '{title}' was not found in spreadsheet '{document_id}'")]
    SheetNotFound { document_id: String, title: String },
    #[error("spreadsheet API quota exceeded")]
    RateLimited,
    #[error("spreadsheet API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("spreadsheet API request failed: {0}")]
    Transport(String),
    #[error("unexpected spreadsheet API response: {0}")]
    Decode(String),
    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last: Box<RepositoryError>,
    },
}

impl RepositoryError {
    /// Errors that a timing change can resolve.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn from_status(document_id: &str, auth_type: AuthType, status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied {
                document_id: document_id.to_string(),
                auth_type,
            },
            404 => Self::NotFound {
                document_id: document_id.to_string(),
            },
            429 => Self::RateLimited,
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for RepositoryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FormatError,
    PermissionDenied,
    NotFound,
    RateLimited,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormatError => "format_error",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_issues: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Structured failure returned by every boundary operation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: ErrorDetails,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: ErrorDetails::default(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_input(error: InvalidParamsError) -> Self {
        let mut out = Self::new(ErrorKind::InvalidInput, error.message());
        out.details.path = error.path().map(str::to_string);
        out
    }

    /// Document does not have the translation table shape.
    pub fn format(issues: Vec<ValidationIssue>) -> Self {
        let errors: Vec<&str> = issues
            .iter()
            .flat_map(|issue| issue.errors.iter().map(String::as_str))
            .collect();
        let suggestion = format_suggestion(&errors);
        let sheets: Vec<&str> = issues.iter().map(|i| i.sheet_title.as_str()).collect();
        let mut out = Self::new(
            ErrorKind::FormatError,
            format!(
                "spreadsheet format is invalid in sheet(s): {}",
                sheets.join(", ")
            ),
        );
        out.details.suggestion = suggestion;
        out.details.validation_issues = issues;
        out
    }

    /// Map a repository failure, attaching the recovery guidance for the credential that
    /// was tried.
    pub fn from_repository(
        error: RepositoryError,
        has_user_credential: bool,
        service_account_email: Option<&str>,
    ) -> Self {
        match error {
            RepositoryError::PermissionDenied { auth_type, .. } => {
                let suggestion = if has_user_credential {
                    "Check the spreadsheet's sharing settings and make sure your Google account can access it.".to_string()
                } else {
                    match service_account_email {
                        Some(email) => format!(
                            "Sign in with Google, or share the spreadsheet with the service account {email}."
                        ),
                        None => "Sign in with Google, or share the spreadsheet with the service account.".to_string(),
                    }
                };
                let mut out = Self::new(ErrorKind::PermissionDenied, error_message(&error));
                out.details.auth_type = Some(auth_type);
                out.details.service_account_email = service_account_email.map(str::to_string);
                out.details.suggestion = Some(suggestion);
                out
            }
            RepositoryError::NotFound { .. } | RepositoryError::SheetNotFound { .. } => {
                Self::new(ErrorKind::NotFound, error_message(&error))
            }
            RepositoryError::RetriesExhausted { ref last, .. }
                if matches!(**last, RepositoryError::RateLimited) =>
            {
                let mut out = Self::new(ErrorKind::RateLimited, error_message(&error));
                out.details.suggestion =
                    Some("The spreadsheet API quota is exhausted. Wait a minute and try again.".to_string());
                out
            }
            RepositoryError::RateLimited => {
                let mut out = Self::new(ErrorKind::RateLimited, error_message(&error));
                out.details.suggestion =
                    Some("The spreadsheet API quota is exhausted. Wait a minute and try again.".to_string());
                out
            }
            other => Self::internal(error_message(&other)),
        }
    }
}

impl From<InvalidParamsError> for ServiceError {
    fn from(error: InvalidParamsError) -> Self {
        Self::invalid_input(error)
    }
}

fn error_message(error: &RepositoryError) -> String {
    error.to_string()
}

/// Human hint keyed off the most common validation messages.
pub fn format_suggestion(errors: &[&str]) -> Option<String> {
    let joined = errors.join("\n").to_ascii_lowercase();
    if joined.contains("no header row") {
        Some("Add a header row with a KEY column followed by one column per language, or apply the no_headers fix.".to_string())
    } else if joined.contains("key column") {
        Some("Add a column named KEY before the language columns, or apply the missing_key fix.".to_string())
    } else if joined.contains("duplicate key") {
        Some("Make every key unique within its sheet, or apply the duplicate_keys fix.".to_string())
    } else if joined.contains("empty key") {
        Some("Fill in a key for every row, or apply the empty_keys fix.".to_string())
    } else if joined.contains("language column") {
        Some("Add at least one language column next to KEY, or apply the no_languages fix.".to_string())
    } else {
        None
    }
}
