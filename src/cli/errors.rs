use crate::errors::ServiceError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_this: Option<String>,
}

pub fn envelope_for(error: &anyhow::Error) -> ErrorEnvelope {
    if let Some(service) = error.downcast_ref::<ServiceError>() {
        let try_this = service.details.suggestion.clone().or_else(|| {
            service
                .details
                .path
                .as_ref()
                .map(|path| format!("check the `{path}` argument"))
        });
        return ErrorEnvelope {
            code: service.kind.as_str().to_ascii_uppercase(),
            message: service.message.clone(),
            try_this,
        };
    }

    let message = format!("{error:#}");

    if message.contains("pass --document") {
        return ErrorEnvelope {
            code: "DOCUMENT_REQUIRED".to_string(),
            message,
            try_this: Some(
                "pass `--document <spreadsheet id or URL>` or `--fixture <snapshot.yaml>`".to_string(),
            ),
        };
    }

    if message.contains("failed to read fixture") {
        return ErrorEnvelope {
            code: "FILE_NOT_FOUND".to_string(),
            message,
            try_this: Some("check the fixture path and permissions".to_string()),
        };
    }

    ErrorEnvelope {
        code: "COMMAND_FAILED".to_string(),
        message,
        try_this: None,
    }
}
