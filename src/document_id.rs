use crate::errors::InvalidParamsError;
use once_cell::sync::Lazy;
use regex::Regex;

static URL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").expect("document url pattern"));
static RAW_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("document id pattern"));

/// Extract the document id from a raw id or a browser URL
/// (`https://docs.google.com/spreadsheets/d/<id>/edit#gid=0`).
pub fn extract_document_id(input: &str) -> Result<String, InvalidParamsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidParamsError::new(
            "extract_document_id",
            "a spreadsheet id or URL is required",
        )
        .with_path("documentId"));
    }

    if trimmed.contains('/') {
        return URL_ID
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                InvalidParamsError::new(
                    "extract_document_id",
                    format!("'{trimmed}' is not a spreadsheet URL; expected a path containing /d/<id>"),
                )
                .with_path("documentId")
            });
    }

    if RAW_ID.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(InvalidParamsError::new(
            "extract_document_id",
            format!("'{trimmed}' is not a valid spreadsheet id"),
        )
        .with_path("documentId"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_raw_ids_and_urls() {
        assert_eq!(extract_document_id("1AbC-d_9").unwrap(), "1AbC-d_9");
        assert_eq!(
            extract_document_id(
                "https://docs.google.com/spreadsheets/d/1AbC-d_9/edit#gid=0"
            )
            .unwrap(),
            "1AbC-d_9"
        );
        assert_eq!(extract_document_id("  abc  ").unwrap(), "abc");
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "   ", "https://example.com/sheet", "not an id", "id?x=1"] {
            let err = extract_document_id(input).unwrap_err();
            assert_eq!(err.path(), Some("documentId"), "{input}");
        }
    }
}
