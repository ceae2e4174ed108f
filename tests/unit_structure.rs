use anyhow::Result;
use sheets_i18n::errors::ErrorKind;
use sheets_i18n::model::CellFormat;
use sheets_i18n::tools::{self, AddLanguageColumnParams, AddSheetParams};

mod support;
use support::{DOC, TestDocument};

fn add_sheet_params(title: &str) -> AddSheetParams {
    AddSheetParams {
        document_id: DOC.to_string(),
        title: title.to_string(),
    }
}

fn add_language_params(language: &str) -> AddLanguageColumnParams {
    AddLanguageColumnParams {
        document_id: DOC.to_string(),
        language: language.to_string(),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn new_sheet_copies_languages_of_the_first_valid_sheet() -> Result<()> {
    let doc = TestDocument::new(&[
        ("broken", &[&["English"], &["x"]]),
        ("common", &[&["KEY", "English", "Japanese"], &["hello", "Hello", "こんにちは"]]),
    ]);

    let spreadsheet = tools::add_sheet(&doc.user_session(), add_sheet_params(" errors ")).await;
    // The broken sheet keeps the whole document invalid after the write.
    let err = spreadsheet.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FormatError);

    assert_eq!(doc.headers("errors"), vec!["KEY", "English", "Japanese"]);
    for column in 0..3 {
        assert_eq!(
            doc.store.header_format(DOC, "errors", column),
            Some(CellFormat::header())
        );
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn new_sheet_defaults_to_english_without_a_valid_template() -> Result<()> {
    let doc = TestDocument::new(&[("empty", &[&[""]])]);
    let _ = tools::add_sheet(&doc.user_session(), add_sheet_params("common")).await;
    assert_eq!(doc.headers("common"), vec!["KEY", "English"]);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn add_sheet_returns_the_reloaded_spreadsheet() -> Result<()> {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"], &["hello", "Hello"]])]);
    let spreadsheet = tools::add_sheet(&doc.user_session(), add_sheet_params("errors")).await?;
    let titles: Vec<&str> = spreadsheet.sheets.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["common", "errors"]);
    assert!(spreadsheet.sheets[1].rows.is_empty());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn duplicate_and_blank_sheet_titles_are_rejected() {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"]])]);
    let session = doc.user_session();

    let err = tools::add_sheet(&session, add_sheet_params("COMMON")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert_eq!(err.details.path.as_deref(), Some("title"));

    let err = tools::add_sheet(&session, add_sheet_params("   ")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
}

#[tokio::test(flavor = "current_thread")]
async fn language_column_is_added_to_every_sheet_with_key_formatting() -> Result<()> {
    let doc = TestDocument::new(&[
        ("common", &[&["KEY", "English"], &["hello", "Hello"]]),
        ("errors", &[&["English", "KEY"], &["Not found", "not_found"]]),
    ]);
    // Style the KEY header of the first sheet so the copy is observable.
    tools::add_sheet(&doc.user_session(), add_sheet_params("styled")).await?;

    let spreadsheet =
        tools::add_language_column(&doc.user_session(), add_language_params(" German ")).await?;

    assert_eq!(doc.headers("common"), vec!["KEY", "English", "German"]);
    assert_eq!(doc.headers("errors"), vec!["English", "KEY", "German"]);
    assert_eq!(doc.headers("styled"), vec!["KEY", "English", "German"]);
    assert_eq!(
        doc.store.header_format(DOC, "styled", 2),
        Some(CellFormat::header())
    );
    assert_eq!(doc.store.header_format(DOC, "common", 2), None);
    assert!(
        spreadsheet
            .sheets
            .iter()
            .all(|sheet| sheet.languages.iter().any(|l| l == "German"))
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn existing_or_reserved_language_names_are_rejected() {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"]])]);
    let session = doc.user_session();

    let err = tools::add_language_column(&session, add_language_params("english"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);

    let err = tools::add_language_column(&session, add_language_params("key"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);

    let err = tools::add_language_column(&session, add_language_params(""))
        .await
        .unwrap_err();
    assert_eq!(err.details.path.as_deref(), Some("language"));
    assert_eq!(doc.headers("common"), vec!["KEY", "English"]);
}
