use anyhow::Result;
use assert_matches::assert_matches;
use sheets_i18n::errors::ErrorKind;
use sheets_i18n::fixes::FixRequest;
use sheets_i18n::model::{CellFormat, FixType};
use sheets_i18n::repository::CellAddress;
use sheets_i18n::tools::{
    self, ApplyFixParams, BatchApplyFixParams, DocumentParams, ExportParams,
};

mod support;
use support::{DOC, TestDocument};

fn doc_params() -> DocumentParams {
    DocumentParams {
        document_id: DOC.to_string(),
    }
}

fn fix_params(sheet: &str, fix_type: FixType) -> ApplyFixParams {
    ApplyFixParams {
        document_id: DOC.to_string(),
        sheet_title: sheet.to_string(),
        fix_type,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn valid_document_parses_into_tables() -> Result<()> {
    let doc = TestDocument::new(&[(
        "common",
        &[
            &["KEY", "English", "Vietnamese"],
            &["button.save", "Save", "Lưu"],
            &["", "", ""],
            &["button.cancel", "Cancel", ""],
        ],
    )]);

    let response = tools::load_and_validate(&doc.user_session(), doc_params()).await?;
    assert!(response.is_valid);
    assert!(response.validation_issues.is_empty());

    let spreadsheet = response.spreadsheet.expect("valid documents carry the spreadsheet");
    let table = &spreadsheet.sheets[0];
    assert_eq!(table.languages, vec!["English", "Vietnamese"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1].key, "button.cancel");
    assert_eq!(table.rows[1].row_number, 4);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn document_url_is_accepted_in_place_of_id() -> Result<()> {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"], &["a", "A"]])]);
    let url = format!("https://docs.google.com/spreadsheets/d/{DOC}/edit#gid=0");

    let spreadsheet =
        tools::get_spreadsheet(&doc.user_session(), DocumentParams { document_id: url }).await?;
    assert_eq!(spreadsheet.id, DOC);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn duplicate_keys_are_renamed_then_document_is_valid() -> Result<()> {
    let doc = TestDocument::new(&[(
        "common",
        &[&["KEY", "English"], &["hello", "Hello"], &["hello", "Hi"]],
    )]);
    let session = doc.user_session();

    let before = tools::load_and_validate(&session, doc_params()).await?;
    assert!(!before.is_valid);
    assert!(before.spreadsheet.is_none());
    let issue = &before.validation_issues[0];
    assert_eq!(issue.sheet_title, "common");
    assert_eq!(issue.fixes[0].fix_type, FixType::DuplicateKeys);

    let after = tools::apply_fix(&session, fix_params("common", FixType::DuplicateKeys)).await?;
    assert!(after.is_valid);
    let keys: Vec<String> = after.spreadsheet.expect("valid").sheets[0]
        .rows
        .iter()
        .map(|row| row.key.clone())
        .collect();
    assert_eq!(keys, vec!["hello", "hello_2"]);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn empty_header_row_gets_default_styled_headers() -> Result<()> {
    let doc = TestDocument::new(&[("common", &[&["", ""]])]);
    let session = doc.user_session();

    let before = tools::load_and_validate(&session, doc_params()).await?;
    assert_eq!(before.validation_issues[0].fixes[0].fix_type, FixType::NoHeaders);

    let after = tools::apply_fix(&session, fix_params("common", FixType::NoHeaders)).await?;
    assert!(after.is_valid);
    assert_eq!(doc.headers("common"), vec!["KEY", "English"]);
    for column in 0..2 {
        assert_eq!(
            doc.store.header_format(DOC, "common", column),
            Some(CellFormat::header())
        );
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn missing_key_column_is_inserted_with_generated_keys() -> Result<()> {
    let doc = TestDocument::new(&[(
        "common",
        &[&["English", "French"], &["Save", "Enregistrer"], &["", ""], &["Cancel", "Annuler"]],
    )]);
    let bold = CellFormat {
        bold: true,
        background: None,
    };
    doc.style_header("common", 0, bold).await;

    let after = tools::apply_fix(&doc.user_session(), fix_params("common", FixType::MissingKey)).await?;
    assert!(after.is_valid);

    let values = doc.values("common");
    assert_eq!(values[0], vec!["KEY", "English", "French"]);
    assert_eq!(values[1][0], "item_1");
    assert_eq!(values[3][0], "item_2");
    assert_eq!(doc.store.header_format(DOC, "common", 0), Some(bold));
    assert_eq!(doc.store.header_format(DOC, "common", 1), Some(bold));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn empty_keys_and_missing_languages_are_repaired() -> Result<()> {
    let doc = TestDocument::new(&[
        ("common", &[&["KEY", "English"], &["", "Orphan"], &["ok", "Ok"]]),
        ("errors", &[&["KEY"], &["not_found"]]),
    ]);
    let session = doc.user_session();

    let response = tools::batch_apply_fix(
        &session,
        BatchApplyFixParams {
            document_id: DOC.to_string(),
            fixes: vec![
                FixRequest {
                    sheet_title: "common".to_string(),
                    fix_type: FixType::EmptyKeys,
                },
                FixRequest {
                    sheet_title: "errors".to_string(),
                    fix_type: FixType::NoLanguages,
                },
            ],
        },
    )
    .await?;

    assert_eq!(response.summary.total, 2);
    assert_eq!(response.summary.successful, 2);
    let reloaded = response.spreadsheet.expect("reload succeeded");
    assert!(reloaded.is_valid, "{:?}", reloaded.validation_issues);
    assert_eq!(doc.values("common")[1][0], "auto_key_1");
    assert_eq!(doc.headers("errors"), vec!["KEY", "English"]);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn batch_failures_do_not_stop_other_fixes() -> Result<()> {
    let doc = TestDocument::new(&[
        ("common", &[&["KEY", "English"], &["a", "A"], &["a", "B"]]),
        ("errors", &[&["KEY", "English"], &["b", "A"], &["b", "B"]]),
    ]);
    doc.store.fail_writes(DOC, "errors");

    let response = tools::batch_apply_fix(
        &doc.user_session(),
        BatchApplyFixParams {
            document_id: DOC.to_string(),
            fixes: vec![
                FixRequest {
                    sheet_title: "errors".to_string(),
                    fix_type: FixType::DuplicateKeys,
                },
                FixRequest {
                    sheet_title: "common".to_string(),
                    fix_type: FixType::DuplicateKeys,
                },
                FixRequest {
                    sheet_title: "missing".to_string(),
                    fix_type: FixType::EmptyKeys,
                },
            ],
        },
    )
    .await?;

    assert_eq!(response.summary.total, 3);
    assert_eq!(response.summary.successful, 1);
    assert_eq!(response.summary.failed, 2);
    assert_eq!(response.results[0].sheet_title, "errors");
    assert!(!response.results[0].success);
    assert!(response.results[0].error.is_some());
    assert!(response.results[1].success);
    assert!(!response.results[2].success);
    assert_eq!(doc.values("common")[2][0], "a_2");
    assert_eq!(doc.values("errors")[2][0], "b");
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn empty_batch_is_rejected() {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"]])]);
    let err = tools::batch_apply_fix(
        &doc.user_session(),
        BatchApplyFixParams {
            document_id: DOC.to_string(),
            fixes: Vec::new(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert_eq!(err.details.path.as_deref(), Some("fixes"));
}

#[tokio::test(flavor = "current_thread")]
async fn fix_that_does_not_apply_is_invalid_input() {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"], &["a", "A"]])]);
    let err = tools::apply_fix(&doc.user_session(), fix_params("common", FixType::NoHeaders))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert_eq!(doc.headers("common"), vec!["KEY", "English"]);
}

#[tokio::test(flavor = "current_thread")]
async fn fix_on_unknown_sheet_is_not_found() {
    let doc = TestDocument::new(&[("common", &[&["KEY", "English"]])]);
    let err = tools::apply_fix(&doc.user_session(), fix_params("nope", FixType::EmptyKeys))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test(flavor = "current_thread")]
async fn get_spreadsheet_on_invalid_document_carries_issues_and_suggestion() {
    let doc = TestDocument::new(&[
        ("common", &[&["KEY", "English"], &["a", "A"]]),
        ("broken", &[&["English"], &["x"]]),
    ]);
    let err = tools::get_spreadsheet(&doc.user_session(), doc_params())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::FormatError);
    assert_eq!(err.details.validation_issues.len(), 1);
    assert_eq!(err.details.validation_issues[0].sheet_title, "broken");
    assert_matches!(err.details.suggestion.as_deref(), Some(text) if text.contains("KEY"));
}

#[tokio::test(flavor = "current_thread")]
async fn export_applies_fallback_language_before_transform() -> Result<()> {
    let doc = TestDocument::new(&[(
        "common",
        &[
            &["KEY", "English", "Vietnamese"],
            &["button.save", "Save", "Lưu"],
            &["button.cancel", "Cancel", ""],
        ],
    )]);
    let spreadsheet = tools::get_spreadsheet(&doc.user_session(), doc_params()).await?;

    let plain = tools::export_to_i18n(ExportParams {
        spreadsheet: spreadsheet.clone(),
        fallback_language: None,
    })?;
    assert_eq!(plain["Vietnamese"]["common"]["button"]["cancel"], "");

    let filled = tools::export_to_i18n(ExportParams {
        spreadsheet: spreadsheet.clone(),
        fallback_language: Some("english".to_string()),
    })?;
    assert_eq!(filled["Vietnamese"]["common"]["button"]["cancel"], "Cancel");
    assert_eq!(filled["Vietnamese"]["common"]["button"]["save"], "Lưu");

    let err = tools::export_to_i18n(ExportParams {
        spreadsheet,
        fallback_language: Some("Klingon".to_string()),
    })
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn inserted_key_header_gets_header_style_without_a_neighbour() -> Result<()> {
    let doc = TestDocument::new(&[("common", &[&["", "English"], &["", "Hello"]])]);
    let after = tools::apply_fix(&doc.user_session(), fix_params("common", FixType::MissingKey)).await?;
    assert!(after.is_valid, "{:?}", after.validation_issues);

    assert_eq!(doc.values("common")[1], vec!["item_1", "", "Hello"]);
    assert_eq!(
        doc.store.cell_format(DOC, "common", CellAddress::header(0)),
        Some(CellFormat::header())
    );
    Ok(())
}
