use crate::cli::Backend;
use crate::tools::{self, DocumentParams, ExportParams};
use crate::transform::{I18nDocuments, from_i18n};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct ExportResponse {
    document_id: String,
    files: Vec<String>,
}

pub async fn export(backend: &Backend, out: &Path, fallback: Option<String>) -> Result<Value> {
    let session = backend.session();
    let document_id = backend.document_id()?;
    let spreadsheet =
        tools::get_spreadsheet(&session, DocumentParams { document_id }).await?;
    let document_id = spreadsheet.id.clone();
    let documents = tools::export_to_i18n(ExportParams {
        spreadsheet,
        fallback_language: fallback,
    })?;

    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create output directory {}", out.display()))?;
    let mut files = Vec::with_capacity(documents.len());
    for (language, document) in &documents {
        let path = out.join(format!("{}.json", file_stem(language)));
        let contents = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        files.push(path.display().to_string());
    }

    Ok(serde_json::to_value(ExportResponse { document_id, files })?)
}

/// Read every `<language>.json` in `dir` and show the namespace tables they flatten into.
pub fn import_preview(dir: &Path) -> Result<Value> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("no <language>.json files found in {}", dir.display());
    }

    let mut documents = I18nDocuments::new();
    for path in paths {
        let Some(language) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let document: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        documents.insert(language.to_string(), document);
    }

    Ok(serde_json::to_value(from_i18n(&documents))?)
}

fn file_stem(language: &str) -> String {
    language
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_preview_reads_language_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("English.json"),
            r#"{"common":{"button":{"save":"Save"}}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("French.json"),
            r#"{"common":{"button":{"save":"Enregistrer"}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let value = import_preview(dir.path()).unwrap();
        let table = &value[0];
        assert_eq!(table["title"], "common");
        assert_eq!(table["languages"], serde_json::json!(["English", "French"]));
        assert_eq!(table["rows"][0]["key"], "button.save");
        assert_eq!(table["rows"][0]["data"]["French"], "Enregistrer");
    }

    #[test]
    fn separators_in_language_names_do_not_escape_the_directory() {
        assert_eq!(file_stem("pt/BR"), "pt_BR");
    }
}
