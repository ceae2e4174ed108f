//! Conversion between sheet rows and nested per-language translation documents.
//!
//! Shape: `{ language: { namespace: { a: { b: "value" } } } }` where the namespace is the
//! sheet title and `a.b` the row key.

use crate::model::{SheetRow, SheetTable, Spreadsheet};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Per-language documents, languages in first-seen order.
pub type I18nDocuments = IndexMap<String, Value>;

/// Build one nested document per language.
///
/// Keys are split on `.`. When one key is a prefix of another (`a` and `a.b`) the row
/// that comes later wins the conflicting node.
pub fn to_i18n(spreadsheet: &Spreadsheet) -> I18nDocuments {
    let mut documents: I18nDocuments = spreadsheet
        .languages()
        .into_iter()
        .map(|language| (language, Value::Object(Map::new())))
        .collect();

    for sheet in &spreadsheet.sheets {
        for row in &sheet.rows {
            for (language, value) in &row.data {
                let slot = documents
                    .keys()
                    .position(|known| known.eq_ignore_ascii_case(language))
                    .unwrap_or_else(|| {
                        documents
                            .insert_full(language.clone(), Value::Object(Map::new()))
                            .0
                    });
                let namespace = child_object(&mut documents[slot], &sheet.title);
                assign(namespace, &row.key, value);
            }
        }
    }

    documents
}

/// Return the object at `name` under `node`, replacing anything that is not an object.
fn child_object<'a>(node: &'a mut Value, name: &str) -> &'a mut Value {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let child = &mut node[name];
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    child
}

fn assign(namespace: &mut Value, key: &str, value: &str) {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut node = namespace;
    for segment in parents {
        node = child_object(node, segment);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node[*last] = Value::String(value.to_string());
}

/// Flatten per-language documents back into one table per namespace.
///
/// Rows are keyed by dotted path; a language that has no value for a key gets an empty
/// string. Non-string leaves are stringified.
pub fn from_i18n(documents: &I18nDocuments) -> Vec<SheetTable> {
    let languages: Vec<String> = documents.keys().cloned().collect();
    let mut namespaces: IndexMap<String, IndexMap<String, IndexMap<String, String>>> = IndexMap::new();

    for (language, document) in documents {
        let Value::Object(namespace_map) = document else {
            continue;
        };
        for (namespace, tree) in namespace_map {
            let rows = namespaces.entry(namespace.clone()).or_default();
            let mut leaves = Vec::new();
            flatten(tree, String::new(), &mut leaves);
            for (key, value) in leaves {
                rows.entry(key).or_default().insert(language.clone(), value);
            }
        }
    }

    namespaces
        .into_iter()
        .enumerate()
        .map(|(sheet_idx, (title, rows))| SheetTable {
            sheet_id: sheet_idx as i64,
            title,
            languages: languages.clone(),
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(row_idx, (key, mut values))| SheetRow {
                    row_number: row_idx as u32 + 2,
                    key,
                    data: languages
                        .iter()
                        .map(|language| {
                            (language.clone(), values.shift_remove(language).unwrap_or_default())
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

fn flatten(node: &Value, prefix: String, out: &mut Vec<(String, String)>) {
    match node {
        Value::Object(map) => {
            for (segment, child) in map {
                let path = if prefix.is_empty() {
                    segment.clone()
                } else {
                    format!("{prefix}.{segment}")
                };
                flatten(child, path, out);
            }
        }
        Value::String(text) if !prefix.is_empty() => out.push((prefix, text.clone())),
        Value::Null => {}
        other if !prefix.is_empty() => out.push((prefix, other.to_string())),
        _ => {}
    }
}

/// Copy of `spreadsheet` where blank values take the fallback language's value.
///
/// The fallback language is matched case-insensitively. Rows without a fallback value
/// are left as they are.
pub fn fill_from_fallback(spreadsheet: &Spreadsheet, fallback: &str) -> Spreadsheet {
    let mut filled = spreadsheet.clone();
    for sheet in &mut filled.sheets {
        for row in &mut sheet.rows {
            let Some(source) = row
                .data
                .iter()
                .find(|(language, _)| language.eq_ignore_ascii_case(fallback))
                .map(|(_, value)| value.clone())
                .filter(|value| !value.trim().is_empty())
            else {
                continue;
            };
            for value in row.data.values_mut() {
                if value.trim().is_empty() {
                    *value = source.clone();
                }
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(number: u32, key: &str, data: &[(&str, &str)]) -> SheetRow {
        SheetRow {
            row_number: number,
            key: key.to_string(),
            data: data
                .iter()
                .map(|(language, value)| (language.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn single_sheet(rows: Vec<SheetRow>, languages: &[&str]) -> Spreadsheet {
        Spreadsheet {
            id: "doc".to_string(),
            title: "Demo".to_string(),
            sheets: vec![SheetTable {
                sheet_id: 0,
                title: "common".to_string(),
                languages: languages.iter().map(|l| l.to_string()).collect(),
                rows,
            }],
        }
    }

    #[test]
    fn dotted_keys_nest_under_namespace() {
        let spreadsheet = single_sheet(
            vec![row(2, "a.b", &[("en", "B")]), row(3, "a.c", &[("en", "C")])],
            &["en"],
        );
        let documents = to_i18n(&spreadsheet);
        assert_eq!(
            documents["en"],
            json!({ "common": { "a": { "b": "B", "c": "C" } } })
        );
    }

    #[test]
    fn later_rows_win_prefix_collisions() {
        let leaf_then_branch = single_sheet(
            vec![row(2, "a", &[("en", "A")]), row(3, "a.b", &[("en", "B")])],
            &["en"],
        );
        assert_eq!(
            to_i18n(&leaf_then_branch)["en"],
            json!({ "common": { "a": { "b": "B" } } })
        );

        let branch_then_leaf = single_sheet(
            vec![row(2, "a.b", &[("en", "B")]), row(3, "a", &[("en", "A")])],
            &["en"],
        );
        assert_eq!(
            to_i18n(&branch_then_leaf)["en"],
            json!({ "common": { "a": "A" } })
        );
    }

    #[test]
    fn every_language_gets_a_document() {
        let spreadsheet = single_sheet(
            vec![row(2, "save", &[("en", "Save"), ("de", "Speichern")])],
            &["en", "de"],
        );
        let documents = to_i18n(&spreadsheet);
        assert_eq!(documents.keys().collect::<Vec<_>>(), vec!["en", "de"]);
        assert_eq!(documents["de"], json!({ "common": { "save": "Speichern" } }));
    }

    #[test]
    fn flatten_restores_rows() {
        let mut documents = I18nDocuments::new();
        documents.insert("en".to_string(), json!({ "common": { "a": { "b": "B" }, "c": "C" } }));
        documents.insert("de".to_string(), json!({ "common": { "c": "Ce" } }));

        let sheets = from_i18n(&documents);
        assert_eq!(sheets.len(), 1);
        let common = &sheets[0];
        assert_eq!(common.title, "common");
        assert_eq!(common.languages, vec!["en", "de"]);
        assert_eq!(common.rows[0].key, "a.b");
        assert_eq!(common.rows[0].data["de"], "");
        assert_eq!(common.rows[1].key, "c");
        assert_eq!(common.rows[1].data["de"], "Ce");
        assert_eq!(common.rows[1].row_number, 3);
    }

    #[test]
    fn fallback_fills_only_blank_values() {
        let spreadsheet = single_sheet(
            vec![
                row(2, "save", &[("English", "Save"), ("de", ""), ("fr", "Sauver")]),
                row(3, "quit", &[("English", " "), ("de", "")]),
            ],
            &["English", "de", "fr"],
        );
        let filled = fill_from_fallback(&spreadsheet, "english");
        let rows = &filled.sheets[0].rows;
        assert_eq!(rows[0].data["de"], "Save");
        assert_eq!(rows[0].data["fr"], "Sauver");
        assert_eq!(rows[1].data["de"], "");
    }
}
