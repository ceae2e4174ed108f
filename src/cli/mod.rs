pub mod commands;
pub mod errors;
pub mod output;

use crate::config::{CliArgs, ServerConfig};
use crate::model::FixType;
use crate::repository::{MemoryConnector, MemoryStore};
use crate::state::{AppState, Session};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "sheets-i18n-cli",
    version,
    about = "Validate, repair and export spreadsheet translation tables",
    long_about = "Validate, repair and export spreadsheet translation tables.\n\nCommon workflows:\n  • Check a document: validate → fix --all → validate\n  • Ship translations: export --out locales/ [--fallback English]\n  • Work offline: --fixture snapshot.yaml with any command (mutations are written back)"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub compact: bool,

    #[arg(long, global = true)]
    pub quiet: bool,

    /// Spreadsheet id or browser URL.
    #[arg(long, short = 'd', global = true, value_name = "ID_OR_URL")]
    pub document: Option<String>,

    /// Work on a JSON/YAML snapshot instead of the Sheets API.
    #[arg(long, global = true, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Delegated user access token; without it only the service identity is used.
    #[arg(
        long,
        global = true,
        env = "SHEETS_I18N_USER_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "SHEETS_I18N_API_BASE_URL", value_name = "URL")]
    pub api_base_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "SHEETS_I18N_SERVICE_ACCOUNT_EMAIL",
        value_name = "EMAIL"
    )]
    pub service_account_email: Option<String>,

    #[arg(
        long,
        global = true,
        env = "SHEETS_I18N_SERVICE_ACCOUNT_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub service_account_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate every sheet and print the parsed document when valid.
    Validate,
    /// Apply one fix, or every suggested fix with --all.
    Fix {
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long, value_enum)]
        fix_type: Option<FixType>,
        #[arg(long, conflicts_with_all = ["sheet", "fix_type"])]
        all: bool,
    },
    /// Write one `<language>.json` per language into a directory.
    Export {
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
        #[arg(long, value_name = "LANGUAGE")]
        fallback: Option<String>,
    },
    AddLanguage {
        language: String,
    },
    AddSheet {
        title: String,
    },
    /// Show the rows a directory of `<language>.json` files flattens into.
    ImportPreview {
        dir: PathBuf,
    },
}

impl Cli {
    fn settings(&self) -> CliArgs {
        CliArgs {
            config: self.config.clone(),
            api_base_url: self.api_base_url.clone(),
            service_account_email: self.service_account_email.clone(),
            service_account_token: self.service_account_token.clone(),
            ..CliArgs::default()
        }
    }
}

/// Where commands read and write: the Sheets API, or a fixture snapshot held in memory
/// and written back after mutations.
pub struct Backend {
    state: AppState,
    token: Option<String>,
    document: Option<String>,
    fixture: Option<FixtureBinding>,
}

struct FixtureBinding {
    path: PathBuf,
    store: Arc<MemoryStore>,
    document_id: String,
}

impl Backend {
    pub fn open(cli: &Cli) -> Result<Self> {
        let config = Arc::new(ServerConfig::from_args(cli.settings())?);
        let (state, fixture) = match cli.fixture.as_ref() {
            Some(path) => {
                let (store, document_id) = MemoryStore::from_fixture_file(path)?;
                let store = Arc::new(store);
                let connector = Arc::new(MemoryConnector::new(store.clone()));
                (
                    AppState::new_with_connector(config, connector),
                    Some(FixtureBinding {
                        path: path.clone(),
                        store,
                        document_id,
                    }),
                )
            }
            None => (AppState::new(config)?, None),
        };
        Ok(Self {
            state,
            token: cli.token.clone(),
            document: cli.document.clone(),
            fixture,
        })
    }

    pub fn session(&self) -> Session {
        self.state.session(self.token.clone())
    }

    pub fn document_id(&self) -> Result<String> {
        if let Some(document) = self.document.as_ref() {
            return Ok(document.clone());
        }
        match self.fixture.as_ref() {
            Some(binding) => Ok(binding.document_id.clone()),
            None => bail!("pass --document <id-or-url> or --fixture <file>"),
        }
    }

    /// Write the in-memory document back to its fixture file. No-op against the API.
    pub fn persist(&self) -> Result<()> {
        let Some(binding) = self.fixture.as_ref() else {
            return Ok(());
        };
        let fixture = binding
            .store
            .fixture(&binding.document_id)
            .with_context(|| format!("fixture document '{}' disappeared", binding.document_id))?;
        let contents = if is_yaml(&binding.path) {
            serde_yaml::to_string(&fixture)?
        } else {
            serde_json::to_string_pretty(&fixture)?
        };
        std::fs::write(&binding.path, contents)
            .with_context(|| format!("failed to write fixture {}", binding.path.display()))?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

pub async fn run_command(cli: &Cli) -> Result<Value> {
    if let Commands::ImportPreview { dir } = &cli.command {
        return commands::export::import_preview(dir);
    }

    let backend = Backend::open(cli)?;
    match &cli.command {
        Commands::Validate => commands::document::validate(&backend).await,
        Commands::Fix {
            sheet,
            fix_type,
            all,
        } => commands::document::fix(&backend, sheet.clone(), *fix_type, *all).await,
        Commands::Export { out, fallback } => {
            commands::export::export(&backend, out, fallback.clone()).await
        }
        Commands::AddLanguage { language } => {
            commands::document::add_language(&backend, language.clone()).await
        }
        Commands::AddSheet { title } => commands::document::add_sheet(&backend, title.clone()).await,
        Commands::ImportPreview { dir } => commands::export::import_preview(dir),
    }
}
