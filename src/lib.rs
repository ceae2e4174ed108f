//! Google Sheets translation tables: validation, automated repair, row editing and
//! export to nested per-language i18n documents.
//!
//! Every boundary operation lives in [`tools`] and runs against a per-request
//! [`state::Session`]; [`server`] exposes them over HTTP and [`cli`] from the shell.

pub mod cli;
pub mod config;
pub mod document_id;
pub mod errors;
pub mod fixes;
pub mod merge;
pub mod model;
pub mod repository;
pub mod server;
pub mod state;
pub mod table;
pub mod tools;
pub mod transform;
pub mod validate;

pub use config::{CliArgs, ServerConfig};
pub use errors::{ErrorKind, ServiceError};
pub use state::{AppState, Session};
