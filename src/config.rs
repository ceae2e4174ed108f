use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_BODY_BYTES: u64 = 1_048_576;

#[derive(Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    pub api_base_url: String,
    /// Address documents must be shared with for the fallback read path.
    pub service_account_email: Option<String>,
    pub service_account_token: Option<String>,
    /// `None` disables client-side rate limiting.
    pub rate_limit: Option<(u32, Duration)>,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub request_timeout_ms: Option<u64>,
    pub max_body_bytes: Option<u64>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_bind_address", &self.http_bind_address)
            .field("api_base_url", &self.api_base_url)
            .field("service_account_email", &self.service_account_email)
            .field(
                "service_account_token",
                &self.service_account_token.as_ref().map(|_| "<redacted>"),
            )
            .field("rate_limit", &self.rate_limit)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            api_base_url: cli_api_base_url,
            service_account_email: cli_service_account_email,
            service_account_token: cli_service_account_token,
            rate_limit_requests: cli_rate_limit_requests,
            rate_limit_window_ms: cli_rate_limit_window_ms,
            retry_max_attempts: cli_retry_max_attempts,
            retry_base_delay_ms: cli_retry_base_delay_ms,
            retry_max_delay_ms: cli_retry_max_delay_ms,
            request_timeout_ms: cli_request_timeout_ms,
            max_body_bytes: cli_max_body_bytes,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            api_base_url: file_api_base_url,
            service_account_email: file_service_account_email,
            service_account_token: file_service_account_token,
            rate_limit_requests: file_rate_limit_requests,
            rate_limit_window_ms: file_rate_limit_window_ms,
            retry_max_attempts: file_retry_max_attempts,
            retry_base_delay_ms: file_retry_base_delay_ms,
            retry_max_delay_ms: file_retry_max_delay_ms,
            request_timeout_ms: file_request_timeout_ms,
            max_body_bytes: file_max_body_bytes,
        } = file_config;

        let http_bind_address = match cli_http_bind.or(file_http_bind) {
            Some(addr) => addr,
            None => DEFAULT_HTTP_BIND
                .parse()
                .context("default bind address is invalid")?,
        };

        let api_base_url = cli_api_base_url
            .or(file_api_base_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        anyhow::ensure!(
            api_base_url.starts_with("http://") || api_base_url.starts_with("https://"),
            "api base url '{api_base_url}' must be http(s)"
        );

        let service_account_email = cli_service_account_email
            .or(file_service_account_email)
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        let service_account_token = cli_service_account_token
            .or(file_service_account_token)
            .filter(|token| !token.trim().is_empty());

        let rate_limit_requests = cli_rate_limit_requests
            .or(file_rate_limit_requests)
            .unwrap_or(DEFAULT_RATE_LIMIT_REQUESTS);
        let rate_limit_window_ms = cli_rate_limit_window_ms
            .or(file_rate_limit_window_ms)
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_MS);
        let rate_limit = if rate_limit_requests == 0 || rate_limit_window_ms == 0 {
            None
        } else {
            Some((rate_limit_requests, Duration::from_millis(rate_limit_window_ms)))
        };

        let retry_max_attempts = cli_retry_max_attempts
            .or(file_retry_max_attempts)
            .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
            .max(1);
        let retry_base_delay = Duration::from_millis(
            cli_retry_base_delay_ms
                .or(file_retry_base_delay_ms)
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        );
        let retry_max_delay = Duration::from_millis(
            cli_retry_max_delay_ms
                .or(file_retry_max_delay_ms)
                .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
        )
        .max(retry_base_delay);

        let request_timeout_ms = cli_request_timeout_ms
            .or(file_request_timeout_ms)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let request_timeout_ms = if request_timeout_ms == 0 {
            None
        } else {
            Some(request_timeout_ms)
        };

        let max_body_bytes = cli_max_body_bytes
            .or(file_max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);
        let max_body_bytes = if max_body_bytes == 0 {
            None
        } else {
            Some(max_body_bytes)
        };

        Ok(Self {
            http_bind_address,
            api_base_url,
            service_account_email,
            service_account_token,
            rate_limit,
            retry_max_attempts,
            retry_base_delay,
            retry_max_delay,
            request_timeout_ms,
            max_body_bytes,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn max_body_bytes(&self) -> Option<usize> {
        self.max_body_bytes.map(|bytes| bytes as usize)
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "sheets-i18n",
    about = "Translation tables on Google Sheets over HTTP",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETS_I18N_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "SHEETS_I18N_API_BASE_URL",
        value_name = "URL",
        help = "Sheets API base url (default: https://sheets.googleapis.com/v4)"
    )]
    pub api_base_url: Option<String>,

    #[arg(
        long,
        env = "SHEETS_I18N_SERVICE_ACCOUNT_EMAIL",
        value_name = "EMAIL",
        help = "Service account address shown in permission guidance"
    )]
    pub service_account_email: Option<String>,

    #[arg(
        long,
        env = "SHEETS_I18N_SERVICE_ACCOUNT_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true,
        help = "Access token for the service account fallback"
    )]
    pub service_account_token: Option<String>,

    #[arg(
        long,
        env = "SHEETS_I18N_RATE_LIMIT_REQUESTS",
        value_name = "N",
        help = "Sheets API calls allowed per window (default: 60; 0 disables)",
        value_parser = clap::value_parser!(u32)
    )]
    pub rate_limit_requests: Option<u32>,

    #[arg(
        long,
        env = "SHEETS_I18N_RATE_LIMIT_WINDOW_MS",
        value_name = "MS",
        help = "Rate limit window in milliseconds (default: 60000; 0 disables)",
        value_parser = clap::value_parser!(u64)
    )]
    pub rate_limit_window_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEETS_I18N_RETRY_MAX_ATTEMPTS",
        value_name = "N",
        help = "Attempts per Sheets API call including the first (default: 5)",
        value_parser = clap::value_parser!(u32)
    )]
    pub retry_max_attempts: Option<u32>,

    #[arg(
        long,
        env = "SHEETS_I18N_RETRY_BASE_DELAY_MS",
        value_name = "MS",
        help = "First retry delay in milliseconds (default: 500)",
        value_parser = clap::value_parser!(u64)
    )]
    pub retry_base_delay_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEETS_I18N_RETRY_MAX_DELAY_MS",
        value_name = "MS",
        help = "Retry delay cap in milliseconds (default: 8000)",
        value_parser = clap::value_parser!(u64)
    )]
    pub retry_max_delay_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEETS_I18N_REQUEST_TIMEOUT_MS",
        value_name = "MS",
        help = "Per-request timeout in milliseconds (default: 30000; 0 disables)",
        value_parser = clap::value_parser!(u64)
    )]
    pub request_timeout_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEETS_I18N_MAX_BODY_BYTES",
        value_name = "BYTES",
        help = "Max HTTP request body in bytes (default: 1048576; 0 disables)",
        value_parser = clap::value_parser!(u64)
    )]
    pub max_body_bytes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    api_base_url: Option<String>,
    service_account_email: Option<String>,
    service_account_token: Option<String>,
    rate_limit_requests: Option<u32>,
    rate_limit_window_ms: Option<u64>,
    retry_max_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    max_body_bytes: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
