pub mod bid;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod request;
pub mod seed;

use clap::Args;
use gavel_core::config::{AppConfig, LoadOptions};
use gavel_core::domain::page::{PageRequest, SortOrder};
use gavel_core::errors::ApplicationError;
use gavel_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a serialized record or page under `data`.
    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Rejected input exits 6; storage and invariant failures exit 7.
    pub fn from_application_error(command: &str, error: &ApplicationError) -> Self {
        let exit_code = match error.class() {
            "not_found" | "invalid_argument" | "illegal_transition" => 6,
            "configuration" => 2,
            _ => 7,
        };
        Self::failure(command, error.class(), error.to_string(), exit_code)
    }
}

/// Paging flags shared by the list operations.
#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 0, help = "Zero-based page index")]
    pub page: u32,
    #[arg(long, help = "Page size (defaults to pagination.default_page_size)")]
    pub size: Option<u32>,
    #[arg(long, help = "List oldest records first instead of newest first")]
    pub oldest_first: bool,
}

impl PageArgs {
    pub fn to_request(&self, config: &AppConfig) -> PageRequest {
        let sort = if self.oldest_first { SortOrder::OldestFirst } else { SortOrder::NewestFirst };
        PageRequest::new(self.page, self.size.unwrap_or(config.pagination.default_page_size))
            .with_sort(sort)
    }
}

/// Loaded configuration plus the runtime a command drives its futures on.
pub(crate) struct Preflight {
    pub config: AppConfig,
    pub runtime: Runtime,
}

pub(crate) fn preflight(command: &str) -> Result<Preflight, CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok(Preflight { config, runtime })
}

/// Connects and brings the schema up to date.
pub(crate) async fn open_database(command: &str, config: &AppConfig) -> Result<DbPool, CommandResult> {
    let pool = connect_with_config(&config.database).await.map_err(|error| {
        CommandResult::failure(command, "db_connectivity", error.to_string(), 4)
    })?;
    if let Err(error) = migrations::run_pending(&pool).await {
        pool.close().await;
        return Err(CommandResult::failure(command, "migration", error.to_string(), 5));
    }
    Ok(pool)
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
