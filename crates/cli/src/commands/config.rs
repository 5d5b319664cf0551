use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use gavel_core::config::{AppConfig, LoadOptions, LogFormat};
use gavel_core::workflow::CancelBehavior;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_values(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigField {
    ConfigField { key, value, env_keys }
}

fn effective_values(config: &AppConfig) -> Vec<ConfigField> {
    let transitions = if config.workflow.allowed_transitions.is_empty() {
        "<any> (permissive)".to_string()
    } else {
        config.workflow.allowed_transitions.join(", ")
    };

    vec![
        field("database.url", config.database.url.clone(), &["GAVEL_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["GAVEL_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["GAVEL_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["GAVEL_SERVER_BIND_ADDRESS"],
        ),
        field(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["GAVEL_SERVER_HEALTH_CHECK_PORT"],
        ),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["GAVEL_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["GAVEL_LOGGING_LEVEL", "GAVEL_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            log_format_name(config.logging.format).to_string(),
            &["GAVEL_LOGGING_FORMAT", "GAVEL_LOG_FORMAT"],
        ),
        field("workflow.allowed_transitions", transitions, &["GAVEL_WORKFLOW_ALLOWED_TRANSITIONS"]),
        field(
            "workflow.cancel_behavior",
            cancel_behavior_name(config.workflow.cancel_behavior).to_string(),
            &["GAVEL_WORKFLOW_CANCEL_BEHAVIOR"],
        ),
        field(
            "pagination.default_page_size",
            config.pagination.default_page_size.to_string(),
            &["GAVEL_PAGINATION_DEFAULT_PAGE_SIZE"],
        ),
        field(
            "pagination.max_page_size",
            config.pagination.max_page_size.to_string(),
            &["GAVEL_PAGINATION_MAX_PAGE_SIZE"],
        ),
    ]
}

fn log_format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn cancel_behavior_name(behavior: CancelBehavior) -> &'static str {
    match behavior {
        CancelBehavior::PreserveState => "preserve_state",
        CancelBehavior::MarkCancelled => "mark_cancelled",
    }
}

fn detect_config_path() -> Option<PathBuf> {
    ["gavel.toml", "config/gavel.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
