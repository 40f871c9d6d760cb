use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conditions::Condition;
use crate::retry::RetryPolicy;
use crate::types::{AgeThreshold, Identifier, MigrationLimit};

pub(crate) const DEFAULT_CONTROL_COMMAND: &str = "transmission-remote";
pub(crate) const DEFAULT_COPY_COMMAND: &str = "scp -3 -O -q";

/// Optional YAML settings. Every key has a default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) commands: CommandSettings,
    pub(crate) retry: RetrySettings,
    pub(crate) transfer: TransferSettings,
    pub(crate) log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CommandSettings {
    pub(crate) control: String,
    pub(crate) copy: String,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            control: DEFAULT_CONTROL_COMMAND.to_string(),
            copy: DEFAULT_COPY_COMMAND.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RetrySettings {
    pub(crate) max_attempts: u32,
    pub(crate) initial_delay_ms: u64,
    pub(crate) max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub(crate) fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct TransferSettings {
    /// Shell-quote remote paths; needed by copy tools that hand the path to a
    /// remote shell (legacy scp protocol).
    pub(crate) quote_remote_paths: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            quote_remote_paths: true,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoadedSettings {
    pub(crate) settings: Settings,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn load_settings(path: &Path) -> Result<LoadedSettings, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    let mut mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(format!(
                "Config {} must be a YAML mapping",
                path.display()
            ))
        }
    };

    let warnings = unknown_top_level_keys(&mapping);
    emit_unknown_key_warnings(&warnings);
    for key in &warnings {
        mapping.remove(key.as_str());
    }

    let settings: Settings = serde_path_to_error::deserialize(Value::Mapping(mapping))
        .map_err(|err| {
            format!(
                "Invalid config {} at {}: {}",
                path.display(),
                err.path(),
                err.inner()
            )
        })?;
    validate_settings(&settings)?;

    Ok(LoadedSettings { settings, warnings })
}

fn emit_unknown_key_warnings(keys: &[String]) {
    for key in keys {
        eprintln!("Warning: unknown config key: {}", key);
    }
}

fn unknown_top_level_keys(mapping: &Mapping) -> Vec<String> {
    let allowed = ["commands", "retry", "transfer", "log_path"];

    mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !allowed.contains(&key.as_str()))
        .collect()
}

pub(crate) fn validate_settings(settings: &Settings) -> Result<(), String> {
    if settings.commands.control.trim().is_empty() {
        return Err("commands.control must not be empty.".to_string());
    }
    if settings.commands.copy.trim().is_empty() {
        return Err("commands.copy must not be empty.".to_string());
    }
    if settings.retry.max_attempts < 1 {
        return Err(format!(
            "retry.max_attempts must be a positive integer (got {}).",
            settings.retry.max_attempts
        ));
    }
    if settings.retry.initial_delay_ms > settings.retry.max_delay_ms {
        return Err(format!(
            "retry.initial_delay_ms ({}) must not exceed retry.max_delay_ms ({}).",
            settings.retry.initial_delay_ms, settings.retry.max_delay_ms
        ));
    }
    Ok(())
}

/// One daemon host: where to SSH, which control port, and its metadata dirs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub(crate) ssh_host: String,
    pub(crate) port: u16,
    pub(crate) torrent_dir: String,
    pub(crate) resume_dir: String,
}

impl Endpoint {
    /// `[USER@]HOST:PORT:TORRENT_DIR:RESUME_DIR`
    pub(crate) fn parse(raw: &str, flag: &str) -> Result<Self, String> {
        let invalid = |detail: &str| {
            format!(
                "Invalid {} value {:?}: {} (expected [USER@]HOST:PORT:TORRENT_DIR:RESUME_DIR).",
                flag, raw, detail
            )
        };
        let parts: Vec<&str> = raw.trim().splitn(4, ':').collect();
        if parts.len() != 4 {
            return Err(invalid("missing parts"));
        }
        let ssh_host = parts[0].trim();
        if ssh_host.is_empty() || ssh_host.ends_with('@') {
            return Err(invalid("empty host"));
        }
        let port: u16 = parts[1]
            .trim()
            .parse()
            .map_err(|_| invalid("port must be a number between 1 and 65535"))?;
        if port == 0 {
            return Err(invalid("port must be a number between 1 and 65535"));
        }
        let torrent_dir = parts[2].trim();
        let resume_dir = parts[3].trim();
        if torrent_dir.is_empty() {
            return Err(invalid("empty torrent directory"));
        }
        if resume_dir.is_empty() {
            return Err(invalid("empty resume directory"));
        }
        Ok(Self {
            ssh_host: ssh_host.to_string(),
            port,
            torrent_dir: torrent_dir.to_string(),
            resume_dir: resume_dir.to_string(),
        })
    }

    /// `HOST:PORT` for the control CLI; the SSH user is not part of it.
    pub(crate) fn control_address(&self) -> String {
        let host = self
            .ssh_host
            .rsplit_once('@')
            .map(|(_, host)| host)
            .unwrap_or(&self.ssh_host);
        format!("{}:{}", host, self.port)
    }

    pub(crate) fn torrent_path(&self, file_name: &str) -> String {
        join_remote(&self.torrent_dir, file_name)
    }

    pub(crate) fn resume_path(&self, file_name: &str) -> String {
        join_remote(&self.resume_dir, file_name)
    }
}

fn join_remote(dir: &str, file_name: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        format!("/{}", file_name)
    } else {
        format!("{}/{}", trimmed, file_name)
    }
}

/// Everything a migration run needs, fixed before the first command runs.
#[derive(Debug)]
pub(crate) struct MigrationConfig {
    pub(crate) source: Endpoint,
    pub(crate) destination: Endpoint,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) age: Option<AgeThreshold>,
    pub(crate) limit: Option<MigrationLimit>,
    pub(crate) remove_from_source: bool,
    pub(crate) identifier: Identifier,
    pub(crate) dry_run: bool,
    pub(crate) verbose: bool,
    pub(crate) retry: RetryPolicy,
}
