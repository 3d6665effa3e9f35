//! Run configuration stored in `autofix.toml`.
//!
//! The file is read once at startup, merged with CLI overrides, validated,
//! and then passed by reference to every component. Nothing reconfigures it
//! while a run is in flight.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "autofix.toml";

/// Where the test command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Spawn the test command on this machine.
    #[default]
    Local,
}

/// Top-level configuration (TOML).
///
/// Missing fields default to values that work for a typical npm project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutofixConfig {
    pub mode: ExecutionMode,

    /// Project directory the tests run in; file paths from the model are
    /// relative to it.
    pub workdir: PathBuf,

    /// Shell command that runs the test suite.
    pub test_command: String,

    /// Wall-clock budget for one test run, in seconds.
    pub test_timeout_secs: u64,

    /// Keep at most this many bytes of each output stream.
    pub output_limit_bytes: usize,

    /// Append stdout after stderr in the diagnostics handed to the model.
    pub include_stdout: bool,

    /// Canonical source extension (without the dot) appended to resolved
    /// origin paths.
    pub source_extension: String,

    /// Directory holding cached model responses.
    pub cache_dir: PathBuf,

    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier sent with each request.
    pub model: String,

    /// Chat-completions endpoint.
    pub endpoint: String,

    /// Environment variable holding the API credential.
    pub api_key_env: String,

    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    /// Read the API credential through `lookup` (normally `std::env::var`).
    pub fn resolve_api_key<F>(&self, lookup: F) -> Result<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        lookup(&self.api_key_env)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("missing model API key (set {})", self.api_key_env))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Local,
            workdir: PathBuf::from("."),
            test_command: "npm test".to_string(),
            test_timeout_secs: 10 * 60,
            output_limit_bytes: 200_000,
            include_stdout: false,
            source_extension: "js".to_string(),
            cache_dir: PathBuf::from("llm-cache"),
            model: ModelConfig::default(),
        }
    }
}

impl AutofixConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("test_command", &self.test_command),
            ("model.model", &self.model.model),
            ("model.endpoint", &self.model.endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must be non-empty"));
            }
        }
        for (field, value) in [
            ("test_timeout_secs", self.test_timeout_secs),
            ("output_limit_bytes", self.output_limit_bytes as u64),
            ("model.request_timeout_secs", self.model.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(anyhow!("{field} must be > 0"));
            }
        }
        let ext = self.source_extension.trim();
        if ext.is_empty() || ext.starts_with('.') {
            return Err(anyhow!(
                "source_extension must be non-empty and given without a leading dot"
            ));
        }
        Ok(())
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workdir: Option<PathBuf>,
    pub test_command: Option<String>,
    pub model: Option<String>,
    pub test_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Apply overrides and re-validate.
    pub fn apply(&self, mut cfg: AutofixConfig) -> Result<AutofixConfig> {
        if let Some(workdir) = &self.workdir {
            cfg.workdir = workdir.clone();
        }
        if let Some(command) = &self.test_command {
            cfg.test_command = command.clone();
        }
        if let Some(model) = &self.model {
            cfg.model.model = model.clone();
        }
        if let Some(secs) = self.test_timeout_secs {
            cfg.test_timeout_secs = secs;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutofixConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutofixConfig> {
    if !path.exists() {
        let cfg = AutofixConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AutofixConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutofixConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
