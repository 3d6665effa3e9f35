//! `autofix`: diagnose and repair one failing test with structured model calls.
//!
//! Runs the configured test command; when the output shows a failure, asks
//! the model where it comes from, rewrites that file, and runs the tests again.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use autofix::core::fingerprint::fingerprint;
use autofix::core::types::Conversation;
use autofix::error::{FixError, find_fix_error};
use autofix::exit_codes;
use autofix::io::cache::FsCache;
use autofix::io::config::{
    AutofixConfig, ConfigOverrides, DEFAULT_CONFIG_PATH, load_config, write_config,
};
use autofix::io::gateway::ModelGateway;
use autofix::io::model::OpenAiClient;
use autofix::io::test_runner::ShellTestRunner;
use autofix::logging;
use autofix::pipeline::run_pipeline;
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "autofix",
    version,
    about = "Diagnose and repair a failing test with structured model calls"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run tests, and if they fail, trace the failure, patch the origin file, and re-run.
    Run {
        /// Config file (missing file means defaults).
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Project directory to run tests in.
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Shell command that runs the test suite.
        #[arg(long)]
        test_command: Option<String>,
        /// Model identifier.
        #[arg(long)]
        model: Option<String>,
        /// Wall-clock budget for each test run, in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Write a default config file.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the cache key for a JSON array of `{role, content}` messages.
    Key {
        /// File holding the conversation JSON.
        conversation: PathBuf,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            workdir,
            test_command,
            model,
            timeout_secs,
        } => {
            let overrides = ConfigOverrides {
                workdir,
                test_command,
                model,
                test_timeout_secs: timeout_secs,
            };
            cmd_run(&config, &overrides)
        }
        Command::Init { config, force } => cmd_init(&config, force).map(|()| exit_codes::OK),
        Command::Key { conversation } => cmd_key(&conversation).map(|()| exit_codes::OK),
    }
}

fn cmd_run(config_path: &Path, overrides: &ConfigOverrides) -> Result<i32> {
    let cfg = overrides.apply(load_config(config_path)?)?;
    debug!(?cfg, "configuration loaded");

    let api_key = cfg.model.resolve_api_key(|name| std::env::var(name).ok())?;
    let client = OpenAiClient::new(&cfg.model, api_key)?;
    let gateway = ModelGateway::new(client, FsCache::new(&cfg.cache_dir));
    let test_runner = ShellTestRunner::from_config(&cfg);

    let outcome = run_pipeline(&cfg, &test_runner, &gateway)?;
    println!("{}", outcome.message());
    Ok(outcome.exit_code())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if !force && config_path.exists() {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &AutofixConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(())
}

fn cmd_key(path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let conversation: Conversation =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    println!("{}", fingerprint(&conversation));
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match find_fix_error(err) {
        Some(FixError::TestTimedOut { .. }) => exit_codes::TIMED_OUT,
        _ => exit_codes::ERROR,
    }
}
