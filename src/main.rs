// logtail - main.rs
//
// CLI entry point. Handles:
// 1. Argument parsing
// 2. Logging initialisation (debug mode support)
// 3. Loading the TOML configuration file into a flat key/value context
// 4. Driving the source in a poll loop with exponential backoff

use clap::Parser;
use logtail::app::channel::StdoutChannel;
use logtail::app::config::Context;
use logtail::app::source::TailSource;
use logtail::core::model::SourceStatus;
use logtail::util;
use logtail::util::error::{ConfigError, Result, TailError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// logtail - tail glob-matched log files and emit framed records.
///
/// Watches the files matched by the configured file groups, frames newly
/// appended bytes into records, and writes each record as one JSON object
/// per line on stdout. Read offsets are checkpointed so a restart resumes
/// where the previous run left off.
#[derive(Parser, Debug)]
#[command(name = "logtail", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    util::logging::init(cli.debug);

    tracing::info!(
        version = util::constants::APP_VERSION,
        config = %cli.config.display(),
        "logtail starting"
    );

    if let Err(e) = run(&cli) {
        tracing::error!(error = %e, "Fatal error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = load_context(&cli.config)?;

    let mut source = TailSource::new(Arc::new(StdoutChannel::new()));
    source.configure(&ctx)?;
    source.start()?;

    // The host poll loop: retry immediately while records flow, back off
    // exponentially while the matched files are quiet.
    let mut backoff_ms = util::constants::BACKOFF_SLEEP_BASE_MS;
    loop {
        match source.process()? {
            SourceStatus::Ready => {
                backoff_ms = util::constants::BACKOFF_SLEEP_BASE_MS;
            }
            SourceStatus::Backoff => {
                std::thread::sleep(Duration::from_millis(backoff_ms));
                backoff_ms = (backoff_ms * 2).min(util::constants::MAX_BACKOFF_SLEEP_MS);
            }
        }
    }
}

/// Load a TOML file into the flat key/value context. Nested tables flatten
/// with '.'-joined keys, so
///
///   [filegroups]
///   app = "/var/log/app/*.log"
///
/// and `filegroups.app = "..."` are equivalent.
fn load_context(path: &Path) -> Result<Context> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TailError::Config(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    })?;
    let table: toml::Table = raw.parse().map_err(|e| {
        TailError::Config(ConfigError::TomlParse {
            path: path.to_path_buf(),
            source: e,
        })
    })?;

    let mut ctx = Context::new();
    flatten_table(&table, "", &mut ctx)?;
    Ok(ctx)
}

fn flatten_table(table: &toml::Table, prefix: &str, ctx: &mut Context) -> Result<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_table(nested, &full_key, ctx)?,
            toml::Value::String(s) => ctx.insert(full_key, s.clone()),
            toml::Value::Integer(i) => ctx.insert(full_key, i.to_string()),
            toml::Value::Boolean(b) => ctx.insert(full_key, b.to_string()),
            toml::Value::Float(f) => ctx.insert(full_key, f.to_string()),
            toml::Value::Datetime(dt) => ctx.insert(full_key, dt.to_string()),
            toml::Value::Array(_) => {
                return Err(TailError::Config(ConfigError::InvalidValue {
                    key: full_key,
                    value: "<array>".to_string(),
                    expected: "scalar value",
                }))
            }
        }
    }
    Ok(())
}
