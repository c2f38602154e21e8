use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::Path;

/// Route `log` output to a file; the terminal belongs to the game screen.
///
/// `RUST_LOG` wins over the filter from settings.
pub(crate) fn init(log_path: &Path, default_filter: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("could not open log file {}", log_path.display()))?;

    Builder::from_env(Env::default().default_filter_or(default_filter))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("logger already initialized")?;
    Ok(())
}
