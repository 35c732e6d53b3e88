//! Tracing setup.
//!
//! Simplified from the teacher's buffered, ANSI-colored TUI logger: this
//! service has no terminal UI to avoid clobbering, so logs just go to
//! stderr (and optionally a file) through the standard `fmt` layer.

use super::*;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::Layer;

pub fn setup_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = if cli.verbose >= 2 {
        "trace"
    } else if cli.verbose == 1 {
        "debug"
    } else {
        config.log.level.as_str()
    };
    let level: tracing::Level = level.parse().unwrap_or(tracing::Level::INFO);

    let targets = Targets::new().with_target("microsub_server", level).with_target("microsub_core", level);

    let stderr_layer = if cli.json_logs {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file_layer = match &config.log.file {
        Some(path) => {
            let expanded = shellexpand::full(path)?.into_owned();
            if let Some(parent) = std::path::Path::new(&expanded).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new().create(true).append(true).open(&expanded)?;
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry().with(targets).with(stderr_layer).with(file_layer).try_init()?;

    Ok(())
}
