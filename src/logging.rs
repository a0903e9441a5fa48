use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::config::AppConfig;

/// Initialize the global subscriber: human-readable output on stderr plus a
/// JSON log file under the workspace `logs/` directory.
pub fn init_subscriber(config: &AppConfig, log_dir: &Path) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let file = File::create(log_dir.join(format!(
        "gdap-migrate-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    )))?;

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let file_layer = fmt::layer().json().with_writer(Arc::new(file));

    let subscriber = Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::AlreadyExists, err))?;
    Ok(())
}
