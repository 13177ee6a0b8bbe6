//! Log output setup.

use deploy_config::parser;
use std::path::Path;
use std::str::FromStr;
use tracing::Level;

/// Install the fmt subscriber.
///
/// `verbose` selects DEBUG; otherwise the configured `settings.log_level`
/// applies, defaulting to INFO when the configuration is unreadable.
pub fn init(config_path: &Path, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        parser::parse_file(config_path)
            .ok()
            .and_then(|config| config.settings.log_level)
            .and_then(|level| Level::from_str(&level).ok())
            .unwrap_or(Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
