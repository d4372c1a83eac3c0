use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Where log lines go.
///
/// The interactive dashboard owns the terminal, so it logs to a file next
/// to the config instead of writing over the alternate screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogMode {
    Console,
    FileOnly,
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init(mode: LogMode) -> eyre::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match mode {
        LogMode::Console => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogMode::FileOnly => {
            let config_path = confy::get_configuration_file_path("sheetfolio", "config")?;
            let log_path = config_path
                .parent()
                .map(|dir| dir.join("sheetfolio.log"))
                .unwrap_or_else(|| "sheetfolio.log".into());
            let file = std::fs::File::create(&log_path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
    }

    Ok(())
}
