use std::str::FromStr;

use console::style;
use log::{Level, LevelFilter};

use crate::types::config::{colors_enabled, config};

fn colored_level(level: Level) -> String {
    if !colors_enabled() {
        return level.to_string();
    }
    match level {
        Level::Error => style(level).red().bold().to_string(),
        Level::Warn => style(level).yellow().to_string(),
        Level::Info => style(level).green().to_string(),
        Level::Debug => style(level).blue().to_string(),
        Level::Trace => style(level).dim().to_string(),
    }
}

/// Route `log` records to stderr using the configured level.
///
/// Must run after configuration has been initialized; calling it twice is a no-op.
pub fn init_logging() {
    let level = LevelFilter::from_str(config().log().level()).unwrap_or(LevelFilter::Info);

    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            let thread = std::thread::current();
            out.finish(format_args!(
                "[{} {}] {}",
                colored_level(record.level()),
                thread.name().unwrap_or("-"),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
