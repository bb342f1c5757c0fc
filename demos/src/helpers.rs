//! Shared setup for the example binaries.

use std::io::Write;

/// Installs an `env_logger` that prints file, line, level and a local timestamp.
pub fn init_logger(log_level: log::LevelFilter) {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, log_level)
        .init();
}
