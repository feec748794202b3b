//----------------------------------------------------------------------------------------- std lib
use std::io::Write;
use std::time::Instant;
//--------------------------------------------------------------------------------- other libraries
use log::info;
use once_cell::sync::Lazy;

/// Returns the init [`Instant`]
pub static INIT_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the seconds since [`INIT_INSTANT`].
#[must_use]
pub fn uptime() -> u64 {
    INIT_INSTANT.elapsed().as_secs()
}

/// Initializes the logger.
///
/// Console logging for the auscult crates via [`log`]/`env_logger`. When
/// `RUST_LOG` is unset, only the auscult crates log at `filter`.
///
/// # Panics
/// This must only be called _once_.
pub fn init_logger(filter: log::LevelFilter) {
    // Initialize timer.
    let now = Lazy::force(&INIT_INSTANT);

    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let mut builder = env_logger::Builder::new();
    if env.is_empty() {
        builder
            .filter_level(log::LevelFilter::Off)
            .filter_module("auscult_analysis", filter)
            .filter_module("auscult_service", filter);
    } else {
        builder.parse_default_env();
    }

    builder
        .format(move |buf, record| {
            let level = match record.level() {
                log::Level::Debug => "D",
                log::Level::Trace => "T",
                log::Level::Info => "I",
                log::Level::Warn => "W",
                log::Level::Error => "E",
            };
            writeln!(
                buf,
                "| {} | {: >9.3} | {: >28} @ {: <3} | {}",
                level,
                now.elapsed().as_secs_f32(),
                record.file_static().unwrap_or("???"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .init();

    if env.is_empty() {
        info!("Log Level (Flag) ... {filter}");
    } else {
        info!("Log Level (RUST_LOG) ... {env}");
    }
}
