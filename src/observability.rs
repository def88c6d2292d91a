// SPDX-License-Identifier: MIT
//! Tracing setup for hosts that don't bring their own subscriber.

/// Initialise the global tracing subscriber.
///
/// `filter` is an env-filter string, e.g. `"info"` or
/// `"info,buglink=trace"`. `json` switches to structured output for log
/// aggregators. With `log_file` set, output also goes to a daily-rolled
/// file; the returned guard must be held for the lifetime of the process
/// or buffered lines are lost.
///
/// Does nothing (quietly) when a subscriber is already installed.
pub fn init(
    filter: &str,
    json: bool,
    log_file: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let Some(path) = log_file else {
        if json {
            let _ = tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init();
        } else {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .try_init();
        }
        return None;
    };

    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let filename = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("buglink.log"));

    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "warn: could not create log directory '{}': {e} — falling back to stdout",
            dir.display()
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .try_init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    if json {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer().json())
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer().compact())
            .with(fmt::layer().with_writer(non_blocking))
            .try_init();
    }
    Some(guard)
}
