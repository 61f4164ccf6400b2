use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::utils::timing::TIMING_TARGET;

/// Keeps the non-blocking writers flushing; drop at process exit.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

pub fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn general_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
        .with_target("tower_http", LevelFilter::WARN)
}

fn timing_filter() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

fn daily_writer(dir: &Path, file_name: &str, guards: &mut Vec<WorkerGuard>) -> NonBlocking {
    let appender = tracing_appender::rolling::daily(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

/// Installs the global subscriber: stdout plus daily-rolling text and JSON
/// files under `log_dir`. `file_stem` separates the proxy (`server`) from the
/// CLI (`client`); request and provider timing go to `timing.*`.
pub fn init_logging(log_level: &str, log_dir: &str, file_stem: &str) -> LoggingGuards {
    let dir = Path::new(log_dir);
    if let Err(err) = fs::create_dir_all(dir) {
        eprintln!("Failed to create log directory {}: {err}", dir.display());
    }

    let mut guards = Vec::with_capacity(4);
    let text_writer = daily_writer(dir, &format!("{file_stem}.log"), &mut guards);
    let json_writer = daily_writer(dir, &format!("{file_stem}.jsonl"), &mut guards);
    let timing_text_writer = daily_writer(dir, "timing.log", &mut guards);
    let timing_json_writer = daily_writer(dir, "timing.jsonl", &mut guards);

    let level = parse_log_level(log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(general_filter(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(text_writer)
                .with_ansi(false)
                .with_filter(general_filter(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(json_writer)
                .with_filter(general_filter(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(timing_text_writer)
                .with_ansi(false)
                .with_filter(timing_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(timing_json_writer)
                .with_filter(timing_filter()),
        )
        .init();

    LoggingGuards { _guards: guards }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_default_to_info() {
        assert_eq!(parse_log_level("WARNING"), LevelFilter::WARN);
        assert_eq!(parse_log_level(" off "), LevelFilter::OFF);
        assert_eq!(parse_log_level("verbose"), LevelFilter::INFO);
    }

    #[test]
    fn timing_events_only_reach_timing_files() {
        let general = general_filter(LevelFilter::DEBUG);
        assert!(!general.would_enable(TIMING_TARGET, &tracing::Level::INFO));
        assert!(general.would_enable("dress_up_compositor::proxy", &tracing::Level::DEBUG));
        assert!(!general.would_enable("reqwest::connect", &tracing::Level::INFO));

        let timing = timing_filter();
        assert!(timing.would_enable(TIMING_TARGET, &tracing::Level::INFO));
        assert!(!timing.would_enable("dress_up_compositor::proxy", &tracing::Level::ERROR));
    }
}
