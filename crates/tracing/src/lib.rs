//! Logging initialization for the feed driver binaries.

use dotenvy::dotenv;
use std::{env, io::stdout, str::FromStr};
use strum::EnumString;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

#[derive(EnumString, Debug, Default, Clone, Copy)]
#[strum(serialize_all = "lowercase")]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A boxed layer for tracing.
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug)]
struct LogOptions {
    file: String,
    dir: String,
    format_file: LogFormat,
    format_stdout: LogFormat,
}

impl LogOptions {
    fn from_env() -> Self {
        let format_file = env::var("FEED_LOG_FORMAT_FILE").unwrap_or_else(|_| "json".to_owned());
        let format_stdout =
            env::var("FEED_LOG_FORMAT_STDOUT").unwrap_or_else(|_| "text".to_owned());

        Self {
            file: env::var("FEED_LOG_FILE").unwrap_or_default(),
            dir: env::var("FEED_LOG_DIR").unwrap_or_else(|_| ".".to_owned()),
            format_file: LogFormat::from_str(&format_file).unwrap_or_default(),
            format_stdout: LogFormat::from_str(&format_stdout).unwrap_or_default(),
        }
    }
}

/// Initialize logging for a driver binary.
///
/// By default this writes INFO text to stdout. Env var options:
/// - `FEED_LOG_FILE` - file name to write logs to. If empty, logs are not
///   written to a file.
/// - `FEED_LOG_DIR` - directory for the log file. Defaults to the current
///   directory.
/// - `FEED_LOG_FORMAT_FILE` - file target format. Defaults to `json`. One of
///   json, text.
/// - `FEED_LOG_FORMAT_STDOUT` - stdout target format. Defaults to `text`.
///   One of json, text.
pub fn init_logging() -> eyre::Result<Vec<WorkerGuard>> {
    dotenv().ok();

    let options = LogOptions::from_env();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(stdout());
    let mut guards = vec![stdout_guard];
    let mut layers: Vec<BoxedLayer<Registry>> = vec![layer(options.format_stdout, stdout_writer)];

    if !options.file.is_empty() {
        let appender = RollingFileAppender::new(Rotation::NEVER, &options.dir, &options.file);
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);
        layers.push(layer(options.format_file, file_writer));
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(?options, "logging configured");

    Ok(guards)
}

fn layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer<Registry> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    match format {
        LogFormat::Json => fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}
