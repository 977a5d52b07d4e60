use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Event filter for the CLI.
///
/// `directives` (from `--log-filter` or `GUSB_LOG`, e.g.
/// `gusb_session=trace,info`) replaces `level` when it parses. An invalid
/// string is reported on stderr and `level` applies instead.
pub fn build_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    let by_level = || {
        EnvFilter::builder()
            .with_default_directive(level.as_filter().into())
            .parse_lossy("")
    };

    match directives.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        Some(Err(err)) => {
            eprintln!("warning: ignoring invalid log filter: {err}");
            by_level()
        }
        None => by_level(),
    }
}

/// Install the stderr subscriber. Stdout carries command output only.
///
/// Module targets are shown only when a directive filter is in use, since
/// that is when they matter for reading the output.
pub fn init_logging(format: LogFormat, level: LogLevel, directives: Option<&str>) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, directives))
        .with_ansi(false)
        .with_target(directives.is_some());

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
