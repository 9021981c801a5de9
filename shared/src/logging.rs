use std::sync::Arc;

/// Severity levels understood by the transport's own logger
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportLogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl TransportLogLevel {
    /// Fatal has no counterpart in `log` and is reported as an error
    pub fn to_log_level(self) -> log::Level {
        match self {
            TransportLogLevel::Fatal | TransportLogLevel::Error => log::Level::Error,
            TransportLogLevel::Warn => log::Level::Warn,
            TransportLogLevel::Info => log::Level::Info,
            TransportLogLevel::Debug => log::Level::Debug,
            TransportLogLevel::Trace => log::Level::Trace,
        }
    }

    /// Level the transport should log at to match a `log` filter. `Off`
    /// keeps only fatal lines.
    pub fn from_level_filter(filter: log::LevelFilter) -> Self {
        match filter {
            log::LevelFilter::Off => TransportLogLevel::Fatal,
            log::LevelFilter::Error => TransportLogLevel::Error,
            log::LevelFilter::Warn => TransportLogLevel::Warn,
            log::LevelFilter::Info => TransportLogLevel::Info,
            log::LevelFilter::Debug => TransportLogLevel::Debug,
            log::LevelFilter::Trace => TransportLogLevel::Trace,
        }
    }
}

/// One log line emitted by the transport
#[derive(Clone, Copy, Debug)]
pub struct TransportLogRecord<'a> {
    pub level: TransportLogLevel,
    pub file: &'a str,
    pub line: u32,
    pub function: &'a str,
    pub message: &'a str,
}

pub type LogSink = Arc<dyn Fn(&TransportLogRecord<'_>) + Send + Sync>;
