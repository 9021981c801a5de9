use std::sync::Arc;

use xbridge_shared::{LogSink, TransportLogRecord};

/// Target under which the transport's own log lines appear
pub const TRANSPORT_LOG_TARGET: &str = "xbridge::transport";

/// Receiver for the transport's log lines, forwarding them into the `log`
/// facade with the transport's source location
pub fn transport_log_sink() -> LogSink {
    Arc::new(forward_transport_log)
}

fn forward_transport_log(record: &TransportLogRecord<'_>) {
    let level = record.level.to_log_level();
    if level > log::max_level() {
        return;
    }

    log::logger().log(
        &log::Record::builder()
            .args(format_args!(
                "{}:{} {}() {}",
                record.file, record.line, record.function, record.message
            ))
            .level(level)
            .target(TRANSPORT_LOG_TARGET)
            .file(Some(record.file))
            .line(Some(record.line))
            .build(),
    );
}
