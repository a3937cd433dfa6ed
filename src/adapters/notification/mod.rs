//! NotificationSink adapters.
//!
//! - `LoggingNotificationSink` - writes each notice as a structured log line
//! - `RecordingNotificationSink` - captures notices for test assertions

mod logging_sink;
mod recording_sink;

pub use logging_sink::LoggingNotificationSink;
pub use recording_sink::{Notification, NotificationKind, RecordingNotificationSink};
