use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::events::LogEvent;

/// Event stream type
pub type LogEventStream = Pin<Box<dyn Stream<Item = LogEvent> + Send>>;

/// Adapt a broadcast receiver into a `LogEventStream`.
///
/// A subscriber that falls behind loses the oldest notifications rather
/// than ending the stream; it can always resync from a store snapshot.
pub(crate) fn broadcast_stream(receiver: broadcast::Receiver<LogEvent>) -> LogEventStream {
    Box::pin(BroadcastStream::new(receiver).filter_map(|event| event.ok()))
}
