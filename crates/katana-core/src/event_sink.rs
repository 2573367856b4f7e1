use katana_models::{LogLevel, OperationEvent, TaskStatus};
use tokio::sync::mpsc::UnboundedSender;

/// Receives `progress`/`task`/`log` events as an operation executes.
/// Implemented over an unbounded channel so the Compose Adapter, Tool
/// Script Runner, and Action Executor never block on a slow subscriber —
/// the Operation Manager is the one place backpressure is handled, via its
/// per-op backlog.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OperationEvent);

    fn log(&self, level: LogLevel, line: impl Into<String>) {
        self.emit(OperationEvent::Log {
            level,
            line: line.into(),
        });
    }

    fn info(&self, line: impl Into<String>) {
        self.log(LogLevel::Info, line);
    }

    fn error(&self, line: impl Into<String>) {
        self.log(LogLevel::Error, line);
    }

    fn progress(&self, percent: u8, message: impl Into<String>) {
        self.emit(OperationEvent::Progress {
            percent,
            message: message.into(),
        });
    }

    fn task(&self, name: impl Into<String>, status: TaskStatus) {
        self.emit(OperationEvent::Task {
            name: name.into(),
            status,
        });
    }
}

/// A sink backed directly by a channel to the Operation Manager's fan-out
/// task.
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<OperationEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<OperationEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: OperationEvent) {
        // The receiver only disappears once the operation has already
        // terminated; a dropped send past that point is inert.
        let _ = self.tx.send(event);
    }
}

/// Discards every event. Useful for tests and for synchronous call sites
/// that don't care about progress reporting.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: OperationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_emitted_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        sink.info("hello");
        let event = rx.try_recv().unwrap();
        matches!(event, OperationEvent::Log { .. });
    }
}
