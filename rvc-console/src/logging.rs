//! Bounded-queue log sink used once the TUI owns the terminal.
//!
//! Before the TUI starts, `env_logger` writes to stderr (see `main::init_logging`,
//! matching the teacher's `can-log-cli::init_logging`). Immediately before
//! entering raw mode, the process logger is swapped for `ConsoleLogSink` via
//! `log::set_boxed_logger`; there is exactly one global logger per process,
//! so this also retires the stderr sink for good — nothing is printed to
//! stdout/stderr again, which would corrupt the screen.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use log::{Level, Log, Metadata, Record};

const DEFAULT_CAPACITY: usize = 1_000;

/// One formatted log line plus the level it was emitted at, so the Logs tab
/// can color it without re-parsing the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub text: String,
}

struct Inner {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

/// The sole log destination once the TUI attaches the terminal. Internally a
/// `Mutex`-guarded bounded FIFO, the Rust equivalent of the original's
/// `ListLogHandler` wrapping a bounded `queue.Queue`.
pub struct ConsoleLogSink {
    inner: Mutex<Inner>,
    dropped: AtomicUsize,
}

impl ConsoleLogSink {
    pub fn new(capacity: usize) -> Self {
        ConsoleLogSink {
            inner: Mutex::new(Inner {
                lines: VecDeque::with_capacity(capacity),
                capacity,
            }),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Drain every currently queued line. If any lines were dropped for
    /// overflow since the last drain, append a synthetic record reporting
    /// the count and reset the counter.
    pub fn drain(&self) -> Vec<LogLine> {
        let mut inner = self.inner.lock().unwrap();
        let mut drained: Vec<LogLine> = inner.lines.drain(..).collect();

        let dropped = self.dropped.swap(0, Ordering::AcqRel);
        if dropped > 0 {
            drained.push(LogLine {
                level: Level::Warn,
                text: format!("... {dropped} log messages dropped due to queue overflow ..."),
            });
        }

        drained
    }
}

impl Default for ConsoleLogSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Log for ConsoleLogSink {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = LogLine {
            level: record.level(),
            text: format!("[{}] {}", record.target(), record.args()),
        };

        let mut inner = self.inner.lock().unwrap();
        if inner.lines.len() >= inner.capacity {
            inner.lines.pop_front();
            self.dropped.fetch_add(1, Ordering::AcqRel);
        }
        inner.lines.push_back(line);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(sink: &ConsoleLogSink, text: &str) {
        sink.log(
            &Record::builder()
                .level(Level::Info)
                .target("test")
                .args(format_args!("{text}"))
                .build(),
        );
    }

    #[test]
    fn drain_returns_at_most_capacity_plus_one_synthetic_record() {
        let sink = ConsoleLogSink::new(4);
        for c in ["a", "b", "c", "d", "e", "f", "g"] {
            emit(&sink, c);
        }

        let drained = sink.drain();
        assert_eq!(drained.len(), 5);
        let texts: Vec<&str> = drained.iter().map(|l| l.text.as_str()).collect();
        assert!(texts[0].contains('d'));
        assert!(texts[3].contains('g'));
        assert!(texts[4].contains("3 log messages dropped"));
    }

    #[test]
    fn drop_counter_resets_after_drain() {
        let sink = ConsoleLogSink::new(2);
        for c in ["a", "b", "c"] {
            emit(&sink, c);
        }
        let first = sink.drain();
        assert!(first.last().unwrap().text.contains('1'));

        let second = sink.drain();
        assert!(second.is_empty());
    }

    #[test]
    fn no_overflow_means_no_synthetic_record() {
        let sink = ConsoleLogSink::new(10);
        emit(&sink, "only one");
        let drained = sink.drain();
        assert_eq!(drained.len(), 1);
    }
}
