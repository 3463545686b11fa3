use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::app::{ProgressEvent, ProgressSink};

/// Bytes transferred so far, shared between the downloading thread and the
/// watcher. `finish` must be called on every exit path so the watcher stops.
#[derive(Debug, Default)]
pub struct TransferCounter {
    bytes: AtomicU64,
    total: AtomicU64,
    finished: AtomicBool,
}

impl TransferCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn set_total(&self, total: Option<u64>) {
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
    }

    pub fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            0 => None,
            total => Some(total),
        }
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Emit advisory transfer events until the counter is finished. Purely for
/// display; the download neither waits on nor depends on this loop.
pub fn watch_transfer(counter: &TransferCounter, sink: &dyn ProgressSink, tick: Duration) {
    let start = Instant::now();
    while !counter.is_finished() {
        thread::sleep(tick);
        sink.event(ProgressEvent::transfer(
            counter.bytes(),
            counter.total(),
            start.elapsed(),
        ));
    }
    // final event so transfers shorter than one tick still report
    sink.event(ProgressEvent::transfer(
        counter.bytes(),
        counter.total(),
        start.elapsed(),
    ));
}

/// Interactive sink rendering an indicatif byte bar on stderr.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        bar.set_style(bytes_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn event(&self, event: ProgressEvent) {
        match event.bytes {
            Some(bytes) => {
                if let Some(total) = event.total_bytes {
                    self.bar.set_length(total);
                }
                self.bar.set_position(bytes);
            }
            None => self.bar.set_message(event.message),
        }
    }
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.dim} {msg:32!} [{elapsed_precise}] {bytes:>8} @ {bytes_per_sec:8}")
        .expect("static progress template")
        .progress_chars("━━╾─")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn watcher_stops_once_finished() {
        let counter = TransferCounter::new();
        counter.add(42);
        counter.set_total(Some(100));
        let sink = RecordingSink {
            events: Mutex::new(Vec::new()),
        };

        let started = Instant::now();
        thread::scope(|scope| {
            let watcher =
                scope.spawn(|| watch_transfer(&counter, &sink, Duration::from_millis(5)));
            thread::sleep(Duration::from_millis(20));
            counter.finish();
            watcher.join().unwrap();
        });

        // bounded: well under a second for a 5ms tick
        assert!(started.elapsed() < Duration::from_secs(1));
        let events = sink.events.lock().unwrap();
        assert!(!events.is_empty());
        let last = events.last().unwrap();
        assert_eq!(last.bytes, Some(42));
        assert_eq!(last.total_bytes, Some(100));
    }

    #[test]
    fn counter_reports_unknown_total_as_none() {
        let counter = TransferCounter::new();
        assert_eq!(counter.total(), None);
        counter.set_total(Some(10));
        assert_eq!(counter.total(), Some(10));
        counter.set_total(None);
        assert_eq!(counter.total(), None);
    }
}
