use std::sync::Arc;
use tracing::warn;

/// Receives progress updates for display. Implementations must be cheap:
/// they are called from the scheduler loop.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _total: u64) {}

    fn on_advance(&self, _delta: u64, _done: u64) {}

    fn on_message(&self, _message: &str) {}

    fn on_finish(&self, _done: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Count of successfully written records, owned by a single scheduler.
///
/// Never exceeds the total fixed at construction; excess is dropped and
/// logged.
pub struct ProgressCounter {
    done: u64,
    total: u64,
    observer: Arc<dyn ProgressObserver>,
}

impl ProgressCounter {
    pub fn new(total: u64, observer: Arc<dyn ProgressObserver>) -> Self {
        observer.on_start(total);
        Self {
            done: 0,
            total,
            observer,
        }
    }

    pub fn advance(&mut self, delta: u64) -> u64 {
        let remaining = self.total - self.done;
        let applied = if delta > remaining {
            warn!(
                delta,
                done = self.done,
                total = self.total,
                "Progress exceeds the start-time total; clamping"
            );
            remaining
        } else {
            delta
        };

        self.done += applied;
        self.observer.on_advance(applied, self.done);
        self.done
    }

    pub fn message(&self, message: &str) {
        self.observer.on_message(message);
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn finish(&self) {
        self.observer.on_finish(self.done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(u64, u64)>>,
    }

    impl ProgressObserver for Recorder {
        fn on_advance(&self, delta: u64, done: u64) {
            self.events.lock().unwrap().push((delta, done));
        }
    }

    #[test]
    fn counter_is_clamped_to_total() {
        let recorder = Arc::new(Recorder::default());
        let mut counter = ProgressCounter::new(250, recorder.clone());

        assert_eq!(counter.advance(100), 100);
        assert_eq!(counter.advance(100), 200);
        assert_eq!(counter.advance(100), 250);
        assert_eq!(counter.done(), 250);

        let events = recorder.events.lock().unwrap();
        assert_eq!(*events, vec![(100, 100), (100, 200), (50, 250)]);
    }
}
