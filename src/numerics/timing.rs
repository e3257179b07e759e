use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Receives one timing sample per instrumented call.
pub trait MetricsSink {
    fn record(&self, label: &'static str, elapsed: Duration);
}

#[derive(Default, Clone, Debug)]
pub struct TimingStats {
    pub times: Vec<Duration>,
}

impl TimingStats {
    pub fn count(&self) -> usize {
        self.times.len()
    }

    pub fn total(&self) -> Duration {
        self.times.iter().sum()
    }

    pub fn mean(&self) -> Duration {
        if self.times.is_empty() {
            return Duration::ZERO;
        }
        self.total() / self.times.len() as u32
    }
}

/// Call counts and timings keyed by operation name.
#[derive(Default, Debug)]
pub struct Counter {
    stats: RefCell<BTreeMap<&'static str, TimingStats>>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.stats.borrow().get(label).map_or(0, TimingStats::count)
    }

    pub fn stats(&self, label: &str) -> Option<TimingStats> {
        self.stats.borrow().get(label).cloned()
    }

    pub fn reset(&self) {
        self.stats.borrow_mut().clear();
    }

    pub fn summary(&self) -> String {
        let stats = self.stats.borrow();
        let mut out = String::new();
        out.push_str(&format!("{}\n", "=".repeat(60)));
        out.push_str(&format!("{:^60}\n", "SENSITIVITY TIMING SUMMARY"));
        out.push_str(&format!("{}\n", "=".repeat(60)));
        out.push_str(&format!(
            "{:<16} | {:>8} | {:>12} | {:>12}\n",
            "operation", "calls", "total [ms]", "mean [ms]"
        ));
        out.push_str(&format!("{}\n", "-".repeat(60)));
        for (label, s) in stats.iter() {
            out.push_str(&format!(
                "{:<16} | {:>8} | {:>12.3} | {:>12.3}\n",
                label,
                s.count(),
                s.total().as_secs_f64() * 1000.0,
                s.mean().as_secs_f64() * 1000.0
            ));
        }
        out
    }

    pub fn print_summary(&self) {
        if self.stats.borrow().is_empty() {
            return;
        }
        println!("\n{}", self.summary());
    }
}

impl MetricsSink for Counter {
    fn record(&self, label: &'static str, elapsed: Duration) {
        self.stats
            .borrow_mut()
            .entry(label)
            .or_default()
            .times
            .push(elapsed);
    }
}

/// Reports the time between its creation and drop to a [`MetricsSink`].
/// The sample is recorded on every exit path, including early returns via `?`.
pub struct TimerGuard<'a> {
    sink: &'a dyn MetricsSink,
    label: &'static str,
    start: Instant,
}

impl<'a> TimerGuard<'a> {
    pub fn start(sink: &'a dyn MetricsSink, label: &'static str) -> Self {
        Self {
            sink,
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.sink.record(self.label, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_records_on_drop() {
        let counter = Counter::new();
        {
            let _t = TimerGuard::start(&counter, "jvec");
            assert_eq!(counter.count("jvec"), 0);
        }
        assert_eq!(counter.count("jvec"), 1);
    }

    #[test]
    fn guard_records_early_returns() {
        fn failing(counter: &Counter) -> Result<(), &'static str> {
            let _t = TimerGuard::start(counter, "jtvec");
            Err("boom")?;
            Ok(())
        }

        let counter = Counter::new();
        assert!(failing(&counter).is_err());
        assert_eq!(counter.count("jtvec"), 1);
        assert_eq!(counter.count("jvec"), 0);
    }

    #[test]
    fn summary_lists_every_operation() {
        let counter = Counter::new();
        counter.record("fields", Duration::from_millis(2));
        counter.record("fields", Duration::from_millis(4));
        counter.record("jvec", Duration::from_millis(1));

        let stats = counter.stats("fields").unwrap();
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.mean(), Duration::from_millis(3));

        let summary = counter.summary();
        assert!(summary.contains("fields"));
        assert!(summary.contains("jvec"));

        counter.reset();
        assert_eq!(counter.count("fields"), 0);
    }
}
