//! An explicit metrics collector with scoped timing spans.
//!
//! Passed into the driver rather than living in a global: callers that want
//! statistics hand one in, callers that do not simply drop the report.

use log::info;
use std::cell::RefCell;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct TimeStats {
    // Insertion order is kept so reports read in execution order.
    accumulated: RefCell<Vec<(String, Duration, usize)>>,
}

impl TimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a named span; the elapsed time is accumulated when the guard
    /// drops. Repeated spans with the same name add up.
    pub fn span(&self, name: &str) -> TimeSpan<'_> {
        TimeSpan {
            stats: self,
            name: name.to_string(),
            started: Instant::now(),
        }
    }

    fn record(&self, name: String, elapsed: Duration) {
        let mut accumulated = self.accumulated.borrow_mut();
        match accumulated.iter_mut().find(|(n, _, _)| *n == name) {
            Some((_, total, count)) => {
                *total += elapsed;
                *count += 1;
            }
            None => accumulated.push((name, elapsed, 1)),
        }
    }

    /// Total accumulated duration of a span, if it ever ran.
    pub fn total(&self, name: &str) -> Option<Duration> {
        self.accumulated
            .borrow()
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, total, _)| *total)
    }

    /// Number of times a span ran.
    pub fn count(&self, name: &str) -> usize {
        self.accumulated
            .borrow()
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, count)| *count)
            .unwrap_or(0)
    }

    /// Logs one line per span, in execution order.
    pub fn report(&self) {
        for (name, total, count) in self.accumulated.borrow().iter() {
            info!(
                "{}: {:.6} s over {} invocation(s)",
                name,
                total.as_secs_f64(),
                count
            );
        }
    }
}

/// A scoped span; accumulates into its collector on drop.
pub struct TimeSpan<'a> {
    stats: &'a TimeStats,
    name: String,
    started: Instant,
}

impl Drop for TimeSpan<'_> {
    fn drop(&mut self) {
        self.stats
            .record(std::mem::take(&mut self.name), self.started.elapsed());
    }
}
