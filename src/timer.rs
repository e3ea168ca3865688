//! Scoped wall-clock timing of pipeline stages.
//!
//! [`Timings::start`] hands out a [`Timer`] guard that records its stage when
//! dropped, on every exit path of the enclosing scope. The guard mutably
//! borrows the [`Timings`], so a stage's duration cannot be read while its
//! scope is still open:
//!
//! ```
//! use raster_tiler::timer::Timings;
//!
//! let mut timings = Timings::new();
//! {
//!     let _t = timings.start("Read");
//!     // ... work ...
//! }
//! assert!(timings.elapsed("Read").is_some());
//! ```

use std::time::{Duration, Instant};

/// Ordered collection of named stage durations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timings {
    stages: Vec<(&'static str, Duration)>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin timing `stage`. The measurement is recorded when the returned
    /// guard goes out of scope.
    pub fn start(&mut self, stage: &'static str) -> Timer<'_> {
        Timer {
            timings: self,
            stage,
            started: Instant::now(),
        }
    }

    /// Time a closure as `stage` and return its result.
    pub fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let _timer = self.start(stage);
        f()
    }

    /// Elapsed time of `stage` in seconds. Repeated stages are summed.
    pub fn elapsed(&self, stage: &str) -> Option<f64> {
        self.duration(stage).map(|d| d.as_secs_f64())
    }

    pub fn duration(&self, stage: &str) -> Option<Duration> {
        self.stages
            .iter()
            .filter(|(name, _)| *name == stage)
            .map(|(_, d)| *d)
            .reduce(|a, b| a + b)
    }

    pub fn stages(&self) -> &[(&'static str, Duration)] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render as a `Server-Timing`-style header value, e.g.
    /// `Read - 1.23; Post-process - 0.45` (milliseconds).
    ///
    /// Returns `None` if no stage was recorded.
    pub fn server_timing(&self) -> Option<String> {
        if self.stages.is_empty() {
            return None;
        }

        let parts: Vec<String> = self
            .stages
            .iter()
            .map(|(name, d)| format!("{} - {:.2}", name, d.as_secs_f64() * 1000.0))
            .collect();
        Some(parts.join("; "))
    }

    fn record(&mut self, stage: &'static str, duration: Duration) {
        self.stages.push((stage, duration));
    }
}

/// Drop guard measuring one stage.
#[must_use = "the stage is measured until this guard is dropped"]
pub struct Timer<'a> {
    timings: &'a mut Timings,
    stage: &'static str,
    started: Instant,
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        self.timings.record(self.stage, elapsed);
    }
}
