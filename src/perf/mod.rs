/// Performance measurement utilities
/// Each pipeline stage is timed and reported through the `log` facade.
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed wall time in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        log::trace!("[PERF] {}: {}μs", self.name, self.elapsed().as_micros());
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_reports_monotonic_time() {
        let timer = PerfTimer::new("test");
        let a = timer.elapsed();
        let b = timer.elapsed();
        assert!(b >= a);
        assert!(timer.elapsed_ms() >= 0.0);
    }
}
