/// Instrumentation and profiling infrastructure for microoptimization
/// Provides hot-path call counting and hardware performance counter integration
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the rasterizer hot paths.
/// Only incremented when the `profiling` feature is enabled.
pub struct FunctionCounters {
    // Geometry
    pub triangles_built: AtomicU64,
    pub triangles_skipped_indices: AtomicU64,

    // Setup
    pub triangles_clipped_away: AtomicU64,
    pub triangles_backface_culled: AtomicU64,

    // Tiles
    pub tile_triangle_visits: AtomicU64,
    pub tile_depth_culled: AtomicU64,

    // Pixels
    pub simd_batches: AtomicU64,
    pub scalar_pixels: AtomicU64,
    pub alpha_discards: AtomicU64,
    pub blended_pixels: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            triangles_built: AtomicU64::new(0),
            triangles_skipped_indices: AtomicU64::new(0),
            triangles_clipped_away: AtomicU64::new(0),
            triangles_backface_culled: AtomicU64::new(0),
            tile_triangle_visits: AtomicU64::new(0),
            tile_depth_culled: AtomicU64::new(0),
            simd_batches: AtomicU64::new(0),
            scalar_pixels: AtomicU64::new(0),
            alpha_discards: AtomicU64::new(0),
            blended_pixels: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 10] {
        [
            &self.triangles_built,
            &self.triangles_skipped_indices,
            &self.triangles_clipped_away,
            &self.triangles_backface_culled,
            &self.tile_triangle_visits,
            &self.tile_depth_culled,
            &self.simd_batches,
            &self.scalar_pixels,
            &self.alpha_discards,
            &self.blended_pixels,
        ]
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        let [built, skipped, clipped, culled, visits, depth_culled, batches, scalar, discards, blended] =
            self.all().map(|c| c.load(Ordering::Relaxed));
        CounterSnapshot {
            triangles_built: built,
            triangles_skipped_indices: skipped,
            triangles_clipped_away: clipped,
            triangles_backface_culled: culled,
            tile_triangle_visits: visits,
            tile_depth_culled: depth_culled,
            simd_batches: batches,
            scalar_pixels: scalar,
            alpha_discards: discards,
            blended_pixels: blended,
        }
    }
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub triangles_built: u64,
    pub triangles_skipped_indices: u64,
    pub triangles_clipped_away: u64,
    pub triangles_backface_culled: u64,
    pub tile_triangle_visits: u64,
    pub tile_depth_culled: u64,
    pub simd_batches: u64,
    pub scalar_pixels: u64,
    pub alpha_discards: u64,
    pub blended_pixels: u64,
}

impl CounterSnapshot {
    /// Log a formatted report at info level
    pub fn log_report(&self) {
        log::info!("=== Performance Counters Report ===");
        log::info!("Geometry:");
        log::info!("  triangles built:            {:12}", self.triangles_built);
        log::info!("  skipped (bad indices):      {:12}", self.triangles_skipped_indices);
        log::info!("Setup:");
        log::info!("  clipped away:               {:12}", self.triangles_clipped_away);
        log::info!("  backface culled:            {:12}", self.triangles_backface_culled);
        log::info!("Tiles:");
        log::info!("  triangle visits:            {:12}", self.tile_triangle_visits);
        log::info!("  depth culled:               {:12}", self.tile_depth_culled);
        if self.tile_triangle_visits > 0 {
            let rate = self.tile_depth_culled as f64 / self.tile_triangle_visits as f64 * 100.0;
            log::info!("  cull rate:                  {:11.2}%", rate);
        }
        log::info!("Pixels:");
        log::info!("  4-wide batches:             {:12}", self.simd_batches);
        log::info!("  scalar tail pixels:         {:12}", self.scalar_pixels);
        log::info!("  alpha discards:             {:12}", self.alpha_discards);
        log::info!("  blended pixels:             {:12}", self.blended_pixels);
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value as u64, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Hardware performance counter wrapper for benchmarking
#[cfg(feature = "profiling")]
pub mod hardware {
    use perf_event::events::Hardware;
    use perf_event::{Builder, Counter};

    /// Cycle, instruction and cache counters; any the kernel refuses stay `None`.
    pub struct PerfCounters {
        counters: [Option<Counter>; 4],
    }

    impl PerfCounters {
        pub fn new() -> Self {
            let kinds = [
                Hardware::CPU_CYCLES,
                Hardware::INSTRUCTIONS,
                Hardware::CACHE_REFERENCES,
                Hardware::CACHE_MISSES,
            ];
            Self {
                counters: kinds.map(|kind| Builder::new().kind(kind).build().ok()),
            }
        }

        pub fn enable_all(&mut self) {
            for c in self.counters.iter_mut().flatten() {
                let _ = c.enable();
            }
        }

        pub fn disable_all(&mut self) {
            for c in self.counters.iter_mut().flatten() {
                let _ = c.disable();
            }
        }

        pub fn reset_all(&mut self) {
            for c in self.counters.iter_mut().flatten() {
                let _ = c.reset();
            }
        }

        pub fn read_all(&mut self) -> PerfSnapshot {
            let [cycles, instructions, refs, misses] = self
                .counters
                .each_mut()
                .map(|c| c.as_mut().and_then(|c| c.read().ok()).unwrap_or(0));
            PerfSnapshot {
                cpu_cycles: cycles,
                instructions,
                cache_references: refs,
                cache_misses: misses,
            }
        }
    }

    impl Default for PerfCounters {
        fn default() -> Self {
            Self::new()
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct PerfSnapshot {
        pub cpu_cycles: u64,
        pub instructions: u64,
        pub cache_references: u64,
        pub cache_misses: u64,
    }

    impl PerfSnapshot {
        pub fn log_report(&self) {
            log::info!("=== Hardware Performance Counters ===");
            log::info!("CPU Cycles:            {:16}", self.cpu_cycles);
            log::info!("Instructions:          {:16}", self.instructions);
            if self.cpu_cycles > 0 {
                let ipc = self.instructions as f64 / self.cpu_cycles as f64;
                log::info!("IPC (Instructions/Cycle): {:13.3}", ipc);
            }
            log::info!("Cache References:      {:16}", self.cache_references);
            log::info!("Cache Misses:          {:16}", self.cache_misses);
            if self.cache_references > 0 {
                let miss_rate = self.cache_misses as f64 / self.cache_references as f64 * 100.0;
                log::info!("Cache Miss Rate:       {:13.2}%", miss_rate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_stores_and_reset() {
        let counters = FunctionCounters::new();
        counters.simd_batches.fetch_add(3, Ordering::Relaxed);
        counters.alpha_discards.fetch_add(1, Ordering::Relaxed);
        let snap = counters.snapshot();
        assert_eq!(snap.simd_batches, 3);
        assert_eq!(snap.alpha_discards, 1);

        counters.reset();
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }
}
