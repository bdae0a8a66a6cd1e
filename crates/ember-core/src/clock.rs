//! Glitch-filtered monotonic time service.
//!
//! Raw platform ticks are nominally monotonic but have been observed to run
//! backwards, and they jump arbitrarily far forward after device sleep.
//! Downstream simulation and animation code assumes strictly non-decreasing,
//! boundedly-incrementing time, so this clock filters raw ticks into a
//! clamped accumulator. When the raw tick has not changed since the last
//! query the cached accumulator is returned without taking any lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use ember_telemetry::Metrics;

/// Default cap, in milliseconds, on a single accumulator step.
pub const DEFAULT_MAX_STEP_MS: u64 = 250;

/// A possibly-glitchy platform tick source.
pub trait TickSource: Send + Sync {
    /// Raw platform milliseconds. Nominally monotonic; not trusted to be.
    fn ticks_ms(&self) -> u64;
}

/// Default tick source backed by [`Instant`].
#[derive(Debug)]
pub struct SystemTicks {
    origin: Instant,
}

impl SystemTicks {
    /// Construct a tick source whose origin is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemTicks {
    fn ticks_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Monotonic, clamped real-time counter starting near zero at construction.
pub struct RealTimeClock {
    source: Arc<dyn TickSource>,
    max_step_ms: u64,
    last_ticks: AtomicU64,
    accumulated: AtomicU64,
    advance: Mutex<()>,
    metrics: Metrics,
}

impl RealTimeClock {
    /// Construct a clock with the default step cap.
    #[must_use]
    pub fn new(source: Arc<dyn TickSource>, metrics: Metrics) -> Self {
        Self::with_max_step(source, DEFAULT_MAX_STEP_MS, metrics)
    }

    /// Construct a clock with an explicit step cap in milliseconds.
    #[must_use]
    pub fn with_max_step(source: Arc<dyn TickSource>, max_step_ms: u64, metrics: Metrics) -> Self {
        let origin = source.ticks_ms();
        Self {
            source,
            max_step_ms,
            last_ticks: AtomicU64::new(origin),
            accumulated: AtomicU64::new(0),
            advance: Mutex::new(()),
            metrics,
        }
    }

    /// Filtered milliseconds elapsed since clock construction.
    ///
    /// Non-decreasing for the life of the clock; a single call never advances
    /// the accumulator by more than the step cap. Backward raw ticks
    /// contribute zero elapsed time.
    pub fn now_ms(&self) -> u64 {
        let raw = self.source.ticks_ms();
        if raw == self.last_ticks.load(Ordering::Acquire) {
            return self.accumulated.load(Ordering::Acquire);
        }

        let _guard = self.advance.lock().unwrap_or_else(PoisonError::into_inner);
        let last = self.last_ticks.load(Ordering::Acquire);
        let accumulated = self.accumulated.load(Ordering::Acquire);
        // Another caller may have advanced past our raw reading while we
        // waited for the lock.
        if raw == last {
            return accumulated;
        }

        let step = if raw < last {
            self.metrics.inc_clock_backward();
            0
        } else if raw - last > self.max_step_ms {
            self.metrics.inc_clock_clamped();
            self.max_step_ms
        } else {
            raw - last
        };

        let next = accumulated + step;
        self.accumulated.store(next, Ordering::Release);
        self.last_ticks.store(raw, Ordering::Release);
        next
    }

    /// The configured cap on a single accumulator step.
    #[must_use]
    pub const fn max_step_ms(&self) -> u64 {
        self.max_step_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::AtomicU64 as TestTicksCell;

    struct ManualTicks {
        ticks: TestTicksCell,
    }

    impl ManualTicks {
        fn new(start: u64) -> Arc<Self> {
            Arc::new(Self {
                ticks: TestTicksCell::new(start),
            })
        }

        fn set(&self, value: u64) {
            self.ticks.store(value, Ordering::SeqCst);
        }
    }

    impl TickSource for ManualTicks {
        fn ticks_ms(&self) -> u64 {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn starts_near_zero_and_accumulates() -> Result<()> {
        let ticks = ManualTicks::new(10_000);
        let clock = RealTimeClock::new(ticks.clone(), Metrics::new()?);
        assert_eq!(clock.now_ms(), 0);
        ticks.set(10_040);
        assert_eq!(clock.now_ms(), 40);
        ticks.set(10_041);
        assert_eq!(clock.now_ms(), 41);
        Ok(())
    }

    #[test]
    fn unchanged_ticks_return_cached_value() -> Result<()> {
        let ticks = ManualTicks::new(500);
        let clock = RealTimeClock::new(ticks.clone(), Metrics::new()?);
        ticks.set(520);
        assert_eq!(clock.now_ms(), 20);
        assert_eq!(clock.now_ms(), 20);
        assert_eq!(clock.now_ms(), 20);
        Ok(())
    }

    #[test]
    fn backward_ticks_contribute_zero() -> Result<()> {
        let metrics = Metrics::new()?;
        let ticks = ManualTicks::new(1_000);
        let clock = RealTimeClock::new(ticks.clone(), metrics.clone());
        ticks.set(1_100);
        assert_eq!(clock.now_ms(), 100);
        ticks.set(1_099);
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(metrics.snapshot().clock_backward_steps_total, 1);
        ticks.set(1_105);
        assert_eq!(clock.now_ms(), 106);
        Ok(())
    }

    #[test]
    fn oversized_steps_are_capped() -> Result<()> {
        let metrics = Metrics::new()?;
        let ticks = ManualTicks::new(0);
        let clock = RealTimeClock::new(ticks.clone(), metrics.clone());
        // Simulate waking from device sleep.
        ticks.set(60_000);
        assert_eq!(clock.now_ms(), DEFAULT_MAX_STEP_MS);
        assert_eq!(metrics.snapshot().clock_clamped_steps_total, 1);
        ticks.set(60_010);
        assert_eq!(clock.now_ms(), DEFAULT_MAX_STEP_MS + 10);
        Ok(())
    }

    #[test]
    fn custom_step_cap_is_honored() -> Result<()> {
        let ticks = ManualTicks::new(0);
        let clock = RealTimeClock::with_max_step(ticks.clone(), 50, Metrics::new()?);
        ticks.set(10_000);
        assert_eq!(clock.now_ms(), 50);
        assert_eq!(clock.max_step_ms(), 50);
        Ok(())
    }

    #[test]
    fn accumulator_is_non_decreasing_over_random_walk() -> Result<()> {
        let ticks = ManualTicks::new(5_000);
        let clock = RealTimeClock::new(ticks.clone(), Metrics::new()?);
        let readings = [5_010, 5_005, 5_400, 5_399, 5_420, 4_000, 6_000];
        let mut previous = clock.now_ms();
        for reading in readings {
            ticks.set(reading);
            let now = clock.now_ms();
            assert!(now >= previous, "clock went backwards: {previous} -> {now}");
            assert!(now - previous <= DEFAULT_MAX_STEP_MS);
            previous = now;
        }
        Ok(())
    }
}
