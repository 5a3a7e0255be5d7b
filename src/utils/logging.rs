use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces how long a section of the step took.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Warns when stepping took longer in wall-clock time than the simulated span.
pub fn warn_if_slower_than_realtime(wall: Duration, simulated: Duration) {
    if simulated.is_zero() {
        return;
    }
    if wall > simulated {
        warn!(
            "Simulation running slower than real time: {:.2} ms of physics for {:.2} ms simulated",
            wall.as_secs_f64() * 1000.0,
            simulated.as_secs_f64() * 1000.0
        );
    }
}
