//! Stage timing for the measurement pipeline.
//!
//! A [`TimingGuard`] notes when a stage started and, when dropped, writes one
//! record to the [`TARGET`] log target. Guards are inert unless telemetry was
//! switched on with [`configure`] and the logger accepts the requested level,
//! so the pipeline can create them unconditionally.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

use crate::config::TelemetrySettings;

/// Log target every timing record is written to.
pub const TARGET: &str = "hc::telemetry";

static ENABLED: AtomicBool = AtomicBool::new(false);
static MAX_LEVEL: AtomicUsize = AtomicUsize::new(0);

/// Records the lifetime of a pipeline stage.
#[must_use = "the guard measures until it is dropped"]
pub struct TimingGuard {
    label: &'static str,
    level: Level,
    start: Instant,
    armed: bool,
}

impl TimingGuard {
    /// Whether this guard will log when dropped.
    pub fn is_active(&self) -> bool {
        self.armed
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop measuring without logging and return the elapsed time.
    pub fn finish(mut self) -> Duration {
        self.armed = false;
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.armed {
            log!(
                target: TARGET,
                self.level,
                "{} took {:.2?}",
                self.label,
                self.start.elapsed()
            );
        }
    }
}

/// Start timing `label`; the record is emitted at `level` on drop.
pub fn timing_guard(label: &'static str, level: Level) -> TimingGuard {
    let armed = allows(level) && log_enabled!(target: TARGET, level);
    TimingGuard {
        label,
        level,
        start: Instant::now(),
        armed,
    }
}

/// Apply telemetry preferences process-wide.
pub fn configure(settings: &TelemetrySettings) {
    set(settings.enabled, settings.level_filter());
}

/// Lower-level switch used by [`configure`] and by hosts with their own flags.
pub fn set(enabled: bool, level: LevelFilter) {
    ENABLED.store(enabled, Ordering::Relaxed);
    MAX_LEVEL.store(level as usize, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// True when telemetry is on and `level` is within the configured maximum.
pub fn allows(level: Level) -> bool {
    enabled() && (level as usize) <= MAX_LEVEL.load(Ordering::Relaxed)
}
