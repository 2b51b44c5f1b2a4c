//! Progress reporting for the optimization passes.
//!
//! The scheduler reports once at the end of every phase of every pass.
//!
//! # Example
//!
//! ```
//! use surfopt::algo::progress::{Phase, Progress};
//!
//! let progress = Progress::new(|report| {
//!     if report.phase == Phase::Split {
//!         println!("pass {}: {} splits", report.pass, report.accepted);
//!     }
//! });
//! # let _ = progress;
//! ```

use std::fmt;

/// One phase of an optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Swap rounds until no swap is accepted.
    Swap,
    /// One sweep of edge splits.
    Split,
    /// One sweep of vertex collapses.
    Collapse,
    /// Parametric smoothing.
    Smooth,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Swap => "swap",
            Phase::Split => "split",
            Phase::Collapse => "collapse",
            Phase::Smooth => "smooth",
        })
    }
}

/// Summary of a finished phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseReport {
    /// Zero-based index of the outer pass.
    pub pass: usize,
    /// The phase that just ended.
    pub phase: Phase,
    /// Edits accepted during the phase (vertices moved, for smoothing).
    pub accepted: usize,
    /// Live triangles once the phase has been compacted.
    pub live_triangles: usize,
}

/// A progress callback that receives a [`PhaseReport`] after every phase.
pub struct Progress {
    callback: Box<dyn Fn(&PhaseReport) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&PhaseReport) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report a finished phase.
    #[inline]
    pub fn report(&self, report: &PhaseReport) {
        (self.callback)(report);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
