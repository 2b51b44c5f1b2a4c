//! Mesh optimization algorithms.
//!
//! - **Optimize**: local-operator quality optimization (swap, split, collapse,
//!   parametric smoothing) driven by a background size field
//!
//! Long-running algorithms report per-phase progress through [`Progress`].

pub mod optimize;
pub mod progress;

pub use progress::{Phase, PhaseReport, Progress};
