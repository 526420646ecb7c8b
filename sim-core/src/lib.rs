//! Core 2-D stem growth simulation library.
//!
//! Drops fall at random on a bounded plane, bounce off the tallest stem they
//! touch with geometrically decaying probability, then stack on it, stick to
//! bare ground, or vanish. Stems periodically melt from the bottom.
//!
//! Main components:
//! - [`geometry`] — plane sampling and periodic wrap-around.
//! - [`tree`] — dynamic k-d tree over stem coordinates.
//! - [`stem`] — stems and the field keeping table and index in step.
//! - [`config`] — validated simulation parameters.
//! - [`phases`] — the drop and melt phases of a step.
//! - [`simulation`] — state, random stream and the step loop.
//! - [`observer`] — per-drop notification hooks.
//! - [`snapshot`] — read-only output records.
//! - [`error`] — configuration and invariant errors.
//! - [`types`] — shared type aliases and IDs.

pub mod config;
pub mod error;
pub mod geometry;
pub mod observer;
pub mod phases;
pub mod simulation;
pub mod snapshot;
pub mod stem;
pub mod tree;
pub mod types;

pub use config::{Config, PlaneShape};
pub use error::{ConfigError, IndexError, SimError};
pub use observer::{DropTrail, NullObserver, Observer, Tally};
pub use phases::Landing;
pub use simulation::{Simulation, StepReport};
pub use snapshot::{Snapshot, StemRecord};
pub use stem::Stem;
pub use types::PointId;
