//! Error types for the stem growth engine.
//!
//! [`ConfigError`] is the recoverable class: a malformed configuration is
//! rejected before the first step runs. [`IndexError`] and [`SimError`]
//! describe broken invariants between the stem table and the spatial index;
//! a run that hits one of them stops.

use glam::Vec2;

use crate::types::PointId;

/// Reasons a [`crate::config::Config`] is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A radius is zero, negative or not finite.
    #[error("{field} must be a finite positive length, got {value}")]
    NonPositiveRadius {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// Bounce distance is negative or not finite.
    #[error("bounce distance must be finite and non-negative, got {0}")]
    InvalidBounceDistance(f32),

    /// A probability lies outside `[0, 1]` (or is NaN).
    #[error("{field} must be a probability in [0, 1], got {value}")]
    ProbabilityOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Melt passes must be spaced at least one step apart.
    #[error("melt interval must be at least 1")]
    ZeroMeltInterval,

    /// Genome bias is negative or not finite.
    #[error("old genome bias must be finite and non-negative, got {0}")]
    InvalidGenomeBias(f32),

    /// Periodic wrap-around is only defined on the square plane.
    #[error("periodic boundary requires the square plane")]
    PeriodicDisk,

    /// A bounce this long could cross the periodic plane more than once.
    #[error("bounce distance {0} must be below the plane period 2 when the boundary is periodic")]
    PeriodicBounceTooFar(f32),

    /// Unrecognised plane shape in a settings file.
    #[error("unknown plane shape {0:?} (expected 0/\"disk\" or 1/\"square\")")]
    UnknownPlaneShape(String),

    /// The melt hit distribution could not be built.
    #[error("melt distribution rejected the parameters: {0}")]
    MeltDistribution(String),
}

/// Failures of the spatial index contract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    /// Two live entries may never share a coordinate.
    #[error("coordinate {pos} is already occupied by stem {existing}")]
    Occupied {
        /// The coordinate being inserted.
        pos: Vec2,
        /// Identifier of the live entry already there.
        existing: PointId,
    },

    /// Removal of a coordinate that holds no live entry.
    #[error("no indexed stem at {pos}")]
    Missing {
        /// The coordinate that was looked up.
        pos: Vec2,
    },

    /// NaN or infinite coordinates cannot be ordered in the tree.
    #[error("coordinate {pos} is not finite")]
    NonFinite {
        /// The rejected coordinate.
        pos: Vec2,
    },
}

/// Errors that abort a simulation run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The spatial index refused an insert or remove.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The index returned an identifier the stem table does not know.
    #[error("stem {0} is indexed but missing from the stem table")]
    OrphanedEntry(PointId),

    /// The stem table has no stem with this identifier.
    #[error("no stem with id {0}")]
    MissingStem(PointId),

    /// A stem with this identifier already exists.
    #[error("stem {0} already exists")]
    DuplicateId(PointId),

    /// The index entry and the table disagree on where a stem is.
    #[error("stem {id} is indexed at {indexed} but stored at {stored}")]
    PositionMismatch {
        /// Identifier of the stem.
        id: PointId,
        /// Coordinate held by the index.
        indexed: Vec2,
        /// Coordinate held by the table.
        stored: Vec2,
    },

    /// The index and the table hold different numbers of stems.
    #[error("index holds {indexed} entries but the stem table holds {stored}")]
    CountMismatch {
        /// Live entries in the index.
        indexed: usize,
        /// Stems in the table.
        stored: usize,
    },
}
