//! Typed, validated configuration for a stem growth run.
//!
//! Field names serialize in `SCREAMING_SNAKE_CASE` so settings files written
//! for earlier tooling (`"DROP_RADIUS"`, `"OLD_GENOME_BIAS"`, ...) load as is.
//! Keys this record does not know, such as rendering knobs, are ignored.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, geometry};

/// Shape of the plane drops fall onto.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlaneShapeRepr", into = "u8")]
pub enum PlaneShape {
    /// The unit disk centred at the origin.
    #[default]
    Disk,
    /// The square `[-1, 1]²`.
    Square,
}

impl PlaneShape {
    /// Samples a drop position uniformly over the plane.
    pub fn sample(self, rng: &mut impl Rng) -> Vec2 {
        match self {
            Self::Disk => geometry::random_in_disk(geometry::HALF_EXTENT, rng),
            Self::Square => geometry::random_in_square(geometry::HALF_EXTENT, rng),
        }
    }

    pub fn contains(self, p: Vec2) -> bool {
        match self {
            Self::Disk => p.length_squared() <= geometry::HALF_EXTENT * geometry::HALF_EXTENT,
            Self::Square => p.abs().max_element() <= geometry::HALF_EXTENT,
        }
    }
}

/// Settings files store the shape either as its legacy code or by name.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlaneShapeRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<PlaneShapeRepr> for PlaneShape {
    type Error = ConfigError;

    fn try_from(repr: PlaneShapeRepr) -> Result<Self, Self::Error> {
        match repr {
            PlaneShapeRepr::Code(0) => Ok(Self::Disk),
            PlaneShapeRepr::Code(1) => Ok(Self::Square),
            PlaneShapeRepr::Code(other) => Err(ConfigError::UnknownPlaneShape(other.to_string())),
            PlaneShapeRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "disk" => Ok(Self::Disk),
                "square" => Ok(Self::Square),
                _ => Err(ConfigError::UnknownPlaneShape(name)),
            },
        }
    }
}

impl From<PlaneShape> for u8 {
    fn from(shape: PlaneShape) -> Self {
        match shape {
            PlaneShape::Disk => 0,
            PlaneShape::Square => 1,
        }
    }
}

/// Parameters of a single simulation, fixed for its whole lifetime.
///
/// Every field except `bounce_limit` must be present when deserializing.
/// [`Config::default`] carries the reference parameters used by the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub drop_radius: f32,
    pub stem_radius: f32,
    /// Distance a bounced drop travels from the stem it bounced off.
    pub bounce_distance: f32,
    pub plane_shape: PlaneShape,
    /// Per-step probability that a stem loses one unit of height.
    pub melt_probability: f64,
    /// Steps between melt passes; each pass applies the hits of the whole interval.
    pub melt_interval: u32,
    pub ground_stick_probability: f64,
    pub stem_stick_probability: f64,
    /// Extra height granted on top of the `+1` when a drop stacks on a stem.
    pub bounce_height_addition: u32,
    /// Weight of a stem's previous coordinate against the landing drop's.
    pub old_genome_bias: f32,
    pub periodic_boundary: bool,
    /// Optional cutoff on the number of bounces per drop.
    ///
    /// `None` keeps the geometric tail; `Some(0)` disables bouncing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounce_limit: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drop_radius: 0.03,
            stem_radius: 0.03,
            bounce_distance: 0.15,
            plane_shape: PlaneShape::Disk,
            melt_probability: 0.03,
            melt_interval: 30,
            ground_stick_probability: 0.05,
            stem_stick_probability: 1.0,
            bounce_height_addition: 20,
            old_genome_bias: 40.0,
            periodic_boundary: false,
            bounce_limit: None,
        }
    }
}

impl Config {
    /// Checks every field, returning the first violation found.
    ///
    /// Values are never clamped; a config either passes as given or is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("drop radius", self.drop_radius),
            ("stem radius", self.stem_radius),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveRadius { field, value });
            }
        }

        if !(self.bounce_distance.is_finite() && self.bounce_distance >= 0.0) {
            return Err(ConfigError::InvalidBounceDistance(self.bounce_distance));
        }

        for (field, value) in [
            ("melt probability", self.melt_probability),
            ("ground stick probability", self.ground_stick_probability),
            ("stem stick probability", self.stem_stick_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { field, value });
            }
        }

        if self.melt_interval == 0 {
            return Err(ConfigError::ZeroMeltInterval);
        }

        if !(self.old_genome_bias.is_finite() && self.old_genome_bias >= 0.0) {
            return Err(ConfigError::InvalidGenomeBias(self.old_genome_bias));
        }

        if self.periodic_boundary {
            if self.plane_shape != PlaneShape::Square {
                return Err(ConfigError::PeriodicDisk);
            }
            if self.bounce_distance >= geometry::PERIOD {
                return Err(ConfigError::PeriodicBounceTooFar(self.bounce_distance));
            }
        }

        Ok(())
    }

    /// Squared reach within which a drop touches a stem.
    #[inline]
    pub fn contact_radius_sq(&self) -> f32 {
        let reach = self.drop_radius + self.stem_radius;
        reach * reach
    }
}
