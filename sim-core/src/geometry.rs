//! Sampling and plane-topology helpers.
//!
//! The plane is either the unit disk centred at the origin or the square
//! `[-1, 1]²`. Periodic wrap-around is only meaningful on the square, whose
//! period along each axis is [`PERIOD`].

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

/// Half the side of the square plane and the radius of the disk plane.
pub const HALF_EXTENT: f32 = 1.0;

/// Width of the square plane; the translation used by periodic wrap.
pub const PERIOD: f32 = 2.0 * HALF_EXTENT;

/// Samples a point uniformly inside a disk of `radius` centred at the origin.
///
/// Uses inverse-transform sampling on the squared radius so the density is
/// uniform over area rather than over distance from the centre.
pub fn random_in_disk(radius: f32, rng: &mut impl Rng) -> Vec2 {
    let r = radius * rng.random::<f32>().sqrt();
    polar_to_cartesian(r, random_angle(rng))
}

/// Samples a point uniformly inside the axis-aligned square `[-half, half]²`.
pub fn random_in_square(half_range: f32, rng: &mut impl Rng) -> Vec2 {
    let x = rng.random_range(-half_range..=half_range);
    let y = rng.random_range(-half_range..=half_range);
    Vec2::new(x, y)
}

/// Uniform angle in `[0, 2π)`.
#[inline]
pub fn random_angle(rng: &mut impl Rng) -> f32 {
    rng.random::<f32>() * TAU
}

#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::from_angle(theta) * r
}

/// Returns `true` if two circles touch or overlap.
#[inline]
pub fn circles_intersect(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let reach = ra + rb;
    a.distance_squared(b) <= reach * reach
}

/// Folds a coordinate that left the square plane back in from the opposite edge.
///
/// Each axis is corrected by at most one period, so inputs must lie within
/// one period of the plane; [`crate::config::Config::validate`] guarantees
/// that for bounces.
pub fn wrap_periodic(p: Vec2) -> Vec2 {
    let fold = |v: f32| {
        if v > HALF_EXTENT {
            v - PERIOD
        } else if v < -HALF_EXTENT {
            v + PERIOD
        } else {
            v
        }
    };
    Vec2::new(fold(p.x), fold(p.y))
}

/// The eight toroidal translations of `p` used to search across the edges.
pub fn periodic_images(p: Vec2) -> [Vec2; 8] {
    [
        p + Vec2::new(PERIOD, 0.0),
        p + Vec2::new(-PERIOD, 0.0),
        p + Vec2::new(0.0, PERIOD),
        p + Vec2::new(0.0, -PERIOD),
        p + Vec2::new(PERIOD, PERIOD),
        p + Vec2::new(PERIOD, -PERIOD),
        p + Vec2::new(-PERIOD, PERIOD),
        p + Vec2::new(-PERIOD, -PERIOD),
    ]
}
