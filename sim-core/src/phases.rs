//! The two phases of a simulation step.
//!
//! 1. [`drop_phase`]: a drop falls on the plane, bounces off the tallest
//!    stem it touches as long as the bounce roll succeeds, then either stacks
//!    on that stem, sticks to bare ground, or is discarded.
//! 2. [`melt_phase`]: every stem loses a Binomial number of height units
//!    covering the steps since the previous pass; stems that would go below
//!    zero are removed.

use glam::Vec2;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use tracing::warn;

use crate::{
    config::Config,
    error::SimError,
    geometry,
    observer::Observer,
    stem::{Stem, StemField},
    tree::Entry,
    types::PointId,
};

/// Bounce chains stop here when the config sets no limit of its own.
///
/// The chance of reaching it naturally is `2^-(cap·(cap+1)/2)`; it only
/// guards against a degenerate random source.
pub const BOUNCE_SAFETY_CAP: u32 = 1024;

/// How a drop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Landing {
    /// The stick roll failed; the field is unchanged.
    Discarded { bounces: u32 },
    /// The drop touched nothing and started a new stem at height 0.
    Grounded { id: PointId, bounces: u32 },
    /// The drop stacked on stem `replaced`, which is superseded by stem `id`.
    Stacked {
        id: PointId,
        replaced: PointId,
        bounces: u32,
    },
}

impl Landing {
    pub fn bounces(&self) -> u32 {
        match *self {
            Self::Discarded { bounces }
            | Self::Grounded { bounces, .. }
            | Self::Stacked { bounces, .. } => bounces,
        }
    }

    /// Identifier of the stem this drop created, if it created one.
    pub fn created(&self) -> Option<PointId> {
        match *self {
            Self::Discarded { .. } => None,
            Self::Grounded { id, .. } | Self::Stacked { id, .. } => Some(id),
        }
    }
}

/// Probability that a drop which has already bounced `bounce_count` times
/// bounces again: `1 / 2^(bounce_count + 1)`.
#[inline]
pub fn bounce_probability(bounce_count: u32) -> f64 {
    let exponent = i32::try_from(bounce_count.saturating_add(1)).unwrap_or(i32::MAX);
    0.5f64.powi(exponent)
}

/// Coordinate of a stem's new top after a drop at `drop` lands on `old`.
#[inline]
pub fn biased_top(old: Vec2, drop: Vec2, old_genome_bias: f32) -> Vec2 {
    (old * old_genome_bias + drop) / (1.0 + old_genome_bias)
}

/// Deposits one drop and resolves it.
///
/// A stem created by this drop gets identifier `id`. `hits` is scratch space
/// for intersection queries and is cleared before each use.
///
/// ### Parameters
/// - `field` - Stems and their index; mutated if the drop sticks.
/// - `cfg` - Validated configuration.
/// - `id` - Identifier for a stem created by this drop (the step counter).
/// - `rng` - The simulation's random stream.
/// - `observer` - Receives sample, bounce and landing events.
/// - `hits` - Reusable buffer for index query results.
///
/// ### Returns
/// The drop's [`Landing`], or an error if the field's invariants broke.
pub fn drop_phase(
    field: &mut StemField,
    cfg: &Config,
    id: PointId,
    rng: &mut impl Rng,
    observer: &mut impl Observer,
    hits: &mut Vec<Entry>,
) -> Result<Landing, SimError> {
    let radius_sq = cfg.contact_radius_sq();
    let limit = cfg.bounce_limit.unwrap_or(BOUNCE_SAFETY_CAP);

    let mut pos = cfg.plane_shape.sample(rng);
    observer.drop_sampled(pos);

    let mut bounces = 0;
    let target = loop {
        hits.clear();
        field.touching(pos, radius_sq, cfg.periodic_boundary, hits);
        let Some(target) = field.tallest(hits)? else {
            break None;
        };

        if bounces >= limit {
            if cfg.bounce_limit.is_none() {
                warn!(id, bounces, "bounce chain hit the safety cap");
            }
            break Some(target);
        }
        if !rng.random_bool(bounce_probability(bounces)) {
            break Some(target);
        }

        // Bounces are measured from the stem, not from where the drop was.
        bounces += 1;
        let offset = geometry::polar_to_cartesian(cfg.bounce_distance, geometry::random_angle(rng));
        pos = target.pos + offset;
        if cfg.periodic_boundary {
            pos = geometry::wrap_periodic(pos);
        }
        observer.drop_bounced(target.id, pos);
    };

    let landing = match target {
        Some(target) if rng.random_bool(cfg.stem_stick_probability) => {
            field.uproot(target.id)?;
            let height = target
                .height
                .saturating_add(1)
                .saturating_add(cfg.bounce_height_addition);
            field.plant(Stem {
                id,
                pos: biased_top(target.pos, pos, cfg.old_genome_bias),
                height,
            })?;
            Landing::Stacked {
                id,
                replaced: target.id,
                bounces,
            }
        }
        None if rng.random_bool(cfg.ground_stick_probability) => {
            field.plant(Stem { id, pos, height: 0 })?;
            Landing::Grounded { id, bounces }
        }
        _ => Landing::Discarded { bounces },
    };

    observer.drop_landed(&landing, pos);
    Ok(landing)
}

/// Applies one melt pass to every stem, in identifier order.
///
/// `hits` draws the number of height units each stem loses. Returns the
/// number of stems removed.
pub fn melt_phase(
    field: &mut StemField,
    hits: &Binomial,
    rng: &mut impl Rng,
    observer: &mut impl Observer,
) -> Result<usize, SimError> {
    let mut melted = 0;
    for id in field.ids() {
        let amount = hits.sample(rng);
        if let Some(stem) = field.erode(id, amount)? {
            observer.stem_melted(&stem);
            melted += 1;
        }
    }
    Ok(melted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PlaneShape,
        observer::{NullObserver, Tally},
    };
    use rand::{RngCore, SeedableRng, rngs::StdRng};

    /// Random source that returns the same word forever.
    ///
    /// `0` makes every Bernoulli roll with `p > 0` succeed and every uniform
    /// float sample `0.0`; `u64::MAX` makes every roll with `p < 1` fail.
    struct ConstRng(u64);

    impl RngCore for ConstRng {
        fn next_u32(&mut self) -> u32 {
            self.0 as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0 as u8);
        }
    }

    fn stem(id: PointId, x: f32, y: f32, height: u32) -> Stem {
        Stem {
            id,
            pos: Vec2::new(x, y),
            height,
        }
    }

    /// Radii large enough that every drop on the unit disk touches a stem
    /// near the origin.
    fn everywhere_cfg() -> Config {
        Config {
            drop_radius: 1.5,
            stem_radius: 1.5,
            bounce_distance: 0.0,
            plane_shape: PlaneShape::Disk,
            melt_probability: 0.0,
            melt_interval: 1,
            ground_stick_probability: 1.0,
            stem_stick_probability: 1.0,
            bounce_height_addition: 0,
            old_genome_bias: 1.0,
            periodic_boundary: false,
            bounce_limit: None,
        }
    }

    #[test]
    fn bounce_probability_halves_each_time() {
        assert_eq!(bounce_probability(0), 0.5);
        assert_eq!(bounce_probability(1), 0.25);
        assert_eq!(bounce_probability(2), 0.125);
        assert_eq!(bounce_probability(9), 1.0 / 1024.0);
    }

    #[test]
    fn biased_top_weights_the_old_coordinate() {
        let top = biased_top(Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0), 3.0);
        assert!((top - Vec2::new(0.75, 0.0)).length() < 1e-6);

        let no_bias = biased_top(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), 0.0);
        assert_eq!(no_bias, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn empty_field_grounds_the_first_drop() {
        let mut field = StemField::new();
        let cfg = everywhere_cfg();
        let mut rng = StdRng::seed_from_u64(1);
        let mut hits = Vec::new();

        let landing =
            drop_phase(&mut field, &cfg, 0, &mut rng, &mut NullObserver, &mut hits).unwrap();

        assert_eq!(landing, Landing::Grounded { id: 0, bounces: 0 });
        assert_eq!(field.get(0).map(|s| s.height), Some(0));
    }

    #[test]
    fn always_bouncing_source_chains_up_to_the_limit() {
        let mut field = StemField::new();
        field.plant(stem(100, 0.0, 0.0, 3)).unwrap();

        let mut cfg = everywhere_cfg();
        cfg.bounce_limit = Some(5);
        cfg.bounce_height_addition = 20;

        let mut tally = Tally::default();
        let mut hits = Vec::new();
        let landing =
            drop_phase(&mut field, &cfg, 7, &mut ConstRng(0), &mut tally, &mut hits).unwrap();

        assert_eq!(
            landing,
            Landing::Stacked {
                id: 7,
                replaced: 100,
                bounces: 5
            }
        );
        assert_eq!(tally.bounces, 5);

        // Old stem replaced by the new top, one higher plus the addition.
        assert!(field.get(100).is_none());
        let top = field.get(7).copied().unwrap();
        assert_eq!(top.height, 3 + 1 + 20);
        assert_eq!(top.pos, Vec2::ZERO);
        field.check_consistency().unwrap();
    }

    #[test]
    fn never_bouncing_source_sticks_immediately() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.0, 0.0, 0)).unwrap();

        let mut cfg = everywhere_cfg();
        cfg.stem_stick_probability = 0.5;

        let mut hits = Vec::new();
        let landing = drop_phase(
            &mut field,
            &cfg,
            2,
            &mut ConstRng(u64::MAX),
            &mut NullObserver,
            &mut hits,
        )
        .unwrap();

        // No bounce, and the 0.5 stick roll fails too.
        assert_eq!(landing, Landing::Discarded { bounces: 0 });
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn zero_bounce_limit_disables_bouncing() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.0, 0.0, 0)).unwrap();

        let mut cfg = everywhere_cfg();
        cfg.bounce_limit = Some(0);

        let mut tally = Tally::default();
        let mut hits = Vec::new();
        let landing =
            drop_phase(&mut field, &cfg, 2, &mut ConstRng(0), &mut tally, &mut hits).unwrap();

        assert_eq!(landing.bounces(), 0);
        assert_eq!(tally.bounces, 0);
        assert_eq!(landing.created(), Some(2));
    }

    #[test]
    fn drop_attaches_to_the_tallest_touching_stem() {
        let cfg = Config {
            bounce_limit: Some(0),
            ..everywhere_cfg()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut hits = Vec::new();

        for trial in 0..50u64 {
            let mut field = StemField::new();
            field.plant(stem(1, 0.1, 0.0, 5)).unwrap();
            field.plant(stem(2, -0.1, 0.0, 9)).unwrap();

            let landing = drop_phase(
                &mut field,
                &cfg,
                10 + trial,
                &mut rng,
                &mut NullObserver,
                &mut hits,
            )
            .unwrap();

            assert_eq!(
                landing,
                Landing::Stacked {
                    id: 10 + trial,
                    replaced: 2,
                    bounces: 0
                }
            );
            assert_eq!(field.get(1).map(|s| s.height), Some(5));
            assert_eq!(field.get(10 + trial).map(|s| s.height), Some(10));
        }
    }

    #[test]
    fn bounces_start_from_the_tallest_stem() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.1, 0.0, 5)).unwrap();
        field.plant(stem(2, -0.1, 0.0, 9)).unwrap();

        let cfg = Config {
            bounce_limit: Some(1),
            bounce_distance: 0.5,
            ..everywhere_cfg()
        };

        let mut trail = crate::observer::DropTrail::default();
        let mut hits = Vec::new();
        drop_phase(&mut field, &cfg, 3, &mut ConstRng(0), &mut trail, &mut hits).unwrap();

        // Angle 0 moves the drop +x by the bounce distance from stem 2.
        assert_eq!(trail.path.len(), 2);
        assert!((trail.path[1] - Vec2::new(0.4, 0.0)).length() < 1e-6);
    }

    #[test]
    fn discarded_drop_on_stem_leaves_field_unchanged() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.0, 0.0, 4)).unwrap();

        let cfg = Config {
            stem_stick_probability: 0.0,
            bounce_limit: Some(0),
            ..everywhere_cfg()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut hits = Vec::new();
        let landing =
            drop_phase(&mut field, &cfg, 5, &mut rng, &mut NullObserver, &mut hits).unwrap();

        assert_eq!(landing, Landing::Discarded { bounces: 0 });
        assert_eq!(field.get(1).map(|s| s.height), Some(4));
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn periodic_bounce_wraps_to_the_opposite_edge() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.9, 0.0, 0)).unwrap();

        // Contact radii cover the whole square, so the drop touches the stem
        // wherever the constant source places it.
        let cfg = Config {
            bounce_distance: 0.3,
            plane_shape: PlaneShape::Square,
            periodic_boundary: true,
            bounce_limit: Some(1),
            ..everywhere_cfg()
        };
        assert_eq!(cfg.validate(), Ok(()));

        let mut trail = crate::observer::DropTrail::default();
        let mut hits = Vec::new();
        drop_phase(&mut field, &cfg, 2, &mut ConstRng(0), &mut trail, &mut hits).unwrap();

        // 0.9 + 0.3 = 1.2 wraps to -0.8.
        assert_eq!(trail.path.len(), 2);
        assert!((trail.path[1] - Vec2::new(-0.8, 0.0)).length() < 1e-5);
    }

    #[test]
    fn melt_with_zero_probability_changes_nothing() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.0, 0.0, 0)).unwrap();
        field.plant(stem(2, 0.5, 0.0, 3)).unwrap();
        let hits = Binomial::new(30, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        for _ in 0..100 {
            let melted = melt_phase(&mut field, &hits, &mut rng, &mut NullObserver).unwrap();
            assert_eq!(melted, 0);
        }
        assert_eq!(field.get(1).map(|s| s.height), Some(0));
        assert_eq!(field.get(2).map(|s| s.height), Some(3));
        assert_eq!(field.index().len(), 2);
    }

    #[test]
    fn certain_melt_removes_ground_level_stems() {
        let mut field = StemField::new();
        field.plant(stem(1, 0.0, 0.0, 0)).unwrap();
        field.plant(stem(2, 0.5, 0.0, 1)).unwrap();
        let hits = Binomial::new(1, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let mut tally = Tally::default();

        assert_eq!(melt_phase(&mut field, &hits, &mut rng, &mut tally).unwrap(), 1);
        assert!(field.get(1).is_none());
        assert_eq!(field.get(2).map(|s| s.height), Some(0));

        assert_eq!(melt_phase(&mut field, &hits, &mut rng, &mut tally).unwrap(), 1);
        assert!(field.is_empty());
        assert!(field.index().is_empty());
        assert_eq!(tally.melted, 2);
    }
}
