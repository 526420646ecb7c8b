//! The simulation driver: state, randomness and the step loop.
//!
//! A [`Simulation`] owns everything one run needs: the validated
//! [`Config`], the [`StemField`], the step counter, a single random stream
//! and an optional [`Observer`]. Each [`Simulation::step`] is resolved
//! completely before it returns, so the state between steps is always
//! consistent. Independent runs share nothing and can live on separate threads.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::Binomial;
use tracing::{debug, trace};

use crate::{
    config::Config,
    error::{ConfigError, SimError},
    observer::{NullObserver, Observer},
    phases::{self, Landing},
    snapshot::Snapshot,
    stem::StemField,
    tree::Entry,
    types::PointId,
};

/// Steps between index rebuilds.
pub const REBALANCE_INTERVAL: u64 = 600;

/// What a single step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// Value of the step counter while this step ran.
    pub step: PointId,
    pub landing: Landing,
    /// Stems removed by this step's melt pass, if one ran.
    pub melted: usize,
}

pub struct Simulation<O = NullObserver, R = StdRng> {
    cfg: Config,
    field: StemField,
    steps_completed: u64,
    melt_hits: Binomial,
    rng: R,
    observer: O,
    hits: Vec<Entry>,
}

impl Simulation {
    /// Creates an empty simulation whose random stream is seeded with `seed`.
    ///
    /// ### Errors
    /// [`SimError::Config`] if `cfg` fails [`Config::validate`].
    pub fn new(cfg: Config, seed: u64) -> Result<Self, SimError> {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Simulation<NullObserver, R> {
    /// Creates an empty simulation drawing from `rng`.
    pub fn with_rng(cfg: Config, rng: R) -> Result<Self, SimError> {
        cfg.validate()?;
        let melt_hits = Binomial::new(u64::from(cfg.melt_interval), cfg.melt_probability)
            .map_err(|e| ConfigError::MeltDistribution(e.to_string()))?;

        Ok(Self {
            cfg,
            field: StemField::new(),
            steps_completed: 0,
            melt_hits,
            rng,
            observer: NullObserver,
            hits: Vec::with_capacity(16),
        })
    }
}

impl<O, R> Simulation<O, R> {
    /// Replaces the observer, keeping all simulation state.
    pub fn with_observer<P: Observer>(self, observer: P) -> Simulation<P, R> {
        Simulation {
            cfg: self.cfg,
            field: self.field,
            steps_completed: self.steps_completed,
            melt_hits: self.melt_hits,
            rng: self.rng,
            observer,
            hits: self.hits,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn steps_completed(&self) -> u64 {
        self.steps_completed
    }

    pub fn field(&self) -> &StemField {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }

    pub fn max_height(&self) -> Option<u32> {
        self.field.max_height()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Owned copy of every live stem.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_field(&self.field, self.steps_completed)
    }

    /// Verifies that the index and the stem table agree.
    pub fn check_consistency(&self) -> Result<(), SimError> {
        self.field.check_consistency()
    }
}

impl<O: Observer, R: Rng> Simulation<O, R> {
    /// Advances the simulation by exactly one drop.
    ///
    /// The step:
    /// 1. Rebuilds the index every [`REBALANCE_INTERVAL`] steps.
    /// 2. Runs [`phases::drop_phase`]; a created stem takes the current step
    ///    counter as its identifier.
    /// 3. Runs [`phases::melt_phase`] when the counter is a multiple of the
    ///    melt interval.
    /// 4. Increments the step counter.
    ///
    /// ### Errors
    /// Any [`SimError`] means the stem table and the index disagreed; the
    /// run should not continue.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        let step = self.steps_completed;

        if !self.field.is_empty() && step % REBALANCE_INTERVAL == 0 {
            let depth_before = self.field.index().depth();
            let removed = self.field.index().removed_len();
            self.field.rebalance();
            debug!(
                step,
                stems = self.field.len(),
                removed,
                depth_before,
                depth_after = self.field.index().depth(),
                "Rebalanced stem index"
            );
        }

        let landing = phases::drop_phase(
            &mut self.field,
            &self.cfg,
            step,
            &mut self.rng,
            &mut self.observer,
            &mut self.hits,
        )?;
        trace!(step, ?landing, "Drop resolved");

        let melted = if step % u64::from(self.cfg.melt_interval) == 0 {
            let melted = phases::melt_phase(
                &mut self.field,
                &self.melt_hits,
                &mut self.rng,
                &mut self.observer,
            )?;
            if melted > 0 {
                debug!(step, melted, remaining = self.field.len(), "Melt pass");
            }
            melted
        } else {
            0
        };

        self.steps_completed += 1;
        Ok(StepReport {
            step,
            landing,
            melted,
        })
    }

    /// Runs `steps` steps, stopping at the first error.
    pub fn run(&mut self, steps: u64) -> Result<(), SimError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }
}
