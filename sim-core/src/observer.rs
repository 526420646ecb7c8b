//! Notification hooks for renderers and statistics collectors.
//!
//! An [`Observer`] is handed to a [`crate::simulation::Simulation`] when it
//! is built and receives copies of what each step touched. Hooks cannot
//! steer the simulation; a run produces the same stems with or without one.

use glam::Vec2;

use crate::{phases::Landing, stem::Stem, types::PointId};

/// Receives per-drop events. Every method defaults to doing nothing.
pub trait Observer {
    /// A new drop was placed at `pos`.
    fn drop_sampled(&mut self, _pos: Vec2) {}

    /// The drop bounced off stem `from` and now sits at `pos`.
    fn drop_bounced(&mut self, _from: PointId, _pos: Vec2) {}

    /// The drop's fate was decided at `pos`.
    fn drop_landed(&mut self, _landing: &Landing, _pos: Vec2) {}

    /// A melt pass lowered `stem` below zero and removed it.
    fn stem_melted(&mut self, _stem: &Stem) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Remembers the path and fate of the most recent drop.
///
/// Reset at the start of every step, so after a step it describes exactly
/// that step: where the drop fell, every bounce, how it ended, and which
/// stems melted.
#[derive(Clone, Debug, Default)]
pub struct DropTrail {
    pub path: Vec<Vec2>,
    pub landing: Option<Landing>,
    pub melted: Vec<Stem>,
}

impl Observer for DropTrail {
    fn drop_sampled(&mut self, pos: Vec2) {
        self.path.clear();
        self.melted.clear();
        self.landing = None;
        self.path.push(pos);
    }

    fn drop_bounced(&mut self, _from: PointId, pos: Vec2) {
        self.path.push(pos);
    }

    fn drop_landed(&mut self, landing: &Landing, _pos: Vec2) {
        self.landing = Some(*landing);
    }

    fn stem_melted(&mut self, stem: &Stem) {
        self.melted.push(*stem);
    }
}

/// Running totals of drop outcomes over a whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub drops: u64,
    pub bounces: u64,
    pub grounded: u64,
    pub stacked: u64,
    pub discarded: u64,
    pub melted: u64,
}

impl Observer for Tally {
    fn drop_sampled(&mut self, _pos: Vec2) {
        self.drops += 1;
    }

    fn drop_bounced(&mut self, _from: PointId, _pos: Vec2) {
        self.bounces += 1;
    }

    fn drop_landed(&mut self, landing: &Landing, _pos: Vec2) {
        match landing {
            Landing::Discarded { .. } => self.discarded += 1,
            Landing::Grounded { .. } => self.grounded += 1,
            Landing::Stacked { .. } => self.stacked += 1,
        }
    }

    fn stem_melted(&mut self, _stem: &Stem) {
        self.melted += 1;
    }
}
