//! Stems and the field that owns them.
//!
//! [`StemField`] pairs the stem table (identifier → [`Stem`]) with the
//! [`KdTree`] over stem coordinates. Every mutation goes through methods that
//! update both sides together, so the index always holds exactly the
//! coordinates of the stems in the table.

use std::collections::BTreeMap;

use glam::Vec2;

use crate::{
    error::SimError,
    geometry,
    tree::{Entry, KdTree},
    types::PointId,
};

/// A stem: the top drop of a column that has stuck to the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stem {
    pub id: PointId,
    pub pos: Vec2,
    pub height: u32,
}

#[derive(Clone, Debug, Default)]
pub struct StemField {
    stems: BTreeMap<PointId, Stem>,
    index: KdTree,
}

impl StemField {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn get(&self, id: PointId) -> Option<&Stem> {
        self.stems.get(&id)
    }

    /// Iterates over stems in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Stem> + '_ {
        self.stems.values()
    }

    pub fn ids(&self) -> Vec<PointId> {
        self.stems.keys().copied().collect()
    }

    pub fn index(&self) -> &KdTree {
        &self.index
    }

    pub fn max_height(&self) -> Option<u32> {
        self.stems.values().map(|s| s.height).max()
    }

    /// Adds a stem to both the table and the index.
    ///
    /// Nothing is modified if either side refuses the stem.
    pub fn plant(&mut self, stem: Stem) -> Result<(), SimError> {
        if self.stems.contains_key(&stem.id) {
            return Err(SimError::DuplicateId(stem.id));
        }
        self.index.insert(stem.pos, stem.id)?;
        self.stems.insert(stem.id, stem);
        Ok(())
    }

    /// Removes a stem from both the table and the index, returning it.
    pub fn uproot(&mut self, id: PointId) -> Result<Stem, SimError> {
        let stem = self
            .stems
            .get(&id)
            .copied()
            .ok_or(SimError::MissingStem(id))?;

        let indexed = self.index.remove(stem.pos)?;
        if indexed != id {
            return Err(SimError::OrphanedEntry(indexed));
        }
        self.stems.remove(&id);
        Ok(stem)
    }

    /// Lowers a stem by `amount`, removing it if its height would go negative.
    ///
    /// Returns the removed stem (with its height before this call) when the
    /// stem melted away, or `None` if it survived.
    pub fn erode(&mut self, id: PointId, amount: u64) -> Result<Option<Stem>, SimError> {
        let height = self
            .stems
            .get(&id)
            .map(|s| s.height)
            .ok_or(SimError::MissingStem(id))?;

        let remaining = u32::try_from(amount)
            .ok()
            .and_then(|amount| height.checked_sub(amount));

        match remaining {
            Some(rest) => {
                if let Some(stem) = self.stems.get_mut(&id) {
                    stem.height = rest;
                }
                Ok(None)
            }
            None => self.uproot(id).map(Some),
        }
    }

    /// Appends index entries touching a drop at `pos` to `out`.
    ///
    /// With `periodic` set, the eight toroidal images of `pos` are searched
    /// too, so stems across an edge are found. An entry may then appear more
    /// than once.
    pub fn touching(&self, pos: Vec2, radius_sq: f32, periodic: bool, out: &mut Vec<Entry>) {
        self.index.query_within(pos, radius_sq, out);
        if periodic {
            for image in geometry::periodic_images(pos) {
                self.index.query_within(image, radius_sq, out);
            }
        }
    }

    /// Picks the tallest stem among `hits`.
    ///
    /// Ties on height go to the smallest identifier, independent of the order
    /// the index returned the hits in.
    pub fn tallest(&self, hits: &[Entry]) -> Result<Option<Stem>, SimError> {
        let mut best: Option<Stem> = None;
        for hit in hits {
            let stem = *self
                .stems
                .get(&hit.id)
                .ok_or(SimError::OrphanedEntry(hit.id))?;
            if stem.pos != hit.pos {
                return Err(SimError::PositionMismatch {
                    id: hit.id,
                    indexed: hit.pos,
                    stored: stem.pos,
                });
            }

            let better = best.is_none_or(|b| {
                stem.height > b.height || (stem.height == b.height && stem.id < b.id)
            });
            if better {
                best = Some(stem);
            }
        }
        Ok(best)
    }

    /// Restructures the index for query speed; content is unchanged.
    pub fn rebalance(&mut self) {
        self.index.rebalance();
    }

    /// Verifies that the index and the table describe the same stems.
    pub fn check_consistency(&self) -> Result<(), SimError> {
        if self.index.len() != self.stems.len() {
            return Err(SimError::CountMismatch {
                indexed: self.index.len(),
                stored: self.stems.len(),
            });
        }
        for entry in self.index.iter() {
            let stem = self
                .stems
                .get(&entry.id)
                .ok_or(SimError::OrphanedEntry(entry.id))?;
            if stem.pos != entry.pos {
                return Err(SimError::PositionMismatch {
                    id: entry.id,
                    indexed: entry.pos,
                    stored: stem.pos,
                });
            }
        }
        Ok(())
    }
}
