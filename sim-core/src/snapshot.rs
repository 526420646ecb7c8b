//! Read-only output of a run, for statistics and rendering.

use serde::{Deserialize, Serialize};

use crate::{stem::StemField, types::PointId};

/// One live stem as handed to downstream tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StemRecord {
    pub id: PointId,
    pub coord: [f32; 2],
    pub height: u32,
}

/// All stems alive after `steps_completed` steps, ordered by identifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub steps_completed: u64,
    pub stems: Vec<StemRecord>,
}

impl Snapshot {
    pub fn from_field(field: &StemField, steps_completed: u64) -> Self {
        let stems = field
            .iter()
            .map(|s| StemRecord {
                id: s.id,
                coord: s.pos.to_array(),
                height: s.height,
            })
            .collect();
        Self {
            steps_completed,
            stems,
        }
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn max_height(&self) -> Option<u32> {
        self.stems.iter().map(|s| s.height).max()
    }

    /// Stems at least half as tall as the tallest one.
    pub fn tall_stems(&self) -> impl Iterator<Item = &StemRecord> + '_ {
        let max = self.max_height().unwrap_or(0);
        self.stems.iter().filter(move |s| is_tall(s.height, max))
    }
}

/// `true` if `height` is at least half of `max_height`.
#[inline]
pub fn is_tall(height: u32, max_height: u32) -> bool {
    u64::from(height) * 2 >= u64::from(max_height)
}
