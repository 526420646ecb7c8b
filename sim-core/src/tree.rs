//! Dynamic 2-D k-d tree over stem coordinates.
//!
//! Nodes live in an arena (`Vec<KdNode>`) and refer to their children by
//! index. Removal is lazy: a removed node stays in the arena as a routing
//! point, flagged so queries skip it. [`KdTree::rebalance`] rebuilds the arena
//! from the live entries with median splits, dropping the removed ones.
//!
//! Two live entries never share a coordinate; [`KdTree::insert`] rejects it.

use glam::Vec2;

use crate::{error::IndexError, types::PointId};

/// A coordinate tagged with the stem it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
    pub id: PointId,
    pub pos: Vec2,
}

#[derive(Clone, Debug)]
struct KdNode {
    entry: Entry,
    /// Split axis: 0 for x, 1 for y.
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
    removed: bool,
}

impl KdNode {
    fn new(entry: Entry, axis: usize) -> Self {
        Self {
            entry,
            axis,
            left: None,
            right: None,
            removed: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
    live: usize,
}

impl KdTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of removed entries still occupying arena slots.
    #[inline]
    pub fn removed_len(&self) -> usize {
        self.nodes.len() - self.live
    }

    /// Adds `pos` tagged with `id`.
    ///
    /// ### Errors
    /// - [`IndexError::NonFinite`] if either component is NaN or infinite.
    /// - [`IndexError::Occupied`] if a live entry already sits at `pos`.
    pub fn insert(&mut self, pos: Vec2, id: PointId) -> Result<(), IndexError> {
        if !pos.is_finite() {
            return Err(IndexError::NonFinite { pos });
        }
        if let Some(existing) = self.find(pos) {
            return Err(IndexError::Occupied {
                pos,
                existing: self.nodes[existing].entry.id,
            });
        }

        let new = self.nodes.len();
        let entry = Entry { id, pos };

        let Some(mut cur) = self.root else {
            self.nodes.push(KdNode::new(entry, 0));
            self.root = Some(new);
            self.live += 1;
            return Ok(());
        };

        // Descend to a free child slot; ties go right.
        loop {
            let node = &self.nodes[cur];
            let axis = node.axis;
            let go_left = pos[axis] < node.entry.pos[axis];
            let next = if go_left { node.left } else { node.right };
            match next {
                Some(child) => cur = child,
                None => {
                    let parent = &mut self.nodes[cur];
                    if go_left {
                        parent.left = Some(new);
                    } else {
                        parent.right = Some(new);
                    }
                    self.nodes.push(KdNode::new(entry, (axis + 1) % 2));
                    break;
                }
            }
        }

        self.live += 1;
        Ok(())
    }

    /// Removes the live entry at exactly `pos`, returning its identifier.
    ///
    /// ### Errors
    /// [`IndexError::Missing`] if no live entry sits at `pos`.
    pub fn remove(&mut self, pos: Vec2) -> Result<PointId, IndexError> {
        let idx = self.find(pos).ok_or(IndexError::Missing { pos })?;
        let node = &mut self.nodes[idx];
        node.removed = true;
        let id = node.entry.id;
        self.live -= 1;

        if self.live == 0 {
            self.clear();
        }
        Ok(id)
    }

    /// Identifier of the live entry at exactly `pos`, if any.
    pub fn get(&self, pos: Vec2) -> Option<PointId> {
        self.find(pos).map(|idx| self.nodes[idx].entry.id)
    }

    /// Appends every live entry within squared distance `radius_sq` of `pos` to `out`.
    ///
    /// `out` is not cleared, so several queries can be merged into one buffer.
    /// Order is unspecified. An empty tree appends nothing.
    pub fn query_within(&self, pos: Vec2, radius_sq: f32, out: &mut Vec<Entry>) {
        let Some(root) = self.root else {
            return;
        };

        let mut stack = Vec::with_capacity(32);
        stack.push(root);
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.removed && node.entry.pos.distance_squared(pos) <= radius_sq {
                out.push(node.entry);
            }

            let d = pos[node.axis] - node.entry.pos[node.axis];
            let (near, far) = if d < 0.0 {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };
            if let Some(far) = far
                && d * d <= radius_sq
            {
                stack.push(far);
            }
            if let Some(near) = near {
                stack.push(near);
            }
        }
    }

    /// Convenience wrapper around [`KdTree::query_within`] returning a fresh vector.
    pub fn within(&self, pos: Vec2, radius_sq: f32) -> Vec<Entry> {
        let mut out = Vec::new();
        self.query_within(pos, radius_sq, &mut out);
        out
    }

    /// Iterates over live entries in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.nodes.iter().filter(|n| !n.removed).map(|n| &n.entry)
    }

    /// Length of the longest root-to-leaf path, counting removed routing nodes.
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut deepest = 0;
        let mut stack = vec![(root, 1)];
        while let Some((idx, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.nodes[idx];
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    /// Rebuilds the tree from its live entries with median splits.
    ///
    /// Logical content is unchanged; removed entries are discarded and the
    /// depth drops to `ceil(log2(len + 1))`.
    pub fn rebalance(&mut self) {
        let mut entries: Vec<Entry> = self.iter().copied().collect();
        self.clear();
        self.nodes.reserve(entries.len());
        self.root = self.build(&mut entries, 0);
        self.live = entries.len();
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.live = 0;
    }

    fn build(&mut self, entries: &mut [Entry], axis: usize) -> Option<usize> {
        if entries.is_empty() {
            return None;
        }

        let mid = entries.len() / 2;
        entries.select_nth_unstable_by(mid, |a, b| a.pos[axis].total_cmp(&b.pos[axis]));

        let idx = self.nodes.len();
        self.nodes.push(KdNode::new(entries[mid], axis));

        let (lower, rest) = entries.split_at_mut(mid);
        let upper = &mut rest[1..];
        let next = (axis + 1) % 2;
        let left = self.build(lower, next);
        let right = self.build(upper, next);

        let node = &mut self.nodes[idx];
        node.left = left;
        node.right = right;
        Some(idx)
    }

    /// Arena index of the live node at exactly `pos`.
    ///
    /// Median rebuilds can leave entries equal to a split value on either
    /// side, so both subtrees are searched on a tie.
    fn find(&self, pos: Vec2) -> Option<usize> {
        let mut stack = vec![self.root?];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.removed && node.entry.pos == pos {
                return Some(idx);
            }

            let d = pos[node.axis] - node.entry.pos[node.axis];
            if d <= 0.0
                && let Some(left) = node.left
            {
                stack.push(left);
            }
            if d >= 0.0
                && let Some(right) = node.right
            {
                stack.push(right);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn brute_force(points: &[Entry], pos: Vec2, radius_sq: f32) -> Vec<PointId> {
        let mut ids: Vec<PointId> = points
            .iter()
            .filter(|e| e.pos.distance_squared(pos) <= radius_sq)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn sorted_ids(entries: &[Entry]) -> Vec<PointId> {
        let mut ids: Vec<PointId> = entries.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn empty_tree_queries_return_nothing() {
        let mut tree = KdTree::new();
        assert!(tree.within(Vec2::ZERO, 10.0).is_empty());
        assert_eq!(tree.depth(), 0);

        tree.rebalance();
        assert!(tree.is_empty());
        assert!(tree.within(Vec2::new(0.3, 0.3), 1.0).is_empty());
    }

    #[test]
    fn insert_then_query_finds_points_within_radius() {
        let mut tree = KdTree::new();
        tree.insert(Vec2::new(0.0, 0.0), 1).unwrap();
        tree.insert(Vec2::new(0.5, 0.0), 2).unwrap();
        tree.insert(Vec2::new(0.0, 0.9), 3).unwrap();

        let hits = tree.within(Vec2::new(0.1, 0.0), 0.2 * 0.2);
        assert_eq!(sorted_ids(&hits), vec![1]);

        // The boundary is inclusive.
        let hits = tree.within(Vec2::new(0.0, 0.0), 0.25);
        assert_eq!(sorted_ids(&hits), vec![1, 2]);
    }

    #[test]
    fn duplicate_coordinate_is_rejected() {
        let mut tree = KdTree::new();
        let p = Vec2::new(0.25, -0.5);
        tree.insert(p, 10).unwrap();

        assert_eq!(
            tree.insert(p, 11),
            Err(IndexError::Occupied { pos: p, existing: 10 })
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn non_finite_coordinate_is_rejected() {
        let mut tree = KdTree::new();
        let p = Vec2::new(f32::NAN, 0.0);
        assert!(matches!(tree.insert(p, 1), Err(IndexError::NonFinite { .. })));
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_missing_coordinate_is_an_error() {
        let mut tree = KdTree::new();
        assert!(matches!(
            tree.remove(Vec2::ZERO),
            Err(IndexError::Missing { .. })
        ));

        tree.insert(Vec2::new(0.1, 0.1), 1).unwrap();
        assert!(tree.remove(Vec2::new(0.1, 0.2)).is_err());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn removed_points_are_never_returned() {
        let mut tree = KdTree::new();
        tree.insert(Vec2::new(0.0, 0.0), 1).unwrap();
        tree.insert(Vec2::new(0.01, 0.0), 2).unwrap();

        assert_eq!(tree.remove(Vec2::new(0.0, 0.0)), Ok(1));
        assert_eq!(sorted_ids(&tree.within(Vec2::ZERO, 1.0)), vec![2]);
        assert_eq!(tree.removed_len(), 1);

        // The freed coordinate can be reused.
        tree.insert(Vec2::new(0.0, 0.0), 3).unwrap();
        assert_eq!(sorted_ids(&tree.within(Vec2::ZERO, 1.0)), vec![2, 3]);
        assert_eq!(tree.get(Vec2::ZERO), Some(3));
    }

    #[test]
    fn removing_the_last_point_empties_the_arena() {
        let mut tree = KdTree::new();
        tree.insert(Vec2::new(0.4, 0.4), 1).unwrap();
        tree.remove(Vec2::new(0.4, 0.4)).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.removed_len(), 0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn rebalance_preserves_content_and_shrinks_depth() {
        let mut tree = KdTree::new();
        // Sorted inserts degenerate into a path.
        for i in 0..127u64 {
            tree.insert(Vec2::new(i as f32 * 0.01, i as f32 * 0.01), i).unwrap();
        }
        assert_eq!(tree.depth(), 127);

        let before = sorted_ids(&tree.within(Vec2::new(0.5, 0.5), 0.05));
        tree.rebalance();
        let after = sorted_ids(&tree.within(Vec2::new(0.5, 0.5), 0.05));

        assert_eq!(before, after);
        assert_eq!(tree.len(), 127);
        assert_eq!(tree.depth(), 7);
    }

    #[test]
    fn rebalance_drops_removed_entries() {
        let mut tree = KdTree::new();
        for i in 0..10u64 {
            tree.insert(Vec2::new(i as f32 * 0.1 - 0.5, 0.0), i).unwrap();
        }
        for i in 0..5u64 {
            tree.remove(Vec2::new(i as f32 * 0.1 - 0.5, 0.0)).unwrap();
        }
        assert_eq!(tree.removed_len(), 5);

        tree.rebalance();
        assert_eq!(tree.removed_len(), 0);
        assert_eq!(tree.len(), 5);
        let ids: Vec<PointId> = {
            let mut ids: Vec<PointId> = tree.iter().map(|e| e.id).collect();
            ids.sort_unstable();
            ids
        };
        assert_eq!(ids, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn equal_split_values_are_found_after_rebalance() {
        let mut tree = KdTree::new();
        // Many points sharing an x value straddle the median split.
        for i in 0..9u64 {
            tree.insert(Vec2::new(0.0, i as f32 * 0.1), i).unwrap();
        }
        tree.rebalance();
        for i in 0..9u64 {
            let p = Vec2::new(0.0, i as f32 * 0.1);
            assert_eq!(tree.get(p), Some(i));
        }
        for i in 0..9u64 {
            assert_eq!(tree.remove(Vec2::new(0.0, i as f32 * 0.1)), Ok(i));
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn matches_brute_force_under_random_churn() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = KdTree::new();
        let mut live: Vec<Entry> = Vec::new();

        for id in 0..3000u64 {
            let remove = !live.is_empty() && rng.random_bool(0.4);
            if remove {
                let victim = live.swap_remove(rng.random_range(0..live.len()));
                assert_eq!(tree.remove(victim.pos), Ok(victim.id));
            } else {
                let pos = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
                tree.insert(pos, id).unwrap();
                live.push(Entry { id, pos });
            }

            if id % 500 == 0 {
                tree.rebalance();
            }

            if id % 50 == 0 {
                let q = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
                let r2 = rng.random_range(0.0..0.1f32);
                assert_eq!(sorted_ids(&tree.within(q, r2)), brute_force(&live, q, r2));
            }
        }
        assert_eq!(tree.len(), live.len());
    }
}
