use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::{
    core::types::Aabb,
    utils::allocator::{ArenaId, ColliderHandle},
};

/// Collider proxy handed to the broad-phase each step.
#[derive(Debug, Clone, Copy)]
pub struct BroadPhaseProxy {
    pub handle: ColliderHandle,
    pub aabb: Aabb,
    /// Unbounded shapes (planes) skip the grid and are paired with everything.
    pub bounded: bool,
}

/// Uniform grid spatial partitioning used by the broad-phase.
pub struct SpatialGrid {
    cell_size: f32,
    grid: HashMap<(i32, i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            grid: HashMap::new(),
        }
    }

    fn world_to_grid(&self, pos: Vec3) -> (i32, i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    fn cells(&self, aabb: &Aabb) -> impl Iterator<Item = (i32, i32, i32)> {
        let min_cell = self.world_to_grid(aabb.min);
        let max_cell = self.world_to_grid(aabb.max);
        (min_cell.0..=max_cell.0).flat_map(move |x| {
            (min_cell.1..=max_cell.1)
                .flat_map(move |y| (min_cell.2..=max_cell.2).map(move |z| (x, y, z)))
        })
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }

    pub fn insert(&mut self, slot: usize, aabb: &Aabb) {
        let cells: Vec<_> = self.cells(aabb).collect();
        for cell in cells {
            self.grid.entry(cell).or_default().push(slot);
        }
    }

    pub fn query(&self, aabb: &Aabb) -> Vec<usize> {
        let mut results = Vec::new();
        for cell in self.cells(aabb) {
            if let Some(slots) = self.grid.get(&cell) {
                results.extend(slots);
            }
        }
        results.sort_unstable();
        results.dedup();
        results
    }
}

/// Broad phase driver returning potential collider pairs.
pub struct BroadPhase {
    grid: SpatialGrid,
}

impl BroadPhase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: SpatialGrid::new(cell_size),
        }
    }

    /// Pairs whose bounding boxes overlap, each reported once with the lower handle first.
    pub fn potential_pairs(&mut self, proxies: &[BroadPhaseProxy]) -> Vec<(ColliderHandle, ColliderHandle)> {
        self.grid.clear();
        for (slot, proxy) in proxies.iter().enumerate() {
            if proxy.bounded {
                self.grid.insert(slot, &proxy.aabb);
            }
        }

        let mut pairs = Vec::new();
        let mut checked = HashSet::new();
        let mut push = |a: &BroadPhaseProxy, b: &BroadPhaseProxy| {
            if a.handle == b.handle {
                return;
            }
            let key = if a.handle.index() < b.handle.index() {
                (a.handle, b.handle)
            } else {
                (b.handle, a.handle)
            };
            if checked.insert((key.0.index(), key.1.index())) {
                pairs.push(key);
            }
        };

        for proxy in proxies.iter().filter(|p| p.bounded) {
            for other in self.grid.query(&proxy.aabb) {
                let other = &proxies[other];
                if proxy.aabb.intersects(&other.aabb) {
                    push(proxy, other);
                }
            }
        }
        for plane in proxies.iter().filter(|p| !p.bounded) {
            for other in proxies.iter().filter(|p| p.bounded) {
                push(plane, other);
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(index: usize, center: Vec3, bounded: bool) -> BroadPhaseProxy {
        BroadPhaseProxy {
            handle: ColliderHandle::new(index, 0),
            aabb: Aabb::from_center(center, Vec3::splat(0.5)),
            bounded,
        }
    }

    #[test]
    fn reports_overlapping_pairs_once() {
        let proxies = [
            proxy(0, Vec3::ZERO, true),
            proxy(1, Vec3::new(0.8, 0.0, 0.0), true),
            proxy(2, Vec3::new(10.0, 0.0, 0.0), true),
        ];
        let mut bp = BroadPhase::new(1.0);
        let pairs = bp.potential_pairs(&proxies);
        assert_eq!(pairs, vec![(ColliderHandle::new(0, 0), ColliderHandle::new(1, 0))]);
    }

    #[test]
    fn planes_pair_with_every_bounded_proxy() {
        let proxies = [
            proxy(0, Vec3::ZERO, false),
            proxy(1, Vec3::new(5.0, 0.0, 0.0), true),
            proxy(2, Vec3::new(-50.0, 0.0, 0.0), true),
            proxy(3, Vec3::ZERO, false),
        ];
        let mut bp = BroadPhase::new(1.0);
        assert_eq!(bp.potential_pairs(&proxies).len(), 4);
    }
}
