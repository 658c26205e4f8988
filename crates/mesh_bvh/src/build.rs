//! SAH construction
//!
//! Split selection tries all 3 axes and keeps the boundary with the lowest
//! surface-area-weighted cost. Nodes larger than `BIN_SPLIT_THRESHOLD`
//! triangles use 64 spatial bins; smaller nodes get the exact sorted sweep.
//! A node becomes a leaf when no split beats keeping it whole
//! (`min_cost >= n`).

use crate::triangle::Triangle;
use crate::{Bvh, Node};
use glam::Vec3;
use math_util::Aabb;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

const BIN_COUNT: usize = 64;
const BIN_SPLIT_THRESHOLD: usize = 64;
/// Below this size a subtree is not worth a fork.
const PARALLEL_MIN_TRIANGLES: usize = 1024;

pub fn build(positions: &[Vec3], indices: &[u32], max_threads: usize) -> Bvh {
    let triangles: Vec<Triangle> = indices
        .chunks_exact(3)
        .map(|tri| {
            Triangle::new(
                positions[tri[0] as usize],
                positions[tri[1] as usize],
                positions[tri[2] as usize],
            )
        })
        .collect();

    if triangles.is_empty() {
        return Bvh {
            nodes: Vec::new(),
            tri_order: Vec::new(),
            triangles,
        };
    }

    let idx: Vec<u32> = (0..triangles.len() as u32).collect();
    let budget = AtomicI32::new(max_threads as i32);
    let (nodes, tri_order) = build_subtree(&triangles, idx, &budget);
    log::trace!(
        "bvh built: {} triangles, {} nodes",
        triangles.len(),
        nodes.len()
    );
    Bvh {
        nodes,
        tri_order,
        triangles,
    }
}

/// Recursive phase: forks one worker per subtree while the shared budget
/// lasts, then hands the remainder to the explicit-stack build.
fn build_subtree(
    tris: &[Triangle],
    idx: Vec<u32>,
    budget: &AtomicI32,
) -> (Vec<Node>, Vec<u32>) {
    if idx.len() >= PARALLEL_MIN_TRIANGLES && budget.fetch_sub(1, Ordering::AcqRel) > 0 {
        let aabb = bounds_of(tris, &idx);
        match find_split(tris, &idx, &aabb) {
            None => leaf_arena(aabb, idx),
            Some((left, right)) => {
                let (l, r) = thread::scope(|s| {
                    let worker = s.spawn(|| build_subtree(tris, right, budget));
                    let l = build_subtree(tris, left, budget);
                    (l, worker.join().expect("bvh build worker panicked"))
                });
                merge_arenas(aabb, l, r)
            }
        }
    } else {
        build_iterative(tris, idx)
    }
}

/// Explicit-stack build for when the thread budget is spent.
fn build_iterative(tris: &[Triangle], idx: Vec<u32>) -> (Vec<Node>, Vec<u32>) {
    let mut nodes = vec![placeholder()];
    let mut order: Vec<u32> = Vec::with_capacity(idx.len());
    let mut stack: Vec<(usize, Vec<u32>)> = vec![(0, idx)];

    while let Some((slot, idx)) = stack.pop() {
        let aabb = bounds_of(tris, &idx);
        match find_split(tris, &idx, &aabb) {
            None => {
                nodes[slot] = Node {
                    aabb,
                    first_or_left: order.len() as u32,
                    right: 0,
                    count: idx.len() as u32,
                };
                order.extend(idx);
            }
            Some((left, right)) => {
                let li = nodes.len();
                nodes.push(placeholder());
                let ri = nodes.len();
                nodes.push(placeholder());
                nodes[slot] = Node {
                    aabb,
                    first_or_left: li as u32,
                    right: ri as u32,
                    count: 0,
                };
                stack.push((ri, right));
                stack.push((li, left));
            }
        }
    }

    (nodes, order)
}

fn placeholder() -> Node {
    Node {
        aabb: Aabb::empty(),
        first_or_left: 0,
        right: 0,
        count: 0,
    }
}

fn leaf_arena(aabb: Aabb, idx: Vec<u32>) -> (Vec<Node>, Vec<u32>) {
    let node = Node {
        aabb,
        first_or_left: 0,
        right: 0,
        count: idx.len() as u32,
    };
    (vec![node], idx)
}

/// Stitch two independently built child arenas under a fresh root, fixing
/// node and triangle-order offsets.
fn merge_arenas(
    aabb: Aabb,
    (left_nodes, left_order): (Vec<Node>, Vec<u32>),
    (right_nodes, right_order): (Vec<Node>, Vec<u32>),
) -> (Vec<Node>, Vec<u32>) {
    let mut nodes = Vec::with_capacity(1 + left_nodes.len() + right_nodes.len());
    let left_base = 1u32;
    let right_base = 1 + left_nodes.len() as u32;
    nodes.push(Node {
        aabb,
        first_or_left: left_base,
        right: right_base,
        count: 0,
    });

    let append = |nodes: &mut Vec<Node>, child: Vec<Node>, node_base: u32, tri_base: u32| {
        for mut node in child {
            if node.is_leaf() {
                node.first_or_left += tri_base;
            } else {
                node.first_or_left += node_base;
                node.right += node_base;
            }
            nodes.push(node);
        }
    };
    append(&mut nodes, left_nodes, left_base, 0);
    append(&mut nodes, right_nodes, right_base, left_order.len() as u32);

    let mut order = left_order;
    order.extend(right_order);
    (nodes, order)
}

fn bounds_of(tris: &[Triangle], idx: &[u32]) -> Aabb {
    let mut aabb = Aabb::empty();
    for &i in idx {
        aabb.expand_aabb(&tris[i as usize].aabb);
    }
    aabb
}

/// Best SAH split, or `None` when keeping the node whole is cheaper.
fn find_split(tris: &[Triangle], idx: &[u32], node_aabb: &Aabb) -> Option<(Vec<u32>, Vec<u32>)> {
    let n = idx.len();
    if n < 2 {
        return None;
    }
    if n > BIN_SPLIT_THRESHOLD {
        binned_split(tris, idx, node_aabb)
    } else {
        sorted_split(tris, idx, node_aabb)
    }
}

/// Binned SAH: 64 spatial bins per axis over the centroid extent.
fn binned_split(tris: &[Triangle], idx: &[u32], node_aabb: &Aabb) -> Option<(Vec<u32>, Vec<u32>)> {
    let n = idx.len();
    let node_area = node_aabb.surface_area().max(f32::EPSILON);

    // Centroid bounds drive the binning, not the node bounds.
    let mut cbounds = Aabb::empty();
    for &i in idx {
        cbounds.expand_point(tris[i as usize].centroid());
    }

    let mut best_cost = f32::INFINITY;
    let mut best: Option<(usize, usize)> = None; // (axis, boundary bin)

    for axis in 0..3 {
        let lo = cbounds.min[axis];
        let extent = cbounds.max[axis] - lo;
        if extent <= f32::EPSILON {
            continue;
        }
        let scale = BIN_COUNT as f32 / extent;

        let mut bin_counts = [0usize; BIN_COUNT];
        let mut bin_bounds = [Aabb::empty(); BIN_COUNT];
        for &i in idx {
            let t = &tris[i as usize];
            let b = bin_of(t.centroid()[axis], lo, scale);
            bin_counts[b] += 1;
            bin_bounds[b].expand_aabb(&t.aabb);
        }

        // Suffix pass: bounds/count of everything right of each boundary.
        let mut right_area = [0.0f32; BIN_COUNT];
        let mut right_count = [0usize; BIN_COUNT];
        let mut acc = Aabb::empty();
        let mut count = 0;
        for b in (1..BIN_COUNT).rev() {
            acc.expand_aabb(&bin_bounds[b]);
            count += bin_counts[b];
            right_area[b] = if count > 0 { acc.surface_area() } else { 0.0 };
            right_count[b] = count;
        }

        // Prefix sweep over boundaries.
        let mut left = Aabb::empty();
        let mut left_count = 0usize;
        for boundary in 1..BIN_COUNT {
            left.expand_aabb(&bin_bounds[boundary - 1]);
            left_count += bin_counts[boundary - 1];
            let rc = right_count[boundary];
            if left_count == 0 || rc == 0 {
                continue;
            }
            let cost = (left.surface_area() * left_count as f32
                + right_area[boundary] * rc as f32)
                / node_area;
            if cost < best_cost {
                best_cost = cost;
                best = Some((axis, boundary));
            }
        }
    }

    let (axis, boundary) = best?;
    if best_cost >= n as f32 {
        return None;
    }

    let lo = cbounds.min[axis];
    let scale = BIN_COUNT as f32 / (cbounds.max[axis] - lo);
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in idx {
        if bin_of(tris[i as usize].centroid()[axis], lo, scale) < boundary {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    debug_assert!(!left.is_empty() && !right.is_empty());
    Some((left, right))
}

#[inline]
fn bin_of(value: f32, lo: f32, scale: f32) -> usize {
    (((value - lo) * scale) as usize).min(BIN_COUNT - 1)
}

/// Exact SAH: sort by centroid per axis and sweep every boundary.
fn sorted_split(tris: &[Triangle], idx: &[u32], node_aabb: &Aabb) -> Option<(Vec<u32>, Vec<u32>)> {
    let n = idx.len();
    let node_area = node_aabb.surface_area().max(f32::EPSILON);

    let mut best_cost = f32::INFINITY;
    let mut best: Option<(usize, usize)> = None; // (axis, split position)
    let mut best_sorted: Vec<u32> = Vec::new();

    let mut sorted: Vec<u32> = idx.to_vec();
    let mut right_area = vec![0.0f32; n];

    for axis in 0..3 {
        sorted.sort_by(|&a, &b| {
            let ca = tris[a as usize].centroid()[axis];
            let cb = tris[b as usize].centroid()[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });

        // Suffix areas so the sweep below is a single forward pass.
        let mut acc = Aabb::empty();
        for i in (1..n).rev() {
            acc.expand_aabb(&tris[sorted[i] as usize].aabb);
            right_area[i] = acc.surface_area();
        }

        let mut left = Aabb::empty();
        for split in 1..n {
            left.expand_aabb(&tris[sorted[split - 1] as usize].aabb);
            let cost = (left.surface_area() * split as f32
                + right_area[split] * (n - split) as f32)
                / node_area;
            if cost < best_cost {
                best_cost = cost;
                best = Some((axis, split));
            }
        }

        if matches!(best, Some((a, _)) if a == axis) {
            best_sorted.clone_from(&sorted);
        }
    }

    let (_, split) = best?;
    if best_cost >= n as f32 {
        return None;
    }
    let right = best_sorted.split_off(split);
    Some((best_sorted, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_grid(count: usize) -> (Vec<Vec3>, Vec<u32>) {
        // `count` unit quads spread along X.
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for q in 0..count {
            let x = q as f32 * 2.0;
            let base = positions.len() as u32;
            positions.push(Vec3::new(x, 0.0, 0.0));
            positions.push(Vec3::new(x + 1.0, 0.0, 0.0));
            positions.push(Vec3::new(x + 1.0, 1.0, 0.0));
            positions.push(Vec3::new(x, 1.0, 0.0));
            indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        (positions, indices)
    }

    #[test]
    fn test_split_separates_spread_geometry() {
        let (positions, indices) = quad_grid(8);
        let bvh = build(&positions, &indices, 0);
        // Spread quads must not collapse into a single leaf.
        assert!(bvh.nodes.len() > 1);
        assert!(!bvh.nodes[0].is_leaf());
    }

    #[test]
    fn test_coincident_centroids_become_leaf() {
        // Two triangles sharing one bounding box and centroid.
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        let indices = vec![0, 1, 2, 2, 1, 3];
        let tris: Vec<Triangle> = indices
            .chunks_exact(3)
            .map(|t| {
                Triangle::new(
                    positions[t[0] as usize],
                    positions[t[1] as usize],
                    positions[t[2] as usize],
                )
            })
            .collect();
        let idx = vec![0, 1];
        let aabb = bounds_of(&tris, &idx);
        // Splitting two overlapping triangles cannot beat leaf cost 2.
        assert!(find_split(&tris, &idx, &aabb).is_none());
    }

    #[test]
    fn test_binned_path_used_for_large_nodes() {
        let (positions, indices) = quad_grid(200); // 400 triangles
        let bvh = build(&positions, &indices, 0);
        let max_leaf = bvh
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.count)
            .max()
            .unwrap();
        assert!(max_leaf < 400, "binned split must subdivide large nodes");
    }
}
