use std::collections::BinaryHeap;

use float_ord::FloatOrd;
use plinth_core::{containers::PointCloud, nalgebra::Vector3};

use crate::error::{ProcessingError, Result};

/// A single result of a nearest neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Index of the neighbour within the point cloud the tree was built from
    pub index: usize,
    /// Squared euclidean distance between the query position and the neighbour
    pub distance_squared: f64,
}

impl Neighbour {
    pub fn distance(&self) -> f64 {
        self.distance_squared.sqrt()
    }
}

/// Balanced 3D k-d tree for nearest neighbour and radius queries
///
/// The tree is stored implicitly: `indices` holds a permutation of the point indices such that the node of the
/// index range `lo..hi` sits at `(lo + hi) / 2`, with all points of `lo..mid` not greater and all points of
/// `mid+1..hi` not smaller than the node along the node's split axis. Construction splits at the median along
/// the axis of largest extent, so the depth of the tree is `ceil(log2(n + 1))`.
///
/// The tree owns a copy of the positions and is immutable after construction, so it can be queried from
/// multiple threads at once.
///
/// # Example
/// ```
/// # use plinth_core::nalgebra::Vector3;
/// # use plinth_algorithms::acceleration_structures::KdTree;
/// let tree = KdTree::from_positions(vec![
///     Vector3::new(0.0, 0.0, 0.0),
///     Vector3::new(1.0, 0.0, 0.0),
///     Vector3::new(5.0, 0.0, 0.0),
/// ]).unwrap();
/// let nearest = tree.nearest_k(&Vector3::new(0.9, 0.0, 0.0), 2);
/// assert_eq!(nearest[0].index, 1);
/// assert_eq!(nearest[1].index, 0);
/// ```
#[derive(Debug, Clone)]
pub struct KdTree {
    positions: Vec<Vector3<f64>>,
    indices: Vec<usize>,
    split_axes: Vec<u8>,
}

impl KdTree {
    /// Builds a tree over all points of `cloud`. Fails with `EmptyInput` if the cloud has no points
    pub fn build(cloud: &PointCloud) -> Result<Self> {
        Self::from_positions(cloud.positions().to_vec())
    }

    /// Builds a tree over the given positions. Fails with `EmptyInput` if `positions` is empty
    pub fn from_positions(positions: Vec<Vector3<f64>>) -> Result<Self> {
        if positions.is_empty() {
            return Err(ProcessingError::EmptyInput);
        }
        let mut indices = (0..positions.len()).collect::<Vec<_>>();
        let mut split_axes = vec![0; positions.len()];
        build_subtree(&positions, &mut indices, &mut split_axes);
        Ok(Self {
            positions,
            indices,
            split_axes,
        })
    }

    /// Number of points in this tree
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false, a tree can't be built from zero points
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The positions this tree was built from, in their original order
    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    /// Returns the `k` points closest to `position`, ordered by increasing distance. Points at equal distance
    /// are ordered by index. If the tree has fewer than `k` points, all points are returned
    pub fn nearest_k(&self, position: &Vector3<f64>, k: usize) -> Vec<Neighbour> {
        if k == 0 {
            return vec![];
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search_nearest(position, k, 0, self.indices.len(), &mut heap);
        let mut neighbours = heap
            .into_iter()
            .map(|(FloatOrd(distance_squared), index)| Neighbour {
                index,
                distance_squared,
            })
            .collect::<Vec<_>>();
        sort_neighbours(&mut neighbours);
        neighbours
    }

    /// Returns all points within euclidean distance `radius` of `position` (inclusive), ordered by increasing
    /// distance. A radius of zero yields exactly the points that coincide with `position`. Fails if `radius` is
    /// negative or NaN
    pub fn within_radius(&self, position: &Vector3<f64>, radius: f64) -> Result<Vec<Neighbour>> {
        if !(radius >= 0.0) {
            return Err(ProcessingError::InvalidParameter(format!(
                "search radius must be >= 0, got {}",
                radius
            )));
        }
        let mut neighbours = vec![];
        self.search_radius(
            position,
            radius * radius,
            0,
            self.indices.len(),
            &mut neighbours,
        );
        sort_neighbours(&mut neighbours);
        Ok(neighbours)
    }

    /// The `k` nearest neighbours of the point at `index` within this tree, not counting the point itself
    pub fn neighbours_of(&self, index: usize, k: usize) -> Vec<Neighbour> {
        let mut neighbours = self.nearest_k(&self.positions[index], k + 1);
        match neighbours.iter().position(|n| n.index == index) {
            Some(own_position) => {
                neighbours.remove(own_position);
            }
            None => {
                // `k + 1` exact duplicates with smaller indices pushed the point itself out
                neighbours.truncate(k);
            }
        }
        neighbours
    }

    /// All points within `radius` of the point at `index`, not counting the point itself
    pub fn neighbours_within_radius_of(&self, index: usize, radius: f64) -> Result<Vec<Neighbour>> {
        let mut neighbours = self.within_radius(&self.positions[index], radius)?;
        neighbours.retain(|n| n.index != index);
        Ok(neighbours)
    }

    fn search_nearest(
        &self,
        position: &Vector3<f64>,
        k: usize,
        lo: usize,
        hi: usize,
        heap: &mut BinaryHeap<(FloatOrd<f64>, usize)>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = (lo + hi) / 2;
        let point_index = self.indices[mid];
        let node_position = &self.positions[point_index];

        let distance_squared = (node_position - position).norm_squared();
        heap.push((FloatOrd(distance_squared), point_index));
        if heap.len() > k {
            heap.pop();
        }

        let axis = self.split_axes[mid] as usize;
        let diff = position[axis] - node_position[axis];
        let (near, far) = if diff <= 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search_nearest(position, k, near.0, near.1, heap);

        // Equal distances still have to visit the far side so that ties resolve to the lowest index
        let must_visit_far = match heap.peek() {
            Some((FloatOrd(worst), _)) => heap.len() < k || diff * diff <= *worst,
            None => true,
        };
        if must_visit_far {
            self.search_nearest(position, k, far.0, far.1, heap);
        }
    }

    fn search_radius(
        &self,
        position: &Vector3<f64>,
        radius_squared: f64,
        lo: usize,
        hi: usize,
        neighbours: &mut Vec<Neighbour>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = (lo + hi) / 2;
        let point_index = self.indices[mid];
        let node_position = &self.positions[point_index];

        let distance_squared = (node_position - position).norm_squared();
        if distance_squared <= radius_squared {
            neighbours.push(Neighbour {
                index: point_index,
                distance_squared,
            });
        }

        let axis = self.split_axes[mid] as usize;
        let diff = position[axis] - node_position[axis];
        if diff <= 0.0 || diff * diff <= radius_squared {
            self.search_radius(position, radius_squared, lo, mid, neighbours);
        }
        if diff >= 0.0 || diff * diff <= radius_squared {
            self.search_radius(position, radius_squared, mid + 1, hi, neighbours);
        }
    }
}

fn sort_neighbours(neighbours: &mut [Neighbour]) {
    neighbours.sort_unstable_by_key(|n| (FloatOrd(n.distance_squared), n.index));
}

/// Arranges `indices` into an implicit balanced tree and records the split axis of every node
fn build_subtree(positions: &[Vector3<f64>], indices: &mut [usize], split_axes: &mut [u8]) {
    if indices.is_empty() {
        return;
    }
    let axis = axis_of_largest_extent(positions, indices);
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by_key(mid, |&idx| FloatOrd(positions[idx][axis]));
    split_axes[mid] = axis as u8;

    let (left_indices, rest_indices) = indices.split_at_mut(mid);
    let (left_axes, rest_axes) = split_axes.split_at_mut(mid);
    build_subtree(positions, left_indices, left_axes);
    build_subtree(positions, &mut rest_indices[1..], &mut rest_axes[1..]);
}

fn axis_of_largest_extent(positions: &[Vector3<f64>], indices: &[usize]) -> usize {
    let first = positions[indices[0]];
    let (min, max) = indices
        .iter()
        .skip(1)
        .fold((first, first), |(min, max), &idx| {
            let p = &positions[idx];
            (min.inf(p), max.sup(p))
        });
    (max - min).imax()
}
