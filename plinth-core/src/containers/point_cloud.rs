use std::iter::FromIterator;

use anyhow::{bail, Result};
use nalgebra::{Rotation3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::math::AABB;

/// An ordered set of 3D points with optional per-point RGB colors
///
/// The order of the points is significant only in that index sets (inlier lists, filter results) refer to
/// positions within this sequence. Colors are stored as `Vector3<f64>` with components in `[0, 1]`. If colors
/// are present, there is exactly one color per point.
///
/// A `PointCloud` is never modified partially. All transformations return a new cloud:
/// ```
/// # use plinth_core::containers::PointCloud;
/// # use plinth_core::nalgebra::Vector3;
/// let cloud = PointCloud::from_positions(vec![Vector3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, 1.0)]);
/// let lowered = cloud.translated(&Vector3::new(0.0, 0.0, -1.0));
/// assert_eq!(cloud.positions()[0].z, 1.0);
/// assert_eq!(lowered.positions()[0].z, 0.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    positions: Vec<Vector3<f64>>,
    colors: Option<Vec<Vector3<f64>>>,
}

impl PointCloud {
    /// Creates a new empty `PointCloud`
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a `PointCloud` without colors from the given positions
    pub fn from_positions(positions: Vec<Vector3<f64>>) -> Self {
        Self {
            positions,
            colors: None,
        }
    }

    /// Creates a colored `PointCloud`. Fails if `colors` and `positions` differ in length
    pub fn from_positions_and_colors(
        positions: Vec<Vector3<f64>>,
        colors: Vec<Vector3<f64>>,
    ) -> Result<Self> {
        if positions.len() != colors.len() {
            bail!(
                "Number of colors ({}) does not match number of positions ({})",
                colors.len(),
                positions.len()
            );
        }
        Ok(Self {
            positions,
            colors: Some(colors),
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    /// Per-point colors, if this cloud has any
    pub fn colors(&self) -> Option<&[Vector3<f64>]> {
        self.colors.as_deref()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Consumes this cloud and returns its positions and colors
    pub fn into_parts(self) -> (Vec<Vector3<f64>>, Option<Vec<Vector3<f64>>>) {
        (self.positions, self.colors)
    }

    /// Returns a new cloud containing the points at `indices`, in the order of `indices`. Colors are carried
    /// over. Fails if any index is out of bounds
    pub fn select_by_index(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad_index) = indices.iter().find(|&&idx| idx >= self.len()) {
            bail!(
                "Index {} is out of bounds for point cloud with {} points",
                bad_index,
                self.len()
            );
        }
        let positions = indices.iter().map(|&idx| self.positions[idx]).collect();
        let colors = self
            .colors
            .as_ref()
            .map(|colors| indices.iter().map(|&idx| colors[idx]).collect());
        Ok(Self { positions, colors })
    }

    /// Returns a new cloud containing all points that are *not* referenced by `indices`, in their original
    /// order. Fails if any index is out of bounds
    pub fn select_by_index_inverted(&self, indices: &[usize]) -> Result<Self> {
        let mut selected = vec![false; self.len()];
        for &idx in indices {
            if idx >= self.len() {
                bail!(
                    "Index {} is out of bounds for point cloud with {} points",
                    idx,
                    self.len()
                );
            }
            selected[idx] = true;
        }
        let complement = selected
            .iter()
            .enumerate()
            .filter(|(_, is_selected)| !**is_selected)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        self.select_by_index(&complement)
    }

    /// Returns a copy of this cloud where every point has the given `color`
    pub fn painted(&self, color: Vector3<f64>) -> Self {
        Self {
            positions: self.positions.clone(),
            colors: Some(vec![color; self.len()]),
        }
    }

    /// Returns a copy of this cloud rotated by `rotation` around the origin
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Self {
        Self {
            positions: self.positions.iter().map(|p| rotation * p).collect(),
            colors: self.colors.clone(),
        }
    }

    /// Returns a copy of this cloud with every point moved by `translation`
    pub fn translated(&self, translation: &Vector3<f64>) -> Self {
        Self {
            positions: self.positions.iter().map(|p| p + translation).collect(),
            colors: self.colors.clone(),
        }
    }

    /// Concatenates this cloud and `other`. The result only carries colors if both inputs do
    pub fn merged(&self, other: &PointCloud) -> Self {
        let positions = self
            .positions
            .iter()
            .chain(other.positions.iter())
            .copied()
            .collect();
        let colors = match (&self.colors, &other.colors) {
            (Some(a), Some(b)) => Some(a.iter().chain(b.iter()).copied().collect()),
            _ => None,
        };
        Self { positions, colors }
    }

    /// Axis-aligned bounding box of all points, or `None` if the cloud is empty
    pub fn bounds(&self) -> Option<AABB<f64>> {
        AABB::from_points(self.positions.iter().copied())
    }

    /// Mean of all positions, or `None` if the cloud is empty
    pub fn mean_position(&self) -> Option<Vector3<f64>> {
        if self.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.positions.iter().sum();
        Some(sum / self.len() as f64)
    }
}

impl From<Vec<Vector3<f64>>> for PointCloud {
    fn from(positions: Vec<Vector3<f64>>) -> Self {
        Self::from_positions(positions)
    }
}

impl FromIterator<Vector3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Vector3<f64>>>(iter: I) -> Self {
        Self::from_positions(iter.into_iter().collect())
    }
}
