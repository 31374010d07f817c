use nalgebra::{ClosedSub, Point3, Scalar, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AABB<T: Scalar + PartialOrd> {
    min: Point3<T>,
    max: Point3<T>,
}

impl<T: Scalar + ClosedSub + PartialOrd + Copy> AABB<T> {
    /// Creates a new AABB from the given minimum and maximum coordinates. Panics if the minimum position is
    /// not less than or equal to the maximum position
    /// ```
    /// # use plinth_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<T>, max: Point3<T>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("AABB::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Creates a new AABB from the given minimum and maximum coordinates. Similar to [from_min_max](AABB::from_min_max)
    /// but performs no checks that min <= max
    pub fn from_min_max_unchecked(min: Point3<T>, max: Point3<T>) -> Self {
        Self { min, max }
    }

    /// Computes the tightest AABB around the given positions. Returns `None` if `positions` is empty
    /// ```
    /// # use plinth_core::math::AABB;
    /// # use nalgebra::{Point3, Vector3};
    /// let bounds = AABB::from_points(vec![Vector3::new(1.0, -1.0, 0.0), Vector3::new(-1.0, 2.0, 0.5)]).unwrap();
    /// assert_eq!(*bounds.min(), Point3::new(-1.0, -1.0, 0.0));
    /// assert_eq!(*bounds.max(), Point3::new(1.0, 2.0, 0.5));
    /// ```
    pub fn from_points<I: IntoIterator<Item = Vector3<T>>>(positions: I) -> Option<Self> {
        let mut iter = positions.into_iter();
        let first: Point3<T> = iter.next()?.into();
        let mut bounds = Self::from_min_max_unchecked(first, first);
        for position in iter {
            bounds = Self::extend_with_point(&bounds, &position.into());
        }
        Some(bounds)
    }

    /// Returns the minimum point of this AABB
    pub fn min(&self) -> &Point3<T> {
        &self.min
    }

    /// Returns the maximum point of this AABB
    pub fn max(&self) -> &Point3<T> {
        &self.max
    }

    /// Returns the extent of this AABB. The extent is the size between the minimum and maximum position of this AABB
    /// ```
    /// # use plinth_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn extent(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Computes the union of the given bounding boxes. The union of two bounding boxes a and b is defined as the
    /// smallest AABB that fully contains both a and b.
    pub fn union(a: &AABB<T>, b: &AABB<T>) -> Self {
        let min_x = if a.min.x < b.min.x { a.min.x } else { b.min.x };
        let min_y = if a.min.y < b.min.y { a.min.y } else { b.min.y };
        let min_z = if a.min.z < b.min.z { a.min.z } else { b.min.z };

        let max_x = if a.max.x > b.max.x { a.max.x } else { b.max.x };
        let max_y = if a.max.y > b.max.y { a.max.y } else { b.max.y };
        let max_z = if a.max.z > b.max.z { a.max.z } else { b.max.z };

        Self {
            min: Point3::new(min_x, min_y, min_z),
            max: Point3::new(max_x, max_y, max_z),
        }
    }

    /// Extends the given AABB so that it contains the given point.
    pub fn extend_with_point(bounds: &AABB<T>, point: &Point3<T>) -> AABB<T> {
        let single = Self::from_min_max_unchecked(*point, *point);
        Self::union(bounds, &single)
    }
}

impl AABB<f64> {
    /// Volume of this AABB. Degenerate boxes (zero extent along any axis) have a volume of zero
    /// ```
    /// # use plinth_core::math::AABB;
    /// let flat = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(2.0, 3.0, 0.0));
    /// assert_eq!(flat.volume(), 0.0);
    /// ```
    pub fn volume(&self) -> f64 {
        let extent = self.extent();
        extent.x * extent.y * extent.z
    }
}
