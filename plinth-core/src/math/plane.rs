use std::fmt;

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Normals shorter than this are treated as degenerate
pub const NORMAL_EPSILON: f64 = 1e-12;

/// A plane in coordinate form: `a*x + b*y + c*z + d = 0`
///
/// The normal `(a, b, c)` does not have to be of unit length. All distance computations divide
/// by its norm, and [unit_normal](PlaneModel::unit_normal) normalizes it before it is used as a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneModel {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl PlaneModel {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Creates the plane with the given `normal` that passes through `point`
    /// ```
    /// # use plinth_core::math::PlaneModel;
    /// # use nalgebra::Vector3;
    /// let plane = PlaneModel::from_normal_and_point(&Vector3::new(0.0, 0.0, 2.0), &Vector3::new(5.0, 5.0, 1.0));
    /// assert_eq!(plane.coefficients(), [0.0, 0.0, 2.0, -2.0]);
    /// ```
    pub fn from_normal_and_point(normal: &Vector3<f64>, point: &Vector3<f64>) -> Self {
        Self {
            a: normal.x,
            b: normal.y,
            c: normal.z,
            d: -normal.dot(point),
        }
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    /// The coefficients `[a, b, c, d]` of this plane
    pub fn coefficients(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// The (not necessarily normalized) normal vector `(a, b, c)`
    pub fn normal(&self) -> Vector3<f64> {
        Vector3::new(self.a, self.b, self.c)
    }

    /// The normal vector scaled to unit length. Returns `None` if the normal is (nearly) zero, in which case
    /// the plane has no defined orientation
    pub fn unit_normal(&self) -> Option<Vector3<f64>> {
        let normal = self.normal();
        let norm = normal.norm();
        if !norm.is_finite() || norm < NORMAL_EPSILON {
            return None;
        }
        Some(normal / norm)
    }

    /// Returns a copy of this plane scaled so that its normal has unit length, or `None` for a degenerate plane
    pub fn normalized(&self) -> Option<Self> {
        let norm = self.normal().norm();
        if !norm.is_finite() || norm < NORMAL_EPSILON {
            return None;
        }
        Some(Self::new(
            self.a / norm,
            self.b / norm,
            self.c / norm,
            self.d / norm,
        ))
    }

    /// Signed orthogonal distance of `point` to this plane. Positive on the side the normal points to
    pub fn signed_distance(&self, point: &Vector3<f64>) -> f64 {
        (self.a * point.x + self.b * point.y + self.c * point.z + self.d) / self.normal().norm()
    }

    /// Absolute orthogonal distance of `point` to this plane
    pub fn distance(&self, point: &Vector3<f64>) -> f64 {
        self.signed_distance(point).abs()
    }
}

impl fmt::Display for PlaneModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}x + {:.2}y + {:.2}z + {:.2} = 0",
            self.a, self.b, self.c, self.d
        )
    }
}
