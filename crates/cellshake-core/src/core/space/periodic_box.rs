use super::SpaceError;
use nalgebra::{Point3, Vector3};

/// An orthorhombic periodic simulation box with its origin at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    lengths: Vector3<f64>,
}

impl PeriodicBox {
    pub fn new(lengths: [f64; 3]) -> Result<Self, SpaceError> {
        if lengths.iter().any(|l| !l.is_finite() || *l <= 0.0) {
            return Err(SpaceError::InvalidBoxLengths(lengths));
        }
        Ok(Self {
            lengths: Vector3::from(lengths),
        })
    }

    pub fn cubic(length: f64) -> Result<Self, SpaceError> {
        Self::new([length; 3])
    }

    #[inline]
    pub fn lengths(&self) -> &Vector3<f64> {
        &self.lengths
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }

    /// Wraps a point back into `[0, L)` along every axis.
    pub fn fold(&self, point: &Point3<f64>) -> Point3<f64> {
        let mut folded = *point;
        for axis in 0..3 {
            let l = self.lengths[axis];
            folded[axis] -= (folded[axis] / l).floor() * l;
            // floor() leaves exactly L for tiny negative inputs
            if folded[axis] >= l {
                folded[axis] -= l;
            }
        }
        folded
    }

    /// Folded fractional coordinates of a point, each in `[0, 1)`.
    pub fn fractional(&self, point: &Point3<f64>) -> Vector3<f64> {
        let folded = self.fold(point);
        folded.coords.component_div(&self.lengths)
    }

    /// Shortest vector from `a` to `b` under the minimum-image convention.
    #[inline]
    pub fn minimum_image_vector(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        let mut v = b - a;
        for axis in 0..3 {
            let l = self.lengths[axis];
            v[axis] -= (v[axis] / l).round() * l;
        }
        v
    }

    #[inline]
    pub fn minimum_image_distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_image_vector(a, b).norm()
    }

    /// Image of `point` lying closest to `reference`.
    pub fn minimum_image_point(&self, reference: &Point3<f64>, point: &Point3<f64>) -> Point3<f64> {
        reference + self.minimum_image_vector(reference, point)
    }
}
