//! Axis-aligned bounding boxes and the branchless ray-slab test.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn union_point(&self, p: Vec3) -> Bounds {
        Bounds {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    /// `2(dx dy + dy dz + dz dx)`
    pub fn surface_area(&self) -> f32 {
        let d = self.diagonal();
        if d.x < 0.0 || d.y < 0.0 || d.z < 0.0 {
            return 0.0;
        }
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Returns the axis (0/1/2) along which this box is longest.
    pub fn max_extent_axis(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Branchless slab test: returns true iff the ray's parametric interval
    /// overlaps `[tl, th]` on all three axes. Handles zero direction
    /// components via the IEEE-754 infinite-reciprocal convention.
    pub fn intersect_ray(&self, origin: Vec3, inv_dir: Vec3, tl: f32, th: f32) -> bool {
        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let tmin = t0.min(t1);
        let tmax = t0.max(t1);
        let tl = tl.max(tmin.x).max(tmin.y).max(tmin.z);
        let th = th.min(tmax.x).min(tmax.y).min(tmax.z);
        tl <= th
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_commutative() {
        let b = Bounds::EMPTY;
        let p = Vec3::new(1.0, 2.0, -3.0);
        let q = Vec3::new(-1.0, 0.5, 4.0);
        let a = b.union_point(p).union_point(q);
        let c = b.union_point(q).union_point(p);
        assert_eq!(a, c);
    }

    #[test]
    fn slab_test_handles_zero_direction() {
        let b = Bounds {
            min: Vec3::new(-1.0, -1.0, -1.0),
            max: Vec3::new(1.0, 1.0, 1.0),
        };
        let origin = Vec3::new(0.0, 0.0, -5.0);
        let dir = Vec3::new(0.0, 0.0, 1.0);
        let inv_dir = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        assert!(b.intersect_ray(origin, inv_dir, 0.0, f32::INFINITY));

        let origin_miss = Vec3::new(5.0, 0.0, -5.0);
        assert!(!b.intersect_ray(origin_miss, inv_dir, 0.0, f32::INFINITY));
    }
}
