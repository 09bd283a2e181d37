//! Surface point computed at hit time: position, shading normal, tangent
//! basis, and texture coordinates.

use glam::Vec3;

use crate::vecmath::orthonormal_basis;

#[derive(Debug, Clone, Copy, Default)]
pub struct SurfacePoint {
    pub p: Vec3,
    pub n: Vec3,
    pub uv: (f32, f32),
}

impl SurfacePoint {
    pub fn new(p: Vec3, n: Vec3, uv: (f32, f32)) -> Self {
        Self { p, n, uv }
    }

    /// Builds an orthonormal basis (n, u, v) oriented so that `n` faces the
    /// same side as `wi`. Used by Diffuse/Glossy sampling to build the local
    /// frame for hemisphere sampling.
    pub fn oriented_basis(&self, wi: Vec3) -> (Vec3, Vec3, Vec3) {
        let n = if self.n.dot(wi) < 0.0 { -self.n } else { self.n };
        let (u, v) = orthonormal_basis(n);
        (n, u, v)
    }
}
