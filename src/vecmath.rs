//! Vector math helpers layered on top of `glam::Vec3`.

use glam::Vec3;

/// Numerical floor used throughout the integrator to avoid self-intersection
/// and division-by-zero at grazing angles.
pub const EPS: f32 = 1e-4;

/// `2(w·n)n - w`
#[inline]
pub fn reflect(w: Vec3, n: Vec3) -> Vec3 {
    2.0 * w.dot(n) * n - w
}

/// Refracts `wi` (pointing away from the surface, i.e. towards the incoming
/// side) through a surface with normal `n`, given relative index of
/// refraction `eta = eta_incident / eta_transmitted`. Returns `None` on total
/// internal reflection.
#[inline]
pub fn refract(wi: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = wi.dot(n);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(-eta * wi + (eta * cos_i - cos_t) * n)
}

/// Builds a right-handed orthonormal basis (u, v) for the plane orthogonal to
/// `n`, using an arbitrary-vector cross trick that degenerates gracefully
/// near-parallel to `n`.
#[inline]
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let a = Vec3::new(0.1, 0.5, 0.9);
    let u = a.cross(n).normalize_or_zero();
    let u = if u.length_squared() < 1e-12 {
        Vec3::new(0.9, 0.1, 0.5).cross(n).normalize()
    } else {
        u
    };
    let v = n.cross(u);
    (u, v)
}

/// Barycentric interpolation of three values given (u, v) with implicit
/// weight `1 - u - v` on `a`.
#[inline]
pub fn barycentric<T>(a: T, b: T, c: T, u: f32, v: f32) -> T
where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T> + Copy,
{
    a * (1.0 - u - v) + b * u + c * v
}

/// Balance-heuristic-style combination used by the integrator's MIS weights.
#[inline]
pub fn balance_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    if pdf_a + pdf_b <= 0.0 {
        0.0
    } else {
        pdf_a / (pdf_a + pdf_b)
    }
}

/// `1` if `w` is strictly positive, `0` otherwise. Used to gate reflective
/// contributions to the same side of a geometric normal.
#[inline]
pub fn same_hemisphere(wi: Vec3, wo: Vec3, n: Vec3) -> bool {
    wi.dot(n).signum() * wo.dot(n).signum() > 0.0
}
