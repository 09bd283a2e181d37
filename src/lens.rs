//! Realistic multi-element lens camera: reverse ray tracing through a stack
//! of spherical elements and an aperture stop, bisection autofocus, and
//! precomputed exit-pupil bounds for importance-sampled ray generation.

use glam::{Vec2, Vec3};

use crate::ray::Ray;
use crate::sampler::Sampler;

/// One element of the lens prescription, in meters. A zero curvature radius
/// denotes the aperture stop.
#[derive(Debug, Clone, Copy)]
pub struct LensElement {
    pub curvature_radius: f32,
    pub thickness: f32,
    pub eta: f32,
    pub aperture_radius: f32,
}

const EXIT_PUPIL_BINS: usize = 64;
const EXIT_PUPIL_SAMPLES: usize = 4096;
const AUTOFOCUS_ITERS: usize = 99;

#[derive(Debug, Clone, Copy)]
struct Bounds2 {
    min: Vec2,
    max: Vec2,
}

impl Bounds2 {
    fn area(&self) -> f32 {
        let d = self.max - self.min;
        (d.x * d.y).max(0.0)
    }
}

pub struct RealisticLens {
    elements: Vec<LensElement>,
    eye: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    sensor_half_width: f32,
    sensor_half_height: f32,
    sensor_radius: f32,
    sensor_distance: f32,
    sensitivity: f32,
    exit_pupil_bounds: Vec<Option<Bounds2>>,
}

impl RealisticLens {
    pub fn new(
        elements: Vec<LensElement>,
        eye: Vec3,
        center: Vec3,
        up: Vec3,
        focus_distance: f32,
        sensor_diagonal_mm: f32,
        sensitivity: f32,
        aspect: f32,
    ) -> Self {
        let w = (eye - center).normalize();
        let u = up.cross(w).normalize();
        let v = w.cross(u);

        let diag_m = sensor_diagonal_mm * 0.001;
        // diag^2 = (2*hw)^2 + (2*hh)^2, hw/hh = aspect
        let hh = diag_m / (2.0 * (1.0 + aspect * aspect).sqrt());
        let hw = hh * aspect;
        let sensor_radius = (hw * hw + hh * hh).sqrt();

        let mut lens = Self {
            elements,
            eye,
            u,
            v,
            w,
            sensor_half_width: hw,
            sensor_half_height: hh,
            sensor_radius,
            sensor_distance: 0.05,
            sensitivity,
            exit_pupil_bounds: Vec::new(),
        };
        lens.sensor_distance = lens.autofocus(focus_distance);
        lens.precompute_exit_pupils();
        lens
    }

    fn rear_aperture_radius(&self) -> f32 {
        self.elements.last().map(|e| e.aperture_radius).unwrap_or(0.0)
    }

    fn rear_thickness(&self) -> f32 {
        self.elements.last().map(|e| e.thickness).unwrap_or(0.0)
    }

    /// z-coordinate of element `i`'s vertex, lens space, sensor at z=0, given
    /// an explicit sensor-to-rear-element distance.
    fn element_z_at(&self, i: usize, sensor_distance: f32) -> f32 {
        let mut z = -sensor_distance;
        for k in (i + 1..self.elements.len()).rev() {
            z -= self.elements[k].thickness;
        }
        z
    }

    fn element_z(&self, i: usize) -> f32 {
        self.element_z_at(i, self.sensor_distance)
    }

    /// Traces `ray` (in lens-local space) from the sensor side to the object
    /// side through the full element stack, applying refraction/aperture
    /// clipping at each interface. Returns `None` on total internal
    /// reflection or an aperture miss.
    fn trace_from_film_at(&self, mut ray: Ray, sensor_distance: f32) -> Option<Ray> {
        let n = self.elements.len();
        for i in (0..n).rev() {
            let element = self.elements[i];
            let z = self.element_z_at(i, sensor_distance);
            let is_stop = element.curvature_radius == 0.0;

            let (t, normal) = if is_stop {
                if ray.dir.z == 0.0 {
                    return None;
                }
                (( z - ray.origin.z) / ray.dir.z, Vec3::new(0.0, 0.0, 1.0))
            } else {
                let radius = element.curvature_radius;
                let z_center = z + radius;
                intersect_spherical(radius, z_center, ray)?
            };
            if t < 0.0 {
                return None;
            }

            let p_hit = ray.at(t);
            let r2 = p_hit.x * p_hit.x + p_hit.y * p_hit.y;
            if r2 > element.aperture_radius * element.aperture_radius {
                return None;
            }
            ray.origin = p_hit;

            if !is_stop {
                let eta_i = element.eta;
                let eta_t = if i > 0 && self.elements[i - 1].eta != 0.0 {
                    self.elements[i - 1].eta
                } else {
                    1.0
                };
                let wt = crate::vecmath::refract(-ray.dir, face_forward(normal, -ray.dir), eta_i / eta_t)?;
                ray.dir = wt;
            }
        }
        Some(ray)
    }

    fn trace_from_film(&self, ray: Ray) -> Option<Ray> {
        self.trace_from_film_at(ray, self.sensor_distance)
    }

    /// Effective focus distance for a hypothetical sensor-to-rear-element
    /// distance `test_distance`: traces a fan of near-axis rays parallel to
    /// the optical axis and finds where they cross it in object space.
    fn effective_focus_distance(&self, test_distance: f32) -> f32 {
        let rear_r = self.rear_aperture_radius();
        let mut last_z = f32::INFINITY;
        let mut hit_any = false;
        for i in (1..10).rev() {
            let x = rear_r * i as f32 / 10.0;
            let origin = Vec3::new(x, 0.0, 0.0);
            let dir = Vec3::new(0.0, 0.0, 1.0);
            if let Some(out) = self.trace_from_film_at(Ray::new(origin, dir), test_distance) {
                if out.dir.x.abs() > 1e-9 {
                    let t = -out.origin.x / out.dir.x;
                    let z = out.origin.z + t * out.dir.z;
                    last_z = z;
                    hit_any = true;
                    break;
                }
            }
        }
        if !hit_any {
            return f32::INFINITY;
        }
        let front_z = self.element_z_at(0, test_distance);
        if last_z < front_z {
            -last_z
        } else {
            f32::INFINITY
        }
    }

    fn autofocus(&self, target_distance: f32) -> f32 {
        let mut lo = 1e-4f32;
        let mut hi = 1e10f32;
        for _ in 0..AUTOFOCUS_ITERS {
            let mid = 0.5 * (lo + hi);
            if self.effective_focus_distance(mid) < target_distance {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    fn precompute_exit_pupils(&mut self) {
        let mut bounds = Vec::with_capacity(EXIT_PUPIL_BINS);
        let rear_z = self.element_z(self.elements.len().saturating_sub(1));
        let rear_r = self.rear_aperture_radius();
        let mut rng = Sampler::new(1, 0);
        for bin in 0..EXIT_PUPIL_BINS {
            let r0 = bin as f32 / EXIT_PUPIL_BINS as f32 * self.sensor_radius;
            let r1 = (bin + 1) as f32 / EXIT_PUPIL_BINS as f32 * self.sensor_radius;
            let px = (r0 + r1) * 0.5;
            let mut b: Option<Bounds2> = None;
            for _ in 0..EXIT_PUPIL_SAMPLES {
                let (ru, rv) = rng.u2();
                let r = ru.sqrt() * rear_r;
                let theta = std::f32::consts::TAU * rv;
                let target = Vec3::new(r * theta.cos(), r * theta.sin(), rear_z);
                let origin = Vec3::new(px, 0.0, 0.0);
                let dir = (target - origin).normalize();
                if let Some(out) = self.trace_from_film(Ray::new(origin, dir)) {
                    let p = Vec2::new(out.origin.x, out.origin.y);
                    b = Some(match b {
                        Some(existing) => Bounds2 {
                            min: existing.min.min(p),
                            max: existing.max.max(p),
                        },
                        None => Bounds2 { min: p, max: p },
                    });
                }
            }
            bounds.push(b);
        }
        self.exit_pupil_bounds = bounds;
    }

    /// Converts a pixel `(u, v)` in [0,1)^2 to a world-space ray and its
    /// importance-sampling weight; `None` on sampling failure (empty exit
    /// pupil bin, or a ray that fails to make it through the lens stack).
    pub fn sample(&self, rng: &mut Sampler, uv: (f32, f32)) -> Option<(Ray, Vec3)> {
        let rp = Vec2::new(2.0 * uv.0 - 1.0, 2.0 * uv.1 - 1.0);
        let sensor_pt = Vec2::new(rp.x * self.sensor_half_width, rp.y * self.sensor_half_height);
        let l = sensor_pt.length();
        let bin = ((l / self.sensor_radius * EXIT_PUPIL_BINS as f32) as usize).min(EXIT_PUPIL_BINS - 1);
        let bounds = self.exit_pupil_bounds[bin]?;

        let (bu, bv) = rng.u2();
        let p_lens = Vec2::new(
            bounds.min.x + bu * (bounds.max.x - bounds.min.x),
            bounds.min.y + bv * (bounds.max.y - bounds.min.y),
        );

        let p_lens_rotated = if l > 1e-8 {
            let s = sensor_pt.y / l;
            let c = sensor_pt.x / l;
            Vec2::new(c * p_lens.x - s * p_lens.y, s * p_lens.x + c * p_lens.y)
        } else {
            p_lens
        };

        let rear_z = self.element_z(self.elements.len().saturating_sub(1));
        let origin = Vec3::new(sensor_pt.x, sensor_pt.y, 0.0);
        let target = Vec3::new(p_lens_rotated.x, p_lens_rotated.y, rear_z);
        let dir = (target - origin).normalize();

        let out = self.trace_from_film(Ray::new(origin, dir))?;

        let cos_theta = dir.z;
        let z = self.rear_thickness() + self.sensor_distance;
        let weight = cos_theta.powi(4) * bounds.area() / (z * z) * self.sensitivity;

        let world_dir = self.u * out.dir.x + self.v * out.dir.y + self.w * out.dir.z;
        let world_origin = self.eye + self.u * out.origin.x + self.v * out.origin.y + self.w * out.origin.z;
        Some((Ray::new(world_origin, world_dir), Vec3::splat(weight.max(0.0))))
    }
}

fn face_forward(n: Vec3, v: Vec3) -> Vec3 {
    if n.dot(v) < 0.0 {
        -n
    } else {
        n
    }
}

/// Intersects a ray with a sphere of the given `radius` centered at
/// `(0, 0, z_center)`, selecting the near or far root by the convention used
/// for lens surfaces (front/back depending on curvature sign and ray
/// direction). Returns `(t, surface_normal_facing_the_ray_origin)`.
fn intersect_spherical(radius: f32, z_center: f32, ray: Ray) -> Option<(f32, Vec3)> {
    let o = ray.origin - Vec3::new(0.0, 0.0, z_center);
    let a = ray.dir.length_squared();
    let b = 2.0 * o.dot(ray.dir);
    let c = o.length_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let t0 = (-b - root) / (2.0 * a);
    let t1 = (-b + root) / (2.0 * a);
    let use_far = (ray.dir.z > 0.0) != (radius < 0.0);
    let t = if use_far { t0.max(t1) } else { t0.min(t1) };
    if t < 0.0 {
        return None;
    }
    let hit = ray.at(t);
    let mut n = (hit - Vec3::new(0.0, 0.0, z_center)).normalize();
    if n.dot(ray.dir) > 0.0 {
        n = -n;
    }
    Some((t, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_stack() -> Vec<LensElement> {
        vec![
            LensElement {
                curvature_radius: 0.05,
                thickness: 0.01,
                eta: 1.5,
                aperture_radius: 0.02,
            },
            LensElement {
                curvature_radius: 0.0,
                thickness: 0.005,
                eta: 0.0,
                aperture_radius: 0.015,
            },
            LensElement {
                curvature_radius: -0.04,
                thickness: 0.03,
                eta: 1.5,
                aperture_radius: 0.02,
            },
        ]
    }

    #[test]
    fn autofocus_produces_finite_positive_distance() {
        let lens = RealisticLens::new(simple_stack(), Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::Y, 1.0, 43.2, 1.0, 1.0);
        assert!(lens.sensor_distance > 0.0);
        assert!(lens.sensor_distance.is_finite());
    }

    #[test]
    fn sample_returns_unit_direction_when_present() {
        let lens = RealisticLens::new(simple_stack(), Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::Y, 1.0, 43.2, 1.0, 1.0);
        let mut rng = Sampler::new(9, 0);
        if let Some((ray, _w)) = lens.sample(&mut rng, (0.5, 0.5)) {
            assert!((ray.dir.length() - 1.0).abs() < 1e-4);
        }
    }
}
