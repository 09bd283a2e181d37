//! The nine interaction variants, dispatched through a tagged enum rather
//! than a trait-object hierarchy: the integrator needs compile-time-visible
//! knowledge of which variants are non-specular / emitters / specular to
//! decide MIS rules, which a plain visitor over the tag gives for free.

use glam::Vec3;

use crate::distribution::{Discrete1D, Discrete2D};
use crate::interaction::SurfacePoint;
use crate::lens::RealisticLens;
use crate::ray::Ray;
use crate::sampler::Sampler;
use crate::texture::Texture;
use crate::vecmath::{orthonormal_basis, reflect, refract, same_hemisphere};

pub struct BsdfSample {
    pub ray: Ray,
    pub weight: Vec3,
}

pub struct LightSample {
    pub wo: Vec3,
    pub distance: f32,
    pub le: Vec3,
    pub pdf: f32,
}

#[derive(Clone)]
pub struct Pinhole {
    pub eye: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
    pub aspect: f32,
    pub tan_half_vfov: f32,
}

impl Pinhole {
    pub fn new(eye: Vec3, center: Vec3, up: Vec3, vfov_degrees: f32, aspect: f32) -> Self {
        let w = (eye - center).normalize();
        let u = up.cross(w).normalize();
        let v = w.cross(u);
        Self {
            eye,
            u,
            v,
            w,
            aspect,
            tan_half_vfov: (vfov_degrees.to_radians() * 0.5).tan(),
        }
    }

    pub fn sample(&self, uv: (f32, f32)) -> (Ray, Vec3) {
        let rp = (2.0 * uv.0 - 1.0, 2.0 * uv.1 - 1.0);
        let local = Vec3::new(
            self.aspect * self.tan_half_vfov * rp.0,
            self.tan_half_vfov * rp.1,
            1.0,
        );
        let dir = -(self.u * local.x + self.v * local.y + self.w * local.z).normalize();
        (Ray::new(self.eye, dir), Vec3::ONE)
    }
}

#[derive(Clone, Default)]
pub struct Diffuse {
    pub kd: Vec3,
    pub map_kd: Option<std::sync::Arc<Texture>>,
}

impl Diffuse {
    fn albedo(&self, uv: (f32, f32)) -> Vec3 {
        match &self.map_kd {
            Some(tex) => tex.eval(uv),
            None => self.kd,
        }
    }

    fn alpha(&self, uv: (f32, f32)) -> f32 {
        match &self.map_kd {
            Some(tex) => tex.eval_alpha(uv),
            None => 1.0,
        }
    }

    pub fn weight_magnitude(&self, uv: (f32, f32)) -> f32 {
        self.albedo(uv).max_element()
    }

    pub fn has_alpha(&self) -> bool {
        self.map_kd.as_ref().map(|t| t.alpha.is_some()).unwrap_or(false)
    }

    pub fn alpha_at(&self, uv: (f32, f32)) -> f32 {
        self.alpha(uv)
    }

    pub fn sample(&self, rng: &mut Sampler, surf: &SurfacePoint, wi: Vec3) -> Option<BsdfSample> {
        let (n, u, v) = surf.oriented_basis(wi);
        let local = rng.cosine_hemisphere();
        let wo = u * local.x + v * local.y + n * local.z;
        let kd = self.albedo(surf.uv);
        Some(BsdfSample {
            ray: Ray::new(surf.p, wo),
            weight: kd,
        })
    }

    pub fn eval(&self, surf: &SurfacePoint, wi: Vec3, wo: Vec3) -> Vec3 {
        if !same_hemisphere(wi, wo, surf.n) {
            return Vec3::ZERO;
        }
        self.albedo(surf.uv) * self.alpha(surf.uv) * std::f32::consts::FRAC_1_PI
    }

    pub fn pdf(&self, surf: &SurfacePoint, wi: Vec3, wo: Vec3) -> f32 {
        if !same_hemisphere(wi, wo, surf.n) {
            0.0
        } else {
            std::f32::consts::FRAC_1_PI
        }
    }
}

#[derive(Clone, Copy, Default)]
pub struct Glossy {
    pub ks: Vec3,
    pub alpha_x: f32,
    pub alpha_y: f32,
}

impl Glossy {
    /// Roughness conversion from a Phong-like exponent `ns` and anisotropy
    /// `an` in [0, 1].
    pub fn from_phong_params(ks: Vec3, ns: f32, an: f32) -> Self {
        let r = 2.0 / (ns + 2.0);
        let anis = (1.0 - 0.9 * an).max(0.0).sqrt();
        Self {
            ks,
            alpha_x: (r / anis).max(1e-3),
            alpha_y: (r * anis).max(1e-3),
        }
    }

    pub fn weight_magnitude(&self) -> f32 {
        self.ks.max_element()
    }

    fn ggx_d(&self, wh: Vec3, u: Vec3, v: Vec3, n: Vec3) -> f32 {
        let hu = wh.dot(u) / self.alpha_x;
        let hv = wh.dot(v) / self.alpha_y;
        let hn = wh.dot(n);
        let denom = hu * hu + hv * hv + hn * hn;
        1.0 / (std::f32::consts::PI * self.alpha_x * self.alpha_y * denom * denom)
    }

    fn smith_g1(&self, w: Vec3, u: Vec3, v: Vec3, n: Vec3) -> f32 {
        let c = w.dot(n);
        if c <= 0.0 {
            return 0.0;
        }
        let s = (1.0 - c * c).max(0.0).sqrt();
        if s < 1e-7 {
            return 1.0;
        }
        let cp = w.dot(u) / s;
        let cs = w.dot(v) / s;
        let a2 = (cp * self.alpha_x).powi(2) + (cs * self.alpha_y).powi(2);
        2.0 / (1.0 + (1.0 + a2 * (s / c).powi(2)).sqrt())
    }

    fn ggx_g(&self, wi: Vec3, wo: Vec3, u: Vec3, v: Vec3, n: Vec3) -> f32 {
        self.smith_g1(wi, u, v, n) * self.smith_g1(wo, u, v, n)
    }

    pub fn sample(&self, rng: &mut Sampler, surf: &SurfacePoint, wi: Vec3) -> Option<BsdfSample> {
        let (n, u, v) = surf.oriented_basis(wi);
        let (u1, u2) = rng.u2();
        let phi = std::f32::consts::TAU * u1;
        let t = (u2 / (1.0 - u2)).sqrt();
        let wh_local = (self.alpha_x * phi.cos() * t * u + self.alpha_y * phi.sin() * t * v + n).normalize();
        let wo = reflect(wi, wh_local);
        if !same_hemisphere(wi, wo, n) {
            return None;
        }
        let pdf = self.pdf_basis(wi, wo, n, u, v, wh_local);
        if pdf <= 0.0 {
            return None;
        }
        let f = self.eval_basis(wi, wo, n, u, v, wh_local);
        Some(BsdfSample {
            ray: Ray::new(surf.p, wo),
            weight: f * wo.dot(n).abs() / pdf,
        })
    }

    fn eval_basis(&self, wi: Vec3, wo: Vec3, n: Vec3, u: Vec3, v: Vec3, wh: Vec3) -> Vec3 {
        let d = self.ggx_d(wh, u, v, n);
        let g = self.ggx_g(wi, wo, u, v, n);
        let fr = self.ks + (Vec3::ONE - self.ks) * (1.0 - wo.dot(wh)).max(0.0).powi(5);
        let denom = 4.0 * wi.dot(n).abs() * wo.dot(n).abs();
        if denom <= 0.0 {
            Vec3::ZERO
        } else {
            fr * d * g / denom
        }
    }

    fn pdf_basis(&self, _wi: Vec3, wo: Vec3, n: Vec3, u: Vec3, v: Vec3, wh: Vec3) -> f32 {
        let d = self.ggx_d(wh, u, v, n);
        let denom = 4.0 * wo.dot(wh).abs() * wo.dot(n).abs();
        if denom <= 0.0 {
            0.0
        } else {
            d * wh.dot(n).abs() / denom
        }
    }

    pub fn eval(&self, surf: &SurfacePoint, wi: Vec3, wo: Vec3) -> Vec3 {
        if !same_hemisphere(wi, wo, surf.n) {
            return Vec3::ZERO;
        }
        let n = if surf.n.dot(wi) < 0.0 { -surf.n } else { surf.n };
        let (u, v) = orthonormal_basis(n);
        let wh = (wi + wo).normalize();
        self.eval_basis(wi, wo, n, u, v, wh)
    }

    pub fn pdf(&self, surf: &SurfacePoint, wi: Vec3, wo: Vec3) -> f32 {
        if !same_hemisphere(wi, wo, surf.n) {
            return 0.0;
        }
        let n = if surf.n.dot(wi) < 0.0 { -surf.n } else { surf.n };
        let (u, v) = orthonormal_basis(n);
        let wh = (wi + wo).normalize();
        self.pdf_basis(wi, wo, n, u, v, wh)
    }
}

/// Sample: pass-through ray with direction `-wi`, weight 1.
pub fn transparent_mask_sample(surf: &SurfacePoint, wi: Vec3) -> BsdfSample {
    BsdfSample {
        ray: Ray::new(surf.p, -wi),
        weight: Vec3::ONE,
    }
}

#[derive(Clone, Copy)]
pub struct FresnelSpecular {
    pub ni: f32,
}

impl FresnelSpecular {
    pub fn sample(&self, rng: &mut Sampler, surf: &SurfacePoint, wi: Vec3) -> Option<BsdfSample> {
        let entering = wi.dot(surf.n) > 0.0;
        let n = if entering { surf.n } else { -surf.n };
        let eta = if entering { 1.0 / self.ni } else { self.ni };

        let wt = refract(wi, n, eta);
        let (fr, wt) = match wt {
            None => (1.0, None),
            Some(wt) => {
                let cos_i = if entering { wi.dot(surf.n) } else { wt.dot(surf.n) };
                let r0 = ((1.0 - self.ni) / (1.0 + self.ni)).powi(2);
                let fr = r0 + (1.0 - r0) * (1.0 - cos_i.abs()).max(0.0).powi(5);
                (fr, Some(wt))
            }
        };

        if rng.u() < fr {
            Some(BsdfSample {
                ray: Ray::new(surf.p, reflect(wi, surf.n)),
                weight: Vec3::ONE,
            })
        } else {
            let wt = wt?;
            Some(BsdfSample {
                ray: Ray::new(surf.p, wt),
                weight: Vec3::splat(eta * eta),
            })
        }
    }
}

pub struct PerfectMirror;

impl PerfectMirror {
    pub fn sample(surf: &SurfacePoint, wi: Vec3) -> BsdfSample {
        BsdfSample {
            ray: Ray::new(surf.p, reflect(wi, surf.n)),
            weight: Vec3::ONE,
        }
    }
}

pub struct AreaLight {
    pub ke: Vec3,
    pub triangle_dist: Discrete1D,
    pub inv_area: f32,
    /// World-space vertices of each triangle belonging to this light, for
    /// sampling a point on the emitter surface.
    pub triangles: Vec<(Vec3, Vec3, Vec3)>,
}

impl AreaLight {
    pub fn new(ke: Vec3, triangles: Vec<(Vec3, Vec3, Vec3)>) -> Self {
        let mut dist = Discrete1D::new();
        for (a, b, c) in &triangles {
            dist.add(triangle_area(*a, *b, *c));
        }
        let inv_area = 1.0 / dist.total().max(1e-20);
        dist.normalize();
        Self {
            ke,
            triangle_dist: dist,
            inv_area,
            triangles,
        }
    }

    pub fn sample_light(&self, rng: &mut Sampler, surf: &SurfacePoint) -> Option<LightSample> {
        if self.triangles.is_empty() {
            return None;
        }
        let idx = self.triangle_dist.sample(rng.u());
        let (a, b, c) = self.triangles[idx];
        let (u1, u2) = rng.u2();
        let su = u1.sqrt();
        let bu = 1.0 - su;
        let bv = u2 * su;
        let p = a * (1.0 - bu - bv) + b * bu + c * bv;
        let n = (b - a).cross(c - a).normalize();

        let d = p - surf.p;
        let dist2 = d.length_squared();
        let distance = dist2.sqrt();
        let wo = d / distance;

        let light_surf = SurfacePoint::new(p, n, (0.0, 0.0));
        let pdf = self.pdf_light(surf, &light_surf, wo);
        if pdf <= 0.0 {
            return None;
        }
        Some(LightSample {
            wo,
            distance,
            le: self.eval(&light_surf, Vec3::ZERO, -wo),
            pdf,
        })
    }

    pub fn pdf_light(&self, surf: &SurfacePoint, emitter_surf: &SurfacePoint, wo: Vec3) -> f32 {
        let d = emitter_surf.p - surf.p;
        let dist2 = d.length_squared();
        if dist2 <= 0.0 {
            return 0.0;
        }
        let dir = d / dist2.sqrt();
        let cos_here = dir.dot(surf.n).abs();
        let cos_there = dir.dot(emitter_surf.n).abs();
        let _ = wo;
        let g = cos_here * cos_there / dist2;
        if g <= 0.0 {
            0.0
        } else {
            self.inv_area / g
        }
    }

    pub fn eval(&self, surf: &SurfacePoint, _wi: Vec3, wo: Vec3) -> Vec3 {
        if wo.dot(surf.n) > 0.0 {
            self.ke
        } else {
            Vec3::ZERO
        }
    }
}

fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b - a).cross(c - a).length() * 0.5
}

pub struct EnvLight {
    pub map: Texture,
    pub rotation_radians: f32,
    pub dist: Discrete2D,
}

impl EnvLight {
    pub fn new(map: Texture, rotation_degrees: f32) -> Self {
        let w = map.width;
        let h = map.height;
        let mut values = vec![0.0f32; w * h];
        for i in 0..w * h {
            let row = i / w;
            let weight = (std::f32::consts::PI * (row as f32 + 0.5) / h as f32).sin();
            values[i] = map.max_element_at(i) * weight;
        }
        let dist = Discrete2D::init(&values, w, h);
        Self {
            map,
            rotation_radians: rotation_degrees.to_radians(),
            dist,
        }
    }

    fn uv_from_dir(&self, wo: Vec3) -> (f32, f32) {
        let theta = wo.y.clamp(-1.0, 1.0).acos();
        let mut phi = wo.z.atan2(wo.x) - self.rotation_radians + std::f32::consts::FRAC_PI_2;
        phi -= std::f32::consts::TAU * (phi / std::f32::consts::TAU).floor();
        (phi / std::f32::consts::TAU, theta / std::f32::consts::PI)
    }

    pub fn sample_light(&self, rng: &mut Sampler, surf: &SurfacePoint) -> Option<LightSample> {
        let (u1, u2) = rng.u2();
        let (u3, u4) = rng.u2();
        let (u, v, _, _) = self.dist.sample(u1, u2, u3, u4);
        let theta = std::f32::consts::PI * v;
        let phi = std::f32::consts::TAU * u + self.rotation_radians;
        let wo = Vec3::new(theta.sin() * phi.sin(), theta.cos(), theta.sin() * phi.cos());
        let pdf = self.pdf_light(surf, &SurfacePoint::default(), wo);
        if pdf <= 0.0 {
            return None;
        }
        Some(LightSample {
            wo,
            distance: f32::INFINITY,
            le: self.eval_dir(-wo),
            pdf,
        })
    }

    pub fn pdf_light(&self, surf: &SurfacePoint, _emitter_surf: &SurfacePoint, wo: Vec3) -> f32 {
        let cos_here = wo.dot(surf.n).abs();
        if cos_here <= 0.0 {
            return 0.0;
        }
        let (u, v) = self.uv_from_dir(-wo);
        let sin_theta = (1.0 - (-wo).y.clamp(-1.0, 1.0).powi(2)).max(0.0).sqrt();
        if sin_theta <= 0.0 {
            return 0.0;
        }
        self.dist.pmf(u, v) / (2.0 * std::f32::consts::PI * std::f32::consts::PI * sin_theta * cos_here)
    }

    fn eval_dir(&self, wo: Vec3) -> Vec3 {
        self.map.eval(self.uv_from_dir(wo))
    }

    pub fn eval(&self, _surf: &SurfacePoint, _wi: Vec3, wo: Vec3) -> Vec3 {
        self.eval_dir(wo)
    }
}

/// The nine interaction variants.
pub enum Interaction {
    Pinhole(Pinhole),
    RealisticLens(Box<RealisticLens>),
    AreaLight(AreaLight),
    EnvLight(EnvLight),
    Diffuse(Diffuse),
    Glossy(Glossy),
    TransparentMask,
    FresnelSpecular(FresnelSpecular),
    PerfectMirror,
}

impl Interaction {
    pub fn is_emitter(&self) -> bool {
        matches!(self, Interaction::AreaLight(_) | Interaction::EnvLight(_))
    }

    pub fn is_specular(&self) -> bool {
        matches!(
            self,
            Interaction::TransparentMask | Interaction::FresnelSpecular(_) | Interaction::PerfectMirror
        )
    }

    pub fn is_non_specular(&self) -> bool {
        matches!(self, Interaction::Diffuse(_) | Interaction::Glossy(_))
    }

    pub fn is_sensor(&self) -> bool {
        matches!(self, Interaction::Pinhole(_) | Interaction::RealisticLens(_))
    }
}
