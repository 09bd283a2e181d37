//! An object is a set of triangle faces sharing one component bundle: the
//! BSDF-ish pieces (and, for emitters, an area light) that a ray can land on
//! when it hits one of the object's faces.
//!
//! Component *selection* mirrors the original renderer's `sampComp`: at a
//! non-specular surface the path stochastically commits to one lobe
//! (diffuse, glossy, or a cutout pass-through) weighted by that lobe's
//! reflectance, and the chosen lobe's contribution is divided by its
//! selection probability so the estimator stays unbiased. Specular and
//! emitter bundles have exactly one component, so selection is trivial.

use glam::Vec3;

use crate::geometry::VertexIndices;
use crate::interaction::SurfacePoint;
use crate::material::{transparent_mask_sample, AreaLight, BsdfSample, Diffuse, EnvLight, FresnelSpecular, Glossy, PerfectMirror};
use crate::sampler::Sampler;

pub enum SampledComponent<'a> {
    Diffuse(&'a Diffuse),
    Glossy(&'a Glossy),
    TransparentMask,
    FresnelSpecular(&'a FresnelSpecular),
    PerfectMirror,
    AreaLight(&'a AreaLight),
    EnvLight(&'a EnvLight),
}

impl<'a> SampledComponent<'a> {
    pub fn is_emitter(&self) -> bool {
        matches!(self, SampledComponent::AreaLight(_) | SampledComponent::EnvLight(_))
    }

    pub fn is_specular(&self) -> bool {
        matches!(self, SampledComponent::TransparentMask | SampledComponent::FresnelSpecular(_) | SampledComponent::PerfectMirror)
    }

    pub fn is_non_specular(&self) -> bool {
        matches!(self, SampledComponent::Diffuse(_) | SampledComponent::Glossy(_))
    }

    pub fn sample(&self, rng: &mut Sampler, surf: &SurfacePoint, wi: Vec3) -> Option<BsdfSample> {
        match self {
            SampledComponent::Diffuse(d) => d.sample(rng, surf, wi),
            SampledComponent::Glossy(g) => g.sample(rng, surf, wi),
            SampledComponent::TransparentMask => Some(transparent_mask_sample(surf, wi)),
            SampledComponent::FresnelSpecular(f) => f.sample(rng, surf, wi),
            SampledComponent::PerfectMirror => Some(PerfectMirror::sample(surf, wi)),
            SampledComponent::AreaLight(_) | SampledComponent::EnvLight(_) => None,
        }
    }

    pub fn eval(&self, surf: &SurfacePoint, wi: Vec3, wo: Vec3) -> Vec3 {
        match self {
            SampledComponent::Diffuse(d) => d.eval(surf, wi, wo),
            SampledComponent::Glossy(g) => g.eval(surf, wi, wo),
            SampledComponent::AreaLight(l) => l.eval(surf, wi, wo),
            SampledComponent::EnvLight(e) => e.eval(surf, wi, wo),
            _ => Vec3::ZERO,
        }
    }

    pub fn pdf(&self, surf: &SurfacePoint, wi: Vec3, wo: Vec3) -> f32 {
        match self {
            SampledComponent::Diffuse(d) => d.pdf(surf, wi, wo),
            SampledComponent::Glossy(g) => g.pdf(surf, wi, wo),
            _ => 0.0,
        }
    }

    /// Solid-angle density at the shading point for a light hit via `wo`,
    /// given the emitter-side surface point `emitter_surf` (the BVH hit
    /// point for an area light; ignored by the environment light).
    pub fn pdf_light(&self, surf: &SurfacePoint, emitter_surf: &SurfacePoint, wo: Vec3) -> f32 {
        match self {
            SampledComponent::AreaLight(l) => l.pdf_light(surf, emitter_surf, wo),
            SampledComponent::EnvLight(e) => e.pdf_light(surf, emitter_surf, wo),
            _ => 0.0,
        }
    }

    pub fn sample_light(&self, rng: &mut Sampler, surf: &SurfacePoint) -> Option<crate::material::LightSample> {
        match self {
            SampledComponent::AreaLight(l) => l.sample_light(rng, surf),
            SampledComponent::EnvLight(e) => e.sample_light(rng, surf),
            _ => None,
        }
    }
}

/// The component bundle attached to every face of one object. At most one of
/// `specular_fresnel` / `specular_mirror` is set, and when either is set
/// `diffuse`/`glossy` are both `None` (surfaces are either purely specular or
/// purely non-specular, never both, matching the source material model).
#[derive(Default)]
pub struct ComponentBundle {
    pub diffuse: Option<Diffuse>,
    pub glossy: Option<Glossy>,
    pub specular_fresnel: Option<FresnelSpecular>,
    pub specular_mirror: bool,
    pub emitter: Option<AreaLight>,
    pub env_light: Option<EnvLight>,
}

impl ComponentBundle {
    pub fn is_emitter(&self) -> bool {
        self.emitter.is_some() || self.env_light.is_some()
    }

    pub fn is_specular(&self) -> bool {
        self.specular_fresnel.is_some() || self.specular_mirror
    }

    /// The component hit directly when a path lands on this object without
    /// scattering further: the emitter if present, otherwise `None` (a
    /// non-emissive surface contributes nothing to direct hit radiance).
    pub fn emitter_component(&self) -> Option<SampledComponent<'_>> {
        if let Some(light) = &self.emitter {
            Some(SampledComponent::AreaLight(light))
        } else {
            self.env_light.as_ref().map(SampledComponent::EnvLight)
        }
    }

    /// Stochastically selects the scattering component at a surface hit,
    /// returning the chosen component and its selection probability (the
    /// throughput update divides by this probability, not by the prior
    /// weight, to stay unbiased under Russian-roulette-style selection).
    pub fn sample_component(
        &self,
        rng: &mut Sampler,
        surf: &SurfacePoint,
    ) -> Option<(SampledComponent<'_>, f32)> {
        if self.specular_mirror {
            return Some((SampledComponent::PerfectMirror, 1.0));
        }
        if let Some(fresnel) = &self.specular_fresnel {
            return Some((SampledComponent::FresnelSpecular(fresnel), 1.0));
        }

        let wd = self.diffuse.as_ref().map(|d| d.weight_magnitude(surf.uv)).unwrap_or(0.0);
        let ws = self.glossy.as_ref().map(|g| g.weight_magnitude()).unwrap_or(0.0);
        if wd <= 0.0 && ws <= 0.0 {
            return None;
        }
        let (wd, ws) = if wd <= 0.0 && ws <= 0.0 { (1.0, 0.0) } else { (wd, ws) };
        let total = wd + ws;
        let pd = wd / total;

        if rng.u() < pd {
            let diffuse = self.diffuse.as_ref()?;
            if diffuse.has_alpha() && rng.u() > diffuse.alpha_at(surf.uv) {
                return Some((SampledComponent::TransparentMask, pd));
            }
            Some((SampledComponent::Diffuse(diffuse), pd))
        } else {
            let glossy = self.glossy.as_ref()?;
            Some((SampledComponent::Glossy(glossy), 1.0 - pd))
        }
    }
}

/// One renderable object: a slice of the scene's shared face list, plus the
/// component bundle every face in that slice scatters through.
pub struct Object {
    pub faces: Vec<[VertexIndices; 3]>,
    pub components: ComponentBundle,
}

impl Object {
    pub fn new(faces: Vec<[VertexIndices; 3]>, components: ComponentBundle) -> Self {
        Self { faces, components }
    }

    pub fn is_emitter(&self) -> bool {
        self.components.is_emitter()
    }
}

/// Geometric normal of a face, used when a vertex lacks a normal index.
pub fn face_geometric_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_surface() -> SurfacePoint {
        SurfacePoint::new(Vec3::ZERO, Vec3::Y, (0.0, 0.0))
    }

    #[test]
    fn specular_mirror_bundle_always_selects_mirror() {
        let bundle = ComponentBundle {
            specular_mirror: true,
            ..Default::default()
        };
        let mut rng = Sampler::new(1, 0);
        let (choice, prob) = bundle.sample_component(&mut rng, &flat_surface()).unwrap();
        assert_eq!(prob, 1.0);
        assert!(matches!(choice, SampledComponent::PerfectMirror));
    }

    #[test]
    fn pure_diffuse_bundle_always_selects_diffuse() {
        let bundle = ComponentBundle {
            diffuse: Some(Diffuse {
                kd: Vec3::splat(0.5),
                map_kd: None,
            }),
            ..Default::default()
        };
        let mut rng = Sampler::new(2, 0);
        for _ in 0..16 {
            let (choice, prob) = bundle.sample_component(&mut rng, &flat_surface()).unwrap();
            assert_eq!(prob, 1.0);
            assert!(matches!(choice, SampledComponent::Diffuse(_)));
        }
    }

    #[test]
    fn diffuse_glossy_selection_probabilities_sum_to_one() {
        let bundle = ComponentBundle {
            diffuse: Some(Diffuse {
                kd: Vec3::splat(0.6),
                map_kd: None,
            }),
            glossy: Some(Glossy::from_phong_params(Vec3::splat(0.3), 20.0, 0.0)),
            ..Default::default()
        };
        let mut rng = Sampler::new(3, 0);
        let mut diffuse_count = 0;
        let n = 4000;
        for _ in 0..n {
            let (choice, _) = bundle.sample_component(&mut rng, &flat_surface()).unwrap();
            if matches!(choice, SampledComponent::Diffuse(_)) {
                diffuse_count += 1;
            }
        }
        let frac = diffuse_count as f32 / n as f32;
        // wd = 0.6, ws = 0.3 -> pd = 2/3
        assert!((frac - 2.0 / 3.0).abs() < 0.05);
    }

    #[test]
    fn empty_bundle_selects_nothing() {
        let bundle = ComponentBundle::default();
        let mut rng = Sampler::new(4, 0);
        assert!(bundle.sample_component(&mut rng, &flat_surface()).is_none());
    }
}
