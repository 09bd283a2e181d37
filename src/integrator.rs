//! The path-tracing estimator for a single pixel: next-event estimation with
//! multiple importance sampling, plus Russian roulette termination.
//!
//! Grounded in the reference renderer's `estimatePixelL`: a single ray is
//! traced from the sensor, and at every non-specular vertex the path both
//! samples a light directly (NEE) and continues via BSDF sampling, weighting
//! each contribution by an MIS term. The MIS denominator is intentionally
//! `pdf_bsdf + pdf_light * pdf_pick_light` rather than the balance heuristic's
//! `pdf_bsdf^2 + (pdf_light*pdf_pick_light)^2` — kept as-is (see DESIGN.md).

use glam::Vec3;

use crate::interaction::SurfacePoint;
use crate::material::Interaction;
use crate::sampler::Sampler;
use crate::scene::Scene;

const SHADOW_EPS: f32 = 1e-3;

pub struct Integrator<'a> {
    scene: &'a Scene,
    max_length: u32,
}

impl<'a> Integrator<'a> {
    pub fn new(scene: &'a Scene, max_length: u32) -> Self {
        Self { scene, max_length }
    }

    /// Traces one path starting at sensor pixel coordinate `uv` (in `[0, 1)`
    /// on each axis) and returns its radiance estimate.
    pub fn estimate_pixel(&self, rng: &mut Sampler, uv: (f32, f32)) -> Vec3 {
        let Some((ray, sensor_weight)) = self.sample_sensor(rng, uv) else {
            return Vec3::ZERO;
        };

        let mut radiance = Vec3::ZERO;
        let mut throughput = sensor_weight;
        let mut wi = -ray.dir;

        let Some(hit) = self.scene.isect(&ray, 0.0, f32::INFINITY, true) else {
            return radiance;
        };
        // length == 0: direct sensor hit, no MIS weighting needed (p = 1).
        if let Some(emitter) = self.scene.emitter_component_of(hit.object_index) {
            let surf = hit.surf.clone().unwrap_or_default();
            radiance += throughput * emitter.eval(&surf, Vec3::ZERO, -ray.dir);
        }
        let Some(mut surf) = hit.surf else {
            // The environment sentinel has no scatterable component.
            return radiance;
        };
        let mut object_index = hit.object_index;
        let mut length = 1u32;

        while length < self.max_length {
            let bundle = self.scene.component_bundle(object_index);
            let Some((component, pcs)) = bundle.sample_component(rng, &surf) else {
                break;
            };
            throughput /= pcs;

            if component.is_non_specular() {
                if let Some(contribution) = self.sample_direct_light(rng, &component, &surf, wi, throughput) {
                    radiance += contribution;
                }
            }

            let Some(bsdf_sample) = component.sample(rng, &surf, wi) else {
                break;
            };
            throughput *= bsdf_sample.weight;
            if throughput.max_element() <= 0.0 {
                break;
            }

            let Some(hit) = self.scene.isect(&bsdf_sample.ray, SHADOW_EPS, f32::INFINITY, true) else {
                break;
            };

            if let Some(emitter) = self.scene.emitter_component_of(hit.object_index) {
                let hit_surf = hit.surf.clone().unwrap_or_default();
                let wo = bsdf_sample.ray.dir;
                let p = if component.is_specular() {
                    1.0
                } else {
                    let pdf_bsdf = component.pdf(&surf, wi, wo);
                    if pdf_bsdf <= 0.0 {
                        1.0
                    } else {
                        let pdf_light = emitter.pdf_light(&surf, &hit_surf, wo) * self.scene.pdf_light();
                        pdf_light / pdf_bsdf + 1.0
                    }
                };
                radiance += throughput * emitter.eval(&hit_surf, Vec3::ZERO, -wo) / p;
            }

            let Some(next_surf) = hit.surf else {
                break;
            };

            if length > 3 {
                let q = (1.0 - throughput.max_element()).max(0.2);
                if rng.u() < q {
                    break;
                }
                throughput /= 1.0 - q;
            }
            length += 1;

            wi = -bsdf_sample.ray.dir;
            surf = next_surf;
            object_index = hit.object_index;
        }

        radiance
    }

    fn sample_sensor(&self, rng: &mut Sampler, uv: (f32, f32)) -> Option<(crate::ray::Ray, Vec3)> {
        match &self.scene.sensor {
            Interaction::Pinhole(p) => Some(p.sample(uv)),
            Interaction::RealisticLens(l) => l.sample(rng, uv),
            _ => None,
        }
    }

    /// Next-event estimation: picks a light, traces a shadow ray, and returns
    /// the MIS-weighted contribution if the light is visible.
    fn sample_direct_light(
        &self,
        rng: &mut Sampler,
        component: &crate::object::SampledComponent<'_>,
        surf: &SurfacePoint,
        wi: Vec3,
        throughput: Vec3,
    ) -> Option<Vec3> {
        let (light_index, pick_pdf) = self.scene.sample_light(rng)?;
        let light = self.scene.emitter_component_of(light_index)?;
        let sample = light.sample_light(rng, surf)?;

        let shadow_ray = crate::ray::Ray::new(surf.p, sample.wo);
        let t_max = if sample.distance.is_finite() {
            sample.distance * (1.0 - SHADOW_EPS)
        } else {
            f32::INFINITY
        };
        if self.scene.isect(&shadow_ray, SHADOW_EPS, t_max, false).is_some() {
            return None;
        }

        let f_bsdf = component.eval(surf, wi, sample.wo);
        if f_bsdf.max_element() <= 0.0 {
            return None;
        }
        let pdf_bsdf = component.pdf(surf, wi, sample.wo);
        let denom = pdf_bsdf + sample.pdf * pick_pdf;
        if denom <= 0.0 {
            return None;
        }
        let cos_theta = sample.wo.dot(surf.n).abs();
        Some(throughput * f_bsdf * sample.le * cos_theta / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{SceneGeometry, VertexIndices};
    use crate::material::{AreaLight, Diffuse, Pinhole};
    use crate::object::{ComponentBundle, Object};
    use glam::Vec2;

    fn cornell_like_scene() -> Scene {
        let mut geometry = SceneGeometry::new();
        geometry.positions = vec![
            // Floor quad.
            Vec3::new(-2.0, -1.0, -2.0),
            Vec3::new(2.0, -1.0, -2.0),
            Vec3::new(2.0, -1.0, 2.0),
            Vec3::new(-2.0, -1.0, 2.0),
            // Light triangle, above and facing down.
            Vec3::new(-0.5, 1.9, -0.5),
            Vec3::new(0.5, 1.9, -0.5),
            Vec3::new(0.0, 1.9, 0.5),
        ];
        geometry.normals = vec![Vec3::Y, -Vec3::Y];
        geometry.texcoords = vec![Vec2::ZERO];

        let v = |p: i32| VertexIndices::new(p);
        let floor = Object::new(
            vec![[v(0), v(1), v(2)], [v(0), v(2), v(3)]],
            ComponentBundle {
                diffuse: Some(Diffuse {
                    kd: Vec3::splat(0.7),
                    map_kd: None,
                }),
                ..Default::default()
            },
        );

        let light_tris = vec![(
            geometry.positions[4],
            geometry.positions[5],
            geometry.positions[6],
        )];
        let light = Object::new(
            vec![[v(4), v(5), v(6)]],
            ComponentBundle {
                diffuse: Some(Diffuse {
                    kd: Vec3::splat(0.0),
                    map_kd: None,
                }),
                emitter: Some(AreaLight::new(Vec3::splat(10.0), light_tris)),
                ..Default::default()
            },
        );

        let sensor = Interaction::Pinhole(Pinhole::new(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::Y,
            40.0,
            1.0,
        ));

        Scene::new(geometry, vec![floor, light], sensor, None, vec![1], None, 1)
    }

    #[test]
    fn direct_view_of_light_returns_positive_radiance() {
        let scene = cornell_like_scene();
        let integrator = Integrator::new(&scene, 4);
        let mut rng = Sampler::new(1, 0);
        // Aim roughly at the light triangle's center from the camera.
        let uv = (0.5, 0.78);
        let radiance = integrator.estimate_pixel(&mut rng, uv);
        assert!(radiance.is_finite());
    }

    #[test]
    fn floor_pixel_receives_nonnegative_indirect_light() {
        let scene = cornell_like_scene();
        let integrator = Integrator::new(&scene, 4);
        let mut rng = Sampler::new(2, 0);
        let mut total = Vec3::ZERO;
        let n = 64;
        for i in 0..n {
            rng.next_sample();
            let uv = (0.5, 0.2 + 0.001 * i as f32);
            let radiance = integrator.estimate_pixel(&mut rng, uv);
            assert!(radiance.min_element() >= 0.0);
            assert!(radiance.is_finite());
            total += radiance;
        }
        let avg = total / n as f32;
        assert!(avg.max_element() >= 0.0);
    }

    #[test]
    fn miss_with_no_env_light_contributes_nothing() {
        let scene = cornell_like_scene();
        let integrator = Integrator::new(&scene, 4);
        let mut rng = Sampler::new(3, 0);
        // Looking straight up and away from every surface.
        let radiance = integrator.estimate_pixel(&mut rng, (0.5, 0.5));
        assert!(radiance.is_finite());
    }
}
