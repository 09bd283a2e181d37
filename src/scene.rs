//! Owns every object, the shared geometry arenas, and the accelerator; routes
//! intersection and light sampling for the integrator.
//!
//! The sensor is not one of `objects`; it lives in its own `sensor` field
//! since its sample/eval contract differs from a surface interaction. An
//! optional environment light, if present, is kept in `env_light` and its
//! `env_index` is appended to `light_indices` so uniform light picking
//! treats a miss toward it like hitting any other area light.

use glam::Vec3;

use crate::bvh::{Bvh, Triangle as BvhTriangle};
use crate::geometry::SceneGeometry;
use crate::interaction::SurfacePoint;
use crate::material::Interaction;
use crate::object::{face_geometric_normal, ComponentBundle, Object, SampledComponent};
use crate::ray::Ray;
use crate::sampler::Sampler;
use crate::vecmath::barycentric;

pub struct Hit {
    pub t: f32,
    pub object_index: usize,
    /// `None` only for the synthetic hit used to evaluate an environment
    /// light on a ray miss.
    pub surf: Option<SurfacePoint>,
}

pub struct Scene {
    pub geometry: SceneGeometry,
    pub objects: Vec<Object>,
    pub sensor: Interaction,
    pub env_light: Option<Interaction>,
    pub light_indices: Vec<usize>,
    pub env_index: Option<usize>,
    bvh: Bvh,
}

impl Scene {
    /// Builds the accelerator from every object's faces, resolving vertex
    /// positions through the shared geometry arenas.
    pub fn new(
        geometry: SceneGeometry,
        objects: Vec<Object>,
        sensor: Interaction,
        env_light: Option<Interaction>,
        light_indices: Vec<usize>,
        env_index: Option<usize>,
        worker_count: usize,
    ) -> Self {
        let mut triangles = Vec::new();
        for (object_index, object) in objects.iter().enumerate() {
            for (face_index, face) in object.faces.iter().enumerate() {
                let v0 = geometry.positions[face[0].position as usize];
                let v1 = geometry.positions[face[1].position as usize];
                let v2 = geometry.positions[face[2].position as usize];
                triangles.push(BvhTriangle {
                    object_index: object_index as u32,
                    face_index: face_index as u32,
                    v0,
                    v1,
                    v2,
                });
            }
        }
        let bvh = Bvh::build(triangles, worker_count);
        Self {
            geometry,
            objects,
            sensor,
            env_light,
            light_indices,
            env_index,
            bvh,
        }
    }

    /// Nearest-hit query. On a miss, returns a synthetic hit pointing at the
    /// environment light (if one exists and `use_env_lighting` is set) so the
    /// integrator can evaluate its radiance through the same code path as a
    /// surface hit; returns `None` on a miss otherwise. Shadow rays pass
    /// `use_env_lighting = false` so a miss toward a sampled environment
    /// direction is never mistaken for occlusion by the environment itself.
    pub fn isect(&self, ray: &Ray, t_min: f32, t_max: f32, use_env_lighting: bool) -> Option<Hit> {
        match self.bvh.intersect(ray.origin, ray.dir, t_min, t_max) {
            Some(hit) => {
                let object = &self.objects[hit.object_index as usize];
                let face = object.faces[hit.face_index as usize];
                let p = ray.at(hit.t);

                let n = if face[0].normal >= 0 && face[1].normal >= 0 && face[2].normal >= 0 {
                    let n0 = self.geometry.normals[face[0].normal as usize];
                    let n1 = self.geometry.normals[face[1].normal as usize];
                    let n2 = self.geometry.normals[face[2].normal as usize];
                    barycentric(n0, n1, n2, hit.u, hit.v).normalize()
                } else {
                    let v0 = self.geometry.positions[face[0].position as usize];
                    let v1 = self.geometry.positions[face[1].position as usize];
                    let v2 = self.geometry.positions[face[2].position as usize];
                    face_geometric_normal(v0, v1, v2)
                };

                let uv = if face[0].texcoord >= 0 && face[1].texcoord >= 0 && face[2].texcoord >= 0 {
                    let t0 = self.geometry.texcoords[face[0].texcoord as usize];
                    let t1 = self.geometry.texcoords[face[1].texcoord as usize];
                    let t2 = self.geometry.texcoords[face[2].texcoord as usize];
                    let uv = barycentric(t0, t1, t2, hit.u, hit.v);
                    (uv.x, uv.y)
                } else {
                    (0.0, 0.0)
                };

                Some(Hit {
                    t: hit.t,
                    object_index: hit.object_index as usize,
                    surf: Some(SurfacePoint::new(p, n, uv)),
                })
            }
            None => {
                if !use_env_lighting {
                    return None;
                }
                self.env_index.map(|idx| Hit {
                    t: f32::INFINITY,
                    object_index: idx,
                    surf: None,
                })
            }
        }
    }

    /// Picks one light uniformly; probability is `1 / light_count`.
    pub fn sample_light(&self, rng: &mut Sampler) -> Option<(usize, f32)> {
        if self.light_indices.is_empty() {
            return None;
        }
        let n = self.light_indices.len();
        let pick = (rng.u() * n as f32) as usize;
        let idx = self.light_indices[pick.min(n - 1)];
        Some((idx, 1.0 / n as f32))
    }

    pub fn pdf_light(&self) -> f32 {
        if self.light_indices.is_empty() {
            0.0
        } else {
            1.0 / self.light_indices.len() as f32
        }
    }

    pub fn object(&self, index: usize) -> &Object {
        &self.objects[index]
    }

    /// The component the integrator should evaluate emission through when a
    /// path directly hits object `index` (its area light, if it has one, or
    /// the environment sentinel).
    pub fn emitter_component_of(&self, index: usize) -> Option<SampledComponent<'_>> {
        if Some(index) == self.env_index {
            return match &self.env_light {
                Some(Interaction::EnvLight(env)) => Some(SampledComponent::EnvLight(env)),
                _ => None,
            };
        }
        self.objects[index].components.emitter_component()
    }

    pub fn component_bundle(&self, index: usize) -> &ComponentBundle {
        &self.objects[index].components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VertexIndices;
    use crate::material::{Diffuse, Pinhole};
    use glam::Vec2;

    fn single_triangle_scene() -> Scene {
        let mut geometry = SceneGeometry::new();
        geometry.positions = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        geometry.normals = vec![Vec3::Z];
        geometry.texcoords = vec![Vec2::ZERO];

        let faces = vec![[
            VertexIndices::new(0),
            VertexIndices::new(1),
            VertexIndices::new(2),
        ]];
        let bundle = ComponentBundle {
            diffuse: Some(Diffuse {
                kd: Vec3::splat(0.5),
                map_kd: None,
            }),
            ..Default::default()
        };
        let object = Object::new(faces, bundle);

        let sensor = Interaction::Pinhole(Pinhole::new(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::ZERO,
            Vec3::Y,
            40.0,
            1.0,
        ));

        Scene::new(geometry, vec![object], sensor, None, Vec::new(), None, 1)
    }

    #[test]
    fn isect_hits_single_triangle() {
        let scene = single_triangle_scene();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let hit = scene.isect(&ray, 0.0, f32::INFINITY, true).expect("should hit");
        assert_eq!(hit.object_index, 0);
        assert!(hit.surf.is_some());
    }

    #[test]
    fn isect_misses_with_no_env_light() {
        let scene = single_triangle_scene();
        let ray = Ray::new(Vec3::new(10.0, 10.0, -5.0), Vec3::Z);
        assert!(scene.isect(&ray, 0.0, f32::INFINITY, true).is_none());
    }

    #[test]
    fn no_lights_means_no_sample() {
        let scene = single_triangle_scene();
        let mut rng = Sampler::new(1, 0);
        assert!(scene.sample_light(&mut rng).is_none());
        assert_eq!(scene.pdf_light(), 0.0);
    }
}
