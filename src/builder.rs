//! Turns a parsed OBJ scene plus the CLI configuration into a `Scene`:
//! material-parameter-to-interaction-variant mapping, sensor setup, and
//! optional environment light wiring.
//!
//! Grounded in the reference renderer's `Scene` constructor: `illum == 7`
//! becomes a Fresnel dielectric, `illum == 5` a perfect mirror, anything else
//! gets a diffuse+glossy lobe pair with an area light bolted on when
//! `Ke.max_element() > 0`.

use std::sync::Arc;

use glam::Vec3;

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::io::obj::{MatParams, ParsedScene};
use crate::io::{lens_file, obj, pfm, ppm};
use crate::lens::RealisticLens;
use crate::material::{AreaLight, Diffuse, EnvLight, FresnelSpecular, Glossy, Interaction, Pinhole};
use crate::object::{ComponentBundle, Object};
use crate::scene::Scene;
use crate::texture::Texture;

pub fn build_scene(config: &RenderConfig, worker_count: usize) -> Result<Scene, RenderError> {
    let parsed: ParsedScene = obj::parse_obj(std::path::Path::new(&config.obj_path))?;
    let textures: Vec<Arc<Texture>> = parsed.textures.into_iter().map(Arc::new).collect();

    let mut objects = Vec::with_capacity(parsed.meshes.len());
    let mut light_indices = Vec::new();

    for mesh in parsed.meshes {
        let mut bundle = bundle_from_material(&mesh.material, &textures);
        if mesh.material.ke.max_element() > 0.0 && bundle.specular_fresnel.is_none() && !bundle.specular_mirror {
            let triangles = mesh
                .faces
                .iter()
                .map(|face| {
                    let a = parsed.geometry.positions[face[0].position as usize];
                    let b = parsed.geometry.positions[face[1].position as usize];
                    let c = parsed.geometry.positions[face[2].position as usize];
                    (a, b, c)
                })
                .collect();
            bundle.emitter = Some(AreaLight::new(mesh.material.ke, triangles));
        }
        if bundle.is_emitter() {
            light_indices.push(objects.len());
        }
        objects.push(Object::new(mesh.faces, bundle));
    }

    let aspect = config.width as f32 / config.height as f32;
    let sensor = if let Some(lens_path) = &config.lens_path {
        let elements = lens_file::parse(std::path::Path::new(lens_path))?;
        Interaction::RealisticLens(Box::new(RealisticLens::new(
            elements,
            config.eye,
            config.look_at,
            Vec3::Y,
            config.lens_focus_distance,
            config.lens_sensor_diagonal_mm,
            config.lens_sensitivity,
            aspect,
        )))
    } else {
        Interaction::Pinhole(Pinhole::new(config.eye, config.look_at, Vec3::Y, config.vfov_degrees, aspect))
    };

    let (env_light, env_index) = if let Some(env_path) = &config.env_map_path {
        let map = pfm::load(std::path::Path::new(env_path)).or_else(|_| ppm::load(std::path::Path::new(env_path)))?;
        let env = EnvLight::new(map, config.env_rotation_degrees);
        let idx = objects.len() + 1; // objects.len() real objects, env sentinel one past them
        light_indices.push(idx);
        (Some(Interaction::EnvLight(env)), Some(idx))
    } else {
        (None, None)
    };

    Ok(Scene::new(
        parsed.geometry,
        objects,
        sensor,
        env_light,
        light_indices,
        env_index,
        worker_count,
    ))
}

/// Maps material parameters to a component bundle, except for the emitter:
/// an area light needs the owning object's world-space triangles, which the
/// caller attaches afterward when `m.ke.max_element() > 0`.
fn bundle_from_material(m: &MatParams, textures: &[Arc<Texture>]) -> ComponentBundle {
    if m.illum == 7 {
        return ComponentBundle {
            specular_fresnel: Some(FresnelSpecular { ni: m.ni }),
            ..Default::default()
        };
    }
    if m.illum == 5 {
        return ComponentBundle {
            specular_mirror: true,
            ..Default::default()
        };
    }

    let map_kd = m.map_kd.map(|i| textures[i].clone());
    let diffuse = Some(Diffuse { kd: m.kd, map_kd });
    let glossy = Some(Glossy::from_phong_params(m.ks, m.ns, m.aniso));

    ComponentBundle {
        diffuse,
        glossy,
        ..Default::default()
    }
}
