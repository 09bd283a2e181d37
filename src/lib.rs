//! Physically-based Monte Carlo path tracer: parses a Wavefront OBJ scene,
//! renders it with next-event estimation and multiple importance sampling,
//! and writes the result as PPM or PFM.

pub mod bounds;
pub mod builder;
pub mod bvh;
pub mod config;
pub mod distribution;
pub mod error;
pub mod film;
pub mod geometry;
pub mod integrator;
pub mod interaction;
pub mod io;
pub mod lens;
pub mod material;
pub mod object;
pub mod progress;
pub mod ray;
pub mod sampler;
pub mod scene;
pub mod texture;
pub mod vecmath;

use config::RenderConfig;
use error::RenderError;
use film::Film;
use integrator::Integrator;
use progress::Progress;
use sampler::Sampler;

const BASE_SEED: u32 = 42;

/// Parses the scene, renders it at `config.spp` samples per pixel across a
/// worker per available core, and writes the result to `config.output_path`.
pub fn run(config: RenderConfig) -> Result<(), RenderError> {
    let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

    tracing::info!(obj = %config.obj_path, "loading scene");
    let scene = builder::build_scene(&config, worker_count)?;

    let mut film = Film::new(config.width as usize, config.height as usize);
    let integrator = Integrator::new(&scene, config.max_length);
    let total_samples = config.spp as u64 * config.width as u64 * config.height as u64;
    let progress = Progress::new(total_samples);

    tracing::info!(width = config.width, height = config.height, spp = config.spp, workers = worker_count, "rendering");
    render_film(&mut film, &integrator, &progress, &config, worker_count);
    progress.finish();

    tracing::info!(path = %config.output_path, "saving image");
    io::pfm::write(std::path::Path::new(&config.output_path), &film)?;
    Ok(())
}

/// Splits the film into disjoint row ranges, one per worker thread, so each
/// thread can write its slice of the pixel buffer without synchronization.
fn render_film(film: &mut Film, integrator: &Integrator<'_>, progress: &Progress, config: &RenderConfig, worker_count: usize) {
    let width = config.width as usize;
    let height = config.height as usize;
    let spp = config.spp;
    let rows_per_chunk = height.div_ceil(worker_count).max(1);

    std::thread::scope(|scope| {
        for (chunk_index, rows) in film.pixels_mut().chunks_mut(width * rows_per_chunk).enumerate() {
            let row_start = chunk_index * rows_per_chunk;
            scope.spawn(move || {
                let mut rng = Sampler::new(BASE_SEED, chunk_index as u32);
                for (local_y, row) in rows.chunks_mut(width).enumerate() {
                    let y = row_start + local_y;
                    for x in 0..width {
                        let mut accum = glam::Vec3::ZERO;
                        for _ in 0..spp {
                            rng.next_sample();
                            let uv = ((x as f32 + rng.u()) / width as f32, (y as f32 + rng.u()) / height as f32);
                            accum += integrator.estimate_pixel(&mut rng, uv);
                        }
                        row[x] = accum / spp as f32;
                        progress.advance(spp as u64);
                    }
                }
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Cli;

    #[test]
    fn run_renders_and_writes_a_small_scene() {
        let dir = std::env::temp_dir();
        let obj_path = dir.join("rustic_test_lib_run.obj");
        let out_path = dir.join("rustic_test_lib_run.pfm");
        std::fs::write(
            &obj_path,
            "v -1 -1 0\nv 1 -1 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();

        let cli = Cli {
            obj_path: obj_path.to_str().unwrap().to_string(),
            env_map_path: String::new(),
            lens_path: String::new(),
            output_path: out_path.to_str().unwrap().to_string(),
            spp: 1,
            max_length: 2,
            env_rotation_degrees: 0.0,
            width: 4,
            height: 4,
            eye_x: 0.0,
            eye_y: 0.0,
            eye_z: -5.0,
            look_x: 0.0,
            look_y: 0.0,
            look_z: 0.0,
            vfov_degrees: 40.0,
            lens_focus_distance: 0.0,
            lens_sensor_diagonal_mm: 0.0,
            lens_sensitivity: 1.0,
        };
        let render_config = RenderConfig::try_from(cli).unwrap();
        run(render_config).unwrap();

        assert!(out_path.exists());
        std::fs::remove_file(&obj_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
