//! CLI surface and the validated configuration built from it.
//!
//! Argument order matches the original renderer's fixed positional argv
//! layout exactly (object file, env map, lens file, output, spp, max path
//! length, env rotation, resolution, eye, look-at, vfov, then the
//! lens-only focus/diagonal/sensitivity trio) so existing invocation
//! scripts keep working verbatim.

use clap::Parser;

use crate::error::RenderError;

#[derive(Parser, Debug)]
#[command(name = "rustic", about = "Physically-based Monte Carlo path tracer")]
pub struct Cli {
    /// Path to the Wavefront .obj scene file.
    pub obj_path: String,

    /// Path to a latitude-longitude environment map, or "" for none.
    #[arg(default_value = "")]
    pub env_map_path: String,

    /// Path to a lens prescription file, or "" for a pinhole camera.
    #[arg(default_value = "")]
    pub lens_path: String,

    /// Output PFM image path.
    pub output_path: String,

    /// Samples per pixel.
    pub spp: u32,

    /// Maximum path length (number of bounces).
    pub max_length: u32,

    /// Environment map rotation, in degrees.
    #[arg(default_value_t = 0.0)]
    pub env_rotation_degrees: f32,

    pub width: u32,
    pub height: u32,

    pub eye_x: f32,
    pub eye_y: f32,
    pub eye_z: f32,

    pub look_x: f32,
    pub look_y: f32,
    pub look_z: f32,

    /// Vertical field of view, in degrees (pinhole camera only).
    pub vfov_degrees: f32,

    /// Focus distance in meters (lens camera only).
    #[arg(default_value_t = 0.0)]
    pub lens_focus_distance: f32,

    /// Sensor diagonal in millimeters (lens camera only).
    #[arg(default_value_t = 0.0)]
    pub lens_sensor_diagonal_mm: f32,

    /// ISO-style sensitivity multiplier (lens camera only).
    #[arg(default_value_t = 1.0)]
    pub lens_sensitivity: f32,
}

pub struct RenderConfig {
    pub obj_path: String,
    pub env_map_path: Option<String>,
    pub lens_path: Option<String>,
    pub output_path: String,
    pub spp: u32,
    pub max_length: u32,
    pub env_rotation_degrees: f32,
    pub width: u32,
    pub height: u32,
    pub eye: glam::Vec3,
    pub look_at: glam::Vec3,
    pub vfov_degrees: f32,
    pub lens_focus_distance: f32,
    pub lens_sensor_diagonal_mm: f32,
    pub lens_sensitivity: f32,
}

impl TryFrom<Cli> for RenderConfig {
    type Error = RenderError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.spp == 0 {
            return Err(RenderError::InvalidArgument {
                message: "spp must be at least 1".to_string(),
            });
        }
        if cli.width == 0 || cli.height == 0 {
            return Err(RenderError::InvalidArgument {
                message: "width and height must be positive".to_string(),
            });
        }

        let lens_path = (!cli.lens_path.is_empty()).then_some(cli.lens_path);
        if lens_path.is_some() && cli.lens_sensor_diagonal_mm <= 0.0 {
            return Err(RenderError::InvalidArgument {
                message: "lens_sensor_diagonal_mm must be positive when a lens file is given".to_string(),
            });
        }

        Ok(Self {
            obj_path: cli.obj_path,
            env_map_path: (!cli.env_map_path.is_empty()).then_some(cli.env_map_path),
            lens_path,
            output_path: cli.output_path,
            spp: cli.spp,
            max_length: cli.max_length,
            env_rotation_degrees: cli.env_rotation_degrees,
            width: cli.width,
            height: cli.height,
            eye: glam::Vec3::new(cli.eye_x, cli.eye_y, cli.eye_z),
            look_at: glam::Vec3::new(cli.look_x, cli.look_y, cli.look_z),
            vfov_degrees: cli.vfov_degrees,
            lens_focus_distance: cli.lens_focus_distance,
            lens_sensor_diagonal_mm: cli.lens_sensor_diagonal_mm,
            lens_sensitivity: cli.lens_sensitivity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            obj_path: "scene.obj".to_string(),
            env_map_path: String::new(),
            lens_path: String::new(),
            output_path: "out.pfm".to_string(),
            spp: 64,
            max_length: 8,
            env_rotation_degrees: 0.0,
            width: 640,
            height: 480,
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
        }
    }

    #[test]
    fn rejects_zero_spp() {
        let mut cli = base_cli();
        cli.spp = 0;
        assert!(RenderConfig::try_from(cli).is_err());
    }

    #[test]
    fn empty_lens_path_becomes_none() {
        let cfg = RenderConfig::try_from(base_cli()).unwrap();
        assert!(cfg.lens_path.is_none());
    }

    #[test]
    fn lens_path_requires_sensor_diagonal() {
        let mut cli = base_cli();
        cli.lens_path = "lens.txt".to_string();
        assert!(RenderConfig::try_from(cli).is_err());
    }
}
