//! Wavefront OBJ/MTL loader. Parses geometry and material records into a
//! neutral `ParsedMesh` list; scene construction (picking interaction
//! variants, wiring area lights) happens one layer up in `Scene::from_parsed`
//! so this module never needs to know about the material/emitter model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};

use crate::error::RenderError;
use crate::geometry::{SceneGeometry, VertexIndices};
use crate::io::ppm;
use crate::texture::Texture;

/// Material parameters as read from an MTL block, before they are turned
/// into interaction variants.
#[derive(Debug, Clone, Default)]
pub struct MatParams {
    pub kd: Vec3,
    pub ks: Vec3,
    pub ni: f32,
    pub ns: f32,
    pub aniso: f32,
    pub ke: Vec3,
    pub illum: i32,
    pub map_kd: Option<usize>,
}

impl MatParams {
    fn new() -> Self {
        Self {
            kd: Vec3::ONE,
            ni: 1.5,
            ns: 1.0,
            illum: -1,
            ..Default::default()
        }
    }
}

/// One material-homogeneous group of triangles, as produced by the parser.
pub struct ParsedMesh {
    pub material: MatParams,
    pub faces: Vec<[VertexIndices; 3]>,
}

pub struct ParsedScene {
    pub geometry: SceneGeometry,
    pub textures: Vec<Texture>,
    pub meshes: Vec<ParsedMesh>,
}

/// Parses `path` and every `mtllib`/`map_Kd` file it references (relative to
/// `path`'s directory).
pub fn parse_obj(path: &Path) -> Result<ParsedScene, RenderError> {
    let text = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut geometry = SceneGeometry::new();
    let mut textures: Vec<Texture> = Vec::new();
    let mut texture_names: HashMap<String, usize> = HashMap::new();

    let mut materials: Vec<MatParams> = Vec::new();
    let mut material_names: HashMap<String, usize> = HashMap::new();
    let mut current_material: Option<usize> = None;

    let mut meshes: Vec<ParsedMesh> = Vec::new();
    let mut current_faces: Vec<[VertexIndices; 3]> = Vec::new();

    let flush = |meshes: &mut Vec<ParsedMesh>, faces: &mut Vec<[VertexIndices; 3]>, material: Option<usize>, materials: &[MatParams]| {
        if faces.is_empty() {
            return;
        }
        let material = material.map(|i| materials[i].clone()).unwrap_or_else(MatParams::new);
        meshes.push(ParsedMesh {
            material,
            faces: std::mem::take(faces),
        });
    };

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_ascii_whitespace();
        let Some(tag) = tokens.next() else { continue };
        let rest: Vec<&str> = tokens.collect();

        match tag {
            "v" => geometry.positions.push(parse_vec3(&rest, line_no)?),
            "vn" => geometry.normals.push(parse_vec3(&rest, line_no)?),
            "vt" => geometry.texcoords.push(parse_vec2(&rest, line_no)?),
            "f" => {
                if materials.is_empty() {
                    materials.push(MatParams::new());
                    current_material = Some(0);
                }
                let mut indices = Vec::with_capacity(rest.len());
                for token in &rest {
                    indices.push(parse_vertex_index(
                        token,
                        geometry.positions.len(),
                        geometry.texcoords.len(),
                        geometry.normals.len(),
                        line_no,
                    )?);
                }
                if indices.len() < 3 {
                    return Err(RenderError::ObjParse {
                        line: line_no,
                        message: "face needs at least 3 vertices".to_string(),
                    });
                }
                // (0,1,2)(0,2,3)... triangle fan; no planarity/winding check.
                for i in 1..indices.len() - 1 {
                    current_faces.push([indices[0], indices[i], indices[i + 1]]);
                }
            }
            "usemtl" => {
                let name = rest.first().copied().unwrap_or("");
                flush(&mut meshes, &mut current_faces, current_material, &materials);
                current_material = material_names.get(name).copied();
            }
            "mtllib" => {
                let name = rest.first().copied().unwrap_or("");
                load_mtl(
                    &base_dir.join(name),
                    &mut materials,
                    &mut material_names,
                    &mut textures,
                    &mut texture_names,
                )?;
            }
            _ => {}
        }
    }
    flush(&mut meshes, &mut current_faces, current_material, &materials);

    Ok(ParsedScene {
        geometry,
        textures,
        meshes,
    })
}

fn parse_vertex_index(token: &str, npos: usize, ntex: usize, nnorm: usize, line_no: usize) -> Result<VertexIndices, RenderError> {
    let mut parts = token.split('/');
    let p = resolve_index(parts.next().unwrap_or(""), npos, line_no)?.ok_or_else(|| RenderError::ObjParse {
        line: line_no,
        message: "face vertex missing position index".to_string(),
    })?;
    let t = match parts.next() {
        Some(s) => resolve_index(s, ntex, line_no)?,
        None => None,
    };
    let n = match parts.next() {
        Some(s) => resolve_index(s, nnorm, line_no)?,
        None => None,
    };
    Ok(VertexIndices {
        position: p as i32,
        texcoord: t.map(|i| i as i32).unwrap_or(-1),
        normal: n.map(|i| i as i32).unwrap_or(-1),
    })
}

/// OBJ indices are 1-based; negative indices count back from the end of the
/// list seen so far. An empty token (e.g. `v1//vn1`) means absent.
fn resolve_index(token: &str, count: usize, line_no: usize) -> Result<Option<usize>, RenderError> {
    if token.is_empty() {
        return Ok(None);
    }
    let i: i64 = token.parse().map_err(|_| RenderError::ObjParse {
        line: line_no,
        message: format!("bad index '{token}'"),
    })?;
    let resolved = if i < 0 { count as i64 + i } else { i - 1 };
    if resolved < 0 {
        return Err(RenderError::ObjParse {
            line: line_no,
            message: format!("index '{token}' out of range"),
        });
    }
    Ok(Some(resolved as usize))
}

fn parse_vec3(rest: &[&str], line_no: usize) -> Result<Vec3, RenderError> {
    if rest.len() < 3 {
        return Err(RenderError::ObjParse {
            line: line_no,
            message: "expected 3 components".to_string(),
        });
    }
    Ok(Vec3::new(parse_f32(rest[0], line_no)?, parse_f32(rest[1], line_no)?, parse_f32(rest[2], line_no)?))
}

fn parse_vec2(rest: &[&str], line_no: usize) -> Result<Vec2, RenderError> {
    if rest.len() < 2 {
        return Err(RenderError::ObjParse {
            line: line_no,
            message: "expected 2 components".to_string(),
        });
    }
    Ok(Vec2::new(parse_f32(rest[0], line_no)?, parse_f32(rest[1], line_no)?))
}

fn parse_f32(s: &str, line_no: usize) -> Result<f32, RenderError> {
    s.parse().map_err(|_| RenderError::ObjParse {
        line: line_no,
        message: format!("bad float '{s}'"),
    })
}

fn load_mtl(
    path: &Path,
    materials: &mut Vec<MatParams>,
    material_names: &mut HashMap<String, usize>,
    textures: &mut Vec<Texture>,
    texture_names: &mut HashMap<String, usize>,
) -> Result<(), RenderError> {
    tracing::info!(path = %path.display(), "loading MTL file");
    let text = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut current: Option<usize> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_ascii_whitespace();
        let Some(tag) = tokens.next() else { continue };
        let rest: Vec<&str> = tokens.collect();

        match tag {
            "newmtl" => {
                let name = rest.first().copied().unwrap_or("").to_string();
                material_names.insert(name, materials.len());
                current = Some(materials.len());
                materials.push(MatParams::new());
            }
            "Kd" => {
                let v = parse_vec3(&rest, line_no)?;
                set_field(materials, current, line_no, |m| m.kd = v)?
            }
            "Ks" => {
                let v = parse_vec3(&rest, line_no)?;
                set_field(materials, current, line_no, |m| m.ks = v)?
            }
            "Ni" => {
                let v = parse_f32(rest.first().copied().unwrap_or("1.5"), line_no)?;
                set_field(materials, current, line_no, |m| m.ni = v)?
            }
            "Ns" => {
                let v = parse_f32(rest.first().copied().unwrap_or("1.0"), line_no)?;
                set_field(materials, current, line_no, |m| m.ns = v)?
            }
            "aniso" => {
                let v = parse_f32(rest.first().copied().unwrap_or("0.0"), line_no)?;
                set_field(materials, current, line_no, |m| m.aniso = v)?
            }
            "Ke" => {
                let v = parse_vec3(&rest, line_no)?;
                set_field(materials, current, line_no, |m| m.ke = v)?
            }
            "illum" => {
                let v: i32 = rest
                    .first()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| RenderError::MtlParse {
                        line: line_no,
                        message: "bad illum value".to_string(),
                    })?;
                if let Some(i) = current {
                    materials[i].illum = v;
                }
            }
            "map_Kd" => {
                let name = rest.first().copied().unwrap_or("");
                let tex_index = match texture_names.get(name) {
                    Some(&i) => i,
                    None => {
                        let tex = load_texture_pair(&base_dir.join(name))?;
                        let idx = textures.len();
                        textures.push(tex);
                        texture_names.insert(name.to_string(), idx);
                        idx
                    }
                };
                if let Some(i) = current {
                    materials[i].map_kd = Some(tex_index);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn set_field(materials: &mut [MatParams], current: Option<usize>, line_no: usize, f: impl FnOnce(&mut MatParams)) -> Result<(), RenderError> {
    let Some(i) = current else {
        return Err(RenderError::MtlParse {
            line: line_no,
            message: "material property before any newmtl".to_string(),
        });
    };
    f(&mut materials[i]);
    Ok(())
}

/// Loads `<stem>.ppm` plus an optional `<stem>_alpha.ppm`, per §6.
fn load_texture_pair(path: &Path) -> Result<Texture, RenderError> {
    let ppm_path: PathBuf = path.with_extension("ppm");
    tracing::info!(path = %ppm_path.display(), "loading texture");
    let mut texture = ppm::load(&ppm_path)?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let alpha_path = path.with_file_name(format!("{stem}_alpha.ppm"));
    if alpha_path.exists() {
        let alpha_tex = ppm::load(&alpha_path)?;
        texture.alpha = Some(alpha_tex.pixels.iter().map(|p| p.x).collect());
    }
    Ok(texture)
}
