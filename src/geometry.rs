//! Shared geometry arenas and the vertex-index triples that faces reference.

use glam::{Vec2, Vec3};

/// References into the geometry arenas for one vertex of a face. `-1` marks
/// an absent attribute (e.g. no per-vertex normal or texcoord was supplied).
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexIndices {
    pub position: i32,
    pub normal: i32,
    pub texcoord: i32,
}

impl VertexIndices {
    pub fn new(position: i32) -> Self {
        Self {
            position,
            normal: -1,
            texcoord: -1,
        }
    }
}

/// Three parallel arenas shared by every object in the scene.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
}

impl SceneGeometry {
    pub fn new() -> Self {
        Self::default()
    }
}
