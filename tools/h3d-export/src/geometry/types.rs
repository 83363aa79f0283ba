//! Types shared by the geometry stages

use std::ops::Range;

use glam::{Vec2, Vec3};
use hashbrown::HashMap;

use crate::scene_graph::NodeId;
use crate::skeleton::MAX_INFLUENCES;
use crate::source::MAX_TEX_SETS;

/// Output vertex
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Bind-pose position before skinning (bind shape and up axis applied)
    pub stored_pos: Vec3,
    /// Bind-pose skinned position
    pub pos: Vec3,
    /// Source normal, used for deduplication and seam merging only
    pub stored_normal: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub tex_coords: [Vec2; MAX_TEX_SETS],
    /// `None` binds to the identity root
    pub joints: [Option<NodeId>; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
    /// Source position index this vertex was derived from
    pub position_index: u32,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            stored_pos: Vec3::ZERO,
            pos: Vec3::ZERO,
            stored_normal: Vec3::ZERO,
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            bitangent: Vec3::ZERO,
            tex_coords: [Vec2::ZERO; MAX_TEX_SETS],
            joints: [None; MAX_INFLUENCES],
            weights: [1.0, 0.0, 0.0, 0.0],
            position_index: 0,
        }
    }
}

impl Vertex {
    /// Exact attribute equality used for deduplication
    pub fn same_attributes(&self, other: &Vertex) -> bool {
        self.stored_pos == other.stored_pos
            && self.stored_normal == other.stored_normal
            && self.tex_coords == other.tex_coords
    }
}

/// Contiguous run of triangles sharing one material
#[derive(Debug, Clone, Default)]
pub struct TriGroup {
    /// First index in the shared index buffer
    pub first: u32,
    /// Number of indices
    pub count: u32,
    pub vert_r_start: u32,
    /// Inclusive
    pub vert_r_end: u32,
    pub material: String,
    /// Source position index → vertices created for it; cleared after optimization
    pub(crate) position_buckets: HashMap<u32, Vec<u32>>,
}

impl TriGroup {
    pub fn index_range(&self) -> Range<usize> {
        self.first as usize..(self.first + self.count) as usize
    }

    pub fn vertex_range(&self) -> Range<usize> {
        self.vert_r_start as usize..self.vert_r_end as usize + 1
    }

    pub fn triangle_count(&self) -> u32 {
        self.count / 3
    }

    /// Vertices sharing a source position index
    pub fn bucket(&self, position_index: u32) -> &[u32] {
        self.position_buckets
            .get(&position_index)
            .map_or(&[], Vec::as_slice)
    }
}

/// Change applied to one vertex by a morph target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphDiff {
    pub vertex: u32,
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

/// Sparse morph target: only vertices the target moves are listed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphTarget {
    pub name: String,
    pub diffs: Vec<MorphDiff>,
}
