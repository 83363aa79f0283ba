//! Vertex deduplication
//!
//! Builds the shared vertex and index buffers one triangle group at a time.
//! Corners are compared only against vertices derived from the same source
//! position, which splits vertices along UV and normal seams without hashing
//! whole attribute sets.

use glam::{Mat4, Vec2, Vec3};
use hashbrown::HashMap;

use super::{TriGroup, Vertex};
use crate::context::ConversionContext;
use crate::scene_graph::NodeKind;
use crate::skeleton::SkinBinding;
use crate::source::{SourceCorner, SourceMesh, SourceScene, SourceTriGroup, UpAxis, MAX_TEX_SETS};

/// Fill the vertex and index buffers for every mesh node
pub fn build_vertex_buffers(scene: &SourceScene, ctx: &mut ConversionContext) {
    for mesh_id in ctx.meshes.clone() {
        let node = ctx.node(mesh_id);
        let Some(data) = node.mesh() else {
            continue;
        };
        let name = node.name.clone();
        let mesh = &scene.meshes[data.source_mesh];
        let bind_shape = data.bind_shape;
        let binding = data.skin.map(|skin| SkinBinding::resolve(scene, ctx, skin));

        let mut builder = GroupBuilder {
            mesh,
            binding: binding.as_ref(),
            bind_shape,
            up_axis: scene.up_axis,
            vertices: &mut ctx.vertices,
            indices: &mut ctx.indices,
        };
        let mut groups = Vec::with_capacity(mesh.groups.len());
        for group in &mesh.groups {
            match builder.build(group) {
                Some(tri_group) => groups.push(tri_group),
                None => tracing::warn!(
                    "Mesh '{}' has no valid triangles for material '{}', skipping group",
                    name,
                    group.material
                ),
            }
        }

        if let NodeKind::Mesh(data) = &mut ctx.node_mut(mesh_id).kind {
            data.tri_groups = groups;
        }
    }

    tracing::debug!(
        "Deduplicated to {} vertices, {} indices",
        ctx.vertices.len(),
        ctx.indices.len()
    );
}

struct GroupBuilder<'a> {
    mesh: &'a SourceMesh,
    binding: Option<&'a SkinBinding>,
    bind_shape: Mat4,
    up_axis: UpAxis,
    vertices: &'a mut Vec<Vertex>,
    indices: &'a mut Vec<u32>,
}

impl GroupBuilder<'_> {
    fn build(&mut self, group: &SourceTriGroup) -> Option<TriGroup> {
        let first = self.indices.len();
        let vert_start = self.vertices.len();
        let mut buckets: HashMap<u32, Vec<u32>> = HashMap::new();
        let mut skipped = 0usize;

        let triangles = group.corners.chunks_exact(3);
        if !triangles.remainder().is_empty() {
            tracing::warn!(
                "Mesh '{}' group '{}' has {} trailing corners that do not form a triangle",
                self.mesh.name,
                group.material,
                triangles.remainder().len()
            );
        }

        for triangle in triangles {
            let corners = [
                self.make_vertex(&triangle[0]),
                self.make_vertex(&triangle[1]),
                self.make_vertex(&triangle[2]),
            ];
            let [Some(a), Some(b), Some(c)] = corners else {
                skipped += 1;
                continue;
            };
            for vertex in [a, b, c] {
                let bucket = buckets.entry(vertex.position_index).or_default();
                let existing = bucket
                    .iter()
                    .copied()
                    .find(|&i| self.vertices[i as usize].same_attributes(&vertex));
                let index = match existing {
                    Some(index) => index,
                    None => {
                        let index = self.vertices.len() as u32;
                        self.vertices.push(vertex);
                        bucket.push(index);
                        index
                    }
                };
                self.indices.push(index);
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Mesh '{}' has {} triangles with out-of-range attribute indices, dropped",
                self.mesh.name,
                skipped
            );
        }
        if self.vertices.len() == vert_start {
            return None;
        }

        Some(TriGroup {
            first: first as u32,
            count: (self.indices.len() - first) as u32,
            vert_r_start: vert_start as u32,
            vert_r_end: (self.vertices.len() - 1) as u32,
            material: group.material.clone(),
            position_buckets: buckets,
        })
    }

    /// Resolve a corner's attribute indices; `None` if any index is out of range
    fn make_vertex(&self, corner: &SourceCorner) -> Option<Vertex> {
        let mesh = self.mesh;
        let position = *mesh.positions.get(corner.position as usize)?;
        let normal = match corner.normal {
            Some(index) => *mesh.normals.get(index as usize)?,
            None => Vec3::ZERO,
        };
        let mut tex_coords = [Vec2::ZERO; MAX_TEX_SETS];
        for (set, slot) in tex_coords.iter_mut().enumerate() {
            if let Some(index) = corner.tex_coords[set] {
                *slot = *mesh.tex_coords[set].get(index as usize)?;
            }
        }

        let mut vertex = Vertex {
            stored_pos: self.up_axis.convert_point(self.bind_shape.transform_point3(position)),
            stored_normal: self
                .up_axis
                .convert_point(self.bind_shape.transform_vector3(normal)),
            tex_coords,
            position_index: corner.position,
            ..Default::default()
        };
        vertex.pos = vertex.stored_pos;

        if let Some(binding) = self.binding {
            let influences = mesh
                .influences
                .get(corner.position as usize)
                .map_or(&[][..], Vec::as_slice);
            let (joints, weights) = binding.vertex_influences(influences);
            vertex.joints = joints;
            vertex.weights = weights;
        }
        Some(vertex)
    }
}
