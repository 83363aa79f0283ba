//! Per-vertex tangent space basis
//!
//! Face basis vectors are accumulated unnormalized (so larger triangles
//! weigh more) into the triangle's vertices and into their seam duplicates,
//! then orthonormalized per vertex.

use glam::Vec3;

use super::{TriGroup, Vertex};
use crate::context::ConversionContext;

/// Compute normals, tangents and bitangents from the skinned positions and
/// the first texture coordinate set
///
/// Only vertices inside the groups' vertex ranges are touched. Returns the
/// number of referenced vertices that ended up with a zero-length basis
/// vector.
pub fn compute_tangent_basis(
    vertices: &mut [Vertex],
    indices: &[u32],
    groups: &[&TriGroup],
) -> usize {
    for group in groups {
        for vertex in &mut vertices[group.vertex_range()] {
            vertex.normal = Vec3::ZERO;
            vertex.tangent = Vec3::ZERO;
            vertex.bitangent = Vec3::ZERO;
        }
    }

    let mut referenced = vec![false; vertices.len()];
    for group in groups {
        for triangle in indices[group.index_range()].chunks_exact(3) {
            let basis = face_basis(vertices, triangle);
            for &corner in triangle {
                let corner = corner as usize;
                referenced[corner] = true;
                vertices[corner].accumulate(basis);

                // Seam duplicates of the same source position with the same
                // source normal get the face's contribution as well
                let key = vertices[corner].position_index;
                let stored_normal = vertices[corner].stored_normal;
                for &other in group.bucket(key) {
                    let other = other as usize;
                    if other != corner && vertices[other].stored_normal == stored_normal {
                        vertices[other].accumulate(basis);
                    }
                }
            }
        }
    }

    let mut invalid = 0;
    for group in groups {
        for index in group.vertex_range() {
            let vertex = &mut vertices[index];
            let degenerate = vertex.normal.length_squared() == 0.0
                || vertex.tangent.length_squared() == 0.0
                || vertex.bitangent.length_squared() == 0.0;
            vertex.orthonormalize();
            if degenerate && referenced[index] {
                invalid += 1;
            }
        }
    }
    invalid
}

/// Tangent basis of the base mesh, over every triangle group
pub fn compute_base_tangent_basis(ctx: &mut ConversionContext) -> usize {
    let ConversionContext {
        nodes,
        meshes,
        vertices,
        indices,
        ..
    } = ctx;
    let groups: Vec<&TriGroup> = meshes
        .iter()
        .filter_map(|id| nodes[id.0].mesh())
        .flat_map(|mesh| mesh.tri_groups.iter())
        .collect();

    let invalid = compute_tangent_basis(vertices, indices, &groups);
    if invalid > 0 {
        tracing::warn!(
            "Geometry has {} vertices with zero-length basis vectors, \
             faces may point in opposite directions while sharing vertices",
            invalid
        );
    }
    invalid
}

#[derive(Debug, Clone, Copy)]
struct FaceBasis {
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
}

fn face_basis(vertices: &[Vertex], triangle: &[u32]) -> FaceBasis {
    let v0 = &vertices[triangle[0] as usize];
    let v1 = &vertices[triangle[1] as usize];
    let v2 = &vertices[triangle[2] as usize];

    let edge1 = v1.pos - v0.pos;
    let edge2 = v2.pos - v0.pos;
    let edge1_uv = v1.tex_coords[0] - v0.tex_coords[0];
    let edge2_uv = v2.tex_coords[0] - v0.tex_coords[0];

    // Area-weighted, hence unnormalized
    let normal = edge1.cross(edge2);

    let det = edge1_uv.x * edge2_uv.y - edge2_uv.x * edge1_uv.y;
    if det == 0.0 || !det.is_finite() {
        return FaceBasis {
            normal,
            tangent: Vec3::ZERO,
            bitangent: Vec3::ZERO,
        };
    }
    let r = 1.0 / det;
    FaceBasis {
        normal,
        tangent: (edge1 * edge2_uv.y - edge2 * edge1_uv.y) * r,
        bitangent: (edge2 * edge1_uv.x - edge1 * edge2_uv.x) * r,
    }
}

impl Vertex {
    fn accumulate(&mut self, basis: FaceBasis) {
        self.normal += basis.normal;
        self.tangent += basis.tangent;
        self.bitangent += basis.bitangent;
    }

    /// Gram-Schmidt with handedness taken from the accumulated bitangent
    fn orthonormalize(&mut self) {
        let n = self.normal.normalize_or_zero();
        let t = (self.tangent - n * n.dot(self.tangent)).normalize_or_zero();
        let handedness = if n.cross(t).dot(self.bitangent) < 0.0 {
            -1.0
        } else {
            1.0
        };
        self.normal = n;
        self.tangent = t;
        self.bitangent = n.cross(t) * handedness;
    }
}
