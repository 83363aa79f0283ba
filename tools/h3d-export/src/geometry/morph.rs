//! Morph target encoding
//!
//! Each source target is applied to a copy of the base vertices, skinned into
//! the bind pose and given a fresh tangent basis. Only vertices whose position
//! or basis moved are stored, as deltas against the base mesh.

use glam::Vec3;

use super::{compute_tangent_basis, MorphDiff, MorphTarget, TriGroup, Vertex};
use crate::context::ConversionContext;
use crate::skeleton::skin_point;
use crate::source::SourceScene;

/// Deltas shorter than this are treated as unchanged
const DIFF_EPSILON: f32 = 1e-6;

/// Encode the morph targets of every mesh; targets sharing a name are merged
pub fn build_morph_targets(scene: &SourceScene, ctx: &mut ConversionContext) {
    let matrices = ctx.skinning_matrices();
    let mut targets: Vec<MorphTarget> = Vec::new();

    for &mesh_id in &ctx.meshes {
        let node = ctx.node(mesh_id);
        let Some(data) = node.mesh() else {
            continue;
        };
        let mesh = &scene.meshes[data.source_mesh];
        let groups: Vec<&TriGroup> = data.tri_groups.iter().collect();
        if mesh.morph_targets.is_empty() || groups.is_empty() {
            continue;
        }

        for target in &mesh.morph_targets {
            if target.positions.len() != mesh.positions.len() {
                tracing::warn!(
                    "Morph target '{}' of mesh '{}' has {} positions, expected {}, skipping",
                    target.name,
                    node.name,
                    target.positions.len(),
                    mesh.positions.len()
                );
                continue;
            }

            let mut morphed = ctx.vertices.clone();
            for group in &groups {
                for vertex in &mut morphed[group.vertex_range()] {
                    let source = target.positions[vertex.position_index as usize];
                    let stored = scene
                        .up_axis
                        .convert_point(data.bind_shape.transform_point3(source));
                    vertex.pos = skin_point(&matrices, &vertex.joints, &vertex.weights, stored);
                }
            }
            compute_tangent_basis(&mut morphed, &ctx.indices, &groups);

            let diffs = collect_diffs(&ctx.vertices, &morphed, &groups);
            match targets.iter_mut().find(|t| t.name == target.name) {
                Some(existing) => existing.diffs.extend(diffs),
                None => targets.push(MorphTarget {
                    name: target.name.clone(),
                    diffs,
                }),
            }
        }
    }

    for target in &targets {
        tracing::debug!(
            "Morph target '{}' affects {} vertices",
            target.name,
            target.diffs.len()
        );
    }
    ctx.morph_targets = targets;
}

fn collect_diffs(base: &[Vertex], morphed: &[Vertex], groups: &[&TriGroup]) -> Vec<MorphDiff> {
    let mut diffs = Vec::new();
    for group in groups {
        for index in group.vertex_range() {
            let (from, to) = (&base[index], &morphed[index]);
            let diff = MorphDiff {
                vertex: index as u32,
                position: to.pos - from.pos,
                normal: to.normal - from.normal,
                tangent: to.tangent - from.tangent,
                bitangent: to.bitangent - from.bitangent,
            };
            if moved(diff.position)
                || moved(diff.normal)
                || moved(diff.tangent)
                || moved(diff.bitangent)
            {
                diffs.push(diff);
            }
        }
    }
    diffs
}

fn moved(delta: Vec3) -> bool {
    delta.length() > DIFF_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{build_vertex_buffers, compute_base_tangent_basis};
    use crate::scene_graph::build_scene_graph;
    use crate::skeleton::{apply_skinning, assign_joint_indices};
    use crate::source::{
        SourceCorner, SourceMesh, SourceMorphTarget, SourceNode, SourceTransform, SourceTriGroup,
    };
    use glam::{Mat4, Vec2};

    fn quad_positions() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    fn quad_node(name: &str, mesh: usize) -> SourceNode {
        SourceNode {
            name: name.into(),
            transform: Some(SourceTransform::Matrix(Mat4::IDENTITY)),
            mesh: Some(mesh),
            ..Default::default()
        }
    }

    fn quad_mesh(targets: Vec<SourceMorphTarget>) -> SourceMesh {
        SourceMesh {
            name: "quad".into(),
            positions: quad_positions(),
            normals: vec![Vec3::Z; 4],
            tex_coords: [
                vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
                vec![],
                vec![],
                vec![],
            ],
            groups: vec![SourceTriGroup {
                material: "skin".into(),
                corners: [0, 1, 2, 0, 2, 3]
                    .into_iter()
                    .map(|i| SourceCorner::unified(i, true, 1))
                    .collect(),
            }],
            morph_targets: targets,
            ..Default::default()
        }
    }

    fn convert(scene: &SourceScene) -> ConversionContext {
        let mut ctx = ConversionContext::new();
        build_scene_graph(scene, &mut ctx);
        assign_joint_indices(&mut ctx);
        build_vertex_buffers(scene, &mut ctx);
        apply_skinning(&mut ctx);
        compute_base_tangent_basis(&mut ctx);
        build_morph_targets(scene, &mut ctx);
        ctx
    }

    fn lifted_corner() -> SourceMorphTarget {
        let mut positions = quad_positions();
        positions[2].z = 1.0;
        SourceMorphTarget {
            name: "lift".into(),
            positions,
        }
    }

    #[test]
    fn test_only_moved_vertices_are_stored() {
        let scene = SourceScene {
            nodes: vec![quad_node("Quad", 0)],
            roots: vec![0],
            meshes: vec![quad_mesh(vec![lifted_corner()])],
            ..Default::default()
        };
        let ctx = convert(&scene);
        assert_eq!(ctx.morph_targets.len(), 1);
        let target = &ctx.morph_targets[0];
        assert_eq!(target.name, "lift");

        // The lifted vertex and every vertex whose basis it tilts
        let lifted = target
            .diffs
            .iter()
            .find(|d| ctx.vertices[d.vertex as usize].position_index == 2)
            .unwrap();
        assert!(lifted.position.abs_diff_eq(Vec3::Z, 1e-5));
        assert!(target.diffs.len() <= ctx.vertices.len());
        for diff in &target.diffs {
            if diff.vertex != lifted.vertex {
                assert!(diff.position.abs_diff_eq(Vec3::ZERO, 1e-6));
            }
        }
    }

    #[test]
    fn test_identical_target_has_no_diffs() {
        let scene = SourceScene {
            nodes: vec![quad_node("Quad", 0)],
            roots: vec![0],
            meshes: vec![quad_mesh(vec![SourceMorphTarget {
                name: "rest".into(),
                positions: quad_positions(),
            }])],
            ..Default::default()
        };
        let ctx = convert(&scene);
        assert!(ctx.morph_targets[0].diffs.is_empty());
    }

    #[test]
    fn test_mismatched_target_is_skipped() {
        let scene = SourceScene {
            nodes: vec![quad_node("Quad", 0)],
            roots: vec![0],
            meshes: vec![quad_mesh(vec![SourceMorphTarget {
                name: "broken".into(),
                positions: vec![Vec3::ZERO],
            }])],
            ..Default::default()
        };
        let ctx = convert(&scene);
        assert!(ctx.morph_targets.is_empty());
    }

    #[test]
    fn test_targets_with_same_name_merge() {
        let scene = SourceScene {
            nodes: vec![quad_node("A", 0), quad_node("B", 1)],
            roots: vec![0, 1],
            meshes: vec![
                quad_mesh(vec![lifted_corner()]),
                quad_mesh(vec![lifted_corner()]),
            ],
            ..Default::default()
        };
        let ctx = convert(&scene);
        assert_eq!(ctx.morph_targets.len(), 1);
        let vertices: Vec<u32> = ctx.morph_targets[0].diffs.iter().map(|d| d.vertex).collect();
        assert!(vertices.iter().any(|&v| v < 4));
        assert!(vertices.iter().any(|&v| v >= 4));
    }
}
