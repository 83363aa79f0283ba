//! Skeleton resolution
//!
//! Assigns joint indices, computes inverse bind matrices, reduces source
//! skin influences to four weighted joints per vertex and produces the
//! bind-pose skinned positions.

use glam::{Mat4, Vec3};

use crate::context::ConversionContext;
use crate::scene_graph::{NodeId, NodeKind};
use crate::source::SourceScene;

/// Joint count above which older renderers cannot skin the model
pub const LEGACY_JOINT_LIMIT: usize = 75;

/// Largest joint index the one-byte joint index stream can address
pub const MAX_JOINTS: usize = 255;

/// Influences kept per vertex
pub const MAX_INFLUENCES: usize = 4;

const WEIGHT_EPSILON: f32 = 1e-6;

/// Number the joints depth-first from 1 and compute their inverse bind matrices
pub fn assign_joint_indices(ctx: &mut ConversionContext) {
    let mut order = Vec::with_capacity(ctx.joints.len());
    let roots: Vec<NodeId> = ctx.roots().collect();
    for root in roots {
        collect_joints(ctx, root, &mut order);
    }

    for (slot, &id) in order.iter().enumerate() {
        let node = ctx.node_mut(id);
        let absolute = node.absolute;
        let name = node.name.clone();
        if let NodeKind::Joint(joint) = &mut node.kind {
            joint.index = slot as u32 + 1;
            joint.inverse_bind = if absolute.determinant().abs() > f32::EPSILON {
                absolute.inverse()
            } else {
                tracing::warn!(
                    "Joint '{}' has a singular bind transform, using identity inverse",
                    name
                );
                Mat4::IDENTITY
            };
        }
    }
    ctx.joints = order;

    for warning in joint_limit_warnings(ctx.joints.len()) {
        tracing::warn!("{}", warning);
    }
}

/// Renderer limits a joint count exceeds, as log messages
pub fn joint_limit_warnings(count: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    if count > LEGACY_JOINT_LIMIT {
        warnings.push(format!(
            "Model has {} joints, more than the {} supported by older renderers",
            count, LEGACY_JOINT_LIMIT
        ));
    }
    if count > MAX_JOINTS {
        warnings.push(format!(
            "Model has {} joints, vertices bound to joints above {} are bound to the root",
            count, MAX_JOINTS
        ));
    }
    warnings
}

fn collect_joints(ctx: &ConversionContext, id: NodeId, order: &mut Vec<NodeId>) {
    let node = ctx.node(id);
    if node.is_joint() {
        order.push(id);
    }
    for &child in &node.children {
        collect_joints(ctx, child, order);
    }
}

/// Attach the inverse bind matrices of every source skin to its joints
///
/// A joint shared by skins with different inverse binds keeps the first.
pub fn bind_source_poses(scene: &SourceScene, ctx: &mut ConversionContext) {
    for skin in &scene.skins {
        for (&source, inverse_bind) in skin.joints.iter().zip(&skin.inverse_binds) {
            let Some(id) = ctx.emitted_node(source) else {
                continue;
            };
            let inverse_bind = scene.up_axis.convert_transform(*inverse_bind);
            let name = ctx.node(id).name.clone();
            let NodeKind::Joint(joint) = &mut ctx.node_mut(id).kind else {
                continue;
            };
            match joint.source_inverse_bind {
                None => joint.source_inverse_bind = Some(inverse_bind),
                Some(existing) if !existing.abs_diff_eq(inverse_bind, 1e-5) => {
                    tracing::warn!(
                        "Joint '{}' has a different inverse bind in skin '{}', keeping the first",
                        name,
                        skin.name
                    );
                }
                Some(_) => {}
            }
        }
    }
}

// ============================================================================
// Vertex Binding
// ============================================================================

/// Skin of one mesh node with its joint slots resolved to emitted joints
#[derive(Debug, Clone)]
pub struct SkinBinding {
    pub bind_shape: Mat4,
    slots: Vec<Option<NodeId>>,
}

impl SkinBinding {
    /// Build the slot lookup table from the skin's joint order
    pub fn resolve(scene: &SourceScene, ctx: &ConversionContext, skin: usize) -> Self {
        let skin = &scene.skins[skin];
        let slots = skin
            .joints
            .iter()
            .map(|&source| {
                let joint = ctx
                    .emitted_node(source)
                    .filter(|&id| ctx.node(id).is_joint());
                if joint.is_none() {
                    tracing::warn!(
                        "Skin '{}' references node '{}' which is not in the scene, binding to root",
                        skin.name,
                        scene.nodes[source].name
                    );
                }
                joint
            })
            .collect();
        Self {
            bind_shape: skin.bind_shape,
            slots,
        }
    }

    /// Reduce source influences to the four strongest, renormalized
    pub fn vertex_influences(
        &self,
        influences: &[(u32, f32)],
    ) -> ([Option<NodeId>; MAX_INFLUENCES], [f32; MAX_INFLUENCES]) {
        let resolved: Vec<(Option<NodeId>, f32)> = influences
            .iter()
            .map(|&(slot, weight)| (self.slots.get(slot as usize).copied().flatten(), weight))
            .collect();
        strongest_influences(&resolved)
    }
}

/// Keep the four largest weights in descending order and renormalize them
///
/// Falls back to full weight on the first slot when the kept weights sum to
/// (nearly) zero.
pub fn strongest_influences(
    influences: &[(Option<NodeId>, f32)],
) -> ([Option<NodeId>; MAX_INFLUENCES], [f32; MAX_INFLUENCES]) {
    let mut sorted: Vec<(Option<NodeId>, f32)> = influences
        .iter()
        .copied()
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(MAX_INFLUENCES);

    let mut joints = [None; MAX_INFLUENCES];
    let mut weights = [0.0f32; MAX_INFLUENCES];
    for (slot, (joint, weight)) in sorted.iter().enumerate() {
        joints[slot] = *joint;
        weights[slot] = *weight;
    }

    let sum: f32 = weights.iter().sum();
    if sum < WEIGHT_EPSILON {
        return (joints, [1.0, 0.0, 0.0, 0.0]);
    }
    (joints, weights.map(|w| w / sum))
}

// ============================================================================
// Bind Pose
// ============================================================================

/// Weighted sum of each influencing joint's skinning matrix applied to a point
pub fn skin_point(
    matrices: &[Mat4],
    joints: &[Option<NodeId>; MAX_INFLUENCES],
    weights: &[f32; MAX_INFLUENCES],
    point: Vec3,
) -> Vec3 {
    if joints.iter().all(Option::is_none) {
        return point;
    }
    let mut skinned = Vec3::ZERO;
    for (joint, &weight) in joints.iter().zip(weights) {
        if weight == 0.0 {
            continue;
        }
        let matrix = joint.map_or(Mat4::IDENTITY, |id| matrices[id.0]);
        skinned += matrix.transform_point3(point) * weight;
    }
    skinned
}

/// Fill in bind-pose skinned positions and joint usage flags
pub fn apply_skinning(ctx: &mut ConversionContext) {
    let matrices = ctx.skinning_matrices();
    let mut used = vec![false; ctx.nodes.len()];
    for vertex in &mut ctx.vertices {
        vertex.pos = skin_point(&matrices, &vertex.joints, &vertex.weights, vertex.stored_pos);
        for (joint, &weight) in vertex.joints.iter().zip(&vertex.weights) {
            match joint {
                Some(id) if weight > 0.0 => used[id.0] = true,
                _ => {}
            }
        }
    }

    let mut unused = 0;
    for (node, used) in ctx.nodes.iter_mut().zip(used) {
        if let NodeKind::Joint(joint) = &mut node.kind {
            joint.used = used;
            unused += usize::from(!used);
        }
    }
    if unused > 0 {
        tracing::debug!("{} joints do not influence any vertex", unused);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::build_scene_graph;
    use crate::source::{SourceNode, SourceSkin, SourceTransform};

    fn joint_scene(count: usize) -> SourceScene {
        // A chain of joints, each offset by one unit on Y
        let nodes = (0..count)
            .map(|i| SourceNode {
                name: format!("Joint{i}"),
                transform: Some(SourceTransform::Matrix(Mat4::from_translation(Vec3::Y))),
                children: if i + 1 < count { vec![i + 1] } else { vec![] },
                ..Default::default()
            })
            .collect();
        SourceScene {
            nodes,
            roots: vec![0],
            skins: vec![SourceSkin {
                name: "skin".into(),
                joints: (0..count).collect(),
                bind_shape: Mat4::IDENTITY,
                inverse_binds: Vec::new(),
            }],
            ..Default::default()
        }
    }

    fn resolved(scene: &SourceScene) -> ConversionContext {
        let mut ctx = ConversionContext::new();
        build_scene_graph(scene, &mut ctx);
        assign_joint_indices(&mut ctx);
        ctx
    }

    #[test]
    fn test_joint_indices_are_one_based_and_unique() {
        let ctx = resolved(&joint_scene(5));
        let indices: Vec<u32> = ctx
            .joints
            .iter()
            .map(|&id| ctx.node(id).joint().unwrap().index)
            .collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert_eq!(ctx.joint_index(None), 0);
    }

    #[test]
    fn test_inverse_bind_cancels_absolute() {
        let ctx = resolved(&joint_scene(3));
        for m in ctx.skinning_matrices() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
        let last = ctx.node(ctx.joints[2]);
        let inv = last.joint().unwrap().inverse_bind;
        assert!(inv
            .transform_point3(Vec3::new(0.0, 3.0, 0.0))
            .abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn test_slot_lookup_resolves_skin_order() {
        let mut scene = joint_scene(2);
        scene.skins[0].joints = vec![1, 0];
        let ctx = resolved(&scene);
        let binding = SkinBinding::resolve(&scene, &ctx, 0);
        let (joints, weights) = binding.vertex_influences(&[(0, 1.0)]);
        assert_eq!(ctx.joint_index(joints[0]), 2);
        assert_eq!(weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_keeps_four_strongest_weights() {
        let ids: Vec<Option<NodeId>> = (0..6).map(|i| Some(NodeId(i))).collect();
        let influences: Vec<(Option<NodeId>, f32)> = ids
            .iter()
            .zip([0.05, 0.3, 0.1, 0.2, 0.25, 0.1])
            .map(|(&id, w)| (id, w))
            .collect();
        let (joints, weights) = strongest_influences(&influences);
        assert_eq!(joints[0], Some(NodeId(1)));
        assert_eq!(joints[1], Some(NodeId(4)));
        assert_eq!(joints[2], Some(NodeId(3)));
        assert!(weights.windows(2).all(|w| w[0] >= w[1]));
        let sum: f32 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_weights_fall_back_to_first_slot() {
        let (joints, weights) = strongest_influences(&[(Some(NodeId(3)), 0.0)]);
        assert_eq!(joints, [None; 4]);
        assert_eq!(weights, [1.0, 0.0, 0.0, 0.0]);

        let (_, weights) = strongest_influences(&[]);
        assert_eq!(weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_joint_limit_warnings() {
        assert!(joint_limit_warnings(LEGACY_JOINT_LIMIT).is_empty());
        assert_eq!(joint_limit_warnings(LEGACY_JOINT_LIMIT + 1).len(), 1);
        let warnings = joint_limit_warnings(300);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("older renderers"));
        assert!(warnings[1].contains("above 255"));
    }

    #[test]
    fn test_source_inverse_bind_poses_vertices() {
        let mut scene = joint_scene(2);
        // Bound one unit above the rest pose
        scene.skins[0].inverse_binds = vec![
            Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)),
            Mat4::from_translation(Vec3::new(0.0, -3.0, 0.0)),
        ];
        let mut ctx = resolved(&scene);
        bind_source_poses(&scene, &mut ctx);

        let matrices = ctx.skinning_matrices();
        let joints = [Some(ctx.joints[0]), Some(ctx.joints[1]), None, None];
        let p = Vec3::new(1.0, 2.0, 3.0);
        let skinned = skin_point(&matrices, &joints, &[0.5, 0.5, 0.0, 0.0], p);
        assert!(skinned.abs_diff_eq(p - Vec3::Y, 1e-5));

        // Written inverse binds still come from the rest pose
        let first = ctx.node(ctx.joints[0]).joint().unwrap();
        assert!(first
            .inverse_bind
            .abs_diff_eq(Mat4::from_translation(-Vec3::Y), 1e-5));
    }

    #[test]
    fn test_skin_without_inverse_binds_uses_rest_pose() {
        let scene = joint_scene(2);
        let mut ctx = resolved(&scene);
        bind_source_poses(&scene, &mut ctx);
        for &id in &ctx.joints {
            assert!(ctx.node(id).joint().unwrap().source_inverse_bind.is_none());
        }
    }

    #[test]
    fn test_skin_point_in_bind_pose_is_unchanged() {
        let ctx = resolved(&joint_scene(2));
        let matrices = ctx.skinning_matrices();
        let joints = [Some(ctx.joints[0]), Some(ctx.joints[1]), None, None];
        let p = Vec3::new(1.0, 2.0, 3.0);
        let skinned = skin_point(&matrices, &joints, &[0.5, 0.5, 0.0, 0.0], p);
        assert!(skinned.abs_diff_eq(p, 1e-5));
    }
}
