//! Per-asset conversion state
//!
//! Every buffer the pipeline stages fill in lives here. One context is
//! created per asset and dropped after its files are written, so assets never
//! share state.

use glam::Mat4;
use hashbrown::HashMap;

use crate::animation::AnimationClip;
use crate::geometry::{MorphTarget, TriGroup, Vertex};
use crate::scene_graph::{NodeId, NodeKind, SceneNode};

#[derive(Debug, Default)]
pub struct ConversionContext {
    pub nodes: Vec<SceneNode>,
    /// Joint nodes, in joint index order once indices are assigned
    pub joints: Vec<NodeId>,
    /// Mesh nodes in creation order
    pub meshes: Vec<NodeId>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub morph_targets: Vec<MorphTarget>,
    pub clips: Vec<AnimationClip>,
    pub max_lod_level: u32,
    /// Source node index → node emitted for it
    pub(crate) source_nodes: HashMap<usize, NodeId>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        &mut self.nodes[id.0]
    }

    /// Top-level nodes in creation order
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(index, _)| NodeId(index))
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn emitted_node(&self, source: usize) -> Option<NodeId> {
        self.source_nodes.get(&source).copied()
    }

    /// Joint index written for a vertex influence; `None` is the identity root
    pub fn joint_index(&self, joint: Option<NodeId>) -> u32 {
        joint
            .and_then(|id| self.node(id).joint())
            .map_or(0, |joint| joint.index)
    }

    pub fn has_joints(&self) -> bool {
        !self.joints.is_empty()
    }

    /// Bind-pose skinning matrix (absolute * inverse bind) per node, identity
    /// for anything that is not a joint
    ///
    /// The source skin's inverse bind takes precedence over the one derived
    /// from the rest pose.
    pub fn skinning_matrices(&self) -> Vec<Mat4> {
        self.nodes
            .iter()
            .map(|node| match &node.kind {
                NodeKind::Joint(joint) => {
                    node.absolute * joint.source_inverse_bind.unwrap_or(joint.inverse_bind)
                }
                NodeKind::Mesh(_) => Mat4::IDENTITY,
            })
            .collect()
    }

    /// Triangle groups of every mesh, in mesh order
    pub fn tri_groups(&self) -> impl Iterator<Item = &TriGroup> + '_ {
        self.meshes
            .iter()
            .filter_map(|&id| self.node(id).mesh())
            .flat_map(|mesh| mesh.tri_groups.iter())
    }

    pub fn tri_groups_mut(&mut self) -> impl Iterator<Item = &mut TriGroup> + '_ {
        self.nodes
            .iter_mut()
            .filter_map(|node| match &mut node.kind {
                NodeKind::Mesh(mesh) => Some(&mut mesh.tri_groups),
                NodeKind::Joint(_) => None,
            })
            .flatten()
    }

    /// Material names referenced by any triangle group, first use order
    pub fn material_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for group in self.tri_groups() {
            if !names.contains(&group.material.as_str()) {
                names.push(&group.material);
            }
        }
        names
    }
}
