//! Output scene graph
//!
//! Flattens the source node tree into the joints and meshes the runtime
//! knows about. Source nodes that are neither are folded into the relative
//! transform of their nearest emitted descendants.

use glam::Mat4;
use hashbrown::HashSet;

use crate::context::ConversionContext;
use crate::geometry::TriGroup;
use crate::source::{SourceNode, SourceScene, UpAxis};
use h3d_common::MAX_NAME_LEN;

/// Names are cut to this length before a collision suffix is appended
pub const RENAME_BASE_LEN: usize = 240;

/// Highest LOD level selectable through a `_LODn` name suffix
pub const MAX_LOD_LEVEL: u32 = 4;

// ============================================================================
// Node Types
// ============================================================================

/// Index into [`ConversionContext::nodes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Default)]
pub struct JointData {
    /// 1-based; 0 is the implicit identity root
    pub index: u32,
    pub inverse_bind: Mat4,
    /// Inverse bind the source skin was authored against; poses the stored
    /// vertices when it differs from the rest pose
    pub source_inverse_bind: Option<Mat4>,
    /// Referenced by at least one weighted vertex
    pub used: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub source_mesh: usize,
    pub skin: Option<usize>,
    /// Applied to source positions and normals of skinned meshes
    pub bind_shape: Mat4,
    pub lod_level: u32,
    pub tri_groups: Vec<TriGroup>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Joint(JointData),
    Mesh(MeshData),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub relative: Mat4,
    pub absolute: Mat4,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Source node this one was emitted for
    pub source: Option<usize>,
    /// Pure-transform source ancestors folded into `relative`, outermost first
    pub folded: Vec<usize>,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn is_joint(&self) -> bool {
        matches!(self.kind, NodeKind::Joint(_))
    }

    pub fn joint(&self) -> Option<&JointData> {
        match &self.kind {
            NodeKind::Joint(joint) => Some(joint),
            NodeKind::Mesh(_) => None,
        }
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Joint(_) => None,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Static local transform of a source node in the Y-up frame
///
/// `None` when the node has no transform or the data is malformed.
pub fn static_local(node: &SourceNode, up_axis: UpAxis) -> Option<Mat4> {
    let matrix = node.transform?.to_matrix()?;
    Some(up_axis.convert_transform(matrix))
}

/// Walk the source tree and emit joints and meshes into the context
pub fn build_scene_graph(scene: &SourceScene, ctx: &mut ConversionContext) {
    let mut builder = SceneGraphBuilder {
        scene,
        ctx,
        joint_flags: scene.joint_flags(),
        names: HashSet::new(),
    };
    for &root in &scene.roots {
        builder.walk(root, None, Mat4::IDENTITY, Vec::new());
    }

    tracing::debug!(
        "Scene graph: {} joints, {} meshes",
        ctx.joints.len(),
        ctx.meshes.len()
    );
}

struct SceneGraphBuilder<'a> {
    scene: &'a SourceScene,
    ctx: &'a mut ConversionContext,
    joint_flags: Vec<bool>,
    names: HashSet<String>,
}

impl SceneGraphBuilder<'_> {
    fn walk(&mut self, index: usize, parent: Option<NodeId>, accum: Mat4, mut folded: Vec<usize>) {
        let scene = self.scene;
        let source = &scene.nodes[index];
        let local = match static_local(source, scene.up_axis) {
            Some(local) => local,
            None => {
                tracing::warn!(
                    "Node '{}' has a missing or malformed transform, using identity",
                    source.name
                );
                Mat4::IDENTITY
            }
        };

        let is_joint = self.joint_flags[index];
        if !is_joint && source.mesh.is_none() {
            folded.push(index);
            for &child in &source.children {
                self.walk(child, parent, accum * local, folded.clone());
            }
            return;
        }

        let kind = match (is_joint, source.mesh) {
            (false, Some(mesh)) => NodeKind::Mesh(self.mesh_data(&source.name, mesh, source.skin)),
            _ => NodeKind::Joint(JointData::default()),
        };
        let id = self.emit(&source.name, parent, accum * local, Some(index), folded, kind);
        self.ctx.source_nodes.insert(index, id);

        // A joint carrying geometry gets the mesh as an untransformed child
        if is_joint {
            if let Some(mesh) = source.mesh {
                let kind = NodeKind::Mesh(self.mesh_data(&source.name, mesh, source.skin));
                self.emit(&source.name, Some(id), Mat4::IDENTITY, None, Vec::new(), kind);
            }
        }

        for &child in &source.children {
            self.walk(child, Some(id), Mat4::IDENTITY, Vec::new());
        }
    }

    fn mesh_data(&mut self, name: &str, source_mesh: usize, skin: Option<usize>) -> MeshData {
        let lod_level = lod_level_from_name(name);
        self.ctx.max_lod_level = self.ctx.max_lod_level.max(lod_level);
        let bind_shape = skin.map_or(Mat4::IDENTITY, |s| self.scene.skins[s].bind_shape);
        MeshData {
            source_mesh,
            skin,
            bind_shape,
            lod_level,
            tri_groups: Vec::new(),
        }
    }

    fn emit(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        relative: Mat4,
        source: Option<usize>,
        folded: Vec<usize>,
        kind: NodeKind,
    ) -> NodeId {
        let name = self.unique_name(name);
        self.names.insert(name.clone());

        let absolute = match parent {
            Some(parent) => self.ctx.node(parent).absolute * relative,
            None => relative,
        };
        let id = NodeId(self.ctx.nodes.len());
        match kind {
            NodeKind::Joint(_) => self.ctx.joints.push(id),
            NodeKind::Mesh(_) => self.ctx.meshes.push(id),
        }
        self.ctx.nodes.push(SceneNode {
            name,
            relative,
            absolute,
            parent,
            children: Vec::new(),
            source,
            folded,
            kind,
        });
        if let Some(parent) = parent {
            self.ctx.node_mut(parent).children.push(id);
        }
        id
    }

    fn unique_name(&self, raw: &str) -> String {
        let name = truncate_utf8(raw, MAX_NAME_LEN);
        if name.len() < raw.len() {
            tracing::warn!("Node name '{}' is too long, truncated to '{}'", raw, name);
        }
        if !self.names.contains(name) {
            return name.to_string();
        }

        let base = truncate_utf8(name, RENAME_BASE_LEN);
        let mut suffix = 2u32;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.names.contains(&candidate) {
                tracing::warn!(
                    "Node name '{}' is already in use, renamed to '{}'",
                    name,
                    candidate
                );
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// LOD level encoded by a `_LOD1`..`_LOD4` name suffix, 0 otherwise
pub fn lod_level_from_name(name: &str) -> u32 {
    let Some(prefix) = name.len().checked_sub(5).and_then(|at| name.get(at..)) else {
        return 0;
    };
    match prefix.strip_prefix("_LOD").and_then(|d| d.parse::<u32>().ok()) {
        Some(level) if (1..=MAX_LOD_LEVEL).contains(&level) => level,
        _ => 0,
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
