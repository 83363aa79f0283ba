//! Canonical source scene
//!
//! Every front-end (see [`crate::import`]) converts its document into this
//! representation once, so the pipeline stages never branch on the source
//! format. Indices in this module refer to the owning [`SourceScene`]'s
//! arrays.

use anyhow::{bail, Result};
use glam::{Mat4, Quat, Vec2, Vec3};

/// Number of texture coordinate sets a vertex can carry
pub const MAX_TEX_SETS: usize = 4;

/// Up axis of the source coordinate system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpAxis {
    X,
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Basis change taking source coordinates to right-handed Y-up
    pub fn to_y_up(self) -> Mat4 {
        match self {
            UpAxis::Y => Mat4::IDENTITY,
            // x → y, y → -x
            UpAxis::X => Mat4::from_cols_array(&[
                0.0, 1.0, 0.0, 0.0, //
                -1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]),
            // y → -z, z → y
            UpAxis::Z => Mat4::from_cols_array(&[
                1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, -1.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]),
        }
    }

    /// Re-express a local transform in the Y-up frame
    pub fn convert_transform(self, m: Mat4) -> Mat4 {
        match self {
            UpAxis::Y => m,
            _ => {
                let basis = self.to_y_up();
                basis * m * basis.transpose()
            }
        }
    }

    pub fn convert_point(self, p: Vec3) -> Vec3 {
        match self {
            UpAxis::Y => p,
            _ => self.to_y_up().transform_vector3(p),
        }
    }
}

/// Local transform of a source node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceTransform {
    Matrix(Mat4),
    Trs {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
}

impl SourceTransform {
    /// Matrix form, or `None` when the data is not usable
    pub fn to_matrix(&self) -> Option<Mat4> {
        let m = match *self {
            SourceTransform::Matrix(m) => m,
            SourceTransform::Trs {
                translation,
                rotation,
                scale,
            } => {
                if !rotation.is_finite() || rotation.length_squared() == 0.0 {
                    return None;
                }
                Mat4::from_scale_rotation_translation(scale, rotation.normalize(), translation)
            }
        };
        m.is_finite().then_some(m)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceNode {
    pub name: String,
    /// `None` when the document had no usable transform for the node
    pub transform: Option<SourceTransform>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

/// One triangle corner; each attribute stream is indexed separately
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCorner {
    pub position: u32,
    pub normal: Option<u32>,
    pub tex_coords: [Option<u32>; MAX_TEX_SETS],
}

impl SourceCorner {
    /// Corner whose attributes all share one index
    pub fn unified(index: u32, has_normal: bool, tex_sets: usize) -> Self {
        let mut tex_coords = [None; MAX_TEX_SETS];
        for slot in tex_coords.iter_mut().take(tex_sets) {
            *slot = Some(index);
        }
        Self {
            position: index,
            normal: has_normal.then_some(index),
            tex_coords,
        }
    }
}

/// Triangle list sharing one material
#[derive(Debug, Clone, Default)]
pub struct SourceTriGroup {
    pub material: String,
    /// Three corners per triangle
    pub corners: Vec<SourceCorner>,
}

/// Alternate shape given as replacement positions, parallel to the base mesh
#[derive(Debug, Clone, Default)]
pub struct SourceMorphTarget {
    pub name: String,
    pub positions: Vec<Vec3>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: [Vec<Vec2>; MAX_TEX_SETS],
    pub groups: Vec<SourceTriGroup>,
    /// Per position index: (skin joint slot, weight)
    pub influences: Vec<Vec<(u32, f32)>>,
    pub morph_targets: Vec<SourceMorphTarget>,
}

#[derive(Debug, Clone)]
pub struct SourceSkin {
    pub name: String,
    /// Joint nodes in association order; influences refer to slots in this list
    pub joints: Vec<usize>,
    pub bind_shape: Mat4,
    /// Per joint slot, inverse of the joint's world transform when the mesh
    /// was bound. Empty when the source has none; the rest pose is used then.
    pub inverse_binds: Vec<Mat4>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProperty {
    Translation,
    /// Quaternion x, y, z, w
    Rotation,
    Scale,
    /// Whole local matrix, column-major
    Matrix,
}

impl ChannelProperty {
    pub fn component_count(self) -> usize {
        match self {
            ChannelProperty::Translation | ChannelProperty::Scale => 3,
            ChannelProperty::Rotation => 4,
            ChannelProperty::Matrix => 16,
        }
    }
}

/// Pre-sampled values for one animated node property
#[derive(Debug, Clone)]
pub struct SourceChannel {
    pub node: usize,
    pub property: ChannelProperty,
    /// One array per component, one value per frame
    pub components: Vec<Vec<f32>>,
}

impl SourceChannel {
    /// Longest component array
    pub fn sample_count(&self) -> usize {
        self.components.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Has the expected component count, all of equal length
    pub fn is_consistent(&self) -> bool {
        self.components.len() == self.property.component_count()
            && self
                .components
                .iter()
                .all(|c| c.len() == self.components[0].len())
    }

    /// Build a channel from per-frame vectors
    pub fn from_frames<const N: usize>(
        node: usize,
        property: ChannelProperty,
        frames: &[[f32; N]],
    ) -> Self {
        let components = (0..N)
            .map(|c| frames.iter().map(|frame| frame[c]).collect())
            .collect();
        Self {
            node,
            property,
            components,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceAnimation {
    pub name: String,
    pub channels: Vec<SourceChannel>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMaterial {
    pub name: String,
    pub diffuse_map: Option<String>,
    pub diffuse_color: Option<[f32; 4]>,
    pub specular_color: Option<[f32; 3]>,
    pub shininess: Option<f32>,
}

/// Complete source document in canonical form
#[derive(Debug, Clone, Default)]
pub struct SourceScene {
    pub up_axis: UpAxis,
    pub nodes: Vec<SourceNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<SourceMesh>,
    pub skins: Vec<SourceSkin>,
    pub materials: Vec<SourceMaterial>,
    pub animations: Vec<SourceAnimation>,
}

impl SourceScene {
    /// Reject dangling references and anything that is not a forest
    pub fn validate(&self) -> Result<()> {
        let node_count = self.nodes.len();
        for node in &self.nodes {
            if let Some(&child) = node.children.iter().find(|&&c| c >= node_count) {
                bail!("Node '{}' references missing child {}", node.name, child);
            }
            if node.mesh.is_some_and(|m| m >= self.meshes.len()) {
                bail!("Node '{}' references missing mesh", node.name);
            }
            if node.skin.is_some_and(|s| s >= self.skins.len()) {
                bail!("Node '{}' references missing skin", node.name);
            }
            if node.skin.is_some() && node.mesh.is_none() {
                tracing::warn!("Node '{}' has a skin but no mesh", node.name);
            }
        }

        let mut visited = vec![false; node_count];
        let mut stack: Vec<usize> = Vec::new();
        for &root in &self.roots {
            if root >= node_count {
                bail!("Scene root {} is out of range", root);
            }
            stack.push(root);
        }
        while let Some(index) = stack.pop() {
            if visited[index] {
                bail!(
                    "Node '{}' is reachable more than once (cycle or shared child)",
                    self.nodes[index].name
                );
            }
            visited[index] = true;
            stack.extend(self.nodes[index].children.iter().rev());
        }

        for skin in &self.skins {
            if let Some(&joint) = skin.joints.iter().find(|&&j| j >= node_count) {
                bail!("Skin '{}' references missing joint node {}", skin.name, joint);
            }
        }
        for animation in &self.animations {
            if let Some(channel) = animation.channels.iter().find(|c| c.node >= node_count) {
                bail!(
                    "Animation '{}' targets missing node {}",
                    animation.name,
                    channel.node
                );
            }
        }
        Ok(())
    }

    /// Per node: referenced by at least one skin
    pub fn joint_flags(&self) -> Vec<bool> {
        let mut flags = vec![false; self.nodes.len()];
        for skin in &self.skins {
            for &joint in &skin.joints {
                if let Some(flag) = flags.get_mut(joint) {
                    *flag = true;
                }
            }
        }
        flags
    }

    pub fn material(&self, name: &str) -> Option<&SourceMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, children: Vec<usize>) -> SourceNode {
        SourceNode {
            name: name.to_string(),
            transform: Some(SourceTransform::Matrix(Mat4::IDENTITY)),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn test_z_up_conversion() {
        let up = UpAxis::Z.convert_point(Vec3::Z);
        assert!(up.abs_diff_eq(Vec3::Y, 1e-6));
        let forward = UpAxis::Z.convert_point(Vec3::Y);
        assert!(forward.abs_diff_eq(-Vec3::Z, 1e-6));
    }

    #[test]
    fn test_x_up_conversion() {
        assert!(UpAxis::X.convert_point(Vec3::X).abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_convert_transform_matches_points() {
        let m = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let converted = UpAxis::Z.convert_transform(m);
        let p = converted.transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-6));
    }

    #[test]
    fn test_trs_rejects_zero_quaternion() {
        let trs = SourceTransform::Trs {
            translation: Vec3::ZERO,
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
            scale: Vec3::ONE,
        };
        assert!(trs.to_matrix().is_none());
    }

    #[test]
    fn test_matrix_rejects_nan() {
        let mut cols = Mat4::IDENTITY.to_cols_array();
        cols[12] = f32::NAN;
        let m = SourceTransform::Matrix(Mat4::from_cols_array(&cols));
        assert!(m.to_matrix().is_none());
    }

    #[test]
    fn test_validate_detects_cycle() {
        let scene = SourceScene {
            nodes: vec![node("a", vec![1]), node("b", vec![0])],
            roots: vec![0],
            ..Default::default()
        };
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_validate_detects_missing_child() {
        let scene = SourceScene {
            nodes: vec![node("a", vec![7])],
            roots: vec![0],
            ..Default::default()
        };
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_skin_without_mesh_is_not_fatal() {
        let mut holder = node("Holder", vec![]);
        holder.skin = Some(0);
        let scene = SourceScene {
            nodes: vec![holder],
            roots: vec![0],
            skins: vec![SourceSkin {
                name: "rig".into(),
                joints: vec![0],
                bind_shape: Mat4::IDENTITY,
                inverse_binds: Vec::new(),
            }],
            ..Default::default()
        };
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_channel_consistency() {
        let good = SourceChannel::from_frames(
            0,
            ChannelProperty::Translation,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        );
        assert!(good.is_consistent());
        assert_eq!(good.sample_count(), 2);

        let mut bad = good.clone();
        bad.components[2].pop();
        assert!(!bad.is_consistent());
    }
}
