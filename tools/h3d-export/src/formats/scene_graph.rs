//! Scene graph (.scene.xml) writer
//!
//! ```text
//! <Model name="man" geometry="models/man/man.geo" lodDist1="10">
//!     <!-- Morph targets: "smile" -->
//!
//!     <Joint name="Hip" ty="1" jointIndex="1">
//!         <Joint name="Knee" ty="-0.5" jointIndex="2" />
//!     </Joint>
//!
//!     <Mesh name="Body" material="models/man/skin.material.xml" batchStart="0" ...>
//!         <Mesh name="#Body" material="models/man/cloth.material.xml" ... />
//!     </Mesh>
//! </Model>
//! ```

use std::fmt::Write;

use glam::{EulerRot, Vec3};

use crate::context::ConversionContext;
use crate::scene_graph::{NodeId, NodeKind, SceneNode};
use h3d_common::GEOMETRY_EXT;

/// Resource paths the scene graph refers to
#[derive(Debug, Clone)]
pub struct SceneGraphRefs<'a> {
    pub asset_name: &'a str,
    /// Prefix of every referenced resource, e.g. `models/man/`
    pub asset_path: &'a str,
    /// Prefix of material file names, empty unless materials are per model
    pub model_name: &'a str,
    pub lod_distances: [f32; 4],
}

/// Render the scene graph document
pub fn render_scene_graph(ctx: &ConversionContext, refs: &SceneGraphRefs<'_>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<Model name=\"{}\" geometry=\"{}{}.{}\"",
        escape(refs.asset_name),
        escape(refs.asset_path),
        escape(refs.asset_name),
        GEOMETRY_EXT
    );
    let lod_levels = (ctx.max_lod_level as usize).min(refs.lod_distances.len());
    for (level, distance) in refs.lod_distances[..lod_levels].iter().enumerate() {
        let _ = write!(out, " lodDist{}=\"{}\"", level + 1, distance);
    }
    out.push_str(">\n");

    if !ctx.morph_targets.is_empty() {
        out.push_str("\t<!-- Morph targets: ");
        for target in &ctx.morph_targets {
            let _ = write!(out, "\"{}\" ", comment_safe(&target.name));
        }
        out.push_str("-->\n\n");
    }

    let writer = NodeWriter { ctx, refs };
    for id in ctx.roots().filter(|&id| ctx.node(id).is_joint()) {
        writer.node(&mut out, id, 0);
    }
    out.push('\n');
    for id in ctx.roots().filter(|&id| !ctx.node(id).is_joint()) {
        writer.node(&mut out, id, 0);
    }

    out.push_str("</Model>\n");
    out
}

struct NodeWriter<'a> {
    ctx: &'a ConversionContext,
    refs: &'a SceneGraphRefs<'a>,
}

impl NodeWriter<'_> {
    fn node(&self, out: &mut String, id: NodeId, depth: usize) {
        let node = self.ctx.node(id);
        indent(out, depth + 1);

        let mut extra_groups: &[_] = &[];
        match &node.kind {
            NodeKind::Joint(joint) => {
                let _ = write!(out, "<Joint name=\"{}\"", escape(&node.name));
                write_transform(out, node);
                let _ = write!(out, " jointIndex=\"{}\"", joint.index);
            }
            NodeKind::Mesh(mesh) => {
                let _ = write!(out, "<Mesh name=\"{}\"", escape(&node.name));
                if mesh.lod_level > 0 {
                    let _ = write!(out, " lodLevel=\"{}\"", mesh.lod_level);
                }
                match mesh.tri_groups.split_first() {
                    Some((first, rest)) => {
                        self.material(out, &first.material);
                        write_transform(out, node);
                        write_batch(out, first.first, first.count, first.vert_r_start, first.vert_r_end);
                        extra_groups = rest;
                    }
                    None => {
                        write_transform(out, node);
                        write_batch(out, 0, 0, 0, 0);
                    }
                }
            }
        }

        if extra_groups.is_empty() && node.children.is_empty() {
            out.push_str(" />\n");
            return;
        }
        out.push_str(">\n");

        // Further triangle groups become sub-meshes of the first one
        for group in extra_groups {
            indent(out, depth + 2);
            let _ = write!(out, "<Mesh name=\"#{}\"", escape(&node.name));
            if let Some(mesh) = node.mesh().filter(|mesh| mesh.lod_level > 0) {
                let _ = write!(out, " lodLevel=\"{}\"", mesh.lod_level);
            }
            self.material(out, &group.material);
            write_batch(out, group.first, group.count, group.vert_r_start, group.vert_r_end);
            out.push_str(" />\n");
        }
        for &child in &node.children {
            self.node(out, child, depth + 1);
        }

        indent(out, depth + 1);
        out.push_str(if node.is_joint() { "</Joint>\n" } else { "</Mesh>\n" });
    }

    fn material(&self, out: &mut String, material: &str) {
        let _ = write!(
            out,
            " material=\"{}{}\"",
            escape(self.refs.asset_path),
            escape(&super::material_file_name(self.refs.model_name, material))
        );
    }
}

/// Relative transform attributes, each group omitted when it is the identity
fn write_transform(out: &mut String, node: &SceneNode) {
    let (scale, rotation, translation) = node.relative.to_scale_rotation_translation();
    let (ry, rx, rz) = rotation.to_euler(EulerRot::YXZ);
    let rotation = Vec3::new(rx.to_degrees(), ry.to_degrees(), rz.to_degrees());

    if translation != Vec3::ZERO {
        let _ = write!(
            out,
            " tx=\"{}\" ty=\"{}\" tz=\"{}\"",
            translation.x, translation.y, translation.z
        );
    }
    if rotation != Vec3::ZERO {
        let _ = write!(
            out,
            " rx=\"{}\" ry=\"{}\" rz=\"{}\"",
            rotation.x, rotation.y, rotation.z
        );
    }
    if scale != Vec3::ONE {
        let _ = write!(out, " sx=\"{}\" sy=\"{}\" sz=\"{}\"", scale.x, scale.y, scale.z);
    }
}

fn write_batch(out: &mut String, start: u32, count: u32, vert_start: u32, vert_end: u32) {
    let _ = write!(
        out,
        " batchStart=\"{start}\" batchCount=\"{count}\" vertRStart=\"{vert_start}\" vertREnd=\"{vert_end}\""
    );
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `--` may not appear inside an XML comment
fn comment_safe(value: &str) -> String {
    escape(value).replace("--", "- -")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{MorphTarget, TriGroup};
    use crate::scene_graph::{JointData, MeshData};
    use glam::{Mat4, Quat};

    const REFS: SceneGraphRefs<'static> = SceneGraphRefs {
        asset_name: "man",
        asset_path: "models/man/",
        model_name: "",
        lod_distances: [10.0, 20.0, 40.0, 80.0],
    };

    fn push(ctx: &mut ConversionContext, name: &str, parent: Option<usize>, relative: Mat4, kind: NodeKind) -> NodeId {
        let id = NodeId(ctx.nodes.len());
        ctx.nodes.push(SceneNode {
            name: name.into(),
            relative,
            absolute: relative,
            parent: parent.map(NodeId),
            children: Vec::new(),
            source: None,
            folded: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            ctx.nodes[parent].children.push(id);
        }
        id
    }

    fn joint(index: u32) -> NodeKind {
        NodeKind::Joint(JointData {
            index,
            ..Default::default()
        })
    }

    fn group(material: &str, first: u32, count: u32, vert_r_start: u32, vert_r_end: u32) -> TriGroup {
        TriGroup {
            first,
            count,
            vert_r_start,
            vert_r_end,
            material: material.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_joint_hierarchy() {
        let mut ctx = ConversionContext::new();
        push(&mut ctx, "Hip", None, Mat4::from_translation(Vec3::Y), joint(1));
        push(&mut ctx, "Knee", Some(0), Mat4::IDENTITY, joint(2));

        let xml = render_scene_graph(&ctx, &REFS);
        let expected = "<Model name=\"man\" geometry=\"models/man/man.geo\">\n\
                        \t<Joint name=\"Hip\" tx=\"0\" ty=\"1\" tz=\"0\" jointIndex=\"1\">\n\
                        \t\t<Joint name=\"Knee\" jointIndex=\"2\" />\n\
                        \t</Joint>\n\
                        \n\
                        </Model>\n";
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_mesh_groups_become_sub_meshes() {
        let mut ctx = ConversionContext::new();
        push(
            &mut ctx,
            "Body",
            None,
            Mat4::IDENTITY,
            NodeKind::Mesh(MeshData {
                tri_groups: vec![group("skin", 0, 6, 0, 3), group("cloth", 6, 3, 4, 6)],
                ..Default::default()
            }),
        );

        let xml = render_scene_graph(&ctx, &REFS);
        assert!(xml.contains(
            "\t<Mesh name=\"Body\" material=\"models/man/skin.material.xml\" \
             batchStart=\"0\" batchCount=\"6\" vertRStart=\"0\" vertREnd=\"3\">\n"
        ));
        assert!(xml.contains(
            "\t\t<Mesh name=\"#Body\" material=\"models/man/cloth.material.xml\" \
             batchStart=\"6\" batchCount=\"3\" vertRStart=\"4\" vertREnd=\"6\" />\n"
        ));
        assert!(xml.contains("\t</Mesh>\n</Model>\n"));
    }

    #[test]
    fn test_rotation_and_scale_attributes() {
        let mut ctx = ConversionContext::new();
        let relative = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(90f32.to_radians()),
            Vec3::ZERO,
        );
        push(&mut ctx, "Arm", None, relative, joint(1));
        let xml = render_scene_graph(&ctx, &REFS);
        assert!(xml.contains(" sx=\"2\" sy=\"2\" sz=\"2\""));
        assert!(!xml.contains(" tx="));

        let start = xml.find(" ry=\"").unwrap() + 5;
        let end = start + xml[start..].find('"').unwrap();
        let ry: f32 = xml[start..end].parse().unwrap();
        assert!((ry - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_lod_distances_and_morph_comment() {
        let mut ctx = ConversionContext::new();
        ctx.max_lod_level = 2;
        ctx.morph_targets.push(MorphTarget {
            name: "smile".into(),
            diffs: Vec::new(),
        });
        let xml = render_scene_graph(&ctx, &REFS);
        assert!(xml.starts_with(
            "<Model name=\"man\" geometry=\"models/man/man.geo\" lodDist1=\"10\" lodDist2=\"20\">\n"
        ));
        assert!(xml.contains("\t<!-- Morph targets: \"smile\" -->\n\n"));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut ctx = ConversionContext::new();
        push(&mut ctx, "a<b>&\"c\"", None, Mat4::IDENTITY, joint(1));
        let xml = render_scene_graph(&ctx, &REFS);
        assert!(xml.contains("name=\"a&lt;b&gt;&amp;&quot;c&quot;\""));
    }

    #[test]
    fn test_mesh_without_groups() {
        let mut ctx = ConversionContext::new();
        push(&mut ctx, "Empty", None, Mat4::IDENTITY, NodeKind::Mesh(MeshData::default()));
        let xml = render_scene_graph(&ctx, &REFS);
        assert!(xml.contains(
            "\t<Mesh name=\"Empty\" batchStart=\"0\" batchCount=\"0\" vertRStart=\"0\" vertREnd=\"0\" />\n"
        ));
    }
}
