//! Programmatic source scenes and glTF files for integration tests.
//!
//! The reference asset is a two-joint skeleton (Root -> Child) with a
//! 4-vertex quad weighted 0.5/0.5 between both joints, and a two-frame clip
//! in which Child rotates 90 degrees about Z.

#![allow(dead_code)]

use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};

use glam::{Mat4, Quat, Vec2, Vec3};
use h3d_export::source::{
    ChannelProperty, SourceAnimation, SourceChannel, SourceCorner, SourceMaterial, SourceMesh,
    SourceNode, SourceScene, SourceSkin, SourceTransform, SourceTriGroup,
};

pub const QUAD_POSITIONS: [[f32; 3]; 4] = [
    [-0.5, 0.0, 0.0],
    [0.5, 0.0, 0.0],
    [0.5, 1.0, 0.0],
    [-0.5, 1.0, 0.0],
];

pub const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

pub fn node(name: &str, translation: Vec3, children: Vec<usize>) -> SourceNode {
    SourceNode {
        name: name.to_string(),
        transform: Some(SourceTransform::Trs {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }),
        children,
        ..Default::default()
    }
}

pub fn quad_mesh(indices: &[u32]) -> SourceMesh {
    let mut mesh = SourceMesh {
        name: "quad".into(),
        positions: QUAD_POSITIONS.iter().map(|&p| Vec3::from(p)).collect(),
        normals: vec![Vec3::Z; 4],
        groups: vec![SourceTriGroup {
            material: "skin".into(),
            corners: indices
                .iter()
                .map(|&i| SourceCorner::unified(i, true, 1))
                .collect(),
        }],
        influences: vec![vec![(0, 0.5), (1, 0.5)]; 4],
        ..Default::default()
    };
    mesh.tex_coords[0] = QUAD_UVS.iter().map(|&uv| Vec2::from(uv)).collect();
    mesh
}

/// Child rotation channel: identity, then a quarter turn about Z
pub fn bend_channel(node: usize) -> SourceChannel {
    let quarter = Quat::from_rotation_z(FRAC_PI_2);
    SourceChannel::from_frames(
        node,
        ChannelProperty::Rotation,
        &[Quat::IDENTITY.to_array(), quarter.to_array()],
    )
}

/// Nodes: 0 Root (joint), 1 Child (joint), 2 Quad (skinned mesh)
pub fn skinned_quad_scene() -> SourceScene {
    let mut quad = node("Quad", Vec3::ZERO, vec![]);
    quad.mesh = Some(0);
    quad.skin = Some(0);

    SourceScene {
        nodes: vec![
            node("Root", Vec3::ZERO, vec![1]),
            node("Child", Vec3::new(0.0, 1.0, 0.0), vec![]),
            quad,
        ],
        roots: vec![0, 2],
        meshes: vec![quad_mesh(&QUAD_INDICES)],
        skins: vec![SourceSkin {
            name: "rig".into(),
            joints: vec![0, 1],
            bind_shape: Mat4::IDENTITY,
            inverse_binds: Vec::new(),
        }],
        materials: vec![SourceMaterial {
            name: "skin".into(),
            diffuse_map: Some("textures/skin.png".into()),
            ..Default::default()
        }],
        animations: vec![SourceAnimation {
            name: "bend".into(),
            channels: vec![bend_channel(1)],
        }],
        ..Default::default()
    }
}

/// Skinned quad with one extra triangle that repeats a vertex
pub fn quad_scene_with_degenerate() -> SourceScene {
    let mut scene = skinned_quad_scene();
    let mut indices = QUAD_INDICES.to_vec();
    indices.extend([1, 1, 3]);
    scene.meshes[0] = quad_mesh(&indices);
    scene
}

/// Three sibling joints all named "Arm" under "Body"
pub fn clashing_names_scene() -> SourceScene {
    SourceScene {
        nodes: vec![
            node("Body", Vec3::ZERO, vec![1, 2, 3]),
            node("Arm", Vec3::X, vec![]),
            node("Arm", -Vec3::X, vec![]),
            node("Arm", Vec3::Y, vec![]),
        ],
        roots: vec![0],
        skins: vec![SourceSkin {
            name: "rig".into(),
            joints: vec![0, 1, 2, 3],
            bind_shape: Mat4::IDENTITY,
            inverse_binds: Vec::new(),
        }],
        ..Default::default()
    }
}

/// A chain of `count` joints one unit apart on Y, plus a quad whose corners
/// are each fully bound to one skin slot from `slots`
pub fn joint_chain_scene(count: usize, slots: [u32; 4]) -> SourceScene {
    let mut nodes: Vec<SourceNode> = (0..count)
        .map(|i| {
            let children = if i + 1 < count { vec![i + 1] } else { vec![] };
            node(&format!("Joint{i}"), Vec3::Y, children)
        })
        .collect();
    let mut quad = node("Quad", Vec3::ZERO, vec![]);
    quad.mesh = Some(0);
    quad.skin = Some(0);
    nodes.push(quad);

    let mut mesh = quad_mesh(&QUAD_INDICES);
    mesh.influences = slots.iter().map(|&slot| vec![(slot, 1.0)]).collect();

    SourceScene {
        nodes,
        roots: vec![0, count],
        meshes: vec![mesh],
        skins: vec![SourceSkin {
            name: "chain".into(),
            joints: (0..count).collect(),
            bind_shape: Mat4::IDENTITY,
            inverse_binds: Vec::new(),
        }],
        materials: vec![SourceMaterial {
            name: "skin".into(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

// ============================================================================
// glTF
// ============================================================================

fn push_f32s(buffer: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        buffer.extend_from_slice(&value.to_le_bytes());
    }
}

/// Write `<stem>.gltf` and `<stem>.bin` describing the skinned quad
///
/// Animation keys are one second apart, so sampling at 1 fps gives two frames.
pub fn write_skinned_quad_gltf(dir: &Path, stem: &str) -> PathBuf {
    write_bound_quad_gltf(dir, stem, None)
}

/// Skinned quad whose skin carries explicit inverse bind matrices for Root and Child
pub fn write_bound_quad_gltf(dir: &Path, stem: &str, inverse_binds: Option<[Mat4; 2]>) -> PathBuf {
    let mut bin = Vec::new();
    // POSITION @ 0
    for p in QUAD_POSITIONS {
        push_f32s(&mut bin, &p);
    }
    // NORMAL @ 48
    for _ in 0..4 {
        push_f32s(&mut bin, &[0.0, 0.0, 1.0]);
    }
    // TEXCOORD_0 @ 96, V flipped back to glTF's top-left origin
    for [u, v] in QUAD_UVS {
        push_f32s(&mut bin, &[u, 1.0 - v]);
    }
    // JOINTS_0 @ 128
    for _ in 0..4 {
        bin.extend_from_slice(&[0, 1, 0, 0]);
    }
    // WEIGHTS_0 @ 144
    for _ in 0..4 {
        push_f32s(&mut bin, &[0.5, 0.5, 0.0, 0.0]);
    }
    // indices @ 208
    for index in QUAD_INDICES {
        bin.extend_from_slice(&(index as u16).to_le_bytes());
    }
    // key times @ 220
    push_f32s(&mut bin, &[0.0, 1.0]);
    // rotations @ 228
    let quarter = Quat::from_rotation_z(FRAC_PI_2);
    push_f32s(&mut bin, &Quat::IDENTITY.to_array());
    push_f32s(&mut bin, &quarter.to_array());
    assert_eq!(bin.len(), 260);
    // inverse bind matrices @ 260
    if let Some(matrices) = inverse_binds {
        for m in matrices {
            push_f32s(&mut bin, &m.to_cols_array());
        }
    }
    let (skin_binds, bind_view, bind_accessor) = match inverse_binds {
        Some(_) => (
            r#", "inverseBindMatrices": 8"#,
            r#",
    { "buffer": 0, "byteOffset": 260, "byteLength": 128 }"#,
            r#",
    { "bufferView": 8, "componentType": 5126, "count": 2, "type": "MAT4" }"#,
        ),
        None => ("", "", ""),
    };
    let byte_length = bin.len();

    let bin_name = format!("{stem}.bin");
    std::fs::write(dir.join(&bin_name), &bin).unwrap();

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0, 2] }}],
  "nodes": [
    {{ "name": "Root", "children": [1] }},
    {{ "name": "Child", "translation": [0.0, 1.0, 0.0] }},
    {{ "name": "Quad", "mesh": 0, "skin": 0 }}
  ],
  "skins": [{{ "name": "rig", "joints": [0, 1]{skin_binds} }}],
  "materials": [{{
    "name": "skin",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.5, 0.25, 1.0] }}
  }}],
  "meshes": [{{
    "name": "quad",
    "primitives": [{{
      "attributes": {{ "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2, "JOINTS_0": 3, "WEIGHTS_0": 4 }},
      "indices": 5,
      "material": 0
    }}]
  }}],
  "animations": [{{
    "name": "bend",
    "channels": [{{ "sampler": 0, "target": {{ "node": 1, "path": "rotation" }} }}],
    "samplers": [{{ "input": 6, "output": 7, "interpolation": "LINEAR" }}]
  }}],
  "buffers": [{{ "uri": "{bin_name}", "byteLength": {byte_length} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 48 }},
    {{ "buffer": 0, "byteOffset": 48, "byteLength": 48 }},
    {{ "buffer": 0, "byteOffset": 96, "byteLength": 32 }},
    {{ "buffer": 0, "byteOffset": 128, "byteLength": 16 }},
    {{ "buffer": 0, "byteOffset": 144, "byteLength": 64 }},
    {{ "buffer": 0, "byteOffset": 208, "byteLength": 12 }},
    {{ "buffer": 0, "byteOffset": 220, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 228, "byteLength": 32 }}{bind_view}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3", "min": [-0.5, 0.0, 0.0], "max": [0.5, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 4, "type": "VEC2" }},
    {{ "bufferView": 3, "componentType": 5121, "count": 4, "type": "VEC4" }},
    {{ "bufferView": 4, "componentType": 5126, "count": 4, "type": "VEC4" }},
    {{ "bufferView": 5, "componentType": 5123, "count": 6, "type": "SCALAR" }},
    {{ "bufferView": 6, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0] }},
    {{ "bufferView": 7, "componentType": 5126, "count": 2, "type": "VEC4" }}{bind_accessor}
  ]
}}"#
    );

    let path = dir.join(format!("{stem}.gltf"));
    std::fs::write(&path, json).unwrap();
    path
}
