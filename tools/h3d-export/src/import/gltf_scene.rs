//! glTF/GLB front-end
//!
//! Buffers are loaded, images are not: texture references are kept as URIs
//! for the material writer. Keyframed animation is resampled at a fixed frame
//! rate so every channel becomes a per-frame array.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation;
use std::path::Path;

use crate::source::{
    ChannelProperty, SourceAnimation, SourceChannel, SourceCorner, SourceMaterial, SourceMesh,
    SourceMorphTarget, SourceNode, SourceScene, SourceSkin, SourceTransform, SourceTriGroup,
    UpAxis,
};

/// Texture coordinate sets read from each primitive
const GLTF_TEX_SETS: u32 = 2;

/// Material name for primitives without a material
const DEFAULT_MATERIAL: &str = "default";

/// Load a .gltf or .glb file
pub fn load_gltf(path: &Path, frame_rate: f32) -> Result<SourceScene> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::open(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)
        .with_context(|| format!("Failed to load glTF buffers: {:?}", path))?;
    read_document(&document, &buffers, frame_rate)
}

/// Convert a parsed document into the canonical source scene
pub fn read_document(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    frame_rate: f32,
) -> Result<SourceScene> {
    let nodes: Vec<SourceNode> = document.nodes().map(|node| read_node(&node)).collect();

    let meshes = document
        .meshes()
        .map(|mesh| read_mesh(&mesh, buffers))
        .collect::<Result<Vec<_>>>()?;

    let skins = document.skins().map(|skin| read_skin(&skin, buffers)).collect();

    let materials = document.materials().map(|m| read_material(&m)).collect();

    let animations = document
        .animations()
        .map(|animation| read_animation(&animation, buffers, frame_rate))
        .collect::<Result<Vec<_>>>()?;

    Ok(SourceScene {
        up_axis: UpAxis::Y,
        roots: scene_roots(document),
        nodes,
        meshes,
        skins,
        materials,
        animations,
    })
}

/// Root nodes of the default (or first) scene
///
/// A document without scenes contributes every node that has no parent.
fn scene_roots(document: &gltf::Document) -> Vec<usize> {
    let scene_count = document.scenes().len();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    if scene_count > 1 {
        tracing::warn!(
            "Document has {} scenes, only '{}' is converted",
            scene_count,
            scene
                .as_ref()
                .and_then(|s| s.name())
                .unwrap_or("scene0")
        );
    }

    match scene {
        Some(scene) => scene.nodes().map(|node| node.index()).collect(),
        None => {
            let mut has_parent = vec![false; document.nodes().len()];
            for node in document.nodes() {
                for child in node.children() {
                    has_parent[child.index()] = true;
                }
            }
            (0..has_parent.len()).filter(|&i| !has_parent[i]).collect()
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

fn read_node(node: &gltf::Node) -> SourceNode {
    let transform = match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            SourceTransform::Matrix(Mat4::from_cols_array_2d(&matrix))
        }
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => SourceTransform::Trs {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from(scale),
        },
    };

    SourceNode {
        name: node
            .name()
            .map_or_else(|| format!("node{}", node.index()), str::to_string),
        transform: Some(transform),
        children: node.children().map(|child| child.index()).collect(),
        mesh: node.mesh().map(|mesh| mesh.index()),
        skin: node.skin().map(|skin| skin.index()),
    }
}

// ============================================================================
// Skins
// ============================================================================

fn read_skin(skin: &gltf::Skin, buffers: &[gltf::buffer::Data]) -> SourceSkin {
    let name = skin
        .name()
        .map_or_else(|| format!("skin{}", skin.index()), str::to_string);
    let joints: Vec<usize> = skin.joints().map(|joint| joint.index()).collect();

    let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let mut inverse_binds: Vec<Mat4> = reader
        .read_inverse_bind_matrices()
        .map(|matrices| matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();
    if !inverse_binds.is_empty() && inverse_binds.len() != joints.len() {
        tracing::warn!(
            "Skin '{}' has {} inverse bind matrices for {} joints, using the rest pose",
            name,
            inverse_binds.len(),
            joints.len()
        );
        inverse_binds.clear();
    }

    SourceSkin {
        name,
        joints,
        // glTF vertices are already in bind space
        bind_shape: Mat4::IDENTITY,
        inverse_binds,
    }
}

// ============================================================================
// Meshes
// ============================================================================

fn material_name(material: &gltf::Material) -> String {
    match material.index() {
        Some(index) => material
            .name()
            .map_or_else(|| format!("material{index}"), str::to_string),
        None => DEFAULT_MATERIAL.to_string(),
    }
}

/// Merge all triangle primitives of a mesh into shared attribute arrays
fn read_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<SourceMesh> {
    let name = mesh
        .name()
        .map_or_else(|| format!("mesh{}", mesh.index()), str::to_string);
    let mut out = SourceMesh {
        name: name.clone(),
        ..Default::default()
    };
    // Per morph target: displacement of every position read so far
    let mut displacements: Vec<Vec<Vec3>> = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(
                "Mesh '{}': skipping primitive {} with mode {:?}",
                name,
                primitive.index(),
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(positions) = reader.read_positions() else {
            tracing::warn!(
                "Mesh '{}': primitive {} has no positions",
                name,
                primitive.index()
            );
            continue;
        };

        let offset = out.positions.len();
        out.positions.extend(positions.map(Vec3::from));
        let count = out.positions.len() - offset;

        let has_normal = match reader.read_normals() {
            Some(normals) => {
                out.normals.resize(offset, Vec3::ZERO);
                out.normals.extend(normals.map(Vec3::from));
                true
            }
            None => false,
        };

        // Sets are used in order; a gap ends the run
        let mut tex_sets = 0;
        for set in 0..GLTF_TEX_SETS {
            let Some(tex_coords) = reader.read_tex_coords(set) else {
                break;
            };
            let stream = &mut out.tex_coords[set as usize];
            stream.resize(offset, Vec2::ZERO);
            stream.extend(tex_coords.into_f32().map(|[u, v]| Vec2::new(u, 1.0 - v)));
            tex_sets += 1;
        }

        if let (Some(joints), Some(weights)) = (reader.read_joints(0), reader.read_weights(0)) {
            out.influences.resize(offset, Vec::new());
            out.influences
                .extend(joints.into_u16().zip(weights.into_f32()).map(|(j, w)| {
                    j.iter()
                        .zip(w)
                        .filter(|(_, weight)| *weight > 0.0)
                        .map(|(&joint, weight)| (u32::from(joint), weight))
                        .collect()
                }));
        }

        for (target, (target_positions, _, _)) in reader.read_morph_targets().enumerate() {
            if displacements.len() <= target {
                displacements.resize(target + 1, Vec::new());
            }
            let stream = &mut displacements[target];
            stream.resize(offset, Vec3::ZERO);
            match target_positions {
                Some(deltas) => stream.extend(deltas.map(Vec3::from)),
                None => stream.resize(offset + count, Vec3::ZERO),
            }
        }

        let corners = match reader.read_indices() {
            Some(indices) => indices
                .into_u32()
                .map(|i| SourceCorner::unified(offset as u32 + i, has_normal, tex_sets))
                .collect(),
            None => (0..count as u32)
                .map(|i| SourceCorner::unified(offset as u32 + i, has_normal, tex_sets))
                .collect(),
        };

        out.groups.push(SourceTriGroup {
            material: material_name(&primitive.material()),
            corners,
        });
    }

    if !out.influences.is_empty() {
        out.influences.resize(out.positions.len(), Vec::new());
    }

    out.morph_targets = displacements
        .into_iter()
        .enumerate()
        .map(|(target, mut deltas)| {
            deltas.resize(out.positions.len(), Vec3::ZERO);
            SourceMorphTarget {
                name: format!("{name}_morph{target}"),
                positions: out
                    .positions
                    .iter()
                    .zip(&deltas)
                    .map(|(base, delta)| *base + *delta)
                    .collect(),
            }
        })
        .collect();

    tracing::debug!(
        "Mesh '{}': {} positions, {} groups, {} morph targets",
        name,
        out.positions.len(),
        out.groups.len(),
        out.morph_targets.len()
    );
    Ok(out)
}

fn read_material(material: &gltf::Material) -> SourceMaterial {
    let name = material_name(material);
    let pbr = material.pbr_metallic_roughness();

    let diffuse_map = pbr
        .base_color_texture()
        .and_then(|info| match info.texture().source().source() {
            gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
            gltf::image::Source::View { .. } => {
                tracing::warn!(
                    "Material '{}': embedded base colour image is not exported",
                    name
                );
                None
            }
        });

    SourceMaterial {
        name,
        diffuse_map,
        diffuse_color: Some(pbr.base_color_factor()),
        specular_color: None,
        shininess: None,
    }
}

// ============================================================================
// Animation
// ============================================================================

/// Resample every channel of an animation at `frame_rate`
fn read_animation(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    frame_rate: f32,
) -> Result<SourceAnimation> {
    let name = animation
        .name()
        .map_or_else(|| format!("anim{}", animation.index()), str::to_string);

    // Find animation duration
    let mut max_time = 0.0f32;
    for channel in animation.channels() {
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        if let Some(inputs) = reader.read_inputs() {
            max_time = inputs.fold(max_time, f32::max);
        }
    }
    let frame_count = frame_count(max_time, frame_rate);
    let frame_times: Vec<f32> = (0..frame_count).map(|i| i as f32 / frame_rate).collect();

    let mut channels = Vec::new();
    let mut skipped_weights = false;
    for channel in animation.channels() {
        let node = channel.target().node().index();
        let interpolation = channel.sampler().interpolation();
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));

        let times: Vec<f32> = reader
            .read_inputs()
            .with_context(|| format!("Animation '{name}': channel has no input times"))?
            .collect();
        let outputs = reader
            .read_outputs()
            .with_context(|| format!("Animation '{name}': channel has no output values"))?;

        let sampled = match outputs {
            ReadOutputs::Translations(values) => {
                let values: Vec<Vec3> = values.map(Vec3::from).collect();
                sample_keys(&times, &values, &frame_times, interpolation, Vec3::lerp).map(
                    |frames| {
                        let frames: Vec<[f32; 3]> = frames.iter().map(|v| v.to_array()).collect();
                        SourceChannel::from_frames(node, ChannelProperty::Translation, &frames)
                    },
                )
            }
            ReadOutputs::Rotations(values) => {
                let values: Vec<Quat> = values.into_f32().map(Quat::from_array).collect();
                sample_keys(&times, &values, &frame_times, interpolation, Quat::slerp).map(
                    |frames| {
                        let frames: Vec<[f32; 4]> =
                            frames.iter().map(|q| q.normalize().to_array()).collect();
                        SourceChannel::from_frames(node, ChannelProperty::Rotation, &frames)
                    },
                )
            }
            ReadOutputs::Scales(values) => {
                let values: Vec<Vec3> = values.map(Vec3::from).collect();
                sample_keys(&times, &values, &frame_times, interpolation, Vec3::lerp).map(
                    |frames| {
                        let frames: Vec<[f32; 3]> = frames.iter().map(|v| v.to_array()).collect();
                        SourceChannel::from_frames(node, ChannelProperty::Scale, &frames)
                    },
                )
            }
            ReadOutputs::MorphTargetWeights(_) => {
                skipped_weights = true;
                continue;
            }
        };

        match sampled {
            Some(channel) => channels.push(channel),
            None => tracing::warn!(
                "Animation '{}': {:?} channel of node {} has mismatched keys, ignored",
                name,
                channel.target().property(),
                node
            ),
        }
    }

    if skipped_weights {
        tracing::warn!(
            "Animation '{}': morph target weight channels are not exported",
            name
        );
    }
    tracing::debug!(
        "Animation '{}': {} channels, {} frames at {} fps",
        name,
        channels.len(),
        frame_count,
        frame_rate
    );
    Ok(SourceAnimation { name, channels })
}

/// Frames covering `[0, duration]` with both ends included
fn frame_count(duration: f32, frame_rate: f32) -> usize {
    if !(duration > 0.0 && frame_rate > 0.0) {
        return 1;
    }
    (duration * frame_rate).round() as usize + 1
}

/// Keyframe pair surrounding `t` and the blend factor between them
fn key_span(times: &[f32], t: f32) -> (usize, usize, f32) {
    let next = times.partition_point(|&key| key <= t);
    if next == 0 {
        return (0, 0, 0.0);
    }
    if next >= times.len() {
        let last = times.len() - 1;
        return (last, last, 0.0);
    }
    let prev = next - 1;
    let span = times[next] - times[prev];
    let factor = if span > 0.0 {
        ((t - times[prev]) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (prev, next, factor)
}

/// Evaluate a sampler at each frame time
///
/// Cubic-spline keys contribute their value element only, blended linearly.
/// Returns `None` when the key and value counts disagree.
fn sample_keys<T: Copy>(
    times: &[f32],
    values: &[T],
    frame_times: &[f32],
    interpolation: Interpolation,
    blend: impl Fn(T, T, f32) -> T,
) -> Option<Vec<T>> {
    let values: Vec<T> = match interpolation {
        Interpolation::CubicSpline => values.chunks_exact(3).map(|key| key[1]).collect(),
        _ => values.to_vec(),
    };
    if times.is_empty() || values.len() != times.len() {
        return None;
    }

    let frames = frame_times
        .iter()
        .map(|&t| {
            let (prev, next, factor) = key_span(times, t);
            match interpolation {
                Interpolation::Step => values[prev],
                _ if prev == next => values[prev],
                _ => blend(values[prev], values[next], factor),
            }
        })
        .collect();
    Some(frames)
}
