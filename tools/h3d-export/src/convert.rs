//! Asset conversion driver
//!
//! Runs the pipeline stages in order over one source scene and writes the
//! resulting files. Each asset gets its own [`ConversionContext`].
//!
//! Output for an asset `man` with asset path `models/man/`:
//! ```text
//! <dest>/models/man/man.geo
//! <dest>/models/man/man.scene.xml
//! <dest>/models/man/<material>.material.xml   (one per material)
//! <dest>/models/man/man.anim                  (or man_<clip>.anim per clip)
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Component, Path, PathBuf};

use crate::animation::{sample_animations, AnimationClip};
use crate::config::ConvertOptions;
use crate::context::ConversionContext;
use crate::formats::{
    material_file_name, render_material, render_scene_graph, write_animation, write_geometry,
    SceneGraphRefs, ANIMATION_EXT, GEOMETRY_EXT, SCENE_GRAPH_EXT,
};
use crate::geometry::{
    build_morph_targets, build_vertex_buffers, compute_base_tangent_basis, optimize_index_order,
    remove_degenerate_triangles,
};
use crate::import::load_scene;
use crate::scene_graph::build_scene_graph;
use crate::skeleton::{apply_skinning, assign_joint_indices, bind_source_poses};
use crate::source::SourceScene;

/// What to produce from a source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Geometry, scene graph and materials
    #[default]
    Model,
    /// Animation files only
    Animation,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Build the scene graph, sample animations and number the joints
///
/// Enough for animation output; geometry stages are skipped.
pub fn sample_scene(scene: &SourceScene) -> Result<ConversionContext> {
    scene.validate()?;
    let mut ctx = ConversionContext::new();
    build_scene_graph(scene, &mut ctx);
    sample_animations(scene, &mut ctx);
    assign_joint_indices(&mut ctx);
    Ok(ctx)
}

/// Run every pipeline stage over a source scene
pub fn convert_scene(scene: &SourceScene, options: &ConvertOptions) -> Result<ConversionContext> {
    let mut ctx = sample_scene(scene)?;

    bind_source_poses(scene, &mut ctx);
    build_vertex_buffers(scene, &mut ctx);
    apply_skinning(&mut ctx);
    remove_degenerate_triangles(&mut ctx);
    compute_base_tangent_basis(&mut ctx);
    build_morph_targets(scene, &mut ctx);

    if options.optimize_geometry {
        let stats = optimize_index_order(&mut ctx);
        tracing::info!(
            "Vertex cache hit ratio: {:.3} -> {:.3}",
            stats.before,
            stats.after
        );
    }
    for group in ctx.tri_groups_mut() {
        group.position_buckets.clear();
    }

    tracing::info!(
        "Converted: {} joints, {} meshes, {} vertices, {} triangles, {} morph targets",
        ctx.joints.len(),
        ctx.meshes.len(),
        ctx.vertices.len(),
        ctx.indices.len() / 3,
        ctx.morph_targets.len()
    );
    Ok(ctx)
}

/// Encode the geometry file in memory
pub fn encode_geometry(ctx: &ConversionContext) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    write_geometry(&mut buffer, ctx)?;
    Ok(buffer.into_inner())
}

/// Encode one animation file in memory
pub fn encode_animation(clip: &AnimationClip, ctx: &ConversionContext) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    write_animation(&mut buffer, clip, ctx)?;
    Ok(buffer.into_inner())
}

// ============================================================================
// Output
// ============================================================================

/// Where an asset's files go and how they refer to each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Output root
    pub dest: PathBuf,
    /// Directory of the asset relative to the resource root, `/`-separated
    /// with a trailing `/` (empty at the root)
    pub asset_path: String,
    pub asset_name: String,
}

impl OutputTarget {
    /// Derive the asset path from the input's location below `base`
    pub fn for_input(input: &Path, base: &Path, dest: &Path, name: Option<&str>) -> Result<Self> {
        let asset_name = match name {
            Some(name) => name.to_string(),
            None => input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .with_context(|| format!("Input has no usable file name: {:?}", input))?
                .to_string(),
        };

        let parent = input.parent().unwrap_or(Path::new(""));
        let relative = parent.strip_prefix(base).unwrap_or(parent);
        let mut asset_path = String::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    asset_path.push_str(&part.to_string_lossy());
                    asset_path.push('/');
                }
                Component::CurDir => {}
                _ => bail!(
                    "Input {:?} is not below the base directory {:?}",
                    input,
                    base
                ),
            }
        }

        Ok(Self {
            dest: dest.to_path_buf(),
            asset_path,
            asset_name,
        })
    }

    /// Directory the asset's files are written to
    pub fn dir(&self) -> PathBuf {
        self.dest.join(&self.asset_path)
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir().join(format!("{}{}", self.asset_name, suffix))
    }

    pub fn geometry_path(&self) -> PathBuf {
        self.file(&format!(".{GEOMETRY_EXT}"))
    }

    pub fn scene_graph_path(&self) -> PathBuf {
        self.file(&format!(".{SCENE_GRAPH_EXT}"))
    }

    /// Animation file of a clip; the clip name is only used when there are several
    pub fn animation_path(&self, clip: Option<&str>) -> PathBuf {
        match clip {
            Some(clip) => self.file(&format!("_{}.{ANIMATION_EXT}", file_safe(clip))),
            None => self.file(&format!(".{ANIMATION_EXT}")),
        }
    }
}

/// Write geometry, scene graph and materials of a converted model
///
/// Geometry and scene graph are replaced together or not at all. Returns the
/// written paths.
pub fn write_model(
    ctx: &ConversionContext,
    scene: &SourceScene,
    target: &OutputTarget,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    let dir = target.dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let model_name = options.model_name(&target.asset_name);
    let geometry = encode_geometry(ctx)?;
    let scene_graph = render_scene_graph(
        ctx,
        &SceneGraphRefs {
            asset_name: &target.asset_name,
            asset_path: &target.asset_path,
            model_name: &model_name,
            lod_distances: options.lod_distances,
        },
    );

    let geometry_path = target.geometry_path();
    let scene_graph_path = target.scene_graph_path();
    write_atomically(&[
        (geometry_path.as_path(), geometry.as_slice()),
        (scene_graph_path.as_path(), scene_graph.as_bytes()),
    ])?;
    tracing::info!("Wrote {:?} ({} bytes)", geometry_path, geometry.len());
    tracing::info!("Wrote {:?}", scene_graph_path);

    let mut written = vec![geometry_path, scene_graph_path];
    for material in ctx.material_names() {
        let path = dir.join(material_file_name(&model_name, material));
        if path.exists() && !options.overwrite_materials {
            tracing::info!("Skipping existing material {:?}", path);
            continue;
        }
        let xml = render_material(scene.material(material), ctx.has_joints());
        write_atomically(&[(path.as_path(), xml.as_bytes())])?;
        tracing::info!("Wrote {:?}", path);
        written.push(path);
    }
    Ok(written)
}

/// Write one animation file per sampled clip
pub fn write_animations(ctx: &ConversionContext, target: &OutputTarget) -> Result<Vec<PathBuf>> {
    if ctx.clips.is_empty() {
        tracing::info!("'{}' has no animation clips", target.asset_name);
        return Ok(Vec::new());
    }

    let dir = target.dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let single = ctx.clips.len() == 1;
    let mut files = Vec::with_capacity(ctx.clips.len());
    for clip in &ctx.clips {
        let path = target.animation_path((!single).then_some(clip.name.as_str()));
        files.push((path, encode_animation(clip, ctx)?));
    }
    let borrowed: Vec<(&Path, &[u8])> = files
        .iter()
        .map(|(path, bytes)| (path.as_path(), bytes.as_slice()))
        .collect();
    write_atomically(&borrowed)?;

    for (clip, (path, bytes)) in ctx.clips.iter().zip(&files) {
        tracing::info!(
            "Wrote {:?} ({} frames, {} tracks, {} bytes)",
            path,
            clip.frame_count,
            clip.tracks.len(),
            bytes.len()
        );
    }
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

/// Load, convert and write one source file
pub fn convert_file(
    input: &Path,
    kind: AssetKind,
    target: &OutputTarget,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    tracing::info!("Converting {:?} as {:?} '{}'", input, kind, target.asset_name);
    let scene = load_scene(input, options)?;
    match kind {
        AssetKind::Model => {
            let ctx = convert_scene(&scene, options)
                .with_context(|| format!("Failed to convert {:?}", input))?;
            write_model(&ctx, &scene, target, options)
        }
        AssetKind::Animation => {
            let ctx = sample_scene(&scene)
                .with_context(|| format!("Failed to convert {:?}", input))?;
            write_animations(&ctx, target)
        }
    }
}

// ============================================================================
// Atomic Writes
// ============================================================================

/// Write every file to a temporary sibling, then rename them all into place
///
/// Nothing is renamed unless every temporary file was written.
fn write_atomically(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        let temp = temp_path(path);
        let result = write_file(&temp, bytes);
        staged.push(temp);
        if let Err(err) = result {
            remove_all(&staged);
            return Err(err);
        }
    }

    for (index, ((path, _), temp)) in files.iter().zip(&staged).enumerate() {
        if let Err(err) = fs::rename(temp, path) {
            remove_all(&staged[index..]);
            return Err(err).with_context(|| format!("Failed to replace output: {:?}", path));
        }
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed to write output: {:?}", path))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// Clip names become part of a file name
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
