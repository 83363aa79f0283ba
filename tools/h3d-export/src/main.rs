//! h3d-export - Horde3D asset export tool
//!
//! Converts glTF/GLB scenes to Horde3D runtime assets
//! (.geo, .scene.xml, .material.xml, .anim)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use h3d_export::batch::{jobs_for_path, run_jobs, BatchReport};
use h3d_export::manifest::Manifest;
use h3d_export::{AnimationFile, AssetKind, ConvertOptions, GeometryFile};
use h3d_common::{ANIMATION_EXT, GEOMETRY_EXT};

#[derive(Parser)]
#[command(name = "h3d-export")]
#[command(about = "Horde3D asset export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert models (geometry, scene graph, materials)
    Model {
        /// Input glTF/GLB file, or a directory searched recursively
        input: PathBuf,

        /// Resource root that asset paths are computed against
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Keep the source triangle order
        #[arg(long)]
        no_geo_opt: bool,

        /// Replace material files that already exist
        #[arg(long)]
        overwrite_mats: bool,

        /// Prefix material file names with the asset name
        #[arg(long)]
        add_model_name: bool,

        /// LOD 1 switch distance
        #[arg(long)]
        lod_dist1: Option<f32>,

        /// LOD 2 switch distance
        #[arg(long)]
        lod_dist2: Option<f32>,

        /// LOD 3 switch distance
        #[arg(long)]
        lod_dist3: Option<f32>,

        /// LOD 4 switch distance
        #[arg(long)]
        lod_dist4: Option<f32>,

        /// Frame rate for resampling keyframed animation (default: 30)
        #[arg(long)]
        frame_rate: Option<f32>,
    },

    /// Convert animations
    Anim {
        /// Input glTF/GLB file, or a directory searched recursively
        input: PathBuf,

        /// Resource root that asset paths are computed against
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Frame rate for resampling keyframed animation (default: 30)
        #[arg(long)]
        frame_rate: Option<f32>,
    },

    /// Build assets from a manifest file
    Build {
        /// Path to assets.toml manifest
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to assets.toml manifest
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,
    },

    /// Print a summary of a .geo or .anim file
    Info {
        /// Converted file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Model {
            input,
            base,
            dest,
            no_geo_opt,
            overwrite_mats,
            add_model_name,
            lod_dist1,
            lod_dist2,
            lod_dist3,
            lod_dist4,
            frame_rate,
        } => {
            let mut options = ConvertOptions {
                optimize_geometry: !no_geo_opt,
                overwrite_materials: overwrite_mats,
                add_model_name,
                ..Default::default()
            };
            let lod_overrides = [lod_dist1, lod_dist2, lod_dist3, lod_dist4];
            for (slot, value) in options.lod_distances.iter_mut().zip(lod_overrides) {
                if let Some(value) = value {
                    *slot = value;
                }
            }
            if let Some(frame_rate) = frame_rate {
                options.frame_rate = frame_rate;
            }
            let report = convert(&input, AssetKind::Model, base.as_deref(), &dest, &options)?;
            finish(&report)?;
        }

        Commands::Anim {
            input,
            base,
            dest,
            frame_rate,
        } => {
            let mut options = ConvertOptions::default();
            if let Some(frame_rate) = frame_rate {
                options.frame_rate = frame_rate;
            }
            let report = convert(&input, AssetKind::Animation, base.as_deref(), &dest, &options)?;
            finish(&report)?;
        }

        Commands::Build { manifest, output } => {
            tracing::info!("Building assets from {:?}", manifest);
            let manifest = Manifest::load(&manifest)?;
            let report = manifest.build_all(output.as_deref())?;
            finish(&report)?;
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            Manifest::load(&manifest)?.validate()?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Info { file } => print_info(&file)?,
    }

    Ok(())
}

fn convert(
    input: &Path,
    kind: AssetKind,
    base: Option<&Path>,
    dest: &Path,
    options: &ConvertOptions,
) -> Result<BatchReport> {
    if !input.exists() {
        bail!("Input not found: {:?}", input);
    }
    if !(options.frame_rate.is_finite() && options.frame_rate > 0.0) {
        bail!("Invalid frame rate {} (must be positive)", options.frame_rate);
    }
    let jobs = jobs_for_path(input, kind, base, dest, None)?;
    Ok(run_jobs(&jobs, options))
}

fn finish(report: &BatchReport) -> Result<()> {
    if !report.is_success() {
        for (input, err) in &report.failed {
            tracing::error!("{:?}: {}", input, err);
        }
        bail!("{} asset(s) failed to convert", report.failed.len());
    }
    tracing::info!("Done! {} files written", report.written.len());
    Ok(())
}

fn print_info(path: &Path) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        GEOMETRY_EXT => {
            let geo = GeometryFile::parse(&data)
                .with_context(|| format!("Failed to decode geometry: {:?}", path))?;
            tracing::info!(
                "{:?}: {} joints, {} vertices, {} triangles, {} morph targets, skinned={}",
                path,
                geo.skeleton_joint_count(),
                geo.vertex_count,
                geo.indices.len() / 3,
                geo.morph_targets.len(),
                geo.joint_indices.is_some()
            );
            for target in &geo.morph_targets {
                tracing::info!("  morph '{}': {} vertices", target.name, target.vertex_indices.len());
            }
        }
        ANIMATION_EXT => {
            let anim = AnimationFile::parse(&data)
                .with_context(|| format!("Failed to decode animation: {:?}", path))?;
            tracing::info!(
                "{:?}: {} tracks, {} frames",
                path,
                anim.tracks.len(),
                anim.frame_count
            );
            for track in &anim.tracks {
                tracing::info!(
                    "  '{}': {} stored frames{}",
                    track.name,
                    track.frames.len(),
                    if track.compressed { " (compressed)" } else { "" }
                );
            }
        }
        _ => bail!("Unknown file type: {:?} (use .geo or .anim)", path),
    }
    Ok(())
}
