//! assets.toml manifest parsing
//!
//! ```toml
//! [output]
//! dir = "build/assets"
//! base = "source"
//!
//! [options]
//! optimize_geometry = true
//! lod_distances = [10.0, 20.0, 40.0, 80.0]
//!
//! [[assets]]
//! path = "source/chars/man.gltf"
//!
//! [[assets]]
//! path = "source/chars/man_walk.glb"
//! kind = "animation"
//! name = "man"
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use anyhow::{bail, Context, Result};
use hashbrown::HashSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::batch::{jobs_for_path, run_jobs, BatchReport, Job};
use crate::config::ConvertOptions;
use crate::convert::AssetKind;
use crate::import::is_supported;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub options: ConvertOptions,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Output root
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Resource root that asset paths are computed against
    #[serde(default)]
    pub base: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            base: None,
        }
    }
}

/// Single asset entry
#[derive(Debug, Clone, Deserialize)]
pub struct AssetEntry {
    /// Source file or directory
    pub path: PathBuf,
    #[serde(default)]
    pub kind: AssetKind,
    /// Asset name, defaults to the file stem
    #[serde(default)]
    pub name: Option<String>,
}

impl Manifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut manifest = Self::parse(&content)?;
        manifest.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse assets.toml")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Check options and asset entries without converting anything
    pub fn validate(&self) -> Result<()> {
        let options = &self.options;
        if !(options.frame_rate.is_finite() && options.frame_rate > 0.0) {
            bail!("Invalid frame_rate {} (must be positive)", options.frame_rate);
        }
        if options
            .lod_distances
            .windows(2)
            .any(|pair| !(pair[0] > 0.0 && pair[0] <= pair[1]))
        {
            bail!(
                "Invalid lod_distances {:?} (must be positive and ascending)",
                options.lod_distances
            );
        }

        if self.assets.is_empty() {
            tracing::warn!("Manifest declares no assets");
        }

        let mut outputs = HashSet::new();
        for entry in &self.assets {
            let path = self.resolve(&entry.path);
            if !path.exists() {
                bail!("Asset not found: {}", path.display());
            }
            if path.is_file() && !is_supported(&path) {
                bail!(
                    "Unsupported asset format: {} (use .gltf or .glb)",
                    path.display()
                );
            }
            if entry.name.is_some() && path.is_dir() {
                tracing::warn!(
                    "Asset name '{}' ignored for directory {}",
                    entry.name.as_deref().unwrap_or_default(),
                    path.display()
                );
            }

            for job in self.entry_jobs(entry, &self.resolve(&self.output.dir))? {
                let key = (job.kind, job.target.asset_path, job.target.asset_name);
                if !outputs.insert(key.clone()) {
                    bail!(
                        "Two assets write the same {:?} output '{}{}'",
                        key.0,
                        key.1,
                        key.2
                    );
                }
            }
        }
        Ok(())
    }

    fn entry_jobs(&self, entry: &AssetEntry, dest: &Path) -> Result<Vec<Job>> {
        let base = self.output.base.as_ref().map(|base| self.resolve(base));
        jobs_for_path(
            &self.resolve(&entry.path),
            entry.kind,
            base.as_deref(),
            dest,
            entry.name.as_deref(),
        )
    }

    /// Validate, then convert every asset
    ///
    /// `output` overrides the manifest's output directory.
    pub fn build_all(&self, output: Option<&Path>) -> Result<BatchReport> {
        self.validate()?;
        let dest = output.map_or_else(|| self.resolve(&self.output.dir), Path::to_path_buf);

        let mut jobs = Vec::new();
        for entry in &self.assets {
            jobs.extend(self.entry_jobs(entry, &dest)?);
        }
        Ok(run_jobs(&jobs, &self.options))
    }
}
