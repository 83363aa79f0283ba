//! Batch conversion
//!
//! Inputs may be single files or directories searched recursively. Every
//! supported file becomes a job; jobs run in parallel, one conversion
//! context each, and a failing job never stops the others.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::ConvertOptions;
use crate::convert::{convert_file, AssetKind, OutputTarget};
use crate::import::is_supported;

/// One source file to convert
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub input: PathBuf,
    pub kind: AssetKind,
    pub target: OutputTarget,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: usize,
    pub written: Vec<PathBuf>,
    /// Input and error chain of each failed job
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Supported files below `root`, sorted, skipping hidden entries
pub fn collect_inputs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
    {
        let entry = entry.with_context(|| format!("Failed to read directory: {:?}", root))?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            inputs.push(entry.into_path());
        }
    }
    inputs.sort();
    Ok(inputs)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Jobs for a file or directory input
///
/// For a directory, asset paths are taken relative to `base` (or to the
/// directory itself when no base is given). `name` only applies to a single
/// file input.
pub fn jobs_for_path(
    input: &Path,
    kind: AssetKind,
    base: Option<&Path>,
    dest: &Path,
    name: Option<&str>,
) -> Result<Vec<Job>> {
    if input.is_dir() {
        let base = base.unwrap_or(input);
        let inputs = collect_inputs(input)?;
        if inputs.is_empty() {
            tracing::warn!("No supported files found in {:?}", input);
        }
        inputs
            .into_iter()
            .map(|path| {
                let target = OutputTarget::for_input(&path, base, dest, None)?;
                Ok(Job {
                    input: path,
                    kind,
                    target,
                })
            })
            .collect()
    } else {
        let base = base.or_else(|| input.parent()).unwrap_or(Path::new(""));
        let target = OutputTarget::for_input(input, base, dest, name)?;
        Ok(vec![Job {
            input: input.to_path_buf(),
            kind,
            target,
        }])
    }
}

/// Convert every job, in parallel
pub fn run_jobs(jobs: &[Job], options: &ConvertOptions) -> BatchReport {
    let results: Vec<(&Job, Result<Vec<PathBuf>>)> = jobs
        .par_iter()
        .map(|job| (job, convert_file(&job.input, job.kind, &job.target, options)))
        .collect();

    let mut report = BatchReport::default();
    for (job, result) in results {
        match result {
            Ok(written) => {
                report.converted += 1;
                report.written.extend(written);
            }
            Err(err) => {
                tracing::error!("Failed to convert {:?}: {:#}", job.input, err);
                report.failed.push((job.input.clone(), format!("{err:#}")));
            }
        }
    }

    tracing::info!(
        "{} of {} assets converted, {} failed",
        report.converted,
        jobs.len(),
        report.failed.len()
    );
    report
}
