//! Source document front-ends
//!
//! Each front-end turns one file format into a [`SourceScene`]. Nothing past
//! this module knows which format an asset came from.

mod gltf_scene;

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::ConvertOptions;
use crate::source::SourceScene;

pub use gltf_scene::{load_gltf, read_document};

/// File extensions with a front-end
pub const SUPPORTED_EXTENSIONS: &[&str] = &["gltf", "glb"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Whether a front-end exists for this file
pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension(path).as_str())
}

/// Load a source document, dispatching on its extension
pub fn load_scene(path: &Path, options: &ConvertOptions) -> Result<SourceScene> {
    match extension(path).as_str() {
        "gltf" | "glb" => load_gltf(path, options.frame_rate),
        _ => bail!(
            "Unsupported source format: {:?} (use .gltf or .glb)",
            path
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("a/man.gltf")));
        assert!(is_supported(Path::new("MAN.GLB")));
        assert!(!is_supported(Path::new("man.dae")));
        assert!(!is_supported(Path::new("gltf")));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let err = load_scene(Path::new("scene.fbx"), &ConvertOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Unsupported source format"));
    }
}
