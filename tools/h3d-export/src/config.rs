//! Conversion options
//!
//! Shared by the command line (`model`/`anim` flags) and the `[options]`
//! table of an asset manifest.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Reorder triangles for vertex cache locality
    #[serde(default = "default_true")]
    pub optimize_geometry: bool,
    /// Replace material files that already exist
    #[serde(default)]
    pub overwrite_materials: bool,
    /// Prefix material file names with `<asset>_`
    #[serde(default)]
    pub add_model_name: bool,
    /// Switch distances for LOD levels 1 to 4
    #[serde(default = "default_lod_distances")]
    pub lod_distances: [f32; 4],
    /// Sampling rate for front-ends that resample keyframed animation
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
}

fn default_true() -> bool {
    true
}

fn default_lod_distances() -> [f32; 4] {
    [10.0, 20.0, 40.0, 80.0]
}

fn default_frame_rate() -> f32 {
    30.0
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            optimize_geometry: true,
            overwrite_materials: false,
            add_model_name: false,
            lod_distances: default_lod_distances(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl ConvertOptions {
    /// Prefix for material file names of the given asset
    pub fn model_name(&self, asset_name: &str) -> String {
        if self.add_model_name {
            format!("{asset_name}_")
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert!(options.optimize_geometry);
        assert!(!options.overwrite_materials);
        assert!(!options.add_model_name);
        assert_eq!(options.lod_distances, [10.0, 20.0, 40.0, 80.0]);
        assert!((options.frame_rate - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let options: ConvertOptions = toml::from_str("").unwrap();
        assert_eq!(options, ConvertOptions::default());
    }

    #[test]
    fn test_deserialize_partial() {
        let options: ConvertOptions =
            toml::from_str("optimize_geometry = false\nlod_distances = [5.0, 15.0, 30.0, 60.0]").unwrap();
        assert!(!options.optimize_geometry);
        assert_eq!(options.lod_distances, [5.0, 15.0, 30.0, 60.0]);
        assert!((options.frame_rate - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_model_name_prefix() {
        let mut options = ConvertOptions::default();
        assert_eq!(options.model_name("man"), "");
        options.add_model_name = true;
        assert_eq!(options.model_name("man"), "man_");
    }
}
