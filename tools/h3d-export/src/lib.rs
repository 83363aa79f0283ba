//! h3d-export library
//!
//! Converts scene documents into Horde3D runtime assets: `.geo` geometry,
//! `.scene.xml` scene graphs, `.anim` animations and `.material.xml`
//! materials. The binary and the manifest builder are thin layers over
//! [`convert::convert_file`].

pub mod animation;
pub mod batch;
pub mod config;
pub mod context;
pub mod convert;
pub mod formats;
pub mod geometry;
pub mod import;
pub mod manifest;
pub mod scene_graph;
pub mod skeleton;
pub mod source;

// Re-export the file readers from h3d-common
pub use h3d_common::formats::{AnimationFile, GeometryFile};

pub use config::ConvertOptions;
pub use context::ConversionContext;
pub use convert::{
    convert_file, convert_scene, encode_animation, encode_geometry, sample_scene, AssetKind,
    OutputTarget,
};
pub use import::{is_supported, load_scene};
pub use source::SourceScene;
