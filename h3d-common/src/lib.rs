//! Shared format definitions for the Horde3D asset pipeline
//!
//! This crate is shared between:
//! - `h3d-export` (asset conversion)
//! - runtime loaders and inspection tools that read converted assets
//!
//! # Modules
//!
//! - [`packing`] - Vertex attribute quantization (f32 → snorm16/unorm8)
//! - [`formats`] - Geometry (.geo) and animation (.anim) binary formats

pub mod formats;
pub mod packing;

// Re-export commonly used packing items
pub use packing::{
    f32_to_snorm16, f32_to_unorm8, pack_vector_snorm16, pack_weights_unorm8, snorm16_to_f32,
    unorm8_to_f32, unpack_vector_snorm16,
};

// Re-export commonly used format items
pub use formats::{
    decode_name, encode_name, AnimationFile, AnimationHeader, AnimationTrack, BinarySerializable,
    FormatError, FrameTransform, GeometryFile, GeometryHeader, MorphStream, MorphTargetData,
    VertexStream, ANIMATION_EXT, ANIMATION_MAGIC, ANIMATION_VERSION, GEOMETRY_EXT,
    GEOMETRY_MAGIC, GEOMETRY_VERSION, MAX_NAME_LEN, MORPH_STREAM_COUNT, NAME_FIELD_SIZE,
    SCENE_GRAPH_EXT,
};
