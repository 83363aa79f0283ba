//! Geometry processing (source meshes -> shared vertex/index buffers)
//!
//! Stage order matters: deduplication, skinning, degenerate removal, tangent
//! basis, morph targets, then the optional cache reordering, which renumbers
//! vertices and therefore has to run last.

mod dedup;
mod morph;
mod optimize;
mod tangent;
mod types;

// Re-export public API
pub use dedup::build_vertex_buffers;
pub use morph::build_morph_targets;
pub use optimize::{
    cache_hit_ratio, optimize_index_order, remove_degenerate_triangles, CacheStats,
    MEASURE_CACHE_SIZE,
};
pub use tangent::{compute_base_tangent_basis, compute_tangent_basis};
pub use types::{MorphDiff, MorphTarget, TriGroup, Vertex};
