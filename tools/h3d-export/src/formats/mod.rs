//! Output writers for Horde3D runtime assets
//!
//! Binary layouts and constants come from h3d-common; this module turns a
//! finished [`ConversionContext`](crate::context::ConversionContext) into
//! bytes and text.

mod animation;
mod geometry;
mod material;
mod scene_graph;

pub use h3d_common::formats::*;

pub use animation::write_animation;
pub use geometry::write_geometry;
pub use material::{material_file_name, render_material};
pub use scene_graph::{render_scene_graph, SceneGraphRefs};

use anyhow::Result;
use glam::Mat4;
use std::io::Write;

pub(crate) fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f32s<W: Write>(w: &mut W, values: &[f32]) -> Result<()> {
    for value in values {
        w.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Fixed-size header or frame record
pub(crate) fn write_record<W: Write, T: BinarySerializable>(w: &mut W, record: &T) -> Result<()> {
    w.write_all(&record.serialize())?;
    Ok(())
}

/// Column-major, 16 floats
pub(crate) fn write_matrix<W: Write>(w: &mut W, matrix: &Mat4) -> Result<()> {
    write_f32s(w, &matrix.to_cols_array())
}
