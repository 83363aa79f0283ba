//! Geometry (.geo) writer

use anyhow::Result;
use glam::Mat4;
use std::io::Write;

use super::{write_f32s, write_matrix, write_record, write_u32};
use crate::context::ConversionContext;
use crate::geometry::{MorphDiff, Vertex};
use crate::scene_graph::NodeId;
use h3d_common::{
    encode_name, pack_vector_snorm16, pack_weights_unorm8, GeometryHeader, MorphStream,
    VertexStream, MORPH_STREAM_COUNT,
};

/// Write a complete geometry file for the converted model
pub fn write_geometry<W: Write>(w: &mut W, ctx: &ConversionContext) -> Result<()> {
    // Slot 0 is the identity root every unskinned vertex binds to
    let header = GeometryHeader::new(ctx.joints.len() as u32 + 1);
    write_record(w, &header)?;
    write_matrix(w, &Mat4::IDENTITY)?;
    for &id in &ctx.joints {
        let inverse_bind = ctx
            .node(id)
            .joint()
            .map_or(Mat4::IDENTITY, |joint| joint.inverse_bind);
        write_matrix(w, &inverse_bind)?;
    }

    let unencodable = ctx
        .vertices
        .iter()
        .filter(|vertex| {
            vertex
                .joints
                .iter()
                .any(|&joint| encode_joint_index(ctx, joint).is_none())
        })
        .count();
    if unencodable > 0 {
        tracing::warn!(
            "{} vertices reference joints above index {}, binding them to the root",
            unencodable,
            u8::MAX
        );
    }

    let streams: Vec<VertexStream> = VertexStream::for_model(ctx.has_joints()).collect();
    write_u32(w, streams.len() as u32)?;
    write_u32(w, ctx.vertices.len() as u32)?;
    for stream in streams {
        write_u32(w, stream.id())?;
        write_u32(w, stream.element_size())?;
        for vertex in &ctx.vertices {
            write_vertex_element(w, ctx, stream, vertex)?;
        }
    }

    write_u32(w, ctx.indices.len() as u32)?;
    for &index in &ctx.indices {
        write_u32(w, index)?;
    }

    write_u32(w, ctx.morph_targets.len() as u32)?;
    for target in &ctx.morph_targets {
        w.write_all(&encode_name(&target.name))?;
        write_u32(w, target.diffs.len() as u32)?;
        for diff in &target.diffs {
            write_u32(w, diff.vertex)?;
        }
        write_u32(w, MORPH_STREAM_COUNT)?;
        for stream in MorphStream::ALL {
            write_u32(w, stream.id())?;
            write_u32(w, MorphStream::ELEMENT_SIZE)?;
            for diff in &target.diffs {
                write_f32s(w, &morph_value(stream, diff).to_array())?;
            }
        }
    }

    Ok(())
}

fn write_vertex_element<W: Write>(
    w: &mut W,
    ctx: &ConversionContext,
    stream: VertexStream,
    vertex: &Vertex,
) -> Result<()> {
    match stream {
        VertexStream::Position => write_f32s(w, &vertex.pos.to_array())?,
        VertexStream::Normal => write_snorm3(w, pack_vector_snorm16(vertex.normal))?,
        VertexStream::Tangent => write_snorm3(w, pack_vector_snorm16(vertex.tangent))?,
        VertexStream::Bitangent => write_snorm3(w, pack_vector_snorm16(vertex.bitangent))?,
        VertexStream::JointIndices => {
            let indices = vertex
                .joints
                .map(|joint| encode_joint_index(ctx, joint).unwrap_or(0));
            w.write_all(&indices)?;
        }
        VertexStream::Weights => w.write_all(&pack_weights_unorm8(vertex.weights))?,
        VertexStream::TexCoord0 => write_f32s(w, &vertex.tex_coords[0].to_array())?,
        VertexStream::TexCoord1 => write_f32s(w, &vertex.tex_coords[1].to_array())?,
    }
    Ok(())
}

/// One-byte joint index, `None` past the last addressable joint
fn encode_joint_index(ctx: &ConversionContext, joint: Option<NodeId>) -> Option<u8> {
    u8::try_from(ctx.joint_index(joint)).ok()
}

fn write_snorm3<W: Write>(w: &mut W, packed: [i16; 3]) -> Result<()> {
    for value in packed {
        w.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn morph_value(stream: MorphStream, diff: &MorphDiff) -> glam::Vec3 {
    match stream {
        MorphStream::Position => diff.position,
        MorphStream::Normal => diff.normal,
        MorphStream::Tangent => diff.tangent,
        MorphStream::Bitangent => diff.bitangent,
    }
}
