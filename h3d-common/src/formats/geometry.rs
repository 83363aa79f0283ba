//! Geometry binary format (.geo)
//!
//! Static bind-pose geometry for one model: inverse bind matrices for the
//! skeleton, de-interleaved vertex streams, a shared triangle index buffer and
//! sparse morph targets.
//!
//! # Layout
//! ```text
//! Header (12 bytes):
//! 0x00: magic [u8; 4]         - "H3DG"
//! 0x04: version u32           - 5
//! 0x08: joint_count u32       - J + 1 (slot 0 is the implicit identity root)
//!
//! joint_count × [f32; 16]     - column-major; slot 0 identity, then inverse bind matrices
//!
//! stream_count u32            - 6, or 8 when the model has joints
//! vertex_count u32
//! per stream: id u32, element_size u32, vertex_count × element
//!
//! index_count u32
//! index_count × u32
//!
//! morph_target_count u32
//! per target:
//!     name [u8; 256]
//!     diff_count u32
//!     diff_count × u32        - vertex indices
//!     stream_count u32        - always 4
//!     per stream: id u32, element_size u32 (12), diff_count × [f32; 3]
//! ```

use super::reader::ByteReader;
use super::{decode_name, FormatError, NAME_FIELD_SIZE};

/// Magic bytes at the start of every geometry file
pub const GEOMETRY_MAGIC: [u8; 4] = *b"H3DG";
/// Current geometry format version
pub const GEOMETRY_VERSION: u32 = 5;
/// Number of delta streams stored per morph target
pub const MORPH_STREAM_COUNT: u32 = 4;

// ============================================================================
// Header
// ============================================================================

/// Geometry file header (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// Number of joint matrices that follow, including the identity root
    pub joint_count: u32,
}

impl GeometryHeader {
    pub const SIZE: usize = 12;

    pub fn new(joint_count: u32) -> Self {
        Self {
            magic: GEOMETRY_MAGIC,
            version: GEOMETRY_VERSION,
            joint_count,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.joint_count.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            joint_count: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }

    /// Check magic and version
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != GEOMETRY_MAGIC {
            return Err(FormatError::BadMagic {
                expected: GEOMETRY_MAGIC,
                found: self.magic,
            });
        }
        if self.version != GEOMETRY_VERSION {
            return Err(FormatError::UnsupportedVersion {
                expected: GEOMETRY_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Stream Identifiers
// ============================================================================

/// Vertex stream identifiers, in the order they are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum VertexStream {
    /// f32 × 3
    Position = 0,
    /// snorm16 × 3
    Normal = 1,
    /// snorm16 × 3
    Tangent = 2,
    /// snorm16 × 3
    Bitangent = 3,
    /// u8 × 4, 0 means the identity root
    JointIndices = 4,
    /// unorm8 × 4
    Weights = 5,
    /// f32 × 2
    TexCoord0 = 6,
    /// f32 × 2
    TexCoord1 = 7,
}

impl VertexStream {
    pub const ALL: [Self; 8] = [
        Self::Position,
        Self::Normal,
        Self::Tangent,
        Self::Bitangent,
        Self::JointIndices,
        Self::Weights,
        Self::TexCoord0,
        Self::TexCoord1,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Bytes per vertex in this stream
    pub fn element_size(self) -> u32 {
        match self {
            Self::Position => 12,
            Self::Normal | Self::Tangent | Self::Bitangent => 6,
            Self::JointIndices | Self::Weights => 4,
            Self::TexCoord0 | Self::TexCoord1 => 8,
        }
    }

    /// Streams only present when the model has joints
    pub fn is_skinning(self) -> bool {
        matches!(self, Self::JointIndices | Self::Weights)
    }

    /// Streams written for a model, in file order
    pub fn for_model(has_joints: bool) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |stream| has_joints || !stream.is_skinning())
    }
}

/// Morph target delta streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MorphStream {
    Position = 0,
    Normal = 1,
    Tangent = 2,
    Bitangent = 3,
}

impl MorphStream {
    pub const ALL: [Self; 4] = [Self::Position, Self::Normal, Self::Tangent, Self::Bitangent];
    /// Every morph stream stores f32 × 3
    pub const ELEMENT_SIZE: u32 = 12;

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

// ============================================================================
// Decoded File
// ============================================================================

/// A sparse morph target as stored in a geometry file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphTargetData {
    pub name: String,
    pub vertex_indices: Vec<u32>,
    pub position_deltas: Vec<[f32; 3]>,
    pub normal_deltas: Vec<[f32; 3]>,
    pub tangent_deltas: Vec<[f32; 3]>,
    pub bitangent_deltas: Vec<[f32; 3]>,
}

/// Fully decoded geometry file
///
/// Skinning streams are `None` when the file has no joints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryFile {
    /// Column-major matrices; slot 0 is the identity root
    pub joint_matrices: Vec<[f32; 16]>,
    pub vertex_count: u32,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[i16; 3]>,
    pub tangents: Vec<[i16; 3]>,
    pub bitangents: Vec<[i16; 3]>,
    pub joint_indices: Option<Vec<[u8; 4]>>,
    pub weights: Option<Vec<[u8; 4]>>,
    pub tex_coords0: Vec<[f32; 2]>,
    pub tex_coords1: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub morph_targets: Vec<MorphTargetData>,
}

impl GeometryFile {
    /// Decode a complete geometry file
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(data);
        let header_bytes = r.take(GeometryHeader::SIZE)?;
        let header = GeometryHeader::from_bytes(header_bytes).ok_or(FormatError::UnexpectedEof {
            offset: 0,
            needed: GeometryHeader::SIZE,
        })?;
        header.validate()?;

        let mut file = GeometryFile {
            joint_matrices: r.elements(header.joint_count, 64, |r| r.f32s::<16>())?,
            ..Default::default()
        };

        let stream_count = r.u32()?;
        file.vertex_count = r.u32()?;
        for _ in 0..stream_count {
            let id = r.u32()?;
            let size = r.u32()?;
            let stream = VertexStream::from_id(id).ok_or(FormatError::UnknownStream(id))?;
            if size != stream.element_size() {
                return Err(FormatError::StreamElementSize {
                    id,
                    expected: stream.element_size(),
                    found: size,
                });
            }
            let n = file.vertex_count;
            let stride = size as usize;
            match stream {
                VertexStream::Position => file.positions = r.elements(n, stride, |r| r.f32s())?,
                VertexStream::Normal => file.normals = r.elements(n, stride, read_snorm3)?,
                VertexStream::Tangent => file.tangents = r.elements(n, stride, read_snorm3)?,
                VertexStream::Bitangent => file.bitangents = r.elements(n, stride, read_snorm3)?,
                VertexStream::JointIndices => {
                    file.joint_indices = Some(r.elements(n, stride, read_bytes4)?)
                }
                VertexStream::Weights => file.weights = Some(r.elements(n, stride, read_bytes4)?),
                VertexStream::TexCoord0 => file.tex_coords0 = r.elements(n, stride, |r| r.f32s())?,
                VertexStream::TexCoord1 => file.tex_coords1 = r.elements(n, stride, |r| r.f32s())?,
            }
        }

        let index_count = r.u32()?;
        file.indices = r.elements(index_count, 4, |r| r.u32())?;

        let morph_count = r.u32()?;
        for _ in 0..morph_count {
            file.morph_targets.push(read_morph_target(&mut r)?);
        }

        Ok(file)
    }

    /// Number of joints excluding the identity root
    pub fn skeleton_joint_count(&self) -> usize {
        self.joint_matrices.len().saturating_sub(1)
    }
}

fn read_snorm3(r: &mut ByteReader<'_>) -> Result<[i16; 3], FormatError> {
    Ok([r.i16()?, r.i16()?, r.i16()?])
}

fn read_bytes4(r: &mut ByteReader<'_>) -> Result<[u8; 4], FormatError> {
    Ok([r.u8()?, r.u8()?, r.u8()?, r.u8()?])
}

fn read_morph_target(r: &mut ByteReader<'_>) -> Result<MorphTargetData, FormatError> {
    let mut target = MorphTargetData {
        name: decode_name(r.take(NAME_FIELD_SIZE)?)?,
        ..Default::default()
    };
    let diff_count = r.u32()?;
    target.vertex_indices = r.elements(diff_count, 4, |r| r.u32())?;

    let stream_count = r.u32()?;
    for _ in 0..stream_count {
        let id = r.u32()?;
        let size = r.u32()?;
        let stream = MorphStream::from_id(id).ok_or(FormatError::UnknownStream(id))?;
        if size != MorphStream::ELEMENT_SIZE {
            return Err(FormatError::StreamElementSize {
                id,
                expected: MorphStream::ELEMENT_SIZE,
                found: size,
            });
        }
        let deltas = r.elements(diff_count, size as usize, |r| r.f32s())?;
        match stream {
            MorphStream::Position => target.position_deltas = deltas,
            MorphStream::Normal => target.normal_deltas = deltas,
            MorphStream::Tangent => target.tangent_deltas = deltas,
            MorphStream::Bitangent => target.bitangent_deltas = deltas,
        }
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::encode_name;

    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn push_f32(out: &mut Vec<u8>, v: f32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    /// One triangle, no joints, one morph target moving vertex 2
    fn minimal_file() -> Vec<u8> {
        let mut out = GeometryHeader::new(1).to_bytes().to_vec();
        for i in 0..16 {
            push_f32(&mut out, if i % 5 == 0 { 1.0 } else { 0.0 });
        }
        push_u32(&mut out, 6);
        push_u32(&mut out, 3);
        for stream in VertexStream::for_model(false) {
            push_u32(&mut out, stream.id());
            push_u32(&mut out, stream.element_size());
            out.extend(std::iter::repeat(0u8).take(3 * stream.element_size() as usize));
        }
        push_u32(&mut out, 3);
        for i in 0..3 {
            push_u32(&mut out, i);
        }
        push_u32(&mut out, 1);
        out.extend_from_slice(&encode_name("smile"));
        push_u32(&mut out, 1);
        push_u32(&mut out, 2);
        push_u32(&mut out, MORPH_STREAM_COUNT);
        for stream in MorphStream::ALL {
            push_u32(&mut out, stream.id());
            push_u32(&mut out, MorphStream::ELEMENT_SIZE);
            for c in 0..3 {
                push_f32(&mut out, if stream == MorphStream::Position { c as f32 } else { 0.0 });
            }
        }
        out
    }

    #[test]
    fn test_geometry_header_layout() {
        let bytes = GeometryHeader::new(3).to_bytes();
        assert_eq!(&bytes[0..4], b"H3DG");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 5);
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 3);

        let parsed = GeometryHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, GeometryHeader::new(3));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_geometry_header_from_short_bytes() {
        assert!(GeometryHeader::from_bytes(&[0u8; 8]).is_none());
    }

    #[test]
    fn test_stream_ids_and_sizes() {
        let ids: Vec<u32> = VertexStream::ALL.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(VertexStream::Normal.element_size(), 6);
        assert_eq!(VertexStream::Weights.element_size(), 4);
        assert_eq!(VertexStream::for_model(false).count(), 6);
        assert_eq!(VertexStream::for_model(true).count(), 8);
        assert_eq!(VertexStream::from_id(8), None);
    }

    #[test]
    fn test_parse_minimal_geometry() {
        let file = GeometryFile::parse(&minimal_file()).unwrap();
        assert_eq!(file.joint_matrices.len(), 1);
        assert_eq!(file.skeleton_joint_count(), 0);
        assert_eq!(file.vertex_count, 3);
        assert_eq!(file.positions.len(), 3);
        assert!(file.joint_indices.is_none());
        assert_eq!(file.indices, vec![0, 1, 2]);
        assert_eq!(file.morph_targets.len(), 1);
        let target = &file.morph_targets[0];
        assert_eq!(target.name, "smile");
        assert_eq!(target.vertex_indices, vec![2]);
        assert_eq!(target.position_deltas, vec![[0.0, 1.0, 2.0]]);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut data = minimal_file();
        data[0] = b'X';
        assert!(matches!(
            GeometryFile::parse(&data),
            Err(FormatError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_file() {
        let data = minimal_file();
        let truncated = &data[..data.len() - 10];
        assert!(matches!(
            GeometryFile::parse(truncated),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_element_size() {
        let mut data = minimal_file();
        // First stream header sits after header, one matrix, stream and vertex counts
        let size_offset = GeometryHeader::SIZE + 64 + 8 + 4;
        data[size_offset..size_offset + 4].copy_from_slice(&16u32.to_le_bytes());
        assert!(matches!(
            GeometryFile::parse(&data),
            Err(FormatError::StreamElementSize { id: 0, .. })
        ));
    }
}
