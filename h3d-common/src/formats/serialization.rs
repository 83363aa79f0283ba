//! Binary serialization trait for fixed-size format records.
//!
//! Geometry and animation headers, and stored animation frames, implement
//! `BinarySerializable` so writers can treat them uniformly while each type
//! keeps its own `to_bytes()` returning a fixed-size array.

/// Trait for fixed-size binary records.
///
/// The trait uses `Vec<u8>` for the return type because associated const
/// generics in return types (`[u8; Self::SIZE]`) are not yet stable in Rust.
///
/// # Example
///
/// ```
/// use h3d_common::formats::{BinarySerializable, GeometryHeader};
///
/// let header = GeometryHeader::new(3);
/// let bytes = header.serialize();
/// let parsed = GeometryHeader::deserialize(&bytes).unwrap();
/// assert_eq!(parsed.joint_count, 3);
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized record in bytes.
    const SIZE: usize;

    fn serialize(&self) -> Vec<u8>;

    /// Returns `None` if the byte slice is too short.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_binary_serializable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BinarySerializable for $ty {
                const SIZE: usize = <$ty>::SIZE;

                fn serialize(&self) -> Vec<u8> {
                    self.to_bytes().to_vec()
                }

                fn deserialize(bytes: &[u8]) -> Option<Self> {
                    Self::from_bytes(bytes)
                }
            }
        )*
    };
}

impl_binary_serializable!(
    super::GeometryHeader,
    super::AnimationHeader,
    super::FrameTransform,
);
