//! Vertex attribute quantization
//!
//! Geometry files store basis vectors as snorm16 and skin weights as unorm8.
//! Both conversions truncate toward zero, which is what the runtime decoder
//! assumes when it rebuilds the floats.

use glam::Vec3;

// ============================================================================
// Scale Constants
// ============================================================================

/// Scale applied to each basis vector component before truncation to i16
pub const SNORM16_SCALE: f32 = 32767.0;

/// Scale applied to each skin weight before truncation to u8
pub const UNORM8_SCALE: f32 = 255.0;

// ============================================================================
// Basic Conversion Functions
// ============================================================================

/// Convert f32 to signed normalized 16-bit integer (snorm16)
///
/// Maps f32 range [-1.0, 1.0] to i16 range [-32767, 32767].
#[inline]
pub fn f32_to_snorm16(value: f32) -> i16 {
    let clamped = value.clamp(-1.0, 1.0);
    (clamped * SNORM16_SCALE) as i16
}

/// Convert snorm16 back to f32
#[inline]
pub fn snorm16_to_f32(value: i16) -> f32 {
    value as f32 / SNORM16_SCALE
}

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255].
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * UNORM8_SCALE) as u8
}

/// Convert unorm8 back to f32
#[inline]
pub fn unorm8_to_f32(value: u8) -> f32 {
    value as f32 / UNORM8_SCALE
}

// ============================================================================
// Attribute Packing
// ============================================================================

/// Pack a normal, tangent or bitangent to snorm16x3
#[inline]
pub fn pack_vector_snorm16(v: Vec3) -> [i16; 3] {
    [f32_to_snorm16(v.x), f32_to_snorm16(v.y), f32_to_snorm16(v.z)]
}

/// Unpack a snorm16x3 basis vector
#[inline]
pub fn unpack_vector_snorm16(packed: [i16; 3]) -> Vec3 {
    Vec3::new(
        snorm16_to_f32(packed[0]),
        snorm16_to_f32(packed[1]),
        snorm16_to_f32(packed[2]),
    )
}

/// Pack four skin weights to unorm8x4
///
/// Weights that sum to 1.0 pack to bytes summing to 252..=255.
#[inline]
pub fn pack_weights_unorm8(weights: [f32; 4]) -> [u8; 4] {
    weights.map(f32_to_unorm8)
}
