//! Animation data types

use glam::{Mat4, Quat, Vec3};

/// One stored frame of a node track (40 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    /// Quaternion rotation [x, y, z, w]
    pub rotation: [f32; 4],
    pub translation: [f32; 3],
    /// Non-uniform scale [x, y, z]
    pub scale: [f32; 3],
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FrameTransform {
    pub const SIZE: usize = 40;

    /// Identity transform (no rotation, no translation, unit scale)
    pub const IDENTITY: Self = Self {
        rotation: [0.0, 0.0, 0.0, 1.0],
        translation: [0.0, 0.0, 0.0],
        scale: [1.0, 1.0, 1.0],
    };

    /// Decompose an affine matrix into rotation, translation and scale
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            rotation: rotation.to_array(),
            translation: translation.to_array(),
            scale: scale.to_array(),
        }
    }

    /// Recompose as translate * rotate * scale
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from_array(self.scale),
            Quat::from_array(self.rotation),
            Vec3::from_array(self.translation),
        )
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let values = self
            .rotation
            .iter()
            .chain(&self.translation)
            .chain(&self.scale);
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut values = [0.0f32; 10];
        for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(Self {
            rotation: [values[0], values[1], values[2], values[3]],
            translation: [values[4], values[5], values[6]],
            scale: [values[7], values[8], values[9]],
        })
    }
}
