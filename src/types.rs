//! Core types for the Skeleton Flux tree
//!
//! This module defines the values that flow into the tree each frame: vectors,
//! quaternions and the named frame entries produced by a body tracker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// 3-component translation, serialized as `[x, y, z]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Largest per-component absolute difference
    pub fn max_abs_diff(self, other: Self) -> f32 {
        let d = self - other;
        d.x.abs().max(d.y.abs()).max(d.z.abs())
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Rotation quaternion stored as `[x, y, z, w]`: imaginary part first, real part last.
///
/// Smoothed rotations are component-wise means and are not re-normalized, so a
/// `Quat` read back from a joint may be slightly off unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Build from a separate imaginary vector and real scalar
    pub fn from_parts(imag: Vec3, real: f32) -> Self {
        Self::new(imag.x, imag.y, imag.z, real)
    }

    pub fn imag(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn real(self) -> f32 {
        self.w
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn is_finite(self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }

    /// Largest per-component absolute difference
    pub fn max_abs_diff(self, other: Self) -> f32 {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f32; 4]> for Quat {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Quat> for [f32; 4] {
    fn from(q: Quat) -> Self {
        q.to_array()
    }
}

impl fmt::Display for Quat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x, self.y, self.z, self.w)
    }
}

/// How the translation in a frame entry should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    /// Translations are expressed in the skeleton root's frame
    #[default]
    Absolute,
    /// Translations are already relative to the parent joint
    Relative,
}

impl TranslationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationMode::Absolute => "absolute",
            TranslationMode::Relative => "relative",
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, TranslationMode::Absolute)
    }
}

/// A single named transform reported by the body tracker for one frame.
///
/// `name` encodes the hierarchy root-to-leaf, e.g. `"hips_joint/spine_1_joint"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub name: String,
    pub translation: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

impl FrameEntry {
    pub fn new(name: impl Into<String>, translation: Vec3, rotation: Quat) -> Self {
        Self {
            name: name.into(),
            translation,
            rotation,
        }
    }

    /// Entry with an identity rotation
    pub fn at(name: impl Into<String>, translation: Vec3) -> Self {
        Self::new(name, translation, Quat::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_arithmetic() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(0.5, 0.5, 0.5);
        assert_eq!(a + b, Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(a - b, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(a - a, Vec3::ZERO);
    }

    #[test]
    fn test_quat_parts() {
        let q = Quat::from_parts(Vec3::new(0.1, 0.2, 0.3), 0.9);
        assert_eq!(q.imag(), Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(q.real(), 0.9);
        assert_eq!(q.to_array(), [0.1, 0.2, 0.3, 0.9]);
    }

    #[test]
    fn test_frame_entry_json_shape() {
        let json =
            r#"{"name":"root/arm","translation":[1.0,2.0,3.0],"rotation":[0.0,0.0,0.0,1.0]}"#;
        let entry: FrameEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "root/arm");
        assert_eq!(entry.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(entry.rotation, Quat::IDENTITY);

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["translation"], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(back["rotation"], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_frame_entry_rotation_defaults_to_identity() {
        let json = r#"{"name":"root","translation":[0.0,0.0,0.0]}"#;
        let entry: FrameEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_translation_mode_serde() {
        let mode: TranslationMode = serde_json::from_str("\"relative\"").unwrap();
        assert_eq!(mode, TranslationMode::Relative);
        assert_eq!(TranslationMode::default().as_str(), "absolute");
    }
}
