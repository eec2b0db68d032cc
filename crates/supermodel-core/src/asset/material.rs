// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the named material parameter bag.

use crate::math::Vec3;
use crate::renderer::TextureId;
use std::collections::BTreeMap;
use std::fmt;

/// The texture slots a material record can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    /// Diffuse color texture.
    Diffuse,
    /// Specular texture.
    Specular,
    /// Alpha (coverage) mask.
    AlphaMap,
    /// Tangent-space normal map.
    NormalMap,
}

impl TextureSlot {
    /// All slots, in record order of lookup.
    pub const ALL: [TextureSlot; 4] = [
        TextureSlot::Diffuse,
        TextureSlot::Specular,
        TextureSlot::AlphaMap,
        TextureSlot::NormalMap,
    ];

    /// The slot's name as it appears in material files and registry keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuse",
            TextureSlot::Specular => "specular",
            TextureSlot::AlphaMap => "alphamap",
            TextureSlot::NormalMap => "normalmap",
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named bag of scalar and vector parameters plus optional textures.
///
/// Two materials with the same `name` are treated as the same material when a
/// supermodel is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    /// Unique material name.
    pub name: String,
    /// Scalar parameters such as `opacity` or `roughness`.
    pub floats: BTreeMap<String, f32>,
    /// Vector parameters such as `diffuse_color`.
    pub vec3s: BTreeMap<String, Vec3>,
    /// Bound textures by slot.
    pub textures: BTreeMap<TextureSlot, TextureId>,
}

impl Material {
    /// Creates an empty material.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets a scalar parameter.
    pub fn with_float(mut self, key: impl Into<String>, value: f32) -> Self {
        self.floats.insert(key.into(), value);
        self
    }

    /// Sets a vector parameter.
    pub fn with_vec3(mut self, key: impl Into<String>, value: Vec3) -> Self {
        self.vec3s.insert(key.into(), value);
        self
    }

    /// Binds a texture to a slot.
    pub fn with_texture(mut self, slot: TextureSlot, texture: TextureId) -> Self {
        self.textures.insert(slot, texture);
        self
    }

    /// Looks up a scalar parameter, falling back to `default`.
    pub fn float_or(&self, key: &str, default: f32) -> f32 {
        self.floats.get(key).copied().unwrap_or(default)
    }

    /// Looks up a vector parameter, falling back to `default`.
    pub fn vec3_or(&self, key: &str, default: Vec3) -> Vec3 {
        self.vec3s.get(key).copied().unwrap_or(default)
    }

    /// The texture bound to `slot`, if any.
    pub fn texture(&self, slot: TextureSlot) -> Option<TextureId> {
        self.textures.get(&slot).copied()
    }
}
