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

//! Conversion of a [`Material`] into its GPU-resident [`MaterialRecord`].

use supermodel_core::math::Vec3;
use supermodel_core::renderer::{GraphicsDevice, MaterialRecord};
use supermodel_core::{Material, TextureSlot};

use crate::bindless::BindlessTextureRegistry;
use crate::error::BatchError;

/// Parameter names read from a [`Material`].
pub mod keys {
    /// Diffuse reflectance, `Vec3`.
    pub const DIFFUSE_COLOR: &str = "diffuse_color";
    /// Specular reflectance, `Vec3`.
    pub const SPECULAR_COLOR: &str = "specular_color";
    /// Opacity, scalar.
    pub const OPACITY: &str = "opacity";
    /// Roughness, scalar.
    pub const ROUGHNESS: &str = "roughness";
}

/// Builds the record of `material`, resolving each bound texture slot through
/// `registry`. Slots without a texture get a `0` handle.
///
/// # Errors
///
/// [`BatchError::HandleNotReady`] if a bound texture has no GPU storage yet.
pub fn material_record(
    device: &dyn GraphicsDevice,
    registry: &mut BindlessTextureRegistry,
    material: &Material,
) -> Result<MaterialRecord, BatchError> {
    let mut handle = |slot: TextureSlot| -> Result<u64, BatchError> {
        match material.texture(slot) {
            Some(texture) => {
                let key = BindlessTextureRegistry::key(&material.name, slot);
                registry.get_or_create(device, &key, texture)
            }
            None => Ok(0),
        }
    };

    Ok(MaterialRecord {
        k_diffuse: material.vec3_or(keys::DIFFUSE_COLOR, Vec3::ONE).to_array(),
        opacity: material.float_or(keys::OPACITY, 1.0),
        k_specular: material.vec3_or(keys::SPECULAR_COLOR, Vec3::ZERO).to_array(),
        roughness: material.float_or(keys::ROUGHNESS, 1.0),
        tex_diffuse: handle(TextureSlot::Diffuse)?,
        tex_normal: handle(TextureSlot::NormalMap)?,
        tex_specular: handle(TextureSlot::Specular)?,
        tex_alpha: handle(TextureSlot::AlphaMap)?,
    })
}
