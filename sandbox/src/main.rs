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

// Supermodel Sandbox
// Batches a procedural scene and drives a few frames on the headless device.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use supermodel_core::math::{Aabb, Mat4, Vec2, Vec3};
use supermodel_core::renderer::{
    DrawIndexedIndirect, GraphicsDevice, ShaderId, SupermodelSettings,
};
use supermodel_core::{Geometry, Material, TextureSlot};
use supermodel_infra::HeadlessDevice;
use supermodel_lanes::{SupermodelBatcher, SupermodelKind, SupermodelScene};

const SHADER: ShaderId = ShaderId(0);

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SandboxConfig {
    frames: u32,
    supermodel: SupermodelSettings,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            frames: 3,
            supermodel: SupermodelSettings::default(),
        }
    }
}

fn load_config(path: &Path) -> Result<SandboxConfig> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(SandboxConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// A `side x side` heightfield with texture coordinates spanning `[0, 4]`.
fn terrain(side: u32) -> Geometry {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut tex_coords = Vec::new();
    for z in 0..=side {
        for x in 0..=side {
            let (fx, fz) = (x as f32, z as f32);
            positions.push(Vec3::new(fx, (fx * 0.3).sin() + (fz * 0.2).cos(), fz));
            normals.push(Vec3::Y);
            tex_coords.push(Vec2::new(fx, fz) * (4.0 / side as f32));
        }
    }

    let mut indices = Vec::new();
    for z in 0..side {
        for x in 0..side {
            let i = z * (side + 1) + x;
            let below = i + side + 1;
            indices.extend_from_slice(&[i, below, i + 1, i + 1, below, below + 1]);
        }
    }
    Geometry::new("terrain", positions, indices)
        .with_normals(normals)
        .with_tex_coords(tex_coords)
}

/// An axis-aligned box of the given size, resting on the origin.
fn tower(name: &str, size: Vec3) -> Geometry {
    let corners: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { 0.0 } else { size.x },
                if i & 2 == 0 { 0.0 } else { size.y },
                if i & 4 == 0 { 0.0 } else { size.z },
            )
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    Geometry::new(name, corners, indices)
}

/// Submodel bounds in world space, from the rescale data of a model record.
fn world_bounds(batcher: &SupermodelBatcher, submodel: usize) -> Option<Aabb> {
    let record = batcher.model_records().get(submodel)?;
    let model = batcher.model_matrix(record.dynamic_model_id as usize)?;
    let local = record.submodel_bounds();
    Some(Aabb::from_min_max(
        model.transform_point(local.min),
        model.transform_point(local.max),
    ))
}

/// Stand-in for a GPU culling pass: zeroes the instance count of every
/// submodel outside `view`, writing into the back buffer.
fn cull(device: &HeadlessDevice, batcher: &mut SupermodelBatcher, view: &Aabb) -> Result<usize> {
    let visible: Vec<bool> = (0..batcher.submodel_count())
        .map(|i| {
            world_bounds(batcher, i).is_some_and(|b| {
                b.min.x <= view.max.x
                    && b.max.x >= view.min.x
                    && b.min.z <= view.max.z
                    && b.max.z >= view.min.z
            })
        })
        .collect();

    let commands = batcher.command_buffer_mut();
    commands.reset();
    let mut culled: Vec<DrawIndexedIndirect> = device.read_records(commands.front_buffer())?;
    for (command, &keep) in culled.iter_mut().zip(&visible) {
        if !keep {
            command.instance_count = 0;
        }
    }
    device.write_buffer(commands.back_buffer(), 0, bytemuck::cast_slice(&culled))?;
    commands.swap();
    Ok(visible.iter().filter(|&&v| v).count())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("supermodel.ron"));
    let config = load_config(&config_path)?;
    log::info!("Sandbox: {:?}", config);

    let device = HeadlessDevice::new();
    let mut scene = SupermodelScene::new(config.supermodel);

    let grass_texture = device.create_uploaded_texture("grass_albedo")?;
    let grass = Arc::new(
        Material::new("grass")
            .with_vec3("diffuse_color", Vec3::new(0.3, 0.6, 0.2))
            .with_float("roughness", 0.9)
            .with_texture(TextureSlot::Diffuse, grass_texture),
    );
    let stone = Arc::new(
        Material::new("stone")
            .with_vec3("specular_color", Vec3::splat(0.2))
            .with_float("roughness", 0.6),
    );

    let kind = SupermodelKind::Static;
    scene.add(&device, kind, Arc::new(terrain(64)), grass)?;
    let mut towers = Vec::new();
    for i in 0..4 {
        let tower = Arc::new(tower(&format!("tower_{i}"), Vec3::new(2.0, 6.0 + i as f32, 2.0)));
        towers.push(scene.add(&device, kind, tower, Arc::clone(&stone))?);
    }

    scene.set_camera(
        Mat4::from_translation(Vec3::new(-32.0, -10.0, -80.0)),
        Mat4::from_scale(Vec3::new(0.05, 0.05, -0.01)),
    );

    for frame in 0..config.frames {
        if let Some(batcher) = scene.batcher_mut(kind) {
            for (n, &tower) in towers.iter().enumerate() {
                let x = 8.0 + 12.0 * n as f32 + frame as f32 * 4.0;
                batcher.set_model_matrix(tower, Mat4::from_translation(Vec3::new(x, 0.0, 32.0)))?;
            }
        }

        scene.bind(&device, kind, SHADER)?;
        let visible = match scene.batcher_mut(kind) {
            Some(batcher) => {
                let view = Aabb::from_min_max(Vec3::new(0.0, -100.0, 0.0), Vec3::new(40.0, 100.0, 64.0));
                cull(&device, batcher, &view)?
            }
            None => 0,
        };
        scene.draw(&device, kind, SHADER)?;
        scene.unbind(&device, kind, SHADER)?;

        let submodels = scene.batcher(kind).map_or(0, |b| b.submodel_count());
        log::info!("Frame {frame}: {visible}/{submodels} submodels visible");
        for draw in device.recorded_draws() {
            let drawn = draw.commands.iter().filter(|c| c.instance_count > 0).count();
            log::debug!(
                "Frame {frame}: Draw from {:?}, {} of {} commands enabled",
                draw.draw.indirect_buffer,
                drawn,
                draw.draw.draw_count
            );
        }
        device.clear_recorded_draws();
    }

    scene.destroy(&device);
    log::info!("Sandbox: Done, {} buffers left", device.live_buffer_count());
    Ok(())
}
