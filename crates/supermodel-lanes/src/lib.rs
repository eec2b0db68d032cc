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

//! # Supermodel Lanes
//!
//! The hot path of supermodel batching. Many independent `(geometry, material)`
//! pairs are merged into a handful of shared GPU buffers so a whole scene can be
//! drawn with one indexed indirect multi-draw, while each bounded-size submodel
//! stays individually addressable by GPU culling passes.
//!
//! - [`subdivision`] splits a mesh into spatially coherent submodels.
//! - [`command_buffer`] holds the flip-flop indirect draw command buffers.
//! - [`bindless`] caches bindless texture handles per material slot.
//! - [`material`] converts a [`Material`](supermodel_core::Material) to its GPU record.
//! - [`batcher`] aggregates everything into a drawable supermodel.
//! - [`scene`] groups batchers by pipeline kind.

#![warn(missing_docs)]

pub mod batcher;
pub mod bindless;
pub mod command_buffer;
pub mod error;
pub mod material;
pub mod scene;
pub mod subdivision;

pub use batcher::{BatchState, SupermodelBatcher};
pub use bindless::BindlessTextureRegistry;
pub use command_buffer::IndirectCommandBuffer;
pub use error::BatchError;
pub use scene::{SupermodelKind, SupermodelScene};
pub use subdivision::{SpatialSubdivider, SubdividedGeometry};
