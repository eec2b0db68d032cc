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

//! Provides the mathematics primitives used by supermodel batching.
//!
//! This module contains the small set of linear algebra and geometry types the
//! batching pipeline needs: vectors for positions and texture coordinates, a
//! column-major `Mat4` for per-model transforms and camera matrices, and an
//! axis-aligned bounding box for subdivision and culling metadata.

// --- Fundamental Constants ---

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

// --- Declare Sub-Modules ---

pub mod geometry;
pub mod matrix;
pub mod vector;

// --- Re-export Principal Types ---

pub use self::geometry::{Aabb, Axis};
pub use self::matrix::Mat4;
pub use self::vector::{Vec2, Vec3, Vec4};

