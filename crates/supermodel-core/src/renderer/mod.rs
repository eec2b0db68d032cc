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

//! Provides the public, backend-agnostic rendering contracts for supermodel batching.
//!
//! This module defines the "common language" between the batching lanes and a
//! concrete GPU backend: the [`GraphicsDevice`] trait, resource handles and
//! descriptors, the GPU-resident record layouts, and the error types.
//!
//! The 'how' lives in a backend crate (e.g. `supermodel-infra`) which implements
//! these traits; `supermodel-lanes` only ever talks to `&dyn GraphicsDevice`.

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::ResourceError;
pub use self::traits::GraphicsDevice;
