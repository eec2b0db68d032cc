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

//! Settings that shape how a supermodel is built.

use super::VertexPrecision;
use serde::{Deserialize, Serialize};

/// Default triangle budget of a single submodel.
pub const DEFAULT_MAX_TRIANGLES_PER_SUBMODEL: u32 = 1000;

/// Configuration of a supermodel batcher.
///
/// Every field has a default, so a partial RON document such as
/// `(vertex_precision: Low)` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupermodelSettings {
    /// Submodels are split until they hold fewer triangles than this.
    pub max_triangles_per_submodel: u32,
    /// Layout of the shared vertex buffer.
    pub vertex_precision: VertexPrecision,
    /// Prefix of every GPU resource label.
    pub label: String,
}

impl Default for SupermodelSettings {
    fn default() -> Self {
        Self {
            max_triangles_per_submodel: DEFAULT_MAX_TRIANGLES_PER_SUBMODEL,
            vertex_precision: VertexPrecision::Full,
            label: "supermodel".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_falls_back_to_defaults() {
        let settings: SupermodelSettings = ron::from_str("(vertex_precision: Low)").unwrap();
        assert_eq!(settings.vertex_precision, VertexPrecision::Low);
        assert_eq!(
            settings.max_triangles_per_submodel,
            DEFAULT_MAX_TRIANGLES_PER_SUBMODEL
        );
        assert_eq!(settings.label, "supermodel");
    }
}
