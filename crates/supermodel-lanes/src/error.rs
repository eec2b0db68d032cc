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

//! Error type shared by the supermodel lanes.

use supermodel_core::renderer::ResourceError;
use thiserror::Error;

/// Errors raised while building, binding or drawing a supermodel.
///
/// None of them are retried internally: after a failed rebuild the caller
/// decides whether to call [`rebuild`](crate::SupermodelBatcher::rebuild) again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// The input mesh or the subdivision budget cannot be processed.
    #[error("malformed geometry '{geometry}': {reason}")]
    MalformedGeometry {
        /// Name of the offending geometry.
        geometry: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The operation is not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The device rejected an upload while a supermodel was being rebuilt.
    #[error("GPU upload of '{buffer}' failed: {source}")]
    GpuUploadFailure {
        /// Label of the buffer being uploaded.
        buffer: String,
        /// The device error.
        #[source]
        source: ResourceError,
    },
    /// A bindless handle was requested before its texture had GPU storage.
    #[error("bindless handle '{key}' is not ready")]
    HandleNotReady {
        /// Registry key of the handle.
        key: String,
    },
    /// Any other device failure.
    #[error("device error: {0}")]
    Resource(#[from] ResourceError),
}

impl BatchError {
    pub(crate) fn malformed(geometry: &str, reason: impl Into<String>) -> Self {
        Self::MalformedGeometry {
            geometry: geometry.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn upload(buffer: &str) -> impl FnOnce(ResourceError) -> Self + '_ {
        move |source| Self::GpuUploadFailure {
            buffer: buffer.to_owned(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn upload_failure_exposes_its_source() {
        let err = BatchError::upload("vertices")(ResourceError::OutOfBounds);
        assert_eq!(
            err.to_string(),
            "GPU upload of 'vertices' failed: Resource access out of bounds."
        );
        assert!(err.source().is_some());
    }
}
