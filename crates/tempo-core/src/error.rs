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

//! Error types shared across the workspace.

use crate::renderer::DrawableId;
use thiserror::Error;

/// A fault raised by the render host or by one of its drawables.
///
/// These never escape the core: callers catch them where the call is made,
/// log a warning and move on to the next object.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    /// The drawable was already destroyed by the host.
    #[error("drawable {0} has already been destroyed")]
    Destroyed(DrawableId),
    /// The drawable or host does not implement the requested operation.
    #[error("operation `{0}` is not supported by this drawable")]
    Unsupported(&'static str),
    /// Any other backend failure.
    #[error("render host failure: {0}")]
    Backend(String),
}

/// Result alias for host and drawable operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors related to quality configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QualityError {
    /// The given name does not match any entry of the quality table.
    #[error("unknown quality level '{0}'")]
    UnknownLevel(String),
}
