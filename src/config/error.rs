// Copyright 2025 Eric Jingryd (tidynest@proton.me)
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

//! src/config/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up a compiler or writing its output.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Warning level outside 0..=10.
    #[error("Warning level {0} out of range (must be 0..10)")]
    WarningLevel(u32),
    /// Include directory does not exist.
    #[error("Include directory not found: {0}")]
    NotFound(PathBuf),
    /// Include path exists but is not a directory.
    #[error("Include path is not a directory: {0}")]
    NotADirectory(PathBuf),
    /// Path is not valid UTF-8 and cannot be expanded.
    #[error("Invalid path encoding: {0}")]
    InvalidPath(PathBuf),
    /// Atomic write operation failed.
    #[error("Atomic write failed: {0}")]
    WriteFailed(String),
    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
