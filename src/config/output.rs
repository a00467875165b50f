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

//! src/config/output.rs
//!
//! Atomic output of compiled keymaps
//!
//! The text goes to a temporary file next to the target and is renamed
//! over it on commit, so readers see either the old file or the complete
//! new one.

use atomic_write_file::AtomicWriteFile;
use std::io::Write;
use std::path::Path;

use crate::config::ConfigError;

/// Write `contents` to `path` atomically
///
/// # Errors
///
/// Returns `ConfigError::WriteFailed` if the temporary file cannot be
/// opened, written or committed.
///
/// # Example
///
/// ```ignore
/// write_output(Path::new("out.xkb"), &dump_keymap(&keymap))?;
/// ```
pub fn write_output(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let mut file = AtomicWriteFile::options().open(path).map_err(|e| {
        ConfigError::WriteFailed(format!("Failed to open {} for atomic write: {}", path.display(), e))
    })?;

    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteFailed(format!("Failed to write content: {}", e)))?;

    file.commit()
        .map_err(|e| ConfigError::WriteFailed(format!("Failed to commit atomic write: {}", e)))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "output written");
    Ok(())
}
