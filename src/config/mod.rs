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

//! src/config/mod.rs
//!
//! Compiler configuration and output handling.
//!
//! - **Warning level**: 0 (quiet) to 10 (everything)
//! - **Include roots**: the `-R` root directory followed by every `-I`
//!   directory, `~` expanded
//! - **Message wrappers**: a prefix put in front of every diagnostic
//!   line and a closing line printed when the compile had errors
//! - **Output**: keymap text written atomically, never half a file
//!
//! # Example
//!
//! ```no_run
//! use xkb_compiler::config::CompilerConfig;
//! use std::path::Path;
//!
//! let mut compiler = CompilerConfig::new()
//!     .with_warning_level(3)
//!     .with_include_dir("~/.xkb")
//!     .build()?;
//! let keymap = compiler.compile_file(Path::new("keymap.xkb"), None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod output;

pub use error::ConfigError;
pub use output::write_output;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::compiler::Compiler;
use crate::core::diagnostics::{Diagnostic, Severity};

/// Highest accepted warning level
pub const MAX_WARNING_LEVEL: u32 = 10;

/// Expand a leading `~` in a user supplied path
///
/// # Errors
///
/// Returns `ConfigError::InvalidPath` if the path is not valid UTF-8.
pub fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = path
        .to_str()
        .ok_or_else(|| ConfigError::InvalidPath(path.to_path_buf()))?;
    Ok(PathBuf::from(shellexpand::tilde(raw).as_ref()))
}

/// Settings for one compiler instance.
///
/// Built with the `with_*` methods; nothing is checked until
/// [`CompilerConfig::build`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilerConfig {
    warning_level: u32,
    root: Option<PathBuf>,
    include_dirs: Vec<PathBuf>,
    message_prefix: Option<String>,
    error_footer: Option<String>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warning_level(mut self, level: u32) -> Self {
        self.warning_level = level;
        self
    }

    /// Directory searched first for include files (`-R`)
    pub fn with_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root = Some(dir.into());
        self
    }

    /// Additional include directory (`-I`), searched in the order added
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Text put in front of every diagnostic line (`--emp`)
    pub fn with_message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.message_prefix = Some(prefix.into());
        self
    }

    /// Line printed after the diagnostics when there were errors (`--eml`)
    pub fn with_error_footer(mut self, footer: impl Into<String>) -> Self {
        self.error_footer = Some(footer.into());
        self
    }

    pub fn warning_level(&self) -> u32 {
        self.warning_level
    }

    pub fn message_prefix(&self) -> Option<&str> {
        self.message_prefix.as_deref()
    }

    pub fn error_footer(&self) -> Option<&str> {
        self.error_footer.as_deref()
    }

    /// Include search path in lookup order, `~` expanded
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPath` for paths that are not UTF-8.
    pub fn include_roots(&self) -> Result<Vec<PathBuf>, ConfigError> {
        self.root
            .iter()
            .chain(self.include_dirs.iter())
            .map(|dir| expand_path(dir))
            .collect()
    }

    /// Check the settings without building anything
    ///
    /// # Errors
    ///
    /// - `ConfigError::WarningLevel` if the level is above 10
    /// - `ConfigError::NotFound` if an include directory is missing
    /// - `ConfigError::NotADirectory` if an include path is a file
    pub fn validate(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if self.warning_level > MAX_WARNING_LEVEL {
            return Err(ConfigError::WarningLevel(self.warning_level));
        }
        let roots = self.include_roots()?;
        for root in &roots {
            if !root.exists() {
                return Err(ConfigError::NotFound(root.clone()));
            }
            if !root.is_dir() {
                return Err(ConfigError::NotADirectory(root.clone()));
            }
        }
        Ok(roots)
    }

    /// Create a compiler with these settings
    ///
    /// # Errors
    ///
    /// Any error [`CompilerConfig::validate`] reports.
    pub fn build(&self) -> Result<Compiler, ConfigError> {
        let roots = self.validate()?;
        debug!(level = self.warning_level, roots = roots.len(), "building compiler");
        Ok(roots
            .into_iter()
            .fold(Compiler::new(self.warning_level), Compiler::with_include_root))
    }

    /// Lines to print for a finished compile
    ///
    /// Every line gets the message prefix; the error footer closes the
    /// list when any record is an error or the compile failed.
    ///
    /// # Arguments
    ///
    /// * `diagnostics` - Records of the compile
    /// * `failed` - Whether the compile returned an error
    /// * `color` - Use the colored rendering
    pub fn format_diagnostics(
        &self,
        diagnostics: &[Diagnostic],
        failed: bool,
        color: bool,
    ) -> Vec<String> {
        let prefix = self.message_prefix.as_deref().unwrap_or_default();
        let mut lines: Vec<String> = diagnostics
            .iter()
            .flat_map(|diag| {
                let text = if color { diag.render() } else { diag.to_string() };
                text.lines()
                    .map(|line| format!("{}{}", prefix, line))
                    .collect::<Vec<_>>()
            })
            .collect();
        let had_errors = failed || diagnostics.iter().any(|d| d.severity == Severity::Error);
        if let (true, Some(footer)) = (had_errors, self.error_footer.as_ref()) {
            lines.push(footer.clone());
        }
        lines
    }
}

#[cfg(test)]
mod tests;
