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

//! src/core/compiler.rs
//!
//! Top-level keymap assembler
//!
//! # Architecture
//! A composite file (`xkb_keymap`, `xkb_semantics` or `xkb_layout`) is
//! checked for illegal, duplicate and missing sections, then its sections
//! are compiled in a fixed order into one [`Keymap`]:
//!
//! ```text
//! keycodes → types → compat → symbols → bind leftover indicators
//! ```
//!
//! Each stage reads what the previous ones produced (symbols look up key
//! names and types, compat resolves virtual modifiers). The first stage
//! that fails aborts the compile. Geometry sections are accepted but not
//! compiled.
//!
//! [`CompileState`] is the mutable context threaded through every
//! sub-compiler: the keymap under construction, the diagnostic sink and
//! the include resolver with its file cache.

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::core::ast::XkbFile;
use crate::core::compat::compile_compat;
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::include::IncludeResolver;
use crate::core::indicators::bind_indicators;
use crate::core::keycodes::compile_keycodes;
use crate::core::keymap::Keymap;
use crate::core::keytypes::compile_key_types;
use crate::core::parser::{self, ParseError};
use crate::core::symbols::compile_symbols;
use crate::core::types::{FileType, MergeMode};

/// Errors that end a compile
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("No map named \"{0}\" in the input file")]
    NoSuchMap(String),

    #[error("Input contains no keymap")]
    Empty,

    #[error("Cannot compile a lone {0} section; expected xkb_keymap, xkb_semantics or xkb_layout")]
    NotAKeymap(FileType),

    #[error("Required {section} section missing from {composite}")]
    MissingSection {
        section: FileType,
        composite: FileType,
    },

    #[error("Failed to compile {section} section \"{name}\"")]
    SectionFailed { section: FileType, name: String },
}

/// Mutable context shared by all sub-compilers of one compile
#[derive(Debug)]
pub struct CompileState {
    pub keymap: Keymap,
    pub diag: Diagnostics,
    pub includes: IncludeResolver,
}

impl CompileState {
    pub fn new(warning_level: u32, includes: IncludeResolver) -> Self {
        Self {
            keymap: Keymap::new(),
            diag: Diagnostics::new(warning_level),
            includes,
        }
    }
}

/// Sections a composite file must contain
fn required_sections(composite: FileType) -> &'static [FileType] {
    match composite {
        FileType::Semantics => &[FileType::Compat],
        FileType::Layout => &[FileType::Keycodes, FileType::Types, FileType::Symbols],
        _ => &[
            FileType::Keycodes,
            FileType::Types,
            FileType::Compat,
            FileType::Symbols,
        ],
    }
}

/// Sections a composite file may contain
fn legal_sections(composite: FileType) -> &'static [FileType] {
    match composite {
        FileType::Semantics => &[FileType::Types, FileType::Compat],
        FileType::Layout => &[
            FileType::Keycodes,
            FileType::Types,
            FileType::Symbols,
            FileType::Geometry,
        ],
        _ => &[
            FileType::Keycodes,
            FileType::Types,
            FileType::Compat,
            FileType::Symbols,
            FileType::Geometry,
        ],
    }
}

const COMPILE_ORDER: [FileType; 4] = [
    FileType::Keycodes,
    FileType::Types,
    FileType::Compat,
    FileType::Symbols,
];

/// Compile the sections of a composite file into `state.keymap`
///
/// # Arguments
///
/// * `file` - A parsed `xkb_keymap`, `xkb_semantics` or `xkb_layout`
/// * `state` - Compile context; the keymap is built in place
///
/// # Errors
///
/// Returns `CompileError::MissingSection` when a required section is
/// absent and `CompileError::SectionFailed` for the first section that
/// ends with errors.
pub fn compile_keymap(file: &XkbFile, state: &mut CompileState) -> Result<(), CompileError> {
    if !file.file_type.is_composite() {
        return Err(CompileError::NotAKeymap(file.file_type));
    }
    let composite = file.file_type;
    let legal = legal_sections(composite);

    let mut chosen: Vec<&XkbFile> = Vec::new();
    for section in &file.sections {
        if !legal.contains(&section.file_type) {
            state
                .diag
                .error(format!(
                    "Cannot define {} in a {}",
                    section.file_type, composite
                ))
                .action(format!("Ignoring section \"{}\"", section.name));
            continue;
        }
        if chosen.iter().any(|s| s.file_type == section.file_type) {
            state
                .diag
                .error(format!(
                    "More than one {} section in a {} file",
                    section.file_type, composite
                ))
                .action("All sections after the first ignored");
            continue;
        }
        chosen.push(section);
    }

    for required in required_sections(composite) {
        if !chosen.iter().any(|s| s.file_type == *required) {
            state.diag.error(format!(
                "Required section {} missing from {}",
                required, composite
            ));
            return Err(CompileError::MissingSection {
                section: *required,
                composite,
            });
        }
    }

    if let Some(geometry) = chosen.iter().find(|s| s.file_type == FileType::Geometry) {
        info!(name = %geometry.name, "geometry section skipped");
        if state.diag.level() > 0 {
            state
                .diag
                .info(format!("Geometry section \"{}\" not compiled", geometry.name));
        }
    }

    let mut unbound = Vec::new();
    for section_type in COMPILE_ORDER {
        let Some(section) = chosen.iter().find(|s| s.file_type == section_type) else {
            continue;
        };
        debug!(section = %section_type, name = %section.name, "compiling section");
        let ok = match section_type {
            FileType::Keycodes => compile_keycodes(section, MergeMode::Override, state),
            FileType::Types => compile_key_types(section, MergeMode::Override, state),
            FileType::Compat => match compile_compat(section, MergeMode::Override, state) {
                Some(leds) => {
                    unbound = leds;
                    true
                }
                None => false,
            },
            _ => compile_symbols(section, MergeMode::Override, state),
        };
        if !ok {
            return Err(CompileError::SectionFailed {
                section: section_type,
                name: section.name.clone(),
            });
        }
    }

    if !unbound.is_empty() {
        bind_indicators(unbound, state);
    }
    Ok(())
}

/// Pick one section out of a parsed file
///
/// A named map must exist; otherwise the section flagged `default` wins,
/// else the first one.
pub fn select_map<'a>(files: &'a [XkbFile], map: Option<&str>) -> Result<&'a XkbFile, CompileError> {
    match map {
        Some(map) => files
            .iter()
            .find(|f| f.name == map)
            .ok_or_else(|| CompileError::NoSuchMap(map.to_string())),
        None => files
            .iter()
            .find(|f| f.is_default())
            .or_else(|| files.first())
            .ok_or(CompileError::Empty),
    }
}

/// Reusable compiler front door
///
/// The include resolver and its parse cache live across compiles; the
/// diagnostics of the last compile stay available until the next one.
///
/// # Example
///
/// ```ignore
/// let mut compiler = Compiler::new(0).with_include_root("/usr/share/X11/xkb");
/// let keymap = compiler.compile_file(Path::new("keymap.xkb"), None)?;
/// for diag in compiler.diagnostics() {
///     eprintln!("{diag}");
/// }
/// ```
#[derive(Debug, Default)]
pub struct Compiler {
    warning_level: u32,
    includes: IncludeResolver,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    pub fn new(warning_level: u32) -> Self {
        Self {
            warning_level,
            ..Self::default()
        }
    }

    /// Add a directory to the include search path
    pub fn with_include_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.includes.add_root(root);
        self
    }

    pub fn warning_level(&self) -> u32 {
        self.warning_level
    }

    pub fn include_roots(&self) -> &[PathBuf] {
        self.includes.roots()
    }

    /// Make `text` includable as `file` from sections of kind `section`
    pub fn add_source(&mut self, section: FileType, file: &str, text: &str) {
        self.includes.add_source(section, file, text);
    }

    /// Diagnostics of the last compile
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Compile an already parsed composite file
    pub fn compile_parsed(&mut self, file: &XkbFile) -> Result<Keymap, CompileError> {
        let includes = mem::take(&mut self.includes);
        let mut state = CompileState::new(self.warning_level, includes);
        let result = compile_keymap(file, &mut state);
        self.includes = state.includes;
        self.diagnostics = state.diag.take();
        debug!(
            diagnostics = self.diagnostics.len(),
            cached = self.includes.cached_files(),
            ok = result.is_ok(),
            "compile finished"
        );
        result.map(|()| state.keymap)
    }

    /// Parse and compile source text
    ///
    /// # Arguments
    ///
    /// * `text` - Source holding one or more composite maps
    /// * `map` - Map to compile; `None` picks the default map
    pub fn compile_str(&mut self, text: &str, map: Option<&str>) -> Result<Keymap, CompileError> {
        self.diagnostics.clear();
        let files = parser::parse_source(text)?;
        let file = select_map(&files, map)?;
        self.compile_parsed(file)
    }

    /// Read, parse and compile a file
    pub fn compile_file(&mut self, path: &Path, map: Option<&str>) -> Result<Keymap, CompileError> {
        let text = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "compiling keymap file");
        self.compile_str(&text, map)
    }
}
