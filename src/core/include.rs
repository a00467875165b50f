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

//! src/core/include.rs
//!
//! Include resolution shared by all section compilers
//!
//! # Architecture
//! - [`IncludeResolver`] finds, parses and caches included files. Files are
//!   looked up as `<root>/<section-dir>/<file>`, then `<root>/<file>`, for
//!   each include root in order. Sources registered in memory take
//!   precedence over the file system.
//! - [`IncludeInfo`] is implemented by each section accumulator
//!   (keycodes, types, compat, symbols).
//! - [`process_include`] runs one `include` statement against an
//!   accumulator: every term is compiled into a fresh accumulator and
//!   merged, a bare self reference swaps the current accumulator out and
//!   merges it back at its position in the chain.
//!
//! A file that cannot be found or parsed adds 10 errors to the including
//! section, which is enough to make that section give up.

use std::collections::HashMap;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::core::ast::{IncludeStmt, IncludeTerm, XkbFile};
use crate::core::compiler::CompileState;
use crate::core::diagnostics::Diagnostics;
use crate::core::parser::{self, ParseError};
use crate::core::types::{FileType, MergeMode};

/// Errors counted for a missing or unusable include
pub const MISSING_INCLUDE_ERRORS: u32 = 10;

#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("Can't find file \"{file}\" for {section} include")]
    NotFound { file: String, section: FileType },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing include file \"{file}\": {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },

    #[error("No {section} named \"{map}\" in the include file \"{file}\"")]
    NoSuchMap {
        section: FileType,
        map: String,
        file: String,
    },

    #[error("Include file \"{file}\" is empty")]
    Empty { file: String },

    #[error("Include file wrong type (expected {expected}, got {found})")]
    WrongType { expected: FileType, found: FileType },

    #[error("Recursive include of \"{file}\" in {section}")]
    Recursive { file: String, section: FileType },
}

/// Finds and caches included sections
#[derive(Debug, Default)]
pub struct IncludeResolver {
    roots: Vec<PathBuf>,
    sources: HashMap<String, String>,
    cache: HashMap<(String, FileType), Vec<Rc<XkbFile>>>,
    stack: Vec<(String, String, FileType)>,
}

impl IncludeResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    /// Register source text for `file` under the directory of `section`
    ///
    /// # Example
    /// ```ignore
    /// resolver.add_source(FileType::Symbols, "us", "xkb_symbols \"basic\" { ... };");
    /// ```
    pub fn add_source(&mut self, section: FileType, file: &str, text: &str) {
        self.sources
            .insert(format!("{}/{}", section.directory(), file), text.to_string());
    }

    /// Number of distinct files parsed so far
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `file(map)` to one parsed section
    ///
    /// Without a map name, the section flagged `default` is used, else the
    /// first one in the file.
    pub fn find_or_parse(
        &mut self,
        file: &str,
        map: Option<&str>,
        section: FileType,
        diag: &mut Diagnostics,
    ) -> Result<Rc<XkbFile>, IncludeError> {
        let key = (file.to_string(), section);
        if !self.cache.contains_key(&key) {
            let parsed = self.load(file, section)?;
            self.cache
                .insert(key.clone(), parsed.into_iter().map(Rc::new).collect());
        }
        let sections = self.cache.get(&key).map(Vec::as_slice).unwrap_or_default();

        let chosen = match map {
            Some(map) => sections
                .iter()
                .find(|s| s.name == map)
                .ok_or_else(|| IncludeError::NoSuchMap {
                    section,
                    map: map.to_string(),
                    file: file.to_string(),
                })?,
            None => {
                let first = sections.first().ok_or_else(|| IncludeError::Empty {
                    file: file.to_string(),
                })?;
                match sections.iter().find(|s| s.is_default()) {
                    Some(default) => default,
                    None => {
                        if sections.len() > 1 && diag.level() > 5 {
                            diag.warn(format!(
                                "No map in include statement, but \"{}\" contains several",
                                file
                            ))
                            .action(format!("Using first defined map, \"{}\"", first.name));
                        }
                        first
                    }
                }
            }
        };

        if chosen.file_type != section {
            return Err(IncludeError::WrongType {
                expected: section,
                found: chosen.file_type,
            });
        }
        Ok(Rc::clone(chosen))
    }

    fn load(&self, file: &str, section: FileType) -> Result<Vec<XkbFile>, IncludeError> {
        let (origin, text) = self.read(file, section)?;
        tracing::debug!(file, origin = %origin, "parsing include file");
        parser::parse_source(&text).map_err(|source| IncludeError::Parse {
            file: file.to_string(),
            source,
        })
    }

    fn read(&self, file: &str, section: FileType) -> Result<(String, String), IncludeError> {
        let scoped = format!("{}/{}", section.directory(), file);
        if let Some(text) = self.sources.get(&scoped).or_else(|| self.sources.get(file)) {
            return Ok((format!("<memory>/{}", scoped), text.clone()));
        }

        for root in &self.roots {
            for candidate in [root.join(section.directory()).join(file), root.join(file)] {
                if candidate.is_file() {
                    return read_file(&candidate)
                        .map(|text| (candidate.display().to_string(), text));
                }
            }
        }
        Err(IncludeError::NotFound {
            file: file.to_string(),
            section,
        })
    }

    /// Push an include onto the active stack, refusing cycles
    pub fn enter(&mut self, file: &str, map: &str, section: FileType) -> Result<(), IncludeError> {
        let frame = (file.to_string(), map.to_string(), section);
        if self.stack.contains(&frame) {
            return Err(IncludeError::Recursive {
                file: file.to_string(),
                section,
            });
        }
        self.stack.push(frame);
        Ok(())
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

fn read_file(path: &Path) -> Result<String, IncludeError> {
    fs::read_to_string(path).map_err(|source| IncludeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Bookkeeping every section accumulator carries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: Option<String>,
    pub file_id: u32,
    pub error_count: u32,
}

/// A section accumulator that can absorb included sections
pub trait IncludeInfo: Default + Sized {
    const SECTION: FileType;

    fn header(&self) -> &SectionHeader;

    fn header_mut(&mut self) -> &mut SectionHeader;

    /// Fresh accumulator for an included term
    fn new_included(&self, _term: &IncludeTerm) -> Self {
        Self::default()
    }

    /// Handle includes that need no file, returning true if `term` was one
    fn include_builtin(&mut self, _term: &IncludeTerm, _state: &mut CompileState) -> bool {
        false
    }

    /// Merge the contents of `from` into `self`
    ///
    /// Called only when `from` is free of errors; names and error counts
    /// are handled by [`merge_into`].
    fn merge_contents(&mut self, from: Self, merge: MergeMode, state: &mut CompileState);

    /// Compile a parsed section into `self`
    fn handle_file(&mut self, file: &XkbFile, merge: MergeMode, state: &mut CompileState);
}

/// Merge `from` into `into`, carrying over errors and the section name
pub fn merge_into<I: IncludeInfo>(into: &mut I, mut from: I, merge: MergeMode, state: &mut CompileState) {
    let errors = from.header().error_count;
    if errors > 0 {
        into.header_mut().error_count += errors;
        return;
    }
    if into.header().name.is_none() {
        into.header_mut().name = from.header_mut().name.take();
    }
    into.merge_contents(from, merge, state);
}

/// Compile one included term into a fresh accumulator
fn compile_term<I: IncludeInfo>(
    parent: &I,
    term: &IncludeTerm,
    state: &mut CompileState,
) -> Result<I, IncludeError> {
    let file_name = term.file.as_deref().unwrap_or_default();
    let file = state
        .includes
        .find_or_parse(file_name, term.map.as_deref(), I::SECTION, &mut state.diag)?;
    state.includes.enter(file_name, &file.name, I::SECTION)?;

    let mut included = parent.new_included(term);
    included.handle_file(&file, MergeMode::Override, state);
    state.includes.leave();
    Ok(included)
}

fn report(err: &IncludeError, stmt: &IncludeStmt, diag: &mut Diagnostics) {
    diag.error(err.to_string())
        .action(format!("Include \"{}\" ignored", stmt.stmt));
}

/// Process an `include` statement against `info`
///
/// # Returns
/// `true` when the accumulator is still free of errors
pub fn process_include<I: IncludeInfo>(
    info: &mut I,
    stmt: &IncludeStmt,
    state: &mut CompileState,
) -> bool {
    let Some((first, rest)) = stmt.terms.split_first() else {
        return info.header().error_count == 0;
    };

    let mut have_self = false;
    let mut included: I;
    let new_merge = first.merge.or(stmt.merge);

    if first.is_self() && first.map.is_none() {
        have_self = true;
        included = mem::take(info);
    } else if info.include_builtin(first, state) {
        return info.header().error_count == 0;
    } else {
        match compile_term(info, first, state) {
            Ok(mut compiled) => {
                compiled.header_mut().name = Some(stmt.stmt.clone());
                included = compiled;
            }
            Err(err) => {
                report(&err, stmt, &mut state.diag);
                info.header_mut().error_count += MISSING_INCLUDE_ERRORS;
                return false;
            }
        }
    }

    if included.header().error_count == 0 {
        for term in rest {
            if term.is_self() && term.map.is_none() {
                have_self = true;
                let current = mem::take(info);
                merge_into(&mut included, current, term.merge, state);
                continue;
            }
            if included.include_builtin(term, state) {
                continue;
            }
            match compile_term(info, term, state) {
                Ok(next) => merge_into(&mut included, next, term.merge, state),
                Err(err) => {
                    report(&err, stmt, &mut state.diag);
                    info.header_mut().error_count += MISSING_INCLUDE_ERRORS;
                    return false;
                }
            }
        }
    }

    if have_self {
        *info = included;
    } else {
        merge_into(info, included, new_merge, state);
    }
    info.header().error_count == 0
}
