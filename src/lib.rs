// Copyright 2025 bakri (tidynest@proton.me)
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

//! XKB Keymap Compiler
//!
//! Compiles keyboard descriptions written in the X Keyboard Extension
//! source language into a single resolved [`Keymap`].
//!
//! # Features
//!
//! - **Full section coverage:** keycodes, key types, compatibility maps
//!   and symbols, assembled from `xkb_keymap`, `xkb_semantics` or
//!   `xkb_layout` files
//! - **Merge algebra:** `include`, `augment`, `override`, `replace` and
//!   `alternate` with per-field collision reporting
//! - **Include resolution:** search roots, in-memory sources, parse cache
//!   and recursion detection
//! - **Diagnostics:** warnings and errors with follow-up actions, filtered
//!   by a 0..10 warning level
//! - **Round trip:** compiled keymaps print back as source that compiles
//!   to the same keymap
//!
//! # Architecture
//!
//! - **`core`:** Parser, section compilers, action resolver, keymap model
//!   and printer
//! - **`config`:** Compiler settings, include roots and atomic output
//! - **`logging`:** `tracing` subscriber setup for the CLI
//!
//! # Examples
//!
//! ## Compiling a keymap
//!
//! ```no_run
//! use xkb_compiler::Compiler;
//! use std::path::Path;
//!
//! let mut compiler = Compiler::new(0).with_include_root("/usr/share/X11/xkb");
//! let keymap = compiler.compile_file(Path::new("keymap.xkb"), None)?;
//! println!("{} key types", keymap.types.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Printing it back
//!
//! ```no_run
//! use xkb_compiler::{dump_keymap, Compiler};
//!
//! let text = std::fs::read_to_string("keymap.xkb")?;
//! let keymap = Compiler::new(0).compile_str(&text, None)?;
//! print!("{}", dump_keymap(&keymap));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod core;
pub mod logging;

// Re-export commonly used types for convenience
pub use config::{CompilerConfig, ConfigError};
pub use core::compiler::{CompileError, Compiler};
pub use core::diagnostics::{Diagnostic, Severity};
pub use core::dump::dump_keymap;
pub use core::keymap::Keymap;
