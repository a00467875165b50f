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

//! src/core/mod.rs
//!
//! Compiler core
//!
//! - Parser and statement tree (`parser`, `ast`)
//! - Expression evaluation and the merge-policy engine (`expr`, `merge`)
//! - One compiler per section kind (`keycodes`, `keytypes`, `compat`,
//!   `symbols`) plus the shared pieces they use (`vmod`, `action`,
//!   `indicators`, `include`)
//! - Keymap assembly and printing (`compiler`, `keymap`, `dump`)
//!
//! Nothing here touches the terminal; diagnostics are collected and
//! handed back to the caller.

pub mod action;
pub mod ast;
pub mod compat;
pub mod compiler;
pub mod diagnostics;
pub mod dump;
pub mod expr;
pub mod include;
pub mod indicators;
pub mod keycodes;
pub mod keymap;
pub mod keysym;
pub mod keytypes;
pub mod merge;
pub mod parser;
pub mod symbols;
pub mod types;
pub mod vmod;

pub use compiler::{CompileError, Compiler};
pub use keymap::Keymap;
pub use types::*;

#[cfg(test)]
mod tests;
