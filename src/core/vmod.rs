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

//! src/core/vmod.rs
//!
//! Virtual modifier registry
//!
//! Sixteen named slots shared by all sections of one keymap. A slot is
//! assigned on first definition and never released. Each slot may be
//! bound to a set of real modifiers (`virtual_modifiers NumLock = Mod2;`).
//!
//! Masks mixing real and virtual modifiers use the packed representation
//! of [`ModMask`]: virtual modifier `i` is bit `8 + i`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::diagnostics::Diagnostics;
use crate::core::expr::{self, resolve_mask, ExprError, Lookup, ModMaskLookup};
use crate::core::ast::Expr;
use crate::core::types::{real_mods_text, MergeMode, ModMask, NUM_VIRTUAL_MODS};

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VModError {
    #[error("Too many virtual modifiers defined (maximum {NUM_VIRTUAL_MODS})")]
    TooMany,

    #[error("Declaration of {name} ignored: {source}")]
    BadValue {
        name: String,
        #[source]
        source: ExprError,
    },
}

/// Named virtual modifier slots and their real-modifier bindings
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct VirtualMods {
    names: [Option<String>; NUM_VIRTUAL_MODS],
    mods: [u8; NUM_VIRTUAL_MODS],
}

impl VirtualMods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of a defined virtual modifier (case-insensitive)
    pub fn index(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).and_then(|n| n.as_deref())
    }

    /// Real modifiers bound to a slot
    pub fn real_mods(&self, index: usize) -> u8 {
        self.mods.get(index).copied().unwrap_or(0)
    }

    /// Iterate over `(slot, name, real binding)` of defined slots
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, u8)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_deref().map(|n| (i, n, self.mods[i])))
    }

    pub fn is_empty(&self) -> bool {
        self.names.iter().all(Option::is_none)
    }

    /// Define or redefine a virtual modifier
    ///
    /// Reuses the slot carrying the same name, otherwise takes the first
    /// free one. A redefinition with a different binding is reported; the
    /// new binding is taken only for `Override` and `Replace` merges.
    ///
    /// # Returns
    /// The slot index, or [`VModError::TooMany`] when all slots are taken
    pub fn define(
        &mut self,
        name: &str,
        real_mods: Option<u8>,
        merge: MergeMode,
        diag: &mut Diagnostics,
    ) -> Result<usize, VModError> {
        if let Some(index) = self.index(name) {
            let Some(new_mods) = real_mods else {
                return Ok(index);
            };
            let old_mods = self.mods[index];
            if new_mods == old_mods {
                return Ok(index);
            }
            let take_new = matches!(merge, MergeMode::Override | MergeMode::Replace);
            let (used, ignored) = if take_new {
                (new_mods, old_mods)
            } else {
                (old_mods, new_mods)
            };
            diag.warn(format!("Virtual modifier {} multiply defined", name))
                .action(format!(
                    "Using {}, ignoring {}",
                    real_mods_text(used),
                    real_mods_text(ignored)
                ));
            if take_new {
                self.mods[index] = new_mods;
            }
            return Ok(index);
        }

        let Some(free) = self.names.iter().position(Option::is_none) else {
            return Err(VModError::TooMany);
        };
        self.names[free] = Some(name.to_string());
        self.mods[free] = real_mods.unwrap_or(0);
        tracing::debug!(name, slot = free, "virtual modifier defined");
        Ok(free)
    }

    /// Text for a virtual modifier bit set (`NumLock+AltGr`)
    pub fn vmods_text(&self, vmods: u16) -> String {
        (0..NUM_VIRTUAL_MODS)
            .filter(|i| vmods & (1 << i) != 0)
            .map(|i| match self.name(i) {
                Some(name) => name.to_string(),
                None => format!("{}", i),
            })
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Text for a combined mask, `none` when empty
    pub fn mask_text(&self, mask: ModMask) -> String {
        match (mask.real_mods, mask.vmods) {
            (0, 0) => "none".to_string(),
            (real, 0) => real_mods_text(real),
            (0, vmods) => self.vmods_text(vmods),
            (real, vmods) => format!("{}+{}", real_mods_text(real), self.vmods_text(vmods)),
        }
    }
}

/// Handle a `virtual_modifiers A, B = Mod2;` statement element
pub fn handle_vmod_def(
    vmods: &mut VirtualMods,
    name: &str,
    value: Option<&Expr>,
    merge: MergeMode,
    diag: &mut Diagnostics,
) -> Result<usize, VModError> {
    let real = match value {
        Some(expr) => match expr::resolve_modmask(expr) {
            Ok(mask) => Some(mask.real_mods),
            Err(source) => {
                let err = VModError::BadValue {
                    name: name.to_string(),
                    source,
                };
                diag.error(err.to_string());
                return Err(err);
            }
        },
        None => None,
    };
    vmods.define(name, real, merge, diag).inspect_err(|e| {
        diag.error(e.to_string()).action("Exiting");
    })
}

/// Real and virtual modifier names to packed mask bits
#[derive(Clone, Copy, Debug)]
pub struct VModMaskLookup<'a>(pub &'a VirtualMods);

impl Lookup for VModMaskLookup<'_> {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32> {
        if let Some(mask) = ModMaskLookup.lookup(element, field) {
            return Some(mask);
        }
        if element.is_some() {
            return None;
        }
        self.0.index(field).map(|i| 1 << (8 + i))
    }
}

/// Virtual modifier names to slot indexes
#[derive(Clone, Copy, Debug)]
pub struct VModIndexLookup<'a>(pub &'a VirtualMods);

impl Lookup for VModIndexLookup<'_> {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32> {
        if element.is_some() {
            return None;
        }
        self.0.index(field).map(|i| i as u32)
    }
}

/// Resolve a mask that may name virtual modifiers
pub fn resolve_vmodmask(expr: &Expr, vmods: &VirtualMods) -> Result<ModMask, ExprError> {
    resolve_mask(expr, &VModMaskLookup(vmods)).map(ModMask::from_packed)
}

/// Resolve a single virtual modifier by name, or by its slot number
pub fn resolve_virtual_modifier(expr: &Expr, vmods: &VirtualMods) -> Result<usize, ExprError> {
    if let Expr::Ident(name) = expr {
        if let Some(index) = vmods.index(name) {
            return Ok(index);
        }
    }
    match expr::resolve_integer(expr, None) {
        Ok(value) if (0..NUM_VIRTUAL_MODS as i64).contains(&value) => Ok(value as usize),
        Ok(value) => Err(ExprError::IllegalEnum {
            name: value.to_string(),
            expected: format!("0..{}", NUM_VIRTUAL_MODS - 1),
        }),
        Err(_) => match expr {
            Expr::Ident(name) => Err(ExprError::UnknownIdent {
                name: name.clone(),
                kind: "virtual modifier",
            }),
            other => Err(ExprError::TypeMismatch {
                expected: "virtual modifier",
                found: other.kind_name(),
            }),
        },
    }
}
