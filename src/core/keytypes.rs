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

//! src/core/keytypes.rs
//!
//! `xkb_types` compiler
//!
//! A key type maps a modifier combination to a shift level:
//!
//! ```text
//! type "ALPHABETIC" {
//!     modifiers = Shift+Lock;
//!     map[Shift] = Level2;
//!     preserve[Lock] = Lock;
//!     level_name[Level1] = "Base";
//! };
//! ```
//!
//! # Architecture
//! - File scope `type.field = ...` statements edit a default type. A new
//!   type starts from the default mask; after its own body, the default's
//!   map entries, preserves and level names that fit its mask are added
//!   without overriding anything the body set.
//! - The four canonical types (`ONE_LEVEL`, `TWO_LEVEL`, `ALPHABETIC`,
//!   `KEYPAD`) always occupy indexes 0..3 of the compiled table; missing
//!   ones are synthesised.

use crate::core::ast::{Expr, IncludeTerm, Stmt, VarDef, XkbFile};
use crate::core::compiler::CompileState;
use crate::core::expr::{self, resolve_lhs, SimpleLookup, LEVEL_NAMES};
use crate::core::include::{process_include, IncludeInfo, SectionHeader};
use crate::core::keymap::{KeyType, KeyTypeEntry};
use crate::core::merge::{should_report, CommonInfo};
use crate::core::types::{FileType, MergeMode, ModMask, LOCK_MASK, MAX_SHIFT_LEVEL, SHIFT_MASK};
use crate::core::vmod::{handle_vmod_def, resolve_vmodmask, VirtualMods};

const MAX_ERRORS: u32 = 10;

/// Field bit: the type's modifier mask was set
const KT_MASK: u32 = 1 << 0;

pub const ONE_LEVEL: &str = "ONE_LEVEL";
pub const TWO_LEVEL: &str = "TWO_LEVEL";
pub const ALPHABETIC: &str = "ALPHABETIC";
pub const KEYPAD: &str = "KEYPAD";

/// Canonical type names in table order
pub const CANONICAL_TYPES: [&str; 4] = [ONE_LEVEL, TWO_LEVEL, ALPHABETIC, KEYPAD];

/// A `preserve[index] = mods` entry
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreserveInfo {
    pub index: ModMask,
    pub preserve: ModMask,
}

/// Working record for one key type
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyTypeInfo {
    pub common: CommonInfo,
    pub name: String,
    pub mask: ModMask,
    pub num_levels: u32,
    pub entries: Vec<KeyTypeEntry>,
    pub preserves: Vec<PreserveInfo>,
    pub level_names: Vec<Option<String>>,
}

impl KeyTypeInfo {
    fn new(name: &str, file_id: u32, merge: MergeMode) -> Self {
        Self {
            common: CommonInfo::new(file_id, merge),
            name: name.to_string(),
            num_levels: 1,
            ..Self::default()
        }
    }

    fn find_entry(&mut self, mods: ModMask) -> Option<&mut KeyTypeEntry> {
        self.entries.iter_mut().find(|e| e.mods == mods)
    }

    /// Add or update a `map[mods] = level` entry
    pub fn add_map_entry(
        &mut self,
        new: KeyTypeEntry,
        clobber: bool,
        report: bool,
        state: &mut CompileState,
    ) -> bool {
        let level = state.diag.level();
        let name = self.name.clone();
        let mask_text = state.keymap.vmods.mask_text(new.mods);
        if let Some(old) = self.find_entry(new.mods) {
            if report && old.level != new.level {
                let (using, ignoring) = if clobber {
                    (new.level + 1, old.level + 1)
                } else {
                    (old.level + 1, new.level + 1)
                };
                state
                    .diag
                    .warn(format!("Multiple map entries for {} in {}", mask_text, name))
                    .action(format!("Using {}, ignoring {}", using, ignoring));
            } else if level > 9 {
                state
                    .diag
                    .warn(format!(
                        "Multiple occurrences of map[{}]= {} in {}",
                        mask_text,
                        old.level + 1,
                        name
                    ))
                    .action("Ignored");
                return true;
            }
            if clobber {
                old.level = new.level;
            }
        } else {
            self.entries.push(KeyTypeEntry {
                mods: new.mods,
                level: new.level,
                preserve: ModMask::default(),
            });
        }
        if new.level >= self.num_levels {
            self.num_levels = new.level + 1;
        }
        true
    }

    /// Add or update a `preserve[index] = mods` entry
    pub fn add_preserve(
        &mut self,
        new: PreserveInfo,
        clobber: bool,
        report: bool,
        state: &mut CompileState,
    ) -> bool {
        let level = state.diag.level();
        let Some(old) = self.preserves.iter_mut().find(|p| p.index == new.index) else {
            self.preserves.push(new);
            return true;
        };
        let vmods = &state.keymap.vmods;
        if old.preserve == new.preserve {
            if level > 9 {
                let text = vmods.mask_text(new.index);
                state
                    .diag
                    .warn(format!(
                        "Identical definitions for preserve[{}] in {}",
                        text, self.name
                    ))
                    .action("Ignored");
            }
            return true;
        }
        if report && level > 0 {
            let (using, ignoring) = if clobber {
                (new.preserve, old.preserve)
            } else {
                (old.preserve, new.preserve)
            };
            let message = format!(
                "Multiple definitions for preserve[{}] in {}",
                vmods.mask_text(new.index),
                self.name
            );
            let action = format!(
                "Using {}, ignoring {}",
                vmods.mask_text(using),
                vmods.mask_text(ignoring)
            );
            state.diag.warn(message).action(action);
        }
        if clobber {
            old.preserve = new.preserve;
        }
        true
    }

    /// Name a 0-based level
    pub fn add_level_name(
        &mut self,
        level: u32,
        name: String,
        clobber: bool,
        state: &mut CompileState,
    ) -> bool {
        let slot = level as usize;
        if self.level_names.len() <= slot {
            self.level_names.resize(slot + 1, None);
        }
        match &self.level_names[slot] {
            Some(old) if *old == name => {
                if state.diag.level() > 9 {
                    state
                        .diag
                        .warn(format!(
                            "Duplicate names for level {} of key type {}",
                            level + 1,
                            self.name
                        ))
                        .action("Ignored");
                }
                return true;
            }
            Some(old) => {
                if state.diag.level() > 0 {
                    let (using, ignoring) = if clobber { (&name, old) } else { (old, &name) };
                    let action = format!("Using {}, ignoring {}", using, ignoring);
                    state
                        .diag
                        .warn(format!(
                            "Multiple names for level {} of key type {}",
                            level + 1,
                            self.name
                        ))
                        .action(action);
                }
                if !clobber {
                    return true;
                }
            }
            None => {}
        }
        self.level_names[slot] = Some(name);
        if level >= self.num_levels {
            self.num_levels = level + 1;
        }
        true
    }

    fn bad_type(&self, field: &str, wanted: &str, state: &mut CompileState) -> bool {
        state.diag.error(format!(
            "The {} field in key type {} must be of type {}",
            field, self.name, wanted
        ));
        false
    }

    fn should_be_array(&self, field: &str, state: &mut CompileState) -> bool {
        state
            .diag
            .error(format!("Missing subscript for {} in key type {}", field, self.name))
            .action("Ignoring illegal assignment");
        false
    }

    /// Apply one `field[index] = value` assignment
    pub fn set_field(
        &mut self,
        field: &str,
        index: Option<&Expr>,
        value: &Expr,
        state: &mut CompileState,
    ) -> bool {
        match field.to_ascii_lowercase().as_str() {
            "modifiers" => self.set_modifiers(index, value, state),
            "map" => self.set_map_entry(index, value, state),
            "preserve" => self.set_preserve(index, value, state),
            "levelname" | "level_name" => self.set_level_name(index, value, state),
            _ => {
                state
                    .diag
                    .error(format!("Unknown field {} in key type {}", field, self.name))
                    .action("Definition ignored");
                false
            }
        }
    }

    fn set_modifiers(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        if index.is_some() {
            state
                .diag
                .warn("The modifiers field of a key type is not an array")
                .action("Illegal array subscript ignored");
        }
        let mask = match resolve_vmodmask(value, &state.keymap.vmods) {
            Ok(mask) => mask,
            Err(_) => {
                state
                    .diag
                    .error("Key type mask field must be a modifier mask")
                    .action("Key type definition ignored");
                return false;
            }
        };
        if self.common.is_defined(KT_MASK) {
            let vmods = &state.keymap.vmods;
            let action = format!(
                "Using {}, ignoring {}",
                vmods.mask_text(self.mask),
                vmods.mask_text(mask)
            );
            state
                .diag
                .warn(format!(
                    "Multiple modifier mask definitions for key type {}",
                    self.name
                ))
                .action(action);
            return false;
        }
        self.mask = mask;
        self.common.set_defined(KT_MASK);
        true
    }

    /// Mask `mods` down to the type's modifiers, warning when bits are lost
    fn clip_to_mask(&self, mods: ModMask, message: String, state: &mut CompileState) -> ModMask {
        if mods.is_subset_of(self.mask) {
            return mods;
        }
        let clipped = mods.intersect(self.mask);
        if state.diag.level() > 0 {
            let vmods = &state.keymap.vmods;
            let action = format!(
                "Using {} instead of {}",
                vmods.mask_text(clipped),
                vmods.mask_text(mods)
            );
            state.diag.warn(message).action(action);
        }
        clipped
    }

    fn resolve_level(index: &Expr) -> Result<i64, expr::ExprError> {
        expr::resolve_integer(index, Some(&SimpleLookup(LEVEL_NAMES)))
    }

    fn set_map_entry(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        let Some(index) = index else {
            return self.should_be_array("map entry", state);
        };
        let mods = match resolve_vmodmask(index, &state.keymap.vmods) {
            Ok(mods) => mods,
            Err(_) => return self.bad_type("map entry", "modifier mask", state),
        };
        let message = format!("Map entry for unused modifiers in {}", self.name);
        let mods = self.clip_to_mask(mods, message, state);

        let level = match Self::resolve_level(value) {
            Ok(level) => level,
            Err(_) => {
                state
                    .diag
                    .error("Level specifications in a key type must be integer")
                    .action("Ignoring malformed level specification");
                return false;
            }
        };
        if level < 1 || level > i64::from(MAX_SHIFT_LEVEL) + 1 {
            let text = state.keymap.vmods.mask_text(mods);
            state
                .diag
                .error(format!(
                    "Shift level {} out of range (1..{}) in key type {}",
                    level,
                    MAX_SHIFT_LEVEL + 1,
                    self.name
                ))
                .action(format!("Ignoring illegal definition of map[{}]", text));
            return false;
        }
        let entry = KeyTypeEntry {
            mods,
            level: (level - 1) as u32,
            preserve: ModMask::default(),
        };
        self.add_map_entry(entry, true, true, state)
    }

    fn set_preserve(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        let Some(index) = index else {
            return self.should_be_array("preserve entry", state);
        };
        let mods = match resolve_vmodmask(index, &state.keymap.vmods) {
            Ok(mods) => mods,
            Err(_) => return self.bad_type("preserve entry", "modifier mask", state),
        };
        let message = format!("Preserve for modifiers not used by the {} type", self.name);
        let index_mods = self.clip_to_mask(mods, message, state);

        let preserve = match resolve_vmodmask(value, &state.keymap.vmods) {
            Ok(mask) => mask,
            Err(_) => {
                let text = state.keymap.vmods.mask_text(index_mods);
                state
                    .diag
                    .error("Preserve value in a key type is not a modifier mask")
                    .action(format!("Ignoring preserve[{}] in type {}", text, self.name));
                return false;
            }
        };
        let clipped = preserve.intersect(index_mods);
        if clipped != preserve && state.diag.level() > 0 {
            let vmods = &state.keymap.vmods;
            let message = format!(
                "Illegal value for preserve[{}] in type {}",
                vmods.mask_text(index_mods),
                self.name
            );
            let action = format!(
                "Converted {} to {}",
                vmods.mask_text(preserve),
                vmods.mask_text(clipped)
            );
            state.diag.warn(message).action(action);
        }
        let new = PreserveInfo {
            index: index_mods,
            preserve: clipped,
        };
        self.add_preserve(new, true, true, state)
    }

    fn set_level_name(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        let Some(index) = index else {
            return self.should_be_array("level name", state);
        };
        let level = match Self::resolve_level(index) {
            Ok(level) => level,
            Err(_) => return self.bad_type("level name", "integer", state),
        };
        if level < 1 || level > i64::from(MAX_SHIFT_LEVEL) + 1 {
            state
                .diag
                .error(format!(
                    "Level name {} out of range (1..{}) in key type {}",
                    level,
                    MAX_SHIFT_LEVEL + 1,
                    self.name
                ))
                .action("Ignoring illegal level name definition");
            return false;
        }
        let Ok(name) = expr::resolve_string(value) else {
            state
                .diag
                .error(format!(
                    "Non-string name for level {} in key type {}",
                    level, self.name
                ))
                .action("Ignoring illegal level name definition");
            return false;
        };
        self.add_level_name((level - 1) as u32, name, true, state)
    }

    /// Final table form: level-1 entries dropped, preserves attached
    fn finish(mut self) -> KeyType {
        self.entries.retain(|e| e.level != 0);
        for pre in &self.preserves {
            match self.entries.iter_mut().find(|e| e.mods == pre.index) {
                Some(entry) => entry.preserve = pre.preserve,
                None => self.entries.push(KeyTypeEntry {
                    mods: pre.index,
                    level: 0,
                    preserve: pre.preserve,
                }),
            }
        }
        let mut level_names = self.level_names;
        level_names.resize(self.num_levels as usize, None);
        KeyType {
            name: self.name,
            mods: self.mask,
            num_levels: self.num_levels,
            entries: self.entries,
            level_names,
        }
    }
}

/// Accumulator for one types section and its includes
#[derive(Clone, Debug, PartialEq)]
pub struct KeyTypesInfo {
    pub header: SectionHeader,
    pub types: Vec<KeyTypeInfo>,
    /// Target of file scope `type.field = ...` assignments
    pub dflt: KeyTypeInfo,
}

impl Default for KeyTypesInfo {
    fn default() -> Self {
        Self {
            header: SectionHeader::default(),
            types: Vec::new(),
            dflt: KeyTypeInfo::new("default", 0, MergeMode::Override),
        }
    }
}

impl KeyTypesInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished type, honouring the canonical level limits
    pub fn add_key_type(&mut self, mut new: KeyTypeInfo, state: &mut CompileState) -> bool {
        let required = match new.name.as_str() {
            ONE_LEVEL => Some(1),
            TWO_LEVEL | ALPHABETIC | KEYPAD => Some(2),
            _ => None,
        };
        if let Some(required) = required {
            if new.num_levels > required {
                state
                    .diag
                    .error(format!(
                        "Key type \"{}\" has {} levels, must have {}",
                        new.name, new.num_levels, required
                    ))
                    .action("Illegal type definition ignored");
                return false;
            }
            new.num_levels = required;
        }

        let level = state.diag.level();
        let Some(pos) = self.types.iter().position(|t| t.name == new.name) else {
            self.types.push(new);
            return true;
        };
        let old = &mut self.types[pos];
        if matches!(new.common.merge, MergeMode::Replace | MergeMode::Override) {
            if should_report(old.common.file_id, new.common.file_id, level) {
                state
                    .diag
                    .warn(format!("Multiple definitions of the {} key type", new.name))
                    .action("Earlier definition ignored");
            }
            *old = new;
        } else if old.common.file_id == new.common.file_id && level > 0 {
            state
                .diag
                .warn(format!("Multiple definitions of the {} key type", new.name))
                .action("Later definition ignored");
        }
        true
    }

    /// `type.field = value` at file scope, or inside a type body
    fn handle_var(&mut self, def: &VarDef, state: &mut CompileState) -> bool {
        let Some(target) = def.name.as_ref() else {
            state.diag.error("Missing field name in key type assignment");
            return false;
        };
        let (element, field, index) = match resolve_lhs(target) {
            Ok(parts) => parts,
            Err(err) => {
                state.diag.error(err.to_string());
                return false;
            }
        };
        let Some(value) = def.value.as_ref() else {
            state.diag.error(format!("Missing value for {}", field));
            return false;
        };
        match element {
            Some(element) if element.eq_ignore_ascii_case("type") => {
                self.dflt.set_field(field, index, value, state)
            }
            Some(element) => {
                state
                    .diag
                    .error(format!("Default for unknown element {}", element))
                    .action(format!("Value for field {} ignored", field));
                false
            }
            None => {
                state
                    .diag
                    .error(format!("Default defined for unknown field {}", field))
                    .action("Ignored");
                false
            }
        }
    }

    fn handle_key_type_def(
        &mut self,
        name: &str,
        body: &[VarDef],
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        let mut key_type = KeyTypeInfo::new(name, self.header.file_id, merge);
        key_type.mask = self.dflt.mask;

        for def in body {
            let ok = match def.name.as_ref() {
                Some(Expr::FieldRef { .. }) => self.handle_var(def, state),
                Some(target) => match (resolve_lhs(target), def.value.as_ref()) {
                    (Ok((_, field, index)), Some(value)) => {
                        key_type.set_field(field, index, value, state)
                    }
                    (Ok((_, field, _)), None) => {
                        state.diag.error(format!("Missing value for {}", field));
                        false
                    }
                    (Err(err), _) => {
                        state.diag.error(err.to_string());
                        false
                    }
                },
                None => {
                    state.diag.error("Unnamed value in a key type definition");
                    false
                }
            };
            if !ok {
                return false;
            }
        }

        for entry in &self.dflt.entries {
            if entry.mods.is_subset_of(key_type.mask) {
                key_type.add_map_entry(entry.clone(), false, false, state);
            }
        }
        for pre in &self.dflt.preserves {
            if pre.index.is_subset_of(key_type.mask) {
                key_type.add_preserve(pre.clone(), false, false, state);
            }
        }
        for (level, name) in self.dflt.level_names.iter().enumerate() {
            if let Some(name) = name {
                if (level as u32) < key_type.num_levels {
                    key_type.add_level_name(level as u32, name.clone(), false, state);
                }
            }
        }
        self.add_key_type(key_type, state)
    }
}

impl IncludeInfo for KeyTypesInfo {
    const SECTION: FileType = FileType::Types;

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut SectionHeader {
        &mut self.header
    }

    /// Included sections start from the includer's defaults
    fn new_included(&self, _term: &IncludeTerm) -> Self {
        Self {
            dflt: self.dflt.clone(),
            ..Self::default()
        }
    }

    fn merge_contents(&mut self, from: Self, merge: MergeMode, state: &mut CompileState) {
        for mut key_type in from.types {
            if merge != MergeMode::Default {
                key_type.common.merge = merge;
            }
            if !self.add_key_type(key_type, state) {
                self.header.error_count += 1;
            }
        }
    }

    fn handle_file(&mut self, file: &XkbFile, merge: MergeMode, state: &mut CompileState) {
        self.header.name = Some(file.name.clone());
        self.header.file_id = file.id;
        self.dflt.common.file_id = file.id;

        for stmt in &file.stmts {
            let ok = match stmt {
                Stmt::Include(inc) => process_include(self, inc, state),
                Stmt::KeyType {
                    merge: stmt_merge,
                    name,
                    body,
                } => self.handle_key_type_def(name, body, stmt_merge.or(merge), state),
                Stmt::Var(def) => self.handle_var(def, state),
                Stmt::VMod {
                    merge: stmt_merge,
                    name,
                    value,
                } => handle_vmod_def(
                    &mut state.keymap.vmods,
                    name,
                    value.as_ref(),
                    stmt_merge.or(merge),
                    &mut state.diag,
                )
                .is_ok(),
                other => {
                    state
                        .diag
                        .error("Key type files may not include other declarations")
                        .action(format!("Ignoring definition of {}", other.description()));
                    false
                }
            };
            if !ok {
                self.header.error_count += 1;
            }
            if self.header.error_count > MAX_ERRORS {
                state
                    .diag
                    .error("Too many errors")
                    .action(format!("Abandoning keytypes file \"{}\"", file.name));
                break;
            }
        }
    }
}

/// Build one of the four canonical types
///
/// `KEYPAD` maps the `NumLock` virtual modifier to level 2 only when such
/// a virtual modifier is defined.
pub fn canonical_type(index: usize, vmods: &VirtualMods) -> KeyType {
    let entry = |mods: ModMask, level: u32, preserve: ModMask| KeyTypeEntry {
        mods,
        level,
        preserve,
    };
    let shift = ModMask::new(SHIFT_MASK, 0);
    let lock = ModMask::new(LOCK_MASK, 0);
    let (mods, num_levels, entries) = match index {
        0 => (ModMask::default(), 1, Vec::new()),
        1 => (shift, 2, vec![entry(shift, 1, ModMask::default())]),
        2 => (
            shift.union(lock),
            2,
            vec![
                entry(shift, 1, ModMask::default()),
                entry(lock, 0, lock),
            ],
        ),
        _ => {
            let mut entries = vec![entry(shift, 1, ModMask::default())];
            let mut mods = shift;
            if let Some(num_lock) = vmods.index("NumLock") {
                let vmod = ModMask::new(0, 1 << num_lock);
                mods = mods.union(vmod);
                entries.push(entry(vmod, 1, ModMask::default()));
            }
            (mods, 2, entries)
        }
    };
    KeyType {
        name: CANONICAL_TYPES[index.min(3)].to_string(),
        mods,
        num_levels,
        entries,
        level_names: vec![None; num_levels as usize],
    }
}

/// Compile a types section into the keymap
pub fn compile_key_types(file: &XkbFile, merge: MergeMode, state: &mut CompileState) -> bool {
    let mut info = KeyTypesInfo::new();
    info.handle_file(file, merge, state);
    if info.header.error_count > 0 {
        return false;
    }

    let mut canonical: [Option<KeyType>; 4] = Default::default();
    let mut others = Vec::new();
    for def in info.types {
        let finished = def.finish();
        match CANONICAL_TYPES.iter().position(|n| *n == finished.name) {
            Some(index) => canonical[index] = Some(finished),
            None => others.push(finished),
        }
    }

    let vmods = &state.keymap.vmods;
    let mut types: Vec<KeyType> = canonical
        .into_iter()
        .enumerate()
        .map(|(index, t)| t.unwrap_or_else(|| canonical_type(index, vmods)))
        .collect();
    types.extend(others);

    tracing::debug!(count = types.len(), "key types compiled");
    state.keymap.types_name = info.header.name;
    state.keymap.types = types;
    true
}
