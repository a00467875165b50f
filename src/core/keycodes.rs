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

//! src/core/keycodes.rs
//!
//! `xkb_keycodes` compiler
//!
//! Builds the keycode <-> key name table, key aliases, indicator names and
//! the effective keycode range.
//!
//! # Name conflicts
//! - Same name on the same code: accepted; `alternate` marks the code.
//! - Code already named: `augment` keeps the old name, everything else
//!   replaces it.
//! - Name already on another code: `override` moves it, `alternate` keeps
//!   both, anything else keeps the old binding.
//!
//! `replace` on a keycode statement behaves like `override`.

use std::collections::HashSet;

use crate::core::ast::{Expr, IncludeTerm, Stmt, VarDef, XkbFile};
use crate::core::compiler::CompileState;
use crate::core::expr::{self, resolve_lhs};
use crate::core::include::{process_include, IncludeInfo, SectionHeader};
use crate::core::keymap::{KeyAlias, KEYCODE_SLOTS};
use crate::core::merge::CommonInfo;
use crate::core::types::{
    FileType, KeyName, Keycode, MergeMode, MAX_LEGAL_KEYCODE, MIN_LEGAL_KEYCODE, NUM_INDICATORS,
};

/// Statements after which a section is abandoned
const MAX_ERRORS: u32 = 10;

/// An `indicator N = "name";` definition
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorNameInfo {
    pub common: CommonInfo,
    /// 1-based indicator index
    pub index: u32,
    pub name: String,
    pub is_virtual: bool,
}

/// An `alias <A> = <B>;` definition
#[derive(Clone, Debug, PartialEq)]
pub struct AliasInfo {
    pub common: CommonInfo,
    pub alias: KeyName,
    pub real: KeyName,
}

/// Accumulator for one keycodes section and its includes
#[derive(Clone, Debug)]
pub struct KeycodesInfo {
    pub header: SectionHeader,
    computed: Option<(Keycode, Keycode)>,
    explicit_min: Option<Keycode>,
    explicit_max: Option<Keycode>,
    effective_min: Keycode,
    effective_max: Keycode,
    names: Vec<KeyName>,
    files: Vec<u32>,
    alt_forms: Vec<bool>,
    pub leds: Vec<IndicatorNameInfo>,
    pub aliases: Vec<AliasInfo>,
}

impl Default for KeycodesInfo {
    fn default() -> Self {
        Self {
            header: SectionHeader::default(),
            computed: None,
            explicit_min: None,
            explicit_max: None,
            effective_min: MIN_LEGAL_KEYCODE,
            effective_max: MAX_LEGAL_KEYCODE,
            names: vec![KeyName::default(); KEYCODE_SLOTS],
            files: vec![0; KEYCODE_SLOTS],
            alt_forms: vec![false; KEYCODE_SLOTS],
            leds: Vec::new(),
            aliases: Vec::new(),
        }
    }
}

impl KeycodesInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name stored for a keycode, if any
    pub fn name(&self, keycode: Keycode) -> Option<KeyName> {
        self.names
            .get(keycode as usize)
            .copied()
            .filter(|n| !n.is_empty())
    }

    fn find_key(&self, name: KeyName) -> Option<Keycode> {
        (self.effective_min..=self.effective_max).find(|&kc| self.names[kc as usize] == name)
    }

    fn out_of_range(&self, keycode: i64) -> bool {
        keycode < i64::from(self.effective_min) || keycode > i64::from(self.effective_max)
    }

    fn note_out_of_range(&self, keycode: i64, name: KeyName, state: &mut CompileState) {
        let (side, limit, once) = if keycode < i64::from(self.effective_min) {
            ("below", self.effective_min, "keycodes below range")
        } else {
            ("above", self.effective_max, "keycodes above range")
        };
        if state.diag.level() > 1 && state.diag.first_time(once) {
            state.diag.info(format!(
                "Keycodes {} {} (e.g. {} = {}) are not supported and are ignored",
                side, limit, name, keycode
            ));
        }
    }

    /// Bind `name` to `keycode` following the conflict rules above
    pub fn add_key_name(
        &mut self,
        keycode: Keycode,
        name: KeyName,
        merge: MergeMode,
        file_id: u32,
        report: bool,
        state: &mut CompileState,
    ) -> bool {
        if self.out_of_range(i64::from(keycode)) {
            self.note_out_of_range(i64::from(keycode), name, state);
            return true;
        }
        self.computed = Some(match self.computed {
            Some((lo, hi)) => (lo.min(keycode), hi.max(keycode)),
            None => (keycode, keycode),
        });

        let level = state.diag.level();
        let kc = keycode as usize;
        let report = report && (level > 7 || (level > 0 && file_id == self.files[kc]));

        let old_name = self.names[kc];
        if !old_name.is_empty() {
            if old_name == name {
                if self.alt_forms[kc] || merge == MergeMode::AltForm {
                    self.alt_forms[kc] = true;
                } else if report {
                    state
                        .diag
                        .warn("Multiple identical key name definitions")
                        .action(format!(
                            "Later occurrences of \"{} = {}\" ignored",
                            name, keycode
                        ));
                }
                return true;
            }
            if merge == MergeMode::Augment {
                if report {
                    state
                        .diag
                        .warn(format!("Multiple names for keycode {}", keycode))
                        .action(format!("Using {}, ignoring {}", old_name, name));
                }
                return true;
            }
            if report {
                state
                    .diag
                    .warn(format!("Multiple names for keycode {}", keycode))
                    .action(format!("Using {}, ignoring {}", name, old_name));
            }
            self.names[kc] = KeyName::default();
            self.files[kc] = 0;
        }

        if let Some(old) = self.find_key(name).filter(|&old| old != keycode) {
            match merge {
                MergeMode::Override => {
                    self.names[old as usize] = KeyName::default();
                    self.files[old as usize] = 0;
                    self.alt_forms[old as usize] = true;
                    if report {
                        state
                            .diag
                            .warn(format!("Key name {} assigned to multiple keys", name))
                            .action(format!("Using {}, ignoring {}", keycode, old));
                    }
                }
                MergeMode::AltForm => self.alt_forms[old as usize] = true,
                _ => {
                    if report && level > 3 {
                        state
                            .diag
                            .warn(format!("Key name {} assigned to multiple keys", name))
                            .action(format!("Using {}, ignoring {}", old, keycode))
                            .action(
                                "Use 'alternate' keyword to assign the same name to multiple keys",
                            );
                    }
                    return true;
                }
            }
        }

        self.names[kc] = name;
        self.files[kc] = file_id;
        self.alt_forms[kc] = merge == MergeMode::AltForm;
        true
    }

    /// Merge an indicator name, first by name and then by index
    pub fn add_indicator_name(&mut self, new: IndicatorNameInfo, state: &mut CompileState) -> bool {
        let level = state.diag.level();
        let replace = matches!(new.common.merge, MergeMode::Replace | MergeMode::Override);
        let reportable =
            |old: &IndicatorNameInfo| (old.common.file_id == new.common.file_id && level > 0) || level > 9;

        if let Some(pos) = self.leds.iter().position(|l| l.name == new.name) {
            let old = &mut self.leds[pos];
            if reportable(old) {
                let diag = state
                    .diag
                    .warn(format!("Multiple indicators named {}", new.name));
                if old.index == new.index {
                    if old.is_virtual != new.is_virtual {
                        if replace {
                            old.is_virtual = new.is_virtual;
                        }
                        let (using, ignoring) = if old.is_virtual {
                            ("virtual", "real")
                        } else {
                            ("real", "virtual")
                        };
                        diag.action(format!("Using {} instead of {}", using, ignoring));
                    } else {
                        diag.action("Identical definitions ignored");
                    }
                    return true;
                }
                if replace {
                    diag.action(format!("Ignoring {}, using {}", old.index, new.index));
                    self.leds.remove(pos);
                } else {
                    diag.action(format!("Using {}, ignoring {}", old.index, new.index));
                }
            }
        }

        if let Some(old) = self.leds.iter_mut().find(|l| l.index == new.index) {
            if (old.common.file_id == new.common.file_id && level > 0) || level > 9 {
                let diag = state
                    .diag
                    .warn(format!("Multiple names for indicator {}", new.index));
                if old.name == new.name && old.is_virtual == new.is_virtual {
                    diag.action("Identical definitions ignored");
                } else {
                    let kind = |v: bool| if v { "virtual indicator" } else { "real indicator" };
                    let (using, ignoring) = if replace {
                        (&new.name, &old.name)
                    } else {
                        (&old.name, &new.name)
                    };
                    diag.action(format!(
                        "Using {} {}, ignoring {} {}",
                        kind(old.is_virtual),
                        using,
                        kind(new.is_virtual),
                        ignoring
                    ));
                }
            }
            if replace {
                old.name = new.name;
                old.is_virtual = new.is_virtual;
            }
            return true;
        }

        self.leds.push(new);
        true
    }

    /// Merge an alias definition by alias name
    pub fn add_alias(&mut self, new: AliasInfo, state: &mut CompileState) -> bool {
        let level = state.diag.level();
        let Some(old) = self.aliases.iter_mut().find(|a| a.alias == new.alias) else {
            self.aliases.push(new);
            return true;
        };
        let reportable = (old.common.file_id == new.common.file_id && level > 0) || level > 9;
        if old.real == new.real {
            if reportable {
                state
                    .diag
                    .warn(format!(
                        "Alias of {} for {} declared more than once",
                        new.alias, new.real
                    ))
                    .action("First definition ignored");
            }
        } else {
            let take_new = new.common.merge != MergeMode::Augment;
            if reportable {
                let (using, ignoring) = if take_new {
                    (new.real, old.real)
                } else {
                    (old.real, new.real)
                };
                state
                    .diag
                    .warn(format!("Multiple definitions for alias {}", new.alias))
                    .action(format!("Using {}, ignoring {}", using, ignoring));
            }
            if take_new {
                old.real = new.real;
            }
        }
        old.common.file_id = new.common.file_id;
        old.common.merge = new.common.merge;
        true
    }

    fn handle_keycode_def(
        &mut self,
        name: KeyName,
        value: i64,
        stmt_merge: MergeMode,
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        if self.out_of_range(value) {
            self.note_out_of_range(value, name, state);
            return true;
        }
        let merge = match stmt_merge {
            MergeMode::Default => merge,
            MergeMode::Replace => MergeMode::Override,
            other => other,
        };
        let file_id = self.header.file_id;
        self.add_key_name(value as Keycode, name, merge, file_id, true, state)
    }

    /// `minimum = 8;` / `maximum = 255;`
    fn handle_var(&mut self, def: &VarDef, state: &mut CompileState) -> bool {
        let Some(target) = def.name.as_ref() else {
            state.diag.error("Missing field name in keycodes assignment");
            return false;
        };
        let (element, field, index) = match resolve_lhs(target) {
            Ok(parts) => parts,
            Err(err) => {
                state.diag.error(err.to_string());
                return false;
            }
        };
        if let Some(element) = element {
            state
                .diag
                .error(format!("Unknown element {} encountered", element))
                .action(format!("Default for field {} ignored", field));
            return false;
        }
        let is_min = if field.eq_ignore_ascii_case("minimum") {
            true
        } else if field.eq_ignore_ascii_case("maximum") {
            false
        } else {
            state
                .diag
                .error("Unknown field encountered")
                .action(format!("Assignment to field {} ignored", field));
            return false;
        };
        if index.is_some() {
            state
                .diag
                .error(format!("The {} setting is not an array", field))
                .action("Illegal array reference ignored");
            return false;
        }

        let value = match def.value.as_ref().map(|v| expr::resolve_integer(v, None)) {
            Some(Ok(value)) => value,
            Some(Err(err)) => {
                state
                    .diag
                    .error(err.to_string())
                    .action(format!("Assignment to field {} ignored", field));
                return false;
            }
            None => {
                state
                    .diag
                    .error(format!("Missing value for {}", field))
                    .action(format!("Assignment to field {} ignored", field));
                return false;
            }
        };

        if value < i64::from(MIN_LEGAL_KEYCODE) {
            state
                .diag
                .error(format!(
                    "Illegal keycode {} (must be in the range {}-{} inclusive)",
                    value, MIN_LEGAL_KEYCODE, MAX_LEGAL_KEYCODE
                ))
                .action(format!("Value of \"{}\" not changed", field));
            return false;
        }
        if value > i64::from(MAX_LEGAL_KEYCODE) {
            state
                .diag
                .warn(format!("Unsupported maximum keycode {}, clipping.", value))
                .action(format!(
                    "X11 cannot support keycodes above {}.",
                    MAX_LEGAL_KEYCODE
                ));
            self.explicit_max = Some(MAX_LEGAL_KEYCODE);
            self.effective_max = MAX_LEGAL_KEYCODE;
            return true;
        }
        let value = value as Keycode;

        if is_min {
            if let Some(max) = self.explicit_max.filter(|&max| max < value) {
                state
                    .diag
                    .error(format!(
                        "Minimum key code ({}) must be <= maximum key code ({})",
                        value, max
                    ))
                    .action("Minimum key code value not changed");
                return false;
            }
            if let Some((lo, _)) = self.computed.filter(|&(lo, _)| lo < value) {
                state
                    .diag
                    .error(format!(
                        "Minimum key code ({}) must be <= lowest defined key ({})",
                        value, lo
                    ))
                    .action("Minimum key code value not changed");
                return false;
            }
            self.explicit_min = Some(value);
            self.effective_min = value;
        } else {
            if let Some(min) = self.explicit_min.filter(|&min| min > value) {
                state
                    .diag
                    .error(format!(
                        "Maximum code ({}) must be >= minimum key code ({})",
                        value, min
                    ))
                    .action("Maximum code value not changed");
                return false;
            }
            if let Some((_, hi)) = self.computed.filter(|&(_, hi)| hi > value) {
                state
                    .diag
                    .error(format!(
                        "Maximum code ({}) must be >= highest defined key ({})",
                        value, hi
                    ))
                    .action("Maximum code value not changed");
                return false;
            }
            self.explicit_max = Some(value);
            self.effective_max = value;
        }
        true
    }

    fn handle_indicator_name(
        &mut self,
        index: i64,
        name: &Expr,
        is_virtual: bool,
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        if index < 1 || index > NUM_INDICATORS as i64 {
            state
                .diag
                .error(format!("Name specified for illegal indicator index {}", index))
                .action("Ignored");
            return false;
        }
        let name = match expr::resolve_string(name) {
            Ok(name) => name,
            Err(_) => {
                state.diag.error(format!(
                    "The name field of indicator {} must be a string",
                    index
                ));
                return false;
            }
        };
        let info = IndicatorNameInfo {
            common: CommonInfo::new(self.header.file_id, merge),
            index: index as u32,
            name,
            is_virtual,
        };
        self.add_indicator_name(info, state)
    }

    /// Effective range written to the keymap
    pub fn key_range(&self) -> (Keycode, Keycode) {
        let min = self
            .explicit_min
            .or(self.computed.map(|(lo, _)| lo))
            .unwrap_or(MIN_LEGAL_KEYCODE);
        let max = self
            .explicit_max
            .or(self.computed.map(|(_, hi)| hi))
            .unwrap_or(MAX_LEGAL_KEYCODE);
        (min, max)
    }
}

impl IncludeInfo for KeycodesInfo {
    const SECTION: FileType = FileType::Keycodes;

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut SectionHeader {
        &mut self.header
    }

    /// `include "computed"` resets the explicit bounds
    fn include_builtin(&mut self, term: &IncludeTerm, _state: &mut CompileState) -> bool {
        if term.file.as_deref() != Some("computed") {
            return false;
        }
        self.explicit_min = Some(MIN_LEGAL_KEYCODE);
        self.explicit_max = Some(MAX_LEGAL_KEYCODE);
        self.effective_min = MIN_LEGAL_KEYCODE;
        self.effective_max = MAX_LEGAL_KEYCODE;
        true
    }

    fn merge_contents(&mut self, from: Self, merge: MergeMode, state: &mut CompileState) {
        if let Some((lo, hi)) = from.computed {
            for kc in lo..=hi {
                let name = from.names[kc as usize];
                if name.is_empty() {
                    continue;
                }
                let this_merge = if from.alt_forms[kc as usize] {
                    MergeMode::AltForm
                } else {
                    merge
                };
                if !self.add_key_name(kc, name, this_merge, from.header.file_id, false, state) {
                    self.header.error_count += 1;
                }
            }
        }
        for mut led in from.leds {
            if merge != MergeMode::Default {
                led.common.merge = merge;
            }
            if !self.add_indicator_name(led, state) {
                self.header.error_count += 1;
            }
        }
        for mut alias in from.aliases {
            if merge != MergeMode::Default {
                alias.common.merge = merge;
            }
            if !self.add_alias(alias, state) {
                self.header.error_count += 1;
            }
        }
        if let Some(min) = from.explicit_min {
            if self.explicit_min.is_none_or(|own| own > min) {
                self.explicit_min = Some(min);
                self.effective_min = min;
            }
        }
        if let Some(max) = from.explicit_max {
            if self.explicit_max.is_none_or(|own| own < max) {
                self.explicit_max = Some(max);
                self.effective_max = max;
            }
        }
    }

    fn handle_file(&mut self, file: &XkbFile, merge: MergeMode, state: &mut CompileState) {
        self.header.name = Some(file.name.clone());
        self.header.file_id = file.id;

        for stmt in &file.stmts {
            let ok = match stmt {
                Stmt::Include(inc) => process_include(self, inc, state),
                Stmt::Keycode {
                    merge: stmt_merge,
                    name,
                    value,
                } => self.handle_keycode_def(*name, *value, *stmt_merge, merge, state),
                Stmt::KeyAlias {
                    merge: stmt_merge,
                    alias,
                    real,
                } => {
                    let info = AliasInfo {
                        common: CommonInfo::new(self.header.file_id, stmt_merge.or(merge)),
                        alias: *alias,
                        real: *real,
                    };
                    self.add_alias(info, state)
                }
                Stmt::Var(def) => self.handle_var(def, state),
                Stmt::IndicatorName {
                    merge: stmt_merge,
                    index,
                    name,
                    is_virtual,
                } => self.handle_indicator_name(*index, name, *is_virtual, stmt_merge.or(merge), state),
                other => {
                    state
                        .diag
                        .error("Keycode files may define key and indicator names only")
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
                    .action(format!("Abandoning keycodes file \"{}\"", file.name));
                break;
            }
        }
    }
}

/// Resolve every alias to a real key name, following alias chains
///
/// Aliases to missing keys, aliases shadowing a real key and alias cycles
/// are dropped with a warning.
fn apply_aliases(aliases: &[AliasInfo], state: &mut CompileState) -> Vec<KeyAlias> {
    let level = state.diag.level();
    let keymap = &state.keymap;
    let mut resolved = Vec::with_capacity(aliases.len());

    for alias in aliases {
        if keymap.find_key(alias.alias, false, 0).is_some() {
            if level > 4 {
                state
                    .diag
                    .warn("Attempt to create alias with the name of a real key")
                    .action(format!(
                        "Alias \"{} = {}\" ignored",
                        alias.alias, alias.real
                    ));
            }
            continue;
        }

        let mut seen = HashSet::from([alias.alias]);
        let mut real = alias.real;
        let mut cyclic = false;
        while keymap.find_key(real, false, 0).is_none() {
            let Some(next) = aliases.iter().find(|a| a.alias == real) else {
                break;
            };
            if !seen.insert(real) {
                cyclic = true;
                break;
            }
            real = next.real;
        }
        if cyclic || real == alias.alias {
            state
                .diag
                .warn(format!("Alias {} is part of an alias cycle", alias.alias))
                .action("Ignored");
            continue;
        }
        if keymap.find_key(real, false, 0).is_none() {
            if level > 4 {
                state
                    .diag
                    .warn(format!(
                        "Attempt to alias {} to non-existent key {}",
                        alias.alias, alias.real
                    ))
                    .action("Ignored");
            }
            continue;
        }
        resolved.push(KeyAlias {
            alias: alias.alias,
            real,
        });
    }
    resolved
}

/// Compile a keycodes section into the keymap
///
/// # Returns
/// `true` when the section compiled without errors
pub fn compile_keycodes(file: &XkbFile, merge: MergeMode, state: &mut CompileState) -> bool {
    let mut info = KeycodesInfo::new();
    info.handle_file(file, merge, state);
    if info.header.error_count > 0 {
        return false;
    }

    let (min, max) = info.key_range();
    let keymap = &mut state.keymap;
    keymap.min_key_code = min;
    keymap.max_key_code = max;
    keymap.keycodes_name = info.header.name.clone();
    if let Some((lo, hi)) = info.computed {
        for kc in lo..=hi {
            keymap.key_names[kc as usize] = info.names[kc as usize];
        }
    }
    tracing::debug!(min, max, "key range");

    for led in &info.leds {
        let slot = (led.index - 1) as usize;
        keymap.indicator_names[slot] = Some(led.name.clone());
        let bit = 1u32 << slot;
        if led.is_virtual {
            keymap.phys_indicators &= !bit;
        } else {
            keymap.phys_indicators |= bit;
        }
    }

    let aliases = apply_aliases(&info.aliases, state);
    state.keymap.key_aliases = aliases;
    true
}
