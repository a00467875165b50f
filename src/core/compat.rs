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

//! src/core/compat.rs
//!
//! `xkb_compatibility` compiler
//!
//! Produces the symbol interpretations, the per-group compatibility masks
//! and the indicator maps of a keymap.
//!
//! # Interpretations
//! Keyed by `(keysym, predicate, mods)`. A `replace` definition swaps the
//! whole entry, otherwise fields merge one by one. The compiled list puts
//! interpretations with a keysym before the ones matching any keysym, and
//! within each half orders them `Exactly`, `AllOf`/`NoneOf`, `AnyOf`,
//! `AnyOfOrNone`.
//!
//! The default merge mode of a compat section is `augment`.

use crate::core::action::{ActionContext, ActionDefaults};
use crate::core::ast::{Expr, Stmt, VarDef, XkbFile};
use crate::core::compiler::CompileState;
use crate::core::expr::{self, resolve_lhs};
use crate::core::include::{process_include, IncludeInfo, SectionHeader};
use crate::core::indicators::{
    add_indicator_map, copy_indicator_maps, handle_indicator_map_def, LedInfo,
};
use crate::core::keymap::{Predicate, SymInterpret};
use crate::core::keysym::{keysym_name, lookup_keysym};
use crate::core::merge::{should_report, Collisions, CommonInfo};
use crate::core::types::{
    real_mods_text, FileType, MergeMode, ModMask, ALL_REAL_MODS, NO_SYMBOL, NUM_KBD_GROUPS,
};
use crate::core::vmod::{handle_vmod_def, resolve_virtual_modifier, resolve_vmodmask};

const MAX_ERRORS: u32 = 10;

/// Field bits of [`SymInterpInfo::common`]
pub mod fields {
    pub const VIRTUAL_MOD: u32 = 1 << 0;
    pub const ACTION: u32 = 1 << 1;
    pub const AUTO_REPEAT: u32 = 1 << 2;
    pub const LOCKING: u32 = 1 << 3;
    pub const LEVEL_ONE_ONLY: u32 = 1 << 4;
}

const USE_MOD_MAP_VALUES: &[(&str, u32)] = &[
    ("levelone", 1),
    ("level1", 1),
    ("anylevel", 0),
    ("any", 0),
];

/// Output order of predicates inside each half of the list
const PREDICATE_ORDER: [&[Predicate]; 4] = [
    &[Predicate::Exactly],
    &[Predicate::AllOf, Predicate::NoneOf],
    &[Predicate::AnyOf],
    &[Predicate::AnyOfOrNone],
];

/// Working record for one interpretation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymInterpInfo {
    pub common: CommonInfo,
    pub interp: SymInterpret,
}

impl SymInterpInfo {
    fn matches(&self, other: &SymInterpInfo) -> bool {
        self.interp.sym == other.interp.sym
            && self.interp.predicate == other.interp.predicate
            && self.interp.mods == other.interp.mods
    }

    /// `Alt_L+AnyOf(all)` style label for diagnostics
    pub fn text(&self) -> String {
        let sym = if self.interp.sym == NO_SYMBOL {
            "Any".to_string()
        } else {
            keysym_name(self.interp.sym)
        };
        format!(
            "{}+{}({})",
            sym,
            self.interp.predicate.name(),
            real_mods_text(self.interp.mods)
        )
    }
}

/// Compatibility mask of one group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupCompatInfo {
    pub file_id: u32,
    pub merge: MergeMode,
    pub defined: bool,
    pub mods: ModMask,
}

/// Accumulator for one compat section and its includes
#[derive(Clone, Debug, PartialEq)]
pub struct CompatInfo {
    pub header: SectionHeader,
    pub interps: Vec<SymInterpInfo>,
    /// Target of `interpret.field = ...`
    pub dflt: SymInterpInfo,
    /// Target of `indicator.field = ...`
    pub led_dflt: LedInfo,
    pub group_compat: [GroupCompatInfo; NUM_KBD_GROUPS],
    pub leds: Vec<LedInfo>,
    pub actions: ActionDefaults,
}

impl Default for CompatInfo {
    fn default() -> Self {
        let mut dflt = SymInterpInfo::default();
        dflt.common.merge = MergeMode::Override;
        let mut led_dflt = LedInfo::default();
        led_dflt.common.merge = MergeMode::Override;
        Self {
            header: SectionHeader::default(),
            interps: Vec::new(),
            dflt,
            led_dflt,
            group_compat: [GroupCompatInfo::default(); NUM_KBD_GROUPS],
            leds: Vec::new(),
            actions: ActionDefaults::new(),
        }
    }
}

impl CompatInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interpretation, merging with an existing one for the same key
    pub fn add_interp(&mut self, new: SymInterpInfo, state: &mut CompileState) -> bool {
        let level = state.diag.level();
        let Some(old) = self.interps.iter_mut().find(|i| i.matches(&new)) else {
            self.interps.push(new);
            return true;
        };

        if new.common.merge == MergeMode::Replace {
            if should_report(old.common.file_id, new.common.file_id, level) {
                state
                    .diag
                    .warn(format!("Multiple definitions for \"{}\"", new.text()))
                    .action("Earlier interpretation ignored");
            }
            *old = new;
            return true;
        }

        let mut collisions = Collisions::default();
        if collisions.check(fields::VIRTUAL_MOD, &old.common, &new.common, level) {
            old.interp.virtual_mod = new.interp.virtual_mod;
            old.common.set_defined(fields::VIRTUAL_MOD);
        }
        if collisions.check(fields::ACTION, &old.common, &new.common, level) {
            old.interp.action = new.interp.action;
            old.common.set_defined(fields::ACTION);
        }
        if collisions.check(fields::AUTO_REPEAT, &old.common, &new.common, level) {
            old.interp.auto_repeat = new.interp.auto_repeat;
            old.common.set_defined(fields::AUTO_REPEAT);
        }
        if collisions.check(fields::LOCKING, &old.common, &new.common, level) {
            old.interp.locking = new.interp.locking;
            old.common.set_defined(fields::LOCKING);
        }
        if collisions.check(fields::LEVEL_ONE_ONLY, &old.common, &new.common, level) {
            old.interp.level_one_only = new.interp.level_one_only;
            old.common.set_defined(fields::LEVEL_ONE_ONLY);
        }
        if collisions.any() && level > 0 {
            let which = if new.common.merge == MergeMode::Augment {
                "first"
            } else {
                "last"
            };
            state
                .diag
                .warn(format!("Multiple interpretations of \"{}\"", new.text()))
                .action(format!("Using {} definition for duplicate fields", which));
        }
        true
    }

    /// Set the compatibility mask of a 0-based group
    pub fn add_group_compat(&mut self, group: usize, new: GroupCompatInfo, state: &mut CompileState) -> bool {
        let level = state.diag.level();
        let gc = &mut self.group_compat[group];
        if gc.mods == new.mods {
            return true;
        }
        if (gc.defined && gc.file_id == new.file_id && level > 0) || level > 9 {
            let which = if new.merge == MergeMode::Augment {
                "old"
            } else {
                "new"
            };
            state
                .diag
                .warn(format!("Compat map for group {} redefined", group + 1))
                .action(format!("Using {} definition", which));
        }
        if new.defined && (new.merge != MergeMode::Augment || !gc.defined) {
            *gc = new;
        }
        true
    }

    /// Apply one interpretation field to `si`
    fn set_interp_field(
        si: &mut SymInterpInfo,
        actions: &ActionDefaults,
        field: &str,
        index: Option<&Expr>,
        value: &Expr,
        state: &mut CompileState,
    ) -> bool {
        let label = si.text();
        let lower = field.to_ascii_lowercase();
        let known = matches!(
            lower.as_str(),
            "action" | "virtualmodifier" | "virtualmod" | "repeat" | "locking" | "usemodmap"
                | "usemodmapmods"
        );
        if !known {
            state
                .diag
                .error(format!(
                    "Unknown field {} in a symbol interpretation",
                    field
                ))
                .action(format!("Definition of {} ignored", label));
            return false;
        }
        if index.is_some() {
            state
                .diag
                .error(format!(
                    "The {} field of symbol interpretation {} is not an array",
                    field, label
                ))
                .action("Illegal array reference ignored");
            return false;
        }

        let bad_type = |state: &mut CompileState, wanted: &str| {
            state.diag.error(format!(
                "The {} field of symbol interpretation {} must be a {}",
                field, label, wanted
            ));
            false
        };

        match lower.as_str() {
            "action" => {
                let ctx = ActionContext::new(&state.keymap);
                match actions.resolve(value, &ctx) {
                    Ok(action) => {
                        si.interp.action = action;
                        si.common.set_defined(fields::ACTION);
                    }
                    Err(err) => {
                        state.diag.error(err.to_string());
                        return false;
                    }
                }
            }
            "virtualmodifier" | "virtualmod" => {
                match resolve_virtual_modifier(value, &state.keymap.vmods) {
                    Ok(vmod) => {
                        si.interp.virtual_mod = Some(vmod);
                        si.common.set_defined(fields::VIRTUAL_MOD);
                    }
                    Err(_) => return bad_type(state, "virtual modifier"),
                }
            }
            "repeat" => match expr::resolve_boolean(value, None) {
                Ok(repeat) => {
                    si.interp.auto_repeat = repeat;
                    si.common.set_defined(fields::AUTO_REPEAT);
                }
                Err(_) => return bad_type(state, "boolean"),
            },
            "locking" => match expr::resolve_boolean(value, None) {
                Ok(locking) => {
                    si.interp.locking = locking;
                    si.common.set_defined(fields::LOCKING);
                }
                Err(_) => return bad_type(state, "boolean"),
            },
            _ => match expr::resolve_enum(value, USE_MOD_MAP_VALUES) {
                Ok(level_one) => {
                    si.interp.level_one_only = level_one != 0;
                    si.common.set_defined(fields::LEVEL_ONE_ONLY);
                }
                Err(_) => return bad_type(state, "level specification"),
            },
        }
        true
    }

    /// `interpret.x`, `indicator.x` or `<action>.x` at file scope
    fn handle_var(&mut self, def: &VarDef, state: &mut CompileState) -> bool {
        let Some(target) = def.name.as_ref() else {
            state.diag.error("Missing field name in compatibility map assignment");
            return false;
        };
        let (element, field, index) = match resolve_lhs(target) {
            Ok(parts) => parts,
            Err(err) => {
                state.diag.error(err.to_string());
                return false;
            }
        };
        let value = def.value.clone().unwrap_or(Expr::Boolean(true));
        match element {
            Some(element) if element.eq_ignore_ascii_case("interpret") => {
                let mut dflt = std::mem::take(&mut self.dflt);
                let ok = Self::set_interp_field(&mut dflt, &self.actions, field, index, &value, state);
                self.dflt = dflt;
                ok
            }
            Some(element) if element.eq_ignore_ascii_case("indicator") => {
                self.led_dflt.set_field(field, index, &value, state)
            }
            Some(element) => match self.actions.set_field(element, field, index, &value) {
                Ok(()) => true,
                Err(err) => {
                    state.diag.error(err.to_string());
                    false
                }
            },
            None => {
                state
                    .diag
                    .error(format!("Default defined for unknown field {}", field))
                    .action("Ignored");
                false
            }
        }
    }

    fn handle_interp_def(
        &mut self,
        sym: &str,
        predicate: Option<&Expr>,
        body: &[VarDef],
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        let Some((predicate, mods)) = resolve_state_and_predicate(predicate, state) else {
            state
                .diag
                .error("Couldn't determine matching modifiers")
                .action("Symbol interpretation ignored");
            return true;
        };
        let Some(sym) = lookup_keysym(sym) else {
            state
                .diag
                .error(format!("Couldn't lookup keysym {}", sym))
                .action("Symbol interpretation ignored");
            return true;
        };

        let mut si = self.dflt.clone();
        si.common.merge = merge;
        si.common.file_id = self.header.file_id;
        si.interp.sym = sym;
        si.interp.predicate = predicate;
        si.interp.mods = mods;

        let mut ok = true;
        for def in body {
            if let Some(Expr::FieldRef { .. }) = def.name {
                ok = self.handle_var(def, state) && ok;
                continue;
            }
            let Some(target) = def.name.as_ref() else {
                state.diag.error(format!(
                    "Unnamed value in symbol interpretation {}",
                    si.text()
                ));
                ok = false;
                continue;
            };
            match resolve_lhs(target) {
                Ok((_, field, index)) => {
                    let value = def.value.clone().unwrap_or(Expr::Boolean(true));
                    ok = Self::set_interp_field(&mut si, &self.actions, field, index, &value, state)
                        && ok;
                }
                Err(err) => {
                    state.diag.error(err.to_string());
                    ok = false;
                }
            }
        }
        if !ok {
            return false;
        }
        self.add_interp(si, state)
    }

    fn handle_group_compat_def(
        &mut self,
        group: i64,
        value: &Expr,
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        if group < 1 || group > NUM_KBD_GROUPS as i64 {
            state
                .diag
                .error(format!(
                    "Keyboard group must be in the range 1..{}",
                    NUM_KBD_GROUPS
                ))
                .action(format!("Compatibility map for illegal group {} ignored", group));
            return false;
        }
        let mods = match resolve_vmodmask(value, &state.keymap.vmods) {
            Ok(mods) => mods,
            Err(_) => {
                state
                    .diag
                    .error("Expected a modifier mask in group compatibility definition")
                    .action(format!(
                        "Ignoring illegal compatibility map for group {}",
                        group
                    ));
                return false;
            }
        };
        let new = GroupCompatInfo {
            file_id: self.header.file_id,
            merge,
            defined: true,
            mods,
        };
        self.add_group_compat((group - 1) as usize, new, state)
    }

    /// Interpretations in output order
    pub fn ordered_interprets(&self) -> Vec<SymInterpret> {
        let mut out = Vec::with_capacity(self.interps.len());
        for need_symbol in [true, false] {
            for predicates in PREDICATE_ORDER {
                out.extend(
                    self.interps
                        .iter()
                        .filter(|si| (si.interp.sym != NO_SYMBOL) == need_symbol)
                        .filter(|si| predicates.contains(&si.interp.predicate))
                        .map(|si| si.interp.clone()),
                );
            }
        }
        out
    }
}

/// Interpret the `Sym + Predicate(mods)` part of an `interpret` statement
///
/// No predicate means `AnyOfOrNone(all)`, a bare `any` means `AnyOf(all)`
/// and a plain mask means `Exactly(mask)`.
fn resolve_state_and_predicate(
    expr: Option<&Expr>,
    state: &mut CompileState,
) -> Option<(Predicate, u8)> {
    let Some(expr) = expr else {
        return Some((Predicate::AnyOfOrNone, ALL_REAL_MODS));
    };
    let (predicate, mask_expr) = match expr {
        Expr::Action { name, args } => {
            let Some(predicate) = expr::resolve_enum(&Expr::Ident(name.clone()), Predicate::NAMES)
                .ok()
                .and_then(Predicate::from_index)
            else {
                state
                    .diag
                    .error(format!("Illegal modifier predicate \"{}\"", name))
                    .action("Ignored");
                return None;
            };
            (predicate, args.first()?)
        }
        Expr::Ident(name) if name.eq_ignore_ascii_case("any") => {
            return Some((Predicate::AnyOf, ALL_REAL_MODS));
        }
        other => (Predicate::Exactly, other),
    };
    expr::resolve_modmask(mask_expr)
        .ok()
        .map(|mask| (predicate, mask.real_mods))
}

impl IncludeInfo for CompatInfo {
    const SECTION: FileType = FileType::Compat;

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut SectionHeader {
        &mut self.header
    }

    fn merge_contents(&mut self, from: Self, merge: MergeMode, state: &mut CompileState) {
        for mut si in from.interps {
            if merge != MergeMode::Default {
                si.common.merge = merge;
            }
            if !self.add_interp(si, state) {
                self.header.error_count += 1;
            }
        }
        for (group, mut gc) in from.group_compat.into_iter().enumerate() {
            if merge != MergeMode::Default {
                gc.merge = merge;
            }
            if !self.add_group_compat(group, gc, state) {
                self.header.error_count += 1;
            }
        }
        for mut led in from.leds {
            if merge != MergeMode::Default {
                led.common.merge = merge;
            }
            add_indicator_map(&mut self.leds, led, state);
        }
    }

    fn handle_file(&mut self, file: &XkbFile, merge: MergeMode, state: &mut CompileState) {
        let merge = match merge {
            MergeMode::Default => MergeMode::Augment,
            other => other,
        };
        self.header.name = Some(file.name.clone());
        self.header.file_id = file.id;

        for stmt in &file.stmts {
            let ok = match stmt {
                Stmt::Include(inc) => process_include(self, inc, state),
                Stmt::Interp {
                    merge: stmt_merge,
                    sym,
                    predicate,
                    body,
                } => self.handle_interp_def(sym, predicate.as_ref(), body, stmt_merge.or(merge), state),
                Stmt::GroupCompat {
                    merge: stmt_merge,
                    group,
                    value,
                } => self.handle_group_compat_def(*group, value, stmt_merge.or(merge), state),
                Stmt::IndicatorMap {
                    merge: stmt_merge,
                    name,
                    body,
                } => {
                    let mut dflt = self.led_dflt.clone();
                    dflt.common.file_id = self.header.file_id;
                    match handle_indicator_map_def(name, body, &dflt, stmt_merge.or(merge), state) {
                        Some(led) => {
                            add_indicator_map(&mut self.leds, led, state);
                            true
                        }
                        None => false,
                    }
                }
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
                        .error("Interpretation files may not include other types")
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
                    .action(format!("Abandoning compatibility map \"{}\"", file.name));
                break;
            }
        }
    }
}

/// Compile a compat section into the keymap
///
/// # Returns
/// `None` on failure, otherwise the indicator maps still waiting for an
/// LED (see [`crate::core::indicators::bind_indicators`])
pub fn compile_compat(file: &XkbFile, merge: MergeMode, state: &mut CompileState) -> Option<Vec<LedInfo>> {
    let mut info = CompatInfo::new();
    info.dflt.common.merge = merge;
    info.led_dflt.common.merge = merge;
    info.handle_file(file, merge, state);
    if info.header.error_count > 0 {
        return None;
    }

    state.keymap.compat_name = info.header.name.clone();
    state.keymap.interprets = info.ordered_interprets();
    for (slot, gc) in info.group_compat.iter().enumerate() {
        if gc.defined || !gc.mods.is_empty() {
            state.keymap.group_compat[slot] = gc.mods;
        }
    }
    tracing::debug!(
        interprets = state.keymap.interprets.len(),
        leds = info.leds.len(),
        "compatibility map compiled"
    );
    Some(copy_indicator_maps(info.leds, state))
}
