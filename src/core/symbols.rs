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

//! src/core/symbols.rs
//!
//! `xkb_symbols` compiler
//!
//! # Architecture
//! Key definitions are collected as [`KeyInfo`] records, one per key name,
//! merged group by group as definitions and includes arrive. Once the
//! whole section is read each record is normalised ([`KeyInfo::prepare`])
//! and copied onto every keycode carrying its name.
//!
//! ```text
//! key <AE01> { [ 1, exclam ] };      KeyInfo { groups[0] = [1, exclam] }
//!        │                                   │ merge_keys (per group)
//!        ▼                                   ▼
//!   symbols[Group2] = [...]           prepare: fill gaps, collapse
//!                                            │ copy_to_keycode
//!                                            ▼
//!                                     Keymap::keys[kc]
//! ```
//!
//! # Merging
//! - Per group, the wider side sets the width unless the incoming side
//!   clobbers and names a type. `NoSymbol` loses to any real symbol; a
//!   real clash goes to the clobbering side.
//! - Per key, `replace` swaps the whole record. Everything else merges
//!   group by group, scalar fields through the merge-policy engine.

use crate::core::action::{Action, ActionContext, ActionDefaults};
use crate::core::ast::{Expr, IncludeTerm, Stmt, VarDef, XkbFile};
use crate::core::compiler::CompileState;
use crate::core::expr::{self, resolve_lhs, RadioLookup, SimpleLookup, GROUP_NAMES};
use crate::core::include::{process_include, IncludeInfo, SectionHeader};
use crate::core::keymap::{Behavior, BehaviorKind, GroupsRange, Key, KeyGroup};
use crate::core::keysym::{is_keypad, is_lower, is_upper, keysym_name, lookup_keysym};
use crate::core::keytypes::{ALPHABETIC, KEYPAD, ONE_LEVEL, TWO_LEVEL};
use crate::core::merge::{Collisions, CommonInfo};
use crate::core::types::{
    explicit, real_mod_index, FileType, KeyName, Keycode, Keysym, MergeMode, REAL_MOD_NAMES,
    MAX_RADIO_GROUPS, NO_SYMBOL, NUM_KBD_GROUPS,
};
use crate::core::vmod::{handle_vmod_def, resolve_vmodmask};

const MAX_ERRORS: u32 = 10;

/// Position of `TWO_LEVEL` among the canonical types
const TWO_LEVEL_INDEX: usize = 1;

/// Field bits of [`KeyInfo::common`]
pub mod fields {
    pub const SYMS: u32 = 1 << 0;
    pub const ACTS: u32 = 1 << 1;
    pub const REPEAT: u32 = 1 << 2;
    pub const BEHAVIOR: u32 = 1 << 3;
    pub const TYPE_DFLT: u32 = 1 << 4;
    pub const TYPES: u32 = 1 << 5;
    pub const GROUP_INFO: u32 = 1 << 6;
    pub const VMODMAP: u32 = 1 << 7;
}

const LOCKING_VALUES: &[(&str, u32)] = &[
    ("true", 1),
    ("yes", 1),
    ("on", 1),
    ("false", 0),
    ("no", 0),
    ("off", 0),
    ("permanent", 2),
];

const REPEAT_YES: u32 = 1;
const REPEAT_NO: u32 = 0;
const REPEAT_DEFAULT: u32 = 2;

const REPEAT_VALUES: &[(&str, u32)] = &[
    ("true", REPEAT_YES),
    ("yes", REPEAT_YES),
    ("on", REPEAT_YES),
    ("false", REPEAT_NO),
    ("no", REPEAT_NO),
    ("off", REPEAT_NO),
    ("default", REPEAT_DEFAULT),
];

const RADIO_GROUP_VALUES: &[(&str, u32)] = &[("none", 0)];

/// Radio-group bits covered by an `allowNone` without index
const ALL_RADIO_GROUPS: u32 = u32::MAX;

/// Symbols and actions of one group while the section is compiled
///
/// `syms` and `actions` are `None` until something is assigned; when
/// present their length equals `num_levels`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupInfo {
    pub num_levels: usize,
    pub syms: Option<Vec<Keysym>>,
    pub actions: Option<Vec<Action>>,
    pub type_name: Option<String>,
}

impl GroupInfo {
    fn sym(&self, level: usize) -> Keysym {
        self.syms
            .as_ref()
            .and_then(|syms| syms.get(level).copied())
            .unwrap_or(NO_SYMBOL)
    }

    fn action(&self, level: usize) -> Option<Action> {
        self.actions.as_ref().and_then(|acts| acts.get(level).copied())
    }

    /// Grow the group to at least `levels` levels
    fn resize(&mut self, levels: usize, force_actions: bool) {
        let too_small = self.num_levels < levels;
        let width = self.num_levels.max(levels);
        if self.syms.is_none() || too_small {
            self.syms
                .get_or_insert_with(Vec::new)
                .resize(width, NO_SYMBOL);
        }
        if (force_actions && (too_small || self.actions.is_none()))
            || (too_small && self.actions.is_some())
        {
            self.actions
                .get_or_insert_with(Vec::new)
                .resize(width, Action::None);
        }
        self.num_levels = width;
    }

    /// Cut the group down to `levels` levels
    fn truncate(&mut self, levels: usize) {
        self.num_levels = levels;
        if let Some(syms) = self.syms.as_mut() {
            syms.truncate(levels);
        }
        if let Some(actions) = self.actions.as_mut() {
            actions.truncate(levels);
        }
    }
}

/// Working record for one key
#[derive(Clone, Debug, PartialEq)]
pub struct KeyInfo {
    pub common: CommonInfo,
    pub name: KeyName,
    pub groups: [GroupInfo; NUM_KBD_GROUPS],
    /// Per-group bits
    pub syms_defined: u8,
    pub acts_defined: u8,
    pub types_defined: u8,
    pub dflt_type: Option<String>,
    /// `None` leaves the keymap's per-key repeat untouched
    pub repeat: Option<bool>,
    pub behavior: Behavior,
    /// Target of an overlay behavior, resolved when the key is copied
    pub overlay_key: Option<KeyName>,
    /// Radio groups (bit per group) in which no key may be down
    pub allow_none: u32,
    pub vmodmap: u16,
    pub groups_range: GroupsRange,
}

impl Default for KeyInfo {
    fn default() -> Self {
        Self {
            common: CommonInfo::new(0, MergeMode::Override),
            name: KeyName::new("*"),
            groups: Default::default(),
            syms_defined: 0,
            acts_defined: 0,
            types_defined: 0,
            dflt_type: None,
            repeat: None,
            behavior: Behavior::default(),
            overlay_key: None,
            allow_none: 0,
            vmodmap: 0,
            groups_range: GroupsRange::Wrap,
        }
    }
}

/// Which per-group list a `GroupN` index refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    Symbols,
    Actions,
}

impl ListKind {
    fn name(self) -> &'static str {
        match self {
            ListKind::Symbols => "symbols",
            ListKind::Actions => "actions",
        }
    }
}

/// `Group1` .. `Group4` or a plain 1-based number
fn resolve_group(expr: &Expr) -> Option<i64> {
    expr::resolve_integer(expr, Some(&SimpleLookup(GROUP_NAMES))).ok()
}

fn resolve_flag_enum(value: &Expr, table: &[(&str, u32)]) -> Option<u32> {
    match value {
        Expr::Boolean(true) => Some(1),
        Expr::Boolean(false) => Some(0),
        other => expr::resolve_enum(other, table).ok(),
    }
}

impl KeyInfo {
    fn defined_groups(&self) -> u8 {
        self.syms_defined | self.acts_defined | self.types_defined
    }

    /// 0-based group a `symbols[...]` or `actions[...]` assignment targets
    ///
    /// Without an index the first group without that list is used.
    fn group_index(&self, index: Option<&Expr>, what: ListKind, state: &mut CompileState) -> Option<usize> {
        let Some(index) = index else {
            let defined = match what {
                ListKind::Symbols => self.syms_defined,
                ListKind::Actions => self.acts_defined,
            };
            if let Some(free) = (0..NUM_KBD_GROUPS).find(|g| defined & (1 << g) == 0) {
                return Some(free);
            }
            state
                .diag
                .error(format!(
                    "Too many groups of {} for key {} (max {})",
                    what.name(),
                    self.name,
                    NUM_KBD_GROUPS
                ))
                .action(format!("Ignoring {} defined for extra groups", what.name()));
            return None;
        };
        let Some(group) = resolve_group(index) else {
            state
                .diag
                .error(format!(
                    "Illegal group index for {} of key {}",
                    what.name(),
                    self.name
                ))
                .action("Definition with non-integer array index ignored");
            return None;
        };
        if group < 1 || group > NUM_KBD_GROUPS as i64 {
            state
                .diag
                .error(format!(
                    "Group index for {} of key {} is out of range (1..{})",
                    what.name(),
                    self.name,
                    NUM_KBD_GROUPS
                ))
                .action(format!("Ignoring {} for group {}", what.name(), group));
            return None;
        }
        Some((group - 1) as usize)
    }

    fn add_symbols(&mut self, index: Option<&Expr>, value: Option<&Expr>, state: &mut CompileState) -> bool {
        let Some(group) = self.group_index(index, ListKind::Symbols, state) else {
            return false;
        };
        let Some(value) = value else {
            self.syms_defined |= 1 << group;
            return true;
        };
        let Expr::KeysymList(names) = value else {
            state
                .diag
                .error(format!("Expected a list of symbols, found {}", value.kind_name()))
                .action(format!(
                    "Ignoring symbols for group {} of {}",
                    group + 1,
                    self.name
                ));
            return false;
        };
        if self.groups[group].syms.is_some() {
            state.diag.error(format!(
                "Symbols for key {}, group {} already defined",
                self.name,
                group + 1
            ));
            return false;
        }

        let level = state.diag.level();
        let info = &mut self.groups[group];
        info.resize(names.len(), false);
        self.syms_defined |= 1 << group;
        let resolved: Vec<Keysym> = names
            .iter()
            .map(|name| {
                lookup_keysym(name).unwrap_or_else(|| {
                    if level > 0 {
                        state.diag.warn(format!("Could not resolve keysym {}", name));
                    }
                    NO_SYMBOL
                })
            })
            .collect();
        if let Some(syms) = info.syms.as_mut() {
            syms[..resolved.len()].copy_from_slice(&resolved);
        }
        let mut levels = info.num_levels;
        while levels > 0 && info.sym(levels - 1) == NO_SYMBOL {
            levels -= 1;
        }
        info.truncate(levels);
        true
    }

    fn add_actions(
        &mut self,
        index: Option<&Expr>,
        value: Option<&Expr>,
        actions: &ActionDefaults,
        state: &mut CompileState,
    ) -> bool {
        let Some(group) = self.group_index(index, ListKind::Actions, state) else {
            return false;
        };
        let Some(value) = value else {
            self.acts_defined |= 1 << group;
            return true;
        };
        let Expr::ActionList(list) = value else {
            state
                .diag
                .error(format!("Bad expression type ({}) for action list value", value.kind_name()))
                .action(format!(
                    "Ignoring actions for group {} of {}",
                    group + 1,
                    self.name
                ));
            return false;
        };
        if self.groups[group].actions.is_some() {
            state.diag.error(format!(
                "Actions for key {}, group {} already defined",
                self.name,
                group + 1
            ));
            return false;
        }
        if list.is_empty() {
            state.diag.error(format!(
                "Empty action list for group {} of key {}",
                group + 1,
                self.name
            ));
            return false;
        }

        let mut resolved = Vec::with_capacity(list.len());
        for (level, expr) in list.iter().enumerate() {
            let ctx = ActionContext::new(&state.keymap);
            match actions.resolve(expr, &ctx) {
                Ok(action) => resolved.push(action),
                Err(err) => {
                    tracing::debug!(key = %self.name, error = %err, "action rejected");
                    state
                        .diag
                        .error(format!("Illegal action definition for {}: {}", self.name, err))
                        .action(format!(
                            "Action for group {}/level {} ignored",
                            group + 1,
                            level + 1
                        ));
                    resolved.push(Action::None);
                }
            }
        }

        let info = &mut self.groups[group];
        info.resize(resolved.len(), true);
        if let Some(acts) = info.actions.as_mut() {
            acts[..resolved.len()].copy_from_slice(&resolved);
        }
        self.acts_defined |= 1 << group;
        true
    }

    fn set_allow_none(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        let groups = match index {
            None => ALL_RADIO_GROUPS,
            Some(index) => {
                let Ok(group) = expr::resolve_integer(index, Some(&RadioLookup)) else {
                    state
                        .diag
                        .error("Illegal index in allow none definition")
                        .action("Definition with non-integer array index ignored");
                    return false;
                };
                if group < 1 || group > MAX_RADIO_GROUPS as i64 {
                    state
                        .diag
                        .error(format!(
                            "Illegal radio group specified (must be 1..{})",
                            MAX_RADIO_GROUPS
                        ))
                        .action(format!("Value of \"allow none\" for group {} ignored", group));
                    return false;
                }
                1u32 << (group - 1)
            }
        };
        match expr::resolve_boolean(value, None) {
            Ok(true) => self.allow_none |= groups,
            Ok(false) => self.allow_none &= !groups,
            Err(_) => {
                state
                    .diag
                    .error(format!("Illegal \"allow none\" value for {}", self.name))
                    .action("Non-boolean value ignored");
                return false;
            }
        }
        true
    }

    fn set_type(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        let Ok(name) = expr::resolve_string(value) else {
            if state.diag.level() > 0 {
                state
                    .diag
                    .warn("The type field of a key symbol map must be a string")
                    .action("Ignoring illegal type definition");
            }
            return false;
        };
        let Some(index) = index else {
            self.dflt_type = Some(name);
            self.common.set_defined(fields::TYPE_DFLT);
            return true;
        };
        let Some(group) = resolve_group(index) else {
            state
                .diag
                .error(format!("Illegal group index for type of key {}", self.name))
                .action("Definition with non-integer array index ignored");
            return false;
        };
        if group < 1 || group > NUM_KBD_GROUPS as i64 {
            state
                .diag
                .error(format!(
                    "Group index for type of key {} is out of range (1..{})",
                    self.name, NUM_KBD_GROUPS
                ))
                .action(format!("Ignoring type for group {}", group));
            return false;
        }
        let group = (group - 1) as usize;
        self.groups[group].type_name = Some(name);
        self.types_defined |= 1 << group;
        true
    }

    fn set_radio_group(&mut self, field: &str, value: &Expr, state: &mut CompileState) -> bool {
        let permanent = field.eq_ignore_ascii_case("permanentradiogroup");
        let Ok(group) = expr::resolve_integer(value, Some(&SimpleLookup(RADIO_GROUP_VALUES))) else {
            state
                .diag
                .error(format!("Illegal radio group specification for {}", self.name))
                .action("Non-integer radio group ignored");
            return false;
        };
        if group == 0 {
            self.behavior = Behavior::default();
            return true;
        }
        if group < 1 || group > MAX_RADIO_GROUPS as i64 {
            state
                .diag
                .error(format!(
                    "Radio group specification for {} out of range (1..{})",
                    self.name, MAX_RADIO_GROUPS
                ))
                .action(format!("Illegal radio group {} ignored", group));
            return false;
        }
        let slot = (group - 1) as u8;
        self.behavior = Behavior {
            kind: BehaviorKind::RadioGroup {
                group: slot,
                allow_none: self.allow_none & (1 << slot) != 0,
            },
            permanent,
        };
        self.common.set_defined(fields::BEHAVIOR);
        true
    }

    fn set_overlay(&mut self, field: &str, value: &Expr, state: &mut CompileState) -> bool {
        let lower = field.to_ascii_lowercase();
        let (permanent, which) = match lower.strip_prefix("permanentoverlay") {
            Some(rest) => (true, rest.to_string()),
            None => (false, lower.trim_start_matches("overlay").to_string()),
        };
        let overlay = if which.is_empty() {
            1
        } else {
            match which.parse::<u8>() {
                Ok(n @ 1..=2) => n,
                _ => {
                    state
                        .diag
                        .error(format!("Illegal overlay \"{}\" specified for {}", which, self.name))
                        .action("Ignored");
                    return false;
                }
            }
        };
        let Ok(target) = expr::resolve_keyname(value) else {
            state
                .diag
                .error(format!("Illegal overlay key specification for {}", self.name))
                .action("Overlay key must be specified by name");
            return false;
        };
        self.behavior = Behavior {
            kind: BehaviorKind::Overlay { overlay, key: 0 },
            permanent,
        };
        self.overlay_key = Some(target);
        self.common.set_defined(fields::BEHAVIOR);
        true
    }

    /// `groupsWrap`, `groupsClamp` or `groupsRedirect`
    fn set_groups_range(&mut self, field: &str, value: &Expr, state: &mut CompileState) -> bool {
        let range = match field {
            "groupswrap" | "wrapgroups" | "groupsclamp" | "clampgroups" => {
                let Ok(flag) = expr::resolve_boolean(value, None) else {
                    state
                        .diag
                        .error(format!("Illegal {} setting for {}", field, self.name))
                        .action("Non-boolean value ignored");
                    return false;
                };
                let wrap = matches!(field, "groupswrap" | "wrapgroups") == flag;
                if wrap {
                    GroupsRange::Wrap
                } else {
                    GroupsRange::Clamp
                }
            }
            _ => {
                let Some(group) = resolve_group(value) else {
                    state
                        .diag
                        .error(format!("Illegal group index for redirect of key {}", self.name))
                        .action("Definition with non-integer group ignored");
                    return false;
                };
                if group < 1 || group > NUM_KBD_GROUPS as i64 {
                    state
                        .diag
                        .error(format!(
                            "Out-of-range (1..{}) group for redirect of key {}",
                            NUM_KBD_GROUPS, self.name
                        ))
                        .action(format!("Ignoring illegal group {}", group));
                    return false;
                }
                GroupsRange::Redirect((group - 1) as u8)
            }
        };
        self.groups_range = range;
        self.common.set_defined(fields::GROUP_INFO);
        true
    }

    /// Apply one field of a key body or of the `key.` defaults
    fn set_field(
        &mut self,
        field: &str,
        index: Option<&Expr>,
        value: Option<&Expr>,
        actions: &ActionDefaults,
        state: &mut CompileState,
    ) -> bool {
        let lower = field.to_ascii_lowercase();
        match lower.as_str() {
            "symbols" => return self.add_symbols(index, value, state),
            "actions" => return self.add_actions(index, value, actions, state),
            _ => {}
        }
        let value = value.cloned().unwrap_or(Expr::Boolean(true));
        match lower.as_str() {
            "type" => self.set_type(index, &value, state),
            "vmods" | "virtualmods" | "virtualmodifiers" => {
                match resolve_vmodmask(&value, &state.keymap.vmods) {
                    Ok(mask) => {
                        self.vmodmap = mask.vmods;
                        self.common.set_defined(fields::VMODMAP);
                        true
                    }
                    Err(_) => {
                        state
                            .diag
                            .error(format!(
                                "Expected a virtual modifier mask, found {}",
                                value.kind_name()
                            ))
                            .action(format!(
                                "Ignoring virtual modifiers definition for key {}",
                                self.name
                            ));
                        false
                    }
                }
            }
            "locking" | "lock" | "locks" => {
                self.common.set_defined(fields::BEHAVIOR);
                match resolve_flag_enum(&value, LOCKING_VALUES) {
                    Some(0) => {
                        self.behavior = Behavior::default();
                        true
                    }
                    Some(locking) => {
                        self.behavior = Behavior {
                            kind: BehaviorKind::Lock,
                            permanent: locking == 2,
                        };
                        true
                    }
                    None => {
                        state
                            .diag
                            .error(format!("Illegal locking setting for {}", self.name))
                            .action("Ignored");
                        false
                    }
                }
            }
            "radiogroup" | "permanentradiogroup" => self.set_radio_group(&lower, &value, state),
            "allownone" => self.set_allow_none(index, &value, state),
            f if f.starts_with("overlay") || f.starts_with("permanentoverlay") => {
                self.set_overlay(&lower, &value, state)
            }
            "repeating" | "repeats" | "repeat" => match resolve_flag_enum(&value, REPEAT_VALUES) {
                Some(setting) => {
                    self.repeat = match setting {
                        REPEAT_YES => Some(true),
                        REPEAT_NO => Some(false),
                        _ => None,
                    };
                    self.common.set_defined(fields::REPEAT);
                    true
                }
                None => {
                    state
                        .diag
                        .error(format!("Illegal repeat setting for {}", self.name))
                        .action("Non-boolean repeat setting ignored");
                    false
                }
            },
            "groupswrap" | "wrapgroups" | "groupsclamp" | "clampgroups" | "groupsredirect"
            | "redirectgroups" => self.set_groups_range(&lower, &value, state),
            _ => {
                state
                    .diag
                    .error(format!("Unknown field {} in a key symbol definition", field))
                    .action("Definition ignored");
                false
            }
        }
    }

    /// Move group 1 of the key into `group`
    ///
    /// Only the first group survives; the others are dropped with a
    /// warning.
    fn set_explicit_group(&mut self, group: usize, map: &str, state: &mut CompileState) -> bool {
        if group == 0 {
            return true;
        }
        if group >= NUM_KBD_GROUPS {
            state.diag.error(format!(
                "Explicit group {} for map {} is out of range (1..{})",
                group + 1,
                map,
                NUM_KBD_GROUPS
            ));
            return false;
        }
        if self.defined_groups() & !1 != 0 {
            if state.diag.level() > 0 {
                state
                    .diag
                    .warn(format!(
                        "For map {} an explicit group is specified but key {} has more than one group defined",
                        map, self.name
                    ))
                    .action("All groups except first one will be ignored");
            }
            for extra in self.groups.iter_mut().skip(1) {
                *extra = GroupInfo::default();
            }
        }
        let bit = 1 << group;
        self.syms_defined = bit;
        self.acts_defined = bit;
        self.types_defined = bit;
        self.groups[group] = std::mem::take(&mut self.groups[0]);
        true
    }

    /// Fill gaps below the highest defined group, then collapse to one
    /// group when all groups ended up identical
    pub fn prepare(&mut self) {
        let defined = self.defined_groups();
        let Some(last) = (0..NUM_KBD_GROUPS).rev().find(|g| defined & (1 << g) != 0) else {
            return;
        };
        if last == 0 {
            return;
        }

        for group in (1..=last).rev() {
            if defined & (1 << group) != 0 {
                continue;
            }
            let first = self.groups[0].clone();
            if self.types_defined & 1 != 0 {
                self.groups[group].type_name = first.type_name.clone();
                self.types_defined |= 1 << group;
            }
            if self.acts_defined & 1 != 0 && first.actions.is_some() {
                self.groups[group].actions = first.actions.clone();
                self.acts_defined |= 1 << group;
            }
            if self.syms_defined & 1 != 0 && first.syms.is_some() {
                self.groups[group].syms = first.syms.clone();
                self.syms_defined |= 1 << group;
            }
            if defined & 1 != 0 {
                self.groups[group].num_levels = first.num_levels;
            }
        }

        let first = &self.groups[0];
        let identical = self.groups[1..=last].iter().all(|g| {
            g.num_levels == first.num_levels
                && g.type_name == first.type_name
                && g.syms == first.syms
                && g.actions == first.actions
        });
        if identical {
            for group in self.groups.iter_mut().skip(1) {
                *group = GroupInfo::default();
            }
            self.syms_defined &= 1;
            self.acts_defined &= 1;
            self.types_defined &= 1;
        }
    }
}

/// Merge group `group` of `from` into `into`
fn merge_key_groups(into: &mut KeyInfo, from: &mut KeyInfo, group: usize, state: &mut CompileState) {
    let level = state.diag.level();
    let clobber = from.common.merge != MergeMode::Augment;
    let report = level > 9 || (into.common.file_id == from.common.file_id && level > 0);
    let name = into.name;
    let src = std::mem::take(&mut from.groups[group]);
    let dst = &mut into.groups[group];

    let width = if src.num_levels > dst.num_levels || (clobber && src.type_name.is_some()) {
        src.num_levels
    } else {
        dst.num_levels
    };
    let want_actions = dst.actions.is_some() || src.actions.is_some();
    let mut syms = Vec::with_capacity(width);
    let mut actions = want_actions.then(|| Vec::with_capacity(width));

    for i in 0..width {
        let from_sym = src.sym(i);
        let to_sym = dst.sym(i);
        let sym = if from_sym == NO_SYMBOL || from_sym == to_sym {
            to_sym
        } else if to_sym == NO_SYMBOL {
            from_sym
        } else {
            let (use_sym, ignore) = if clobber {
                (from_sym, to_sym)
            } else {
                (to_sym, from_sym)
            };
            if report {
                state
                    .diag
                    .warn(format!(
                        "Multiple symbols for level {}/group {} on key {}",
                        i + 1,
                        group + 1,
                        name
                    ))
                    .action(format!(
                        "Using {}, ignoring {}",
                        keysym_name(use_sym),
                        keysym_name(ignore)
                    ));
            }
            use_sym
        };
        syms.push(sym);

        if let Some(actions) = actions.as_mut() {
            let from_act = src.action(i);
            let to_act = dst.action(i);
            let absent = |a: Option<Action>| a.map_or(true, |a| a.is_none());
            let action = match (from_act, to_act) {
                (_, Some(to)) if absent(from_act) => to,
                (Some(from), _) if absent(to_act) => from,
                _ => {
                    let (use_act, ignore) = if clobber {
                        (from_act, to_act)
                    } else {
                        (to_act, from_act)
                    };
                    if report {
                        let kind = |a: Option<Action>| a.unwrap_or_default().kind().name();
                        state
                            .diag
                            .warn(format!(
                                "Multiple actions for level {}/group {} on key {}",
                                i + 1,
                                group + 1,
                                name
                            ))
                            .action(format!("Using {}, ignoring {}", kind(use_act), kind(ignore)));
                    }
                    use_act.unwrap_or_default()
                }
            };
            actions.push(action);
        }
    }

    dst.num_levels = width;
    dst.syms = Some(syms);
    dst.actions = actions;
    into.syms_defined |= 1 << group;
    into.acts_defined |= 1 << group;
    from.syms_defined &= !(1 << group);
    from.acts_defined &= !(1 << group);
}

/// Merge a complete key record into an existing one
pub fn merge_keys(into: &mut KeyInfo, mut from: KeyInfo, state: &mut CompileState) {
    if from.common.merge == MergeMode::Replace {
        *into = from;
        return;
    }
    let level = state.diag.level();
    let report = level > 9 || (into.common.file_id == from.common.file_id && level > 0);
    let mut collisions = Collisions::default();

    for group in 0..NUM_KBD_GROUPS {
        if from.groups[group].num_levels > 0 {
            if into.groups[group].num_levels == 0 {
                let mut moved = std::mem::take(&mut from.groups[group]);
                if moved.syms.is_some() {
                    into.common.set_defined(fields::SYMS);
                }
                if moved.actions.is_some() {
                    into.common.set_defined(fields::ACTS);
                }
                from.groups[group].type_name = moved.type_name.take();
                moved.type_name = into.groups[group].type_name.take();
                into.groups[group] = moved;
                into.syms_defined |= 1 << group;
                from.syms_defined &= !(1 << group);
            } else {
                if report {
                    if into.groups[group].syms.is_some() {
                        collisions.0 |= fields::SYMS;
                    }
                    if into.groups[group].actions.is_some() {
                        collisions.0 |= fields::ACTS;
                    }
                }
                let incoming_type = from.groups[group].type_name.clone();
                merge_key_groups(into, &mut from, group, state);
                from.groups[group].type_name = incoming_type;
            }
        }

        let Some(new_type) = from.groups[group].type_name.take() else {
            continue;
        };
        let old_type = into.groups[group].type_name.clone();
        if let Some(old) = old_type.as_ref() {
            if report && *old != new_type {
                collisions.0 |= fields::TYPES;
                let (use_type, ignore) = if from.common.merge != MergeMode::Augment {
                    (new_type.as_str(), old.as_str())
                } else {
                    (old.as_str(), new_type.as_str())
                };
                state
                    .diag
                    .warn(format!(
                        "Multiple definitions for group {} type of key {}",
                        group + 1,
                        into.name
                    ))
                    .action(format!("Using {}, ignoring {}", use_type, ignore));
            }
        }
        if from.common.merge != MergeMode::Augment || old_type.is_none() {
            into.groups[group].type_name = Some(new_type);
        }
    }
    into.types_defined |= from.types_defined;

    if collisions.check(fields::BEHAVIOR, &into.common, &from.common, level) {
        into.behavior = from.behavior;
        into.overlay_key = from.overlay_key;
        into.common.set_defined(fields::BEHAVIOR);
    }
    if collisions.check(fields::VMODMAP, &into.common, &from.common, level) {
        into.vmodmap = from.vmodmap;
        into.common.set_defined(fields::VMODMAP);
    }
    if collisions.check(fields::REPEAT, &into.common, &from.common, level) {
        into.repeat = from.repeat;
        into.common.set_defined(fields::REPEAT);
    }
    if collisions.check(fields::TYPE_DFLT, &into.common, &from.common, level) {
        into.dflt_type = from.dflt_type.take();
        into.common.set_defined(fields::TYPE_DFLT);
    }
    if collisions.check(fields::GROUP_INFO, &into.common, &from.common, level) {
        into.groups_range = from.groups_range;
        into.common.set_defined(fields::GROUP_INFO);
    }
    if collisions.any() && level > 0 {
        let which = if from.common.merge == MergeMode::Augment {
            "first"
        } else {
            "last"
        };
        state
            .diag
            .warn(format!("Symbol map for key {} redefined", into.name))
            .action(format!("Using {} definition for conflicting fields", which));
    }
}

/// What a `modifier_map` entry names
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModMapTarget {
    Key(KeyName),
    Symbol(Keysym),
}

/// One `modifier_map` assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModMapEntry {
    pub merge: MergeMode,
    /// Real modifier index
    pub modifier: usize,
    pub target: ModMapTarget,
}

/// Accumulator for one symbols section and its includes
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolsInfo {
    pub header: SectionHeader,
    /// 0-based group keys of this section are moved to
    pub explicit_group: usize,
    pub keys: Vec<KeyInfo>,
    /// Target of `key.field = ...`
    pub dflt: KeyInfo,
    pub actions: ActionDefaults,
    pub group_names: [Option<String>; NUM_KBD_GROUPS],
    pub modmap: Vec<ModMapEntry>,
}

impl Default for SymbolsInfo {
    fn default() -> Self {
        Self {
            header: SectionHeader::default(),
            explicit_group: 0,
            keys: Vec::new(),
            dflt: KeyInfo::default(),
            actions: ActionDefaults::new(),
            group_names: Default::default(),
            modmap: Vec::new(),
        }
    }
}

impl SymbolsInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_key(&self, name: KeyName) -> Option<&KeyInfo> {
        self.keys.iter().find(|k| k.name == name)
    }

    /// Add a key record, merging it into an existing one of the same name
    /// or of the key its name aliases
    pub fn add_key(&mut self, key: KeyInfo, state: &mut CompileState) -> bool {
        let position = self
            .keys
            .iter()
            .position(|k| k.name == key.name)
            .or_else(|| {
                let real = state.keymap.resolve_alias(key.name)?;
                self.keys.iter().position(|k| k.name == real)
            });
        match position {
            Some(index) => merge_keys(&mut self.keys[index], key, state),
            None => self.keys.push(key),
        }
        true
    }

    /// Add a modifier map entry; conflicting modifiers for one target are errors
    pub fn add_modmap_entry(&mut self, new: ModMapEntry, state: &mut CompileState) -> bool {
        let clobber = new.merge != MergeMode::Augment;
        let Some(existing) = self.modmap.iter_mut().find(|mm| mm.target == new.target) else {
            self.modmap.push(new);
            return true;
        };
        if existing.modifier != new.modifier {
            let (use_mod, ignore) = if clobber {
                (new.modifier, existing.modifier)
            } else {
                (existing.modifier, new.modifier)
            };
            let what = match new.target {
                ModMapTarget::Symbol(sym) => {
                    format!("{} added to symbol map for multiple modifiers", keysym_name(sym))
                }
                ModMapTarget::Key(name) => {
                    format!("Key {} added to map for multiple modifiers", name)
                }
            };
            state.diag.error(what).action(format!(
                "Using {}, ignoring {}.",
                REAL_MOD_NAMES[use_mod], REAL_MOD_NAMES[ignore]
            ));
            existing.modifier = use_mod;
        }
        true
    }

    fn set_group_name(&mut self, index: Option<&Expr>, value: &Expr, state: &mut CompileState) -> bool {
        let Some(index) = index else {
            if state.diag.level() > 0 {
                state
                    .diag
                    .warn("You must specify an index when specifying a group name")
                    .action("Group name definition without array subscript ignored");
            }
            return false;
        };
        let Some(group) = resolve_group(index) else {
            state
                .diag
                .error("Illegal index in group name definition")
                .action("Definition with non-integer array index ignored");
            return false;
        };
        if group < 1 || group > NUM_KBD_GROUPS as i64 {
            state
                .diag
                .error(format!(
                    "Attempt to specify name for illegal group (must be 1..{})",
                    NUM_KBD_GROUPS
                ))
                .action(format!("Name for group {} ignored", group));
            return false;
        }
        let Ok(name) = expr::resolve_string(value) else {
            state
                .diag
                .error("Group name must be a string")
                .action(format!("Illegal name for group {} ignored", group));
            return false;
        };
        let slot = (group - 1) as usize + self.explicit_group;
        if slot >= NUM_KBD_GROUPS {
            state
                .diag
                .error(format!(
                    "Name for group {} lands on group {} after the explicit group offset",
                    group,
                    slot + 1
                ))
                .action("Group name ignored");
            return false;
        }
        self.group_names[slot] = Some(name);
        true
    }

    /// Assignments outside key bodies and `element.field` ones inside
    fn handle_var(&mut self, def: &VarDef, state: &mut CompileState) -> bool {
        let Some(target) = def.name.as_ref() else {
            state.diag.error("Missing field name in symbols assignment");
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
        let lower = field.to_ascii_lowercase();
        match element {
            Some(element) if element.eq_ignore_ascii_case("key") => {
                let mut dflt = std::mem::take(&mut self.dflt);
                let ok = dflt.set_field(field, index, Some(&value), &self.actions, state);
                self.dflt = dflt;
                ok
            }
            None if lower == "name" || lower == "groupname" => {
                self.set_group_name(index, &value, state)
            }
            None if matches!(
                lower.as_str(),
                "groupswrap" | "wrapgroups" | "groupsclamp" | "clampgroups" | "groupsredirect"
                    | "redirectgroups"
            ) =>
            {
                self.dflt.set_groups_range(&lower, &value, state)
            }
            None if lower == "allownone" => self.dflt.set_allow_none(index, &value, state),
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
                    .error(format!("Unknown global field {} in a symbols section", field))
                    .action("Ignored");
                false
            }
        }
    }

    fn handle_symbols_body(&mut self, body: &[VarDef], key: &mut KeyInfo, state: &mut CompileState) -> bool {
        let mut ok = true;
        for def in body {
            if let Some(Expr::FieldRef { .. }) = def.name {
                ok = self.handle_var(def, state) && ok;
                continue;
            }
            let (field, index) = match def.name.as_ref() {
                None => match def.value {
                    None | Some(Expr::KeysymList(_)) => ("symbols", None),
                    Some(_) => ("actions", None),
                },
                Some(target) => match resolve_lhs(target) {
                    Ok((_, field, index)) => (field, index),
                    Err(err) => {
                        state.diag.error(err.to_string());
                        ok = false;
                        continue;
                    }
                },
            };
            ok = key.set_field(field, index, def.value.as_ref(), &self.actions, state) && ok;
        }
        ok
    }

    fn handle_symbols_def(
        &mut self,
        key_name: KeyName,
        body: &[VarDef],
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        let mut key = self.dflt.clone();
        key.common.merge = merge;
        key.name = key_name;
        if !self.handle_symbols_body(body, &mut key, state) {
            return false;
        }
        let map = self.header.name.clone().unwrap_or_default();
        if !key.set_explicit_group(self.explicit_group, &map, state) {
            return false;
        }
        self.add_key(key, state)
    }

    fn handle_modmap_def(
        &mut self,
        modifier: &str,
        keys: &[Expr],
        merge: MergeMode,
        state: &mut CompileState,
    ) -> bool {
        let Some(index) = real_mod_index(modifier) else {
            state
                .diag
                .error("Illegal modifier map definition")
                .action(format!("Ignoring map for non-modifier \"{}\"", modifier));
            return false;
        };
        let mut ok = true;
        for key in keys {
            let target = match key {
                Expr::KeyName(name) => ModMapTarget::Key(*name),
                other => match expr::resolve_keysym(other) {
                    Ok(sym) => ModMapTarget::Symbol(sym),
                    Err(_) => {
                        state
                            .diag
                            .error("Modmap entries may contain only key names or keysyms")
                            .action(format!(
                                "Illegal definition for {} modifier ignored",
                                REAL_MOD_NAMES[index]
                            ));
                        continue;
                    }
                },
            };
            let entry = ModMapEntry {
                merge,
                modifier: index,
                target,
            };
            ok = self.add_modmap_entry(entry, state) && ok;
        }
        ok
    }
}

impl IncludeInfo for SymbolsInfo {
    const SECTION: FileType = FileType::Symbols;

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut SectionHeader {
        &mut self.header
    }

    fn new_included(&self, term: &IncludeTerm) -> Self {
        let mut info = SymbolsInfo::new();
        info.explicit_group = match term.modifier {
            Some(group) => (group as usize).saturating_sub(1),
            None => self.explicit_group,
        };
        info
    }

    fn merge_contents(&mut self, from: Self, merge: MergeMode, state: &mut CompileState) {
        for (slot, name) in from.group_names.into_iter().enumerate() {
            if let Some(name) = name {
                if merge != MergeMode::Augment || self.group_names[slot].is_none() {
                    self.group_names[slot] = Some(name);
                }
            }
        }
        for mut key in from.keys {
            if merge != MergeMode::Default {
                key.common.merge = merge;
            }
            if !self.add_key(key, state) {
                self.header.error_count += 1;
            }
        }
        for mut entry in from.modmap {
            if merge != MergeMode::Default {
                entry.merge = merge;
            }
            if !self.add_modmap_entry(entry, state) {
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
                Stmt::Symbols {
                    merge: stmt_merge,
                    key_name,
                    body,
                } => self.handle_symbols_def(*key_name, body, stmt_merge.or(merge), state),
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
                Stmt::ModMap {
                    merge: stmt_merge,
                    modifier,
                    keys,
                } => self.handle_modmap_def(modifier, keys, stmt_merge.or(merge), state),
                other => {
                    state
                        .diag
                        .error("Symbol files may not include other types")
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
                    .action(format!("Abandoning symbols file \"{}\"", file.name));
                break;
            }
        }
    }
}

/// Type picked for a group that names none
///
/// # Returns
/// The type name and whether the choice is automatic (automatic choices
/// do not mark the type as explicit), or `None` for groups wider than
/// four levels
pub fn automatic_type(width: usize, syms: &[Keysym]) -> Option<(&'static str, bool)> {
    let sym = |i: usize| syms.get(i).copied().unwrap_or(NO_SYMBOL);
    let alphabetic = |i: usize| is_lower(sym(i)) && is_upper(sym(i + 1));
    let keypad = is_keypad(sym(0)) || is_keypad(sym(1));
    match width {
        0 | 1 => Some((ONE_LEVEL, true)),
        2 if alphabetic(0) => Some((ALPHABETIC, false)),
        2 if keypad => Some((KEYPAD, true)),
        2 => Some((TWO_LEVEL, true)),
        3 | 4 if alphabetic(0) && alphabetic(2) => Some(("FOUR_LEVEL_ALPHABETIC", false)),
        3 | 4 if alphabetic(0) => Some(("FOUR_LEVEL_SEMIALPHABETIC", false)),
        3 | 4 if keypad => Some(("FOUR_LEVEL_KEYPAD", false)),
        3 | 4 => Some(("FOUR_LEVEL", false)),
        _ => None,
    }
}

fn keycodes_label(state: &CompileState) -> String {
    state
        .keymap
        .keycodes_name
        .clone()
        .unwrap_or_else(|| "(unnamed)".to_string())
}

/// Copy a prepared key onto keycode `kc`
fn copy_to_keycode(key: &mut KeyInfo, kc: Keycode, state: &mut CompileState) {
    let level = state.diag.level();
    let slot = kc as usize;
    let previous = state.keymap.keys[slot].clone();
    let mut explicit_bits = previous.explicit;
    let mut n_groups = 0;
    let mut have_actions = false;
    let mut type_index = [TWO_LEVEL_INDEX; NUM_KBD_GROUPS];
    let mut width = 0;
    let defined = key.defined_groups();

    for group in 0..NUM_KBD_GROUPS {
        if defined & (1 << group) != 0 {
            n_groups = group + 1;
        }
        let info = &mut key.groups[group];
        if info.actions.is_some() {
            have_actions = true;
        }

        let mut auto_type = false;
        if info.type_name.is_none() {
            if let Some(dflt) = key.dflt_type.as_ref() {
                info.type_name = Some(dflt.clone());
            } else if let Some((name, auto)) =
                automatic_type(info.num_levels, info.syms.as_deref().unwrap_or_default())
            {
                info.type_name = Some(name.to_string());
                auto_type = auto;
            } else if level >= 5 {
                state
                    .diag
                    .warn(format!("No automatic type for {} symbols", info.num_levels))
                    .action(format!(
                        "Using TWO_LEVEL for the {} key (keycode {})",
                        key.name, kc
                    ));
            }
        }

        let found = info
            .type_name
            .as_deref()
            .and_then(|name| state.keymap.find_type(name));
        match found {
            Some(index) => {
                type_index[group] = index;
                if (!auto_type || info.num_levels > 2) && group < n_groups {
                    explicit_bits |= explicit::key_type(group);
                }
            }
            None => {
                if let (Some(name), true) = (info.type_name.as_ref(), level >= 3) {
                    state
                        .diag
                        .warn(format!("Type \"{}\" is not defined", name))
                        .action(format!(
                            "Using TWO_LEVEL for the {} key (keycode {})",
                            key.name, kc
                        ));
                }
                type_index[group] = TWO_LEVEL_INDEX;
            }
        }

        let (type_name, type_levels) = state
            .keymap
            .types
            .get(type_index[group])
            .map(|t| (t.name.clone(), t.num_levels as usize))
            .unwrap_or_else(|| (TWO_LEVEL.to_string(), 2));
        if type_levels < info.num_levels {
            if level > 5 {
                state
                    .diag
                    .warn(format!(
                        "Type \"{}\" has {} levels, but {} has {} symbols",
                        type_name, type_levels, key.name, info.num_levels
                    ))
                    .action("Ignoring extra symbols");
            }
            info.truncate(type_levels);
        }
        width = width.max(info.num_levels).max(type_levels);
    }

    let mut groups = Vec::with_capacity(n_groups);
    for (group, info) in key.groups.iter().enumerate().take(n_groups) {
        let type_index = if info.num_levels > 0 {
            type_index[group]
        } else {
            previous
                .groups
                .get(group)
                .map_or(type_index[group], |g| g.type_index)
        };
        let pad = |levels: &[Keysym]| {
            let mut out: Vec<Keysym> = levels.iter().copied().take(info.num_levels).collect();
            out.resize(width, NO_SYMBOL);
            out
        };
        let syms = pad(info.syms.as_deref().unwrap_or_default());
        let actions = have_actions.then(|| {
            let mut out: Vec<Action> = info
                .actions
                .as_deref()
                .unwrap_or_default()
                .iter()
                .copied()
                .take(info.num_levels)
                .collect();
            out.resize(width, Action::None);
            out
        });
        groups.push(KeyGroup {
            type_index,
            syms,
            actions,
        });
    }

    let mut out = Key {
        groups,
        groups_range: if key.common.is_defined(fields::GROUP_INFO) {
            key.groups_range
        } else {
            previous.groups_range
        },
        explicit: explicit_bits,
        repeat: previous.repeat,
        behavior: previous.behavior,
        vmodmap: previous.vmodmap,
        modmap: previous.modmap,
    };
    if have_actions {
        out.explicit |= explicit::INTERPRET;
    }

    match key.behavior.kind {
        BehaviorKind::Default => {}
        BehaviorKind::Overlay { overlay, .. } => {
            let target = key
                .overlay_key
                .and_then(|name| state.keymap.find_key(name, true, 0));
            match target {
                Some(okc) => {
                    out.behavior = Behavior {
                        kind: BehaviorKind::Overlay { overlay, key: okc },
                        permanent: key.behavior.permanent,
                    };
                    out.explicit |= explicit::BEHAVIOR;
                }
                None => {
                    if level >= 1 {
                        let missing = key.overlay_key.unwrap_or_default();
                        let label = keycodes_label(state);
                        state
                            .diag
                            .warn(format!("Key {} not found in {} keycodes", missing, label))
                            .action(format!("Not treating {} as an overlay key", key.name));
                    }
                }
            }
        }
        _ => {
            out.behavior = key.behavior;
            out.explicit |= explicit::BEHAVIOR;
        }
    }
    if key.common.is_defined(fields::VMODMAP) {
        out.vmodmap = key.vmodmap;
        out.explicit |= explicit::VMODMAP;
    }
    if let Some(repeat) = key.repeat {
        out.repeat = Some(repeat);
        out.explicit |= explicit::AUTO_REPEAT;
    }
    state.keymap.keys[slot] = out;
}

/// Copy a prepared key onto every keycode carrying its name
///
/// # Returns
/// `false` when no keycode carries the name
pub fn copy_symbols_def(key: &mut KeyInfo, state: &mut CompileState) -> bool {
    let Some(first) = state.keymap.find_key(key.name, true, 0) else {
        if state.diag.level() >= 5 {
            let label = keycodes_label(state);
            state
                .diag
                .warn(format!("Key {} not found in {} keycodes", key.name, label))
                .action("Symbols ignored");
        }
        return false;
    };
    copy_to_keycode(key, first, state);
    let mut next = first + 1;
    while let Some(kc) = state.keymap.find_key(key.name, false, next) {
        copy_to_keycode(key, kc, state);
        next = kc + 1;
    }
    true
}

fn copy_modmap_entry(entry: &ModMapEntry, state: &mut CompileState) -> bool {
    let level = state.diag.level();
    let kc = match entry.target {
        ModMapTarget::Key(name) => {
            let kc = state.keymap.find_key(name, true, 0);
            if kc.is_none() && level >= 5 {
                let label = keycodes_label(state);
                state
                    .diag
                    .warn(format!("Key {} not found in {} keycodes", name, label))
                    .action(format!(
                        "Modifier map entry for {} not updated",
                        REAL_MOD_NAMES[entry.modifier]
                    ));
            }
            kc
        }
        ModMapTarget::Symbol(sym) => {
            let kc = state.keymap.find_key_for_symbol(sym);
            if kc.is_none() && level > 5 {
                let symbols = state.keymap.symbols_name.clone().unwrap_or_default();
                state
                    .diag
                    .warn(format!(
                        "Key \"{}\" not found in {} symbol map",
                        keysym_name(sym),
                        symbols
                    ))
                    .action(format!(
                        "Modifier map entry for {} not updated",
                        REAL_MOD_NAMES[entry.modifier]
                    ));
            }
            kc
        }
    };
    match kc {
        Some(kc) => {
            state.keymap.keys[kc as usize].modmap |= 1 << entry.modifier;
            true
        }
        None => false,
    }
}

/// Compile a symbols section into the keymap
///
/// Keycodes and types must already be in place: keys are looked up by
/// name and types by name.
pub fn compile_symbols(file: &XkbFile, merge: MergeMode, state: &mut CompileState) -> bool {
    let mut info = SymbolsInfo::new();
    info.dflt.common.merge = merge;
    info.handle_file(file, merge, state);
    if info.header.error_count > 0 {
        return false;
    }
    if info.keys.is_empty() {
        return true;
    }

    state.keymap.symbols_name = info.header.name.clone();
    for (slot, name) in info.group_names.iter().enumerate() {
        if name.is_some() {
            state.keymap.group_names[slot] = name.clone();
        }
    }
    for key in info.keys.iter_mut() {
        key.prepare();
    }
    let mut missing = 0;
    for key in info.keys.iter_mut() {
        if !copy_symbols_def(key, state) {
            missing += 1;
        }
    }

    if state.diag.level() > 3 {
        for kc in state.keymap.min_key_code..=state.keymap.max_key_code {
            let name = state.keymap.key_names[kc as usize];
            if !name.is_empty() && state.keymap.keys[kc as usize].groups.is_empty() {
                state
                    .diag
                    .info(format!("No symbols defined for {} (keycode {})", name, kc));
            }
        }
    }

    for entry in &info.modmap {
        if !copy_modmap_entry(entry, state) {
            missing += 1;
        }
    }
    tracing::debug!(
        keys = info.keys.len(),
        modmap = info.modmap.len(),
        missing,
        "symbols compiled"
    );
    true
}
