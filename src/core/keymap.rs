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

//! src/core/keymap.rs
//!
//! The compiled keyboard description
//!
//! This is what the sub-compilers fill in and what the dumper prints:
//! - key names indexed by keycode, plus aliases
//! - key types (canonical ones first)
//! - symbol interpretations, group compatibility and indicator maps
//! - per-keycode symbols, actions, behaviors and modifier maps
//! - virtual modifier names and their real bindings
//!
//! All tables are plain vectors so two descriptions can be compared with
//! `==`.

use serde::{Deserialize, Serialize};

use crate::core::action::Action;
use crate::core::types::{
    KeyName, Keycode, Keysym, ModMask, MAX_LEGAL_KEYCODE, MIN_LEGAL_KEYCODE, NO_SYMBOL,
    NUM_INDICATORS, NUM_KBD_GROUPS,
};
use crate::core::vmod::VirtualMods;

/// Number of keycode slots in the tables
pub const KEYCODE_SLOTS: usize = MAX_LEGAL_KEYCODE as usize + 1;

/// One `map[mods] = level` entry of a key type
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyTypeEntry {
    pub mods: ModMask,
    /// 0-based shift level
    pub level: u32,
    pub preserve: ModMask,
}

/// A compiled key type
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyType {
    pub name: String,
    pub mods: ModMask,
    pub num_levels: u32,
    pub entries: Vec<KeyTypeEntry>,
    /// Names by 0-based level, `None` for unnamed levels
    pub level_names: Vec<Option<String>>,
}

/// Modifier predicate of a symbol interpretation
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Predicate {
    NoneOf,
    #[default]
    AnyOfOrNone,
    AnyOf,
    AllOf,
    Exactly,
}

impl Predicate {
    pub const NAMES: &'static [(&'static str, u32)] = &[
        ("noneof", 0),
        ("anyofornone", 1),
        ("anyof", 2),
        ("allof", 3),
        ("exactly", 4),
    ];

    pub fn from_index(index: u32) -> Option<Predicate> {
        match index {
            0 => Some(Predicate::NoneOf),
            1 => Some(Predicate::AnyOfOrNone),
            2 => Some(Predicate::AnyOf),
            3 => Some(Predicate::AllOf),
            4 => Some(Predicate::Exactly),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::NoneOf => "NoneOf",
            Predicate::AnyOfOrNone => "AnyOfOrNone",
            Predicate::AnyOf => "AnyOf",
            Predicate::AllOf => "AllOf",
            Predicate::Exactly => "Exactly",
        }
    }

    /// True when a modifier state `mods` satisfies the predicate against `mask`
    pub fn matches(&self, mask: u8, mods: u8) -> bool {
        match self {
            Predicate::NoneOf => mods & mask == 0,
            Predicate::AnyOfOrNone => mods == 0 || mods & mask != 0,
            Predicate::AnyOf => mods & mask != 0,
            Predicate::AllOf => mods & mask == mask,
            Predicate::Exactly => mods == mask,
        }
    }
}

/// A compiled symbol interpretation
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SymInterpret {
    /// `NoSymbol` for interpretations matching any keysym
    pub sym: Keysym,
    pub predicate: Predicate,
    pub mods: u8,
    pub level_one_only: bool,
    pub virtual_mod: Option<usize>,
    pub auto_repeat: bool,
    pub locking: bool,
    pub action: Action,
}

/// Indicator map flag: the indicator ignores explicit changes
pub const IM_NO_EXPLICIT: u8 = 1 << 7;
/// Indicator map flag: the indicator is not driven automatically
pub const IM_NO_AUTOMATIC: u8 = 1 << 6;
/// Indicator map flag: changing the indicator drives the keyboard state
pub const IM_LED_DRIVES_KB: u8 = 1 << 5;

/// Which-state bits for indicator modifier and group components
pub mod im_use {
    pub const BASE: u8 = 1 << 0;
    pub const LATCHED: u8 = 1 << 1;
    pub const LOCKED: u8 = 1 << 2;
    pub const EFFECTIVE: u8 = 1 << 3;
    pub const COMPAT: u8 = 1 << 4;
    pub const ANY: u8 = 0x1f;

    pub const NAMES: &[(&str, u32)] = &[
        ("base", BASE as u32),
        ("latched", LATCHED as u32),
        ("locked", LOCKED as u32),
        ("effective", EFFECTIVE as u32),
        ("compat", COMPAT as u32),
        ("any", ANY as u32),
        ("none", 0),
    ];
}

/// A compiled indicator (LED) map
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndicatorMap {
    pub flags: u8,
    pub which_groups: u8,
    pub groups: u8,
    pub which_mods: u8,
    pub mods: ModMask,
    pub ctrls: u32,
}

/// Alias from one key name to another
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyAlias {
    pub alias: KeyName,
    pub real: KeyName,
}

/// What happens to an out-of-range effective group
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum GroupsRange {
    #[default]
    Wrap,
    Clamp,
    /// 0-based target group
    Redirect(u8),
}

/// Key behavior kinds
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum BehaviorKind {
    #[default]
    Default,
    Lock,
    /// 0-based radio group
    RadioGroup { group: u8, allow_none: bool },
    /// Overlay 1 or 2 redirecting to `key`
    Overlay { overlay: u8, key: Keycode },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Behavior {
    pub kind: BehaviorKind,
    pub permanent: bool,
}

impl Behavior {
    pub fn is_default(&self) -> bool {
        self.kind == BehaviorKind::Default && !self.permanent
    }
}

/// Symbols and actions of one group of a key
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyGroup {
    /// Index into [`Keymap::types`]
    pub type_index: usize,
    /// Keysyms padded with `NoSymbol` to the key width
    pub syms: Vec<Keysym>,
    /// Same length as `syms` when present
    pub actions: Option<Vec<Action>>,
}

/// Everything the symbols section says about one keycode
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Key {
    pub groups: Vec<KeyGroup>,
    pub groups_range: GroupsRange,
    /// Explicit-component bits (see [`crate::core::types::explicit`])
    pub explicit: u8,
    /// Per-key auto-repeat, `None` when unspecified
    pub repeat: Option<bool>,
    pub behavior: Behavior,
    pub vmodmap: u16,
    pub modmap: u8,
}

impl Key {
    /// Widest group of the key in levels
    pub fn width(&self) -> usize {
        self.groups.iter().map(|g| g.syms.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        *self == Key::default()
    }
}

/// A complete compiled keyboard description
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Keymap {
    pub keycodes_name: Option<String>,
    pub types_name: Option<String>,
    pub compat_name: Option<String>,
    pub symbols_name: Option<String>,

    pub min_key_code: Keycode,
    pub max_key_code: Keycode,
    /// Key name per keycode; empty names mark unused codes
    pub key_names: Vec<KeyName>,
    pub key_aliases: Vec<KeyAlias>,
    pub indicator_names: Vec<Option<String>>,
    /// Bit `i` set when indicator `i + 1` is a physical LED
    pub phys_indicators: u32,

    pub vmods: VirtualMods,
    pub types: Vec<KeyType>,

    pub interprets: Vec<SymInterpret>,
    pub group_compat: [ModMask; NUM_KBD_GROUPS],
    pub indicators: Vec<Option<IndicatorMap>>,

    pub keys: Vec<Key>,
    pub group_names: [Option<String>; NUM_KBD_GROUPS],
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

impl Keymap {
    pub fn new() -> Self {
        Self {
            keycodes_name: None,
            types_name: None,
            compat_name: None,
            symbols_name: None,
            min_key_code: MIN_LEGAL_KEYCODE,
            max_key_code: MAX_LEGAL_KEYCODE,
            key_names: vec![KeyName::default(); KEYCODE_SLOTS],
            key_aliases: Vec::new(),
            indicator_names: vec![None; NUM_INDICATORS],
            phys_indicators: 0,
            vmods: VirtualMods::new(),
            types: Vec::new(),
            interprets: Vec::new(),
            group_compat: [ModMask::default(); NUM_KBD_GROUPS],
            indicators: vec![None; NUM_INDICATORS],
            keys: vec![Key::default(); KEYCODE_SLOTS],
            group_names: Default::default(),
        }
    }

    /// Find the keycode carrying `name`
    ///
    /// Searches keycodes from `start_from` upwards (0 means the whole
    /// range). With `use_aliases`, an alias is resolved to its real name
    /// when no key carries `name` directly.
    pub fn find_key(&self, name: KeyName, use_aliases: bool, start_from: Keycode) -> Option<Keycode> {
        let start = start_from.max(self.min_key_code) as usize;
        let end = (self.max_key_code as usize).min(KEYCODE_SLOTS - 1);
        if start <= end {
            if let Some(offset) = self.key_names[start..=end].iter().position(|n| *n == name) {
                return Some((start + offset) as Keycode);
            }
        }
        if use_aliases {
            if let Some(real) = self.resolve_alias(name) {
                return self.find_key(real, false, start_from);
            }
        }
        None
    }

    /// Real name behind an alias
    pub fn resolve_alias(&self, alias: KeyName) -> Option<KeyName> {
        self.key_aliases
            .iter()
            .find(|a| a.alias == alias)
            .map(|a| a.real)
    }

    /// Index of a key type by name
    pub fn find_type(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.name == name)
    }

    /// Key record for a keycode
    pub fn key(&self, keycode: Keycode) -> Option<&Key> {
        self.keys.get(keycode as usize)
    }

    /// Number of keysyms on a keycode across all groups
    pub fn num_syms(&self, keycode: Keycode) -> usize {
        self.key(keycode)
            .map(|k| k.groups.iter().map(|g| g.syms.len()).sum())
            .unwrap_or(0)
    }

    /// Keysym at a flat (group-major) position of a keycode
    pub fn sym_at(&self, keycode: Keycode, position: usize) -> Option<Keysym> {
        self.key(keycode)?
            .groups
            .iter()
            .flat_map(|g| g.syms.iter())
            .nth(position)
            .copied()
    }

    /// First keycode whose symbols contain `sym`, scanning level by level
    pub fn find_key_for_symbol(&self, sym: Keysym) -> Option<Keycode> {
        let mut position = 0;
        loop {
            let mut any = false;
            for kc in self.min_key_code..=self.max_key_code {
                if position < self.num_syms(kc) {
                    any = true;
                    if self.sym_at(kc, position) == Some(sym) {
                        return Some(kc);
                    }
                }
            }
            if !any {
                return None;
            }
            position += 1;
        }
    }

    /// First interpretation that applies to `sym` on a key whose modifier
    /// map is `modmap`
    ///
    /// Interpretations are stored most specific first, so the first match
    /// is the one a server would pick.
    pub fn find_interpret(&self, sym: Keysym, modmap: u8) -> Option<&SymInterpret> {
        self.interprets.iter().find(|interp| {
            (interp.sym == sym || interp.sym == NO_SYMBOL)
                && interp.predicate.matches(interp.mods, modmap)
        })
    }
}
