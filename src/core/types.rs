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

//! src/core/types.rs
//!
//! Shared vocabulary of the compiler
//!
//! Plain value types used by every stage:
//! - Key names packed into a `u32` (`<AE01>`)
//! - Real and virtual modifier masks
//! - Merge modes and section (file) types
//! - Map flags attached to a parsed section
//! - Limits inherited from the X Keyboard Extension protocol

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric keycode as seen by the X server.
pub type Keycode = u32;

/// X11 keysym value.
pub type Keysym = u32;

pub const MIN_LEGAL_KEYCODE: Keycode = 8;
pub const MAX_LEGAL_KEYCODE: Keycode = 255;

pub const NUM_KBD_GROUPS: usize = 4;
pub const NUM_VIRTUAL_MODS: usize = 16;
pub const NUM_INDICATORS: usize = 32;
pub const NUM_REAL_MODS: usize = 8;

/// Highest level a type map entry may select (levels are 0-based internally)
pub const MAX_SHIFT_LEVEL: u32 = 63;
pub const MAX_RADIO_GROUPS: u32 = 32;

pub const NO_SYMBOL: Keysym = 0;
pub const VOID_SYMBOL: Keysym = 0x00ff_ffff;

/// Real modifier names, indexed by bit position
pub const REAL_MOD_NAMES: [&str; NUM_REAL_MODS] = [
    "Shift", "Lock", "Control", "Mod1", "Mod2", "Mod3", "Mod4", "Mod5",
];

pub const SHIFT_MASK: u8 = 1 << 0;
pub const LOCK_MASK: u8 = 1 << 1;
pub const CONTROL_MASK: u8 = 1 << 2;
pub const ALL_REAL_MODS: u8 = 0xff;

/// Bits of a key's explicit-components mask
pub mod explicit {
    pub const KEY_TYPE_1: u8 = 1 << 0;
    pub const KEY_TYPE_2: u8 = 1 << 1;
    pub const KEY_TYPE_3: u8 = 1 << 2;
    pub const KEY_TYPE_4: u8 = 1 << 3;
    pub const INTERPRET: u8 = 1 << 4;
    pub const AUTO_REPEAT: u8 = 1 << 5;
    pub const BEHAVIOR: u8 = 1 << 6;
    pub const VMODMAP: u8 = 1 << 7;

    /// Explicit-type bit for a 0-based group index
    pub const fn key_type(group: usize) -> u8 {
        1 << group
    }
}

/// A four-character key name such as `<AE01>`
///
/// The characters are packed big-endian into a `u32` so names compare and
/// hash as integers. Shorter names are padded with zero bytes.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct KeyName(pub u32);

impl KeyName {
    /// Pack a textual name; characters past the fourth are ignored
    pub fn new(name: &str) -> Self {
        let mut packed = 0u32;
        for (i, b) in name.bytes().take(4).enumerate() {
            packed |= (b as u32) << (24 - 8 * i);
        }
        KeyName(packed)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The name without angle brackets
    pub fn text(&self) -> String {
        self.0
            .to_be_bytes()
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| *b as char)
            .collect()
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.text())
    }
}

/// Modifier mask made of eight real modifiers and sixteen virtual ones
///
/// Expression results carry masks packed as `real | vmods << 8`;
/// [`ModMask::from_packed`] and [`ModMask::packed`] convert between the two.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct ModMask {
    pub real_mods: u8,
    pub vmods: u16,
}

impl ModMask {
    pub const fn new(real_mods: u8, vmods: u16) -> Self {
        Self { real_mods, vmods }
    }

    pub const fn from_packed(packed: u32) -> Self {
        Self {
            real_mods: (packed & 0xff) as u8,
            vmods: ((packed >> 8) & 0xffff) as u16,
        }
    }

    pub const fn packed(&self) -> u32 {
        self.real_mods as u32 | (self.vmods as u32) << 8
    }

    pub const fn is_empty(&self) -> bool {
        self.real_mods == 0 && self.vmods == 0
    }

    pub const fn union(&self, other: ModMask) -> ModMask {
        ModMask::new(self.real_mods | other.real_mods, self.vmods | other.vmods)
    }

    pub const fn intersect(&self, other: ModMask) -> ModMask {
        ModMask::new(self.real_mods & other.real_mods, self.vmods & other.vmods)
    }

    /// True when every bit of `self` is also set in `other`
    pub const fn is_subset_of(&self, other: ModMask) -> bool {
        (self.real_mods & !other.real_mods) == 0 && (self.vmods & !other.vmods) == 0
    }
}

/// How a definition combines with an earlier one for the same entity
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MergeMode {
    /// Whatever the enclosing context says
    #[default]
    Default,
    /// Keep existing values on collision
    Augment,
    /// New values win on collision
    Override,
    /// New entity discards the old one wholesale
    Replace,
    /// Deliberate synonym (keycodes only)
    AltForm,
}

impl MergeMode {
    /// Resolve `Default` against the mode of the surrounding statement
    pub fn or(self, outer: MergeMode) -> MergeMode {
        match self {
            MergeMode::Default => outer,
            mode => mode,
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::Default => write!(f, "default"),
            MergeMode::Augment => write!(f, "augment"),
            MergeMode::Override => write!(f, "override"),
            MergeMode::Replace => write!(f, "replace"),
            MergeMode::AltForm => write!(f, "alternate"),
        }
    }
}

/// Kind of a parsed section
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum FileType {
    Keycodes,
    Types,
    Compat,
    Symbols,
    Geometry,
    Keymap,
    Semantics,
    Layout,
}

impl FileType {
    /// Subdirectory of an include root holding sections of this kind
    pub fn directory(&self) -> &'static str {
        match self {
            FileType::Keycodes => "keycodes",
            FileType::Types => "types",
            FileType::Compat => "compat",
            FileType::Symbols => "symbols",
            FileType::Geometry => "geometry",
            FileType::Keymap | FileType::Semantics | FileType::Layout => "keymap",
        }
    }

    /// Source keyword introducing a section of this kind
    pub fn keyword(&self) -> &'static str {
        match self {
            FileType::Keycodes => "xkb_keycodes",
            FileType::Types => "xkb_types",
            FileType::Compat => "xkb_compatibility",
            FileType::Symbols => "xkb_symbols",
            FileType::Geometry => "xkb_geometry",
            FileType::Keymap => "xkb_keymap",
            FileType::Semantics => "xkb_semantics",
            FileType::Layout => "xkb_layout",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            FileType::Keymap | FileType::Semantics | FileType::Layout
        )
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Keycodes => write!(f, "keycodes"),
            FileType::Types => write!(f, "types"),
            FileType::Compat => write!(f, "compatibility map"),
            FileType::Symbols => write!(f, "symbols"),
            FileType::Geometry => write!(f, "geometry"),
            FileType::Keymap => write!(f, "keymap"),
            FileType::Semantics => write!(f, "semantics"),
            FileType::Layout => write!(f, "layout"),
        }
    }
}

/// Flags written in front of a section keyword (`default partial ...`)
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct MapFlags(pub u16);

impl MapFlags {
    pub const IS_DEFAULT: u16 = 1 << 0;
    pub const PARTIAL: u16 = 1 << 1;
    pub const HIDDEN: u16 = 1 << 2;
    pub const ALPHANUMERIC_KEYS: u16 = 1 << 3;
    pub const MODIFIER_KEYS: u16 = 1 << 4;
    pub const KEYPAD_KEYS: u16 = 1 << 5;
    pub const FUNCTION_KEYS: u16 = 1 << 6;
    pub const ALTERNATE_GROUP: u16 = 1 << 7;

    pub const NAMES: [(&'static str, u16); 8] = [
        ("default", Self::IS_DEFAULT),
        ("partial", Self::PARTIAL),
        ("hidden", Self::HIDDEN),
        ("alphanumeric_keys", Self::ALPHANUMERIC_KEYS),
        ("modifier_keys", Self::MODIFIER_KEYS),
        ("keypad_keys", Self::KEYPAD_KEYS),
        ("function_keys", Self::FUNCTION_KEYS),
        ("alternate_group", Self::ALTERNATE_GROUP),
    ];

    pub fn contains(&self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn insert(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

/// Index of a real modifier from its name (case-insensitive)
pub fn real_mod_index(name: &str) -> Option<usize> {
    REAL_MOD_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
}

/// Format a real-modifier mask as `Shift+Control`
pub fn real_mods_text(mask: u8) -> String {
    if mask == 0 {
        return "none".to_string();
    }
    if mask == ALL_REAL_MODS {
        return "all".to_string();
    }
    REAL_MOD_NAMES
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join("+")
}
