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

//! src/core/dump.rs
//!
//! Keymap printer
//!
//! Writes a compiled [`Keymap`] back out as one `xkb_keymap` block with
//! the four sections in compile order. The output is meant to be read
//! back: compiling it again yields an equal keymap for anything the
//! compiler itself produced.
//!
//! # Architecture
//! [`KeymapText`] implements `Display`; each section has its own writer
//! and every field is printed in the form its resolver accepts (masks as
//! `Shift+NumLock`, groups as `Group2`, actions with every non-default
//! argument spelled out).

use std::fmt::{self, Write};

use crate::core::action::{controls, flags, Action, GroupAction, ModAction};
use crate::core::keymap::{
    im_use, BehaviorKind, GroupsRange, IndicatorMap, Key, Keymap, SymInterpret,
    IM_LED_DRIVES_KB, IM_NO_EXPLICIT,
};
use crate::core::keysym::keysym_name;
use crate::core::symbols::automatic_type;
use crate::core::types::{
    explicit, real_mods_text, KeyName, Keycode, ModMask, NO_SYMBOL, NUM_KBD_GROUPS,
    REAL_MOD_NAMES,
};

const INDENT: &str = "    ";

const ISO_AFFECT_NAMES: &[(&str, u32)] = &[
    ("mods", flags::ISO_NO_AFFECT_MODS as u32),
    ("group", flags::ISO_NO_AFFECT_GROUP as u32),
    ("ptr", flags::ISO_NO_AFFECT_PTR as u32),
    ("ctrls", flags::ISO_NO_AFFECT_CTRLS as u32),
];

const REPORT_NAMES: &[(&str, u32)] = &[
    ("press", flags::MESSAGE_ON_PRESS as u32),
    ("release", flags::MESSAGE_ON_RELEASE as u32),
];

/// Printable form of a keymap
///
/// # Example
///
/// ```ignore
/// let keymap = compiler.compile_str(&text, None)?;
/// println!("{}", KeymapText(&keymap));
/// ```
pub struct KeymapText<'a>(pub &'a Keymap);

/// Render `keymap` as source text
pub fn dump_keymap(keymap: &Keymap) -> String {
    KeymapText(keymap).to_string()
}

impl fmt::Display for KeymapText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keymap = self.0;
        writeln!(f, "xkb_keymap {{")?;
        write_keycodes(f, keymap)?;
        writeln!(f)?;
        write_types(f, keymap)?;
        writeln!(f)?;
        write_compat(f, keymap)?;
        writeln!(f)?;
        write_symbols(f, keymap)?;
        writeln!(f, "}};")
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Quote a string literal, escaping backslashes and quotes
fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn section_name(name: &Option<String>) -> String {
    quoted(name.as_deref().unwrap_or_default())
}

/// `a+b+c` from single-bit table entries, first name per bit
///
/// Bits no entry covers are appended as one hex number.
fn mask_names(mask: u32, table: &[(&str, u32)]) -> String {
    if mask == 0 {
        return "none".to_string();
    }
    let mut parts = Vec::new();
    let mut covered = 0;
    for (name, value) in table {
        if value.is_power_of_two() && mask & value != 0 && covered & value == 0 {
            parts.push((*name).to_string());
            covered |= value;
        }
    }
    let rest = mask & !covered;
    if rest != 0 {
        parts.push(format!("{:#x}", rest));
    }
    parts.join("+")
}

fn group_mask_text(mask: u8) -> String {
    if mask == 0 {
        return "none".to_string();
    }
    (0..8)
        .filter(|g| mask & (1 << g) != 0)
        .map(|g| format!("Group{}", g + 1))
        .collect::<Vec<_>>()
        .join("+")
}

fn mods_text(keymap: &Keymap, mask: ModMask) -> String {
    keymap.vmods.mask_text(mask)
}

fn key_name(keymap: &Keymap, keycode: Keycode) -> KeyName {
    keymap
        .key_names
        .get(keycode as usize)
        .copied()
        .unwrap_or_default()
}

/// Level index as written in type maps, 0-based in
fn level_text(level: u32) -> String {
    if level < 8 {
        format!("Level{}", level + 1)
    } else {
        (level + 1).to_string()
    }
}

/// `+N` / `-N` for relative values
fn signed(value: i32) -> String {
    if value < 0 {
        value.to_string()
    } else {
        format!("+{}", value)
    }
}

/// A non-negative absolute value; negative ones are written so that they
/// still read back as absolute
fn absolute(value: i32) -> String {
    if value < 0 {
        format!("(0{})", value)
    } else {
        value.to_string()
    }
}

// ============================================================================
// Keycodes
// ============================================================================

fn write_keycodes(f: &mut fmt::Formatter<'_>, keymap: &Keymap) -> fmt::Result {
    writeln!(
        f,
        "{}xkb_keycodes {} {{",
        INDENT,
        section_name(&keymap.keycodes_name)
    )?;
    let pad = INDENT.repeat(2);
    writeln!(f, "{}minimum = {};", pad, keymap.min_key_code)?;
    writeln!(f, "{}maximum = {};", pad, keymap.max_key_code)?;

    let mut seen = Vec::new();
    for kc in keymap.min_key_code..=keymap.max_key_code {
        let name = key_name(keymap, kc);
        if name.is_empty() {
            continue;
        }
        let prefix = if seen.contains(&name) { "alternate " } else { "" };
        seen.push(name);
        writeln!(f, "{}{}{} = {};", pad, prefix, name, kc)?;
    }

    for (slot, name) in keymap.indicator_names.iter().enumerate() {
        let Some(name) = name else {
            continue;
        };
        let prefix = if keymap.phys_indicators & (1 << slot) != 0 {
            ""
        } else {
            "virtual "
        };
        writeln!(f, "{}{}indicator {} = {};", pad, prefix, slot + 1, quoted(name))?;
    }

    for alias in &keymap.key_aliases {
        writeln!(f, "{}alias {} = {};", pad, alias.alias, alias.real)?;
    }
    writeln!(f, "{}}};", INDENT)
}

// ============================================================================
// Types
// ============================================================================

fn write_types(f: &mut fmt::Formatter<'_>, keymap: &Keymap) -> fmt::Result {
    writeln!(f, "{}xkb_types {} {{", INDENT, section_name(&keymap.types_name))?;
    let pad = INDENT.repeat(2);

    if !keymap.vmods.is_empty() {
        let decls: Vec<String> = keymap
            .vmods
            .iter()
            .map(|(_, name, real)| match real {
                0 => name.to_string(),
                real => format!("{}={}", name, real_mods_text(real)),
            })
            .collect();
        writeln!(f, "{}virtual_modifiers {};", pad, decls.join(","))?;
        writeln!(f)?;
    }

    let inner = INDENT.repeat(3);
    for key_type in &keymap.types {
        writeln!(f, "{}type {} {{", pad, quoted(&key_type.name))?;
        writeln!(f, "{}modifiers = {};", inner, mods_text(keymap, key_type.mods))?;
        for entry in &key_type.entries {
            let mods = mods_text(keymap, entry.mods);
            if entry.level != 0 {
                writeln!(f, "{}map[{}] = {};", inner, mods, level_text(entry.level))?;
            }
            if !entry.preserve.is_empty() {
                writeln!(
                    f,
                    "{}preserve[{}] = {};",
                    inner,
                    mods,
                    mods_text(keymap, entry.preserve)
                )?;
            }
        }
        for (level, name) in key_type.level_names.iter().enumerate() {
            if let Some(name) = name {
                writeln!(
                    f,
                    "{}level_name[{}] = {};",
                    inner,
                    level_text(level as u32),
                    quoted(name)
                )?;
            }
        }
        writeln!(f, "{}}};", pad)?;
    }
    writeln!(f, "{}}};", INDENT)
}

// ============================================================================
// Actions
// ============================================================================

fn mod_action_args(keymap: &Keymap, act: &ModAction, args: &mut Vec<String>) {
    if act.flags & flags::USE_MOD_MAP_MODS != 0 {
        args.push("modifiers=modMapMods".to_string());
    } else {
        args.push(format!("modifiers={}", mods_text(keymap, act.mods)));
    }
}

fn latch_lock_args(flag_bits: u8, args: &mut Vec<String>) {
    if flag_bits & flags::CLEAR_LOCKS != 0 {
        args.push("clearLocks".to_string());
    }
    if flag_bits & flags::LATCH_TO_LOCK != 0 {
        args.push("latchToLock".to_string());
    }
}

fn lock_which_text(flag_bits: u8) -> Option<&'static str> {
    match flag_bits & flags::LOCK_MASK {
        0 => None,
        flags::LOCK_NO_UNLOCK => Some("lock"),
        flags::LOCK_NO_LOCK => Some("unlock"),
        _ => Some("neither"),
    }
}

fn lock_which_args(flag_bits: u8, args: &mut Vec<String>) {
    if let Some(which) = lock_which_text(flag_bits) {
        args.push(format!("affect={}", which));
    }
}

/// `group=N` for absolute groups, `group=+N`/`-N` for relative ones
///
/// A relative zero is the factory default and prints nothing.
fn group_arg(act: &GroupAction) -> Option<String> {
    if act.flags & flags::GROUP_ABSOLUTE != 0 {
        Some(format!("group={}", act.group + 1))
    } else if act.group != 0 {
        Some(format!("group={}", signed(act.group)))
    } else {
        None
    }
}

fn data_args(data: &[u8], args: &mut Vec<String>) {
    for (i, byte) in data.iter().enumerate() {
        if *byte != 0 {
            args.push(format!("data[{}]={:#04x}", i, byte));
        }
    }
}

/// Action in call syntax, e.g. `SetMods(modifiers=Shift,clearLocks)`
pub fn action_text(keymap: &Keymap, action: &Action) -> String {
    let mut args = Vec::new();
    match action {
        Action::None | Action::Terminate | Action::DeviceValuator => {}
        Action::SetMods(act) | Action::LatchMods(act) => {
            mod_action_args(keymap, act, &mut args);
            latch_lock_args(act.flags, &mut args);
        }
        Action::LockMods(act) => {
            mod_action_args(keymap, act, &mut args);
            lock_which_args(act.flags, &mut args);
        }
        Action::SetGroup(act) | Action::LatchGroup(act) => {
            args.extend(group_arg(act));
            latch_lock_args(act.flags, &mut args);
        }
        Action::LockGroup(act) => args.extend(group_arg(act)),
        Action::MovePtr(act) => {
            let coord = |value: i32, bit: u8| {
                if act.flags & bit != 0 {
                    absolute(value)
                } else {
                    signed(value)
                }
            };
            args.push(format!("x={}", coord(act.x, flags::MOVE_ABSOLUTE_X)));
            args.push(format!("y={}", coord(act.y, flags::MOVE_ABSOLUTE_Y)));
            if act.flags & flags::NO_ACCELERATION != 0 {
                args.push("!accel".to_string());
            }
        }
        Action::PtrBtn(act) | Action::LockPtrBtn(act) => {
            if act.button != 0 {
                args.push(format!("button={}", act.button));
            }
            if act.count != 0 {
                args.push(format!("count={}", act.count));
            }
            if matches!(action, Action::LockPtrBtn(_)) {
                lock_which_args(act.flags, &mut args);
            }
        }
        Action::SetPtrDflt(act) => {
            if act.affect == flags::AFFECT_DFLT_BTN {
                args.push("affect=defaultButton".to_string());
            }
            let value = if act.flags & flags::DFLT_BTN_ABSOLUTE != 0 {
                act.value.to_string()
            } else {
                signed(act.value)
            };
            args.push(format!("button={}", value));
        }
        Action::IsoLock(act) => {
            let modifiers = if act.flags & flags::USE_MOD_MAP_MODS != 0
                && act.flags & flags::ISO_DFLT_IS_GROUP == 0
            {
                "modifiers=modMapMods".to_string()
            } else {
                format!("modifiers={}", mods_text(keymap, act.mods))
            };
            let group = GroupAction {
                flags: act.flags,
                group: act.group,
            };
            // The field set last decides which of the two is the default.
            if act.flags & flags::ISO_DFLT_IS_GROUP != 0 {
                args.push(modifiers);
                args.extend(group_arg(&group));
            } else {
                if act.group != 0 {
                    args.push(format!("group={}", signed(act.group)));
                }
                args.push(modifiers);
            }
            if act.affect != 0 {
                let affected = !act.affect & flags::ISO_AFFECT_MASK;
                args.push(format!("affect={}", mask_names(affected as u32, ISO_AFFECT_NAMES)));
            }
        }
        Action::SwitchScreen(act) => {
            let screen = if act.flags & flags::SWITCH_ABSOLUTE != 0 {
                act.screen.to_string()
            } else {
                signed(act.screen)
            };
            args.push(format!("screen={}", screen));
            if act.flags & flags::SWITCH_APPLICATION != 0 {
                args.push("!same".to_string());
            }
        }
        Action::SetControls(act) | Action::LockControls(act) => {
            args.push(format!("controls={}", mask_names(act.ctrls, controls::NAMES)));
            if matches!(action, Action::LockControls(_)) {
                lock_which_args(act.flags, &mut args);
            }
        }
        Action::ActionMessage(act) => {
            let report = act.flags & (flags::MESSAGE_ON_PRESS | flags::MESSAGE_ON_RELEASE);
            if report != 0 {
                args.push(format!("report={}", mask_names(report as u32, REPORT_NAMES)));
            }
            if act.flags & flags::MESSAGE_GEN_KEY_EVENT != 0 {
                args.push("genKeyEvent".to_string());
            }
            data_args(&act.message, &mut args);
        }
        Action::RedirectKey(act) => {
            if act.new_key != 0 {
                args.push(format!("key={}", key_name(keymap, act.new_key)));
            }
            if !act.mods.is_empty() {
                args.push(format!("modifiers={}", mods_text(keymap, act.mods)));
            }
            let cleared = ModMask::new(
                act.mods_mask.real_mods & !act.mods.real_mods,
                act.mods_mask.vmods & !act.mods.vmods,
            );
            if !cleared.is_empty() {
                args.push(format!("clearmods={}", mods_text(keymap, cleared)));
            }
        }
        Action::DeviceBtn(act) | Action::LockDeviceBtn(act) => {
            if act.button != 0 {
                args.push(format!("button={}", act.button));
            }
            if act.count != 0 {
                args.push(format!("count={}", act.count));
            }
            if act.device != 0 {
                args.push(format!("device={}", act.device));
            }
            if matches!(action, Action::LockDeviceBtn(_)) {
                lock_which_args(act.flags, &mut args);
            }
        }
        Action::Private(act) => {
            args.push(format!("type={:#04x}", act.action_type));
            data_args(&act.data, &mut args);
        }
    }
    format!("{}({})", action.kind().name(), args.join(","))
}

// ============================================================================
// Compat
// ============================================================================

fn write_interpret(
    f: &mut fmt::Formatter<'_>,
    keymap: &Keymap,
    interp: &SymInterpret,
) -> fmt::Result {
    let pad = INDENT.repeat(2);
    let inner = INDENT.repeat(3);
    let sym = if interp.sym == NO_SYMBOL {
        "Any".to_string()
    } else {
        keysym_name(interp.sym)
    };
    writeln!(
        f,
        "{}interpret {}+{}({}) {{",
        pad,
        sym,
        interp.predicate.name(),
        real_mods_text(interp.mods)
    )?;
    if let Some(name) = interp.virtual_mod.and_then(|i| keymap.vmods.name(i)) {
        writeln!(f, "{}virtualModifier = {};", inner, name)?;
    }
    if interp.level_one_only {
        writeln!(f, "{}useModMapMods = level1;", inner)?;
    }
    writeln!(f, "{}repeat = {};", inner, bool_text(interp.auto_repeat))?;
    writeln!(f, "{}locking = {};", inner, bool_text(interp.locking))?;
    writeln!(f, "{}action = {};", inner, action_text(keymap, &interp.action))?;
    writeln!(f, "{}}};", pad)
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn write_indicator(
    f: &mut fmt::Formatter<'_>,
    keymap: &Keymap,
    name: &str,
    map: &IndicatorMap,
) -> fmt::Result {
    let pad = INDENT.repeat(2);
    let inner = INDENT.repeat(3);
    writeln!(f, "{}indicator {} {{", pad, quoted(name))?;
    if map.flags & IM_NO_EXPLICIT != 0 {
        writeln!(f, "{}!allowExplicit;", inner)?;
    }
    if map.flags & IM_LED_DRIVES_KB != 0 {
        writeln!(f, "{}drivesKeyboard;", inner)?;
    }
    if map.which_mods != 0 {
        writeln!(
            f,
            "{}whichModState = {};",
            inner,
            mask_names(map.which_mods as u32, im_use::NAMES)
        )?;
    }
    if !map.mods.is_empty() {
        writeln!(f, "{}modifiers = {};", inner, mods_text(keymap, map.mods))?;
    }
    if map.which_groups != 0 {
        writeln!(
            f,
            "{}whichGroupState = {};",
            inner,
            mask_names(map.which_groups as u32, im_use::NAMES)
        )?;
    }
    if map.groups != 0 {
        writeln!(f, "{}groups = {};", inner, group_mask_text(map.groups))?;
    }
    if map.ctrls != 0 {
        writeln!(
            f,
            "{}controls = {};",
            inner,
            mask_names(map.ctrls, controls::NAMES)
        )?;
    }
    writeln!(f, "{}}};", pad)
}

fn write_compat(f: &mut fmt::Formatter<'_>, keymap: &Keymap) -> fmt::Result {
    writeln!(
        f,
        "{}xkb_compatibility {} {{",
        INDENT,
        section_name(&keymap.compat_name)
    )?;
    let pad = INDENT.repeat(2);

    for interp in &keymap.interprets {
        write_interpret(f, keymap, interp)?;
    }

    for (group, mask) in keymap.group_compat.iter().enumerate() {
        if !mask.is_empty() {
            writeln!(f, "{}group {} = {};", pad, group + 1, mods_text(keymap, *mask))?;
        }
    }

    for (slot, map) in keymap.indicators.iter().enumerate() {
        let (Some(map), Some(name)) = (map, keymap.indicator_names[slot].as_ref()) else {
            continue;
        };
        write_indicator(f, keymap, name, map)?;
    }
    writeln!(f, "{}}};", INDENT)
}

// ============================================================================
// Symbols
// ============================================================================

/// True when the key carries anything the symbols section sets, the
/// modifier map aside
fn has_symbols(key: &Key) -> bool {
    !key.groups.is_empty()
        || key.explicit != 0
        || key.repeat.is_some()
        || !key.behavior.is_default()
        || key.vmodmap != 0
        || key.groups_range != GroupsRange::Wrap
}

fn key_body(keymap: &Keymap, key: &Key) -> Vec<String> {
    let mut fields = Vec::new();

    for (group, info) in key.groups.iter().enumerate() {
        let Some(key_type) = keymap.types.get(info.type_index) else {
            continue;
        };
        let levels = (key_type.num_levels as usize).min(info.syms.len());
        let syms = &info.syms[..levels];

        let inferred = automatic_type(levels, syms).map(|(name, _)| name);
        if key.explicit & explicit::key_type(group) != 0 || inferred != Some(key_type.name.as_str())
        {
            fields.push(format!(
                "type[Group{}] = {}",
                group + 1,
                quoted(&key_type.name)
            ));
        }
        let names: Vec<String> = syms.iter().map(|sym| keysym_name(*sym)).collect();
        fields.push(format!(
            "symbols[Group{}] = [ {} ]",
            group + 1,
            names.join(", ")
        ));
        if let Some(actions) = &info.actions {
            let texts: Vec<String> = actions
                .iter()
                .take(levels)
                .map(|action| action_text(keymap, action))
                .collect();
            fields.push(format!(
                "actions[Group{}] = [ {} ]",
                group + 1,
                texts.join(", ")
            ));
        }
    }

    if let Some(repeat) = key.repeat {
        fields.push(format!("repeat = {}", if repeat { "Yes" } else { "No" }));
    }
    if key.explicit & explicit::VMODMAP != 0 {
        let text = if key.vmodmap == 0 {
            "none".to_string()
        } else {
            keymap.vmods.vmods_text(key.vmodmap)
        };
        fields.push(format!("virtualMods = {}", text));
    }

    match key.behavior.kind {
        BehaviorKind::Default => {}
        BehaviorKind::Lock => fields.push(format!(
            "locks = {}",
            if key.behavior.permanent { "permanent" } else { "Yes" }
        )),
        BehaviorKind::RadioGroup { group, allow_none } => {
            if allow_none {
                fields.push(format!("allowNone[{}]", group + 1));
            }
            let field = if key.behavior.permanent {
                "permanentRadioGroup"
            } else {
                "radioGroup"
            };
            fields.push(format!("{} = {}", field, group + 1));
        }
        BehaviorKind::Overlay { overlay, key: target } => {
            let field = if key.behavior.permanent {
                "permanentOverlay"
            } else {
                "overlay"
            };
            fields.push(format!(
                "{}{} = {}",
                field,
                overlay,
                key_name(keymap, target)
            ));
        }
    }

    match key.groups_range {
        GroupsRange::Wrap => {}
        GroupsRange::Clamp => fields.push("groupsClamp".to_string()),
        GroupsRange::Redirect(group) => {
            fields.push(format!("groupsRedirect = Group{}", group + 1))
        }
    }
    fields
}

fn write_symbols(f: &mut fmt::Formatter<'_>, keymap: &Keymap) -> fmt::Result {
    writeln!(
        f,
        "{}xkb_symbols {} {{",
        INDENT,
        section_name(&keymap.symbols_name)
    )?;
    let pad = INDENT.repeat(2);
    let inner = INDENT.repeat(3);

    for (group, name) in keymap.group_names.iter().enumerate().take(NUM_KBD_GROUPS) {
        if let Some(name) = name {
            writeln!(f, "{}name[Group{}] = {};", pad, group + 1, quoted(name))?;
        }
    }

    let mut written = Vec::new();
    for kc in keymap.min_key_code..=keymap.max_key_code {
        let name = key_name(keymap, kc);
        let Some(key) = keymap.keys.get(kc as usize) else {
            continue;
        };
        if name.is_empty() || written.contains(&name) || !has_symbols(key) {
            continue;
        }
        written.push(name);

        let body = key_body(keymap, key);
        if body.is_empty() {
            writeln!(f, "{}key {} {{ }};", pad, name)?;
            continue;
        }
        writeln!(f, "{}key {} {{", pad, name)?;
        let last = body.len() - 1;
        for (i, field) in body.iter().enumerate() {
            let sep = if i == last { "" } else { "," };
            writeln!(f, "{}{}{}", inner, field, sep)?;
        }
        writeln!(f, "{}}};", pad)?;
    }

    let mut modmap = String::new();
    for (bit, modifier) in REAL_MOD_NAMES.iter().enumerate() {
        let mut keys = Vec::new();
        for kc in keymap.min_key_code..=keymap.max_key_code {
            let name = key_name(keymap, kc);
            let carries = keymap
                .keys
                .get(kc as usize)
                .is_some_and(|key| key.modmap & (1 << bit) != 0);
            if carries && !name.is_empty() && !keys.contains(&name) {
                keys.push(name);
            }
        }
        if keys.is_empty() {
            continue;
        }
        let list: Vec<String> = keys.iter().map(ToString::to_string).collect();
        writeln!(
            modmap,
            "{}modifier_map {} {{ {} }};",
            pad,
            modifier,
            list.join(", ")
        )?;
    }
    if !modmap.is_empty() {
        writeln!(f)?;
        f.write_str(&modmap)?;
    }
    writeln!(f, "{}}};", INDENT)
}
